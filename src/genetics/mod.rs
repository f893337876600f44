//! Genetics module - trait genomes, recombination and naming.

pub mod genome;
pub mod names;

pub use genome::{Genome, Trait, TraitBounds, Traits};
pub use names::Name;
