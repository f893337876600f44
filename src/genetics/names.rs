//! Display names built from syllables, with family names passed to children.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

const GIVEN_HEADS: &[&str] = &[
    "Ab", "Ar", "Bel", "Cor", "Dun", "Ed", "Fen", "Gar", "Hal", "Ivo", "Jor", "Kel", "Lor",
    "Mir", "Nol", "Os", "Per", "Quin", "Ros", "Sil", "Tor", "Ul", "Ven", "Wyn", "Yr", "Zel",
];

const GIVEN_TAILS: &[&str] = &[
    "a", "an", "ek", "en", "ia", "id", "in", "is", "o", "on", "or", "os", "ric", "un", "us",
    "wen", "yn",
];

const FAMILY_HEADS: &[&str] = &[
    "Ash", "Birch", "Cold", "Dale", "East", "Fair", "Glen", "Hart", "Iron", "Marsh", "North",
    "Oak", "Red", "Stone", "Thorn", "West", "White", "Wolf",
];

const FAMILY_TAILS: &[&str] = &[
    "brook", "field", "ford", "hill", "hollow", "mere", "ridge", "shaw", "vale", "well",
    "wood", "worth",
];

fn pick<R: Rng>(parts: &[&str], rng: &mut R) -> String {
    parts.choose(rng).copied().unwrap_or_default().to_string()
}

/// Given name plus family name
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Name {
    pub given: String,
    pub family: String,
}

impl Name {
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self {
            given: Self::random_given(rng),
            family: format!("{}{}", pick(FAMILY_HEADS, rng), pick(FAMILY_TAILS, rng)),
        }
    }

    fn random_given<R: Rng>(rng: &mut R) -> String {
        format!("{}{}", pick(GIVEN_HEADS, rng), pick(GIVEN_TAILS, rng))
    }

    /// Fresh given name, family name kept from `parent`
    pub fn inherit<R: Rng>(parent: &Name, rng: &mut R) -> Self {
        Self {
            given: Self::random_given(rng),
            family: parent.family.clone(),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.given, self.family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_random_names_are_nonempty() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..20 {
            let name = Name::random(&mut rng);
            assert!(!name.given.is_empty());
            assert!(!name.family.is_empty());
            assert_eq!(name.to_string().split(' ').count(), 2);
        }
    }

    #[test]
    fn test_family_name_inherited() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let parent = Name::random(&mut rng);
        let child = Name::inherit(&parent, &mut rng);
        assert_eq!(child.family, parent.family);
    }
}
