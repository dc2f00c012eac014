//! Island seed strings.
//!
//! A seed is eight non-negative mask offsets followed by a style digit, all
//! joined by `_`, e.g. `10_10_10_10_10_10_10_10_1`.

use std::fmt;
use std::str::FromStr;

use archipelago_common::LocalColumn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::block::Rotation;

/// Separator between seed fields.
pub const SEED_SEPARATOR: char = '_';

/// Number of mask offset fields in a seed.
pub const SEED_OFFSETS: usize = 8;

/// Seed parsing errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeedError {
    /// Wrong number of fields
    #[error("Seed {seed:?} has {found} fields, expected {expected}")]
    FieldCount {
        /// Offending seed string
        seed: String,
        /// Fields found
        found: usize,
        /// Fields required
        expected: usize,
    },
    /// A field is not a non-negative integer
    #[error("Seed {seed:?} field {index} is not a non-negative integer")]
    InvalidField {
        /// Offending seed string
        seed: String,
        /// Zero-based field index
        index: usize,
    },
}

/// Decoded island seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IslandSeed {
    offsets: [u32; SEED_OFFSETS],
    style: u8,
}

impl IslandSeed {
    /// Creates a seed from its fields.
    #[must_use]
    pub const fn new(offsets: [u32; SEED_OFFSETS], style: u8) -> Self {
        Self { offsets, style }
    }

    /// Draws a random seed.
    #[must_use]
    pub fn random(rng: &mut fastrand::Rng, style_count: usize) -> Self {
        let mut offsets = [0u32; SEED_OFFSETS];
        for offset in &mut offsets {
            *offset = rng.u32(0..10_000);
        }
        let style = rng.usize(0..style_count.clamp(1, 10)) as u8;
        Self { offsets, style }
    }

    /// Style index.
    #[must_use]
    pub const fn style(&self) -> u8 {
        self.style
    }

    /// Mask offset pair `n` (0-3) as (x, z).
    #[must_use]
    pub const fn offset_pair(&self, n: usize) -> (i64, i64) {
        (self.offsets[n * 2] as i64, self.offsets[n * 2 + 1] as i64)
    }

    fn hash(&self) -> u64 {
        self.offsets
            .iter()
            .chain(std::iter::once(&u32::from(self.style)))
            .fold(0xcbf2_9ce4_8422_2325_u64, |h, &v| {
                (h ^ u64::from(v)).wrapping_mul(0x0100_0000_01b3)
            })
    }

    /// Deterministic generator for per-block randomness.
    #[must_use]
    pub fn block_rng(&self, local: LocalColumn, stack_index: u16) -> fastrand::Rng {
        let mixed = self.hash()
            ^ (u64::from(local.x) << 40)
            ^ (u64::from(local.z) << 20)
            ^ u64::from(stack_index);
        fastrand::Rng::with_seed(mixed)
    }

    /// Appearance value (0-99) and orientation for a block.
    #[must_use]
    pub fn block_appearance(&self, local: LocalColumn, stack_index: u16) -> (u8, Rotation) {
        let mut rng = self.block_rng(local, stack_index);
        let appearance = rng.u8(0..100);
        let rotation = Rotation::from_quarter_turns(rng.u8(0..4));
        (appearance, rotation)
    }
}

impl FromStr for IslandSeed {
    type Err = SeedError;

    fn from_str(seed: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = seed.trim().split(SEED_SEPARATOR).collect();
        if fields.len() != SEED_OFFSETS + 1 {
            return Err(SeedError::FieldCount {
                seed: seed.to_string(),
                found: fields.len(),
                expected: SEED_OFFSETS + 1,
            });
        }

        let mut offsets = [0u32; SEED_OFFSETS];
        for (index, (slot, field)) in offsets.iter_mut().zip(&fields).enumerate() {
            *slot = field.parse().map_err(|_| SeedError::InvalidField {
                seed: seed.to_string(),
                index,
            })?;
        }
        let style = fields[SEED_OFFSETS]
            .parse()
            .map_err(|_| SeedError::InvalidField {
                seed: seed.to_string(),
                index: SEED_OFFSETS,
            })?;

        Ok(Self { offsets, style })
    }
}

impl TryFrom<String> for IslandSeed {
    type Error = SeedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IslandSeed> for String {
    fn from(seed: IslandSeed) -> Self {
        seed.to_string()
    }
}

impl fmt::Display for IslandSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for offset in &self.offsets {
            write!(f, "{offset}{SEED_SEPARATOR}")?;
        }
        write!(f, "{}", self.style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let seed: IslandSeed = "10_10_10_10_10_10_10_10_1".parse().expect("valid seed");
        assert_eq!(seed.style(), 1);
        assert_eq!(seed.offset_pair(3), (10, 10));
        assert_eq!(seed.to_string(), "10_10_10_10_10_10_10_10_1");
    }

    #[test]
    fn test_malformed_seeds() {
        assert!(matches!(
            "1_2_3".parse::<IslandSeed>(),
            Err(SeedError::FieldCount { found: 3, .. })
        ));
        assert!(matches!(
            "1_2_3_x_5_6_7_8_1".parse::<IslandSeed>(),
            Err(SeedError::InvalidField { index: 3, .. })
        ));
        assert!(matches!(
            "1_2_3_4_5_6_7_-8_1".parse::<IslandSeed>(),
            Err(SeedError::InvalidField { index: 7, .. })
        ));
    }

    #[test]
    fn test_serde_as_string() {
        let seed = IslandSeed::new([1, 2, 3, 4, 5, 6, 7, 8], 2);
        let json = serde_json::to_string(&seed).expect("serialize");
        assert_eq!(json, "\"1_2_3_4_5_6_7_8_2\"");
        let back: IslandSeed = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, seed);
        assert!(serde_json::from_str::<IslandSeed>("\"oops\"").is_err());
    }

    #[test]
    fn test_block_appearance_deterministic() {
        let seed = IslandSeed::new([4; SEED_OFFSETS], 0);
        let local = LocalColumn::new(12, 34);
        assert_eq!(seed.block_appearance(local, 2), seed.block_appearance(local, 2));
        let (appearance, _) = seed.block_appearance(local, 5);
        assert!(appearance < 100);
    }

    #[test]
    fn test_random_seed_round_trips() {
        let mut rng = fastrand::Rng::with_seed(9);
        let seed = IslandSeed::random(&mut rng, 4);
        assert!(seed.style() < 4);
        assert_eq!(seed.to_string().parse::<IslandSeed>(), Ok(seed));
    }
}
