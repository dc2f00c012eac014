//! Terrain styles.
//!
//! A style is a named rule set selected per island (or per cell in world-map
//! mode) that toggles water, snow, grass, and lava and sets mountain height.

use serde::{Deserialize, Serialize};

/// Largest mountain bonus a style may add to a column.
pub const MAX_MOUNTAIN_HEIGHT: u16 = 16;

/// Named terrain rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    /// Display name
    pub name: String,
    /// Low cells sink to level -1
    pub water: bool,
    /// Snow-capped variants allowed at the top height level
    pub snow: bool,
    /// Grass allowed on column tops
    pub grass: bool,
    /// Infertile cells turn to lava instead of mud
    pub lava: bool,
    /// Extra stack height added to mountain columns
    pub mountain_height: u16,
    /// Highest elevation level before the mountain bonus
    pub max_level: i8,
}

impl Style {
    fn preset(
        name: &str,
        water: bool,
        snow: bool,
        grass: bool,
        lava: bool,
        mountain_height: u16,
    ) -> Self {
        Self {
            name: name.to_string(),
            water,
            snow,
            grass,
            lava,
            mountain_height,
            max_level: 4,
        }
    }
}

/// Default style presets, indexed by the seed's style digit.
#[must_use]
pub fn default_styles() -> Vec<Style> {
    vec![
        Style::preset("temperate", true, true, true, false, 4),
        Style::preset("meadow", false, false, true, false, 3),
        Style::preset("volcanic", false, false, false, true, 6),
        Style::preset("tundra", true, true, false, false, 5),
    ]
}

/// Ordered list of configured styles.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleTable {
    styles: Vec<Style>,
}

impl StyleTable {
    /// Creates a table; an empty list falls back to the presets.
    #[must_use]
    pub fn new(styles: Vec<Style>) -> Self {
        if styles.is_empty() {
            return Self::default();
        }
        Self { styles }
    }

    /// Number of configured styles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// Whether the table is empty (never true once constructed).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Style for an index, wrapping out-of-range indices.
    #[must_use]
    pub fn get(&self, index: u8) -> &Style {
        &self.styles[usize::from(index) % self.styles.len()]
    }

    /// Normalizes a style index into the table range.
    #[must_use]
    pub fn normalize(&self, index: u8) -> u8 {
        (usize::from(index) % self.styles.len()) as u8
    }

    /// Picks a style from a world-map pixel.
    ///
    /// Channels are weighted into one value that is split into equal
    /// probability bands, one per configured style.
    #[must_use]
    pub fn from_world_map(&self, r: f32, g: f32, b: f32) -> u8 {
        let value = (0.5 * r + 0.3 * g + 0.2 * b).clamp(0.0, 1.0);
        let count = self.styles.len();
        ((value * count as f32) as usize).min(count - 1) as u8
    }
}

impl Default for StyleTable {
    fn default() -> Self {
        Self {
            styles: default_styles(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_wraps() {
        let table = StyleTable::default();
        assert_eq!(table.get(1).name, "meadow");
        assert_eq!(table.get(5).name, "meadow");
        assert_eq!(table.normalize(6), 2);
    }

    #[test]
    fn test_empty_table_uses_presets() {
        let table = StyleTable::new(Vec::new());
        assert_eq!(table.len(), default_styles().len());
    }

    #[test]
    fn test_world_map_bands() {
        let table = StyleTable::default();
        assert_eq!(table.from_world_map(0.0, 0.0, 0.0), 0);
        assert_eq!(table.from_world_map(1.0, 1.0, 1.0), 3);
        assert_eq!(table.from_world_map(0.6, 0.5, 0.0), 1);

        let single = StyleTable::new(vec![default_styles().remove(2)]);
        assert_eq!(single.from_world_map(1.0, 1.0, 1.0), 0);
    }
}
