//! Tile coordinate helpers.
//!
//! Provides the `TileCoord` value type plus the two pieces of coordinate
//! arithmetic the loading pipeline depends on: the overscaling factor used
//! when a request goes beyond the source's maximum zoom, and the row flip
//! between bottom-left-origin tile schemes and the top-left-origin layout
//! used by packaged tile stores.

use std::fmt;

/// A tile address in the `z/x/y` scheme the pipeline uses.
///
/// `x` grows eastward, `y` grows upward from the bottom edge (bottom-left
/// origin). Packaged stores key rows from the top-left instead; see
/// [`flip_row`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Zoom level.
    pub z: u8,
    /// Tile column.
    pub x: u32,
    /// Tile row.
    pub y: u32,
}

impl TileCoord {
    /// Create a new tile coordinate.
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Expand a URL template by substituting `{z}`, `{x}` and `{y}`.
    ///
    /// This is deliberately minimal. Scheme selection, endpoint rotation
    /// and access tokens are the caller's concern.
    pub fn url(&self, template: &str) -> String {
        template
            .replace("{z}", &self.z.to_string())
            .replace("{x}", &self.x.to_string())
            .replace("{y}", &self.y.to_string())
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Overscaling factor for a request at zoom `z` against a source capped at
/// `maxzoom`.
///
/// Returns 1 for `z <= maxzoom`, otherwise `2^(z - maxzoom)`. The result is
/// always a power of two >= 1. The exponent is clamped so that a degenerate
/// `maxzoom` (resolved metadata is not trusted) cannot overflow the shift.
#[inline]
pub fn overscaling(z: u8, maxzoom: u8) -> u32 {
    if z <= maxzoom {
        1
    } else {
        1u32 << u32::from(z - maxzoom).min(31)
    }
}

/// Flip a tile row between top-left-origin and bottom-left-origin schemes.
///
/// `flip_row(zoom, row) = 2^zoom - 1 - row`. The function is its own
/// inverse. `row` must be less than `2^zoom` and `zoom` at most 31; the
/// shift is clamped so out-of-contract zooms stay panic-free.
#[inline]
pub fn flip_row(zoom: u8, row: u32) -> u32 {
    (1u32 << u32::from(zoom).min(31)) - 1 - row
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_overscaling_at_or_below_maxzoom() {
        assert_eq!(overscaling(0, 14), 1);
        assert_eq!(overscaling(14, 14), 1);
    }

    #[test]
    fn test_overscaling_beyond_maxzoom() {
        assert_eq!(overscaling(15, 14), 2);
        assert_eq!(overscaling(16, 14), 4);
        assert_eq!(overscaling(22, 14), 256);
    }

    #[test]
    fn test_overscaling_degenerate_maxzoom_does_not_overflow() {
        // A resolved metadata document may report maxzoom 0; even absurd
        // zoom gaps must stay a power of two instead of panicking.
        assert_eq!(overscaling(22, 0), 1 << 22);
        let factor = overscaling(255, 0);
        assert!(factor.is_power_of_two());
        assert_eq!(factor, 1 << 31);
    }

    #[test]
    fn test_flip_row_maximum_zoom() {
        assert_eq!(flip_row(31, 0), u32::MAX / 2);
        assert_eq!(flip_row(31, flip_row(31, 7)), 7);
    }

    #[test]
    fn test_flip_row_known_values() {
        // At zoom 5 there are 32 rows, so row 10 flips to 21.
        assert_eq!(flip_row(5, 10), 21);
        assert_eq!(flip_row(5, 21), 10);
        assert_eq!(flip_row(0, 0), 0);
        assert_eq!(flip_row(1, 0), 1);
    }

    #[test]
    fn test_url_substitution() {
        let coord = TileCoord::new(14, 8192, 5461);
        assert_eq!(
            coord.url("https://tiles.example.com/{z}/{x}/{y}.mvt"),
            "https://tiles.example.com/14/8192/5461.mvt"
        );
    }

    #[test]
    fn test_url_plain_path_template() {
        let coord = TileCoord::new(5, 3, 10);
        assert_eq!(coord.url("{z}/{x}/{y}"), "5/3/10");
        assert_eq!(coord.to_string(), "5/3/10");
    }

    proptest! {
        #[test]
        fn prop_flip_row_self_inverse(zoom in 0u8..=22, row_seed in 0u32..u32::MAX) {
            let rows = 1u32 << zoom;
            let row = row_seed % rows;
            prop_assert_eq!(flip_row(zoom, flip_row(zoom, row)), row);
        }

        #[test]
        fn prop_overscaling_power_of_two(z in 0u8..=30, maxzoom in 0u8..=22) {
            // Only zoom levels a source can actually be asked for.
            prop_assume!(z <= maxzoom.saturating_add(8));
            let factor = overscaling(z, maxzoom);
            prop_assert!(factor >= 1);
            prop_assert!(factor.is_power_of_two());
            if z <= maxzoom {
                prop_assert_eq!(factor, 1);
            }
        }
    }
}
