//! Source configuration and view state types.

use serde::Deserialize;

use crate::error::SourceError;

/// The only tile size vector sources support.
pub const REQUIRED_TILE_SIZE: u32 = 512;

/// Default minimum zoom before metadata resolves.
pub const DEFAULT_MINZOOM: u8 = 0;

/// Default maximum zoom before metadata resolves.
pub const DEFAULT_MAXZOOM: u8 = 22;

/// Static configuration for a vector tile source.
///
/// Immutable after construction. `url` is either a metadata document
/// locator (remote sources) or absent (offline packaged sources).
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Tile URL template, `{z}/{x}/{y}` substituted per request. Absent for
    /// sources served from an offline store.
    pub url: Option<String>,
    /// Nominal tile size. Must be [`REQUIRED_TILE_SIZE`].
    pub tile_size: u32,
    /// Minimum zoom served by the source.
    pub minzoom: u8,
    /// Maximum zoom served by the source; requests beyond it overscale.
    pub maxzoom: u8,
    /// Whether overscaled tiles are re-parsed at the requested zoom.
    pub reparse_overscaled: bool,
    /// Whether tile geometry is clipped to tile boundaries.
    pub is_tile_clipped: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: None,
            tile_size: REQUIRED_TILE_SIZE,
            minzoom: DEFAULT_MINZOOM,
            maxzoom: DEFAULT_MAXZOOM,
            reparse_overscaled: true,
            is_tile_clipped: true,
        }
    }
}

impl SourceConfig {
    /// Validate the configuration.
    ///
    /// Fails synchronously for any tile size other than 512; construction
    /// must leave no partial state behind.
    pub fn validate(&self) -> Result<(), SourceError> {
        if self.tile_size != REQUIRED_TILE_SIZE {
            return Err(SourceError::Configuration(format!(
                "vector tile sources must have a tileSize of {}, got {}",
                REQUIRED_TILE_SIZE, self.tile_size
            )));
        }
        Ok(())
    }
}

/// View state bound to a source, carried into every dispatch request.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewContext {
    /// Map bearing in radians.
    pub angle: f64,
    /// Map pitch in degrees.
    pub pitch: f64,
    /// Whether collision debugging is enabled.
    pub collision_debug: bool,
}

/// Camera state forwarded to the retention structure on update.
///
/// Projection math is external; this is just the handful of fields the
/// retention structure needs to decide which tiles are wanted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    /// Current zoom level (fractional).
    pub zoom: f64,
    /// Map center as (longitude, latitude).
    pub center: (f64, f64),
    /// Map bearing in radians.
    pub angle: f64,
    /// Map pitch in degrees.
    pub pitch: f64,
}

/// Resolved source metadata (TileJSON-style document).
///
/// Populated asynchronously after construction; until then the adapter
/// serves the configured zoom bounds.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SourceMetadata {
    /// Minimum zoom served.
    #[serde(default)]
    pub minzoom: u8,
    /// Maximum zoom served.
    #[serde(default = "default_maxzoom")]
    pub maxzoom: u8,
    /// Tile URL templates. Empty for offline sources.
    #[serde(default)]
    pub tiles: Vec<String>,
}

fn default_maxzoom() -> u8 {
    DEFAULT_MAXZOOM
}

impl SourceMetadata {
    /// Parse a TileJSON document.
    pub fn from_tilejson(doc: &str) -> Result<Self, SourceError> {
        serde_json::from_str(doc)
            .map_err(|e| SourceError::Configuration(format!("invalid TileJSON: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SourceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tile_size, 512);
        assert_eq!(config.maxzoom, 22);
        assert!(config.reparse_overscaled);
        assert!(config.is_tile_clipped);
    }

    #[test]
    fn test_validate_rejects_other_tile_sizes() {
        for tile_size in [0, 256, 511, 1024] {
            let config = SourceConfig {
                tile_size,
                ..SourceConfig::default()
            };
            let err = config.validate().unwrap_err();
            assert!(matches!(err, SourceError::Configuration(_)));
        }
    }

    #[test]
    fn test_metadata_from_tilejson() {
        let doc = r#"{
            "tilejson": "2.2.0",
            "minzoom": 4,
            "maxzoom": 14,
            "tiles": ["https://tiles.example.com/{z}/{x}/{y}.mvt"]
        }"#;
        let metadata = SourceMetadata::from_tilejson(doc).unwrap();
        assert_eq!(metadata.minzoom, 4);
        assert_eq!(metadata.maxzoom, 14);
        assert_eq!(metadata.tiles.len(), 1);
    }

    #[test]
    fn test_metadata_defaults() {
        let metadata = SourceMetadata::from_tilejson("{}").unwrap();
        assert_eq!(metadata.minzoom, 0);
        assert_eq!(metadata.maxzoom, DEFAULT_MAXZOOM);
        assert!(metadata.tiles.is_empty());
    }

    #[test]
    fn test_metadata_rejects_malformed_document() {
        let err = SourceMetadata::from_tilejson("not json").unwrap_err();
        assert!(matches!(err, SourceError::Configuration(_)));
    }
}
