use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::projection::{FULL_WIDTH_PCT, MIN_WIDTH_PCT};

/// Editor behaviour knobs, loadable from JSON.
///
/// # Example
/// ```
/// use trim_engine::EditorConfig;
///
/// let config = EditorConfig::from_json_str(r#"{ "export_first_clip_only": true }"#).unwrap();
/// assert!(config.export_first_clip_only);
/// assert_eq!(config.min_width_pct, 5.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Narrowest clip width, in percent of the track.
    pub min_width_pct: f64,
    /// Export only the first clip instead of every clip.
    pub export_first_clip_only: bool,
    /// Accept split commands while a drag is in progress.
    pub split_while_dragging: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            min_width_pct: MIN_WIDTH_PCT,
            export_first_clip_only: false,
            split_while_dragging: false,
        }
    }
}

impl EditorConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|source| EngineError::ConfigParse { path: None, source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&json).map_err(|source| EngineError::ConfigParse {
                path: Some(path.to_path_buf()),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.min_width_pct > 0.0 && self.min_width_pct <= FULL_WIDTH_PCT) {
            return Err(EngineError::InvalidConfig {
                reason: format!(
                    "min_width_pct must be in (0, 100], got {}",
                    self.min_width_pct
                ),
            });
        }
        Ok(())
    }
}
