//! Overlay configuration
//!
//! `GLHUD_CONFIG` names a JSON file. Anything wrong with it, missing file
//! included, downgrades to defaults with a warning: the host application
//! never pays for a bad overlay config. Parsed once at initialization and
//! read-only afterwards.

use log::{debug, warn};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

use crate::domain::{ConfigError, MetricKind};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "GLHUD_CONFIG";

/// Which metric kinds the HUD draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSet(u8);

impl MetricSet {
    #[must_use]
    pub fn all() -> Self {
        MetricKind::ALL.into_iter().collect()
    }

    #[must_use]
    pub fn empty() -> Self {
        MetricSet(0)
    }

    #[must_use]
    pub fn with(self, kind: MetricKind) -> Self {
        MetricSet(self.0 | Self::bit(kind))
    }

    #[must_use]
    pub fn without(self, kind: MetricKind) -> Self {
        MetricSet(self.0 & !Self::bit(kind))
    }

    #[must_use]
    pub fn contains(self, kind: MetricKind) -> bool {
        self.0 & Self::bit(kind) != 0
    }

    fn bit(kind: MetricKind) -> u8 {
        1 << kind.index()
    }
}

impl FromIterator<MetricKind> for MetricSet {
    fn from_iter<I: IntoIterator<Item = MetricKind>>(kinds: I) -> Self {
        kinds.into_iter().fold(Self::empty(), MetricSet::with)
    }
}

/// Parsed overlay parameters. Read-only after initialization; the hot
/// path never mutates these.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayParams {
    pub metrics: MetricSet,
    pub width: f32,
    pub height: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub font_size: f32,
}

impl Default for OverlayParams {
    fn default() -> Self {
        Self {
            metrics: MetricSet::all(),
            width: 280.0,
            height: 140.0,
            offset_x: 10.0,
            offset_y: 10.0,
            font_size: 24.0,
        }
    }
}

/// On-disk shape. Every field is optional so sparse files stay valid;
/// unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    metrics: Option<Vec<MetricKind>>,
    width: Option<f32>,
    height: Option<f32>,
    offset_x: Option<f32>,
    offset_y: Option<f32>,
    font_size: Option<f32>,
}

impl OverlayParams {
    /// Build params from the environment, falling back to defaults on any
    /// failure.
    #[must_use]
    pub fn from_env() -> Self {
        let Some(path) = env::var_os(CONFIG_ENV) else {
            return Self::default();
        };
        let path = Path::new(&path);
        match Self::from_file(path) {
            Ok(params) => {
                debug!("Loaded overlay config from {}", path.display());
                params
            }
            Err(e) => {
                warn!("Ignoring overlay config: {e}");
                Self::default()
            }
        }
    }

    /// Parse one JSON config file.
    ///
    /// # Errors
    /// Returns an error when the file is unreadable or not valid JSON.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        let file: ConfigFile = serde_json::from_str(&content)?;
        let defaults = Self::default();
        Ok(Self {
            metrics: file.metrics.map_or(defaults.metrics, |kinds| kinds.into_iter().collect()),
            width: file.width.unwrap_or(defaults.width),
            height: file.height.unwrap_or(defaults.height),
            offset_x: file.offset_x.unwrap_or(defaults.offset_x),
            offset_y: file.offset_y.unwrap_or(defaults.offset_y),
            font_size: file.font_size.unwrap_or(defaults.font_size),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_metric_set_operations() {
        let set = MetricSet::all();
        assert!(set.contains(MetricKind::Gpu));

        let set = set.without(MetricKind::Gpu);
        assert!(!set.contains(MetricKind::Gpu));
        assert!(set.contains(MetricKind::Cpu));

        let set = set.with(MetricKind::Gpu);
        assert_eq!(set, MetricSet::all());
    }

    #[test]
    fn test_defaults_enable_everything() {
        let params = OverlayParams::default();
        for kind in MetricKind::ALL {
            assert!(params.metrics.contains(kind));
        }
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_from_file_sparse_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "metrics": ["cpu", "io"], "font_size": 18.0 }}"#).unwrap();

        let params = OverlayParams::from_file(file.path()).unwrap();
        assert!(params.metrics.contains(MetricKind::Cpu));
        assert!(params.metrics.contains(MetricKind::Io));
        assert!(!params.metrics.contains(MetricKind::Gpu));
        assert!(!params.metrics.contains(MetricKind::Memory));
        assert_eq!(params.font_size, 18.0);
        // Unspecified fields keep their defaults
        assert_eq!(params.width, OverlayParams::default().width);
    }

    #[test]
    fn test_from_file_rejects_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "fps_target = 60").unwrap();
        assert!(OverlayParams::from_file(file.path()).is_err());
    }

    #[test]
    fn test_from_file_missing_path() {
        let err = OverlayParams::from_file(Path::new("/nonexistent/glhud.json"));
        assert!(matches!(err, Err(ConfigError::Unreadable { .. })));
    }
}
