use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Optional on-disk settings for the viewer. Every table and key may be
/// omitted; missing values fall back to the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ViewConfig {
    #[serde(default)]
    pub window: WindowSettings,
    #[serde(default)]
    pub assets: AssetPaths,
    #[serde(default)]
    pub filter: FilterSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowSettings {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Image Filter".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetPaths {
    pub image: Option<PathBuf>,
    pub vertex_shader: Option<PathBuf>,
    pub fragment_shader: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterSettings {
    pub min_radius: i32,
    pub max_radius: i32,
    pub initial_radius: i32,
    pub start_filtered: bool,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            min_radius: 1,
            max_radius: 5,
            initial_radius: 1,
            start_filtered: false,
        }
    }
}

/// Upper bound matching the kernel cap in the bundled fragment shader.
pub const MAX_SUPPORTED_RADIUS: i32 = 16;

impl ViewConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: ViewConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates a config file. Relative asset paths are resolved
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            config.assets.rebase(base);
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size {}x{} must be non-zero",
                self.window.width, self.window.height
            )));
        }

        let filter = &self.filter;
        if filter.min_radius < 1 {
            return Err(ConfigError::Invalid(format!(
                "filter.min_radius must be at least 1, got {}",
                filter.min_radius
            )));
        }
        if filter.max_radius < filter.min_radius {
            return Err(ConfigError::Invalid(format!(
                "filter.max_radius ({}) is below filter.min_radius ({})",
                filter.max_radius, filter.min_radius
            )));
        }
        if filter.max_radius > MAX_SUPPORTED_RADIUS {
            return Err(ConfigError::Invalid(format!(
                "filter.max_radius ({}) exceeds the supported maximum of {MAX_SUPPORTED_RADIUS}",
                filter.max_radius
            )));
        }
        if !(filter.min_radius..=filter.max_radius).contains(&filter.initial_radius) {
            return Err(ConfigError::Invalid(format!(
                "filter.initial_radius ({}) is outside [{}, {}]",
                filter.initial_radius, filter.min_radius, filter.max_radius
            )));
        }
        Ok(())
    }
}

impl AssetPaths {
    fn rebase(&mut self, base: &Path) {
        for path in [
            &mut self.image,
            &mut self.vertex_shader,
            &mut self.fragment_shader,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[window]
width = 800
height = 600
title = "Blur Preview"

[assets]
image = "photos/cat.png"
fragment_shader = "/opt/shaders/custom.frag"

[filter]
max_radius = 8
initial_radius = 3
start_filtered = true
"#;

    #[test]
    fn parses_sample_config() {
        let config = ViewConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.title, "Blur Preview");
        assert_eq!(config.assets.image.as_deref(), Some(Path::new("photos/cat.png")));
        assert_eq!(config.assets.vertex_shader, None);
        assert_eq!(config.filter.min_radius, 1);
        assert_eq!(config.filter.max_radius, 8);
        assert!(config.filter.start_filtered);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = ViewConfig::from_toml_str("").expect("parse config");
        assert_eq!(config, ViewConfig::default());
        assert_eq!((config.window.width, config.window.height), (1280, 720));
        assert_eq!((config.filter.min_radius, config.filter.max_radius), (1, 5));
    }

    #[test]
    fn rejects_inverted_radius_bounds() {
        let err = ViewConfig::from_toml_str("[filter]\nmin_radius = 4\nmax_radius = 2\ninitial_radius = 3\n")
            .expect_err("inverted bounds");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_initial_radius_out_of_range() {
        let err = ViewConfig::from_toml_str("[filter]\ninitial_radius = 9\n")
            .expect_err("out of range");
        assert!(err.to_string().contains("initial_radius"));
    }

    #[test]
    fn rejects_radius_beyond_shader_cap() {
        let err = ViewConfig::from_toml_str("[filter]\nmax_radius = 40\n").expect_err("too large");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_window() {
        let err = ViewConfig::from_toml_str("[window]\nwidth = 0\n").expect_err("zero width");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = ViewConfig::from_toml_str("[filter]\nsigma = 2.0\n").expect_err("unknown key");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_rebases_relative_assets() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("viewer.toml");
        std::fs::write(&path, SAMPLE).expect("write config");

        let config = ViewConfig::load(&path).expect("load config");
        assert_eq!(
            config.assets.image.as_deref(),
            Some(dir.path().join("photos/cat.png").as_path())
        );
        assert_eq!(
            config.assets.fragment_shader.as_deref(),
            Some(Path::new("/opt/shaders/custom.frag"))
        );
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = ViewConfig::load(&dir.path().join("absent.toml")).expect_err("missing");
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("absent.toml"));
    }
}
