use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "frax.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FractalKind {
    #[default]
    Julia,
    Mandelbrot,
}

impl fmt::Display for FractalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FractalKind::Julia => f.write_str("julia"),
            FractalKind::Mandelbrot => f.write_str("mandelbrot"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FraxConfig {
    pub version: u32,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub shaders: ShaderSection,
    #[serde(default)]
    pub view: ViewSection,
    #[serde(default)]
    pub textures: BTreeMap<String, TextureEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowSection {
    #[serde(default = "default_extent")]
    pub width: u32,
    #[serde(default = "default_extent")]
    pub height: u32,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_true")]
    pub vsync: bool,
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            width: default_extent(),
            height: default_extent(),
            title: default_title(),
            vsync: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ShaderSection {
    pub vertex: Option<PathBuf>,
    pub fragment: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ViewSection {
    #[serde(default = "default_iterations")]
    pub max_iterations: i32,
    #[serde(default)]
    pub julia: [f64; 2],
    #[serde(default)]
    pub mode: FractalKind,
}

impl Default for ViewSection {
    fn default() -> Self {
        Self {
            max_iterations: default_iterations(),
            julia: [0.0, 0.0],
            mode: FractalKind::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TextureEntry {
    pub path: PathBuf,
    /// Sampler uniform; the table name is used when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniform: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// A texture entry with its uniform name filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTexture {
    pub name: String,
    pub path: PathBuf,
    pub uniform: String,
    pub required: bool,
}

fn default_extent() -> u32 {
    600
}

fn default_title() -> String {
    "FraX".to_string()
}

fn default_true() -> bool {
    true
}

fn default_iterations() -> i32 {
    10
}

impl Default for FraxConfig {
    fn default() -> Self {
        Self {
            version: 1,
            window: WindowSection::default(),
            shaders: ShaderSection::default(),
            view: ViewSection::default(),
            textures: BTreeMap::new(),
        }
    }
}

impl FraxConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: FraxConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates `path`, resolving relative paths inside it against
    /// the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&input)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Joins every relative shader and texture path onto `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        if let Some(vertex) = self.shaders.vertex.as_mut() {
            resolve(vertex);
        }
        if let Some(fragment) = self.shaders.fragment.as_mut() {
            resolve(fragment);
        }
        for entry in self.textures.values_mut() {
            resolve(&mut entry.path);
        }
    }

    /// Textures in name order with default uniform names applied.
    pub fn resolved_textures(&self) -> Vec<ResolvedTexture> {
        self.textures
            .iter()
            .map(|(name, entry)| ResolvedTexture {
                name: name.clone(),
                path: entry.path.clone(),
                uniform: entry.uniform.clone().unwrap_or_else(|| name.clone()),
                required: entry.required,
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }

        if self.view.max_iterations <= 0 {
            return Err(ConfigError::Invalid(format!(
                "view.max_iterations must be > 0, got {}",
                self.view.max_iterations
            )));
        }

        if self.view.julia.iter().any(|value| !value.is_finite()) {
            return Err(ConfigError::Invalid(
                "view.julia must contain finite numbers".into(),
            ));
        }

        for (name, entry) in &self.textures {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("texture name may not be empty".into()));
            }

            if entry.path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "texture '{name}' must have a path"
                )));
            }

            if let Some(uniform) = &entry.uniform {
                if uniform.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "texture '{name}' has an empty uniform name"
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[window]
width = 800
height = 500
title = "Julia explorer"
vsync = false

[shaders]
fragment = "shaders/custom.frag"

[view]
max_iterations = 64
julia = [-0.8, 0.156]
mode = "mandelbrot"

[textures.palette]
path = "palette.png"
required = true

[textures.detail]
path = "/abs/detail.png"
uniform = "detail_map"
"#;

    #[test]
    fn parses_sample_config() {
        let config = FraxConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.window.width, 800);
        assert!(!config.window.vsync);
        assert_eq!(config.view.max_iterations, 64);
        assert_eq!(config.view.mode, FractalKind::Mandelbrot);
        assert_eq!(config.view.julia, [-0.8, 0.156]);
        assert!(config.shaders.vertex.is_none());

        let textures = config.resolved_textures();
        assert_eq!(textures.len(), 2);
        assert_eq!(textures[0].name, "detail");
        assert_eq!(textures[0].uniform, "detail_map");
        assert_eq!(textures[1].uniform, "palette");
        assert!(textures[1].required);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = FraxConfig::from_toml_str("version = 1").expect("parse config");
        assert_eq!((config.window.width, config.window.height), (600, 600));
        assert_eq!(config.window.title, "FraX");
        assert!(config.window.vsync);
        assert_eq!(config.view.max_iterations, 10);
        assert_eq!(config.view.mode, FractalKind::Julia);
        assert!(config.textures.is_empty());
    }

    #[test]
    fn rejects_unsupported_version() {
        let err = FraxConfig::from_toml_str("version = 2").unwrap_err();
        assert!(err.to_string().contains("unsupported config version 2"));
    }

    #[test]
    fn rejects_zero_window_size_and_iterations() {
        let zero = "version = 1\n[window]\nwidth = 0\n";
        assert!(matches!(
            FraxConfig::from_toml_str(zero),
            Err(ConfigError::Invalid(_))
        ));

        let iterations = "version = 1\n[view]\nmax_iterations = 0\n";
        let err = FraxConfig::from_toml_str(iterations).unwrap_err();
        assert!(err.to_string().contains("max_iterations"));
    }

    #[test]
    fn rejects_empty_texture_paths() {
        let config = "version = 1\n[textures.palette]\npath = \"\"\n";
        let err = FraxConfig::from_toml_str(config).unwrap_err();
        assert!(err.to_string().contains("texture 'palette' must have a path"));
    }

    #[test]
    fn rejects_unknown_modes() {
        let config = "version = 1\n[view]\nmode = \"burning-ship\"\n";
        assert!(matches!(
            FraxConfig::from_toml_str(config),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_resolves_relative_paths_against_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, SAMPLE).unwrap();

        let config = FraxConfig::load(&path).expect("load config");

        assert_eq!(
            config.shaders.fragment.as_deref(),
            Some(dir.path().join("shaders/custom.frag").as_path())
        );
        assert_eq!(config.textures["palette"].path, dir.path().join("palette.png"));
        assert_eq!(config.textures["detail"].path, PathBuf::from("/abs/detail.png"));
    }

    #[test]
    fn load_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = FraxConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("absent.toml"));
    }
}
