use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::export::filename::DEFAULT_SUFFIX;
use crate::split_lines::SplitLineRegistry;

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "pdfbands";

const MAX_PRESET_PARTS: usize = SplitLineRegistry::MAX_PRESET_PARTS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Number of equal bands applied when a document is loaded
    #[serde(default = "default_preset")]
    pub default_preset: usize,

    /// Preview pixels per PDF point
    #[serde(default = "default_preview_scale")]
    pub preview_scale: f64,

    /// Appended to the source base name for the output file
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_preset() -> usize {
    3
}

fn default_preview_scale() -> f64 {
    1.5
}

fn default_output_suffix() -> String {
    DEFAULT_SUFFIX.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            default_preset: default_preset(),
            preview_scale: default_preview_scale(),
            output_suffix: default_output_suffix(),
        }
    }
}

impl Settings {
    /// Replace out-of-range values with defaults
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        if self.default_preset == 0 || self.default_preset > MAX_PRESET_PARTS {
            warn!(
                "default_preset {} out of range 1..={MAX_PRESET_PARTS}, using {}",
                self.default_preset,
                default_preset()
            );
            self.default_preset = default_preset();
        }
        if !self.preview_scale.is_finite() || self.preview_scale <= 0.0 {
            warn!(
                "preview_scale {} must be positive, using {}",
                self.preview_scale,
                default_preview_scale()
            );
            self.preview_scale = default_preview_scale();
        }
        if self.output_suffix.contains(['/', '\\']) {
            warn!(
                "output_suffix {:?} contains a path separator, using {:?}",
                self.output_suffix, DEFAULT_SUFFIX
            );
            self.output_suffix = default_output_suffix();
        }
        self
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        let mut settings: Settings = serde_yaml::from_str(content)?;
        if settings.version < CURRENT_VERSION {
            migrate_settings(&mut settings);
        }
        Ok(settings.sanitized())
    }
}

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from `path`, or from the default location when `None`.
///
/// A missing file at the default location is created with defaults. Any read
/// or parse problem is logged and yields the defaults.
#[must_use]
pub fn load_settings(path: Option<&Path>) -> Settings {
    let explicit = path.is_some();
    let Some(path) = path.map(Path::to_path_buf).or_else(preferred_config_path) else {
        warn!("Could not determine config directory, using default settings");
        return Settings::default();
    };

    if !path.exists() {
        if explicit {
            warn!("Settings file {path:?} not found, using defaults");
        } else {
            info!("Settings file not found, creating with defaults at {path:?}");
            save_settings_to_file(&Settings::default(), &path);
        }
        return Settings::default();
    }

    load_settings_from_path(&path)
}

fn load_settings_from_path(path: &Path) -> Settings {
    match fs::read_to_string(path) {
        Ok(content) => match Settings::from_yaml(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {path:?}");
                settings
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
                Settings::default()
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
            Settings::default()
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.version = CURRENT_VERSION;
}

pub fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    match fs::write(path, generate_settings_yaml(settings)) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str(SETTINGS_HEADER);
    content.push_str(&format!("version: {}\n", settings.version));
    content.push_str(&format!(
        "# Equal bands applied when a document is opened (1-{MAX_PRESET_PARTS})\n"
    ));
    content.push_str(&format!("default_preset: {}\n", settings.default_preset));
    content.push_str("# Preview pixels per PDF point\n");
    content.push_str(&format!("preview_scale: {}\n", settings.preview_scale));
    content.push_str("# Output is named {input name}{suffix}.pdf\n");
    content.push_str(&format!("output_suffix: \"{}\"\n", settings.output_suffix));

    content
}

const SETTINGS_HEADER: &str = r#"# ============================================================================
# pdfbands settings
# ============================================================================
"#;
