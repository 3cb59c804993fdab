//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `asset-resolver.toml`. Stock
//! defaults are the base layer; a user file only needs the keys it wants to
//! change and is deep-merged on top.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! inline_threshold = 8192    # Images strictly smaller than this are inlined
//! fingerprint_length = 10    # Hex digits of the content hash in script/style names
//! asset_hash_length = 8      # Hex digits of the content hash in image/font names
//!
//! [split]
//! chunks = "all"             # Which chunks the downstream splitter considers
//! min_size = 500000          # Passed through to the splitter unchanged
//! max_size = 1000000
//!
//! [output]
//! images_dir = "images"
//! fonts_dir = "fonts"
//! manifest = "asset-manifest.json"
//!
//! [resolve]
//! extensions = [".js", ".jsx", ".json", ".ts", ".tsx"]
//!
//! [resolve.alias]
//! "@" = "src"
//!
//! [resolve.fallback]
//! crypto = "crypto-browserify"
//! fs = false                 # Resolve to an empty module
//!
//! [define]
//! API_URL = "\"/api\""       # Extra compile-time constants
//!
//! [steps.sass]               # Options merged over a step's built-in options
//! sassOptions = { javaScriptEnabled = false }
//!
//! [processing]
//! max_processes = 4          # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::rules::STEP_IDS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file looked up in the project root.
pub const CONFIG_FILENAME: &str = "asset-resolver.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `asset-resolver.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Byte size below which an image is embedded as a data URI.
    pub inline_threshold: u64,
    /// Fingerprint length for script and style filenames.
    pub fingerprint_length: usize,
    /// Fingerprint length for image and font filenames.
    pub asset_hash_length: usize,
    /// Chunk size bounds handed to the downstream splitter.
    pub split: SplitConfig,
    /// Output directory layout.
    pub output: OutputConfig,
    /// Import specifier resolution settings.
    pub resolve: ResolveConfig,
    /// Extra compile-time constants. `NODE_ENV` is always set from the mode.
    pub define: BTreeMap<String, String>,
    /// Per-step option overrides, keyed by step id.
    pub steps: BTreeMap<String, toml::Table>,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inline_threshold: 8 * 1024,
            fingerprint_length: 10,
            asset_hash_length: 8,
            split: SplitConfig::default(),
            output: OutputConfig::default(),
            resolve: ResolveConfig::default(),
            define: BTreeMap::new(),
            steps: BTreeMap::new(),
            processing: ProcessingConfig::default(),
        }
    }
}

/// SHA-256 hex digests are 64 characters; fingerprints are a prefix.
const MAX_FINGERPRINT: usize = 64;

/// Step options the output planner derives from top-level settings, paired
/// with the setting to change instead.
const PLANNER_OWNED_OPTIONS: &[(&str, &str)] = &[
    ("dataUrlCondition", "inline_threshold"),
    ("filename", "fingerprint_length, asset_hash_length or [output]"),
    ("chunkFilename", "fingerprint_length"),
];

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_FINGERPRINT).contains(&self.fingerprint_length) {
            return Err(ConfigError::Validation(format!(
                "fingerprint_length must be 1-{MAX_FINGERPRINT}"
            )));
        }
        if !(1..=MAX_FINGERPRINT).contains(&self.asset_hash_length) {
            return Err(ConfigError::Validation(format!(
                "asset_hash_length must be 1-{MAX_FINGERPRINT}"
            )));
        }
        if self.split.max_size == 0 {
            return Err(ConfigError::Validation(
                "split.max_size must be non-zero".into(),
            ));
        }
        if self.split.min_size > self.split.max_size {
            return Err(ConfigError::Validation(
                "split.min_size must not exceed split.max_size".into(),
            ));
        }
        if self.output.images_dir.is_empty() || self.output.fonts_dir.is_empty() {
            return Err(ConfigError::Validation(
                "output.images_dir and output.fonts_dir must not be empty".into(),
            ));
        }
        if let Some(ext) = self.resolve.extensions.iter().find(|e| !e.starts_with('.')) {
            return Err(ConfigError::Validation(format!(
                "resolve.extensions entries must start with '.': {ext}"
            )));
        }
        if let Some((name, _)) = self
            .resolve
            .fallback
            .iter()
            .find(|(_, f)| matches!(f, Fallback::Disabled(true)))
        {
            return Err(ConfigError::Validation(format!(
                "resolve.fallback.{name} must be a module name or false"
            )));
        }
        if let Some(id) = self.steps.keys().find(|id| !STEP_IDS.contains(&id.as_str())) {
            return Err(ConfigError::Validation(format!(
                "unknown step '{id}' in [steps] (known: {})",
                STEP_IDS.join(", ")
            )));
        }
        for (id, options) in &self.steps {
            if let Some((key, owner)) = PLANNER_OWNED_OPTIONS
                .iter()
                .find(|(key, _)| options.contains_key(*key))
            {
                return Err(ConfigError::Validation(format!(
                    "steps.{id}.{key} is derived from {owner}; set that instead"
                )));
            }
        }
        Ok(())
    }
}

/// Which chunks the downstream splitter may split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkScope {
    All,
    Async,
    Initial,
}

/// Chunk size bounds. Not interpreted here, only carried to the splitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SplitConfig {
    pub chunks: ChunkScope,
    pub min_size: u64,
    pub max_size: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            chunks: ChunkScope::All,
            min_size: 500_000,
            max_size: 1_000_000,
        }
    }
}

/// Output directory layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory (relative to the output root) for emitted images.
    pub images_dir: String,
    /// Directory (relative to the output root) for emitted fonts.
    pub fonts_dir: String,
    /// Filename of the asset manifest written by `build`.
    pub manifest: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            images_dir: "images".to_string(),
            fonts_dir: "fonts".to_string(),
            manifest: "asset-manifest.json".to_string(),
        }
    }
}

/// Replacement for a builtin module that has no browser implementation.
///
/// In TOML a fallback is either a module name (`crypto = "crypto-browserify"`)
/// or `false` to resolve the import to an empty module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fallback {
    Module(String),
    Disabled(bool),
}

/// Import specifier resolution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolveConfig {
    /// Extensions tried, in order, for specifiers written without one.
    pub extensions: Vec<String>,
    /// Specifier prefix → directory relative to the project root.
    pub alias: BTreeMap<String, String>,
    /// Builtin module name → browser replacement.
    pub fallback: BTreeMap<String, Fallback>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        let fallback = [
            ("crypto", Fallback::Module("crypto-browserify".into())),
            ("url", Fallback::Module("url".into())),
            ("buffer", Fallback::Module("buffer".into())),
            ("stream", Fallback::Module("stream-browserify".into())),
            ("fs", Fallback::Disabled(false)),
            ("path", Fallback::Module("path-browserify".into())),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self {
            extensions: [".js", ".jsx", ".json", ".ts", ".tsx"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            alias: BTreeMap::from([("@".to_string(), "src".to_string())]),
            fallback,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel resolve/plan workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(PipelineConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_file(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PipelineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `asset-resolver.toml` from a project root.
///
/// A missing file is not an error: the stock defaults are returned.
pub fn load_config(root: &Path) -> Result<PipelineConfig, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    let overlay = if config_path.exists() {
        Some(load_raw_file(&config_path)?)
    } else {
        None
    };
    resolve_config(stock_defaults_value(), overlay)
}

/// Load an explicitly named config file. The file must exist.
pub fn load_config_file(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let overlay = load_raw_file(path)?;
    resolve_config(stock_defaults_value(), Some(overlay))
}

/// Returns a fully-commented stock config file with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# asset-resolver configuration
# ============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Images strictly smaller than this many bytes are embedded as data URIs
# instead of being emitted as files. Fonts are never inlined.
inline_threshold = 8192

# Hex digits of the content hash in production script and style filenames.
fingerprint_length = 10

# Hex digits of the content hash in image and font filenames.
asset_hash_length = 8

# ---------------------------------------------------------------------------
# Chunk splitting (passed through to the downstream splitter unchanged)
# ---------------------------------------------------------------------------
[split]
# One of "all", "async", "initial".
chunks = "all"
min_size = 500000
max_size = 1000000

# ---------------------------------------------------------------------------
# Output layout
# ---------------------------------------------------------------------------
[output]
images_dir = "images"
fonts_dir = "fonts"
manifest = "asset-manifest.json"

# ---------------------------------------------------------------------------
# Import specifier resolution
# ---------------------------------------------------------------------------
[resolve]
# Tried in order when an import omits its extension.
extensions = [".js", ".jsx", ".json", ".ts", ".tsx"]

# Specifier prefix -> directory relative to the project root.
[resolve.alias]
"@" = "src"

# Builtin modules with no browser implementation.
# A string names the replacement package; false resolves to an empty module.
[resolve.fallback]
buffer = "buffer"
crypto = "crypto-browserify"
fs = false
path = "path-browserify"
stream = "stream-browserify"
url = "url"

# ---------------------------------------------------------------------------
# Compile-time constants (NODE_ENV is always derived from the mode)
# ---------------------------------------------------------------------------
[define]
# API_URL = "\"/api\""

# ---------------------------------------------------------------------------
# Step option overrides, merged over the built-in options of each step.
# Known steps: vue, babel, react-refresh, postcss, css, style, extract,
# sass, less, asset, asset-resource
# dataUrlCondition, filename and chunkFilename come from the settings
# above and cannot be overridden here.
# ---------------------------------------------------------------------------
[steps]
# [steps.sass]
# sassOptions = { javaScriptEnabled = false }

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.inline_threshold, 8192);
        assert_eq!(config.fingerprint_length, 10);
        assert_eq!(config.asset_hash_length, 8);
        assert_eq!(config.split.min_size, 500_000);
        assert_eq!(config.split.max_size, 1_000_000);
        assert_eq!(config.split.chunks, ChunkScope::All);
        assert_eq!(config.output.images_dir, "images");
        assert_eq!(config.output.fonts_dir, "fonts");
    }

    #[test]
    fn default_resolve_settings() {
        let resolve = ResolveConfig::default();
        assert_eq!(
            resolve.extensions,
            vec![".js", ".jsx", ".json", ".ts", ".tsx"]
        );
        assert_eq!(resolve.alias["@"], "src");
        assert_eq!(
            resolve.fallback["crypto"],
            Fallback::Module("crypto-browserify".into())
        );
        assert_eq!(resolve.fallback["fs"], Fallback::Disabled(false));
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
inline_threshold = 4096

[split]
max_size = 2000000
"#;
        let config: PipelineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.inline_threshold, 4096);
        assert_eq!(config.split.max_size, 2_000_000);
        // Defaults preserved
        assert_eq!(config.split.min_size, 500_000);
        assert_eq!(config.fingerprint_length, 10);
    }

    #[test]
    fn parse_step_overrides() {
        let toml = r#"
[steps.sass]
sassOptions = { javaScriptEnabled = false }
"#;
        let config: PipelineConfig = toml::from_str(toml).unwrap();
        let sass = &config.steps["sass"];
        assert_eq!(
            sass["sassOptions"]["javaScriptEnabled"].as_bool(),
            Some(false)
        );
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
fingerprint_length = 12

[resolve.alias]
"~" = "lib"
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.fingerprint_length, 12);
        // Alias tables merge: the stock "@" survives next to the new "~"
        assert_eq!(config.resolve.alias["~"], "lib");
        assert_eq!(config.resolve.alias["@"], "src");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "not valid toml [[[").unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_file_missing_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config_file(&tmp.path().join("nope.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
[split]
min_size = 10
max_size = 5
"#,
        )
        .unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<PipelineConfig, _> = toml::from_str("inline_treshold = 10");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_nested_key_rejected() {
        let toml_str = r#"
[output]
image_dir = "img"
"#;
        let result: Result<PipelineConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_fingerprint_bounds() {
        let mut config = PipelineConfig::default();
        config.fingerprint_length = 0;
        assert!(config.validate().is_err());
        config.fingerprint_length = 64;
        assert!(config.validate().is_ok());
        config.fingerprint_length = 65;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_asset_hash_bounds() {
        let mut config = PipelineConfig::default();
        config.asset_hash_length = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("asset_hash_length"));
    }

    #[test]
    fn validate_extension_needs_dot() {
        let mut config = PipelineConfig::default();
        config.resolve.extensions.push("vue".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_fallback_true_rejected() {
        let mut config = PipelineConfig::default();
        config
            .resolve
            .fallback
            .insert("os".into(), Fallback::Disabled(true));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("resolve.fallback.os"));
    }

    #[test]
    fn validate_unknown_step_rejected() {
        let mut config = PipelineConfig::default();
        config.steps.insert("stylus".into(), toml::Table::new());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("stylus"));
    }

    #[test]
    fn validate_rejects_planner_owned_options() {
        let overrides: toml::Table = toml::from_str(
            r#"
            [asset]
            dataUrlCondition = { maxSize = 100 }

            [extract]
            filename = "css/[name].css"
            "#,
        )
        .unwrap();
        let config = PipelineConfig {
            steps: overrides
                .into_iter()
                .map(|(k, v)| (k, v.as_table().unwrap().clone()))
                .collect(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("steps.asset.dataUrlCondition"), "{err}");
        assert!(err.contains("inline_threshold"), "{err}");

        let mut config = PipelineConfig::default();
        let mut extract = toml::Table::new();
        extract.insert("chunkFilename".into(), "x.css".into());
        config.steps.insert("extract".into(), extract);
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("steps.extract.chunkFilename"), "{err}");
    }

    #[test]
    fn load_config_rejects_asset_inline_override() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[steps.asset]\ndataUrlCondition = { maxSize = 100 }\n",
        )
        .unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn unrelated_step_options_still_allowed() {
        let mut config = PipelineConfig::default();
        let mut asset = toml::Table::new();
        asset.insert("generator".into(), toml::Value::Table(toml::Table::new()));
        config.steps.insert("asset".into(), asset);
        assert!(config.validate().is_ok());
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[split]
min_size = 1
max_size = 2
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str("[split]\nmax_size = 9").unwrap();
        let merged = merge_toml(base, overlay);
        let split = merged.get("split").unwrap();
        assert_eq!(split.get("max_size").unwrap().as_integer(), Some(9));
        assert_eq!(split.get("min_size").unwrap().as_integer(), Some(1));
    }

    #[test]
    fn merge_toml_array_replaced_not_appended() {
        let base: toml::Value = toml::from_str(r#"extensions = [".js", ".ts"]"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"extensions = [".mjs"]"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("extensions").unwrap().as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // Processing config tests
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_zero_means_one() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: PipelineConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        for section in ["split", "output", "resolve", "processing"] {
            assert!(val.get(section).is_some(), "missing [{section}]");
        }
    }
}
