//! Build mode and the flags derived from it.
//!
//! The mode signal arrives once, at startup, from whatever drives the build
//! (a CLI flag or the `ASSET_MODE` environment variable). It is parsed into a
//! [`ModeContext`] and every derived flag is computed right there. After that
//! nothing reads the signal again: the rule table, the resolver and the
//! planner all branch on fields of the context they were handed.
//!
//! | Flag | development | production | none |
//! |------|-------------|------------|------|
//! | `minify` | no | yes | no |
//! | `extract_styles` | no | yes | no |
//! | `content_hash` | no | yes | no |
//! | `hot_reload` | yes | no | no |
//! | `source_map` | `cheap-module` | `hidden` | none |
//! | `public_path` | `/` | `./` | `./` |

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Environment variable consulted when no `--mode` flag is given.
pub const MODE_ENV_VAR: &str = "ASSET_MODE";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ModeError {
    #[error("unrecognized build mode '{0}' (expected development, production or none)")]
    Ambiguous(String),
}

/// The three build modes a bundler recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    Production,
    None,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
            Mode::None => "none",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which flavour of source map the build emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceMapVariant {
    /// Line-level maps that still point into the original module source.
    #[serde(rename = "cheap-module-source-map")]
    CheapModule,
    /// Full maps written to disk but not referenced from the bundle.
    #[serde(rename = "hidden-source-map")]
    Hidden,
    #[serde(rename = "none")]
    None,
}

impl SourceMapVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceMapVariant::CheapModule => "cheap-module-source-map",
            SourceMapVariant::Hidden => "hidden-source-map",
            SourceMapVariant::None => "none",
        }
    }
}

/// Process-wide, read-only build mode with all derived flags.
///
/// Construct it once with [`ModeContext::from_signal`] or [`ModeContext::new`]
/// and share it by reference. Fields are private so the flags can never drift
/// from the mode they were derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeContext {
    mode: Mode,
    minify: bool,
    extract_styles: bool,
    content_hash: bool,
    hot_reload: bool,
    source_map: SourceMapVariant,
    public_path: &'static str,
}

impl ModeContext {
    pub fn new(mode: Mode) -> Self {
        let production = mode == Mode::Production;
        let development = mode == Mode::Development;
        let source_map = match mode {
            Mode::Development => SourceMapVariant::CheapModule,
            Mode::Production => SourceMapVariant::Hidden,
            Mode::None => SourceMapVariant::None,
        };
        Self {
            mode,
            minify: production,
            extract_styles: production,
            content_hash: production,
            hot_reload: development,
            source_map,
            public_path: if development { "/" } else { "./" },
        }
    }

    /// Parse the external mode signal.
    ///
    /// `None` (signal unset) and the empty string both mean [`Mode::None`].
    /// Matching is exact: `Production` or `prod` are rejected rather than
    /// guessed at.
    pub fn from_signal(signal: Option<&str>) -> Result<Self, ModeError> {
        let mode = match signal {
            None | Some("") | Some("none") => Mode::None,
            Some("development") => Mode::Development,
            Some("production") => Mode::Production,
            Some(other) => return Err(ModeError::Ambiguous(other.to_string())),
        };
        Ok(Self::new(mode))
    }

    /// Read the signal from [`MODE_ENV_VAR`].
    pub fn from_env() -> Result<Self, ModeError> {
        let value = std::env::var(MODE_ENV_VAR).ok();
        Self::from_signal(value.as_deref())
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn minify(&self) -> bool {
        self.minify
    }

    pub fn extract_styles(&self) -> bool {
        self.extract_styles
    }

    /// Whether script and style filenames carry a content fingerprint.
    pub fn content_hash(&self) -> bool {
        self.content_hash
    }

    /// Whether the live-patching step is added to script chains.
    pub fn hot_reload(&self) -> bool {
        self.hot_reload
    }

    pub fn source_map(&self) -> SourceMapVariant {
        self.source_map
    }

    pub fn emit_source_maps(&self) -> bool {
        self.source_map != SourceMapVariant::None
    }

    pub fn public_path(&self) -> &'static str {
        self.public_path
    }

    /// Compile-time constants substituted into bundled code.
    ///
    /// `NODE_ENV` always reflects the mode; `extra` entries are layered on
    /// top, so a user `[define]` table can add constants but cannot change
    /// `NODE_ENV`.
    pub fn defines(&self, extra: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut defines = extra.clone();
        defines.insert(
            "NODE_ENV".to_string(),
            format!("\"{}\"", self.mode.as_str()),
        );
        defines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Signal parsing
    // =========================================================================

    #[test]
    fn parses_recognized_signals() {
        assert_eq!(
            ModeContext::from_signal(Some("development")).unwrap().mode(),
            Mode::Development
        );
        assert_eq!(
            ModeContext::from_signal(Some("production")).unwrap().mode(),
            Mode::Production
        );
        assert_eq!(
            ModeContext::from_signal(Some("none")).unwrap().mode(),
            Mode::None
        );
    }

    #[test]
    fn unset_signal_is_none() {
        assert_eq!(ModeContext::from_signal(None).unwrap().mode(), Mode::None);
        assert_eq!(ModeContext::from_signal(Some("")).unwrap().mode(), Mode::None);
    }

    #[test]
    fn unknown_signal_is_rejected() {
        let err = ModeContext::from_signal(Some("prod")).unwrap_err();
        assert_eq!(err, ModeError::Ambiguous("prod".to_string()));
        assert!(err.to_string().contains("prod"));
    }

    #[test]
    fn signal_is_case_sensitive() {
        assert!(ModeContext::from_signal(Some("Production")).is_err());
    }

    #[test]
    fn signal_with_whitespace_is_rejected() {
        for signal in [" production", "production\n", " development ", " "] {
            let err = ModeContext::from_signal(Some(signal)).unwrap_err();
            assert_eq!(err, ModeError::Ambiguous(signal.to_string()));
        }
    }

    // =========================================================================
    // Derived flags
    // =========================================================================

    #[test]
    fn production_flags() {
        let ctx = ModeContext::new(Mode::Production);
        assert!(ctx.minify());
        assert!(ctx.extract_styles());
        assert!(ctx.content_hash());
        assert!(!ctx.hot_reload());
        assert_eq!(ctx.source_map(), SourceMapVariant::Hidden);
        assert!(ctx.emit_source_maps());
        assert_eq!(ctx.public_path(), "./");
    }

    #[test]
    fn development_flags() {
        let ctx = ModeContext::new(Mode::Development);
        assert!(!ctx.minify());
        assert!(!ctx.extract_styles());
        assert!(!ctx.content_hash());
        assert!(ctx.hot_reload());
        assert_eq!(ctx.source_map(), SourceMapVariant::CheapModule);
        assert_eq!(ctx.public_path(), "/");
    }

    #[test]
    fn none_flags() {
        let ctx = ModeContext::new(Mode::None);
        assert!(!ctx.minify());
        assert!(!ctx.extract_styles());
        assert!(!ctx.hot_reload());
        assert_eq!(ctx.source_map(), SourceMapVariant::None);
        assert!(!ctx.emit_source_maps());
    }

    #[test]
    fn defines_pin_node_env() {
        let ctx = ModeContext::new(Mode::Production);
        let mut extra = BTreeMap::new();
        extra.insert("NODE_ENV".to_string(), "\"test\"".to_string());
        extra.insert("API_URL".to_string(), "\"/api\"".to_string());

        let defines = ctx.defines(&extra);
        assert_eq!(defines["NODE_ENV"], "\"production\"");
        assert_eq!(defines["API_URL"], "\"/api\"");
    }
}
