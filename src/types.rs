//! Types serialized into the asset manifest written by `build`.
//!
//! The manifest is the hand-off to the artifact writer: one entry per
//! matched source file, plus the mode-level settings the writer and the
//! chunk splitter need.

use crate::config::SplitConfig;
use crate::mode::{Mode, SourceMapVariant};
use crate::plan::OutputPlacement;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct BuildManifest {
    pub mode: Mode,
    pub public_path: String,
    pub source_map: SourceMapVariant,
    pub minify: bool,
    /// Compile-time constants, already JSON-quoted where they are strings.
    pub defines: BTreeMap<String, String>,
    pub filenames: FilenameTemplates,
    pub split: SplitConfig,
    pub assets: Vec<AssetEntry>,
    /// Files no rule matched. The writer copies or ignores them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unmatched: Vec<String>,
}

impl BuildManifest {
    pub fn emitted(&self) -> usize {
        self.assets
            .iter()
            .filter(|a| a.placement.path().is_some())
            .count()
    }

    pub fn inlined(&self) -> usize {
        self.assets.iter().filter(|a| a.placement.is_inline()).count()
    }

    pub fn injected(&self) -> usize {
        self.assets
            .iter()
            .filter(|a| a.placement.is_injected())
            .count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FilenameTemplates {
    pub script: String,
    pub chunk: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_chunk: Option<String>,
}

/// One matched source file.
#[derive(Debug, Clone, Serialize)]
pub struct AssetEntry {
    pub source: String,
    pub rule: String,
    pub steps: Vec<String>,
    pub placement: OutputPlacement,
    /// Present for inlined assets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_uri: Option<String>,
}
