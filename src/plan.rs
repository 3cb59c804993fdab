//! Output planning: where each resolved file ends up.
//!
//! | Category | development / none | production |
//! |----------|--------------------|------------|
//! | script | `[name].js` | `[name].[contenthash:10].js` |
//! | style | injected, no file | `[name].[contenthash:10].css` |
//! | image | inline below 8 KiB, else `images/[name].[hash:8][ext]` | same |
//! | font | `fonts/[name].[hash:8][ext]` | same |
//!
//! The inlining threshold is strict: an image of exactly `inline_threshold`
//! bytes is emitted as a file. Fonts are never inlined.
//!
//! Planning a script or style in development reads nothing. Everything else
//! reads through the [`AssetSource`]; if that fails the error is returned
//! with the path attached and no size is assumed.

use crate::config::{PipelineConfig, SplitConfig};
use crate::fingerprint::fingerprint;
use crate::mode::ModeContext;
use crate::resolve::ResolvedPipeline;
use crate::rules::ArtifactCategory;
use crate::source::AssetSource;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("cannot determine size of {path}: {source}")]
    SizeProbe {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{path} changed while planning: probed {probed} bytes, read {read}")]
    Changed { path: String, probed: u64, read: u64 },
}

impl PlanError {
    pub fn path(&self) -> &str {
        match self {
            PlanError::SizeProbe { path, .. } | PlanError::Changed { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum HashPolicy {
    None,
    ContentHash { length: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InlinePolicy {
    Never,
    /// Inline when the size is strictly below `threshold` bytes.
    Below { threshold: u64 },
}

impl InlinePolicy {
    pub fn should_inline(self, size: u64) -> bool {
        match self {
            InlinePolicy::Never => false,
            InlinePolicy::Below { threshold } => size < threshold,
        }
    }
}

/// What the artifact writer should do with the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Disposition {
    /// Write a file at `path`, relative to the output root.
    Emit {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fingerprint: Option<String>,
    },
    /// Embed the bytes as a data URI in the referencing artifact.
    Inline { mime: String },
    /// Inject into the running document; nothing is written.
    Inject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputPlacement {
    pub category: ArtifactCategory,
    /// Output subdirectory; empty for the output root.
    pub directory: String,
    /// Filename template, `None` when nothing is written.
    pub filename_template: Option<String>,
    pub hashing: HashPolicy,
    pub inline: InlinePolicy,
    pub disposition: Disposition,
    /// Byte size, for images and fonts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub minify: bool,
    /// Chunk bounds for the downstream splitter, scripts only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<SplitConfig>,
}

impl OutputPlacement {
    pub fn is_inline(&self) -> bool {
        matches!(self.disposition, Disposition::Inline { .. })
    }

    pub fn is_injected(&self) -> bool {
        matches!(self.disposition, Disposition::Inject)
    }

    /// Destination path when a file is emitted.
    pub fn path(&self) -> Option<&str> {
        match &self.disposition {
            Disposition::Emit { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn fingerprint(&self) -> Option<&str> {
        match &self.disposition {
            Disposition::Emit { fingerprint, .. } => fingerprint.as_deref(),
            _ => None,
        }
    }
}

/// Entry script filename template for a mode.
pub fn script_template(mode: &ModeContext, config: &PipelineConfig) -> String {
    if mode.content_hash() {
        format!("[name].[contenthash:{}].js", config.fingerprint_length)
    } else {
        "[name].js".to_string()
    }
}

/// Split-chunk script filename template for a mode.
pub fn chunk_template(mode: &ModeContext, config: &PipelineConfig) -> String {
    if mode.content_hash() {
        format!("[name].[contenthash:{}].chunk.js", config.fingerprint_length)
    } else {
        "[name].chunk.js".to_string()
    }
}

/// Extracted stylesheet filename templates, `None` when styles are injected.
pub fn style_templates(mode: &ModeContext, config: &PipelineConfig) -> Option<(String, String)> {
    mode.extract_styles().then(|| {
        let n = config.fingerprint_length;
        (
            format!("[name].[contenthash:{n}].css"),
            format!("[name].[contenthash:{n}].chunk.css"),
        )
    })
}

/// Decide the output placement for a resolved file.
pub fn plan(
    pipeline: &ResolvedPipeline,
    mode: &ModeContext,
    config: &PipelineConfig,
    source: &impl AssetSource,
) -> Result<OutputPlacement, PlanError> {
    let placement = match pipeline.category() {
        ArtifactCategory::Script => plan_script(pipeline, mode, config, source)?,
        ArtifactCategory::Style => plan_style(pipeline, mode, config, source)?,
        ArtifactCategory::Image => plan_binary(
            pipeline,
            ArtifactCategory::Image,
            &config.output.images_dir,
            InlinePolicy::Below {
                threshold: config.inline_threshold,
            },
            config,
            source,
        )?,
        ArtifactCategory::Font => plan_binary(
            pipeline,
            ArtifactCategory::Font,
            &config.output.fonts_dir,
            InlinePolicy::Never,
            config,
            source,
        )?,
    };
    tracing::debug!(
        path = %pipeline.source,
        category = %placement.category,
        destination = placement.path().unwrap_or(if placement.is_inline() { "<inline>" } else { "<inject>" }),
        "planned"
    );
    Ok(placement)
}

fn plan_script(
    pipeline: &ResolvedPipeline,
    mode: &ModeContext,
    config: &PipelineConfig,
    source: &impl AssetSource,
) -> Result<OutputPlacement, PlanError> {
    let (stem, _) = name_parts(&pipeline.source);
    let (hashing, fingerprint) = if mode.content_hash() {
        let bytes = read(source, &pipeline.source)?;
        (
            HashPolicy::ContentHash {
                length: config.fingerprint_length,
            },
            Some(fingerprint(&bytes, config.fingerprint_length)),
        )
    } else {
        (HashPolicy::None, None)
    };
    let path = match &fingerprint {
        Some(fp) => format!("{stem}.{fp}.js"),
        None => format!("{stem}.js"),
    };
    Ok(OutputPlacement {
        category: ArtifactCategory::Script,
        directory: String::new(),
        filename_template: Some(script_template(mode, config)),
        hashing,
        inline: InlinePolicy::Never,
        disposition: Disposition::Emit { path, fingerprint },
        size: None,
        minify: mode.minify(),
        split: Some(config.split.clone()),
    })
}

fn plan_style(
    pipeline: &ResolvedPipeline,
    mode: &ModeContext,
    config: &PipelineConfig,
    source: &impl AssetSource,
) -> Result<OutputPlacement, PlanError> {
    let Some((template, _)) = style_templates(mode, config) else {
        return Ok(OutputPlacement {
            category: ArtifactCategory::Style,
            directory: String::new(),
            filename_template: None,
            hashing: HashPolicy::None,
            inline: InlinePolicy::Never,
            disposition: Disposition::Inject,
            size: None,
            minify: mode.minify(),
            split: None,
        });
    };
    let (stem, _) = name_parts(&pipeline.source);
    let bytes = read(source, &pipeline.source)?;
    let fp = fingerprint(&bytes, config.fingerprint_length);
    Ok(OutputPlacement {
        category: ArtifactCategory::Style,
        directory: String::new(),
        filename_template: Some(template),
        hashing: HashPolicy::ContentHash {
            length: config.fingerprint_length,
        },
        inline: InlinePolicy::Never,
        disposition: Disposition::Emit {
            path: format!("{stem}.{fp}.css"),
            fingerprint: Some(fp),
        },
        size: None,
        minify: mode.minify(),
        split: None,
    })
}

fn plan_binary(
    pipeline: &ResolvedPipeline,
    category: ArtifactCategory,
    directory: &str,
    inline: InlinePolicy,
    config: &PipelineConfig,
    source: &impl AssetSource,
) -> Result<OutputPlacement, PlanError> {
    let size = source
        .size(&pipeline.source)
        .map_err(|e| probe_error(&pipeline.source, e))?;
    let hashing = HashPolicy::ContentHash {
        length: config.asset_hash_length,
    };
    let filename_template = Some(format!("[name].[hash:{}][ext]", config.asset_hash_length));

    let disposition = if inline.should_inline(size) {
        Disposition::Inline {
            mime: mime_for(&pipeline.source),
        }
    } else {
        let bytes = read(source, &pipeline.source)?;
        let fp = fingerprint(&bytes, config.asset_hash_length);
        let (stem, ext) = name_parts(&pipeline.source);
        let name = match ext {
            Some(ext) => format!("{stem}.{fp}.{ext}"),
            None => format!("{stem}.{fp}"),
        };
        Disposition::Emit {
            path: format!("{directory}/{name}"),
            fingerprint: Some(fp),
        }
    };

    Ok(OutputPlacement {
        category,
        directory: directory.to_string(),
        filename_template,
        hashing,
        inline,
        disposition,
        size: Some(size),
        minify: false,
        split: None,
    })
}

/// MIME type for a data URI, falling back to `application/octet-stream`.
pub fn mime_for(path: &str) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// `data:<mime>;base64,<payload>` for an inlined asset.
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// File stem and extension of the last path segment.
fn name_parts(path: &str) -> (&str, Option<&str>) {
    let p = Path::new(path);
    let stem = p.file_stem().and_then(|s| s.to_str()).unwrap_or(path);
    let ext = p.extension().and_then(|e| e.to_str());
    (stem, ext)
}

fn read(source: &impl AssetSource, path: &str) -> Result<Vec<u8>, PlanError> {
    source.read(path).map_err(|e| probe_error(path, e))
}

fn probe_error(path: &str, source: io::Error) -> PlanError {
    PlanError::SizeProbe {
        path: path.to_string(),
        source,
    }
}
