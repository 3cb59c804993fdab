//! Whole-tree build: scan, resolve, plan, write the asset manifest.
//!
//! Every discovered file is resolved and planned independently on the rayon
//! pool. The rule table, mode and config are shared by reference; nothing
//! mutable is shared, so workers never wait on each other. The only blocking
//! work is the read inside planning.
//!
//! Progress is reported through an optional channel, as [`BuildEvent`]s, so
//! the caller can print from a single thread while workers run.
//!
//! Files no rule matches are collected in [`BuildManifest::unmatched`]. The
//! first planning failure, in path order, aborts the build and names its
//! file.
//!
//! Two sources planned to the same unhashed destination (`src/a/index.js`
//! and `src/b/index.js` in development) are a [`BuildError::Conflict`]. A
//! shared hashed destination means identical content and is allowed.

use crate::config::PipelineConfig;
use crate::mode::ModeContext;
use crate::plan::{
    Disposition, OutputPlacement, PlanError, chunk_template, data_uri, plan, script_template,
    style_templates,
};
use crate::resolve::{ResolveError, resolve};
use crate::rules::{ArtifactCategory, RuleTable};
use crate::scan::{ScanError, scan};
use crate::source::{AssetSource, FsSource};
use crate::types::{AssetEntry, BuildManifest, FilenameTemplates};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("Planning failed: {0}")]
    Plan(#[from] PlanError),
    #[error("Conflict: {first} and {second} both emit {path}")]
    Conflict {
        path: String,
        first: String,
        second: String,
    },
}

/// Progress events emitted while building.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    Started {
        total: usize,
    },
    Planned {
        source: String,
        rule: String,
        category: ArtifactCategory,
        destination: Destination,
    },
    Unmatched {
        source: String,
    },
}

/// Short form of a placement for progress output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    File(String),
    Inline(u64),
    Injected,
}

impl Destination {
    pub fn of(placement: &OutputPlacement) -> Self {
        match (placement.path(), placement.size) {
            (Some(p), _) => Destination::File(p.to_string()),
            (None, Some(size)) if placement.is_inline() => Destination::Inline(size),
            _ => Destination::Injected,
        }
    }
}

/// Everything a build needs besides the source tree.
pub struct BuildContext<'a> {
    pub mode: &'a ModeContext,
    pub config: &'a PipelineConfig,
    pub table: &'a RuleTable,
}

pub fn build(
    ctx: &BuildContext<'_>,
    source_root: &Path,
    exclude: &[PathBuf],
    events: Option<Sender<BuildEvent>>,
) -> Result<BuildManifest, BuildError> {
    let files = scan(source_root, exclude)?;
    let source = FsSource::new(source_root);
    build_files(ctx, &files, &source, events)
}

/// Resolve and plan an explicit file list against any [`AssetSource`].
pub fn build_files(
    ctx: &BuildContext<'_>,
    files: &[String],
    source: &impl AssetSource,
    events: Option<Sender<BuildEvent>>,
) -> Result<BuildManifest, BuildError> {
    if let Some(tx) = &events {
        tx.send(BuildEvent::Started { total: files.len() }).ok();
    }

    let outcomes: Vec<Result<Option<AssetEntry>, PlanError>> = files
        .par_iter()
        .map(|path| {
            let outcome = build_one(ctx, path, source);
            if let (Some(tx), Ok(entry)) = (&events, &outcome) {
                tx.send(event_for(path, entry.as_ref())).ok();
            }
            outcome
        })
        .collect();

    let mut assets = Vec::new();
    let mut unmatched = Vec::new();
    for (path, outcome) in files.iter().zip(outcomes) {
        match outcome? {
            Some(entry) => assets.push(entry),
            None => unmatched.push(path.clone()),
        }
    }
    check_conflicts(&assets)?;

    let (style, style_chunk) = match style_templates(ctx.mode, ctx.config) {
        Some((s, c)) => (Some(s), Some(c)),
        None => (None, None),
    };
    Ok(BuildManifest {
        mode: ctx.mode.mode(),
        public_path: ctx.mode.public_path().to_string(),
        source_map: ctx.mode.source_map(),
        minify: ctx.mode.minify(),
        defines: ctx.mode.defines(&ctx.config.define),
        filenames: FilenameTemplates {
            script: script_template(ctx.mode, ctx.config),
            chunk: chunk_template(ctx.mode, ctx.config),
            style,
            style_chunk,
        },
        split: ctx.config.split.clone(),
        assets,
        unmatched,
    })
}

/// Reject two entries emitting the same unhashed path.
fn check_conflicts(assets: &[AssetEntry]) -> Result<(), BuildError> {
    let mut seen: HashMap<&str, &AssetEntry> = HashMap::new();
    for entry in assets {
        let Some(path) = entry.placement.path() else {
            continue;
        };
        match seen.get(path) {
            Some(first) if first.placement.fingerprint().is_none() => {
                return Err(BuildError::Conflict {
                    path: path.to_string(),
                    first: first.source.clone(),
                    second: entry.source.clone(),
                });
            }
            Some(_) => {}
            None => {
                seen.insert(path, entry);
            }
        }
    }
    Ok(())
}

fn build_one(
    ctx: &BuildContext<'_>,
    path: &str,
    source: &impl AssetSource,
) -> Result<Option<AssetEntry>, PlanError> {
    let pipeline = match resolve(ctx.table, path, ctx.mode) {
        Ok(p) => p,
        Err(ResolveError::NoMatch(_)) => return Ok(None),
    };
    let placement = plan(&pipeline, ctx.mode, ctx.config, source)?;
    let data_uri = match &placement.disposition {
        Disposition::Inline { mime } => {
            let bytes = source.read(path).map_err(|e| PlanError::SizeProbe {
                path: path.to_string(),
                source: e,
            })?;
            // The inline decision was made from the probed size.
            let read = bytes.len() as u64;
            if placement.size != Some(read) {
                return Err(PlanError::Changed {
                    path: path.to_string(),
                    probed: placement.size.unwrap_or_default(),
                    read,
                });
            }
            Some(data_uri(mime, &bytes))
        }
        _ => None,
    };
    Ok(Some(AssetEntry {
        source: pipeline.source.clone(),
        rule: pipeline.rule.clone(),
        steps: pipeline.steps.iter().map(|s| s.id.clone()).collect(),
        placement,
        data_uri,
    }))
}

fn event_for(path: &str, entry: Option<&AssetEntry>) -> BuildEvent {
    let Some(entry) = entry else {
        return BuildEvent::Unmatched {
            source: path.to_string(),
        };
    };
    BuildEvent::Planned {
        source: entry.source.clone(),
        rule: entry.rule.clone(),
        category: entry.placement.category,
        destination: Destination::of(&entry.placement),
    }
}

/// Write the manifest as pretty JSON into `output_dir`, returning its path.
pub fn write_manifest(
    manifest: &BuildManifest,
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<PathBuf, BuildError> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(&config.output.manifest);
    let json = serde_json::to_string_pretty(manifest)?;
    std::fs::write(&path, json)?;
    Ok(path)
}
