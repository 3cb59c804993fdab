//! Import specifier resolution.
//!
//! Turns one specifier written inside a source file (`@/components/Button`,
//! `./util`, `crypto`) into a concrete target. This is a single lookup, not a
//! walk of the import graph.
//!
//! Order of checks:
//!
//! 1. Builtin fallbacks: a bare specifier equal to a `[resolve.fallback]` key
//!    maps to the replacement package, or to an empty module for `false`.
//! 2. Aliases: the longest alias key that equals the specifier or prefixes it
//!    followed by `/` is swapped for its directory under the project root.
//! 3. Relative (`./`, `../`) specifiers are joined to the importer's directory;
//!    absolute specifiers are used as they are.
//! 4. Anything else is a package name, left to package resolution.
//!
//! File candidates are probed as: the exact path, the path with each
//! configured extension appended, then `index` plus each extension inside
//! the path as a directory.

use crate::config::{Fallback, ResolveConfig};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ImportError {
    #[error("cannot resolve '{specifier}' from {importer}")]
    NotFound { specifier: String, importer: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportTarget {
    File(PathBuf),
    /// A builtin replaced by a browser package.
    Fallback(String),
    /// A builtin with no replacement; resolves to an empty module.
    Empty,
    /// A bare package specifier.
    Package(String),
}

pub fn resolve_import(
    specifier: &str,
    importer: &Path,
    project_root: &Path,
    config: &ResolveConfig,
) -> Result<ImportTarget, ImportError> {
    if let Some(fallback) = config.fallback.get(specifier) {
        return Ok(match fallback {
            Fallback::Module(name) => ImportTarget::Fallback(name.clone()),
            Fallback::Disabled(_) => ImportTarget::Empty,
        });
    }

    let base = if let Some(aliased) = apply_alias(specifier, project_root, config) {
        aliased
    } else if specifier.starts_with("./") || specifier.starts_with("../") {
        importer
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(specifier)
    } else if Path::new(specifier).is_absolute() {
        PathBuf::from(specifier)
    } else {
        return Ok(ImportTarget::Package(specifier.to_string()));
    };

    probe(&base, &config.extensions)
        .map(ImportTarget::File)
        .ok_or_else(|| ImportError::NotFound {
            specifier: specifier.to_string(),
            importer: importer.to_path_buf(),
        })
}

fn apply_alias(specifier: &str, project_root: &Path, config: &ResolveConfig) -> Option<PathBuf> {
    config
        .alias
        .iter()
        .filter_map(|(key, dir)| {
            let rest = specifier.strip_prefix(key.as_str())?;
            if rest.is_empty() {
                Some((key.len(), project_root.join(dir)))
            } else {
                let rest = rest.strip_prefix('/')?;
                Some((key.len(), project_root.join(dir).join(rest)))
            }
        })
        .max_by_key(|(len, _)| *len)
        .map(|(_, path)| path)
}

fn probe(base: &Path, extensions: &[String]) -> Option<PathBuf> {
    if base.is_file() {
        return Some(base.to_path_buf());
    }
    let with_ext = |p: &Path, ext: &str| {
        let mut s = p.as_os_str().to_os_string();
        s.push(ext);
        PathBuf::from(s)
    };
    if let Some(found) = extensions
        .iter()
        .map(|ext| with_ext(base, ext))
        .find(|p| p.is_file())
    {
        return Some(found);
    }
    if base.is_dir() {
        let index = base.join("index");
        return extensions
            .iter()
            .map(|ext| with_ext(&index, ext))
            .find(|p| p.is_file());
    }
    None
}
