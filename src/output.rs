//! CLI output formatting for every command.
//!
//! # Source-First Display
//!
//! Each entry leads with the source path as the caller wrote it, followed by
//! `→` and what it turns into. Rule names, step chains and hashing details
//! are indented context lines beneath it, so the output reads as an inventory
//! of the project's files.
//!
//! # Output Format
//!
//! ## Resolve
//!
//! ```text
//! src/index.tsx → script
//!     Rule: assets/script
//!     Steps: babel → react-refresh
//! ```
//!
//! ## Plan
//!
//! ```text
//! src/index.tsx → index.3b1f6e02a9.js
//!     Hash: contenthash:10
//!     Minify: yes
//! assets/dot.png → inline (412 bytes)
//! src/app.css → injected
//! ```
//!
//! ## Rules
//!
//! ```text
//! assets
//! 001 template  *.vue
//!     vue
//! 002 script  *.js *.jsx *.ts *.tsx
//!     babel
//!     react-refresh [hot reload, off]
//! ```
//!
//! ## Build
//!
//! ```text
//! Planning 12 files
//!     src/index.tsx → index.3b1f6e02a9.js
//!     README.md (no rule)
//! Planned 11 assets: 8 emitted, 2 inlined, 1 injected
//! Unmatched: 1 file
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::build::{BuildEvent, Destination};
use crate::mode::ModeContext;
use crate::plan::{HashPolicy, OutputPlacement};
use crate::resolve::ResolvedPipeline;
use crate::rules::{Activation, RuleTable};
use crate::types::BuildManifest;

const ARROW: &str = "\u{2192}";

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// `1 file`, `2 files`.
fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Right-hand side of a `source → destination` line.
fn destination_label(dest: &Destination) -> String {
    match dest {
        Destination::File(path) => path.clone(),
        Destination::Inline(size) => format!("inline ({})", plural(*size as usize, "byte")),
        Destination::Injected => "injected".to_string(),
    }
}

fn activation_label(activation: Activation) -> Option<&'static str> {
    match activation {
        Activation::Always => None,
        Activation::HotReload => Some("hot reload"),
        Activation::ExtractStyles => Some("extract styles"),
        Activation::InjectStyles => Some("inject styles"),
    }
}

// ============================================================================
// Resolve
// ============================================================================

pub fn format_resolved(pipeline: &ResolvedPipeline) -> Vec<String> {
    let steps = if pipeline.steps.is_empty() {
        "(none)".to_string()
    } else {
        pipeline.step_ids().join(&format!(" {ARROW} "))
    };
    vec![
        format!("{} {ARROW} {}", pipeline.source, pipeline.category()),
        format!("{}Rule: {}/{}", indent(1), pipeline.group, pipeline.rule),
        format!("{}Steps: {}", indent(1), steps),
    ]
}

pub fn print_resolved(pipeline: &ResolvedPipeline) {
    for line in format_resolved(pipeline) {
        println!("{}", line);
    }
}

// ============================================================================
// Plan
// ============================================================================

/// Destination on the header line, hashing and minify details underneath
/// for emitted files.
pub fn format_placement(source: &str, placement: &OutputPlacement) -> Vec<String> {
    let dest = Destination::of(placement);
    let mut lines = vec![format!("{source} {ARROW} {}", destination_label(&dest))];
    if let Destination::File(_) = dest {
        let hash = match placement.hashing {
            HashPolicy::None => "none".to_string(),
            HashPolicy::ContentHash { length } => format!("contenthash:{length}"),
        };
        lines.push(format!("{}Hash: {}", indent(1), hash));
        lines.push(format!("{}Minify: {}", indent(1), yes_no(placement.minify)));
    }
    lines
}

pub fn print_placement(source: &str, placement: &OutputPlacement) {
    for line in format_placement(source, placement) {
        println!("{}", line);
    }
}

// ============================================================================
// Rules
// ============================================================================

/// Rule table listing, one block per group. Steps that are inactive in
/// `mode` are marked `off`.
pub fn format_rules(table: &RuleTable, mode: &ModeContext) -> Vec<String> {
    let mut lines = Vec::new();
    for group in table.groups() {
        lines.push(group.id.clone());
        for (i, rule) in group.rules.iter().enumerate() {
            lines.push(format!(
                "{} {}  {}",
                format_index(i + 1),
                rule.name,
                rule.selector
            ));
            for chain_step in &rule.chain {
                let line = match activation_label(chain_step.activation) {
                    None => chain_step.step.id.clone(),
                    Some(label) => {
                        let state = if chain_step.activation.enabled(mode) {
                            "on"
                        } else {
                            "off"
                        };
                        format!("{} [{label}, {state}]", chain_step.step.id)
                    }
                };
                lines.push(format!("{}{}", indent(1), line));
            }
        }
    }
    lines
}

pub fn print_rules(table: &RuleTable, mode: &ModeContext) {
    for line in format_rules(table, mode) {
        println!("{}", line);
    }
}

// ============================================================================
// Mode
// ============================================================================

pub fn format_mode(mode: &ModeContext) -> Vec<String> {
    vec![
        format!("Mode: {}", mode.mode()),
        format!("{}Public path: {}", indent(1), mode.public_path()),
        format!("{}Source maps: {}", indent(1), mode.source_map().as_str()),
        format!("{}Minify: {}", indent(1), yes_no(mode.minify())),
        format!("{}Extract styles: {}", indent(1), yes_no(mode.extract_styles())),
        format!("{}Hot reload: {}", indent(1), yes_no(mode.hot_reload())),
    ]
}

pub fn print_mode(mode: &ModeContext) {
    for line in format_mode(mode) {
        println!("{}", line);
    }
}

// ============================================================================
// Build
// ============================================================================

/// Format a single build progress event as display lines.
pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::Started { total } => vec![format!("Planning {}", plural(*total, "file"))],
        BuildEvent::Planned {
            source,
            destination,
            ..
        } => vec![format!(
            "{}{source} {ARROW} {}",
            indent(1),
            destination_label(destination)
        )],
        BuildEvent::Unmatched { source } => vec![format!("{}{source} (no rule)", indent(1))],
    }
}

pub fn format_build_summary(manifest: &BuildManifest) -> Vec<String> {
    let mut lines = vec![format!(
        "Planned {}: {} emitted, {} inlined, {} injected",
        plural(manifest.assets.len(), "asset"),
        manifest.emitted(),
        manifest.inlined(),
        manifest.injected()
    )];
    if !manifest.unmatched.is_empty() {
        lines.push(format!(
            "Unmatched: {}",
            plural(manifest.unmatched.len(), "file")
        ));
    }
    lines
}

pub fn print_build_summary(manifest: &BuildManifest) {
    for line in format_build_summary(manifest) {
        println!("{}", line);
    }
}
