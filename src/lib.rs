//! # Asset Resolver
//!
//! Decides, for every source file in a front-end project, which transform
//! steps it goes through and where the result lands. It does not run the
//! transforms; it produces the plan an artifact writer follows.
//!
//! # Architecture: Three Questions Per File
//!
//! ```text
//! 1. Mode     ASSET_MODE / --mode  →  ModeContext       (what kind of build)
//! 2. Resolve  path + RuleTable     →  ResolvedPipeline  (which steps, in order)
//! 3. Plan     pipeline + bytes     →  OutputPlacement   (where it goes, how named)
//! ```
//!
//! The mode is decided once per process. The rule table is built once from
//! the mode and config and is immutable afterwards, so resolve and plan can
//! run on any number of threads without coordination.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`mode`] | Build mode from the environment, and the settings it implies |
//! | [`rules`] | Rule table: selectors, step chains, activation conditions |
//! | [`resolve`] | First-match rule selection for one path |
//! | [`plan`] | Output placement: hashing, inlining, destination directories |
//! | [`imports`] | Import specifier lookup: aliases, extension probing, builtin fallbacks |
//! | [`build`] | Whole-tree driver producing the asset manifest |
//! | [`scan`] | Source tree discovery |
//! | [`source`] | Byte access seam for planning (disk or in-memory) |
//! | [`fingerprint`] | Content hashes for hashed filenames |
//! | [`config`] | `asset-resolver.toml` loading, validation and merging |
//! | [`types`] | The serialized asset manifest |
//! | [`output`] | CLI output formatting |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! # Design Decisions
//!
//! ## First Match Wins
//!
//! Rules are evaluated in declaration order and the first whose selector
//! accepts the path is used. Two rules with identical selectors in one group
//! are rejected when the table is built; partial overlaps are allowed but
//! logged, since the later rule can only see what the earlier one leaves.
//!
//! ## Closed Step Vocabulary
//!
//! Step identifiers are a fixed set of constants in [`rules`]. Config can
//! change a step's options but cannot add steps or rules, so a typo in a
//! config file is an error instead of a silently ignored section.
//!
//! ## Strict Mode Signal
//!
//! `ASSET_MODE` accepts `development`, `production` or `none` exactly.
//! Anything else fails at startup. Falling back to a default would hide a
//! misconfigured deploy behind an unminified bundle.

pub mod build;
pub mod config;
pub mod fingerprint;
pub mod imports;
pub mod logging;
pub mod mode;
pub mod output;
pub mod plan;
pub mod resolve;
pub mod rules;
pub mod scan;
pub mod source;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
