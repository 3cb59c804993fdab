//! Shared test utilities.
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let (mode, table) = setup(Mode::Production);
//! let tmp = TempDir::new().unwrap();
//! write_file(tmp.path(), "src/index.js", 100);
//! ```

use std::path::Path;

use crate::config::PipelineConfig;
use crate::mode::{Mode, ModeContext};
use crate::rules::RuleTable;

// =========================================================================
// Fixture setup
// =========================================================================

/// Mode context and the default rule table for `mode`.
pub fn setup(mode: Mode) -> (ModeContext, RuleTable) {
    let ctx = ModeContext::new(mode);
    let table = RuleTable::construct(&ctx, &PipelineConfig::default()).unwrap();
    (ctx, table)
}

/// Write `size` deterministic bytes at `root/rel`, creating parent dirs.
pub fn write_file(root: &Path, rel: &str, size: usize) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let bytes: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    std::fs::write(path, bytes).unwrap();
}
