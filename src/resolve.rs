//! Path → transform chain.
//!
//! [`resolve`] walks the rule table in construction order and returns the
//! first rule whose selector accepts the path. Inside a group nothing after
//! the first match is evaluated. Steps whose activation is off for the
//! current mode are dropped here, so a [`ResolvedPipeline`] only ever lists
//! the steps that will actually run.

use crate::mode::ModeContext;
use crate::rules::{ArtifactCategory, RuleKind, RuleTable, Step};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResolveError {
    /// No rule applies. The caller decides between pass-through and failure.
    #[error("no rule matches {0}")]
    NoMatch(String),
}

/// The steps to run for one source file, with options fully merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPipeline {
    /// The path exactly as the caller presented it.
    pub source: String,
    /// Name of the matching rule.
    pub rule: String,
    /// Exclusivity group the rule belongs to.
    pub group: String,
    pub kind: RuleKind,
    pub steps: Vec<Step>,
}

impl ResolvedPipeline {
    pub fn category(&self) -> ArtifactCategory {
        self.kind.category()
    }

    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }
}

/// Select the rule for `path` and filter its chain for `mode`.
pub fn resolve(
    table: &RuleTable,
    path: &str,
    mode: &ModeContext,
) -> Result<ResolvedPipeline, ResolveError> {
    for group in table.groups() {
        let Some(rule) = group.rules.iter().find(|r| r.selector.matches(path)) else {
            continue;
        };
        let steps: Vec<Step> = rule
            .chain
            .iter()
            .filter(|c| c.activation.enabled(mode))
            .map(|c| c.step.clone())
            .collect();
        tracing::debug!(path, rule = %rule.name, group = %group.id, steps = steps.len(), "resolved");
        return Ok(ResolvedPipeline {
            source: path.to_string(),
            rule: rule.name.clone(),
            group: group.id.clone(),
            kind: rule.kind,
            steps,
        });
    }
    tracing::debug!(path, "no matching rule");
    Err(ResolveError::NoMatch(path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;
    use crate::rules::{ChainStep, Rule, RuleGroup, Selector};
    use crate::test_helpers::*;

    // =========================================================================
    // Rule selection
    // =========================================================================

    #[test]
    fn script_extensions_resolve_to_script_chain() {
        for mode in [Mode::Development, Mode::Production, Mode::None] {
            let (ctx, table) = setup(mode);
            for path in ["a.js", "src/b.jsx", "c.ts", "deep/nested/d.tsx"] {
                let p = resolve(&table, path, &ctx).unwrap();
                assert_eq!(p.kind, RuleKind::Script, "{path} in {mode}");
                assert_eq!(p.steps[0].id, "babel");
            }
        }
    }

    #[test]
    fn preprocessed_styles_have_longer_chains() {
        for mode in [Mode::Development, Mode::Production, Mode::None] {
            let (ctx, table) = setup(mode);
            let css = resolve(&table, "a.css", &ctx).unwrap().steps.len();
            for path in ["a.scss", "a.sass", "a.less"] {
                let len = resolve(&table, path, &ctx).unwrap().steps.len();
                assert!(len > css, "{path}: {len} <= {css}");
            }
        }
    }

    #[test]
    fn module_scss_in_production() {
        let (ctx, table) = setup(Mode::Production);
        let p = resolve(&table, "src/button.module.scss", &ctx).unwrap();
        assert_eq!(p.rule, "scss");
        assert_eq!(p.step_ids(), vec!["sass", "postcss", "css", "extract"]);
        assert_eq!(p.category(), ArtifactCategory::Style);
    }

    #[test]
    fn module_scss_in_development_injects() {
        let (ctx, table) = setup(Mode::Development);
        let p = resolve(&table, "src/button.module.scss", &ctx).unwrap();
        assert_eq!(p.step_ids(), vec!["sass", "postcss", "css", "style"]);
    }

    #[test]
    fn hot_reload_step_only_in_development() {
        let (dev, dev_table) = setup(Mode::Development);
        let (prod, prod_table) = setup(Mode::Production);
        assert_eq!(
            resolve(&dev_table, "src/App.tsx", &dev).unwrap().step_ids(),
            vec!["babel", "react-refresh"]
        );
        assert_eq!(
            resolve(&prod_table, "src/App.tsx", &prod).unwrap().step_ids(),
            vec!["babel"]
        );
    }

    #[test]
    fn template_images_and_fonts() {
        let (ctx, table) = setup(Mode::None);
        assert_eq!(resolve(&table, "src/App.vue", &ctx).unwrap().rule, "template");
        assert_eq!(resolve(&table, "assets/icon.svg", &ctx).unwrap().rule, "image");
        assert_eq!(resolve(&table, "assets/icon.min.svg", &ctx).unwrap().rule, "image");
        assert_eq!(resolve(&table, "assets/photo.jpeg", &ctx).unwrap().rule, "image");
        assert_eq!(resolve(&table, "fonts/Inter.woff2", &ctx).unwrap().rule, "font");
    }

    // =========================================================================
    // NoMatch
    // =========================================================================

    #[test]
    fn readme_has_no_rule() {
        for mode in [Mode::Development, Mode::Production, Mode::None] {
            let (ctx, table) = setup(mode);
            assert_eq!(
                resolve(&table, "README.md", &ctx),
                Err(ResolveError::NoMatch("README.md".into()))
            );
        }
    }

    #[test]
    fn extensionless_path_has_no_rule() {
        let (ctx, table) = setup(Mode::Production);
        assert!(resolve(&table, "Dockerfile", &ctx).is_err());
        assert!(resolve(&table, "bin/less", &ctx).is_err());
    }

    #[test]
    fn uppercase_extension_has_no_rule() {
        let (ctx, table) = setup(Mode::Production);
        assert!(resolve(&table, "IMG_0001.PNG", &ctx).is_err());
        assert!(resolve(&table, "legacy/Theme.LESS", &ctx).is_err());
    }

    #[test]
    fn extension_mid_filename_has_no_rule() {
        let (ctx, table) = setup(Mode::Production);
        assert!(resolve(&table, "notes.less.txt", &ctx).is_err());
        assert!(resolve(&table, "bundle.js.map", &ctx).is_err());
    }

    // =========================================================================
    // Ordering and determinism
    // =========================================================================

    #[test]
    fn first_match_wins_within_group() {
        let mode = ModeContext::new(Mode::None);
        let table = RuleTable::new(vec![RuleGroup {
            id: "g".into(),
            rules: vec![
                Rule {
                    name: "broad".into(),
                    kind: RuleKind::Script,
                    selector: Selector::extensions(&["js", "ts"]),
                    chain: vec![ChainStep::always(Step::new("first"))],
                },
                Rule {
                    name: "narrow".into(),
                    kind: RuleKind::Script,
                    selector: Selector::extensions(&["ts"]),
                    chain: vec![ChainStep::always(Step::new("second"))],
                },
            ],
        }])
        .unwrap();

        let p = resolve(&table, "x.ts", &mode).unwrap();
        assert_eq!(p.rule, "broad");
        assert_eq!(p.step_ids(), vec!["first"]);
    }

    #[test]
    fn later_group_consulted_when_earlier_has_no_match() {
        let mode = ModeContext::new(Mode::None);
        let script = |name: &str, ext: &str| Rule {
            name: name.into(),
            kind: RuleKind::Script,
            selector: Selector::extensions(&[ext]),
            chain: vec![],
        };
        let table = RuleTable::new(vec![
            RuleGroup {
                id: "first".into(),
                rules: vec![script("a", "js")],
            },
            RuleGroup {
                id: "second".into(),
                rules: vec![script("b", "mjs")],
            },
        ])
        .unwrap();

        let p = resolve(&table, "x.mjs", &mode).unwrap();
        assert_eq!((p.group.as_str(), p.rule.as_str()), ("second", "b"));
    }

    #[test]
    fn resolve_is_deterministic() {
        let (ctx, table) = setup(Mode::Production);
        for path in ["a.js", "b.scss", "c.png", "d.woff"] {
            assert_eq!(
                resolve(&table, path, &ctx).unwrap(),
                resolve(&table, path, &ctx).unwrap()
            );
        }
    }
}
