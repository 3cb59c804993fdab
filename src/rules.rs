//! The rule table: which files get which transform chain.
//!
//! A table is an ordered list of exclusivity groups. Inside a group, rules
//! are tried in construction order and the first match wins, so order is
//! part of the table's meaning and is never re-sorted.
//!
//! ## Default table
//!
//! ```text
//! group "assets"
//!   template  *.vue                      vue
//!   script    *.js *.jsx *.ts *.tsx      babel → react-refresh (hot reload only)
//!   style     *.css                      postcss → css → style | extract
//!   scss      *.scss *.sass              sass → postcss → css → style | extract
//!   less      <text after last dot> == less
//!                                        less → postcss → css → style | extract
//!   image     *.png *.jpg *.jpeg *.gif *.svg *.webp
//!                                        asset (inlined below the threshold)
//!   font      *.woff *.woff2 *.eot *.ttf asset-resource
//! ```
//!
//! Chains are written in application order: the step that understands the
//! narrowest input runs first and hands its output to the next, more generic
//! step. The final style step depends on the mode: `style` injects into the
//! running document, `extract` writes a standalone stylesheet.
//!
//! ## Validation
//!
//! Two rules in the same group with identical selectors would make the
//! second one dead, so construction fails with
//! [`RuleTableError::Duplicate`]. Selectors that merely overlap are allowed
//! and resolved by order; a warning is logged for each overlapping pair.

use crate::config::PipelineConfig;
use crate::mode::ModeContext;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Group id of the built-in table.
pub const DEFAULT_GROUP: &str = "assets";

pub const VUE: &str = "vue";
pub const BABEL: &str = "babel";
pub const REACT_REFRESH: &str = "react-refresh";
pub const POSTCSS: &str = "postcss";
pub const CSS: &str = "css";
pub const STYLE: &str = "style";
pub const EXTRACT: &str = "extract";
pub const SASS: &str = "sass";
pub const LESS: &str = "less";
pub const ASSET: &str = "asset";
pub const ASSET_RESOURCE: &str = "asset-resource";

/// Every step id the built-in table can produce.
pub const STEP_IDS: &[&str] = &[
    VUE,
    BABEL,
    REACT_REFRESH,
    POSTCSS,
    CSS,
    STYLE,
    EXTRACT,
    SASS,
    LESS,
    ASSET,
    ASSET_RESOURCE,
];

#[derive(Error, Debug)]
pub enum RuleTableError {
    #[error("rules '{first}' and '{second}' in group '{group}' have identical selectors")]
    Duplicate {
        group: String,
        first: String,
        second: String,
    },
    #[error("invalid option overrides for step '{step}': {source}")]
    StepOptions {
        step: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The closed set of rule categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Template,
    Script,
    Style,
    Scss,
    Less,
    Image,
    Font,
}

impl RuleKind {
    /// The kind of artifact files of this rule turn into.
    pub fn category(self) -> ArtifactCategory {
        match self {
            RuleKind::Template | RuleKind::Script => ArtifactCategory::Script,
            RuleKind::Style | RuleKind::Scss | RuleKind::Less => ArtifactCategory::Style,
            RuleKind::Image => ArtifactCategory::Image,
            RuleKind::Font => ArtifactCategory::Font,
        }
    }
}

/// What the output planner emits for a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactCategory {
    Script,
    Style,
    Image,
    Font,
}

impl fmt::Display for ArtifactCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArtifactCategory::Script => "script",
            ArtifactCategory::Style => "style",
            ArtifactCategory::Image => "image",
            ArtifactCategory::Font => "font",
        };
        f.write_str(s)
    }
}

/// File-selector predicate. Both variants are case-sensitive and look only
/// at the end of the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// The file name's final extension is one of these (without the dot).
    /// `icon.min.svg` has extension `svg`; `README` has none.
    Extensions(Vec<String>),
    /// The path text after its last `.` equals this string exactly.
    DotSuffix(String),
}

impl Selector {
    pub fn extensions(exts: &[&str]) -> Self {
        Selector::Extensions(exts.iter().map(|e| e.to_string()).collect())
    }

    pub fn dot_suffix(suffix: &str) -> Self {
        Selector::DotSuffix(suffix.to_string())
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Selector::Extensions(exts) => Path::new(path)
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| exts.iter().any(|e| e == ext)),
            Selector::DotSuffix(suffix) => path
                .rsplit_once('.')
                .is_some_and(|(_, tail)| tail == suffix),
        }
    }

    /// True when both selectors accept exactly the same paths by construction.
    fn identical(&self, other: &Selector) -> bool {
        match (self, other) {
            (Selector::Extensions(a), Selector::Extensions(b)) => {
                a.iter().collect::<BTreeSet<_>>() == b.iter().collect::<BTreeSet<_>>()
            }
            (Selector::DotSuffix(a), Selector::DotSuffix(b)) => a == b,
            _ => false,
        }
    }

    /// True when some path could satisfy both selectors.
    fn overlaps(&self, other: &Selector) -> bool {
        match (self, other) {
            (Selector::Extensions(a), Selector::Extensions(b)) => a.iter().any(|e| b.contains(e)),
            (Selector::DotSuffix(a), Selector::DotSuffix(b)) => a == b,
            (Selector::Extensions(exts), Selector::DotSuffix(s))
            | (Selector::DotSuffix(s), Selector::Extensions(exts)) => exts.contains(s),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Extensions(exts) => {
                let globs: Vec<String> = exts.iter().map(|e| format!("*.{e}")).collect();
                f.write_str(&globs.join(" "))
            }
            Selector::DotSuffix(s) => write!(f, "*.{s} (suffix)"),
        }
    }
}

/// One transform step with its options, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

impl Step {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            options: Map::new(),
        }
    }

    /// Build a step from a `json!` object literal.
    ///
    /// Only object literals are meaningful; anything else is a programming
    /// error and panics in debug builds.
    pub fn with_options(id: &str, options: Value) -> Self {
        debug_assert!(
            options.is_object(),
            "options for step '{id}' must be a JSON object, got {options}"
        );
        let options = match options {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: id.to_string(),
            options,
        }
    }
}

/// When a step in a chain is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Always,
    /// Only when the mode enables hot reloading.
    HotReload,
    /// Only when styles are extracted to standalone files.
    ExtractStyles,
    /// Only when styles are injected into the document.
    InjectStyles,
}

impl Activation {
    pub fn enabled(self, mode: &ModeContext) -> bool {
        match self {
            Activation::Always => true,
            Activation::HotReload => mode.hot_reload(),
            Activation::ExtractStyles => mode.extract_styles(),
            Activation::InjectStyles => !mode.extract_styles(),
        }
    }
}

/// A step plus the condition under which it runs.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainStep {
    pub step: Step,
    pub activation: Activation,
}

impl ChainStep {
    pub fn always(step: Step) -> Self {
        Self {
            step,
            activation: Activation::Always,
        }
    }

    pub fn when(activation: Activation, step: Step) -> Self {
        Self { step, activation }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub kind: RuleKind,
    pub selector: Selector,
    pub chain: Vec<ChainStep>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleGroup {
    pub id: String,
    pub rules: Vec<Rule>,
}

/// Validated, ordered rule table. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTable {
    groups: Vec<RuleGroup>,
}

impl RuleTable {
    /// Validate and wrap a set of groups.
    pub fn new(groups: Vec<RuleGroup>) -> Result<Self, RuleTableError> {
        for group in &groups {
            for (i, earlier) in group.rules.iter().enumerate() {
                for later in &group.rules[i + 1..] {
                    if earlier.selector.identical(&later.selector) {
                        return Err(RuleTableError::Duplicate {
                            group: group.id.clone(),
                            first: earlier.name.clone(),
                            second: later.name.clone(),
                        });
                    }
                    if earlier.selector.overlaps(&later.selector) {
                        tracing::warn!(
                            group = %group.id,
                            first = %earlier.name,
                            second = %later.name,
                            "overlapping selectors, first rule wins"
                        );
                    }
                }
            }
        }
        Ok(Self { groups })
    }

    /// Build the default table for a mode, with config overrides applied.
    pub fn construct(mode: &ModeContext, config: &PipelineConfig) -> Result<Self, RuleTableError> {
        let mut rules = default_rules(mode, config);
        for (step_id, table) in &config.steps {
            let overlay = serde_json::to_value(table).map_err(|source| {
                RuleTableError::StepOptions {
                    step: step_id.clone(),
                    source,
                }
            })?;
            let Value::Object(overlay) = overlay else {
                continue;
            };
            for chain_step in rules.iter_mut().flat_map(|r| r.chain.iter_mut()) {
                if chain_step.step.id == *step_id {
                    merge_options(&mut chain_step.step.options, overlay.clone());
                }
            }
        }
        Self::new(vec![RuleGroup {
            id: DEFAULT_GROUP.to_string(),
            rules,
        }])
    }

    pub fn groups(&self) -> &[RuleGroup] {
        &self.groups
    }

    /// All rules with their group id, in evaluation order.
    pub fn rules(&self) -> impl Iterator<Item = (&str, &Rule)> {
        self.groups
            .iter()
            .flat_map(|g| g.rules.iter().map(move |r| (g.id.as_str(), r)))
    }
}

/// Deep-merge `overlay` into `base`: objects merge key by key, anything
/// else replaces. New keys are appended after existing ones.
pub fn merge_options(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        match value {
            Value::Object(incoming) => {
                if let Some(Value::Object(existing)) = base.get_mut(&key) {
                    merge_options(existing, incoming);
                } else {
                    base.insert(key, Value::Object(incoming));
                }
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}

fn default_rules(mode: &ModeContext, config: &PipelineConfig) -> Vec<Rule> {
    let fp = config.fingerprint_length;
    let hash = config.asset_hash_length;
    vec![
        Rule {
            name: "template".into(),
            kind: RuleKind::Template,
            selector: Selector::extensions(&["vue"]),
            chain: vec![ChainStep::always(Step::new(VUE))],
        },
        Rule {
            name: "script".into(),
            kind: RuleKind::Script,
            selector: Selector::extensions(&["js", "jsx", "ts", "tsx"]),
            chain: vec![
                ChainStep::always(Step::with_options(
                    BABEL,
                    json!({
                        "presets": [
                            ["@babel/preset-env", { "useBuiltIns": "usage", "corejs": 3 }],
                            "@babel/preset-react",
                            "@babel/preset-typescript"
                        ],
                        "sourceMaps": mode.emit_source_maps()
                    }),
                )),
                ChainStep::when(
                    Activation::HotReload,
                    Step::with_options(
                        REACT_REFRESH,
                        json!({ "overlay": { "sockIntegration": "whm" } }),
                    ),
                ),
            ],
        },
        Rule {
            name: "style".into(),
            kind: RuleKind::Style,
            selector: Selector::extensions(&["css"]),
            chain: style_chain(None, mode, fp),
        },
        Rule {
            name: "scss".into(),
            kind: RuleKind::Scss,
            selector: Selector::extensions(&["scss", "sass"]),
            chain: style_chain(
                Some(Step::with_options(
                    SASS,
                    json!({ "sassOptions": { "javaScriptEnabled": true } }),
                )),
                mode,
                fp,
            ),
        },
        Rule {
            name: "less".into(),
            kind: RuleKind::Less,
            selector: Selector::dot_suffix("less"),
            chain: style_chain(
                Some(Step::with_options(
                    LESS,
                    json!({ "lessOptions": { "javaScriptEnabled": true } }),
                )),
                mode,
                fp,
            ),
        },
        Rule {
            name: "image".into(),
            kind: RuleKind::Image,
            selector: Selector::extensions(&["png", "jpg", "jpeg", "gif", "svg", "webp"]),
            chain: vec![ChainStep::always(Step::with_options(
                ASSET,
                json!({
                    "dataUrlCondition": { "maxSize": config.inline_threshold },
                    "filename": format!("{}/[name].[hash:{hash}][ext]", config.output.images_dir)
                }),
            ))],
        },
        Rule {
            name: "font".into(),
            kind: RuleKind::Font,
            selector: Selector::extensions(&["woff", "woff2", "eot", "ttf"]),
            chain: vec![ChainStep::always(Step::with_options(
                ASSET_RESOURCE,
                json!({
                    "filename": format!("{}/[name].[hash:{hash}][ext]", config.output.fonts_dir)
                }),
            ))],
        },
    ]
}

/// `[pre] → postcss → css → style|extract`.
///
/// `css` is told how many steps ran before it so `@import`ed files get the
/// same treatment.
fn style_chain(pre: Option<Step>, mode: &ModeContext, fingerprint: usize) -> Vec<ChainStep> {
    let import_loaders = if pre.is_some() { 2 } else { 1 };
    let mut chain: Vec<ChainStep> = pre.into_iter().map(ChainStep::always).collect();
    chain.push(ChainStep::always(Step::new(POSTCSS)));
    chain.push(ChainStep::always(Step::with_options(
        CSS,
        json!({ "importLoaders": import_loaders, "sourceMap": mode.emit_source_maps() }),
    )));
    chain.push(ChainStep::when(Activation::InjectStyles, Step::new(STYLE)));
    chain.push(ChainStep::when(
        Activation::ExtractStyles,
        Step::with_options(
            EXTRACT,
            json!({
                "filename": format!("[name].[contenthash:{fingerprint}].css"),
                "chunkFilename": format!("[name].[contenthash:{fingerprint}].chunk.css")
            }),
        ),
    ));
    chain
}
