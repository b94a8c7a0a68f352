//! Expansion configuration.
//!
//! Everything the expander treats as policy lives here: name comparison,
//! parameter merge order, the catenation scheme for renamed names, directive
//! spellings and the instantiation-prefix remapping table. A configuration can
//! be loaded from YAML or adjusted one variable at a time using the classic
//! variable names (`subc_catchar`, `parhier`, ...).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::symtab::KeyPolicy;

/// Default scope-stack capacity.
pub const DEFAULT_MAX_DEPTH: usize = 16;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown configuration variable '{0}'")]
    UnknownVariable(String),
    #[error("invalid value '{value}' for '{name}': expected {expected}")]
    InvalidValue {
        name: String,
        value: String,
        expected: &'static str,
    },
    #[error("expected name=value, got '{0}'")]
    MalformedAssignment(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// ============================================================================
// POLICIES
// ============================================================================

/// Order in which parameter tables are layered for an instantiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Caller scope overrides subcircuit defaults, which override the call's
    /// own assignments.
    #[default]
    Global,
    /// The call's own assignments override defaults, which override the
    /// caller scope.
    Local,
}

/// How an instance name is joined to a local name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatMode {
    /// `name<c>inst`
    #[default]
    Wrspice,
    /// `inst<c>name`, devices keep their key letter first.
    Spice3,
}

// ============================================================================
// DIRECTIVES
// ============================================================================

/// Spellings of the directives the expander recognizes. Comparison ignores case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Directives {
    pub subckt_start: Vec<String>,
    pub subckt_end: Vec<String>,
    /// First character(s) of an instantiation statement.
    pub call_prefix: String,
    pub model: String,
    pub global: String,
    pub param: String,
    pub cache_start: String,
    pub cache_end: String,
}

impl Default for Directives {
    fn default() -> Self {
        Self {
            subckt_start: vec![".subckt".into(), ".macro".into()],
            subckt_end: vec![".ends".into(), ".eom".into()],
            call_prefix: "x".into(),
            model: ".model".into(),
            global: ".global".into(),
            param: ".param".into(),
            cache_start: ".cache".into(),
            cache_end: ".endcache".into(),
        }
    }
}

impl Directives {
    pub fn is_start(&self, keyword: &str) -> bool {
        self.subckt_start.iter().any(|d| d.eq_ignore_ascii_case(keyword))
    }

    pub fn is_end(&self, keyword: &str) -> bool {
        self.subckt_end.iter().any(|d| d.eq_ignore_ascii_case(keyword))
    }

    pub fn is_model(&self, keyword: &str) -> bool {
        self.model.eq_ignore_ascii_case(keyword)
    }

    pub fn is_global(&self, keyword: &str) -> bool {
        self.global.eq_ignore_ascii_case(keyword)
    }

    pub fn is_param(&self, keyword: &str) -> bool {
        self.param.eq_ignore_ascii_case(keyword)
    }

    pub fn is_cache_start(&self, keyword: &str) -> bool {
        self.cache_start.eq_ignore_ascii_case(keyword)
    }

    pub fn is_cache_end(&self, keyword: &str) -> bool {
        self.cache_end.eq_ignore_ascii_case(keyword)
    }

    /// True when the statement's first word starts with the call prefix.
    pub fn is_call(&self, first_word: &str) -> bool {
        let prefix = self.call_prefix.as_str();
        !prefix.is_empty()
            && first_word
                .get(..prefix.len())
                .map_or(false, |head| head.eq_ignore_ascii_case(prefix))
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpandConfig {
    pub case_policy: KeyPolicy,
    pub param_merge: MergePolicy,
    pub cat_mode: CatMode,
    pub cat_char: char,
    /// Parameter-substitute positional node tokens.
    pub subst_nodes: bool,
    pub max_depth: usize,
    /// Report model names that resolve to no `.model` statement.
    pub strict_models: bool,
    /// Instance-name prefix to device letter, applied to calls whose
    /// subcircuit is unknown.
    pub prefix_map: BTreeMap<String, char>,
    pub directives: Directives,
}

impl Default for ExpandConfig {
    fn default() -> Self {
        Self {
            case_policy: KeyPolicy::Insensitive,
            param_merge: MergePolicy::Global,
            cat_mode: CatMode::Wrspice,
            cat_char: '_',
            subst_nodes: false,
            max_depth: DEFAULT_MAX_DEPTH,
            strict_models: false,
            prefix_map: BTreeMap::new(),
            directives: Directives::default(),
        }
    }
}

impl ExpandConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Sets one variable by its classic name.
    pub fn set_var(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |expected: &'static str| ConfigError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
            expected,
        };
        match name.to_ascii_lowercase().as_str() {
            "subc_catchar" => {
                let mut chars = value.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if !c.is_whitespace() => self.cat_char = c,
                    _ => return Err(invalid("a single non-blank character")),
                }
            }
            "subc_catmode" => {
                self.cat_mode = match value.to_ascii_lowercase().as_str() {
                    "wrspice" => CatMode::Wrspice,
                    "spice3" => CatMode::Spice3,
                    _ => return Err(invalid("wrspice or spice3")),
                }
            }
            "parhier" => {
                self.param_merge = match value.to_ascii_lowercase().as_str() {
                    "global" => MergePolicy::Global,
                    "local" => MergePolicy::Local,
                    _ => return Err(invalid("global or local")),
                }
            }
            "case_sensitive" => {
                self.case_policy = if parse_flag(value).ok_or_else(|| invalid("a boolean"))? {
                    KeyPolicy::Sensitive
                } else {
                    KeyPolicy::Insensitive
                }
            }
            "subst_nodes" => {
                self.subst_nodes = parse_flag(value).ok_or_else(|| invalid("a boolean"))?
            }
            "strict_models" => {
                self.strict_models = parse_flag(value).ok_or_else(|| invalid("a boolean"))?
            }
            "max_depth" => match value.parse::<usize>() {
                Ok(depth) if depth > 0 => self.max_depth = depth,
                _ => return Err(invalid("a positive integer")),
            },
            "substart" => self.directives.subckt_start = vec![directive(value, &invalid)?],
            "subend" => self.directives.subckt_end = vec![directive(value, &invalid)?],
            "subinvoke" => self.directives.call_prefix = directive(value, &invalid)?,
            "modelcard" => self.directives.model = directive(value, &invalid)?,
            _ => return Err(ConfigError::UnknownVariable(name.to_string())),
        }
        Ok(())
    }

    /// Applies a `name=value` override, as given on the command line.
    pub fn set_assignment(&mut self, text: &str) -> Result<(), ConfigError> {
        let (name, value) = text
            .split_once('=')
            .ok_or_else(|| ConfigError::MalformedAssignment(text.to_string()))?;
        self.set_var(name.trim(), value.trim())
    }

    /// Device letter for an instance name, longest matching prefix first.
    pub fn map_prefix(&self, instance: &str) -> Option<char> {
        self.prefix_map
            .iter()
            .filter(|(prefix, _)| {
                instance.len() > prefix.len()
                    && instance
                        .get(..prefix.len())
                        .map_or(false, |head| head.eq_ignore_ascii_case(prefix))
            })
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, letter)| *letter)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn directive(
    value: &str,
    invalid: &dyn Fn(&'static str) -> ConfigError,
) -> Result<String, ConfigError> {
    let value = value.trim();
    if value.is_empty() || value.contains(char::is_whitespace) {
        return Err(invalid("a single word"));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_classic_behavior() {
        let config = ExpandConfig::default();
        assert_eq!(config.cat_char, '_');
        assert_eq!(config.cat_mode, CatMode::Wrspice);
        assert_eq!(config.param_merge, MergePolicy::Global);
        assert_eq!(config.max_depth, 16);
        assert!(config.directives.is_start(".SUBCKT"));
        assert!(config.directives.is_end(".eom"));
        assert!(config.directives.is_call("X1"));
        assert!(!config.directives.is_call("r1"));
    }

    #[test]
    fn variables_update_policies() {
        let mut config = ExpandConfig::default();
        config.set_var("subc_catmode", "spice3").unwrap();
        config.set_var("SUBC_CATCHAR", ":").unwrap();
        config.set_assignment("parhier = local").unwrap();
        config.set_var("case_sensitive", "on").unwrap();
        config.set_var("subinvoke", "u").unwrap();
        assert_eq!(config.cat_mode, CatMode::Spice3);
        assert_eq!(config.cat_char, ':');
        assert_eq!(config.param_merge, MergePolicy::Local);
        assert_eq!(config.case_policy, KeyPolicy::Sensitive);
        assert!(config.directives.is_call("u7"));
    }

    #[test]
    fn bad_variables_are_rejected() {
        let mut config = ExpandConfig::default();
        assert!(matches!(
            config.set_var("nosuch", "1"),
            Err(ConfigError::UnknownVariable(_))
        ));
        assert!(matches!(
            config.set_var("max_depth", "0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(config.set_var("subc_catchar", "ab").is_err());
        assert!(config.set_assignment("parhier").is_err());
    }

    #[test]
    fn yaml_fills_missing_fields_with_defaults() {
        let config = ExpandConfig::from_yaml(
            "cat_mode: spice3\nprefix_map:\n  xm: m\ndirectives:\n  call_prefix: y\n",
        )
        .unwrap();
        assert_eq!(config.cat_mode, CatMode::Spice3);
        assert_eq!(config.max_depth, 16);
        assert_eq!(config.directives.call_prefix, "y");
        assert_eq!(config.directives.model, ".model");
        assert_eq!(config.map_prefix("XM12"), Some('m'));
        assert_eq!(config.map_prefix("xm"), None);
    }
}
