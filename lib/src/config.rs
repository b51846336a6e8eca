//! Run configuration: the explicit context value threaded through every
//! pipeline stage in place of global singletons.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use globset::Glob;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Pluck,
    Ast,
    Hybrid,
}

impl FromStr for StrategyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pluck" => Ok(StrategyKind::Pluck),
            "ast" => Ok(StrategyKind::Ast),
            "hybrid" => Ok(StrategyKind::Hybrid),
            other => Err(anyhow::anyhow!("unknown extraction strategy: {other}")),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Pluck => write!(f, "pluck"),
            StrategyKind::Ast => write!(f, "ast"),
            StrategyKind::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Maps dotted host expressions like `queryNames.byIdV1` to canonical
/// operation names. The host may register additional keys at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NameDictionary {
    entries: FxHashMap<String, String>,
}

impl NameDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, dotted_key: impl Into<String>, name: impl Into<String>) {
        self.entries.insert(dotted_key.into(), name.into());
    }

    pub fn lookup(&self, dotted_key: &str) -> Option<&str> {
        self.entries.get(dotted_key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for NameDictionary {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    pub automatic: u8,
    pub semi_automatic: u8,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            automatic: 90,
            semi_automatic: 70,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaSource {
    Text(String),
    Path(PathBuf),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    pub root: PathBuf,
    pub include: Vec<String>,
    pub ignore: Vec<String>,
    pub schema: Option<SchemaSource>,
    pub strategy: StrategyKind,
    pub name_dictionary: NameDictionary,
    pub preserve_source_positions: bool,
    pub resolve_fragments: bool,
    pub dry_run: bool,
    pub validate_against_schema: bool,
    pub thresholds: ConfidenceThresholds,
    pub min_confidence: u8,
    pub concurrency: usize,
    /// Tag identifiers recognized in front of template literals.
    pub tags: Vec<String>,
    /// Callee identifiers recognized for call-expression extraction.
    pub calls: Vec<String>,
    /// Variable-name suffixes for the plain string-assignment fallback.
    pub variable_suffixes: Vec<String>,
    pub verbose: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            include: vec!["**/*.ts".to_string(), "**/*.tsx".to_string()],
            ignore: vec!["**/node_modules/**".to_string()],
            schema: None,
            strategy: StrategyKind::Hybrid,
            name_dictionary: NameDictionary::new(),
            preserve_source_positions: true,
            resolve_fragments: true,
            dry_run: false,
            validate_against_schema: false,
            thresholds: ConfidenceThresholds::default(),
            min_confidence: 0,
            concurrency: 4,
            tags: vec!["gql".to_string(), "graphql".to_string()],
            calls: vec!["gql".to_string(), "graphql".to_string()],
            variable_suffixes: vec![
                "Query".to_string(),
                "Mutation".to_string(),
                "Subscription".to_string(),
                "Fragment".to_string(),
            ],
            verbose: false,
        }
    }
}

impl RunOptions {
    /// Configuration problems are fatal for the whole run and must surface
    /// before any I/O happens.
    pub fn validate(&self) -> Result<()> {
        for pattern in self.include.iter().chain(self.ignore.iter()) {
            Glob::new(pattern)
                .map_err(|e| anyhow::anyhow!("invalid glob pattern {pattern:?}: {e}"))?;
        }
        if self.concurrency == 0 {
            return Err(anyhow::anyhow!("concurrency must be at least 1"));
        }
        if self.thresholds.semi_automatic > self.thresholds.automatic {
            return Err(anyhow::anyhow!(
                "semi-automatic threshold {} exceeds automatic threshold {}",
                self.thresholds.semi_automatic,
                self.thresholds.automatic
            ));
        }
        Ok(())
    }

    pub fn is_tag(&self, ident: &str) -> bool {
        self.tags.iter().any(|t| t == ident)
    }

    pub fn is_call(&self, ident: &str) -> bool {
        self.calls.iter().any(|c| c == ident)
    }

    pub fn is_operation_variable(&self, ident: &str) -> bool {
        let lowered = ident.to_ascii_lowercase();
        self.variable_suffixes
            .iter()
            .any(|s| lowered.ends_with(&s.to_ascii_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_round_trips_from_str() {
        assert_eq!("pluck".parse::<StrategyKind>().unwrap(), StrategyKind::Pluck);
        assert_eq!("ast".parse::<StrategyKind>().unwrap(), StrategyKind::Ast);
        assert_eq!(
            "hybrid".parse::<StrategyKind>().unwrap(),
            StrategyKind::Hybrid
        );
        assert!("regex".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn invalid_glob_is_a_configuration_error() {
        let options = RunOptions {
            include: vec!["**/*.{ts".to_string()],
            ..RunOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn default_options_validate() {
        assert!(RunOptions::default().validate().is_ok());
    }

    #[test]
    fn dictionary_extension_hook() {
        let mut dict = NameDictionary::new();
        dict.register("queryNames.byIdV1", "GetById");
        dict.register("queryNames.list", "ListVentures");
        assert_eq!(dict.lookup("queryNames.byIdV1"), Some("GetById"));
        assert_eq!(dict.lookup("queryNames.missing"), None);
        assert_eq!(dict.len(), 2);
    }

    #[test]
    fn operation_variable_suffix_matching_is_case_insensitive() {
        let options = RunOptions::default();
        assert!(options.is_operation_variable("VENTURE_FRAGMENT"));
        assert!(options.is_operation_variable("userQuery"));
        assert!(!options.is_operation_variable("helpers"));
    }
}
