//! Transformation records: the ordered change log, warnings, confidence
//! categories and the per-file patch structure returned by dry runs.

use std::path::PathBuf;

use graphql_parser::query::Document;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeKind {
    FieldRename,
    ArgumentRename,
    PathRewrite,
    CommentOut,
}

/// The smallest recorded rewrite step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Dotted selection path inside the operation, e.g. `venture.logoUrl`.
    pub path: String,
    pub kind: ChangeKind,
    pub before: String,
    pub after: String,
    /// Dotted path of the triggering deprecation rule.
    pub rule_id: String,
    pub breaking: bool,
    /// Whether the rewritten subtree contained an interpolated fragment
    /// spread; such edits sit next to host expressions the engine cannot see
    /// into and are scored down accordingly.
    pub touches_interpolation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarnSeverity {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformWarning {
    pub severity: WarnSeverity,
    pub message: String,
    pub rule_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Automatic,
    SemiAutomatic,
    Manual,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Automatic => write!(f, "automatic"),
            Category::SemiAutomatic => write!(f, "semi-automatic"),
            Category::Manual => write!(f, "manual"),
        }
    }
}

/// The transformer's output for a single operation. Holds the operation id,
/// never the operation itself; the catalog owns operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    pub operation_id: String,
    pub original_text: String,
    pub transformed_text: String,
    pub changes: Vec<Change>,
    pub warnings: Vec<TransformWarning>,
    pub confidence: u8,
    pub category: Category,
    pub risks: Vec<String>,
    #[serde(skip)]
    pub document: Option<Document<'static, String>>,
}

impl Transformation {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn breaking_changes(&self) -> usize {
        self.changes.iter().filter(|c| c.breaking).count()
    }
}

/// Proposed new contents for one host file; what a non-dry run would write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePatch {
    pub file_path: PathBuf,
    pub original: String,
    pub proposed: String,
}

impl FilePatch {
    pub fn is_noop(&self) -> bool {
        self.original == self.proposed
    }
}
