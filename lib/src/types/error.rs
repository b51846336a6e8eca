//! Incident records for everything the pipeline surfaces without aborting.
//!
//! Errors are grouped by kind, not by thrown type: host parse failures,
//! embedded GraphQL failures, unresolved references, rule application
//! problems, applicator failures and configuration errors each carry a
//! machine code plus enough location data to point at the offending bytes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncidentKind {
    HostParse,
    GraphqlParse,
    UnresolvedReference,
    RuleApplication,
    Applicator,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub kind: IncidentKind,
    pub severity: Severity,
    pub file: PathBuf,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub offset: Option<usize>,
    pub message: String,
    pub code: String,
}

impl Incident {
    pub fn new(
        kind: IncidentKind,
        severity: Severity,
        file: &Path,
        code: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            file: file.to_path_buf(),
            line: None,
            column: None,
            offset: None,
            message: message.into(),
            code: code.to_string(),
        }
    }

    /// Attach a byte offset and derive line/column from the source text.
    pub fn at_offset(mut self, source: &str, offset: usize) -> Self {
        let (line, column) = line_col(source, offset);
        self.offset = Some(offset);
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl std::fmt::Display for Incident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.file.display())?;
        if let (Some(line), Some(column)) = (self.line, self.column) {
            write!(f, ":{line}:{column}")?;
        } else if let Some(offset) = self.offset {
            write!(f, "@{offset}")?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for Incident {}

/// 1-based line/column for a byte offset.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let clamped = offset.min(source.len());
    let prefix = &source[..clamped];
    let line = prefix.bytes().filter(|b| *b == b'\n').count() + 1;
    let column = match prefix.rfind('\n') {
        Some(pos) => clamped - pos,
        None => clamped + 1,
    };
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_first_line() {
        assert_eq!(line_col("abc", 0), (1, 1));
        assert_eq!(line_col("abc", 2), (1, 3));
    }

    #[test]
    fn line_col_after_newlines() {
        let src = "line one\nline two\nline three";
        let offset = src.find("two").unwrap();
        assert_eq!(line_col(src, offset), (2, 6));
    }

    #[test]
    fn incident_display_includes_code_and_position() {
        let src = "const q = gql`query {`;\n";
        let incident = Incident::new(
            IncidentKind::GraphqlParse,
            Severity::Error,
            Path::new("src/queries.ts"),
            "E_GQL_PARSE",
            "unexpected end of input",
        )
        .at_offset(src, 14);
        let rendered = incident.to_string();
        assert!(rendered.starts_with("[E_GQL_PARSE] src/queries.ts:1:15"));
        assert!(rendered.contains("unexpected end of input"));
    }
}
