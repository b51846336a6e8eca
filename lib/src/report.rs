//! Text rendering of catalogs, deprecation summaries and migration reports.

use std::fmt::Write as _;

use crate::catalog::CatalogSnapshot;
use crate::pipeline::MigrationReport;
use crate::schema::DeprecationSummary;
use crate::types::{ChangeKind, Severity};

/// Indented line collector for tree-style terminal output.
#[derive(Default)]
pub struct TreeFormatter {
    lines: Vec<(usize, String)>,
}

impl TreeFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_line(&mut self, depth: usize, text: &str) {
        self.lines.push((depth, text.to_string()));
    }
}

impl std::fmt::Display for TreeFormatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (depth, text)) in self.lines.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}{}", "  ".repeat(*depth), text)?;
        }
        Ok(())
    }
}

pub fn format_catalog(snapshot: &CatalogSnapshot) -> String {
    let mut tree = TreeFormatter::new();
    tree.add_line(0, "GraphQL Catalog");
    tree.add_line(1, &format!("Files scanned: {}", snapshot.file_count));

    tree.add_line(1, &format!("Operations ({})", snapshot.operations.len()));
    for op in &snapshot.operations {
        let mut line = format!("{} [{}] ({})", op.name, op.kind, op.file_path.display());
        if !op.fragment_refs.is_empty() {
            let _ = write!(line, " spreads: {}", op.fragment_refs.join(", "));
        }
        if !op.name_resolved {
            line.push_str(" [unresolved name]");
        }
        tree.add_line(2, &line);
    }

    tree.add_line(1, &format!("Fragments ({})", snapshot.fragments.len()));
    for fragment in &snapshot.fragments {
        tree.add_line(
            2,
            &format!("{} ({})", fragment.name, fragment.file_path.display()),
        );
    }

    tree.to_string()
}

pub fn format_deprecation_summary(summary: &DeprecationSummary) -> String {
    let mut tree = TreeFormatter::new();
    tree.add_line(0, "Schema deprecations");
    tree.add_line(1, &format!("Total: {}", summary.total));
    tree.add_line(1, &format!("Replaceable: {}", summary.replaceable));
    tree.add_line(1, &format!("Vague (comment-out): {}", summary.vague));
    tree.add_line(1, &format!("Field-level: {}", summary.field_level));
    tree.add_line(1, &format!("Argument-level: {}", summary.argument_level));
    tree.to_string()
}

pub fn format_report(report: &MigrationReport) -> String {
    let mut tree = TreeFormatter::new();
    let summary = &report.summary;

    tree.add_line(0, "Migration Report");
    tree.add_line(
        1,
        &format!(
            "Files: {} scanned, {} modified",
            summary.files_scanned, summary.files_modified
        ),
    );
    tree.add_line(
        1,
        &format!(
            "Operations: {} ({} fragments)",
            summary.operations, summary.fragments
        ),
    );
    tree.add_line(
        1,
        &format!(
            "Transformed: {} ({} automatic, {} semi-automatic, {} manual)",
            summary.transformed, summary.automatic, summary.semi_automatic, summary.manual
        ),
    );
    if summary.rejected_by_gate > 0 {
        tree.add_line(
            1,
            &format!("Rejected by confidence gate: {}", summary.rejected_by_gate),
        );
    }

    for transformation in &report.transformations {
        tree.add_line(
            1,
            &format!(
                "{} — confidence {} ({})",
                transformation.operation_id, transformation.confidence, transformation.category
            ),
        );
        for change in &transformation.changes {
            let kind = match change.kind {
                ChangeKind::FieldRename => "field-rename",
                ChangeKind::ArgumentRename => "argument-rename",
                ChangeKind::PathRewrite => "path-rewrite",
                ChangeKind::CommentOut => "comment-out",
            };
            let detail = if change.after.is_empty() {
                format!("{kind} {} at {} ({})", change.before, change.path, change.rule_id)
            } else {
                format!(
                    "{kind} {} -> {} at {} ({})",
                    change.before, change.after, change.path, change.rule_id
                )
            };
            tree.add_line(2, &detail);
        }
        for risk in &transformation.risks {
            tree.add_line(2, &format!("risk: {risk}"));
        }
    }

    if !report.incidents.is_empty() {
        tree.add_line(1, &format!("Incidents ({})", report.incidents.len()));
        for incident in &report.incidents {
            let tag = match incident.severity {
                Severity::Warning => "warning",
                Severity::Error => "error",
                Severity::Fatal => "fatal",
            };
            tree.add_line(2, &format!("{tag}: {incident}"));
        }
    }

    tree.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::OperationCatalog;
    use crate::config::RunOptions;
    use crate::extraction::extract_source;
    use crate::resolve::names::resolve_names;
    use std::path::Path;

    #[test]
    fn tree_formatter_indents_by_depth() {
        let mut tree = TreeFormatter::new();
        tree.add_line(0, "root");
        tree.add_line(1, "child");
        tree.add_line(2, "grandchild");
        tree.add_line(1, "sibling");
        insta::assert_snapshot!(tree.to_string(), @r"
        root
          child
            grandchild
          sibling
        ");
    }

    #[test]
    fn catalog_rendering_lists_operations_and_fragments() {
        let catalog = OperationCatalog::new();
        let src = "const q = gql`query GetShop { shop { id ...shopFields } }`;\nconst f = gql`fragment shopFields on Shop { name }`;\n";
        let extraction = extract_source(Path::new("src/shop.ts"), src, &RunOptions::default());
        catalog.ingest(&extraction, src);
        resolve_names(&catalog, &Default::default());

        let rendered = format_catalog(&catalog.snapshot(1, true));
        insta::assert_snapshot!(rendered, @r"
        GraphQL Catalog
          Files scanned: 1
          Operations (2)
            GetShop [query] (src/shop.ts) spreads: shopFields
            shopFields [fragment] (src/shop.ts)
          Fragments (1)
            shopFields (src/shop.ts)
        ");
    }
}
