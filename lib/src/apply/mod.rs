//! AST code applicator: splices transformed GraphQL back into host files.
//!
//! Only the bytes of each template literal's body are ever rewritten; the
//! tag, backticks, call parenthesization, surrounding code and every
//! interpolated host expression survive byte for byte. After all splices the
//! host file is re-parsed; a parse failure rolls the whole file back.

use std::collections::BTreeMap;
use std::path::Path;

use rustc_hash::FxHashMap;
use swc_core::common::BytePos;
use swc_core::ecma::parser::{lexer::Lexer, Parser, StringInput, Syntax, TsSyntax};

use crate::extraction::placeholder;
use crate::types::{Incident, IncidentKind, Operation, Severity, Transformation};

#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub file_path: std::path::PathBuf,
    /// New file contents, when at least one transformation survived.
    pub proposed: Option<String>,
    pub applied_operations: Vec<String>,
    pub rejected: Vec<Incident>,
    pub fatal: Option<Incident>,
}

impl FileOutcome {
    fn untouched(file_path: &Path) -> Self {
        Self {
            file_path: file_path.to_path_buf(),
            proposed: None,
            applied_operations: Vec::new(),
            rejected: Vec::new(),
            fatal: None,
        }
    }
}

/// Apply a file's transformations. `file_ops` must contain every catalog
/// operation extracted from this file (transformed or not) so that blocks
/// holding several definitions can be rebuilt in full.
pub fn apply_file(
    file_path: &Path,
    source: &str,
    file_ops: &[Operation],
    transforms: &FxHashMap<String, &Transformation>,
) -> FileOutcome {
    let mut outcome = FileOutcome::untouched(file_path);

    // Group operations into their template blocks, ascending by position.
    let mut blocks: BTreeMap<(usize, usize), Vec<&Operation>> = BTreeMap::new();
    for op in file_ops {
        blocks.entry(op.mapping.body_span).or_default().push(op);
    }

    let mut edits: Vec<((usize, usize), String)> = Vec::new();
    for (body_span, mut ops) in blocks {
        ops.sort_by_key(|op| op.mapping.def_index);
        if !ops.iter().any(|op| transforms.contains_key(&op.id)) {
            continue;
        }
        if let Some(new_body) = rebuild_block(source, &ops, transforms, &mut outcome) {
            edits.push((body_span, new_body));
        }
    }

    if edits.is_empty() {
        return outcome;
    }

    // Ranges come from a BTreeMap so they are already ascending; overlap
    // would mean the extraction stage produced garbage.
    for pair in edits.windows(2) {
        if pair[0].0 .1 > pair[1].0 .0 {
            outcome.applied_operations.clear();
            outcome.fatal = Some(
                Incident::new(
                    IncidentKind::Applicator,
                    Severity::Fatal,
                    file_path,
                    "E_OVERLAPPING_RANGES",
                    "transformations target overlapping byte ranges",
                )
                .at_offset(source, pair[1].0 .0),
            );
            return outcome;
        }
    }

    let mut new_source = String::with_capacity(source.len());
    let mut cursor = 0;
    for ((start, end), new_body) in &edits {
        new_source.push_str(&source[cursor..*start]);
        new_source.push_str(new_body);
        cursor = *end;
    }
    new_source.push_str(&source[cursor..]);

    if let Err(message) = reparse(file_path, &new_source) {
        outcome.applied_operations.clear();
        outcome.fatal = Some(Incident::new(
            IncidentKind::Applicator,
            Severity::Fatal,
            file_path,
            "E_REPARSE",
            format!("host file no longer parses after splice: {message}"),
        ));
        return outcome;
    }

    outcome.proposed = Some(new_source);
    outcome
}

/// Single-operation convenience for hosts driving the applicator directly:
/// produce the per-file patch for one transformation without touching disk.
/// The operation must be its block's only definition.
pub fn apply_operation(
    op: &Operation,
    transformation: &Transformation,
    source: &str,
) -> Result<crate::types::FilePatch, Incident> {
    let ops = [op.clone()];
    let transforms: FxHashMap<String, &Transformation> =
        [(op.id.clone(), transformation)].into_iter().collect();
    let outcome = apply_file(&op.file_path, source, &ops, &transforms);
    if let Some(fatal) = outcome.fatal {
        return Err(fatal);
    }
    if let Some(rejection) = outcome.rejected.into_iter().next() {
        return Err(rejection);
    }
    Ok(crate::types::FilePatch {
        file_path: op.file_path.clone(),
        original: source.to_string(),
        proposed: outcome.proposed.unwrap_or_else(|| source.to_string()),
    })
}

/// Rebuild one template block's body. Transformations that lost or
/// duplicated a placeholder are rejected individually; the block falls back
/// to the operation's original text for those definitions.
fn rebuild_block(
    source: &str,
    ops: &[&Operation],
    transforms: &FxHashMap<String, &Transformation>,
    outcome: &mut FileOutcome,
) -> Option<String> {
    let sites = &ops[0].mapping.sites;
    let mut texts: Vec<String> = Vec::with_capacity(ops.len());
    let mut any_applied = false;

    for op in ops {
        match transforms.get(&op.id) {
            Some(transformation) => {
                let mut verified = true;
                for site in sites {
                    let expected = placeholder::count_token(&op.parsed_text, &site.placeholder);
                    if expected == 0 {
                        continue;
                    }
                    let found = placeholder::count_token(
                        &transformation.transformed_text,
                        &site.placeholder,
                    );
                    if found != expected {
                        outcome.rejected.push(
                            Incident::new(
                                IncidentKind::RuleApplication,
                                Severity::Error,
                                &op.file_path,
                                "E_PLACEHOLDER_MISMATCH",
                                format!(
                                    "transformation of `{}` {} interpolation `${{{}}}`",
                                    op.name,
                                    if found < expected { "drops" } else { "duplicates" },
                                    site.expression
                                ),
                            )
                            .at_offset(source, op.mapping.body_span.0 + site.offset),
                        );
                        verified = false;
                        break;
                    }
                }
                if verified {
                    texts.push(transformation.transformed_text.trim().to_string());
                    outcome.applied_operations.push(op.id.clone());
                    any_applied = true;
                } else {
                    texts.push(op.parsed_text.trim().to_string());
                }
            }
            None => texts.push(op.parsed_text.trim().to_string()),
        }
    }

    if !any_applied {
        return None;
    }

    let joined = texts.join("\n\n");
    let mut restored = joined;
    for site in sites {
        restored = placeholder::replace_token(&restored, &site.placeholder, &site.host_text());
    }

    // Keep the body's original leading/trailing whitespace so the literal's
    // delimiters and indentation style stay put.
    let body = &source[ops[0].mapping.body_span.0..ops[0].mapping.body_span.1];
    let leading = &body[..body.len() - body.trim_start().len()];
    let trailing = &body[body.trim_end().len()..];
    Some(format!("{leading}{restored}{trailing}"))
}

fn reparse(file_path: &Path, source: &str) -> Result<(), String> {
    let syntax = Syntax::Typescript(TsSyntax {
        tsx: file_path.extension().and_then(|s| s.to_str()) == Some("tsx"),
        ..Default::default()
    });
    let lexer = Lexer::new(
        syntax,
        Default::default(),
        StringInput::new(source, BytePos(0), BytePos(source.len() as u32)),
        None,
    );
    let mut parser = Parser::new_from(lexer);
    parser.parse_module().map(|_| ()).map_err(|e| format!("{e:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{normalize_text, OperationCatalog};
    use crate::config::{ConfidenceThresholds, RunOptions};
    use crate::extraction::extract_source;
    use crate::schema::{parse_schema_text, DeprecationRuleSet, SchemaIndex};
    use crate::transform::{transform_operation, TransformContext};
    use std::path::PathBuf;

    fn apply_with_schema(src: &str, schema_text: &str) -> (FileOutcome, Vec<Operation>) {
        let path = PathBuf::from("test.ts");
        let catalog = OperationCatalog::new();
        let extraction = extract_source(&path, src, &RunOptions::default());
        catalog.ingest(&extraction, src);
        let ops = catalog.operations_sorted();

        let doc = parse_schema_text(schema_text).unwrap();
        let rules = DeprecationRuleSet::analyze(&doc);
        let schema = SchemaIndex::from_document(&doc);
        let ctx = TransformContext {
            rules: &rules,
            schema: Some(&schema),
            thresholds: ConfidenceThresholds::default(),
            validate: false,
        };

        let transformations: Vec<Transformation> = ops
            .iter()
            .map(|op| transform_operation(op, &ctx).unwrap())
            .filter(|t| !t.is_noop())
            .collect();
        let transforms: FxHashMap<String, &Transformation> = transformations
            .iter()
            .map(|t| (t.operation_id.clone(), t))
            .collect();

        (apply_file(&path, src, &ops, &transforms), ops)
    }

    const RENAME_SCHEMA: &str = r#"
        type Query { venture(id: ID!): Venture @deprecated(reason: "Use ventureNode") ventureNode(id: ID!): Venture }
        type Venture { id: ID! }
    "#;

    #[test]
    fn splices_only_the_template_body() {
        let src = "import { gql } from \"graphql-tag\";\n\n// fetches one venture\nconst q = gql`query Q { venture(id: \"1\") { id } }`;\nexport default q;\n";
        let (outcome, _) = apply_with_schema(src, RENAME_SCHEMA);

        let proposed = outcome.proposed.expect("file should be rewritten");
        assert!(outcome.fatal.is_none());
        assert!(proposed.starts_with("import { gql } from \"graphql-tag\";\n\n// fetches one venture\nconst q = gql`"));
        assert!(proposed.ends_with("`;\nexport default q;\n"));
        assert!(proposed.contains("ventureNode(id: \"1\")"));
        assert!(!proposed.contains("venture(id: \"1\")"));
    }

    #[test]
    fn untransformed_file_is_untouched() {
        let src = "const q = gql`query Q { other { id } }`;";
        let (outcome, _) = apply_with_schema(src, RENAME_SCHEMA);
        assert!(outcome.proposed.is_none());
        assert!(outcome.applied_operations.is_empty());
    }

    #[test]
    fn interpolations_survive_in_place() {
        let src = "const q = gql`query ${queryNames.byIdV1}($id: UUID!) { venture(ventureId: $id) { ...ventureFields } }`;";
        let schema = r#"
            type Query { venture(ventureId: UUID): Venture @deprecated(reason: "Use ventureNode") ventureNode(ventureId: UUID): Venture }
            type Venture { id: ID }
        "#;
        let (outcome, _) = apply_with_schema(src, schema);

        let proposed = outcome.proposed.expect("file should be rewritten");
        assert!(proposed.contains("${queryNames.byIdV1}"));
        assert!(proposed.contains("...ventureFields"));
        assert!(proposed.contains("ventureNode(ventureId: $id)"));
    }

    #[test]
    fn dropped_interpolation_rejects_the_transformation() {
        // The deprecated field's subtree holds the only interpolated spread;
        // commenting it out would lose the `${…}` site.
        let src = "const q = gql`query Q { legacyBlock { ...${extraFields} } }`;";
        let schema = r#"
            type Query { legacyBlock: Block @deprecated(reason: "going away, see the migration guide") }
            type Block { id: ID }
        "#;
        let (outcome, _) = apply_with_schema(src, schema);

        assert!(outcome.proposed.is_none());
        assert!(outcome.applied_operations.is_empty());
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].code, "E_PLACEHOLDER_MISMATCH");
    }

    #[test]
    fn reparse_failure_rolls_back_the_file() {
        let path = PathBuf::from("test.ts");
        let src = "const q = gql`query Q { venture { id } }`;";
        let catalog = OperationCatalog::new();
        let extraction = extract_source(&path, src, &RunOptions::default());
        catalog.ingest(&extraction, src);
        let ops = catalog.operations_sorted();

        // A transformation that smuggles a backtick into the literal body.
        let sabotage = Transformation {
            operation_id: ops[0].id.clone(),
            original_text: ops[0].parsed_text.clone(),
            transformed_text: "query Q { venture { id ` } }".to_string(),
            changes: Vec::new(),
            warnings: Vec::new(),
            confidence: 100,
            category: crate::types::Category::Automatic,
            risks: Vec::new(),
            document: None,
        };
        let transforms: FxHashMap<String, &Transformation> =
            [(ops[0].id.clone(), &sabotage)].into_iter().collect();

        let outcome = apply_file(&path, src, &ops, &transforms);
        assert!(outcome.proposed.is_none());
        assert!(outcome.applied_operations.is_empty());
        let fatal = outcome.fatal.expect("reparse failure must be fatal");
        assert_eq!(fatal.code, "E_REPARSE");
        assert_eq!(fatal.kind, IncidentKind::Applicator);
    }

    #[test]
    fn multi_definition_block_is_rebuilt_whole() {
        let src = "const doc = gql`query Q { venture(id: \"1\") { id } }\n\nfragment extra on Venture { id }`;";
        let (outcome, _) = apply_with_schema(src, RENAME_SCHEMA);

        let proposed = outcome.proposed.expect("file should be rewritten");
        assert!(proposed.contains("ventureNode"));
        assert!(proposed.contains("fragment extra on Venture"));
        assert_eq!(outcome.applied_operations.len(), 1);
    }

    #[test]
    fn apply_operation_returns_a_patch() {
        let path = PathBuf::from("test.ts");
        let src = "const q = gql`query Q { venture(id: \"1\") { id } }`;";
        let catalog = OperationCatalog::new();
        let extraction = extract_source(&path, src, &RunOptions::default());
        catalog.ingest(&extraction, src);
        let ops = catalog.operations_sorted();
        let op = &ops[0];

        let doc = parse_schema_text(RENAME_SCHEMA).unwrap();
        let rules = DeprecationRuleSet::analyze(&doc);
        let schema = SchemaIndex::from_document(&doc);
        let ctx = TransformContext {
            rules: &rules,
            schema: Some(&schema),
            thresholds: ConfidenceThresholds::default(),
            validate: false,
        };
        let transformation = transform_operation(op, &ctx).unwrap();

        let patch = apply_operation(op, &transformation, src).unwrap();
        assert_eq!(patch.original, src);
        assert!(patch.proposed.contains("ventureNode"));
    }

    #[test]
    fn body_whitespace_frame_is_preserved() {
        let src = "const q = gql`\n  query Q { venture(id: \"1\") { id } }\n`;";
        let (outcome, _) = apply_with_schema(src, RENAME_SCHEMA);
        let proposed = outcome.proposed.expect("file should be rewritten");
        assert!(proposed.contains("gql`\n"));
        assert!(proposed.ends_with("\n`;"));
        assert_eq!(
            normalize_text(&proposed),
            normalize_text("const q = gql` query Q { ventureNode(id: \"1\") { id } } `;")
        );
    }
}
