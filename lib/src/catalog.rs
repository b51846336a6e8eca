//! Concurrent operation catalog and fragment dictionary.
//!
//! Extraction workers ingest template blocks in parallel; the catalog owns
//! operations by content-hash id, so the same operation found in two files
//! (or by two strategies) lands on one record. After the extraction stage
//! completes the catalog is treated as immutable except for name
//! normalization.

use std::hash::Hasher;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use graphql_parser::parse_query;
use graphql_parser::query::{
    Definition, Document, OperationDefinition, Selection, SelectionSet, Type,
};
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

use crate::extraction::FileExtraction;
use crate::types::{
    Fragment, Incident, IncidentKind, Operation, OperationKind, Severity, SourceMapping,
    VariableSpec,
};

/// Whitespace-collapsed form used for fingerprinting. Fragments are not
/// inlined; the id identifies the definition as written.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn fingerprint(text: &str) -> String {
    let mut hasher = FxHasher::default();
    hasher.write(normalize_text(text).as_bytes());
    format!("{:016x}", hasher.finish())
}

#[derive(Default)]
pub struct OperationCatalog {
    operations: Arc<DashMap<String, Operation>>,
    fragments: Arc<DashMap<String, Fragment>>,
}

/// Serializable, deterministically ordered view of the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub operations: Vec<Operation>,
    pub fragments: Vec<Fragment>,
    pub file_count: usize,
}

impl OperationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one file's template blocks into catalog records. Non-fatal
    /// problems come back as incidents; the file's remaining blocks are
    /// always processed.
    pub fn ingest(&self, extraction: &FileExtraction, source: &str) -> Vec<Incident> {
        let mut incidents = extraction.incidents.clone();

        for block in &extraction.blocks {
            if block.is_content_free() {
                if !block.sites.is_empty() {
                    incidents.push(
                        Incident::new(
                            IncidentKind::GraphqlParse,
                            Severity::Warning,
                            &extraction.file_path,
                            "W_INTERPOLATION_ONLY",
                            "template literal contains only interpolations; nothing to migrate",
                        )
                        .at_offset(source, block.body_span.0),
                    );
                }
                continue;
            }

            let document = match parse_query::<String>(&block.parseable) {
                Ok(document) => document.into_static(),
                Err(e) => {
                    incidents.push(
                        Incident::new(
                            IncidentKind::GraphqlParse,
                            Severity::Error,
                            &extraction.file_path,
                            "E_GQL_PARSE",
                            format!("embedded GraphQL failed to parse: {e}"),
                        )
                        .at_offset(source, block.body_span.0),
                    );
                    continue;
                }
            };

            let def_count = document.definitions.len();
            for (def_index, definition) in document.definitions.iter().enumerate() {
                let single = Document {
                    definitions: vec![definition.clone()],
                };
                let printed = single.to_string();
                let id = fingerprint(&printed);

                let (kind, name, variables, selection_set) = describe_definition(definition);
                let mut fragment_refs = Vec::new();
                if let Some(set) = selection_set {
                    collect_spreads(set, &mut fragment_refs);
                }

                if let Definition::Fragment(frag) = definition {
                    let fragment = Fragment {
                        name: frag.name.clone(),
                        text: printed.clone(),
                        file_path: extraction.file_path.clone(),
                        dependencies: fragment_refs.clone(),
                        document: Some(single.clone()),
                    };
                    match self.fragments.entry(frag.name.clone()) {
                        Entry::Occupied(mut entry) => {
                            // Deterministic winner regardless of worker order.
                            if fragment.file_path < entry.get().file_path {
                                entry.insert(fragment);
                            }
                        }
                        Entry::Vacant(entry) => {
                            entry.insert(fragment);
                        }
                    }
                }

                let operation = Operation {
                    id: id.clone(),
                    kind,
                    name: name.unwrap_or_default(),
                    name_resolved: false,
                    name_candidates: Vec::new(),
                    raw_text: block.body.clone(),
                    parsed_text: printed,
                    file_path: extraction.file_path.clone(),
                    mapping: SourceMapping {
                        file_path: extraction.file_path.clone(),
                        outer_span: block.outer_span,
                        body_span: block.body_span,
                        def_index,
                        def_count,
                        sites: block.sites.clone(),
                        strategy: block.strategy,
                    },
                    variables,
                    fragment_refs,
                    unresolved_fragments: Vec::new(),
                    document: Some(single),
                };
                match self.operations.entry(id) {
                    Entry::Occupied(mut entry) => {
                        // Ingestion runs on a worker pool; keep the mapping
                        // from the lexicographically first occurrence so
                        // runs are reproducible.
                        let existing = entry.get();
                        let replace = (
                            &operation.file_path,
                            operation.mapping.outer_span.0,
                            operation.mapping.def_index,
                        ) < (
                            &existing.file_path,
                            existing.mapping.outer_span.0,
                            existing.mapping.def_index,
                        );
                        if replace {
                            entry.insert(operation);
                        }
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(operation);
                    }
                }
            }
        }

        incidents
    }

    pub fn get(&self, id: &str) -> Option<Operation> {
        self.operations.get(id).map(|entry| entry.value().clone())
    }

    pub fn fragment(&self, name: &str) -> Option<Fragment> {
        self.fragments.get(name).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    pub fn update_operation(&self, id: &str, f: impl FnOnce(&mut Operation)) {
        if let Some(mut entry) = self.operations.get_mut(id) {
            f(entry.value_mut());
        }
    }

    /// Operations in deterministic (file, offset, definition) order — the
    /// visitation order name suffixing is defined against.
    pub fn operations_sorted(&self) -> Vec<Operation> {
        let mut ops: Vec<Operation> = self
            .operations
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        ops.sort_by(|a, b| {
            (&a.file_path, a.mapping.outer_span.0, a.mapping.def_index).cmp(&(
                &b.file_path,
                b.mapping.outer_span.0,
                b.mapping.def_index,
            ))
        });
        ops
    }

    pub fn fragments_sorted(&self) -> Vec<Fragment> {
        let mut frags: Vec<Fragment> = self
            .fragments
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        frags.sort_by(|a, b| a.name.cmp(&b.name));
        frags
    }

    pub fn snapshot(&self, file_count: usize, include_mappings: bool) -> CatalogSnapshot {
        let mut operations = self.operations_sorted();
        if !include_mappings {
            for op in &mut operations {
                op.mapping.sites.clear();
                op.mapping.outer_span = (0, 0);
                op.mapping.body_span = (0, 0);
            }
        }
        CatalogSnapshot {
            operations,
            fragments: self.fragments_sorted(),
            file_count,
        }
    }
}

fn describe_definition<'a>(
    definition: &'a Definition<'static, String>,
) -> (
    OperationKind,
    Option<String>,
    Vec<VariableSpec>,
    Option<&'a SelectionSet<'static, String>>,
) {
    match definition {
        Definition::Operation(op) => match op {
            OperationDefinition::Query(q) => (
                OperationKind::Query,
                q.name.clone(),
                variable_specs(&q.variable_definitions),
                Some(&q.selection_set),
            ),
            OperationDefinition::Mutation(m) => (
                OperationKind::Mutation,
                m.name.clone(),
                variable_specs(&m.variable_definitions),
                Some(&m.selection_set),
            ),
            OperationDefinition::Subscription(s) => (
                OperationKind::Subscription,
                s.name.clone(),
                variable_specs(&s.variable_definitions),
                Some(&s.selection_set),
            ),
            OperationDefinition::SelectionSet(set) => {
                (OperationKind::Query, None, Vec::new(), Some(set))
            }
        },
        Definition::Fragment(frag) => (
            OperationKind::Fragment,
            Some(frag.name.clone()),
            Vec::new(),
            Some(&frag.selection_set),
        ),
    }
}

fn variable_specs(
    definitions: &[graphql_parser::query::VariableDefinition<'static, String>],
) -> Vec<VariableSpec> {
    definitions
        .iter()
        .map(|v| VariableSpec {
            name: v.name.clone(),
            var_type: type_to_string(&v.var_type),
        })
        .collect()
}

pub fn type_to_string(ty: &Type<'static, String>) -> String {
    match ty {
        Type::NamedType(name) => name.clone(),
        Type::ListType(inner) => format!("[{}]", type_to_string(inner)),
        Type::NonNullType(inner) => format!("{}!", type_to_string(inner)),
    }
}

fn collect_spreads(set: &SelectionSet<'static, String>, out: &mut Vec<String>) {
    for selection in &set.items {
        match selection {
            Selection::Field(field) => collect_spreads(&field.selection_set, out),
            Selection::FragmentSpread(spread) => {
                if !out.contains(&spread.fragment_name) {
                    out.push(spread.fragment_name.clone());
                }
            }
            Selection::InlineFragment(inline) => collect_spreads(&inline.selection_set, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunOptions;
    use crate::extraction::extract_source;
    use std::path::PathBuf;

    fn ingest(src: &str) -> (OperationCatalog, Vec<Incident>) {
        let catalog = OperationCatalog::new();
        let extraction = extract_source(&PathBuf::from("test.ts"), src, &RunOptions::default());
        let incidents = catalog.ingest(&extraction, src);
        (catalog, incidents)
    }

    #[test]
    fn id_depends_only_on_content() {
        let (catalog_a, _) = ingest("const q = gql`query Q { venture { id } }`;");
        let (catalog_b, _) =
            ingest("const elsewhere = gql`query   Q {\n  venture { id }\n}`;\n// other file");

        let a = catalog_a.operations_sorted();
        let b = catalog_b.operations_sorted();
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert_eq!(a[0].id, b[0].id);
    }

    #[test]
    fn differing_content_differs_in_id() {
        let (catalog, _) = ingest(
            "const a = gql`query GetUser { user { id } }`;\nconst b = gql`query GetUser { user { id name } }`;",
        );
        let ops = catalog.operations_sorted();
        assert_eq!(ops.len(), 2);
        assert_ne!(ops[0].id, ops[1].id);
    }

    #[test]
    fn duplicate_operations_collapse_to_one_record() {
        let (catalog, _) = ingest(
            "const a = gql`query Same { user { id } }`;\nconst b = gql`query Same { user { id } }`;",
        );
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn fragments_enter_both_catalog_and_dictionary() {
        let (catalog, _) = ingest(
            "const f = gql`fragment ventureFields on Venture { id name ...baseFields }`;",
        );
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.fragment_count(), 1);
        let frag = catalog.fragment("ventureFields").unwrap();
        assert_eq!(frag.dependencies, vec!["baseFields".to_string()]);
        let ops = catalog.operations_sorted();
        assert_eq!(ops[0].kind, OperationKind::Fragment);
    }

    #[test]
    fn multi_definition_block_keeps_def_indices() {
        let (catalog, _) = ingest(
            "const doc = gql`query Q { venture { ...v } }\nfragment v on Venture { id }`;",
        );
        let ops = catalog.operations_sorted();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].mapping.def_index, 0);
        assert_eq!(ops[0].mapping.def_count, 2);
        assert_eq!(ops[1].mapping.def_index, 1);
    }

    #[test]
    fn parse_failure_is_recorded_and_skipped() {
        let (catalog, incidents) =
            ingest("const bad = gql`query {`;\nconst good = gql`query G { shop { id } }`;");
        assert_eq!(catalog.len(), 1);
        assert!(incidents.iter().any(|i| i.code == "E_GQL_PARSE"));
    }

    #[test]
    fn variables_are_captured_with_types() {
        let (catalog, _) =
            ingest("const q = gql`query V($id: UUID!, $tags: [String]) { venture(id: $id) { id } }`;");
        let ops = catalog.operations_sorted();
        assert_eq!(
            ops[0].variables,
            vec![
                VariableSpec {
                    name: "id".to_string(),
                    var_type: "UUID!".to_string()
                },
                VariableSpec {
                    name: "tags".to_string(),
                    var_type: "[String]".to_string()
                },
            ]
        );
    }

    #[test]
    fn printed_text_is_a_print_parse_fixed_point() {
        let (catalog, _) = ingest(
            "const a = gql`query Q($id: ID!, $n: [Int]) { venture(id: $id, limit: 3) { id ...vf @include(if: true) } }`;\nconst b = gql`fragment vf on Venture { name profile { logoUrl } }`;",
        );
        for op in catalog.operations_sorted() {
            let reparsed = parse_query::<String>(&op.parsed_text)
                .unwrap()
                .into_static();
            assert_eq!(reparsed.to_string(), op.parsed_text);
        }
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let (catalog, _) = ingest("const q = gql`query Q { venture { id } }`;");
        let json = serde_json::to_string(&catalog.snapshot(1, true)).unwrap();
        let restored: CatalogSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.operations.len(), 1);
        assert_eq!(restored.operations[0].id, catalog.operations_sorted()[0].id);
        // The parsed AST is a runtime-only handle and is not serialized.
        assert!(restored.operations[0].document.is_none());
    }

    #[test]
    fn snapshot_without_mappings_drops_positions() {
        let (catalog, _) = ingest("const q = gql`query Q { venture { id } }`;");
        let snapshot = catalog.snapshot(1, false);
        assert_eq!(snapshot.operations[0].mapping.outer_span, (0, 0));
        assert!(snapshot.operations[0].mapping.sites.is_empty());
    }

    #[test]
    fn normalization_collapses_whitespace_only() {
        assert_eq!(
            normalize_text("query Q {\n  venture {\n    id\n  }\n}"),
            "query Q { venture { id } }"
        );
        assert_eq!(fingerprint("query Q { a }"), fingerprint("query  Q {\n a }"));
        assert_ne!(fingerprint("query Q { a }"), fingerprint("query Q { b }"));
    }
}
