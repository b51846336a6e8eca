//! Fragment stitching and lazy full-text expansion.
//!
//! Stitching records, per operation, which spreads resolve against the
//! fragment dictionary and which do not. Expansion appends each referenced
//! fragment's text after the operation exactly once, transitively, with a
//! visiting set guarding against cyclic fragment graphs.

use rustc_hash::FxHashSet;

use crate::catalog::OperationCatalog;
use crate::extraction::placeholder;
use crate::types::{Incident, IncidentKind, Operation, Severity};

/// Check every operation's spreads against the fragment dictionary. Missing
/// fragments are warnings; the operation is retained but marked so the
/// transform stage skips it.
pub fn stitch_fragments(catalog: &OperationCatalog) -> Vec<Incident> {
    let mut incidents = Vec::new();

    for op in catalog.operations_sorted() {
        let mut unresolved = Vec::new();
        for name in op.resolvable_fragment_refs() {
            if catalog.fragment(name).is_none() {
                unresolved.push(name.clone());
                incidents.push(Incident::new(
                    IncidentKind::UnresolvedReference,
                    Severity::Warning,
                    &op.file_path,
                    "W_UNRESOLVED_FRAGMENT",
                    format!("fragment `{name}` referenced by `{}` was not found", op.name),
                ));
            }
        }
        if !unresolved.is_empty() {
            catalog.update_operation(&op.id, |op| op.unresolved_fragments = unresolved);
        }
    }

    incidents
}

/// Fully expanded text: the operation followed by every reachable fragment
/// definition, each inlined at most once regardless of the transitive graph.
/// Idempotent; cycles terminate with a recorded warning.
pub fn expanded_text(op: &Operation, catalog: &OperationCatalog) -> (String, Vec<Incident>) {
    let mut out = op.parsed_text.trim_end().to_string();
    let mut incidents = Vec::new();
    let mut inlined: FxHashSet<String> = FxHashSet::default();
    let mut path: Vec<String> = Vec::new();

    for name in op.resolvable_fragment_refs() {
        expand_fragment(
            name,
            catalog,
            &mut inlined,
            &mut path,
            &mut out,
            &mut incidents,
            op,
        );
    }

    (out, incidents)
}

fn expand_fragment(
    name: &str,
    catalog: &OperationCatalog,
    inlined: &mut FxHashSet<String>,
    path: &mut Vec<String>,
    out: &mut String,
    incidents: &mut Vec<Incident>,
    op: &Operation,
) {
    if path.iter().any(|p| p == name) {
        incidents.push(Incident::new(
            IncidentKind::UnresolvedReference,
            Severity::Warning,
            &op.file_path,
            "W_FRAGMENT_CYCLE",
            format!(
                "cyclic fragment reference: {} -> {name}",
                path.join(" -> ")
            ),
        ));
        return;
    }
    if !inlined.insert(name.to_string()) {
        return;
    }
    let Some(fragment) = catalog.fragment(name) else {
        // Already reported by stitching.
        return;
    };

    out.push_str("\n\n");
    out.push_str(fragment.text.trim_end());

    path.push(name.to_string());
    for dep in &fragment.dependencies {
        if !placeholder::is_fragment_placeholder(dep) {
            expand_fragment(dep, catalog, inlined, path, out, incidents, op);
        }
    }
    path.pop();
}
