//! Operation-name resolution and collision suffixing.
//!
//! Names are resolved in a fixed ladder: a literal name wins outright; an
//! interpolated name is looked up in the configured dictionary; a ternary
//! expression canonicalizes to its true branch with both candidates kept;
//! anything else synthesizes a name from the first top-level field. When two
//! distinct operations end up with the same name, later ones (in file/offset
//! visitation order) get an integer suffix.

use rustc_hash::FxHashMap;

use crate::catalog::OperationCatalog;
use crate::config::NameDictionary;
use crate::extraction::placeholder;
use crate::types::{
    Incident, IncidentKind, Operation, OperationKind, Severity,
};
use graphql_parser::query::{Definition, OperationDefinition, Selection};

pub fn resolve_names(catalog: &OperationCatalog, dictionary: &NameDictionary) -> Vec<Incident> {
    let mut incidents = Vec::new();
    let ops = catalog.operations_sorted();

    // Phase 1: resolve each operation's own name.
    let mut resolved: Vec<(String, String, bool, Vec<String>)> = Vec::new();
    for op in &ops {
        let (name, is_resolved, candidates, incident) = resolve_single(op, dictionary);
        if let Some(incident) = incident {
            incidents.push(incident);
        }
        resolved.push((op.id.clone(), name, is_resolved, candidates));
    }

    // Phase 2: deterministic collision suffixing. The first holder of a name
    // keeps it; later distinct operations get `_1`, `_2`, …
    let mut taken: FxHashMap<String, String> = FxHashMap::default();
    for (id, name, ..) in resolved.iter_mut() {
        if let Some(holder) = taken.get(name.as_str()) {
            if holder.as_str() != id.as_str() {
                let base = name.clone();
                let mut suffix = 1usize;
                loop {
                    let candidate = format!("{base}_{suffix}");
                    if !taken.contains_key(&candidate) {
                        *name = candidate;
                        break;
                    }
                    suffix += 1;
                }
            }
        }
        taken.insert(name.clone(), id.clone());
    }

    for (id, name, is_resolved, candidates) in resolved {
        catalog.update_operation(&id, |op| {
            op.name = name;
            op.name_resolved = is_resolved;
            op.name_candidates = candidates;
        });
    }

    incidents
}

fn resolve_single(
    op: &Operation,
    dictionary: &NameDictionary,
) -> (String, bool, Vec<String>, Option<Incident>) {
    let extracted = op.name.clone();

    if extracted.is_empty() {
        return (synthesize_name(op), true, Vec::new(), None);
    }
    if !placeholder::is_operation_name_placeholder(&extracted) {
        return (extracted, true, Vec::new(), None);
    }

    let Some(site) = op
        .mapping
        .sites
        .iter()
        .find(|s| s.placeholder == extracted)
    else {
        // A placeholder name with no matching site means the mapping was
        // damaged upstream; treat it as unresolved.
        return (
            synthesize_name(op),
            false,
            Vec::new(),
            Some(Incident::new(
                IncidentKind::UnresolvedReference,
                Severity::Warning,
                &op.file_path,
                "W_NAME_SITE_MISSING",
                format!("no interpolation site recorded for name placeholder {extracted}"),
            )),
        );
    };

    let expression = site.expression.trim();
    if let Some(name) = dictionary.lookup(expression) {
        return (name.to_string(), true, Vec::new(), None);
    }
    if let Some((true_branch, false_branch)) = parse_ternary_name(expression) {
        return (
            true_branch.clone(),
            true,
            vec![true_branch, false_branch],
            None,
        );
    }

    (
        synthesize_name(op),
        false,
        Vec::new(),
        Some(Incident::new(
            IncidentKind::UnresolvedReference,
            Severity::Warning,
            &op.file_path,
            "W_NAME_DICT_MISS",
            format!("dynamic operation name `${{{expression}}}` is not in the name dictionary"),
        )),
    )
}

/// `cond ? 'A' : 'B'` — both branches must be plain string literals.
fn parse_ternary_name(expression: &str) -> Option<(String, String)> {
    let question = expression.find('?')?;
    let rest = &expression[question + 1..];
    let colon = rest.find(':')?;
    let true_branch = unquote(rest[..colon].trim())?;
    let false_branch = unquote(rest[colon + 1..].trim())?;
    Some((true_branch, false_branch))
}

fn unquote(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'\'' && last == b'\'') || (first == b'"' && last == b'"') {
            return Some(s[1..s.len() - 1].to_string());
        }
    }
    None
}

/// Fallback: capitalized first top-level field plus the operation kind.
fn synthesize_name(op: &Operation) -> String {
    let field = first_top_level_field(op);
    let kind_suffix = match op.kind {
        OperationKind::Query => "Query",
        OperationKind::Mutation => "Mutation",
        OperationKind::Subscription => "Subscription",
        OperationKind::Fragment => "Fragment",
    };
    match field {
        Some(field) if !placeholder::is_placeholder_name(&field) => {
            format!("{}{kind_suffix}", capitalize(&field))
        }
        _ => format!("Anonymous{kind_suffix}"),
    }
}

fn first_top_level_field(op: &Operation) -> Option<String> {
    let document = op.document.as_ref()?;
    let definition = document.definitions.first()?;
    let selection_set = match definition {
        Definition::Operation(OperationDefinition::Query(q)) => &q.selection_set,
        Definition::Operation(OperationDefinition::Mutation(m)) => &m.selection_set,
        Definition::Operation(OperationDefinition::Subscription(s)) => &s.selection_set,
        Definition::Operation(OperationDefinition::SelectionSet(set)) => set,
        Definition::Fragment(frag) => &frag.selection_set,
    };
    selection_set.items.iter().find_map(|sel| match sel {
        Selection::Field(field) => Some(field.name.clone()),
        _ => None,
    })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
