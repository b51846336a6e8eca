//! Table-driven placeholder substitution for template-literal interpolations.
//!
//! Both extraction strategies hand their literal chunks and `${…}` expression
//! texts to this module, so the substituted text (and therefore the operation
//! id) is identical no matter which strategy found the template. Each of the
//! six interpolation shapes gets a deterministic stand-in whose grammatical
//! category matches the surrounding GraphQL:
//!
//! | shape        | stand-in            | parses as          |
//! |--------------|---------------------|--------------------|
//! | query-name   | `GqlOpName_<i>`     | operation name     |
//! | fragment-ref | `GqlFragmentRef_<i>`| fragment spread    |
//! | field-ref    | `gqlField_<i>`      | field selection    |
//! | identifier   | `gqlValue_<i>`      | enum-ish value     |
//! | string-expr  | `gql_str_<i>`       | string content     |
//! | numeric-expr | `9<i:06>`           | int literal        |

use crate::types::{InterpolationKind, InterpolationSite};

const OP_NAME_PREFIX: &str = "GqlOpName_";
const FRAGMENT_REF_PREFIX: &str = "GqlFragmentRef_";
const FIELD_REF_PREFIX: &str = "gqlField_";
const IDENTIFIER_PREFIX: &str = "gqlValue_";
const STRING_PREFIX: &str = "gql_str_";

/// Argument names whose interpolated values are treated as numeric.
const NUMERIC_ARGUMENT_NAMES: &[&str] = &["minPrice", "maxPrice", "limit", "offset", "price", "count"];

const OPERATION_KEYWORDS: &[&str] = &["query", "mutation", "subscription", "fragment"];

pub fn placeholder_for(kind: InterpolationKind, index: usize) -> String {
    match kind {
        InterpolationKind::QueryName => format!("{OP_NAME_PREFIX}{index}"),
        InterpolationKind::FragmentRef => format!("{FRAGMENT_REF_PREFIX}{index}"),
        InterpolationKind::FieldRef => format!("{FIELD_REF_PREFIX}{index}"),
        InterpolationKind::Identifier => format!("{IDENTIFIER_PREFIX}{index}"),
        InterpolationKind::StringExpr => format!("{STRING_PREFIX}{index}"),
        InterpolationKind::NumericExpr => format!("9{index:06}"),
    }
}

pub fn is_fragment_placeholder(name: &str) -> bool {
    name.starts_with(FRAGMENT_REF_PREFIX)
}

pub fn is_operation_name_placeholder(name: &str) -> bool {
    name.starts_with(OP_NAME_PREFIX)
}

pub fn is_placeholder_name(name: &str) -> bool {
    name.starts_with(OP_NAME_PREFIX)
        || name.starts_with(FRAGMENT_REF_PREFIX)
        || name.starts_with(FIELD_REF_PREFIX)
        || name.starts_with(IDENTIFIER_PREFIX)
        || name.starts_with(STRING_PREFIX)
}

/// Result of substituting every interpolation in a literal body.
#[derive(Debug, Clone)]
pub struct Substitution {
    /// The literal with placeholders in place of `${…}` expressions.
    pub parseable: String,
    pub sites: Vec<InterpolationSite>,
    /// Indices of sites whose shape could not be classified with confidence.
    pub unclassified: Vec<usize>,
}

/// Substitute placeholders into a template literal split into `chunks`
/// (always `exprs.len() + 1` of them) and interpolation expression texts.
pub fn substitute(chunks: &[String], exprs: &[String]) -> Substitution {
    debug_assert_eq!(chunks.len(), exprs.len() + 1);

    let mut parseable = String::new();
    let mut original_offset = 0usize;
    let mut sites = Vec::new();
    let mut unclassified = Vec::new();

    for (index, expr) in exprs.iter().enumerate() {
        parseable.push_str(&chunks[index]);
        original_offset += chunks[index].len();

        let next_chunk = chunks.get(index + 1).map(String::as_str).unwrap_or("");
        let classified = classify(&parseable, expr, next_chunk);
        let kind = match classified {
            Some(kind) => kind,
            None => {
                unclassified.push(index);
                InterpolationKind::Identifier
            }
        };
        let placeholder = placeholder_for(kind, index);
        parseable.push_str(&placeholder);

        sites.push(InterpolationSite {
            index,
            offset: original_offset,
            kind,
            expression: expr.clone(),
            placeholder,
        });
        original_offset += expr.len() + 3; // "${" + expr + "}"
    }
    if let Some(last) = chunks.last() {
        parseable.push_str(last);
    }

    Substitution {
        parseable,
        sites,
        unclassified,
    }
}

/// Shape classification from the text to the left of the site. Returns None
/// for contexts the closed set does not cover (e.g. inside a GraphQL
/// comment), which callers record as an unclassifiable-interpolation warning.
fn classify(prefix: &str, _expr: &str, _next_chunk: &str) -> Option<InterpolationKind> {
    if current_line_is_comment(prefix) {
        return None;
    }

    let trimmed = prefix.trim_end();
    if trimmed.ends_with("...") {
        return Some(InterpolationKind::FragmentRef);
    }
    if let Some(word) = last_word(trimmed) {
        if OPERATION_KEYWORDS.contains(&word) && prefix.len() > trimmed.len() {
            return Some(InterpolationKind::QueryName);
        }
    }
    // An immediately preceding quote means the host wrote `"${x}"`.
    if prefix.ends_with('"') {
        return Some(InterpolationKind::StringExpr);
    }
    if let Some(argument) = argument_name_before_colon(trimmed) {
        if NUMERIC_ARGUMENT_NAMES.contains(&argument) {
            return Some(InterpolationKind::NumericExpr);
        }
        return Some(InterpolationKind::Identifier);
    }
    if in_selection_position(prefix, trimmed) {
        return Some(InterpolationKind::FieldRef);
    }
    Some(InterpolationKind::Identifier)
}

fn current_line_is_comment(prefix: &str) -> bool {
    let line_start = prefix.rfind('\n').map(|p| p + 1).unwrap_or(0);
    prefix[line_start..].trim_start().starts_with('#')
}

fn last_word(trimmed: &str) -> Option<&str> {
    let end = trimmed.len();
    let start = trimmed
        .rfind(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .map(|p| p + c_len(trimmed, p))
        .unwrap_or(0);
    if start < end {
        Some(&trimmed[start..end])
    } else {
        None
    }
}

fn c_len(s: &str, pos: usize) -> usize {
    s[pos..].chars().next().map(char::len_utf8).unwrap_or(1)
}

/// For a prefix ending `name:` (modulo whitespace), the argument name.
fn argument_name_before_colon(trimmed: &str) -> Option<&str> {
    let before_colon = trimmed.strip_suffix(':')?.trim_end();
    last_word(before_colon).filter(|w| !w.is_empty())
}

fn in_selection_position(prefix: &str, trimmed: &str) -> bool {
    match trimmed.chars().last() {
        None => true,
        Some('{') | Some('}') => true,
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => {
            // A bare identifier on an earlier line reads as a sibling field.
            prefix[trimmed.len()..].contains('\n')
        }
        _ => false,
    }
}

/// Count occurrences of `token` in `text` that are not embedded inside a
/// longer identifier (so `gqlValue_1` does not match inside `gqlValue_12`).
pub fn count_token(text: &str, token: &str) -> usize {
    let mut count = 0;
    let mut from = 0;
    while let Some(pos) = text[from..].find(token) {
        let start = from + pos;
        let end = start + token.len();
        let before_ok = start == 0
            || !text[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        let after_ok = end >= text.len()
            || !text[end..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        if before_ok && after_ok {
            count += 1;
        }
        from = end;
    }
    count
}

/// Replace every token-boundary occurrence of `token` with `replacement`.
pub fn replace_token(text: &str, token: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut from = 0;
    while let Some(pos) = text[from..].find(token) {
        let start = from + pos;
        let end = start + token.len();
        let before_ok = start == 0
            || !text[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        let after_ok = end >= text.len()
            || !text[end..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        out.push_str(&text[from..start]);
        if before_ok && after_ok {
            out.push_str(replacement);
        } else {
            out.push_str(token);
        }
        from = end;
    }
    out.push_str(&text[from..]);
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderMismatch {
    pub site_index: usize,
    pub placeholder: String,
    pub expected: usize,
    pub found: usize,
}

impl std::fmt::Display for PlaceholderMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "placeholder {} occurs {} time(s) after transformation, expected {}",
            self.placeholder, self.found, self.expected
        )
    }
}

/// Verify that every placeholder survived the transformation with the same
/// multiplicity it had before it, then restore the original `${…}` host
/// expressions. A mismatch means the rewrite destroyed or duplicated an
/// interpolation site and the transformation must be rejected.
pub fn verify_and_restore(
    original: &str,
    transformed: &str,
    sites: &[InterpolationSite],
) -> Result<String, PlaceholderMismatch> {
    for site in sites {
        let expected = count_token(original, &site.placeholder);
        let found = count_token(transformed, &site.placeholder);
        if expected != found {
            return Err(PlaceholderMismatch {
                site_index: site.index,
                placeholder: site.placeholder.clone(),
                expected,
                found,
            });
        }
    }
    let mut restored = transformed.to_string();
    for site in sites {
        restored = replace_token(&restored, &site.placeholder, &site.host_text());
    }
    Ok(restored)
}
