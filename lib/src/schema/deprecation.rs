//! Deprecation analyzer: turns `@deprecated` annotations into actionable
//! rewrite rules.
//!
//! Reason strings are free prose, so classification is deliberately narrow:
//! a reason reading `Use X`, ``Use `X` instead``, or `switch to using X`
//! where `X` is a single identifier or dotted path becomes a replace rule;
//! everything else (removal notices, forward-compatibility warnings, vague
//! pointers at "the billing property") becomes a comment-out rule. Multi-line
//! reasons are collapsed to single spaces before matching.

use graphql_parser::schema::{Definition, Document, TypeDefinition, Value};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Field,
    Argument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleAction {
    Replace,
    CommentOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeprecationRule {
    /// Dotted path: `Type.field` or `Type.field.argument`.
    pub id: String,
    pub object_type: String,
    pub field: String,
    pub argument: Option<String>,
    pub member_kind: MemberKind,
    pub reason: String,
    pub replacement: Option<String>,
    pub vague: bool,
    pub action: RuleAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeprecationSummary {
    pub total: usize,
    pub replaceable: usize,
    pub vague: usize,
    pub field_level: usize,
    pub argument_level: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DeprecationRuleSet {
    field_rules: FxHashMap<String, DeprecationRule>,
    argument_rules: FxHashMap<String, DeprecationRule>,
    /// field name → field-rule ids, for schema-less lookups.
    member_index: FxHashMap<String, Vec<String>>,
}

impl DeprecationRuleSet {
    /// Scan every object and interface definition. Interfaces and their
    /// implementations are scanned independently; identical deprecations on
    /// both emit one rule each under their own type name.
    pub fn analyze(document: &Document<'static, String>) -> Self {
        let mut set = DeprecationRuleSet::default();

        for definition in &document.definitions {
            let (type_name, fields) = match definition {
                Definition::TypeDefinition(TypeDefinition::Object(object)) => {
                    (&object.name, &object.fields)
                }
                Definition::TypeDefinition(TypeDefinition::Interface(interface)) => {
                    (&interface.name, &interface.fields)
                }
                _ => continue,
            };

            for field in fields {
                if let Some(reason) = deprecation_reason(&field.directives) {
                    set.add_field_rule(type_name, &field.name, &reason);
                }
                for argument in &field.arguments {
                    if let Some(reason) = deprecation_reason(&argument.directives) {
                        set.add_argument_rule(type_name, &field.name, &argument.name, &reason);
                    }
                }
            }
        }

        set
    }

    fn add_field_rule(&mut self, object_type: &str, field: &str, reason: &str) {
        let rule = build_rule(object_type, field, None, reason);
        self.member_index
            .entry(field.to_string())
            .or_default()
            .push(rule.id.clone());
        self.field_rules.insert(rule.id.clone(), rule);
    }

    fn add_argument_rule(&mut self, object_type: &str, field: &str, argument: &str, reason: &str) {
        let rule = build_rule(object_type, field, Some(argument), reason);
        self.argument_rules.insert(rule.id.clone(), rule);
    }

    pub fn field_rule(&self, object_type: &str, field: &str) -> Option<&DeprecationRule> {
        self.field_rules.get(&format!("{object_type}.{field}"))
    }

    pub fn argument_rule(
        &self,
        object_type: &str,
        field: &str,
        argument: &str,
    ) -> Option<&DeprecationRule> {
        self.argument_rules
            .get(&format!("{object_type}.{field}.{argument}"))
    }

    /// Schema-less lookup: a member name matches only when exactly one rule
    /// exists for it across all object types. Ambiguity means we cannot know
    /// which type the selection addresses, so nothing is applied.
    pub fn field_rule_by_member(&self, field: &str) -> Option<&DeprecationRule> {
        match self.member_index.get(field).map(Vec::as_slice) {
            Some([only]) => self.field_rules.get(only),
            _ => None,
        }
    }

    pub fn rule_by_id(&self, id: &str) -> Option<&DeprecationRule> {
        self.field_rules
            .get(id)
            .or_else(|| self.argument_rules.get(id))
    }

    pub fn is_empty(&self) -> bool {
        self.field_rules.is_empty() && self.argument_rules.is_empty()
    }

    pub fn summary(&self) -> DeprecationSummary {
        let all = self.field_rules.values().chain(self.argument_rules.values());
        let mut summary = DeprecationSummary {
            total: 0,
            replaceable: 0,
            vague: 0,
            field_level: self.field_rules.len(),
            argument_level: self.argument_rules.len(),
        };
        for rule in all {
            summary.total += 1;
            if rule.vague {
                summary.vague += 1;
            } else {
                summary.replaceable += 1;
            }
        }
        summary
    }

    pub fn rules_sorted(&self) -> Vec<&DeprecationRule> {
        let mut rules: Vec<&DeprecationRule> = self
            .field_rules
            .values()
            .chain(self.argument_rules.values())
            .collect();
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        rules
    }
}

fn build_rule(
    object_type: &str,
    field: &str,
    argument: Option<&str>,
    reason: &str,
) -> DeprecationRule {
    let normalized = normalize_reason(reason);
    let replacement = parse_replacement(&normalized);
    let vague = replacement.is_none();
    let id = match argument {
        Some(argument) => format!("{object_type}.{field}.{argument}"),
        None => format!("{object_type}.{field}"),
    };
    DeprecationRule {
        id,
        object_type: object_type.to_string(),
        field: field.to_string(),
        argument: argument.map(str::to_string),
        member_kind: if argument.is_some() {
            MemberKind::Argument
        } else {
            MemberKind::Field
        },
        reason: normalized,
        replacement,
        vague,
        action: if vague {
            RuleAction::CommentOut
        } else {
            RuleAction::Replace
        },
    }
}

fn deprecation_reason(
    directives: &[graphql_parser::schema::Directive<'static, String>],
) -> Option<String> {
    let directive = directives.iter().find(|d| d.name == "deprecated")?;
    let reason = directive.arguments.iter().find_map(|(name, value)| {
        if name == "reason" {
            match value {
                Value::String(s) => Some(s.clone()),
                _ => None,
            }
        } else {
            None
        }
    });
    // The GraphQL spec default when @deprecated carries no reason.
    Some(reason.unwrap_or_else(|| "No longer supported".to_string()))
}

/// Any run of whitespace inside the reason, newlines included, counts as a
/// single space.
pub fn normalize_reason(reason: &str) -> String {
    reason.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract a replacement target from the closed pattern set; None means the
/// reason is vague and the member can only be commented out.
fn parse_replacement(reason: &str) -> Option<String> {
    let remainder = strip_prefix_ci(reason, "use ")
        .or_else(|| strip_prefix_ci(reason, "switch to using "))?;

    let mut candidate = remainder.trim();
    candidate = candidate.trim_end_matches('.').trim_end();
    if let Some(stripped) = strip_suffix_ci(candidate, " instead") {
        candidate = stripped.trim_end();
    }
    candidate = candidate.trim_matches('`');

    if is_path_token(candidate) {
        Some(candidate.to_string())
    } else {
        None
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

fn strip_suffix_ci<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    if s.len() >= suffix.len() && s[s.len() - suffix.len()..].eq_ignore_ascii_case(suffix) {
        Some(&s[..s.len() - suffix.len()])
    } else {
        None
    }
}

/// Identifier or dotted path: `ventureNode`, `profile.logoUrl`.
fn is_path_token(candidate: &str) -> bool {
    if candidate.is_empty() {
        return false;
    }
    candidate.split('.').all(|segment| {
        let mut chars = segment.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema_text;

    fn analyze(schema: &str) -> DeprecationRuleSet {
        DeprecationRuleSet::analyze(&parse_schema_text(schema).unwrap())
    }

    #[test]
    fn use_x_variants_all_classify_as_replace() {
        for reason in ["Use ventureNode", "Use ventureNode instead", "use ventureNode"] {
            let schema = format!(
                "type Query {{ venture(id: ID!): Venture @deprecated(reason: \"{reason}\") }}\ntype Venture {{ id: ID! }}"
            );
            let rules = analyze(&schema);
            let rule = rules.field_rule("Query", "venture").unwrap();
            assert_eq!(rule.action, RuleAction::Replace, "reason: {reason}");
            assert_eq!(rule.replacement.as_deref(), Some("ventureNode"));
            assert!(!rule.vague);
        }
    }

    #[test]
    fn backticked_and_dotted_replacements() {
        let rules = analyze(
            "type Venture { logoUrl: String @deprecated(reason: \"Use profile.logoUrl instead\") rating: Int @deprecated(reason: \"Use `score` instead.\") }",
        );
        assert_eq!(
            rules
                .field_rule("Venture", "logoUrl")
                .unwrap()
                .replacement
                .as_deref(),
            Some("profile.logoUrl")
        );
        assert_eq!(
            rules
                .field_rule("Venture", "rating")
                .unwrap()
                .replacement
                .as_deref(),
            Some("score")
        );
    }

    #[test]
    fn switch_to_using_classifies_as_replace() {
        let rules = analyze(
            "type Query { shop: Shop @deprecated(reason: \"switch to using storefront\") }\ntype Shop { id: ID! }",
        );
        let rule = rules.field_rule("Query", "shop").unwrap();
        assert_eq!(rule.replacement.as_deref(), Some("storefront"));
    }

    #[test]
    fn prose_reasons_are_vague_comment_out_rules() {
        let rules = analyze(
            "type W { accountId: ID @deprecated(reason: \"Use the billing property to ensure forward compatibility\") removed: Int @deprecated(reason: \"will be removed in v3\") bare: Int @deprecated }",
        );
        for field in ["accountId", "removed", "bare"] {
            let rule = rules.field_rule("W", field).unwrap();
            assert_eq!(rule.action, RuleAction::CommentOut, "field: {field}");
            assert!(rule.vague);
            assert!(rule.replacement.is_none());
        }
    }

    #[test]
    fn multi_line_reasons_collapse_to_one_space() {
        let rules = analyze(
            "type Venture { logoUrl: String @deprecated(reason: \"Use\n        profile.logoUrl\n        instead\") }",
        );
        let rule = rules.field_rule("Venture", "logoUrl").unwrap();
        assert_eq!(rule.reason, "Use profile.logoUrl instead");
        assert_eq!(rule.replacement.as_deref(), Some("profile.logoUrl"));
    }

    #[test]
    fn argument_deprecations_get_their_own_rules() {
        let rules = analyze(
            "type Query { ventures(ventureId: ID @deprecated(reason: \"Use id\"), id: ID): [V] }\ntype V { id: ID }",
        );
        let rule = rules.argument_rule("Query", "ventures", "ventureId").unwrap();
        assert_eq!(rule.member_kind, MemberKind::Argument);
        assert_eq!(rule.replacement.as_deref(), Some("id"));
        let summary = rules.summary();
        assert_eq!(summary.argument_level, 1);
        assert_eq!(summary.field_level, 0);
    }

    #[test]
    fn interfaces_and_implementations_emit_one_rule_each() {
        let rules = analyze(
            r#"
            interface Node { legacyId: ID @deprecated(reason: "Use id") }
            type Venture implements Node {
                legacyId: ID @deprecated(reason: "Use id")
                id: ID
            }
            "#,
        );
        assert!(rules.field_rule("Node", "legacyId").is_some());
        assert!(rules.field_rule("Venture", "legacyId").is_some());
        assert_eq!(rules.summary().total, 2);
    }

    #[test]
    fn member_lookup_requires_uniqueness() {
        let rules = analyze(
            r#"
            type A { logoUrl: String @deprecated(reason: "Use profile.logoUrl") }
            type B { logoUrl: String @deprecated(reason: "Use avatar") }
            type C { rating: Int @deprecated(reason: "Use score") }
            "#,
        );
        assert!(rules.field_rule_by_member("logoUrl").is_none());
        assert_eq!(
            rules
                .field_rule_by_member("rating")
                .unwrap()
                .replacement
                .as_deref(),
            Some("score")
        );
    }

    #[test]
    fn summary_counts() {
        let rules = analyze(
            r#"
            type Query {
                venture(id: ID!): V @deprecated(reason: "Use ventureNode")
                old: Int @deprecated(reason: "gone soon")
            }
            type V { id: ID }
            "#,
        );
        let summary = rules.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.replaceable, 1);
        assert_eq!(summary.vague, 1);
    }
}
