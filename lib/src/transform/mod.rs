//! Query transformer: applies deprecation rules to an operation's AST.
//!
//! One visitor walks the selection tree with a schema-informed type stack
//! (falling back to unique-member lookup when no schema is available) and
//! dispatches on the rule's kind tag: rename, dotted-path rewrite, comment
//! out, argument rename. Every applied rule appends an ordered change and a
//! warning. Commented-out fields become `# DEPRECATED:` lines prepended to
//! the printed text; those lines are carried through re-runs so transforming
//! twice yields the same text.

pub mod confidence;

use anyhow::Result;
use graphql_parser::parse_query;
use graphql_parser::query::{
    Definition, Document, Field, OperationDefinition, Selection, SelectionSet, TypeCondition,
};

use crate::config::ConfidenceThresholds;
use crate::extraction::placeholder;
use crate::schema::{DeprecationRule, DeprecationRuleSet, RuleAction, SchemaIndex};
use crate::types::{
    Change, ChangeKind, Operation, OperationKind, Transformation, TransformWarning, WarnSeverity,
};

pub struct TransformContext<'a> {
    pub rules: &'a DeprecationRuleSet,
    pub schema: Option<&'a SchemaIndex>,
    pub thresholds: ConfidenceThresholds,
    pub validate: bool,
}

pub fn transform_operation(op: &Operation, ctx: &TransformContext<'_>) -> Result<Transformation> {
    transform_text(&op.id, &op.parsed_text, ctx)
}

/// Transform GraphQL text directly. The text may already carry
/// `# DEPRECATED:` comment lines from an earlier pass; they are preserved.
pub fn transform_text(
    operation_id: &str,
    text: &str,
    ctx: &TransformContext<'_>,
) -> Result<Transformation> {
    let carried_comments = leading_deprecation_comments(text);

    let mut document = parse_query::<String>(text)
        .map_err(|e| anyhow::anyhow!("operation failed to parse before transform: {e}"))?
        .into_static();

    let mut walker = Walker {
        rules: ctx.rules,
        schema: ctx.schema,
        changes: Vec::new(),
        warnings: Vec::new(),
        comments: Vec::new(),
    };

    for definition in &mut document.definitions {
        walker.rewrite_definition(definition);
    }

    let printed = document.to_string();
    let mut comment_lines = carried_comments;
    for comment in &walker.comments {
        if !comment_lines.contains(comment) {
            comment_lines.push(comment.clone());
        }
    }
    let transformed_text = if comment_lines.is_empty() {
        printed
    } else {
        format!("{}\n{printed}", comment_lines.join("\n"))
    };

    if ctx.validate {
        if let Some(schema) = ctx.schema {
            walker.validate_result(&document, schema);
        }
    }

    let confidence = confidence::score_changes(&walker.changes, ctx.rules);
    let category = confidence::categorize(confidence, &ctx.thresholds);
    let risks = collect_risks(&walker.changes, ctx.rules);

    Ok(Transformation {
        operation_id: operation_id.to_string(),
        original_text: text.to_string(),
        transformed_text,
        changes: walker.changes,
        warnings: walker.warnings,
        confidence,
        category,
        risks,
        document: Some(document),
    })
}

fn leading_deprecation_comments(text: &str) -> Vec<String> {
    let mut comments = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("# DEPRECATED:") {
            comments.push(trimmed.to_string());
        } else if !trimmed.is_empty() && !trimmed.starts_with('#') {
            break;
        }
    }
    comments
}

struct Walker<'a> {
    rules: &'a DeprecationRuleSet,
    schema: Option<&'a SchemaIndex>,
    changes: Vec<Change>,
    warnings: Vec<TransformWarning>,
    comments: Vec<String>,
}

impl<'a> Walker<'a> {
    fn rewrite_definition(&mut self, definition: &mut Definition<'static, String>) {
        match definition {
            Definition::Operation(op) => {
                let kind = match op {
                    OperationDefinition::Mutation(_) => OperationKind::Mutation,
                    OperationDefinition::Subscription(_) => OperationKind::Subscription,
                    _ => OperationKind::Query,
                };
                let root = self
                    .schema
                    .and_then(|s| s.root_type(kind))
                    .map(str::to_string);
                let set = match op {
                    OperationDefinition::Query(q) => &mut q.selection_set,
                    OperationDefinition::Mutation(m) => &mut m.selection_set,
                    OperationDefinition::Subscription(s) => &mut s.selection_set,
                    OperationDefinition::SelectionSet(set) => set,
                };
                self.rewrite_selection_set(set, root.as_deref(), "");
            }
            Definition::Fragment(frag) => {
                // Rules are keyed by the schema's type names; without a
                // schema the unique-member fallback applies instead.
                let TypeCondition::On(type_name) = &frag.type_condition;
                let parent = self.schema.is_some().then(|| type_name.clone());
                self.rewrite_selection_set(&mut frag.selection_set, parent.as_deref(), "");
            }
        }
    }

    fn rewrite_selection_set(
        &mut self,
        set: &mut SelectionSet<'static, String>,
        parent_type: Option<&str>,
        path: &str,
    ) {
        let items = std::mem::take(&mut set.items);
        let mut rewritten = Vec::with_capacity(items.len());

        for selection in items {
            match selection {
                Selection::Field(field) => {
                    if let Some(field) = self.rewrite_field(field, parent_type, path) {
                        rewritten.push(Selection::Field(field));
                    }
                }
                Selection::InlineFragment(mut inline) => {
                    let condition = inline
                        .type_condition
                        .as_ref()
                        .map(|TypeCondition::On(name)| name.clone());
                    let inline_parent = condition.as_deref().or(parent_type);
                    self.rewrite_selection_set(&mut inline.selection_set, inline_parent, path);
                    rewritten.push(Selection::InlineFragment(inline));
                }
                other => rewritten.push(other),
            }
        }

        set.items = rewritten;
    }

    /// Returns None when the field is commented out.
    fn rewrite_field(
        &mut self,
        mut field: Field<'static, String>,
        parent_type: Option<&str>,
        path: &str,
    ) -> Option<Field<'static, String>> {
        let field_path = if path.is_empty() {
            field.name.clone()
        } else {
            format!("{path}.{}", field.name)
        };

        if placeholder::is_placeholder_name(&field.name) {
            // Interpolated field selections belong to the host.
            return Some(field);
        }

        self.rename_deprecated_arguments(&mut field, parent_type, &field_path);

        let rule = self.field_rule(parent_type, &field.name).cloned();
        match rule {
            Some(rule) if rule.action == RuleAction::CommentOut => {
                self.warn(&rule);
                self.comments
                    .push(format!("# DEPRECATED: {} - {}", field.name, rule.reason));
                self.changes.push(Change {
                    path: field_path,
                    kind: ChangeKind::CommentOut,
                    before: field.name.clone(),
                    after: String::new(),
                    rule_id: rule.id,
                    breaking: true,
                    touches_interpolation: contains_fragment_placeholder(&field.selection_set),
                });
                None
            }
            Some(rule) => {
                let replacement = rule
                    .replacement
                    .clone()
                    .expect("replace rules always carry a replacement");
                self.warn(&rule);
                if let Some((wrapper_name, leaf_name)) = replacement.split_once('.') {
                    Some(self.rewrite_path(field, &rule, wrapper_name, leaf_name, parent_type, field_path))
                } else {
                    self.changes.push(Change {
                        path: field_path.clone(),
                        kind: ChangeKind::FieldRename,
                        before: field.name.clone(),
                        after: replacement.clone(),
                        rule_id: rule.id,
                        breaking: true,
                        touches_interpolation: contains_fragment_placeholder(&field.selection_set),
                    });
                    let old_name = field.name.clone();
                    field.name = replacement;
                    let child = self.child_type(parent_type, &field.name, Some(&old_name));
                    self.rewrite_selection_set(&mut field.selection_set, child.as_deref(), &field_path);
                    Some(field)
                }
            }
            None => {
                let child = self.child_type(parent_type, &field.name, None);
                self.rewrite_selection_set(&mut field.selection_set, child.as_deref(), &field_path);
                Some(field)
            }
        }
    }

    /// `Use A.B` — wrap the original leaf (alias, arguments, directives and
    /// selection set intact) under a new parent field.
    fn rewrite_path(
        &mut self,
        mut field: Field<'static, String>,
        rule: &DeprecationRule,
        wrapper_name: &str,
        leaf_name: &str,
        parent_type: Option<&str>,
        field_path: String,
    ) -> Field<'static, String> {
        self.changes.push(Change {
            path: field_path.clone(),
            kind: ChangeKind::PathRewrite,
            before: field.name.clone(),
            after: format!("{wrapper_name}.{leaf_name}"),
            rule_id: rule.id.clone(),
            breaking: true,
            touches_interpolation: contains_fragment_placeholder(&field.selection_set),
        });

        let span = field.selection_set.span;
        let inner = Field {
            position: field.position,
            alias: field.alias.take(),
            name: leaf_name.to_string(),
            arguments: std::mem::take(&mut field.arguments),
            directives: std::mem::take(&mut field.directives),
            selection_set: SelectionSet {
                span,
                items: std::mem::take(&mut field.selection_set.items),
            },
        };
        let mut wrapper = Field {
            position: field.position,
            alias: None,
            name: wrapper_name.to_string(),
            arguments: Vec::new(),
            directives: Vec::new(),
            selection_set: SelectionSet {
                span,
                items: vec![Selection::Field(inner)],
            },
        };

        let wrapper_type = self.child_type(parent_type, wrapper_name, None);
        if let Selection::Field(inner_field) = &mut wrapper.selection_set.items[0] {
            let leaf_type = self.child_type(wrapper_type.as_deref(), leaf_name, None);
            self.rewrite_selection_set(
                &mut inner_field.selection_set,
                leaf_type.as_deref(),
                &field_path,
            );
        }
        wrapper
    }

    fn rename_deprecated_arguments(
        &mut self,
        field: &mut Field<'static, String>,
        parent_type: Option<&str>,
        field_path: &str,
    ) {
        let field_name = field.name.clone();
        for (arg_name, _value) in field.arguments.iter_mut() {
            let Some(parent) = parent_type else { continue };
            let Some(rule) = self.rules.argument_rule(parent, &field_name, arg_name) else {
                continue;
            };
            let rule = rule.clone();
            self.warn(&rule);
            match &rule.replacement {
                Some(replacement) => {
                    self.changes.push(Change {
                        path: field_path.to_string(),
                        kind: ChangeKind::ArgumentRename,
                        before: arg_name.clone(),
                        after: replacement.clone(),
                        rule_id: rule.id.clone(),
                        breaking: true,
                        touches_interpolation: false,
                    });
                    *arg_name = replacement.clone();
                }
                None => {
                    // A vague argument deprecation has no safe rewrite; the
                    // warning above is all we can do.
                }
            }
        }
    }

    fn field_rule(&self, parent_type: Option<&str>, name: &str) -> Option<&DeprecationRule> {
        match parent_type {
            Some(parent) => self.rules.field_rule(parent, name),
            None => self.rules.field_rule_by_member(name),
        }
    }

    fn child_type(
        &self,
        parent_type: Option<&str>,
        field_name: &str,
        fallback_field: Option<&str>,
    ) -> Option<String> {
        let schema = self.schema?;
        let parent = parent_type?;
        schema
            .field_type(parent, field_name)
            .or_else(|| fallback_field.and_then(|f| schema.field_type(parent, f)))
            .map(str::to_string)
    }

    fn warn(&mut self, rule: &DeprecationRule) {
        self.warnings.push(TransformWarning {
            severity: if rule.vague {
                WarnSeverity::High
            } else {
                WarnSeverity::Medium
            },
            message: format!("{} is deprecated: {}", rule.id, rule.reason),
            rule_id: Some(rule.id.clone()),
        });
    }

    /// Post-rewrite check against the schema; problems become high-severity
    /// warnings, never hard failures.
    fn validate_result(&mut self, document: &Document<'static, String>, schema: &SchemaIndex) {
        for definition in &document.definitions {
            let (set, root) = match definition {
                Definition::Operation(OperationDefinition::Query(q)) => {
                    (&q.selection_set, schema.root_type(OperationKind::Query))
                }
                Definition::Operation(OperationDefinition::Mutation(m)) => {
                    (&m.selection_set, schema.root_type(OperationKind::Mutation))
                }
                Definition::Operation(OperationDefinition::Subscription(s)) => (
                    &s.selection_set,
                    schema.root_type(OperationKind::Subscription),
                ),
                Definition::Operation(OperationDefinition::SelectionSet(set)) => {
                    (set, schema.root_type(OperationKind::Query))
                }
                Definition::Fragment(frag) => {
                    let TypeCondition::On(name) = &frag.type_condition;
                    (
                        &frag.selection_set,
                        schema.has_type(name).then_some(name.as_str()),
                    )
                }
            };
            if let Some(root) = root {
                self.validate_selection_set(set, root, schema);
            }
        }
    }

    fn validate_selection_set(
        &mut self,
        set: &SelectionSet<'static, String>,
        parent_type: &str,
        schema: &SchemaIndex,
    ) {
        for selection in &set.items {
            match selection {
                Selection::Field(field) => {
                    if placeholder::is_placeholder_name(&field.name)
                        || field.name.starts_with("__")
                    {
                        continue;
                    }
                    if !schema.has_field(parent_type, &field.name) {
                        self.warnings.push(TransformWarning {
                            severity: WarnSeverity::High,
                            message: format!(
                                "field `{}` does not exist on type `{parent_type}` after rewrite",
                                field.name
                            ),
                            rule_id: None,
                        });
                        continue;
                    }
                    if let Some(child) = schema.field_type(parent_type, &field.name) {
                        let child = child.to_string();
                        if schema.has_type(&child) {
                            self.validate_selection_set(&field.selection_set, &child, schema);
                        }
                    }
                }
                Selection::InlineFragment(inline) => {
                    let target = match &inline.type_condition {
                        Some(TypeCondition::On(name)) if schema.has_type(name) => name.as_str(),
                        _ => parent_type,
                    };
                    self.validate_selection_set(&inline.selection_set, target, schema);
                }
                Selection::FragmentSpread(_) => {}
            }
        }
    }
}

fn contains_fragment_placeholder(set: &SelectionSet<'static, String>) -> bool {
    set.items.iter().any(|selection| match selection {
        Selection::FragmentSpread(spread) => {
            placeholder::is_fragment_placeholder(&spread.fragment_name)
        }
        Selection::Field(field) => contains_fragment_placeholder(&field.selection_set),
        Selection::InlineFragment(inline) => contains_fragment_placeholder(&inline.selection_set),
    })
}

fn collect_risks(changes: &[Change], rules: &DeprecationRuleSet) -> Vec<String> {
    let mut risks = Vec::new();
    if changes.iter().any(|c| c.kind == ChangeKind::PathRewrite) {
        risks.push("selection shape changes under a dotted-path rewrite".to_string());
    }
    if changes.iter().any(|c| c.kind == ChangeKind::CommentOut) {
        risks.push("deprecated fields dropped pending manual migration".to_string());
    }
    if changes.iter().any(|c| c.touches_interpolation) {
        risks.push("rewrite borders an interpolated fragment spread".to_string());
    }
    for change in changes {
        if let Some(rule) = rules.rule_by_id(&change.rule_id) {
            if rule.vague {
                let risk = format!("vague deprecation reason: {}", rule.reason);
                if !risks.contains(&risk) {
                    risks.push(risk);
                }
            }
        }
    }
    risks
}
