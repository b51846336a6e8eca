//! Confidence scoring for transformations.
//!
//! Starts at 100 and subtracts a weight per change: renames are cheap,
//! dotted-path rewrites reshape the selection, comment-outs defer work to a
//! human. Edits that border interpolated fragment spreads and rules with
//! vague reasons cost extra. The floor is 0.

use crate::config::ConfidenceThresholds;
use crate::schema::DeprecationRuleSet;
use crate::types::{Category, Change, ChangeKind};

pub fn score_changes(changes: &[Change], rules: &DeprecationRuleSet) -> u8 {
    let mut score: i32 = 100;
    for change in changes {
        score += match change.kind {
            ChangeKind::FieldRename => -5,
            ChangeKind::ArgumentRename => -5,
            ChangeKind::PathRewrite => -15,
            ChangeKind::CommentOut => -30,
        };
        if change.touches_interpolation {
            score -= 10;
        }
        if rules
            .rule_by_id(&change.rule_id)
            .is_some_and(|rule| rule.vague)
        {
            score -= 20;
        }
    }
    score.clamp(0, 100) as u8
}

pub fn categorize(score: u8, thresholds: &ConfidenceThresholds) -> Category {
    if score >= thresholds.automatic {
        Category::Automatic
    } else if score >= thresholds.semi_automatic {
        Category::SemiAutomatic
    } else {
        Category::Manual
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema_text;

    fn rules() -> DeprecationRuleSet {
        DeprecationRuleSet::analyze(
            &parse_schema_text(
                r#"
                type Query { venture(id: ID!): V @deprecated(reason: "Use ventureNode") }
                type V {
                    logoUrl: String @deprecated(reason: "Use profile.logoUrl instead")
                    accountId: ID @deprecated(reason: "going away")
                }
                "#,
            )
            .unwrap(),
        )
    }

    fn change(kind: ChangeKind, rule_id: &str, touches: bool) -> Change {
        Change {
            path: "x".to_string(),
            kind,
            before: "a".to_string(),
            after: "b".to_string(),
            rule_id: rule_id.to_string(),
            breaking: true,
            touches_interpolation: touches,
        }
    }

    #[test]
    fn rename_scores_ninety_five() {
        let changes = vec![change(ChangeKind::FieldRename, "Query.venture", false)];
        assert_eq!(score_changes(&changes, &rules()), 95);
    }

    #[test]
    fn path_rewrite_scores_eighty_five() {
        let changes = vec![change(ChangeKind::PathRewrite, "V.logoUrl", false)];
        assert_eq!(score_changes(&changes, &rules()), 85);
    }

    #[test]
    fn vague_comment_out_scores_fifty() {
        let changes = vec![change(ChangeKind::CommentOut, "V.accountId", false)];
        assert_eq!(score_changes(&changes, &rules()), 50);
    }

    #[test]
    fn fragment_interpolation_adjacency_costs_ten_more() {
        let changes = vec![change(ChangeKind::PathRewrite, "V.logoUrl", true)];
        assert_eq!(score_changes(&changes, &rules()), 75);
    }

    #[test]
    fn score_floors_at_zero() {
        let changes: Vec<Change> = (0..4)
            .map(|_| change(ChangeKind::CommentOut, "V.accountId", false))
            .collect();
        assert_eq!(score_changes(&changes, &rules()), 0);
    }

    #[test]
    fn adding_changes_never_raises_the_score() {
        let rules = rules();
        let mut changes = vec![change(ChangeKind::FieldRename, "Query.venture", false)];
        let mut previous = score_changes(&changes, &rules);
        for extra in [
            change(ChangeKind::PathRewrite, "V.logoUrl", false),
            change(ChangeKind::CommentOut, "V.accountId", false),
            change(ChangeKind::CommentOut, "V.accountId", true),
        ] {
            changes.push(extra);
            let next = score_changes(&changes, &rules);
            assert!(next <= previous);
            previous = next;
        }
    }

    #[test]
    fn categories_follow_thresholds() {
        let thresholds = ConfidenceThresholds::default();
        assert_eq!(categorize(95, &thresholds), Category::Automatic);
        assert_eq!(categorize(90, &thresholds), Category::Automatic);
        assert_eq!(categorize(85, &thresholds), Category::SemiAutomatic);
        assert_eq!(categorize(70, &thresholds), Category::SemiAutomatic);
        assert_eq!(categorize(50, &thresholds), Category::Manual);
    }
}
