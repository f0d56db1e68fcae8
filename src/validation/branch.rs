//! Picking the live alternatives of a `oneOf`/`anyOf`.
//!
//! Validation wants every branch the node strictly satisfies, so it can
//! report zero or several matches. Completion wants one branch to keep
//! navigating into even while the document is half typed. Both go through
//! [`resolve_branches`], which narrows the candidates in three tiers:
//!
//! 1. branches with no errors at all;
//! 2. otherwise, branches whose type check passes for this exact node,
//!    narrowed to the lowest weighted error score when several remain;
//! 3. otherwise, every branch.
//!
//! Only errors located at the node itself count toward tier 2, so a deeply
//! nested mistake does not make a structurally right branch look worse
//! than a structurally wrong one.

use super::problem::{ProblemCode, ValidationProblem};
use super::Validator;
use crate::document::NodeId;
use crate::schema::Schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// At least one branch validates without errors.
    Strict,
    /// No branch validates; the candidates at least have the right type.
    Typed,
    /// Nothing fits; all branches are returned.
    Unmatched,
}

#[derive(Debug, Clone)]
pub struct BranchMatch {
    pub tier: MatchTier,
    /// Indices into the branch list, in declaration order.
    pub candidates: Vec<usize>,
    /// Problems of every branch, in declaration order.
    pub problems: Vec<Vec<ValidationProblem>>,
}

impl BranchMatch {
    /// The branch to follow when exactly one is needed.
    pub fn best(&self) -> usize {
        self.candidates.first().copied().unwrap_or(0)
    }
}

pub fn resolve_branches(
    validator: &Validator<'_>,
    node: NodeId,
    branches: &[Schema],
    depth: usize,
) -> BranchMatch {
    let offset = validator.tree().node(node).offset;
    let problems: Vec<Vec<ValidationProblem>> = branches
        .iter()
        .map(|branch| validator.validate_node(node, branch, depth))
        .collect();

    let strict: Vec<usize> = (0..branches.len())
        .filter(|&i| !problems[i].iter().any(ValidationProblem::is_error))
        .collect();
    if !strict.is_empty() {
        return BranchMatch {
            tier: MatchTier::Strict,
            candidates: strict,
            problems,
        };
    }

    let typed: Vec<usize> = (0..branches.len())
        .filter(|&i| {
            !problems[i]
                .iter()
                .any(|p| p.is_error() && p.start == offset && p.code == Some(ProblemCode::Type))
        })
        .collect();
    if typed.is_empty() {
        return BranchMatch {
            tier: MatchTier::Unmatched,
            candidates: (0..branches.len()).collect(),
            problems,
        };
    }

    let score = |i: usize| -> u32 {
        problems[i]
            .iter()
            .filter(|p| p.is_error() && p.start == offset)
            .map(ValidationProblem::weight)
            .sum()
    };
    let best_score = typed.iter().map(|&i| score(i)).min().unwrap_or(0);
    let candidates = typed
        .into_iter()
        .filter(|&i| score(i) == best_score)
        .collect();

    BranchMatch {
        tier: MatchTier::Typed,
        candidates,
        problems,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::schema::EffectiveSchema;
    use crate::validation::ValidationOptions;
    use serde_json::{json, Value};

    fn resolve(branches: Value, text: &str) -> BranchMatch {
        let schema = EffectiveSchema::compile(json!({ "oneOf": branches }));
        let document = Document::new(text);
        let tree = document.tree().unwrap();
        let options = ValidationOptions::default();
        let validator = Validator::new(tree, &schema, &options);
        let branches = schema.root().as_node().unwrap().one_of.clone().unwrap();
        resolve_branches(&validator, tree.root(), &branches, 1)
    }

    #[test]
    fn test_single_strict_match_is_returned_alone() {
        let matched = resolve(
            json!([{"type": "string"}, {"type": "number"}, {"type": "object"}]),
            "42",
        );
        assert_eq!(matched.tier, MatchTier::Strict);
        assert_eq!(matched.candidates, vec![1]);
    }

    #[test]
    fn test_all_strict_matches_are_returned() {
        let matched = resolve(json!([{"type": "number"}, {}, {"type": "string"}]), "1");
        assert_eq!(matched.candidates, vec![0, 1]);
    }

    #[test]
    fn test_typed_tier_prefers_lowest_score() {
        let matched = resolve(
            json!([
                {"type": "object", "required": ["a", "b"]},
                {"type": "object", "required": ["a"]},
                {"type": "array"}
            ]),
            "{}",
        );
        assert_eq!(matched.tier, MatchTier::Typed);
        assert_eq!(matched.candidates, vec![1]);
    }

    #[test]
    fn test_typed_tier_keeps_ties() {
        let matched = resolve(
            json!([
                {"type": "object", "required": ["a"]},
                {"type": "object", "required": ["b"]}
            ]),
            "{}",
        );
        assert_eq!(matched.candidates, vec![0, 1]);
        assert_eq!(matched.best(), 0);
    }

    #[test]
    fn test_nested_errors_do_not_count_toward_score() {
        let matched = resolve(
            json!([
                {"type": "object", "properties": {"a": {"type": "string"}}, "required": ["z"]},
                {"type": "object", "required": ["a", "b"]}
            ]),
            "{\"a\": 1}",
        );
        // branch 0: one required (120) at the node, a nested type error ignored
        // branch 1: one required (120) at the node
        assert_eq!(matched.candidates, vec![0, 1]);
    }

    #[test]
    fn test_nothing_typed_returns_every_branch() {
        let matched = resolve(json!([{"type": "string"}, {"type": "number"}]), "true");
        assert_eq!(matched.tier, MatchTier::Unmatched);
        assert_eq!(matched.candidates, vec![0, 1]);
    }
}
