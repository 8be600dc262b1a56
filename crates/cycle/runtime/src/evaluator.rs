//! Rule condition evaluation

use cycle_mental::unify::matches;
use cycle_mental::MentalState;
use cycle_types::{Formula, KnowledgeBaseError, MentalLiteral, Substitution};

/// One way a condition holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub substitution: Substitution,
    /// Own goal matched by the last positive goal literal, if any
    pub goal: Option<Formula>,
}

/// Evaluate a conjunction of literals left to right.
///
/// With a `focus` goal, positive goal literals on the own goal base only
/// match that goal.
pub fn evaluate_condition(
    mental: &MentalState,
    condition: &[MentalLiteral],
    subst: &Substitution,
    focus: Option<&Formula>,
) -> Result<Vec<Solution>, KnowledgeBaseError> {
    let mut frontier = vec![Solution {
        substitution: subst.clone(),
        goal: None,
    }];

    for literal in condition {
        let tracks_goal = literal.kind.is_goal_literal() && !literal.negated && literal.agent.is_none();
        let mut next = Vec::new();
        for solution in &frontier {
            for answer in mental.query_literal(literal, &solution.substitution)? {
                let goal = if tracks_goal {
                    let matched = literal.formula.apply(&answer);
                    if let Some(focus) = focus {
                        if !matches(&matched, focus, &Substitution::empty()) {
                            continue;
                        }
                    }
                    Some(matched)
                } else {
                    solution.goal.clone()
                };
                next.push(Solution {
                    substitution: answer,
                    goal,
                });
            }
        }
        if next.is_empty() {
            return Ok(next);
        }
        frontier = next;
    }
    Ok(frontier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cycle_mental::{MemoryKnowledgeBaseFactory, MentalEventBus};
    use cycle_types::{AgentId, BaseKind, Program, Term};
    use std::sync::Arc;

    fn f(s: &str) -> Formula {
        Formula::parse(s).unwrap()
    }

    fn state(program: Program) -> MentalState {
        MentalState::new(
            AgentId::new("a"),
            Arc::new(program),
            Arc::new(MemoryKnowledgeBaseFactory),
            MentalEventBus::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_conjunction_joins_bindings() {
        let ms = state(
            Program::new("p")
                .with_beliefs([f("at(home)"), f("road(home, shop)"), f("road(home, bank)")])
                .with_goals([f("at(shop)")]),
        );
        let condition = vec![
            MentalLiteral::bel(f("at(From)")),
            MentalLiteral::a_goal(f("at(To)")),
            MentalLiteral::bel(f("road(From, To)")),
        ];
        let solutions = evaluate_condition(&ms, &condition, &Substitution::empty(), None).unwrap();
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].substitution.resolve("To"), Some(Term::atom("shop")));
        assert_eq!(solutions[0].goal, Some(f("at(shop)")));
    }

    #[test]
    fn test_failed_literal_short_circuits() {
        let ms = state(Program::new("p").with_beliefs([f("at(home)")]));
        let condition = vec![MentalLiteral::bel(f("at(shop)")), MentalLiteral::truth()];
        assert!(evaluate_condition(&ms, &condition, &Substitution::empty(), None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_empty_condition_holds_once() {
        let ms = state(Program::new("p"));
        let solutions = evaluate_condition(&ms, &[], &Substitution::empty(), None).unwrap();
        assert_eq!(solutions.len(), 1);
        assert!(solutions[0].goal.is_none());
    }

    #[test]
    fn test_focus_restricts_goal_literals() {
        let mut ms = state(Program::new("p").with_goals([f("at(shop)"), f("at(bank)")]));
        ms.insert(BaseKind::Belief, &f("open(bank)"), None).unwrap();

        let condition = vec![MentalLiteral::goal(f("at(X)"))];
        let all = evaluate_condition(&ms, &condition, &Substitution::empty(), None).unwrap();
        assert_eq!(all.len(), 2);

        let focused =
            evaluate_condition(&ms, &condition, &Substitution::empty(), Some(&f("at(bank)"))).unwrap();
        assert_eq!(focused.len(), 1);
        assert_eq!(focused[0].substitution.resolve("X"), Some(Term::atom("bank")));
    }
}
