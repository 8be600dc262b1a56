//! Property tests for percept deltas and goal maintenance.

use cycle_mental::{MemoryKnowledgeBaseFactory, MentalEventBus, MentalState, PerceptDelta};
use cycle_types::{AgentId, BaseKind, Formula, Percept, Program, Term};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Percepts over a small vocabulary so that snapshots overlap often.
fn arb_percept() -> impl Strategy<Value = Percept> {
    (
        prop_oneof![Just("at"), Just("light"), Just("holding")],
        prop_oneof![Just("home"), Just("shop"), Just("on"), Just("off")],
    )
        .prop_map(|(functor, arg)| Percept::new(Formula::new(functor, vec![Term::atom(arg)])))
}

fn arb_percepts() -> impl Strategy<Value = BTreeSet<Percept>> {
    prop::collection::btree_set(arb_percept(), 0..8)
}

fn arb_formula() -> impl Strategy<Value = Formula> {
    (prop_oneof![Just("p"), Just("q"), Just("r")], 0i64..4)
        .prop_map(|(functor, n)| Formula::new(functor, vec![Term::Int(n)]))
}

fn mental_state(goals: Vec<Formula>) -> MentalState {
    MentalState::new(
        AgentId::new("prop"),
        Arc::new(Program::new("prop").with_goals(goals)),
        Arc::new(MemoryKnowledgeBaseFactory),
        MentalEventBus::default(),
    )
    .unwrap()
}

proptest! {
    #[test]
    fn prop_delta_round_trip(previous in arb_percepts(), current in arb_percepts()) {
        let delta = PerceptDelta::compute(&previous, &current);

        prop_assert_eq!(
            &delta.add,
            &current.difference(&previous).cloned().collect::<BTreeSet<_>>()
        );
        prop_assert_eq!(
            &delta.delete,
            &previous.difference(&current).cloned().collect::<BTreeSet<_>>()
        );

        let mut base = previous.clone();
        delta.apply_to(&mut base);
        prop_assert_eq!(&base, &current);
    }

    #[test]
    fn prop_percept_base_follows_snapshots(previous in arb_percepts(), current in arb_percepts()) {
        let mut ms = mental_state(Vec::new());
        ms.update_percepts(&previous, &BTreeSet::new()).unwrap();

        let delta = PerceptDelta::compute(&previous, &current);
        ms.update_percepts(&delta.add, &delta.delete).unwrap();

        let stored: BTreeSet<Formula> = ms.contents(BaseKind::Percept, None).unwrap().into_iter().collect();
        let expected: BTreeSet<Formula> = current.iter().map(|p| p.formula().clone()).collect();
        prop_assert_eq!(stored, expected);
    }

    #[test]
    fn prop_update_goal_state_is_idempotent(
        goals in prop::collection::vec(arb_formula(), 0..6),
        beliefs in prop::collection::vec(arb_formula(), 0..6),
    ) {
        let mut ms = mental_state(goals);
        for belief in &beliefs {
            ms.insert(BaseKind::Belief, belief, None).unwrap();
        }

        ms.update_goal_state(None).unwrap();
        let once = ms.contents(BaseKind::Goal, None).unwrap();
        let second = ms.update_goal_state(None).unwrap();
        let twice = ms.contents(BaseKind::Goal, None).unwrap();

        prop_assert!(second.is_empty());
        prop_assert_eq!(once, twice);
    }
}
