//! Module and action execution

use crate::dispatch::dispatch_send;
use crate::evaluator::evaluate_condition;
use crate::run_state::RunState;
use cycle_types::{
    Action, BaseKind, CycleError, EnvAction, ExitCondition, Formula, KnowledgeBaseError, Module,
    ModuleKind, ModuleRef, RuleSet, Substitution,
};
use futures::future::{BoxFuture, FutureExt};
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{debug, trace};

pub struct ModuleExecutor;

impl ModuleExecutor {
    /// Run `module` until its exit condition holds.
    ///
    /// Returns whether any action was performed. The module is exited even
    /// when a rule fails, so the stack never keeps a dead frame.
    pub fn execute_fully(
        run_state: &mut RunState,
        module: Arc<Module>,
        subst: Substitution,
    ) -> BoxFuture<'_, Result<bool, CycleError>> {
        Self::execute_focused(run_state, module, subst, None)
    }

    pub(crate) fn execute_focused(
        run_state: &mut RunState,
        module: Arc<Module>,
        subst: Substitution,
        focus: Option<Formula>,
    ) -> BoxFuture<'_, Result<bool, CycleError>> {
        async move {
            run_state.module_stack_mut().enter(&module);
            debug!(
                agent = %run_state.agent(),
                module = module.display_name(),
                depth = run_state.module_stack().depth(),
                "Entered module"
            );

            let result = Self::run_until_exit(run_state, &module, &subst, focus.as_ref()).await;
            let exited = run_state.module_stack_mut().exit(&module);
            debug!(agent = %run_state.agent(), module = module.display_name(), "Exited module");

            let performed = result?;
            exited?;
            Ok(performed)
        }
        .boxed()
    }

    async fn run_until_exit(
        run_state: &mut RunState,
        module: &Module,
        subst: &Substitution,
        focus: Option<&Formula>,
    ) -> Result<bool, CycleError> {
        let exit = module.exit_condition();
        let mut performed_any = false;

        loop {
            run_state.check_killed()?;
            let performed = Self::run_rule_set(run_state, &module.rules, subst, focus).await?;
            performed_any |= performed;

            // The main module runs one iteration per round; the controller loops
            if module.kind == ModuleKind::Main {
                return Ok(performed_any);
            }
            let done = match exit {
                ExitCondition::Always => true,
                ExitCondition::Never => false,
                ExitCondition::NoAction => !performed,
                ExitCondition::NoGoals => run_state
                    .mental_state()
                    .contents(BaseKind::Goal, None)?
                    .is_empty(),
            };
            if done {
                return Ok(performed_any);
            }

            if run_state.module_stack().is_main_context_active() {
                run_state.start_cycle(performed, None).await?;
            } else if !performed {
                // Inside init/event no new input arrives, so nothing can change
                return Ok(performed_any);
            }
        }
    }

    async fn run_rule_set(
        run_state: &mut RunState,
        rules: &RuleSet,
        subst: &Substitution,
        focus: Option<&Formula>,
    ) -> Result<bool, CycleError> {
        let mut performed = false;
        for index in rule_order(rules) {
            let rule = &rules.rules[index];
            let solutions =
                evaluate_condition(run_state.mental_state(), &rule.condition, subst, focus)?;
            let Some(solution) = solutions.into_iter().next() else {
                continue;
            };

            trace!(agent = %run_state.agent(), rule = index, bindings = %solution.substitution, "Rule applicable");
            if solution.goal.is_some() {
                run_state.set_focus_goal(solution.goal);
            }
            performed |=
                ActionExecutor::execute_all(run_state, &rule.actions, &solution.substitution).await?;

            if !rules.order.fires_all() {
                break;
            }
        }
        Ok(performed)
    }
}

fn rule_order(rules: &RuleSet) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rules.rules.len()).collect();
    if rules.order.is_random() {
        order.shuffle(&mut rand::thread_rng());
    }
    order
}

pub struct ActionExecutor;

impl ActionExecutor {
    /// Execute the actions of a rule in order.
    pub async fn execute_all(
        run_state: &mut RunState,
        actions: &[Action],
        subst: &Substitution,
    ) -> Result<bool, CycleError> {
        let mut performed = false;
        for action in actions {
            performed |= Self::execute(run_state, action, subst).await?;
        }
        Ok(performed)
    }

    pub fn execute<'a>(
        run_state: &'a mut RunState,
        action: &'a Action,
        subst: &'a Substitution,
    ) -> BoxFuture<'a, Result<bool, CycleError>> {
        async move {
            trace!(agent = %run_state.agent(), action = action.name(), "Executing action");
            match action {
                Action::Insert(formula) => {
                    let belief = ground(formula, subst)?;
                    run_state
                        .mental_state_mut()
                        .insert(BaseKind::Belief, &belief, None)?;
                    run_state.update_goal_state(None)?;
                    Ok(true)
                }
                Action::Delete(formula) => {
                    let belief = ground(formula, subst)?;
                    run_state
                        .mental_state_mut()
                        .delete(BaseKind::Belief, &belief, None)?;
                    run_state.update_goal_state(None)?;
                    Ok(true)
                }
                Action::Adopt(formula) => {
                    let goal = ground(formula, subst)?;
                    run_state.mental_state_mut().adopt(&goal, None)?;
                    Ok(true)
                }
                Action::Drop(formula) => {
                    let pattern = formula.apply(subst);
                    run_state.mental_state_mut().drop_goal(&pattern, None)?;
                    Ok(true)
                }
                Action::Send(send) => {
                    dispatch_send(run_state, send, subst).await?;
                    Ok(true)
                }
                Action::Log(text) => {
                    run_state.log(text);
                    Ok(true)
                }
                Action::Call(target) => {
                    let focus = run_state.take_focus_goal();
                    match target {
                        ModuleRef::Named(name) => {
                            let module = run_state
                                .program()
                                .module(name)
                                .ok_or_else(|| CycleError::ModuleNotFound(name.clone()))?;
                            ModuleExecutor::execute_focused(run_state, module, Substitution::empty(), focus)
                                .await
                        }
                        ModuleRef::Inline(module) => {
                            ModuleExecutor::execute_focused(run_state, module.clone(), subst.clone(), focus)
                                .await
                        }
                    }
                }
                Action::UserSpec(env_action) => {
                    let grounded = EnvAction {
                        name: env_action.name.clone(),
                        parameters: env_action
                            .parameters
                            .iter()
                            .map(|p| ground(p, subst))
                            .collect::<Result<Vec<_>, _>>()?,
                    };
                    Ok(run_state.perform_action(&grounded).await)
                }
            }
        }
        .boxed()
    }
}

/// Instantiate `formula`; actions only operate on ground formulas.
fn ground(formula: &Formula, subst: &Substitution) -> Result<Formula, KnowledgeBaseError> {
    let instance = formula.apply(subst);
    if instance.is_ground() {
        Ok(instance)
    } else {
        Err(KnowledgeBaseError::NonGround(instance.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_rejects_unbound_variables() {
        let formula = Formula::parse("at(X)").unwrap();
        assert!(matches!(
            ground(&formula, &Substitution::empty()),
            Err(KnowledgeBaseError::NonGround(_))
        ));
        let mut subst = Substitution::empty();
        subst.bind("X", cycle_types::Term::atom("home"));
        assert_eq!(ground(&formula, &subst).unwrap().to_string(), "at(home)");
    }

    #[test]
    fn test_linear_order_is_stable() {
        let rules = RuleSet::new(
            cycle_types::RuleEvaluationOrder::Linear,
            vec![
                cycle_types::Rule::new(vec![], vec![]),
                cycle_types::Rule::new(vec![], vec![]),
                cycle_types::Rule::new(vec![], vec![]),
            ],
        );
        assert_eq!(rule_order(&rules), vec![0, 1, 2]);
    }

    #[test]
    fn test_random_order_is_a_permutation() {
        let rules = RuleSet::new(
            cycle_types::RuleEvaluationOrder::RandomAll,
            (0..10).map(|_| cycle_types::Rule::new(vec![], vec![])).collect(),
        );
        let mut order = rule_order(&rules);
        order.sort_unstable();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
    }
}
