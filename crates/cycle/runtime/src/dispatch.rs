//! Send action dispatch
//!
//! Order of effects: resolve receivers, stamp the message, post it, record
//! it in the sender's mailbox, re-check goals. A failed post is reported
//! only after the message has been recorded as sent.

use crate::evaluator::evaluate_condition;
use crate::run_state::RunState;
use cycle_mental::MentalState;
use cycle_types::{
    AgentId, CycleError, KnowledgeBaseError, Message, ReceiverResolutionError, SendAction, Selector,
    Substitution, Term,
};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Resolve the concrete receivers of a selector.
///
/// A condition that currently does not hold yields no receivers.
pub fn resolve_receivers(
    mental: &MentalState,
    selector: &Selector,
    subst: &Substitution,
) -> Result<BTreeSet<AgentId>, ReceiverResolutionError> {
    let me = mental.agent();
    let receivers = match selector {
        Selector::All => mental.known_agents().clone(),
        Selector::AllOther => mental
            .known_agents()
            .iter()
            .filter(|a| *a != me)
            .cloned()
            .collect(),
        Selector::This => BTreeSet::from([me.clone()]),
        Selector::Agents(agents) => agents.iter().cloned().collect(),
        Selector::Condition {
            variable,
            condition,
        } => {
            let occurs = subst.get(variable).is_some()
                || condition
                    .iter()
                    .any(|literal| literal.formula.variables().contains(variable));
            if !occurs {
                return Err(ReceiverResolutionError::UndefinedVariable(variable.clone()));
            }

            let mut receivers = BTreeSet::new();
            for solution in evaluate_condition(mental, condition, subst, None)? {
                match solution.substitution.resolve(variable) {
                    Some(Term::Atom(name)) => {
                        receivers.insert(AgentId::new(name));
                    }
                    other => {
                        return Err(ReceiverResolutionError::NotAnAgent {
                            variable: variable.clone(),
                            term: other.map(|t| t.to_string()).unwrap_or_else(|| variable.clone()),
                        });
                    }
                }
            }
            receivers
        }
    };
    Ok(receivers)
}

/// Execute a send action on behalf of the agent owning `run_state`.
pub async fn dispatch_send(
    run_state: &mut RunState,
    send: &SendAction,
    subst: &Substitution,
) -> Result<Message, CycleError> {
    let receivers = resolve_receivers(run_state.mental_state(), &send.selector, subst)?;

    let content = send.content.apply(subst);
    if !content.is_ground() {
        return Err(KnowledgeBaseError::NonGround(content.to_string()).into());
    }
    let message = Message::new(send.mood, content)
        .with_sender(run_state.agent().clone())
        .with_receivers(receivers);

    let posted = if message.receivers.is_empty() {
        debug!(agent = %run_state.agent(), "Send resolved to no receivers");
        Ok(())
    } else {
        run_state.post_message(&message).await
    };

    run_state.mental_state_mut().record_message(&message, false)?;
    run_state.update_goal_state(None)?;

    match posted {
        Ok(()) => {
            run_state.telemetry().message_sent(message.receivers.len());
            debug!(agent = %run_state.agent(), message = %message, "Message sent");
            Ok(message)
        }
        Err(e) => {
            warn!(agent = %run_state.agent(), message = %message, error = %e, "Message transport failed");
            Err(e)
        }
    }
}
