//! Percepts, messages and moods

use crate::errors::CycleError;
use crate::ids::AgentId;
use crate::term::{Formula, Term};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// An environment observation, delivered once per round
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percept(Formula);

impl Percept {
    pub fn new(formula: Formula) -> Self {
        Self(formula)
    }

    pub fn parse(input: &str) -> Result<Self, crate::errors::FormulaParseError> {
        Formula::parse(input).map(Self)
    }

    pub fn formula(&self) -> &Formula {
        &self.0
    }

    pub fn into_formula(self) -> Formula {
        self.0
    }
}

impl fmt::Display for Percept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "percept({})", self.0)
    }
}

/// Illocutionary type of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    /// An assertion: the sender believes the content
    Indicative,
    /// A request: the sender wants the content to become true
    Imperative,
    /// A question: the sender asks whether the content holds
    Interrogative,
}

impl Mood {
    /// Functor used to annotate non-indicative content in the mailbox.
    pub fn annotation(&self) -> Option<&'static str> {
        match self {
            Mood::Indicative => None,
            Mood::Imperative => Some("imp"),
            Mood::Interrogative => Some("int"),
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mood::Indicative => "indicative",
            Mood::Imperative => "imperative",
            Mood::Interrogative => "interrogative",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Mood {
    type Err = CycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "indicative" | "ind" => Ok(Mood::Indicative),
            "imperative" | "imp" => Ok(Mood::Imperative),
            "interrogative" | "int" => Ok(Mood::Interrogative),
            other => Err(CycleError::UnsupportedMood(other.to_string())),
        }
    }
}

/// A message exchanged between agents
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Message {
    pub sender: Option<AgentId>,
    pub receivers: BTreeSet<AgentId>,
    pub mood: Mood,
    pub content: Formula,
}

impl Message {
    /// An unaddressed message; sender and receivers are stamped on send.
    pub fn new(mood: Mood, content: Formula) -> Self {
        Self {
            sender: None,
            receivers: BTreeSet::new(),
            mood,
            content,
        }
    }

    pub fn indicative(content: Formula) -> Self {
        Self::new(Mood::Indicative, content)
    }

    pub fn imperative(content: Formula) -> Self {
        Self::new(Mood::Imperative, content)
    }

    pub fn interrogative(content: Formula) -> Self {
        Self::new(Mood::Interrogative, content)
    }

    pub fn with_sender(mut self, sender: AgentId) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn with_receivers(mut self, receivers: impl IntoIterator<Item = AgentId>) -> Self {
        self.receivers = receivers.into_iter().collect();
        self
    }

    /// Content annotated with the mood, e.g. `imp(at(home))`.
    pub fn annotated_content(&self) -> Formula {
        match self.mood.annotation() {
            Some(functor) => self.content.wrap(functor),
            None => self.content.clone(),
        }
    }

    /// Mailbox representation: `received(Sender, C)` or `sent([R...], C)`.
    pub fn mailbox_formula(&self, received: bool) -> Formula {
        let content = Term::from_formula(self.annotated_content());
        if received {
            let sender = self
                .sender
                .as_ref()
                .map(|s| Term::atom(s.as_str()))
                .unwrap_or_else(|| Term::atom("unknown"));
            Formula::new("received", vec![sender, content])
        } else {
            let receivers = self
                .receivers
                .iter()
                .map(|r| Term::atom(r.as_str()))
                .collect();
            Formula::new("sent", vec![Term::List(receivers), content])
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sender = self.sender.as_ref().map(AgentId::as_str).unwrap_or("?");
        write!(f, "{} -> [", sender)?;
        for (i, r) in self.receivers.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", r)?;
        }
        write!(f, "] {}: {}", self.mood, self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mood_parsing() {
        assert_eq!("imp".parse::<Mood>().unwrap(), Mood::Imperative);
        assert_eq!("Interrogative".parse::<Mood>().unwrap(), Mood::Interrogative);
        let err = "declarative".parse::<Mood>().unwrap_err();
        assert!(matches!(err, CycleError::UnsupportedMood(ref m) if m == "declarative"));
    }

    #[test]
    fn test_mailbox_formula_received() {
        let msg = Message::imperative(Formula::parse("at(home)").unwrap())
            .with_sender(AgentId::new("alice"));
        assert_eq!(
            msg.mailbox_formula(true).to_string(),
            "received(alice, imp(at(home)))"
        );
    }

    #[test]
    fn test_mailbox_formula_sent_lists_all_receivers_once() {
        let msg = Message::indicative(Formula::prop("ok"))
            .with_sender(AgentId::new("alice"))
            .with_receivers([AgentId::new("carol"), AgentId::new("bob")]);
        assert_eq!(msg.mailbox_formula(false).to_string(), "sent([bob, carol], ok)");
    }

    #[test]
    fn test_value_equality() {
        let a = Message::indicative(Formula::prop("ok")).with_sender(AgentId::new("x"));
        let b = Message::indicative(Formula::prop("ok")).with_sender(AgentId::new("x"));
        let set: BTreeSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }
}
