//! Cycle Mental
//!
//! The mental state of an agent: the knowledge-base seam and its in-memory
//! reference engine, the mental state facade with per-agent models, the
//! percept/message delta processor and the change-event channel observers
//! subscribe to.

pub mod delta;
pub mod events;
pub mod knowledge;
pub mod memory;
pub mod mental_state;
pub mod unify;

pub use delta::{MessageDelta, PerceptDelta, SetDelta};
pub use events::{MentalChange, MentalEvent, MentalEventBus};
pub use knowledge::{KnowledgeBase, KnowledgeBaseFactory};
pub use memory::{GoalBase, MemoryKnowledgeBase, MemoryKnowledgeBaseFactory, MEMORY_LANGUAGE};
pub use mental_state::{MentalSnapshot, MentalState};
