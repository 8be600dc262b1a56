//! Percept and message deltas between consecutive rounds

use cycle_types::{Message, Percept};
use std::collections::BTreeSet;

/// Elements to add and to delete to turn `previous` into `current`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDelta<T: Ord> {
    pub add: BTreeSet<T>,
    pub delete: BTreeSet<T>,
}

pub type PerceptDelta = SetDelta<Percept>;
pub type MessageDelta = SetDelta<Message>;

impl<T: Ord + Clone> SetDelta<T> {
    /// `add = current - previous`, `delete = previous - current`.
    pub fn compute(previous: &BTreeSet<T>, current: &BTreeSet<T>) -> Self {
        Self {
            add: current.difference(previous).cloned().collect(),
            delete: previous.difference(current).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.delete.is_empty()
    }

    /// Delete then add.
    pub fn apply_to(&self, base: &mut BTreeSet<T>) {
        for item in &self.delete {
            base.remove(item);
        }
        base.extend(self.add.iter().cloned());
    }
}
