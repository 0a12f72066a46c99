//! Per-request controller stack.
//!
//! Controllers push themselves on entry and pop on exit so code running
//! inside a request can ask for "the current controller". The stack is
//! owned by one `DispatchContext`; concurrent requests never see each
//! other's entries.

use crate::error::StackError;
use crate::handler::node::NodeId;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    id: NodeId,
    name: String,
}

/// Most-recently-entered-first stack of running controllers.
#[derive(Debug, Default)]
pub struct ControllerStack {
    entries: Vec<Entry>,
}

impl ControllerStack {
    pub fn push(&mut self, id: NodeId, name: &str) {
        self.entries.push(Entry {
            id,
            name: name.to_string(),
        });
    }

    /// Pop `id`, which must be on top. An unpaired pop leaves the stack
    /// unchanged and is reported.
    pub fn pop(&mut self, id: NodeId, name: &str) -> Result<(), StackError> {
        match self.entries.last() {
            Some(top) if top.id == id => {
                self.entries.pop();
                Ok(())
            }
            Some(top) => Err(StackError::NotOnTop {
                popped: name.to_string(),
                top: top.name.clone(),
            }),
            None => Err(StackError::Empty(name.to_string())),
        }
    }

    /// Name of the controller on top.
    pub fn current(&self) -> Option<&str> {
        self.entries.last().map(|e| e.name.as_str())
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Controller names, top first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().rev().map(|e| e.name.as_str())
    }
}
