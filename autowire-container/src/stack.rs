//! Fallback chain of containers.
//!
//! The most recently stacked container is asked first; each failure falls
//! through to the next one. Only when the last container fails does the
//! stack report the id as not found, carrying that last failure as cause.
//!
//! # Examples
//! ```rust
//! use autowire_container::prelude::*;
//!
//! let defaults = Container::new();
//! defaults.set("level", "info");
//! defaults.set("format", "text");
//!
//! let overrides = Container::new();
//! overrides.set("level", "debug");
//!
//! let stack = StackableContainer::new([defaults, overrides]).expect("distinct containers");
//! assert_eq!(stack.get("level").unwrap(), Value::from("debug"));
//! assert_eq!(stack.get("format").unwrap(), Value::from("text"));
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::container::Container;
use crate::error::{ContainerError, NotFoundError, Result, StackError};
use crate::value::Value;

/// Several containers consulted as one, newest first.
pub struct StackableContainer {
    containers: RwLock<Vec<Arc<Container>>>,
}

impl StackableContainer {
    /// Stacks `containers` in order, so the last one ends up on top.
    pub fn new(containers: impl IntoIterator<Item = Arc<Container>>) -> Result<Self> {
        let stack = Self {
            containers: RwLock::new(Vec::new()),
        };
        for container in containers {
            stack.add_container(container)?;
        }

        if stack.is_empty() {
            return Err(StackError::Empty.into());
        }
        Ok(stack)
    }

    /// Whether this exact container is already part of the stack.
    pub fn has_container(&self, container: &Arc<Container>) -> bool {
        self.containers
            .read()
            .iter()
            .any(|stacked| Arc::ptr_eq(stacked, container))
    }

    /// Puts `container` on top of the stack.
    pub fn add_container(&self, container: Arc<Container>) -> Result<()> {
        let mut containers = self.containers.write();
        if containers.iter().any(|stacked| Arc::ptr_eq(stacked, &container)) {
            return Err(StackError::AlreadyStacked.into());
        }

        containers.insert(0, container);
        debug!(depth = containers.len(), "Container stacked");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.containers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.read().is_empty()
    }

    /// Whether any stacked container can supply `id`.
    pub fn has(&self, id: &str) -> bool {
        self.snapshot().iter().any(|container| container.has(id))
    }

    /// First value any stacked container supplies for `id`.
    pub fn get(&self, id: &str) -> Result<Value> {
        let mut last = None;

        for (depth, container) in self.snapshot().iter().enumerate() {
            match container.get(id) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    trace!(id, depth, error = %err, "Falling through to next container");
                    last = Some(err);
                }
            }
        }

        Err(ContainerError::NotFound(NotFoundError {
            id: id.to_string(),
            suggestions: Vec::new(),
            source: last.map(Box::new),
        }))
    }

    // resolution may stack more containers; never hold the lock across it
    fn snapshot(&self) -> Vec<Arc<Container>> {
        self.containers.read().clone()
    }
}

impl fmt::Debug for StackableContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackableContainer")
            .field("containers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with(id: &str, value: impl Into<Value>) -> Arc<Container> {
        let container = Container::new();
        container.set(id, value);
        container
    }

    #[test]
    fn newest_container_answers_first() {
        let stack = StackableContainer::new([with("a", 1), with("a", 2)]).unwrap();
        assert_eq!(stack.get("a").unwrap(), Value::Int(2));

        stack.add_container(with("a", 3)).unwrap();
        assert_eq!(stack.get("a").unwrap(), Value::Int(3));
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn failures_fall_through() {
        let stack = StackableContainer::new([with("a", 1), with("b", 2)]).unwrap();
        assert_eq!(stack.get("a").unwrap(), Value::Int(1));
        assert_eq!(stack.get("b").unwrap(), Value::Int(2));
    }

    #[test]
    fn has_checks_every_container() {
        let stack = StackableContainer::new([with("a", 1), with("b", 2)]).unwrap();
        assert!(stack.has("a"));
        assert!(stack.has("b"));
        assert!(!stack.has("c"));
    }

    #[test]
    fn last_failure_becomes_the_cause() {
        let stack = StackableContainer::new([with("a", 1), with("b", 2)]).unwrap();

        match stack.get("missing").unwrap_err() {
            ContainerError::NotFound(err) => {
                assert_eq!(err.id, "missing");
                assert!(matches!(err.source.as_deref(), Some(ContainerError::NotFound(_))));
            }
            other => panic!("expected NotFound, got: {other:?}"),
        }
    }

    #[test]
    fn same_container_is_stacked_once() {
        let shared = with("a", 1);
        let stack = StackableContainer::new([shared.clone()]).unwrap();
        assert!(stack.has_container(&shared));

        let result = stack.add_container(shared);
        assert!(matches!(result, Err(ContainerError::Stack(StackError::AlreadyStacked))));
        assert_eq!(stack.len(), 1);

        let other = with("a", 1);
        assert!(!stack.has_container(&other));
        assert!(matches!(
            StackableContainer::new([other.clone(), other]),
            Err(ContainerError::Stack(StackError::AlreadyStacked))
        ));
    }

    #[test]
    fn empty_stack_is_rejected() {
        let result = StackableContainer::new(Vec::new());
        assert!(matches!(result, Err(ContainerError::Stack(StackError::Empty))));
    }
}
