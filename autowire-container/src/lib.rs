//! Core container implementation for autowire.

pub mod container;
pub mod error;
pub mod inject;
pub mod markers;
pub mod parameter;
pub mod priority;
pub mod provider;
pub mod reflect;
pub mod resolver;
pub mod stack;
pub mod value;

pub use container::{CallableSpec, Container, ContainerBuilder, prelude};
pub use error::{ContainerError, Result};
pub use parameter::{Arguments, ParameterDescriptor, Parameters};
pub use priority::{Priority, PriorityCollection};
pub use stack::StackableContainer;
pub use value::{Function, Object, Value};
