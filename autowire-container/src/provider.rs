//! Service providers: lazily loaded groups of registrations.
//!
//! A provider announces the ids it provides up front. Nothing runs until one
//! of those ids is requested; then [`ServiceProvider::register`] is called
//! once and the container resolves the id as if it had always been set.
//!
//! # Examples
//! ```rust,ignore
//! struct DatabaseProvider;
//!
//! impl ServiceProvider for DatabaseProvider {
//!     fn provides(&self) -> Vec<String> {
//!         vec!["Database".into(), "db".into()]
//!     }
//!
//!     fn register(&self, container: &Container) -> Result<()> {
//!         container.define(database_class());
//!         container.alias(["db"], "Database")
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::container::Container;
use crate::error::Result;
use crate::parameter::Parameters;
use crate::value::Value;

/// A group of registrations loaded on first use.
pub trait ServiceProvider: Send + Sync {
    /// Ids this provider will register.
    fn provides(&self) -> Vec<String>;

    /// Registers everything in [`provides`](Self::provides).
    ///
    /// Called at most once per registration of the provider.
    fn register(&self, container: &Container) -> Result<()>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Callback form of a provider's registration.
pub type RegisterFn = Arc<dyn Fn(&Container) -> Result<()> + Send + Sync>;

/// What a [`SimpleServiceProvider`] registers.
#[derive(Clone)]
pub enum ProvidedEntry {
    /// Runs arbitrary registration code.
    Callback(RegisterFn),
    /// Sets every provided id to this value.
    Value(Value),
    /// Makes this class once and sets every provided id to the instance.
    /// An id that names no instantiable class is set as a plain string.
    Class(String),
}

impl fmt::Debug for ProvidedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callback(_) => f.write_str("Callback(..)"),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Class(class) => f.debug_tuple("Class").field(class).finish(),
        }
    }
}

/// Provider built from a list of ids and a single entry.
#[derive(Debug, Clone)]
pub struct SimpleServiceProvider {
    provides: Vec<String>,
    entry: ProvidedEntry,
}

impl SimpleServiceProvider {
    pub fn new<I, S>(provides: I, entry: ProvidedEntry) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            provides: provides.into_iter().map(Into::into).collect(),
            entry,
        }
    }

    pub fn callback<I, S, F>(provides: I, callback: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Container) -> Result<()> + Send + Sync + 'static,
    {
        Self::new(provides, ProvidedEntry::Callback(Arc::new(callback)))
    }

    pub fn value<I, S>(provides: I, value: impl Into<Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(provides, ProvidedEntry::Value(value.into()))
    }

    pub fn class<I, S>(provides: I, class: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(provides, ProvidedEntry::Class(class.into()))
    }

    pub fn entry(&self) -> &ProvidedEntry {
        &self.entry
    }
}

impl ServiceProvider for SimpleServiceProvider {
    fn provides(&self) -> Vec<String> {
        self.provides.clone()
    }

    fn register(&self, container: &Container) -> Result<()> {
        if self.provides.is_empty() {
            return Ok(());
        }

        let value = match &self.entry {
            ProvidedEntry::Callback(callback) => return callback(container),
            ProvidedEntry::Value(value) => value.clone(),
            ProvidedEntry::Class(class) if container.reflector().is_instantiable(class) => {
                debug!(class, "Making provided class");
                container.make(class, Parameters::none())?
            }
            ProvidedEntry::Class(class) => Value::from(class.as_str()),
        };

        container.set_many(self.provides.iter().map(|id| (id.clone(), value.clone())));
        Ok(())
    }

    fn name(&self) -> &str {
        "simple"
    }
}
