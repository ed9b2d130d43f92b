//! # The Container
//!
//! Autowiring service container: a registry of values and deferred
//! factories, fronted by a priority-ordered resolver chain and followed by a
//! post-construction pipeline.
//!
//! # Architecture
//! ```text
//! get(id) ──alias──> canonical id ──provider──> loaded
//!    │                                            │
//!    │ cached? ──yes──> shared value              ▼
//!    └──no──> make(id) ──stack guard──> resolver chain ──> post-processors
//!                                                               │
//!                                               cached by get() ◄┘
//! ```
//!
//! # Examples
//! ```rust
//! use autowire_container::prelude::*;
//!
//! struct Greeter {
//!     greeting: String,
//! }
//!
//! let container = Container::new();
//! container.set("greeting", "hello");
//! container.define(
//!     ClassDefinition::new("Greeter").constructor(
//!         [ParameterDescriptor::new("greeting").typed("string")],
//!         |_, args| {
//!             let greeting = args.get(0).and_then(Value::as_str).unwrap_or_default();
//!             Ok(Greeter { greeting: greeting.to_string() })
//!         },
//!     ),
//! );
//!
//! let greeter = container
//!     .make("Greeter", Parameters::positional(["hi"]))
//!     .expect("Greeter resolves");
//! assert_eq!(greeter.downcast::<Greeter>().unwrap().greeting, "hi");
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

use autowire_support::rendering::suggest_similar;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{
    AliasError, CircularDependencyError, ContainerError, NotFoundError, ResolverError, Result,
};
use crate::inject::{
    AwareInjector, INJECT_PROPERTIES_PRIORITY, InjectProperties, PostProcessor, RequiredInjector,
};
use crate::parameter::Parameters;
use crate::priority::{Priority, PriorityCollection};
use crate::provider::ServiceProvider;
use crate::reflect::{ClassDefinition, MethodOwner, Reflector, Target};
use crate::resolver::{AutowireResolver, Resolution, Resolver};
use crate::value::{Function, Object, Value};

/// Id under which the container registers itself.
pub const CONTAINER_ID: &str = "Container";

/// Aliases of [`CONTAINER_ID`] present in every container.
pub const CONTAINER_ALIASES: [&str; 2] = ["ContainerInterface", "autowire::Container"];

/// How many similar ids a not-found error suggests.
const MAX_SUGGESTIONS: usize = 3;

// ═══════════════════════════════════════════
// Chain entries
// ═══════════════════════════════════════════

/// Shared handle compared by identity, so the same resolver or processor
/// is only added to a chain once.
struct Link<T: ?Sized>(Arc<T>);

impl<T: ?Sized> PartialEq for Link<T> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

// ═══════════════════════════════════════════
// Callables
// ═══════════════════════════════════════════

/// Anything [`Container::call`] accepts.
#[derive(Debug, Clone)]
pub enum CallableSpec {
    Function(Function),
    /// `"Class"`, `"Class::method"` or `"Class@method"`.
    Parse(String),
    Method(MethodOwner, String),
}

impl CallableSpec {
    fn describe(&self) -> String {
        match self {
            Self::Function(function) => format!("{}()", function.name()),
            Self::Parse(spec) => spec.clone(),
            Self::Method(owner, method) => format!("{}::{method}()", owner.class()),
        }
    }

    fn into_target(self) -> std::result::Result<Target, ResolverError> {
        match self {
            Self::Function(function) => Ok(Target::Function(function)),
            Self::Method(owner, method) => Ok(Target::Method { owner, method }),
            Self::Parse(spec) => {
                let invalid = || ResolverError::InvalidCallable {
                    callable: spec.clone(),
                    source: None,
                };
                match split_callable(&spec).as_slice() {
                    [class] if !class.is_empty() => Ok(Target::Class(class.to_string())),
                    [class, method] if !class.is_empty() && !method.is_empty() => {
                        Ok(Target::Method {
                            owner: MethodOwner::Class(class.to_string()),
                            method: method.to_string(),
                        })
                    }
                    _ => Err(invalid()),
                }
            }
        }
    }
}

/// Splits on runs of `:` and `@`. Leading or trailing separators yield
/// empty segments.
fn split_callable(spec: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut in_separator = false;

    for (index, c) in spec.char_indices() {
        let separator = c == ':' || c == '@';
        if separator && !in_separator {
            segments.push(&spec[start..index]);
        } else if !separator && in_separator {
            start = index;
        }
        in_separator = separator;
    }

    segments.push(if in_separator { "" } else { &spec[start..] });
    segments
}

impl From<&str> for CallableSpec {
    fn from(spec: &str) -> Self {
        Self::Parse(spec.to_string())
    }
}

impl From<String> for CallableSpec {
    fn from(spec: String) -> Self {
        Self::Parse(spec)
    }
}

impl From<Function> for CallableSpec {
    fn from(function: Function) -> Self {
        Self::Function(function)
    }
}

impl From<(Object, &str)> for CallableSpec {
    fn from((object, method): (Object, &str)) -> Self {
        Self::Method(MethodOwner::Instance(object), method.to_string())
    }
}

impl From<(&str, &str)> for CallableSpec {
    fn from((class, method): (&str, &str)) -> Self {
        Self::Method(MethodOwner::Class(class.to_string()), method.to_string())
    }
}

// ═══════════════════════════════════════════
// ContainerBuilder
// ═══════════════════════════════════════════

/// Builds a [`Container`] with its initial registrations.
///
/// # Examples
/// ```rust,ignore
/// let container = Container::builder()
///     .definition("dsn", "sqlite::memory:")
///     .class(database_class())
///     .alias(["db"], "Database")
///     .provider(Arc::new(MailProvider))
///     .build()?;
/// ```
pub struct ContainerBuilder {
    definitions: Vec<(String, Value)>,
    aliases: Vec<(Vec<String>, String)>,
    classes: Vec<ClassDefinition>,
    providers: Vec<Arc<dyn ServiceProvider>>,
    resolvers: Vec<(Arc<dyn Resolver>, i32)>,
    post_processors: Vec<(Arc<dyn PostProcessor>, i32)>,
    default_pipeline: bool,
    lock_resolvers: bool,
    lock_post_processors: bool,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self {
            definitions: Vec::new(),
            aliases: Vec::new(),
            classes: Vec::new(),
            providers: Vec::new(),
            resolvers: Vec::new(),
            post_processors: Vec::new(),
            default_pipeline: true,
            lock_resolvers: false,
            lock_post_processors: false,
        }
    }

    /// A value, or a deferred factory when `value` is a [`Function`].
    pub fn definition(mut self, id: impl Into<String>, value: impl Into<Value>) -> Self {
        self.definitions.push((id.into(), value.into()));
        self
    }

    pub fn definitions<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.definitions
            .extend(entries.into_iter().map(|(id, value)| (id.into(), value.into())));
        self
    }

    pub fn alias<I, S>(mut self, names: I, id: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases
            .push((names.into_iter().map(Into::into).collect(), id.into()));
        self
    }

    pub fn class(mut self, class: ClassDefinition) -> Self {
        self.classes.push(class);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn ServiceProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn Resolver>, priority: impl Into<i32>) -> Self {
        self.resolvers.push((resolver, priority.into()));
        self
    }

    pub fn post_processor(
        mut self,
        processor: Arc<dyn PostProcessor>,
        priority: impl Into<i32>,
    ) -> Self {
        self.post_processors.push((processor, priority.into()));
        self
    }

    /// Install the autowiring resolver and the standard injectors.
    ///
    /// On by default.
    pub fn with_default_pipeline(mut self, enabled: bool) -> Self {
        self.default_pipeline = enabled;
        self
    }

    /// Freeze the resolver chain once built.
    pub fn lock_resolvers(mut self, lock: bool) -> Self {
        self.lock_resolvers = lock;
        self
    }

    /// Freeze the post-processor pipeline once built.
    pub fn lock_post_processors(mut self, lock: bool) -> Self {
        self.lock_post_processors = lock;
        self
    }

    /// Build the container.
    ///
    /// Fails if an alias is invalid.
    #[instrument(skip(self), name = "container_build")]
    pub fn build(self) -> Result<Arc<Container>> {
        info!(
            definitions = self.definitions.len(),
            classes = self.classes.len(),
            providers = self.providers.len(),
            "Building container"
        );

        let container = Container::create(self.default_pipeline);

        for class in self.classes {
            container.define(class);
        }
        container.set_many(self.definitions);
        for (names, id) in self.aliases {
            container.alias(names, &id)?;
        }
        for provider in self.providers {
            container.register(provider);
        }
        for (resolver, priority) in self.resolvers {
            container.add_resolver(resolver, priority);
        }
        for (processor, priority) in self.post_processors {
            container.add_post_processor(processor, priority);
        }
        if self.lock_resolvers {
            container.lock_resolvers();
        }
        if self.lock_post_processors {
            container.lock_post_processors();
        }

        info!("Container built successfully ✓");
        Ok(container)
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

#[derive(Default)]
struct State {
    aliases: HashMap<String, String>,
    definitions: HashMap<String, Function>,
    shared: HashMap<String, Value>,
    services: HashMap<String, Arc<dyn ServiceProvider>>,
    loaded: HashSet<String>,
    resolving: Vec<String>,
}

/// Autowiring service container.
///
/// Always handled through an [`Arc`]; the container is itself an entry
/// under [`CONTAINER_ID`]. Internal locks are never held while resolvers,
/// factories or post-processors run, so those may call back in freely.
///
/// # Threads
/// The container is `Send + Sync`, but its resolution stack is shared by
/// every thread. Two threads resolving the same id at the same time make
/// the second one fail with [`ContainerError::CircularDependency`]. Drive
/// resolutions from one thread at a time, or give each worker its own
/// container.
pub struct Container {
    this: Weak<Container>,
    reflector: Reflector,
    state: Mutex<State>,
    resolvers: RwLock<PriorityCollection<Link<dyn Resolver>>>,
    post_processors: RwLock<PriorityCollection<Link<dyn PostProcessor>>>,
}

impl Container {
    /// A container with the default pipeline.
    pub fn new() -> Arc<Self> {
        Self::create(true)
    }

    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    fn create(default_pipeline: bool) -> Arc<Self> {
        let container = Arc::new_cyclic(|this| {
            let aliases = CONTAINER_ALIASES
                .iter()
                .map(|alias| (alias.to_string(), CONTAINER_ID.to_string()))
                .collect();
            Container {
                this: this.clone(),
                reflector: Reflector::new(),
                state: Mutex::new(State {
                    aliases,
                    ..State::default()
                }),
                resolvers: RwLock::new(PriorityCollection::new()),
                post_processors: RwLock::new(PriorityCollection::new()),
            }
        });

        if default_pipeline {
            container.add_resolver(Arc::new(AutowireResolver), Priority::High);
            container.add_post_processor(Arc::new(InjectProperties), INJECT_PROPERTIES_PRIORITY);
            container.add_post_processor(Arc::new(RequiredInjector), Priority::High);
            container.add_post_processor(Arc::new(AwareInjector::logger()), Priority::Low);
        }

        container
    }

    /// The container as a shareable value.
    pub fn handle(&self) -> Option<Object> {
        self.this
            .upgrade()
            .map(|this| Object::from_arc(CONTAINER_ID, this))
    }

    pub fn reflector(&self) -> &Reflector {
        &self.reflector
    }

    /// Adds class metadata.
    pub fn define(&self, class: ClassDefinition) {
        self.reflector.define(class);
    }

    // ── Aliases ──

    /// Follows aliases from `id` to the id they end on.
    pub fn canonical(&self, id: &str) -> std::result::Result<String, AliasError> {
        let state = self.state.lock();
        let mut path = Self::alias_path(&state.aliases, id)?;
        Ok(path.pop().unwrap_or_else(|| id.to_string()))
    }

    /// `id` followed by every alias hop from it.
    fn alias_path(
        aliases: &HashMap<String, String>,
        id: &str,
    ) -> std::result::Result<Vec<String>, AliasError> {
        let mut path = vec![id.to_string()];
        let mut current = id;

        while let Some(next) = aliases.get(current) {
            let looped = path.contains(next);
            path.push(next.clone());
            if looped {
                return Err(AliasError::Cycle { chain: path });
            }
            current = next;
        }

        Ok(path)
    }

    /// Makes each of `names` resolve as `id`.
    ///
    /// Names that are already aliases keep their first target.
    pub fn alias<I, S>(&self, names: I, id: &str) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.lock();

        for name in names {
            let name = name.into();
            if name == id {
                return Err(AliasError::SelfAlias { id: name }.into());
            }
            if let Some(existing) = state.aliases.get(&name) {
                debug!(alias = %name, existing = %existing, "Alias already registered");
                continue;
            }

            // an unaliased name can only close a cycle as the last hop
            let path = Self::alias_path(&state.aliases, id)?;
            if path.last() == Some(&name) {
                let chain = std::iter::once(name).chain(path).collect();
                return Err(AliasError::Cycle { chain }.into());
            }

            debug!(alias = %name, to = id, "Alias registered");
            state.aliases.insert(name, id.to_string());
        }

        Ok(())
    }

    // ── Registration ──

    /// Stores `value` under `id`: a [`Function`] becomes a deferred
    /// factory, anything else an immediate value.
    pub fn set(&self, id: &str, value: impl Into<Value>) {
        let id = self.canonical(id).unwrap_or_else(|err| {
            warn!(id, error = %err, "Setting through a broken alias");
            id.to_string()
        });

        let mut state = self.state.lock();
        state.shared.remove(&id);
        match value.into() {
            Value::Function(factory) => {
                debug!(id = %id, "Factory set");
                state.definitions.insert(id, factory);
            }
            value => {
                debug!(id = %id, "Value set");
                state.definitions.remove(&id);
                state.shared.insert(id, value);
            }
        }
    }

    pub fn set_many<I, K, V>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (id, value) in entries {
            self.set(id.as_ref(), value);
        }
    }

    /// Registers a provider for each id it provides.
    ///
    /// Re-registering an id forgets any value it had, so the new provider
    /// loads on next use.
    pub fn register(&self, provider: Arc<dyn ServiceProvider>) {
        let ids = provider.provides();
        if ids.is_empty() {
            return;
        }

        debug!(provider = provider.name(), ids = ?ids, "Provider registered");
        let mut state = self.state.lock();
        for id in ids {
            state.loaded.remove(&id);
            state.shared.remove(&id);
            state.services.insert(id, Arc::clone(&provider));
        }
    }

    /// Runs the provider of `id` if it has not run yet.
    fn load(&self, id: &str) -> Result<()> {
        let provider = {
            let mut state = self.state.lock();
            if state.loaded.contains(id) {
                return Ok(());
            }
            let Some(provider) = state.services.get(id).cloned() else {
                return Ok(());
            };
            for provided in provider.provides() {
                state.loaded.insert(provided);
            }
            provider
        };

        debug!(id, provider = provider.name(), "Loading provider");
        provider.register(self)
    }

    // ── Chains ──

    pub fn add_resolver(&self, resolver: Arc<dyn Resolver>, priority: impl Into<i32>) -> &Self {
        let priority = priority.into();
        debug!(resolver = resolver.name(), priority, "Resolver added");
        self.resolvers.write().add(Link(resolver), priority);
        self
    }

    pub fn remove_resolver(&self, resolver: &Arc<dyn Resolver>) -> bool {
        self.resolvers.write().delete(&Link(Arc::clone(resolver)))
    }

    pub fn lock_resolvers(&self) {
        self.resolvers.write().lock();
    }

    pub fn unlock_resolvers(&self) {
        self.resolvers.write().unlock();
    }

    pub fn add_post_processor(
        &self,
        processor: Arc<dyn PostProcessor>,
        priority: impl Into<i32>,
    ) -> &Self {
        let priority = priority.into();
        debug!(processor = processor.name(), priority, "Post-processor added");
        self.post_processors.write().add(Link(processor), priority);
        self
    }

    pub fn remove_post_processor(&self, processor: &Arc<dyn PostProcessor>) -> bool {
        self.post_processors
            .write()
            .delete(&Link(Arc::clone(processor)))
    }

    pub fn lock_post_processors(&self) {
        self.post_processors.write().lock();
    }

    pub fn unlock_post_processors(&self) {
        self.post_processors.write().unlock();
    }

    /// Resolvers in the order they are consulted.
    pub fn resolvers(&self) -> Vec<Arc<dyn Resolver>> {
        self.resolvers
            .read()
            .values()
            .map(|link| Arc::clone(&link.0))
            .collect()
    }

    /// Post-processors in the order they run.
    pub fn post_processors(&self) -> Vec<Arc<dyn PostProcessor>> {
        self.post_processors
            .read()
            .values()
            .map(|link| Arc::clone(&link.0))
            .collect()
    }

    // ── Lookup ──

    /// Whether `id` can be supplied.
    ///
    /// Loads a pending provider for `id` first.
    pub fn has(&self, id: &str) -> bool {
        let Ok(id) = self.canonical(id) else {
            return false;
        };
        if let Err(err) = self.load(&id) {
            warn!(id = %id, error = %err, "Provider failed to load");
        }
        let Ok(id) = self.canonical(&id) else {
            return false;
        };

        if id == CONTAINER_ID {
            return true;
        }
        {
            let state = self.state.lock();
            if state.shared.contains_key(&id)
                || state.definitions.contains_key(&id)
                || state.services.contains_key(&id)
            {
                return true;
            }
        }

        self.resolvers()
            .iter()
            .any(|resolver| resolver.can_resolve(self, &id))
    }

    /// Shared instance of `id`, made on first request.
    pub fn get(&self, id: &str) -> Result<Value> {
        trace!(id, "Getting");
        let canonical = self.canonical(id).map_err(|err| self.not_found(id, err.into()))?;
        self.load(&canonical)
            .map_err(|err| self.not_found(&canonical, err))?;
        let canonical = self.canonical(&canonical).map_err(|err| self.not_found(id, err.into()))?;

        if let Some(value) = self.cached(&canonical) {
            trace!(id = %canonical, "Cache hit");
            return Ok(value);
        }

        let value = self.make(&canonical, Parameters::none())?;

        let mut state = self.state.lock();
        Ok(state.shared.entry(canonical).or_insert(value).clone())
    }

    fn cached(&self, id: &str) -> Option<Value> {
        if id == CONTAINER_ID {
            return self.handle().map(Value::Object);
        }
        self.state.lock().shared.get(id).cloned()
    }

    /// Fresh instance of `id`, never cached.
    ///
    /// [`CONTAINER_ID`] is the exception: it always yields this container.
    pub fn make(&self, id: &str, parameters: Parameters) -> Result<Value> {
        debug!(id, parameters = parameters.len(), "Making");
        let canonical = self.canonical(id).map_err(|err| self.not_found(id, err.into()))?;
        self.load(&canonical)
            .map_err(|err| self.not_found(&canonical, err))?;

        if canonical == CONTAINER_ID {
            if let Some(itself) = self.cached(CONTAINER_ID) {
                return Ok(itself);
            }
        }

        self.resolve_entry(&canonical, &parameters)
            .map_err(|err| self.not_found(&canonical, err))
    }

    fn resolve_entry(&self, id: &str, parameters: &Parameters) -> Result<Value> {
        let _guard = self.enter(id)?;

        let definition = self.state.lock().definitions.get(id).cloned();
        let target = match definition {
            Some(factory) => Target::Function(factory),
            None => Target::Class(id.to_string()),
        };

        let value = self.resolve_target(&target, parameters)?;
        self.post_process(value)
    }

    /// Pushes `id` onto the resolution stack, failing if it is already there.
    fn enter(&self, id: &str) -> Result<ResolutionGuard<'_>> {
        let mut state = self.state.lock();

        if state.resolving.iter().any(|active| active == id) {
            let mut chain = state.resolving.clone();
            chain.push(id.to_string());
            warn!(id, chain = ?chain, "Circular dependency");
            return Err(ContainerError::CircularDependency(CircularDependencyError {
                id: id.to_string(),
                chain,
            }));
        }

        state.resolving.push(id.to_string());
        Ok(ResolutionGuard {
            container: self,
            id: id.to_string(),
        })
    }

    fn resolve_target(&self, target: &Target, parameters: &Parameters) -> Result<Value> {
        for resolver in self.resolvers() {
            trace!(callee = %target, resolver = resolver.name(), "Trying resolver");
            if let Resolution::Resolved(value) = resolver.resolve(self, target, parameters)? {
                return Ok(value);
            }
        }

        Err(ResolverError::Unmatched {
            target: target.describe(),
        }
        .into())
    }

    fn post_process(&self, value: Value) -> Result<Value> {
        let Value::Object(mut object) = value else {
            return Ok(value);
        };

        for processor in self.post_processors() {
            trace!(class = object.class(), processor = processor.name(), "Post-processing");
            object = processor.process(self, object)?;
        }

        Ok(Value::Object(object))
    }

    // ── Calls ──

    /// Invokes `callable` with autowired arguments.
    ///
    /// A bare class name constructs an instance, post-processed but not
    /// cached.
    pub fn call(&self, callable: impl Into<CallableSpec>, parameters: Parameters) -> Result<Value> {
        let callable = callable.into();
        let description = callable.describe();
        debug!(callable = %description, parameters = parameters.len(), "Calling");

        let target = callable.into_target()?;
        let construct = matches!(target, Target::Class(_));

        self.resolve_target(&target, &parameters)
            .and_then(|value| if construct { self.post_process(value) } else { Ok(value) })
            .map_err(|err| match err {
                ContainerError::Resolver(_) => err,
                other => ResolverError::InvalidCallable {
                    callable: description,
                    source: Some(Box::new(other)),
                }
                .into(),
            })
    }

    // ── Errors ──

    /// Wraps `err` as not-found for `id`, unless it already is one or
    /// reports a cycle.
    fn not_found(&self, id: &str, err: ContainerError) -> ContainerError {
        match err {
            ContainerError::NotFound(_) | ContainerError::CircularDependency(_) => err,
            other => ContainerError::NotFound(NotFoundError {
                id: id.to_string(),
                suggestions: self.suggestions(id),
                source: Some(Box::new(other)),
            }),
        }
    }

    fn suggestions(&self, id: &str) -> Vec<String> {
        let mut known: Vec<String> = {
            let state = self.state.lock();
            state
                .aliases
                .keys()
                .chain(state.definitions.keys())
                .chain(state.shared.keys())
                .chain(state.services.keys())
                .cloned()
                .collect()
        };
        known.extend(self.reflector.class_names());
        known.retain(|known| known != id);
        known.sort();
        known.dedup();

        suggest_similar(id, &known, MAX_SUGGESTIONS)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Container")
            .field("aliases", &state.aliases.len())
            .field("definitions", &state.definitions.len())
            .field("shared", &state.shared.len())
            .field("providers", &state.services.len())
            .field("classes", &self.reflector.class_names().len())
            .field("resolvers", &self.resolvers.read().len())
            .field("post_processors", &self.post_processors.read().len())
            .finish()
    }
}

// ═══════════════════════════════════════════
// ResolutionGuard
// ═══════════════════════════════════════════

/// Pops an id off the resolution stack when resolution ends, however it
/// ends.
struct ResolutionGuard<'a> {
    container: &'a Container,
    id: String,
}

impl Drop for ResolutionGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.container.state.lock();
        if let Some(index) = state.resolving.iter().rposition(|active| *active == self.id) {
            state.resolving.remove(index);
        }
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{CONTAINER_ID, CallableSpec, Container, ContainerBuilder};
    pub use crate::error::{ContainerError, Result};
    pub use crate::inject::{AwareInjector, InjectProperties, PostProcessor, RequiredInjector};
    pub use crate::markers::Marker;
    pub use crate::parameter::{Arguments, ParameterDescriptor, Parameters};
    pub use crate::priority::Priority;
    pub use crate::provider::{ServiceProvider, SimpleServiceProvider};
    pub use crate::reflect::{ClassDefinition, MethodDefinition, MethodOwner, PropertyDefinition};
    pub use crate::resolver::{AutowireResolver, Resolution, Resolver};
    pub use crate::stack::StackableContainer;
    pub use crate::value::{Function, Object, Value};
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::inject::LOGGER_ID;
    use crate::markers::Marker;
    use crate::parameter::ParameterDescriptor;
    use crate::provider::SimpleServiceProvider;
    use crate::reflect::{MethodDefinition, PropertyDefinition};

    struct Counter;

    fn counter_class() -> ClassDefinition {
        ClassDefinition::new("Counter").without_constructor(|| Counter)
    }

    #[test]
    fn get_unknown_id_is_not_found() {
        let container = Container::new();
        container.set("logger", "stderr");

        match container.get("loger").unwrap_err() {
            ContainerError::NotFound(err) => {
                assert_eq!(err.id, "loger");
                assert!(err.suggestions.contains(&"logger".to_string()));
            }
            other => panic!("expected NotFound, got: {other:?}"),
        }
        assert!(!container.has("loger"));
    }

    #[test]
    fn get_shares_make_does_not() {
        let container = Container::new();
        container.define(counter_class());

        let a = container.get("Counter").unwrap();
        let b = container.get("Counter").unwrap();
        assert_eq!(a, b);

        let c = container.make("Counter", Parameters::none()).unwrap();
        let d = container.make("Counter", Parameters::none()).unwrap();
        assert_ne!(c, d);
        assert_ne!(a, c);
    }

    #[test]
    fn factory_runs_once_under_get() {
        let calls = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        container.set(
            "id",
            Function::thunk("next_id", {
                let calls = calls.clone();
                move |_| Ok(Value::from(calls.fetch_add(1, Ordering::SeqCst) as i64))
            }),
        );

        assert_eq!(container.get("id").unwrap(), Value::Int(0));
        assert_eq!(container.get("id").unwrap(), Value::Int(0));
        assert_eq!(container.make("id", Parameters::none()).unwrap(), Value::Int(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn alias_then_set_writes_through() {
        let container = Container::new();
        container.alias(["B"], "A").unwrap();
        container.set("B", 1);

        assert_eq!(container.get("A").unwrap(), Value::Int(1));
        assert_eq!(container.get("B").unwrap(), Value::Int(1));
    }

    #[test]
    fn alias_rejects_self_and_cycles() {
        let container = Container::new();
        assert!(matches!(
            container.alias(["A"], "A"),
            Err(ContainerError::Alias(AliasError::SelfAlias { .. }))
        ));

        container.alias(["B"], "A").unwrap();
        container.alias(["C"], "B").unwrap();
        match container.alias(["A"], "C").unwrap_err() {
            ContainerError::Alias(AliasError::Cycle { chain }) => {
                assert_eq!(chain, ["A", "C", "B", "A"]);
            }
            other => panic!("expected Cycle, got: {other:?}"),
        }
        assert_eq!(container.canonical("C").unwrap(), "A");
    }

    #[test]
    fn first_alias_wins() {
        let container = Container::new();
        container.alias(["db"], "Postgres").unwrap();
        container.alias(["db"], "Sqlite").unwrap();
        assert_eq!(container.canonical("db").unwrap(), "Postgres");
    }

    #[test]
    fn container_resolves_itself() {
        let container = Container::new();
        assert!(container.has(CONTAINER_ID));
        assert!(container.has("ContainerInterface"));

        let itself = container.get("ContainerInterface").unwrap();
        let inner = itself.downcast::<Container>().unwrap();
        assert!(Arc::ptr_eq(&inner, &container));
    }

    #[test]
    fn make_returns_the_container_itself() {
        let container = Container::new();
        let itself = container.make("autowire::Container", Parameters::none()).unwrap();
        let inner = itself.downcast::<Container>().unwrap();
        assert!(Arc::ptr_eq(&inner, &container));
    }

    #[test]
    fn set_replaces_cached_value() {
        let container = Container::new();
        container.set("x", 1);
        assert_eq!(container.get("x").unwrap(), Value::Int(1));

        container.set("x", 2);
        assert_eq!(container.get("x").unwrap(), Value::Int(2));

        container.set("x", Function::thunk("three", |_| Ok(Value::Int(3))));
        assert_eq!(container.get("x").unwrap(), Value::Int(3));

        container.set("x", Function::thunk("four", |_| Ok(Value::Int(4))));
        assert_eq!(container.get("x").unwrap(), Value::Int(4));
    }

    #[test]
    fn register_replaces_cached_value() {
        let container = Container::new();
        container.set("driver", "file");
        assert_eq!(container.get("driver").unwrap(), Value::from("file"));

        container.register(Arc::new(SimpleServiceProvider::value(["driver"], "redis")));
        assert_eq!(container.get("driver").unwrap(), Value::from("redis"));
    }

    #[test]
    fn self_dependency_is_circular() {
        struct Node;
        let container = Container::new();
        container.define(
            ClassDefinition::new("Node")
                .constructor([ParameterDescriptor::new("next").typed("Node")], |_, _| Ok(Node)),
        );

        match container.get("Node").unwrap_err() {
            ContainerError::CircularDependency(err) => {
                assert_eq!(err.id, "Node");
                assert_eq!(err.chain, ["Node", "Node"]);
            }
            other => panic!("expected CircularDependency, got: {other:?}"),
        }
        // the stack is clean again afterwards
        assert!(container.state.lock().resolving.is_empty());
    }

    #[test]
    fn indirect_cycle_reports_chain() {
        struct Egg;
        struct Chicken;
        let container = Container::new();
        container.define(
            ClassDefinition::new("Egg")
                .constructor([ParameterDescriptor::new("c").typed("Chicken")], |_, _| Ok(Egg)),
        );
        container.define(
            ClassDefinition::new("Chicken")
                .constructor([ParameterDescriptor::new("e").typed("Egg")], |_, _| Ok(Chicken)),
        );

        let err = container.get("Egg").unwrap_err();
        assert!(err.is_circular());
        assert!(err.to_string().contains("Egg → Chicken → Egg"));
    }

    fn pair() -> Function {
        Function::new(
            "pair",
            [
                ParameterDescriptor::new("a").typed("int"),
                ParameterDescriptor::new("b").typed("string").default_value("x"),
            ],
            |_, args| {
                let a = args.get(0).cloned().unwrap_or_default();
                let b = args.get(1).cloned().unwrap_or_default();
                Ok(Value::List(vec![a, b]))
            },
        )
    }

    #[test]
    fn call_with_positional_and_named() {
        let container = Container::new();

        let positional = container.call(pair(), Parameters::positional([5])).unwrap();
        assert_eq!(positional, Value::List(vec![Value::Int(5), Value::from("x")]));

        let named = container
            .call(pair(), Parameters::named([("b", Value::from("y")), ("a", Value::from(1))]))
            .unwrap();
        assert_eq!(named, Value::List(vec![Value::Int(1), Value::from("y")]));
    }

    #[test]
    fn call_with_too_many_parameters() {
        let container = Container::new();
        let err = container
            .call(pair(), Parameters::positional([1, 2, 3]))
            .unwrap_err();
        assert!(matches!(
            err,
            ContainerError::Resolver(ResolverError::TooManyParameters { given: 3, .. })
        ));
    }

    #[test]
    fn mixed_parameter_keys_are_rejected() {
        use crate::parameter::ParamKey;
        let result = Parameters::from_pairs([
            (ParamKey::from(0), Value::from(1)),
            (ParamKey::from("b"), Value::from(2)),
        ]);
        assert!(matches!(result, Err(ResolverError::MixedParameters)));
    }

    #[test]
    fn parses_callable_strings() {
        assert_eq!(split_callable("Class"), ["Class"]);
        assert_eq!(split_callable("Class::method"), ["Class", "method"]);
        assert_eq!(split_callable("Class@method"), ["Class", "method"]);
        assert_eq!(split_callable(":method"), ["", "method"]);
        assert_eq!(split_callable("a:b@c"), ["a", "b", "c"]);
    }

    #[test]
    fn call_class_at_method() {
        struct Clock;
        let container = Container::new();
        container.define(
            ClassDefinition::new("Clock")
                .without_constructor(|| Clock)
                .method(MethodDefinition::public::<Clock, _>(
                    "now",
                    [ParameterDescriptor::new("offset").typed("int").default_value(0)],
                    |_, _, args| Ok(Value::from(1000 + args.get(0).and_then(Value::as_int).unwrap_or(0))),
                )),
        );

        assert_eq!(container.call("Clock@now", Parameters::none()).unwrap(), Value::Int(1000));
        assert_eq!(
            container.call("Clock::now", Parameters::positional([5])).unwrap(),
            Value::Int(1005)
        );
    }

    #[test]
    fn invalid_callables() {
        let container = Container::new();
        for spec in ["a:b:c", ":now", "Clock@"] {
            assert!(
                matches!(
                    container.call(spec, Parameters::none()),
                    Err(ContainerError::Resolver(ResolverError::InvalidCallable { .. }))
                ),
                "{spec} should be rejected"
            );
        }

        match container.call("Ghost::run", Parameters::none()).unwrap_err() {
            ContainerError::Resolver(ResolverError::Unmatched { target }) => {
                assert_eq!(target, "Ghost::run()");
            }
            other => panic!("expected Unmatched, got: {other:?}"),
        }
    }

    #[test]
    fn non_public_method_is_unmatched() {
        use crate::reflect::Visibility;
        struct Vault;
        let container = Container::new();
        container.define(
            ClassDefinition::new("Vault").without_constructor(|| Vault).method(
                MethodDefinition::public::<Vault, _>("open", [], |_, _, _| Ok(Value::Bool(true)))
                    .visibility(Visibility::Private),
            ),
        );

        assert!(matches!(
            container.call("Vault::open", Parameters::none()),
            Err(ContainerError::Resolver(ResolverError::Unmatched { .. }))
        ));
        assert!(container.reflector().method("Vault", "open").is_some());
    }

    struct Service {
        logger: Mutex<Option<Value>>,
    }

    fn logger_aware_class() -> ClassDefinition {
        ClassDefinition::new("Service")
            .without_constructor(|| Service { logger: Mutex::new(None) })
            .capability::<Service, _>("LoggerAware", |service, logger| {
                *service.logger.lock() = Some(logger);
                Ok(())
            })
    }

    #[test]
    fn logger_aware_objects_get_the_logger() {
        let container = Container::new();
        container.define(logger_aware_class());
        container.set(LOGGER_ID, "stderr");

        let service = container.get("Service").unwrap();
        let service = service.downcast::<Service>().unwrap();
        assert_eq!(*service.logger.lock(), Some(Value::from("stderr")));
    }

    #[test]
    fn required_property_injected_after_construction() {
        struct Mailer {
            transport: Mutex<Option<Value>>,
        }
        let container = Container::new();
        container.define(
            ClassDefinition::new("Mailer")
                .without_constructor(|| Mailer { transport: Mutex::new(None) })
                .property(
                    PropertyDefinition::new::<Mailer, _>("transport", "Transport", |m, v| {
                        *m.transport.lock() = Some(v);
                        Ok(())
                    })
                    .marked(Marker::required()),
                ),
        );
        container.set("Transport", "smtp");

        let mailer = container.make("Mailer", Parameters::none()).unwrap();
        let mailer = mailer.downcast::<Mailer>().unwrap();
        assert_eq!(*mailer.transport.lock(), Some(Value::from("smtp")));
    }

    struct Tagged(&'static str, Arc<Mutex<Vec<&'static str>>>);

    impl PostProcessor for Tagged {
        fn process(&self, _: &Container, object: Object) -> Result<Object> {
            self.1.lock().push(self.0);
            Ok(object)
        }
    }

    #[test]
    fn post_processors_run_by_priority() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let container = Container::builder()
            .with_default_pipeline(false)
            .resolver(Arc::new(AutowireResolver), Priority::High)
            .post_processor(Arc::new(Tagged("low", log.clone())), Priority::Low)
            .post_processor(Arc::new(Tagged("high", log.clone())), Priority::High)
            .post_processor(Arc::new(Tagged("medium", log.clone())), Priority::Medium)
            .class(counter_class())
            .build()
            .unwrap();

        container.make("Counter", Parameters::none()).unwrap();
        assert_eq!(*log.lock(), ["high", "medium", "low"]);
    }

    struct Fixed;

    impl Resolver for Fixed {
        fn resolve(&self, _: &Container, target: &Target, _: &Parameters) -> Result<Resolution> {
            Ok(match target {
                Target::Class(id) if id == "answer" => Resolution::Resolved(Value::Int(42)),
                _ => Resolution::Unmatched,
            })
        }

        fn can_resolve(&self, _: &Container, id: &str) -> bool {
            id == "answer"
        }
    }

    #[test]
    fn custom_resolver_joins_the_chain() {
        let container = Container::new();
        assert!(!container.has("answer"));

        let fixed: Arc<dyn Resolver> = Arc::new(Fixed);
        container.add_resolver(fixed.clone(), Priority::Low);
        container.add_resolver(fixed.clone(), Priority::High);
        assert_eq!(container.resolvers().len(), 2);

        assert!(container.has("answer"));
        assert_eq!(container.make("answer", Parameters::none()).unwrap(), Value::Int(42));

        assert!(container.remove_resolver(&fixed));
        assert!(!container.has("answer"));
    }

    #[test]
    fn locked_chain_ignores_changes() {
        let container = Container::builder().lock_resolvers(true).build().unwrap();
        container.add_resolver(Arc::new(Fixed), Priority::High);
        assert_eq!(container.resolvers().len(), 1);

        container.unlock_resolvers();
        container.add_resolver(Arc::new(Fixed), Priority::High);
        assert_eq!(container.resolvers().len(), 2);
    }

    #[test]
    fn builder_registers_everything() {
        let container = Container::builder()
            .definition("dsn", "sqlite::memory:")
            .definitions([("retries", 3), ("timeout", 30)])
            .alias(["database.dsn"], "dsn")
            .class(counter_class())
            .build()
            .unwrap();

        assert_eq!(container.get("database.dsn").unwrap(), Value::from("sqlite::memory:"));
        assert_eq!(container.get("timeout").unwrap(), Value::Int(30));
        assert!(container.has("Counter"));
    }

    #[test]
    fn builder_rejects_bad_alias() {
        let result = Container::builder().alias(["x"], "x").build();
        assert!(matches!(result, Err(ContainerError::Alias(_))));
    }

    #[test]
    fn debug_display() {
        let container = Container::new();
        container.set("a", 1);
        let debug = format!("{container:?}");
        assert!(debug.contains("Container"));
        assert!(debug.contains("shared: 1"));
    }
}
