//! Class metadata and parameter introspection.
//!
//! Rust has no runtime reflection, so classes are described up front with a
//! [`ClassDefinition`] builder and stored in a [`Reflector`]. The reflector
//! then answers the questions the resolver asks: which parameters does a
//! constructor, function or method declare, is a class instantiable, and is
//! one class an instance of another.

use std::any::{Any, type_name};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use tracing::debug;

use crate::container::Container;
use crate::error::{ContainerError, DescriptorError, Result};
use crate::markers::Marker;
use crate::parameter::{Arguments, ParameterDescriptor, parse_type_declaration};
use crate::value::{Function, Object, Value};

/// Builds an instance from bound constructor arguments.
pub type ConstructorFn = Arc<dyn Fn(&Container, Arguments) -> Result<Object> + Send + Sync>;

/// Runs a method; instance methods receive `Some(this)`.
pub type MethodFn =
    Arc<dyn Fn(&Container, Option<&Object>, Arguments) -> Result<Value> + Send + Sync>;

/// Writes an injected value into an instance.
pub type SetterFn = Arc<dyn Fn(&Object, Value) -> Result<()> + Send + Sync>;

fn typed_this<'a, T: Any + Send + Sync>(this: &'a Object, member: &str) -> Result<&'a T> {
    this.downcast_ref::<T>().ok_or_else(|| {
        ContainerError::invocation(
            format!("{}::{member}", this.class()),
            format!("instance is not a {}", type_name::<T>()),
        )
    })
}

// ═══════════════════════════════════════════
// Members
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

/// A method declared by a class.
#[derive(Clone)]
pub struct MethodDefinition {
    name: String,
    parameters: Vec<ParameterDescriptor>,
    visibility: Visibility,
    is_static: bool,
    markers: Vec<Marker>,
    body: MethodFn,
}

impl MethodDefinition {
    /// A public instance method on instances of `T`.
    pub fn public<T, F>(
        name: impl Into<String>,
        parameters: impl IntoIterator<Item = ParameterDescriptor>,
        body: F,
    ) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Container, &T, Arguments) -> Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        let member = name.clone();
        Self {
            name,
            parameters: ParameterDescriptor::positioned(parameters),
            visibility: Visibility::Public,
            is_static: false,
            markers: Vec::new(),
            body: Arc::new(move |container: &Container, this: Option<&Object>, arguments: Arguments| {
                let this = this.ok_or_else(|| {
                    ContainerError::invocation(member.clone(), "instance method called statically")
                })?;
                body(container, typed_this::<T>(this, &member)?, arguments)
            }),
        }
    }

    /// A public static method.
    pub fn static_method<F>(
        name: impl Into<String>,
        parameters: impl IntoIterator<Item = ParameterDescriptor>,
        body: F,
    ) -> Self
    where
        F: Fn(&Container, Arguments) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parameters: ParameterDescriptor::positioned(parameters),
            visibility: Visibility::Public,
            is_static: true,
            markers: Vec::new(),
            body: Arc::new(move |container: &Container, _: Option<&Object>, arguments: Arguments| {
                body(container, arguments)
            }),
        }
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn marked(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn invoke(
        &self,
        container: &Container,
        this: Option<&Object>,
        arguments: Arguments,
    ) -> Result<Value> {
        (self.body)(container, this, arguments)
    }
}

impl fmt::Debug for MethodDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDefinition")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("static", &self.is_static)
            .field("parameters", &self.parameters.len())
            .finish()
    }
}

/// A property that can receive injected values.
#[derive(Clone)]
pub struct PropertyDefinition {
    name: String,
    declaration: String,
    types: Vec<String>,
    nullable: bool,
    default: Option<Value>,
    markers: Vec<Marker>,
    setter: SetterFn,
}

impl PropertyDefinition {
    /// A property declared as `declaration` (e.g. `?Logger`) on `T`.
    pub fn new<T, F>(name: impl Into<String>, declaration: &str, setter: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, Value) -> Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        let member = name.clone();
        let (types, nullable) = parse_type_declaration(declaration);
        Self {
            name,
            declaration: declaration.to_string(),
            types,
            nullable,
            default: None,
            markers: Vec::new(),
            setter: Arc::new(move |this: &Object, value: Value| {
                setter(typed_this::<T>(this, &member)?, value)
            }),
        }
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn marked(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declaration as written, alternatives separated by `|`.
    pub fn declaration(&self) -> &str {
        &self.declaration
    }

    /// Declared alternatives, `?` stripped.
    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable || self.types.iter().any(|ty| ty == "null")
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn set(&self, this: &Object, value: Value) -> Result<()> {
        (self.setter)(this, value)
    }
}

impl fmt::Debug for PropertyDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDefinition")
            .field("name", &self.name)
            .field("declaration", &self.declaration)
            .field("markers", &self.markers)
            .finish()
    }
}

// ═══════════════════════════════════════════
// ClassDefinition
// ═══════════════════════════════════════════

#[derive(Clone)]
enum Instantiation {
    Abstract,
    Plain(ConstructorFn),
    Constructor {
        parameters: Vec<ParameterDescriptor>,
        body: ConstructorFn,
    },
}

/// Metadata for one class: how to build it and what can be injected into it.
///
/// # Examples
/// ```
/// use autowire_container::parameter::ParameterDescriptor;
/// use autowire_container::reflect::ClassDefinition;
///
/// struct Mailer { sender: String }
///
/// let class = ClassDefinition::new("Mailer").constructor(
///     [ParameterDescriptor::new("sender").typed("string").default_value("noreply")],
///     |_, args| {
///         let sender = args.get(0).and_then(|v| v.as_str()).unwrap_or_default();
///         Ok(Mailer { sender: sender.to_string() })
///     },
/// );
/// assert!(class.is_instantiable());
/// ```
#[derive(Clone)]
pub struct ClassDefinition {
    name: Arc<str>,
    parent: Option<String>,
    interfaces: Vec<String>,
    instantiation: Instantiation,
    methods: IndexMap<String, Arc<MethodDefinition>>,
    properties: IndexMap<String, Arc<PropertyDefinition>>,
    capabilities: IndexMap<String, SetterFn>,
}

impl ClassDefinition {
    /// A class that cannot be instantiated until a constructor is given.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            interfaces: Vec::new(),
            instantiation: Instantiation::Abstract,
            methods: IndexMap::new(),
            properties: IndexMap::new(),
            capabilities: IndexMap::new(),
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Instantiable without a constructor.
    pub fn without_constructor<T, F>(mut self, build: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let class = Arc::clone(&self.name);
        self.instantiation = Instantiation::Plain(Arc::new(move |_: &Container, _: Arguments| {
            Ok(Object::new(Arc::clone(&class), build()))
        }));
        self
    }

    /// Instantiable through a constructor declaring `parameters`.
    pub fn constructor<T, F>(
        mut self,
        parameters: impl IntoIterator<Item = ParameterDescriptor>,
        body: F,
    ) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Container, Arguments) -> Result<T> + Send + Sync + 'static,
    {
        let class = Arc::clone(&self.name);
        self.instantiation = Instantiation::Constructor {
            parameters: ParameterDescriptor::positioned(parameters),
            body: Arc::new(move |container: &Container, arguments: Arguments| {
                Ok(Object::new(Arc::clone(&class), body(container, arguments)?))
            }),
        };
        self
    }

    pub fn method(mut self, method: MethodDefinition) -> Self {
        self.methods.insert(method.name.clone(), Arc::new(method));
        self
    }

    pub fn property(mut self, property: PropertyDefinition) -> Self {
        self.properties.insert(property.name.clone(), Arc::new(property));
        self
    }

    /// Declares a capability such as `LoggerAware`, with the setter that
    /// receives the matching service.
    pub fn capability<T, F>(mut self, name: impl Into<String>, setter: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, Value) -> Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        let member = name.clone();
        self.capabilities.insert(
            name,
            Arc::new(move |this: &Object, value: Value| {
                setter(typed_this::<T>(this, &member)?, value)
            }),
        );
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn is_instantiable(&self) -> bool {
        !matches!(self.instantiation, Instantiation::Abstract)
    }

    pub fn has_constructor(&self) -> bool {
        matches!(self.instantiation, Instantiation::Constructor { .. })
    }

    /// Constructor parameters; empty without a constructor.
    pub fn constructor_parameters(&self) -> &[ParameterDescriptor] {
        match &self.instantiation {
            Instantiation::Constructor { parameters, .. } => parameters,
            _ => &[],
        }
    }

    /// Methods declared by this class only.
    pub fn methods(&self) -> impl Iterator<Item = &Arc<MethodDefinition>> {
        self.methods.values()
    }

    /// Properties declared by this class only.
    pub fn properties(&self) -> impl Iterator<Item = &Arc<PropertyDefinition>> {
        self.properties.values()
    }

    pub fn capability_setter(&self, name: &str) -> Option<&SetterFn> {
        self.capabilities.get(name)
    }

    pub fn instantiate(&self, container: &Container, arguments: Arguments) -> Result<Object> {
        match &self.instantiation {
            Instantiation::Abstract => Err(DescriptorError::NotInstantiable {
                class: self.name.to_string(),
            }
            .into()),
            Instantiation::Plain(body) | Instantiation::Constructor { body, .. } => {
                body(container, arguments)
            }
        }
    }
}

impl fmt::Debug for ClassDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDefinition")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("interfaces", &self.interfaces)
            .field("instantiable", &self.is_instantiable())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Targets
// ═══════════════════════════════════════════

/// Owner of a method target.
#[derive(Debug, Clone)]
pub enum MethodOwner {
    /// A class id: static methods are called directly, instance methods on
    /// a fresh instance made through the container.
    Class(String),
    Instance(Object),
}

impl MethodOwner {
    pub fn class(&self) -> &str {
        match self {
            Self::Class(class) => class,
            Self::Instance(object) => object.class(),
        }
    }
}

/// Something the resolver chain can be asked to resolve.
#[derive(Debug, Clone)]
pub enum Target {
    Class(String),
    Function(Function),
    Method { owner: MethodOwner, method: String },
}

impl Target {
    /// Human-readable form used in errors and logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Class(class) => class.clone(),
            Self::Function(function) => format!("{}()", function.name()),
            Self::Method { owner, method } => format!("{}::{method}()", owner.class()),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// What invoking a reflected target will do.
#[derive(Debug, Clone)]
pub enum CalleeKind {
    /// Construct `class`; `has_constructor` is false for zero-argument
    /// construction.
    Construct {
        class: Arc<ClassDefinition>,
        has_constructor: bool,
    },
    Function(Function),
    Method {
        owner: MethodOwner,
        class: Arc<ClassDefinition>,
        method: Arc<MethodDefinition>,
    },
}

/// A reflected target: its kind plus the parameters it declares.
#[derive(Debug, Clone)]
pub struct Callee {
    pub kind: CalleeKind,
    pub parameters: Vec<ParameterDescriptor>,
}

// ═══════════════════════════════════════════
// Reflector
// ═══════════════════════════════════════════

/// Registry of class metadata.
#[derive(Default)]
pub struct Reflector {
    classes: DashMap<String, Arc<ClassDefinition>>,
}

impl Reflector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores (or replaces) a class definition.
    pub fn define(&self, class: ClassDefinition) {
        debug!(class = %class.name, instantiable = class.is_instantiable(), "Defined class");
        self.classes.insert(class.name.to_string(), Arc::new(class));
    }

    pub fn class(&self, name: &str) -> Option<Arc<ClassDefinition>> {
        self.classes.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn is_instantiable(&self, name: &str) -> bool {
        self.class(name).is_some_and(|class| class.is_instantiable())
    }

    /// Names of every defined class.
    pub fn class_names(&self) -> Vec<String> {
        self.classes.iter().map(|entry| entry.key().clone()).collect()
    }

    /// `name` followed by its defined ancestors, most-derived first.
    ///
    /// Stops at the first undefined parent or at a repeated class.
    pub fn ancestry(&self, name: &str) -> Vec<Arc<ClassDefinition>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(name.to_string());

        while let Some(current) = next.take() {
            if !seen.insert(current.clone()) {
                break;
            }
            let Some(class) = self.class(&current) else {
                break;
            };
            next = class.parent().map(str::to_string);
            chain.push(class);
        }

        chain
    }

    /// `true` if `class` is `ty`, extends it, or implements it.
    pub fn is_a(&self, class: &str, ty: &str) -> bool {
        class == ty
            || self.ancestry(class).iter().any(|definition| {
                definition.name() == ty || definition.interfaces().iter().any(|i| i == ty)
            })
    }

    /// Finds `method` on `class` or its nearest ancestor declaring it.
    pub fn method(&self, class: &str, method: &str) -> Option<Arc<MethodDefinition>> {
        self.ancestry(class)
            .iter()
            .find_map(|definition| definition.methods.get(method).cloned())
    }

    /// Describes the parameters `target` declares.
    ///
    /// # Errors
    /// [`DescriptorError`] when the target is unknown, not instantiable, or
    /// declares an invalid parameter list.
    pub fn reflect(&self, target: &Target) -> std::result::Result<Callee, DescriptorError> {
        let callee = match target {
            Target::Class(name) => {
                let class = self.class(name).ok_or_else(|| DescriptorError::UnknownClass {
                    class: name.clone(),
                })?;
                if !class.is_instantiable() {
                    return Err(DescriptorError::NotInstantiable { class: name.clone() });
                }
                Callee {
                    parameters: class.constructor_parameters().to_vec(),
                    kind: CalleeKind::Construct {
                        has_constructor: class.has_constructor(),
                        class,
                    },
                }
            }
            Target::Function(function) => Callee {
                parameters: function.parameters().to_vec(),
                kind: CalleeKind::Function(function.clone()),
            },
            Target::Method { owner, method } => {
                let class_name = owner.class();
                let class = self.class(class_name).ok_or_else(|| DescriptorError::UnknownClass {
                    class: class_name.to_string(),
                })?;
                let definition =
                    self.method(class_name, method)
                        .ok_or_else(|| DescriptorError::UnknownMethod {
                            class: class_name.to_string(),
                            method: method.clone(),
                        })?;
                Callee {
                    parameters: definition.parameters().to_vec(),
                    kind: CalleeKind::Method {
                        owner: owner.clone(),
                        class,
                        method: definition,
                    },
                }
            }
        };

        validate(&target.describe(), &callee.parameters)?;
        Ok(callee)
    }
}

fn validate(
    target: &str,
    parameters: &[ParameterDescriptor],
) -> std::result::Result<(), DescriptorError> {
    let mut names = HashSet::new();
    let last = parameters.len().saturating_sub(1);

    for (position, descriptor) in parameters.iter().enumerate() {
        if !names.insert(descriptor.name()) {
            return Err(DescriptorError::DuplicateParameter {
                target: target.to_string(),
                name: descriptor.name().to_string(),
            });
        }
        if descriptor.is_variadic() && position != last {
            return Err(DescriptorError::VariadicNotLast {
                target: target.to_string(),
                name: descriptor.name().to_string(),
            });
        }
    }

    Ok(())
}

impl fmt::Debug for Reflector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reflector")
            .field("classes", &self.classes.len())
            .finish()
    }
}
