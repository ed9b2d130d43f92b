//! Dynamic values stored in and produced by the container.
//!
//! The container is keyed by strings and autowires by declared type names,
//! so everything it hands around is a [`Value`]: a handful of scalars, lists
//! and maps, shared [`Object`]s tagged with a class name, and [`Function`]s
//! that carry their own parameter descriptors.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::container::Container;
use crate::error::Result;
use crate::parameter::{Arguments, ParameterDescriptor};

/// Runtime type name of a function value.
pub const CLOSURE_TYPE: &str = "Closure";

/// A value that can be stored, provided as a parameter, or returned by a
/// resolution.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    Object(Object),
    Function(Function),
}

impl Value {
    /// Wraps `value` into a shared object of class `class`.
    pub fn object<T: Any + Send + Sync>(class: impl Into<Arc<str>>, value: T) -> Self {
        Self::Object(Object::new(class, value))
    }

    /// Runtime type name, as matched against declared parameter types.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) | Self::Map(_) => "array",
            Self::Object(object) => object.class(),
            Self::Function(_) => CLOSURE_TYPE,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Downcasts an object value to its concrete Rust type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.as_object().and_then(Object::downcast)
    }
}

/// Scalars compare by value; objects and functions by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(values) => f.debug_list().entries(values).finish(),
            Self::Map(map) => f.debug_map().entries(map.iter()).finish(),
            Self::Object(object) => write!(f, "{object:?}"),
            Self::Function(function) => write!(f, "{function:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Self::List(values)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Self::Object(object)
    }
}

impl From<Function> for Value {
    fn from(function: Function) -> Self {
        Self::Function(function)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// ═══════════════════════════════════════════
// Object
// ═══════════════════════════════════════════

/// A shared instance of a defined class.
///
/// Cloning an `Object` clones the handle, never the instance: two clones
/// are [`ptr_eq`](Object::ptr_eq). Setter injection therefore goes through
/// interior mutability on the concrete type.
#[derive(Clone)]
pub struct Object {
    class: Arc<str>,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Object {
    pub fn new<T: Any + Send + Sync>(class: impl Into<Arc<str>>, value: T) -> Self {
        Self::from_arc(class, Arc::new(value))
    }

    /// Wraps an existing `Arc` without re-allocating, keeping its identity.
    pub fn from_arc<T: Any + Send + Sync>(class: impl Into<Arc<str>>, value: Arc<T>) -> Self {
        Self {
            class: class.into(),
            inner: value,
        }
    }

    /// The class this instance was constructed as.
    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object({})#{:p}", self.class, Arc::as_ptr(&self.inner))
    }
}

// ═══════════════════════════════════════════
// Function
// ═══════════════════════════════════════════

/// Body of a function value.
///
/// Receives the container (to resolve further entries on its own) and the
/// arguments bound by the matcher.
pub type FunctionBody = Arc<dyn Fn(&Container, Arguments) -> Result<Value> + Send + Sync>;

/// A function value: a named body plus the parameters it declares.
///
/// Stored through [`Container::set`](crate::container::Container::set), a
/// function becomes a deferred definition evaluated on first `get`.
///
/// # Examples
/// ```
/// use autowire_container::parameter::ParameterDescriptor;
/// use autowire_container::value::{Function, Value};
///
/// let add = Function::new(
///     "add",
///     [
///         ParameterDescriptor::new("a").typed("int"),
///         ParameterDescriptor::new("b").typed("int").default_value(1),
///     ],
///     |_, args| {
///         let a = args.get(0).and_then(Value::as_int).unwrap_or_default();
///         let b = args.get(1).and_then(Value::as_int).unwrap_or_default();
///         Ok(Value::Int(a + b))
///     },
/// );
/// assert_eq!(add.parameters().len(), 2);
/// ```
#[derive(Clone)]
pub struct Function {
    name: Arc<str>,
    parameters: Arc<[ParameterDescriptor]>,
    body: FunctionBody,
}

impl Function {
    pub fn new<F>(
        name: impl Into<Arc<str>>,
        parameters: impl IntoIterator<Item = ParameterDescriptor>,
        body: F,
    ) -> Self
    where
        F: Fn(&Container, Arguments) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parameters: ParameterDescriptor::positioned(parameters).into(),
            body: Arc::new(body),
        }
    }

    /// A function declaring no parameters.
    pub fn thunk<F>(name: impl Into<Arc<str>>, body: F) -> Self
    where
        F: Fn(&Container) -> Result<Value> + Send + Sync + 'static,
    {
        Self::new(name, [], move |container, _| body(container))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    pub fn invoke(&self, container: &Container, arguments: Arguments) -> Result<Value> {
        (self.body)(container, arguments)
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.body), Arc::as_ptr(&other.body))
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("parameters", &self.parameters.len())
            .finish()
    }
}
