//! Parameter shapes: what a target declares, what a caller provides, and
//! what the matcher finally binds.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::error::ResolverError;
use crate::value::{CLOSURE_TYPE, Value};

/// Type names that never name a registry entry.
pub const BUILTIN_TYPES: [&str; 17] = [
    "self", "parent", "static", "array", "callable", "bool", "float", "int", "string", "iterable",
    "object", "mixed", "void", "never", "null", "false", "true",
];

static BUILTINS: Lazy<HashSet<&'static str>> = Lazy::new(|| BUILTIN_TYPES.into_iter().collect());

/// Returns `true` for type names that cannot be looked up in the registry.
pub fn is_builtin(type_name: &str) -> bool {
    BUILTINS.contains(type_name)
}

/// Splits a declared type such as `?Logger|Cache` into its alternatives.
///
/// Returns the alternatives in declaration order and whether a `?` prefix
/// made the declaration nullable. Intersection members (`A&B`) are dropped.
pub fn parse_type_declaration(declaration: &str) -> (Vec<String>, bool) {
    let mut nullable = false;
    let mut types = Vec::new();

    for part in declaration.split('|').map(str::trim) {
        if part.contains('&') {
            continue;
        }
        let part = match part.strip_prefix('?') {
            Some(rest) => {
                nullable = true;
                rest
            }
            None => part,
        };
        if !part.is_empty() {
            types.push(part.to_string());
        }
    }

    (types, nullable)
}

// ═══════════════════════════════════════════
// ParameterDescriptor
// ═══════════════════════════════════════════

/// Static shape of one declared parameter.
///
/// Built fluently; the effective type set is recomputed on every change:
/// the default value's runtime type first, then the declared alternatives,
/// then `null` if nullable, or `mixed` when nothing was declared at all.
///
/// # Examples
/// ```
/// use autowire_container::parameter::ParameterDescriptor;
///
/// let logger = ParameterDescriptor::new("logger").typed("?Logger");
/// assert_eq!(logger.types(), ["Logger", "null"]);
/// assert!(logger.is_nullable());
///
/// let anything = ParameterDescriptor::new("value");
/// assert_eq!(anything.types(), ["mixed"]);
/// ```
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    name: Arc<str>,
    position: usize,
    declared: Vec<String>,
    declared_nullable: bool,
    types: Vec<String>,
    optional: bool,
    variadic: bool,
    default: Option<Value>,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        let mut descriptor = Self {
            name: name.into(),
            position: 0,
            declared: Vec::new(),
            declared_nullable: false,
            types: Vec::new(),
            optional: false,
            variadic: false,
            default: None,
        };
        descriptor.refresh_types();
        descriptor
    }

    /// Declares the parameter type, e.g. `int`, `?Logger`, `Cache|null`.
    pub fn typed(mut self, declaration: &str) -> Self {
        let (types, nullable) = parse_type_declaration(declaration);
        self.declared.extend(types);
        self.declared_nullable |= nullable;
        self.refresh_types();
        self
    }

    pub fn nullable(mut self) -> Self {
        self.declared_nullable = true;
        self.refresh_types();
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Marks the parameter as absorbing every remaining positional value.
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self.optional = true;
        self
    }

    /// Gives the parameter a default value, which also makes it optional.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self.optional = true;
        self.refresh_types();
        self
    }

    /// Assigns declaration positions in iteration order.
    pub fn positioned(parameters: impl IntoIterator<Item = Self>) -> Vec<Self> {
        parameters
            .into_iter()
            .enumerate()
            .map(|(position, mut descriptor)| {
                descriptor.position = position;
                descriptor
            })
            .collect()
    }

    fn refresh_types(&mut self) {
        let mut types: Vec<String> = Vec::new();
        {
            let mut push = |ty: &str| {
                if !types.iter().any(|known| known == ty) {
                    types.push(ty.to_string());
                }
            };

            if let Some(ref default) = self.default {
                push(default.type_name());
            }
            for ty in &self.declared {
                push(ty);
            }
            if self.declared_nullable {
                push("null");
            }
        }
        if types.is_empty() {
            types.push("mixed".to_string());
        }

        self.types = types;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Ordered, deduplicated effective type set.
    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    pub fn is_nullable(&self) -> bool {
        self.has_type("null")
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn accepts_mixed(&self) -> bool {
        self.has_type("mixed")
    }

    /// `true` if any effective type is builtin.
    pub fn has_builtin(&self) -> bool {
        self.types.iter().any(|ty| is_builtin(ty))
    }

    /// Declared types that may name registry entries, in order.
    pub fn entry_types(&self) -> impl Iterator<Item = &str> {
        self.types
            .iter()
            .map(String::as_str)
            .filter(|ty| !is_builtin(ty))
    }

    fn has_type(&self, ty: &str) -> bool {
        self.types.iter().any(|known| known == ty)
    }

    /// Checks whether `value` may fill this slot.
    ///
    /// `is_a(class, ty)` answers whether an object of `class` is an instance
    /// of `ty` through inheritance or an implemented interface.
    pub fn accepts(&self, value: &Value, is_a: impl Fn(&str, &str) -> bool) -> bool {
        if self.accepts_mixed() || self.has_type(value.type_name()) {
            return true;
        }

        match value {
            Value::Int(_) => self.has_type("float"),
            Value::Bool(true) => self.has_type("true"),
            Value::Bool(false) => self.has_type("false"),
            Value::List(_) | Value::Map(_) => self.has_type("iterable"),
            Value::Function(_) => self.has_type("callable") || self.has_type(CLOSURE_TYPE),
            Value::Object(object) => {
                self.has_type("object") || self.entry_types().any(|ty| is_a(object.class(), ty))
            }
            _ => false,
        }
    }
}

// ═══════════════════════════════════════════
// Provided parameters
// ═══════════════════════════════════════════

/// One caller-supplied value, remembering where it came from.
#[derive(Debug, Clone)]
pub struct ProvidedParameter {
    pub value: Value,
    pub position: usize,
    pub name: Option<String>,
}

/// Key of a loosely-built parameter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKey {
    Index(usize),
    Name(String),
}

impl From<usize> for ParamKey {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for ParamKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ParamKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// Caller-supplied parameters: purely positional or purely named.
#[derive(Debug, Clone)]
pub enum Parameters {
    Positional(Vec<Value>),
    Named(IndexMap<String, Value>),
}

impl Default for Parameters {
    fn default() -> Self {
        Self::none()
    }
}

impl Parameters {
    pub fn none() -> Self {
        Self::Positional(Vec::new())
    }

    pub fn positional<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::Positional(values.into_iter().map(Into::into).collect())
    }

    pub fn named<K: Into<String>, V: Into<Value>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Self::Named(
            entries
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }

    /// Builds parameters from keyed pairs, rejecting a mix of index and
    /// name keys.
    ///
    /// ```
    /// use autowire_container::parameter::{ParamKey, Parameters};
    /// use autowire_container::value::Value;
    ///
    /// let mixed = Parameters::from_pairs([
    ///     (ParamKey::from(0), Value::from(1)),
    ///     (ParamKey::from("b"), Value::from(2)),
    /// ]);
    /// assert!(mixed.is_err());
    /// ```
    pub fn from_pairs(
        pairs: impl IntoIterator<Item = (ParamKey, Value)>,
    ) -> Result<Self, ResolverError> {
        let mut positional: Vec<(usize, Value)> = Vec::new();
        let mut named: IndexMap<String, Value> = IndexMap::new();

        for (key, value) in pairs {
            match key {
                ParamKey::Index(index) => positional.push((index, value)),
                ParamKey::Name(name) => {
                    named.insert(name, value);
                }
            }
            if !positional.is_empty() && !named.is_empty() {
                return Err(ResolverError::MixedParameters);
            }
        }

        if named.is_empty() {
            positional.sort_by_key(|(index, _)| *index);
            Ok(Self::Positional(positional.into_iter().map(|(_, v)| v).collect()))
        } else {
            Ok(Self::Named(named))
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Positional(values) => values.len(),
            Self::Named(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_positional(&self) -> bool {
        matches!(self, Self::Positional(_))
    }

    /// Flattens into provided parameters in original order.
    pub fn provided(&self) -> Vec<ProvidedParameter> {
        match self {
            Self::Positional(values) => values
                .iter()
                .enumerate()
                .map(|(position, value)| ProvidedParameter {
                    value: value.clone(),
                    position,
                    name: None,
                })
                .collect(),
            Self::Named(values) => values
                .iter()
                .enumerate()
                .map(|(position, (name, value))| ProvidedParameter {
                    value: value.clone(),
                    position,
                    name: Some(name.clone()),
                })
                .collect(),
        }
    }
}

impl From<Vec<Value>> for Parameters {
    fn from(values: Vec<Value>) -> Self {
        Self::Positional(values)
    }
}

impl From<IndexMap<String, Value>> for Parameters {
    fn from(values: IndexMap<String, Value>) -> Self {
        Self::Named(values)
    }
}

// ═══════════════════════════════════════════
// Arguments
// ═══════════════════════════════════════════

/// Arguments bound by the matcher, handed to a constructor or function body.
///
/// One slot per declared parameter; a slot is `None` only when an optional
/// object-typed parameter could not be filled. Values absorbed by a
/// variadic parameter follow the declared slots.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    names: Vec<Arc<str>>,
    slots: Vec<Option<Value>>,
    rest: Vec<Value>,
}

impl Arguments {
    pub(crate) fn new(descriptors: &[ParameterDescriptor]) -> Self {
        Self {
            names: descriptors.iter().map(|d| Arc::clone(&d.name)).collect(),
            slots: vec![None; descriptors.len()],
            rest: Vec::new(),
        }
    }

    pub(crate) fn bind(&mut self, position: usize, value: Value) {
        if let Some(slot) = self.slots.get_mut(position) {
            *slot = Some(value);
        }
    }

    pub(crate) fn push_rest(&mut self, value: Value) {
        self.rest.push(value);
    }

    /// Value at `position`, counting variadic extras after the declared slots.
    pub fn get(&self, position: usize) -> Option<&Value> {
        match self.slots.get(position) {
            Some(slot) => slot.as_ref(),
            None => self.rest.get(position - self.slots.len()),
        }
    }

    /// Value bound to the parameter called `name`.
    pub fn named(&self, name: &str) -> Option<&Value> {
        self.names
            .iter()
            .position(|n| &**n == name)
            .and_then(|position| self.get(position))
    }

    /// Downcasts the object at `position`.
    pub fn object<T: std::any::Any + Send + Sync>(&self, position: usize) -> Option<Arc<T>> {
        self.get(position).and_then(Value::downcast)
    }

    /// Values from `position` onwards, variadic extras included.
    pub fn from_position(&self, position: usize) -> Vec<&Value> {
        self.slots
            .iter()
            .skip(position)
            .filter_map(Option::as_ref)
            .chain(self.rest.iter())
            .collect()
    }

    /// Number of declared slots plus variadic extras.
    pub fn len(&self) -> usize {
        self.slots.len() + self.rest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every bound value in order, skipping unfilled slots.
    pub fn values(&self) -> Vec<Value> {
        self.from_position(0).into_iter().cloned().collect()
    }
}
