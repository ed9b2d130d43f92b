//! Resolvers and the autowiring parameter matcher.
//!
//! The container asks each [`Resolver`] in priority order to resolve a
//! [`Target`]. A resolver that does not apply answers
//! [`Resolution::Unmatched`] and the next one is tried; only errors that make
//! the whole resolution fail are returned as `Err`.
//!
//! # Matching
//! [`AutowireResolver`] binds provided parameters to declared ones in a
//! single forward pass, never backtracking:
//!
//! ```text
//! for each declared slot, in order:
//!     provided value targets it (name / compatible pool head) → bind, consume
//!     has default                                            → bind default
//!     required:  nullable → null, else registry lookup       → or Unmatched
//!     optional:  variadic → stop, nullable → null,
//!                object-typed → leave unbound, builtin       → Unmatched
//! leftover provided values → variadic tail, or an error
//! ```

use std::any::type_name;

use tracing::trace;

use crate::container::Container;
use crate::error::{ContainerError, ResolverError, Result};
use crate::parameter::{Arguments, ParameterDescriptor, Parameters, ProvidedParameter};
use crate::reflect::{CalleeKind, MethodOwner, Target};
use crate::value::Value;

/// Outcome of asking one resolver.
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved(Value),
    /// This resolver does not apply; try the next one.
    Unmatched,
}

impl Resolution {
    pub fn is_unmatched(&self) -> bool {
        matches!(self, Self::Unmatched)
    }
}

/// A link in the container's resolver chain.
pub trait Resolver: Send + Sync {
    /// Resolves `target` with caller-supplied `parameters`.
    fn resolve(
        &self,
        container: &Container,
        target: &Target,
        parameters: &Parameters,
    ) -> Result<Resolution>;

    /// Whether this resolver could produce `id` on its own.
    fn can_resolve(&self, _container: &Container, _id: &str) -> bool {
        false
    }

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        type_name::<Self>()
    }
}

/// Resolves classes, functions and methods by matching their declared
/// parameters against provided values, defaults and registry entries.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutowireResolver;

impl AutowireResolver {
    pub fn new() -> Self {
        Self
    }

    /// Binds `parameters` to `descriptors`.
    ///
    /// Returns `Ok(None)` when a required slot cannot be filled.
    pub fn match_arguments(
        &self,
        container: &Container,
        target: &str,
        descriptors: &[ParameterDescriptor],
        parameters: &Parameters,
    ) -> Result<Option<Arguments>> {
        let variadic = descriptors.last().is_some_and(ParameterDescriptor::is_variadic);

        if parameters.len() > descriptors.len() && !variadic {
            return Err(ResolverError::TooManyParameters {
                target: target.to_string(),
                expected: descriptors.len(),
                given: parameters.len(),
            }
            .into());
        }

        if parameters.len() == descriptors.len() {
            if let Some(arguments) = bind_directly(descriptors, parameters) {
                return Ok(Some(arguments));
            }
        }

        let reflector = container.reflector();
        let is_a = |class: &str, ty: &str| reflector.is_a(class, ty);
        let positional = parameters.is_positional();
        let mut pool: Vec<ProvidedParameter> = parameters.provided();
        let mut arguments = Arguments::new(descriptors);

        for descriptor in descriptors {
            let position = descriptor.position();

            let claimed = if positional {
                pool.first()
                    .is_some_and(|head| descriptor.accepts(&head.value, is_a))
                    .then_some(0)
            } else {
                pool.iter()
                    .position(|p| p.name.as_deref() == Some(descriptor.name()))
            };
            if let Some(index) = claimed {
                arguments.bind(position, pool.remove(index).value);
                continue;
            }

            if let Some(default) = descriptor.default() {
                arguments.bind(position, default.clone());
                continue;
            }

            if !descriptor.is_optional() {
                if descriptor.is_nullable() {
                    arguments.bind(position, Value::Null);
                    continue;
                }
                match self.lookup(container, descriptor)? {
                    Some(entry) => arguments.bind(position, entry),
                    None => {
                        trace!(callee = target, parameter = descriptor.name(), "Required parameter unresolvable");
                        return Ok(None);
                    }
                }
                continue;
            }

            if descriptor.is_variadic() {
                break;
            }
            if descriptor.is_nullable() {
                arguments.bind(position, Value::Null);
                continue;
            }
            if descriptor.has_builtin() {
                trace!(callee = target, parameter = descriptor.name(), "Optional builtin parameter unresolvable");
                return Ok(None);
            }
            // optional object slot: left unbound
        }

        if let Some(orphan) = pool.first() {
            if !variadic {
                return Err(ResolverError::UnusedParameter {
                    target: target.to_string(),
                    position: orphan.position,
                    name: orphan.name.clone(),
                }
                .into());
            }
        }
        for provided in pool {
            arguments.push_rest(provided.value);
        }

        Ok(Some(arguments))
    }

    /// Best-effort registry lookup over a slot's non-builtin types.
    ///
    /// Failures are swallowed, except cycles.
    fn lookup(
        &self,
        container: &Container,
        descriptor: &ParameterDescriptor,
    ) -> Result<Option<Value>> {
        for id in descriptor.entry_types() {
            match container.get(id) {
                Ok(entry) => return Ok(Some(entry)),
                Err(err) if err.is_circular() => return Err(err),
                Err(err) => trace!(id, error = %err, "Registry lookup failed"),
            }
        }
        Ok(None)
    }

    fn invoke(&self, container: &Container, kind: CalleeKind, arguments: Arguments) -> Result<Resolution> {
        let value = match kind {
            CalleeKind::Function(function) => function.invoke(container, arguments)?,
            CalleeKind::Construct { class, .. } => {
                Value::Object(class.instantiate(container, arguments)?)
            }
            CalleeKind::Method { method, .. } if method.is_static() => {
                method.invoke(container, None, arguments)?
            }
            CalleeKind::Method { owner: MethodOwner::Instance(object), method, .. } => {
                method.invoke(container, Some(&object), arguments)?
            }
            CalleeKind::Method { owner: MethodOwner::Class(class), method, .. } => {
                let instance = container.make(&class, Parameters::none())?;
                let Some(object) = instance.as_object() else {
                    return Ok(Resolution::Unmatched);
                };
                method.invoke(container, Some(object), arguments)?
            }
        };
        Ok(Resolution::Resolved(value))
    }
}

/// Fast path for equal counts: positional values in order, or named values
/// by descriptor name. `None` if a name matches no descriptor.
fn bind_directly(descriptors: &[ParameterDescriptor], parameters: &Parameters) -> Option<Arguments> {
    let mut arguments = Arguments::new(descriptors);
    match parameters {
        Parameters::Positional(values) => {
            for (descriptor, value) in descriptors.iter().zip(values) {
                arguments.bind(descriptor.position(), value.clone());
            }
        }
        Parameters::Named(values) => {
            for descriptor in descriptors {
                let value = values.get(descriptor.name())?;
                arguments.bind(descriptor.position(), value.clone());
            }
        }
    }
    Some(arguments)
}

impl Resolver for AutowireResolver {
    fn resolve(
        &self,
        container: &Container,
        target: &Target,
        parameters: &Parameters,
    ) -> Result<Resolution> {
        let callee = match container.reflector().reflect(target) {
            Ok(callee) => callee,
            Err(err) => {
                trace!(callee = %target, error = %err, "Target cannot be introspected");
                return Ok(Resolution::Unmatched);
            }
        };
        let description = target.describe();

        match &callee.kind {
            CalleeKind::Method { method, .. } if !method.is_public() => {
                trace!(callee = %description, "Method is not public");
                return Ok(Resolution::Unmatched);
            }
            CalleeKind::Construct { class, has_constructor: false } => {
                if !parameters.is_empty() {
                    return Err(ContainerError::from(ResolverError::TooManyParameters {
                        target: description,
                        expected: 0,
                        given: parameters.len(),
                    }));
                }
                let object = class.instantiate(container, Arguments::default())?;
                return Ok(Resolution::Resolved(Value::Object(object)));
            }
            _ => {}
        }

        let Some(arguments) =
            self.match_arguments(container, &description, &callee.parameters, parameters)?
        else {
            return Ok(Resolution::Unmatched);
        };

        trace!(callee = %description, arguments = arguments.len(), "Arguments matched");
        self.invoke(container, callee.kind, arguments)
    }

    fn can_resolve(&self, container: &Container, id: &str) -> bool {
        container.reflector().is_instantiable(id)
    }

    fn name(&self) -> &str {
        "autowire"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;
    use crate::reflect::ClassDefinition;
    use crate::value::Function;

    fn sum_all(args: &Arguments) -> i64 {
        args.values().iter().filter_map(Value::as_int).sum()
    }

    fn matched(container: &Container, descriptors: Vec<ParameterDescriptor>, parameters: Parameters) -> Result<Option<Arguments>> {
        let descriptors = ParameterDescriptor::positioned(descriptors);
        AutowireResolver.match_arguments(container, "test()", &descriptors, &parameters)
    }

    #[test]
    fn positional_with_default() {
        let container = Container::new();
        let args = matched(
            &container,
            vec![
                ParameterDescriptor::new("a").typed("int"),
                ParameterDescriptor::new("b").typed("string").default_value("x"),
            ],
            Parameters::positional([5]),
        )
        .unwrap()
        .unwrap();

        assert_eq!(args.get(0), Some(&Value::Int(5)));
        assert_eq!(args.get(1), Some(&Value::from("x")));
    }

    #[test]
    fn named_out_of_order() {
        let container = Container::new();
        let args = matched(
            &container,
            vec![
                ParameterDescriptor::new("a").typed("int"),
                ParameterDescriptor::new("b").typed("string").default_value("x"),
            ],
            Parameters::named([("b", Value::from("y")), ("a", Value::from(1))]),
        )
        .unwrap()
        .unwrap();

        assert_eq!(args.named("a"), Some(&Value::Int(1)));
        assert_eq!(args.named("b"), Some(&Value::from("y")));
    }

    #[test]
    fn too_many_parameters() {
        let container = Container::new();
        let err = matched(
            &container,
            vec![ParameterDescriptor::new("a"), ParameterDescriptor::new("b")],
            Parameters::positional([1, 2, 3]),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            ContainerError::Resolver(ResolverError::TooManyParameters { expected: 2, given: 3, .. })
        ));
    }

    #[test]
    fn incompatible_head_is_not_retried_later() {
        let container = Container::new();
        // "x" skips `a`, fills `b`, and 5 is left with nowhere to go.
        // A third slot keeps the counts apart so values are type checked.
        let result = matched(
            &container,
            vec![
                ParameterDescriptor::new("a").typed("int").default_value(0),
                ParameterDescriptor::new("b").typed("string").default_value("b"),
                ParameterDescriptor::new("c").typed("bool").default_value(false),
            ],
            Parameters::positional([Value::from("x"), Value::from(5)]),
        );

        assert!(matches!(
            result,
            Err(ContainerError::Resolver(ResolverError::UnusedParameter { position: 1, .. }))
        ));
    }

    #[test]
    fn incompatible_head_falls_to_default() {
        let container = Container::new();
        let args = matched(
            &container,
            vec![
                ParameterDescriptor::new("a").typed("string").default_value("a"),
                ParameterDescriptor::new("b").typed("int").default_value(0),
            ],
            Parameters::positional([5]),
        )
        .unwrap()
        .unwrap();

        assert_eq!(args.get(0), Some(&Value::from("a")));
        assert_eq!(args.get(1), Some(&Value::Int(5)));
    }

    #[test]
    fn required_builtin_without_value_is_unmatched() {
        let container = Container::new();
        let result = matched(
            &container,
            vec![
                ParameterDescriptor::new("a").typed("int"),
                ParameterDescriptor::new("b").typed("int"),
            ],
            Parameters::positional([1]),
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn required_nullable_binds_null() {
        let container = Container::new();
        let args = matched(
            &container,
            vec![
                ParameterDescriptor::new("a").typed("int"),
                ParameterDescriptor::new("cache").typed("?Cache"),
            ],
            Parameters::positional([1]),
        )
        .unwrap()
        .unwrap();
        assert_eq!(args.get(1), Some(&Value::Null));
    }

    #[test]
    fn optional_object_slot_left_unbound() {
        let container = Container::new();
        let args = matched(
            &container,
            vec![
                ParameterDescriptor::new("a").typed("int"),
                ParameterDescriptor::new("cache").typed("Cache").optional(),
                ParameterDescriptor::new("c").typed("int").default_value(3),
            ],
            Parameters::positional([1]),
        )
        .unwrap()
        .unwrap();

        assert_eq!(args.get(1), None);
        assert_eq!(args.get(2), Some(&Value::Int(3)));
    }

    #[test]
    fn optional_builtin_without_default_is_unmatched() {
        let container = Container::new();
        let result = matched(
            &container,
            vec![
                ParameterDescriptor::new("a").typed("int"),
                ParameterDescriptor::new("flag").typed("bool").optional(),
            ],
            Parameters::positional([1]),
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn variadic_absorbs_tail() {
        let container = Container::new();
        let args = matched(
            &container,
            vec![
                ParameterDescriptor::new("first").typed("int"),
                ParameterDescriptor::new("rest").typed("int").variadic(),
            ],
            Parameters::positional([1, 2, 3, 4]),
        )
        .unwrap()
        .unwrap();

        assert_eq!(sum_all(&args), 10);
        assert_eq!(args.from_position(1).len(), 3);
    }

    #[test]
    fn variadic_with_no_values() {
        let container = Container::new();
        let args = matched(
            &container,
            vec![
                ParameterDescriptor::new("first").typed("int"),
                ParameterDescriptor::new("rest").variadic(),
            ],
            Parameters::positional([1]),
        )
        .unwrap()
        .unwrap();
        assert_eq!(args.values(), vec![Value::Int(1)]);
    }

    #[test]
    fn registry_fallback_fills_object_slot() {
        let container = Container::new();
        container.set("Clock", Value::from("tick"));
        let args = matched(
            &container,
            vec![ParameterDescriptor::new("clock").typed("Clock")],
            Parameters::none(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(args.get(0), Some(&Value::from("tick")));
    }

    #[test]
    fn unknown_target_is_unmatched() {
        let container = Container::new();
        let resolution = AutowireResolver
            .resolve(&container, &Target::Class("Ghost".into()), &Parameters::none())
            .unwrap();
        assert!(resolution.is_unmatched());
    }

    #[test]
    fn class_without_constructor_rejects_parameters() {
        struct Plain;
        let container = Container::new();
        container.define(ClassDefinition::new("Plain").without_constructor(|| Plain));

        let err = AutowireResolver
            .resolve(&container, &Target::Class("Plain".into()), &Parameters::positional([1]))
            .unwrap_err();
        assert!(matches!(err, ContainerError::Resolver(ResolverError::TooManyParameters { .. })));
    }

    #[test]
    fn function_invocation() {
        let container = Container::new();
        let add = Function::new(
            "add",
            [
                ParameterDescriptor::new("a").typed("int"),
                ParameterDescriptor::new("b").typed("int").default_value(10),
            ],
            |_, args| Ok(Value::Int(sum_all(&args))),
        );

        let resolution = AutowireResolver
            .resolve(&container, &Target::Function(add), &Parameters::positional([5]))
            .unwrap();
        assert!(matches!(resolution, Resolution::Resolved(Value::Int(15))));
    }
}
