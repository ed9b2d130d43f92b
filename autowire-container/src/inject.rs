//! Post-construction pipeline.
//!
//! Every object the container constructs passes through its post-processors
//! in priority order before it is handed out or cached:
//!
//! | Processor            | Priority | Marker / capability             |
//! |----------------------|----------|---------------------------------|
//! | [`InjectProperties`] | 1024     | `Inject`, best effort           |
//! | [`RequiredInjector`] | High     | `Required`, must succeed        |
//! | [`AwareInjector`]    | Low      | capability setter, e.g. logger  |

use std::any::type_name;

use autowire_support::rendering::render_types;
use tracing::{debug, trace};

use crate::container::{CallableSpec, Container};
use crate::error::{ResolverError, Result};
use crate::markers::{Marked, Marker, MarkerKind, MarkerReader};
use crate::parameter::{Parameters, is_builtin, parse_type_declaration};
use crate::reflect::{MethodOwner, PropertyDefinition};
use crate::value::{Object, Value};

/// Priority of [`InjectProperties`] in the default pipeline.
pub const INJECT_PROPERTIES_PRIORITY: i32 = 1024;

/// Capability name and registry id used by [`AwareInjector::logger`].
pub const LOGGER_AWARE: &str = "LoggerAware";
pub const LOGGER_ID: &str = "Logger";

/// Runs against each freshly constructed object.
pub trait PostProcessor: Send + Sync {
    /// Returns the object to hand out; usually `object` itself.
    fn process(&self, container: &Container, object: Object) -> Result<Object>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        type_name::<Self>()
    }
}

/// Registry ids to try for a marked property, in order.
///
/// An explicit marker id wins; otherwise the property's non-builtin types,
/// with `self` meaning the declaring class.
fn candidate_ids(marker: &Marker, property: &PropertyDefinition, owner: &str) -> Vec<String> {
    let types = match marker.id() {
        Some(id) => parse_type_declaration(id).0,
        None => property.types().to_vec(),
    };

    types
        .into_iter()
        .filter_map(|ty| match ty.as_str() {
            "self" | "static" => Some(owner.to_string()),
            ty if is_builtin(ty) => None,
            _ => Some(ty),
        })
        .collect()
}

/// First candidate the container can supply. Cycles propagate.
fn first_available(container: &Container, candidates: &[String]) -> Result<Option<Value>> {
    for id in candidates {
        match container.get(id) {
            Ok(value) => return Ok(Some(value)),
            Err(err) if err.is_circular() => return Err(err),
            Err(err) => trace!(id, error = %err, "Candidate unavailable"),
        }
    }
    Ok(None)
}

// ═══════════════════════════════════════════
// RequiredInjector
// ═══════════════════════════════════════════

/// Fills `Required` properties and calls `Required` methods.
///
/// A property no candidate can fill falls back to its default, then to
/// `null` when nullable; anything else is a [`ResolverError::Unresolvable`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RequiredInjector;

impl RequiredInjector {
    fn inject_property(
        &self,
        container: &Container,
        object: &Object,
        marked: &Marked<PropertyDefinition>,
    ) -> Result<()> {
        let property = &marked.member;
        let candidates = candidate_ids(&marked.marker, property, marked.owner.name());

        let value = match first_available(container, &candidates)? {
            Some(value) => value,
            None => match property.default() {
                Some(default) => default.clone(),
                None if property.is_nullable() => Value::Null,
                None => {
                    return Err(ResolverError::Unresolvable {
                        owner: marked.owner.name().to_string(),
                        member: property.name().to_string(),
                        types: render_types(property.types()),
                    }
                    .into());
                }
            },
        };

        trace!(class = object.class(), property = property.name(), "Injecting required property");
        property.set(object, value)
    }
}

impl PostProcessor for RequiredInjector {
    fn process(&self, container: &Container, object: Object) -> Result<Object> {
        let reader = MarkerReader::new(container.reflector());

        for marked in reader.properties(object.class(), MarkerKind::Required) {
            self.inject_property(container, &object, &marked)?;
        }

        for marked in reader.methods(object.class(), MarkerKind::Required) {
            debug!(class = object.class(), method = marked.member.name(), "Calling required method");
            container.call(
                CallableSpec::Method(
                    MethodOwner::Instance(object.clone()),
                    marked.member.name().to_string(),
                ),
                Parameters::none(),
            )?;
        }

        Ok(object)
    }

    fn name(&self) -> &str {
        "required"
    }
}

// ═══════════════════════════════════════════
// InjectProperties
// ═══════════════════════════════════════════

/// Fills `Inject` properties when it can and leaves them alone otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct InjectProperties;

impl PostProcessor for InjectProperties {
    fn process(&self, container: &Container, object: Object) -> Result<Object> {
        let reader = MarkerReader::new(container.reflector());

        for marked in reader.properties(object.class(), MarkerKind::Inject) {
            let property = &marked.member;
            let candidates = candidate_ids(&marked.marker, property, marked.owner.name());

            let found = candidates.iter().find_map(|id| match container.get(id) {
                Ok(value) => Some(value),
                Err(err) => {
                    trace!(id, error = %err, "Optional injection skipped");
                    None
                }
            });

            if let Some(value) = found {
                property.set(&object, value)?;
            }
        }

        Ok(object)
    }

    fn name(&self) -> &str {
        "inject"
    }
}

// ═══════════════════════════════════════════
// AwareInjector
// ═══════════════════════════════════════════

/// Hands a registry entry to objects exposing a capability setter.
#[derive(Debug, Clone)]
pub struct AwareInjector {
    capability: String,
    id: String,
}

impl AwareInjector {
    pub fn new(capability: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            id: id.into(),
        }
    }

    /// Injects the `Logger` entry into `LoggerAware` objects.
    pub fn logger() -> Self {
        Self::new(LOGGER_AWARE, LOGGER_ID)
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }
}

impl PostProcessor for AwareInjector {
    fn process(&self, container: &Container, object: Object) -> Result<Object> {
        let setter = container
            .reflector()
            .ancestry(object.class())
            .iter()
            .find_map(|class| class.capability_setter(&self.capability).cloned());

        if let Some(setter) = setter {
            let value = container.get(&self.id)?;
            trace!(class = object.class(), capability = %self.capability, "Injecting capability");
            setter(&object, value)?;
        }

        Ok(object)
    }

    fn name(&self) -> &str {
        &self.capability
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::error::ContainerError;
    use crate::priority::Priority;
    use crate::reflect::{ClassDefinition, MethodDefinition};
    use crate::resolver::AutowireResolver;

    #[derive(Default)]
    struct Mailer {
        transport: Mutex<Option<Value>>,
        logger: Mutex<Option<Value>>,
        booted: AtomicUsize,
    }

    fn mailer_class(transport: PropertyDefinition) -> ClassDefinition {
        ClassDefinition::new("Mailer")
            .without_constructor(Mailer::default)
            .property(transport)
            .method(
                MethodDefinition::public::<Mailer, _>("boot", [], |_, mailer, _| {
                    mailer.booted.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::Null)
                })
                .marked(Marker::required()),
            )
            .capability::<Mailer, _>(LOGGER_AWARE, |mailer, logger| {
                *mailer.logger.lock() = Some(logger);
                Ok(())
            })
    }

    fn transport(declaration: &str) -> PropertyDefinition {
        PropertyDefinition::new::<Mailer, _>("transport", declaration, |mailer, value| {
            *mailer.transport.lock() = Some(value);
            Ok(())
        })
    }

    /// Resolvers only; each test runs its processor by hand.
    fn plain_container() -> Arc<Container> {
        Container::builder()
            .with_default_pipeline(false)
            .resolver(Arc::new(AutowireResolver), Priority::High)
            .build()
            .unwrap()
    }

    fn construct(container: &Container, class: &str) -> Object {
        container
            .make(class, Parameters::none())
            .unwrap_or_else(|err| panic!("construction failed: {err}"))
            .as_object()
            .cloned()
            .unwrap()
    }

    fn make_mailer(container: &Container) -> Object {
        construct(container, "Mailer")
    }

    #[test]
    fn candidate_ids_follow_marker_then_types() {
        let property = transport("Smtp|string|self");
        assert_eq!(candidate_ids(&Marker::required(), &property, "Mailer"), ["Smtp", "Mailer"]);
        assert_eq!(
            candidate_ids(&Marker::required_id("a|b"), &property, "Mailer"),
            ["a", "b"]
        );
    }

    #[test]
    fn required_property_and_method() {
        let container = plain_container();
        container.define(mailer_class(transport("Transport").marked(Marker::required())));
        container.set("Transport", "smtp://localhost");

        let object = make_mailer(&container);
        let object = RequiredInjector.process(&container, object).unwrap();

        let mailer = object.downcast_ref::<Mailer>().unwrap();
        assert_eq!(*mailer.transport.lock(), Some(Value::from("smtp://localhost")));
        assert_eq!(mailer.booted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn required_property_falls_back_to_null() {
        let container = plain_container();
        container.define(mailer_class(transport("?Transport").marked(Marker::required())));

        let object = RequiredInjector.process(&container, make_mailer(&container)).unwrap();
        let mailer = object.downcast_ref::<Mailer>().unwrap();
        assert_eq!(*mailer.transport.lock(), Some(Value::Null));
    }

    #[test]
    fn required_property_unresolvable() {
        let container = plain_container();
        container.define(mailer_class(transport("Transport").marked(Marker::required())));

        let err = RequiredInjector
            .process(&container, make_mailer(&container))
            .unwrap_err();

        match err {
            ContainerError::Resolver(ResolverError::Unresolvable { owner, member, types }) => {
                assert_eq!(owner, "Mailer");
                assert_eq!(member, "transport");
                assert_eq!(types, "Transport");
            }
            other => panic!("expected Unresolvable, got: {other:?}"),
        }
    }

    #[test]
    fn inject_is_best_effort() {
        let container = plain_container();
        container.define(mailer_class(transport("Transport").marked(Marker::inject())));

        let object = InjectProperties.process(&container, make_mailer(&container)).unwrap();
        let mailer = object.downcast_ref::<Mailer>().unwrap();
        assert_eq!(*mailer.transport.lock(), None);

        container.set("Transport", "sendmail");
        let object = InjectProperties.process(&container, object).unwrap();
        let mailer = object.downcast_ref::<Mailer>().unwrap();
        assert_eq!(*mailer.transport.lock(), Some(Value::from("sendmail")));
    }

    #[test]
    fn logger_capability() {
        let container = plain_container();
        container.define(mailer_class(transport("Transport")));
        container.set(LOGGER_ID, "stderr");

        let object = AwareInjector::logger().process(&container, make_mailer(&container)).unwrap();
        let mailer = object.downcast_ref::<Mailer>().unwrap();
        assert_eq!(*mailer.logger.lock(), Some(Value::from("stderr")));
    }

    #[test]
    fn capability_without_entry_fails() {
        let container = plain_container();
        container.define(mailer_class(transport("Transport")));

        let result = AwareInjector::logger().process(&container, make_mailer(&container));
        assert!(matches!(result, Err(ContainerError::NotFound(_))));
    }

    #[test]
    fn objects_without_capability_pass_through() {
        struct Plain;
        let container = plain_container();
        container.define(ClassDefinition::new("Plain").without_constructor(|| Plain));

        let object = construct(&container, "Plain");
        let processed = AwareInjector::logger().process(&container, object.clone()).unwrap();
        assert!(processed.ptr_eq(&object));
    }
}
