//! Error types for container operations.
//!
//! Every failure carries enough context to act on it: the id that was
//! requested, the resolution chain that looped, or the declaring class and
//! member that could not be filled.

use std::fmt;

use autowire_support::rendering::{render_chain, short_name};

/// Main error type for all container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// Nothing could supply the requested id.
    #[error(transparent)]
    NotFound(NotFoundError),

    /// An id was re-entered while it was still being resolved.
    #[error(transparent)]
    CircularDependency(CircularDependencyError),

    /// Parameter matching or callable parsing failed.
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    /// The alias table was given an invalid entry.
    #[error(transparent)]
    Alias(#[from] AliasError),

    /// A target could not be introspected.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// A container stack was built or extended incorrectly.
    #[error(transparent)]
    Stack(#[from] StackError),

    /// A constructor, function or method body returned an error.
    #[error("{target} failed: {source}")]
    Invocation {
        target: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ContainerError {
    /// Builds an [`ContainerError::Invocation`] from any displayable cause.
    pub fn invocation(
        target: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Invocation {
            target: target.into(),
            source: source.into(),
        }
    }

    /// Returns `true` if this error, or any error it wraps, is a cycle.
    ///
    /// Best-effort lookups swallow failures but must let cycles through.
    pub fn is_circular(&self) -> bool {
        match self {
            Self::CircularDependency(_) => true,
            Self::NotFound(err) => err.source.as_deref().is_some_and(Self::is_circular),
            Self::Resolver(ResolverError::InvalidCallable { source, .. }) => {
                source.as_deref().is_some_and(Self::is_circular)
            }
            _ => false,
        }
    }
}

/// Error when no definition, provider or resolver could supply an id.
#[derive(Debug)]
pub struct NotFoundError {
    /// The id that was requested.
    pub id: String,
    /// Known ids that look like the requested one.
    pub suggestions: Vec<String>,
    /// What went wrong underneath, if anything did.
    pub source: Option<Box<ContainerError>>,
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service \"{}\" not found.", self.id)?;

        if let Some(ref source) = self.source {
            write!(f, "\n  Caused by: {source}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for NotFoundError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}

/// Error when an id is entered again while it is still resolving.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// The id that was re-entered.
    pub id: String,
    /// Active resolutions, outermost first, ending with `id`.
    pub chain: Vec<String>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Already resolving \"{}\"", self.id)?;

        let short: Vec<&str> = self.chain.iter().map(|id| short_name(id)).collect();
        if short.len() > 1 {
            write!(f, ":\n  {}", render_chain(&short))?;
        }

        write!(
            f,
            "\n  Hint: break the cycle with a nullable or defaulted parameter, or a deferred factory"
        )
    }
}

impl std::error::Error for CircularDependencyError {}

/// Failures of the parameter matcher and the callable parser.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("too many parameters provided for {target}: expected at most {expected}, got {given}")]
    TooManyParameters {
        target: String,
        expected: usize,
        given: usize,
    },

    #[error("parameters can be indexed or named, not both")]
    MixedParameters,

    #[error("{callable} is not a callable")]
    InvalidCallable {
        callable: String,
        #[source]
        source: Option<Box<ContainerError>>,
    },

    #[error("cannot resolve ({types}) {owner}::${member}")]
    Unresolvable {
        owner: String,
        member: String,
        types: String,
    },

    #[error("parameter #{position} provided for {target} was not consumed by any slot")]
    UnusedParameter {
        target: String,
        position: usize,
        name: Option<String>,
    },

    #[error("cannot resolve {target}: no resolver accepted it")]
    Unmatched { target: String },
}

/// Invalid entries in the alias table.
#[derive(Debug, thiserror::Error)]
pub enum AliasError {
    #[error("\"{id}\" cannot be aliased to itself")]
    SelfAlias { id: String },

    #[error("alias cycle detected: {}", render_chain(.chain))]
    Cycle { chain: Vec<String> },
}

/// A target whose parameter shape cannot be described.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("class {class} is not defined")]
    UnknownClass { class: String },

    #[error("class {class} is not instantiable")]
    NotInstantiable { class: String },

    #[error("method {class}::{method}() does not exist")]
    UnknownMethod { class: String, method: String },

    #[error("variadic parameter ${name} of {target} must be the last one")]
    VariadicNotLast { target: String, name: String },

    #[error("parameter ${name} is declared twice by {target}")]
    DuplicateParameter { target: String, name: String },
}

/// Invalid changes to a container stack.
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("no container supplied")]
    Empty,

    #[error("cannot stack the same container twice")]
    AlreadyStacked,
}

/// Convenient Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;
