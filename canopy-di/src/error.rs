use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use thiserror::Error;

/// Type-erased error returned by user-supplied callbacks: constructors, setters, lifecycle methods,
/// interceptors and post-processors.
pub type ErrorPtr = Arc<dyn StdError + Send + Sync>;

/// Phase of the creation pipeline in which a failure happened.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum CreationPhase {
    BeforeInstantiation,
    Instantiation,
    MergeDefinition,
    Population,
    Initialization,
    DestructionRegistration,
}

impl Display for CreationPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let phase = match self {
            CreationPhase::BeforeInstantiation => "before instantiation post-processing",
            CreationPhase::Instantiation => "instantiation",
            CreationPhase::MergeDefinition => "post-processing of merged definition",
            CreationPhase::Population => "property population",
            CreationPhase::Initialization => "initialization",
            CreationPhase::DestructionRegistration => "destruction callback registration",
        };
        f.write_str(phase)
    }
}

/// Errors related to creating and managing beans.
#[derive(Error, Clone, Debug)]
pub enum BeanError {
    #[error("Invalid definition for bean '{name}': {reason}")]
    Definition { name: String, reason: String },
    #[error("No bean named '{0}' is defined")]
    NoSuchBean(String),
    #[error("No bean of type '{0}' is defined")]
    NoBeanOfType(String),
    #[error(
        "Expected a single matching bean of type '{type_name}' but found {}: {}",
        candidates.len(),
        candidates.join(", ")
    )]
    NoUniqueBean {
        type_name: String,
        candidates: Vec<String>,
    },
    #[error(
        "Unsatisfied dependency expressed through '{injection_point}' of bean '{bean_name}': {source}"
    )]
    UnsatisfiedDependency {
        bean_name: String,
        injection_point: String,
        source: Box<BeanError>,
    },
    #[error("Error creating bean '{name}': {reason}")]
    CircularReference { name: String, reason: String },
    #[error("Error creating bean '{name}' during {phase}: {source}")]
    Creation {
        name: String,
        phase: CreationPhase,
        source: ErrorPtr,
    },
    #[error("Post-processor '{processor}' failed: {source}")]
    PostProcessor { processor: String, source: ErrorPtr },
    #[error("Bean '{name}' is expected to be of type '{expected}' but is of type '{actual}'")]
    NotOfRequiredType {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("Creation of bean '{0}' is not allowed while singletons are being destroyed")]
    CreationNotAllowed(String),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
    #[error(transparent)]
    Registry(#[from] BeanDefinitionRegistryError),
}

impl BeanError {
    /// Returns the bean name this error is already attributed to, if any. Attributed errors are
    /// propagated through outer constructions unchanged.
    pub fn attributed_bean(&self) -> Option<&str> {
        match self {
            BeanError::Definition { name, .. }
            | BeanError::CircularReference { name, .. }
            | BeanError::Creation { name, .. } => Some(name),
            BeanError::UnsatisfiedDependency { bean_name, .. } => Some(bean_name),
            _ => None,
        }
    }

    /// Follows nested creation failures down to the innermost cause.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(source) = current.source() {
            current = source;
        }
        current
    }

    pub(crate) fn wrap(self, name: &str, phase: CreationPhase) -> Self {
        if self.attributed_bean().is_some() {
            self
        } else {
            BeanError::Creation {
                name: name.to_string(),
                phase,
                source: Arc::new(self),
            }
        }
    }

    pub(crate) fn creation(name: &str, phase: CreationPhase, source: ErrorPtr) -> Self {
        match source.downcast_ref::<BeanError>() {
            Some(error) => error.clone().wrap(name, phase),
            None => BeanError::Creation {
                name: name.to_string(),
                phase,
                source,
            },
        }
    }

    pub(crate) fn definition<T: ToString>(name: &str, reason: T) -> Self {
        BeanError::Definition {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Error related to definition registries.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum BeanDefinitionRegistryError {
    #[error("Attempted to register a duplicated bean definition with name: {0}")]
    DuplicateBeanName(String),
    #[error("Cannot find bean definition: {0}")]
    NoSuchDefinition(String),
    #[error("Missing parent definition '{parent}' for bean: {name}")]
    MissingParent { name: String, parent: String },
    #[error("Definition '{0}' is its own ancestor")]
    ParentCycle(String),
    #[error("Cannot register alias '{alias}' for '{name}': it is already in use for '{existing}'")]
    DuplicateAlias {
        alias: String,
        name: String,
        existing: String,
    },
    #[error("Cannot register alias '{alias}' for '{name}': circular alias chain")]
    AliasCycle { alias: String, name: String },
    #[error("Bean definition registry is frozen, cannot modify: {0}")]
    Frozen(String),
}

/// Errors produced by the proxy decision procedure and proxy back-ends.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum ProxyError {
    #[error("Cannot determine target type: either an interface or a target type is required for proxy creation")]
    UnresolvableTargetType,
    #[error("Cannot create a subclass proxy for sealed type: {0}")]
    SealedTargetType(String),
    #[error("Cannot create an interface proxy for '{0}' without any interfaces")]
    NoProxyInterfaces(String),
}

/// Errors produced when dynamically invoking methods on beans and proxies.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum InvocationError {
    #[error("No method '{method}' on type: {type_name}")]
    NoSuchMethod { type_name: String, method: String },
    #[error("Property '{property}' is not writable on type: {type_name}")]
    NotWritable { type_name: String, property: String },
    #[error("Method '{method}' is not exposed by the interface proxy for: {type_name}")]
    NotExposed { type_name: String, method: String },
    #[error("Unexpected value: expected {expected}, got {actual}")]
    UnexpectedValue { expected: String, actual: String },
}
