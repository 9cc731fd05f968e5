//! Static type descriptors used instead of runtime reflection. A [BeanType] tells the container how
//! to construct an instance, which properties can be written, which methods can be invoked by name,
//! which capability [Interface]s the type implements and how to obtain typed views of an instance.
//!
//! Descriptors are usually created once per type with a [BeanTypeBuilder]:
//!
//! ```
//! use canopy_di::bean_type::{BeanType, Interface, PropertyKind};
//! use canopy_di::instance::BeanInstance;
//! use std::sync::{Arc, OnceLock};
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! #[derive(Default)]
//! struct EnglishGreeter {
//!     name: OnceLock<String>,
//! }
//!
//! impl Greeter for EnglishGreeter {
//!     fn greet(&self) -> String {
//!         format!("Hello, {}", self.name.get().map(String::as_str).unwrap_or("world"))
//!     }
//! }
//!
//! let greeter = Interface::of::<dyn Greeter>().with_methods(["greet"]);
//!
//! let bean_type = BeanType::builder::<EnglishGreeter>()
//!     .default_constructor()
//!     .property("name", PropertyKind::Simple, |this: &EnglishGreeter, value| {
//!         let _ = this.name.set(value.into_text()?);
//!         Ok(())
//!     })
//!     .implements(greeter, |this: Arc<EnglishGreeter>| this as Arc<dyn Greeter>)
//!     .method("greet", |this: &EnglishGreeter, _| Ok(this.greet().into()))
//!     .build();
//!
//! assert!(bean_type.is_assignable_to(&canopy_di::bean_type::TypeKey::of::<dyn Greeter>()));
//! ```

use crate::error::{ErrorPtr, InvocationError};
use crate::instance::BeanInstancePtr;
use crate::value::Value;
use derivative::Derivative;
use fxhash::FxHashMap;
use std::any::{type_name, Any, TypeId};
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identity of a Rust type, usable for both concrete types and `dyn Trait` capability types.
#[derive(Copy, Clone, Debug)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for TypeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// A capability interface - usually a `dyn Trait` - along with the names of the methods it
/// declares. Marker interfaces declare no behavior and don't count as user-supplied proxy
/// interfaces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interface {
    key: TypeKey,
    methods: Vec<String>,
    is_marker: bool,
}

impl Interface {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            methods: Vec::new(),
            is_marker: false,
        }
    }

    /// Creates a marker interface.
    pub fn marker<T: ?Sized + 'static>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            methods: Vec::new(),
            is_marker: true,
        }
    }

    pub fn with_methods<I: IntoIterator<Item = S>, S: ToString>(mut self, methods: I) -> Self {
        self.methods
            .extend(methods.into_iter().map(|method| method.to_string()));
        self
    }

    #[inline]
    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    #[inline]
    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    #[inline]
    pub fn is_marker(&self) -> bool {
        self.is_marker
    }

    pub fn declares(&self, method: &str) -> bool {
        self.methods.iter().any(|declared| declared == method)
    }
}

/// Marker interface implemented by every generated proxy.
pub struct ProxyMarker;

/// What a [BeanType] describes.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TypeKind {
    /// A regular, instantiable type.
    Concrete,
    /// An abstract capability type, e.g. the declared type of a factory-produced bean.
    Interface,
    /// A generated proxy type.
    Proxy,
}

/// Kind of value a property expects. Only [PropertyKind::Bean] properties take part in autowiring.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PropertyKind {
    Simple,
    Bean(TypeKey),
}

pub type PropertySetter = Arc<dyn Fn(&BeanInstancePtr, Value) -> Result<(), ErrorPtr> + Send + Sync>;
pub type MethodFn =
    Arc<dyn Fn(&BeanInstancePtr, Vec<Value>) -> Result<Value, ErrorPtr> + Send + Sync>;
pub type ConstructorFn = Arc<dyn Fn(Vec<Value>) -> Result<BeanInstancePtr, ErrorPtr> + Send + Sync>;
pub type LifecycleFn = Arc<dyn Fn(&BeanInstancePtr) -> Result<(), ErrorPtr> + Send + Sync>;

/// Converts an instance into a boxed typed view, e.g. `Box<Arc<dyn Trait>>`. Returns the instance
/// back if the conversion is not possible.
pub type CastFunction =
    Arc<dyn Fn(BeanInstancePtr) -> Result<Box<dyn Any>, BeanInstancePtr> + Send + Sync>;

/// A writable property.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct PropertyDescriptor {
    pub name: String,
    pub kind: PropertyKind,
    #[derivative(Debug = "ignore")]
    pub setter: PropertySetter,
}

/// A constructor parameter. Used when arguments are autowired rather than declared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub kind: PropertyKind,
    pub required: bool,
}

#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct Constructor {
    pub parameters: Vec<ParameterDescriptor>,
    #[derivative(Debug = "ignore")]
    pub function: ConstructorFn,
}

#[derive(Derivative)]
#[derivative(Debug)]
struct BeanTypeInner {
    key: TypeKey,
    kind: TypeKind,
    sealed: bool,
    interfaces: Vec<Interface>,
    superclass: Option<BeanType>,
    constructor: Option<Constructor>,
    properties: Vec<PropertyDescriptor>,
    #[derivative(Debug = "ignore")]
    methods: FxHashMap<String, MethodFn>,
    #[derivative(Debug = "ignore")]
    casts: FxHashMap<TypeId, CastFunction>,
    #[derivative(Debug = "ignore")]
    after_properties_set: Option<LifecycleFn>,
    #[derivative(Debug = "ignore")]
    destroy: Option<LifecycleFn>,
}

/// Static descriptor of a bean type. Cheap to clone.
#[derive(Clone, Debug)]
pub struct BeanType {
    inner: Arc<BeanTypeInner>,
}

impl PartialEq for BeanType {
    fn eq(&self, other: &Self) -> bool {
        self.inner.key == other.inner.key
    }
}

impl Eq for BeanType {}

impl BeanType {
    pub fn builder<T: Any + Send + Sync>() -> BeanTypeBuilder<T> {
        BeanTypeBuilder::new()
    }

    /// Creates a descriptor for an abstract capability type, which cannot be instantiated directly.
    pub fn interface(interface: Interface) -> Self {
        Self {
            inner: Arc::new(BeanTypeInner {
                key: interface.key,
                kind: TypeKind::Interface,
                sealed: false,
                interfaces: vec![interface],
                superclass: None,
                constructor: None,
                properties: Vec::new(),
                methods: Default::default(),
                casts: Default::default(),
                after_properties_set: None,
                destroy: None,
            }),
        }
    }

    #[inline]
    pub fn key(&self) -> &TypeKey {
        &self.inner.key
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.inner.key.name()
    }

    #[inline]
    pub fn kind(&self) -> TypeKind {
        self.inner.kind
    }

    #[inline]
    pub fn is_interface(&self) -> bool {
        self.inner.kind == TypeKind::Interface
    }

    #[inline]
    pub fn is_proxy(&self) -> bool {
        self.inner.kind == TypeKind::Proxy
    }

    /// Sealed types cannot be proxied by subclassing.
    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.inner.sealed
    }

    #[inline]
    pub fn interfaces(&self) -> &[Interface] {
        &self.inner.interfaces
    }

    #[inline]
    pub fn constructor(&self) -> Option<&Constructor> {
        self.inner.constructor.as_ref()
    }

    #[inline]
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.inner.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.inner
            .properties
            .iter()
            .find(|property| property.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&MethodFn> {
        self.inner.methods.get(name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.inner.methods.contains_key(name)
    }

    /// Names of all dynamically invocable methods, in no particular order.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.inner.methods.keys().map(String::as_str)
    }

    /// The proxied type of a subclass proxy.
    #[inline]
    pub fn superclass(&self) -> Option<&BeanType> {
        self.inner.superclass.as_ref()
    }

    #[inline]
    pub fn after_properties_set(&self) -> Option<&LifecycleFn> {
        self.inner.after_properties_set.as_ref()
    }

    #[inline]
    pub fn destroy_callback(&self) -> Option<&LifecycleFn> {
        self.inner.destroy.as_ref()
    }

    /// Checks if instances of this type can be used where `target` is required - either the type
    /// itself, one of its interfaces or, for subclass proxies, the proxied type.
    pub fn is_assignable_to(&self, target: &TypeKey) -> bool {
        self.inner.key == *target
            || self
                .inner
                .interfaces
                .iter()
                .any(|interface| interface.key == *target)
            || self
                .inner
                .superclass
                .as_ref()
                .map(|superclass| superclass.is_assignable_to(target))
                .unwrap_or(false)
    }

    pub(crate) fn cast(&self, target: TypeId) -> Option<&CastFunction> {
        self.inner.casts.get(&target)
    }

    /// Invokes a named method on an instance of this type.
    pub fn invoke(
        &self,
        instance: &BeanInstancePtr,
        method: &str,
        arguments: Vec<Value>,
    ) -> Result<Value, ErrorPtr> {
        let function = self.method(method).ok_or_else(|| {
            Arc::new(InvocationError::NoSuchMethod {
                type_name: self.name().to_string(),
                method: method.to_string(),
            }) as ErrorPtr
        })?;

        function(instance, arguments)
    }

    pub(crate) fn proxy_type(
        key: TypeKey,
        interfaces: Vec<Interface>,
        superclass: Option<BeanType>,
        methods: FxHashMap<String, MethodFn>,
        casts: FxHashMap<TypeId, CastFunction>,
    ) -> Self {
        Self {
            inner: Arc::new(BeanTypeInner {
                key,
                kind: TypeKind::Proxy,
                sealed: true,
                interfaces,
                superclass,
                constructor: None,
                properties: Vec::new(),
                methods,
                casts,
                after_properties_set: None,
                destroy: None,
            }),
        }
    }
}

fn downcast_instance<T: Any + Send + Sync>(instance: &BeanInstancePtr) -> Result<&T, ErrorPtr> {
    instance.downcast_ref::<T>().ok_or_else(|| {
        Arc::new(InvocationError::UnexpectedValue {
            expected: type_name::<T>().to_string(),
            actual: "incompatible instance".to_string(),
        }) as ErrorPtr
    })
}

/// Builder for strongly-typed [BeanType] descriptors.
pub struct BeanTypeBuilder<T> {
    key: TypeKey,
    sealed: bool,
    interfaces: Vec<Interface>,
    constructor: Option<Constructor>,
    properties: Vec<PropertyDescriptor>,
    methods: FxHashMap<String, MethodFn>,
    casts: FxHashMap<TypeId, CastFunction>,
    after_properties_set: Option<LifecycleFn>,
    destroy: Option<LifecycleFn>,
    _type: std::marker::PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> Default for BeanTypeBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Any + Send + Sync> BeanTypeBuilder<T> {
    pub fn new() -> Self {
        let mut casts: FxHashMap<TypeId, CastFunction> = Default::default();
        casts.insert(
            TypeId::of::<T>(),
            Arc::new(|instance: BeanInstancePtr| {
                instance
                    .downcast::<T>()
                    .map(|instance| Box::new(instance) as Box<dyn Any>)
            }),
        );

        Self {
            key: TypeKey::of::<T>(),
            sealed: false,
            interfaces: Vec::new(),
            constructor: None,
            properties: Vec::new(),
            methods: Default::default(),
            casts,
            after_properties_set: None,
            destroy: None,
            _type: Default::default(),
        }
    }

    /// Marks the type as impossible to subclass.
    pub fn sealed(mut self) -> Self {
        self.sealed = true;
        self
    }

    /// Uses `T::default()` as the constructor.
    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor(Vec::new(), |_| Ok(T::default()))
    }

    /// Sets the constructor along with its parameter descriptors. The arguments are passed in
    /// declaration order.
    pub fn constructor<F>(mut self, parameters: Vec<ParameterDescriptor>, constructor: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<T, ErrorPtr> + Send + Sync + 'static,
    {
        self.constructor = Some(Constructor {
            parameters,
            function: Arc::new(move |arguments| {
                constructor(arguments).map(|instance| Arc::new(instance) as BeanInstancePtr)
            }),
        });
        self
    }

    /// Adds a writable property.
    pub fn property<F>(mut self, name: &str, kind: PropertyKind, setter: F) -> Self
    where
        F: Fn(&T, Value) -> Result<(), ErrorPtr> + Send + Sync + 'static,
    {
        self.properties.push(PropertyDescriptor {
            name: name.to_string(),
            kind,
            setter: Arc::new(move |instance, value| setter(downcast_instance::<T>(instance)?, value)),
        });
        self
    }

    /// Adds a method which can be invoked by name, e.g. as an init/destroy method, a factory method
    /// or through a proxy.
    pub fn method<F>(mut self, name: &str, method: F) -> Self
    where
        F: Fn(&T, Vec<Value>) -> Result<Value, ErrorPtr> + Send + Sync + 'static,
    {
        self.methods.insert(
            name.to_string(),
            Arc::new(move |instance, arguments| {
                method(downcast_instance::<T>(instance)?, arguments)
            }),
        );
        self
    }

    /// Declares an implemented capability interface, along with a conversion to its typed view.
    pub fn implements<I: ?Sized + 'static>(
        mut self,
        interface: Interface,
        cast: fn(Arc<T>) -> Arc<I>,
    ) -> Self {
        self.casts.insert(
            TypeId::of::<I>(),
            Arc::new(move |instance: BeanInstancePtr| {
                instance
                    .downcast::<T>()
                    .map(|instance| Box::new(cast(instance)) as Box<dyn Any>)
            }),
        );
        self.interfaces.push(interface);
        self
    }

    /// Declares a marker interface, which has no typed view.
    pub fn marked(mut self, interface: Interface) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Registers a callback run after all properties have been set.
    pub fn after_properties_set<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T) -> Result<(), ErrorPtr> + Send + Sync + 'static,
    {
        self.after_properties_set = Some(Arc::new(move |instance| {
            callback(downcast_instance::<T>(instance)?)
        }));
        self
    }

    /// Registers a callback run when the bean is destroyed.
    pub fn on_destroy<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T) -> Result<(), ErrorPtr> + Send + Sync + 'static,
    {
        self.destroy = Some(Arc::new(move |instance| {
            callback(downcast_instance::<T>(instance)?)
        }));
        self
    }

    pub fn build(self) -> BeanType {
        BeanType {
            inner: Arc::new(BeanTypeInner {
                key: self.key,
                kind: TypeKind::Concrete,
                sealed: self.sealed,
                interfaces: self.interfaces,
                superclass: None,
                constructor: self.constructor,
                properties: self.properties,
                methods: self.methods,
                casts: self.casts,
                after_properties_set: self.after_properties_set,
                destroy: self.destroy,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::bean_type::{BeanType, Interface, PropertyKind, TypeKey, TypeKind};
    use crate::instance::BeanInstancePtr;
    use crate::value::Value;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    trait Counter: Send + Sync {
        fn count(&self) -> i64;
    }

    #[derive(Default)]
    struct TestCounter {
        value: AtomicI64,
    }

    impl Counter for TestCounter {
        fn count(&self) -> i64 {
            self.value.load(Ordering::SeqCst)
        }
    }

    fn create_type() -> BeanType {
        BeanType::builder::<TestCounter>()
            .default_constructor()
            .property("value", PropertyKind::Simple, |this: &TestCounter, value| {
                this.value.store(value.into_int()?, Ordering::SeqCst);
                Ok(())
            })
            .method("count", |this: &TestCounter, _| Ok(Value::Int(this.count())))
            .implements(
                Interface::of::<dyn Counter>().with_methods(["count"]),
                |this: Arc<TestCounter>| this as Arc<dyn Counter>,
            )
            .build()
    }

    #[test]
    fn should_describe_concrete_type() {
        let bean_type = create_type();

        assert_eq!(bean_type.kind(), TypeKind::Concrete);
        assert!(bean_type.is_assignable_to(&TypeKey::of::<TestCounter>()));
        assert!(bean_type.is_assignable_to(&TypeKey::of::<dyn Counter>()));
        assert!(!bean_type.is_assignable_to(&TypeKey::of::<u8>()));
        assert!(bean_type.property("value").is_some());
        assert!(bean_type.has_method("count"));
    }

    #[test]
    fn should_construct_configure_and_invoke() {
        let bean_type = create_type();
        let constructor = bean_type.constructor().unwrap();
        let instance: BeanInstancePtr = (constructor.function)(Vec::new()).unwrap();

        (bean_type.property("value").unwrap().setter)(&instance, Value::Int(5)).unwrap();

        assert_eq!(
            bean_type.invoke(&instance, "count", Vec::new()).unwrap().into_int().unwrap(),
            5
        );
        assert!(bean_type.invoke(&instance, "missing", Vec::new()).is_err());
    }

    #[test]
    fn should_describe_interface_type() {
        let bean_type = BeanType::interface(Interface::of::<dyn Counter>());

        assert!(bean_type.is_interface());
        assert!(bean_type.constructor().is_none());
        assert!(bean_type.is_assignable_to(&TypeKey::of::<dyn Counter>()));
    }
}
