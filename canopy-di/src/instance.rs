use crate::bean_type::{BeanType, TypeKey};
use crate::error::{BeanError, ErrorPtr};
use crate::value::Value;
#[cfg(test)]
use mockall::automock;
use std::any::{Any, TypeId};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

pub type BeanInstancePtr = Arc<dyn Any + Send + Sync + 'static>;

/// A bean instance paired with its type descriptor. Identity is the identity of the underlying
/// allocation, so a proxy is never the same instance as its target.
#[derive(Clone)]
pub struct BeanInstance {
    ptr: BeanInstancePtr,
    bean_type: BeanType,
}

impl Debug for BeanInstance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeanInstance")
            .field("type", &self.bean_type.name())
            .field("address", &self.address())
            .finish()
    }
}

impl BeanInstance {
    pub fn new<T: Any + Send + Sync>(value: Arc<T>, bean_type: BeanType) -> Self {
        Self {
            ptr: value,
            bean_type,
        }
    }

    pub fn from_ptr(ptr: BeanInstancePtr, bean_type: BeanType) -> Self {
        Self { ptr, bean_type }
    }

    #[inline]
    pub fn ptr(&self) -> &BeanInstancePtr {
        &self.ptr
    }

    #[inline]
    pub fn bean_type(&self) -> &BeanType {
        &self.bean_type
    }

    #[inline]
    pub fn address(&self) -> usize {
        Arc::as_ptr(&self.ptr) as *const () as usize
    }

    /// Checks if both refer to the very same object.
    #[inline]
    pub fn is_same(&self, other: &BeanInstance) -> bool {
        self.address() == other.address()
    }

    /// Returns the concrete object, if it is of type `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.ptr.clone().downcast::<T>().ok()
    }

    /// Returns a typed view registered by the bean type, e.g. `Arc<dyn Trait>`.
    pub fn cast<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        let cast = self.bean_type.cast(TypeId::of::<T>())?;
        cast(self.ptr.clone())
            .ok()
            .and_then(|view| view.downcast::<Arc<T>>().ok())
            .map(|view| *view)
    }

    /// Dynamically invokes a method. Proxies route the call through their interceptor chain.
    pub fn invoke(&self, method: &str, arguments: Vec<Value>) -> Result<Value, ErrorPtr> {
        self.bean_type.invoke(&self.ptr, method, arguments)
    }
}

/// Generic provider for bean instances. Construction strategies and callbacks receive one to look
/// up their own dependencies.
#[cfg_attr(test, automock)]
pub trait BeanProvider {
    /// Returns the bean with given name or alias, creating it if needed.
    fn bean(&self, name: &str) -> Result<BeanInstance, BeanError>;

    /// Returns the single bean matching given type, applying primary and qualifier tie-breaks.
    fn bean_of_type(&self, type_key: &TypeKey) -> Result<BeanInstance, BeanError>;

    /// Returns all beans matching given type with their names, in declaration order.
    fn beans_of_type(&self, type_key: &TypeKey) -> Result<Vec<(String, BeanInstance)>, BeanError>;

    /// Checks if a definition or a singleton with given name exists.
    fn contains_bean(&self, name: &str) -> bool;
}

fn cast_instance<T: ?Sized + 'static>(
    name: &str,
    instance: &BeanInstance,
) -> Result<Arc<T>, BeanError> {
    instance
        .cast::<T>()
        .ok_or_else(|| BeanError::NotOfRequiredType {
            name: name.to_string(),
            expected: std::any::type_name::<T>().to_string(),
            actual: instance.bean_type().name().to_string(),
        })
}

/// Helper trait for [BeanProvider] providing strongly-typed access.
pub trait TypedBeanProvider {
    /// Typesafe version of [BeanProvider::bean].
    fn bean_typed<T: ?Sized + 'static>(&self, name: &str) -> Result<Arc<T>, BeanError>;

    /// Typesafe version of [BeanProvider::bean_of_type].
    fn primary_bean_typed<T: ?Sized + 'static>(&self) -> Result<Arc<T>, BeanError>;

    /// Tries to get an instance like [TypedBeanProvider::primary_bean_typed] does, but returns
    /// `None` on missing instance.
    fn primary_bean_option<T: ?Sized + 'static>(&self) -> Result<Option<Arc<T>>, BeanError>;

    /// Typesafe version of [BeanProvider::beans_of_type].
    fn beans_typed<T: ?Sized + 'static>(&self) -> Result<Vec<Arc<T>>, BeanError>;
}

impl<P: BeanProvider + ?Sized> TypedBeanProvider for P {
    fn bean_typed<T: ?Sized + 'static>(&self, name: &str) -> Result<Arc<T>, BeanError> {
        let instance = self.bean(name)?;
        cast_instance(name, &instance)
    }

    fn primary_bean_typed<T: ?Sized + 'static>(&self) -> Result<Arc<T>, BeanError> {
        let type_key = TypeKey::of::<T>();
        let instance = self.bean_of_type(&type_key)?;
        cast_instance(type_key.name(), &instance)
    }

    fn primary_bean_option<T: ?Sized + 'static>(&self) -> Result<Option<Arc<T>>, BeanError> {
        match self.primary_bean_typed::<T>() {
            Ok(instance) => Ok(Some(instance)),
            Err(BeanError::NoBeanOfType(_)) => Ok(None),
            Err(error) => Err(error),
        }
    }

    fn beans_typed<T: ?Sized + 'static>(&self) -> Result<Vec<Arc<T>>, BeanError> {
        self.beans_of_type(&TypeKey::of::<T>())?
            .iter()
            .map(|(name, instance)| cast_instance(name, instance))
            .collect()
    }
}
