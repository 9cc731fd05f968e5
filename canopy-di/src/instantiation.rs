//! Creation of raw instances and access to their properties.

use crate::bean_type::{BeanType, PropertyDescriptor, PropertyKind};
use crate::definition_registry::PropertyValues;
use crate::error::{ErrorPtr, InvocationError};
use crate::instance::{BeanInstance, BeanInstancePtr};
use crate::value::Value;
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;

pub type InstantiationStrategyPtr = Box<dyn InstantiationStrategy + Send + Sync>;

/// Strategy for creating raw bean instances, once all arguments are resolved.
#[cfg_attr(test, automock)]
pub trait InstantiationStrategy {
    /// Creates an instance using the type constructor.
    fn instantiate(
        &self,
        bean_type: &BeanType,
        arguments: Vec<Value>,
    ) -> Result<BeanInstancePtr, ErrorPtr>;

    /// Creates an instance by invoking a method on a factory bean.
    fn instantiate_with_factory_method(
        &self,
        factory: &BeanInstance,
        method: &str,
        arguments: Vec<Value>,
    ) -> Result<BeanInstance, ErrorPtr>;
}

/// Default strategy calling the type constructor or the factory method directly.
#[derive(Copy, Clone, Default, Debug)]
pub struct SimpleInstantiationStrategy;

impl InstantiationStrategy for SimpleInstantiationStrategy {
    fn instantiate(
        &self,
        bean_type: &BeanType,
        arguments: Vec<Value>,
    ) -> Result<BeanInstancePtr, ErrorPtr> {
        let constructor = bean_type.constructor().ok_or_else(|| {
            Arc::new(InvocationError::NoSuchMethod {
                type_name: bean_type.name().to_string(),
                method: "constructor".to_string(),
            }) as ErrorPtr
        })?;

        (constructor.function)(arguments)
    }

    fn instantiate_with_factory_method(
        &self,
        factory: &BeanInstance,
        method: &str,
        arguments: Vec<Value>,
    ) -> Result<BeanInstance, ErrorPtr> {
        factory.invoke(method, arguments)?.into_instance()
    }
}

/// Wraps an instance for property access.
#[derive(Clone, Debug)]
pub struct BeanWrapper {
    instance: BeanInstance,
}

impl BeanWrapper {
    pub fn new(instance: BeanInstance) -> Self {
        Self { instance }
    }

    #[inline]
    pub fn instance(&self) -> &BeanInstance {
        &self.instance
    }

    #[inline]
    pub fn into_instance(self) -> BeanInstance {
        self.instance
    }

    #[inline]
    pub fn bean_type(&self) -> &BeanType {
        self.instance.bean_type()
    }

    pub fn is_writable(&self, property: &str) -> bool {
        self.bean_type().property(property).is_some()
    }

    pub fn set_property(&self, property: &str, value: Value) -> Result<(), ErrorPtr> {
        let descriptor = self.bean_type().property(property).ok_or_else(|| {
            Arc::new(InvocationError::NotWritable {
                type_name: self.bean_type().name().to_string(),
                property: property.to_string(),
            }) as ErrorPtr
        })?;

        (descriptor.setter)(self.instance.ptr(), value)
    }

    /// Bean-typed properties without an explicit value - candidates for autowiring.
    pub fn unsatisfied_bean_properties<'a>(
        &'a self,
        values: &'a PropertyValues,
    ) -> impl Iterator<Item = &'a PropertyDescriptor> {
        self.bean_type()
            .properties()
            .iter()
            .filter(move |property| {
                matches!(property.kind, PropertyKind::Bean(_)) && !values.contains(&property.name)
            })
    }

    /// All properties without a value.
    pub fn unset_properties<'a>(
        &'a self,
        values: &'a PropertyValues,
    ) -> impl Iterator<Item = &'a PropertyDescriptor> {
        self.bean_type()
            .properties()
            .iter()
            .filter(move |property| !values.contains(&property.name))
    }
}
