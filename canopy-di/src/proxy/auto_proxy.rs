//! Automatic proxy creation for beans which need interception.

use crate::error::ErrorPtr;
use crate::instance::BeanInstance;
use crate::post_processor::{BeanPostProcessor, Hooks, ProcessorOrder};
use crate::proxy::aop_proxy::MethodInterceptorPtr;
use crate::proxy::{DefaultProxyFactory, ProxyConfig};
use fxhash::FxHashMap;
#[cfg(test)]
use mockall::automock;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Decides whether a bean needs to be wrapped, and with which interceptors.
#[cfg_attr(test, automock)]
pub trait InterceptionAdvisor {
    /// Returns the interceptor chain for given bean, or `None` if it should not be proxied.
    fn interceptors_for(&self, instance: &BeanInstance, name: &str)
        -> Option<Vec<MethodInterceptorPtr>>;
}

pub type InterceptionAdvisorPtr = Box<dyn InterceptionAdvisor + Send + Sync>;

/// Post-processor wrapping beans in proxies when an [InterceptionAdvisor] asks for it. Beans
/// exposed early for circular references are wrapped at that point, and not wrapped again after
/// initialization.
pub struct AutoProxyCreator {
    advisor: InterceptionAdvisorPtr,
    proxy_factory: DefaultProxyFactory,
    optimize: bool,
    proxy_target_class: bool,
    order: ProcessorOrder,
    early_proxy_references: Mutex<FxHashMap<String, BeanInstance>>,
}

impl AutoProxyCreator {
    pub fn new(advisor: InterceptionAdvisorPtr) -> Self {
        Self {
            advisor,
            proxy_factory: Default::default(),
            optimize: false,
            proxy_target_class: false,
            order: ProcessorOrder::Ordered(i32::MAX),
            early_proxy_references: Default::default(),
        }
    }

    pub fn with_proxy_factory(mut self, proxy_factory: DefaultProxyFactory) -> Self {
        self.proxy_factory = proxy_factory;
        self
    }

    pub fn with_proxy_target_class(mut self, proxy_target_class: bool) -> Self {
        self.proxy_target_class = proxy_target_class;
        self
    }

    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn with_order(mut self, order: ProcessorOrder) -> Self {
        self.order = order;
        self
    }

    fn wrap_if_necessary(&self, instance: BeanInstance, name: &str) -> Result<BeanInstance, ErrorPtr> {
        let interceptors = match self.advisor.interceptors_for(&instance, name) {
            Some(interceptors) => interceptors,
            None => return Ok(instance),
        };

        let interfaces = instance
            .bean_type()
            .interfaces()
            .iter()
            .filter(|interface| !interface.is_marker())
            .cloned()
            .collect::<Vec<_>>();

        let config = ProxyConfig {
            optimize: self.optimize,
            proxy_target_class: self.proxy_target_class || interfaces.is_empty(),
            interfaces,
            interceptors,
            ..ProxyConfig::new(instance)
        };

        debug!(bean = name, "Creating automatic proxy.");
        self.proxy_factory
            .create_proxy(&config)
            .map_err(|error| Arc::new(error) as ErrorPtr)
    }

    fn early_references(&self) -> MutexGuard<'_, FxHashMap<String, BeanInstance>> {
        self.early_proxy_references
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl BeanPostProcessor for AutoProxyCreator {
    fn name(&self) -> &str {
        "AutoProxyCreator"
    }

    fn hooks(&self) -> Hooks {
        Hooks::EARLY_REFERENCE | Hooks::AFTER_INITIALIZATION
    }

    fn order(&self) -> ProcessorOrder {
        self.order
    }

    fn early_reference(&self, instance: BeanInstance, name: &str) -> Result<BeanInstance, ErrorPtr> {
        self.early_references()
            .insert(name.to_string(), instance.clone());
        self.wrap_if_necessary(instance, name)
    }

    fn early_reference_discarded(&self, name: &str) {
        self.early_references().remove(name);
    }

    fn after_initialization(
        &self,
        instance: &BeanInstance,
        name: &str,
    ) -> Result<Option<BeanInstance>, ErrorPtr> {
        let early = self.early_references().remove(name);
        if early.map_or(false, |early| early.is_same(instance)) {
            return Ok(None);
        }

        let wrapped = self.wrap_if_necessary(instance.clone(), name)?;
        Ok(if wrapped.is_same(instance) {
            None
        } else {
            Some(wrapped)
        })
    }
}
