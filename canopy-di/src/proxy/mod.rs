//! Proxy substitution. A proxy wraps a target bean and routes dynamic method invocations through a
//! chain of [MethodInterceptor](aop_proxy::MethodInterceptor)s. Two strategies exist:
//!
//! * interface proxies expose only the methods declared by the proxied interfaces,
//! * subclass proxies expose every method of the target type and can be used wherever the target
//!   type is required.
//!
//! [decide_strategy] picks one of them based on the [ProxyConfig], and [DefaultProxyFactory]
//! dispatches to the matching [ProxyBackend].

pub mod aop_proxy;
pub mod auto_proxy;

use crate::bean_type::{BeanType, Interface, ProxyMarker, TypeKey};
use crate::error::ProxyError;
use crate::instance::BeanInstance;
use crate::proxy::aop_proxy::{AopProxy, MethodInterceptorPtr};
use derivative::Derivative;
#[cfg(test)]
use mockall::automock;
use tracing::debug;

/// Settings describing a single proxy to create.
#[derive(Derivative, Clone, Default)]
#[derivative(Debug)]
pub struct ProxyConfig {
    /// Use aggressive optimizations, which implies subclass proxies.
    pub optimize: bool,
    /// Proxy the target type itself rather than its interfaces.
    pub proxy_target_class: bool,
    /// Interfaces to expose.
    pub interfaces: Vec<Interface>,
    /// Type of the target, if known.
    pub target_type: Option<BeanType>,
    pub target: Option<BeanInstance>,
    #[derivative(Debug = "ignore")]
    pub interceptors: Vec<MethodInterceptorPtr>,
}

impl ProxyConfig {
    /// Creates a config for proxying given target.
    pub fn new(target: BeanInstance) -> Self {
        Self {
            target_type: Some(target.bean_type().clone()),
            target: Some(target),
            ..Default::default()
        }
    }

    pub fn with_interface(mut self, interface: Interface) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn with_interceptor(mut self, interceptor: MethodInterceptorPtr) -> Self {
        self.interceptors.push(interceptor);
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

    /// Checks if no interfaces other than the proxy marker have been supplied.
    pub fn has_no_user_interfaces(&self) -> bool {
        match self.interfaces.as_slice() {
            [] => true,
            [interface] => *interface.key() == TypeKey::of::<ProxyMarker>(),
            _ => false,
        }
    }
}

/// Proxy generation strategy.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ProxyStrategy {
    Interface,
    Subclass,
}

/// Decides which proxy strategy to use for given config.
pub fn decide_strategy(config: &ProxyConfig) -> Result<ProxyStrategy, ProxyError> {
    if config.optimize || config.proxy_target_class || config.has_no_user_interfaces() {
        let target_type = config
            .target_type
            .as_ref()
            .ok_or(ProxyError::UnresolvableTargetType)?;

        if target_type.is_interface() || target_type.is_proxy() {
            Ok(ProxyStrategy::Interface)
        } else {
            Ok(ProxyStrategy::Subclass)
        }
    } else {
        Ok(ProxyStrategy::Interface)
    }
}

pub type ProxyBackendPtr = Box<dyn ProxyBackend + Send + Sync>;

/// Proxy generation back-end.
#[cfg_attr(test, automock)]
pub trait ProxyBackend {
    fn create_proxy(&self, config: &ProxyConfig) -> Result<BeanInstance, ProxyError>;
}

fn target(config: &ProxyConfig) -> Result<&BeanInstance, ProxyError> {
    config
        .target
        .as_ref()
        .ok_or(ProxyError::UnresolvableTargetType)
}

/// Creates proxies exposing only interface methods.
#[derive(Copy, Clone, Default, Debug)]
pub struct InterfaceProxyBackend;

impl ProxyBackend for InterfaceProxyBackend {
    fn create_proxy(&self, config: &ProxyConfig) -> Result<BeanInstance, ProxyError> {
        let target = target(config)?;

        let mut interfaces: Vec<Interface> = config
            .interfaces
            .iter()
            .filter(|interface| !interface.is_marker())
            .cloned()
            .collect();
        if interfaces.is_empty() {
            interfaces = config
                .target_type
                .as_ref()
                .unwrap_or_else(|| target.bean_type())
                .interfaces()
                .iter()
                .filter(|interface| !interface.is_marker())
                .cloned()
                .collect();
        }

        if interfaces.is_empty() {
            return Err(ProxyError::NoProxyInterfaces(
                target.bean_type().name().to_string(),
            ));
        }

        let methods = interfaces
            .iter()
            .flat_map(|interface| interface.methods().iter().cloned())
            .collect();

        Ok(AopProxy::create(
            target.clone(),
            config.interceptors.clone(),
            ProxyStrategy::Interface,
            interfaces,
            methods,
            None,
        ))
    }
}

/// Creates proxies extending the target type.
#[derive(Copy, Clone, Default, Debug)]
pub struct SubclassProxyBackend;

impl ProxyBackend for SubclassProxyBackend {
    fn create_proxy(&self, config: &ProxyConfig) -> Result<BeanInstance, ProxyError> {
        let target = target(config)?;
        let target_type = config
            .target_type
            .clone()
            .unwrap_or_else(|| target.bean_type().clone());

        if target_type.is_sealed() {
            return Err(ProxyError::SealedTargetType(target_type.name().to_string()));
        }

        let mut interfaces = target_type.interfaces().to_vec();
        for interface in &config.interfaces {
            if !interfaces.contains(interface) {
                interfaces.push(interface.clone());
            }
        }

        let methods = target.bean_type().method_names().map(str::to_string).collect();

        Ok(AopProxy::create(
            target.clone(),
            config.interceptors.clone(),
            ProxyStrategy::Subclass,
            interfaces,
            methods,
            Some(target_type),
        ))
    }
}

/// Proxy factory selecting the back-end with [decide_strategy].
pub struct DefaultProxyFactory {
    interface_backend: ProxyBackendPtr,
    subclass_backend: ProxyBackendPtr,
}

impl Default for DefaultProxyFactory {
    fn default() -> Self {
        Self::new(
            Box::new(InterfaceProxyBackend),
            Box::new(SubclassProxyBackend),
        )
    }
}

impl DefaultProxyFactory {
    pub fn new(interface_backend: ProxyBackendPtr, subclass_backend: ProxyBackendPtr) -> Self {
        Self {
            interface_backend,
            subclass_backend,
        }
    }

    pub fn create_proxy(&self, config: &ProxyConfig) -> Result<BeanInstance, ProxyError> {
        let strategy = decide_strategy(config)?;
        debug!(
            ?strategy,
            target = ?config.target_type.as_ref().map(BeanType::name),
            "Creating proxy."
        );

        match strategy {
            ProxyStrategy::Interface => self.interface_backend.create_proxy(config),
            ProxyStrategy::Subclass => self.subclass_backend.create_proxy(config),
        }
    }
}
