//! The generated proxy object and its interceptor chain.

use crate::bean_type::{BeanType, CastFunction, Interface, MethodFn, ProxyMarker, TypeKey};
use crate::error::{ErrorPtr, InvocationError};
use crate::instance::{BeanInstance, BeanInstancePtr};
use crate::proxy::ProxyStrategy;
use crate::value::Value;
use fxhash::FxHashMap;
use std::any::{Any, TypeId};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Intercepts method invocations on a proxy. Call [MethodInvocation::proceed] to continue down the
/// chain, or return a value directly to skip the target.
pub trait MethodInterceptor: Send + Sync {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> Result<Value, ErrorPtr>;
}

pub type MethodInterceptorPtr = Arc<dyn MethodInterceptor>;

/// A single invocation travelling through an interceptor chain.
pub struct MethodInvocation<'a> {
    target: &'a BeanInstance,
    method: &'a str,
    arguments: Vec<Value>,
    interceptors: &'a [MethodInterceptorPtr],
    index: usize,
}

impl<'a> MethodInvocation<'a> {
    pub fn new(
        target: &'a BeanInstance,
        method: &'a str,
        arguments: Vec<Value>,
        interceptors: &'a [MethodInterceptorPtr],
    ) -> Self {
        Self {
            target,
            method,
            arguments,
            interceptors,
            index: 0,
        }
    }

    #[inline]
    pub fn target(&self) -> &BeanInstance {
        self.target
    }

    #[inline]
    pub fn method(&self) -> &str {
        self.method
    }

    #[inline]
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    #[inline]
    pub fn arguments_mut(&mut self) -> &mut Vec<Value> {
        &mut self.arguments
    }

    /// Invokes the next interceptor, or the target method at the end of the chain.
    pub fn proceed(&mut self) -> Result<Value, ErrorPtr> {
        let interceptors = self.interceptors;
        match interceptors.get(self.index) {
            Some(interceptor) => {
                self.index += 1;
                let result = interceptor.invoke(self);
                self.index -= 1;
                result
            }
            None => self.target.invoke(self.method, self.arguments.clone()),
        }
    }
}

/// A proxy wrapping a target bean.
pub struct AopProxy {
    target: BeanInstance,
    interceptors: Vec<MethodInterceptorPtr>,
    strategy: ProxyStrategy,
    interfaces: Vec<Interface>,
}

impl Debug for AopProxy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AopProxy")
            .field("target", &self.target)
            .field("strategy", &self.strategy)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

impl AopProxy {
    /// Creates a proxy instance along with its generated type.
    pub(crate) fn create(
        target: BeanInstance,
        interceptors: Vec<MethodInterceptorPtr>,
        strategy: ProxyStrategy,
        mut interfaces: Vec<Interface>,
        methods: Vec<String>,
        superclass: Option<BeanType>,
    ) -> BeanInstance {
        let marker = Interface::marker::<ProxyMarker>();
        if !interfaces.contains(&marker) {
            interfaces.push(marker);
        }

        let method_table: FxHashMap<String, MethodFn> = methods
            .into_iter()
            .map(|method| {
                let name = method.clone();
                let function: MethodFn =
                    Arc::new(move |instance: &BeanInstancePtr, arguments: Vec<Value>| {
                        let proxy = instance.downcast_ref::<AopProxy>().ok_or_else(|| {
                            Arc::new(InvocationError::UnexpectedValue {
                                expected: std::any::type_name::<AopProxy>().to_string(),
                                actual: "incompatible instance".to_string(),
                            }) as ErrorPtr
                        })?;
                        proxy.invoke(&name, arguments)
                    });
                (method, function)
            })
            .collect();

        let mut casts: FxHashMap<TypeId, CastFunction> = Default::default();
        casts.insert(
            TypeId::of::<AopProxy>(),
            Arc::new(|instance: BeanInstancePtr| {
                instance
                    .downcast::<AopProxy>()
                    .map(|proxy| Box::new(proxy) as Box<dyn Any>)
            }),
        );

        let bean_type = BeanType::proxy_type(
            TypeKey::of::<AopProxy>(),
            interfaces.clone(),
            superclass,
            method_table,
            casts,
        );

        let proxy = AopProxy {
            target,
            interceptors,
            strategy,
            interfaces,
        };

        BeanInstance::new(Arc::new(proxy), bean_type)
    }

    #[inline]
    pub fn target(&self) -> &BeanInstance {
        &self.target
    }

    #[inline]
    pub fn strategy(&self) -> ProxyStrategy {
        self.strategy
    }

    #[inline]
    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    /// Checks if given method can be called through this proxy.
    pub fn exposes(&self, method: &str) -> bool {
        match self.strategy {
            ProxyStrategy::Interface => self
                .interfaces
                .iter()
                .any(|interface| interface.declares(method)),
            ProxyStrategy::Subclass => self.target.bean_type().has_method(method),
        }
    }

    /// Invokes a method on the target through the interceptor chain.
    pub fn invoke(&self, method: &str, arguments: Vec<Value>) -> Result<Value, ErrorPtr> {
        if !self.exposes(method) {
            let type_name = self.target.bean_type().name().to_string();
            return Err(Arc::new(match self.strategy {
                ProxyStrategy::Interface => InvocationError::NotExposed {
                    type_name,
                    method: method.to_string(),
                },
                ProxyStrategy::Subclass => InvocationError::NoSuchMethod {
                    type_name,
                    method: method.to_string(),
                },
            }));
        }

        MethodInvocation::new(&self.target, method, arguments, &self.interceptors).proceed()
    }
}
