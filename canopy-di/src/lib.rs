//! Object lifecycle container. Beans are described by [definitions](definition_registry) and
//! created on demand by the [BeanFactory](factory::BeanFactory), which also:
//!
//! * resolves dependencies by name and by type, with primary and qualifier tie-breaks,
//! * breaks circular references between singletons by exposing them early,
//! * runs [post-processors](post_processor) at well-defined points of the creation pipeline,
//! * substitutes beans with [proxies](proxy) running interceptor chains,
//! * destroys singletons in dependency order.
//!
//! Rust has no runtime reflection, so every bean type is described up front by a static
//! [BeanType](bean_type::BeanType) descriptor: its constructor, writable properties, invocable
//! methods, implemented interfaces and lifecycle callbacks.
//!
//! ### Example
//!
//! ```
//! use canopy_di::bean_type::{BeanType, PropertyKind, TypeKey};
//! use canopy_di::definition_registry::BeanDefinition;
//! use canopy_di::factory::BeanFactory;
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct Repository;
//!
//! #[derive(Default)]
//! struct Service {
//!     repository: Mutex<Option<Arc<Repository>>>,
//! }
//!
//! let repository_type = BeanType::builder::<Repository>()
//!     .default_constructor()
//!     .build();
//! let service_type = BeanType::builder::<Service>()
//!     .default_constructor()
//!     .property(
//!         "repository",
//!         PropertyKind::Bean(TypeKey::of::<Repository>()),
//!         |service: &Service, value| {
//!             *service.repository.lock().unwrap() = Some(value.into_bean()?);
//!             Ok(())
//!         },
//!     )
//!     .build();
//!
//! let factory = BeanFactory::default();
//! factory
//!     .register_bean_definition("repository", BeanDefinition::new(repository_type))
//!     .unwrap();
//! factory
//!     .register_bean_definition(
//!         "service",
//!         BeanDefinition::new(service_type).with_reference("repository", "repository"),
//!     )
//!     .unwrap();
//!
//! let service = factory.get_bean_as::<Service>("service").unwrap();
//! assert!(service.repository.lock().unwrap().is_some());
//! ```

pub mod bean_type;
mod creation_tracker;
pub mod definition_registry;
pub mod disposable;
pub mod error;
pub mod factory;
pub mod instance;
pub mod instantiation;
pub mod post_processor;
pub mod proxy;
pub mod resolver;
pub mod scope;
mod singleton_registry;
pub mod value;

pub use error::{BeanError, ErrorPtr};
