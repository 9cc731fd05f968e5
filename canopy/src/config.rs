//! Framework configuration is based on an [ApplicationConfigProvider], which can later be used to
//! retrieve [ApplicationConfig]. [Application](crate::application::Application) uses this config
//! to configure itself and the container, and the config is also registered as a bean, so it can be
//! injected into any other bean.
//!
//! By default, the config is created with opinionated default values, which can then be overwritten
//! by environment variables prefixed with `CANOPY_` or the `canopy.json` file.

use canopy_di::error::ErrorPtr;
use canopy_di::factory::FactoryConfig;
use config::{Config, ConfigError, Environment, File};
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use std::sync::Arc;

const CONFIG_ENV_PREFIX: &str = "CANOPY";

/// Name of the default config file.
pub const CONFIG_FILE: &str = "canopy.json";

/// Name under which the config is registered in the container.
pub const CONFIG_BEAN_NAME: &str = "applicationConfig";

/// Framework configuration which can be provided by an [ApplicationConfigProvider].
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplicationConfig {
    /// Should a default tracing logger be installed in the scope of the application.
    pub install_tracing_logger: bool,
    /// Allow resolving circular references between singletons.
    pub allow_circular_references: bool,
    /// Keep beans injected into others in their raw form, even if they end up wrapped.
    pub allow_raw_injection_despite_wrapping: bool,
    /// Allow replacing definitions registered under an existing name.
    pub allow_definition_overriding: bool,
    /// Resolve otherwise ambiguous dependencies by declaration order.
    pub fallback_to_declaration_order: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        let factory = FactoryConfig::default();
        Self {
            install_tracing_logger: true,
            allow_circular_references: factory.allow_circular_references,
            allow_raw_injection_despite_wrapping: factory.allow_raw_injection_despite_wrapping,
            allow_definition_overriding: factory.allow_definition_overriding,
            fallback_to_declaration_order: factory.fallback_to_declaration_order,
        }
    }
}

impl From<OptionalApplicationConfig> for ApplicationConfig {
    fn from(value: OptionalApplicationConfig) -> Self {
        let default = Self::default();
        Self {
            install_tracing_logger: value
                .install_tracing_logger
                .unwrap_or(default.install_tracing_logger),
            allow_circular_references: value
                .allow_circular_references
                .unwrap_or(default.allow_circular_references),
            allow_raw_injection_despite_wrapping: value
                .allow_raw_injection_despite_wrapping
                .unwrap_or(default.allow_raw_injection_despite_wrapping),
            allow_definition_overriding: value
                .allow_definition_overriding
                .unwrap_or(default.allow_definition_overriding),
            fallback_to_declaration_order: value
                .fallback_to_declaration_order
                .unwrap_or(default.fallback_to_declaration_order),
        }
    }
}

impl ApplicationConfig {
    /// Reads the config from the optional config file and the environment.
    pub fn init_from_environment() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(CONFIG_ENV_PREFIX))
            .build()
            .and_then(|config| config.try_deserialize::<OptionalApplicationConfig>())
            .map(|config| config.into())
    }

    /// Container behavior derived from this config.
    pub fn factory_config(&self) -> FactoryConfig {
        FactoryConfig {
            allow_circular_references: self.allow_circular_references,
            allow_raw_injection_despite_wrapping: self.allow_raw_injection_despite_wrapping,
            allow_definition_overriding: self.allow_definition_overriding,
            fallback_to_declaration_order: self.fallback_to_declaration_order,
        }
    }
}

/// Provider for [ApplicationConfig].
#[cfg_attr(test, automock)]
pub trait ApplicationConfigProvider {
    fn config(&self) -> Result<ApplicationConfig, ErrorPtr>;
}

/// Reads the config from the environment once, and returns the cached result afterwards.
pub struct DefaultApplicationConfigProvider {
    // cached init result
    config: Result<ApplicationConfig, ErrorPtr>,
}

impl DefaultApplicationConfigProvider {
    pub fn new() -> Self {
        Self {
            config: ApplicationConfig::init_from_environment()
                .map_err(|error| Arc::new(error) as ErrorPtr),
        }
    }
}

impl Default for DefaultApplicationConfigProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationConfigProvider for DefaultApplicationConfigProvider {
    fn config(&self) -> Result<ApplicationConfig, ErrorPtr> {
        self.config.clone()
    }
}

#[derive(Deserialize)]
struct OptionalApplicationConfig {
    install_tracing_logger: Option<bool>,
    allow_circular_references: Option<bool>,
    allow_raw_injection_despite_wrapping: Option<bool>,
    allow_definition_overriding: Option<bool>,
    fallback_to_declaration_order: Option<bool>,
}

#[cfg(test)]
mod tests {
    use crate::config::{ApplicationConfig, OptionalApplicationConfig};
    use canopy_di::factory::FactoryConfig;

    #[test]
    fn should_use_defaults_for_missing_values() {
        let config: ApplicationConfig = OptionalApplicationConfig {
            install_tracing_logger: Some(false),
            allow_circular_references: None,
            allow_raw_injection_despite_wrapping: Some(true),
            allow_definition_overriding: None,
            fallback_to_declaration_order: None,
        }
        .into();

        assert!(!config.install_tracing_logger);
        assert!(config.allow_circular_references);
        assert!(config.allow_raw_injection_despite_wrapping);
        assert!(config.allow_definition_overriding);
        assert!(!config.fallback_to_declaration_order);
    }

    #[test]
    fn should_map_to_factory_config() {
        assert_eq!(
            ApplicationConfig::default().factory_config(),
            FactoryConfig::default()
        );

        let config = ApplicationConfig {
            allow_circular_references: false,
            fallback_to_declaration_order: true,
            ..Default::default()
        };
        let factory_config = config.factory_config();
        assert!(!factory_config.allow_circular_references);
        assert!(factory_config.fallback_to_declaration_order);
    }
}
