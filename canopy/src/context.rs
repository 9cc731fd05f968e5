//! Application context driving the container through its lifecycle: definition post-processing,
//! registration of post-processor beans, eager singleton creation and finally shutdown.

use crate::config::{ApplicationConfig, CONFIG_BEAN_NAME};
use canopy_di::bean_type::{BeanType, TypeKey};
use canopy_di::error::{BeanError, ErrorPtr};
use canopy_di::factory::{BeanFactory, BeanFactoryBuilder};
use canopy_di::instance::{BeanInstance, BeanProvider, TypedBeanProvider};
use canopy_di::post_processor::{
    BeanDefinitionPostProcessor, BeanDefinitionPostProcessorPtr, BeanPostProcessor, Hooks,
    RegistrationTier,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Clone, Debug)]
pub enum ContextError {
    #[error("Context has already been refreshed")]
    AlreadyRefreshed,
    #[error("Context is not active")]
    NotActive,
    #[error(transparent)]
    Bean(#[from] BeanError),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ContextState {
    Created,
    Active,
    Closed,
}

/// Reports beans created while post-processor beans are still being registered, since not all
/// processors apply to them.
struct PostProcessorChecker {
    pending: Arc<AtomicUsize>,
}

impl BeanPostProcessor for PostProcessorChecker {
    fn name(&self) -> &str {
        "PostProcessorChecker"
    }

    fn hooks(&self) -> Hooks {
        Hooks::AFTER_INITIALIZATION
    }

    fn after_initialization(
        &self,
        instance: &BeanInstance,
        name: &str,
    ) -> Result<Option<BeanInstance>, ErrorPtr> {
        let pending = self.pending.load(Ordering::SeqCst);
        if pending > 0
            && !instance
                .bean_type()
                .is_assignable_to(&TypeKey::of::<dyn BeanPostProcessor>())
        {
            info!(
                bean = name,
                pending,
                "Bean is not eligible for getting processed by all bean post-processors."
            );
        }

        Ok(None)
    }
}

/// Owns a [BeanFactory] configured from an [ApplicationConfig].
pub struct ApplicationContext {
    config: ApplicationConfig,
    factory: BeanFactory,
    definition_post_processors: Mutex<Vec<BeanDefinitionPostProcessorPtr>>,
    state: Mutex<ContextState>,
}

impl ApplicationContext {
    pub fn new(config: ApplicationConfig) -> Self {
        Self::with_factory_builder(config, BeanFactoryBuilder::new())
    }

    /// Creates a context from a preconfigured builder. Factory behavior is always taken from the
    /// config.
    pub fn with_factory_builder(config: ApplicationConfig, builder: BeanFactoryBuilder) -> Self {
        let factory = builder.with_config(config.factory_config()).build();
        Self {
            config,
            factory,
            definition_post_processors: Default::default(),
            state: Mutex::new(ContextState::Created),
        }
    }

    #[inline]
    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    #[inline]
    pub fn factory(&self) -> &BeanFactory {
        &self.factory
    }

    pub fn state(&self) -> ContextState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a definition post-processor run on refresh, in addition to ones defined as beans.
    pub fn add_definition_post_processor(&self, processor: BeanDefinitionPostProcessorPtr) {
        self.definition_post_processors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(processor);
    }

    /// Prepares the container and creates all non-lazy singletons. Created singletons are destroyed
    /// if any step fails.
    pub fn refresh(&self) -> Result<(), ContextError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != ContextState::Created {
            return Err(ContextError::AlreadyRefreshed);
        }

        info!("Refreshing application context...");
        match self.do_refresh() {
            Ok(()) => {
                *state = ContextState::Active;
                Ok(())
            }
            Err(error) => {
                warn!(%error, "Context refresh failed - destroying created singletons.");
                self.factory.destroy_singletons();
                *state = ContextState::Closed;
                Err(error)
            }
        }
    }

    fn do_refresh(&self) -> Result<(), ContextError> {
        self.factory.register_singleton(
            CONFIG_BEAN_NAME,
            BeanInstance::new(
                Arc::new(self.config.clone()),
                BeanType::builder::<ApplicationConfig>().sealed().build(),
            ),
        )?;

        self.invoke_definition_post_processors()?;
        self.register_bean_post_processors()?;

        self.factory.pre_instantiate_singletons()?;
        Ok(())
    }

    fn tier_of(&self, name: &str) -> Result<RegistrationTier, BeanError> {
        Ok(self
            .factory
            .type_of(name)?
            .map(|bean_type| RegistrationTier::of(&bean_type))
            .unwrap_or(RegistrationTier::Unordered))
    }

    /// Instantiates definition post-processor beans not processed yet, optionally limited to a
    /// single tier.
    fn definition_post_processor_beans(
        &self,
        processed: &mut Vec<String>,
        tier: Option<RegistrationTier>,
    ) -> Result<Vec<BeanDefinitionPostProcessorPtr>, BeanError> {
        let mut processors = Vec::new();
        for name in self
            .factory
            .bean_names_for_type(&TypeKey::of::<dyn BeanDefinitionPostProcessor>())
        {
            if processed.contains(&name) {
                continue;
            }

            if let Some(tier) = tier {
                if self.tier_of(&name)? != tier {
                    continue;
                }
            }

            processors.push(
                self.factory
                    .get_bean_as::<dyn BeanDefinitionPostProcessor>(&name)?,
            );
            processed.push(name);
        }

        Ok(processors)
    }

    fn invoke_definition_post_processors(&self) -> Result<(), ContextError> {
        let manual = self
            .definition_post_processors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        debug!(count = manual.len(), "Running added definition post-processors.");
        self.factory.post_process_definitions(&manual)?;

        let mut processed = Vec::new();
        for tier in [RegistrationTier::Priority, RegistrationTier::Ordered] {
            let processors = self.definition_post_processor_beans(&mut processed, Some(tier))?;
            debug!(?tier, count = processors.len(), "Running definition post-processors.");
            self.factory.post_process_definitions(&processors)?;
        }

        // processors may register further processor definitions
        loop {
            let processors = self.definition_post_processor_beans(&mut processed, None)?;
            if processors.is_empty() {
                return Ok(());
            }

            debug!(count = processors.len(), "Running definition post-processors.");
            self.factory.post_process_definitions(&processors)?;
        }
    }

    fn register_bean_post_processors(&self) -> Result<(), ContextError> {
        let names = self
            .factory
            .bean_names_for_type(&TypeKey::of::<dyn BeanPostProcessor>());

        let pending = Arc::new(AtomicUsize::new(names.len()));
        self.factory
            .add_bean_post_processor(Arc::new(PostProcessorChecker {
                pending: pending.clone(),
            }));

        let names = names
            .into_iter()
            .map(|name| self.tier_of(&name).map(|tier| (tier, name)))
            .collect::<Result<Vec<_>, _>>()?;

        for tier in RegistrationTier::ALL {
            let processors = names
                .iter()
                .filter(|(candidate, _)| *candidate == tier)
                .map(|(_, name)| self.factory.get_bean_as::<dyn BeanPostProcessor>(name))
                .collect::<Result<Vec<_>, _>>()?;

            debug!(?tier, count = processors.len(), "Registering bean post-processors.");
            for processor in processors {
                self.factory.add_bean_post_processor(processor);
                pending.fetch_sub(1, Ordering::SeqCst);
            }
        }

        Ok(())
    }

    /// Destroys all singletons. Closing a context which is not active does nothing.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != ContextState::Active {
            return;
        }

        info!("Closing application context...");
        self.factory.destroy_singletons();
        *state = ContextState::Closed;
    }

    /// Returns the bean with given name, failing if the context has not been refreshed yet.
    pub fn active_bean(&self, name: &str) -> Result<BeanInstance, ContextError> {
        if self.state() != ContextState::Active {
            return Err(ContextError::NotActive);
        }

        self.factory.get_bean(name).map_err(ContextError::from)
    }
}

impl Default for ApplicationContext {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

impl BeanProvider for ApplicationContext {
    #[inline]
    fn bean(&self, name: &str) -> Result<BeanInstance, BeanError> {
        self.factory.get_bean(name)
    }

    #[inline]
    fn bean_of_type(&self, type_key: &TypeKey) -> Result<BeanInstance, BeanError> {
        self.factory.get_bean_of_type(type_key)
    }

    #[inline]
    fn beans_of_type(&self, type_key: &TypeKey) -> Result<Vec<(String, BeanInstance)>, BeanError> {
        self.factory.get_beans_of_type(type_key)
    }

    #[inline]
    fn contains_bean(&self, name: &str) -> bool {
        self.factory.contains_bean(name)
    }
}
