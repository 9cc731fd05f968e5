//! Core functionality for creating beans. The [BeanFactory] uses definitions from a
//! [BeanDefinitionRegistry], runs them through the creation pipeline with registered
//! [post-processors](crate::post_processor) and stores shared instances for reuse.
//!
//! Creating a bean goes through the following phases:
//!
//! 1. before-instantiation post-processors may provide their own instance,
//! 2. a raw instance is created with an instance supplier, a factory method or the type
//!    constructor,
//! 3. merge-definition post-processors see the definition (once per definition),
//! 4. singletons are exposed early to resolve circular references,
//! 5. properties are populated,
//! 6. the bean is initialized, which is where proxies usually get substituted,
//! 7. the early reference is reconciled with the final instance,
//! 8. the bean is published and registered for destruction.

use crate::bean_type::{BeanType, PropertyKind, TypeKey};
use crate::creation_tracker::CreationTracker;
use crate::definition_registry::{
    merge_bean_definition, AutowireMode, BeanDefinition, BeanDefinitionRegistry,
    DefaultBeanDefinitionRegistry, PropertyValues, ValueDefinition,
};
use crate::disposable::DisposableBeanAdapter;
use crate::error::{
    BeanDefinitionRegistryError, BeanError, CreationPhase, ErrorPtr, InvocationError,
};
use crate::instance::{BeanInstance, BeanProvider, TypedBeanProvider};
use crate::instantiation::{
    BeanWrapper, InstantiationStrategyPtr, SimpleInstantiationStrategy,
};
use crate::post_processor::{
    sort_by_order, BeanDefinitionPostProcessorPtr, BeanPostProcessorPtr, Hooks,
    PostProcessorPipeline,
};
use crate::resolver::DependencyDescriptor;
use crate::scope::{Scope, ScopePtr, ThreadScope, PROTOTYPE, SINGLETON, THREAD};
use crate::singleton_registry::{SingletonLookup, SingletonRegistry};
use crate::value::Value;
use fxhash::FxHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace, warn};

pub type BeanDefinitionRegistryPtr = Box<dyn BeanDefinitionRegistry + Send + Sync>;

pub type TypeRegistry = FxHashMap<String, BeanType>;

/// Behavior switches of a [BeanFactory].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct FactoryConfig {
    /// Expose singletons early, so circular references between them can be resolved.
    pub allow_circular_references: bool,
    /// Keep a bean which has been injected into others in its raw form and then wrapped, instead of
    /// failing.
    pub allow_raw_injection_despite_wrapping: bool,
    /// Registering a definition under an existing name replaces it.
    pub allow_definition_overriding: bool,
    /// Pick the first declared candidate when by-type resolution is otherwise ambiguous.
    pub fallback_to_declaration_order: bool,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            allow_circular_references: true,
            allow_raw_injection_despite_wrapping: false,
            allow_definition_overriding: true,
            fallback_to_declaration_order: false,
        }
    }
}

/// Builder for [BeanFactory] with sensible defaults, for easy construction.
#[derive(Default)]
pub struct BeanFactoryBuilder {
    config: FactoryConfig,
    definition_registry: Option<BeanDefinitionRegistryPtr>,
    instantiation_strategy: Option<InstantiationStrategyPtr>,
    scopes: FxHashMap<String, ScopePtr>,
    types: TypeRegistry,
    post_processors: Vec<BeanPostProcessorPtr>,
}

impl BeanFactoryBuilder {
    /// Creates a new builder with a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: FactoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets a custom [BeanDefinitionRegistry]. By default, a [DefaultBeanDefinitionRegistry]
    /// honoring [FactoryConfig::allow_definition_overriding] is used.
    pub fn with_definition_registry(mut self, definition_registry: BeanDefinitionRegistryPtr) -> Self {
        self.definition_registry = Some(definition_registry);
        self
    }

    pub fn with_instantiation_strategy(mut self, strategy: InstantiationStrategyPtr) -> Self {
        self.instantiation_strategy = Some(strategy);
        self
    }

    /// Adds a custom scope.
    pub fn with_scope<T: ToString>(mut self, name: T, scope: ScopePtr) -> Self {
        self.scopes.insert(name.to_string(), scope);
        self
    }

    /// Registers a type which definitions can refer to by name.
    pub fn with_type<T: ToString>(mut self, name: T, bean_type: BeanType) -> Self {
        self.types.insert(name.to_string(), bean_type);
        self
    }

    pub fn with_post_processor(mut self, processor: BeanPostProcessorPtr) -> Self {
        self.post_processors.push(processor);
        self
    }

    /// Builds resulting [BeanFactory].
    pub fn build(self) -> BeanFactory {
        let config = self.config;
        let definition_registry = self.definition_registry.unwrap_or_else(|| {
            Box::new(DefaultBeanDefinitionRegistry::new(
                config.allow_definition_overriding,
            ))
        });

        let mut scopes: FxHashMap<String, Arc<dyn Scope + Send + Sync>> =
            [(THREAD.to_string(), Arc::new(ThreadScope::default()) as Arc<dyn Scope + Send + Sync>)]
                .into_iter()
                .collect();
        scopes.extend(
            self.scopes
                .into_iter()
                .map(|(name, scope)| (name, Arc::from(scope))),
        );

        let mut pipeline = PostProcessorPipeline::default();
        for processor in self.post_processors {
            pipeline.add(processor);
        }

        BeanFactory {
            config,
            definitions: RwLock::new(definition_registry),
            merged: Default::default(),
            types: RwLock::new(self.types),
            scopes: RwLock::new(scopes),
            pipeline: RwLock::new(Arc::new(pipeline)),
            instantiation_strategy: self
                .instantiation_strategy
                .unwrap_or_else(|| Box::new(SimpleInstantiationStrategy)),
            singletons: Default::default(),
            tracker: Default::default(),
            manual_singletons: Default::default(),
            frozen: AtomicBool::new(false),
        }
    }
}

/// Definition merged with its parents, along with per-definition creation state.
pub(crate) struct MergedBeanDefinition {
    definition: RwLock<BeanDefinition>,
    bean_type: Option<BeanType>,
    post_processed: Mutex<bool>,
    before_instantiation_resolved: Mutex<Option<bool>>,
}

impl MergedBeanDefinition {
    fn new(definition: BeanDefinition, bean_type: Option<BeanType>) -> Self {
        Self {
            definition: RwLock::new(definition),
            bean_type,
            post_processed: Mutex::new(false),
            before_instantiation_resolved: Mutex::new(None),
        }
    }

    /// Snapshot of the current definition.
    pub(crate) fn definition(&self) -> BeanDefinition {
        self.definition
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn phase(name: &str, phase: CreationPhase) -> impl FnOnce(BeanError) -> BeanError + '_ {
    move |error| error.wrap(name, phase)
}

fn callback<'a>(name: &'a str, phase: CreationPhase) -> impl FnOnce(ErrorPtr) -> BeanError + 'a {
    move |error| BeanError::creation(name, phase, error)
}

fn prototype_in_creation(name: &str) -> BeanError {
    BeanError::CircularReference {
        name: name.to_string(),
        reason: "Requested prototype bean is currently in creation: Is there an unresolvable circular reference?".to_string(),
    }
}

fn unsatisfied(bean_name: &str, injection_point: String, error: BeanError) -> BeanError {
    if error.attributed_bean().is_some() {
        error
    } else {
        BeanError::UnsatisfiedDependency {
            bean_name: bean_name.to_string(),
            injection_point,
            source: Box::new(error),
        }
    }
}

/// Generic factory for beans. Uses definitions from the [BeanDefinitionRegistry] and
/// [scopes](crate::scope) to create and store instances for reuse. Shareable between threads;
/// singleton creation is serialized, so concurrent first requests for the same bean observe a
/// single, fully initialized instance.
pub struct BeanFactory {
    pub(crate) config: FactoryConfig,
    definitions: RwLock<BeanDefinitionRegistryPtr>,
    merged: RwLock<FxHashMap<String, Arc<MergedBeanDefinition>>>,
    types: RwLock<TypeRegistry>,
    scopes: RwLock<FxHashMap<String, Arc<dyn Scope + Send + Sync>>>,
    pipeline: RwLock<Arc<PostProcessorPipeline>>,
    instantiation_strategy: InstantiationStrategyPtr,
    pub(crate) singletons: SingletonRegistry,
    tracker: CreationTracker,
    manual_singletons: Mutex<Vec<String>>,
    frozen: AtomicBool,
}

impl Default for BeanFactory {
    fn default() -> Self {
        BeanFactoryBuilder::new().build()
    }
}

impl BeanFactory {
    #[inline]
    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    fn definitions(&self) -> RwLockReadGuard<'_, BeanDefinitionRegistryPtr> {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn definitions_mut(&self) -> RwLockWriteGuard<'_, BeanDefinitionRegistryPtr> {
        self.definitions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn pipeline(&self) -> Arc<PostProcessorPipeline> {
        self.pipeline
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn merged_mut(&self) -> RwLockWriteGuard<'_, FxHashMap<String, Arc<MergedBeanDefinition>>> {
        self.merged.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops the merged definition of given bean and of all definitions inheriting from it.
    fn reset_merged_definition(&self, name: &str) {
        let affected = {
            let definitions = self.definitions();
            let names = definitions.bean_definition_names();
            let mut affected = vec![name.to_string()];
            let mut index = 0;
            while index < affected.len() {
                for child in &names {
                    let inherits = definitions
                        .bean_definition(child)
                        .and_then(|definition| definition.parent.as_deref())
                        .map_or(false, |parent| {
                            definitions.canonical_name(parent) == affected[index]
                        });
                    if inherits && !affected.contains(child) {
                        affected.push(child.clone());
                    }
                }
                index += 1;
            }
            affected
        };

        let mut merged = self.merged_mut();
        for name in &affected {
            merged.remove(name);
        }
    }

    /// Drops merged definitions which have not been used for creation yet.
    fn clear_unused_merged_definitions(&self) {
        self.merged_mut().retain(|_, merged| {
            *merged
                .post_processed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
        });
    }

    // configuration

    /// Registers a new definition. Once the configuration is frozen, existing definitions can no
    /// longer be replaced.
    pub fn register_bean_definition(
        &self,
        name: &str,
        definition: BeanDefinition,
    ) -> Result<(), BeanError> {
        let mut definitions = self.definitions_mut();
        if self.is_configuration_frozen() && definitions.contains_bean_definition(name) {
            return Err(BeanDefinitionRegistryError::Frozen(name.to_string()).into());
        }

        debug!(bean = name, "Registering bean definition.");
        definitions.register_bean_definition(name, definition)?;
        drop(definitions);

        self.reset_merged_definition(name);
        Ok(())
    }

    pub fn remove_bean_definition(&self, name: &str) -> Result<BeanDefinition, BeanError> {
        if self.is_configuration_frozen() {
            return Err(BeanDefinitionRegistryError::Frozen(name.to_string()).into());
        }

        let name = self.canonical_name(name);
        let definition = self.definitions_mut().remove_bean_definition(&name)?;
        self.reset_merged_definition(&name);
        Ok(definition)
    }

    pub fn register_alias(&self, name: &str, alias: &str) -> Result<(), BeanError> {
        self.definitions_mut()
            .register_alias(name, alias)
            .map_err(BeanError::from)
    }

    /// Returns all aliases of given bean.
    pub fn aliases(&self, name: &str) -> Vec<String> {
        let definitions = self.definitions();
        definitions.aliases(&definitions.canonical_name(name))
    }

    /// Returns all definition names in declaration order.
    pub fn bean_definition_names(&self) -> Vec<String> {
        self.definitions().bean_definition_names()
    }

    pub fn contains_bean_definition(&self, name: &str) -> bool {
        let definitions = self.definitions();
        definitions.contains_bean_definition(&definitions.canonical_name(name))
    }

    /// Returns the definition of given bean, merged with its parents.
    pub fn merged_bean_definition(&self, name: &str) -> Result<BeanDefinition, BeanError> {
        self.merged_definition(&self.canonical_name(name))
            .map(|merged| merged.definition())
    }

    /// Runs definition post-processors over the registry, in processor order.
    pub fn post_process_definitions(
        &self,
        processors: &[BeanDefinitionPostProcessorPtr],
    ) -> Result<(), BeanError> {
        let mut processors = processors.to_vec();
        sort_by_order(&mut processors, |processor| processor.order());

        {
            let mut definitions = self.definitions_mut();
            for processor in &processors {
                trace!(processor = processor.name(), "Post-processing definitions.");
                processor
                    .post_process_definitions(definitions.as_mut())
                    .map_err(|source| BeanError::PostProcessor {
                        processor: processor.name().to_string(),
                        source,
                    })?;
            }
        }

        self.clear_unused_merged_definitions();
        Ok(())
    }

    /// Registers a type which definitions can refer to by name.
    pub fn register_type<T: ToString>(&self, name: T, bean_type: BeanType) {
        let name = name.to_string();
        self.types
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), bean_type);
        self.merged_mut().retain(|_, merged| {
            merged
                .definition
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .type_name
                .as_deref()
                != Some(name.as_str())
        });
    }

    /// Registers a custom scope. Built-in singleton and prototype scopes cannot be replaced.
    pub fn register_scope(&self, name: &str, scope: ScopePtr) -> Result<(), BeanError> {
        if name == SINGLETON || name == PROTOTYPE {
            return Err(BeanError::definition(
                name,
                "Cannot replace the built-in singleton and prototype scopes",
            ));
        }

        self.scopes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Arc::from(scope));
        Ok(())
    }

    pub fn registered_scope_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .scopes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Adds a post-processor which will be applied to beans created from now on.
    pub fn add_bean_post_processor(&self, processor: BeanPostProcessorPtr) {
        let mut pipeline = self.pipeline.write().unwrap_or_else(PoisonError::into_inner);
        let mut updated = PostProcessorPipeline::clone(&pipeline);
        updated.add(processor);
        *pipeline = Arc::new(updated);
    }

    pub fn bean_post_processor_count(&self) -> usize {
        self.pipeline().len()
    }

    /// Registers an existing object as a fully initialized singleton.
    pub fn register_singleton(&self, name: &str, instance: BeanInstance) -> Result<(), BeanError> {
        let _lock = self.singletons.creation_lock().lock();
        if self.singletons.contains(name) || self.singletons.is_in_creation(name) {
            return Err(BeanError::definition(
                name,
                "There is already a singleton bound under this name",
            ));
        }

        self.singletons.publish(name, instance);
        self.manual_singletons
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(name.to_string());
        Ok(())
    }

    /// Disallows replacing existing definitions.
    pub fn freeze_configuration(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_configuration_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    // queries

    pub(crate) fn canonical_name(&self, name: &str) -> String {
        self.definitions().canonical_name(name)
    }

    pub(crate) fn merged_definition(
        &self,
        name: &str,
    ) -> Result<Arc<MergedBeanDefinition>, BeanError> {
        if let Some(merged) = self
            .merged
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(merged.clone());
        }

        let definition = merge_bean_definition(self.definitions().as_ref(), name)?;
        let bean_type = self.resolve_bean_type(name, &definition)?;
        let merged = Arc::new(MergedBeanDefinition::new(definition, bean_type));

        Ok(self
            .merged
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert(merged)
            .clone())
    }

    fn resolve_bean_type(
        &self,
        name: &str,
        definition: &BeanDefinition,
    ) -> Result<Option<BeanType>, BeanError> {
        if let Some(bean_type) = &definition.bean_type {
            return Ok(Some(bean_type.clone()));
        }

        if let Some(type_name) = &definition.type_name {
            return self
                .types
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(type_name)
                .cloned()
                .map(Some)
                .ok_or_else(|| {
                    BeanError::definition(name, format!("Cannot resolve type '{type_name}'"))
                });
        }

        if definition.factory_method.is_some() {
            Ok(None)
        } else {
            Err(BeanError::definition(name, "No bean type declared"))
        }
    }

    /// Checks if a definition or a manually registered singleton with given name exists.
    pub fn contains_bean(&self, name: &str) -> bool {
        let name = self.canonical_name(name);
        self.singletons.contains(&name) || self.definitions().contains_bean_definition(&name)
    }

    pub fn is_singleton(&self, name: &str) -> Result<bool, BeanError> {
        let name = self.canonical_name(name);
        if self.singletons.contains(&name) {
            return Ok(true);
        }
        self.merged_definition(&name)
            .map(|merged| merged.definition().is_singleton())
    }

    pub fn is_prototype(&self, name: &str) -> Result<bool, BeanError> {
        let name = self.canonical_name(name);
        if self.is_manual_singleton(&name) {
            return Ok(false);
        }
        self.merged_definition(&name)
            .map(|merged| merged.definition().is_prototype())
    }

    /// Returns the type of given bean - the actual one for created singletons, the declared one
    /// otherwise.
    pub fn type_of(&self, name: &str) -> Result<Option<BeanType>, BeanError> {
        let name = self.canonical_name(name);
        if let Some(instance) = self.singletons.published(&name) {
            return Ok(Some(instance.bean_type().clone()));
        }
        self.merged_definition(&name)
            .map(|merged| merged.bean_type.clone())
    }

    fn is_manual_singleton(&self, name: &str) -> bool {
        self.manual_singletons
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|existing| existing == name)
    }

    pub(crate) fn is_primary(&self, name: &str) -> bool {
        self.merged_definition(name)
            .map(|merged| merged.definition().is_primary)
            .unwrap_or(false)
    }

    /// Names of beans matching given type, in declaration order, followed by manually registered
    /// singletons. Created singletons are matched by their actual type.
    pub fn bean_names_for_type(&self, type_key: &TypeKey) -> Vec<String> {
        let mut names = Vec::new();
        for name in self.bean_definition_names() {
            let merged = match self.merged_definition(&name) {
                Ok(merged) => merged,
                Err(error) => {
                    trace!(bean = %name, %error, "Ignoring unresolvable definition in type matching.");
                    continue;
                }
            };

            if merged.definition().is_abstract {
                continue;
            }

            let matches = match self.singletons.published(&name) {
                Some(instance) => instance.bean_type().is_assignable_to(type_key),
                None => merged
                    .bean_type
                    .as_ref()
                    .map(|bean_type| bean_type.is_assignable_to(type_key))
                    .unwrap_or(false),
            };
            if matches {
                names.push(name);
            }
        }

        let manual_singletons = self
            .manual_singletons
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for name in manual_singletons {
            if names.contains(&name) {
                continue;
            }
            if let Some(instance) = self.singletons.published(&name) {
                if instance.bean_type().is_assignable_to(type_key) {
                    names.push(name);
                }
            }
        }

        names
    }

    /// Names of published singletons, in publication order.
    pub fn singleton_names(&self) -> Vec<String> {
        self.singletons.names()
    }

    /// Names of beans which depend on given bean.
    pub fn dependent_beans(&self, name: &str) -> Vec<String> {
        self.singletons.dependents(&self.canonical_name(name))
    }

    /// Names of beans given bean depends on.
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.singletons.dependencies_of(&self.canonical_name(name))
    }

    // retrieval

    /// Returns the bean with given name or alias, creating it if needed.
    pub fn get_bean(&self, name: &str) -> Result<BeanInstance, BeanError> {
        let name = self.canonical_name(name);

        if let Some(instance) = self.singletons.published(&name) {
            self.register_currently_created_dependent(&name);
            return Ok(instance);
        }

        if self.singletons.creation_lock().is_held_by_current_thread()
            && self.singletons.is_in_creation(&name)
        {
            let instance = match self
                .singletons
                .lookup(&name, self.config.allow_circular_references)?
            {
                SingletonLookup::Early(instance) | SingletonLookup::Published(instance) => {
                    instance
                }
                SingletonLookup::InCreation | SingletonLookup::Absent => {
                    return Err(BeanError::CircularReference {
                        name,
                        reason: "Requested bean is currently in creation: Is there an unresolvable circular reference?".to_string(),
                    })
                }
            };

            trace!(bean = %name, "Returning early reference of singleton in creation.");
            self.register_currently_created_dependent(&name);
            return Ok(instance);
        }

        if self.tracker.is_prototype_in_creation(&name) {
            return Err(prototype_in_creation(&name));
        }

        let merged = self.merged_definition(&name)?;
        let definition = merged.definition();
        if definition.is_abstract {
            return Err(BeanError::definition(&name, "Bean definition is abstract"));
        }

        for dependency in &definition.depends_on {
            let dependency = self.canonical_name(dependency);
            if self.singletons.is_dependent(&name, &dependency) {
                return Err(BeanError::definition(
                    &name,
                    format!("Circular depends-on relationship between '{name}' and '{dependency}'"),
                ));
            }

            self.singletons.register_dependent(&dependency, &name);
            self.get_bean(&dependency).map_err(|error| {
                unsatisfied(&name, format!("depends-on '{dependency}'"), error)
            })?;
        }

        let instance = match definition.scope() {
            SINGLETON => self.get_singleton(&name, &merged)?,
            PROTOTYPE => {
                let _guard = self
                    .tracker
                    .begin_prototype(&name)
                    .ok_or_else(|| prototype_in_creation(&name))?;
                self.create_bean_instance(&name, &merged)?
            }
            scope_name => {
                let scope = self
                    .scopes
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(scope_name)
                    .cloned()
                    .ok_or_else(|| {
                        BeanError::definition(
                            &name,
                            format!("No scope registered for scope name '{scope_name}'"),
                        )
                    })?;

                match scope.instance(&name) {
                    Some(instance) => instance,
                    None => {
                        let _guard = self.tracker.begin_prototype(&name).ok_or_else(|| {
                            BeanError::CircularReference {
                                name: name.clone(),
                                reason: format!("Scoped bean is currently in creation in scope '{scope_name}'"),
                            }
                        })?;
                        let instance = self.create_bean_instance(&name, &merged)?;
                        scope.store_instance(&name, instance.clone());
                        instance
                    }
                }
            }
        };

        self.register_currently_created_dependent(&name);
        Ok(instance)
    }

    /// Typesafe version of [BeanFactory::get_bean].
    pub fn get_bean_as<T: ?Sized + 'static>(&self, name: &str) -> Result<Arc<T>, BeanError> {
        self.bean_typed::<T>(name)
    }

    /// Returns the single bean matching given type.
    pub fn get_bean_of_type(&self, type_key: &TypeKey) -> Result<BeanInstance, BeanError> {
        self.resolve_dependency(&DependencyDescriptor::for_type(*type_key), None)?
            .into_instance()
            .map_err(|error| BeanError::creation(type_key.name(), CreationPhase::Instantiation, error))
    }

    /// Returns all beans matching given type, with their names.
    pub fn get_beans_of_type(
        &self,
        type_key: &TypeKey,
    ) -> Result<Vec<(String, BeanInstance)>, BeanError> {
        self.bean_names_for_type(type_key)
            .into_iter()
            .map(|name| self.get_bean(&name).map(|instance| (name, instance)))
            .collect()
    }

    fn register_currently_created_dependent(&self, name: &str) {
        if let Some(current) = self.tracker.currently_created() {
            if current != name {
                self.singletons.register_dependent(name, &current);
            }
        }
    }

    fn get_singleton(
        &self,
        name: &str,
        merged: &MergedBeanDefinition,
    ) -> Result<BeanInstance, BeanError> {
        let _lock = self.singletons.creation_lock().lock();

        if self.singletons.is_destroying() {
            return Err(BeanError::CreationNotAllowed(name.to_string()));
        }

        match self.singletons.lookup(name, false)? {
            SingletonLookup::Published(instance) | SingletonLookup::Early(instance) => {
                return Ok(instance)
            }
            SingletonLookup::InCreation => {
                return Err(BeanError::CircularReference {
                    name: name.to_string(),
                    reason: "Requested bean is currently in creation: Is there an unresolvable circular reference?".to_string(),
                })
            }
            SingletonLookup::Absent => {}
        }

        self.singletons.begin_creation(name)?;
        trace!(bean = name, "Creating shared instance of singleton bean.");

        match self.create_bean_instance(name, merged) {
            Ok(instance) => {
                self.singletons.publish(name, instance.clone());
                debug!(bean = name, "Published singleton bean.");
                Ok(instance)
            }
            Err(error) => {
                // dependents may hold an early reference to the failed instance
                self.singletons.abort_creation(name);
                self.pipeline().apply_early_reference_discarded(name);
                self.singletons.destroy_singleton(name);
                debug!(bean = name, %error, "Discarded failed singleton with its dependents.");
                Err(error)
            }
        }
    }

    // creation

    fn create_bean_instance(
        &self,
        name: &str,
        merged: &MergedBeanDefinition,
    ) -> Result<BeanInstance, BeanError> {
        let pipeline = self.pipeline();
        let _created = self.tracker.begin_created(name);

        if let Some(instance) = self
            .resolve_before_instantiation(name, merged, &pipeline)
            .map_err(phase(name, CreationPhase::BeforeInstantiation))?
        {
            return Ok(instance);
        }

        self.do_create_bean(name, merged, &pipeline)
    }

    fn resolve_before_instantiation(
        &self,
        name: &str,
        merged: &MergedBeanDefinition,
        pipeline: &PostProcessorPipeline,
    ) -> Result<Option<BeanInstance>, BeanError> {
        let resolved = *merged
            .before_instantiation_resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if resolved == Some(false) {
            return Ok(None);
        }

        let definition = merged.definition();
        let bean_type = match &merged.bean_type {
            Some(bean_type)
                if !definition.is_synthetic && pipeline.has(Hooks::BEFORE_INSTANTIATION) =>
            {
                bean_type
            }
            _ => return Ok(None),
        };

        let instance = match pipeline.apply_before_instantiation(bean_type, name)? {
            Some(instance) => Some(pipeline.apply_after_initialization(instance, name)?),
            None => None,
        };

        *merged
            .before_instantiation_resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(instance.is_some());
        Ok(instance)
    }

    fn do_create_bean(
        &self,
        name: &str,
        merged: &MergedBeanDefinition,
        pipeline: &Arc<PostProcessorPipeline>,
    ) -> Result<BeanInstance, BeanError> {
        let definition = merged.definition();

        trace!(bean = name, "Instantiating bean.");
        let raw = self
            .instantiate(name, &definition, merged.bean_type.as_ref())
            .map_err(phase(name, CreationPhase::Instantiation))?;

        self.apply_merge_definition(name, merged, raw.bean_type(), pipeline)
            .map_err(phase(name, CreationPhase::MergeDefinition))?;
        let definition = merged.definition();

        let early_exposure = definition.is_singleton()
            && self.config.allow_circular_references
            && self.singletons.is_in_creation(name);
        if early_exposure {
            debug!(bean = name, "Eagerly caching bean to allow for resolving potential circular references.");

            let pipeline = pipeline.clone();
            let early = raw.clone();
            let bean_name = name.to_string();
            let synthetic = definition.is_synthetic;
            self.singletons.add_early_reference_factory(
                name,
                Box::new(move || {
                    if synthetic {
                        Ok(early)
                    } else {
                        pipeline.apply_early_reference(early, &bean_name)
                    }
                }),
            );
        }

        let wrapper = BeanWrapper::new(raw.clone());
        self.populate(name, &definition, &wrapper, pipeline)
            .map_err(phase(name, CreationPhase::Population))?;

        let mut exposed = self
            .initialize(name, &definition, raw.clone(), pipeline)
            .map_err(phase(name, CreationPhase::Initialization))?;

        if early_exposure {
            if let Some(early) = self.singletons.resolved_early_reference(name) {
                if exposed.is_same(&raw) {
                    exposed = early;
                } else if self.singletons.has_dependents(name) {
                    let dependents = self.singletons.dependents(name);
                    if !self.config.allow_raw_injection_despite_wrapping {
                        return Err(BeanError::CircularReference {
                            name: name.to_string(),
                            reason: format!(
                                "Bean with name '{name}' has been injected into other beans [{}] in its raw version as part of a circular reference, but has eventually been wrapped. This means that said other beans do not use the final version of the bean.",
                                dependents.join(", ")
                            ),
                        });
                    }

                    warn!(bean = name, ?dependents, "Bean has been injected into other beans in its raw version, but has eventually been wrapped.");
                }
            }
        }

        if definition.is_singleton() {
            self.register_disposable(name, &definition, exposed.clone(), raw, pipeline)
                .map_err(phase(name, CreationPhase::DestructionRegistration))?;
        }

        Ok(exposed)
    }

    fn instantiate(
        &self,
        name: &str,
        definition: &BeanDefinition,
        bean_type: Option<&BeanType>,
    ) -> Result<BeanInstance, BeanError> {
        if let Some(supplier) = &definition.instance_supplier {
            let bean_type = bean_type
                .ok_or_else(|| BeanError::definition(name, "No bean type declared"))?;
            let instance = supplier(self).map_err(callback(name, CreationPhase::Instantiation))?;
            return Ok(BeanInstance::from_ptr(instance, bean_type.clone()));
        }

        if let Some(factory_method) = &definition.factory_method {
            let factory_name = self.canonical_name(&factory_method.factory_bean);
            if factory_name == name {
                return Err(BeanError::definition(
                    name,
                    "Factory bean reference points back to the same definition",
                ));
            }

            let factory = self.get_bean(&factory_name)?;
            self.singletons.register_dependent(&factory_name, name);

            let arguments = definition
                .constructor_arguments
                .iter()
                .enumerate()
                .map(|(index, argument)| {
                    self.resolve_value(name, format!("factory method argument #{index}"), argument)
                })
                .collect::<Result<Vec<_>, _>>()?;

            let instance = self
                .instantiation_strategy
                .instantiate_with_factory_method(&factory, &factory_method.method, arguments)
                .map_err(callback(name, CreationPhase::Instantiation))?;

            if let Some(bean_type) = bean_type {
                if !instance.bean_type().is_assignable_to(bean_type.key()) {
                    return Err(BeanError::NotOfRequiredType {
                        name: name.to_string(),
                        expected: bean_type.name().to_string(),
                        actual: instance.bean_type().name().to_string(),
                    });
                }
            }

            return Ok(instance);
        }

        let bean_type =
            bean_type.ok_or_else(|| BeanError::definition(name, "No bean type declared"))?;
        if bean_type.is_interface() {
            return Err(BeanError::definition(
                name,
                format!("Cannot instantiate interface type '{}'", bean_type.name()),
            ));
        }

        let constructor = bean_type.constructor().ok_or_else(|| {
            BeanError::definition(
                name,
                format!("No constructor declared for type '{}'", bean_type.name()),
            )
        })?;

        let explicit = &definition.constructor_arguments;
        let parameters = &constructor.parameters;
        let autowire = definition.autowire_mode == AutowireMode::Constructor || explicit.is_empty();
        if explicit.len() > parameters.len()
            || (explicit.len() < parameters.len() && !autowire)
        {
            return Err(BeanError::definition(
                name,
                format!(
                    "Expected {} constructor arguments, but {} were declared",
                    parameters.len(),
                    explicit.len()
                ),
            ));
        }

        let mut arguments = Vec::with_capacity(parameters.len());
        for (index, argument) in explicit.iter().enumerate() {
            arguments.push(self.resolve_value(
                name,
                format!("constructor argument #{index}"),
                argument,
            )?);
        }

        for parameter in parameters.iter().skip(explicit.len()) {
            let injection_point = format!("constructor parameter '{}'", parameter.name);
            let value = match parameter.kind {
                PropertyKind::Bean(type_key) => {
                    let descriptor = DependencyDescriptor {
                        required: parameter.required,
                        ..DependencyDescriptor::for_type(type_key).with_name(&parameter.name)
                    };
                    self.resolve_dependency(&descriptor, Some(name))
                        .map_err(|error| unsatisfied(name, injection_point, error))?
                }
                PropertyKind::Simple if parameter.required => {
                    return Err(BeanError::UnsatisfiedDependency {
                        bean_name: name.to_string(),
                        injection_point,
                        source: Box::new(BeanError::definition(
                            name,
                            "Simple constructor parameters cannot be autowired",
                        )),
                    })
                }
                PropertyKind::Simple => Value::Null,
            };
            arguments.push(value);
        }

        let instance = self
            .instantiation_strategy
            .instantiate(bean_type, arguments)
            .map_err(callback(name, CreationPhase::Instantiation))?;
        Ok(BeanInstance::from_ptr(instance, bean_type.clone()))
    }

    fn apply_merge_definition(
        &self,
        name: &str,
        merged: &MergedBeanDefinition,
        bean_type: &BeanType,
        pipeline: &PostProcessorPipeline,
    ) -> Result<(), BeanError> {
        let mut post_processed = merged
            .post_processed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *post_processed {
            return Ok(());
        }

        if pipeline.has(Hooks::MERGE_DEFINITION) {
            let mut definition = merged
                .definition
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if !definition.is_synthetic {
                trace!(bean = name, "Post-processing merged definition.");
                pipeline.apply_merge_definition(&mut definition, bean_type, name)?;
            }
        }

        *post_processed = true;
        Ok(())
    }

    /// Resolves a declared value on behalf of given bean.
    fn resolve_value(
        &self,
        bean_name: &str,
        injection_point: String,
        value: &ValueDefinition,
    ) -> Result<Value, BeanError> {
        match value {
            ValueDefinition::Value(value) => Ok(value.clone()),
            ValueDefinition::Reference(reference) => {
                let reference = self.canonical_name(reference);
                let instance = self.get_bean(&reference)?;
                self.singletons.register_dependent(&reference, bean_name);
                Ok(Value::Bean(instance))
            }
            ValueDefinition::Dependency(descriptor) => self
                .resolve_dependency(descriptor, Some(bean_name))
                .map_err(|error| unsatisfied(bean_name, injection_point, error)),
            ValueDefinition::List(values) => values
                .iter()
                .map(|value| self.resolve_value(bean_name, injection_point.clone(), value))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
        }
    }

    fn populate(
        &self,
        name: &str,
        definition: &BeanDefinition,
        wrapper: &BeanWrapper,
        pipeline: &PostProcessorPipeline,
    ) -> Result<(), BeanError> {
        let instance = wrapper.instance();

        if !definition.is_synthetic && !pipeline.apply_after_instantiation(instance, name)? {
            return Ok(());
        }

        let mut values = definition.property_values.clone();
        match definition.autowire_mode {
            AutowireMode::ByName => self.autowire_by_name(name, wrapper, &mut values)?,
            AutowireMode::ByType => self.autowire_by_type(name, wrapper, &mut values)?,
            AutowireMode::No | AutowireMode::Constructor => {}
        }

        if !definition.is_synthetic && pipeline.has(Hooks::PROPERTIES) {
            values = match pipeline.apply_properties(values, instance, name)? {
                Some(values) => values,
                None => return Ok(()),
            };
        }

        if definition.dependency_check {
            if let Some(property) = wrapper.unset_properties(&values).next() {
                return Err(BeanError::UnsatisfiedDependency {
                    bean_name: name.to_string(),
                    injection_point: format!("property '{}'", property.name),
                    source: Box::new(BeanError::definition(
                        name,
                        "Set this property value or disable dependency checking for this bean",
                    )),
                });
            }
        }

        for property in values {
            let value = self.resolve_value(
                name,
                format!("property '{}'", property.name),
                &property.value,
            )?;

            trace!(bean = name, property = %property.name, "Setting property.");
            wrapper
                .set_property(&property.name, value)
                .map_err(callback(name, CreationPhase::Population))?;
        }

        Ok(())
    }

    fn autowire_by_name(
        &self,
        name: &str,
        wrapper: &BeanWrapper,
        values: &mut PropertyValues,
    ) -> Result<(), BeanError> {
        let properties: Vec<String> = wrapper
            .unsatisfied_bean_properties(values)
            .map(|property| property.name.clone())
            .collect();

        for property in properties {
            if !self.contains_bean(&property) {
                trace!(bean = name, property = %property, "Not autowiring property by name: no matching bean.");
                continue;
            }

            let dependency = self.canonical_name(&property);
            let instance = self
                .get_bean(&dependency)
                .map_err(|error| unsatisfied(name, format!("property '{property}'"), error))?;
            self.singletons.register_dependent(&dependency, name);
            values.add(property, ValueDefinition::Value(Value::Bean(instance)));
        }

        Ok(())
    }

    fn autowire_by_type(
        &self,
        name: &str,
        wrapper: &BeanWrapper,
        values: &mut PropertyValues,
    ) -> Result<(), BeanError> {
        let properties: Vec<(String, TypeKey)> = wrapper
            .unsatisfied_bean_properties(values)
            .filter_map(|property| match property.kind {
                PropertyKind::Bean(type_key) => Some((property.name.clone(), type_key)),
                PropertyKind::Simple => None,
            })
            .collect();

        for (property, type_key) in properties {
            let descriptor = DependencyDescriptor::for_type(type_key)
                .with_name(&property)
                .optional();
            let value = self
                .resolve_dependency(&descriptor, Some(name))
                .map_err(|error| unsatisfied(name, format!("property '{property}'"), error))?;

            if !value.is_null() {
                values.add(property, ValueDefinition::Value(value));
            }
        }

        Ok(())
    }

    fn initialize(
        &self,
        name: &str,
        definition: &BeanDefinition,
        instance: BeanInstance,
        pipeline: &PostProcessorPipeline,
    ) -> Result<BeanInstance, BeanError> {
        let mut instance = instance;
        if !definition.is_synthetic {
            instance = pipeline.apply_before_initialization(instance, name)?;
        }

        if let Some(after_properties_set) = instance.bean_type().after_properties_set() {
            trace!(bean = name, "Invoking after-properties-set callback.");
            after_properties_set(instance.ptr()).map_err(callback(name, CreationPhase::Initialization))?;
        }

        if let Some(init_method) = &definition.init_method {
            trace!(bean = name, method = %init_method, "Invoking init method.");
            instance
                .invoke(init_method, Vec::new())
                .map_err(callback(name, CreationPhase::Initialization))?;
        }

        if !definition.is_synthetic {
            instance = pipeline.apply_after_initialization(instance, name)?;
        }

        Ok(instance)
    }

    fn register_disposable(
        &self,
        name: &str,
        definition: &BeanDefinition,
        exposed: BeanInstance,
        raw: BeanInstance,
        pipeline: &PostProcessorPipeline,
    ) -> Result<(), BeanError> {
        if let Some(method) = &definition.destroy_method {
            if !raw.bean_type().has_method(method) {
                return Err(BeanError::creation(
                    name,
                    CreationPhase::DestructionRegistration,
                    Arc::new(InvocationError::NoSuchMethod {
                        type_name: raw.bean_type().name().to_string(),
                        method: method.clone(),
                    }),
                ));
            }
        }

        if let Some(adapter) = DisposableBeanAdapter::new(name, exposed, raw, definition, pipeline) {
            self.singletons.register_disposable(adapter);
        }
        Ok(())
    }

    // operations on external instances

    /// Fully creates a new, unregistered instance of given type, autowiring constructor parameters
    /// and applying all post-processors.
    pub fn create_bean(&self, bean_type: &BeanType) -> Result<BeanInstance, BeanError> {
        let definition = BeanDefinition::new(bean_type.clone()).with_scope(PROTOTYPE);
        let merged = MergedBeanDefinition::new(definition, Some(bean_type.clone()));
        self.create_bean_instance(bean_type.name(), &merged)
    }

    /// Populates and initializes an existing instance, using the definition of given bean if
    /// present, as if it was a prototype.
    pub fn configure_bean(
        &self,
        existing: BeanInstance,
        name: &str,
    ) -> Result<BeanInstance, BeanError> {
        let canonical = self.canonical_name(name);
        let definition = if self.contains_bean_definition(&canonical) {
            self.merged_definition(&canonical)?.definition()
        } else {
            BeanDefinition::new(existing.bean_type().clone())
        }
        .with_scope(PROTOTYPE);

        let pipeline = self.pipeline();
        let _created = self.tracker.begin_created(&canonical);
        let wrapper = BeanWrapper::new(existing.clone());
        self.populate(&canonical, &definition, &wrapper, &pipeline)
            .map_err(phase(&canonical, CreationPhase::Population))?;
        self.initialize(&canonical, &definition, existing, &pipeline)
            .map_err(phase(&canonical, CreationPhase::Initialization))
    }

    /// Populates an existing instance using after-instantiation and properties post-processors.
    pub fn autowire_bean(&self, existing: &BeanInstance) -> Result<(), BeanError> {
        self.autowire_bean_properties(existing, AutowireMode::No, false)
    }

    /// Autowires bean properties of an existing instance by name or by type.
    pub fn autowire_bean_properties(
        &self,
        existing: &BeanInstance,
        autowire_mode: AutowireMode,
        dependency_check: bool,
    ) -> Result<(), BeanError> {
        if autowire_mode == AutowireMode::Constructor {
            return Err(BeanError::definition(
                existing.bean_type().name(),
                "Constructor autowiring is not applicable to existing instances",
            ));
        }

        let name = existing.bean_type().name();
        let mut definition = BeanDefinition::new(existing.bean_type().clone())
            .with_scope(PROTOTYPE)
            .with_autowire_mode(autowire_mode);
        definition.dependency_check = dependency_check;

        self.populate(name, &definition, &BeanWrapper::new(existing.clone()), &self.pipeline())
            .map_err(phase(name, CreationPhase::Population))
    }

    /// Initializes an existing instance: post-processors and the after-properties-set callback.
    pub fn initialize_bean(
        &self,
        existing: BeanInstance,
        name: &str,
    ) -> Result<BeanInstance, BeanError> {
        self.initialize(name, &BeanDefinition::default(), existing, &self.pipeline())
            .map_err(phase(name, CreationPhase::Initialization))
    }

    pub fn apply_before_initialization(
        &self,
        existing: BeanInstance,
        name: &str,
    ) -> Result<BeanInstance, BeanError> {
        self.pipeline().apply_before_initialization(existing, name)
    }

    pub fn apply_after_initialization(
        &self,
        existing: BeanInstance,
        name: &str,
    ) -> Result<BeanInstance, BeanError> {
        self.pipeline().apply_after_initialization(existing, name)
    }

    /// Runs destruction callbacks of an external instance.
    pub fn destroy_bean(&self, existing: BeanInstance) {
        let name = existing.bean_type().name();
        let definition = BeanDefinition::new(existing.bean_type().clone());
        if let Some(adapter) = DisposableBeanAdapter::new(
            name,
            existing.clone(),
            existing,
            &definition,
            &self.pipeline(),
        ) {
            adapter.destroy();
        }
    }

    /// Removes a bean from its custom scope and runs its destruction callbacks.
    pub fn destroy_scoped_bean(&self, name: &str) -> Result<(), BeanError> {
        let name = self.canonical_name(name);
        let merged = self.merged_definition(&name)?;
        let definition = merged.definition();

        let scope = self
            .scopes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(definition.scope())
            .cloned()
            .ok_or_else(|| {
                BeanError::definition(
                    &name,
                    format!("No custom scope registered for scope name '{}'", definition.scope()),
                )
            })?;

        if let Some(instance) = scope.remove(&name) {
            if let Some(adapter) = DisposableBeanAdapter::new(
                &name,
                instance.clone(),
                instance,
                &definition,
                &self.pipeline(),
            ) {
                adapter.destroy();
            }
        }

        Ok(())
    }

    // lifecycle

    /// Freezes the configuration and creates all non-lazy singletons, in declaration order.
    pub fn pre_instantiate_singletons(&self) -> Result<(), BeanError> {
        self.freeze_configuration();
        debug!("Pre-instantiating singletons.");

        for name in self.bean_definition_names() {
            let definition = self.merged_definition(&name)?.definition();
            if !definition.is_abstract && definition.is_singleton() && !definition.lazy_init {
                self.get_bean(&name)?;
            }
        }

        Ok(())
    }

    /// Destroys all singletons, dependents first, in reverse creation order.
    pub fn destroy_singletons(&self) {
        let _lock = self.singletons.creation_lock().lock();
        self.singletons.destroy_singletons();
        self.manual_singletons
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl BeanProvider for BeanFactory {
    #[inline]
    fn bean(&self, name: &str) -> Result<BeanInstance, BeanError> {
        self.get_bean(name)
    }

    #[inline]
    fn bean_of_type(&self, type_key: &TypeKey) -> Result<BeanInstance, BeanError> {
        self.get_bean_of_type(type_key)
    }

    #[inline]
    fn beans_of_type(&self, type_key: &TypeKey) -> Result<Vec<(String, BeanInstance)>, BeanError> {
        self.get_beans_of_type(type_key)
    }

    #[inline]
    fn contains_bean(&self, name: &str) -> bool {
        BeanFactory::contains_bean(self, name)
    }
}

#[cfg(test)]
mod tests {
    use crate::bean_type::{BeanType, PropertyKind, TypeKey};
    use crate::definition_registry::BeanDefinition;
    use crate::error::{BeanDefinitionRegistryError, BeanError, CreationPhase};
    use crate::factory::{BeanFactory, BeanFactoryBuilder};
    use crate::instance::BeanInstancePtr;
    use crate::instantiation::{InstantiationStrategyPtr, MockInstantiationStrategy};
    use crate::scope::{MockScope, PROTOTYPE};
    use crate::value::Value;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Counter {
        value: Mutex<i64>,
    }

    fn counter_type() -> BeanType {
        BeanType::builder::<Counter>()
            .default_constructor()
            .property("value", PropertyKind::Simple, |this: &Counter, value| {
                *this.value.lock().unwrap() = value.into_int()?;
                Ok(())
            })
            .build()
    }

    #[test]
    fn should_create_singleton_once() {
        let factory = BeanFactory::default();
        factory
            .register_bean_definition("counter", BeanDefinition::new(counter_type()))
            .unwrap();

        let first = factory.get_bean("counter").unwrap();
        let second = factory.get_bean("counter").unwrap();

        assert!(first.is_same(&second));
        assert_eq!(factory.singleton_names(), vec!["counter".to_string()]);
    }

    #[test]
    fn should_create_new_prototypes() {
        let factory = BeanFactory::default();
        factory
            .register_bean_definition(
                "counter",
                BeanDefinition::new(counter_type()).with_scope(PROTOTYPE),
            )
            .unwrap();

        let first = factory.get_bean("counter").unwrap();
        let second = factory.get_bean("counter").unwrap();

        assert!(!first.is_same(&second));
        assert!(factory.is_prototype("counter").unwrap());
        assert!(factory.singleton_names().is_empty());
    }

    #[test]
    fn should_apply_property_values() {
        let factory = BeanFactory::default();
        factory
            .register_bean_definition(
                "counter",
                BeanDefinition::new(counter_type()).with_property("value", Value::Int(7)),
            )
            .unwrap();

        let counter = factory.get_bean_as::<Counter>("counter").unwrap();
        assert_eq!(*counter.value.lock().unwrap(), 7);
    }

    #[test]
    fn should_not_find_missing_bean() {
        let factory = BeanFactory::default();
        assert!(matches!(
            factory.get_bean("missing").unwrap_err(),
            BeanError::NoSuchBean(name) if name == "missing"
        ));
    }

    #[test]
    fn should_wrap_setter_errors_with_phase() {
        let factory = BeanFactory::default();
        factory
            .register_bean_definition(
                "counter",
                BeanDefinition::new(counter_type()).with_property("value", "not a number"),
            )
            .unwrap();

        assert!(matches!(
            factory.get_bean("counter").unwrap_err(),
            BeanError::Creation { name, phase: CreationPhase::Population, .. } if name == "counter"
        ));
        assert!(factory.singleton_names().is_empty());
    }

    #[test]
    fn should_use_instantiation_strategy() {
        let mut strategy = MockInstantiationStrategy::new();
        strategy
            .expect_instantiate()
            .withf(|_, arguments| arguments.is_empty())
            .times(1)
            .returning(|_, _| Ok(Arc::new(Counter::default()) as BeanInstancePtr));

        let factory = BeanFactoryBuilder::new()
            .with_instantiation_strategy(Box::new(strategy) as InstantiationStrategyPtr)
            .build();
        factory
            .register_bean_definition("counter", BeanDefinition::new(counter_type()))
            .unwrap();

        assert!(factory.get_bean("counter").is_ok());
    }

    #[test]
    fn should_store_custom_scoped_instances() {
        let mut scope = MockScope::new();
        scope
            .expect_instance()
            .withf(|name| name == "counter")
            .times(1)
            .return_const(None);
        scope.expect_store_instance().times(1).return_const(());

        let factory = BeanFactoryBuilder::new()
            .with_scope("custom", Box::new(scope))
            .build();
        factory
            .register_bean_definition(
                "counter",
                BeanDefinition::new(counter_type()).with_scope("custom"),
            )
            .unwrap();

        assert!(factory.get_bean("counter").is_ok());
    }

    #[test]
    fn should_reject_unknown_scope() {
        let factory = BeanFactory::default();
        factory
            .register_bean_definition(
                "counter",
                BeanDefinition::new(counter_type()).with_scope("session"),
            )
            .unwrap();

        assert!(matches!(
            factory.get_bean("counter").unwrap_err(),
            BeanError::Definition { .. }
        ));
    }

    #[test]
    fn should_resolve_types_by_name() {
        let factory = BeanFactoryBuilder::new()
            .with_type("Counter", counter_type())
            .build();
        factory
            .register_bean_definition("counter", BeanDefinition::with_type_name("Counter"))
            .unwrap();
        factory
            .register_bean_definition("unknown", BeanDefinition::with_type_name("Unknown"))
            .unwrap();

        assert!(factory.get_bean_as::<Counter>("counter").is_ok());
        assert!(matches!(
            factory.get_bean("unknown").unwrap_err(),
            BeanError::Definition { .. }
        ));
        assert_eq!(
            factory.bean_names_for_type(&TypeKey::of::<Counter>()),
            vec!["counter".to_string()]
        );
    }

    #[test]
    fn should_not_override_after_freeze() {
        let factory = BeanFactory::default();
        factory
            .register_bean_definition("counter", BeanDefinition::new(counter_type()))
            .unwrap();
        factory.freeze_configuration();

        assert!(matches!(
            factory
                .register_bean_definition("counter", BeanDefinition::new(counter_type()))
                .unwrap_err(),
            BeanError::Registry(BeanDefinitionRegistryError::Frozen(_))
        ));
        assert!(factory
            .register_bean_definition("other", BeanDefinition::new(counter_type()))
            .is_ok());
    }

    #[test]
    fn should_reject_abstract_definitions() {
        let factory = BeanFactory::default();
        factory
            .register_bean_definition(
                "template",
                BeanDefinition::new(counter_type()).abstract_definition(),
            )
            .unwrap();

        assert!(matches!(
            factory.get_bean("template").unwrap_err(),
            BeanError::Definition { .. }
        ));
        assert!(factory.pre_instantiate_singletons().is_ok());
    }

    #[test]
    fn should_register_manual_singletons() {
        let factory = BeanFactory::default();
        let instance = crate::instance::BeanInstance::new(Arc::new(Counter::default()), counter_type());
        factory.register_singleton("manual", instance.clone()).unwrap();

        assert!(factory.contains_bean("manual"));
        assert!(factory.is_singleton("manual").unwrap());
        assert!(factory.get_bean("manual").unwrap().is_same(&instance));
        assert!(factory.register_singleton("manual", instance).is_err());
        assert_eq!(
            factory.bean_names_for_type(&TypeKey::of::<Counter>()),
            vec!["manual".to_string()]
        );
    }
}
