//! Extension points which take part in bean creation. A [BeanPostProcessor] declares the [Hooks]
//! it implements and is only dispatched for those; all hook methods have pass-through defaults.
//! Processors run in [ProcessorOrder] tiers: prioritized ones first, then ordered ones, then
//! unordered ones in registration order.

use crate::bean_type::{BeanType, Interface, TypeKey};
use crate::definition_registry::{BeanDefinition, BeanDefinitionRegistry, PropertyValues};
use crate::error::{BeanError, ErrorPtr};
use crate::instance::BeanInstance;
use bitflags::bitflags;
use fxhash::FxHashMap;
use itertools::Itertools;
use std::sync::Arc;
use tracing::trace;

bitflags! {
    /// Set of hooks a post-processor takes part in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Hooks: u16 {
        /// May short-circuit instantiation with its own instance.
        const BEFORE_INSTANTIATION = 1 << 0;
        /// May veto property population.
        const AFTER_INSTANTIATION = 1 << 1;
        /// May rewrite or drop property values.
        const PROPERTIES = 1 << 2;
        const BEFORE_INITIALIZATION = 1 << 3;
        const AFTER_INITIALIZATION = 1 << 4;
        /// Sees each merged definition once, before population.
        const MERGE_DEFINITION = 1 << 5;
        /// Supplies early references for circular dependencies.
        const EARLY_REFERENCE = 1 << 6;
        const DESTRUCTION = 1 << 7;
    }
}

/// Position of a processor in the execution order. Lower values run first within a tier.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum ProcessorOrder {
    Priority(i32),
    Ordered(i32),
    #[default]
    Unordered,
}

impl ProcessorOrder {
    fn sort_key(self) -> (u8, i32) {
        match self {
            ProcessorOrder::Priority(order) => (0, order),
            ProcessorOrder::Ordered(order) => (1, order),
            ProcessorOrder::Unordered => (2, 0),
        }
    }
}

/// Marks processor types registered before all others.
pub struct PriorityOrderedMarker;

/// Marks processor types registered after prioritized ones, but before unordered ones.
pub struct OrderedMarker;

pub fn priority_ordered() -> Interface {
    Interface::marker::<PriorityOrderedMarker>()
}

pub fn ordered() -> Interface {
    Interface::marker::<OrderedMarker>()
}

/// Registration tier of a processor type, known before any instance exists. Processors defined as
/// beans are instantiated and registered tier by tier, so prioritized processors already apply to
/// the creation of ordered ones.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum RegistrationTier {
    Priority,
    Ordered,
    Unordered,
}

impl RegistrationTier {
    pub const ALL: [RegistrationTier; 3] = [
        RegistrationTier::Priority,
        RegistrationTier::Ordered,
        RegistrationTier::Unordered,
    ];

    /// Reads the tier from [priority_ordered] or [ordered] marker interfaces of given type.
    pub fn of(bean_type: &BeanType) -> Self {
        if bean_type.is_assignable_to(&TypeKey::of::<PriorityOrderedMarker>()) {
            RegistrationTier::Priority
        } else if bean_type.is_assignable_to(&TypeKey::of::<OrderedMarker>()) {
            RegistrationTier::Ordered
        } else {
            RegistrationTier::Unordered
        }
    }
}

/// Stable sort by processor order, keeping registration order for equal positions.
pub fn sort_by_order<T, F: Fn(&T) -> ProcessorOrder>(items: &mut [T], order: F) {
    items.sort_by_key(|item| order(item).sort_key());
}

/// Hook into the bean creation process. Every method is called only if [BeanPostProcessor::hooks]
/// contains the corresponding flag.
pub trait BeanPostProcessor: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn hooks(&self) -> Hooks;

    fn order(&self) -> ProcessorOrder {
        ProcessorOrder::Unordered
    }

    /// Returns an instance to use instead of the regular construction process.
    fn before_instantiation(
        &self,
        _bean_type: &BeanType,
        _name: &str,
    ) -> Result<Option<BeanInstance>, ErrorPtr> {
        Ok(None)
    }

    fn merge_definition(
        &self,
        _definition: &mut BeanDefinition,
        _bean_type: &BeanType,
        _name: &str,
    ) -> Result<(), ErrorPtr> {
        Ok(())
    }

    /// Returns `false` to skip property population for this bean.
    fn after_instantiation(&self, _instance: &BeanInstance, _name: &str) -> Result<bool, ErrorPtr> {
        Ok(true)
    }

    /// Returns the values to apply, or `None` to skip applying property values at all.
    fn properties(
        &self,
        values: PropertyValues,
        _instance: &BeanInstance,
        _name: &str,
    ) -> Result<Option<PropertyValues>, ErrorPtr> {
        Ok(Some(values))
    }

    /// Returns a replacement instance, or `None` to keep the current one.
    fn before_initialization(
        &self,
        _instance: &BeanInstance,
        _name: &str,
    ) -> Result<Option<BeanInstance>, ErrorPtr> {
        Ok(None)
    }

    /// Returns a replacement instance, or `None` to keep the current one.
    fn after_initialization(
        &self,
        _instance: &BeanInstance,
        _name: &str,
    ) -> Result<Option<BeanInstance>, ErrorPtr> {
        Ok(None)
    }

    /// Returns the reference handed out to beans which depend on a bean still in creation.
    fn early_reference(&self, instance: BeanInstance, _name: &str) -> Result<BeanInstance, ErrorPtr> {
        Ok(instance)
    }

    /// Called when creation of a bean fails after early references to it may have been handed
    /// out. Any per-bean state kept for [BeanPostProcessor::early_reference] should be dropped.
    fn early_reference_discarded(&self, _name: &str) {}

    fn requires_destruction(&self, _instance: &BeanInstance) -> bool {
        true
    }

    fn before_destruction(&self, _instance: &BeanInstance, _name: &str) -> Result<(), ErrorPtr> {
        Ok(())
    }
}

pub type BeanPostProcessorPtr = Arc<dyn BeanPostProcessor>;

/// Configuration-time hook run over the definition registry before any bean is created.
pub trait BeanDefinitionPostProcessor: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn order(&self) -> ProcessorOrder {
        ProcessorOrder::Unordered
    }

    fn post_process_definitions(
        &self,
        registry: &mut dyn BeanDefinitionRegistry,
    ) -> Result<(), ErrorPtr>;
}

pub type BeanDefinitionPostProcessorPtr = Arc<dyn BeanDefinitionPostProcessor>;

fn processor_error(processor: &BeanPostProcessorPtr, source: ErrorPtr) -> BeanError {
    match source.downcast_ref::<BeanError>() {
        Some(error) if error.attributed_bean().is_some() => error.clone(),
        _ => BeanError::PostProcessor {
            processor: processor.name().to_string(),
            source,
        },
    }
}

/// Ordered processors with per-hook dispatch lists.
#[derive(Clone, Default)]
pub(crate) struct PostProcessorPipeline {
    processors: Vec<BeanPostProcessorPtr>,
    dispatch: FxHashMap<Hooks, Vec<BeanPostProcessorPtr>>,
}

impl PostProcessorPipeline {
    /// Adds a processor. Adding the same processor again moves it to its new position.
    pub(crate) fn add(&mut self, processor: BeanPostProcessorPtr) {
        self.processors
            .retain(|existing| !Arc::ptr_eq(existing, &processor));
        self.processors.push(processor);
        sort_by_order(&mut self.processors, |processor| processor.order());

        self.dispatch = Hooks::all()
            .iter()
            .map(|hook| {
                (
                    hook,
                    self.processors
                        .iter()
                        .filter(|processor| processor.hooks().contains(hook))
                        .cloned()
                        .collect_vec(),
                )
            })
            .collect();
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.processors.len()
    }

    #[inline]
    pub(crate) fn has(&self, hook: Hooks) -> bool {
        self.dispatch
            .get(&hook)
            .map(|processors| !processors.is_empty())
            .unwrap_or(false)
    }

    fn processors(&self, hook: Hooks) -> &[BeanPostProcessorPtr] {
        self.dispatch.get(&hook).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn apply_before_instantiation(
        &self,
        bean_type: &BeanType,
        name: &str,
    ) -> Result<Option<BeanInstance>, BeanError> {
        for processor in self.processors(Hooks::BEFORE_INSTANTIATION) {
            if let Some(instance) = processor
                .before_instantiation(bean_type, name)
                .map_err(|error| processor_error(processor, error))?
            {
                trace!(processor = processor.name(), bean = name, "Short-circuited instantiation.");
                return Ok(Some(instance));
            }
        }

        Ok(None)
    }

    pub(crate) fn apply_merge_definition(
        &self,
        definition: &mut BeanDefinition,
        bean_type: &BeanType,
        name: &str,
    ) -> Result<(), BeanError> {
        for processor in self.processors(Hooks::MERGE_DEFINITION) {
            processor
                .merge_definition(definition, bean_type, name)
                .map_err(|error| processor_error(processor, error))?;
        }

        Ok(())
    }

    pub(crate) fn apply_after_instantiation(
        &self,
        instance: &BeanInstance,
        name: &str,
    ) -> Result<bool, BeanError> {
        for processor in self.processors(Hooks::AFTER_INSTANTIATION) {
            if !processor
                .after_instantiation(instance, name)
                .map_err(|error| processor_error(processor, error))?
            {
                trace!(processor = processor.name(), bean = name, "Population vetoed.");
                return Ok(false);
            }
        }

        Ok(true)
    }

    pub(crate) fn apply_properties(
        &self,
        mut values: PropertyValues,
        instance: &BeanInstance,
        name: &str,
    ) -> Result<Option<PropertyValues>, BeanError> {
        for processor in self.processors(Hooks::PROPERTIES) {
            match processor
                .properties(values, instance, name)
                .map_err(|error| processor_error(processor, error))?
            {
                Some(processed) => values = processed,
                None => return Ok(None),
            }
        }

        Ok(Some(values))
    }

    pub(crate) fn apply_before_initialization(
        &self,
        instance: BeanInstance,
        name: &str,
    ) -> Result<BeanInstance, BeanError> {
        self.apply_replacing(Hooks::BEFORE_INITIALIZATION, instance, name, |processor, instance| {
            processor.before_initialization(instance, name)
        })
    }

    pub(crate) fn apply_after_initialization(
        &self,
        instance: BeanInstance,
        name: &str,
    ) -> Result<BeanInstance, BeanError> {
        self.apply_replacing(Hooks::AFTER_INITIALIZATION, instance, name, |processor, instance| {
            processor.after_initialization(instance, name)
        })
    }

    fn apply_replacing<F>(
        &self,
        hook: Hooks,
        mut instance: BeanInstance,
        name: &str,
        callback: F,
    ) -> Result<BeanInstance, BeanError>
    where
        F: Fn(&BeanPostProcessorPtr, &BeanInstance) -> Result<Option<BeanInstance>, ErrorPtr>,
    {
        for processor in self.processors(hook) {
            if let Some(replacement) =
                callback(processor, &instance).map_err(|error| processor_error(processor, error))?
            {
                trace!(processor = processor.name(), bean = name, ?hook, "Replaced instance.");
                instance = replacement;
            }
        }

        Ok(instance)
    }

    pub(crate) fn apply_early_reference(
        &self,
        mut instance: BeanInstance,
        name: &str,
    ) -> Result<BeanInstance, BeanError> {
        for processor in self.processors(Hooks::EARLY_REFERENCE) {
            instance = processor
                .early_reference(instance, name)
                .map_err(|error| processor_error(processor, error))?;
        }

        Ok(instance)
    }

    pub(crate) fn apply_early_reference_discarded(&self, name: &str) {
        for processor in self.processors(Hooks::EARLY_REFERENCE) {
            processor.early_reference_discarded(name);
        }
    }

    /// Returns destruction-aware processors interested in given instance.
    pub(crate) fn destruction_processors(
        &self,
        instance: &BeanInstance,
    ) -> Vec<BeanPostProcessorPtr> {
        self.processors(Hooks::DESTRUCTION)
            .iter()
            .filter(|processor| processor.requires_destruction(instance))
            .cloned()
            .collect()
    }
}
