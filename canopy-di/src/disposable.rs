use crate::definition_registry::BeanDefinition;
use crate::instance::BeanInstance;
use crate::post_processor::{BeanPostProcessorPtr, PostProcessorPipeline};
use tracing::{debug, warn};

/// Runs all destruction callbacks of a single bean: destruction-aware post-processors, the type
/// destroy callback and a custom destroy method, in that order. Failures are logged and don't stop
/// the remaining callbacks.
pub struct DisposableBeanAdapter {
    name: String,
    exposed: BeanInstance,
    target: BeanInstance,
    destroy_method: Option<String>,
    processors: Vec<BeanPostProcessorPtr>,
}

impl DisposableBeanAdapter {
    /// Creates an adapter if the bean needs any destruction callback. `target` is the raw instance
    /// while `exposed` is what has been handed out to other beans.
    pub(crate) fn new(
        name: &str,
        exposed: BeanInstance,
        target: BeanInstance,
        definition: &BeanDefinition,
        pipeline: &PostProcessorPipeline,
    ) -> Option<Self> {
        let processors = pipeline.destruction_processors(&exposed);
        let destroy_method = definition
            .destroy_method
            .clone()
            .filter(|method| target.bean_type().has_method(method));

        if processors.is_empty()
            && destroy_method.is_none()
            && target.bean_type().destroy_callback().is_none()
        {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            exposed,
            target,
            destroy_method,
            processors,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn destroy(&self) {
        debug!(bean = %self.name, "Destroying bean.");

        for processor in &self.processors {
            if let Err(error) = processor.before_destruction(&self.exposed, &self.name) {
                warn!(bean = %self.name, processor = processor.name(), %error, "Destruction post-processor failed.");
            }
        }

        if let Some(callback) = self.target.bean_type().destroy_callback() {
            if let Err(error) = callback(self.target.ptr()) {
                warn!(bean = %self.name, %error, "Destroy callback failed.");
            }
        }

        if let Some(method) = &self.destroy_method {
            if let Err(error) = self.target.invoke(method, Vec::new()) {
                warn!(bean = %self.name, method = %method, %error, "Destroy method failed.");
            }
        }
    }
}
