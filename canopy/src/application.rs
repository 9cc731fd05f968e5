//! Core application framework functionality.

use crate::config::{ApplicationConfig, ApplicationConfigProvider};
use crate::context::{ApplicationContext, ContextError};
use crate::runner::ApplicationRunnerPtr;
use canopy_di::error::{BeanError, ErrorPtr};
use canopy_di::instance::TypedBeanProvider;
use derive_more::Constructor;
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Clone, Error, Debug)]
pub enum ApplicationError {
    #[error("Error reading configuration: {0}")]
    ConfigError(ErrorPtr),
    #[error("Error starting application context: {0}")]
    ContextError(ContextError),
    #[error("Error retrieving runners: {0}")]
    RunnerInjectionError(BeanError),
    #[error("Runner error: {0}")]
    RunnerError(ErrorPtr),
}

/// Main entrypoint for the application. Bootstraps the [ApplicationContext] and runs
/// [ApplicationRunners](crate::runner::ApplicationRunner) found in it.
#[derive(Constructor)]
pub struct Application {
    context: ApplicationContext,
}

impl Application {
    /// Creates an application with a config read from given provider.
    pub fn from_config_provider(
        provider: &dyn ApplicationConfigProvider,
    ) -> Result<Self, ApplicationError> {
        provider
            .config()
            .map(|config| Self::new(ApplicationContext::new(config)))
            .map_err(ApplicationError::ConfigError)
    }

    #[inline]
    pub fn context(&self) -> &ApplicationContext {
        &self.context
    }

    /// Refreshes the context, runs all runners by descending priority and closes the context,
    /// regardless of the outcome.
    pub fn run(&self) -> Result<(), ApplicationError> {
        if self.context.config().install_tracing_logger {
            install_tracing_logger();
        }

        self.context
            .refresh()
            .map_err(ApplicationError::ContextError)?;

        let result = self.run_runners();
        self.context.close();
        result
    }

    fn run_runners(&self) -> Result<(), ApplicationError> {
        info!("Searching for application runners...");

        let mut runners = self
            .context
            .beans_typed::<ApplicationRunnerPtr>()
            .map_err(ApplicationError::RunnerInjectionError)?;

        // stable, so equal priorities keep declaration order
        runners.sort_by_key(|runner| -runner.priority());

        info!("Running application runners...");

        for runner in &runners {
            runner.run().map_err(ApplicationError::RunnerError)?;
        }

        Ok(())
    }
}

impl From<ApplicationConfig> for Application {
    fn from(config: ApplicationConfig) -> Self {
        Self::new(ApplicationContext::new(config))
    }
}

fn install_tracing_logger() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if let Err(error) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        debug!(%error, "Tracing logger already installed.");
    }
}

#[cfg(test)]
mod tests {
    use crate::application::{Application, ApplicationError};
    use crate::config::{ApplicationConfig, MockApplicationConfigProvider};
    use crate::context::{ContextError, ContextState};
    use crate::runner::{runner_interface, ApplicationRunnerPtr, MockApplicationRunner};
    use canopy_di::bean_type::BeanType;
    use canopy_di::definition_registry::BeanDefinition;
    use canopy_di::error::{BeanError, ErrorPtr};
    use canopy_di::instance::BeanInstance;
    use mockall::Sequence;
    use std::sync::Arc;
    use thiserror::Error;

    #[derive(Error, Debug)]
    #[error("Runner failed")]
    struct RunnerFailed;

    fn test_config() -> ApplicationConfig {
        ApplicationConfig {
            install_tracing_logger: false,
            ..Default::default()
        }
    }

    fn register_runner(application: &Application, name: &str, runner: MockApplicationRunner) {
        application
            .context()
            .factory()
            .register_singleton(
                name,
                BeanInstance::new(
                    Arc::new(runner),
                    BeanType::builder::<MockApplicationRunner>()
                        .implements(
                            runner_interface(),
                            |this: Arc<MockApplicationRunner>| this as Arc<ApplicationRunnerPtr>,
                        )
                        .build(),
                ),
            )
            .unwrap();
    }

    #[test]
    fn should_run_runners_by_priority() {
        let application = Application::from(test_config());
        let mut sequence = Sequence::new();

        let mut low = MockApplicationRunner::new();
        low.expect_priority().return_const(-1i8);
        let mut high = MockApplicationRunner::new();
        high.expect_priority().return_const(5i8);
        let mut default = MockApplicationRunner::new();
        default.expect_priority().return_const(0i8);

        high.expect_run()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|| Ok(()));
        default
            .expect_run()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|| Ok(()));
        low.expect_run()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|| Ok(()));

        register_runner(&application, "low", low);
        register_runner(&application, "high", high);
        register_runner(&application, "default", default);

        application.run().unwrap();
        assert_eq!(application.context().state(), ContextState::Closed);
    }

    #[test]
    fn should_return_runner_error_and_close_context() {
        let application = Application::from(test_config());

        let mut failing = MockApplicationRunner::new();
        failing.expect_priority().return_const(1i8);
        failing
            .expect_run()
            .times(1)
            .returning(|| Err(Arc::new(RunnerFailed) as ErrorPtr));
        let mut skipped = MockApplicationRunner::new();
        skipped.expect_priority().return_const(0i8);
        skipped.expect_run().never();

        register_runner(&application, "failing", failing);
        register_runner(&application, "skipped", skipped);

        assert!(matches!(
            application.run().unwrap_err(),
            ApplicationError::RunnerError(_)
        ));
        assert_eq!(application.context().state(), ContextState::Closed);
    }

    #[test]
    fn should_return_context_error() {
        let application = Application::from(test_config());
        application
            .context()
            .factory()
            .register_bean_definition(
                "broken",
                BeanDefinition::new(BeanType::builder::<()>().build()).with_depends_on("missing"),
            )
            .unwrap();

        assert!(matches!(
            application.run().unwrap_err(),
            ApplicationError::ContextError(ContextError::Bean(BeanError::UnsatisfiedDependency { .. }))
        ));
    }

    #[test]
    fn should_return_config_error() {
        let mut provider = MockApplicationConfigProvider::new();
        provider
            .expect_config()
            .times(1)
            .returning(|| Err(Arc::new(RunnerFailed) as ErrorPtr));

        assert!(matches!(
            Application::from_config_provider(&provider),
            Err(ApplicationError::ConfigError(_))
        ));
    }

    #[test]
    fn should_run_without_runners() {
        let mut provider = MockApplicationConfigProvider::new();
        provider.expect_config().returning(|| Ok(test_config()));

        let application = Application::from_config_provider(&provider).unwrap();
        application.run().unwrap();

        assert!(matches!(
            application.run().unwrap_err(),
            ApplicationError::ContextError(ContextError::AlreadyRefreshed)
        ));
    }
}
