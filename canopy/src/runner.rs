//! Runners executing actual application logic.

use canopy_di::bean_type::Interface;
pub use canopy_di::error::ErrorPtr;
#[cfg(test)]
use mockall::automock;

pub type ApplicationRunnerPtr = dyn ApplicationRunner;

/// Runs application logic. Runners are run by the [Application](crate::application::Application)
/// and are discovered in the container by the [runner_interface].
#[cfg_attr(test, automock)]
pub trait ApplicationRunner: Send + Sync {
    /// Runs any application code.
    fn run(&self) -> Result<(), ErrorPtr>;

    /// Returns the priority for this runner. Higher priorities get run first. Default 0.
    fn priority(&self) -> i8 {
        0
    }
}

/// Interface runner beans declare, so they can be found by the application.
pub fn runner_interface() -> Interface {
    Interface::of::<ApplicationRunnerPtr>().with_methods(["run"])
}
