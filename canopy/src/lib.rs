//! Application framework based on [canopy_di] dependency injection.
//!
//! Traditional applications start in the `main()` function and explicitly initialize and pass
//! around various services. With a container in place, application components form a dependency
//! graph managed by [canopy_di]. This crate provides an entrypoint for such applications in the form
//! of [Application](application::Application), which:
//!
//! * reads [configuration](config) from `canopy.json` and `CANOPY_` environment variables,
//! * installs a default tracing logger,
//! * refreshes the [ApplicationContext](context::ApplicationContext), registering post-processor
//!   beans and creating all non-lazy singletons,
//! * runs [ApplicationRunners](runner::ApplicationRunner) by descending priority,
//! * destroys all singletons on exit.

pub mod application;
pub mod config;
pub mod context;
pub mod runner;
