mod application_test {
    use canopy::application::Application;
    use canopy::config::{ApplicationConfig, CONFIG_BEAN_NAME};
    use canopy::runner::{runner_interface, ApplicationRunner, ApplicationRunnerPtr};
    use canopy_di::bean_type::{BeanType, PropertyKind, TypeKey};
    use canopy_di::definition_registry::BeanDefinition;
    use canopy_di::error::ErrorPtr;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Greeter {
        log: Log,
    }

    struct GreetingRunner {
        greeter: Mutex<Option<Arc<Greeter>>>,
        config: Mutex<Option<Arc<ApplicationConfig>>>,
    }

    impl ApplicationRunner for GreetingRunner {
        fn run(&self) -> Result<(), ErrorPtr> {
            let config = self.config.lock().unwrap().clone().unwrap();
            if let Some(greeter) = self.greeter.lock().unwrap().as_ref() {
                greeter.log.lock().unwrap().push(format!(
                    "hello, circular references allowed: {}",
                    config.allow_circular_references
                ));
            }
            Ok(())
        }
    }

    fn greeter_type(log: Log) -> BeanType {
        BeanType::builder::<Greeter>()
            .constructor(Vec::new(), move |_| Ok(Greeter { log: log.clone() }))
            .on_destroy(|this: &Greeter| {
                this.log.lock().unwrap().push("destroyed".to_string());
                Ok(())
            })
            .build()
    }

    fn runner_type() -> BeanType {
        BeanType::builder::<GreetingRunner>()
            .constructor(Vec::new(), |_| {
                Ok(GreetingRunner {
                    greeter: Mutex::new(None),
                    config: Mutex::new(None),
                })
            })
            .implements(runner_interface(), |this: Arc<GreetingRunner>| {
                this as Arc<ApplicationRunnerPtr>
            })
            .property(
                "greeter",
                PropertyKind::Bean(TypeKey::of::<Greeter>()),
                |this: &GreetingRunner, value| {
                    *this.greeter.lock().unwrap() = Some(value.into_bean()?);
                    Ok(())
                },
            )
            .property(
                "config",
                PropertyKind::Bean(TypeKey::of::<ApplicationConfig>()),
                |this: &GreetingRunner, value| {
                    *this.config.lock().unwrap() = Some(value.into_bean()?);
                    Ok(())
                },
            )
            .build()
    }

    #[test]
    fn should_wire_and_run_application() {
        let log = Log::default();
        let mut config = ApplicationConfig::default();
        config.install_tracing_logger = false;
        let application = Application::from(config);

        let factory = application.context().factory();
        factory
            .register_bean_definition("greeter", BeanDefinition::new(greeter_type(log.clone())))
            .unwrap();
        factory
            .register_bean_definition(
                "runner",
                BeanDefinition::new(runner_type())
                    .with_reference("greeter", "greeter")
                    .with_reference("config", CONFIG_BEAN_NAME),
            )
            .unwrap();

        application.run().unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "hello, circular references allowed: true".to_string(),
                "destroyed".to_string()
            ]
        );
    }
}
