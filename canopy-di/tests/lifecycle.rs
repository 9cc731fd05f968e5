mod lifecycle_test {
    use canopy_di::bean_type::{BeanType, Interface, PropertyKind, TypeKey};
    use canopy_di::definition_registry::BeanDefinition;
    use canopy_di::error::{BeanError, CreationPhase, ErrorPtr};
    use canopy_di::factory::BeanFactory;
    use canopy_di::instance::BeanInstance;
    use canopy_di::post_processor::{BeanPostProcessor, Hooks};
    use canopy_di::proxy::aop_proxy::{
        AopProxy, MethodInterceptor, MethodInterceptorPtr, MethodInvocation,
    };
    use canopy_di::proxy::auto_proxy::{AutoProxyCreator, InterceptionAdvisor};
    use canopy_di::proxy::ProxyStrategy;
    use canopy_di::value::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    trait Named: Send + Sync {
        fn name(&self) -> &'static str;
    }

    struct Tracked {
        id: &'static str,
        log: Log,
    }

    impl Named for Tracked {
        fn name(&self) -> &'static str {
            self.id
        }
    }

    fn tracked_type(id: &'static str, log: Log) -> BeanType {
        let constructor_log = log;
        BeanType::builder::<Tracked>()
            .constructor(Vec::new(), move |_| {
                Ok(Tracked {
                    id,
                    log: constructor_log.clone(),
                })
            })
            .implements(
                Interface::of::<dyn Named>().with_methods(["name"]),
                |this: Arc<Tracked>| this as Arc<dyn Named>,
            )
            .property(
                "dependency",
                PropertyKind::Bean(TypeKey::of::<Tracked>()),
                |_: &Tracked, _| Ok(()),
            )
            .after_properties_set(|this: &Tracked| {
                this.log.lock().unwrap().push(format!("init:{}", this.id));
                Ok(())
            })
            .method("name", |this: &Tracked, _| Ok(Value::from(this.id)))
            .method("start", |this: &Tracked, _| {
                this.log.lock().unwrap().push(format!("start:{}", this.id));
                Ok(Value::Null)
            })
            .method("close", |this: &Tracked, _| {
                this.log.lock().unwrap().push(format!("close:{}", this.id));
                Ok(Value::Null)
            })
            .on_destroy(|this: &Tracked| {
                this.log.lock().unwrap().push(format!("destroy:{}", this.id));
                Ok(())
            })
            .build()
    }

    fn entries(log: &Log, prefix: &str) -> Vec<String> {
        log.lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .cloned()
            .collect()
    }

    #[derive(Default)]
    struct CountingInterceptor {
        calls: AtomicUsize,
    }

    impl MethodInterceptor for CountingInterceptor {
        fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> Result<Value, ErrorPtr> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            invocation.proceed()
        }
    }

    struct ProxyService {
        interceptor: MethodInterceptorPtr,
    }

    impl InterceptionAdvisor for ProxyService {
        fn interceptors_for(
            &self,
            _instance: &BeanInstance,
            name: &str,
        ) -> Option<Vec<MethodInterceptorPtr>> {
            (name == "service").then(|| vec![self.interceptor.clone()])
        }
    }

    struct DestructionRecorder {
        log: Log,
    }

    impl BeanPostProcessor for DestructionRecorder {
        fn hooks(&self) -> Hooks {
            Hooks::DESTRUCTION
        }

        fn before_destruction(&self, _instance: &BeanInstance, name: &str) -> Result<(), ErrorPtr> {
            self.log.lock().unwrap().push(format!("processor:{name}"));
            Ok(())
        }
    }

    #[test]
    fn should_initialize_dependencies_first() {
        let log = Log::default();
        let factory = BeanFactory::default();
        factory
            .register_bean_definition(
                "first",
                BeanDefinition::new(tracked_type("first", log.clone()))
                    .with_depends_on("second")
                    .with_init_method("start"),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "second",
                BeanDefinition::new(tracked_type("second", log.clone())).lazy(),
            )
            .unwrap();

        factory.pre_instantiate_singletons().unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["init:second", "init:first", "start:first"]
        );
        assert_eq!(
            factory.singleton_names(),
            vec!["second".to_string(), "first".to_string()]
        );
    }

    #[test]
    fn should_skip_lazy_singletons_during_pre_instantiation() {
        let log = Log::default();
        let factory = BeanFactory::default();
        factory
            .register_bean_definition(
                "lazy",
                BeanDefinition::new(tracked_type("lazy", log.clone())).lazy(),
            )
            .unwrap();

        factory.pre_instantiate_singletons().unwrap();
        assert!(factory.singleton_names().is_empty());
        assert!(factory.is_configuration_frozen());
    }

    #[test]
    fn should_destroy_dependents_first() {
        let log = Log::default();
        let factory = BeanFactory::default();
        factory.add_bean_post_processor(Arc::new(DestructionRecorder { log: log.clone() }));
        factory
            .register_bean_definition(
                "repository",
                BeanDefinition::new(tracked_type("repository", log.clone()))
                    .with_destroy_method("close"),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "service",
                BeanDefinition::new(tracked_type("service", log.clone()))
                    .with_reference("dependency", "repository"),
            )
            .unwrap();

        factory.pre_instantiate_singletons().unwrap();
        factory.destroy_singletons();

        assert_eq!(
            entries(&log, "destroy:"),
            vec!["destroy:service", "destroy:repository"]
        );
        assert_eq!(
            entries(&log, "processor:"),
            vec!["processor:service", "processor:repository"]
        );
        assert_eq!(entries(&log, "close:"), vec!["close:repository"]);
        assert!(factory.singleton_names().is_empty());

        let log_position = |entry: &str| {
            log.lock()
                .unwrap()
                .iter()
                .position(|existing| existing == entry)
                .unwrap()
        };
        assert!(log_position("processor:repository") < log_position("destroy:repository"));
        assert!(log_position("destroy:repository") < log_position("close:repository"));
    }

    #[test]
    fn should_reject_missing_destroy_method() {
        let factory = BeanFactory::default();
        factory
            .register_bean_definition(
                "broken",
                BeanDefinition::new(tracked_type("broken", Log::default()))
                    .with_destroy_method("missing"),
            )
            .unwrap();

        assert!(matches!(
            factory.get_bean("broken").unwrap_err(),
            BeanError::Creation { phase: CreationPhase::DestructionRegistration, .. }
        ));
    }

    #[test]
    fn should_proxy_advised_beans_once() {
        let log = Log::default();
        let interceptor = Arc::new(CountingInterceptor::default());
        let factory = BeanFactory::default();
        factory.add_bean_post_processor(Arc::new(AutoProxyCreator::new(Box::new(
            ProxyService {
                interceptor: interceptor.clone(),
            },
        ))));
        factory
            .register_bean_definition(
                "service",
                BeanDefinition::new(tracked_type("service", log.clone())),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "other",
                BeanDefinition::new(tracked_type("other", log.clone())),
            )
            .unwrap();

        let service = factory.get_bean("service").unwrap();
        assert!(service.bean_type().is_proxy());
        assert!(service.bean_type().is_assignable_to(&TypeKey::of::<dyn Named>()));

        let proxy = service.cast::<AopProxy>().unwrap();
        assert_eq!(proxy.strategy(), ProxyStrategy::Interface);
        assert!(!proxy.target().bean_type().is_proxy());

        assert_eq!(
            service.invoke("name", Vec::new()).unwrap().into_text().unwrap(),
            "service"
        );
        assert!(service.invoke("start", Vec::new()).is_err());
        assert_eq!(interceptor.calls.load(Ordering::SeqCst), 1);

        assert!(!factory.get_bean("other").unwrap().bean_type().is_proxy());
        assert_eq!(
            factory.bean_names_for_type(&TypeKey::of::<dyn Named>()),
            vec!["service".to_string(), "other".to_string()]
        );
    }

    #[test]
    fn should_configure_external_instances() {
        let log = Log::default();
        let factory = BeanFactory::default();
        let bean_type = tracked_type("external", log.clone());
        let existing = BeanInstance::new(
            Arc::new(Tracked {
                id: "external",
                log: log.clone(),
            }),
            bean_type.clone(),
        );

        let configured = factory.configure_bean(existing.clone(), "external").unwrap();
        assert!(configured.is_same(&existing));

        let created = factory.create_bean(&bean_type).unwrap();
        assert!(!created.is_same(&existing));
        assert!(factory.singleton_names().is_empty());

        factory.destroy_bean(created);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["init:external", "init:external", "destroy:external"]
        );
    }
}
