mod circular_test {
    use canopy_di::bean_type::{BeanType, BeanTypeBuilder, PropertyKind, TypeKey};
    use canopy_di::definition_registry::BeanDefinition;
    use canopy_di::error::{BeanError, ErrorPtr};
    use canopy_di::factory::{BeanFactory, BeanFactoryBuilder, FactoryConfig};
    use canopy_di::instance::BeanInstance;
    use canopy_di::post_processor::{BeanPostProcessor, Hooks};
    use canopy_di::proxy::aop_proxy::{AopProxy, MethodInterceptorPtr};
    use canopy_di::proxy::auto_proxy::{AutoProxyCreator, InterceptionAdvisor};
    use canopy_di::scope::PROTOTYPE;
    use std::io::{Error, ErrorKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Node {
        peer: Mutex<Option<BeanInstance>>,
    }

    fn node_builder() -> BeanTypeBuilder<Node> {
        BeanType::builder::<Node>()
            .default_constructor()
            .property(
                "peer",
                PropertyKind::Bean(TypeKey::of::<Node>()),
                |this: &Node, value| {
                    *this.peer.lock().unwrap() = Some(value.into_instance()?);
                    Ok(())
                },
            )
            .method("ping", |_: &Node, _| Ok("pong".into()))
    }

    fn node_type() -> BeanType {
        node_builder().build()
    }

    /// Node failing initialization until given number of failures has been used up.
    fn failing_node_type(failures: Arc<AtomicUsize>) -> BeanType {
        node_builder()
            .after_properties_set(move |_: &Node| {
                if failures
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                    .is_ok()
                {
                    return Err(Arc::new(Error::new(ErrorKind::Other, "init failed")) as ErrorPtr);
                }
                Ok(())
            })
            .build()
    }

    fn destroy_counting_node_type(destroyed: Arc<AtomicUsize>) -> BeanType {
        node_builder()
            .on_destroy(move |_: &Node| {
                destroyed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
    }

    fn register_failing_cycle(factory: &BeanFactory, failures: usize) -> Arc<AtomicUsize> {
        let destroyed = Arc::new(AtomicUsize::new(0));
        factory
            .register_bean_definition(
                "a",
                BeanDefinition::new(failing_node_type(Arc::new(AtomicUsize::new(failures))))
                    .with_reference("peer", "b"),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "b",
                BeanDefinition::new(destroy_counting_node_type(destroyed.clone()))
                    .with_reference("peer", "a"),
            )
            .unwrap();
        destroyed
    }

    fn register_cycle(factory: &BeanFactory) {
        factory
            .register_bean_definition(
                "a",
                BeanDefinition::new(node_type()).with_reference("peer", "b"),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "b",
                BeanDefinition::new(node_type()).with_reference("peer", "a"),
            )
            .unwrap();
    }

    fn peer_of(instance: &BeanInstance) -> BeanInstance {
        instance
            .downcast::<Node>()
            .or_else(|| {
                instance
                    .cast::<AopProxy>()
                    .and_then(|proxy| proxy.target().downcast::<Node>())
            })
            .unwrap()
            .peer
            .lock()
            .unwrap()
            .clone()
            .unwrap()
    }

    struct ProxyBeanA;

    impl InterceptionAdvisor for ProxyBeanA {
        fn interceptors_for(
            &self,
            _instance: &BeanInstance,
            name: &str,
        ) -> Option<Vec<MethodInterceptorPtr>> {
            (name == "a").then(Vec::new)
        }
    }

    /// Replaces bean "a" after initialization, without taking part in early references.
    struct LateWrapper;

    impl BeanPostProcessor for LateWrapper {
        fn hooks(&self) -> Hooks {
            Hooks::AFTER_INITIALIZATION
        }

        fn after_initialization(
            &self,
            instance: &BeanInstance,
            name: &str,
        ) -> Result<Option<BeanInstance>, ErrorPtr> {
            Ok((name == "a").then(|| {
                BeanInstance::new(Arc::new(Node::default()), instance.bean_type().clone())
            }))
        }
    }

    #[test]
    fn should_resolve_singleton_cycle_with_final_instances() {
        let factory = BeanFactory::default();
        register_cycle(&factory);

        let a = factory.get_bean("a").unwrap();
        let b = factory.get_bean("b").unwrap();

        assert!(peer_of(&a).is_same(&b));
        assert!(peer_of(&b).is_same(&a));
        assert_eq!(factory.dependent_beans("a"), vec!["b".to_string()]);
        assert_eq!(factory.dependent_beans("b"), vec!["a".to_string()]);
    }

    #[test]
    fn should_inject_early_proxy_into_cycle() {
        let factory = BeanFactoryBuilder::new()
            .with_post_processor(Arc::new(AutoProxyCreator::new(Box::new(ProxyBeanA))))
            .build();
        register_cycle(&factory);

        let a = factory.get_bean("a").unwrap();
        let b = factory.get_bean("b").unwrap();

        assert!(a.bean_type().is_proxy());
        assert!(peer_of(&b).is_same(&a));
        assert_eq!(a.invoke("ping", Vec::new()).unwrap().into_text().unwrap(), "pong");

        let target = a.cast::<AopProxy>().unwrap().target().clone();
        assert!(!target.bean_type().is_proxy());
        assert!(peer_of(&target).is_same(&b));
    }

    #[test]
    fn should_fail_when_raw_instance_was_injected_and_wrapped_later() {
        let factory = BeanFactoryBuilder::new()
            .with_post_processor(Arc::new(LateWrapper))
            .build();
        register_cycle(&factory);

        match factory.get_bean("a").unwrap_err() {
            BeanError::CircularReference { name, reason } => {
                assert_eq!(name, "a");
                assert!(reason.contains("[b]"));
            }
            error => panic!("Unexpected error: {error}"),
        }
        assert!(factory.singleton_names().is_empty());
        assert!(factory.dependent_beans("a").is_empty());
    }

    #[test]
    fn should_discard_dependents_of_failed_singleton() {
        let factory = BeanFactory::default();
        let destroyed = register_failing_cycle(&factory, 1);

        assert!(matches!(
            factory.get_bean("a").unwrap_err(),
            BeanError::Creation { .. }
        ));
        assert!(factory.singleton_names().is_empty());
        assert!(factory.dependent_beans("a").is_empty());
        assert!(factory.dependencies_of("b").is_empty());
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);

        let a = factory.get_bean("a").unwrap();
        let b = factory.get_bean("b").unwrap();

        assert!(peer_of(&b).is_same(&a));
        assert!(peer_of(&a).is_same(&b));
    }

    #[test]
    fn should_not_reuse_early_proxy_of_failed_singleton() {
        let factory = BeanFactoryBuilder::new()
            .with_post_processor(Arc::new(AutoProxyCreator::new(Box::new(ProxyBeanA))))
            .build();
        register_failing_cycle(&factory, 1);

        assert!(factory.get_bean("a").is_err());

        let b = factory.get_bean("b").unwrap();
        let a = factory.get_bean("a").unwrap();

        assert!(a.bean_type().is_proxy());
        assert!(peer_of(&b).is_same(&a));
        let target = a.cast::<AopProxy>().unwrap().target().clone();
        assert!(peer_of(&target).is_same(&b));
    }

    #[test]
    fn should_allow_raw_injection_when_configured() {
        let factory = BeanFactoryBuilder::new()
            .with_config(FactoryConfig {
                allow_raw_injection_despite_wrapping: true,
                ..Default::default()
            })
            .with_post_processor(Arc::new(LateWrapper))
            .build();
        register_cycle(&factory);

        let a = factory.get_bean("a").unwrap();
        let b = factory.get_bean("b").unwrap();

        assert!(!peer_of(&b).is_same(&a));
    }

    #[test]
    fn should_fail_cycle_without_partial_entries_when_disabled() {
        let factory = BeanFactoryBuilder::new()
            .with_config(FactoryConfig {
                allow_circular_references: false,
                ..Default::default()
            })
            .build();
        register_cycle(&factory);

        assert!(matches!(
            factory.get_bean("a").unwrap_err(),
            BeanError::CircularReference { name, .. } if name == "a"
        ));
        assert!(factory.singleton_names().is_empty());

        assert!(matches!(
            factory.get_bean("b").unwrap_err(),
            BeanError::CircularReference { name, .. } if name == "b"
        ));
    }

    #[test]
    fn should_fail_prototype_cycle() {
        let factory = BeanFactory::default();
        factory
            .register_bean_definition(
                "a",
                BeanDefinition::new(node_type())
                    .with_scope(PROTOTYPE)
                    .with_reference("peer", "b"),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "b",
                BeanDefinition::new(node_type())
                    .with_scope(PROTOTYPE)
                    .with_reference("peer", "a"),
            )
            .unwrap();

        assert!(matches!(
            factory.get_bean("a").unwrap_err(),
            BeanError::CircularReference { name, .. } if name == "a"
        ));
        assert!(factory.get_bean("a").is_err());
    }

    #[test]
    fn should_fail_prototype_reentry_before_resolving_depends_on() {
        let constructions = Arc::new(AtomicUsize::new(0));
        let counted = constructions.clone();
        let factory = BeanFactory::default();
        factory
            .register_bean_definition(
                "x",
                BeanDefinition::new(
                    BeanType::builder::<Node>()
                        .constructor(Vec::new(), move |_| {
                            counted.fetch_add(1, Ordering::SeqCst);
                            Ok(Node::default())
                        })
                        .build(),
                )
                .with_scope(PROTOTYPE),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "a",
                BeanDefinition::new(node_type())
                    .with_scope(PROTOTYPE)
                    .with_depends_on("x")
                    .with_reference("peer", "a"),
            )
            .unwrap();

        assert!(matches!(
            factory.get_bean("a").unwrap_err(),
            BeanError::CircularReference { name, .. } if name == "a"
        ));
        assert_eq!(constructions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn should_fail_circular_depends_on() {
        let factory = BeanFactory::default();
        factory
            .register_bean_definition(
                "a",
                BeanDefinition::new(node_type()).with_depends_on("b"),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "b",
                BeanDefinition::new(node_type()).with_depends_on("a"),
            )
            .unwrap();

        assert!(matches!(
            factory.get_bean("a").unwrap_err(),
            BeanError::Definition { .. }
        ));
    }
}
