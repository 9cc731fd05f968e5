//! Functionality related to registering [BeanDefinition]s. The [BeanFactory](crate::factory::BeanFactory)
//! creates instances based on those definitions, which are registered manually or by
//! configuration-time collaborators before the first instance is requested.

use crate::bean_type::BeanType;
use crate::error::{BeanDefinitionRegistryError, BeanError, ErrorPtr};
use crate::instance::{BeanInstancePtr, BeanProvider};
use crate::resolver::DependencyDescriptor;
use crate::scope::{PROTOTYPE, SINGLETON};
use crate::value::Value;
use derivative::Derivative;
use fxhash::{FxHashMap, FxHashSet};
use std::any::Any;
use std::sync::Arc;

pub type InstanceSupplier =
    Arc<dyn Fn(&dyn BeanProvider) -> Result<BeanInstancePtr, ErrorPtr> + Send + Sync>;

/// How unsatisfied bean properties and constructor parameters are filled in.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum AutowireMode {
    /// Only explicitly declared values are used.
    #[default]
    No,
    /// Bean properties are filled with beans named like the property.
    ByName,
    /// Bean properties are filled with the single bean matching the property type.
    ByType,
    /// Constructor parameters are resolved by type.
    Constructor,
}

/// Declared value of a constructor argument or a property, resolved at construction time.
#[derive(Clone, Debug)]
pub enum ValueDefinition {
    /// A literal or an already resolved value.
    Value(Value),
    /// Reference to another bean by name.
    Reference(String),
    /// A dependency resolved by type.
    Dependency(DependencyDescriptor),
    List(Vec<ValueDefinition>),
}

macro_rules! value_definition_from {
    ($($source:ty),*) => {
        $(
            impl From<$source> for ValueDefinition {
                fn from(value: $source) -> Self {
                    ValueDefinition::Value(value.into())
                }
            }
        )*
    };
}

value_definition_from!(Value, bool, i64, f64, String, &str);

impl From<DependencyDescriptor> for ValueDefinition {
    fn from(descriptor: DependencyDescriptor) -> Self {
        ValueDefinition::Dependency(descriptor)
    }
}

/// A single named property assignment.
#[derive(Clone, Debug)]
pub struct PropertyValue {
    pub name: String,
    pub value: ValueDefinition,
}

/// Ordered set of property assignments; adding an existing name replaces the previous value.
#[derive(Clone, Debug, Default)]
pub struct PropertyValues {
    values: Vec<PropertyValue>,
}

impl PropertyValues {
    pub fn add<T: ToString>(&mut self, name: T, value: ValueDefinition) {
        let name = name.to_string();
        match self.values.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.value = value,
            None => self.values.push(PropertyValue { name, value }),
        }
    }

    pub fn with<T: ToString>(mut self, name: T, value: ValueDefinition) -> Self {
        self.add(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ValueDefinition> {
        self.values
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<ValueDefinition> {
        let index = self.values.iter().position(|entry| entry.name == name)?;
        Some(self.values.remove(index).value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyValue> {
        self.values.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Adds all values from `other`, overriding existing ones.
    pub fn merge(&mut self, other: &PropertyValues) {
        for entry in &other.values {
            self.add(&entry.name, entry.value.clone());
        }
    }
}

impl IntoIterator for PropertyValues {
    type Item = PropertyValue;
    type IntoIter = std::vec::IntoIter<PropertyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// Instantiation through a method on another bean.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct FactoryMethod {
    pub factory_bean: String,
    pub method: String,
}

/// Definition of a bean registered in a definition registry.
#[derive(Derivative, Clone, Default)]
#[derivative(Debug)]
pub struct BeanDefinition {
    /// Declared type of the bean.
    pub bean_type: Option<BeanType>,

    /// Name of the type to resolve through the factory type registry, if no type is declared.
    pub type_name: Option<String>,

    /// Name of a definition whose settings are inherited.
    pub parent: Option<String>,

    /// Scope name; singleton when not set.
    pub scope: Option<String>,

    pub constructor_arguments: Vec<ValueDefinition>,

    pub property_values: PropertyValues,

    pub autowire_mode: AutowireMode,

    /// Fail if bean properties remain unset after population.
    pub dependency_check: bool,

    pub init_method: Option<String>,

    pub destroy_method: Option<String>,

    /// With multiple beans matching a requested type, the primary one is selected.
    pub is_primary: bool,

    /// Qualifiers which can be used to select this bean among multiple candidates.
    pub qualifiers: Vec<String>,

    /// Internal definitions skip post-processing.
    pub is_synthetic: bool,

    /// Abstract definitions only serve as parents.
    pub is_abstract: bool,

    /// Lazy singletons are not created eagerly on refresh.
    pub lazy_init: bool,

    /// Beans which need to be created before this one.
    pub depends_on: Vec<String>,

    #[derivative(Debug = "ignore")]
    pub instance_supplier: Option<InstanceSupplier>,

    pub factory_method: Option<FactoryMethod>,
}

impl BeanDefinition {
    pub fn new(bean_type: BeanType) -> Self {
        Self {
            bean_type: Some(bean_type),
            ..Default::default()
        }
    }

    /// Creates a definition with a type resolved by name at construction time.
    pub fn with_type_name<T: ToString>(type_name: T) -> Self {
        Self {
            type_name: Some(type_name.to_string()),
            ..Default::default()
        }
    }

    /// Creates a child definition inheriting from `parent`.
    pub fn child<T: ToString>(parent: T) -> Self {
        Self {
            parent: Some(parent.to_string()),
            ..Default::default()
        }
    }

    pub fn with_scope<T: ToString>(mut self, scope: T) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    pub fn with_property<T: ToString, V: Into<ValueDefinition>>(mut self, name: T, value: V) -> Self {
        self.property_values.add(name, value.into());
        self
    }

    pub fn with_reference<T: ToString, R: ToString>(self, name: T, bean_name: R) -> Self {
        self.with_property(name, ValueDefinition::Reference(bean_name.to_string()))
    }

    pub fn with_constructor_argument<V: Into<ValueDefinition>>(mut self, value: V) -> Self {
        self.constructor_arguments.push(value.into());
        self
    }

    pub fn with_autowire_mode(mut self, autowire_mode: AutowireMode) -> Self {
        self.autowire_mode = autowire_mode;
        self
    }

    pub fn with_dependency_check(mut self) -> Self {
        self.dependency_check = true;
        self
    }

    pub fn with_init_method<T: ToString>(mut self, method: T) -> Self {
        self.init_method = Some(method.to_string());
        self
    }

    pub fn with_destroy_method<T: ToString>(mut self, method: T) -> Self {
        self.destroy_method = Some(method.to_string());
        self
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    pub fn with_qualifier<T: ToString>(mut self, qualifier: T) -> Self {
        self.qualifiers.push(qualifier.to_string());
        self
    }

    pub fn synthetic(mut self) -> Self {
        self.is_synthetic = true;
        self
    }

    pub fn abstract_definition(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn lazy(mut self) -> Self {
        self.lazy_init = true;
        self
    }

    pub fn with_depends_on<T: ToString>(mut self, name: T) -> Self {
        self.depends_on.push(name.to_string());
        self
    }

    pub fn with_parent<T: ToString>(mut self, parent: T) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    /// Uses given callback to create raw instances, instead of the type constructor.
    pub fn with_supplier<T, F>(mut self, supplier: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&dyn BeanProvider) -> Result<T, ErrorPtr> + Send + Sync + 'static,
    {
        self.instance_supplier = Some(Arc::new(move |provider| {
            supplier(provider).map(|instance| Arc::new(instance) as BeanInstancePtr)
        }));
        self
    }

    /// Creates instances by invoking `method` on the bean named `factory_bean`.
    pub fn with_factory_method<B: ToString, M: ToString>(mut self, factory_bean: B, method: M) -> Self {
        self.factory_method = Some(FactoryMethod {
            factory_bean: factory_bean.to_string(),
            method: method.to_string(),
        });
        self
    }

    /// Returns the effective scope name.
    pub fn scope(&self) -> &str {
        self.scope.as_deref().unwrap_or(SINGLETON)
    }

    #[inline]
    pub fn is_singleton(&self) -> bool {
        self.scope() == SINGLETON
    }

    #[inline]
    pub fn is_prototype(&self) -> bool {
        self.scope() == PROTOTYPE
    }

    /// Checks if given qualifier selects this definition.
    pub fn has_qualifier(&self, qualifier: &str) -> bool {
        self.qualifiers.iter().any(|candidate| candidate == qualifier)
    }

    /// Applies this (child) definition on top of `parent`. Type, scope, lifecycle methods and the
    /// instantiation mechanism are inherited when not set; property values are merged; everything
    /// else comes from the child.
    pub fn merged_with_parent(&self, parent: &BeanDefinition) -> BeanDefinition {
        let mut property_values = parent.property_values.clone();
        property_values.merge(&self.property_values);

        BeanDefinition {
            bean_type: self.bean_type.clone().or_else(|| parent.bean_type.clone()),
            type_name: if self.bean_type.is_some() {
                self.type_name.clone()
            } else {
                self.type_name.clone().or_else(|| parent.type_name.clone())
            },
            parent: None,
            scope: self.scope.clone().or_else(|| parent.scope.clone()),
            constructor_arguments: if self.constructor_arguments.is_empty() {
                parent.constructor_arguments.clone()
            } else {
                self.constructor_arguments.clone()
            },
            property_values,
            autowire_mode: self.autowire_mode,
            dependency_check: self.dependency_check,
            init_method: self.init_method.clone().or_else(|| parent.init_method.clone()),
            destroy_method: self
                .destroy_method
                .clone()
                .or_else(|| parent.destroy_method.clone()),
            is_primary: self.is_primary,
            qualifiers: self.qualifiers.clone(),
            is_synthetic: self.is_synthetic,
            is_abstract: self.is_abstract,
            lazy_init: self.lazy_init,
            depends_on: self.depends_on.clone(),
            instance_supplier: self
                .instance_supplier
                .clone()
                .or_else(|| parent.instance_supplier.clone()),
            factory_method: self
                .factory_method
                .clone()
                .or_else(|| parent.factory_method.clone()),
        }
    }
}

/// A registry of bean definitions which can be used when requesting instances from a
/// [BeanFactory](crate::factory::BeanFactory).
pub trait BeanDefinitionRegistry {
    /// Adds a new definition. Handling of duplicate names is registry-dependent.
    fn register_bean_definition(
        &mut self,
        name: &str,
        definition: BeanDefinition,
    ) -> Result<(), BeanDefinitionRegistryError>;

    fn remove_bean_definition(
        &mut self,
        name: &str,
    ) -> Result<BeanDefinition, BeanDefinitionRegistryError>;

    /// Returns a definition registered under given (canonical) name.
    fn bean_definition(&self, name: &str) -> Option<&BeanDefinition>;

    /// Mutable access for configuration-time collaborators.
    fn bean_definition_mut(&mut self, name: &str) -> Option<&mut BeanDefinition>;

    fn contains_bean_definition(&self, name: &str) -> bool;

    /// Returns all definition names in declaration order.
    fn bean_definition_names(&self) -> Vec<String>;

    fn register_alias(&mut self, name: &str, alias: &str)
        -> Result<(), BeanDefinitionRegistryError>;

    /// Resolves aliases to the canonical bean name.
    fn canonical_name(&self, name: &str) -> String;

    fn aliases(&self, name: &str) -> Vec<String>;
}

/// Default registry keeping definitions in declaration order.
#[derive(Clone, Debug)]
pub struct DefaultBeanDefinitionRegistry {
    definitions: FxHashMap<String, BeanDefinition>,
    names: Vec<String>,
    aliases: FxHashMap<String, String>,
    allow_definition_overriding: bool,
}

impl Default for DefaultBeanDefinitionRegistry {
    fn default() -> Self {
        Self::new(true)
    }
}

impl DefaultBeanDefinitionRegistry {
    pub fn new(allow_definition_overriding: bool) -> Self {
        Self {
            definitions: Default::default(),
            names: Vec::new(),
            aliases: Default::default(),
            allow_definition_overriding,
        }
    }

    fn alias_resolves_to(&self, alias: &str, name: &str) -> bool {
        let mut visited = FxHashSet::default();
        let mut current = alias;
        while let Some(target) = self.aliases.get(current) {
            if target == name {
                return true;
            }
            if !visited.insert(target.as_str()) {
                return false;
            }
            current = target;
        }
        false
    }
}

impl BeanDefinitionRegistry for DefaultBeanDefinitionRegistry {
    fn register_bean_definition(
        &mut self,
        name: &str,
        definition: BeanDefinition,
    ) -> Result<(), BeanDefinitionRegistryError> {
        if self.definitions.contains_key(name) {
            if !self.allow_definition_overriding {
                return Err(BeanDefinitionRegistryError::DuplicateBeanName(
                    name.to_string(),
                ));
            }
        } else {
            self.names.push(name.to_string());
        }

        // a definition shadows an alias with the same name
        self.aliases.remove(name);
        self.definitions.insert(name.to_string(), definition);
        Ok(())
    }

    fn remove_bean_definition(
        &mut self,
        name: &str,
    ) -> Result<BeanDefinition, BeanDefinitionRegistryError> {
        let definition = self
            .definitions
            .remove(name)
            .ok_or_else(|| BeanDefinitionRegistryError::NoSuchDefinition(name.to_string()))?;
        self.names.retain(|existing| existing != name);
        Ok(definition)
    }

    #[inline]
    fn bean_definition(&self, name: &str) -> Option<&BeanDefinition> {
        self.definitions.get(name)
    }

    #[inline]
    fn bean_definition_mut(&mut self, name: &str) -> Option<&mut BeanDefinition> {
        self.definitions.get_mut(name)
    }

    #[inline]
    fn contains_bean_definition(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    #[inline]
    fn bean_definition_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn register_alias(
        &mut self,
        name: &str,
        alias: &str,
    ) -> Result<(), BeanDefinitionRegistryError> {
        if alias == name {
            self.aliases.remove(alias);
            return Ok(());
        }

        if let Some(existing) = self.aliases.get(alias) {
            if existing == name {
                return Ok(());
            }
            if !self.allow_definition_overriding {
                return Err(BeanDefinitionRegistryError::DuplicateAlias {
                    alias: alias.to_string(),
                    name: name.to_string(),
                    existing: existing.clone(),
                });
            }
        }

        if self.alias_resolves_to(name, alias) {
            return Err(BeanDefinitionRegistryError::AliasCycle {
                alias: alias.to_string(),
                name: name.to_string(),
            });
        }

        self.aliases.insert(alias.to_string(), name.to_string());
        Ok(())
    }

    fn canonical_name(&self, name: &str) -> String {
        let mut visited = FxHashSet::default();
        let mut current = name;
        while let Some(target) = self.aliases.get(current) {
            if !visited.insert(current) {
                break;
            }
            current = target;
        }
        current.to_string()
    }

    fn aliases(&self, name: &str) -> Vec<String> {
        let mut aliases: Vec<String> = self
            .aliases
            .keys()
            .filter(|alias| self.alias_resolves_to(alias, name))
            .cloned()
            .collect();
        aliases.sort();
        aliases
    }
}

/// Resolves the parent chain of `name` into a single, parent-free definition.
pub fn merge_bean_definition(
    registry: &dyn BeanDefinitionRegistry,
    name: &str,
) -> Result<BeanDefinition, BeanError> {
    let definition = registry
        .bean_definition(name)
        .ok_or_else(|| BeanError::NoSuchBean(name.to_string()))?;

    let mut chain = vec![definition];
    let mut visited: FxHashSet<String> = FxHashSet::default();
    visited.insert(name.to_string());

    while let Some(parent_name) = chain
        .last()
        .copied()
        .and_then(|definition| definition.parent.as_deref())
    {
        let parent_name = registry.canonical_name(parent_name);
        if !visited.insert(parent_name.clone()) {
            return Err(BeanDefinitionRegistryError::ParentCycle(name.to_string()).into());
        }

        let parent = registry.bean_definition(&parent_name).ok_or_else(|| {
            BeanDefinitionRegistryError::MissingParent {
                name: name.to_string(),
                parent: parent_name.clone(),
            }
        })?;
        chain.push(parent);
    }

    let mut chain = chain.into_iter().rev();
    let root = chain.next().cloned().unwrap_or_default();
    Ok(chain.fold(root, |merged, child| child.merged_with_parent(&merged)))
}

#[cfg(test)]
mod tests {
    use crate::bean_type::BeanType;
    use crate::definition_registry::{
        merge_bean_definition, BeanDefinition, BeanDefinitionRegistry,
        DefaultBeanDefinitionRegistry, ValueDefinition,
    };
    use crate::error::{BeanDefinitionRegistryError, BeanError};
    use crate::scope::PROTOTYPE;
    use crate::value::Value;

    #[derive(Default)]
    struct TestBean;

    fn create_definition() -> BeanDefinition {
        BeanDefinition::new(BeanType::builder::<TestBean>().default_constructor().build())
    }

    #[test]
    fn should_register_definition() {
        let mut registry = DefaultBeanDefinitionRegistry::new(false);
        registry
            .register_bean_definition("a", create_definition())
            .unwrap();

        assert!(registry.contains_bean_definition("a"));
        assert!(registry.bean_definition("a").unwrap().is_singleton());
        assert_eq!(registry.bean_definition_names(), vec!["a".to_string()]);
    }

    #[test]
    fn should_not_register_duplicate_name() {
        let mut registry = DefaultBeanDefinitionRegistry::new(false);
        registry
            .register_bean_definition("a", create_definition())
            .unwrap();

        assert_eq!(
            registry
                .register_bean_definition("a", create_definition())
                .unwrap_err(),
            BeanDefinitionRegistryError::DuplicateBeanName("a".to_string())
        );
    }

    #[test]
    fn should_override_duplicate_name_keeping_declaration_order() {
        let mut registry = DefaultBeanDefinitionRegistry::new(true);
        registry
            .register_bean_definition("a", create_definition())
            .unwrap();
        registry
            .register_bean_definition("b", create_definition())
            .unwrap();
        registry
            .register_bean_definition("a", create_definition().with_scope(PROTOTYPE))
            .unwrap();

        assert!(registry.bean_definition("a").unwrap().is_prototype());
        assert_eq!(
            registry.bean_definition_names(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn should_resolve_aliases() {
        let mut registry = DefaultBeanDefinitionRegistry::default();
        registry
            .register_bean_definition("a", create_definition())
            .unwrap();
        registry.register_alias("a", "b").unwrap();
        registry.register_alias("b", "c").unwrap();

        assert_eq!(registry.canonical_name("c"), "a");
        assert_eq!(registry.canonical_name("a"), "a");
        assert_eq!(registry.aliases("a"), vec!["b".to_string(), "c".to_string()]);
        assert!(matches!(
            registry.register_alias("c", "a").unwrap_err(),
            BeanDefinitionRegistryError::AliasCycle { .. }
        ));
    }

    #[test]
    fn should_merge_parent_definitions() {
        let mut registry = DefaultBeanDefinitionRegistry::default();
        registry
            .register_bean_definition(
                "parent",
                create_definition()
                    .abstract_definition()
                    .with_scope(PROTOTYPE)
                    .with_init_method("init")
                    .with_property("a", Value::Int(1))
                    .with_property("b", Value::Int(2)),
            )
            .unwrap();
        registry
            .register_bean_definition(
                "child",
                BeanDefinition::child("parent").with_property("b", Value::Int(3)),
            )
            .unwrap();

        let merged = merge_bean_definition(&registry, "child").unwrap();

        assert!(merged.bean_type.is_some());
        assert!(merged.is_prototype());
        assert!(!merged.is_abstract);
        assert_eq!(merged.init_method.as_deref(), Some("init"));
        assert!(matches!(
            merged.property_values.get("b"),
            Some(ValueDefinition::Value(Value::Int(3)))
        ));
        assert!(merged.property_values.contains("a"));
    }

    #[test]
    fn should_reject_missing_parent() {
        let mut registry = DefaultBeanDefinitionRegistry::default();
        registry
            .register_bean_definition("child", BeanDefinition::child("parent"))
            .unwrap();

        assert!(matches!(
            merge_bean_definition(&registry, "child").unwrap_err(),
            BeanError::Registry(BeanDefinitionRegistryError::MissingParent { .. })
        ));
    }

    #[test]
    fn should_reject_parent_cycles() {
        let mut registry = DefaultBeanDefinitionRegistry::default();
        registry
            .register_bean_definition("a", BeanDefinition::child("b"))
            .unwrap();
        registry
            .register_bean_definition("b", BeanDefinition::child("a"))
            .unwrap();

        assert!(matches!(
            merge_bean_definition(&registry, "a").unwrap_err(),
            BeanError::Registry(BeanDefinitionRegistryError::ParentCycle(_))
        ));
    }
}
