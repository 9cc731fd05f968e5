//! Resolution of dependencies by type, including tie-breaking between multiple candidates.

use crate::bean_type::TypeKey;
use crate::error::BeanError;
use crate::factory::BeanFactory;
use crate::value::Value;
use itertools::Itertools;
use tracing::trace;

/// Whether a single bean or all matching beans are requested.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Multiplicity {
    #[default]
    Single,
    Collection,
}

/// Describes a dependency to resolve by type: a constructor parameter, a property or a direct
/// lookup.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct DependencyDescriptor {
    pub type_key: TypeKey,
    /// Name of the injection point, used as a last resort to pick among multiple candidates.
    pub name: Option<String>,
    pub qualifier: Option<String>,
    pub required: bool,
    pub multiplicity: Multiplicity,
}

impl DependencyDescriptor {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::for_type(TypeKey::of::<T>())
    }

    pub fn for_type(type_key: TypeKey) -> Self {
        Self {
            type_key,
            name: None,
            qualifier: None,
            required: true,
            multiplicity: Multiplicity::Single,
        }
    }

    pub fn with_name<T: ToString>(mut self, name: T) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_qualifier<T: ToString>(mut self, qualifier: T) -> Self {
        self.qualifier = Some(qualifier.to_string());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn collection(mut self) -> Self {
        self.multiplicity = Multiplicity::Collection;
        self
    }
}

impl BeanFactory {
    /// Resolves a dependency on behalf of `requesting_bean`, which gets registered as a dependent of
    /// every resolved bean. Missing optional single dependencies resolve to [Value::Null]; missing
    /// optional collections to an empty list.
    pub fn resolve_dependency(
        &self,
        descriptor: &DependencyDescriptor,
        requesting_bean: Option<&str>,
    ) -> Result<Value, BeanError> {
        let candidates = self.autowire_candidates(descriptor, requesting_bean);
        trace!(
            type_name = descriptor.type_key.name(),
            ?candidates,
            "Resolving dependency."
        );

        match descriptor.multiplicity {
            Multiplicity::Collection => {
                if candidates.is_empty() && descriptor.required {
                    return Err(BeanError::NoBeanOfType(
                        descriptor.type_key.name().to_string(),
                    ));
                }

                candidates
                    .iter()
                    .map(|name| self.resolve_candidate(name, requesting_bean))
                    .try_collect::<_, Vec<_>, _>()
                    .map(Value::List)
            }
            Multiplicity::Single => match candidates.as_slice() {
                [] => {
                    if descriptor.required {
                        Err(BeanError::NoBeanOfType(
                            descriptor.type_key.name().to_string(),
                        ))
                    } else {
                        Ok(Value::Null)
                    }
                }
                [name] => self.resolve_candidate(name, requesting_bean),
                _ => {
                    let name = self.determine_candidate(descriptor, &candidates)?;
                    self.resolve_candidate(&name, requesting_bean)
                }
            },
        }
    }

    fn resolve_candidate(
        &self,
        name: &str,
        requesting_bean: Option<&str>,
    ) -> Result<Value, BeanError> {
        let instance = self.get_bean(name)?;
        if let Some(requesting_bean) = requesting_bean {
            self.singletons.register_dependent(name, requesting_bean);
        }
        Ok(Value::Bean(instance))
    }

    /// Candidate names in declaration order. A bean never satisfies its own dependency, unless it
    /// is the only candidate.
    fn autowire_candidates(
        &self,
        descriptor: &DependencyDescriptor,
        requesting_bean: Option<&str>,
    ) -> Vec<String> {
        let candidates = self.bean_names_for_type(&descriptor.type_key);
        match requesting_bean {
            Some(requesting_bean) if candidates.len() > 1 => {
                let others = candidates
                    .iter()
                    .filter(|name| *name != requesting_bean)
                    .cloned()
                    .collect_vec();
                if others.is_empty() {
                    candidates
                } else {
                    others
                }
            }
            _ => candidates,
        }
    }

    /// Picks a single candidate: the primary one, then the qualified one, then the one named like
    /// the injection point, then optionally the first declared one.
    fn determine_candidate(
        &self,
        descriptor: &DependencyDescriptor,
        candidates: &[String],
    ) -> Result<String, BeanError> {
        let primary = candidates
            .iter()
            .filter(|name| self.is_primary(name))
            .cloned()
            .collect_vec();
        match primary.len() {
            0 => {}
            1 => return Ok(primary[0].clone()),
            _ => {
                return Err(BeanError::NoUniqueBean {
                    type_name: descriptor.type_key.name().to_string(),
                    candidates: primary,
                })
            }
        }

        if let Some(qualifier) = &descriptor.qualifier {
            let qualified = candidates
                .iter()
                .filter(|name| self.matches_qualifier(name, qualifier))
                .collect_vec();
            if let [name] = qualified.as_slice() {
                return Ok((*name).clone());
            }
        }

        if let Some(injection_name) = &descriptor.name {
            if let Some(name) = candidates
                .iter()
                .find(|name| self.matches_name(name, injection_name))
            {
                return Ok(name.clone());
            }
        }

        if self.config.fallback_to_declaration_order {
            if let Some(name) = candidates.first() {
                trace!(bean = %name, "Falling back to declaration order.");
                return Ok(name.clone());
            }
        }

        Err(BeanError::NoUniqueBean {
            type_name: descriptor.type_key.name().to_string(),
            candidates: candidates.to_vec(),
        })
    }

    fn matches_qualifier(&self, name: &str, qualifier: &str) -> bool {
        self.matches_name(name, qualifier)
            || self
                .merged_definition(name)
                .map(|merged| merged.definition().has_qualifier(qualifier))
                .unwrap_or(false)
    }

    fn matches_name(&self, name: &str, candidate_name: &str) -> bool {
        name == candidate_name || self.aliases(name).iter().any(|alias| alias == candidate_name)
    }
}
