//! Explicit learner registry.
//!
//! Maps string identifiers to learner factories, validated when registered.
//! Callers resolve by name instead of any runtime introspection.

use crate::classify::baseline::MajorityClass;
use crate::classify::centroid::NearestCentroid;
use crate::classify::Learner;
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::Arc;

type LearnerFactory = Arc<dyn Fn() -> Arc<dyn Learner> + Send + Sync>;

/// Registry of available learners.
pub struct LearnerRegistry {
    factories: BTreeMap<String, LearnerFactory>,
}

impl LearnerRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register a factory under `name`. The name must be non-empty, unique,
    /// and agree with what the constructed learner reports.
    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<()>
    where
        F: Fn() -> Arc<dyn Learner> + Send + Sync + 'static,
    {
        if name.is_empty() {
            return Err(Error::Config("learner name must not be empty".into()));
        }
        if self.factories.contains_key(name) {
            return Err(Error::Config(format!("learner {name:?} already registered")));
        }
        let probe = factory();
        if probe.name() != name {
            return Err(Error::Config(format!(
                "factory registered as {name:?} constructs learner {:?}",
                probe.name()
            )));
        }
        self.factories.insert(name.to_string(), Arc::new(factory));
        Ok(())
    }

    /// Construct the learner registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Learner>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| {
                Error::Classifier(format!(
                    "no learner {name:?}; available: {:?}",
                    self.names()
                ))
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl Default for LearnerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static DEFAULT_REGISTRY: Lazy<LearnerRegistry> = Lazy::new(|| {
    let mut registry = LearnerRegistry::new();
    registry
        .register("majority", || Arc::new(MajorityClass))
        .expect("built-in learner registration");
    registry
        .register("centroid", || Arc::new(NearestCentroid))
        .expect("built-in learner registration");
    registry
});

/// The registry holding the built-in learners.
pub fn default_registry() -> &'static LearnerRegistry {
    &DEFAULT_REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_learners_resolve() {
        let registry = default_registry();
        assert_eq!(registry.resolve("majority").unwrap().name(), "majority");
        assert_eq!(registry.resolve("centroid").unwrap().name(), "centroid");
        assert!(registry.resolve("forest").is_err());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = LearnerRegistry::new();
        registry
            .register("majority", || Arc::new(MajorityClass))
            .unwrap();
        assert!(registry
            .register("majority", || Arc::new(MajorityClass))
            .is_err());
    }

    #[test]
    fn mismatched_factory_name_is_rejected() {
        let mut registry = LearnerRegistry::new();
        assert!(registry
            .register("misnamed", || Arc::new(MajorityClass))
            .is_err());
    }
}
