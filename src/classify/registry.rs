use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use super::backend::OccupancyClassifier;

/// Registry of classifier backends, keyed by backend name.
///
/// Classifiers take `&self`, so they are shared as plain `Arc`s.
pub struct ClassifierRegistry {
    backends: HashMap<String, Arc<dyn OccupancyClassifier>>,
    default_name: Option<String>,
}

impl ClassifierRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<C: OccupancyClassifier + 'static>(&mut self, classifier: C) {
        let name = classifier.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Arc::new(classifier));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("classifier '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// Get backend by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn OccupancyClassifier>> {
        self.backends.get(name).cloned()
    }

    /// Get default backend.
    pub fn default_classifier(&self) -> Option<Arc<dyn OccupancyClassifier>> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// List registered backends, sorted by name.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolve a backend by name, or the default when `name` is `None`.
    pub fn select(&self, name: Option<&str>) -> Result<Arc<dyn OccupancyClassifier>> {
        let classifier = match name {
            Some(name) => self.get(name).ok_or_else(|| {
                anyhow!(
                    "classifier '{}' not registered (available: {})",
                    name,
                    self.list().join(", ")
                )
            })?,
            None => self
                .default_classifier()
                .ok_or_else(|| anyhow!("no classifier registered"))?,
        };
        classifier.warm_up()?;
        Ok(classifier)
    }
}

impl Default for ClassifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}
