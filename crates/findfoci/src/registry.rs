use std::collections::HashMap;

use crate::{error::FociError, pipeline::FociResult};

/// A caller-owned store of named results.
///
/// The search never reads or writes a registry; callers that want to keep
/// results for later use hold one themselves.
///
/// # Example
///
/// ```
/// use findfoci::pipeline::FociResult;
/// use findfoci::registry::ResultRegistry;
///
/// let mut registry = ResultRegistry::new();
/// let result = FociResult { peaks: Vec::new(), statistics: Default::default(), label_volume: None };
/// registry.insert("cells", result);
///
/// assert_eq!(registry.names(), vec!["cells".to_string()]);
/// assert!(registry.get("cells").is_some());
/// ```
#[derive(Debug, Default)]
pub struct ResultRegistry {
    results: HashMap<String, FociResult>,
}

impl ResultRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a result, returning the one previously stored under the name.
    pub fn insert(&mut self, name: impl Into<String>, result: FociResult) -> Option<FociResult> {
        self.results.insert(name.into(), result)
    }

    /// The result stored under a name.
    pub fn get(&self, name: &str) -> Option<&FociResult> {
        self.results.get(name)
    }

    /// Remove and return the result stored under a name.
    pub fn remove(&mut self, name: &str) -> Option<FociResult> {
        self.results.remove(name)
    }

    /// The stored names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.results.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of stored results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Remove all results.
    pub fn clear(&mut self) {
        self.results.clear();
    }

    /// Serialize the peaks and statistics of a stored result to JSON.
    pub fn to_json(&self, name: &str) -> Result<Option<String>, FociError> {
        self.results
            .get(name)
            .map(serde_json::to_string_pretty)
            .transpose()
            .map_err(FociError::from)
    }
}
