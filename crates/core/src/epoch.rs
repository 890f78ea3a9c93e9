//! Version epochs and the store names derived from them.

/// A named generation of cache stores.
///
/// Every deployed version owns exactly two stores: a static one filled from
/// the install manifest and a dynamic one filled at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Epoch {
    prefix: String,
    version: String,
}

impl Epoch {
    pub fn new(prefix: impl Into<String>, version: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), version: version.into() }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// `<prefix>-static-v<version>`
    pub fn static_store(&self) -> String {
        format!("{}-static-v{}", self.prefix, self.version)
    }

    /// `<prefix>-dynamic-v<version>`
    pub fn dynamic_store(&self) -> String {
        format!("{}-dynamic-v{}", self.prefix, self.version)
    }

    /// Stores that survive activation of this epoch, in lookup order.
    pub fn whitelist(&self) -> Vec<String> {
        vec![self.static_store(), self.dynamic_store()]
    }

    pub fn owns(&self, store: &str) -> bool {
        store == self.static_store() || store == self.dynamic_store()
    }
}
