//! # Module Registry
//!
//! Holds the consensus modules a node runs, in registration order, with
//! lookup by name.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut registry = ModuleRegistry::new();
//! registry.register(Arc::new(pow))?;
//!
//! // Chain setup, in registration order
//! registry.init_chain_all().await?;
//!
//! // Admission check routed by name
//! registry.check_txn("pow", &txn)?;
//! ```

use crate::entities::SignedTxn;
use crate::module_trait::{DynModule, ModuleError, ModuleErrorKind};
use std::collections::HashMap;
use tracing::{error, info};

/// Name-indexed, insertion-ordered set of consensus modules.
#[derive(Default)]
pub struct ModuleRegistry {
    /// Modules in registration order.
    ordered: Vec<DynModule>,
    /// Position in `ordered` by module name.
    by_name: HashMap<&'static str, usize>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module. Names must be unique.
    pub fn register(&mut self, module: DynModule) -> Result<(), ModuleError> {
        let name = module.name();
        if self.is_registered(name) {
            return Err(ModuleError::new(
                name,
                ModuleErrorKind::DuplicateModule,
                "a module with this name is already registered",
            ));
        }

        info!("[registry] Registering module {}", name);
        self.by_name.insert(name, self.ordered.len());
        self.ordered.push(module);
        Ok(())
    }

    /// Look up a module by name.
    pub fn get(&self, name: &str) -> Result<&DynModule, ModuleError> {
        self.by_name
            .get(name)
            .and_then(|&idx| self.ordered.get(idx))
            .ok_or_else(|| {
                ModuleError::new(name, ModuleErrorKind::ModuleNotFound, "module not registered")
            })
    }

    /// Whether a module is registered under `name`.
    pub fn is_registered(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Modules in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &DynModule> {
        self.ordered.iter()
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.ordered.iter().map(|m| m.name()).collect()
    }

    /// Number of registered modules.
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Whether no module is registered.
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Run `init_chain` on every module in registration order.
    ///
    /// Stops at the first failure.
    pub async fn init_chain_all(&self) -> Result<(), ModuleError> {
        for module in &self.ordered {
            info!("[registry] Initializing chain for {}", module.name());
            if let Err(e) = module.init_chain().await {
                error!("[registry] {} failed to initialize: {}", module.name(), e);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Route an admission check to the module named `name`.
    pub fn check_txn(&self, name: &str, txn: &SignedTxn) -> Result<(), ModuleError> {
        self.get(name)?.check_txn(txn)
    }
}
