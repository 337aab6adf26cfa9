//! Process-wide configuration for the presentation layer.
//!
//! The configuration is chosen once at startup, before any bindings are
//! compiled:
//!
//! ```ignore
//! use horizon_presentation::config::{AccessorStrategy, PresentationConfig};
//!
//! PresentationConfig::default()
//!     .with_accessor_strategy(AccessorStrategy::Reflection)
//!     .install();
//! ```

use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::logging::targets;

/// How binding accessors and comparers are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessorStrategy {
    /// Resolve members once and compose the result into closures.
    #[default]
    Compiled,
    /// Resolve members by name through the type registry on every access.
    Reflection,
}

/// Configuration for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationConfig {
    /// Strategy used for binding accessors and comparer synthesis.
    pub accessor_strategy: AccessorStrategy,
    /// Emit a trace event for every digested object.
    pub trace_digest: bool,
    /// Number of clocks the per-thread clock pool preallocates.
    pub clock_pool_capacity: usize,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            accessor_strategy: AccessorStrategy::default(),
            trace_digest: false,
            clock_pool_capacity: 16,
        }
    }
}

static CONFIG: OnceLock<RwLock<PresentationConfig>> = OnceLock::new();

fn config() -> &'static RwLock<PresentationConfig> {
    CONFIG.get_or_init(|| RwLock::new(PresentationConfig::default()))
}

impl PresentationConfig {
    /// Set the accessor strategy.
    pub fn with_accessor_strategy(mut self, strategy: AccessorStrategy) -> Self {
        self.accessor_strategy = strategy;
        self
    }

    /// Enable or disable per-object digest tracing.
    pub fn with_trace_digest(mut self, enabled: bool) -> Self {
        self.trace_digest = enabled;
        self
    }

    /// Set the clock pool capacity.
    pub fn with_clock_pool_capacity(mut self, capacity: usize) -> Self {
        self.clock_pool_capacity = capacity;
        self
    }

    /// Make this the active configuration.
    ///
    /// Accessors compiled under a different strategy are discarded.
    pub fn install(self) {
        let strategy_changed = {
            let mut current = config().write();
            let changed = current.accessor_strategy != self.accessor_strategy;
            *current = self;
            changed
        };
        if strategy_changed {
            tracing::debug!(target: targets::BINDING, "accessor strategy changed; clearing caches");
            crate::binding::BindingAccessorCompiler::clear_caches();
            crate::comparer::ValueComparerRegistry::clear();
        }
    }

    /// A snapshot of the active configuration.
    pub fn current() -> Self {
        config().read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PresentationConfig::default();
        assert_eq!(config.accessor_strategy, AccessorStrategy::Compiled);
        assert!(!config.trace_digest);
        assert_eq!(config.clock_pool_capacity, 16);
    }

    #[test]
    fn test_builder() {
        let config = PresentationConfig::default()
            .with_accessor_strategy(AccessorStrategy::Reflection)
            .with_trace_digest(true)
            .with_clock_pool_capacity(4);
        assert_eq!(config.accessor_strategy, AccessorStrategy::Reflection);
        assert!(config.trace_digest);
        assert_eq!(config.clock_pool_capacity, 4);
    }
}
