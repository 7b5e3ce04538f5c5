//! Pipeline configuration.

/// Switches for the optional stages of the [`crate::compiler::Optimizer`].
///
/// Pruning and linearization always run. Every other stage hangs off `ssa`: with it
/// off, the function is only linearized.
///
/// # Examples
///
/// ```rust,no_run
/// use ssair::compiler::OptimizerConfig;
///
/// let config = OptimizerConfig {
///     type_propagation: false,
///     ..OptimizerConfig::default()
/// };
/// assert!(config.dead_code_elimination);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizerConfig {
    /// Convert to SSA form and back. Functions containing a protected region skip
    /// conversion regardless.
    pub ssa: bool,
    /// Remove phi webs that only feed each other.
    pub phi_cleanup: bool,
    /// Remove unused, effect-free definitions.
    pub dead_code_elimination: bool,
    /// Infer a type for every SSA name and annotate expressions.
    pub type_inference: bool,
    /// Push expected types into numeric constants. Requires `type_inference`.
    pub type_propagation: bool,
    /// Assert that no critical edge survived splitting.
    pub verify_critical_edges: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            ssa: true,
            phi_cleanup: true,
            dead_code_elimination: true,
            type_inference: true,
            type_propagation: true,
            verify_critical_edges: true,
        }
    }
}

impl OptimizerConfig {
    /// Only prunes and linearizes.
    #[must_use]
    pub fn disabled() -> Self {
        OptimizerConfig {
            ssa: false,
            phi_cleanup: false,
            dead_code_elimination: false,
            type_inference: false,
            type_propagation: false,
            verify_critical_edges: false,
        }
    }

    /// Converts to SSA form and straight back, without any optimization in between.
    #[must_use]
    pub fn minimal() -> Self {
        OptimizerConfig {
            ssa: true,
            verify_critical_edges: true,
            ..Self::disabled()
        }
    }
}
