//! # ssair Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the ssair library. Import this module to get quick access to everything needed
//! to build a function, optimize it, select instructions and package the result.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all ssair operations
pub use crate::Error;

/// The result type used throughout ssair
pub use crate::Result;

// ================================================================================================
// Intermediate Representation
// ================================================================================================

/// Functions, blocks and statements
pub use crate::ir::{BasicBlock, BlockId, Function, FunctionBuilder, Stmt, StmtKind};

/// Expressions and their building blocks
pub use crate::ir::{AluOp, ConstValue, Expr, ExprKind, Name, RegExpFlags, Temp};

/// The type lattice
pub use crate::ir::{IrType, JoinSemiLattice};

// ================================================================================================
// Optimization Pipeline
// ================================================================================================

/// Pipeline driver, configuration and counters
pub use crate::compiler::{
    compile_functions, Optimizer, OptimizerConfig, PipelineOutput, PipelineStats,
};

/// Pass trait and the state shared between passes
pub use crate::compiler::{Pass, PassContext};

/// Inferred types of a function
pub use crate::compiler::passes::TypeEnv;

// ================================================================================================
// Instruction Selection
// ================================================================================================

/// The selector and the bytecode it produces
pub use crate::isel::{decode, InstructionSelection, Instr, Registry, SelectedFunction};

// ================================================================================================
// Compiled Units
// ================================================================================================

/// Building, reading and caching compiled units
pub use crate::unit::{
    CacheConfig, CompiledUnit, UnitBuilder, UnitCache, UnitError, UnitFlags, UnitHeader,
};
