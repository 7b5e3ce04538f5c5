// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
#![allow(clippy::too_many_arguments)]

//! # ssair
//!
//! An SSA middle end for a register/temporary based script IR, together with the
//! instruction selector that lowers optimized IR into linear bytecode and the
//! relocatable compiled-unit container that bytecode is persisted in.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────────────────────────────────────┐   ┌──────────────┐
//! │  Front end   │──►│                  compiler                   │──►│     isel     │
//! │ (ir::Function│   │ prune ─► dominators ─► phis ─► rename ─►    │   │ bytecode +   │
//! │  builder)    │   │ def/use ─► phi cleanup ─► DCE ─► types ─►   │   │ jump patches │
//! └──────────────┘   │ split edges ─► deconstruct ─► linearize     │   └──────┬───────┘
//!                    └─────────────────────────────────────────────┘          │
//!                                                                             ▼
//!                                                           ┌───────────────────────────┐
//!                                                           │ unit: build / save / load │
//!                                                           │ verify / shared UnitCache │
//!                                                           └───────────────────────────┘
//! ```
//!
//! - [`ir`] - The IR model: functions, arena-allocated basic blocks, statements,
//!   expressions and the type lattice.
//! - [`utils::graph`] - Graph traits, traversal and Lengauer-Tarjan dominators.
//! - [`ssa`] - SSA construction and deconstruction building blocks.
//! - [`compiler`] - The optimization passes and the [`compiler::Optimizer`] driver.
//! - [`isel`] - Instruction selection into the bytecode format.
//! - [`unit`] - The compiled-unit container, its verification and the unit cache.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use ssair::prelude::*;
//!
//! // function f(a) { var x; if (a) x = 1; else x = 2; return x; }
//! let mut b = FunctionBuilder::new("f", 1, 1);
//! let entry = b.entry();
//! let then_bb = b.new_block();
//! let else_bb = b.new_block();
//! let exit = b.new_block();
//! b.cjump(entry, Expr::temp(0), then_bb, else_bb)?;
//! b.move_to(then_bb, Expr::temp(1), Expr::number(1.0))?;
//! b.jump(then_bb, exit)?;
//! b.move_to(else_bb, Expr::temp(1), Expr::number(2.0))?;
//! b.jump(else_bb, exit)?;
//! b.ret(exit, Expr::temp(1))?;
//! let mut function = b.build()?;
//!
//! let output = Optimizer::new(OptimizerConfig::default()).run(&mut function)?;
//! println!("{} phis placed", output.stats.phis_inserted);
//!
//! let mut unit = UnitBuilder::new("/tmp/f.js");
//! let selected = InstructionSelection::default().select(&function, &mut unit)?;
//! let index = unit.add_selected(&selected);
//! unit.set_root_function(index);
//! let bytes = unit.build()?;
//! # Ok::<(), ssair::Error>(())
//! ```

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use ssair::prelude::*;
///
/// let mut builder = FunctionBuilder::new("empty", 0, 0);
/// builder.ret(builder.entry(), Expr::undefined())?;
/// let function = builder.build()?;
/// assert_eq!(function.block_count(), 1);
/// # Ok::<(), ssair::Error>(())
/// ```
pub mod prelude;

/// Shared utilities: graph abstractions and algorithms.
pub mod utils;

/// The intermediate representation consumed and mutated by the pipeline.
///
/// Functions own an arena of basic blocks addressed by [`ir::BlockId`]. Statements
/// and expressions are plain sum types, so every pass is a pattern match over the IR
/// instead of a visitor hierarchy.
pub mod ir;

/// SSA construction and deconstruction.
///
/// Each submodule implements one stage of the pipeline and can be used on its own;
/// [`compiler::Optimizer`] chains them in the required order.
pub mod ssa;

/// Optimization passes and the pipeline driver.
pub mod compiler;

/// Instruction selection from non-SSA IR into linear bytecode.
pub mod isel;

/// The compiled-unit container: layout, builder, read-only view, verification,
/// cache paths and the shared unit cache.
pub mod unit;

/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
///
/// # Examples
///
/// ```rust,no_run
/// use ssair::{Result, ir::{Expr, Function, FunctionBuilder}};
///
/// fn empty() -> Result<Function> {
///     let mut builder = FunctionBuilder::new("empty", 0, 0);
///     builder.ret(builder.entry(), Expr::undefined())?;
///     builder.build()
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `ssair` Error type
///
/// The main error type for all operations in this crate. Invariant violations inside
/// the SSA pipeline are assertions and never surface through this type.
///
/// # Examples
///
/// ```rust,no_run
/// use ssair::{Error, unit::{UnitCache, CacheConfig, UnitError}};
///
/// let cache = UnitCache::new(CacheConfig::from_env());
/// match cache.load("/src/main.js".as_ref()) {
///     Ok(unit) => println!("loaded {} functions", unit.header().function_table_size),
///     Err(Error::UnitVerification(UnitError::BadMagic)) => println!("corrupt cache file"),
///     Err(e) => println!("falling back to compilation: {}", e),
/// }
/// ```
pub use error::Error;

/// Low-level byte backends used by the compiled-unit reader.
pub use file::{Backend, Memory, Physical};
