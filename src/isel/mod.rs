//! Instruction selection into linear bytecode.
//!
//! The selector consumes a function the [`crate::compiler::Optimizer`] has finished
//! with: no phi nodes, blocks in their final order. It produces a byte buffer of
//! fixed-layout instruction records operating on argument, local, scratch and scoped
//! slots, with every branch offset already resolved.
//!
//! # Key Components
//!
//! - [`InstructionSelection`] - The selector, configured by [`SelectorConfig`]
//! - [`Registry`] - Receives strings, constants, regexps and name lookups; implemented
//!   by [`crate::unit::UnitBuilder`]
//! - [`Instr`], [`Param`], [`Opcode`] - The instruction set and its encoding
//! - [`CodeBuffer`] - Growable buffer with in-place patching
//! - [`decode`] - Walks a code buffer back into instructions
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use ssair::isel::{decode, Instr};
//!
//! # fn code() -> Vec<u8> { Vec::new() }
//! for (addr, instr) in decode(&code())? {
//!     if let Instr::Push { frame_size } = instr {
//!         println!("{addr}: frame of {frame_size} slots");
//!     }
//! }
//! # Ok::<(), ssair::Error>(())
//! ```

mod buffer;
mod instr;
mod selector;

pub use buffer::CodeBuffer;
pub use instr::{decode, CallArgs, Instr, Opcode, Param, BRANCH_OFFSET_FIELD, PARAM_SIZE};
pub use selector::{InstructionSelection, Registry, SelectedFunction, SelectorConfig};
