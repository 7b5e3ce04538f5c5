//! Byte backends and endian-aware IO for compiled units.
//!
//! A compiled unit is either produced in memory by [`crate::unit::UnitBuilder`] or
//! memory-mapped from a cache file. Both sources sit behind the [`Backend`] trait so the
//! read-only [`crate::unit::CompiledUnit`] view never cares where its bytes live.
//!
//! # Key Components
//!
//! - [`Backend`] - Bounds-checked access to a contiguous byte region
//! - [`Physical`] - Read-only memory mapping of a file via `memmap2`
//! - [`Memory`] - Owned in-memory buffer
//! - [`io`] - Little-endian read/write helpers with offset tracking

pub mod io;

mod memory;
mod physical;

pub use memory::Memory;
pub use physical::Physical;

use crate::Result;

/// Backend for a contiguous, immutable byte region.
///
/// Implementations must never hand out a slice that extends past their end;
/// [`Backend::data_slice`] reports [`crate::Error::OutOfBounds`] instead.
pub trait Backend: Send + Sync {
    /// Returns a slice of `len` bytes starting at `offset`.
    ///
    /// # Arguments
    ///
    /// * `offset` - Start of the requested region
    /// * `len` - Length of the requested region
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the region is not fully contained
    /// in the backend, including when `offset + len` overflows.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the complete data.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data.
    fn len(&self) -> usize;

    /// Returns true if the backend holds no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
