//! Growable code buffer with in-place patching.

use crate::{
    file::io::write_le,
    isel::Instr,
    Error::OutOfBounds,
    Result,
};

/// Append-only byte buffer that instructions are encoded into.
///
/// Capacity starts at a configured size and doubles whenever an instruction does not
/// fit, so a function's code is reallocated only a logarithmic number of times.
#[derive(Debug)]
pub struct CodeBuffer {
    code: Vec<u8>,
    capacity: usize,
    growths: usize,
}

impl CodeBuffer {
    /// Creates an empty buffer with room for `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        CodeBuffer {
            code: Vec::with_capacity(capacity),
            capacity,
            growths: 0,
        }
    }

    /// Number of bytes emitted so far, which is also the address of the next
    /// instruction.
    #[must_use]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Returns true if nothing was emitted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// How many times the buffer doubled.
    #[must_use]
    pub fn growths(&self) -> usize {
        self.growths
    }

    /// Encodes `instr` at the end of the buffer.
    ///
    /// # Returns
    ///
    /// The address of the instruction.
    pub fn emit(&mut self, instr: &Instr) -> usize {
        let addr = self.code.len();
        let mut encoded = Vec::with_capacity(64);
        instr.encode(&mut encoded);

        while addr + encoded.len() > self.capacity {
            self.capacity *= 2;
            self.growths += 1;
        }
        if self.code.capacity() < self.capacity {
            self.code.reserve_exact(self.capacity - self.code.len());
        }

        self.code.extend_from_slice(&encoded);
        addr
    }

    /// Overwrites the `u32` at `site`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if `site` does not lie inside the code.
    pub fn patch_u32(&mut self, site: usize, value: u32) -> Result<()> {
        let slot = self.code.get_mut(site..).ok_or(OutOfBounds)?;
        write_le(slot, value)
    }

    /// Overwrites the `i32` at `site`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if `site` does not lie inside the code.
    pub fn patch_i32(&mut self, site: usize, value: i32) -> Result<()> {
        let slot = self.code.get_mut(site..).ok_or(OutOfBounds)?;
        write_le(slot, value)
    }

    /// The emitted bytes.
    #[must_use]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Releases the emitted bytes, trimmed to their length.
    #[must_use]
    pub fn into_code(mut self) -> Vec<u8> {
        self.code.shrink_to_fit();
        self.code
    }
}
