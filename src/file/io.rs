//! Little-endian, bounds-checked reading and writing of primitive values.
//!
//! Compiled units and bytecode are always stored little-endian regardless of the
//! host. Every helper in this module checks bounds and reports
//! [`crate::Error::OutOfBounds`] instead of panicking, so a truncated or tampered
//! cache file can never cause an out-of-range access.
//!
//! # Key Components
//!
//! - [`UnitIO`] - Primitive types that can be converted from/to little-endian bytes
//! - [`read_le`] / [`read_le_at`] - Read a value, optionally advancing an offset
//! - [`write_le`] / [`write_le_at`] - Write a value into a fixed buffer, optionally advancing an
//!   offset
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use ssair::file::io::{read_le_at, write_le_at};
//!
//! let mut data = [0u8; 6];
//! let mut offset = 0;
//! write_le_at(&mut data, &mut offset, 1u16)?;
//! write_le_at(&mut data, &mut offset, 2u32)?;
//!
//! offset = 0;
//! let first: u16 = read_le_at(&data, &mut offset)?;
//! let second: u32 = read_le_at(&data, &mut offset)?;
//! assert_eq!((first, second, offset), (1, 2, 6));
//! # Ok::<(), ssair::Error>(())
//! ```

use crate::{Error::OutOfBounds, Result};

/// Trait for primitive types with a fixed little-endian byte representation.
pub trait UnitIO: Sized {
    /// The fixed-size byte array of this type.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Decodes a value from its little-endian bytes.
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Encodes a value into little-endian bytes.
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_unit_io {
    ($($ty:ty),* $(,)?) => {
        $(
            impl UnitIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_unit_io!(u8, i8, u16, i16, u32, i32, u64, i64, f64);

/// Reads a value from the start of `data`.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if `data` is too short.
pub fn read_le<T: UnitIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Reads a value at `offset` and advances `offset` past it.
///
/// # Arguments
///
/// * `data` - The buffer to read from
/// * `offset` - Position to read at, advanced by the size of `T` on success
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit in `data`.
pub fn read_le_at<T: UnitIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;
    Ok(T::from_le_bytes(read))
}

/// Writes a value at the start of `data`.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if `data` is too short.
pub fn write_le<T: UnitIO>(data: &mut [u8], value: T) -> Result<()> {
    let mut offset = 0_usize;
    write_le_at(data, &mut offset, value)
}

/// Writes a value at `offset` and advances `offset` past it.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit in `data`.
pub fn write_le_at<T: UnitIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let bytes = value.to_le_bytes();
    data[*offset..end].copy_from_slice(bytes.as_ref());
    *offset = end;
    Ok(())
}

/// Appends a value to a growable buffer.
pub fn push_le<T: UnitIO>(data: &mut Vec<u8>, value: T) {
    data.extend_from_slice(value.to_le_bytes().as_ref());
}
