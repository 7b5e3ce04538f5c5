//! Reasons a compiled unit is rejected.

use thiserror::Error;

/// The verification step a compiled unit failed while being loaded or saved.
///
/// The `Display` text is the human readable reason callers report before falling
/// back to compiling from source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    /// The source path names a resource or remote URL, not a file on disk.
    #[error("File has to be a local file.")]
    NotLocalFile,

    /// The first eight bytes are not the unit magic.
    #[error("Magic bytes in the header do not match")]
    BadMagic,

    /// The unit was written by a different format version.
    #[error("Cache file version mismatch. Found {found:#x} expected {expected:#x}")]
    VersionMismatch {
        /// Version recorded in the header
        found: i16,
        /// Version this build writes
        expected: i16,
    },

    /// The unit was written by a different runtime.
    #[error("Runtime version mismatch. Found {found:#x} expected {expected:#x}")]
    RuntimeVersionMismatch {
        /// Runtime version recorded in the header
        found: u32,
        /// Runtime version of this build
        expected: u32,
    },

    /// The unit was written on a host with another pointer width or byte order.
    #[error("Architecture mismatch. Found {found:#x} expected {expected:#x}")]
    ArchitectureMismatch {
        /// Architecture tag recorded in the header
        found: i16,
        /// Architecture tag of this host
        expected: i16,
    },

    /// The source file was modified after the unit was compiled.
    #[error("source file has a different time stamp than cached file")]
    TimestampMismatch,

    /// The unit was compiled from a source file at another path.
    #[error("Source file has moved to a different location.")]
    SourceMoved,

    /// The recorded unit size disagrees with the number of bytes available.
    #[error("Unit size mismatch. Header records {recorded} bytes, file has {actual}")]
    SizeMismatch {
        /// Size recorded in the header
        recorded: u64,
        /// Size of the backing data
        actual: u64,
    },

    /// The checksum over the unit body does not match the header.
    #[error("Checksum of the unit data does not match the header")]
    ChecksumMismatch,

    /// A unit without a source timestamp can never be validated and is not saved.
    #[error("Missing time stamp for source file")]
    MissingTimestamp,

    /// The data ends before the header does.
    #[error("Unit is too short to contain a header")]
    Truncated,
}
