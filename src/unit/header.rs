//! Fixed header at the start of every compiled unit.
//!
//! # Layout
//!
//! All fields are little-endian.
//!
//! | Offset | Size | Field                                      |
//! |--------|------|--------------------------------------------|
//! | 0      | 8    | magic                                      |
//! | 8      | 2    | architecture                               |
//! | 10     | 2    | version                                    |
//! | 12     | 4    | unit size                                  |
//! | 16     | 4    | flags                                      |
//! | 20     | 4    | runtime version                            |
//! | 24     | 8    | source timestamp, ms since the Unix epoch  |
//! | 32     | 16   | MD5 of everything after the header         |
//! | 48     | 48   | size/offset pairs of the six tables        |
//! | 96     | 4    | root function index                        |
//! | 100    | 4    | source file string index                   |

use bitflags::bitflags;

use crate::{
    file::io::{read_le_at, write_le_at},
    unit::UnitError,
    Result,
};

/// Magic bytes every unit starts with.
pub const MAGIC: [u8; 8] = *b"ssairdat";

/// Format version written by this build.
pub const VERSION: i16 = 0x0001;

/// Runtime version written by this build.
pub const RUNTIME_VERSION: u32 = 0x0001_0000;

/// Pointer width in bytes, with bit 8 set on big-endian hosts.
pub const ARCHITECTURE: i16 = std::mem::size_of::<usize>() as i16
    | if cfg!(target_endian = "big") { 0x0100 } else { 0 };

/// Size of the encoded header in bytes.
pub const HEADER_SIZE: usize = 104;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Properties of a compiled unit.
    pub struct UnitFlags: u32 {
        /// Compiled from a plain script rather than a document.
        const IS_SCRIPT = 0x01;
        /// Compiled from a declarative document.
        const IS_DECLARATIVE_DOC = 0x02;
        /// Strings inside the unit are aliased by the runtime; the bytes must outlive it.
        const STATIC_DATA = 0x04;
        /// The document declares a singleton.
        const IS_SINGLETON = 0x08;
        /// The script is a shared library.
        const IS_SHARED_LIBRARY = 0x10;
    }
}

/// The decoded unit header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct UnitHeader {
    pub magic: [u8; 8],
    pub architecture: i16,
    pub version: i16,
    pub unit_size: u32,
    pub flags: UnitFlags,
    pub runtime_version: u32,
    pub source_timestamp: i64,
    pub checksum: [u8; 16],
    pub string_table_size: u32,
    pub offset_to_string_table: u32,
    pub function_table_size: u32,
    pub offset_to_function_table: u32,
    pub lookup_table_size: u32,
    pub offset_to_lookup_table: u32,
    pub regexp_table_size: u32,
    pub offset_to_regexp_table: u32,
    pub constant_table_size: u32,
    pub offset_to_constant_table: u32,
    pub class_table_size: u32,
    pub offset_to_class_table: u32,
    pub root_function_index: u32,
    pub source_file_index: u32,
}

impl Default for UnitHeader {
    fn default() -> Self {
        UnitHeader {
            magic: MAGIC,
            architecture: ARCHITECTURE,
            version: VERSION,
            unit_size: 0,
            flags: UnitFlags::empty(),
            runtime_version: RUNTIME_VERSION,
            source_timestamp: 0,
            checksum: [0; 16],
            string_table_size: 0,
            offset_to_string_table: 0,
            function_table_size: 0,
            offset_to_function_table: 0,
            lookup_table_size: 0,
            offset_to_lookup_table: 0,
            regexp_table_size: 0,
            offset_to_regexp_table: 0,
            constant_table_size: 0,
            offset_to_constant_table: 0,
            class_table_size: 0,
            offset_to_class_table: 0,
            root_function_index: 0,
            source_file_index: 0,
        }
    }
}

impl UnitHeader {
    /// Decodes a header from the start of `data`. Nothing is verified.
    ///
    /// # Errors
    ///
    /// Returns [`UnitError::Truncated`] if `data` is shorter than [`HEADER_SIZE`].
    pub fn read(data: &[u8]) -> Result<UnitHeader> {
        if data.len() < HEADER_SIZE {
            return Err(unit_error!(UnitError::Truncated));
        }

        let mut magic = [0_u8; 8];
        magic.copy_from_slice(&data[..8]);
        let mut checksum = [0_u8; 16];
        checksum.copy_from_slice(&data[32..48]);

        let mut offset = 8;
        let architecture = read_le_at::<i16>(data, &mut offset)?;
        let version = read_le_at::<i16>(data, &mut offset)?;
        let unit_size = read_le_at::<u32>(data, &mut offset)?;
        let flags = UnitFlags::from_bits_retain(read_le_at::<u32>(data, &mut offset)?);
        let runtime_version = read_le_at::<u32>(data, &mut offset)?;
        let source_timestamp = read_le_at::<i64>(data, &mut offset)?;

        offset = 48;
        Ok(UnitHeader {
            magic,
            architecture,
            version,
            unit_size,
            flags,
            runtime_version,
            source_timestamp,
            checksum,
            string_table_size: read_le_at(data, &mut offset)?,
            offset_to_string_table: read_le_at(data, &mut offset)?,
            function_table_size: read_le_at(data, &mut offset)?,
            offset_to_function_table: read_le_at(data, &mut offset)?,
            lookup_table_size: read_le_at(data, &mut offset)?,
            offset_to_lookup_table: read_le_at(data, &mut offset)?,
            regexp_table_size: read_le_at(data, &mut offset)?,
            offset_to_regexp_table: read_le_at(data, &mut offset)?,
            constant_table_size: read_le_at(data, &mut offset)?,
            offset_to_constant_table: read_le_at(data, &mut offset)?,
            class_table_size: read_le_at(data, &mut offset)?,
            offset_to_class_table: read_le_at(data, &mut offset)?,
            root_function_index: read_le_at(data, &mut offset)?,
            source_file_index: read_le_at(data, &mut offset)?,
        })
    }

    /// Encodes the header into the first [`HEADER_SIZE`] bytes of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if `data` is too short.
    pub fn write(&self, data: &mut [u8]) -> Result<()> {
        if data.len() < HEADER_SIZE {
            return Err(crate::Error::OutOfBounds);
        }
        data[..8].copy_from_slice(&self.magic);
        data[32..48].copy_from_slice(&self.checksum);

        let mut offset = 8;
        write_le_at(data, &mut offset, self.architecture)?;
        write_le_at(data, &mut offset, self.version)?;
        write_le_at(data, &mut offset, self.unit_size)?;
        write_le_at(data, &mut offset, self.flags.bits())?;
        write_le_at(data, &mut offset, self.runtime_version)?;
        write_le_at(data, &mut offset, self.source_timestamp)?;

        offset = 48;
        for value in [
            self.string_table_size,
            self.offset_to_string_table,
            self.function_table_size,
            self.offset_to_function_table,
            self.lookup_table_size,
            self.offset_to_lookup_table,
            self.regexp_table_size,
            self.offset_to_regexp_table,
            self.constant_table_size,
            self.offset_to_constant_table,
            self.class_table_size,
            self.offset_to_class_table,
            self.root_function_index,
            self.source_file_index,
        ] {
            write_le_at(data, &mut offset, value)?;
        }
        Ok(())
    }

    /// Checks that this build can use the unit.
    ///
    /// Magic, format version, runtime version and architecture are compared against
    /// the constants of this build, in that order. The source timestamp is compared
    /// only when the header records one and `source_timestamp` is known.
    ///
    /// # Arguments
    ///
    /// * `source_timestamp` - Modification time of the live source file, if it exists
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnitVerification`] naming the first check that failed.
    pub fn verify(&self, source_timestamp: Option<i64>) -> Result<()> {
        if self.magic != MAGIC {
            return Err(unit_error!(UnitError::BadMagic));
        }
        if self.version != VERSION {
            return Err(unit_error!(UnitError::VersionMismatch {
                found: self.version,
                expected: VERSION,
            }));
        }
        if self.runtime_version != RUNTIME_VERSION {
            return Err(unit_error!(UnitError::RuntimeVersionMismatch {
                found: self.runtime_version,
                expected: RUNTIME_VERSION,
            }));
        }
        if self.architecture != ARCHITECTURE {
            return Err(unit_error!(UnitError::ArchitectureMismatch {
                found: self.architecture,
                expected: ARCHITECTURE,
            }));
        }
        self.verify_timestamp(source_timestamp)
    }

    /// Compares the recorded source timestamp with the live one.
    ///
    /// # Errors
    ///
    /// Returns [`UnitError::TimestampMismatch`] if both are known and differ.
    pub fn verify_timestamp(&self, source_timestamp: Option<i64>) -> Result<()> {
        match source_timestamp {
            Some(live) if self.source_timestamp != 0 && live != self.source_timestamp => {
                Err(unit_error!(UnitError::TimestampMismatch))
            }
            _ => Ok(()),
        }
    }

    /// Checks the recorded unit size against the number of bytes actually present.
    ///
    /// # Errors
    ///
    /// Returns [`UnitError::SizeMismatch`] if they differ.
    pub fn verify_size(&self, actual: u64) -> Result<()> {
        if u64::from(self.unit_size) != actual {
            return Err(unit_error!(UnitError::SizeMismatch {
                recorded: u64::from(self.unit_size),
                actual,
            }));
        }
        Ok(())
    }
}
