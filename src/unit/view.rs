//! Read-only, bounds-checked view over the bytes of a compiled unit.

use std::fmt;

use md5::{Digest, Md5};

use crate::{
    file::{io::read_le_at, Backend, Memory},
    ir::{ConstValue, RegExpFlags},
    unit::{UnitError, UnitFlags, UnitHeader, HEADER_SIZE},
    Result,
};

/// One entry of the function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionRecord {
    /// Index of the function name in the string table.
    pub name_index: u32,
    /// Number of formal parameters.
    pub formal_count: u32,
    /// Number of local variable slots.
    pub local_count: u32,
    /// Scratch slots reserved by the leading `Push`.
    pub frame_size: u32,
    /// Absolute offset of the code.
    pub code_offset: u32,
    /// Length of the code in bytes.
    pub code_size: u32,
}

/// A compiled unit, either freshly built in memory or mapped from a cache file.
///
/// Construction checks the header against this build, the recorded size against
/// the backing data and the body checksum. Table accessors check every offset they
/// follow, so a unit that passed construction still never reads out of bounds.
pub struct CompiledUnit {
    backend: Box<dyn Backend>,
    header: UnitHeader,
}

impl CompiledUnit {
    /// Wraps and verifies the bytes of a backend.
    ///
    /// The source timestamp is not checked here; that needs the live source file
    /// and is done by [`crate::unit::UnitCache::load`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnitVerification`] if the header does not verify,
    /// the sizes disagree or the checksum does not match.
    pub fn from_backend(backend: Box<dyn Backend>) -> Result<CompiledUnit> {
        let header = UnitHeader::read(backend.data())?;
        header.verify(None)?;
        header.verify_size(backend.len() as u64)?;

        let mut hasher = Md5::new();
        hasher.update(backend.data_slice(HEADER_SIZE, backend.len() - HEADER_SIZE)?);
        if hasher.finalize().as_slice() != header.checksum {
            return Err(unit_error!(UnitError::ChecksumMismatch));
        }

        Ok(CompiledUnit { backend, header })
    }

    /// Wraps and verifies an owned buffer.
    ///
    /// # Errors
    ///
    /// See [`CompiledUnit::from_backend`].
    pub fn from_bytes(data: Vec<u8>) -> Result<CompiledUnit> {
        Self::from_backend(Box::new(Memory::new(data)))
    }

    /// The decoded header.
    #[must_use]
    pub fn header(&self) -> &UnitHeader {
        &self.header
    }

    /// Size of the unit in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.backend.len()
    }

    /// Returns true if the unit holds no bytes. A verified unit never does.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backend.is_empty()
    }

    /// The raw bytes, header included.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.backend.data()
    }

    /// The unit flags.
    #[must_use]
    pub fn flags(&self) -> UnitFlags {
        self.header.flags
    }

    /// Returns true if runtime objects alias the unit's bytes, which therefore must
    /// stay alive for the rest of the process.
    #[must_use]
    pub fn is_static_data(&self) -> bool {
        self.header.flags.contains(UnitFlags::STATIC_DATA)
    }

    fn u32_at(&self, offset: usize) -> Result<u32> {
        let mut offset = offset;
        read_le_at(self.backend.data(), &mut offset)
    }

    fn entry_offset(&self, table: u32, size: u32, index: u32, stride: usize) -> Result<usize> {
        if index >= size {
            return Err(malformed_error!(
                "Table index {} out of range, table has {} entries",
                index,
                size
            ));
        }
        Ok(table as usize + index as usize * stride)
    }

    /// The string at `index` in the string table.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for an index past the table or a string
    /// that is not valid UTF-8, and [`crate::Error::OutOfBounds`] if the string lies
    /// outside the unit.
    pub fn string(&self, index: u32) -> Result<&str> {
        let entry = self.entry_offset(
            self.header.offset_to_string_table,
            self.header.string_table_size,
            index,
            4,
        )?;
        let offset = self.u32_at(entry)? as usize;
        let len = self.u32_at(offset)? as usize;
        let bytes = self.backend.data_slice(offset + 4, len)?;
        std::str::from_utf8(bytes).map_err(|_| malformed_error!("String {} is not UTF-8", index))
    }

    /// Path of the source file the unit was compiled from.
    ///
    /// # Errors
    ///
    /// See [`CompiledUnit::string`].
    pub fn source_file(&self) -> Result<&str> {
        self.string(self.header.source_file_index)
    }

    /// Number of functions in the unit.
    #[must_use]
    pub fn function_count(&self) -> u32 {
        self.header.function_table_size
    }

    /// The function record at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for an index past the table and
    /// [`crate::Error::OutOfBounds`] if the record lies outside the unit.
    pub fn function(&self, index: u32) -> Result<FunctionRecord> {
        let entry = self.entry_offset(
            self.header.offset_to_function_table,
            self.header.function_table_size,
            index,
            4,
        )?;
        let mut offset = self.u32_at(entry)? as usize;
        let data = self.backend.data();
        Ok(FunctionRecord {
            name_index: read_le_at(data, &mut offset)?,
            formal_count: read_le_at(data, &mut offset)?,
            local_count: read_le_at(data, &mut offset)?,
            frame_size: read_le_at(data, &mut offset)?,
            code_offset: read_le_at(data, &mut offset)?,
            code_size: read_le_at(data, &mut offset)?,
        })
    }

    /// The function that runs when the unit is instantiated.
    ///
    /// # Errors
    ///
    /// See [`CompiledUnit::function`].
    pub fn root_function(&self) -> Result<FunctionRecord> {
        self.function(self.header.root_function_index)
    }

    /// Name of a function.
    ///
    /// # Errors
    ///
    /// See [`CompiledUnit::string`].
    pub fn function_name(&self, record: &FunctionRecord) -> Result<&str> {
        self.string(record.name_index)
    }

    /// The bytecode of a function, ready for [`crate::isel::decode`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the code lies outside the unit.
    pub fn function_code(&self, record: &FunctionRecord) -> Result<&[u8]> {
        self.backend
            .data_slice(record.code_offset as usize, record.code_size as usize)
    }

    /// The name looked up by lookup entry `index`.
    ///
    /// # Errors
    ///
    /// See [`CompiledUnit::string`].
    pub fn lookup(&self, index: u32) -> Result<&str> {
        let entry = self.entry_offset(
            self.header.offset_to_lookup_table,
            self.header.lookup_table_size,
            index,
            4,
        )?;
        self.string(self.u32_at(entry)?)
    }

    /// Pattern and flags of regular expression literal `index`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for an index past the table or unknown
    /// flag bits.
    pub fn regexp(&self, index: u32) -> Result<(&str, RegExpFlags)> {
        let entry = self.entry_offset(
            self.header.offset_to_regexp_table,
            self.header.regexp_table_size,
            index,
            8,
        )?;
        let pattern = self.string(self.u32_at(entry)?)?;
        let bits = self.u32_at(entry + 4)?;
        let flags = RegExpFlags::from_bits(bits)
            .ok_or_else(|| malformed_error!("Invalid regexp flags 0x{:x}", bits))?;
        Ok((pattern, flags))
    }

    /// Constant `index`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for an index past the table.
    pub fn constant(&self, index: u32) -> Result<ConstValue> {
        let mut offset = self.entry_offset(
            self.header.offset_to_constant_table,
            self.header.constant_table_size,
            index,
            8,
        )?;
        let bits = read_le_at::<u64>(self.backend.data(), &mut offset)?;
        Ok(ConstValue::from_bits(bits))
    }

    /// Members of class `index` as `(name, is_accessor)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for an index past the table and
    /// [`crate::Error::OutOfBounds`] if the class lies outside the unit.
    pub fn class(&self, index: u32) -> Result<Vec<(&str, bool)>> {
        let entry = self.entry_offset(
            self.header.offset_to_class_table,
            self.header.class_table_size,
            index,
            4,
        )?;
        let mut offset = self.u32_at(entry)? as usize;
        let data = self.backend.data();
        let count = read_le_at::<u32>(data, &mut offset)?;

        // Bounds check the whole record before allocating for it.
        self.backend.data_slice(offset, count as usize * 8)?;
        let mut members = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = read_le_at::<u32>(data, &mut offset)?;
            let is_accessor = read_le_at::<u32>(data, &mut offset)? != 0;
            members.push((self.string(name)?, is_accessor));
        }
        Ok(members)
    }
}

impl fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("len", &self.len())
            .field("header", &self.header)
            .finish()
    }
}
