//! Assembles the tables of a compiled unit into one immutable byte buffer.
//!
//! # Body layout
//!
//! Every table starts on an 8-byte boundary, in header order. Offsets stored
//! anywhere in the unit are absolute from its first byte.
//!
//! - strings: `u32` offset per string, then per string a `u32` byte length and the
//!   UTF-8 bytes, padded to 4
//! - functions: `u32` offset per function, then per function a 24-byte record
//!   (`name`, `formal_count`, `local_count`, `frame_size`, `code_offset`,
//!   `code_size`) followed by its code, padded to 4
//! - lookups: `u32` name string index per entry
//! - regexps: `u32` pattern string index and `u32` flags per entry
//! - constants: `u64` value bits per entry
//! - classes: `u32` offset per class, then per class a `u32` member count and a
//!   `u32` name string index plus `u32` accessor flag per member

use std::collections::HashMap;

use md5::{Digest, Md5};
use tracing::debug;

use crate::{
    file::io::{push_le, write_le},
    ir::RegExpFlags,
    isel::{Registry, SelectedFunction},
    unit::{CompiledUnit, UnitFlags, UnitHeader, HEADER_SIZE},
    Result,
};

/// Size of one function record in bytes.
pub const FUNCTION_RECORD_SIZE: usize = 24;

#[derive(Debug, Clone)]
struct FunctionEntry {
    name: u32,
    formal_count: u32,
    local_count: u32,
    frame_size: u32,
    code: Vec<u8>,
}

/// Collects the strings, functions and other tables of one unit.
///
/// Every table deduplicates: registering a value twice yields the same index.
/// The source path is always string 0.
///
/// # Examples
///
/// ```rust,no_run
/// use ssair::unit::{CompiledUnit, UnitBuilder};
///
/// let mut builder = UnitBuilder::new("/src/app.js");
/// builder.set_source_timestamp(1_700_000_000_000);
/// let unit = CompiledUnit::from_bytes(builder.build()?)?;
/// assert_eq!(unit.source_file()?, "/src/app.js");
/// # Ok::<(), ssair::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct UnitBuilder {
    strings: Vec<String>,
    string_indices: HashMap<String, u32>,
    constants: Vec<u64>,
    constant_indices: HashMap<u64, u32>,
    lookups: Vec<u32>,
    lookup_indices: HashMap<u32, u32>,
    regexps: Vec<(u32, u32)>,
    regexp_indices: HashMap<(u32, u32), u32>,
    functions: Vec<FunctionEntry>,
    classes: Vec<Vec<(u32, bool)>>,
    root_function: u32,
    source_file: u32,
    source_timestamp: i64,
    flags: UnitFlags,
}

fn intern<K: std::hash::Hash + Eq + Clone>(
    values: &mut Vec<K>,
    indices: &mut HashMap<K, u32>,
    value: K,
) -> u32 {
    if let Some(&index) = indices.get(&value) {
        return index;
    }
    let index = values.len() as u32;
    values.push(value.clone());
    indices.insert(value, index);
    index
}

fn align(data: &mut Vec<u8>, to: usize) {
    let padded = data.len().next_multiple_of(to);
    data.resize(padded, 0);
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| malformed_error!("Unit exceeds 4 GiB: {} bytes", value))
}

/// Appends an offset table for `count` entries, returning where it starts.
fn reserve_offsets(data: &mut Vec<u8>, count: usize) -> usize {
    align(data, 8);
    let start = data.len();
    data.resize(start + count * 4, 0);
    start
}

impl UnitBuilder {
    /// Creates an empty unit compiled from `source_path`.
    pub fn new(source_path: impl AsRef<str>) -> Self {
        let mut builder = UnitBuilder {
            strings: Vec::new(),
            string_indices: HashMap::new(),
            constants: Vec::new(),
            constant_indices: HashMap::new(),
            lookups: Vec::new(),
            lookup_indices: HashMap::new(),
            regexps: Vec::new(),
            regexp_indices: HashMap::new(),
            functions: Vec::new(),
            classes: Vec::new(),
            root_function: 0,
            source_file: 0,
            source_timestamp: 0,
            flags: UnitFlags::empty(),
        };
        builder.source_file = builder.register_string(source_path.as_ref());
        builder
    }

    /// Adds the bytecode of a function, returning its index in the function table.
    pub fn add_selected(&mut self, function: &SelectedFunction) -> u32 {
        let name = self.register_string(&function.name);
        self.functions.push(FunctionEntry {
            name,
            formal_count: function.formal_count,
            local_count: function.local_count,
            frame_size: function.frame_size,
            code: function.code.clone(),
        });
        (self.functions.len() - 1) as u32
    }

    /// Adds a class layout given as `(member name, is_accessor)` pairs, returning its
    /// index in the class table.
    pub fn add_class(&mut self, members: &[(&str, bool)]) -> u32 {
        let members = members
            .iter()
            .map(|&(name, is_accessor)| (self.register_string(name), is_accessor))
            .collect();
        self.classes.push(members);
        (self.classes.len() - 1) as u32
    }

    /// Selects the function that runs when the unit is instantiated.
    pub fn set_root_function(&mut self, index: u32) {
        self.root_function = index;
    }

    /// Records the modification time of the source file, in ms since the Unix epoch.
    pub fn set_source_timestamp(&mut self, timestamp: i64) {
        self.source_timestamp = timestamp;
    }

    /// Sets the unit flags.
    pub fn set_flags(&mut self, flags: UnitFlags) {
        self.flags = flags;
    }

    /// Number of functions added so far.
    #[must_use]
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Lays out the unit.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the root function index does not name
    /// an added function, or if the unit would not be addressable with 32-bit offsets.
    pub fn build(&self) -> Result<Vec<u8>> {
        if !self.functions.is_empty() && self.root_function as usize >= self.functions.len() {
            return Err(malformed_error!(
                "Root function {} out of range, unit has {} functions",
                self.root_function,
                self.functions.len()
            ));
        }

        let mut header = UnitHeader {
            flags: self.flags,
            source_timestamp: self.source_timestamp,
            root_function_index: self.root_function,
            source_file_index: self.source_file,
            ..UnitHeader::default()
        };
        let mut data = vec![0_u8; HEADER_SIZE];

        let table = reserve_offsets(&mut data, self.strings.len());
        header.string_table_size = to_u32(self.strings.len())?;
        header.offset_to_string_table = to_u32(table)?;
        for (i, string) in self.strings.iter().enumerate() {
            let offset = to_u32(data.len())?;
            write_le(&mut data[table + i * 4..], offset)?;
            push_le(&mut data, to_u32(string.len())?);
            data.extend_from_slice(string.as_bytes());
            align(&mut data, 4);
        }

        let table = reserve_offsets(&mut data, self.functions.len());
        header.function_table_size = to_u32(self.functions.len())?;
        header.offset_to_function_table = to_u32(table)?;
        for (i, function) in self.functions.iter().enumerate() {
            let offset = to_u32(data.len())?;
            write_le(&mut data[table + i * 4..], offset)?;
            let code_offset = to_u32(data.len() + FUNCTION_RECORD_SIZE)?;
            for value in [
                function.name,
                function.formal_count,
                function.local_count,
                function.frame_size,
                code_offset,
                to_u32(function.code.len())?,
            ] {
                push_le(&mut data, value);
            }
            data.extend_from_slice(&function.code);
            align(&mut data, 4);
        }

        align(&mut data, 8);
        header.lookup_table_size = to_u32(self.lookups.len())?;
        header.offset_to_lookup_table = to_u32(data.len())?;
        for &name in &self.lookups {
            push_le(&mut data, name);
        }

        align(&mut data, 8);
        header.regexp_table_size = to_u32(self.regexps.len())?;
        header.offset_to_regexp_table = to_u32(data.len())?;
        for &(pattern, flags) in &self.regexps {
            push_le(&mut data, pattern);
            push_le(&mut data, flags);
        }

        align(&mut data, 8);
        header.constant_table_size = to_u32(self.constants.len())?;
        header.offset_to_constant_table = to_u32(data.len())?;
        for &bits in &self.constants {
            push_le(&mut data, bits);
        }

        let table = reserve_offsets(&mut data, self.classes.len());
        header.class_table_size = to_u32(self.classes.len())?;
        header.offset_to_class_table = to_u32(table)?;
        for (i, members) in self.classes.iter().enumerate() {
            let offset = to_u32(data.len())?;
            write_le(&mut data[table + i * 4..], offset)?;
            push_le(&mut data, to_u32(members.len())?);
            for &(name, is_accessor) in members {
                push_le(&mut data, name);
                push_le(&mut data, u32::from(is_accessor));
            }
        }

        header.unit_size = to_u32(data.len())?;

        let mut hasher = Md5::new();
        hasher.update(&data[HEADER_SIZE..]);
        header.checksum.copy_from_slice(hasher.finalize().as_slice());
        header.write(&mut data)?;

        debug!(
            size = data.len(),
            strings = self.strings.len(),
            functions = self.functions.len(),
            "built compiled unit"
        );
        Ok(data)
    }

    /// Lays out the unit and wraps it in an in-memory [`CompiledUnit`].
    ///
    /// # Errors
    ///
    /// See [`UnitBuilder::build`].
    pub fn build_unit(&self) -> Result<CompiledUnit> {
        CompiledUnit::from_bytes(self.build()?)
    }
}

impl Registry for UnitBuilder {
    fn register_string(&mut self, value: &str) -> u32 {
        if let Some(&index) = self.string_indices.get(value) {
            return index;
        }
        let index = self.strings.len() as u32;
        self.strings.push(value.to_string());
        self.string_indices.insert(value.to_string(), index);
        index
    }

    fn register_constant(&mut self, bits: u64) -> u32 {
        intern(&mut self.constants, &mut self.constant_indices, bits)
    }

    fn register_regexp(&mut self, pattern: &str, flags: RegExpFlags) -> u32 {
        let pattern = self.register_string(pattern);
        intern(
            &mut self.regexps,
            &mut self.regexp_indices,
            (pattern, flags.bits()),
        )
    }

    fn register_lookup(&mut self, name: &str) -> u32 {
        let name = self.register_string(name);
        intern(&mut self.lookups, &mut self.lookup_indices, name)
    }
}
