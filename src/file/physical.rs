//! Memory-mapped backend for compiled units loaded from a cache file.
//!
//! The mapping is read-only. Units flagged as static data are aliased by long-lived
//! runtime objects, so a [`Physical`] backend is only ever dropped once nothing can
//! reference its bytes anymore (see [`crate::unit::UnitCache`]).

use super::Backend;
use crate::{Error::FileError, Error::OutOfBounds, Result};

use memmap2::Mmap;
use std::{fs, path::Path};

/// Read-only memory mapping of a file.
#[derive(Debug)]
pub struct Physical {
    data: Mmap,
}

impl Physical {
    /// Maps the file at `path` read-only.
    ///
    /// # Arguments
    ///
    /// * `path` - The file to map
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = fs::File::open(path).map_err(FileError)?;
        Self::from_std_file(&file)
    }

    /// Maps an already opened file read-only.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the mapping fails.
    pub fn from_std_file(file: &fs::File) -> Result<Physical> {
        // The file must not be truncated while mapped; cache files are only ever
        // replaced by rename, never rewritten in place.
        let mmap = unsafe { Mmap::map(file) }.map_err(FileError)?;

        Ok(Physical { data: mmap })
    }
}

impl Backend for Physical {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let Some(offset_end) = offset.checked_add(len) else {
            return Err(OutOfBounds);
        };

        if offset_end > self.data.len() {
            return Err(OutOfBounds);
        }

        Ok(&self.data[offset..offset_end])
    }

    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn physical() {
        let path = std::env::temp_dir().join(format!("ssair-physical-{}.bin", std::process::id()));
        {
            let mut file = fs::File::create(&path).unwrap();
            file.write_all(&[0xAA, 0xBB, 0xCC, 0xDD]).unwrap();
        }

        let physical = Physical::new(&path).unwrap();
        assert_eq!(physical.len(), 4);
        assert_eq!(physical.data_slice(1, 2).unwrap(), &[0xBB, 0xCC]);
        assert!(physical.data_slice(3, 2).is_err());
        assert!(physical.data_slice(usize::MAX, 2).is_err());

        drop(physical);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn physical_missing_file() {
        let result = Physical::new("/definitely/not/here.bin");
        assert!(matches!(result, Err(crate::Error::FileError(_))));
    }
}
