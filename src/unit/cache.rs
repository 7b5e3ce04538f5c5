//! Cache paths, load and save of compiled units, and the shared unit cache.
//!
//! A unit compiled from `/src/app.js` is looked for in two places:
//!
//! 1. the sibling file `/src/app.jsc`, shipped next to the source
//! 2. `<cache dir>/<sha1 of the source path>.jsc`, written by [`UnitCache::save`]
//!
//! Before a file is mapped its header is read with plain I/O and verified, so a file
//! with a foreign magic or version is never mapped at all.
//!
//! # Ownership
//!
//! [`UnitCache`] maps each cache file path to the unit loaded from it, so repeated
//! loads share one mapping. Units flagged [`UnitFlags::STATIC_DATA`] have their
//! bytes aliased by long-lived runtime objects. When such a unit is invalidated the
//! cache moves its strong reference into a retained list instead of dropping it,
//! keeping the mapping alive for as long as any clone of the cache exists.

use std::{
    collections::HashMap,
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::UNIX_EPOCH,
};

use sha1::{Digest, Sha1};
use tracing::{debug, warn};

use crate::{
    file::Physical,
    unit::{CompiledUnit, UnitError, UnitFlags, UnitHeader, HEADER_SIZE},
    Error, Result,
};

/// Environment variable overriding the cache directory.
pub const CACHE_PATH_ENV: &str = "SSAIR_DISK_CACHE_PATH";

/// Where cached units are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Directory holding the hashed cache files.
    pub directory: PathBuf,
}

impl CacheConfig {
    /// Uses `directory` for cache files.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        CacheConfig {
            directory: directory.into(),
        }
    }

    /// Reads the directory from [`CACHE_PATH_ENV`], falling back to
    /// `<system temp dir>/ssair-cache/`.
    #[must_use]
    pub fn from_env() -> Self {
        let directory = std::env::var_os(CACHE_PATH_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("ssair-cache"));
        CacheConfig { directory }
    }

    /// The hashed cache file for `source`.
    ///
    /// The name is the hex SHA-1 of the source path, followed by the complete suffix
    /// of the source file name with `c` appended: `app.js` gives `<hash>.jsc`.
    #[must_use]
    pub fn cache_file_path(&self, source: &Path) -> PathBuf {
        let mut hasher = Sha1::new();
        hasher.update(source.to_string_lossy().as_bytes());
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect();

        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match file_name.split_once('.') {
            Some((_, suffix)) => format!("{hash}.{suffix}c"),
            None => hash,
        };
        self.directory.join(name)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// The unit shipped next to `source`: its path with `c` appended.
#[must_use]
pub fn sibling_cache_path(source: &Path) -> PathBuf {
    let mut path = source.as_os_str().to_os_string();
    path.push("c");
    PathBuf::from(path)
}

/// Modification time of `path` in ms since the Unix epoch.
///
/// # Errors
///
/// Returns [`crate::Error::FileError`] if the file cannot be inspected.
pub fn source_timestamp(path: &Path) -> Result<i64> {
    let modified = fs::metadata(path)?.modified()?;
    let millis = match modified.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
        Err(before) => -i64::try_from(before.duration().as_millis()).unwrap_or(i64::MAX),
    };
    Ok(millis)
}

fn check_local(source: &Path) -> Result<()> {
    let path = source.to_string_lossy();
    if path.contains("://") || path.starts_with(':') {
        return Err(unit_error!(UnitError::NotLocalFile));
    }
    Ok(())
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<PathBuf, Arc<CompiledUnit>>,
    retained: Vec<Arc<CompiledUnit>>,
}

/// Shared, reference counted cache of loaded units.
///
/// Clones share the same state. The mutex guards only map lookups and updates;
/// reading, verifying and mapping files happens outside of it. Two threads loading
/// the same uncached file may both map it, in which case the first insert wins and
/// both receive that unit.
///
/// # Examples
///
/// ```rust,no_run
/// use ssair::unit::{CacheConfig, UnitCache};
///
/// let cache = UnitCache::new(CacheConfig::from_env());
/// match cache.load("/src/app.js".as_ref()) {
///     Ok(unit) => println!("reusing {} bytes", unit.len()),
///     Err(reason) => println!("compiling from source: {reason}"),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct UnitCache {
    config: CacheConfig,
    state: Arc<Mutex<CacheState>>,
}

impl UnitCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        UnitCache {
            config,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    /// The cache configuration.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Loads the unit compiled from `source`.
    ///
    /// The sibling file is tried first, then the hashed cache file. A candidate is
    /// accepted once its header verifies, including the source timestamp if the
    /// source file exists, its recorded size matches the file, its checksum matches
    /// and it names `source` as its source file.
    ///
    /// # Arguments
    ///
    /// * `source` - Path of the source file the unit was compiled from
    ///
    /// # Errors
    ///
    /// Returns [`UnitError::NotLocalFile`] for non-local paths. Otherwise returns the
    /// error of the last rejected candidate, preferring a verification failure over a
    /// missing file.
    pub fn load(&self, source: &Path) -> Result<Arc<CompiledUnit>> {
        check_local(source)?;
        let expected_timestamp = source_timestamp(source).ok();

        let mut last_error = Error::FileError(io::Error::from(io::ErrorKind::NotFound));
        for candidate in [sibling_cache_path(source), self.config.cache_file_path(source)] {
            match self.load_candidate(&candidate, source, expected_timestamp) {
                Ok(unit) => return Ok(unit),
                Err(error) => {
                    match &error {
                        Error::FileError(_) => {
                            debug!(path = %candidate.display(), %error, "no cached unit")
                        }
                        _ => warn!(path = %candidate.display(), %error, "rejected cached unit"),
                    }
                    let keep = matches!(last_error, Error::UnitVerification(_))
                        && matches!(error, Error::FileError(_));
                    if !keep {
                        last_error = error;
                    }
                }
            }
        }
        Err(last_error)
    }

    fn load_candidate(
        &self,
        path: &Path,
        source: &Path,
        expected_timestamp: Option<i64>,
    ) -> Result<Arc<CompiledUnit>> {
        let cached = lock!(self.state)?.entries.get(path).cloned();
        if let Some(unit) = cached {
            match unit.header().verify_timestamp(expected_timestamp) {
                Ok(()) => {
                    debug!(path = %path.display(), "unit cache hit");
                    return Ok(unit);
                }
                Err(error) => {
                    self.invalidate(path)?;
                    return Err(error);
                }
            }
        }

        let mut file = fs::File::open(path)?;
        let mut head = [0_u8; HEADER_SIZE];
        file.read_exact(&mut head).map_err(|error| {
            if error.kind() == io::ErrorKind::UnexpectedEof {
                unit_error!(UnitError::Truncated)
            } else {
                Error::FileError(error)
            }
        })?;
        let header = UnitHeader::read(&head)?;
        header.verify(expected_timestamp)?;
        header.verify_size(file.metadata()?.len())?;

        let unit = CompiledUnit::from_backend(Box::new(Physical::from_std_file(&file)?))?;
        if unit.source_file()? != source.to_string_lossy() {
            return Err(unit_error!(UnitError::SourceMoved));
        }

        let mut state = lock!(self.state)?;
        let unit = state
            .entries
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(unit))
            .clone();
        debug!(path = %path.display(), size = unit.len(), "mapped compiled unit");
        Ok(unit)
    }

    /// Writes `unit` to the hashed cache file of `source` and drops any cached entry
    /// for that file.
    ///
    /// The file is written under a temporary name and renamed into place, so a
    /// concurrent reader sees either the old or the new unit, never a partial one.
    ///
    /// # Returns
    ///
    /// The path the unit was written to.
    ///
    /// # Errors
    ///
    /// Returns [`UnitError::NotLocalFile`] for non-local paths,
    /// [`UnitError::MissingTimestamp`] if the unit records no source timestamp, and
    /// [`crate::Error::FileError`] if writing fails.
    pub fn save(&self, unit: &CompiledUnit, source: &Path) -> Result<PathBuf> {
        check_local(source)?;
        if unit.header().source_timestamp == 0 {
            return Err(unit_error!(UnitError::MissingTimestamp));
        }

        let path = self.config.cache_file_path(source);
        fs::create_dir_all(&self.config.directory)?;

        let mut staging = path.clone().into_os_string();
        staging.push(format!(".{}.tmp", std::process::id()));
        let staging = PathBuf::from(staging);
        fs::write(&staging, unit.data())?;
        if let Err(error) = fs::rename(&staging, &path) {
            let _ = fs::remove_file(&staging);
            return Err(error.into());
        }

        self.invalidate(&path)?;
        debug!(path = %path.display(), size = unit.len(), "saved compiled unit");
        Ok(path)
    }

    /// Drops the entry for a cache file path.
    ///
    /// A static-data unit is moved to the retained list instead of being released.
    ///
    /// # Returns
    ///
    /// `true` if an entry was present.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if the cache mutex is poisoned.
    pub fn invalidate(&self, path: &Path) -> Result<bool> {
        let mut state = lock!(self.state)?;
        let Some(unit) = state.entries.remove(path) else {
            return Ok(false);
        };
        if unit.flags().contains(UnitFlags::STATIC_DATA) {
            state.retained.push(unit);
        }
        Ok(true)
    }

    /// Drops both cache entries that could hold a unit compiled from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if the cache mutex is poisoned.
    pub fn release(&self, source: &Path) -> Result<()> {
        self.invalidate(&sibling_cache_path(source))?;
        self.invalidate(&self.config.cache_file_path(source))?;
        Ok(())
    }

    /// Returns true if a unit is cached for the cache file `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if the cache mutex is poisoned.
    pub fn contains(&self, path: &Path) -> Result<bool> {
        with_lock!(self.state, |state: &mut CacheState| {
            state.entries.contains_key(path)
        })
    }

    /// Number of cached units.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if the cache mutex is poisoned.
    pub fn entry_count(&self) -> Result<usize> {
        with_lock!(self.state, |state: &mut CacheState| state.entries.len())
    }

    /// Number of invalidated static-data units kept alive.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if the cache mutex is poisoned.
    pub fn retained_count(&self) -> Result<usize> {
        with_lock!(self.state, |state: &mut CacheState| state.retained.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_file_path() {
        let config = CacheConfig::new("/var/cache/ssair");
        let path = config.cache_file_path(Path::new("/src/app.js"));

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(path.starts_with("/var/cache/ssair"));
        assert!(name.ends_with(".jsc"));
        assert_eq!(name.len(), 40 + ".jsc".len());
        assert_eq!(path, config.cache_file_path(Path::new("/src/app.js")));
        assert_ne!(path, config.cache_file_path(Path::new("/other/app.js")));

        let name = config.cache_file_path(Path::new("/src/view.ui.js"));
        assert!(name.to_string_lossy().ends_with(".ui.jsc"));
    }

    #[test]
    fn test_sibling_cache_path() {
        assert_eq!(
            sibling_cache_path(Path::new("/src/app.js")),
            PathBuf::from("/src/app.jsc")
        );
    }

    #[test]
    fn test_rejects_non_local() {
        let cache = UnitCache::new(CacheConfig::new(std::env::temp_dir()));
        for source in ["http://host/app.js", ":/qrc/app.js"] {
            assert!(matches!(
                cache.load(Path::new(source)),
                Err(Error::UnitVerification(UnitError::NotLocalFile))
            ));
        }
    }

    #[test]
    fn test_missing_file() {
        let dir = std::env::temp_dir().join(format!("ssair-cache-missing-{}", std::process::id()));
        let cache = UnitCache::new(CacheConfig::new(&dir));
        assert!(matches!(
            cache.load(&dir.join("absent.js")),
            Err(Error::FileError(_))
        ));
        assert_eq!(cache.entry_count().unwrap(), 0);
    }
}
