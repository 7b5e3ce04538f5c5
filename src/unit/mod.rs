//! The compiled-unit container.
//!
//! A compiled unit holds the bytecode of every function compiled from one source
//! file together with the tables that bytecode indexes into. It is built once by
//! [`UnitBuilder`], persisted as a single immutable buffer, and read back through the
//! bounds-checked [`CompiledUnit`] view, either from memory or from a mapped file.
//!
//! # Key Components
//!
//! - [`UnitHeader`], [`UnitFlags`] - The fixed header and its verification
//! - [`UnitBuilder`] - Table registration and layout, implements [`crate::isel::Registry`]
//! - [`CompiledUnit`] - Read-only view over a verified unit
//! - [`UnitCache`], [`CacheConfig`] - Cache paths, load, save and the shared cache
//! - [`UnitError`] - Which verification step rejected a unit
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use std::path::Path;
//! use ssair::unit::{source_timestamp, CacheConfig, UnitBuilder, UnitCache};
//!
//! let source = Path::new("/src/app.js");
//! let cache = UnitCache::new(CacheConfig::from_env());
//!
//! let unit = match cache.load(source) {
//!     Ok(unit) => unit,
//!     Err(_) => {
//!         let mut builder = UnitBuilder::new("/src/app.js");
//!         builder.set_source_timestamp(source_timestamp(source)?);
//!         let unit = builder.build_unit()?;
//!         cache.save(&unit, source)?;
//!         cache.load(source)?
//!     }
//! };
//! println!("{} functions", unit.function_count());
//! # Ok::<(), ssair::Error>(())
//! ```

mod builder;
mod cache;
mod error;
mod header;
mod view;

pub use builder::{UnitBuilder, FUNCTION_RECORD_SIZE};
pub use cache::{sibling_cache_path, source_timestamp, CacheConfig, UnitCache, CACHE_PATH_ENV};
pub use error::UnitError;
pub use header::{
    UnitFlags, UnitHeader, ARCHITECTURE, HEADER_SIZE, MAGIC, RUNTIME_VERSION, VERSION,
};
pub use view::{CompiledUnit, FunctionRecord};
