//! Compiled-unit container integration tests: save, load, verification failures and
//! the ownership rules of the shared cache.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};

use ssair::{
    compiler::Optimizer,
    ir::{Expr, FunctionBuilder},
    isel::InstructionSelection,
    unit::{
        sibling_cache_path, source_timestamp, CacheConfig, CompiledUnit, UnitBuilder, UnitCache,
        UnitError, UnitFlags,
    },
    Error, Result,
};

/// A fresh, empty directory unique to this test and process.
fn scratch_dir(name: &str) -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("ssair-{name}-{}", std::process::id()));
    if dir.exists() {
        fs::remove_dir_all(&dir)?;
    }
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Writes a source file and returns its path.
fn write_source(dir: &Path) -> Result<PathBuf> {
    let source = dir.join("app.js");
    fs::write(&source, "function f(a) { return a; }")?;
    Ok(source)
}

/// Compiles `function f(a) { return a; }` into a unit claiming `source_path`.
fn compile(source_path: &Path, timestamp: i64, flags: UnitFlags) -> Result<CompiledUnit> {
    let mut b = FunctionBuilder::new("f", 1, 0);
    let entry = b.entry();
    b.ret(entry, Expr::temp(0))?;
    let mut function = b.build()?;
    Optimizer::default().run(&mut function)?;

    let mut builder = UnitBuilder::new(source_path.to_string_lossy());
    let selected = InstructionSelection::default().select(&function, &mut builder)?;
    let index = builder.add_selected(&selected);
    builder.set_root_function(index);
    builder.set_source_timestamp(timestamp);
    builder.set_flags(flags);
    builder.build_unit()
}

fn verification_error(result: Result<Arc<CompiledUnit>>) -> UnitError {
    match result {
        Err(Error::UnitVerification(reason)) => reason,
        Err(other) => panic!("expected a verification failure, got {other}"),
        Ok(_) => panic!("expected a verification failure, got a unit"),
    }
}

#[test]
fn test_save_and_load() -> Result<()> {
    let dir = scratch_dir("save-load")?;
    let source = write_source(&dir)?;
    let cache = UnitCache::new(CacheConfig::new(dir.join("cache")));

    let unit = compile(&source, source_timestamp(&source)?, UnitFlags::IS_SCRIPT)?;
    let path = cache.save(&unit, &source)?;
    assert_eq!(path, cache.config().cache_file_path(&source));
    assert!(path.exists());

    let loaded = cache.load(&source)?;
    assert_eq!(loaded.data(), unit.data());
    assert_eq!(loaded.source_file()?, source.to_string_lossy());
    let root = loaded.root_function()?;
    assert_eq!(loaded.function_name(&root)?, "f");
    assert!(cache.contains(&path)?);

    let again = cache.load(&source)?;
    assert!(Arc::ptr_eq(&loaded, &again));
    assert_eq!(cache.entry_count()?, 1);
    Ok(())
}

#[test]
fn test_sibling_file_preferred() -> Result<()> {
    let dir = scratch_dir("sibling")?;
    let source = write_source(&dir)?;
    let cache = UnitCache::new(CacheConfig::new(dir.join("cache")));

    let unit = compile(&source, source_timestamp(&source)?, UnitFlags::empty())?;
    let sibling = sibling_cache_path(&source);
    fs::write(&sibling, unit.data())?;

    cache.load(&source)?;
    assert!(cache.contains(&sibling)?);
    assert!(!cache.contains(&cache.config().cache_file_path(&source))?);
    Ok(())
}

#[test]
fn test_corrupt_magic_is_rejected_before_mapping() -> Result<()> {
    let dir = scratch_dir("bad-magic")?;
    let source = write_source(&dir)?;
    let cache = UnitCache::new(CacheConfig::new(dir.join("cache")));

    let unit = compile(&source, source_timestamp(&source)?, UnitFlags::empty())?;
    let mut data = unit.data().to_vec();
    data[2] ^= 0x20;
    fs::write(sibling_cache_path(&source), data)?;

    let reason = verification_error(cache.load(&source));
    assert_eq!(reason, UnitError::BadMagic);
    assert!(reason.to_string().to_lowercase().contains("magic"));
    assert_eq!(cache.entry_count()?, 0);
    Ok(())
}

#[test]
fn test_changed_source_timestamp() -> Result<()> {
    let dir = scratch_dir("timestamp")?;
    let source = write_source(&dir)?;
    let cache = UnitCache::new(CacheConfig::new(dir.join("cache")));

    let unit = compile(&source, source_timestamp(&source)?, UnitFlags::empty())?;
    let path = cache.save(&unit, &source)?;
    cache.load(&source)?;

    let touched = SystemTime::now() + Duration::from_secs(3600);
    fs::File::options()
        .write(true)
        .open(&source)?
        .set_modified(touched)?;

    // The cached entry is rechecked and dropped.
    let reason = verification_error(cache.load(&source));
    assert_eq!(reason, UnitError::TimestampMismatch);
    assert!(!cache.contains(&path)?);

    // A fresh cache rejects the file itself.
    let fresh = UnitCache::new(cache.config().clone());
    let reason = verification_error(fresh.load(&source));
    assert_eq!(reason, UnitError::TimestampMismatch);
    assert!(reason.to_string().contains("time stamp"));
    Ok(())
}

#[test]
fn test_moved_source() -> Result<()> {
    let dir = scratch_dir("moved")?;
    let source = write_source(&dir)?;
    let cache = UnitCache::new(CacheConfig::new(dir.join("cache")));

    let elsewhere = dir.join("old").join("app.js");
    let unit = compile(&elsewhere, source_timestamp(&source)?, UnitFlags::empty())?;
    fs::write(sibling_cache_path(&source), unit.data())?;

    assert_eq!(
        verification_error(cache.load(&source)),
        UnitError::SourceMoved
    );
    Ok(())
}

#[test]
fn test_size_mismatch() -> Result<()> {
    let dir = scratch_dir("size")?;
    let source = write_source(&dir)?;
    let cache = UnitCache::new(CacheConfig::new(dir.join("cache")));

    let unit = compile(&source, source_timestamp(&source)?, UnitFlags::empty())?;
    let mut data = unit.data().to_vec();
    data.extend_from_slice(&[0; 16]);
    fs::write(sibling_cache_path(&source), data)?;

    assert!(matches!(
        verification_error(cache.load(&source)),
        UnitError::SizeMismatch { .. }
    ));
    Ok(())
}

#[test]
fn test_save_requires_timestamp_and_local_file() -> Result<()> {
    let dir = scratch_dir("save-checks")?;
    let source = write_source(&dir)?;
    let cache = UnitCache::new(CacheConfig::new(dir.join("cache")));

    let unit = compile(&source, 0, UnitFlags::empty())?;
    assert!(matches!(
        cache.save(&unit, &source),
        Err(Error::UnitVerification(UnitError::MissingTimestamp))
    ));

    let unit = compile(&source, 1, UnitFlags::empty())?;
    assert!(matches!(
        cache.save(&unit, Path::new("qrc://app.js")),
        Err(Error::UnitVerification(UnitError::NotLocalFile))
    ));
    Ok(())
}

#[test]
fn test_static_data_outlives_invalidation() -> Result<()> {
    let dir = scratch_dir("static")?;
    let source = write_source(&dir)?;
    let cache = UnitCache::new(CacheConfig::new(dir.join("cache")));
    let timestamp = source_timestamp(&source)?;

    let unit = compile(&source, timestamp, UnitFlags::STATIC_DATA)?;
    cache.save(&unit, &source)?;
    let loaded = Arc::downgrade(&cache.load(&source)?);

    cache.release(&source)?;
    assert_eq!(cache.entry_count()?, 0);
    assert_eq!(cache.retained_count()?, 1);
    assert!(loaded.upgrade().is_some());

    // Saving again invalidates the new entry the same way.
    cache.load(&source)?;
    cache.save(&unit, &source)?;
    assert_eq!(cache.retained_count()?, 2);

    // Units without static data are released with their last reference.
    let plain = compile(&source, timestamp, UnitFlags::empty())?;
    cache.save(&plain, &source)?;
    let loaded = Arc::downgrade(&cache.load(&source)?);
    cache.release(&source)?;
    assert_eq!(cache.retained_count()?, 2);
    assert!(loaded.upgrade().is_none());
    Ok(())
}

#[test]
fn test_concurrent_loads_share_one_unit() -> Result<()> {
    let dir = scratch_dir("concurrent")?;
    let source = write_source(&dir)?;
    let cache = UnitCache::new(CacheConfig::new(dir.join("cache")));

    let unit = compile(&source, source_timestamp(&source)?, UnitFlags::empty())?;
    cache.save(&unit, &source)?;

    let units = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let source = source.clone();
                scope.spawn(move || cache.load(&source))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("loader thread panicked"))
            .collect::<Result<Vec<_>>>()
    })?;

    assert!(units.iter().all(|unit| Arc::ptr_eq(unit, &units[0])));
    assert_eq!(cache.entry_count()?, 1);
    Ok(())
}
