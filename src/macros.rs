#![allow(unused_macros)]

/// Helper macro for locking items, mapping a poisoned mutex to [`crate::Error::LockError`]
///
/// ```rust, ignore
///  let mut entries = lock!(self.entries)?;
///  entries.insert(path, unit);
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().map_err(|_| crate::Error::LockError)
    };
}

/// Helper macro for running a closure against a locked item
///
/// ```rust, ignore
///  let hit = with_lock!(self.entries, |entries| entries.get(&path).cloned())?;
/// ```
macro_rules! with_lock {
    ($lock:expr, $closure:expr) => {{
        match $lock.lock() {
            Ok(mut guard) => Ok($closure(&mut *guard)),
            Err(_) => Err(crate::Error::LockError),
        }
    }};
}
