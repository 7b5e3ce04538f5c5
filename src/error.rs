use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! unit_error {
    ($kind:expr) => {
        crate::Error::UnitVerification($kind)
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Errors are only produced at the public boundaries of the crate: building IR through
/// [`crate::ir::FunctionBuilder`], reading and writing compiled units, and the unit cache.
/// Broken invariants inside the SSA pipeline (an unreachable block reaching the dominator
/// builder, a critical edge surviving the splitter, a phi whose operand count disagrees
/// with its block's predecessors) are bugs in an earlier pass and panic instead.
///
/// # Error Categories
///
/// ## File Parsing Errors
/// - [`Error::Malformed`] - Corrupted or invalid unit structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of a buffer
/// - [`Error::UnitVerification`] - A compiled unit failed one of its load checks
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Filesystem I/O errors
///
/// ## IR and Analysis Errors
/// - [`Error::SsaError`] - Invalid IR handed to a public entry point
/// - [`Error::LockError`] - Thread synchronization failure
///
/// # Examples
///
/// ```rust,no_run
/// use ssair::{Error, unit::{CacheConfig, UnitCache}};
///
/// let cache = UnitCache::new(CacheConfig::from_env());
/// match cache.load("/src/app.js".as_ref()) {
///     Ok(unit) => println!("{} bytes", unit.len()),
///     Err(Error::UnitVerification(reason)) => eprintln!("stale cache: {}", reason),
///     Err(Error::FileError(io_err)) => eprintln!("I/O error: {}", io_err),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The data is damaged and could not be parsed.
    ///
    /// Raised when a compiled unit passes header verification but one of its
    /// internal offsets or lengths points somewhere it must not.
    ///
    /// # Fields
    ///
    /// * `message` - Description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while reading a buffer.
    ///
    /// This is a safety check to prevent buffer overruns when decoding
    /// bytecode or walking the tables of a compiled unit.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur while reading or writing cache
    /// files, such as a missing file or permission issues. Callers treat this
    /// exactly like a cache miss.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// A compiled unit was rejected while loading or saving.
    ///
    /// The wrapped [`crate::unit::UnitError`] names the exact check that failed,
    /// its `Display` text is the human readable reason handed back to callers.
    #[error("{0}")]
    UnitVerification(crate::unit::UnitError),

    /// The IR handed to a public entry point is inconsistent.
    ///
    /// For example a builder call referencing a block that was never created, or
    /// a terminator appended to a block that already ends in one.
    #[error("SSA error: {0}")]
    SsaError(String),

    /// Failed to lock target.
    ///
    /// This error occurs when thread synchronization fails, typically when the
    /// unit cache mutex was poisoned by a panicking thread.
    #[error("Failed to lock target")]
    LockError,
}

impl From<crate::unit::UnitError> for Error {
    fn from(error: crate::unit::UnitError) -> Self {
        Error::UnitVerification(error)
    }
}
