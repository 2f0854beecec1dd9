use std::time::Duration;

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

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## File Parsing Errors
/// - [`Error::Malformed`] - Corrupted or invalid file structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond file boundaries
/// - [`Error::NotSupported`] - Unsupported file format or feature
/// - [`Error::Empty`] - Empty input provided
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::GoblinErr`] - PE parsing errors from goblin crate
/// - [`Error::Json`] - Layout (de)serialization errors
/// - [`Error::Watch`] - File watcher errors
///
/// ## Analysis Errors
/// - [`Error::NotFound`] - A requested type or assembly does not exist
/// - [`Error::LoadIsolation`] - A dependency could not be resolved inside the load context
/// - [`Error::RecursionLimit`] - Maximum recursion depth exceeded
/// - [`Error::LockError`] - Thread synchronization failure
///
/// ## Protocol Errors
/// - [`Error::Format`] - Malformed request line or type name
/// - [`Error::ProtocolDesync`] - A response could not be decoded
/// - [`Error::ChannelTimeout`] - Channel connect or accept did not finish in time
///
/// # Examples
///
/// ```rust,no_run
/// use layoutscope::{Error, protocol::Request};
///
/// match Request::parse("MyLib.dll") {
///     Ok(request) => println!("analyzing {}", request.type_name),
///     Err(Error::Format(message)) => eprintln!("bad request: {message}"),
///     Err(e) => eprintln!("other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The file is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This file type is not supported.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),

    /// Error from the goblin crate during PE parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// Recursion limit reached.
    ///
    /// Signature decoding and nested value type layout both recurse; malformed metadata
    /// (e.g. a struct containing itself) is cut off at this depth.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// Failed to lock target.
    #[error("Failed to lock target")]
    LockError,

    /// A request line or type name argument is malformed.
    ///
    /// The worker logs this and keeps serving the next request.
    #[error("Malformed request - {0}")]
    Format(String),

    /// The requested type or assembly could not be located.
    #[error("Not found - {0}")]
    NotFound(String),

    /// An assembly or one of its dependencies could not be resolved inside the load context.
    #[error("Load failure - {0}")]
    LoadIsolation(String),

    /// A response from the worker could not be decoded.
    #[error("Protocol out of sync - {0}")]
    ProtocolDesync(String),

    /// Connecting or accepting a worker channel did not complete in time.
    #[error("Channel handshake timed out after {0:?}")]
    ChannelTimeout(Duration),

    /// Layout serialization error.
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// File system watcher error.
    #[error("{0}")]
    Watch(#[from] notify::Error),
}
