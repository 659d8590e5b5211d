//! Utility library for the GPR survey rover software

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// CSV archiving of module status reports
pub mod archive;

/// Host platform information and the software root directory
pub mod host;

/// Console and session log file logging
#[macro_use]
pub mod logger;

/// Generic numerical helpers and angle wrapping
pub mod maths;

/// The cyclic module trait
pub mod module;

/// TOML parameter file loading
pub mod params;

/// Session directories and background saving of recorded data
pub mod session;

/// Time conversions
pub mod time;

// ---------------------------------------------------------------------------
// MACROS
// ---------------------------------------------------------------------------

/// Log an error and panic.
///
/// Only for conditions the executable cannot recover from, library code
/// returns a `Result` instead.
#[macro_export]
macro_rules! raise_error {
    () => ({
        log::error!("Unrecoverable error raised");
        std::panic!("Unrecoverable error");
    });
    ($fmt:expr) => ({
        log::error!("{}", $fmt);
        std::panic!("Unrecoverable error");
    });
    ($fmt:expr, $($arg:tt)*) => ({
        log::error!("{}", std::format_args!($fmt, $($arg)+));
        std::panic!("Unrecoverable error");
    });
}
