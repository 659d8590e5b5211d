//! Host platform utility functions

use std::env;
use std::path::PathBuf;

/// Name of the environment variable pointing at the software root directory.
///
/// The root is expected to contain the `params` directory and will hold the
/// `sessions` directory.
pub const SW_ROOT_ENV_VAR: &str = "GPR_SW_ROOT";

/// Get the path to the root of the software installation.
pub fn get_gpr_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}

/// Get a short description of the host this software is running on.
pub fn get_host_info() -> String {
    format!("{} ({})", env::consts::OS, env::consts::ARCH)
}
