//! Host platform (linux for example) utility functions

use std::path::PathBuf;
use uname;

/// Environment variable giving the root of the software tree.
pub const SW_ROOT_ENV_VAR: &str = "MAV_VIS_SW_ROOT";

/// Retrieve uname information.
pub fn get_uname() -> std::io::Result<uname::Info> {
    uname::uname()
}

/// Get the root directory of the software tree from the environment.
pub fn get_sw_root() -> Result<PathBuf, std::env::VarError> {
    Ok(PathBuf::from(std::env::var(SW_ROOT_ENV_VAR)?))
}
