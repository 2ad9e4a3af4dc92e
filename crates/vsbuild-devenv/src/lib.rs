//! Visual Studio discovery and `devenv` invocation.

pub mod detect;
pub mod error;
pub mod invoke;
pub mod version;

pub use detect::{system_env, verify_accelerator, ToolLocator};
pub use error::DevEnvError;
pub use invoke::{DevEnvCommand, Operation};
pub use version::VsVersion;
