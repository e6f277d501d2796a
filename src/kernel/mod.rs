//! Kernel version handling for out-of-tree module builds.
//!
//! The kernel that matters is the one installed inside the build root, never
//! the host's running kernel.

pub mod version;

pub use version::{derive_module_version, parse_installed_version};
