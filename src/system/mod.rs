/// System module: external command execution, signing keys, disk space, privileges

pub mod command;
pub mod disk;
pub mod keys;

#[cfg(test)]
pub(crate) mod scripted;

pub use command::{run, CommandRunner, SystemRunner, ToolCommand, ToolOutput};
pub use keys::{Prompter, StdinPrompter};

#[cfg(test)]
use crate::error::Result;

/// True when the effective user is root
pub fn is_superuser() -> bool {
    nix::unistd::geteuid().is_root()
}

/// The non-privileged user who invoked the tool through sudo.
///
/// Returns None when `SUDO_USER` is unset or empty.
pub fn invoking_user() -> Option<String> {
    std::env::var("SUDO_USER").ok().filter(|user| !user.is_empty())
}

/// Number of parallel jobs for downloads and compiles
pub fn parallelism() -> usize {
    num_cpus::get().max(1)
}
