//! Kernel package version parsing and module-version derivation.

use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::system::ToolCommand;

/// Vendor marker separating the upstream kernel version from the Arch suffix
const ARCH_MARKER: &str = ".arch";

/// Derive the module version the kernel build system expects.
///
/// `6.1.0.arch1-1` becomes `6.1.0-arch1`: everything before the first `.arch`
/// marker, a dash, then the marker segment up to its first dash. Versions
/// without the marker are returned unchanged.
pub fn derive_module_version(kernel_version: &str) -> String {
    match kernel_version.find(ARCH_MARKER) {
        Some(idx) => {
            let base = &kernel_version[..idx];
            // Marker segment without the leading dot: "arch1-1"
            let segment = &kernel_version[idx + 1..];
            let prefix = segment.split('-').next().unwrap_or(segment);
            format!("{}-{}", base, prefix)
        }
        None => kernel_version.to_string(),
    }
}

/// `pacman --sysroot <root> -Q <package>` against the build root.
pub fn query_command(sysroot: &Path, package: &str) -> ToolCommand {
    ToolCommand::new("pacman")
        .arg("--sysroot")
        .arg_path(sysroot)
        .arg("-Q")
        .arg(package)
}

/// Parse `"<name> <version>"` as printed by `pacman -Q`.
pub fn parse_installed_version(output: &str, package: &str) -> Result<String> {
    let mut fields = output.split_whitespace();
    match (fields.next(), fields.next()) {
        (Some(name), Some(version)) if name == package => Ok(version.to_string()),
        _ => Err(PipelineError::Parse(format!(
            "Unexpected package query output for {}: '{}'",
            package,
            output.trim()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_derive_with_arch_marker() {
        assert_eq!(derive_module_version("5.15.0.arch3-1"), "5.15.0-arch3");
        assert_eq!(derive_module_version("6.7.4.arch1-1"), "6.7.4-arch1");
    }

    #[test]
    fn test_derive_without_marker_is_verbatim() {
        assert_eq!(derive_module_version("6.1.0"), "6.1.0");
        assert_eq!(derive_module_version("6.1.0-1"), "6.1.0-1");
    }

    #[test]
    fn test_derive_marker_without_release() {
        assert_eq!(derive_module_version("6.8.0.arch2"), "6.8.0-arch2");
    }

    #[test]
    fn test_parse_installed_version() {
        assert_eq!(
            parse_installed_version("linux 6.1.0.arch1-1\n", "linux").unwrap(),
            "6.1.0.arch1-1"
        );
    }

    #[test]
    fn test_parse_installed_version_rejects_garbage() {
        assert!(parse_installed_version("", "linux").is_err());
        assert!(parse_installed_version("linux", "linux").is_err());
        assert!(parse_installed_version("linux-lts 6.6.1-1", "linux").is_err());
    }

    #[test]
    fn test_query_command_targets_sysroot() {
        let cmd = query_command(Path::new("/w/archroot64/root"), "linux");
        assert_eq!(cmd.program, "pacman");
        assert_eq!(cmd.args, vec!["--sysroot", "/w/archroot64/root", "-Q", "linux"]);
        assert!(cmd.run_as.is_none());
    }

    proptest! {
        #[test]
        fn prop_versions_without_marker_are_unchanged(version in "[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}(-[0-9]{1,2})?") {
            prop_assert_eq!(derive_module_version(&version), version);
        }

        #[test]
        fn prop_marker_versions_split_at_marker(
            base in "[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}",
            arch in 1u32..20,
            rel in 1u32..9,
        ) {
            let kernel = format!("{}.arch{}-{}", base, arch, rel);
            prop_assert_eq!(derive_module_version(&kernel), format!("{}-arch{}", base, arch));
        }
    }
}
