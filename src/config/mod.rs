//! Configuration module for the ZFS package build pipeline.
//!
//! `BuildConfig` holds every constant the pipeline relies on: upstream
//! endpoints, signing keys, stage names, substitution tokens, chroot package
//! sets and limits. Defaults match the OpenZFS-on-Arch layout; any field can be
//! overridden from a JSON settings file (see `loader`).

pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the package-definition templates
pub const DEFAULT_TEMPLATE_DIR: &str = "/usr/share/archuseriso/pkgbuild";

/// Placeholder tokens replaced in each stage's definition file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tokens {
    pub upstream_version: String,
    pub kernel_version: String,
    pub modules_version: String,
}

impl Default for Tokens {
    fn default() -> Self {
        Tokens {
            upstream_version: "%ZFSVERSION%".to_string(),
            kernel_version: "%LINUXVERSION%".to_string(),
            modules_version: "%MODULESVERSION%".to_string(),
        }
    }
}

/// Pipeline settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    // Upstream release index
    pub api_url: String,
    pub tag_prefix: String,
    pub source_name: String,
    pub user_agent: String,
    pub index_timeout_secs: u64,
    pub download_timeout_secs: u64,

    // Credential gate
    pub signing_keys: Vec<String>,

    // Stages
    pub utils_stage: String,
    pub module_stage: String,
    pub definition_file: String,
    pub tokens: Tokens,

    // Build root
    pub base_packages: Vec<String>,
    pub kernel_package: String,
    pub kernel_headers_package: String,
    pub pacman_config: String,
    pub testing_pacman_config: String,
    pub testing_repository: String,
    pub package_cache: PathBuf,

    // Pre-flight
    pub required_host_packages: Vec<String>,
    pub min_free_space_gb: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            api_url: "https://api.github.com/repos/openzfs/zfs/releases".to_string(),
            tag_prefix: "zfs".to_string(),
            source_name: "zfs".to_string(),
            user_agent: format!("zfs-pkgbuilder/{}", crate::VERSION),
            index_timeout_secs: 30,
            download_timeout_secs: 300,
            signing_keys: vec![
                "C77B9667".to_string(),
                "D4598027".to_string(),
                "C6AF658B".to_string(),
            ],
            utils_stage: "zfs-utils".to_string(),
            module_stage: "zfs-linux".to_string(),
            definition_file: "PKGBUILD".to_string(),
            tokens: Tokens::default(),
            base_packages: vec![
                "base".to_string(),
                "linux".to_string(),
                "linux-headers".to_string(),
                "base-devel".to_string(),
            ],
            kernel_package: "linux".to_string(),
            kernel_headers_package: "linux-headers".to_string(),
            pacman_config: "pacman.conf".to_string(),
            testing_pacman_config: "pacman-testing.conf".to_string(),
            testing_repository: "testing".to_string(),
            package_cache: PathBuf::from("/var/cache/pacman/pkg"),
            required_host_packages: vec!["devtools".to_string(), "pacman-contrib".to_string()],
            min_free_space_gb: 5,
        }
    }
}

impl BuildConfig {
    pub fn index_timeout(&self) -> Duration {
        Duration::from_secs(self.index_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Tag name for a pinned version, e.g. `zfs-2.1.2`
    pub fn tag_for(&self, version: &str) -> String {
        format!("{}-{}", self.tag_prefix, version)
    }

    /// Primary source tarball name, e.g. `zfs-2.1.2.tar.gz`
    pub fn tarball_name(&self, version: &str) -> String {
        format!("{}-{}.tar.gz", self.source_name, version)
    }

    /// Detached signature of the primary tarball
    pub fn signature_name(&self, version: &str) -> String {
        format!("{}.asc", self.tarball_name(version))
    }

    pub fn pacman_config_path(&self, template_dir: &Path) -> PathBuf {
        template_dir.join(&self.pacman_config)
    }

    pub fn testing_pacman_config_path(&self, template_dir: &Path) -> PathBuf {
        template_dir.join(&self.testing_pacman_config)
    }

    /// Repository-qualified kernel package name, e.g. `testing/linux`
    pub fn testing_kernel_ref(&self) -> String {
        format!("{}/{}", self.testing_repository, self.kernel_package)
    }
}
