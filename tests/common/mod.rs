//! Shared fixtures for the integration tests: a scripted command runner, a
//! scripted prompter, stage templates on disk and a mock release index.

#![allow(dead_code)]

use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use zfs_pkgbuilder::{
    BuildConfig, BuildRequest, CommandRunner, Prompter, Result, ToolCommand, ToolOutput,
};

#[path = "../../src/system/scripted.rs"]
mod scripted;

pub use scripted::{Hook, ScriptedPrompter, ScriptedRunner};

pub const KERNEL_QUERY_OUTPUT: &str = "linux 5.15.0.arch3-1\n";

/// A runner that behaves like a healthy host: every tool succeeds, the build
/// root reports a 5.15.0.arch3-1 kernel, and each makechrootpkg run writes
/// packages into its working directory (`utils_count` for stage A, two for B).
pub fn healthy_runner(utils_count: usize) -> ScriptedRunner {
    ScriptedRunner::new()
        .stdout_when("-Q linux", KERNEL_QUERY_OUTPUT)
        .on("makechrootpkg", package_writer(utils_count))
}

pub fn package_writer(utils_count: usize) -> Hook {
    Arc::new(move |cmd: &ToolCommand| {
        let Some(dir) = &cmd.current_dir else { return };
        let (prefix, count) = if cmd.has_arg("-I") {
            ("zfs-linux", 2)
        } else {
            ("zfs-utils", utils_count)
        };
        let names = ["", "-debug", "-headers"];
        for suffix in names.iter().take(count) {
            let name = format!("{}{}-2.1.2-1-x86_64.pkg.tar.zst", prefix, suffix);
            fs::write(dir.join(name), "pkg").unwrap();
        }
    })
}

/// Stage templates `zfs-utils/` and `zfs-linux/` with tokenized PKGBUILDs.
pub fn write_templates(root: &Path) {
    fs::write(root.join("pacman.conf"), "[core]\n").unwrap();
    fs::write(root.join("pacman-testing.conf"), "[testing]\n").unwrap();
    for stage in ["zfs-utils", "zfs-linux"] {
        let dir = root.join(stage);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("PKGBUILD"),
            format!(
                "pkgname={}\npkgver=%ZFSVERSION%\nsource=(zfs-%ZFSVERSION%.tar.gz{{,.asc}})\n\
                 depends=(\"linux=%LINUXVERSION%\")\n_extramodules=%MODULESVERSION%\n",
                stage
            ),
        )
        .unwrap();
    }
}

/// Directories one pipeline run needs.
pub struct Workspace {
    pub templates: TempDir,
    pub work_parent: TempDir,
    pub dest_parent: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let templates = TempDir::new().unwrap();
        write_templates(templates.path());
        Workspace {
            templates,
            work_parent: TempDir::new().unwrap(),
            dest_parent: TempDir::new().unwrap(),
        }
    }

    pub fn destination(&self) -> PathBuf {
        self.dest_parent.path().join("out")
    }

    pub fn request(&self, pin: Option<&str>) -> BuildRequest {
        BuildRequest {
            pinned_version: pin.map(str::to_string),
            template_dir: self.templates.path().to_path_buf(),
            destination: self.destination(),
            use_testing_kernel: false,
            build_user: "builder".to_string(),
            work_parent: Some(self.work_parent.path().to_path_buf()),
        }
    }

    /// Number of entries left under the WorkDir parent
    pub fn leftover_work_dirs(&self) -> usize {
        fs::read_dir(self.work_parent.path()).unwrap().count()
    }
}

pub const RELEASES_PATH: &str = "/repos/openzfs/zfs/releases";

/// Pipeline settings pointed at a mock server; disk check disabled.
pub fn test_config(server_url: &str) -> BuildConfig {
    BuildConfig {
        api_url: format!("{}{}", server_url, RELEASES_PATH),
        min_free_space_gb: 0,
        ..BuildConfig::default()
    }
}

pub fn asset_names(version: &str) -> Vec<String> {
    vec![
        format!("zfs-{}.tar.gz", version),
        format!("zfs-{}.tar.gz.asc", version),
        format!("zfs-{}.sha256.asc", version),
    ]
}

pub fn asset_path(version: &str, name: &str) -> String {
    format!("/openzfs/zfs/releases/download/zfs-{}/{}", version, name)
}

/// One release entry as served by the index.
pub fn release_json(server_url: &str, version: &str) -> serde_json::Value {
    let assets: Vec<_> = asset_names(version)
        .iter()
        .map(|name| json!({ "browser_download_url": format!("{}{}", server_url, asset_path(version, name)) }))
        .collect();
    json!({ "tag_name": format!("zfs-{}", version), "assets": assets })
}

/// Serve the release list with `versions` and the assets of `version`.
pub async fn serve_release(
    server: &mut mockito::ServerGuard,
    versions: &[&str],
    version: &str,
) -> Vec<mockito::Mock> {
    let url = server.url();
    let list: Vec<_> = versions.iter().map(|v| release_json(&url, v)).collect();

    let mut mocks = vec![
        server
            .mock("GET", RELEASES_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(serde_json::Value::Array(list).to_string())
            .create_async()
            .await,
    ];

    for name in asset_names(version) {
        mocks.push(
            server
                .mock("GET", asset_path(version, &name).as_str())
                .with_status(200)
                .with_body(format!("contents of {}", name))
                .create_async()
                .await,
        );
    }
    mocks
}
