//! Free-space probe for the filesystem holding the WorkDir.

use std::path::Path;

use crate::error::{PipelineError, Result};

const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// Space available to unprivileged users on the filesystem containing `path`, in whole GiB.
pub fn available_space_gb(path: &Path) -> Result<u64> {
    let stat = nix::sys::statvfs::statvfs(path).map_err(|e| {
        PipelineError::Resource(format!(
            "Failed to check disk space at {}: {}",
            path.display(),
            e
        ))
    })?;

    let bytes = (stat.blocks_available() as u64).saturating_mul(stat.fragment_size() as u64);
    Ok(bytes / BYTES_PER_GB)
}

/// Fail with a Resource error when less than `required_gb` is available.
pub fn check_disk_space(path: &Path, required_gb: u64) -> Result<u64> {
    let available = available_space_gb(path)?;
    if available < required_gb {
        return Err(PipelineError::Resource(format!(
            "Insufficient disk space. Required: {} GB, Available: {} GB",
            required_gb, available
        )));
    }
    Ok(available)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_zero_requirement_always_passes() {
        let dir = TempDir::new().unwrap();
        assert!(check_disk_space(dir.path(), 0).is_ok());
    }

    #[test]
    fn test_impossible_requirement_fails() {
        let dir = TempDir::new().unwrap();
        let err = check_disk_space(dir.path(), u64::MAX).unwrap_err();
        assert!(matches!(err, PipelineError::Resource(_)));
        assert!(err.to_string().contains("Insufficient disk space"));
    }

    #[test]
    fn test_missing_path_is_resource_error() {
        let result = available_space_gb(Path::new("/nonexistent_path_12345/x"));
        assert!(matches!(result, Err(PipelineError::Resource(_))));
    }
}
