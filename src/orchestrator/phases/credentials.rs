//! Credential gate: signing keys in the invoking user's keyring.

use crate::error::{PipelineError, Result};
use crate::system::keys::{list_key_command, receive_key_command};
use crate::system::{run, CommandRunner, Prompter};

/// Make sure every signing key is present, asking once before fetching.
///
/// Returns the keys that had to be retrieved. A declined prompt is
/// `UserCancelled` and nothing is fetched.
pub async fn ensure_keys(
    runner: &dyn CommandRunner,
    prompter: &dyn Prompter,
    keys: &[String],
    user: &str,
) -> Result<Vec<String>> {
    let mut missing = Vec::new();
    for key in keys {
        let output = run(runner, &list_key_command(key, user)).await?;
        if !output.success() {
            missing.push(key.clone());
        }
    }

    if missing.is_empty() {
        log::info!("[Keys] All {} signing keys present", keys.len());
        return Ok(missing);
    }

    log::warn!("[Keys] Missing signing keys: {}", missing.join(" "));
    let question = format!("Retrieve missing signing keys {} (N/y)?", missing.join(" "));
    if !prompter.confirm(&question).await {
        return Err(PipelineError::UserCancelled);
    }

    for key in &missing {
        log::info!("[Keys] Retrieving key {}", key);
        run(runner, &receive_key_command(key, user)).await?;
    }
    Ok(missing)
}
