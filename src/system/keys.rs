//! Signing-key store access (gpg) and operator consent prompt.

use futures::future::{BoxFuture, FutureExt};
use std::io::{self, BufRead, Write};
use tokio::sync::oneshot;

use crate::system::command::ToolCommand;

/// Probe the user's keyring for a public key. Non-zero exit means missing.
pub fn list_key_command(key_id: &str, user: &str) -> ToolCommand {
    ToolCommand::new("gpg")
        .arg("--list-public-keys")
        .arg(key_id)
        .as_user(user)
        .allow_fail()
}

/// Fetch a public key from the configured keyserver into the user's keyring.
pub fn receive_key_command(key_id: &str, user: &str) -> ToolCommand {
    ToolCommand::new("gpg")
        .arg("--recv-keys")
        .arg(key_id)
        .as_user(user)
}

/// One-time yes/no question to the operator.
///
/// Dropping the returned future abandons the question.
pub trait Prompter: Send + Sync {
    fn confirm<'a>(&'a self, question: &'a str) -> BoxFuture<'a, bool>;
}

/// Prompter reading a reply line from stdin. Anything but y/yes is a decline.
#[derive(Debug, Default, Clone)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn confirm<'a>(&'a self, question: &'a str) -> BoxFuture<'a, bool> {
        let question = question.to_string();
        async move {
            // The reader thread is detached: if the run is interrupted it stays
            // blocked on stdin until the process exits.
            let (tx, rx) = oneshot::channel();
            let spawned = std::thread::Builder::new()
                .name("zfs-prompt".to_string())
                .spawn(move || {
                    let _ = tx.send(read_reply(&question));
                });
            if let Err(e) = spawned {
                log::warn!("[Keys] Failed to start prompt reader: {}", e);
                return false;
            }
            rx.await.unwrap_or(false)
        }
        .boxed()
    }
}

fn read_reply(question: &str) -> bool {
    print!("{} ", question);
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut reply = String::new();
    match io::stdin().lock().read_line(&mut reply) {
        Ok(_) => is_affirmative(&reply),
        Err(e) => {
            log::warn!("[Keys] Failed to read reply: {}", e);
            false
        }
    }
}

/// `y` or `yes`, case-insensitive, surrounding whitespace ignored
pub fn is_affirmative(reply: &str) -> bool {
    matches!(reply.trim().to_lowercase().as_str(), "y" | "yes")
}
