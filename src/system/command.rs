//! External tool execution.
//!
//! Every collaborator the pipeline relies on (mkarchroot, pacman, pacstrap,
//! makechrootpkg, gpg, chown) is reached through the `CommandRunner` trait so
//! the orchestration can be driven by a scripted runner in tests.
//! `SystemRunner` is the production implementation on `tokio::process`.

use futures::future::{BoxFuture, FutureExt};
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::error::{PipelineError, Result};

/// Lines of stderr kept for the failure message of a streamed command
const STDERR_TAIL_LINES: usize = 20;

/// Builder describing one external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    /// Run through `sudo --user <user>`
    pub run_as: Option<String>,
    /// Non-zero exit is reported as output instead of an error
    pub allow_fail: bool,
    /// Forward output line by line to the log while the tool runs
    pub stream: bool,
}

impl ToolCommand {
    pub fn new(program: impl AsRef<str>) -> Self {
        ToolCommand {
            program: program.as_ref().to_string(),
            args: Vec::new(),
            current_dir: None,
            run_as: None,
            allow_fail: false,
            stream: false,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_string()));
        self
    }

    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    pub fn dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    pub fn as_user(mut self, user: impl AsRef<str>) -> Self {
        self.run_as = Some(user.as_ref().to_string());
        self
    }

    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    pub fn streamed(mut self) -> Self {
        self.stream = true;
        self
    }

    /// True if any argument equals `arg`
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(user) = &self.run_as {
            write!(f, "sudo --user {} ", user)?;
        }
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Result of a command execution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolOutput {
    /// Exit code, or -1 if terminated by signal
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    pub fn stderr_trimmed(&self) -> &str {
        self.stderr.trim()
    }
}

/// Seam over external process execution.
///
/// Implementations report spawn failures as errors and exit codes as output;
/// exit-code policy lives in [`run`].
pub trait CommandRunner: Send + Sync {
    fn execute<'a>(&'a self, command: &'a ToolCommand) -> BoxFuture<'a, Result<ToolOutput>>;
}

/// Execute a command and enforce its exit-code policy.
///
/// Non-zero exit is an `ExternalTool` error carrying the exit code and stderr
/// unless the command was built with `allow_fail()`.
pub async fn run(runner: &dyn CommandRunner, command: &ToolCommand) -> Result<ToolOutput> {
    log::debug!("[Command] Running: {}", command);
    let output = runner.execute(command).await?;

    if !command.allow_fail && !output.success() {
        let stderr = output.stderr_trimmed();
        let reason = if stderr.is_empty() {
            format!("exit code {}", output.code)
        } else {
            format!("exit code {}: {}", output.code, stderr)
        };
        return Err(PipelineError::tool(command.to_string(), reason));
    }

    Ok(output)
}

/// Production runner spawning real processes.
#[derive(Debug, Default, Clone)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        SystemRunner
    }

    fn build(command: &ToolCommand) -> Command {
        let mut cmd = match &command.run_as {
            Some(user) => {
                let mut cmd = Command::new("sudo");
                cmd.arg("--user").arg(user).arg(&command.program);
                cmd
            }
            None => Command::new(&command.program),
        };
        cmd.args(&command.args);
        if let Some(dir) = &command.current_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        cmd
    }

    async fn capture(command: &ToolCommand) -> Result<ToolOutput> {
        let output = Self::build(command).output().await.map_err(|e| {
            PipelineError::tool(
                command.to_string(),
                format!("failed to execute '{}'. Is it installed? ({})", command.program, e),
            )
        })?;

        Ok(ToolOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Spawn with piped output and forward every line to the log as it arrives.
    async fn stream(command: &ToolCommand) -> Result<ToolOutput> {
        let mut cmd = Self::build(command);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            PipelineError::tool(
                command.to_string(),
                format!("failed to spawn '{}': {}", command.program, e),
            )
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PipelineError::tool(command.to_string(), "failed to capture stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| PipelineError::tool(command.to_string(), "failed to capture stderr"))?;

        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();
        let mut stdout_closed = false;
        let mut stderr_closed = false;
        let mut stderr_tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

        while !(stdout_closed && stderr_closed) {
            tokio::select! {
                line = stdout_lines.next_line(), if !stdout_closed => match line {
                    Ok(Some(line)) => log::info!("[{}] {}", command.program, line),
                    Ok(None) => stdout_closed = true,
                    Err(e) => {
                        log::warn!("[{}] stdout read error: {}", command.program, e);
                        stdout_closed = true;
                    }
                },
                line = stderr_lines.next_line(), if !stderr_closed => match line {
                    Ok(Some(line)) => {
                        log::warn!("[{}] [STDERR] {}", command.program, line);
                        if stderr_tail.len() == STDERR_TAIL_LINES {
                            stderr_tail.pop_front();
                        }
                        stderr_tail.push_back(line);
                    }
                    Ok(None) => stderr_closed = true,
                    Err(e) => {
                        log::warn!("[{}] stderr read error: {}", command.program, e);
                        stderr_closed = true;
                    }
                },
            }
        }

        let status = child.wait().await.map_err(|e| {
            PipelineError::tool(command.to_string(), format!("failed to wait for process: {}", e))
        })?;

        Ok(ToolOutput {
            code: status.code().unwrap_or(-1),
            stdout: String::new(),
            stderr: Vec::from(stderr_tail).join("\n"),
        })
    }
}

impl CommandRunner for SystemRunner {
    fn execute<'a>(&'a self, command: &'a ToolCommand) -> BoxFuture<'a, Result<ToolOutput>> {
        async move {
            if command.stream {
                Self::stream(command).await
            } else {
                Self::capture(command).await
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_sudo_prefix() {
        let cmd = ToolCommand::new("gpg")
            .arg("--list-public-keys")
            .arg("C77B9667")
            .as_user("builder");
        assert_eq!(
            cmd.to_string(),
            "sudo --user builder gpg --list-public-keys C77B9667"
        );
    }

    #[test]
    fn test_builder_chaining() {
        let cmd = ToolCommand::new("makechrootpkg")
            .args(["-r", "/w/archroot64"])
            .dir(Path::new("/w/zfs-utils"))
            .allow_fail()
            .streamed();
        assert_eq!(cmd.args, vec!["-r", "/w/archroot64"]);
        assert_eq!(cmd.current_dir, Some(PathBuf::from("/w/zfs-utils")));
        assert!(cmd.allow_fail);
        assert!(cmd.stream);
        assert!(cmd.has_arg("-r"));
        assert!(!cmd.has_arg("-I"));
    }

    #[tokio::test]
    async fn test_run_success_captures_stdout() {
        let runner = SystemRunner::new();
        let output = run(&runner, &ToolCommand::new("echo").arg("hello"))
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout_trimmed(), "hello");
    }

    #[tokio::test]
    async fn test_run_failure_is_external_tool_error() {
        let runner = SystemRunner::new();
        let err = run(&runner, &ToolCommand::new("false")).await.unwrap_err();
        match err {
            PipelineError::ExternalTool { cmd, reason } => {
                assert_eq!(cmd, "false");
                assert!(reason.contains("exit code 1"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_allow_fail_reports_exit_code() {
        let runner = SystemRunner::new();
        let output = run(&runner, &ToolCommand::new("false").allow_fail())
            .await
            .unwrap();
        assert!(!output.success());
        assert_eq!(output.code, 1);
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let runner = SystemRunner::new();
        let result = run(&runner, &ToolCommand::new("nonexistent_program_12345")).await;
        assert!(matches!(result, Err(PipelineError::ExternalTool { .. })));
    }

    #[tokio::test]
    async fn test_streamed_command_keeps_stderr_tail() {
        let runner = SystemRunner::new();
        let cmd = ToolCommand::new("sh")
            .args(["-c", "echo out; echo err >&2; exit 3"])
            .streamed()
            .allow_fail();
        let output = run(&runner, &cmd).await.unwrap();
        assert_eq!(output.code, 3);
        assert_eq!(output.stderr_trimmed(), "err");
    }
}
