//! Scripted doubles for the command and prompt seams.
//!
//! Shared by the unit tests and the integration tests (`tests/common`), so it
//! only names seam types through `super`.

#![allow(dead_code)]

use futures::future::{BoxFuture, FutureExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{CommandRunner, Prompter, Result, ToolCommand, ToolOutput};

pub type Hook = Arc<dyn Fn(&ToolCommand) + Send + Sync>;

/// Records every command. Rules match on a substring of the rendered command line.
#[derive(Default)]
pub struct ScriptedRunner {
    calls: Mutex<Vec<ToolCommand>>,
    failures: Vec<(String, i32)>,
    outputs: Vec<(String, String)>,
    hooks: Vec<(String, Hook)>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_when(mut self, pattern: &str, code: i32) -> Self {
        self.failures.push((pattern.to_string(), code));
        self
    }

    pub fn stdout_when(mut self, pattern: &str, stdout: &str) -> Self {
        self.outputs.push((pattern.to_string(), stdout.to_string()));
        self
    }

    pub fn on(mut self, pattern: &str, hook: Hook) -> Self {
        self.hooks.push((pattern.to_string(), hook));
        self
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.program).collect()
    }

    pub fn count(&self, program: &str) -> usize {
        self.programs().iter().filter(|p| p.as_str() == program).count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn execute<'a>(&'a self, command: &'a ToolCommand) -> BoxFuture<'a, Result<ToolOutput>> {
        async move {
            let rendered = command.to_string();
            self.calls.lock().unwrap().push(command.clone());

            for (pattern, hook) in &self.hooks {
                if rendered.contains(pattern.as_str()) {
                    hook(command);
                }
            }

            let mut output = ToolOutput::default();
            if let Some((_, code)) = self.failures.iter().find(|(p, _)| rendered.contains(p.as_str())) {
                output.code = *code;
                output.stderr = format!("{} failed", command.program);
            }
            if let Some((_, stdout)) = self.outputs.iter().find(|(p, _)| rendered.contains(p.as_str())) {
                output.stdout = stdout.clone();
            }
            Ok(output)
        }
        .boxed()
    }
}

/// Answers every question the same way, optionally after a delay.
pub struct ScriptedPrompter {
    answer: bool,
    delay: Option<Duration>,
    asked: AtomicUsize,
}

impl ScriptedPrompter {
    pub fn new(answer: bool) -> Self {
        ScriptedPrompter {
            answer,
            delay: None,
            asked: AtomicUsize::new(0),
        }
    }

    /// Operator who takes `delay` to reply
    pub fn answer_after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm<'a>(&'a self, _question: &'a str) -> BoxFuture<'a, bool> {
        async move {
            self.asked.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.answer
        }
        .boxed()
    }
}
