use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Output};

/// Trait for running external programs (provider CLI, IaC binary), allowing for mocking in tests
pub trait CommandExecutor: Send + Sync {
    /// Run a program to completion and capture stdout/stderr
    fn execute(
        &self,
        program: &str,
        args: &[String],
        envs: &[(String, String)],
        working_dir: Option<&Path>,
    ) -> Result<Output>;
}

/// Real command executor using std::process::Command
pub struct RealCommandExecutor;

impl RealCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RealCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(
        &self,
        program: &str,
        args: &[String],
        envs: &[(String, String)],
        working_dir: Option<&Path>,
    ) -> Result<Output> {
        let mut command = Command::new(program);
        command.args(args);

        for (key, value) in envs {
            command.env(key, value);
        }

        if let Some(dir) = working_dir {
            command.current_dir(dir);
        }

        command
            .output()
            .with_context(|| format!("Failed to execute {}", program))
    }
}

/// Canned result for one invocation of the mock executor
#[cfg(test)]
#[derive(Clone, Debug)]
pub struct MockCommandResult {
    /// Substring matched against "program arg1 arg2 ..."
    pub pattern: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[cfg(test)]
impl MockCommandResult {
    pub fn ok(pattern: impl Into<String>, stdout: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn fail(pattern: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            exit_code: 255,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Mock command executor for testing
///
/// Results are consumed in order; the first result whose pattern occurs in the
/// rendered command line wins. Unmatched commands succeed with empty output.
#[cfg(test)]
pub struct MockCommandExecutor {
    outputs: std::sync::Mutex<Vec<MockCommandResult>>,
    invocations: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockCommandExecutor {
    pub fn new() -> Self {
        Self::with_outputs(Vec::new())
    }

    pub fn with_outputs(outputs: Vec<MockCommandResult>) -> Self {
        Self {
            outputs: std::sync::Mutex::new(outputs),
            invocations: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Command lines seen so far, in call order
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Default for MockCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl CommandExecutor for MockCommandExecutor {
    fn execute(
        &self,
        program: &str,
        args: &[String],
        _envs: &[(String, String)],
        _working_dir: Option<&Path>,
    ) -> Result<Output> {
        let line = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");

        self.invocations.lock().unwrap().push(line.clone());

        let mut outputs = self.outputs.lock().unwrap();

        if let Some(position) = outputs.iter().position(|r| line.contains(&r.pattern)) {
            let result = outputs.remove(position);
            return Ok(Output {
                status: create_exit_status(result.exit_code),
                stdout: result.stdout.into_bytes(),
                stderr: result.stderr.into_bytes(),
            });
        }

        Ok(Output {
            status: create_exit_status(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
    }
}

#[cfg(test)]
fn create_exit_status(code: i32) -> std::process::ExitStatus {
    // ExitStatus has no public constructor; go through the raw wait status
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code << 8)
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code as u32)
    }
}
