//! One launched external command and its captured output.
//!
//! stdout and stderr go to two anonymous temporary files owned by the handle,
//! so a chatty child never blocks on a full pipe while the runner is asleep.
//! The exit status is set exactly once; a finished handle is never polled
//! again.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};

use crate::error::{Error, Result};

#[derive(Debug)]
pub struct ProcessHandle {
    argv: Vec<String>,
    child: Child,
    status: Option<ExitStatus>,
    stdout: File,
    stderr: File,
}

/// Output read back from a finished handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ProcessHandle {
    /// Launch `argv` with stdin closed. Must run inside a tokio runtime.
    pub fn spawn(argv: &[String]) -> Result<Self> {
        let shown = shell_words::join(argv);
        let Some((program, args)) = argv.split_first() else {
            return Err(Error::execution(shown, "empty command"));
        };

        let stdout = tempfile::tempfile()?;
        let stderr = tempfile::tempfile()?;

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout.try_clone()?))
            .stderr(Stdio::from(stderr.try_clone()?))
            .spawn()
            .map_err(|e| Error::execution(&shown, e))?;

        tracing::debug!(pid = child.id(), command = %shown, "spawned");

        Ok(Self {
            argv: argv.to_vec(),
            child,
            status: None,
            stdout,
            stderr,
        })
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn status(&self) -> Option<ExitStatus> {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_some()
    }

    /// Non-blocking check. Returns `Some(status)` only on the poll where the
    /// child is first seen to have exited; afterwards it always returns `None`
    /// without touching the child.
    pub fn poll(&mut self) -> Result<Option<ExitStatus>> {
        if self.status.is_some() {
            return Ok(None);
        }
        match self.child.try_wait()? {
            Some(status) => {
                self.status = Some(status);
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }

    /// Read captured output back. Consumes the handle, releasing the files.
    pub fn into_output(mut self) -> Result<CapturedOutput> {
        Ok(CapturedOutput {
            stdout: read_all(&mut self.stdout)?,
            stderr: read_all(&mut self.stderr)?,
        })
    }
}

fn read_all(file: &mut File) -> Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Exit code of a finished process; `None` when killed by a signal.
pub fn exit_code(status: ExitStatus) -> Option<i32> {
    status.code()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn argv(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    async fn wait(handle: &mut ProcessHandle) -> ExitStatus {
        loop {
            if let Some(status) = handle.poll().unwrap() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn captures_stdout_and_stderr_separately() {
        let mut handle =
            ProcessHandle::spawn(&argv(&["sh", "-c", "echo out; echo err >&2; exit 7"])).unwrap();
        let status = wait(&mut handle).await;
        assert_eq!(exit_code(status), Some(7));
        assert!(handle.is_finished());

        let out = handle.into_output().unwrap();
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
    }

    #[tokio::test]
    async fn status_transitions_once() {
        let mut handle = ProcessHandle::spawn(&argv(&["true"])).unwrap();
        wait(&mut handle).await;
        let status = handle.status();
        assert!(status.is_some());
        for _ in 0..3 {
            assert!(handle.poll().unwrap().is_none(), "no second transition");
        }
        assert_eq!(handle.status(), status);
    }

    #[tokio::test]
    async fn missing_executable_is_execution_failed() {
        let err = ProcessHandle::spawn(&argv(&["/definitely/not/here-shellkit"])).unwrap_err();
        assert!(matches!(err, Error::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn empty_argv_is_execution_failed() {
        let err = ProcessHandle::spawn(&[]).unwrap_err();
        assert!(matches!(err, Error::ExecutionFailed { .. }));
    }
}
