use crate::error::{AuditError, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// GoCommandAgent runs the Go tool inside a module directory
pub struct GoCommandAgent {
    go_binary: PathBuf,
    timeout: Duration,
}

impl GoCommandAgent {
    pub fn new(go_binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            go_binary: go_binary.into(),
            timeout,
        }
    }

    /// `go list -m -u -json <module_path>`; returns stdout
    pub fn list_module_with_update(&self, module_root: &Path, module_path: &str) -> Result<String> {
        self.execute_go_command(module_root, &["list", "-m", "-u", "-json", module_path])
    }

    /// Execute a Go command, killing it once the timeout expires
    fn execute_go_command(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let command_line = format!("{} {}", self.go_binary.display(), args.join(" "));
        debug!("Executing: {} (in {})", command_line, dir.display());

        let mut child = Command::new(&self.go_binary)
            .current_dir(dir)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AuditError::Oracle(format!("Failed to spawn {}: {}", command_line, e)))?;

        // Drain both pipes concurrently so a chatty child cannot block on a full pipe.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait_with_deadline(&mut child, &command_line)?;
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if !status.success() {
            return Err(AuditError::Oracle(format!(
                "{} exited with {}: {}",
                command_line,
                status.code().map_or("signal".to_string(), |c| c.to_string()),
                String::from_utf8_lossy(&stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    fn wait_with_deadline(
        &self,
        child: &mut Child,
        command_line: &str,
    ) -> Result<std::process::ExitStatus> {
        let deadline = Instant::now() + self.timeout;

        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }

            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(AuditError::Oracle(format!(
                    "{} timed out after {:?}",
                    command_line, self.timeout
                )));
            }

            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    /// Writes an executable shell script standing in for the go binary
    fn fake_go(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("go");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn returns_stdout_and_runs_in_module_dir() {
        let dir = tempdir().unwrap();
        let go = fake_go(dir.path(), r#"echo "$PWD|$*""#);
        let agent = GoCommandAgent::new(go, Duration::from_secs(10));

        let out = agent
            .list_module_with_update(dir.path(), "golang.org/x/text")
            .unwrap();

        let canonical = dir.path().canonicalize().unwrap();
        let (cwd, args) = out.trim().split_once('|').unwrap();
        assert_eq!(Path::new(cwd).canonicalize().unwrap(), canonical);
        assert_eq!(args, "list -m -u -json golang.org/x/text");
    }

    #[test]
    fn non_zero_exit_reports_stderr() {
        let dir = tempdir().unwrap();
        let go = fake_go(dir.path(), "echo 'module lookup disabled' >&2; exit 1");
        let agent = GoCommandAgent::new(go, Duration::from_secs(10));

        let err = agent
            .list_module_with_update(dir.path(), "example.com/x")
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("module lookup disabled"), "{message}");
    }

    #[test]
    fn kills_command_after_timeout() {
        let dir = tempdir().unwrap();
        let go = fake_go(dir.path(), "exec sleep 30");
        let agent = GoCommandAgent::new(go, Duration::from_millis(200));

        let started = Instant::now();
        let err = agent
            .list_module_with_update(dir.path(), "example.com/x")
            .unwrap_err();

        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn missing_binary_is_an_oracle_error() {
        let dir = tempdir().unwrap();
        let agent = GoCommandAgent::new("/nonexistent/go", Duration::from_secs(1));
        assert!(matches!(
            agent.list_module_with_update(dir.path(), "example.com/x"),
            Err(AuditError::Oracle(_))
        ));
    }
}
