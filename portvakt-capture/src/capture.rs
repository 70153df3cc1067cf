//! Capture Source process management.

use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use portvakt_config::CaptureConfig;
use tokio::io::BufReader;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info};

use crate::error::CaptureError;
use crate::lines::{LineReader, LineSource};

/// Fully resolved command line of the capture process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureCommand {
    program: String,
    args: Vec<String>,
}

impl CaptureCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds the tcpdump-style invocation for the monitored `port`.
    ///
    /// Output is line buffered (`-l`), numeric (`-nn`) and includes packet
    /// contents as ASCII (`-A`).
    pub fn from_config(config: &CaptureConfig, port: u16) -> Self {
        let mut args = Vec::with_capacity(9);
        if config.use_sudo {
            args.push(config.program.clone());
        }
        args.extend(
            [
                "-l".to_string(),
                "-nn".to_string(),
                "-A".to_string(),
                "-s".to_string(),
                config.snaplen.to_string(),
                "-i".to_string(),
                config.interface.clone(),
                filter_expression(port, config.companion_port),
            ]
            .into_iter(),
        );

        let program = if config.use_sudo {
            "sudo".to_string()
        } else {
            config.program.clone()
        };
        Self { program, args }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Launches the capture process with its stdout piped back to us.
    ///
    /// The child leads its own process group so that [`CaptureTerminator`]
    /// reaches both `sudo` and the capture program. It is also killed if the
    /// returned [`CaptureProcess`] is dropped.
    pub fn spawn(&self) -> Result<CaptureProcess, CaptureError> {
        info!(program = %self.program, args = ?self.args, "Launching capture process");
        let mut command = Command::new(&self.program);
        #[cfg(unix)]
        command.process_group(0);
        let mut child = command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CaptureError::Launch {
                program: self.program.clone(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or(CaptureError::MissingStdout)?;
        debug!(pid = ?child.id(), "Capture process started");

        Ok(CaptureProcess {
            child,
            lines: LineReader::new(BufReader::new(stdout)),
        })
    }
}

/// Packet filter covering the monitored port and its companion.
pub fn filter_expression(port: u16, companion_port: u16) -> String {
    if port == companion_port {
        format!("tcp port {port}")
    } else {
        format!("tcp port {port} or tcp port {companion_port}")
    }
}

/// A running capture process. Its stdout is only read through [`LineSource`].
pub struct CaptureProcess {
    child: Child,
    lines: LineReader<BufReader<ChildStdout>>,
}

impl CaptureProcess {
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn terminator(&self) -> CaptureTerminator {
        CaptureTerminator {
            pid: self.child.id(),
        }
    }

    /// Waits for the process to exit; call after the line stream has ended.
    pub async fn wait(&mut self) -> Result<ExitStatus, CaptureError> {
        self.child.wait().await.map_err(CaptureError::Wait)
    }
}

/// Detached handle that asks the capture process group to stop.
///
/// Usable where the [`CaptureProcess`] itself is out of reach, e.g. right
/// before the process exits without running destructors.
#[derive(Debug, Clone, Copy)]
pub struct CaptureTerminator {
    pid: Option<u32>,
}

impl CaptureTerminator {
    /// Sends SIGTERM to the capture process group. `sudo` relays it to the
    /// capture program. Returns whether the signal was delivered.
    #[cfg(unix)]
    pub fn terminate(&self) -> bool {
        let Some(pgid) = self.pid.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
            return false;
        };
        // SAFETY: kill(2) takes plain integers and touches no memory of ours.
        let delivered = unsafe { libc::kill(-pgid, libc::SIGTERM) } == 0;
        if delivered {
            debug!(pgid, "Sent SIGTERM to capture process group");
        }
        delivered
    }

    #[cfg(not(unix))]
    pub fn terminate(&self) -> bool {
        false
    }
}

#[async_trait]
impl LineSource for CaptureProcess {
    async fn next_line(&mut self) -> Result<Option<String>, CaptureError> {
        self.lines.next_line().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_default_tcpdump_invocation() {
        let command = CaptureCommand::from_config(&CaptureConfig::default(), 81);
        assert_eq!(command.program(), "sudo");
        assert_eq!(
            command.args(),
            [
                "tcpdump",
                "-l",
                "-nn",
                "-A",
                "-s",
                "0",
                "-i",
                "any",
                "tcp port 81 or tcp port 443"
            ]
        );
    }

    #[test]
    fn runs_without_sudo_when_disabled() {
        let config = CaptureConfig {
            use_sudo: false,
            interface: "eth1".into(),
            ..CaptureConfig::default()
        };
        let command = CaptureCommand::from_config(&config, 8080);
        assert_eq!(command.program(), "tcpdump");
        assert_eq!(command.args()[0], "-l");
        assert!(command.args().contains(&"eth1".to_string()));
    }

    #[test]
    fn filter_collapses_duplicate_ports() {
        assert_eq!(filter_expression(443, 443), "tcp port 443");
        assert_eq!(filter_expression(81, 443), "tcp port 81 or tcp port 443");
    }

    #[tokio::test]
    async fn streams_child_stdout_as_lines() {
        let command = CaptureCommand::new("sh", ["-c", "printf 'one\\ntwo\\n'"]);
        let mut process = command.spawn().expect("sh should launch");

        assert_eq!(process.next_line().await.unwrap().as_deref(), Some("one"));
        assert_eq!(process.next_line().await.unwrap().as_deref(), Some("two"));
        assert_eq!(process.next_line().await.unwrap(), None);
        assert!(process.wait().await.unwrap().success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn terminator_stops_the_capture_group() {
        let command = CaptureCommand::new("sh", ["-c", "sleep 30; echo late"]);
        let mut process = command.spawn().expect("sh should launch");
        let terminator = process.terminator();

        assert!(terminator.terminate());
        let status = tokio::time::timeout(std::time::Duration::from_secs(5), process.wait())
            .await
            .expect("capture group should stop on SIGTERM")
            .unwrap();
        assert!(!status.success());
        assert_eq!(process.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn launch_failure_is_reported() {
        let command = CaptureCommand::new("/nonexistent/portvakt-capture", Vec::<String>::new());
        let err = command.spawn().err().unwrap();
        assert!(matches!(err, CaptureError::Launch { .. }));
    }
}
