//! Process-backed adapters for the status lookup, captcha solver, and sinks.
//!
//! Each adapter shells out to a configured program, so the scraping client,
//! captcha model, and notification transports stay outside this binary.

use std::fmt;
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;

use ceac_tracker::config::{AdapterConfig, ConfigError};
use ceac_tracker::tracking::{
    ApplicantIdentity, CaptchaError, CaptchaSolver, NotificationSink, SinkError, SourceError,
    StatusQueryResult, StatusSource,
};
use tracing::info;

/// A program plus its leading arguments, split on whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    fn required(raw: Option<&str>, key: &'static str) -> Result<Self, ConfigError> {
        raw.and_then(Self::parse)
            .ok_or(ConfigError::MissingVariable(key))
    }

    /// Run with `extra` appended to the configured arguments and return stdout.
    ///
    /// `input` is fed from a scoped thread while stdout and stderr drain, so a
    /// program that echoes its input cannot fill a pipe and stall.
    fn run(&self, extra: &[&str], input: Option<&[u8]>) -> Result<Vec<u8>, String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .args(extra)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("failed to run {}: {e}", self.program))?;
        let stdin = child.stdin.take();

        let (output, written) = thread::scope(|scope| {
            let feeder = match (input, stdin) {
                (Some(bytes), Some(mut stdin)) => Some(scope.spawn(move || stdin.write_all(bytes))),
                _ => None,
            };
            let output = child.wait_with_output();
            let written = match feeder.map(|handle| handle.join()) {
                Some(Ok(result)) => result,
                Some(Err(_)) => Err(io::Error::other("stdin writer panicked")),
                None => Ok(()),
            };
            (output, written)
        });

        let output = output.map_err(|e| format!("failed to wait for {}: {e}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            ));
        }

        // A program may exit successfully without reading all of its input.
        match written {
            Err(err) if err.kind() != io::ErrorKind::BrokenPipe => {
                Err(format!("failed to write to {}: {err}", self.program))
            }
            _ => Ok(output.stdout),
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Two-phase lookup: `challenge` prints the captcha image, `query` prints the
/// status JSON once given the solved token.
#[derive(Debug)]
pub(crate) struct CommandStatusSource {
    command: CommandLine,
}

impl CommandStatusSource {
    pub(crate) fn from_config(config: &AdapterConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            command: CommandLine::required(config.status_command.as_deref(), "STATUS_COMMAND")?,
        })
    }
}

impl StatusSource for CommandStatusSource {
    fn query(
        &self,
        applicant: &ApplicantIdentity,
        solver: &dyn CaptchaSolver,
    ) -> Result<StatusQueryResult, SourceError> {
        let image = self
            .command
            .run(&["challenge", "--location", &applicant.location], None)
            .map_err(SourceError::Transport)?;
        let token = solver.solve(&image)?;

        let output = self
            .command
            .run(
                &[
                    "query",
                    "--location",
                    &applicant.location,
                    "--number",
                    &applicant.case_number,
                    "--passport-number",
                    &applicant.passport_number,
                    "--surname",
                    &applicant.surname,
                    "--captcha",
                    &token,
                ],
                None,
            )
            .map_err(SourceError::Transport)?;

        serde_json::from_slice(&output).map_err(|err| SourceError::Response(err.to_string()))
    }
}

/// Pipes the captcha image to a program and reads the token from stdout.
#[derive(Debug)]
pub(crate) struct CommandCaptchaSolver {
    command: CommandLine,
}

impl CommandCaptchaSolver {
    pub(crate) fn from_config(config: &AdapterConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            command: CommandLine::required(config.captcha_command.as_deref(), "CAPTCHA_COMMAND")?,
        })
    }
}

impl CaptchaSolver for CommandCaptchaSolver {
    fn solve(&self, image: &[u8]) -> Result<String, CaptchaError> {
        let output = self
            .command
            .run(&[], Some(image))
            .map_err(CaptchaError::Unavailable)?;
        let token = String::from_utf8_lossy(&output).trim().to_string();
        if token.is_empty() {
            return Err(CaptchaError::Unsolved(format!(
                "{} printed no token",
                self.command.program
            )));
        }
        Ok(token)
    }
}

/// Writes every report to the log. Always registered first.
#[derive(Debug, Default)]
pub(crate) struct LogSink;

impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn deliver(&self, result: &StatusQueryResult) -> Result<(), SinkError> {
        info!(
            status = %result.status,
            case_last_updated = %result.case_last_updated,
            fields = result.details.len(),
            "status report"
        );
        Ok(())
    }
}

/// Pipes the report as JSON to a notification program (mailer, push client).
#[derive(Debug)]
pub(crate) struct CommandSink {
    name: String,
    command: CommandLine,
}

impl CommandSink {
    /// `position` is the entry's 1-based place in `NOTIFY_COMMANDS`; it keeps
    /// the names of repeated programs apart in failure reports.
    pub(crate) fn parse(position: usize, raw: &str) -> Option<Self> {
        CommandLine::parse(raw).map(|command| Self {
            name: format!("notify[{position}] {command}"),
            command,
        })
    }
}

impl NotificationSink for CommandSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn deliver(&self, result: &StatusQueryResult) -> Result<(), SinkError> {
        let payload =
            serde_json::to_vec(result).map_err(|err| SinkError::Rejected(err.to_string()))?;
        self.command
            .run(&[], Some(&payload))
            .map(|_| ())
            .map_err(SinkError::Transport)
    }
}
