use std::path::{Path, PathBuf};
use std::process::{Command as StdCommand, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::error::{Result, VideoError};

/// How an ffmpeg run ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Finished,
    Cancelled,
}

/// Runs ffmpeg with machine-readable progress on stdout
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    binary: PathBuf,
    cancel_check: Duration,
}

impl FfmpegRunner {
    pub fn new<P: Into<PathBuf>>(binary: P) -> Self {
        Self {
            binary: binary.into(),
            cancel_check: Duration::from_millis(100),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn check_available(&self) -> bool {
        StdCommand::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Run ffmpeg to completion.
    ///
    /// `args` must not contain progress flags; they are added here. Progress is
    /// reported against `duration` seconds of output. The token is checked on
    /// every progress update and at a fixed interval; when set, the child is
    /// killed and `RunOutcome::Cancelled` is returned.
    pub async fn run<F>(
        &self,
        args: &[String],
        duration: f64,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<RunOutcome>
    where
        F: FnMut(f64) + Send,
    {
        let tool = self.binary.display().to_string();
        debug!("Running {} {}", tool, args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(["-hide_banner", "-nostdin", "-loglevel", "error", "-progress", "pipe:1", "-nostats"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| VideoError::ToolNotFound {
                tool: tool.clone(),
                reason: e.to_string(),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| VideoError::ProcessFailed {
            tool: tool.clone(),
            reason: "stdout not captured".to_string(),
        })?;
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buffer = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buffer).await;
            }
            buffer
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut ticker = tokio::time::interval(self.cancel_check);

        loop {
            if cancel.is_cancelled() {
                debug!("Cancelling {}", tool);
                if let Err(e) = child.start_kill() {
                    warn!("Could not kill {}: {}", tool, e);
                }
                let _ = child.wait().await;
                return Ok(RunOutcome::Cancelled);
            }

            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => {
                        if let Some(fraction) = parse_progress_line(&line, duration) {
                            on_progress(fraction);
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {}
            }
        }

        let status = child.wait().await?;
        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }

        if status.success() {
            Ok(RunOutcome::Finished)
        } else {
            let stderr = stderr_task.await.unwrap_or_default();
            let reason = match stderr.trim() {
                "" => format!("exited with {}", status),
                message => message.to_string(),
            };
            Err(VideoError::ProcessFailed { tool, reason }.into())
        }
    }
}

/// Parse one `key=value` line of `-progress` output into a fraction.
///
/// Both `out_time_us` and the misnamed `out_time_ms` carry microseconds.
pub fn parse_progress_line(line: &str, duration: f64) -> Option<f64> {
    let (key, value) = line.trim().split_once('=')?;

    match key {
        "progress" if value == "end" => Some(1.0),
        "out_time_us" | "out_time_ms" if duration > 0.0 => {
            let micros = value.parse::<i64>().ok()?;
            Some((micros as f64 / 1_000_000.0 / duration).clamp(0.0, 1.0))
        }
        _ => None,
    }
}

/// Round a pixel dimension down to an even value, as most encoders require
pub fn even_pixels(value: f64) -> u32 {
    whole_pixels(value) & !1
}

/// Floor a pixel offset, clamped at 0
pub fn whole_pixels(value: f64) -> u32 {
    value.max(0.0).floor() as u32
}

/// Bitrate argument in kilobits per second
pub fn bitrate_arg(mbps: f64) -> String {
    format!("{}k", (mbps * 1000.0).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_line() {
        assert_eq!(parse_progress_line("out_time_us=2000000", 4.0), Some(0.5));
        assert_eq!(parse_progress_line("out_time_ms=4000000", 4.0), Some(1.0));
        assert_eq!(parse_progress_line("out_time_us=9000000", 4.0), Some(1.0));
        assert_eq!(parse_progress_line("progress=end", 0.0), Some(1.0));
        assert_eq!(parse_progress_line("progress=continue", 4.0), None);
        assert_eq!(parse_progress_line("out_time_us=N/A", 4.0), None);
        assert_eq!(parse_progress_line("frame=12", 4.0), None);
    }

    #[test]
    fn test_negative_out_time_clamps_to_zero() {
        assert_eq!(parse_progress_line("out_time_us=-23220", 4.0), Some(0.0));
    }

    #[test]
    fn test_even_pixels() {
        assert_eq!(even_pixels(201.7), 200);
        assert_eq!(even_pixels(200.0), 200);
        assert_eq!(even_pixels(-3.0), 0);
        assert_eq!(whole_pixels(51.9), 51);
        assert_eq!(whole_pixels(-0.5), 0);
    }

    #[test]
    fn test_bitrate_arg() {
        assert_eq!(bitrate_arg(1.0), "1000k");
        assert_eq!(bitrate_arg(2.5), "2500k");
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_error() {
        let runner = FfmpegRunner::new("/nonexistent/ffmpeg-binary");
        assert!(!runner.check_available());

        let result = runner.run(&[], 1.0, &CancellationToken::new(), |_| {}).await;
        assert!(matches!(
            result,
            Err(crate::error::PipelineError::Video(VideoError::ToolNotFound { .. }))
        ));
    }
}
