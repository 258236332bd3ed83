//! Clip-cutting ffmpeg invocations.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Bytes of stderr kept for the error message.
const STDERR_TAIL_BYTES: usize = 2048;

/// One ffmpeg invocation: input options, the input, output options, the output.
///
/// Always overwrites the output and only logs errors.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    before_input: Vec<String>,
    after_input: Vec<String>,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            before_input: Vec::new(),
            after_input: Vec::new(),
        }
    }

    fn input_option(mut self, flag: &str, value: impl Into<String>) -> Self {
        self.before_input.extend([flag.to_string(), value.into()]);
        self
    }

    fn output_option(mut self, flag: &str, value: impl Into<String>) -> Self {
        self.after_input.extend([flag.to_string(), value.into()]);
        self
    }

    /// Keyframe seek on the input, in seconds.
    pub fn seek(self, secs: f64) -> Self {
        self.input_option("-ss", format!("{:.3}", secs))
    }

    /// Length of the produced clip, in seconds.
    pub fn duration(self, secs: f64) -> Self {
        self.output_option("-t", format!("{:.3}", secs))
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_option("-c:v", codec)
    }

    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_option("-preset", preset)
    }

    pub fn crf(self, crf: u8) -> Self {
        self.output_option("-crf", crf.to_string())
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_option("-c:a", codec)
    }

    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_option("-b:a", bitrate)
    }

    /// Moov atom first, so review links play while still downloading.
    pub fn fast_start(self) -> Self {
        self.output_option("-movflags", "+faststart")
    }

    pub fn build_args(&self) -> Vec<String> {
        ["-y", "-v", "error"]
            .into_iter()
            .map(String::from)
            .chain(self.before_input.iter().cloned())
            .chain(["-i".to_string(), self.input.display().to_string()])
            .chain(self.after_input.iter().cloned())
            .chain([self.output.display().to_string()])
            .collect()
    }
}

/// Spawns ffmpeg, killing it if it outlives the timeout.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    timeout: Option<Duration>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let binary = check_ffmpeg()?;
        let args = cmd.build_args();
        debug!(args = %args.join(" "), "Spawning ffmpeg");

        let child = Command::new(binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let waited = child.wait_with_output();
        let output = match self.timeout {
            None => waited.await?,
            Some(limit) => tokio::time::timeout(limit, waited).await.map_err(|_| {
                warn!(output = %cmd.output.display(), "ffmpeg killed after {:?}", limit);
                MediaError::Timeout(limit.as_secs())
            })??,
        };

        if !output.status.success() {
            return Err(MediaError::ffmpeg_failed(
                format!("exited with {}", output.status),
                Some(stderr_tail(&output.stderr)),
                output.status.code(),
            ));
        }
        Ok(())
    }
}

/// Last `STDERR_TAIL_BYTES` of stderr, cut on a char boundary.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let mut start = text.len().saturating_sub(STDERR_TAIL_BYTES);
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_before_input_and_duration_after() {
        let args = FfmpegCommand::new("input.mp4", "output.mp4")
            .seek(10.0)
            .duration(30.0)
            .video_codec("libx264")
            .crf(18)
            .build_args();

        assert_eq!(&args[..3], ["-y", "-v", "error"]);
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert!(ss < input && input < t);
        assert_eq!(args[ss + 1], "10.000");
        assert_eq!(args[t + 1], "30.000");
        assert_eq!(args.last().map(String::as_str), Some("output.mp4"));
    }

    #[test]
    fn test_stderr_tail_keeps_end() {
        let long = "x".repeat(STDERR_TAIL_BYTES + 100) + "final error";
        let tail = stderr_tail(long.as_bytes());
        assert_eq!(tail.len(), STDERR_TAIL_BYTES);
        assert!(tail.ends_with("final error"));

        assert_eq!(stderr_tail(b"  short \n"), "short");
    }
}
