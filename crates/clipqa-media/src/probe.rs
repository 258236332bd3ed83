//! FFprobe video information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Video stream information used for sidecar metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Duration in seconds, when the container reports one
    pub duration: Option<f64>,
}

impl VideoInfo {
    /// `WIDTHxHEIGHT`
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Frame rate without trailing zeros (`25`, `29.97`).
    pub fn fps_label(&self) -> String {
        let rounded = (self.fps * 100.0).round() / 100.0;
        if rounded.fract() == 0.0 {
            format!("{}", rounded as i64)
        } else {
            format!("{}", rounded)
        }
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Probe the first video stream of a file.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,avg_frame_rate,r_frame_rate:format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let stream = probe
        .streams
        .first()
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found in file".to_string()))?;

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(0.0);

    let duration = probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok());

    Ok(VideoInfo {
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
        fps,
        duration,
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97"). `0/0` yields `None`.
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        return (den > 0.0).then(|| num / den);
    }
    s.parse().ok()
}
