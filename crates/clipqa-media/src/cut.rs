//! Clip cutting.

use std::path::{Path, PathBuf};
use tracing::info;

use clipqa_models::timestamp::{format_hms, ms_to_secs};
use clipqa_models::VideoId;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Encoding settings for review clips.
#[derive(Debug, Clone)]
pub struct CutSettings {
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for CutSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: "veryfast".to_string(),
            crf: 20,
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
        }
    }
}

/// Base file name for one clip's artifacts: `{video}-{HH:MM:SS}-{HH:MM:SS}`.
pub fn clip_stem(video_id: &VideoId, start_ms: i64, end_ms: i64) -> String {
    format!("{}-{}-{}", video_id, format_hms(start_ms), format_hms(end_ms))
}

/// Local path for a cut clip inside `dir`.
pub fn clip_output_path(dir: &Path, video_id: &VideoId, start_ms: i64, end_ms: i64) -> PathBuf {
    dir.join(format!("{}.mp4", clip_stem(video_id, start_ms, end_ms)))
}

/// Cut `[start_ms, end_ms)` out of `source` into `output`, re-encoding to
/// H.264/AAC with default settings.
pub async fn cut_clip(
    source: impl AsRef<Path>,
    start_ms: i64,
    end_ms: i64,
    output: impl AsRef<Path>,
) -> MediaResult<PathBuf> {
    cut_clip_with(source, start_ms, end_ms, output, &CutSettings::default(), &FfmpegRunner::new()).await
}

/// Cut with explicit encoding settings and runner.
pub async fn cut_clip_with(
    source: impl AsRef<Path>,
    start_ms: i64,
    end_ms: i64,
    output: impl AsRef<Path>,
    settings: &CutSettings,
    runner: &FfmpegRunner,
) -> MediaResult<PathBuf> {
    let source = source.as_ref();
    let output = output.as_ref();

    let cmd = build_cut_command(source, start_ms, end_ms, output, settings)?;
    if !source.exists() {
        return Err(MediaError::FileNotFound(source.to_path_buf()));
    }

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    info!(
        "Cutting clip: {} -> {} ({}..{})",
        source.display(),
        output.display(),
        format_hms(start_ms),
        format_hms(end_ms)
    );

    runner.run(&cmd).await?;

    if !output.exists() {
        return Err(MediaError::ffmpeg_failed("FFmpeg produced no output file", None, None));
    }

    Ok(output.to_path_buf())
}

fn build_cut_command(
    source: &Path,
    start_ms: i64,
    end_ms: i64,
    output: &Path,
    settings: &CutSettings,
) -> MediaResult<FfmpegCommand> {
    if start_ms < 0 || end_ms <= start_ms {
        return Err(MediaError::InvalidRange { start_ms, end_ms });
    }

    Ok(FfmpegCommand::new(source, output)
        .seek(ms_to_secs(start_ms))
        .duration(ms_to_secs(end_ms - start_ms))
        .video_codec(settings.video_codec.clone())
        .preset(settings.preset.clone())
        .crf(settings.crf)
        .audio_codec(settings.audio_codec.clone())
        .audio_bitrate(settings.audio_bitrate.clone())
        .fast_start())
}
