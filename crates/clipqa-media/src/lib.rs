//! FFmpeg CLI wrapper for the segmentation worker.
//!
//! Cuts review clips out of a downloaded source, probes them for stream
//! information, and renders the XML metadata sidecar uploaded with each clip.
//! All media work shells out to `ffmpeg` / `ffprobe`; no codec libraries are
//! linked.

pub mod command;
pub mod cut;
pub mod download;
pub mod error;
pub mod probe;
pub mod sidecar;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use cut::{clip_output_path, clip_stem, cut_clip, cut_clip_with, CutSettings};
pub use download::{download_source, SourceDownloader};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_video, VideoInfo};
pub use sidecar::{render_sidecar, write_sidecar, SidecarMetadata};
