//! XML metadata sidecar written next to each uploaded clip.

use std::path::{Path, PathBuf};

use clipqa_models::timestamp::format_hms;
use clipqa_models::{Clip, Video};

use crate::cut::clip_stem;
use crate::error::MediaResult;
use crate::probe::VideoInfo;

const NOT_AVAILABLE: &str = "N/A";
const CATEGORY: &str = "Emerging Objects and Cinematic Storytelling";

/// Values rendered into one sidecar record.
#[derive(Debug, Clone, PartialEq)]
pub struct SidecarMetadata {
    pub parent_clip: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub resolution: String,
    pub fps: String,
    pub title: String,
    pub description: String,
}

impl SidecarMetadata {
    pub fn for_clip(video: &Video, clip: &Clip, info: &VideoInfo) -> Self {
        Self {
            parent_clip: video.display_resource_name().to_string(),
            start_ms: clip.start_ms,
            end_ms: clip.end_ms,
            resolution: info.resolution(),
            fps: info.fps_label(),
            title: video.title.clone().unwrap_or_default(),
            description: String::new(),
        }
    }

    /// `{parent}-{start}-{end}.mp4`, the name reviewers see for the clip.
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-{}.mp4",
            self.parent_clip,
            format_hms(self.start_ms),
            format_hms(self.end_ms)
        )
    }
}

/// Render the `<record>` document.
pub fn render_sidecar(meta: &SidecarMetadata) -> String {
    let fields = [
        ("TE_ParentClip", meta.parent_clip.clone()),
        ("Filename", meta.file_name()),
        ("Duration", format_hms(meta.end_ms - meta.start_ms)),
        ("Resolution", meta.resolution.clone()),
        ("FPS", meta.fps.clone()),
        ("Primary_Language", NOT_AVAILABLE.to_string()),
        ("CountryOrigin", NOT_AVAILABLE.to_string()),
        ("CD_Category", CATEGORY.to_string()),
        ("Production_TextRef", NOT_AVAILABLE.to_string()),
        ("Title", meta.title.clone()),
        ("Description", meta.description.clone()),
    ];

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<record>\n");
    for (tag, value) in fields {
        xml.push_str(&format!("  <{tag}>{}</{tag}>\n", escape_xml(&value)));
    }
    xml.push_str("</record>\n");
    xml
}

/// Render and write the sidecar for `clip` into `dir`.
pub async fn write_sidecar(dir: &Path, clip: &Clip, meta: &SidecarMetadata) -> MediaResult<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}.xml", clip_stem(&clip.video_id, clip.start_ms, clip.end_ms)));
    tokio::fs::write(&path, render_sidecar(meta)).await?;
    Ok(path)
}

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
