//! Media inspection: extension-based kind classification and ffprobe-backed
//! stream metadata.

use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::stream::MediaKind;

/// Extensions treated as playable audio/video containers.
pub const MEDIA_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "mp3", "flac", "m4a"];

/// Extensions treated as still images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Audio-only container extensions; used when ffprobe is unavailable.
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a"];

/// Correct an extension-based classification with probed stream data: a
/// container with no video stream is audio no matter what its extension
/// says, keeping it eligible for stream-copy and the ADTS content type.
pub fn refine_kind(kind: MediaKind, info: &MediaInfo) -> MediaKind {
    match kind {
        MediaKind::Video if !info.has_video => MediaKind::Audio,
        other => other,
    }
}

/// Classify a path by extension. `None` means the file is not castable.
pub fn classify_path(path: &Path) -> Option<MediaKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Image)
    } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Audio)
    } else if MEDIA_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// Metadata extracted from a media file.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MediaInfo {
    pub duration_secs: Option<f64>,
    pub audio_codec: Option<String>,
    pub video_codec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub has_video: bool,
}

#[derive(Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Run ffprobe against `source` and parse its JSON report.
pub async fn probe_media(ffprobe: &Path, source: &str) -> Result<MediaInfo> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(source)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| Error::Tool {
            tool: "ffprobe".to_string(),
            message: format!("failed to run: {e}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Probe(format!(
            "ffprobe failed for {source}: {}",
            stderr.trim()
        )));
    }

    let report: FfprobeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|e| Error::Probe(format!("unparseable ffprobe output: {e}")))?;

    let mut info = MediaInfo {
        duration_secs: report
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.parse::<f64>().ok()),
        ..MediaInfo::default()
    };

    for stream in &report.streams {
        match stream.codec_type.as_deref() {
            Some("audio") => {
                if info.audio_codec.is_none() {
                    info.audio_codec = stream.codec_name.clone();
                }
            }
            Some("video") => {
                // ffprobe reports album art as a video stream too, but only
                // real video carries dimensions on the first stream we keep.
                if info.video_codec.is_none() {
                    info.video_codec = stream.codec_name.clone();
                    info.width = stream.width;
                    info.height = stream.height;
                    info.has_video = true;
                }
            }
            _ => {}
        }
    }

    Ok(info)
}
