//! Video assets and frame extraction.
//!
//! The scan engine only needs a duration and random access to decoded
//! frames. [`FfmpegVideo`] provides both by shelling out to `ffprobe` and
//! `ffmpeg`; tests and embedders can supply their own [`VideoAsset`].

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use image::RgbImage;
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::preprocess::decode_image;
use crate::probe::{probe_video, VideoInfo};

/// A seekable video.
pub trait VideoAsset {
    /// Length in seconds.
    fn duration_secs(&self) -> f64;

    /// Decoded, oriented RGB frame at `timestamp_secs`.
    ///
    /// `Ok(None)` means no frame could be produced at that time (for
    /// example past the last keyframe); the scan skips the timestamp.
    fn frame_at(&self, timestamp_secs: f64) -> MediaResult<Option<RgbImage>>;
}

/// Local video file read through FFmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegVideo {
    path: PathBuf,
    info: VideoInfo,
}

impl FfmpegVideo {
    /// Probe `path` and check that FFmpeg is available.
    pub fn open(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref().to_path_buf();
        let info = probe_video(&path)?;
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        debug!(
            path = %path.display(),
            duration = info.duration,
            resolution = format!("{}x{}", info.width, info.height),
            "Opened video"
        );
        Ok(Self { path, info })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }
}

impl VideoAsset for FfmpegVideo {
    fn duration_secs(&self) -> f64 {
        self.info.duration
    }

    fn frame_at(&self, timestamp_secs: f64) -> MediaResult<Option<RgbImage>> {
        let output = Command::new("ffmpeg")
            .args(frame_args(&self.path, timestamp_secs))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::asset_unavailable(format!(
                "ffmpeg could not extract frame at {:.3}s: {}",
                timestamp_secs,
                stderr.trim()
            )));
        }

        if output.stdout.is_empty() {
            return Ok(None);
        }

        decode_image(&output.stdout).map(Some)
    }
}

/// FFmpeg arguments for one PNG frame on stdout.
fn frame_args(path: &Path, timestamp_secs: f64) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-ss".to_string(),
        format!("{:.3}", timestamp_secs.max(0.0)),
        "-i".to_string(),
        path.to_string_lossy().to_string(),
        "-frames:v".to_string(),
        "1".to_string(),
        "-f".to_string(),
        "image2pipe".to_string(),
        "-vcodec".to_string(),
        "png".to_string(),
        "-".to_string(),
    ]
}
