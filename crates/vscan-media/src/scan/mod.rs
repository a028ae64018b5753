//! Video scan engine.
//!
//! Picks timestamps according to a [`ScanMode`], runs the detect-frame
//! primitive on each one in order, and aggregates the frame results. The
//! frame loop is sequential: binary search depends on earlier results and
//! thorough mode's phases are ordered.
//!
//! # Usage
//! ```rust,ignore
//! use vscan_media::scan::{ScanConfig, ScanEngine};
//!
//! let engine = ScanEngine::new(&detector, ScanConfig::default().with_mode(ScanMode::Thorough));
//! let token = engine.cancellation_token();
//! let result = engine.run(&video)?;
//! ```

pub mod timestamps;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use tracing::{debug, info, warn};
use vscan_models::{FrameResult, ScanMode, VideoResult};

use crate::asset::VideoAsset;
use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::presence::{HumanPresence, SkinToneCheck};
use crate::progress::{ProgressCallback, ScanPhase, ScanProgress};

/// Runs full detection on one decoded frame.
pub trait FrameAnalyzer {
    fn analyze_frame(
        &self,
        frame: &RgbImage,
        timestamp_secs: f64,
        confidence: f32,
        iou: f32,
    ) -> MediaResult<FrameResult>;
}

/// Parameters of one analyze-video call.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub mode: ScanMode,
    /// Spacing of sampled / short-circuit / thorough timestamps
    pub sample_interval_secs: f64,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// Binary search half-window and expansion step
    pub binary_window_secs: f64,
    /// Binary search round limit
    pub binary_max_depth: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mode: ScanMode::Sampled,
            sample_interval_secs: 5.0,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            binary_window_secs: 5.0,
            binary_max_depth: 3,
        }
    }
}

impl ScanConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            mode: std::env::var("VSCAN_SCAN_MODE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.mode),
            sample_interval_secs: std::env::var("VSCAN_SAMPLE_INTERVAL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.sample_interval_secs),
            confidence_threshold: std::env::var("VSCAN_CONFIDENCE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.confidence_threshold),
            iou_threshold: std::env::var("VSCAN_IOU")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.iou_threshold),
            binary_window_secs: std::env::var("VSCAN_BINARY_WINDOW")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.binary_window_secs),
            binary_max_depth: std::env::var("VSCAN_BINARY_DEPTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.binary_max_depth),
        }
    }

    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_sample_interval(mut self, secs: f64) -> Self {
        self.sample_interval_secs = secs;
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence_threshold = confidence;
        self
    }

    pub fn validate(&self) -> MediaResult<()> {
        if !(self.sample_interval_secs.is_finite() && self.sample_interval_secs > 0.0) {
            return Err(MediaError::invalid_config(format!(
                "sample interval must be positive, got {}",
                self.sample_interval_secs
            )));
        }
        if !(self.binary_window_secs.is_finite() && self.binary_window_secs > 0.0) {
            return Err(MediaError::invalid_config(format!(
                "binary search window must be positive, got {}",
                self.binary_window_secs
            )));
        }
        if self.binary_max_depth == 0 {
            return Err(MediaError::invalid_config("binary search depth must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) || !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(MediaError::invalid_config("thresholds must be within [0, 1]"));
        }
        Ok(())
    }
}

/// Cooperative cancellation flag, polled between frames.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Mutable state of one scan.
#[derive(Default)]
struct ScanSession {
    frames: Vec<FrameResult>,
    human_frames: usize,
}

/// Drives one analyze-video call.
pub struct ScanEngine<'a> {
    analyzer: &'a dyn FrameAnalyzer,
    presence: Box<dyn HumanPresence + 'a>,
    config: ScanConfig,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
}

impl<'a> ScanEngine<'a> {
    pub fn new(analyzer: &'a dyn FrameAnalyzer, config: ScanConfig) -> Self {
        Self {
            analyzer,
            presence: Box::new(SkinToneCheck::default()),
            config,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    /// Replace the thorough-mode pre-filter.
    pub fn with_presence(mut self, presence: impl HumanPresence + 'a) -> Self {
        self.presence = Box::new(presence);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan `asset` and aggregate the analyzed frames.
    ///
    /// Cancellation is not an error: the result covers the frames completed
    /// before it was observed and has `stopped_early` set.
    pub fn run(&self, asset: &dyn VideoAsset) -> MediaResult<VideoResult> {
        self.config.validate()?;

        let duration = asset.duration_secs();
        if !duration.is_finite() || duration < 0.0 {
            return Err(MediaError::asset_unavailable(format!("invalid video duration {}", duration)));
        }

        let mode = self.config.mode;
        let start = Instant::now();
        info!(
            mode = %mode,
            duration,
            sample_interval = self.config.sample_interval_secs,
            "Starting video scan"
        );

        let mut session = ScanSession::default();
        let outcome = match mode {
            ScanMode::QuickCheck => self.scan_timestamps(asset, &timestamps::quick_check(duration), &mut session),
            ScanMode::Sampled | ScanMode::FullShortCircuit => self.scan_timestamps(
                asset,
                &timestamps::interval(duration, self.config.sample_interval_secs),
                &mut session,
            ),
            ScanMode::Thorough => self.scan_thorough(asset, duration, &mut session),
            ScanMode::BinarySearch => self.scan_binary(asset, duration, &mut session),
        };

        let stopped_early = match outcome {
            Ok(()) => false,
            Err(MediaError::Cancelled) => {
                info!(mode = %mode, frames = session.frames.len(), "Scan cancelled");
                true
            }
            Err(e) => return Err(e),
        };

        let result = VideoResult::aggregate(&session.frames, mode, session.human_frames, stopped_early, duration);
        metrics::record_scan(mode.as_str(), result.is_sensitive);

        info!(
            mode = %mode,
            is_sensitive = result.is_sensitive,
            analyzed = result.total_frames_analyzed,
            sensitive = result.sensitive_frame_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Video scan complete"
        );
        Ok(result)
    }

    /// quick_check, sampled and full_short_circuit.
    fn scan_timestamps(&self, asset: &dyn VideoAsset, timestamps: &[f64], session: &mut ScanSession) -> MediaResult<()> {
        let short_circuit = self.config.mode.short_circuits();
        let total = timestamps.len();

        for (i, &t) in timestamps.iter().enumerate() {
            if let Some(frame) = self.detect_at(asset, t)? {
                let hit = frame.is_sensitive;
                session.frames.push(frame);
                if hit && short_circuit {
                    debug!(timestamp = t, "Sensitive frame found, stopping scan");
                    self.report(ScanProgress::within(ScanPhase::Detection, total, total, 0.0, 1.0));
                    return Ok(());
                }
            }
            self.report(ScanProgress::within(ScanPhase::Detection, i + 1, total, 0.0, 1.0));
        }
        Ok(())
    }

    /// Human-presence pass, then full detection on flagged timestamps.
    fn scan_thorough(&self, asset: &dyn VideoAsset, duration: f64, session: &mut ScanSession) -> MediaResult<()> {
        let candidates = timestamps::interval(duration, self.config.sample_interval_secs);
        let total = candidates.len();
        let mut flagged = Vec::new();

        for (i, &t) in candidates.iter().enumerate() {
            self.checkpoint()?;
            if let Some(frame) = self.fetch_frame(asset, t)? {
                if self.presence.contains_human(&frame) {
                    flagged.push(t);
                    session.human_frames += 1;
                }
            }
            self.report(ScanProgress::within(ScanPhase::HumanPrefilter, i + 1, total, 0.0, 0.5));
        }

        if flagged.is_empty() {
            info!(candidates = total, "No human frames found, skipping detection");
            self.report(ScanProgress::within(ScanPhase::Detection, 0, 0, 0.5, 1.0));
            return Ok(());
        }

        debug!(candidates = total, flagged = flagged.len(), "Human pre-filter complete");

        let total = flagged.len();
        for (i, &t) in flagged.iter().enumerate() {
            if let Some(frame) = self.detect_at(asset, t)? {
                session.frames.push(frame);
            }
            self.report(ScanProgress::within(ScanPhase::Detection, i + 1, total, 0.5, 1.0));
        }
        Ok(())
    }

    /// Frontier expansion from the midpoint, growing only around hits.
    fn scan_binary(&self, asset: &dyn VideoAsset, duration: f64, session: &mut ScanSession) -> MediaResult<()> {
        let window = self.config.binary_window_secs;
        let max_depth = self.config.binary_max_depth;
        let mut analyzed: HashSet<i64> = HashSet::new();
        let mut queue = timestamps::binary_seeds(duration, window);
        let mut depth = 0u32;

        while !queue.is_empty() && depth < max_depth {
            depth += 1;
            let mut next = Vec::new();

            for &t in &queue {
                if !analyzed.insert(timestamps::dedup_key(t)) {
                    continue;
                }
                let Some(frame) = self.detect_at(asset, t)? else {
                    continue;
                };
                if frame.is_sensitive {
                    next.extend(
                        [t - window, t + window]
                            .into_iter()
                            .filter(|n| (0.0..=duration).contains(n)),
                    );
                }
                session.frames.push(frame);
            }

            debug!(round = depth, queued = queue.len(), next = next.len(), "Binary search round complete");
            self.report(ScanProgress::within(ScanPhase::Detection, depth as usize, max_depth as usize, 0.0, 1.0));
            queue = next;
        }
        Ok(())
    }

    /// Fetch and fully analyze one frame. Frame-local failures skip it.
    fn detect_at(&self, asset: &dyn VideoAsset, timestamp_secs: f64) -> MediaResult<Option<FrameResult>> {
        self.checkpoint()?;
        let Some(frame) = self.fetch_frame(asset, timestamp_secs)? else {
            return Ok(None);
        };

        match self.analyzer.analyze_frame(
            &frame,
            timestamp_secs,
            self.config.confidence_threshold,
            self.config.iou_threshold,
        ) {
            Ok(result) => {
                metrics::record_frame_analyzed(self.config.mode.as_str());
                Ok(Some(result))
            }
            Err(e) if e.is_frame_local() => {
                warn!(timestamp = timestamp_secs, error = %e, "Frame analysis failed, skipping");
                metrics::record_frame_skipped(self.config.mode.as_str());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn fetch_frame(&self, asset: &dyn VideoAsset, timestamp_secs: f64) -> MediaResult<Option<RgbImage>> {
        match asset.frame_at(timestamp_secs) {
            Ok(Some(frame)) => Ok(Some(frame)),
            Ok(None) => {
                warn!(timestamp = timestamp_secs, "No frame at timestamp, skipping");
                metrics::record_frame_skipped(self.config.mode.as_str());
                Ok(None)
            }
            Err(e) if e.is_frame_local() => {
                warn!(timestamp = timestamp_secs, error = %e, "Frame extraction failed, skipping");
                metrics::record_frame_skipped(self.config.mode.as_str());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn checkpoint(&self) -> MediaResult<()> {
        if self.cancel.is_cancelled() {
            Err(MediaError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn report(&self, progress: ScanProgress) {
        if let Some(callback) = &self.progress {
            callback(progress);
        }
    }
}

/// Run one scan with the default pre-filter and no cancellation.
pub fn analyze_video(analyzer: &dyn FrameAnalyzer, asset: &dyn VideoAsset, config: ScanConfig) -> MediaResult<VideoResult> {
    ScanEngine::new(analyzer, config).run(asset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_config_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.mode, ScanMode::Sampled);
        assert_eq!(config.sample_interval_secs, 5.0);
        assert_eq!(config.binary_window_secs, 5.0);
        assert_eq!(config.binary_max_depth, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scan_config_validation() {
        assert!(ScanConfig::default().with_sample_interval(0.0).validate().is_err());
        assert!(ScanConfig::default().with_confidence(-0.1).validate().is_err());
        let config = ScanConfig {
            binary_max_depth: 0,
            ..ScanConfig::default()
        };
        assert!(matches!(config.validate(), Err(MediaError::InvalidConfig(_))));
    }

    #[test]
    fn test_cancellation_token_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
