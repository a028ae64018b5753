//! Frame timestamp generation for each scan mode.

/// Quick-check sample positions as fractions of the duration.
///
/// The last ratio backs off from 1.0 so the decoder is not asked for a
/// frame at the exact end of the stream.
pub const QUICK_CHECK_RATIOS: [f64; 3] = [0.0, 0.5, 0.99];

/// Add a near-end sample when the last regular one is further than this from the end.
pub const NEAR_END_GAP_SECS: f64 = 1.0;

/// How far before the end the near-end sample sits.
pub const NEAR_END_BACKOFF_SECS: f64 = 0.1;

/// Spacing of the binary-search seed timestamps.
pub const BINARY_SEED_STEP_SECS: f64 = 1.0;

/// Start, middle and (almost) end. Always three entries, possibly equal.
pub fn quick_check(duration: f64) -> Vec<f64> {
    let duration = duration.max(0.0);
    QUICK_CHECK_RATIOS.iter().map(|r| r * duration).collect()
}

/// `0, I, 2I, ...` strictly below the duration, at least `[0]`, plus a
/// near-end sample when the tail gap exceeds [`NEAR_END_GAP_SECS`].
pub fn interval(duration: f64, interval: f64) -> Vec<f64> {
    let duration = duration.max(0.0);
    if interval.is_nan() || interval <= 0.0 {
        return vec![0.0];
    }

    let mut timestamps = vec![0.0];
    let mut i = 1u64;
    loop {
        // Multiply rather than accumulate to avoid drift
        let t = i as f64 * interval;
        if t >= duration {
            break;
        }
        timestamps.push(t);
        i += 1;
    }

    let last = timestamps.last().copied().unwrap_or(0.0);
    if duration - last > NEAR_END_GAP_SECS {
        timestamps.push(duration - NEAR_END_BACKOFF_SECS);
    }
    timestamps
}

/// 1 s steps over `[mid - window, mid + window]`, kept within `[0, duration]`.
pub fn binary_seeds(duration: f64, window: f64) -> Vec<f64> {
    let duration = duration.max(0.0);
    let window = window.max(0.0);
    let middle = duration / 2.0;
    let start = middle - window;
    let end = middle + window;

    let mut seeds = Vec::new();
    let mut k = 0u64;
    loop {
        let t = start + k as f64 * BINARY_SEED_STEP_SECS;
        if t > end + 1e-9 {
            break;
        }
        if (0.0..=duration).contains(&t) {
            seeds.push(t);
        }
        k += 1;
    }
    seeds
}

/// Dedup key for binary search: timestamp rounded to the nearest 0.5 s.
pub fn dedup_key(timestamp_secs: f64) -> i64 {
    (timestamp_secs * 2.0).round() as i64
}
