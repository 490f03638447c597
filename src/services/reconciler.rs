// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Time-series reconciliation: aligning an externally recorded sample
//! stream onto an activity timeline whose clock it may not share.
//!
//! The overlap between the sample window and the activity window picks the
//! strategy; the output is always a dense per-second stream of exactly the
//! activity's duration, forward-filled across gaps.

use crate::models::TimedSample;
use chrono::{DateTime, Utc};

/// Overlap at or above this percentage: clocks agree, place literally.
const DIRECT_OVERLAP_PCT: f64 = 90.0;
/// Overlap at or above this percentage: same span, stretched clock.
const INTERPOLATE_OVERLAP_PCT: f64 = 50.0;

/// How the sample stream was aligned onto the activity timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Timestamps trusted as-is
    Direct,
    /// Sample span proportionally stretched over the activity
    Interpolate,
    /// Whole span shifted to the activity start, then re-evaluated
    Reindex,
}

/// A dense per-second stream aligned to the activity timeline.
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// Exactly `duration_seconds` values, one per second from the start
    pub values: Vec<u32>,
    pub strategy: Strategy,
}

/// Align `samples` onto the window starting at `target_start` and lasting
/// `duration_seconds`.
///
/// Samples must be chronologically ordered. An empty stream yields an
/// all-zero output.
pub fn reconcile(
    target_start: DateTime<Utc>,
    duration_seconds: u32,
    samples: &[TimedSample],
) -> Reconciled {
    let mut values = vec![0u32; duration_seconds as usize];

    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return Reconciled {
            values,
            strategy: Strategy::Direct,
        };
    };

    let overlap = overlap_percent(
        target_start,
        duration_seconds,
        first.timestamp,
        last.timestamp,
    );

    let strategy = if overlap >= DIRECT_OVERLAP_PCT {
        place_direct(&mut values, target_start, samples);
        Strategy::Direct
    } else if overlap >= INTERPOLATE_OVERLAP_PCT {
        place_interpolated(&mut values, duration_seconds, samples);
        Strategy::Interpolate
    } else {
        reindex(&mut values, target_start, duration_seconds, samples);
        Strategy::Reindex
    };

    forward_fill(&mut values);

    Reconciled { values, strategy }
}

/// Percentage of the activity window covered by the sample window.
fn overlap_percent(
    target_start: DateTime<Utc>,
    duration_seconds: u32,
    span_start: DateTime<Utc>,
    span_end: DateTime<Utc>,
) -> f64 {
    if duration_seconds == 0 {
        return 0.0;
    }

    let target_end = target_start + chrono::Duration::seconds(duration_seconds as i64);
    let overlap_start = target_start.max(span_start);
    let overlap_end = target_end.min(span_end);

    if overlap_end <= overlap_start {
        return 0.0;
    }

    let overlap_seconds = (overlap_end - overlap_start).num_seconds() as f64;
    overlap_seconds / duration_seconds as f64 * 100.0
}

/// Place each sample at its literal second offset from the activity start.
fn place_direct(values: &mut [u32], target_start: DateTime<Utc>, samples: &[TimedSample]) {
    for sample in samples {
        let offset = (sample.timestamp - target_start).num_seconds();
        if offset >= 0 && (offset as usize) < values.len() {
            values[offset as usize] = sample.value;
        }
    }
}

/// Stretch the sample span proportionally over the full activity duration.
fn place_interpolated(values: &mut [u32], duration_seconds: u32, samples: &[TimedSample]) {
    let span_start = samples[0].timestamp;
    let span_seconds = (samples[samples.len() - 1].timestamp - span_start).num_seconds();

    for sample in samples {
        let relative = if span_seconds > 0 {
            (sample.timestamp - span_start).num_seconds() as f64 / span_seconds as f64
        } else {
            0.0
        };
        let offset = ((relative * duration_seconds as f64) as usize)
            .min(values.len().saturating_sub(1));
        values[offset] = sample.value;
    }
}

/// Shift the whole sample span so its first sample lands on the activity
/// start, preserving internal gaps, then re-evaluate direct vs interpolate.
fn reindex(
    values: &mut [u32],
    target_start: DateTime<Utc>,
    duration_seconds: u32,
    samples: &[TimedSample],
) {
    let shift = samples[0].timestamp - target_start;
    let shifted: Vec<TimedSample> = samples
        .iter()
        .map(|s| TimedSample {
            timestamp: s.timestamp - shift,
            value: s.value,
        })
        .collect();

    let overlap = overlap_percent(
        target_start,
        duration_seconds,
        shifted[0].timestamp,
        shifted[shifted.len() - 1].timestamp,
    );

    if overlap >= DIRECT_OVERLAP_PCT {
        place_direct(values, target_start, &shifted);
    } else {
        place_interpolated(values, duration_seconds, &shifted);
    }
}

/// Carry the last seen value across gaps. Seconds before the first placed
/// sample stay zero.
fn forward_fill(values: &mut [u32]) {
    let mut last = 0u32;
    for value in values.iter_mut() {
        if *value != 0 {
            last = *value;
        } else {
            *value = last;
        }
    }
}
