// SPDX-License-Identifier: MIT OR Apache-2.0
//! Range retimer.
//!
//! Scales the keys of a time range onto a new range and shifts the
//! animation around it so the timing outside the range is preserved.
//! Growing a range makes room before scaling; shrinking closes the gap
//! after scaling, so neither step ever runs into keys still in flight.

use crate::batch::BatchReport;
use crate::error::{Result, TimelineError};
use crate::host::{AnimationHost, CurveId, UndoChunk};
use crate::key_editor::{scale_keys, set_boundary_key, shift_keys, snap_keys};
use crate::keyframe::{same_time, TangentType, TimeRange};
use crate::settings::{SnapRounding, TimelineSettings};
use std::ops::Bound;

/// Retime behaviour switches
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetimeOptions {
    /// Key both bounds of the source range before scaling
    pub add_boundary_keyframes: bool,
    /// Shift the animation outside the range to keep its timing
    pub offset_contiguous_animation: bool,
    /// Round scaled keys to whole frames
    pub snap_keys: bool,
    /// Tie breaking for snapped keys
    pub snap_rounding: SnapRounding,
    /// Tangents of the boundary keys
    pub boundary_tangent: TangentType,
}

impl Default for RetimeOptions {
    fn default() -> Self {
        Self {
            add_boundary_keyframes: false,
            offset_contiguous_animation: true,
            snap_keys: true,
            snap_rounding: SnapRounding::default(),
            boundary_tangent: TangentType::Linear,
        }
    }
}

impl RetimeOptions {
    /// Default switches with rounding and boundary tangents from `settings`
    pub fn from_settings(settings: &TimelineSettings) -> Self {
        Self {
            snap_rounding: settings.snap_rounding,
            boundary_tangent: settings.boundary_tangent,
            ..Self::default()
        }
    }
}

/// How far each bound of a range moves in a retime
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetimeOffsets {
    /// `new_start - start`
    pub start: f64,
    /// `new_end - end`
    pub end: f64,
}

impl RetimeOffsets {
    /// Offsets taking `from` to `to`
    pub fn between(from: &TimeRange, to: &TimeRange) -> Self {
        Self {
            start: to.start - from.start,
            end: to.end - from.end,
        }
    }
}

/// Retime every curve from `from` to `to`.
///
/// Keyless curves are skipped. A curve the host refuses to edit does not
/// stop the others; every failure is reported at the end.
pub fn retime_curves<H: AnimationHost + ?Sized>(
    host: &mut H,
    curves: &[CurveId],
    from: TimeRange,
    to: TimeRange,
    options: &RetimeOptions,
) -> Result<()> {
    let from = from.validated()?;
    let to = to.validated()?;
    if from.is_empty() {
        return Err(TimelineError::invalid_range(from.start, from.end, "source range is empty"));
    }
    if to.is_empty() {
        return Err(TimelineError::invalid_range(to.start, to.end, "target range is empty"));
    }
    if same_time(from.start, to.start) && same_time(from.end, to.end) {
        tracing::debug!("Retime of [{}, {}] onto itself, nothing to do", from.start, from.end);
        return Ok(());
    }

    let mut host = UndoChunk::open(host, "Retime curves");
    tracing::info!(
        "Retiming {} animation curves from [{}, {}] to [{}, {}]",
        curves.len(),
        from.start,
        from.end,
        to.start,
        to.end
    );
    let mut report = BatchReport::new("Retime curves");
    for curve in curves {
        report.run(curve.as_str(), || retime_curve(&mut *host, curve, from, to, options));
    }
    report.finish()
}

/// Retime a single curve from `from` to `to`
pub fn retime_curve<H: AnimationHost + ?Sized>(
    host: &mut H,
    curve: &CurveId,
    from: TimeRange,
    to: TimeRange,
    options: &RetimeOptions,
) -> Result<()> {
    if host.key_count(curve)? == 0 {
        tracing::debug!("Skipping keyless curve {curve}");
        return Ok(());
    }
    let offsets = RetimeOffsets::between(&from, &to);
    let offset = options.offset_contiguous_animation;
    let after = (Bound::Excluded(from.end), Bound::Unbounded);
    let before = (Bound::Unbounded, Bound::Excluded(from.start));

    if options.add_boundary_keyframes {
        set_boundary_key(host, curve, from.start, options.boundary_tangent)?;
        set_boundary_key(host, curve, from.end, options.boundary_tangent)?;
    }

    if offset && offsets.end > 0.0 {
        shift_keys(host, curve, after, offsets.end)?;
    }
    if offset && offsets.start < 0.0 {
        shift_keys(host, curve, before, offsets.start)?;
    }

    scale_keys(host, curve, from, to)?;
    if options.snap_keys {
        snap_keys(host, curve, to.start..=to.end, options.snap_rounding)?;
    }

    if offset && offsets.end < 0.0 {
        shift_keys(host, curve, after, offsets.end)?;
    }
    if offset && offsets.start > 0.0 {
        shift_keys(host, curve, before, offsets.start)?;
    }
    Ok(())
}
