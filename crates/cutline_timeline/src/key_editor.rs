// SPDX-License-Identifier: MIT OR Apache-2.0
//! Key editor.
//!
//! Single key edits that keep tangents intact at curve boundaries, bulk
//! range clean-ups, and the window primitives (shift, scale, snap, clear)
//! the retimer and the hold/trim editor are composed from.
//!
//! Windows are any `RangeBounds<f64>`: `(Bound::Excluded(end), Bound::Unbounded)`
//! selects the keys strictly after `end`, `start..=end` a closed range.
//! Bounds compare with [`TIME_EPSILON`] tolerance.

use crate::batch::BatchReport;
use crate::error::{Result, TimelineError};
use crate::host::{AnimationHost, AttributeUnlock, CurveId, UndoChunk};
use crate::keyframe::{same_time, KeyIndex, TangentSide, TangentType, TimeRange, TIME_EPSILON};
use crate::settings::SnapRounding;
use std::ops::{Bound, RangeBounds};

/// Whether `time` lies inside `window`
pub fn in_window(window: &impl RangeBounds<f64>, time: f64) -> bool {
    let after_start = match window.start_bound() {
        Bound::Included(start) => time > start - TIME_EPSILON,
        Bound::Excluded(start) => time > start + TIME_EPSILON,
        Bound::Unbounded => true,
    };
    let before_end = match window.end_bound() {
        Bound::Included(end) => time < end + TIME_EPSILON,
        Bound::Excluded(end) => time < end - TIME_EPSILON,
        Bound::Unbounded => true,
    };
    after_start && before_end
}

/// Fail with `ReadOnly` when the curve comes from a reference
pub fn ensure_editable<H: AnimationHost + ?Sized>(host: &H, curve: &CurveId) -> Result<()> {
    if host.is_referenced(curve.as_str())? {
        return Err(TimelineError::ReadOnly(format!("curve {curve} is referenced")));
    }
    Ok(())
}

/// Insert a key at `time`, keeping boundary tangents stable.
///
/// An interior time is a plain host insert. Appending copies the previous
/// last key's tangent types onto the new key and then sets them again on the
/// previous last key, since the host recomputes that key on append.
/// Prepending does the same on index 0 then index 1. A key already at `time`
/// is returned untouched. Keyless curves are left alone and give `None`.
pub fn insert_key<H: AnimationHost + ?Sized>(
    host: &mut H,
    curve: &CurveId,
    time: f64,
    value: Option<f64>,
) -> Result<Option<KeyIndex>> {
    ensure_editable(host, curve)?;
    let keys = host.keys(curve)?;
    let (Some(first), Some(last)) = (keys.first().cloned(), keys.last().cloned()) else {
        return Ok(None);
    };

    if let Some(index) = keys.iter().position(|k| same_time(k.time, time)) {
        if let Some(value) = value {
            host.set_key_value(curve, index, value)?;
        }
        return Ok(Some(index));
    }

    if time > last.time {
        let index = host.insert_key(curve, time, value)?;
        host.set_tangent_types(curve, index, Some(last.in_tangent), Some(last.out_tangent))?;
        let previous = index.saturating_sub(1);
        host.set_tangent_types(curve, previous, Some(last.in_tangent), Some(last.out_tangent))?;
        return Ok(Some(index));
    }

    if time < first.time {
        let index = host.insert_key(curve, time, value)?;
        host.set_tangent_types(curve, 0, Some(first.in_tangent), Some(first.out_tangent))?;
        host.set_tangent_types(curve, 1, Some(first.in_tangent), Some(first.out_tangent))?;
        return Ok(Some(index));
    }

    Ok(Some(host.insert_key(curve, time, value)?))
}

/// Insert a key at `time` and force both of its tangents to `tangent`
pub fn set_boundary_key<H: AnimationHost + ?Sized>(
    host: &mut H,
    curve: &CurveId,
    time: f64,
    tangent: TangentType,
) -> Result<Option<KeyIndex>> {
    let Some(index) = insert_key(host, curve, time, None)? else {
        return Ok(None);
    };
    host.set_tangent_types(curve, index, Some(tangent), Some(tangent))?;
    Ok(Some(index))
}

/// Index of the key at `time`, if any
pub fn find_key<H: AnimationHost + ?Sized>(
    host: &H,
    curve: &CurveId,
    time: f64,
) -> Result<Option<KeyIndex>> {
    Ok(host.keys(curve)?.iter().position(|k| same_time(k.time, time)))
}

/// Indices of the keys inside `window`, in time order
pub fn keys_in_window<H: AnimationHost + ?Sized>(
    host: &H,
    curve: &CurveId,
    window: impl RangeBounds<f64>,
) -> Result<Vec<KeyIndex>> {
    Ok(host
        .keys(curve)?
        .iter()
        .enumerate()
        .filter(|(_, key)| in_window(&window, key.time))
        .map(|(index, _)| index)
        .collect())
}

/// Move every key inside `window` by `offset`. Returns the number of keys moved.
pub fn shift_keys<H: AnimationHost + ?Sized>(
    host: &mut H,
    curve: &CurveId,
    window: impl RangeBounds<f64>,
    offset: f64,
) -> Result<usize> {
    if offset == 0.0 {
        return Ok(0);
    }
    let keys = host.keys(curve)?;
    let moves: Vec<(KeyIndex, f64)> = keys
        .iter()
        .enumerate()
        .filter(|(_, key)| in_window(&window, key.time))
        .map(|(index, key)| (index, key.time + offset))
        .collect();
    host.move_keys(curve, &moves)?;
    Ok(moves.len())
}

/// Remap the keys inside `from` linearly onto `to`. Returns the number of keys moved.
pub fn scale_keys<H: AnimationHost + ?Sized>(
    host: &mut H,
    curve: &CurveId,
    from: TimeRange,
    to: TimeRange,
) -> Result<usize> {
    let keys = host.keys(curve)?;
    let moves: Vec<(KeyIndex, f64)> = keys
        .iter()
        .enumerate()
        .filter(|(_, key)| from.contains(key.time))
        .map(|(index, key)| (index, from.remap(key.time, &to)))
        .filter(|(index, time)| !same_time(keys[*index].time, *time))
        .collect();
    host.move_keys(curve, &moves)?;
    Ok(moves.len())
}

/// Round the keys inside `window` to whole frames.
///
/// Keys outside the window never move. A snapped key landing on a frame
/// that is already taken, by an unmoved key or by an earlier snapped key,
/// is removed. Returns the number of keys moved or removed.
pub fn snap_keys<H: AnimationHost + ?Sized>(
    host: &mut H,
    curve: &CurveId,
    window: impl RangeBounds<f64>,
    rounding: SnapRounding,
) -> Result<usize> {
    let keys = host.keys(curve)?;
    let mut taken: Vec<f64> = keys
        .iter()
        .filter(|key| !in_window(&window, key.time))
        .map(|key| key.time)
        .collect();

    let mut removed = Vec::new();
    let mut moves = Vec::new();
    for (index, key) in keys.iter().enumerate() {
        if !in_window(&window, key.time) {
            continue;
        }
        let target = rounding.round(key.time);
        if taken.iter().any(|t| same_time(*t, target)) {
            removed.push(index);
            continue;
        }
        taken.push(target);
        if !same_time(key.time, target) {
            moves.push((index, target));
        }
    }

    for &index in removed.iter().rev() {
        host.remove_key(curve, index)?;
    }
    let moves: Vec<(KeyIndex, f64)> = moves
        .into_iter()
        .map(|(index, time)| (index - removed.iter().filter(|&&r| r < index).count(), time))
        .collect();
    host.move_keys(curve, &moves)?;
    if !removed.is_empty() {
        tracing::debug!("Snapping {curve} merged {} colliding keys", removed.len());
    }
    Ok(moves.len() + removed.len())
}

/// Remove every key inside `window`. Returns the number of keys removed.
pub fn clear_keys<H: AnimationHost + ?Sized>(
    host: &mut H,
    curve: &CurveId,
    window: impl RangeBounds<f64>,
) -> Result<usize> {
    let indices = keys_in_window(host, curve, window)?;
    for &index in indices.iter().rev() {
        host.remove_key(curve, index)?;
    }
    Ok(indices.len())
}

/// Remove the keys outside `range` except those at `preserve_times`.
///
/// The keys sitting on the range bounds get their tangent and weight locks
/// released and their outward weight set to 1 so the kept shape does not
/// change once the neighbours are gone.
pub fn remove_keys_outside<H: AnimationHost + ?Sized>(
    host: &mut H,
    curve: &CurveId,
    range: TimeRange,
    preserve_times: &[f64],
) -> Result<usize> {
    ensure_editable(host, curve)?;
    let mut removed = 0;
    for index in (0..host.key_count(curve)?).rev() {
        let time = host.key(curve, index)?.time;
        if range.contains(time) {
            let side = if same_time(time, range.start) {
                Some(TangentSide::In)
            } else if same_time(time, range.end) {
                Some(TangentSide::Out)
            } else {
                None
            };
            if let Some(side) = side {
                host.set_tangents_locked(curve, index, false)?;
                host.set_weights_locked(curve, index, false)?;
                host.set_tangent_weight(curve, index, side, 1.0)?;
            }
            continue;
        }
        if preserve_times.iter().any(|t| same_time(*t, time)) {
            continue;
        }
        host.remove_key(curve, index)?;
        removed += 1;
    }
    Ok(removed)
}

/// Remove the keys before `time` on every curve, except those at `preserve_times`
pub fn remove_keys_before<H: AnimationHost + ?Sized>(
    host: &mut H,
    curves: &[CurveId],
    time: f64,
    preserve_times: &[f64],
) -> Result<()> {
    let mut host = UndoChunk::open(host, "Remove keys before");
    let mut report = BatchReport::new("Remove keys before");
    for curve in curves {
        report.run(curve.as_str(), || {
            ensure_editable(&*host, curve)?;
            for index in (0..host.key_count(curve)?).rev() {
                let key_time = host.key(curve, index)?.time;
                if key_time >= time - TIME_EPSILON
                    || preserve_times.iter().any(|t| same_time(*t, key_time))
                {
                    continue;
                }
                host.remove_key(curve, index)?;
            }
            Ok(())
        });
    }
    report.finish()
}

/// Remove every key sitting between two whole frames. Returns the number of keys removed.
pub fn delete_non_integer_keys<H: AnimationHost + ?Sized>(
    host: &mut H,
    curves: &[CurveId],
) -> Result<usize> {
    let mut host = UndoChunk::open(host, "Delete non integer keys");
    let mut report = BatchReport::new("Delete non integer keys");
    let mut removed = 0;
    for curve in curves {
        removed += report
            .run(curve.as_str(), || {
                let keys = host.keys(curve)?;
                let mut count = 0;
                for (index, key) in keys.iter().enumerate().rev() {
                    if !same_time(key.time, key.time.round()) {
                        host.remove_key(curve, index)?;
                        count += 1;
                    }
                }
                Ok(count)
            })
            .unwrap_or(0);
    }
    report.finish()?;
    Ok(removed)
}

/// Keep only the keys inside `range` on every connected, non-referenced curve.
///
/// Hard keys are set at the range end and then at the range start so a
/// stepped tangent does not interpolate through the new end key. The driven
/// attribute is unlocked for the edit and locked back afterwards.
pub fn crop_curves<H: AnimationHost + ?Sized>(
    host: &mut H,
    curves: &[CurveId],
    range: TimeRange,
) -> Result<()> {
    let range = range.validated()?;
    let mut host = UndoChunk::open(host, "Crop curves");
    let mut report = BatchReport::new("Crop curves");
    for curve in curves {
        report.run(curve.as_str(), || {
            if host.is_referenced(curve.as_str())? {
                tracing::debug!("Skipping referenced curve {curve}");
                return Ok(());
            }
            let Some(plug) = host.curve_output(curve)? else {
                tracing::debug!("Skipping unconnected curve {curve}");
                return Ok(());
            };
            let mut host = AttributeUnlock::acquire(&mut *host, plug.as_str())?;
            for time in [range.end, range.start] {
                if let Err(e) = insert_key(&mut *host, curve, time, None) {
                    tracing::error!("Failed to add key at {time} on {curve} ({plug}): {e}");
                }
            }
            remove_keys_outside(&mut *host, curve, range, &[])?;
            Ok(())
        });
    }
    report.finish()
}

/// Move every key of every curve by `offset`, unlocking driven attributes
/// for the edit
pub fn offset_curves<H: AnimationHost + ?Sized>(
    host: &mut H,
    curves: &[CurveId],
    offset: f64,
) -> Result<()> {
    let mut host = UndoChunk::open(host, "Offset curves");
    tracing::info!("Offsetting keys of {} animation curves by {offset}", curves.len());
    let mut report = BatchReport::new("Offset curves");
    for curve in curves {
        report.run(curve.as_str(), || match host.curve_output(curve)? {
            Some(plug) => {
                let mut host = AttributeUnlock::acquire(&mut *host, plug)?;
                shift_keys(&mut *host, curve, .., offset)
            }
            None => shift_keys(&mut *host, curve, .., offset),
        });
    }
    report.finish()
}
