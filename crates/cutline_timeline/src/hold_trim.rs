// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hold and trim.
//!
//! Both edits key hard linear boundaries first and then splice the
//! animation with the key editor window primitives.

use crate::batch::BatchReport;
use crate::error::{Result, TimelineError};
use crate::host::{AnimationHost, CurveId, UndoChunk};
use crate::key_editor::{clear_keys, find_key, insert_key, set_boundary_key, shift_keys};
use crate::keyframe::TangentType;
use std::ops::Bound;

/// Cut the animation strictly between `start` and `end` and close the gap.
///
/// Linear keys are set at both bounds, the keys in between are removed and
/// everything from `end` on moves back by `end - start - 1`, so the key at
/// `end` lands one frame after `start`.
pub fn trim<H: AnimationHost + ?Sized>(
    host: &mut H,
    curves: &[CurveId],
    start: f64,
    end: f64,
) -> Result<()> {
    if start >= end {
        return Err(TimelineError::invalid_range(start, end, "trim needs start before end"));
    }
    let mut host = UndoChunk::open(host, "Trim animation");
    tracing::info!("Trimming [{start}, {end}] out of {} animation curves", curves.len());
    let offset = -(end - start - 1.0);
    let mut report = BatchReport::new("Trim animation");
    for curve in curves {
        report.run(curve.as_str(), || {
            if set_boundary_key(&mut *host, curve, start, TangentType::Linear)?.is_none() {
                return Ok(());
            }
            set_boundary_key(&mut *host, curve, end, TangentType::Linear)?;
            clear_keys(&mut *host, curve, (Bound::Excluded(start), Bound::Excluded(end)))?;
            shift_keys(&mut *host, curve, (Bound::Included(end), Bound::Unbounded), offset)?;
            Ok(())
        });
    }
    report.finish()
}

/// Freeze the pose at `frame` for `duration` frames.
///
/// With `offset_contiguous` the animation after `frame` moves later by
/// `duration`; without it the keys in `(frame, frame + duration]` are
/// removed. Either way the key at `frame` is copied to `frame + duration`
/// and the held segment gets linear tangents on both ends.
pub fn hold<H: AnimationHost + ?Sized>(
    host: &mut H,
    curves: &[CurveId],
    frame: f64,
    duration: f64,
    offset_contiguous: bool,
) -> Result<()> {
    if duration <= 0.0 {
        return Err(TimelineError::invalid_range(
            frame,
            frame + duration,
            "hold duration must be positive",
        ));
    }
    let mut host = UndoChunk::open(host, "Hold animation");
    tracing::info!("Holding frame {frame} for {duration} frames on {} animation curves", curves.len());
    let release = frame + duration;
    let mut report = BatchReport::new("Hold animation");
    for curve in curves {
        report.run(curve.as_str(), || {
            let Some(index) = set_boundary_key(&mut *host, curve, frame, TangentType::Linear)? else {
                return Ok(());
            };
            let held = host.key(curve, index)?;

            if offset_contiguous {
                shift_keys(&mut *host, curve, (Bound::Excluded(frame), Bound::Unbounded), duration)?;
            } else {
                clear_keys(&mut *host, curve, (Bound::Excluded(frame), Bound::Included(release)))?;
            }

            if let Some(pasted) = insert_key(&mut *host, curve, release, Some(held.value))? {
                host.set_tangent_types(
                    curve,
                    pasted,
                    Some(TangentType::Linear),
                    Some(held.out_tangent),
                )?;
            }
            if let Some(index) = find_key(&*host, curve, frame)? {
                host.set_tangent_types(curve, index, None, Some(TangentType::Linear))?;
            }
            Ok(())
        });
    }
    report.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CurveKind;
    use crate::keyframe::Key;
    use crate::memory::InMemoryHost;

    fn curve_with(host: &mut InMemoryHost, name: &str, times: impl IntoIterator<Item = f64>) -> CurveId {
        let keys = times.into_iter().map(|t| Key::new(t, t)).collect();
        host.add_curve(name, CurveKind::Linear, keys, None)
    }

    #[test]
    fn test_trim_closes_gap() {
        let mut host = InMemoryHost::new();
        let curve = curve_with(&mut host, "c", (5..=50).map(f64::from));
        trim(&mut host, &[curve.clone()], 20.0, 30.0).unwrap();

        let expected: Vec<f64> = (5..=41).map(f64::from).collect();
        assert_eq!(host.key_times("c"), expected);
        let keys = host.keys(&curve).unwrap();
        // Former frame 30 now sits on frame 21.
        assert_eq!(keys[16].time, 21.0);
        assert_eq!(keys[16].value, 30.0);
        assert_eq!(keys[16].in_tangent, TangentType::Linear);
        assert_eq!(keys[15].out_tangent, TangentType::Linear);
    }

    #[test]
    fn test_trim_sparse_keys() {
        let mut host = InMemoryHost::new();
        let curve = curve_with(&mut host, "c", [0.0, 10.0, 25.0, 40.0, 60.0]);
        trim(&mut host, &[curve], 20.0, 30.0).unwrap();
        // Boundary keys at 20 and 30, then everything from 30 moved back by 9.
        assert_eq!(host.key_times("c"), vec![0.0, 10.0, 20.0, 21.0, 31.0, 51.0]);
    }

    #[test]
    fn test_trim_rejects_inverted_range() {
        let mut host = InMemoryHost::new();
        let curve = curve_with(&mut host, "c", [0.0, 10.0]);
        assert!(matches!(
            trim(&mut host, &[curve], 30.0, 20.0),
            Err(TimelineError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_hold_with_offset() {
        let mut host = InMemoryHost::new();
        let curve = curve_with(&mut host, "c", [0.0, 10.0, 20.0]);
        hold(&mut host, &[curve.clone()], 10.0, 5.0, true).unwrap();

        assert_eq!(host.key_times("c"), vec![0.0, 10.0, 15.0, 25.0]);
        let keys = host.keys(&curve).unwrap();
        assert_eq!(keys[1].value, keys[2].value);
        assert_eq!(keys[1].out_tangent, TangentType::Linear);
        assert_eq!(keys[2].in_tangent, TangentType::Linear);
        assert_eq!(host.evaluate(&curve, 12.5).unwrap(), 10.0);
    }

    #[test]
    fn test_hold_between_keys() {
        let mut host = InMemoryHost::new();
        let keys = vec![
            Key::new(0.0, 0.0).with_tangents(TangentType::Linear, TangentType::Linear),
            Key::new(20.0, 20.0).with_tangents(TangentType::Linear, TangentType::Linear),
        ];
        let curve = host.add_curve("c", CurveKind::Linear, keys, None);
        hold(&mut host, &[curve.clone()], 5.0, 10.0, true).unwrap();

        assert_eq!(host.key_times("c"), vec![0.0, 5.0, 15.0, 30.0]);
        let values: Vec<f64> = host.keys(&curve).unwrap().iter().map(|k| k.value).collect();
        assert_eq!(values, vec![0.0, 5.0, 5.0, 20.0]);
    }

    #[test]
    fn test_hold_hard_cut() {
        let mut host = InMemoryHost::new();
        let curve = curve_with(&mut host, "c", [0.0, 10.0, 12.0, 20.0, 30.0]);
        hold(&mut host, &[curve], 10.0, 5.0, false).unwrap();
        assert_eq!(host.key_times("c"), vec![0.0, 10.0, 15.0, 20.0, 30.0]);
    }

    #[test]
    fn test_hold_rejects_empty_duration() {
        let mut host = InMemoryHost::new();
        let curve = curve_with(&mut host, "c", [0.0, 10.0]);
        assert!(hold(&mut host, &[curve], 5.0, 0.0, true).is_err());
    }
}
