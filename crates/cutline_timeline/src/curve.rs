// SPDX-License-Identifier: MIT OR Apache-2.0
//! Curve accessor.
//!
//! Host node type strings are resolved into [`CurveKind`] here and nowhere
//! else; everything downstream works with [`CurveHandle`]s.

use crate::batch::BatchReport;
use crate::error::{Result, TimelineError};
use crate::host::{AnimationHost, CurveId, TimeGuard, UndoChunk};
use crate::key_editor::{clear_keys, keys_in_window};
use crate::keyframe::{same_time, TangentType, TimeRange, TIME_EPSILON};
use serde::{Deserialize, Serialize};

/// Type of an animation curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveKind {
    /// Drives an angle
    Angular,
    /// Drives a distance
    Linear,
    /// Drives a time
    Time,
    /// Drives a unitless value
    Unitless,
}

impl CurveKind {
    /// Every curve kind
    pub const ALL: [CurveKind; 4] = [
        CurveKind::Angular,
        CurveKind::Linear,
        CurveKind::Time,
        CurveKind::Unitless,
    ];

    /// Host node type
    pub fn node_type(&self) -> &'static str {
        match self {
            Self::Angular => "animCurveTA",
            Self::Linear => "animCurveTL",
            Self::Time => "animCurveTT",
            Self::Unitless => "animCurveTU",
        }
    }

    /// Resolve a host node type
    pub fn from_node_type(node_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.node_type() == node_type)
    }
}

/// Curve attribute holding the behaviour before the first key
pub const PRE_INFINITY_ATTR: &str = "preInfinity";

/// Curve attribute holding the behaviour after the last key
pub const POST_INFINITY_ATTR: &str = "postInfinity";

/// How a curve extrapolates past its first or last key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Infinity {
    /// Hold the boundary value
    #[default]
    Constant,
    /// Continue the boundary tangent
    Linear,
    /// Repeat the keyed range
    Cycle,
    /// Repeat the keyed range, offset by its value change
    CycleWithOffset,
    /// Repeat the keyed range back and forth
    Oscillate,
}

impl Infinity {
    /// Host enum index
    pub fn index(&self) -> u8 {
        match self {
            Self::Constant => 0,
            Self::Linear => 1,
            Self::Cycle => 3,
            Self::CycleWithOffset => 4,
            Self::Oscillate => 5,
        }
    }

    /// Resolve a host enum index
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Constant),
            1 => Some(Self::Linear),
            3 => Some(Self::Cycle),
            4 => Some(Self::CycleWithOffset),
            5 => Some(Self::Oscillate),
            _ => None,
        }
    }
}

/// A resolved curve
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CurveHandle {
    /// Host node name
    pub id: CurveId,
    /// Curve type
    pub kind: CurveKind,
}

/// Curves considered by a listing
#[derive(Debug, Clone, Default)]
pub enum CurveScope {
    /// Every curve in the scene
    #[default]
    All,
    /// Only these curves
    Candidates(Vec<CurveId>),
}

/// Resolve a curve id, failing when the node is missing or not a curve
pub fn resolve_curve<H: AnimationHost + ?Sized>(host: &H, id: &CurveId) -> Result<CurveHandle> {
    let node_type = host.node_type(id.as_str())?;
    let kind = CurveKind::from_node_type(&node_type).ok_or_else(|| {
        TimelineError::NotFound(format!("{id} is a {node_type}, not an animation curve"))
    })?;
    Ok(CurveHandle {
        id: id.clone(),
        kind,
    })
}

/// List curves of the given kinds (every kind when empty) in `scope`,
/// optionally leaving out referenced curves
pub fn list_curves<H: AnimationHost + ?Sized>(
    host: &H,
    kinds: &[CurveKind],
    scope: &CurveScope,
    exclude_references: bool,
) -> Result<Vec<CurveHandle>> {
    let kinds: &[CurveKind] = if kinds.is_empty() { &CurveKind::ALL } else { kinds };

    let candidates = match scope {
        CurveScope::All => kinds
            .iter()
            .flat_map(|kind| {
                host.list_nodes(kind.node_type())
                    .into_iter()
                    .map(move |name| CurveHandle {
                        id: CurveId(name),
                        kind: *kind,
                    })
            })
            .collect(),
        CurveScope::Candidates(ids) => {
            let mut handles = Vec::with_capacity(ids.len());
            for id in ids {
                let handle = resolve_curve(host, id)?;
                if kinds.contains(&handle.kind) {
                    handles.push(handle);
                }
            }
            handles
        }
    };

    if !exclude_references {
        return Ok(candidates);
    }
    let mut curves = Vec::with_capacity(candidates.len());
    for handle in candidates {
        if !host.is_referenced(handle.id.as_str())? {
            curves.push(handle);
        }
    }
    Ok(curves)
}

/// Ids of every editable curve in the scene
pub fn editable_curve_ids<H: AnimationHost + ?Sized>(host: &H) -> Result<Vec<CurveId>> {
    Ok(list_curves(host, &[], &CurveScope::All, true)?
        .into_iter()
        .map(|h| h.id)
        .collect())
}

/// Whether every key of the curve holds the same value
pub fn is_static<H: AnimationHost + ?Sized>(host: &H, curve: &CurveId) -> Result<bool> {
    let keys = host.keys(curve)?;
    Ok(match keys.first() {
        Some(first) => keys.iter().all(|k| k.value == first.value),
        None => true,
    })
}

/// Curves in `scope` whose keys do not all hold the same value
pub fn list_non_static_curves<H: AnimationHost + ?Sized>(
    host: &H,
    scope: &CurveScope,
) -> Result<Vec<CurveId>> {
    let mut curves = Vec::new();
    for handle in list_curves(host, &[], scope, false)? {
        if !is_static(host, &handle.id)? {
            curves.push(handle.id);
        }
    }
    Ok(curves)
}

/// Curves in `scope` living under a namespace
pub fn list_curves_with_namespace<H: AnimationHost + ?Sized>(
    host: &H,
    scope: &CurveScope,
    exclude_references: bool,
) -> Result<Vec<CurveId>> {
    Ok(list_curves(host, &[], scope, exclude_references)?
        .into_iter()
        .map(|h| h.id)
        .filter(|id| id.as_str().contains(':'))
        .collect())
}

/// Curves driving no attribute
pub fn list_unconnected_curves<H: AnimationHost + ?Sized>(host: &H) -> Result<Vec<CurveId>> {
    let mut curves = Vec::new();
    for handle in list_curves(host, &[], &CurveScope::All, false)? {
        if host.curve_output(&handle.id)?.is_none() {
            curves.push(handle.id);
        }
    }
    Ok(curves)
}

/// Delete every curve driving no attribute. Returns the deleted curves.
pub fn delete_unconnected_curves<H: AnimationHost + ?Sized>(host: &mut H) -> Result<Vec<CurveId>> {
    let mut host = UndoChunk::open(host, "Delete unconnected curves");
    let curves = list_unconnected_curves(&*host)?;
    let mut report = BatchReport::new("Delete unconnected curves");
    let mut deleted = Vec::with_capacity(curves.len());
    for curve in curves {
        if report
            .run(curve.as_str(), || host.delete_node(curve.as_str()))
            .is_some()
        {
            deleted.push(curve);
        }
    }
    tracing::info!("Deleted {} unconnected animation curves", deleted.len());
    report.finish()?;
    Ok(deleted)
}

fn curve_infinity<H: AnimationHost + ?Sized>(host: &H, curve: &CurveId, attr: &str) -> Result<Infinity> {
    let value = host.get_attr(curve.as_str(), attr)?;
    value
        .as_number()
        .filter(|n| *n >= 0.0 && *n <= f64::from(u8::MAX))
        .and_then(|n| Infinity::from_index(n as u8))
        .ok_or_else(|| TimelineError::Rejected(format!("{curve}.{attr} is not an infinity mode")))
}

/// Curves in `scope` of the given kinds (every kind when empty) that
/// extrapolate before their first key when `pre` is set and after their
/// last key when `post` is set
pub fn list_curves_with_infinite_set<H: AnimationHost + ?Sized>(
    host: &H,
    kinds: &[CurveKind],
    scope: &CurveScope,
    pre: bool,
    post: bool,
) -> Result<Vec<CurveId>> {
    let mut curves = Vec::new();
    for handle in list_curves(host, kinds, scope, false)? {
        if pre && curve_infinity(host, &handle.id, PRE_INFINITY_ATTR)? == Infinity::Constant {
            continue;
        }
        if post && curve_infinity(host, &handle.id, POST_INFINITY_ATTR)? == Infinity::Constant {
            continue;
        }
        curves.push(handle.id);
    }
    Ok(curves)
}

/// Curve animating `plug`, `None` when the plug is not animated
pub fn find_curve_source<H: AnimationHost + ?Sized>(host: &H, plug: &str) -> Result<Option<CurveId>> {
    for handle in list_curves(host, &[], &CurveScope::All, false)? {
        if host.curve_output(&handle.id)?.as_deref() == Some(plug) {
            return Ok(Some(handle.id));
        }
    }
    Ok(None)
}

/// Time of the last key over `curves`, `None` when none has keys
pub fn last_key_time<H: AnimationHost + ?Sized>(host: &H, curves: &[CurveId]) -> Result<Option<f64>> {
    let mut last: Option<f64> = None;
    for curve in curves {
        let count = host.key_count(curve)?;
        if count == 0 {
            continue;
        }
        let time = host.key(curve, count - 1)?.time;
        last = Some(last.map_or(time, |t| t.max(time)));
    }
    Ok(last)
}

/// Time of the first key over `curves`, `None` when none has keys
pub fn first_key_time<H: AnimationHost + ?Sized>(host: &H, curves: &[CurveId]) -> Result<Option<f64>> {
    let mut first: Option<f64> = None;
    for curve in curves {
        if host.key_count(curve)? == 0 {
            continue;
        }
        let time = host.key(curve, 0)?.time;
        first = Some(first.map_or(time, |t| t.min(time)));
    }
    Ok(first)
}

/// Upper bound on the samples a single bake takes per curve
pub const MAX_BAKE_SAMPLES: usize = 1_000_000;

/// Sample times of a bake: every `step` frames from `range.start`, with
/// `range.end` always included
fn bake_sample_times(range: TimeRange, step: f64) -> Result<Vec<f64>> {
    if !step.is_finite() || step <= 0.0 {
        return Err(TimelineError::invalid_range(range.start, range.end, "bake step must be positive"));
    }
    let steps = ((range.duration() + TIME_EPSILON) / step).floor();
    if steps >= MAX_BAKE_SAMPLES as f64 {
        return Err(TimelineError::invalid_range(
            range.start,
            range.end,
            format!("bake step {step} gives more than {MAX_BAKE_SAMPLES} samples"),
        ));
    }
    let mut times: Vec<f64> = (0..=steps as usize)
        .map(|i| range.start + i as f64 * step)
        .collect();
    if !times.last().is_some_and(|t| same_time(*t, range.end)) {
        times.push(range.end);
    }
    Ok(times)
}

/// Bake `curves` over `range` with one key every `step` frames.
///
/// Each curve is sampled by moving the host current time and reading the
/// attribute it drives, then its keys inside `range` are replaced by the
/// samples with linear tangents. Static and unconnected curves are skipped.
/// The current time is restored afterwards.
pub fn bake_curves<H: AnimationHost + ?Sized>(
    host: &mut H,
    curves: &[CurveId],
    range: TimeRange,
    step: f64,
) -> Result<()> {
    let range = range.validated()?;
    let samples_times = bake_sample_times(range, step)?;
    let mut chunk = UndoChunk::open(host, "Bake curves");
    let mut host = TimeGuard::save(&mut *chunk);

    let mut report = BatchReport::new("Bake curves");
    let mut baked = 0;
    for curve in curves {
        let done = report.run(curve.as_str(), || {
            if host.key_count(curve)? == 0 || is_static(&*host, curve)? {
                return Ok(false);
            }
            let Some(plug) = host.curve_output(curve)? else {
                return Ok(false);
            };
            let (node, attr) = plug
                .split_once('.')
                .ok_or_else(|| TimelineError::NotFound(format!("plug {plug}")))?;

            let mut values = Vec::with_capacity(samples_times.len());
            for &t in &samples_times {
                host.set_current_time(t);
                let value = host.get_attr(node, attr)?.as_number().ok_or_else(|| {
                    TimelineError::Rejected(format!("{plug} is not numeric"))
                })?;
                values.push((t, value));
            }

            clear_keys(&mut *host, curve, range.start..=range.end)?;
            for (t, value) in values {
                host.insert_key(curve, t, Some(value))?;
            }
            // Appending resets the previous key, so tangents go last.
            for index in keys_in_window(&*host, curve, range.start..=range.end)? {
                host.set_tangent_types(
                    curve,
                    index,
                    Some(TangentType::Linear),
                    Some(TangentType::Linear),
                )?;
            }
            Ok(true)
        });
        if done == Some(true) {
            baked += 1;
        }
    }
    tracing::info!("Baked {baked} of {} animation curves", curves.len());
    report.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{AttrValue, HostContext};
    use crate::keyframe::Key;
    use crate::memory::InMemoryHost;

    fn scene() -> InMemoryHost {
        let mut host = InMemoryHost::new();
        host.add_curve(
            "ball_translateY",
            CurveKind::Linear,
            vec![Key::new(1.0, 0.0), Key::new(10.0, 5.0)],
            Some("ball.translateY"),
        );
        host.add_curve(
            "ball_rotateZ",
            CurveKind::Angular,
            vec![Key::new(1.0, 3.0), Key::new(10.0, 3.0)],
            Some("ball.rotateZ"),
        );
        host.add_curve(
            "char:arm_rotateX",
            CurveKind::Angular,
            vec![Key::new(1.0, 0.0), Key::new(5.0, 90.0)],
            Some("char:arm.rotateX"),
        );
        host.add_curve("orphan_visibility", CurveKind::Unitless, vec![Key::new(1.0, 1.0)], None);
        host.set_referenced("char:arm_rotateX", true).unwrap();
        host
    }

    #[test]
    fn test_list_curves_by_kind() {
        let host = scene();
        let angular = list_curves(&host, &[CurveKind::Angular], &CurveScope::All, false).unwrap();
        assert_eq!(angular.len(), 2);
        assert!(angular.iter().all(|h| h.kind == CurveKind::Angular));

        let all = list_curves(&host, &[], &CurveScope::All, false).unwrap();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_list_curves_excludes_references() {
        let host = scene();
        let curves = list_curves(&host, &[], &CurveScope::All, true).unwrap();
        assert!(curves.iter().all(|h| h.id.as_str() != "char:arm_rotateX"));
        assert_eq!(curves.len(), 3);
    }

    #[test]
    fn test_candidates_scope() {
        let host = scene();
        let scope = CurveScope::Candidates(vec![
            CurveId::new("ball_rotateZ"),
            CurveId::new("ball_translateY"),
        ]);
        let curves = list_curves(&host, &[CurveKind::Linear], &scope, false).unwrap();
        assert_eq!(curves.len(), 1);
        assert_eq!(curves[0].id.as_str(), "ball_translateY");

        let missing = CurveScope::Candidates(vec![CurveId::new("nope")]);
        let err = list_curves(&host, &[], &missing, false).unwrap_err();
        assert!(matches!(err, TimelineError::NotFound(_)));
    }

    #[test]
    fn test_is_static() {
        let host = scene();
        assert!(is_static(&host, &CurveId::new("ball_rotateZ")).unwrap());
        assert!(!is_static(&host, &CurveId::new("ball_translateY")).unwrap());
        assert!(is_static(&host, &CurveId::new("nope")).is_err());

        let moving = list_non_static_curves(&host, &CurveScope::All).unwrap();
        assert_eq!(moving.len(), 2);
    }

    #[test]
    fn test_namespace_and_unconnected() {
        let mut host = scene();
        let namespaced = list_curves_with_namespace(&host, &CurveScope::All, false).unwrap();
        assert_eq!(namespaced, vec![CurveId::new("char:arm_rotateX")]);
        assert!(list_curves_with_namespace(&host, &CurveScope::All, true)
            .unwrap()
            .is_empty());

        let deleted = delete_unconnected_curves(&mut host).unwrap();
        assert_eq!(deleted, vec![CurveId::new("orphan_visibility")]);
        assert!(host.curve("orphan_visibility").is_none());
    }

    #[test]
    fn test_list_curves_with_infinite_set() {
        let mut host = scene();
        host.set_attr("ball_translateY", PRE_INFINITY_ATTR, AttrValue::Number(3.0)).unwrap();
        host.set_attr("ball_rotateZ", POST_INFINITY_ATTR, AttrValue::Number(1.0)).unwrap();
        host.set_attr("char:arm_rotateX", PRE_INFINITY_ATTR, AttrValue::Number(5.0)).unwrap();
        host.set_attr("char:arm_rotateX", POST_INFINITY_ATTR, AttrValue::Number(4.0)).unwrap();

        let pre = list_curves_with_infinite_set(&host, &[], &CurveScope::All, true, false).unwrap();
        assert_eq!(pre, vec![CurveId::new("char:arm_rotateX"), CurveId::new("ball_translateY")]);

        let both = list_curves_with_infinite_set(&host, &[], &CurveScope::All, true, true).unwrap();
        assert_eq!(both, vec![CurveId::new("char:arm_rotateX")]);

        let post = list_curves_with_infinite_set(&host, &[CurveKind::Angular], &CurveScope::All, false, true)
            .unwrap();
        assert_eq!(post.len(), 2);

        let err = host.set_attr("ball_rotateZ", PRE_INFINITY_ATTR, AttrValue::Number(2.0)).unwrap_err();
        assert!(matches!(err, TimelineError::Rejected(_)));
    }

    #[test]
    fn test_find_curve_source() {
        let host = scene();
        assert_eq!(
            find_curve_source(&host, "char:arm.rotateX").unwrap(),
            Some(CurveId::new("char:arm_rotateX"))
        );
        assert_eq!(find_curve_source(&host, "ball.scaleX").unwrap(), None);
    }

    #[test]
    fn test_first_and_last_key_time() {
        let host = scene();
        let curves = vec![CurveId::new("ball_translateY"), CurveId::new("char:arm_rotateX")];
        assert_eq!(last_key_time(&host, &curves).unwrap(), Some(10.0));
        assert_eq!(first_key_time(&host, &curves).unwrap(), Some(1.0));
        assert_eq!(last_key_time(&host, &[]).unwrap(), None);
    }

    #[test]
    fn test_bake_restores_current_time() {
        let mut host = scene();
        host.set_current_time(42.0);
        let curves = vec![CurveId::new("ball_translateY"), CurveId::new("ball_rotateZ")];
        bake_curves(&mut host, &curves, TimeRange::new(1.0, 10.0).unwrap(), 3.0).unwrap();

        assert_eq!(host.current_time(), 42.0);
        assert_eq!(host.key_times("ball_translateY"), vec![1.0, 4.0, 7.0, 10.0]);
        // Static curves are left alone.
        assert_eq!(host.key_times("ball_rotateZ"), vec![1.0, 10.0]);
        let keys = host.keys(&CurveId::new("ball_translateY")).unwrap();
        assert_eq!(keys[3].value, 5.0);
        assert!(keys.iter().all(|k| k.out_tangent == TangentType::Linear));
    }

    #[test]
    fn test_bake_rejects_degenerate_steps() {
        let mut host = scene();
        let curve = CurveId::new("ball_translateY");
        let range = TimeRange::new(1.0, 10.0).unwrap();
        for step in [1e-20, 0.0, -1.0, f64::NAN] {
            let err = bake_curves(&mut host, &[curve.clone()], range, step).unwrap_err();
            assert!(matches!(err, TimelineError::InvalidRange { .. }));
        }
        assert_eq!(host.key_times("ball_translateY"), vec![1.0, 10.0]);

        let inverted = TimeRange { start: 10.0, end: 1.0 };
        assert!(bake_curves(&mut host, &[curve], inverted, 1.0).is_err());
    }

    #[test]
    fn test_bake_sample_times() {
        let range = TimeRange::new(1.0, 10.0).unwrap();
        assert_eq!(bake_sample_times(range, 4.0).unwrap(), vec![1.0, 5.0, 9.0, 10.0]);
        assert_eq!(bake_sample_times(range, 20.0).unwrap(), vec![1.0, 10.0]);
        let single = TimeRange::new(3.0, 3.0).unwrap();
        assert_eq!(bake_sample_times(single, 1.0).unwrap(), vec![3.0]);
    }
}
