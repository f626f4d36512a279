// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe definitions for animation curves.

use crate::error::{Result, TimelineError};
use serde::{Deserialize, Serialize};

/// Two key times closer than this are the same key time
pub const TIME_EPSILON: f64 = 1e-6;

/// Index of a key on a curve, ordered by time
pub type KeyIndex = usize;

/// Check whether two key times designate the same key
pub fn same_time(a: f64, b: f64) -> bool {
    (a - b).abs() < TIME_EPSILON
}

/// Tangent type at one side of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TangentType {
    /// Host computed smooth tangent
    #[default]
    Auto,
    /// Catmull-Rom style spline
    Spline,
    /// Straight line towards the neighbour key
    Linear,
    /// Zero slope
    Flat,
    /// Hold the value until the next key
    Step,
    /// Spline clamped to avoid overshoot
    Clamped,
    /// Flat at extrema, spline elsewhere
    Plateau,
    /// User edited tangent
    Fixed,
}

/// Side of a key a tangent belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TangentSide {
    /// Tangent arriving at the key
    In,
    /// Tangent leaving the key
    Out,
}

/// A keyframe on an animation curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Key {
    /// Time in frames
    pub time: f64,
    /// Value at this key
    pub value: f64,
    /// Incoming tangent type
    pub in_tangent: TangentType,
    /// Outgoing tangent type
    pub out_tangent: TangentType,
    /// Incoming tangent weight
    #[serde(default = "default_weight")]
    pub in_weight: f64,
    /// Outgoing tangent weight
    #[serde(default = "default_weight")]
    pub out_weight: f64,
    /// Whether in and out tangents are locked together
    #[serde(default)]
    pub tangents_locked: bool,
    /// Whether tangent weights are locked
    #[serde(default)]
    pub weights_locked: bool,
}

fn default_weight() -> f64 {
    1.0
}

impl Key {
    /// Create a new key with auto tangents
    pub fn new(time: f64, value: f64) -> Self {
        Self {
            time,
            value,
            in_tangent: TangentType::Auto,
            out_tangent: TangentType::Auto,
            in_weight: 1.0,
            out_weight: 1.0,
            tangents_locked: true,
            weights_locked: true,
        }
    }

    /// Set both tangent types
    pub fn with_tangents(mut self, in_tangent: TangentType, out_tangent: TangentType) -> Self {
        self.in_tangent = in_tangent;
        self.out_tangent = out_tangent;
        self
    }
}

/// A closed time range `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Range start
    pub start: f64,
    /// Range end
    pub end: f64,
}

impl TimeRange {
    /// Create a range, rejecting inverted bounds
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(TimelineError::invalid_range(start, end, "bounds must be finite"));
        }
        if start > end {
            return Err(TimelineError::invalid_range(start, end, "start is after end"));
        }
        Ok(Self { start, end })
    }

    /// Create a range that must span a non-zero duration
    pub fn non_empty(start: f64, end: f64) -> Result<Self> {
        let range = Self::new(start, end)?;
        if range.is_empty() {
            return Err(TimelineError::invalid_range(start, end, "range is empty"));
        }
        Ok(range)
    }

    /// Check a range built without [`TimeRange::new`], such as a
    /// deserialized one
    pub fn validated(self) -> Result<Self> {
        Self::new(self.start, self.end)
    }

    /// Range duration
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Whether the range spans no time
    pub fn is_empty(&self) -> bool {
        same_time(self.start, self.end)
    }

    /// Whether `time` lies inside the range, bounds included
    pub fn contains(&self, time: f64) -> bool {
        time > self.start - TIME_EPSILON && time < self.end + TIME_EPSILON
    }

    /// Whether `time` lies strictly between the bounds
    pub fn contains_strictly(&self, time: f64) -> bool {
        time > self.start + TIME_EPSILON && time < self.end - TIME_EPSILON
    }

    /// Whether two closed ranges share any time
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Map a time of this range linearly onto `target`
    pub fn remap(&self, time: f64, target: &TimeRange) -> f64 {
        if self.is_empty() {
            return target.start;
        }
        target.start + (time - self.start) * target.duration() / self.duration()
    }
}

/// Interpolation utilities
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two floats
    pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
        a + (b - a) * t
    }

    /// Hermite spline interpolation
    pub fn hermite(p0: f64, m0: f64, p1: f64, m1: f64, t: f64) -> f64 {
        let t2 = t * t;
        let t3 = t2 * t;

        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        h00 * p0 + h10 * m0 + h01 * p1 + h11 * m1
    }
}

/// Evaluate a time-sorted key list at `time`.
///
/// Values are held constant outside the keyed range. Between two keys the
/// outgoing tangent of the left key picks the segment shape: step holds,
/// linear interpolates, flat eases with zero slopes and every other type
/// uses a Catmull-Rom slope built from the neighbours.
pub fn evaluate_keys(keys: &[Key], time: f64) -> Option<f64> {
    let first = keys.first()?;
    let last = keys.last()?;
    if time <= first.time {
        return Some(first.value);
    }
    if time >= last.time {
        return Some(last.value);
    }

    let next = keys.iter().position(|k| k.time >= time)?;
    let b = &keys[next];
    if same_time(b.time, time) {
        return Some(b.value);
    }
    let a = &keys[next - 1];
    let span = b.time - a.time;
    let t = (time - a.time) / span;

    let value = match (a.out_tangent, b.in_tangent) {
        (TangentType::Step, _) => a.value,
        (TangentType::Linear, TangentType::Linear) => Interpolation::lerp(a.value, b.value, t),
        (out_tangent, in_tangent) => {
            let m0 = slope(keys, next - 1, out_tangent) * span;
            let m1 = slope(keys, next, in_tangent) * span;
            Interpolation::hermite(a.value, m0, b.value, m1, t)
        }
    };
    Some(value)
}

fn slope(keys: &[Key], index: usize, tangent: TangentType) -> f64 {
    let key = &keys[index];
    let prev = index.checked_sub(1).and_then(|i| keys.get(i));
    let next = keys.get(index + 1);
    match tangent {
        TangentType::Flat | TangentType::Step => 0.0,
        TangentType::Linear => match (prev, next) {
            (_, Some(n)) => (n.value - key.value) / (n.time - key.time),
            (Some(p), None) => (key.value - p.value) / (key.time - p.time),
            (None, None) => 0.0,
        },
        _ => match (prev, next) {
            (Some(p), Some(n)) => (n.value - p.value) / (n.time - p.time),
            _ => 0.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_validation() {
        assert!(TimeRange::new(10.0, 5.0).is_err());
        assert!(TimeRange::new(5.0, 5.0).is_ok());
        assert!(TimeRange::non_empty(5.0, 5.0).is_err());
        assert!(TimeRange::new(f64::NAN, 5.0).is_err());

        let inverted = TimeRange { start: 20.0, end: 10.0 };
        assert!(inverted.validated().is_err());
        let range = TimeRange { start: 10.0, end: 20.0 };
        assert_eq!(range.validated().unwrap(), range);
    }

    #[test]
    fn test_remap() {
        let from = TimeRange::new(10.0, 20.0).unwrap();
        let to = TimeRange::new(15.0, 35.0).unwrap();
        assert_eq!(from.remap(10.0, &to), 15.0);
        assert_eq!(from.remap(15.0, &to), 25.0);
        assert_eq!(from.remap(20.0, &to), 35.0);
    }

    #[test]
    fn test_evaluate_holds_outside_range() {
        let keys = vec![Key::new(10.0, 2.0), Key::new(20.0, 4.0)];
        assert_eq!(evaluate_keys(&keys, 0.0), Some(2.0));
        assert_eq!(evaluate_keys(&keys, 30.0), Some(4.0));
        assert_eq!(evaluate_keys(&[], 3.0), None);
    }

    #[test]
    fn test_evaluate_linear_and_step() {
        let linear = vec![
            Key::new(0.0, 0.0).with_tangents(TangentType::Linear, TangentType::Linear),
            Key::new(10.0, 10.0).with_tangents(TangentType::Linear, TangentType::Linear),
        ];
        assert!((evaluate_keys(&linear, 2.5).unwrap() - 2.5).abs() < 1e-9);

        let step = vec![
            Key::new(0.0, 1.0).with_tangents(TangentType::Step, TangentType::Step),
            Key::new(10.0, 5.0),
        ];
        assert_eq!(evaluate_keys(&step, 9.0), Some(1.0));
    }

    #[test]
    fn test_evaluate_flat_eases_between_values() {
        let keys = vec![
            Key::new(0.0, 0.0).with_tangents(TangentType::Flat, TangentType::Flat),
            Key::new(10.0, 1.0).with_tangents(TangentType::Flat, TangentType::Flat),
        ];
        let mid = evaluate_keys(&keys, 5.0).unwrap();
        assert!((mid - 0.5).abs() < 1e-9);
        assert!(evaluate_keys(&keys, 1.0).unwrap() < 0.1);
    }
}
