// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host application contract.
//!
//! Every curve, shot and attribute lives inside the host application. The
//! algorithms in this crate only reach it through [`AnimationHost`], and
//! host-global state (current time, selection, undo chunk) through
//! [`HostContext`].
//!
//! Global state changed by an operation is restored with the scoped guards
//! defined here. Each guard borrows the host mutably, dereferences to it,
//! and restores the state in `Drop`, so the restore runs on every exit path.

use crate::error::Result;
use crate::keyframe::{evaluate_keys, Key, KeyIndex, TangentSide, TangentType};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

/// Host node name of an animation curve
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurveId(pub String);

impl CurveId {
    /// Create a curve id from a node name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Node name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CurveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Host node name of a shot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShotId(pub String);

impl ShotId {
    /// Create a shot id from a node name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Node name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Typed attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// Numeric attribute
    Number(f64),
    /// String attribute
    Text(String),
    /// Three component vector
    Vector([f64; 3]),
    /// Boolean attribute
    Bool(bool),
}

impl AttrValue {
    /// Get as number if possible
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(v) => Some(*v),
            AttrValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Get as text if possible
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Get as bool if possible
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            AttrValue::Number(v) => Some(*v != 0.0),
            _ => None,
        }
    }
}

/// Parameters of a shot created by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewShot {
    /// Requested node name, host picks one when `None`
    pub name: Option<String>,
    /// Editorial shot name
    pub shot_name: String,
    /// Primary timeline start
    pub start_frame: f64,
    /// Primary timeline end
    pub end_frame: f64,
    /// Sequencer start
    pub sequence_start_frame: f64,
    /// Sequencer end
    pub sequence_end_frame: f64,
    /// Sequencer track, 1-based
    pub track: u32,
}

/// Host-global state shared by all operations
pub trait HostContext {
    /// Current time of the global scrubber
    fn current_time(&self) -> f64;

    /// Move the global scrubber
    fn set_current_time(&mut self, time: f64);

    /// Currently selected node names
    fn selection(&self) -> Vec<String>;

    /// Replace the selection
    fn set_selection(&mut self, nodes: Vec<String>);

    /// Open an undo chunk; chunks nest and only the outermost one commits
    fn open_undo_chunk(&mut self, label: &str);

    /// Close the most recently opened undo chunk
    fn close_undo_chunk(&mut self);
}

/// Scripting services of the host application
pub trait AnimationHost: HostContext {
    // Nodes

    /// List node names of the given host type, in host order
    fn list_nodes(&self, node_type: &str) -> Vec<String>;

    /// Host type of a node
    fn node_type(&self, node: &str) -> Result<String>;

    /// Whether the node comes from a read-only reference
    fn is_referenced(&self, node: &str) -> Result<bool>;

    /// Delete a node
    fn delete_node(&mut self, node: &str) -> Result<()>;

    // Attributes

    /// Read `node.attr`
    fn get_attr(&self, node: &str, attr: &str) -> Result<AttrValue>;

    /// Write `node.attr`
    fn set_attr(&mut self, node: &str, attr: &str, value: AttrValue) -> Result<()>;

    /// Whether a `node.attr` plug is locked
    fn is_attr_locked(&self, plug: &str) -> Result<bool>;

    /// Lock or unlock a `node.attr` plug
    fn set_attr_locked(&mut self, plug: &str, locked: bool) -> Result<()>;

    /// Plug driven by a curve, `None` when unconnected
    fn curve_output(&self, curve: &CurveId) -> Result<Option<String>>;

    // Keys

    /// Number of keys on a curve
    fn key_count(&self, curve: &CurveId) -> Result<usize>;

    /// Key at `index`
    fn key(&self, curve: &CurveId, index: KeyIndex) -> Result<Key>;

    /// All keys in time order
    fn keys(&self, curve: &CurveId) -> Result<Vec<Key>> {
        (0..self.key_count(curve)?)
            .map(|index| self.key(curve, index))
            .collect()
    }

    /// Curve value at `time`
    fn evaluate(&self, curve: &CurveId, time: f64) -> Result<f64> {
        Ok(evaluate_keys(&self.keys(curve)?, time).unwrap_or(0.0))
    }

    /// Set a key at `time`, evaluating the curve when `value` is `None`.
    /// An existing key at that time is kept and only its value updated.
    fn insert_key(&mut self, curve: &CurveId, time: f64, value: Option<f64>) -> Result<KeyIndex>;

    /// Remove the key at `index`
    fn remove_key(&mut self, curve: &CurveId, index: KeyIndex) -> Result<()>;

    /// Overwrite the value of the key at `index`
    fn set_key_value(&mut self, curve: &CurveId, index: KeyIndex, value: f64) -> Result<()>;

    /// Set the tangent types of the key at `index`; `None` leaves a side untouched
    fn set_tangent_types(
        &mut self,
        curve: &CurveId,
        index: KeyIndex,
        in_tangent: Option<TangentType>,
        out_tangent: Option<TangentType>,
    ) -> Result<()>;

    /// Lock or unlock in/out tangents together
    fn set_tangents_locked(&mut self, curve: &CurveId, index: KeyIndex, locked: bool) -> Result<()>;

    /// Lock or unlock tangent weights
    fn set_weights_locked(&mut self, curve: &CurveId, index: KeyIndex, locked: bool) -> Result<()>;

    /// Set the tangent weight on one side of a key
    fn set_tangent_weight(
        &mut self,
        curve: &CurveId,
        index: KeyIndex,
        side: TangentSide,
        weight: f64,
    ) -> Result<()>;

    /// Move several keys at once. Moved keys may pass over other keys but
    /// must not land on a key time that stays occupied.
    fn move_keys(&mut self, curve: &CurveId, moves: &[(KeyIndex, f64)]) -> Result<()>;

    // Shots and sequencer tracks

    /// Create a shot node
    fn create_shot(&mut self, shot: &NewShot) -> Result<String>;

    /// Set a shot's primary range in one edit
    fn set_shot_range(&mut self, shot: &str, start: f64, end: f64) -> Result<()>;

    /// Number of sequencer tracks
    fn track_count(&self) -> u32;

    /// Title of a 1-based sequencer track
    fn track_title(&self, track: u32) -> Result<String>;

    /// Insert a sequencer track at a 1-based index
    fn insert_track(&mut self, track: u32, title: &str) -> Result<()>;

    /// Remove a 1-based sequencer track
    fn remove_track(&mut self, track: u32) -> Result<()>;
}

/// Undo chunk held open for the lifetime of the guard
pub struct UndoChunk<'a, H: HostContext + ?Sized> {
    host: &'a mut H,
}

impl<'a, H: HostContext + ?Sized> UndoChunk<'a, H> {
    /// Open a chunk labelled `label`
    pub fn open(host: &'a mut H, label: &str) -> Self {
        host.open_undo_chunk(label);
        Self { host }
    }
}

impl<H: HostContext + ?Sized> Deref for UndoChunk<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.host
    }
}

impl<H: HostContext + ?Sized> DerefMut for UndoChunk<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        self.host
    }
}

impl<H: HostContext + ?Sized> Drop for UndoChunk<'_, H> {
    fn drop(&mut self) {
        self.host.close_undo_chunk();
    }
}

/// Restores the host current time when dropped
pub struct TimeGuard<'a, H: HostContext + ?Sized> {
    host: &'a mut H,
    saved: f64,
}

impl<'a, H: HostContext + ?Sized> TimeGuard<'a, H> {
    /// Remember the current time
    pub fn save(host: &'a mut H) -> Self {
        let saved = host.current_time();
        Self { host, saved }
    }

    /// Time restored on drop
    pub fn saved_time(&self) -> f64 {
        self.saved
    }
}

impl<H: HostContext + ?Sized> Deref for TimeGuard<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.host
    }
}

impl<H: HostContext + ?Sized> DerefMut for TimeGuard<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        self.host
    }
}

impl<H: HostContext + ?Sized> Drop for TimeGuard<'_, H> {
    fn drop(&mut self) {
        self.host.set_current_time(self.saved);
    }
}

/// Restores the host selection when dropped
pub struct SelectionGuard<'a, H: HostContext + ?Sized> {
    host: &'a mut H,
    saved: Vec<String>,
}

impl<'a, H: HostContext + ?Sized> SelectionGuard<'a, H> {
    /// Remember the current selection
    pub fn save(host: &'a mut H) -> Self {
        let saved = host.selection();
        Self { host, saved }
    }
}

impl<H: HostContext + ?Sized> Deref for SelectionGuard<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.host
    }
}

impl<H: HostContext + ?Sized> DerefMut for SelectionGuard<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        self.host
    }
}

impl<H: HostContext + ?Sized> Drop for SelectionGuard<'_, H> {
    fn drop(&mut self) {
        self.host.set_selection(std::mem::take(&mut self.saved));
    }
}

/// Unlocks a plug for the lifetime of the guard and locks it back on drop
/// when it was locked before
pub struct AttributeUnlock<'a, H: AnimationHost + ?Sized> {
    host: &'a mut H,
    plug: String,
    was_locked: bool,
}

impl<'a, H: AnimationHost + ?Sized> AttributeUnlock<'a, H> {
    /// Unlock `plug` if needed
    pub fn acquire(host: &'a mut H, plug: impl Into<String>) -> Result<Self> {
        let plug = plug.into();
        let was_locked = host.is_attr_locked(&plug)?;
        if was_locked {
            host.set_attr_locked(&plug, false)?;
        }
        Ok(Self {
            host,
            plug,
            was_locked,
        })
    }

    /// Whether the plug was locked before the guard
    pub fn was_locked(&self) -> bool {
        self.was_locked
    }
}

impl<H: AnimationHost + ?Sized> Deref for AttributeUnlock<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.host
    }
}

impl<H: AnimationHost + ?Sized> DerefMut for AttributeUnlock<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        self.host
    }
}

impl<H: AnimationHost + ?Sized> Drop for AttributeUnlock<'_, H> {
    fn drop(&mut self) {
        if !self.was_locked {
            return;
        }
        if let Err(e) = self.host.set_attr_locked(&self.plug, true) {
            tracing::error!("Failed to lock {} back: {e}", self.plug);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CurveKind;
    use crate::error::TimelineError;
    use crate::memory::InMemoryHost;

    fn scene() -> InMemoryHost {
        let mut host = InMemoryHost::new();
        host.add_curve(
            "cam_focal",
            CurveKind::Unitless,
            vec![Key::new(1.0, 35.0), Key::new(20.0, 50.0)],
            Some("cam.focalLength"),
        );
        host
    }

    fn scrub_and_fail(host: &mut InMemoryHost) -> Result<()> {
        let mut host = TimeGuard::save(host);
        host.set_current_time(12.0);
        Err(TimelineError::Rejected("scrubbed".to_string()))
    }

    #[test]
    fn test_time_guard_restores_on_error() {
        let mut host = scene();
        host.set_current_time(5.0);
        assert!(scrub_and_fail(&mut host).is_err());
        assert_eq!(host.current_time(), 5.0);

        let guard = TimeGuard::save(&mut host);
        assert_eq!(guard.saved_time(), 5.0);
    }

    #[test]
    fn test_selection_guard() {
        let mut host = scene();
        host.set_selection(vec!["cam_focal".to_string()]);
        {
            let mut host = SelectionGuard::save(&mut host);
            host.set_selection(Vec::new());
            assert!(host.selection().is_empty());
        }
        assert_eq!(host.selection(), vec!["cam_focal".to_string()]);
    }

    #[test]
    fn test_attribute_unlock_relocks() {
        let mut host = scene();
        let curve = CurveId::new("cam_focal");
        host.set_attr_locked("cam.focalLength", true).unwrap();
        {
            let mut host = AttributeUnlock::acquire(&mut host, "cam.focalLength").unwrap();
            assert!(host.was_locked());
            host.insert_key(&curve, 10.0, None).unwrap();
        }
        assert!(host.is_attr_locked("cam.focalLength").unwrap());
        assert_eq!(host.key_count(&curve).unwrap(), 3);

        let guard = AttributeUnlock::acquire(&mut host, "cam.focalLength").unwrap();
        drop(guard);
        let guard = AttributeUnlock::acquire(&mut host, "cam.focalLength").unwrap();
        assert!(guard.was_locked());
    }

    #[test]
    fn test_undo_chunk_commits_once() {
        let mut host = scene();
        let curve = CurveId::new("cam_focal");
        {
            let mut chunk = UndoChunk::open(&mut host, "Edit focal");
            chunk.insert_key(&curve, 5.0, Some(40.0)).unwrap();
            chunk.set_key_value(&curve, 0, 30.0).unwrap();
        }
        assert_eq!(host.history().undo_label(), Some("Edit focal"));
        host.undo().unwrap();
        assert_eq!(host.key_times("cam_focal"), vec![1.0, 20.0]);
        assert_eq!(host.key(&curve, 0).unwrap().value, 35.0);
    }

    #[test]
    fn test_attr_value_conversions() {
        assert_eq!(AttrValue::Bool(true).as_number(), Some(1.0));
        assert_eq!(AttrValue::Number(0.0).as_bool(), Some(false));
        assert_eq!(AttrValue::Text("a".to_string()).as_number(), None);
        assert_eq!(AttrValue::Vector([0.0; 3]).as_text(), None);
    }
}
