// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory host.
//!
//! [`InMemoryHost`] keeps a whole scene in a serializable [`SceneData`] and
//! implements [`AnimationHost`] on top of it. It reproduces the host
//! behaviours the editing algorithms have to cope with:
//! - appending or prepending a key resets the neighbouring key's tangents
//!   to auto
//! - referenced nodes and locked plugs reject edits
//! - key moves cannot land on a key time that stays occupied
//! - shots on one sequencer track cannot overlap in sequencer time
//! - changing a shot's primary range moves its sequencer end with it
//! - undo chunks nest and commit one [`UndoHistory`] entry

use crate::curve::{CurveKind, Infinity, POST_INFINITY_ATTR, PRE_INFINITY_ATTR};
use crate::error::{Result, TimelineError};
use crate::history::{Snapshot, UndoHistory};
use crate::host::{AnimationHost, AttrValue, CurveId, HostContext, NewShot};
use crate::keyframe::{evaluate_keys, same_time, Key, KeyIndex, TangentSide, TangentType};
use crate::shot::{ShotAttr, SHOT_NODE_TYPE};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// An animation curve node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveNode {
    /// Curve type
    pub kind: CurveKind,
    /// Keys in time order
    #[serde(default)]
    pub keys: Vec<Key>,
    /// Driven `node.attr` plug
    #[serde(default)]
    pub output: Option<String>,
    /// Whether the curve comes from a reference
    #[serde(default)]
    pub referenced: bool,
    /// Behaviour before the first key
    #[serde(default)]
    pub pre_infinity: Infinity,
    /// Behaviour after the last key
    #[serde(default)]
    pub post_infinity: Infinity,
}

impl CurveNode {
    fn infinity_mut(&mut self, attr: &str) -> Option<&mut Infinity> {
        match attr {
            PRE_INFINITY_ATTR => Some(&mut self.pre_infinity),
            POST_INFINITY_ATTR => Some(&mut self.post_infinity),
            _ => None,
        }
    }
}

/// A shot node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotNode {
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
    #[serde(default = "default_track")]
    pub track: u32,
    /// Whether the shot is locked
    #[serde(default)]
    pub locked: bool,
    /// Whether the shot comes from a reference
    #[serde(default)]
    pub referenced: bool,
}

fn default_track() -> u32 {
    1
}

impl ShotNode {
    fn sequence_overlaps(&self, other: &ShotNode) -> bool {
        self.track == other.track
            && self.sequence_start_frame <= other.sequence_end_frame
            && other.sequence_start_frame <= self.sequence_end_frame
    }

    fn follow_primary_range(&mut self) {
        self.sequence_end_frame =
            self.sequence_start_frame + (self.end_frame - self.start_frame);
    }
}

/// A plain attribute value with its lock state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeState {
    /// Stored value
    pub value: AttrValue,
    /// Whether the plug is locked
    #[serde(default)]
    pub locked: bool,
}

/// Complete serializable scene
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneData {
    /// Animation curves by node name
    pub curves: IndexMap<String, CurveNode>,
    /// Shots by node name
    pub shots: IndexMap<String, ShotNode>,
    /// Sequencer track titles, index 0 is track 1
    pub tracks: Vec<String>,
    /// Plain attributes by `node.attr` plug
    pub attributes: IndexMap<String, AttributeState>,
    /// Global current time
    pub current_time: f64,
    /// Selected node names
    pub selection: Vec<String>,
}

/// Host implementation over an in-memory scene
#[derive(Debug, Default)]
pub struct InMemoryHost {
    scene: SceneData,
    history: UndoHistory,
    chunk_depth: usize,
    chunk_start: Option<(String, Snapshot)>,
}

impl InMemoryHost {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing scene
    pub fn from_scene(scene: SceneData) -> Self {
        Self {
            scene,
            ..Self::default()
        }
    }

    /// Borrow the scene
    pub fn scene(&self) -> &SceneData {
        &self.scene
    }

    /// Take the scene back
    pub fn into_scene(self) -> SceneData {
        self.scene
    }

    /// Add a curve, optionally driving `output`
    pub fn add_curve(
        &mut self,
        name: &str,
        kind: CurveKind,
        keys: Vec<Key>,
        output: Option<&str>,
    ) -> CurveId {
        let mut keys = keys;
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        self.scene.curves.insert(
            name.to_string(),
            CurveNode {
                kind,
                keys,
                output: output.map(str::to_string),
                referenced: false,
                pre_infinity: Infinity::default(),
                post_infinity: Infinity::default(),
            },
        );
        CurveId::new(name)
    }

    /// Add a shot whose sequencer range mirrors its primary range length
    pub fn add_shot(&mut self, name: &str, start: f64, end: f64, sequence_start: f64, track: u32) {
        self.ensure_track(track);
        self.scene.shots.insert(
            name.to_string(),
            ShotNode {
                shot_name: name.to_string(),
                start_frame: start,
                end_frame: end,
                sequence_start_frame: sequence_start,
                sequence_end_frame: sequence_start + (end - start),
                track,
                locked: false,
                referenced: false,
            },
        );
    }

    /// Add a plain attribute
    pub fn add_attribute(&mut self, plug: &str, value: AttrValue) {
        self.scene.attributes.insert(
            plug.to_string(),
            AttributeState {
                value,
                locked: false,
            },
        );
    }

    /// Flag a curve or shot as coming from a reference
    pub fn set_referenced(&mut self, node: &str, referenced: bool) -> Result<()> {
        if let Some(curve) = self.scene.curves.get_mut(node) {
            curve.referenced = referenced;
        } else if let Some(shot) = self.scene.shots.get_mut(node) {
            shot.referenced = referenced;
        } else {
            return Err(TimelineError::NotFound(node.to_string()));
        }
        Ok(())
    }

    /// Borrow a curve node
    pub fn curve(&self, name: &str) -> Option<&CurveNode> {
        self.scene.curves.get(name)
    }

    /// Borrow a shot node
    pub fn shot(&self, name: &str) -> Option<&ShotNode> {
        self.scene.shots.get(name)
    }

    /// Key times of a curve, empty when the curve does not exist
    pub fn key_times(&self, name: &str) -> Vec<f64> {
        self.scene
            .curves
            .get(name)
            .map(|c| c.keys.iter().map(|k| k.time).collect())
            .unwrap_or_default()
    }

    /// Undo the last committed chunk
    pub fn undo(&mut self) -> Result<()> {
        self.ensure_no_open_chunk()?;
        let snapshot = self.history.undo()?;
        self.scene = snapshot.to_value()?;
        Ok(())
    }

    /// Redo the last undone chunk
    pub fn redo(&mut self) -> Result<()> {
        self.ensure_no_open_chunk()?;
        let snapshot = self.history.redo()?;
        self.scene = snapshot.to_value()?;
        Ok(())
    }

    /// Borrow the undo history
    pub fn history(&self) -> &UndoHistory {
        &self.history
    }

    fn ensure_no_open_chunk(&self) -> Result<()> {
        if self.chunk_depth > 0 {
            return Err(TimelineError::Rejected(
                "cannot undo while an undo chunk is open".to_string(),
            ));
        }
        Ok(())
    }

    fn ensure_track(&mut self, track: u32) {
        while (self.scene.tracks.len() as u32) < track {
            self.scene.tracks.push(String::new());
        }
    }

    fn curve_ref(&self, curve: &CurveId) -> Result<&CurveNode> {
        self.scene
            .curves
            .get(curve.as_str())
            .ok_or_else(|| TimelineError::NotFound(format!("curve {curve}")))
    }

    fn editable_curve(&mut self, curve: &CurveId) -> Result<&mut CurveNode> {
        let node = self.curve_ref(curve)?;
        if node.referenced {
            return Err(TimelineError::ReadOnly(format!("curve {curve} is referenced")));
        }
        if let Some(plug) = &node.output {
            if self.scene.attributes.get(plug).is_some_and(|a| a.locked) {
                return Err(TimelineError::ReadOnly(format!("{plug} is locked")));
            }
        }
        self.scene
            .curves
            .get_mut(curve.as_str())
            .ok_or_else(|| TimelineError::NotFound(format!("curve {curve}")))
    }

    fn editable_key(&mut self, curve: &CurveId, index: KeyIndex) -> Result<&mut Key> {
        self.editable_curve(curve)?
            .keys
            .get_mut(index)
            .ok_or_else(|| TimelineError::NotFound(format!("key {index} on {curve}")))
    }

    fn driving_curve(&self, plug: &str) -> Option<&CurveNode> {
        self.scene
            .curves
            .values()
            .find(|c| c.output.as_deref() == Some(plug))
    }

    /// Apply `edit` to a copy of a shot and keep it only when the track
    /// stays free of sequencer overlaps
    fn edit_shot(&mut self, name: &str, edit: impl FnOnce(&mut ShotNode) -> Result<()>) -> Result<()> {
        let current = self
            .scene
            .shots
            .get(name)
            .ok_or_else(|| TimelineError::NotFound(format!("shot {name}")))?;
        if current.referenced {
            return Err(TimelineError::ReadOnly(format!("shot {name} is referenced")));
        }
        let mut candidate = current.clone();
        edit(&mut candidate)?;
        if candidate.end_frame < candidate.start_frame {
            return Err(TimelineError::Rejected(format!(
                "shot {name} would end before it starts"
            )));
        }
        self.check_sequence_overlap(name, &candidate)?;
        self.ensure_track(candidate.track);
        self.scene.shots.insert(name.to_string(), candidate);
        Ok(())
    }

    fn check_sequence_overlap(&self, name: &str, candidate: &ShotNode) -> Result<()> {
        let clash = self
            .scene
            .shots
            .iter()
            .find(|(other, shot)| other.as_str() != name && shot.sequence_overlaps(candidate));
        match clash {
            Some((other, _)) => Err(TimelineError::Rejected(format!(
                "shot {name} would overlap {other} on sequencer track {}",
                candidate.track
            ))),
            None => Ok(()),
        }
    }

    fn unique_shot_name(&self, requested: Option<&str>) -> String {
        let base = requested.unwrap_or("shot");
        if requested.is_some() && !self.scene.shots.contains_key(base) {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{base}{i}"))
            .find(|candidate| !self.scene.shots.contains_key(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}

impl HostContext for InMemoryHost {
    fn current_time(&self) -> f64 {
        self.scene.current_time
    }

    fn set_current_time(&mut self, time: f64) {
        self.scene.current_time = time;
    }

    fn selection(&self) -> Vec<String> {
        self.scene.selection.clone()
    }

    fn set_selection(&mut self, nodes: Vec<String>) {
        self.scene.selection = nodes;
    }

    fn open_undo_chunk(&mut self, label: &str) {
        if self.chunk_depth == 0 {
            match Snapshot::from_value(&self.scene) {
                Ok(snapshot) => self.chunk_start = Some((label.to_string(), snapshot)),
                Err(e) => tracing::error!("Failed to snapshot scene for '{label}': {e}"),
            }
        }
        self.chunk_depth += 1;
    }

    fn close_undo_chunk(&mut self) {
        if self.chunk_depth == 0 {
            tracing::warn!("Undo chunk closed without being opened");
            return;
        }
        self.chunk_depth -= 1;
        if self.chunk_depth > 0 {
            return;
        }
        let Some((label, before)) = self.chunk_start.take() else {
            return;
        };
        match Snapshot::from_value(&self.scene) {
            Ok(after) => self.history.commit(label, before, after),
            Err(e) => tracing::error!("Failed to snapshot scene after '{label}': {e}"),
        }
    }
}

impl AnimationHost for InMemoryHost {
    fn list_nodes(&self, node_type: &str) -> Vec<String> {
        if node_type == SHOT_NODE_TYPE {
            return self.scene.shots.keys().cloned().collect();
        }
        self.scene
            .curves
            .iter()
            .filter(|(_, c)| c.kind.node_type() == node_type)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn node_type(&self, node: &str) -> Result<String> {
        if let Some(curve) = self.scene.curves.get(node) {
            return Ok(curve.kind.node_type().to_string());
        }
        if self.scene.shots.contains_key(node) {
            return Ok(SHOT_NODE_TYPE.to_string());
        }
        Err(TimelineError::NotFound(node.to_string()))
    }

    fn is_referenced(&self, node: &str) -> Result<bool> {
        if let Some(curve) = self.scene.curves.get(node) {
            return Ok(curve.referenced);
        }
        if let Some(shot) = self.scene.shots.get(node) {
            return Ok(shot.referenced);
        }
        Err(TimelineError::NotFound(node.to_string()))
    }

    fn delete_node(&mut self, node: &str) -> Result<()> {
        if self.is_referenced(node)? {
            return Err(TimelineError::ReadOnly(format!("{node} is referenced")));
        }
        if self.scene.curves.shift_remove(node).is_none() {
            self.scene.shots.shift_remove(node);
        }
        self.scene.selection.retain(|n| n != node);
        Ok(())
    }

    fn get_attr(&self, node: &str, attr: &str) -> Result<AttrValue> {
        if let Some(shot) = self.scene.shots.get(node) {
            let value = match ShotAttr::from_name(attr) {
                Some(ShotAttr::ShotName) => AttrValue::Text(shot.shot_name.clone()),
                Some(ShotAttr::StartFrame) => AttrValue::Number(shot.start_frame),
                Some(ShotAttr::EndFrame) => AttrValue::Number(shot.end_frame),
                Some(ShotAttr::SequenceStartFrame) => AttrValue::Number(shot.sequence_start_frame),
                Some(ShotAttr::SequenceEndFrame) => AttrValue::Number(shot.sequence_end_frame),
                Some(ShotAttr::Track) => AttrValue::Number(f64::from(shot.track)),
                Some(ShotAttr::Locked) => AttrValue::Bool(shot.locked),
                None => return Err(TimelineError::NotFound(format!("{node}.{attr}"))),
            };
            return Ok(value);
        }

        if let Some(curve) = self.scene.curves.get(node) {
            let infinity = match attr {
                PRE_INFINITY_ATTR => curve.pre_infinity,
                POST_INFINITY_ATTR => curve.post_infinity,
                _ => return Err(TimelineError::NotFound(format!("{node}.{attr}"))),
            };
            return Ok(AttrValue::Number(f64::from(infinity.index())));
        }

        let plug = format!("{node}.{attr}");
        if let Some(curve) = self.driving_curve(&plug) {
            let value = evaluate_keys(&curve.keys, self.scene.current_time).unwrap_or(0.0);
            return Ok(AttrValue::Number(value));
        }
        self.scene
            .attributes
            .get(&plug)
            .map(|a| a.value.clone())
            .ok_or(TimelineError::NotFound(plug))
    }

    fn set_attr(&mut self, node: &str, attr: &str, value: AttrValue) -> Result<()> {
        if self.scene.shots.contains_key(node) {
            let field = ShotAttr::from_name(attr)
                .ok_or_else(|| TimelineError::NotFound(format!("{node}.{attr}")))?;
            let number = value.as_number();
            let mismatch = || TimelineError::Rejected(format!("{node}.{attr} type mismatch"));
            return self.edit_shot(node, |shot| {
                match field {
                    ShotAttr::ShotName => {
                        shot.shot_name = value.as_text().ok_or_else(mismatch)?.to_string();
                    }
                    ShotAttr::StartFrame => {
                        shot.start_frame = number.ok_or_else(mismatch)?;
                        shot.follow_primary_range();
                    }
                    ShotAttr::EndFrame => {
                        shot.end_frame = number.ok_or_else(mismatch)?;
                        shot.follow_primary_range();
                    }
                    ShotAttr::SequenceStartFrame => {
                        let start = number.ok_or_else(mismatch)?;
                        shot.sequence_end_frame += start - shot.sequence_start_frame;
                        shot.sequence_start_frame = start;
                    }
                    ShotAttr::SequenceEndFrame => {
                        return Err(TimelineError::Rejected(format!(
                            "{node}.{attr} follows the primary range"
                        )));
                    }
                    ShotAttr::Track => {
                        let track = number.ok_or_else(mismatch)?;
                        if track < 1.0 {
                            return Err(mismatch());
                        }
                        shot.track = track as u32;
                    }
                    ShotAttr::Locked => shot.locked = value.as_bool().ok_or_else(mismatch)?,
                }
                Ok(())
            });
        }

        if let Some(curve) = self.scene.curves.get_mut(node) {
            let infinity = curve
                .infinity_mut(attr)
                .ok_or_else(|| TimelineError::NotFound(format!("{node}.{attr}")))?;
            *infinity = value
                .as_number()
                .filter(|n| n.fract() == 0.0 && (0.0..=f64::from(u8::MAX)).contains(n))
                .and_then(|n| Infinity::from_index(n as u8))
                .ok_or_else(|| TimelineError::Rejected(format!("{node}.{attr} type mismatch")))?;
            return Ok(());
        }

        let plug = format!("{node}.{attr}");
        if self.scene.attributes.get(&plug).is_some_and(|a| a.locked) {
            return Err(TimelineError::ReadOnly(format!("{plug} is locked")));
        }
        self.scene
            .attributes
            .entry(plug)
            .and_modify(|a| a.value = value.clone())
            .or_insert(AttributeState {
                value,
                locked: false,
            });
        Ok(())
    }

    fn is_attr_locked(&self, plug: &str) -> Result<bool> {
        if let Some(state) = self.scene.attributes.get(plug) {
            return Ok(state.locked);
        }
        if self.driving_curve(plug).is_some() {
            return Ok(false);
        }
        Err(TimelineError::NotFound(plug.to_string()))
    }

    fn set_attr_locked(&mut self, plug: &str, locked: bool) -> Result<()> {
        if let Some(state) = self.scene.attributes.get_mut(plug) {
            state.locked = locked;
            return Ok(());
        }
        let value = self
            .driving_curve(plug)
            .map(|c| evaluate_keys(&c.keys, self.scene.current_time).unwrap_or(0.0))
            .ok_or_else(|| TimelineError::NotFound(plug.to_string()))?;
        self.scene.attributes.insert(
            plug.to_string(),
            AttributeState {
                value: AttrValue::Number(value),
                locked,
            },
        );
        Ok(())
    }

    fn curve_output(&self, curve: &CurveId) -> Result<Option<String>> {
        Ok(self.curve_ref(curve)?.output.clone())
    }

    fn key_count(&self, curve: &CurveId) -> Result<usize> {
        Ok(self.curve_ref(curve)?.keys.len())
    }

    fn key(&self, curve: &CurveId, index: KeyIndex) -> Result<Key> {
        self.curve_ref(curve)?
            .keys
            .get(index)
            .cloned()
            .ok_or_else(|| TimelineError::NotFound(format!("key {index} on {curve}")))
    }

    fn keys(&self, curve: &CurveId) -> Result<Vec<Key>> {
        Ok(self.curve_ref(curve)?.keys.clone())
    }

    fn insert_key(&mut self, curve: &CurveId, time: f64, value: Option<f64>) -> Result<KeyIndex> {
        let node = self.editable_curve(curve)?;
        if let Some(index) = node.keys.iter().position(|k| same_time(k.time, time)) {
            if let Some(value) = value {
                node.keys[index].value = value;
            }
            return Ok(index);
        }

        let value = value
            .or_else(|| evaluate_keys(&node.keys, time))
            .unwrap_or(0.0);
        let index = node.keys.partition_point(|k| k.time < time);
        node.keys.insert(index, Key::new(time, value));

        // Auto tangent recompute of the previous boundary key.
        let count = node.keys.len();
        if count > 1 {
            let neighbour = if index == count - 1 {
                Some(index - 1)
            } else if index == 0 {
                Some(1)
            } else {
                None
            };
            if let Some(neighbour) = neighbour {
                let key = &mut node.keys[neighbour];
                key.in_tangent = TangentType::Auto;
                key.out_tangent = TangentType::Auto;
            }
        }
        Ok(index)
    }

    fn remove_key(&mut self, curve: &CurveId, index: KeyIndex) -> Result<()> {
        let node = self.editable_curve(curve)?;
        if index >= node.keys.len() {
            return Err(TimelineError::NotFound(format!("key {index} on {curve}")));
        }
        node.keys.remove(index);
        Ok(())
    }

    fn set_key_value(&mut self, curve: &CurveId, index: KeyIndex, value: f64) -> Result<()> {
        self.editable_key(curve, index)?.value = value;
        Ok(())
    }

    fn set_tangent_types(
        &mut self,
        curve: &CurveId,
        index: KeyIndex,
        in_tangent: Option<TangentType>,
        out_tangent: Option<TangentType>,
    ) -> Result<()> {
        let key = self.editable_key(curve, index)?;
        if let Some(tangent) = in_tangent {
            key.in_tangent = tangent;
        }
        if let Some(tangent) = out_tangent {
            key.out_tangent = tangent;
        }
        Ok(())
    }

    fn set_tangents_locked(&mut self, curve: &CurveId, index: KeyIndex, locked: bool) -> Result<()> {
        self.editable_key(curve, index)?.tangents_locked = locked;
        Ok(())
    }

    fn set_weights_locked(&mut self, curve: &CurveId, index: KeyIndex, locked: bool) -> Result<()> {
        self.editable_key(curve, index)?.weights_locked = locked;
        Ok(())
    }

    fn set_tangent_weight(
        &mut self,
        curve: &CurveId,
        index: KeyIndex,
        side: TangentSide,
        weight: f64,
    ) -> Result<()> {
        let key = self.editable_key(curve, index)?;
        match side {
            TangentSide::In => key.in_weight = weight,
            TangentSide::Out => key.out_weight = weight,
        }
        Ok(())
    }

    fn move_keys(&mut self, curve: &CurveId, moves: &[(KeyIndex, f64)]) -> Result<()> {
        if moves.is_empty() {
            return Ok(());
        }
        let node = self.editable_curve(curve)?;
        let mut moved = vec![false; node.keys.len()];
        for &(index, _) in moves {
            match moved.get_mut(index) {
                Some(flag) if !*flag => *flag = true,
                Some(_) => {
                    return Err(TimelineError::Rejected(format!(
                        "key {index} on {curve} moved twice"
                    )))
                }
                None => return Err(TimelineError::NotFound(format!("key {index} on {curve}"))),
            }
        }

        let mut times: Vec<f64> = node.keys.iter().map(|k| k.time).collect();
        for &(index, time) in moves {
            times[index] = time;
        }
        let mut sorted = times.clone();
        sorted.sort_by(f64::total_cmp);
        if let Some(pair) = sorted.windows(2).find(|w| same_time(w[0], w[1])) {
            return Err(TimelineError::Rejected(format!(
                "moving keys on {curve} would stack two keys at {}",
                pair[0]
            )));
        }

        for (key, time) in node.keys.iter_mut().zip(times) {
            key.time = time;
        }
        node.keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Ok(())
    }

    fn create_shot(&mut self, shot: &NewShot) -> Result<String> {
        let name = self.unique_shot_name(shot.name.as_deref());
        let node = ShotNode {
            shot_name: shot.shot_name.clone(),
            start_frame: shot.start_frame,
            end_frame: shot.end_frame,
            sequence_start_frame: shot.sequence_start_frame,
            sequence_end_frame: shot.sequence_end_frame,
            track: shot.track.max(1),
            locked: false,
            referenced: false,
        };
        if node.end_frame < node.start_frame {
            return Err(TimelineError::Rejected(format!(
                "shot {name} would end before it starts"
            )));
        }
        self.check_sequence_overlap(&name, &node)?;
        self.ensure_track(node.track);
        self.scene.shots.insert(name.clone(), node);
        self.scene.selection = vec![name.clone()];
        Ok(name)
    }

    fn set_shot_range(&mut self, shot: &str, start: f64, end: f64) -> Result<()> {
        self.edit_shot(shot, |node| {
            node.start_frame = start;
            node.end_frame = end;
            node.follow_primary_range();
            Ok(())
        })
    }

    fn track_count(&self) -> u32 {
        self.scene.tracks.len() as u32
    }

    fn track_title(&self, track: u32) -> Result<String> {
        track
            .checked_sub(1)
            .and_then(|i| self.scene.tracks.get(i as usize))
            .cloned()
            .ok_or_else(|| TimelineError::NotFound(format!("sequencer track {track}")))
    }

    fn insert_track(&mut self, track: u32, title: &str) -> Result<()> {
        if track == 0 || track > self.track_count() + 1 {
            return Err(TimelineError::NotFound(format!("sequencer track {track}")));
        }
        self.scene.tracks.insert((track - 1) as usize, title.to_string());
        for shot in self.scene.shots.values_mut() {
            if shot.track >= track {
                shot.track += 1;
            }
        }
        Ok(())
    }

    fn remove_track(&mut self, track: u32) -> Result<()> {
        if track == 0 || track > self.track_count() {
            return Err(TimelineError::NotFound(format!("sequencer track {track}")));
        }
        if self.scene.shots.values().any(|s| s.track == track) {
            return Err(TimelineError::Rejected(format!(
                "sequencer track {track} still holds shots"
            )));
        }
        self.scene.tracks.remove((track - 1) as usize);
        for shot in self.scene.shots.values_mut() {
            if shot.track > track {
                shot.track -= 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stepped_curve(host: &mut InMemoryHost) -> CurveId {
        host.add_curve(
            "ball_translateY",
            CurveKind::Linear,
            vec![
                Key::new(1.0, 0.0).with_tangents(TangentType::Step, TangentType::Step),
                Key::new(10.0, 5.0).with_tangents(TangentType::Step, TangentType::Step),
            ],
            Some("ball.translateY"),
        )
    }

    #[test]
    fn test_append_resets_previous_last_key() {
        let mut host = InMemoryHost::new();
        let curve = stepped_curve(&mut host);
        let index = host.insert_key(&curve, 20.0, None).unwrap();
        assert_eq!(index, 2);

        let keys = host.keys(&curve).unwrap();
        assert_eq!(keys[1].out_tangent, TangentType::Auto);
        assert_eq!(keys[2].value, 5.0);
    }

    #[test]
    fn test_insert_on_existing_time_keeps_key() {
        let mut host = InMemoryHost::new();
        let curve = stepped_curve(&mut host);
        assert_eq!(host.insert_key(&curve, 10.0, None).unwrap(), 1);
        assert_eq!(host.key_count(&curve).unwrap(), 2);
        assert_eq!(host.key(&curve, 1).unwrap().in_tangent, TangentType::Step);
    }

    #[test]
    fn test_move_keys_rejects_stacking() {
        let mut host = InMemoryHost::new();
        let curve = stepped_curve(&mut host);
        assert!(host.move_keys(&curve, &[(0, 10.0)]).is_err());
        host.move_keys(&curve, &[(0, 12.0)]).unwrap();
        assert_eq!(host.key_times("ball_translateY"), vec![10.0, 12.0]);
    }

    #[test]
    fn test_locked_plug_rejects_key_edits() {
        let mut host = InMemoryHost::new();
        let curve = stepped_curve(&mut host);
        host.set_attr_locked("ball.translateY", true).unwrap();
        let err = host.insert_key(&curve, 5.0, None).unwrap_err();
        assert!(matches!(err, TimelineError::ReadOnly(_)));
    }

    #[test]
    fn test_sequencer_overlap_rejected() {
        let mut host = InMemoryHost::new();
        host.add_shot("shotA", 1.0, 100.0, 1.0, 1);
        host.add_shot("shotB", 101.0, 200.0, 101.0, 1);
        let err = host
            .set_attr("shotA", "sequenceStartFrame", AttrValue::Number(50.0))
            .unwrap_err();
        assert!(matches!(err, TimelineError::Rejected(_)));
        assert_eq!(host.shot("shotA").unwrap().sequence_start_frame, 1.0);

        host.set_attr("shotA", "endFrame", AttrValue::Number(80.0)).unwrap();
        assert_eq!(host.shot("shotA").unwrap().sequence_end_frame, 80.0);
    }

    #[test]
    fn test_undo_chunk_restores_scene() {
        let mut host = InMemoryHost::new();
        let curve = stepped_curve(&mut host);
        host.open_undo_chunk("outer");
        host.open_undo_chunk("inner");
        host.insert_key(&curve, 5.0, Some(2.0)).unwrap();
        host.close_undo_chunk();
        host.remove_key(&curve, 0).unwrap();
        host.close_undo_chunk();
        assert_eq!(host.history().undo_depth(), 1);

        host.undo().unwrap();
        assert_eq!(host.key_times("ball_translateY"), vec![1.0, 10.0]);
        host.redo().unwrap();
        assert_eq!(host.key_times("ball_translateY"), vec![5.0, 10.0]);
    }

    #[test]
    fn test_scene_round_trips_through_ron() {
        let mut host = InMemoryHost::new();
        stepped_curve(&mut host);
        host.add_shot("shotA", 1.0, 100.0, 1.0, 1);
        let ron_str = ron::to_string(host.scene()).unwrap();
        let loaded: SceneData = ron::from_str(&ron_str).unwrap();
        assert_eq!(&loaded, host.scene());
    }
}
