// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shot definitions and shot shifting primitives.
//!
//! A shot occupies a range of the primary timeline and a range of one
//! sequencer track. Locked shots never move: every shift in this module
//! skips them.

use crate::error::{Result, TimelineError};
use crate::host::{AnimationHost, AttrValue, ShotId};
use crate::keyframe::TimeRange;
use crate::settings::SiblingScope;
use serde::{Deserialize, Serialize};

/// Host node type of shots
pub const SHOT_NODE_TYPE: &str = "shot";

/// Shot attributes exposed by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShotAttr {
    /// Editorial name
    ShotName,
    /// Primary timeline start
    StartFrame,
    /// Primary timeline end
    EndFrame,
    /// Sequencer start
    SequenceStartFrame,
    /// Sequencer end
    SequenceEndFrame,
    /// Sequencer track, 1-based
    Track,
    /// Lock flag
    Locked,
}

impl ShotAttr {
    /// Host attribute name
    pub fn name(&self) -> &'static str {
        match self {
            Self::ShotName => "shotName",
            Self::StartFrame => "startFrame",
            Self::EndFrame => "endFrame",
            Self::SequenceStartFrame => "sequenceStartFrame",
            Self::SequenceEndFrame => "sequenceEndFrame",
            Self::Track => "track",
            Self::Locked => "locked",
        }
    }

    /// Resolve a host attribute name
    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::ShotName,
            Self::StartFrame,
            Self::EndFrame,
            Self::SequenceStartFrame,
            Self::SequenceEndFrame,
            Self::Track,
            Self::Locked,
        ]
        .into_iter()
        .find(|attr| attr.name() == name)
    }
}

/// Which timeline a shot range is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Timeline {
    /// The animation timeline
    #[default]
    Primary,
    /// The camera sequencer timeline
    Sequencer,
}

/// Snapshot of a shot's attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    /// Host node name
    pub id: ShotId,
    /// Editorial name
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
    /// Locked shots are never shifted
    pub locked: bool,
}

impl Shot {
    /// Range on the requested timeline
    pub fn range(&self, timeline: Timeline) -> TimeRange {
        match timeline {
            Timeline::Primary => TimeRange {
                start: self.start_frame,
                end: self.end_frame,
            },
            Timeline::Sequencer => TimeRange {
                start: self.sequence_start_frame,
                end: self.sequence_end_frame,
            },
        }
    }
}

fn number_attr<H: AnimationHost + ?Sized>(host: &H, shot: &ShotId, attr: ShotAttr) -> Result<f64> {
    host.get_attr(shot.as_str(), attr.name())?
        .as_number()
        .ok_or_else(|| TimelineError::Rejected(format!("{shot}.{} is not numeric", attr.name())))
}

/// Read a shot from the host
pub fn read_shot<H: AnimationHost + ?Sized>(host: &H, shot: &ShotId) -> Result<Shot> {
    if host.node_type(shot.as_str())? != SHOT_NODE_TYPE {
        return Err(TimelineError::NotFound(format!("{shot} is not a shot")));
    }
    let shot_name = host
        .get_attr(shot.as_str(), ShotAttr::ShotName.name())?
        .as_text()
        .unwrap_or_default()
        .to_string();
    let locked = host
        .get_attr(shot.as_str(), ShotAttr::Locked.name())?
        .as_bool()
        .unwrap_or(false);
    Ok(Shot {
        id: shot.clone(),
        shot_name,
        start_frame: number_attr(host, shot, ShotAttr::StartFrame)?,
        end_frame: number_attr(host, shot, ShotAttr::EndFrame)?,
        sequence_start_frame: number_attr(host, shot, ShotAttr::SequenceStartFrame)?,
        sequence_end_frame: number_attr(host, shot, ShotAttr::SequenceEndFrame)?,
        track: number_attr(host, shot, ShotAttr::Track)? as u32,
        locked,
    })
}

/// Every shot in the scene, in host order
pub fn list_shots<H: AnimationHost + ?Sized>(host: &H) -> Result<Vec<Shot>> {
    host.list_nodes(SHOT_NODE_TYPE)
        .into_iter()
        .map(|name| read_shot(host, &ShotId(name)))
        .collect()
}

/// Set one numeric shot attribute
pub fn set_shot_attr<H: AnimationHost + ?Sized>(
    host: &mut H,
    shot: &ShotId,
    attr: ShotAttr,
    value: f64,
) -> Result<()> {
    host.set_attr(shot.as_str(), attr.name(), AttrValue::Number(value))
}

/// Drop locked shots
pub fn filter_unlocked(shots: Vec<Shot>) -> Vec<Shot> {
    shots.into_iter().filter(|s| !s.locked).collect()
}

/// Time filter applied before a shift
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShiftFilter {
    /// Keep shots whose start is before this time
    pub before: Option<f64>,
    /// Keep shots past this time
    pub after: Option<f64>,
}

impl ShiftFilter {
    /// Shift everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Shift shots starting before `time`
    pub fn before(time: f64) -> Self {
        Self {
            before: Some(time),
            after: None,
        }
    }

    /// Shift shots past `time`
    pub fn after(time: f64) -> Self {
        Self {
            before: None,
            after: Some(time),
        }
    }
}

/// Order shots so that a shift by `offset` never walks a shot over its
/// still unmoved neighbour: furthest first when moving later
fn shift_order(mut shots: Vec<Shot>, offset: f64, timeline: Timeline) -> Vec<Shot> {
    shots.sort_by(|a, b| a.range(timeline).start.total_cmp(&b.range(timeline).start));
    if offset > 0.0 {
        shots.reverse();
    }
    shots
}

/// Shift shots on the primary timeline by `offset`.
///
/// `before` keeps shots starting before the time, `after` keeps shots
/// ending after it. Locked shots are skipped. Returns the moved shots.
pub fn shift_shots<H: AnimationHost + ?Sized>(
    host: &mut H,
    shots: &[Shot],
    offset: f64,
    filter: ShiftFilter,
) -> Result<Vec<ShotId>> {
    if offset == 0.0 {
        return Ok(Vec::new());
    }
    let selected: Vec<Shot> = shots
        .iter()
        .filter(|s| !s.locked)
        .filter(|s| filter.before.map_or(true, |t| s.start_frame < t))
        .filter(|s| filter.after.map_or(true, |t| s.end_frame > t))
        .cloned()
        .collect();

    let mut moved = Vec::with_capacity(selected.len());
    for shot in shift_order(selected, offset, Timeline::Primary) {
        // Re-read so that earlier edits in this operation are honoured.
        let current = read_shot(host, &shot.id)?;
        host.set_shot_range(
            shot.id.as_str(),
            current.start_frame + offset,
            current.end_frame + offset,
        )?;
        tracing::debug!("Shifted {} by {offset} on the timeline", shot.id);
        moved.push(shot.id);
    }
    Ok(moved)
}

/// Shift shots on the sequencer timeline by `offset`.
///
/// Both filters compare against the sequencer start. Locked shots are
/// skipped. Returns the moved shots.
pub fn shift_shots_in_sequencer<H: AnimationHost + ?Sized>(
    host: &mut H,
    shots: &[Shot],
    offset: f64,
    filter: ShiftFilter,
) -> Result<Vec<ShotId>> {
    if offset == 0.0 {
        return Ok(Vec::new());
    }
    let selected: Vec<Shot> = shots
        .iter()
        .filter(|s| !s.locked)
        .filter(|s| filter.before.map_or(true, |t| s.sequence_start_frame < t))
        .filter(|s| filter.after.map_or(true, |t| s.sequence_start_frame > t))
        .cloned()
        .collect();

    let mut moved = Vec::with_capacity(selected.len());
    for shot in shift_order(selected, offset, Timeline::Sequencer) {
        let start = number_attr(host, &shot.id, ShotAttr::SequenceStartFrame)?;
        set_shot_attr(host, &shot.id, ShotAttr::SequenceStartFrame, start + offset)?;
        tracing::debug!("Shifted {} by {offset} in the sequencer", shot.id);
        moved.push(shot.id);
    }
    Ok(moved)
}

/// Shots whose range strictly contains `time`; the host current time is
/// used when `time` is `None`
pub fn shots_at_time<H: AnimationHost + ?Sized>(
    host: &H,
    shots: &[Shot],
    time: Option<f64>,
    timeline: Timeline,
) -> Vec<Shot> {
    let time = time.unwrap_or_else(|| host.current_time());
    shots
        .iter()
        .filter(|s| {
            let range = s.range(timeline);
            range.start < time && time < range.end
        })
        .cloned()
        .collect()
}

/// Shots strictly containing any whole frame of `[start, end)`, in input order
pub fn shots_in_range(shots: &[Shot], start: f64, end: f64, timeline: Timeline) -> Vec<Shot> {
    let first = start.trunc();
    let last = end.trunc() - 1.0;
    shots
        .iter()
        .filter(|s| {
            let range = s.range(timeline);
            // Whole frames strictly inside the shot: floor(start) + 1 to ceil(end) - 1
            let low = first.max(range.start.floor() + 1.0);
            let high = last.min(range.end.ceil() - 1.0);
            low <= high
        })
        .cloned()
        .collect()
}

/// Other shots that move along with `shot`, locked ones excluded
pub fn siblings<H: AnimationHost + ?Sized>(
    host: &H,
    shot: &Shot,
    scope: SiblingScope,
) -> Result<Vec<Shot>> {
    let shots = list_shots(host)?
        .into_iter()
        .filter(|s| s.id != shot.id)
        .filter(|s| match scope {
            SiblingScope::Track => s.track == shot.track,
            SiblingScope::Sequencer => true,
        })
        .collect();
    Ok(filter_unlocked(shots))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostContext;
    use crate::memory::InMemoryHost;

    fn three_shots() -> InMemoryHost {
        let mut host = InMemoryHost::new();
        host.add_shot("shotA", 1.0, 100.0, 1.0, 1);
        host.add_shot("shotB", 101.0, 200.0, 101.0, 1);
        host.add_shot("shotC", 201.0, 300.0, 201.0, 1);
        host
    }

    #[test]
    fn test_read_shot() {
        let host = three_shots();
        let shot = read_shot(&host, &ShotId::new("shotB")).unwrap();
        assert_eq!(shot.start_frame, 101.0);
        assert_eq!(shot.sequence_end_frame, 200.0);
        assert_eq!(shot.track, 1);
        assert!(!shot.locked);
        assert!(read_shot(&host, &ShotId::new("missing")).is_err());
    }

    #[test]
    fn test_shift_in_sequencer_moves_furthest_first() {
        let mut host = three_shots();
        let shots = list_shots(&host).unwrap();
        // Shifting B before C would collide on the track.
        let moved =
            shift_shots_in_sequencer(&mut host, &shots, 50.0, ShiftFilter::after(1.0)).unwrap();
        assert_eq!(moved, vec![ShotId::new("shotC"), ShotId::new("shotB")]);
        assert_eq!(host.shot("shotB").unwrap().sequence_start_frame, 151.0);
        assert_eq!(host.shot("shotC").unwrap().sequence_end_frame, 350.0);
    }

    #[test]
    fn test_shift_skips_locked_shots() {
        let mut host = three_shots();
        host.set_attr("shotC", "locked", AttrValue::Bool(true)).unwrap();
        let shots = list_shots(&host).unwrap();
        let moved = shift_shots(&mut host, &shots, 10.0, ShiftFilter::after(100.0)).unwrap();
        assert_eq!(moved, vec![ShotId::new("shotB")]);
        assert_eq!(host.shot("shotC").unwrap().start_frame, 201.0);
        assert_eq!(host.shot("shotB").unwrap().start_frame, 111.0);
    }

    #[test]
    fn test_shots_in_range() {
        let host = three_shots();
        let shots = list_shots(&host).unwrap();
        let found = shots_in_range(&shots, 90.0, 110.0, Timeline::Primary);
        let names: Vec<_> = found.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(names, vec!["shotA", "shotB"]);
        assert!(shots_in_range(&shots, 100.0, 101.0, Timeline::Primary).is_empty());
    }

    #[test]
    fn test_shots_in_huge_range() {
        let mut host = three_shots();
        host.add_shot("tiny", 10.0, 11.0, 10.0, 2);
        host.add_shot("offbeat", 400.5, 401.5, 400.5, 2);
        let shots = list_shots(&host).unwrap();

        let found = shots_in_range(&shots, 0.0, 1e12, Timeline::Primary);
        let names: Vec<_> = found.iter().map(|s| s.id.as_str()).collect();
        // No whole frame lies strictly inside [10, 11].
        assert_eq!(names, vec!["shotA", "shotB", "shotC", "offbeat"]);

        let found = shots_in_range(&shots, 401.0, 402.0, Timeline::Primary);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_str(), "offbeat");
    }

    #[test]
    fn test_shots_at_current_time() {
        let mut host = three_shots();
        host.set_current_time(150.0);
        let shots = list_shots(&host).unwrap();
        let found = shots_at_time(&host, &shots, None, Timeline::Primary);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_str(), "shotB");
    }

    #[test]
    fn test_siblings_by_scope() {
        let mut host = three_shots();
        host.add_shot("alt", 1.0, 50.0, 1.0, 2);
        let shot = read_shot(&host, &ShotId::new("shotA")).unwrap();
        assert_eq!(siblings(&host, &shot, SiblingScope::Track).unwrap().len(), 2);
        assert_eq!(siblings(&host, &shot, SiblingScope::Sequencer).unwrap().len(), 3);
    }
}
