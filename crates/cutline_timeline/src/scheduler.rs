// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shot scheduler.
//!
//! Retimes, splits and deletes shots while keeping the animation and the
//! surrounding shots consistent with the edit. The host rejects sequencer
//! overlaps on a track, so every edit orders its steps to free the space a
//! shot grows into before growing it.

use crate::curve::{editable_curve_ids, is_static};
use crate::error::{Result, TimelineError};
use crate::hold_trim::{hold, trim};
use crate::host::{AnimationHost, NewShot, SelectionGuard, ShotId, UndoChunk};
use crate::keyframe::TimeRange;
use crate::retime::{retime_curves, RetimeOptions};
use crate::settings::TimelineSettings;
use crate::shot::{
    filter_unlocked, list_shots, read_shot, set_shot_attr, shift_shots, shift_shots_in_sequencer,
    shots_in_range, siblings, Shot, ShiftFilter, ShotAttr, Timeline,
};

/// Retime every editable curve from `from` to `to` with hard boundaries
fn retime_scene_animation<H: AnimationHost + ?Sized>(
    host: &mut H,
    settings: &TimelineSettings,
    from: TimeRange,
    to: TimeRange,
    snap_keys: bool,
) -> Result<()> {
    let curves = editable_curve_ids(host)?;
    if curves.is_empty() {
        tracing::warn!("No animation curves to retime");
        return Ok(());
    }
    let options = RetimeOptions {
        add_boundary_keyframes: true,
        offset_contiguous_animation: true,
        snap_keys,
        ..RetimeOptions::from_settings(settings)
    };
    retime_curves(host, &curves, from, to, &options)
}

/// Retime a shot to `[new_start, new_end]` and move its siblings so the
/// cut stays contiguous.
///
/// With `scale_animation` the animation of the old shot range is scaled
/// onto the new one first. A failure on some curves does not stop the shot
/// edits; it is returned once the shots are in place.
pub fn retime_shot<H: AnimationHost + ?Sized>(
    host: &mut H,
    settings: &TimelineSettings,
    shot: &ShotId,
    new_start: f64,
    new_end: f64,
    scale_animation: bool,
    snap_keys: bool,
) -> Result<()> {
    let target = TimeRange::non_empty(new_start, new_end)?;
    let current = read_shot(host, shot)?;
    let mut chunk = UndoChunk::open(host, "Retime shot");
    let host = &mut *chunk;
    tracing::info!(
        "Retiming {shot} from [{}, {}] to [{new_start}, {new_end}]",
        current.start_frame,
        current.end_frame
    );

    let animation = if scale_animation {
        retime_scene_animation(host, settings, current.range(Timeline::Primary), target, snap_keys)
    } else {
        Ok(())
    };
    if matches!(animation, Err(TimelineError::InvalidRange { .. })) {
        return animation;
    }

    move_shot_edges(host, settings, &current, target)?;
    animation
}

fn move_shot_edges<H: AnimationHost + ?Sized>(
    host: &mut H,
    settings: &TimelineSettings,
    shot: &Shot,
    target: TimeRange,
) -> Result<()> {
    let id = &shot.id;
    let scope = settings.sibling_scope;
    let sequencer_start = shot.sequence_start_frame;

    let offset = target.start - shot.start_frame;
    if offset > 0.0 {
        set_shot_attr(host, id, ShotAttr::StartFrame, target.start)?;
        set_shot_attr(host, id, ShotAttr::SequenceStartFrame, sequencer_start + offset)?;
        let others = siblings(host, shot, scope)?;
        shift_shots(host, &others, offset, ShiftFilter::before(shot.start_frame))?;
        shift_shots_in_sequencer(host, &others, offset, ShiftFilter::before(sequencer_start))?;
    } else if offset < 0.0 {
        let others = siblings(host, shot, scope)?;
        shift_shots_in_sequencer(host, &others, offset, ShiftFilter::before(sequencer_start))?;
        shift_shots(host, &others, offset, ShiftFilter::before(shot.start_frame))?;
        set_shot_attr(host, id, ShotAttr::SequenceStartFrame, sequencer_start + offset)?;
        set_shot_attr(host, id, ShotAttr::StartFrame, target.start)?;
    }

    let offset = target.end - shot.end_frame;
    if offset < 0.0 {
        set_shot_attr(host, id, ShotAttr::EndFrame, target.end)?;
        let others = siblings(host, shot, scope)?;
        shift_shots_in_sequencer(host, &others, offset, ShiftFilter::after(sequencer_start))?;
        shift_shots(host, &others, offset, ShiftFilter::after(shot.end_frame))?;
    } else if offset > 0.0 {
        let others = siblings(host, shot, scope)?;
        shift_shots_in_sequencer(host, &others, offset, ShiftFilter::after(sequencer_start))?;
        shift_shots(host, &others, offset, ShiftFilter::after(shot.end_frame))?;
        set_shot_attr(host, id, ShotAttr::EndFrame, target.end)?;
    }
    Ok(())
}

/// Retime the animation of `[start, end]` onto `[new_start, new_end]` and
/// grow or shrink the single shot holding that range to match.
///
/// Fails with `NotFound` when no unlocked shot covers the range and with
/// `AmbiguousOverlap` when several do. Returns the retimed shot.
pub fn retime_animation_in_shot_range<H: AnimationHost + ?Sized>(
    host: &mut H,
    settings: &TimelineSettings,
    from: TimeRange,
    to: TimeRange,
    snap_keys: bool,
) -> Result<ShotId> {
    let shots = filter_unlocked(shots_in_range(
        &list_shots(host)?,
        from.start,
        from.end,
        Timeline::Primary,
    ));
    let shot = match shots.as_slice() {
        [] => {
            return Err(TimelineError::NotFound(format!(
                "no unlocked shot in [{}, {}]",
                from.start, from.end
            )))
        }
        [shot] => shot.clone(),
        _ => {
            return Err(TimelineError::AmbiguousOverlap {
                shots: shots.iter().map(|s| s.id.to_string()).collect(),
                start: from.start,
                end: from.end,
            })
        }
    };

    let mut chunk = UndoChunk::open(host, "Retime animation in shot");
    let host = &mut *chunk;
    let animation = retime_scene_animation(host, settings, from, to, snap_keys);
    if matches!(animation, Err(TimelineError::InvalidRange { .. })) {
        return animation.map(|()| shot.id);
    }

    let new_start = shot.start_frame + to.start - from.start;
    let new_end = shot.end_frame + to.end - from.end;
    retime_shot(host, settings, &shot.id, new_start, new_end, false, snap_keys)?;
    animation.map(|()| shot.id)
}

/// Split a shot at `frame`.
///
/// The shot now ends at `frame - 1` and a new shot, carrying the same
/// editorial name and the rest of the sequencer range, starts at
/// `frame + 1`. With `padding` the pose at `frame` is held for `padding`
/// frames and every later unlocked shot moves by `padding`. The host
/// selection is left as it was. Returns the new shot.
pub fn split_shot<H: AnimationHost + ?Sized>(
    host: &mut H,
    shot: &ShotId,
    frame: f64,
    padding: f64,
    name: Option<&str>,
) -> Result<ShotId> {
    let current = read_shot(host, shot)?;
    if !(current.start_frame < frame && frame < current.end_frame) {
        return Err(TimelineError::invalid_range(
            current.start_frame,
            current.end_frame,
            format!("split frame {frame} is not inside {shot}"),
        ));
    }

    let mut chunk = UndoChunk::open(host, "Split shot");
    let host = &mut *chunk;
    set_shot_attr(host, shot, ShotAttr::EndFrame, frame - 1.0)?;
    let shrunk = read_shot(host, shot)?;

    let created = {
        let mut host = SelectionGuard::save(&mut *host);
        host.create_shot(&NewShot {
            name: name.map(str::to_string),
            shot_name: current.shot_name.clone(),
            start_frame: frame + 1.0,
            end_frame: current.end_frame + 1.0,
            sequence_start_frame: shrunk.sequence_end_frame + 1.0,
            sequence_end_frame: current.sequence_end_frame,
            track: current.track,
        })?
    };
    let created = ShotId(created);
    tracing::info!("Split {shot} at frame {frame} into {created}");

    if padding <= 0.0 {
        return Ok(created);
    }
    let curves = editable_curve_ids(host)?;
    let animation = if curves.is_empty() {
        Ok(())
    } else {
        hold(host, &curves, frame, padding, true)
    };
    let shots = filter_unlocked(list_shots(host)?);
    shift_shots(host, &shots, padding, ShiftFilter::after(frame))?;
    animation.map(|()| created)
}

/// Make `[start, end]` free of shots on `timeline`.
///
/// A start inside a shot moves to the frame after that shot. Shots whose
/// head still overlaps the range are pushed later by the smallest offset
/// that clears it; on the primary timeline the animation is held across
/// the inserted gap. Returns the free range.
pub fn validate_frame_range<H: AnimationHost + ?Sized>(
    host: &mut H,
    shots: &[Shot],
    start: f64,
    end: f64,
    timeline: Timeline,
) -> Result<TimeRange> {
    let length = TimeRange::new(start, end)?.duration();

    let start = shots
        .iter()
        .map(|s| s.range(timeline))
        .find(|r| r.start <= start && start <= r.end)
        .map_or(start, |r| r.end + 1.0);
    let free = TimeRange {
        start,
        end: start + length,
    };

    let overlapping = shots_in_range(shots, free.start, free.end, timeline);
    let Some(offset) = overlapping
        .iter()
        .map(|s| free.end - s.range(timeline).start + 1.0)
        .reduce(f64::max)
    else {
        return Ok(free);
    };
    tracing::info!(
        "Pushing {} shots by {offset} to free [{}, {}]",
        overlapping.len(),
        free.start,
        free.end
    );

    let mut chunk = UndoChunk::open(host, "Free frame range");
    let host = &mut *chunk;
    let pivot = free.end - offset;
    match timeline {
        Timeline::Sequencer => {
            shift_shots_in_sequencer(host, shots, offset, ShiftFilter::after(pivot))?;
        }
        Timeline::Primary => {
            shift_shots(host, shots, offset, ShiftFilter::after(pivot))?;
            let curves = editable_curve_ids(host)?;
            if !curves.is_empty() {
                hold(host, &curves, pivot, offset, true)?;
            }
        }
    }
    Ok(free)
}

/// Delete a shot, optionally cutting its animation out and closing the gaps.
///
/// Trimming is skipped with a warning when another unlocked shot shares the
/// deleted shot's timeline range. Remaining shots move back by the shot
/// length on the timeline when its animation is trimmed, and in the
/// sequencer when `shift_sequencer` is set.
pub fn delete_shot_and_animation<H: AnimationHost + ?Sized>(
    host: &mut H,
    settings: &TimelineSettings,
    shot: &ShotId,
    trim_animation: bool,
    shift_sequencer: bool,
) -> Result<()> {
    let current = read_shot(host, shot)?;
    let (start, end) = (current.start_frame, current.end_frame);

    let mut trim_animation = trim_animation;
    let overlapping = filter_unlocked(shots_in_range(&list_shots(host)?, start, end, Timeline::Primary));
    if trim_animation && overlapping.len() > 1 {
        let names: Vec<&str> = overlapping.iter().map(|s| s.id.as_str()).collect();
        tracing::warn!(
            "Shots {names:?} share the range [{start}, {end}], animation of {shot} is left untrimmed"
        );
        trim_animation = false;
    }

    let others = siblings(host, &current, settings.sibling_scope)?;
    let mut chunk = UndoChunk::open(host, "Delete shot");
    let host = &mut *chunk;
    host.delete_node(shot.as_str())?;
    tracing::info!("Deleted {shot}");

    let mut animation = Ok(());
    if trim_animation {
        let mut curves = Vec::new();
        for curve in editable_curve_ids(host)? {
            if !is_static(host, &curve)? {
                curves.push(curve);
            }
        }
        animation = trim(host, &curves, start, end);
    }

    let offset = -(end - start + 1.0);
    if shift_sequencer {
        shift_shots_in_sequencer(host, &others, offset, ShiftFilter::after(current.sequence_start_frame))?;
    }
    if trim_animation {
        shift_shots(host, &others, offset, ShiftFilter::after(end))?;
    }
    animation
}
