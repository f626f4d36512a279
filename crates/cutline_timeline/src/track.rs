// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sequencer track helpers.
//!
//! Tracks are 1-based, as the host numbers them.

use crate::error::Result;
use crate::host::{AnimationHost, AttrValue, UndoChunk};
use crate::keyframe::TimeRange;
use crate::shot::{list_shots, Shot, ShotAttr, Timeline};

/// Shots on a sequencer track
pub fn list_track_shots<H: AnimationHost + ?Sized>(host: &H, track: u32) -> Result<Vec<Shot>> {
    Ok(list_shots(host)?
        .into_iter()
        .filter(|s| s.track == track)
        .collect())
}

/// Shots grouped by track, index 0 holding track 1
pub fn shots_by_track<H: AnimationHost + ?Sized>(host: &H) -> Result<Vec<Vec<Shot>>> {
    let mut tracks = vec![Vec::new(); host.track_count() as usize];
    for shot in list_shots(host)? {
        let index = shot.track.saturating_sub(1) as usize;
        if index >= tracks.len() {
            tracks.resize(index + 1, Vec::new());
        }
        tracks[index].push(shot);
    }
    Ok(tracks)
}

/// First track with no shot touching `[start, end]` in sequencer time
pub fn find_track_with_free_range<H: AnimationHost + ?Sized>(
    host: &H,
    start: f64,
    end: f64,
) -> Result<Option<u32>> {
    let range = TimeRange::new(start, end)?;
    Ok(shots_by_track(host)?
        .iter()
        .position(|shots| {
            shots
                .iter()
                .all(|s| !s.range(Timeline::Sequencer).overlaps(&range))
        })
        .map(|index| index as u32 + 1))
}

/// Titles of every track, in track order
pub fn track_titles<H: AnimationHost + ?Sized>(host: &H) -> Result<Vec<String>> {
    (1..=host.track_count())
        .map(|track| host.track_title(track))
        .collect()
}

/// Tracks holding at least one shot, ascending
pub fn used_track_indexes<H: AnimationHost + ?Sized>(host: &H) -> Result<Vec<u32>> {
    let mut used: Vec<u32> = list_shots(host)?.iter().map(|s| s.track).collect();
    used.sort_unstable();
    used.dedup();
    Ok(used)
}

/// Remove every track without shots. Returns the removed indexes, highest first.
pub fn remove_unused_tracks<H: AnimationHost + ?Sized>(host: &mut H) -> Result<Vec<u32>> {
    let used = used_track_indexes(host)?;
    let mut host = UndoChunk::open(host, "Remove unused tracks");
    let mut removed = Vec::new();
    for track in (1..=host.track_count()).rev() {
        if used.contains(&track) {
            continue;
        }
        host.remove_track(track)?;
        removed.push(track);
    }
    tracing::debug!("Removed {} unused sequencer tracks", removed.len());
    Ok(removed)
}

/// Append a track after the last one. Returns its index.
pub fn append_track<H: AnimationHost + ?Sized>(host: &mut H, title: &str) -> Result<u32> {
    let track = host.track_count() + 1;
    host.insert_track(track, title)?;
    Ok(track)
}

/// Lowest track titled `title`
pub fn find_track_index<H: AnimationHost + ?Sized>(host: &H, title: &str) -> Result<Option<u32>> {
    for track in 1..=host.track_count() {
        if host.track_title(track)? == title {
            return Ok(Some(track));
        }
    }
    Ok(None)
}

/// Tracks whose title satisfies `matches`, highest first so they can be
/// removed in order
pub fn tracks_matching<H: AnimationHost + ?Sized>(
    host: &H,
    matches: impl Fn(&str) -> bool,
) -> Result<Vec<u32>> {
    let mut tracks = Vec::new();
    for track in (1..=host.track_count()).rev() {
        if matches(&host.track_title(track)?) {
            tracks.push(track);
        }
    }
    Ok(tracks)
}

/// Delete every shot of a track, locked ones included, then the track
pub fn clear_track<H: AnimationHost + ?Sized>(host: &mut H, track: u32) -> Result<()> {
    let shots = list_track_shots(host, track)?;
    let mut host = UndoChunk::open(host, "Clear track");
    for shot in &shots {
        if shot.locked {
            host.set_attr(shot.id.as_str(), ShotAttr::Locked.name(), AttrValue::Bool(false))?;
        }
        host.delete_node(shot.id.as_str())?;
    }
    host.remove_track(track)?;
    tracing::info!("Cleared sequencer track {track} ({} shots)", shots.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryHost;

    fn tracks() -> InMemoryHost {
        let mut host = InMemoryHost::new();
        host.add_shot("shotA", 1.0, 100.0, 1.0, 1);
        host.add_shot("shotB", 101.0, 200.0, 101.0, 1);
        host.add_shot("layout", 1.0, 50.0, 1.0, 3);
        host
    }

    #[test]
    fn test_track_listing() {
        let host = tracks();
        assert_eq!(host.track_count(), 3);
        assert_eq!(list_track_shots(&host, 1).unwrap().len(), 2);
        assert_eq!(used_track_indexes(&host).unwrap(), vec![1, 3]);
        let grouped = shots_by_track(&host).unwrap();
        assert_eq!(grouped.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 0, 1]);
    }

    #[test]
    fn test_find_track_with_free_range() {
        let host = tracks();
        assert_eq!(find_track_with_free_range(&host, 20.0, 30.0).unwrap(), Some(2));
        assert_eq!(find_track_with_free_range(&host, 60.0, 70.0).unwrap(), Some(2));
        assert_eq!(find_track_with_free_range(&host, 300.0, 400.0).unwrap(), Some(1));
    }

    #[test]
    fn test_titles_and_lookup() {
        let mut host = tracks();
        let index = append_track(&mut host, "previz_v002").unwrap();
        assert_eq!(index, 4);
        assert_eq!(find_track_index(&host, "previz_v002").unwrap(), Some(4));
        assert_eq!(find_track_index(&host, "missing").unwrap(), None);
        assert_eq!(tracks_matching(&host, |t| t.starts_with("previz")).unwrap(), vec![4]);
        assert_eq!(track_titles(&host).unwrap().len(), 4);
    }

    #[test]
    fn test_remove_unused_tracks() {
        let mut host = tracks();
        append_track(&mut host, "empty").unwrap();
        assert_eq!(remove_unused_tracks(&mut host).unwrap(), vec![4, 2]);
        assert_eq!(host.track_count(), 2);
        // Track 3 was renumbered.
        assert_eq!(host.shot("layout").unwrap().track, 2);
    }

    #[test]
    fn test_clear_track() {
        let mut host = tracks();
        host.set_attr("layout", "locked", AttrValue::Bool(true)).unwrap();
        clear_track(&mut host, 3).unwrap();
        assert!(host.shot("layout").is_none());
        assert_eq!(host.track_count(), 2);
    }
}
