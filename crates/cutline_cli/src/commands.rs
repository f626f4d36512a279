// SPDX-License-Identifier: MIT OR Apache-2.0
//! Edit scripts.
//!
//! A script is a RON list of [`EditCommand`]s applied in order to a scene.
//! Every command but `Undo` runs in its own undo chunk, so `Undo` reverts
//! exactly one command.
//!
//! ```ron
//! [
//!     Retime(from: (start: 10.0, end: 20.0), to: (start: 10.0, end: 30.0)),
//!     RetimeShot(shot: "shot010", start: 1.0, end: 150.0),
//!     Undo,
//! ]
//! ```

use crate::error::CliError;
use cutline_timeline::curve::editable_curve_ids;
use cutline_timeline::{
    crop_curves, delete_shot_and_animation, hold, list_shots, offset_curves, retime_curves,
    retime_shot, split_shot, trim, validate_frame_range, AnimationHost, CurveId, InMemoryHost,
    RetimeOptions, ShotId, TimeRange, Timeline, TimelineError, TimelineSettings, UndoChunk,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn yes() -> bool {
    true
}

/// A single timeline edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EditCommand {
    /// Retime the animation of `from` onto `to`
    Retime {
        /// Curve names, every editable curve when absent
        #[serde(default)]
        curves: Option<Vec<String>>,
        /// Source range
        from: TimeRange,
        /// Target range
        to: TimeRange,
        /// Key both bounds of `from` first
        #[serde(default)]
        add_boundary_keyframes: bool,
        /// Shift the animation outside `from`
        #[serde(default = "yes")]
        offset_contiguous_animation: bool,
        /// Round scaled keys to whole frames
        #[serde(default = "yes")]
        snap_keys: bool,
    },
    /// Freeze the animation at `frame` for `duration` frames
    Hold {
        /// Curve names, every editable curve when absent
        #[serde(default)]
        curves: Option<Vec<String>>,
        /// Held frame
        frame: f64,
        /// Hold length in frames
        duration: f64,
        /// Push later animation back instead of overwriting it
        #[serde(default = "yes")]
        offset_contiguous: bool,
    },
    /// Cut `(start, end)` out of the animation and close the gap
    Trim {
        /// Curve names, every editable curve when absent
        #[serde(default)]
        curves: Option<Vec<String>>,
        /// Trim start
        start: f64,
        /// Trim end
        end: f64,
    },
    /// Delete keys outside `[start, end]`, keying both bounds
    Crop {
        /// Curve names, every editable curve when absent
        #[serde(default)]
        curves: Option<Vec<String>>,
        /// Range start
        start: f64,
        /// Range end
        end: f64,
    },
    /// Move every key by `offset`
    Offset {
        /// Curve names, every editable curve when absent
        #[serde(default)]
        curves: Option<Vec<String>>,
        /// Time offset
        offset: f64,
    },
    /// Retime a shot and move its siblings
    RetimeShot {
        /// Shot name
        shot: String,
        /// New start frame
        start: f64,
        /// New end frame
        end: f64,
        /// Scale the shot's animation onto the new range
        #[serde(default = "yes")]
        scale_animation: bool,
        /// Round scaled keys to whole frames
        #[serde(default = "yes")]
        snap_keys: bool,
    },
    /// Split a shot at `frame`
    SplitShot {
        /// Shot name
        shot: String,
        /// First frame of the new shot
        frame: f64,
        /// Gap between the two halves
        #[serde(default)]
        padding: f64,
        /// New shot name, generated when absent
        #[serde(default)]
        name: Option<String>,
    },
    /// Delete a shot, optionally trimming its animation
    DeleteShot {
        /// Shot name
        shot: String,
        /// Trim the animation under the shot
        #[serde(default = "yes")]
        trim_animation: bool,
        /// Close the gap in the sequencer
        #[serde(default)]
        shift_sequencer: bool,
    },
    /// Check that `[start, end]` does not straddle shot bounds
    ValidateRange {
        /// Range start
        start: f64,
        /// Range end
        end: f64,
        /// Timeline the range is read on
        #[serde(default)]
        timeline: Timeline,
    },
    /// Revert the previous command
    Undo,
}

impl EditCommand {
    /// Short human readable description
    pub fn description(&self) -> String {
        match self {
            Self::Retime { from, to, .. } => format!(
                "Retime [{}, {}] to [{}, {}]",
                from.start, from.end, to.start, to.end
            ),
            Self::Hold { frame, duration, .. } => format!("Hold frame {frame} for {duration}"),
            Self::Trim { start, end, .. } => format!("Trim [{start}, {end}]"),
            Self::Crop { start, end, .. } => format!("Crop to [{start}, {end}]"),
            Self::Offset { offset, .. } => format!("Offset keys by {offset}"),
            Self::RetimeShot {
                shot, start, end, ..
            } => format!("Retime {shot} to [{start}, {end}]"),
            Self::SplitShot { shot, frame, .. } => format!("Split {shot} at {frame}"),
            Self::DeleteShot { shot, .. } => format!("Delete {shot}"),
            Self::ValidateRange { start, end, .. } => format!("Validate [{start}, {end}]"),
            Self::Undo => "Undo".to_string(),
        }
    }

    /// Apply the command to `host`
    pub fn execute<H: AnimationHost + ?Sized>(
        &self,
        host: &mut H,
        settings: &TimelineSettings,
    ) -> cutline_timeline::Result<()> {
        match self {
            Self::Retime {
                curves,
                from,
                to,
                add_boundary_keyframes,
                offset_contiguous_animation,
                snap_keys,
            } => {
                let from = TimeRange::new(from.start, from.end)?;
                let to = TimeRange::new(to.start, to.end)?;
                let options = RetimeOptions {
                    add_boundary_keyframes: *add_boundary_keyframes,
                    offset_contiguous_animation: *offset_contiguous_animation,
                    snap_keys: *snap_keys,
                    ..RetimeOptions::from_settings(settings)
                };
                let curves = select_curves(host, curves.as_deref())?;
                retime_curves(host, &curves, from, to, &options)
            }
            Self::Hold {
                curves,
                frame,
                duration,
                offset_contiguous,
            } => {
                let curves = select_curves(host, curves.as_deref())?;
                hold(host, &curves, *frame, *duration, *offset_contiguous)
            }
            Self::Trim { curves, start, end } => {
                let curves = select_curves(host, curves.as_deref())?;
                trim(host, &curves, *start, *end)
            }
            Self::Crop { curves, start, end } => {
                let range = TimeRange::new(*start, *end)?;
                let curves = select_curves(host, curves.as_deref())?;
                crop_curves(host, &curves, range)
            }
            Self::Offset { curves, offset } => {
                let curves = select_curves(host, curves.as_deref())?;
                offset_curves(host, &curves, *offset)
            }
            Self::RetimeShot {
                shot,
                start,
                end,
                scale_animation,
                snap_keys,
            } => retime_shot(
                host,
                settings,
                &ShotId::new(shot.as_str()),
                *start,
                *end,
                *scale_animation,
                *snap_keys,
            ),
            Self::SplitShot {
                shot,
                frame,
                padding,
                name,
            } => {
                let created = split_shot(
                    host,
                    &ShotId::new(shot.as_str()),
                    *frame,
                    *padding,
                    name.as_deref(),
                )?;
                tracing::info!("Split {shot} into {created}");
                Ok(())
            }
            Self::DeleteShot {
                shot,
                trim_animation,
                shift_sequencer,
            } => delete_shot_and_animation(
                host,
                settings,
                &ShotId::new(shot.as_str()),
                *trim_animation,
                *shift_sequencer,
            ),
            Self::ValidateRange {
                start,
                end,
                timeline,
            } => {
                let shots = list_shots(host)?;
                let range = validate_frame_range(host, &shots, *start, *end, *timeline)?;
                tracing::info!("Range [{}, {}] is valid", range.start, range.end);
                Ok(())
            }
            Self::Undo => Err(TimelineError::Rejected(
                "undo is only available between commands".to_string(),
            )),
        }
    }
}

/// Named curves, or every editable curve
fn select_curves<H: AnimationHost + ?Sized>(
    host: &H,
    names: Option<&[String]>,
) -> cutline_timeline::Result<Vec<CurveId>> {
    match names {
        Some(names) => Ok(names.iter().map(|n| CurveId::new(n.as_str())).collect()),
        None => editable_curve_ids(host),
    }
}

/// Parse a RON edit script
pub fn parse_script(source: &str, path: &Path) -> Result<Vec<EditCommand>, CliError> {
    ron::from_str(source).map_err(|source| CliError::Ron {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a RON edit script
pub fn load_script(path: &Path) -> Result<Vec<EditCommand>, CliError> {
    let source = std::fs::read_to_string(path).map_err(|e| CliError::io(path, e))?;
    parse_script(&source, path)
}

/// Apply `commands` in order, stopping at the first failure.
///
/// Returns the number of commands applied.
pub fn run_script(
    host: &mut InMemoryHost,
    commands: &[EditCommand],
    settings: &TimelineSettings,
) -> Result<usize, CliError> {
    for (position, command) in commands.iter().enumerate() {
        let description = command.description();
        tracing::info!("[{}/{}] {description}", position + 1, commands.len());
        let result = match command {
            EditCommand::Undo => host.undo(),
            _ => {
                let mut chunk = UndoChunk::open(host, &description);
                command.execute(&mut *chunk, settings)
            }
        };
        result.map_err(|source| CliError::Command {
            index: position + 1,
            description,
            source,
        })?;
    }
    Ok(commands.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutline_timeline::{CurveKind, Key};

    fn scene() -> InMemoryHost {
        let mut host = InMemoryHost::new();
        host.add_curve(
            "ball_translateY",
            CurveKind::Linear,
            vec![
                Key::new(1.0, 0.0),
                Key::new(10.0, 1.0),
                Key::new(20.0, 2.0),
                Key::new(30.0, 3.0),
            ],
            Some("ball.translateY"),
        );
        host.add_shot("shotA", 1.0, 100.0, 1.0, 1);
        host.add_shot("shotB", 101.0, 200.0, 101.0, 1);
        host
    }

    fn run(host: &mut InMemoryHost, source: &str) -> Result<usize, CliError> {
        let commands = parse_script(source, Path::new("test.ron"))?;
        run_script(host, &commands, &TimelineSettings::default())
    }

    #[test]
    fn test_parse_script_defaults() {
        let commands = parse_script(
            "[Hold(frame: 10.0, duration: 5.0), DeleteShot(shot: \"shotA\"), Undo]",
            Path::new("test.ron"),
        )
        .unwrap();
        assert_eq!(
            commands[0],
            EditCommand::Hold {
                curves: None,
                frame: 10.0,
                duration: 5.0,
                offset_contiguous: true,
            }
        );
        assert_eq!(
            commands[1],
            EditCommand::DeleteShot {
                shot: "shotA".to_string(),
                trim_animation: true,
                shift_sequencer: false,
            }
        );
        assert_eq!(commands[2].description(), "Undo");
    }

    #[test]
    fn test_parse_script_error() {
        let err = parse_script("[Explode]", Path::new("bad.ron")).unwrap_err();
        assert!(matches!(err, CliError::Ron { .. }));
    }

    #[test]
    fn test_run_retime() {
        let mut host = scene();
        let applied = run(
            &mut host,
            "[Retime(from: (start: 10.0, end: 20.0), to: (start: 10.0, end: 30.0))]",
        )
        .unwrap();
        assert_eq!(applied, 1);
        assert_eq!(host.key_times("ball_translateY"), vec![1.0, 10.0, 30.0, 40.0]);
    }

    #[test]
    fn test_undo_reverts_one_command() {
        let mut host = scene();
        run(
            &mut host,
            "[Offset(offset: 5.0), Trim(curves: Some([\"ball_translateY\"]), start: 10.0, end: 20.0), Undo]",
        )
        .unwrap();
        assert_eq!(host.key_times("ball_translateY"), vec![6.0, 15.0, 25.0, 35.0]);
    }

    #[test]
    fn test_retime_shot_command() {
        let mut host = scene();
        run(&mut host, "[RetimeShot(shot: \"shotA\", start: 1.0, end: 150.0, scale_animation: false)]")
            .unwrap();
        assert_eq!(host.shot("shotA").unwrap().end_frame, 150.0);
        assert_eq!(host.shot("shotB").unwrap().start_frame, 151.0);
    }

    #[test]
    fn test_failure_reports_command() {
        let mut host = scene();
        let err = run(
            &mut host,
            "[Offset(offset: 1.0), RetimeShot(shot: \"missing\", start: 1.0, end: 10.0)]",
        )
        .unwrap_err();
        match err {
            CliError::Command { index, source, .. } => {
                assert_eq!(index, 2);
                assert!(matches!(source, TimelineError::NotFound(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_undo_without_history_fails() {
        let mut host = scene();
        assert!(run(&mut host, "[Undo]").is_err());
    }
}
