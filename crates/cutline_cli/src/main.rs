// SPDX-License-Identifier: MIT OR Apache-2.0
//! `cutline` - apply timeline edit scripts to scene files
//!
//! Loads a scene, runs a RON edit script against it and writes the result:
//! - Curve retime, hold, trim, crop and offset
//! - Shot retime, split and delete
//! - Undo between commands
//!
//! ## Architecture
//!
//! The scene is loaded into an in-memory host and every command goes
//! through `cutline_timeline`. Nothing is written when a command fails.

mod commands;
mod error;
mod scene;

use clap::Parser;
use cutline_timeline::settings::SETTINGS_FILE_NAME;
use cutline_timeline::{InMemoryHost, TimelineSettings};
use error::CliError;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Parser)]
#[command(name = "cutline")]
#[command(about = "Retime animation and shots in a scene file")]
#[command(version)]
struct Cli {
    /// Scene file (`.ron` or `.json`)
    scene: PathBuf,

    /// RON edit script
    script: PathBuf,

    /// Where to write the edited scene, the input scene by default
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Timeline settings, `cutline.ron` next to the scene by default
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Run the script without writing anything
    #[arg(long)]
    dry_run: bool,
}

fn init_logging() -> Result<(), CliError> {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("cutline_cli=info".parse()?)
        .add_directive("cutline_timeline=info".parse()?);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    Ok(())
}

fn load_settings(cli: &Cli) -> Result<TimelineSettings, CliError> {
    if let Some(path) = &cli.settings {
        return Ok(TimelineSettings::load(path)?);
    }
    let default = cli
        .scene
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(SETTINGS_FILE_NAME);
    if default.is_file() {
        return Ok(TimelineSettings::load(&default)?);
    }
    Ok(TimelineSettings::default())
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let settings = load_settings(cli)?;
    let commands = commands::load_script(&cli.script)?;
    let mut host = InMemoryHost::from_scene(scene::load_scene(&cli.scene)?);

    let applied = commands::run_script(&mut host, &commands, &settings)?;
    tracing::info!("Applied {applied} commands");

    if cli.dry_run {
        tracing::info!("Dry run, scene left untouched");
        return Ok(());
    }
    let output = cli.output.as_deref().unwrap_or(&cli.scene);
    scene::save_scene(output, host.scene())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging() {
        eprintln!("cutline: {e}");
        std::process::exit(1);
    }
    tracing::info!("Starting cutline v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&cli) {
        tracing::error!("Edit failed: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutline_timeline::{CurveKind, Key, SceneData};

    fn write_scene(dir: &Path) -> PathBuf {
        let mut host = InMemoryHost::new();
        host.add_curve(
            "cam_focal",
            CurveKind::Unitless,
            vec![Key::new(1.0, 35.0), Key::new(50.0, 50.0)],
            Some("cam.focalLength"),
        );
        host.add_shot("shot010", 1.0, 50.0, 1.0, 1);
        let path = dir.join("scene.json");
        scene::save_scene(&path, &host.into_scene()).unwrap();
        path
    }

    fn cli(scene: PathBuf, script: PathBuf, output: PathBuf) -> Cli {
        Cli {
            scene,
            script,
            output: Some(output),
            settings: None,
            dry_run: false,
        }
    }

    #[test]
    fn test_cli_arguments() {
        let cli = Cli::try_parse_from(["cutline", "a.ron", "edit.ron", "-o", "b.json", "--dry-run"])
            .unwrap();
        assert_eq!(cli.scene, PathBuf::from("a.ron"));
        assert_eq!(cli.output, Some(PathBuf::from("b.json")));
        assert!(cli.dry_run);
        assert!(cli.settings.is_none());
    }

    #[test]
    fn test_run_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let scene_path = write_scene(dir.path());
        let script = dir.path().join("edit.ron");
        std::fs::write(&script, "[Offset(offset: 10.0)]").unwrap();
        let output = dir.path().join("out.ron");

        run(&cli(scene_path, script, output.clone())).unwrap();

        let host = InMemoryHost::from_scene(scene::load_scene(&output).unwrap());
        assert_eq!(host.key_times("cam_focal"), vec![11.0, 60.0]);
    }

    #[test]
    fn test_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let scene_path = write_scene(dir.path());
        let script = dir.path().join("edit.ron");
        std::fs::write(
            &script,
            "[Offset(offset: 10.0), SplitShot(shot: \"shot010\", frame: 500.0)]",
        )
        .unwrap();
        let output = dir.path().join("out.json");

        assert!(run(&cli(scene_path, script, output.clone())).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_settings_next_to_scene() {
        let dir = tempfile::tempdir().unwrap();
        let scene_path = write_scene(dir.path());
        let settings = TimelineSettings {
            snap_rounding: cutline_timeline::SnapRounding::HalfEven,
            ..TimelineSettings::default()
        };
        settings.save(&dir.path().join(SETTINGS_FILE_NAME)).unwrap();

        let cli = cli(scene_path, dir.path().join("edit.ron"), dir.path().join("out.ron"));
        assert_eq!(load_settings(&cli).unwrap(), settings);
    }

    #[test]
    fn test_dry_run_leaves_scene() {
        let dir = tempfile::tempdir().unwrap();
        let scene_path = write_scene(dir.path());
        let before: SceneData = scene::load_scene(&scene_path).unwrap();
        let script = dir.path().join("edit.ron");
        std::fs::write(&script, "[Offset(offset: 10.0)]").unwrap();

        let mut cli = cli(scene_path.clone(), script, scene_path.clone());
        cli.dry_run = true;
        run(&cli).unwrap();
        assert_eq!(scene::load_scene(&scene_path).unwrap(), before);
    }
}
