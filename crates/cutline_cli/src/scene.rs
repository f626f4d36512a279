// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene files.
//!
//! Scenes are [`SceneData`] stored as pretty RON or as JSON, picked by the
//! file extension.

use crate::error::CliError;
use cutline_timeline::SceneData;
use std::path::Path;

/// On-disk scene encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneFormat {
    /// `.ron`
    Ron,
    /// `.json`
    Json,
}

impl SceneFormat {
    /// Pick the format from the file extension
    pub fn from_path(path: &Path) -> Result<Self, CliError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("ron") => Ok(Self::Ron),
            Some("json") => Ok(Self::Json),
            _ => Err(CliError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Load a scene file
pub fn load_scene(path: &Path) -> Result<SceneData, CliError> {
    let format = SceneFormat::from_path(path)?;
    let source = std::fs::read_to_string(path).map_err(|e| CliError::io(path, e))?;
    let scene = match format {
        SceneFormat::Ron => ron::from_str(&source).map_err(|source| CliError::Ron {
            path: path.to_path_buf(),
            source,
        })?,
        SceneFormat::Json => serde_json::from_str(&source)?,
    };
    tracing::info!("Loaded scene from {:?}", path);
    Ok(scene)
}

/// Save a scene file
pub fn save_scene(path: &Path, scene: &SceneData) -> Result<(), CliError> {
    let content = match SceneFormat::from_path(path)? {
        SceneFormat::Ron => ron::ser::to_string_pretty(scene, ron::ser::PrettyConfig::default())?,
        SceneFormat::Json => serde_json::to_string_pretty(scene)?,
    };
    std::fs::write(path, content).map_err(|e| CliError::io(path, e))?;
    tracing::info!("Saved scene to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutline_timeline::{CurveKind, InMemoryHost, Key};

    fn scene() -> SceneData {
        let mut host = InMemoryHost::new();
        host.add_curve(
            "ball_translateY",
            CurveKind::Linear,
            vec![Key::new(1.0, 0.0), Key::new(24.0, 3.5)],
            Some("ball.translateY"),
        );
        host.add_shot("shot010", 1.0, 24.0, 1.0, 1);
        host.into_scene()
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SceneFormat::from_path(Path::new("a.ron")).unwrap(), SceneFormat::Ron);
        assert_eq!(SceneFormat::from_path(Path::new("a.JSON")).unwrap(), SceneFormat::Json);
        assert!(matches!(
            SceneFormat::from_path(Path::new("a.ma")),
            Err(CliError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_scene_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let scene = scene();
        for name in ["scene.ron", "scene.json"] {
            let path = dir.path().join(name);
            save_scene(&path, &scene).unwrap();
            assert_eq!(load_scene(&path).unwrap(), scene);
        }
    }

    #[test]
    fn test_missing_scene() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_scene(&dir.path().join("missing.ron")).unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
    }
}
