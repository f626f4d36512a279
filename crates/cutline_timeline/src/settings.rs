// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline editing settings.
//!
//! Settings are stored as pretty RON and always passed explicitly to the
//! operations that read them.

use crate::error::Result;
use crate::keyframe::TangentType;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Default settings file name
pub const SETTINGS_FILE_NAME: &str = "cutline.ron";

/// How snapped key times break ties at half frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SnapRounding {
    /// 2.5 becomes 3.0, -2.5 becomes -3.0
    #[default]
    HalfAwayFromZero,
    /// 2.5 becomes 2.0, 3.5 becomes 4.0
    HalfEven,
}

impl SnapRounding {
    /// Round a time to a whole frame
    pub fn round(&self, time: f64) -> f64 {
        match self {
            SnapRounding::HalfAwayFromZero => time.round(),
            SnapRounding::HalfEven => time.round_ties_even(),
        }
    }
}

/// Which shots move along with a retimed shot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SiblingScope {
    /// Shots on the same sequencer track
    #[default]
    Track,
    /// Every shot of the sequencer
    Sequencer,
}

/// Timeline editing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineSettings {
    /// Settings format version
    pub version: u32,
    /// Tie breaking for snapped keys
    pub snap_rounding: SnapRounding,
    /// Shots repositioned by shot retimes
    pub sibling_scope: SiblingScope,
    /// Tangent type of hard boundary keys
    pub boundary_tangent: TangentType,
}

impl Default for TimelineSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            snap_rounding: SnapRounding::default(),
            sibling_scope: SiblingScope::default(),
            boundary_tangent: TangentType::Linear,
        }
    }
}

impl TimelineSettings {
    /// Parse settings from RON
    pub fn from_ron(source: &str) -> Result<Self> {
        Ok(ron::from_str(source)?)
    }

    /// Serialize settings to pretty RON
    pub fn to_ron(&self) -> Result<String> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Load settings from a RON file
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        let settings = Self::from_ron(&source)?;
        tracing::info!("Loaded timeline settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to a RON file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_ron()?)?;
        tracing::info!("Saved timeline settings to {:?}", path);
        Ok(())
    }
}
