// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation timeline editing for cutline.
//!
//! This crate retimes animation curves and keeps shots consistent with them:
//! - Curve listing and baking
//! - Key insertion and range clean-up that keep boundary tangents intact
//! - Range retiming with contiguous animation offsets
//! - Hold and trim
//! - Shot retime, split, delete and free range search
//!
//! ## Architecture
//!
//! Everything runs against a host application through [`AnimationHost`]:
//! - Scheduler drives the retimer and the hold/trim editor
//! - Retimer and hold/trim are composed from key editor primitives
//! - The key editor talks to the host through the curve accessor types
//!
//! [`InMemoryHost`] implements the host over a serializable scene.

pub mod batch;
pub mod curve;
pub mod error;
pub mod history;
pub mod hold_trim;
pub mod host;
pub mod key_editor;
pub mod keyframe;
pub mod memory;
pub mod retime;
pub mod scheduler;
pub mod settings;
pub mod shot;
pub mod track;

pub use batch::BatchReport;
pub use curve::{
    bake_curves, delete_unconnected_curves, find_curve_source, first_key_time, is_static,
    last_key_time, list_curves, list_curves_with_infinite_set, list_curves_with_namespace,
    list_non_static_curves, list_unconnected_curves, resolve_curve, CurveHandle, CurveKind,
    CurveScope, Infinity,
};
pub use error::{ItemFailure, Result, TimelineError};
pub use history::{EntryId, Snapshot, UndoEntry, UndoHistory};
pub use hold_trim::{hold, trim};
pub use host::{
    AnimationHost, AttrValue, AttributeUnlock, CurveId, HostContext, NewShot, SelectionGuard,
    ShotId, TimeGuard, UndoChunk,
};
pub use key_editor::{
    clear_keys, crop_curves, delete_non_integer_keys, insert_key, keys_in_window, offset_curves,
    remove_keys_before, remove_keys_outside, scale_keys, set_boundary_key, shift_keys, snap_keys,
};
pub use keyframe::{Key, KeyIndex, TangentSide, TangentType, TimeRange, TIME_EPSILON};
pub use memory::{InMemoryHost, SceneData};
pub use retime::{retime_curves, RetimeOffsets, RetimeOptions};
pub use scheduler::{
    delete_shot_and_animation, retime_animation_in_shot_range, retime_shot, split_shot,
    validate_frame_range,
};
pub use settings::{SiblingScope, SnapRounding, TimelineSettings};
pub use shot::{list_shots, read_shot, Shot, ShotAttr, Timeline};
