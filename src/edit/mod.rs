//! Unit edits against a decoded object list.
//!
//! 1. `request` - Declarative description of an edit
//! 2. `apply` - Applies a request, allocates ids, corrects positions
//! 3. `scene` - Caller-facing scene/task files translated into requests

pub mod request;
pub mod apply;
pub mod scene;

pub use request::{ModificationRequest, Addition, BasePosition, MAP_CENTER};
pub use apply::{
    apply, apply_with, validate_positions, validate_positions_with, correct_position,
    EditReport, IdAllocator, FIRST_ALLOCATED_ID, POSITION_JITTER, ROTATION_JITTER,
};
pub use scene::{SceneConfig, UnitSpec};
