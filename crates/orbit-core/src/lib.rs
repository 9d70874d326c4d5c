//! Orbit Core Library
//!
//! Gravitational N-body simulation on `Rapier2D` with binary persistence of
//! bodies and entities, a camera that follows the tracked planet, and the
//! session loop that ties them together.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod body;
pub mod camera;
pub mod codec;
pub mod config;
pub mod entity;
pub mod gravity;
pub mod physics;
pub mod render;
pub mod scores;
pub mod session;
pub mod storage;
pub mod timer;
pub mod trail;

#[cfg(test)]
pub(crate) mod test_utils;

pub use body::{BodyKind, BodyState, FixtureState, ShapeState, SnapshotError, load_body, save_body};
pub use camera::{Camera, Viewport};
pub use codec::{CodecError, Decoder, Encoder};
pub use config::{ConfigError, SimConfig};
pub use entity::{CollectibleKind, Entity, EntityArena, EntityId, PersistedEntity};
pub use gravity::{GravitySource, accumulate_gravity, apply_gravity, score_increment};
pub use physics::{PHYSICS_DT, PhysicsWorld};
pub use render::{Color, EntityDraw, RenderTarget, TextAnchor, TextureCache, TextureHandle, Visual};
pub use scores::HighScores;
pub use session::{SessionPhase, SessionState, Simulation};
pub use storage::StorageError;
pub use timer::{TimerId, TimerScheduler};
pub use trail::{Trail, TrailPoint};
