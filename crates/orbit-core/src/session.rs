//! A play session: the world, its entities, and the per-frame update.

use std::collections::BTreeSet;
use std::io::{Read, Write};

use rapier2d::prelude::{RigidBodyHandle, Vector};
use serde::{Deserialize, Serialize};

use crate::body::SnapshotError;
use crate::camera::{Camera, Viewport};
use crate::entity::{EntityArena, EntityId};
use crate::gravity::{apply_gravity, score_increment};
use crate::physics::{ContactEvent, PhysicsWorld};
use crate::render::{Color, EntityDraw, RenderTarget, TextAnchor, TextureCache, format_clock, format_score};
use crate::timer::{TimerId, TimerScheduler};

/// Seconds on the clock when a session starts.
pub const DEFAULT_TIME_LIMIT: i32 = 120;

/// Seconds lost when the tracked body starts touching an obstacle.
pub const CONTACT_PENALTY: i32 = 10;

/// Period of the countdown timer in seconds.
pub const COUNTDOWN_INTERVAL: f64 = 1.0;

/// Radius of planets spawned by a spawn-planet collectible.
pub const SPAWNED_PLANET_RADIUS: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Running,
    /// The clock ran out.
    GameOver { score: i32 },
}

/// Scalar session fields written by [`Simulation::save_state`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub score: i32,
    pub time_remaining: i32,
    pub paused: bool,
    pub camera: Camera,
}

impl SessionState {
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(data)
    }
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    entity: EntityId,
    offset: Vector,
}

/// Owns the physics world and entities and drives them frame by frame.
#[derive(Debug)]
pub struct Simulation {
    pub world: PhysicsWorld,
    pub arena: EntityArena,
    pub camera: Camera,
    pub viewport: Viewport,
    tracked: Option<EntityId>,
    sun: Option<EntityId>,
    score: i32,
    time_limit: i32,
    time_remaining: i32,
    paused: bool,
    step_once: bool,
    start_time: f64,
    scheduler: TimerScheduler,
    countdown: TimerId,
    /// Non-collectible entities the tracked body is touching.
    touching: BTreeSet<EntityId>,
    phase: SessionPhase,
    drag: Option<Drag>,
}

impl Simulation {
    /// An empty, paused session whose clock starts at `now`.
    pub fn new(viewport: Viewport, time_limit: i32, now: f64) -> Self {
        let mut scheduler = TimerScheduler::new();
        let countdown = scheduler.set(COUNTDOWN_INTERVAL, true, now);
        let mut sim = Self {
            world: PhysicsWorld::new(),
            arena: EntityArena::new(),
            camera: Camera::default(),
            viewport,
            tracked: None,
            sun: None,
            score: 0,
            time_limit,
            time_remaining: time_limit,
            paused: true,
            step_once: false,
            start_time: now,
            scheduler,
            countdown,
            touching: BTreeSet::new(),
            phase: SessionPhase::Running,
            drag: None,
        };
        sim.reset(now);
        sim
    }

    /// Sets the body the camera, trail and score follow.
    pub fn track(&mut self, id: EntityId) {
        self.tracked = Some(id);
        self.fix_camera();
    }

    /// Sets the body the score distance is measured to.
    pub fn set_sun(&mut self, id: EntityId) {
        self.sun = Some(id);
    }

    pub fn tracked(&self) -> Option<EntityId> {
        self.tracked
    }

    pub fn sun(&self) -> Option<EntityId> {
        self.sun
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn time_remaining(&self) -> i32 {
        self.time_remaining
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Seconds since the session started.
    #[allow(clippy::cast_possible_truncation)]
    pub fn session_time(&self, now: f64) -> f32 {
        (now - self.start_time) as f32
    }

    /// Restores score, clock and camera to their starting values and pauses.
    ///
    /// Entities are left in place.
    pub fn reset(&mut self, now: f64) {
        self.score = 0;
        self.time_remaining = self.time_limit;
        self.paused = true;
        self.start_time = now;
        self.camera = Camera::default();
        self.drag = None;
        self.step_once = false;
        self.touching.clear();
        self.phase = SessionPhase::Running;
        self.scheduler.remove(self.countdown);
        self.countdown = self.scheduler.set(COUNTDOWN_INTERVAL, true, now);
        self.scheduler.pause_all(now);
        self.fix_camera();
        tracing::info!(time_limit = self.time_limit, "session reset");
    }

    pub fn toggle_pause(&mut self, now: f64) {
        self.paused = !self.paused;
        self.scheduler.toggle_pause_all(now);
        tracing::debug!(paused = self.paused, "pause toggled");
    }

    /// Runs exactly one frame on the next [`Simulation::advance`] even if paused.
    pub fn request_step(&mut self) {
        self.step_once = true;
    }

    /// Updates the viewport and refits the camera.
    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.fix_camera();
    }

    fn body_of(&self, id: Option<EntityId>) -> Option<RigidBodyHandle> {
        self.arena.get(id?)?.body
    }

    fn fix_camera(&mut self) {
        let Some(handle) = self.body_of(self.tracked) else {
            return;
        };
        let Some(center) = self.world.position(handle) else {
            return;
        };
        let radius = self.world.bounding_radius(handle);
        self.camera = self.camera.fit(self.viewport, center, radius);
    }

    /// Advances the session by one frame of `dt` seconds at wall time `now`.
    ///
    /// Returns whether a frame was simulated.
    pub fn advance(&mut self, dt: f32, now: f64) -> bool {
        if matches!(self.phase, SessionPhase::GameOver { .. }) {
            return false;
        }
        if self.paused && !self.step_once {
            return false;
        }

        for fired in self.scheduler.check_all(now) {
            if fired == self.countdown && self.time_remaining > 0 {
                self.time_remaining -= 1;
            }
        }

        self.fix_camera();

        let session_time = self.session_time(now);
        if let Some(tracked) = self.tracked {
            let position = self.body_of(Some(tracked)).and_then(|h| self.world.position(h));
            if let (Some(position), Some(entity)) = (position, self.arena.get_mut(tracked)) {
                if entity.has_trail {
                    entity.trail.update(position, session_time);
                }
            }
        }

        self.score += self.score_this_frame();

        apply_gravity(&self.arena, &mut self.world);
        self.world.step_dt(dt);
        self.process_contacts();
        self.step_once = false;

        if self.time_remaining <= 0 {
            self.phase = SessionPhase::GameOver { score: self.score };
            self.paused = true;
            self.scheduler.pause_all(now);
            tracing::info!(score = self.score, "game over");
        }
        true
    }

    fn score_this_frame(&self) -> i32 {
        let (Some(tracked), Some(sun)) = (self.body_of(self.tracked), self.body_of(self.sun)) else {
            return 0;
        };
        let (Some(position), Some(velocity), Some(sun_position)) = (
            self.world.position(tracked),
            self.world.linear_velocity(tracked),
            self.world.position(sun),
        ) else {
            return 0;
        };
        score_increment(velocity.length(), (position - sun_position).length())
    }

    /// Applies the contacts the tracked body made or lost in the last step.
    ///
    /// Touching a collectible picks it up. Touching anything else costs
    /// [`CONTACT_PENALTY`] seconds, charged again only once the body has
    /// come clear of every obstacle.
    fn process_contacts(&mut self) {
        let contacts = self.world.take_contacts();
        let arena = &self.arena;
        self.touching.retain(|id| arena.get(*id).is_some());
        let Some(tracked) = self.tracked else {
            return;
        };

        let mut pickups = Vec::new();
        for contact in contacts {
            let Some(other) = contact.partner_of(tracked.0).map(EntityId) else {
                continue;
            };
            match contact {
                ContactEvent::Started(..) => {
                    if self.arena.get(other).is_some_and(|e| e.is_collectible) {
                        if !pickups.contains(&other) {
                            pickups.push(other);
                        }
                        continue;
                    }
                    if self.touching.is_empty() {
                        self.time_remaining -= CONTACT_PENALTY;
                        tracing::info!(with = other.0, time_remaining = self.time_remaining, "contact penalty");
                    }
                    self.touching.insert(other);
                }
                ContactEvent::Stopped(..) => {
                    self.touching.remove(&other);
                }
            }
        }

        for id in pickups {
            self.collect(id);
        }
    }

    /// Applies a collectible's effect and removes it.
    fn collect(&mut self, id: EntityId) {
        let position = self.body_of(Some(id)).and_then(|h| self.world.position(h));
        let Some(entity) = self.arena.despawn(&mut self.world, id) else {
            return;
        };
        if entity.has_score {
            self.score += entity.score;
        }
        if entity.has_time {
            self.time_remaining += entity.time;
        }
        if entity.spawn_planet {
            if let Some(position) = position {
                let spawned = self.arena.spawn_planet(
                    &mut self.world,
                    position,
                    SPAWNED_PLANET_RADIUS,
                    1.0,
                    Vector::ZERO,
                );
                if let Err(e) = spawned {
                    tracing::warn!(error = %e, "failed to spawn planet");
                }
            }
        }
        tracing::debug!(id = id.0, score = self.score, "collectible picked up");
    }

    /// Starts dragging the gravity source under window pixel `(x, y)`.
    ///
    /// Returns whether a source was grabbed.
    pub fn begin_drag(&mut self, x: i32, y: i32) -> bool {
        let point = self.camera.point_to_world(self.viewport, x, y);
        let Some(handle) = self.world.body_at_point(point) else {
            return false;
        };
        let Some((id, entity)) = self.arena.by_body(&self.world, handle) else {
            return false;
        };
        if !entity.has_gravity {
            return false;
        }
        let Some(position) = self.world.position(handle) else {
            return false;
        };
        self.drag = Some(Drag {
            entity: id,
            offset: point - position,
        });
        true
    }

    /// Moves the dragged source so the grab point follows the pointer.
    pub fn drag_to(&mut self, x: i32, y: i32) {
        let Some(drag) = self.drag else {
            return;
        };
        let point = self.camera.point_to_world(self.viewport, x, y);
        if let Some(handle) = self.body_of(Some(drag.entity)) {
            self.world.set_transform(handle, point - drag.offset);
        }
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Draws the scene: tracked trail, entities, origin cross, then the HUD.
    pub fn render<R, T>(&self, target: &mut R, textures: &mut T, now: f64)
    where
        R: RenderTarget,
        T: TextureCache,
    {
        let session_time = self.session_time(now);
        if let Some(entity) = self.tracked.and_then(|id| self.arena.get(id)) {
            if entity.has_trail {
                for (from, to, opacity) in entity.trail.segments(session_time) {
                    target.draw_line(from, to, Color::WHITE.with_opacity(opacity));
                }
            }
        }

        for (id, entity) in self.arena.iter() {
            let (Some(handle), Some(visual)) = (entity.body, entity.visual.as_ref()) else {
                continue;
            };
            let Some(body) = self.world.get_rigid_body(handle) else {
                continue;
            };
            let Some(texture) = textures.texture(&visual.texture) else {
                tracing::debug!(id = id.0, texture = %visual.texture, "texture missing");
                continue;
            };
            target.draw_entity(&EntityDraw {
                texture,
                position: body.translation(),
                angle: body.rotation().angle(),
                scale: visual.scale,
                color: visual.color,
            });
        }

        target.draw_line(Vector::new(0.0, 1.0), Vector::new(0.0, -1.0), Color::RED);
        target.draw_line(Vector::new(1.0, 0.0), Vector::new(-1.0, 0.0), Color::RED);

        target.draw_text(&format_score(self.score), Color::HUD, TextAnchor::TopRight);
        target.draw_text(&format_clock(self.time_remaining), Color::HUD, TextAnchor::TopLeft);
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            score: self.score,
            time_remaining: self.time_remaining,
            paused: self.paused,
            camera: self.camera,
        }
    }

    pub fn save_state(&self) -> Result<Vec<u8>, postcard::Error> {
        self.state().to_bytes()
    }

    /// Restores scalar session fields; the session clock restarts at `now`.
    pub fn load_state(&mut self, data: &[u8], now: f64) -> Result<(), postcard::Error> {
        self.restore_state(SessionState::from_bytes(data)?, now);
        Ok(())
    }

    pub fn restore_state(&mut self, state: SessionState, now: f64) {
        self.score = state.score;
        self.time_remaining = state.time_remaining;
        self.paused = state.paused;
        self.camera = state.camera;
        self.start_time = now;
        self.phase = SessionPhase::Running;
        if self.paused {
            self.scheduler.pause_all(now);
        } else {
            self.scheduler.unpause_all(now);
        }
    }

    /// Writes the suns and planets of this session.
    pub fn save_world<W: Write>(&self, out: &mut W) -> Result<usize, SnapshotError> {
        self.arena.save_world(&self.world, out)
    }

    /// Replaces the world with one read from `input`.
    ///
    /// The first planet becomes the tracked body and the first sun the score
    /// anchor. On error the current world is kept.
    pub fn load_world<R: Read>(&mut self, input: &mut R) -> Result<(), SnapshotError> {
        let mut world = PhysicsWorld::new();
        let mut arena = EntityArena::new();
        arena.load_world(input, &mut world)?;

        self.tracked = arena.iter().find(|(_, e)| e.is_planet).map(|(id, _)| id);
        self.sun = arena.iter().find(|(_, e)| e.is_sun).map(|(id, _)| id);
        self.world = world;
        self.arena = arena;
        self.drag = None;
        self.touching.clear();
        self.fix_camera();
        Ok(())
    }
}
