//! Physics world wrapper around `Rapier2D`.
//!
//! Bodies carry the id of their owning entity in `user_data`; see
//! [`encode_user_data`].

use rapier2d::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{Receiver, channel};

use crate::body::FixtureState;

/// Default timestep used by [`PhysicsWorld::step`] (60Hz).
pub const PHYSICS_DT: f32 = 1.0 / 60.0;

/// Velocity solver iterations per world step.
pub const VELOCITY_ITERATIONS: usize = 10;

/// Position stabilization iterations per world step.
pub const POSITION_ITERATIONS: usize = 10;

/// Type tag for bodies owned by an arena entity.
pub const USER_DATA_ENTITY: u64 = 1;

/// Packs a type tag (high 64 bits) and an id (low 64 bits) into `user_data`.
pub fn encode_user_data(type_tag: u64, id: u64) -> u128 {
    (u128::from(type_tag) << 64) | u128::from(id)
}

/// Splits `user_data` back into (`type_tag`, id).
#[allow(clippy::cast_possible_truncation)]
pub fn decode_user_data(user_data: u128) -> (u64, u64) {
    ((user_data >> 64) as u64, user_data as u64)
}

/// Contact between two entity bodies, reported by the last step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactEvent {
    Started(u32, u32),
    Stopped(u32, u32),
}

impl ContactEvent {
    /// The other body's entity id if `id` takes part in this contact.
    pub fn partner_of(self, id: u32) -> Option<u32> {
        let (a, b) = match self {
            Self::Started(a, b) | Self::Stopped(a, b) => (a, b),
        };
        if a == id {
            Some(b)
        } else if b == id {
            Some(a)
        } else {
            None
        }
    }
}

/// Rapier sets and pipeline for one simulation.
///
/// There is no ambient gravity: all attraction is applied as per-body forces
/// before each step.
pub struct PhysicsWorld {
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    event_collector: ChannelEventCollector,
    collision_recv: Receiver<CollisionEvent>,
    contacts: Vec<ContactEvent>,
    /// Creation angle per body, with the angle its rotation read back as.
    creation_angles: HashMap<RigidBodyHandle, (f32, f32)>,
    steps: u64,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("steps", &self.steps)
            .field("bodies", &self.rigid_body_set.len())
            .field("colliders", &self.collider_set.len())
            .field("contacts", &self.contacts)
            .finish_non_exhaustive()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        let (collision_send, collision_recv) = channel();
        let (contact_force_send, _) = channel();
        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            integration_parameters: IntegrationParameters {
                dt: PHYSICS_DT,
                num_solver_iterations: VELOCITY_ITERATIONS,
                num_internal_stabilization_iterations: POSITION_ITERATIONS,
                ..Default::default()
            },
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            event_collector: ChannelEventCollector::new(collision_send, contact_force_send),
            collision_recv,
            contacts: Vec::new(),
            creation_angles: HashMap::new(),
            steps: 0,
        }
    }

    pub fn step(&mut self) {
        self.step_dt(PHYSICS_DT);
    }

    /// Advances the world by `dt` seconds. Iteration counts never change.
    ///
    /// Contacts that started or stopped during the step replace the ones
    /// reported by the previous step.
    pub fn step_dt(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        self.physics_pipeline.step(
            Vector::new(0.0, 0.0),
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            &(),
            &self.event_collector,
        );
        self.steps += 1;

        let contacts: Vec<ContactEvent> = self
            .collision_recv
            .try_iter()
            .filter_map(|event| self.contact_of(event))
            .collect();
        self.contacts = contacts;
    }

    fn contact_of(&self, event: CollisionEvent) -> Option<ContactEvent> {
        let entity = |handle: ColliderHandle| {
            let parent = self.collider_set.get(handle)?.parent()?;
            self.entity_id_of(parent)
        };
        match event {
            CollisionEvent::Started(a, b, _) => Some(ContactEvent::Started(entity(a)?, entity(b)?)),
            CollisionEvent::Stopped(a, b, _) => Some(ContactEvent::Stopped(entity(a)?, entity(b)?)),
        }
    }

    /// Takes the contacts reported by the last step.
    pub fn take_contacts(&mut self) -> Vec<ContactEvent> {
        std::mem::take(&mut self.contacts)
    }

    /// Number of steps taken since creation.
    pub fn current_frame(&self) -> u64 {
        self.steps
    }

    pub fn add_rigid_body(&mut self, rigid_body: RigidBody) -> RigidBodyHandle {
        self.rigid_body_set.insert(rigid_body)
    }

    pub fn add_collider(&mut self, collider: Collider, parent: RigidBodyHandle) -> ColliderHandle {
        self.collider_set
            .insert_with_parent(collider, parent, &mut self.rigid_body_set)
    }

    /// Removes a body together with its colliders.
    pub fn remove_rigid_body(&mut self, handle: RigidBodyHandle) {
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
        self.creation_angles.remove(&handle);
    }

    /// Remembers the angle `handle` was created with.
    pub(crate) fn record_angle(&mut self, handle: RigidBodyHandle, angle: f32) {
        if let Some(body) = self.rigid_body_set.get(handle) {
            self.creation_angles
                .insert(handle, (angle, body.rotation().angle()));
        }
    }

    /// Body angle in radians.
    ///
    /// Until the body rotates this is exactly the angle it was created with,
    /// not the value recomputed from its rotation.
    pub fn angle(&self, handle: RigidBodyHandle) -> Option<f32> {
        let live = self.get_rigid_body(handle)?.rotation().angle();
        Some(match self.creation_angles.get(&handle) {
            Some(&(created, read_back)) if read_back.to_bits() == live.to_bits() => created,
            _ => live,
        })
    }

    pub fn get_rigid_body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.rigid_body_set.get(handle)
    }

    pub fn get_rigid_body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.rigid_body_set.get_mut(handle)
    }

    /// Arena id stored in a body's `user_data`, if it belongs to an entity.
    #[allow(clippy::cast_possible_truncation)]
    pub fn entity_id_of(&self, handle: RigidBodyHandle) -> Option<u32> {
        let body = self.rigid_body_set.get(handle)?;
        match decode_user_data(body.user_data) {
            (USER_DATA_ENTITY, id) => Some(id as u32),
            _ => None,
        }
    }

    pub fn position(&self, handle: RigidBodyHandle) -> Option<Vector> {
        Some(self.get_rigid_body(handle)?.translation())
    }

    pub fn linear_velocity(&self, handle: RigidBodyHandle) -> Option<Vector> {
        Some(self.get_rigid_body(handle)?.linvel())
    }

    /// Fixtures of a body in attachment order.
    pub fn fixtures(&self, handle: RigidBodyHandle) -> Vec<FixtureState> {
        self.get_rigid_body(handle)
            .map(|body| {
                body.colliders()
                    .iter()
                    .filter_map(|ch| self.collider_set.get(*ch))
                    .map(FixtureState::capture)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Radius around the body origin that encloses all of its fixtures.
    pub fn bounding_radius(&self, handle: RigidBodyHandle) -> f32 {
        self.fixtures(handle)
            .iter()
            .map(|fixture| fixture.shape.bounding_radius())
            .fold(0.0, f32::max)
    }

    /// First body (in set order) with a fixture containing the world `point`.
    pub fn body_at_point(&self, point: Vector) -> Option<RigidBodyHandle> {
        self.rigid_body_set.iter().find_map(|(handle, body)| {
            let offset = point - body.translation();
            let local = Vector::from_angle(-body.rotation().angle()).rotate(offset);
            self.fixtures(handle)
                .iter()
                .any(|fixture| fixture.shape.contains_local_point(local))
                .then_some(handle)
        })
    }

    /// Teleports a body to `position` with zero rotation and wakes it.
    pub fn set_transform(&mut self, handle: RigidBodyHandle, position: Vector) {
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            body.set_translation(position, true);
            body.set_rotation(Rotation::from_angle(0.0), true);
        }
        self.creation_angles.remove(&handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball_body(world: &mut PhysicsWorld, pos: Vector, radius: f32) -> RigidBodyHandle {
        let handle = world.add_rigid_body(RigidBodyBuilder::dynamic().translation(pos).build());
        world.add_collider(ColliderBuilder::ball(radius).build(), handle);
        handle
    }

    fn entity_ball(world: &mut PhysicsWorld, id: u64, pos: Vector, radius: f32) -> RigidBodyHandle {
        let handle = world.add_rigid_body(
            RigidBodyBuilder::dynamic()
                .translation(pos)
                .user_data(encode_user_data(USER_DATA_ENTITY, id))
                .build(),
        );
        world.add_collider(
            ColliderBuilder::ball(radius)
                .active_events(ActiveEvents::COLLISION_EVENTS)
                .build(),
            handle,
        );
        handle
    }

    #[test]
    fn test_iteration_counts() {
        let world = PhysicsWorld::new();
        assert_eq!(world.current_frame(), 0);
        assert_eq!(world.integration_parameters.num_solver_iterations, VELOCITY_ITERATIONS);
        assert_eq!(
            world.integration_parameters.num_internal_stabilization_iterations,
            POSITION_ITERATIONS
        );
    }

    #[test]
    fn test_no_ambient_gravity() {
        let mut world = PhysicsWorld::new();
        let handle = ball_body(&mut world, Vector::new(5.0, 5.0), 1.0);
        for _ in 0..30 {
            world.step();
        }
        assert_eq!(world.position(handle), Some(Vector::new(5.0, 5.0)));
    }

    #[test]
    fn test_step_dt() {
        let mut world = PhysicsWorld::new();
        let handle = ball_body(&mut world, Vector::ZERO, 0.5);
        world
            .get_rigid_body_mut(handle)
            .unwrap()
            .set_linvel(Vector::new(2.0, 0.0), true);
        world.step_dt(0.5);
        assert_eq!(world.current_frame(), 1);
        assert_eq!(world.integration_parameters.dt, 0.5);
        assert!((world.position(handle).unwrap().x - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_identical_worlds_stay_identical() {
        let build = || {
            let mut world = PhysicsWorld::new();
            let handle = world.add_rigid_body(
                RigidBodyBuilder::dynamic()
                    .translation(Vector::new(10.0, 10.0))
                    .linvel(Vector::new(3.0, -1.0))
                    .build(),
            );
            world.add_collider(ColliderBuilder::ball(2.0).restitution(0.7).build(), handle);
            ball_body(&mut world, Vector::new(14.0, 9.0), 1.0);
            (world, handle)
        };
        let (mut a, ha) = build();
        let (mut b, hb) = build();
        for _ in 0..100 {
            a.step_dt(0.005);
            b.step_dt(0.005);
        }
        assert_eq!(a.position(ha), b.position(hb));
        assert_eq!(a.linear_velocity(ha), b.linear_velocity(hb));
    }

    #[test]
    fn test_user_data_roundtrip() {
        let encoded = encode_user_data(USER_DATA_ENTITY, 42);
        assert_eq!(decode_user_data(encoded), (USER_DATA_ENTITY, 42));

        let mut world = PhysicsWorld::new();
        let handle = world.add_rigid_body(RigidBodyBuilder::dynamic().user_data(encoded).build());
        assert_eq!(world.entity_id_of(handle), Some(42));

        let anonymous = world.add_rigid_body(RigidBodyBuilder::dynamic().build());
        assert_eq!(world.entity_id_of(anonymous), None);
    }

    #[test]
    fn test_body_at_point() {
        let mut world = PhysicsWorld::new();
        let handle = ball_body(&mut world, Vector::new(10.0, 0.0), 2.0);

        assert_eq!(world.body_at_point(Vector::new(11.5, 0.5)), Some(handle));
        assert_eq!(world.body_at_point(Vector::new(0.0, 0.0)), None);
    }

    #[test]
    fn test_remove_body_drops_colliders() {
        let mut world = PhysicsWorld::new();
        let handle = ball_body(&mut world, Vector::new(50.0, 50.0), 1.0);
        assert_eq!(world.collider_set.len(), 1);

        world.remove_rigid_body(handle);
        assert!(world.get_rigid_body(handle).is_none());
        assert_eq!(world.bounding_radius(handle), 0.0);
        assert_eq!(world.collider_set.len(), 0);
    }

    #[test]
    fn test_contact_events_follow_real_overlap() {
        let mut world = PhysicsWorld::new();
        entity_ball(&mut world, 1, Vector::ZERO, 1.0);
        let near = entity_ball(&mut world, 2, Vector::new(2.5, 0.0), 1.0);

        world.step_dt(0.005);
        assert!(world.take_contacts().is_empty());

        world.set_transform(near, Vector::new(1.5, 0.0));
        world.step_dt(0.005);
        let started = world.take_contacts();
        assert_eq!(started.len(), 1);
        assert!(matches!(started[0], ContactEvent::Started(..)));
        assert_eq!(started[0].partner_of(1), Some(2));
        assert_eq!(started[0].partner_of(3), None);
        assert!(world.take_contacts().is_empty());

        world.set_transform(near, Vector::new(10.0, 0.0));
        world.step_dt(0.005);
        let stopped = world.take_contacts();
        assert_eq!(stopped.len(), 1);
        assert!(matches!(stopped[0], ContactEvent::Stopped(..)));
        assert_eq!(stopped[0].partner_of(2), Some(1));
    }

    #[test]
    fn test_creation_angle_is_reported_until_rotated() {
        let mut world = PhysicsWorld::new();
        for i in 1..200u16 {
            let angle = f32::from(i) * 0.0317;
            let handle = world.add_rigid_body(RigidBodyBuilder::dynamic().rotation(angle).build());
            world.record_angle(handle, angle);
            assert_eq!(world.angle(handle), Some(angle));
        }

        let handle = world.add_rigid_body(RigidBodyBuilder::dynamic().rotation(0.5).build());
        world.record_angle(handle, 0.5);
        world.set_transform(handle, Vector::ZERO);
        assert_eq!(world.angle(handle), Some(0.0));
    }
}
