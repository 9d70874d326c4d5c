//! Simulation entities, their arena, and entity snapshots.
//!
//! Entities live in an [`EntityArena`] keyed by a stable [`EntityId`]. The
//! physics body of an entity stores that id in its `user_data`, so contact
//! and force processing can find the owning entity without raw pointers.
//!
//! Only [`PersistedEntity`] fields are written to save streams:
//!
//! ```text
//! has_physics: flag, [body]
//! has_gravity: flag, gravity_coefficient: f32
//! has_trail: flag, [trail]
//! is_affected_by_gravity, is_sun, is_planet: flag
//! ```
//!
//! Enemy, collectible, score and time fields are rebuilt by the factories and
//! are not part of the stream.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use rapier2d::prelude::{RigidBodyHandle, Vector};
use serde::{Deserialize, Serialize};

use crate::body::{self, BodyKind, BodyState, FixtureState, SnapshotError};
use crate::codec::{CodecError, Decoder, Encoder};
use crate::physics::{PhysicsWorld, USER_DATA_ENTITY, encode_user_data};
use crate::render::Visual;
use crate::trail::{DEFAULT_TRAIL_LENGTH, DEFAULT_TRAIL_WINDOW, Trail};

/// Friction of planet and sun fixtures.
pub const CELESTIAL_FRICTION: f32 = 0.5;

/// Restitution of planet and sun fixtures.
pub const CELESTIAL_RESTITUTION: f32 = 0.7;

/// Half-size of the square collectible box.
pub const COLLECTIBLE_HALF_SIZE: f32 = 0.5;

/// Stable identifier of an entity within its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    /// `user_data` value for this entity's physics body.
    pub fn user_data(self) -> u128 {
        encode_user_data(USER_DATA_ENTITY, u64::from(self.0))
    }
}

/// What picking up a collectible does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectibleKind {
    PlusScore,
    MinusScore,
    PlusTime,
    MinusTime,
    SpawnPlanet,
}

impl CollectibleKind {
    pub const ALL: [CollectibleKind; 5] = [
        Self::PlusScore,
        Self::MinusScore,
        Self::PlusTime,
        Self::MinusTime,
        Self::SpawnPlanet,
    ];

    fn texture(self) -> &'static str {
        match self {
            Self::PlusScore => "collectible-plus-score",
            Self::MinusScore => "collectible-minus-score",
            Self::PlusTime => "collectible-plus-time",
            Self::MinusTime => "collectible-minus-time",
            Self::SpawnPlanet => "collectible-spawn-planet",
        }
    }
}

/// A simulated object: optional physics body plus gameplay flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    pub body: Option<RigidBodyHandle>,

    pub has_gravity: bool,
    pub gravity_coefficient: f32,

    pub has_trail: bool,
    pub trail: Trail,

    pub is_affected_by_gravity: bool,
    pub is_sun: bool,
    pub is_planet: bool,
    pub is_enemy: bool,
    pub is_collectible: bool,

    pub has_score: bool,
    pub score: i32,
    pub has_time: bool,
    pub time: i32,
    pub spawn_planet: bool,

    pub visual: Option<Visual>,
}

impl Entity {
    pub fn has_physics(&self) -> bool {
        self.body.is_some()
    }

    /// Whether this entity belongs to the world state that survives a session.
    pub fn is_persisted(&self) -> bool {
        self.is_sun || self.is_planet
    }

    /// Collects the persisted field subset, reading the live body from `world`.
    pub fn persisted(&self, world: &PhysicsWorld) -> Result<PersistedEntity, SnapshotError> {
        let body = match self.body {
            Some(handle) => Some(BodyState::capture(world, handle).ok_or_else(|| {
                SnapshotError::Malformed("entity body is not in the physics world".to_string())
            })?),
            None => None,
        };
        Ok(PersistedEntity {
            body,
            has_gravity: self.has_gravity,
            gravity_coefficient: self.gravity_coefficient,
            trail: self.has_trail.then(|| self.trail.clone()),
            is_affected_by_gravity: self.is_affected_by_gravity,
            is_sun: self.is_sun,
            is_planet: self.is_planet,
        })
    }

    /// Writes this entity's persisted fields. Nothing is written on error.
    pub fn save<W: Write>(&self, world: &PhysicsWorld, out: &mut W) -> Result<(), SnapshotError> {
        self.persisted(world)?.save(out)
    }

    /// Planet: dynamic circle with a trail, pulled by gravity sources.
    pub fn create_planet(
        world: &mut PhysicsWorld,
        id: EntityId,
        position: Vector,
        radius: f32,
        density: f32,
        velocity: Vector,
    ) -> Result<Self, SnapshotError> {
        let mut state = BodyState::new(BodyKind::Dynamic, position).with_fixture(FixtureState::circle(
            Vector::ZERO,
            radius,
            CELESTIAL_FRICTION,
            density,
            CELESTIAL_RESTITUTION,
        ));
        state.linear_velocity = velocity;

        Ok(Self {
            body: Some(state.materialize(world, id.user_data())?),
            has_trail: true,
            trail: Trail::new(DEFAULT_TRAIL_LENGTH, DEFAULT_TRAIL_WINDOW),
            is_affected_by_gravity: true,
            is_planet: true,
            visual: Some(Visual::textured("planet", radius)),
            ..Self::default()
        })
    }

    /// Sun: dynamic circle acting as a gravity source.
    pub fn create_sun(
        world: &mut PhysicsWorld,
        id: EntityId,
        position: Vector,
        radius: f32,
        density: f32,
        gravity_coefficient: f32,
    ) -> Result<Self, SnapshotError> {
        let state = BodyState::new(BodyKind::Dynamic, position).with_fixture(FixtureState::circle(
            Vector::ZERO,
            radius,
            CELESTIAL_FRICTION,
            density,
            CELESTIAL_RESTITUTION,
        ));

        Ok(Self {
            body: Some(state.materialize(world, id.user_data())?),
            has_gravity: true,
            gravity_coefficient,
            is_sun: true,
            visual: Some(Visual::textured("sun", radius)),
            ..Self::default()
        })
    }

    /// Collectible: a small box whose effect depends on `kind`.
    pub fn create_collectible(
        world: &mut PhysicsWorld,
        id: EntityId,
        position: Vector,
        kind: CollectibleKind,
    ) -> Result<Self, SnapshotError> {
        let h = COLLECTIBLE_HALF_SIZE;
        let state = BodyState::new(BodyKind::Dynamic, position).with_fixture(FixtureState::polygon(vec![
            Vector::new(-h, -h),
            Vector::new(h, -h),
            Vector::new(h, h),
            Vector::new(-h, h),
        ]));

        let mut entity = Self {
            body: Some(state.materialize(world, id.user_data())?),
            is_collectible: true,
            visual: Some(Visual::textured(kind.texture(), h)),
            ..Self::default()
        };
        match kind {
            CollectibleKind::PlusScore | CollectibleKind::MinusScore => {
                entity.has_score = true;
                entity.score = if kind == CollectibleKind::PlusScore { 100 } else { -100 };
            }
            CollectibleKind::PlusTime | CollectibleKind::MinusTime => {
                entity.has_time = true;
                entity.time = if kind == CollectibleKind::PlusTime { 10 } else { -10 };
            }
            CollectibleKind::SpawnPlanet => entity.spawn_planet = true,
        }
        Ok(entity)
    }

    /// Enemy ship: a five-sided hull moving with `velocity`, rotated by `angle`.
    pub fn create_enemy_ship(
        world: &mut PhysicsWorld,
        id: EntityId,
        position: Vector,
        velocity: Vector,
        angle: f32,
    ) -> Result<Self, SnapshotError> {
        let mut state = BodyState::new(BodyKind::Dynamic, position).with_fixture(FixtureState::polygon(vec![
            Vector::new(-2.0, -2.0),
            Vector::new(2.0, -2.0),
            Vector::new(2.0, 0.0),
            Vector::new(0.0, 2.0),
            Vector::new(-2.0, 0.0),
        ]));
        state.linear_velocity = velocity;
        state.angle = angle;

        Ok(Self {
            body: Some(state.materialize(world, id.user_data())?),
            is_enemy: true,
            visual: Some(Visual::textured("enemy-ship", 2.0)),
            ..Self::default()
        })
    }
}

/// The named subset of entity state that is written to save streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEntity {
    pub body: Option<BodyState>,
    pub has_gravity: bool,
    pub gravity_coefficient: f32,
    pub trail: Option<Trail>,
    pub is_affected_by_gravity: bool,
    pub is_sun: bool,
    pub is_planet: bool,
}

impl PersistedEntity {
    /// Writes the record. Nothing reaches `out` unless encoding succeeds.
    pub fn save<W: Write>(&self, out: &mut W) -> Result<(), SnapshotError> {
        let mut enc = Encoder::new(Vec::new());
        self.encode(&mut enc)?;
        out.write_all(&enc.into_inner()).map_err(CodecError::from)?;
        Ok(())
    }

    pub fn load<R: Read>(input: &mut R) -> Result<Self, SnapshotError> {
        Self::decode(&mut Decoder::new(input))
    }

    fn encode<W: Write>(&self, enc: &mut Encoder<W>) -> Result<(), SnapshotError> {
        enc.write_bool(self.body.is_some())?;
        if let Some(state) = &self.body {
            body::encode_body(Some(state), enc)?;
        }
        enc.write_bool(self.has_gravity)?;
        enc.write_f32(self.gravity_coefficient)?;
        enc.write_bool(self.trail.is_some())?;
        if let Some(trail) = &self.trail {
            trail.encode(enc)?;
        }
        enc.write_bool(self.is_affected_by_gravity)?;
        enc.write_bool(self.is_sun)?;
        enc.write_bool(self.is_planet)?;
        Ok(())
    }

    fn decode<R: Read>(dec: &mut Decoder<R>) -> Result<Self, SnapshotError> {
        let body = if dec.read_bool("has_physics")? {
            let body = body::decode_body(dec)?;
            if body.is_none() {
                return Err(SnapshotError::Malformed(
                    "entity has physics but its body was not persisted".to_string(),
                ));
            }
            body
        } else {
            None
        };
        let has_gravity = dec.read_bool("has_gravity")?;
        let gravity_coefficient = dec.read_f32("gravity_coefficient")?;
        let trail = if dec.read_bool("has_trail")? {
            Some(Trail::decode(dec)?)
        } else {
            None
        };
        Ok(Self {
            body,
            has_gravity,
            gravity_coefficient,
            trail,
            is_affected_by_gravity: dec.read_bool("is_affected_by_gravity")?,
            is_sun: dec.read_bool("is_sun")?,
            is_planet: dec.read_bool("is_planet")?,
        })
    }

    /// Builds the live entity, registering its body in `world` under `id`.
    fn into_entity(self, world: &mut PhysicsWorld, id: EntityId) -> Result<Entity, SnapshotError> {
        let body = match &self.body {
            Some(state) => Some(state.materialize(world, id.user_data())?),
            None => None,
        };
        Ok(Entity {
            body,
            has_gravity: self.has_gravity,
            gravity_coefficient: self.gravity_coefficient,
            has_trail: self.trail.is_some(),
            trail: self.trail.unwrap_or_default(),
            is_affected_by_gravity: self.is_affected_by_gravity,
            is_sun: self.is_sun,
            is_planet: self.is_planet,
            ..Entity::default()
        })
    }
}

/// Owns all entities, keyed by id in creation order.
#[derive(Debug, Default)]
pub struct EntityArena {
    entities: BTreeMap<EntityId, Entity>,
    next_id: u32,
}

impl EntityArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Entities in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter().map(|(id, e)| (*id, e))
    }

    /// Looks up the entity owning a physics body.
    pub fn by_body(&self, world: &PhysicsWorld, handle: RigidBodyHandle) -> Option<(EntityId, &Entity)> {
        let id = EntityId(world.entity_id_of(handle)?);
        self.entities.get(&id).map(|e| (id, e))
    }

    /// Creates an entity with `create`, which receives the id reserved for it.
    ///
    /// The id is only consumed if `create` succeeds.
    pub fn insert_with<F>(&mut self, world: &mut PhysicsWorld, create: F) -> Result<EntityId, SnapshotError>
    where
        F: FnOnce(&mut PhysicsWorld, EntityId) -> Result<Entity, SnapshotError>,
    {
        let id = EntityId(self.next_id);
        let entity = create(world, id)?;
        self.next_id += 1;
        self.entities.insert(id, entity);
        tracing::debug!(id = id.0, "entity spawned");
        Ok(id)
    }

    pub fn spawn_planet(
        &mut self,
        world: &mut PhysicsWorld,
        position: Vector,
        radius: f32,
        density: f32,
        velocity: Vector,
    ) -> Result<EntityId, SnapshotError> {
        self.insert_with(world, |w, id| {
            Entity::create_planet(w, id, position, radius, density, velocity)
        })
    }

    pub fn spawn_sun(
        &mut self,
        world: &mut PhysicsWorld,
        position: Vector,
        radius: f32,
        density: f32,
        gravity_coefficient: f32,
    ) -> Result<EntityId, SnapshotError> {
        self.insert_with(world, |w, id| {
            Entity::create_sun(w, id, position, radius, density, gravity_coefficient)
        })
    }

    pub fn spawn_collectible(
        &mut self,
        world: &mut PhysicsWorld,
        position: Vector,
        kind: CollectibleKind,
    ) -> Result<EntityId, SnapshotError> {
        self.insert_with(world, |w, id| Entity::create_collectible(w, id, position, kind))
    }

    pub fn spawn_enemy_ship(
        &mut self,
        world: &mut PhysicsWorld,
        position: Vector,
        velocity: Vector,
        angle: f32,
    ) -> Result<EntityId, SnapshotError> {
        self.insert_with(world, |w, id| {
            Entity::create_enemy_ship(w, id, position, velocity, angle)
        })
    }

    /// Removes an entity, releasing its physics body first.
    pub fn despawn(&mut self, world: &mut PhysicsWorld, id: EntityId) -> Option<Entity> {
        let mut entity = self.entities.remove(&id)?;
        if let Some(handle) = entity.body.take() {
            world.remove_rigid_body(handle);
        }
        tracing::debug!(id = id.0, "entity despawned");
        Some(entity)
    }

    /// Removes every entity and its body.
    pub fn clear(&mut self, world: &mut PhysicsWorld) {
        let ids: Vec<EntityId> = self.entities.keys().copied().collect();
        for id in ids {
            self.despawn(world, id);
        }
    }

    /// Reads one entity record and registers it (and its body) in `world`.
    pub fn load_entity<R: Read>(&mut self, input: &mut R, world: &mut PhysicsWorld) -> Result<EntityId, SnapshotError> {
        let record = PersistedEntity::load(input)?;
        self.insert_with(world, |w, id| record.into_entity(w, id))
    }

    /// Reads `count` records and registers them.
    ///
    /// All records are decoded before any body is created; if registration
    /// fails part way, the entities created so far are removed again.
    pub fn load_entities<R: Read>(
        &mut self,
        input: &mut R,
        count: usize,
        world: &mut PhysicsWorld,
    ) -> Result<Vec<EntityId>, SnapshotError> {
        let mut dec = Decoder::new(input);
        let records = (0..count)
            .map(|_| PersistedEntity::decode(&mut dec))
            .collect::<Result<Vec<_>, _>>()?;

        let mut loaded = Vec::with_capacity(records.len());
        for record in records {
            match self.insert_with(world, |w, id| record.into_entity(w, id)) {
                Ok(id) => loaded.push(id),
                Err(e) => {
                    for id in loaded {
                        self.despawn(world, id);
                    }
                    return Err(e);
                }
            }
        }
        Ok(loaded)
    }

    /// Writes the persisted entities (suns and planets) as a counted list.
    pub fn save_world<W: Write>(&self, world: &PhysicsWorld, out: &mut W) -> Result<usize, SnapshotError> {
        let records = self
            .entities
            .values()
            .filter(|e| e.is_persisted())
            .map(|e| e.persisted(world))
            .collect::<Result<Vec<_>, _>>()?;

        let mut enc = Encoder::new(Vec::new());
        enc.write_len(records.len(), "entity_count")?;
        for record in &records {
            record.encode(&mut enc)?;
        }
        out.write_all(&enc.into_inner()).map_err(CodecError::from)?;
        tracing::info!(entities = records.len(), "world saved");
        Ok(records.len())
    }

    /// Reads a list written by [`EntityArena::save_world`].
    pub fn load_world<R: Read>(&mut self, input: &mut R, world: &mut PhysicsWorld) -> Result<Vec<EntityId>, SnapshotError> {
        let count = Decoder::new(&mut *input).read_len("entity_count")?;
        let ids = self.load_entities(input, count, world)?;
        tracing::info!(entities = ids.len(), "world loaded");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{DEFAULT_DENSITY, DEFAULT_FRICTION, ShapeState};
    use crate::trail::TrailPoint;
    use rapier2d::prelude::Rotation;

    fn save_bytes(entity: &Entity, world: &PhysicsWorld) -> Vec<u8> {
        let mut out = Vec::new();
        entity.save(world, &mut out).unwrap();
        out
    }

    #[test]
    fn test_planet_factory() {
        let mut world = PhysicsWorld::new();
        let mut arena = EntityArena::new();
        let id = arena
            .spawn_planet(&mut world, Vector::new(20.0, 20.0), 2.0, 1.0, Vector::new(0.0, 5.0))
            .unwrap();

        let planet = arena.get(id).unwrap();
        assert!(planet.is_planet && planet.is_affected_by_gravity && planet.has_trail);
        assert!(!planet.has_gravity && !planet.is_sun);
        assert_eq!(planet.trail.retention_window, DEFAULT_TRAIL_WINDOW);
        assert_eq!(planet.visual.as_ref().unwrap().texture, "planet");

        let handle = planet.body.unwrap();
        let fixtures = world.fixtures(handle);
        assert_eq!(fixtures.len(), 1);
        assert_eq!(fixtures[0].friction, CELESTIAL_FRICTION);
        assert_eq!(fixtures[0].restitution, CELESTIAL_RESTITUTION);
        assert_eq!(fixtures[0].shape, ShapeState::Circle { center: Vector::ZERO, radius: 2.0 });
        assert_eq!(world.linear_velocity(handle), Some(Vector::new(0.0, 5.0)));
        assert_eq!(arena.by_body(&world, handle).map(|(id, _)| id), Some(id));
    }

    #[test]
    fn test_sun_factory() {
        let mut world = PhysicsWorld::new();
        let mut arena = EntityArena::new();
        let id = arena
            .spawn_sun(&mut world, Vector::ZERO, 6.0, 1000.0, 130_000.0)
            .unwrap();
        let sun = arena.get(id).unwrap();
        assert!(sun.is_sun && sun.has_gravity && !sun.is_affected_by_gravity);
        assert_eq!(sun.gravity_coefficient, 130_000.0);
        assert!(!sun.has_trail);
    }

    #[test]
    fn test_collectible_kinds() {
        let mut world = PhysicsWorld::new();
        let mut arena = EntityArena::new();
        for kind in CollectibleKind::ALL {
            let id = arena.spawn_collectible(&mut world, Vector::new(3.0, 3.0), kind).unwrap();
            let e = arena.get(id).unwrap();
            assert!(e.is_collectible);
            match kind {
                CollectibleKind::PlusScore => assert_eq!((e.has_score, e.score), (true, 100)),
                CollectibleKind::MinusScore => assert_eq!((e.has_score, e.score), (true, -100)),
                CollectibleKind::PlusTime => assert_eq!((e.has_time, e.time), (true, 10)),
                CollectibleKind::MinusTime => assert_eq!((e.has_time, e.time), (true, -10)),
                CollectibleKind::SpawnPlanet => assert!(e.spawn_planet),
            }
        }
        assert_eq!(arena.len(), 5);
    }

    #[test]
    fn test_enemy_ship_factory() {
        let mut world = PhysicsWorld::new();
        let mut arena = EntityArena::new();
        let id = arena
            .spawn_enemy_ship(&mut world, Vector::new(-30.0, 10.0), Vector::new(1.0, 0.0), 0.5)
            .unwrap();
        let ship = arena.get(id).unwrap();
        assert!(ship.is_enemy);
        let fixtures = world.fixtures(ship.body.unwrap());
        assert!(matches!(&fixtures[0].shape, ShapeState::Polygon { vertices } if vertices.len() == 5));
    }

    #[test]
    fn test_collectible_save_rejected() {
        let mut world = PhysicsWorld::new();
        let mut arena = EntityArena::new();
        let id = arena
            .spawn_collectible(&mut world, Vector::ZERO, CollectibleKind::PlusScore)
            .unwrap();

        let mut out = Vec::new();
        let err = arena.get(id).unwrap().save(&world, &mut out).unwrap_err();
        assert!(matches!(err, SnapshotError::UnsupportedShape { index: 0, .. }));
        assert!(out.is_empty());
    }

    #[test]
    fn test_bodyless_entity_roundtrip() {
        let world = PhysicsWorld::new();
        let mut trail = Trail::new(30.0, 1.0);
        trail.points = vec![
            TrailPoint { position: Vector::new(1.0, 2.0), timestamp: 0.25 },
            TrailPoint { position: Vector::new(-1.0, 0.5), timestamp: 0.75 },
        ];
        let entity = Entity {
            has_gravity: true,
            gravity_coefficient: 1234.5,
            has_trail: true,
            trail: trail.clone(),
            is_affected_by_gravity: true,
            is_sun: false,
            is_planet: true,
            has_score: true,
            score: 99,
            ..Entity::default()
        };

        let bytes = save_bytes(&entity, &world);
        let mut world = PhysicsWorld::new();
        let mut arena = EntityArena::new();
        let id = arena.load_entity(&mut bytes.as_slice(), &mut world).unwrap();
        let loaded = arena.get(id).unwrap();

        assert!(!loaded.has_physics());
        assert_eq!(loaded.gravity_coefficient, 1234.5);
        assert!(loaded.has_gravity);
        assert_eq!(loaded.trail, trail);
        assert!(loaded.is_affected_by_gravity && loaded.is_planet && !loaded.is_sun);
        // Score is not part of the persisted subset.
        assert!(!loaded.has_score);
        assert_eq!(loaded.score, 0);
    }

    #[test]
    fn test_trail_omitted_when_absent() {
        let world = PhysicsWorld::new();
        let entity = Entity {
            gravity_coefficient: 7.0,
            ..Entity::default()
        };
        // has_physics, has_gravity, coeff, has_trail, three role flags
        assert_eq!(save_bytes(&entity, &world).len(), 1 + 1 + 4 + 1 + 3);
    }

    #[test]
    fn test_save_load_save_is_identical() {
        let mut world = PhysicsWorld::new();
        let mut arena = EntityArena::new();
        let id = arena
            .spawn_planet(&mut world, Vector::new(20.0, 20.0), 2.0, 1.0, Vector::new(3.0, -4.0))
            .unwrap();
        arena
            .get_mut(id)
            .unwrap()
            .trail
            .update(Vector::new(20.0, 20.0), 0.5);

        let first = save_bytes(arena.get(id).unwrap(), &world);

        let mut world2 = PhysicsWorld::new();
        let mut arena2 = EntityArena::new();
        let id2 = arena2.load_entity(&mut first.as_slice(), &mut world2).unwrap();
        let second = save_bytes(arena2.get(id2).unwrap(), &world2);

        assert_eq!(first, second);
        let handle = arena2.get(id2).unwrap().body.unwrap();
        assert_eq!(arena2.by_body(&world2, handle).map(|(id, _)| id), Some(id2));
    }

    #[test]
    fn test_truncated_world_leaves_nothing_registered() {
        let mut world = PhysicsWorld::new();
        let mut arena = EntityArena::new();
        arena.spawn_sun(&mut world, Vector::ZERO, 6.0, 1000.0, 130_000.0).unwrap();
        arena
            .spawn_planet(&mut world, Vector::new(20.0, 20.0), 2.0, 1.0, Vector::ZERO)
            .unwrap();

        let mut bytes = Vec::new();
        assert_eq!(arena.save_world(&world, &mut bytes).unwrap(), 2);
        bytes.truncate(bytes.len() - 2);

        let mut world2 = PhysicsWorld::new();
        let mut arena2 = EntityArena::new();
        let err = arena2.load_world(&mut bytes.as_slice(), &mut world2).unwrap_err();
        assert!(matches!(err, SnapshotError::Codec(CodecError::Truncated { .. })));
        assert!(arena2.is_empty());
        assert_eq!(world2.rigid_body_set.len(), 0);
    }

    #[test]
    fn test_world_roundtrip_skips_transient_entities() {
        let mut world = PhysicsWorld::new();
        let mut arena = EntityArena::new();
        arena.spawn_sun(&mut world, Vector::ZERO, 6.0, 1000.0, 130_000.0).unwrap();
        arena
            .spawn_collectible(&mut world, Vector::new(5.0, 5.0), CollectibleKind::PlusTime)
            .unwrap();
        arena
            .spawn_planet(&mut world, Vector::new(20.0, 20.0), 2.0, 1.0, Vector::ZERO)
            .unwrap();

        let mut bytes = Vec::new();
        arena.save_world(&world, &mut bytes).unwrap();

        let mut world2 = PhysicsWorld::new();
        let mut arena2 = EntityArena::new();
        let ids = arena2.load_world(&mut bytes.as_slice(), &mut world2).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(arena2.get(ids[0]).unwrap().is_sun);
        assert!(arena2.get(ids[1]).unwrap().is_planet);
        assert_eq!(world2.rigid_body_set.len(), 2);
    }

    #[test]
    fn test_despawn_releases_body() {
        let mut world = PhysicsWorld::new();
        let mut arena = EntityArena::new();
        let id = arena
            .spawn_planet(&mut world, Vector::ZERO, 1.0, 1.0, Vector::ZERO)
            .unwrap();
        let handle = arena.get(id).unwrap().body.unwrap();

        let removed = arena.despawn(&mut world, id).unwrap();
        assert!(removed.body.is_none());
        assert!(world.get_rigid_body(handle).is_none());
        assert!(arena.get(id).is_none());
        assert!(arena.despawn(&mut world, id).is_none());
    }

    #[test]
    fn test_rotated_bodies_save_identically_after_reload() {
        for i in 1..200u16 {
            let angle = f32::from(i) * 0.0317;
            let mut world = PhysicsWorld::new();
            let mut arena = EntityArena::new();
            let id = arena
                .spawn_planet(&mut world, Vector::new(20.0, 20.0), 2.0, 1.0, Vector::new(3.0, -4.0))
                .unwrap();
            let handle = arena.get(id).unwrap().body.unwrap();
            world
                .get_rigid_body_mut(handle)
                .unwrap()
                .set_rotation(Rotation::from_angle(angle), false);

            let first = save_bytes(arena.get(id).unwrap(), &world);
            let mut world2 = PhysicsWorld::new();
            let mut arena2 = EntityArena::new();
            let id2 = arena2.load_entity(&mut first.as_slice(), &mut world2).unwrap();
            let second = save_bytes(arena2.get(id2).unwrap(), &world2);

            assert_eq!(first, second, "angle {angle}");
        }
    }

    #[test]
    fn test_missing_body_behind_physics_flag_is_malformed() {
        // has_physics set, body presence flag cleared, then the rest of a record.
        let bytes = [1u8, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let mut world = PhysicsWorld::new();
        let mut arena = EntityArena::new();
        let err = arena.load_entity(&mut bytes.as_slice(), &mut world).unwrap_err();
        assert!(matches!(err, SnapshotError::Malformed(_)));
        assert!(arena.is_empty());
    }

    #[test]
    fn test_hulls_use_default_material() {
        let mut world = PhysicsWorld::new();
        let mut arena = EntityArena::new();
        let bonus = arena
            .spawn_collectible(&mut world, Vector::ZERO, CollectibleKind::PlusScore)
            .unwrap();
        let ship = arena
            .spawn_enemy_ship(&mut world, Vector::new(10.0, 0.0), Vector::ZERO, 0.0)
            .unwrap();
        for id in [bonus, ship] {
            let fixture = &world.fixtures(arena.get(id).unwrap().body.unwrap())[0];
            assert_eq!(fixture.density, DEFAULT_DENSITY);
            assert_eq!(fixture.friction, DEFAULT_FRICTION);
        }
    }
}
