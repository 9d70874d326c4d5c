//! Inverse-square attraction between gravity sources and every other body.

use rapier2d::prelude::{RigidBodyHandle, Vector};

use crate::entity::{EntityArena, EntityId};
use crate::physics::PhysicsWorld;

/// Sources closer than this (squared) contribute nothing to a body.
pub const MIN_DISTANCE_SQUARED: f32 = 1e-6;

/// Beyond this distance from the sun the tracked body earns no score.
pub const SCORE_DISTANCE_LIMIT: f32 = 100.0;

/// Position and strength of one attracting entity, sampled once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GravitySource {
    pub entity: EntityId,
    pub position: Vector,
    pub coefficient: f32,
}

/// Samples every entity with `has_gravity` and a live body.
pub fn collect_sources(arena: &EntityArena, world: &PhysicsWorld) -> Vec<GravitySource> {
    arena
        .iter()
        .filter(|(_, e)| e.has_gravity)
        .filter_map(|(id, e)| {
            let position = world.position(e.body?)?;
            Some(GravitySource {
                entity: id,
                position,
                coefficient: e.gravity_coefficient,
            })
        })
        .collect()
}

/// Net pull on a body at `target`: `Σ coefficient / d² · unit(source - target)`.
///
/// A source co-located with the target is skipped.
pub fn accumulate_gravity(target: Vector, sources: &[GravitySource]) -> Vector {
    sources.iter().fold(Vector::ZERO, |acc, source| {
        let delta = source.position - target;
        let r2 = delta.length_squared();
        if r2 < MIN_DISTANCE_SQUARED {
            tracing::warn!(source = source.entity.0, "gravity source co-located with body");
            return acc;
        }
        acc + delta.normalize_or_zero() * (source.coefficient / r2)
    })
}

/// Replaces the force on every non-source body with the pull of all sources.
///
/// Returns the number of bodies that received a force.
pub fn apply_gravity(arena: &EntityArena, world: &mut PhysicsWorld) -> usize {
    let sources = collect_sources(arena, world);

    let targets: Vec<(RigidBodyHandle, Vector)> = arena
        .iter()
        .filter(|(_, e)| !e.has_gravity)
        .filter_map(|(_, e)| {
            let handle = e.body?;
            Some((handle, world.position(handle)?))
        })
        .collect();

    for (handle, position) in &targets {
        let force = accumulate_gravity(*position, &sources);
        if let Some(body) = world.get_rigid_body_mut(*handle) {
            body.reset_forces(false);
            body.add_force(force, true);
        }
    }
    targets.len()
}

/// Score earned in one frame: `trunc(speed * distance / 100)`, where a
/// distance above [`SCORE_DISTANCE_LIMIT`] counts as zero.
#[allow(clippy::cast_possible_truncation)]
pub fn score_increment(speed: f32, distance: f32) -> i32 {
    let distance = if distance > SCORE_DISTANCE_LIMIT { 0.0 } else { distance };
    (speed * distance / 100.0) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sun_and_planet, two_suns};

    fn source(position: Vector, coefficient: f32) -> GravitySource {
        GravitySource {
            entity: EntityId(0),
            position,
            coefficient,
        }
    }

    #[test]
    fn test_symmetric_sources_cancel_at_origin() {
        let sources = [
            source(Vector::new(10.0, 0.0), 500.0),
            source(Vector::new(-10.0, 0.0), 500.0),
        ];
        let force = accumulate_gravity(Vector::ZERO, &sources);
        assert!(force.length() < 1e-6, "{force:?}");
    }

    #[test]
    fn test_nearer_source_dominates() {
        let sources = [
            source(Vector::new(10.0, 0.0), 500.0),
            source(Vector::new(-10.0, 0.0), 500.0),
        ];
        let force = accumulate_gravity(Vector::new(5.0, 0.0), &sources);
        // 500/25 toward +x, 500/225 toward -x
        assert!(force.x > 0.0);
        assert!((force.x - (20.0 - 500.0 / 225.0)).abs() < 1e-4);
        assert!(force.y.abs() < 1e-6);
    }

    #[test]
    fn test_colocated_source_is_skipped() {
        let sources = [source(Vector::new(3.0, 4.0), 1000.0), source(Vector::ZERO, 25.0)];
        let force = accumulate_gravity(Vector::new(3.0, 4.0), &sources);
        assert!(force.x.is_finite() && force.y.is_finite());
        // Only the origin source, at distance 5, pulls.
        assert!((force.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_score_increment() {
        assert_eq!(score_increment(10.0, 50.0), 5);
        assert_eq!(score_increment(10.0, 150.0), 0);
        assert_eq!(score_increment(10.0, 100.0), 10);
        assert_eq!(score_increment(3.0, 30.0), 0);
    }

    #[test]
    fn test_sources_are_not_pulled() {
        let (mut world, arena, sun, planet) = sun_and_planet();
        assert_eq!(apply_gravity(&arena, &mut world), 1);

        let sun_body = world.get_rigid_body(arena.get(sun).unwrap().body.unwrap()).unwrap();
        assert_eq!(sun_body.user_force().x, 0.0);
        assert_eq!(sun_body.user_force().y, 0.0);

        let planet_body = world.get_rigid_body(arena.get(planet).unwrap().body.unwrap()).unwrap();
        // Planet at (20, 20), sun at the origin: pull points down-left.
        assert!(planet_body.user_force().x < 0.0);
        assert!(planet_body.user_force().y < 0.0);
    }

    #[test]
    fn test_force_is_replaced_each_frame() {
        let (mut world, arena, _, planet) = sun_and_planet();
        apply_gravity(&arena, &mut world);
        let handle = arena.get(planet).unwrap().body.unwrap();
        let first = world.get_rigid_body(handle).unwrap().user_force();
        apply_gravity(&arena, &mut world);
        let second = world.get_rigid_body(handle).unwrap().user_force();
        assert_eq!(first.x, second.x);
        assert_eq!(first.y, second.y);
    }

    #[test]
    fn test_planet_falls_toward_sun() {
        let (mut world, arena, _, planet) = sun_and_planet();
        let handle = arena.get(planet).unwrap().body.unwrap();
        let start = world.position(handle).unwrap().length();
        for _ in 0..30 {
            apply_gravity(&arena, &mut world);
            world.step_dt(0.005);
        }
        assert!(world.position(handle).unwrap().length() < start);
    }

    #[test]
    fn test_collect_sources() {
        let (world, arena) = two_suns();
        let sources = collect_sources(&arena, &world);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].position, Vector::new(10.0, 0.0));
        assert_eq!(sources[1].position, Vector::new(-10.0, 0.0));
    }
}
