//! Fixtures shared by the unit tests.

use std::path::PathBuf;

use rapier2d::prelude::Vector;

use crate::camera::Viewport;
use crate::entity::{EntityArena, EntityId};
use crate::physics::PhysicsWorld;
use crate::session::{DEFAULT_TIME_LIMIT, Simulation};

/// The default scene: a sun at the origin and a resting planet at (20, 20).
pub fn sun_and_planet() -> (PhysicsWorld, EntityArena, EntityId, EntityId) {
    let mut world = PhysicsWorld::new();
    let mut arena = EntityArena::new();
    let sun = arena
        .spawn_sun(&mut world, Vector::ZERO, 6.0, 1000.0, 130_000.0)
        .unwrap();
    let planet = arena
        .spawn_planet(&mut world, Vector::new(20.0, 20.0), 2.0, 1.0, Vector::ZERO)
        .unwrap();
    (world, arena, sun, planet)
}

/// Two equal suns at (10, 0) and (-10, 0).
pub fn two_suns() -> (PhysicsWorld, EntityArena) {
    let mut world = PhysicsWorld::new();
    let mut arena = EntityArena::new();
    for x in [10.0, -10.0] {
        arena
            .spawn_sun(&mut world, Vector::new(x, 0.0), 1.0, 1.0, 500.0)
            .unwrap();
    }
    (world, arena)
}

/// A paused session over [`sun_and_planet`], tracking the planet.
pub fn simulation() -> Simulation {
    let (world, arena, sun, planet) = sun_and_planet();
    let mut sim = Simulation::new(Viewport::new(800, 600), DEFAULT_TIME_LIMIT, 0.0);
    sim.world = world;
    sim.arena = arena;
    sim.track(planet);
    sim.set_sun(sun);
    sim.reset(0.0);
    sim
}

/// A fresh path in the system temp directory, unique per process and name.
pub fn scratch_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("orbit-test-{}-{name}", std::process::id()))
}
