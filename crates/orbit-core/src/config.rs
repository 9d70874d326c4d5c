//! Scenario configuration loaded from JSON.

use std::path::{Path, PathBuf};

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rapier2d::prelude::Vector;
use serde::{Deserialize, Serialize};

use crate::body::SnapshotError;
use crate::camera::Viewport;
use crate::entity::{CollectibleKind, EntityId};
use crate::session::{DEFAULT_TIME_LIMIT, Simulation};
use crate::trail::{DEFAULT_TRAIL_LENGTH, DEFAULT_TRAIL_WINDOW, Trail};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("failed to build scenario: {0}")]
    Spawn(#[from] SnapshotError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SunConfig {
    pub position: [f32; 2],
    pub radius: f32,
    pub density: f32,
    pub gravity_coefficient: f32,
}

impl Default for SunConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0],
            radius: 6.0,
            density: 1000.0,
            gravity_coefficient: 130_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanetConfig {
    pub position: [f32; 2],
    pub radius: f32,
    pub density: f32,
    pub velocity: [f32; 2],
}

impl Default for PlanetConfig {
    fn default() -> Self {
        Self {
            position: [20.0, 20.0],
            radius: 2.0,
            density: 1.0,
            velocity: [0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailConfig {
    pub length: f32,
    /// Seconds of history kept.
    pub window: f32,
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            length: DEFAULT_TRAIL_LENGTH,
            window: DEFAULT_TRAIL_WINDOW,
        }
    }
}

/// Rectangle that random spawns are drawn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnArea {
    pub x: [f32; 2],
    pub y: [f32; 2],
}

/// Collectibles placed at seeded random positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatterConfig {
    pub seed: u64,
    pub count: usize,
    pub area: SpawnArea,
}

impl Default for ScatterConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            count: 0,
            area: SpawnArea {
                x: [-60.0, 60.0],
                y: [-60.0, 60.0],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub viewport: Viewport,
    pub time_limit: i32,
    pub sun: SunConfig,
    pub planet: PlanetConfig,
    pub trail: TrailConfig,
    pub collectibles: ScatterConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            time_limit: DEFAULT_TIME_LIMIT,
            sun: SunConfig::default(),
            planet: PlanetConfig::default(),
            trail: TrailConfig::default(),
            collectibles: ScatterConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time_limit <= 0 {
            return Err(ConfigError::Invalid(format!(
                "time_limit must be positive, got {}",
                self.time_limit
            )));
        }
        for (name, radius) in [("sun", self.sun.radius), ("planet", self.planet.radius)] {
            if !(radius.is_finite() && radius > 0.0) {
                return Err(ConfigError::Invalid(format!("{name} radius must be positive")));
            }
        }
        if self.trail.window < 0.0 {
            return Err(ConfigError::Invalid("trail window must not be negative".to_string()));
        }
        let area = &self.collectibles.area;
        if self.collectibles.count > 0 && !(area.x[0] < area.x[1] && area.y[0] < area.y[1]) {
            return Err(ConfigError::Invalid(format!(
                "collectible area {:?} x {:?} is empty",
                area.x, area.y
            )));
        }
        Ok(())
    }

    /// Builds a paused session: the planet (tracked), the sun, then the
    /// scattered collectibles.
    pub fn build(&self, now: f64) -> Result<Simulation, ConfigError> {
        self.validate()?;
        let mut sim = Simulation::new(self.viewport, self.time_limit, now);

        let planet = sim.arena.spawn_planet(
            &mut sim.world,
            Vector::from(self.planet.position),
            self.planet.radius,
            self.planet.density,
            Vector::from(self.planet.velocity),
        )?;
        if let Some(entity) = sim.arena.get_mut(planet) {
            entity.trail = Trail::new(self.trail.length, self.trail.window);
        }

        let sun = sim.arena.spawn_sun(
            &mut sim.world,
            Vector::from(self.sun.position),
            self.sun.radius,
            self.sun.density,
            self.sun.gravity_coefficient,
        )?;

        let scattered = self.scatter_collectibles(&mut sim)?;

        sim.track(planet);
        sim.set_sun(sun);
        sim.reset(now);
        tracing::info!(
            entities = sim.arena.len(),
            collectibles = scattered.len(),
            "scenario built"
        );
        Ok(sim)
    }

    fn scatter_collectibles(&self, sim: &mut Simulation) -> Result<Vec<EntityId>, ConfigError> {
        let scatter = &self.collectibles;
        let mut rng = ChaCha8Rng::seed_from_u64(scatter.seed);
        let mut ids = Vec::with_capacity(scatter.count);
        for _ in 0..scatter.count {
            let x = rng.random_range(scatter.area.x[0]..scatter.area.x[1]);
            let y = rng.random_range(scatter.area.y[0]..scatter.area.y[1]);
            let kind = CollectibleKind::ALL[rng.random_range(0..CollectibleKind::ALL.len())];
            ids.push(sim.arena.spawn_collectible(&mut sim.world, Vector::new(x, y), kind)?);
        }
        Ok(ids)
    }
}
