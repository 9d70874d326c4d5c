//! Persisted form of a single physics body.
//!
//! Layout written by [`save_body`]:
//!
//! ```text
//! present: flag
//! kind: i32, position: vec2, angle: f32, linvel: vec2, angvel: f32
//! fixture_count: u32
//! fixture*: friction f32, density f32, restitution f32, center vec2, radius f32
//! ```
//!
//! An absent body is a single false flag.

use std::io::{Read, Write};

use rapier2d::prelude::*;
use serde::{Deserialize, Serialize};

use crate::codec::{CodecError, Decoder, Encoder};
use crate::physics::PhysicsWorld;

/// Friction of a fixture built without explicit material.
pub const DEFAULT_FRICTION: f32 = 0.2;

/// Density of a fixture built without explicit material.
pub const DEFAULT_DENSITY: f32 = 0.0;

/// Restitution of a fixture built without explicit material.
pub const DEFAULT_RESTITUTION: f32 = 0.0;

/// Mass of a dynamic body whose fixtures carry no density.
pub const DEFAULT_BODY_MASS: f32 = 1.0;

/// Error type for body and entity snapshots.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// A fixture with a non-circular shape cannot be persisted.
    #[error("only circle shapes can be saved, fixture {index} is a {kind}")]
    UnsupportedShape { index: usize, kind: &'static str },
    #[error("unknown body kind code {0}")]
    InvalidBodyKind(i32),
    /// The body was persisted but cannot be rebuilt in the physics world.
    #[error("malformed body: {0}")]
    Malformed(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Body simulation type, persisted as an integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    Static,
    Kinematic,
    Dynamic,
}

impl BodyKind {
    pub fn code(self) -> i32 {
        match self {
            Self::Static => 0,
            Self::Kinematic => 1,
            Self::Dynamic => 2,
        }
    }

    pub fn from_code(code: i32) -> Result<Self, SnapshotError> {
        match code {
            0 => Ok(Self::Static),
            1 => Ok(Self::Kinematic),
            2 => Ok(Self::Dynamic),
            other => Err(SnapshotError::InvalidBodyKind(other)),
        }
    }

    fn from_rapier(body_type: RigidBodyType) -> Self {
        match body_type {
            RigidBodyType::Fixed => Self::Static,
            RigidBodyType::KinematicPositionBased | RigidBodyType::KinematicVelocityBased => {
                Self::Kinematic
            }
            RigidBodyType::Dynamic => Self::Dynamic,
        }
    }

    fn to_rapier(self) -> RigidBodyType {
        match self {
            Self::Static => RigidBodyType::Fixed,
            Self::Kinematic => RigidBodyType::KinematicVelocityBased,
            Self::Dynamic => RigidBodyType::Dynamic,
        }
    }
}

/// Collision geometry of one fixture, in body-local coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeState {
    Circle { center: Vector, radius: f32 },
    /// Convex polygon, counter-clockwise vertices.
    Polygon { vertices: Vec<Vector> },
}

impl ShapeState {
    fn kind_name(&self) -> &'static str {
        match self {
            Self::Circle { .. } => "circle",
            Self::Polygon { .. } => "polygon",
        }
    }

    /// Radius around the body origin that encloses the shape.
    pub fn bounding_radius(&self) -> f32 {
        match self {
            Self::Circle { center, radius } => center.length() + radius,
            Self::Polygon { vertices } => vertices
                .iter()
                .map(|v| v.length())
                .fold(0.0, f32::max),
        }
    }

    /// Point containment test in body-local coordinates.
    pub fn contains_local_point(&self, point: Vector) -> bool {
        match self {
            Self::Circle { center, radius } => (point - *center).length_squared() <= radius * radius,
            Self::Polygon { vertices } => {
                if vertices.len() < 3 {
                    return false;
                }
                vertices.iter().zip(vertices.iter().cycle().skip(1)).all(|(a, b)| {
                    let edge = *b - *a;
                    let rel = point - *a;
                    edge.x * rel.y - edge.y * rel.x >= 0.0
                })
            }
        }
    }

    fn to_shared_shape(&self) -> Result<SharedShape, SnapshotError> {
        match self {
            Self::Circle { radius, .. } => {
                if !radius.is_finite() || *radius <= 0.0 {
                    return Err(SnapshotError::Malformed(format!(
                        "circle radius {radius} is not positive"
                    )));
                }
                Ok(SharedShape::ball(*radius))
            }
            Self::Polygon { vertices } => {
                SharedShape::convex_polyline(vertices.clone()).ok_or_else(|| {
                    SnapshotError::Malformed(format!(
                        "polygon with {} vertices is not convex",
                        vertices.len()
                    ))
                })
            }
        }
    }

    /// Local offset of the collider relative to its parent body.
    fn offset(&self) -> Vector {
        match self {
            Self::Circle { center, .. } => *center,
            Self::Polygon { .. } => Vector::ZERO,
        }
    }
}

/// One collision fixture: material plus shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureState {
    pub friction: f32,
    pub density: f32,
    pub restitution: f32,
    pub shape: ShapeState,
}

impl FixtureState {
    pub fn circle(center: Vector, radius: f32, friction: f32, density: f32, restitution: f32) -> Self {
        Self {
            friction,
            density,
            restitution,
            shape: ShapeState::Circle { center, radius },
        }
    }

    /// Convex polygon with the default material.
    pub fn polygon(vertices: Vec<Vector>) -> Self {
        Self {
            friction: DEFAULT_FRICTION,
            density: DEFAULT_DENSITY,
            restitution: DEFAULT_RESTITUTION,
            shape: ShapeState::Polygon { vertices },
        }
    }

    /// Reads material and geometry from a live collider.
    pub fn capture(collider: &Collider) -> Self {
        let offset = collider
            .position_wrt_parent()
            .map_or(Vector::ZERO, |pose| pose.translation);

        let shape = collider.shape();
        let shape = if let Some(ball) = shape.as_ball() {
            ShapeState::Circle {
                center: offset,
                radius: ball.radius,
            }
        } else if let Some(cuboid) = shape.as_cuboid() {
            let (hx, hy) = (cuboid.half_extents.x, cuboid.half_extents.y);
            ShapeState::Polygon {
                vertices: vec![
                    Vector::new(-hx, -hy) + offset,
                    Vector::new(hx, -hy) + offset,
                    Vector::new(hx, hy) + offset,
                    Vector::new(-hx, hy) + offset,
                ],
            }
        } else if let Some(polygon) = shape.as_convex_polygon() {
            ShapeState::Polygon {
                vertices: polygon
                    .points()
                    .iter()
                    .map(|p| Vector::new(p.x, p.y) + offset)
                    .collect(),
            }
        } else {
            ShapeState::Polygon { vertices: Vec::new() }
        };

        Self {
            friction: collider.friction(),
            density: collider.density(),
            restitution: collider.restitution(),
            shape,
        }
    }

    fn to_collider(&self, user_data: u128) -> Result<Collider, SnapshotError> {
        Ok(ColliderBuilder::new(self.shape.to_shared_shape()?)
            .translation(self.shape.offset())
            .friction(self.friction)
            .density(self.density)
            .restitution(self.restitution)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .user_data(user_data)
            .build())
    }
}

/// Persisted state of one physics body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyState {
    pub kind: BodyKind,
    pub position: Vector,
    pub angle: f32,
    pub linear_velocity: Vector,
    pub angular_velocity: f32,
    /// Fixtures in creation order.
    pub fixtures: Vec<FixtureState>,
}

impl BodyState {
    /// A body at rest at `position` with no fixtures.
    pub fn new(kind: BodyKind, position: Vector) -> Self {
        Self {
            kind,
            position,
            angle: 0.0,
            linear_velocity: Vector::ZERO,
            angular_velocity: 0.0,
            fixtures: Vec::new(),
        }
    }

    pub fn with_fixture(mut self, fixture: FixtureState) -> Self {
        self.fixtures.push(fixture);
        self
    }

    /// Reads the current state of a live body, or `None` if the handle is stale.
    pub fn capture(world: &PhysicsWorld, handle: RigidBodyHandle) -> Option<Self> {
        let body = world.get_rigid_body(handle)?;
        Some(Self {
            kind: BodyKind::from_rapier(body.body_type()),
            position: body.translation(),
            angle: world.angle(handle)?,
            linear_velocity: body.linvel(),
            angular_velocity: body.angvel(),
            fixtures: world.fixtures(handle),
        })
    }

    /// Creates a live body with all fixtures in `world`, tagged with `user_data`.
    ///
    /// Every fixture is validated before anything is inserted, so a failure
    /// leaves the world untouched. A dynamic body whose fixtures have no
    /// density gets [`DEFAULT_BODY_MASS`].
    pub fn materialize(
        &self,
        world: &mut PhysicsWorld,
        user_data: u128,
    ) -> Result<RigidBodyHandle, SnapshotError> {
        let colliders = self
            .fixtures
            .iter()
            .map(|fixture| fixture.to_collider(user_data))
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = RigidBodyBuilder::new(self.kind.to_rapier())
            .translation(self.position)
            .rotation(self.angle)
            .linvel(self.linear_velocity)
            .angvel(self.angular_velocity)
            .user_data(user_data);
        if self.kind == BodyKind::Dynamic && self.fixtures.iter().all(|f| f.density <= 0.0) {
            builder = builder.additional_mass(DEFAULT_BODY_MASS);
        }
        let handle = world.add_rigid_body(builder.build());
        for collider in colliders {
            world.add_collider(collider, handle);
        }
        world.record_angle(handle, self.angle);
        Ok(handle)
    }
}

/// Writes a body (or the absent marker) to `out`.
///
/// On error nothing is written: the record is encoded into a scratch buffer
/// and only copied to `out` once complete.
pub fn save_body<W: Write>(body: Option<&BodyState>, out: &mut W) -> Result<(), SnapshotError> {
    let mut enc = Encoder::new(Vec::new());
    encode_body(body, &mut enc)?;
    out.write_all(&enc.into_inner()).map_err(CodecError::from)?;
    Ok(())
}

pub(crate) fn encode_body<W: Write>(
    body: Option<&BodyState>,
    enc: &mut Encoder<W>,
) -> Result<(), SnapshotError> {
    let Some(body) = body else {
        enc.write_bool(false)?;
        return Ok(());
    };

    // Reject before any byte of the record is produced.
    let circles = body
        .fixtures
        .iter()
        .enumerate()
        .map(|(index, fixture)| match fixture.shape {
            ShapeState::Circle { center, radius } => Ok((fixture, center, radius)),
            ShapeState::Polygon { .. } => Err(SnapshotError::UnsupportedShape {
                index,
                kind: fixture.shape.kind_name(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    enc.write_bool(true)?;
    enc.write_i32(body.kind.code())?;
    enc.write_vec2(body.position)?;
    enc.write_f32(body.angle)?;
    enc.write_vec2(body.linear_velocity)?;
    enc.write_f32(body.angular_velocity)?;
    enc.write_len(circles.len(), "fixture_count")?;
    for (fixture, center, radius) in circles {
        enc.write_f32(fixture.friction)?;
        enc.write_f32(fixture.density)?;
        enc.write_f32(fixture.restitution)?;
        enc.write_vec2(center)?;
        enc.write_f32(radius)?;
    }
    Ok(())
}

/// Reads a body written by [`save_body`]. `Ok(None)` means no body was persisted.
pub fn load_body<R: Read>(input: &mut R) -> Result<Option<BodyState>, SnapshotError> {
    decode_body(&mut Decoder::new(input))
}

pub(crate) fn decode_body<R: Read>(dec: &mut Decoder<R>) -> Result<Option<BodyState>, SnapshotError> {
    if !dec.read_bool("body_present")? {
        return Ok(None);
    }

    let kind = BodyKind::from_code(dec.read_i32("body_kind")?)?;
    let position = dec.read_vec2("position")?;
    let angle = dec.read_f32("angle")?;
    let linear_velocity = dec.read_vec2("linear_velocity")?;
    let angular_velocity = dec.read_f32("angular_velocity")?;
    let count = dec.read_len("fixture_count")?;

    // The count comes from the stream; cap the preallocation.
    let mut fixtures = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        let friction = dec.read_f32("friction")?;
        let density = dec.read_f32("density")?;
        let restitution = dec.read_f32("restitution")?;
        let center = dec.read_vec2("shape_center")?;
        let radius = dec.read_f32("shape_radius")?;
        fixtures.push(FixtureState::circle(center, radius, friction, density, restitution));
    }

    Ok(Some(BodyState {
        kind,
        position,
        angle,
        linear_velocity,
        angular_velocity,
        fixtures,
    }))
}
