//! Time-windowed position history for one tracked body.

use std::io::{Read, Write};

use rapier2d::prelude::Vector;
use serde::{Deserialize, Serialize};

use crate::codec::{CodecError, Decoder, Encoder};

/// Display length used for planet trails.
pub const DEFAULT_TRAIL_LENGTH: f32 = 30.0;

/// Retention window used for planet trails (seconds).
pub const DEFAULT_TRAIL_WINDOW: f32 = 1.0;

/// A recorded position and the session time it was taken at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailPoint {
    pub position: Vector,
    pub timestamp: f32,
}

/// Chronological (oldest first) history of recent positions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trail {
    /// Configured display length. Persisted but not enforced as a cap.
    pub max_age: f32,
    /// Points older than `now - retention_window` are pruned on update.
    pub retention_window: f32,
    pub points: Vec<TrailPoint>,
}

impl Trail {
    pub fn new(max_age: f32, retention_window: f32) -> Self {
        Self {
            max_age,
            retention_window,
            points: Vec::new(),
        }
    }

    /// Drops points outside the retention window, then records `position` at `now`.
    pub fn update(&mut self, position: Vector, now: f32) {
        let cutoff = now - self.retention_window;
        self.points.retain(|p| p.timestamp >= cutoff);
        self.points.push(TrailPoint {
            position,
            timestamp: now,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Opacity in `[0, 1]` for a point, newest fully opaque, fading with age.
    pub fn fade(&self, point: &TrailPoint, now: f32) -> f32 {
        if self.retention_window <= 0.0 {
            return 1.0;
        }
        (1.0 - (now - point.timestamp) / self.retention_window).clamp(0.0, 1.0)
    }

    /// Consecutive point pairs, oldest first, with the opacity of the newer point.
    pub fn segments(&self, now: f32) -> impl Iterator<Item = (Vector, Vector, f32)> + '_ {
        self.points
            .windows(2)
            .map(move |pair| (pair[0].position, pair[1].position, self.fade(&pair[1], now)))
    }

    pub fn save<W: Write>(&self, out: &mut W) -> Result<(), CodecError> {
        self.encode(&mut Encoder::new(out))
    }

    pub fn load<R: Read>(input: &mut R) -> Result<Self, CodecError> {
        Self::decode(&mut Decoder::new(input))
    }

    pub(crate) fn encode<W: Write>(&self, enc: &mut Encoder<W>) -> Result<(), CodecError> {
        enc.write_f32(self.max_age)?;
        enc.write_f32(self.retention_window)?;
        enc.write_len(self.points.len(), "trail_point_count")?;
        for point in &self.points {
            enc.write_vec2(point.position)?;
            enc.write_f32(point.timestamp)?;
        }
        Ok(())
    }

    pub(crate) fn decode<R: Read>(dec: &mut Decoder<R>) -> Result<Self, CodecError> {
        let max_age = dec.read_f32("trail_max_age")?;
        let retention_window = dec.read_f32("trail_window")?;
        let count = dec.read_len("trail_point_count")?;
        let mut points = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let position = dec.read_vec2("trail_point_position")?;
            let timestamp = dec.read_f32("trail_point_time")?;
            points.push(TrailPoint {
                position,
                timestamp,
            });
        }
        Ok(Self {
            max_age,
            retention_window,
            points,
        })
    }
}
