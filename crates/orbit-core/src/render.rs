//! Render-facing data surface.
//!
//! The simulation never talks to a graphics API. It resolves textures through
//! a [`TextureCache`] and hands plain draw data to a [`RenderTarget`].

use rapier2d::prelude::Vector;
use serde::{Deserialize, Serialize};

/// Opaque handle issued by a [`TextureCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// RGBA color representation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Same color with alpha scaled to `opacity` in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn with_opacity(self, opacity: f32) -> Self {
        let a = (f32::from(self.a) * opacity.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }

    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const HUD: Color = Color::new(0, 0, 0, 128);
}

/// Textured quad attached to an entity, keyed by texture name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visual {
    pub texture: String,
    /// Half-size of the quad in world units.
    pub scale: f32,
    pub color: Color,
}

impl Visual {
    pub fn textured(texture: &str, scale: f32) -> Self {
        Self {
            texture: texture.to_string(),
            scale,
            color: Color::WHITE,
        }
    }
}

/// Resolves texture names to handles.
pub trait TextureCache {
    fn texture(&mut self, name: &str) -> Option<TextureHandle>;
}

/// Where HUD text is anchored on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    TopLeft,
    TopRight,
}

/// One entity quad, ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDraw {
    pub texture: TextureHandle,
    pub position: Vector,
    pub angle: f32,
    pub scale: f32,
    pub color: Color,
}

/// Receives draw calls from the simulation.
pub trait RenderTarget {
    fn draw_entity(&mut self, draw: &EntityDraw);
    fn draw_line(&mut self, from: Vector, to: Vector, color: Color);
    fn draw_text(&mut self, text: &str, color: Color, anchor: TextAnchor);
}

/// Zero-padded six digit score.
pub fn format_score(score: i32) -> String {
    format!("{score:06}")
}

/// `MM:SS` clock for a number of seconds.
pub fn format_clock(seconds: i32) -> String {
    let seconds = seconds.max(0);
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
