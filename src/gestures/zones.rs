use crate::constants::{LEFT_ZONE_FRACTION, RIGHT_ZONE_FRACTION};

/// Horizontal band of the player surface a pointer landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureZone {
    Left,
    Center,
    Right,
}

/// Zone for a pointer at `x` on a surface `width` wide.
///
/// Coordinates outside the surface fall into the nearest edge zone. A surface
/// with no width yet is treated as all centre.
pub fn classify_zone(x: f32, width: f32) -> GestureZone {
    if !(width.is_finite() && width > 0.0) || !x.is_finite() {
        return GestureZone::Center;
    }

    let fraction = x / width;
    if fraction < LEFT_ZONE_FRACTION {
        GestureZone::Left
    } else if fraction >= RIGHT_ZONE_FRACTION {
        GestureZone::Right
    } else {
        GestureZone::Center
    }
}

/// Surface geometry captured at layout time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneLayout {
    pub width: f32,
    pub height: f32,
}

impl ZoneLayout {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn classify(&self, x: f32) -> GestureZone {
        classify_zone(x, self.width)
    }
}
