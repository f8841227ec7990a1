//! Integer tile grid coordinates

use std::fmt;

use glam::Vec3;

/// Integer coordinate of a tile slot on the XZ plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GridPosition {
    pub x: i32,
    pub z: i32,
}

impl GridPosition {
    /// Grid origin `(0, 0)`
    pub const ORIGIN: Self = Self::new(0, 0);

    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Tile slot containing a world-space point
    ///
    /// Uses floor division so negative coordinates map to negative slots.
    pub fn from_world(point: Vec3, tile_length: f32) -> Self {
        Self {
            x: (point.x / tile_length).floor() as i32,
            z: (point.z / tile_length).floor() as i32,
        }
    }

    /// World-space corner of this tile (minimum X/Z, Y = 0)
    pub fn world_origin(self, tile_length: f32) -> Vec3 {
        Vec3::new(self.x as f32 * tile_length, 0.0, self.z as f32 * tile_length)
    }

    /// World-space center of this tile (Y = 0)
    pub fn world_center(self, tile_length: f32) -> Vec3 {
        self.world_origin(tile_length) + Vec3::new(tile_length * 0.5, 0.0, tile_length * 0.5)
    }

    /// Neighbouring slot, saturating at the edge of the grid
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.z.saturating_add(dz))
    }

    /// Neighbouring slot, or `None` past the edge of the grid
    pub fn checked_offset(self, dx: i32, dz: i32) -> Option<Self> {
        Some(Self::new(self.x.checked_add(dx)?, self.z.checked_add(dz)?))
    }

    /// Euclidean distance in tile units
    pub fn distance(self, other: Self) -> f32 {
        let dx = (i64::from(self.x) - i64::from(other.x)) as f32;
        let dz = (i64::from(self.z) - i64::from(other.z)) as f32;
        (dx * dx + dz * dz).sqrt()
    }
}

impl fmt::Display for GridPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Circle predicate shared by tile selection: `dx² + dz² < radius²` (strict).
pub fn within_radius(center: GridPosition, position: GridPosition, radius: u32) -> bool {
    let dx = i64::from(position.x) - i64::from(center.x);
    let dz = i64::from(position.z) - i64::from(center.z);
    let r = i64::from(radius);
    dx * dx + dz * dz < r * r
}

/// All grid positions inside the circular footprint around `center`.
///
/// Offsets are enumerated with `dx` as the outer loop and `dz` as the inner
/// loop, both ascending over `[-radius, radius]`. Radius 0 selects nothing.
/// Slots past the edge of the `i32` grid are left out.
///
/// # Arguments
/// * `center` - Slot the footprint is centred on
/// * `radius` - Footprint radius in tiles (strict: `dx² + dz² < radius²`)
///
/// # Returns
/// The selected positions in enumeration order
pub fn positions_within_radius(center: GridPosition, radius: u32) -> Vec<GridPosition> {
    let r = i32::try_from(radius).unwrap_or(i32::MAX);
    let mut positions = Vec::new();

    for dx in -r..=r {
        for dz in -r..=r {
            let Some(position) = center.checked_offset(dx, dz) else {
                continue;
            };
            if within_radius(center, position, radius) {
                positions.push(position);
            }
        }
    }

    positions
}
