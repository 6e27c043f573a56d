//! Occupancy grid used as the planner's fused map.
//!
//! The grid stores raw occupancy values in row-major order: `0` is free, `100`
//! is certainly occupied and `-1` marks a cell with no information. The same
//! type carries both the persistent global map and the smaller local sensor
//! view that is overlaid onto it.

#![warn(missing_docs)]

use nalgebra::Vector2;

use super::{GridPoint, MapPoint, WorldPoint};
use crate::error::NavigationError;

/// Occupancy value of a free cell.
pub const OCCUPANCY_FREE: i8 = 0;
/// Occupancy value of a cell that is certainly occupied.
pub const OCCUPANCY_LETHAL: i8 = 100;
/// Occupancy value of a cell with no information.
pub const OCCUPANCY_UNKNOWN: i8 = -1;

/// Georeferencing of a grid: size, cell size, placement and frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MapInfo {
    /// Size in cells along x.
    pub width: usize,
    /// Size in cells along y.
    pub height: usize,
    /// Resolution (world meters per cell).
    pub resolution: f64,
    /// World position of cell (0, 0).
    pub origin: Vector2<f64>,
    /// Frame the origin is expressed in.
    pub frame_id: String,
}

impl Default for MapInfo {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            resolution: 1.0,
            origin: Vector2::zeros(),
            frame_id: String::new(),
        }
    }
}

impl MapInfo {
    /// Creates map metadata, validating the dimensions and resolution.
    pub fn new(
        width: usize,
        height: usize,
        resolution: f64,
        origin: Vector2<f64>,
        frame_id: impl Into<String>,
    ) -> Result<Self, NavigationError> {
        if width == 0 || height == 0 {
            return Err(NavigationError::InvalidDimensions(
                "All dimensions must be non-zero",
            ));
        }
        if !(resolution > 0.0) {
            return Err(NavigationError::InvalidResolution(
                "Resolution must be positive",
            ));
        }
        width
            .checked_mul(height)
            .ok_or(NavigationError::InvalidDimensions(
                "Map dimensions too large, would cause overflow",
            ))?;

        Ok(Self {
            width,
            height,
            resolution,
            origin,
            frame_id: frame_id.into(),
        })
    }

    /// Total number of cells described by this metadata.
    pub fn total_cells(&self) -> usize {
        self.width * self.height
    }

    /// Converts world coordinates to fractional map-grid coordinates.
    pub fn world_to_map(&self, world: &WorldPoint) -> MapPoint {
        MapPoint::from((world.coords - self.origin) / self.resolution)
    }

    /// Converts fractional map-grid coordinates to world coordinates.
    pub fn map_to_world(&self, point: &MapPoint) -> WorldPoint {
        WorldPoint::from(point.coords * self.resolution + self.origin)
    }

    /// The cell containing the given world position. The cell may lie outside the grid.
    pub fn world_to_cell(&self, world: &WorldPoint) -> GridPoint {
        GridPoint::containing(&self.world_to_map(world))
    }

    /// Cell offset of `other`'s origin within this grid, rounded to the nearest cell.
    pub fn cell_offset_of(&self, other: &MapInfo) -> GridPoint {
        let offset = (other.origin - self.origin) / self.resolution;
        GridPoint::new(offset.x.round() as i64, offset.y.round() as i64)
    }

    /// Linear index of a cell, or `None` if the cell lies outside the grid.
    pub fn index_of(&self, cell: GridPoint) -> Option<usize> {
        if cell.x < 0 || cell.y < 0 {
            return None;
        }
        let (x, y) = (cell.x as usize, cell.y as usize);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y * self.width + x)
    }

    /// Whether two grids share a resolution, within floating-point noise.
    pub fn same_resolution(&self, other: &MapInfo) -> bool {
        (self.resolution - other.resolution).abs() <= 1e-9 * self.resolution.max(1.0)
    }
}

/// Row-major occupancy grid.
///
/// A default-constructed map is empty: it has no cells until the first full map
/// message replaces it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridMap {
    info: MapInfo,
    data: Vec<i8>,
}

impl GridMap {
    /// Creates a map with every cell set to `fill`.
    pub fn new(info: MapInfo, fill: i8) -> Self {
        let data = vec![fill; info.total_cells()];
        Self { info, data }
    }

    /// Creates a map from existing cell data.
    ///
    /// # Returns
    /// * `Err(NavigationError::InvalidDimensions)` if `data` does not hold exactly
    ///   `width * height` values.
    pub fn from_data(info: MapInfo, data: Vec<i8>) -> Result<Self, NavigationError> {
        if data.len() != info.total_cells() {
            return Err(NavigationError::InvalidDimensions(
                "Cell data does not match width * height",
            ));
        }
        Ok(Self { info, data })
    }

    /// Gets the georeferencing of the map.
    pub fn get_info(&self) -> &MapInfo {
        &self.info
    }

    /// Gets a reference to the underlying cell data.
    pub fn get_data(&self) -> &[i8] {
        &self.data
    }

    /// Gets a mutable reference to the underlying cell data.
    pub fn get_data_mut(&mut self) -> &mut [i8] {
        &mut self.data
    }

    /// Whether the map holds no cells yet.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Replaces the cell data, keeping size and placement.
    pub fn replace_data(&mut self, data: Vec<i8>) -> Result<(), NavigationError> {
        if data.len() != self.info.total_cells() {
            return Err(NavigationError::DataLengthMismatch {
                expected: self.info.total_cells(),
                actual: data.len(),
            });
        }
        self.data = data;
        Ok(())
    }

    /// Gets the occupancy value of a cell.
    pub fn get_value(&self, cell: GridPoint) -> Result<i8, NavigationError> {
        self.info
            .index_of(cell)
            .and_then(|index| self.data.get(index).copied())
            .ok_or(NavigationError::OutOfBounds(
                "Grid coordinates out of bounds",
            ))
    }

    /// Sets the occupancy value of a cell.
    pub fn set_value(&mut self, cell: GridPoint, value: i8) -> Result<(), NavigationError> {
        let slot = self
            .info
            .index_of(cell)
            .and_then(|index| self.data.get_mut(index))
            .ok_or(NavigationError::OutOfBounds(
                "Grid coordinates out of bounds",
            ))?;
        *slot = value;
        Ok(())
    }

    /// Number of cells whose value is at least `threshold`.
    pub fn count_at_least(&self, threshold: i8) -> usize {
        self.data.iter().filter(|&&value| value >= threshold).count()
    }
}

impl std::fmt::Display for GridMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "GridMap ({}x{}, resolution: {:.3}m, frame: '{}')",
            self.info.width, self.info.height, self.info.resolution, self.info.frame_id
        )?;
        writeln!(
            f,
            "Origin: ({:.3}, {:.3})",
            self.info.origin.x, self.info.origin.y
        )?;

        for row in self.data.chunks(self.info.width.max(1)) {
            for value in row {
                write!(f, "{:4}", value)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
