use nalgebra::Point2;

/// A point in world coordinates (meters), expressed in the map frame.
pub type WorldPoint = Point2<f64>;

/// A point in map-grid units (cells), possibly fractional.
///
/// Candidate path waypoints live in this space: a waypoint at `(2.5, 3.0)` sits
/// half way across column 2 of row 3.
pub type MapPoint = Point2<f64>;

/// Represents a cell in grid coordinates.
///
/// Coordinates are signed so that cells computed from a georeferenced overlay
/// can lie outside the grid they are compared against.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct GridPoint {
    /// The x-coordinate (column index) in the grid.
    pub x: i64,
    /// The y-coordinate (row index) in the grid.
    pub y: i64,
}

impl GridPoint {
    /// Creates a new `GridPoint`.
    #[must_use]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// The cell containing a fractional map-grid point.
    #[must_use]
    pub fn containing(point: &MapPoint) -> Self {
        Self::new(point.x.floor() as i64, point.y.floor() as i64)
    }

    /// The corner of this cell closest to the grid origin, in map-grid units.
    #[must_use]
    pub fn to_map_point(self) -> MapPoint {
        MapPoint::new(self.x as f64, self.y as f64)
    }
}

impl std::fmt::Display for GridPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_containing_floors_negative_coordinates() {
        assert_eq!(GridPoint::containing(&MapPoint::new(2.9, 0.1)), GridPoint::new(2, 0));
        assert_eq!(GridPoint::containing(&MapPoint::new(-0.5, -1.0)), GridPoint::new(-1, -1));
    }
}
