//! Global map plus the latest local view, kept fused.
//!
//! Each external map event has its own apply function so that the order in
//! which events touch the map is explicit. Callers are expected to hold one
//! lock around the whole `FusedMap`.

use tracing::{debug, info};

use super::{FusionReport, GridMap, MapFusionEngine, MapInfo};
use crate::error::NavigationError;

/// The authoritative global map with the local overlay applied.
#[derive(Debug, Clone)]
pub struct FusedMap {
    global: GridMap,
    local: Option<GridMap>,
    fusion: MapFusionEngine,
}

impl FusedMap {
    /// Creates an empty fused map that overlays local cells with the given engine.
    pub fn new(fusion: MapFusionEngine) -> Self {
        Self {
            global: GridMap::default(),
            local: None,
            fusion,
        }
    }

    /// Whether a global map has been received.
    pub fn is_ready(&self) -> bool {
        !self.global.is_empty()
    }

    /// The fused global map.
    pub fn map(&self) -> &GridMap {
        &self.global
    }

    /// Georeferencing of the global map.
    pub fn info(&self) -> &MapInfo {
        self.global.get_info()
    }

    /// The fusion engine and its current overlay.
    pub fn fusion(&self) -> &MapFusionEngine {
        &self.fusion
    }

    /// Copy of the fused map, for consumers that must not hold the lock.
    pub fn snapshot(&self) -> GridMap {
        self.global.clone()
    }

    /// Replaces the whole global map.
    ///
    /// The recorded overlay refers to the replaced data and is dropped; the next
    /// local update overlays the new map.
    pub fn apply_global(&mut self, map: GridMap) {
        info!(
            width = map.get_info().width,
            height = map.get_info().height,
            resolution = map.get_info().resolution,
            frame = %map.get_info().frame_id,
            "Received global map"
        );
        self.global = map;
        self.fusion.invalidate();
    }

    /// Replaces the global cell data, keeping size and placement, then re-applies
    /// the latest local map so local obstacles are not lost.
    ///
    /// # Returns
    /// * `Err(NavigationError::MapNotReady)` before the first full global map.
    /// * `Err(NavigationError::DataLengthMismatch)` if the update does not cover the map.
    pub fn apply_global_update(
        &mut self,
        data: Vec<i8>,
    ) -> Result<Option<FusionReport>, NavigationError> {
        if !self.is_ready() {
            return Err(NavigationError::MapNotReady);
        }
        self.global.replace_data(data)?;
        self.fusion.invalidate();
        debug!("Applied incremental global map update");

        match &self.local {
            Some(local) => self.fusion.fuse(&mut self.global, local).map(Some),
            None => Ok(None),
        }
    }

    /// Stores a new local map and overlays it onto the global map.
    ///
    /// Returns `Ok(None)` when no global map has arrived yet; the local map is
    /// kept and applied by the next incremental update.
    pub fn apply_local(
        &mut self,
        local: GridMap,
    ) -> Result<Option<FusionReport>, NavigationError> {
        let local = self.local.insert(local);
        if self.global.is_empty() {
            debug!("Global map not received yet, holding local map");
            return Ok(None);
        }
        self.fusion.fuse(&mut self.global, local).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{GridPoint, OCCUPANCY_FREE, OCCUPANCY_LETHAL};
    use nalgebra::Vector2;

    fn global() -> GridMap {
        let info = MapInfo::new(6, 6, 1.0, Vector2::zeros(), "map").unwrap();
        GridMap::new(info, OCCUPANCY_FREE)
    }

    fn local_with_obstacle_at(x: f64, y: f64) -> GridMap {
        let info = MapInfo::new(2, 2, 1.0, Vector2::new(x, y), "map").unwrap();
        GridMap::from_data(info, vec![OCCUPANCY_LETHAL, 0, 0, 0]).unwrap()
    }

    #[test]
    fn test_local_before_global_is_held() {
        let mut fused = FusedMap::new(MapFusionEngine::new(65, false));
        assert_eq!(fused.apply_local(local_with_obstacle_at(1.0, 1.0)), Ok(None));
        assert!(!fused.is_ready());

        fused.apply_global(global());
        let report = fused.apply_global_update(vec![OCCUPANCY_FREE; 36]).unwrap();
        assert_eq!(report.map(|r| r.written), Some(1));
        assert_eq!(fused.map().get_value(GridPoint::new(1, 1)), Ok(OCCUPANCY_LETHAL));
    }

    #[test]
    fn test_incremental_update_reapplies_local_overlay() {
        let mut fused = FusedMap::new(MapFusionEngine::new(65, false));
        fused.apply_global(global());
        fused.apply_local(local_with_obstacle_at(2.0, 3.0)).unwrap();

        let mut fresh = vec![OCCUPANCY_FREE; 36];
        fresh[0] = OCCUPANCY_LETHAL;
        fused.apply_global_update(fresh).unwrap();

        assert_eq!(fused.map().get_value(GridPoint::new(0, 0)), Ok(OCCUPANCY_LETHAL));
        assert_eq!(fused.map().get_value(GridPoint::new(2, 3)), Ok(OCCUPANCY_LETHAL));
        assert_eq!(fused.fusion().patch().len(), 1);
    }

    #[test]
    fn test_incremental_update_does_not_restore_stale_values() {
        let mut fused = FusedMap::new(MapFusionEngine::new(65, false));
        let mut first = global();
        first.set_value(GridPoint::new(2, 3), 30).unwrap();
        fused.apply_global(first);
        fused.apply_local(local_with_obstacle_at(2.0, 3.0)).unwrap();

        // The global source has since cleared the cell under the local obstacle
        fused.apply_global_update(vec![OCCUPANCY_FREE; 36]).unwrap();
        fused.apply_local(local_with_obstacle_at(4.0, 4.0)).unwrap();

        assert_eq!(fused.map().get_value(GridPoint::new(2, 3)), Ok(OCCUPANCY_FREE));
        assert_eq!(fused.map().get_value(GridPoint::new(4, 4)), Ok(OCCUPANCY_LETHAL));
    }

    #[test]
    fn test_incremental_update_errors() {
        let mut fused = FusedMap::new(MapFusionEngine::new(65, false));
        assert_eq!(
            fused.apply_global_update(vec![0; 36]),
            Err(NavigationError::MapNotReady)
        );

        fused.apply_global(global());
        assert_eq!(
            fused.apply_global_update(vec![0; 10]),
            Err(NavigationError::DataLengthMismatch { expected: 36, actual: 10 })
        );
    }
}
