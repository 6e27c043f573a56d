//! Overlay of a local sensor grid onto the persistent global grid.
//!
//! Every fusion pass first undoes the previous pass by replaying the recorded
//! overlay patch, then writes the local map's occupied cells and records the
//! values they replaced. A local obstacle that has since moved therefore never
//! leaves a permanent mark in the global map.

use tracing::{debug, warn};

use super::{GridMap, GridPoint};
use crate::error::NavigationError;

/// One overwritten global cell and the value it held before the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayEntry {
    /// Linear index into the global map data.
    pub index: usize,
    /// Value the cell held before it was overlaid.
    pub previous: i8,
}

/// Append-only record of the global cells overwritten by one fusion pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayPatch {
    entries: Vec<OverlayEntry>,
}

impl OverlayPatch {
    /// Records that `index` held `previous` before being overwritten.
    pub fn record(&mut self, index: usize, previous: i8) {
        self.entries.push(OverlayEntry { index, previous });
    }

    /// Restores every recorded value into `map` and empties the patch.
    ///
    /// Entries are replayed newest first so a cell recorded twice ends up with
    /// its oldest value. Returns the number of cells restored; entries that no
    /// longer fit inside `map` are dropped.
    pub fn replay(&mut self, map: &mut GridMap) -> usize {
        let data = map.get_data_mut();
        let mut restored = 0;
        for entry in self.entries.drain(..).rev() {
            if let Some(cell) = data.get_mut(entry.index) {
                *cell = entry.previous;
                restored += 1;
            }
        }
        restored
    }

    /// Forgets every entry without restoring anything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of recorded cells.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the patch records no cells.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recorded entries, oldest first.
    pub fn entries(&self) -> &[OverlayEntry] {
        &self.entries
    }
}

/// Outcome of one fusion pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FusionReport {
    /// Cells restored from the previous pass.
    pub restored: usize,
    /// Local cells written into the global map.
    pub written: usize,
    /// Occupied local cells that fell outside the global map.
    pub discarded: usize,
    /// Local map corners in global cells, when corner registration is enabled.
    pub corners: Option<[GridPoint; 4]>,
}

/// Merges a local occupancy grid into the global grid, one pass per local update.
#[derive(Debug, Clone)]
pub struct MapFusionEngine {
    occupancy_threshold: i8,
    include_corners: bool,
    patch: OverlayPatch,
}

impl MapFusionEngine {
    /// Creates an engine that overlays local cells whose value is at least
    /// `occupancy_threshold`.
    pub fn new(occupancy_threshold: i8, include_corners: bool) -> Self {
        Self {
            occupancy_threshold,
            include_corners,
            patch: OverlayPatch::default(),
        }
    }

    /// The overlay written by the most recent pass.
    pub fn patch(&self) -> &OverlayPatch {
        &self.patch
    }

    /// Drops the recorded overlay without replaying it.
    ///
    /// Used when the global data has been replaced wholesale, so the recorded
    /// values describe cells that no longer exist.
    pub fn invalidate(&mut self) {
        self.patch.clear();
    }

    /// Runs one fusion pass of `local` into `global`.
    ///
    /// An empty local or global map makes the pass a no-op, leaving the previous
    /// overlay in place.
    ///
    /// # Returns
    /// * `Err(NavigationError::InvalidResolution)` if the grids do not share a
    ///   resolution; nothing is modified in that case.
    pub fn fuse(
        &mut self,
        global: &mut GridMap,
        local: &GridMap,
    ) -> Result<FusionReport, NavigationError> {
        if local.is_empty() || global.is_empty() {
            debug!(
                local_empty = local.is_empty(),
                global_empty = global.is_empty(),
                "Skipping fusion pass"
            );
            return Ok(FusionReport::default());
        }

        let global_info = global.get_info().clone();
        let local_info = local.get_info();
        if !global_info.same_resolution(local_info) {
            return Err(NavigationError::InvalidResolution(
                "Local map resolution differs from global map",
            ));
        }

        let offset = global_info.cell_offset_of(local_info);
        let (local_w, local_h) = (local_info.width as i64, local_info.height as i64);

        let corners = self.include_corners.then(|| {
            [
                GridPoint::new(offset.x, offset.y),
                GridPoint::new(offset.x + local_w, offset.y),
                GridPoint::new(offset.x + local_w, offset.y + local_h),
                GridPoint::new(offset.x, offset.y + local_h),
            ]
        });

        let restored = self.patch.replay(global);

        let mut written = 0;
        let mut discarded = 0;
        let global_data = global.get_data_mut();
        for (i, &value) in local.get_data().iter().enumerate() {
            if value < self.occupancy_threshold {
                continue;
            }

            let i = i as i64;
            let cell = GridPoint::new(i % local_w + offset.x, i / local_w + offset.y);
            let Some(index) = global_info.index_of(cell) else {
                discarded += 1;
                continue;
            };

            self.patch.record(index, global_data[index]);
            global_data[index] = value;
            written += 1;
        }

        if discarded > 0 {
            warn!(
                discarded,
                offset_x = offset.x,
                offset_y = offset.y,
                "Local map cells fall outside the global map, discarding them"
            );
        }
        debug!(restored, written, "Fused local map into global map");

        Ok(FusionReport {
            restored,
            written,
            discarded,
            corners,
        })
    }
}
