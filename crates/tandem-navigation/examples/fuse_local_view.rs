use nalgebra::Vector2;
use tandem_navigation::{FusedMap, GridMap, MapFusionEngine, MapInfo, OCCUPANCY_FREE, OCCUPANCY_LETHAL};

fn main() {
    // 12x8 global map with 0.5m resolution, origin at (-1, -1)
    let global_info = MapInfo::new(12, 8, 0.5, Vector2::new(-1.0, -1.0), "map").unwrap();
    let mut fused = FusedMap::new(MapFusionEngine::new(65, true));
    fused.apply_global(GridMap::new(global_info, OCCUPANCY_FREE));

    // A 3x3 local view with an obstacle in its centre, first near the left wall
    for (step, origin_x) in [0.0, 1.5, 3.0].into_iter().enumerate() {
        let local_info = MapInfo::new(3, 3, 0.5, Vector2::new(origin_x, 0.0), "map").unwrap();
        let mut local = vec![OCCUPANCY_FREE; 9];
        local[4] = OCCUPANCY_LETHAL;
        let local = GridMap::from_data(local_info, local).unwrap();

        match fused.apply_local(local) {
            Ok(Some(report)) => {
                println!(
                    "Step {}: restored {}, wrote {}, discarded {}, corners {:?}",
                    step, report.restored, report.written, report.discarded, report.corners
                );
            }
            Ok(None) => println!("Step {}: waiting for the global map", step),
            Err(e) => {
                eprintln!("Step {}: fusion failed: {}", step, e);
                return;
            }
        }

        // Only the latest obstacle is ever present
        println!("{}", fused.map());
    }
}
