use tandem_kinematics::*;

fn main() {
    let max_lin = 1.0;
    let max_ang = 1.0;
    let command = Twist::new(0.6, 0.3); // forward with a slight left turn
    let speed = 0.2; // constant simulation speed (m/s)
    let dt = 0.5; // Time step in seconds
    let num_steps = 4;

    let (lin, ang) = match command.normalized(max_lin, max_ang) {
        Ok(normalized) => normalized,
        Err(e) => {
            eprintln!("Failed to normalize command: {:?}", e);
            eprintln!("Please ensure max_lin ({}) and max_ang ({}) are positive.", max_lin, max_ang);
            return;
        }
    };

    let mut current_pose = Pose::new(0.0, 0.0, 0.0);
    let heading = current_pose.theta + libm::atan2(ang.min(1.0), lin.min(1.0));

    println!("Initializing simulation...");
    println!("  Command:        {}", command);
    println!("  Normalized:     (lin: {:.2}, ang: {:.2})", lin, ang);
    println!("  Steer heading:  {:.3} rad", heading);
    println!("\nSimulating...");

    for i in 0..num_steps {
        match current_pose.advanced(heading, speed, dt) {
            Ok(new_pose) => {
                current_pose = new_pose;
                println!("Step {:>2}: Pose: {}", i + 1, current_pose);
            }
            Err(e) => {
                eprintln!("Error during simulation step {}: {:?}", i + 1, e);
                break;
            }
        }
    }

    println!("\nSimulation complete.");
    println!("Final Pose: {:?}", current_pose);
}
