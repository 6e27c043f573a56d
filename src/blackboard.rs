use parking_lot::RwLock;
use std::{sync::Arc, time::Instant};

use tandem_kinematics::Twist;

/// Latest operator input. Writers overwrite, readers take a copy.
#[derive(Debug, Clone, Default)]
pub struct OperatorState {
    pub command: Twist,
    pub last_cmd_ts: Option<Instant>,
}

pub type Blackboard = Arc<RwLock<OperatorState>>;

pub fn snapshot(bb: &Blackboard) -> OperatorState {
    (*bb.read()).clone()
}

pub fn set_command(bb: &Blackboard, command: Twist) {
    let mut g = bb.write();
    g.command = command;
    g.last_cmd_ts = Some(Instant::now());
}
