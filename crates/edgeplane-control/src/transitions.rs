//! The POD state transition table.
//!
//! | From     | To                     |
//! |----------|------------------------|
//! | NEW      | WORKFLOW, DEAD         |
//! | WORKFLOW | ACTIVE, FAILED, DEAD   |
//! | ACTIVE   | WORKFLOW, DEAD         |
//! | FAILED   | WORKFLOW, DEAD         |
//! | DEAD     | ZOMBIE                 |
//! | ZOMBIE   |                        |

use edgeplane_catalog::PodState;

/// States reachable from `from` in one step.
pub fn successors(from: PodState) -> &'static [PodState] {
    use PodState::*;
    match from {
        New => &[Workflow, Dead],
        Workflow => &[Active, Failed, Dead],
        Active => &[Workflow, Dead],
        Failed => &[Workflow, Dead],
        Dead => &[Zombie],
        Zombie => &[],
    }
}

pub fn allowed(from: PodState, to: PodState) -> bool {
    successors(from).contains(&to)
}
