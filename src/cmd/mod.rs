//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module     | Commands handled                                    |
//! |------------|-----------------------------------------------------|
//! | `workflow` | `Start`, `Advance`, `Complete`, `Cancel`, `Status`, |
//! |            | `List`, `Recommend`                                 |
//! | `record`   | `Decision`, `Artifact`                              |
//! | `state`    | `State` (stats, clear, delete, export, import,      |
//! |            | reset)                                              |

pub mod record;
pub mod state;
pub mod workflow;

pub use record::{cmd_artifact, cmd_decision};
pub use state::cmd_state;
pub use workflow::{
    cmd_advance, cmd_cancel, cmd_complete, cmd_list, cmd_recommend, cmd_start, cmd_status,
};
