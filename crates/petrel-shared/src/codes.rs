//! Socket event codes and their urgency classification.
//!
//! The server tags every socket payload with an integer `code`. The
//! inbound queue uses [`priority_for`] to pick a lane; codes it does not
//! recognize flow through the NORMAL lane so future server-side event
//! types degrade gracefully instead of being dropped.

use serde::{Deserialize, Serialize};

pub const REGISTER: i32 = 1000;
pub const REGISTER_SUCCESS: i32 = 1001;
pub const REGISTER_FAILED: i32 = 1002;
pub const HEART_BEAT: i32 = 1003;
pub const HEART_BEAT_SUCCESS: i32 = 1004;
pub const HEART_BEAT_FAILED: i32 = 1005;
pub const FORCE_LOGOUT: i32 = 1006;
pub const LOGIN_EXPIRED: i32 = 1007;
pub const REFRESH_TOKEN: i32 = 1008;
pub const SINGLE_MESSAGE: i32 = 2001;
pub const GROUP_MESSAGE: i32 = 2002;
pub const VIDEO_MESSAGE: i32 = 2003;
pub const GROUP_OPERATION: i32 = 3001;
pub const MESSAGE_OPERATION: i32 = 3002;

/// Lane an inbound envelope is queued into, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Urgent,
    High,
    Normal,
    Low,
}

impl Priority {
    /// Lane index, 0 = most urgent.
    pub fn lane(self) -> usize {
        match self {
            Priority::Urgent => 0,
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }
}

/// Classify a socket code into a queue lane.
///
/// Auth-critical events must never wait behind a flood of presence
/// pings, so forced-logout and token-refresh outrank everything else.
pub fn priority_for(code: i32) -> Priority {
    match code {
        FORCE_LOGOUT | LOGIN_EXPIRED | REFRESH_TOKEN => Priority::Urgent,
        VIDEO_MESSAGE => Priority::High,
        HEART_BEAT | HEART_BEAT_SUCCESS | HEART_BEAT_FAILED => Priority::Low,
        _ => Priority::Normal,
    }
}
