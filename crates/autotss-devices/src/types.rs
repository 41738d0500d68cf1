use autotss_core::types::{Device, UserId};
use serde::{Deserialize, Serialize};

/// One row of the `autotss` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user: UserId,
    pub devices: Vec<Device>,
    /// Only enabled users take part in scheduled batches.
    pub enabled: bool,
}

/// Unvalidated device fields as a user typed them.
///
/// `board_config` may be left out when the identifier has exactly one
/// production board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDevice {
    pub name: String,
    pub identifier: String,
    pub board_config: Option<String>,
    pub ecid: String,
    pub generator: Option<String>,
    pub apnonce: Option<String>,
}
