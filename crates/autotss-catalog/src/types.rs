use serde::Deserialize;

/// `GET /device/{identifier}?type=ipsw`. Only the fields we read.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceInfo {
    #[serde(default)]
    pub name: String,
    pub identifier: String,
    #[serde(default)]
    pub boards: Vec<Board>,
    /// Device-level chip id; boards may override it.
    #[serde(default)]
    pub cpid: Option<u32>,
    #[serde(default)]
    pub firmwares: Vec<ApiFirmware>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Board {
    pub boardconfig: String,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub cpid: Option<u32>,
}

/// One firmware row from either the release or the beta endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiFirmware {
    pub version: String,
    pub buildid: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub signed: bool,
}

/// Element of `GET /devices`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DeviceListEntry {
    pub identifier: String,
}
