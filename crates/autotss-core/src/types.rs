use serde::{Deserialize, Serialize};
use std::fmt;

/// Owner of a device list. Discord user snowflake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl UserId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Release channel a firmware build was published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FirmwareType {
    Release,
    Beta,
}

impl fmt::Display for FirmwareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FirmwareType::Release => write!(f, "Release"),
            FirmwareType::Beta => write!(f, "Beta"),
        }
    }
}

impl std::str::FromStr for FirmwareType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Release" | "release" => Ok(FirmwareType::Release),
            "Beta" | "beta" => Ok(FirmwareType::Beta),
            other => Err(format!("unknown firmware type: {other}")),
        }
    }
}

/// A firmware build as reported by the catalog. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Firmware {
    pub version: String,
    pub buildid: String,
    pub url: String,
    pub signed: bool,
    #[serde(rename = "type")]
    pub kind: FirmwareType,
}

impl Firmware {
    /// The persisted form, dropping `url` and `signed`.
    pub fn to_saved(&self) -> SavedBlob {
        SavedBlob {
            version: self.version.clone(),
            buildid: self.buildid.clone(),
            kind: self.kind,
        }
    }
}

/// A firmware version whose tickets have been fully acquired for a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedBlob {
    pub version: String,
    pub buildid: String,
    #[serde(rename = "type")]
    pub kind: FirmwareType,
}

/// A registered device. Stored as one element of the owner's JSON device list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub identifier: String,
    #[serde(rename = "boardconfig", alias = "board_config")]
    pub board_config: String,
    /// Hex without the `0x` prefix.
    pub ecid: String,
    /// `0x` followed by 16 hex digits.
    #[serde(default)]
    pub generator: Option<String>,
    #[serde(default)]
    pub apnonce: Option<String>,
    #[serde(default)]
    pub saved_blobs: Vec<SavedBlob>,
}

impl Device {
    /// True when tickets for `buildid` are already recorded.
    pub fn has_saved(&self, buildid: &str) -> bool {
        self.saved_blobs.iter().any(|b| b.buildid == buildid)
    }

    /// ECID in the form the signing tool expects (`0x`-prefixed).
    pub fn ecid_arg(&self) -> String {
        format!("0x{}", self.ecid)
    }

    /// Append a saved record unless the buildid is already present.
    /// Returns false on a duplicate.
    pub fn record_saved(&mut self, blob: SavedBlob) -> bool {
        if self.has_saved(&blob.buildid) {
            return false;
        }
        self.saved_blobs.push(blob);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> Device {
        Device {
            name: "My iPhone".to_string(),
            identifier: "iPhone10,1".to_string(),
            board_config: "d201ap".to_string(),
            ecid: "1a2b3c4d5e".to_string(),
            generator: None,
            apnonce: None,
            saved_blobs: vec![],
        }
    }

    #[test]
    fn device_json_uses_boardconfig_key() {
        let json = serde_json::to_string(&device()).unwrap();
        assert!(json.contains(r#""boardconfig":"d201ap""#));
        assert!(!json.contains("board_config"));
    }

    #[test]
    fn device_json_without_optional_fields_parses() {
        let json = r#"{"name":"Old","identifier":"iPhone8,1","boardconfig":"n71ap","ecid":"abcdef123"}"#;
        let d: Device = serde_json::from_str(json).unwrap();
        assert!(d.generator.is_none());
        assert!(d.saved_blobs.is_empty());
    }

    #[test]
    fn saved_blob_type_field_is_capitalised() {
        let blob = SavedBlob {
            version: "14.8".to_string(),
            buildid: "18H17".to_string(),
            kind: FirmwareType::Release,
        };
        let json = serde_json::to_string(&blob).unwrap();
        assert_eq!(json, r#"{"version":"14.8","buildid":"18H17","type":"Release"}"#);
    }

    #[test]
    fn record_saved_rejects_duplicate_buildid() {
        let mut d = device();
        let blob = SavedBlob {
            version: "14.8".to_string(),
            buildid: "18H17".to_string(),
            kind: FirmwareType::Release,
        };
        assert!(d.record_saved(blob.clone()));
        assert!(!d.record_saved(blob));
        assert_eq!(d.saved_blobs.len(), 1);
    }

    #[test]
    fn ecid_arg_is_hex_prefixed() {
        assert_eq!(device().ecid_arg(), "0x1a2b3c4d5e");
    }
}
