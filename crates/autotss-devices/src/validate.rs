//! Rules a device must pass before it is stored. Nothing here mutates state;
//! a failed check leaves the user's device list untouched.

use autotss_catalog::FirmwareCatalog;
use autotss_core::types::Device;
use thiserror::Error;
use tracing::debug;

use crate::error::Result;
use crate::types::NewDevice;

pub const NAME_MIN: usize = 4;
pub const NAME_MAX: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Device name must be {NAME_MIN}-{NAME_MAX} characters long (got {0})")]
    NameLength(usize),

    #[error("A device named `{0}` already exists")]
    DuplicateName(String),

    #[error("Unknown device identifier `{0}`")]
    UnknownIdentifier(String),

    #[error("`{0}` has several boards; a board config is required")]
    BoardRequired(String),

    #[error("Board config `{board}` is not valid for {identifier}")]
    InvalidBoard { identifier: String, board: String },

    #[error("ECID `{0}` is not valid")]
    InvalidEcid(String),

    #[error("ECID `{0}` has already been added")]
    DuplicateEcid(String),

    #[error("Generator `{0}` must be 0x followed by 16 hex characters")]
    InvalidGenerator(String),

    #[error("ApNonce must be {expected} hex characters")]
    InvalidApnonce { expected: usize },

    #[error("This device requires an ApNonce")]
    ApnonceRequired,

    #[error("You cannot add more than {0} devices")]
    TooManyDevices(usize),
}

type Check<T> = std::result::Result<T, ValidationError>;

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

pub fn check_name(name: &str, existing: &[Device]) -> Check<String> {
    let len = name.chars().count();
    if !(NAME_MIN..=NAME_MAX).contains(&len) {
        return Err(ValidationError::NameLength(len));
    }
    if existing.iter().any(|d| d.name.eq_ignore_ascii_case(name)) {
        return Err(ValidationError::DuplicateName(name.to_string()));
    }
    Ok(name.to_string())
}

/// `"devicestring: iphone10,1"` -> `"iPhone10,1"`, `"appletv6,2"` -> `"AppleTV6,2"`.
pub fn normalize_identifier(raw: &str) -> String {
    let id = raw
        .to_lowercase()
        .replace(' ', "")
        .replace("devicestring:", "");
    if let Some(rest) = id.strip_prefix("appletv") {
        format!("AppleTV{rest}")
    } else {
        id.replace('p', "P")
    }
}

fn normalize_board(raw: &str) -> String {
    raw.to_lowercase().replace(' ', "").replace("deviceid:", "")
}

/// Strip `0x`, lowercase, and check length, hex and uniqueness.
pub fn check_ecid(raw: &str, existing: &[Device]) -> Check<String> {
    let lowered = raw.trim().to_lowercase();
    let ecid = lowered.strip_prefix("0x").unwrap_or(&lowered);
    if !(9..=16).contains(&ecid.len()) || !is_hex(ecid) {
        return Err(ValidationError::InvalidEcid(raw.to_string()));
    }
    if existing.iter().any(|d| d.ecid.eq_ignore_ascii_case(ecid)) {
        return Err(ValidationError::DuplicateEcid(ecid.to_string()));
    }
    Ok(ecid.to_string())
}

pub fn check_generator(raw: &str) -> Check<String> {
    let generator = raw.trim().to_lowercase();
    match generator.strip_prefix("0x") {
        Some(digits) if digits.len() == 16 && is_hex(digits) => Ok(generator),
        _ => Err(ValidationError::InvalidGenerator(raw.to_string())),
    }
}

/// A9 through A11 use 40-character nonces, everything else 64.
pub fn apnonce_len(cpid: u32) -> usize {
    if (0x8010..0x8900).contains(&cpid) {
        40
    } else {
        64
    }
}

/// A12 and later cannot save useful tickets without a nonce.
pub fn apnonce_required(cpid: u32) -> bool {
    (0x8020..0x8900).contains(&cpid)
}

pub fn check_apnonce(raw: Option<&str>, cpid: u32) -> Check<Option<String>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        if apnonce_required(cpid) {
            return Err(ValidationError::ApnonceRequired);
        }
        return Ok(None);
    };
    let nonce = raw.to_lowercase();
    let expected = apnonce_len(cpid);
    if nonce.len() != expected || !is_hex(&nonce) {
        return Err(ValidationError::InvalidApnonce { expected });
    }
    Ok(Some(nonce))
}

/// Run every check against the catalog and the user's current devices.
pub async fn validate_new(
    catalog: &dyn FirmwareCatalog,
    existing: &[Device],
    input: NewDevice,
) -> Result<Device> {
    let name = check_name(&input.name, existing)?;

    let identifier = normalize_identifier(&input.identifier);
    let known = catalog.known_identifiers().await?;
    if !known.iter().any(|k| k == &identifier) {
        return Err(ValidationError::UnknownIdentifier(identifier).into());
    }

    let boards = catalog.boards(&identifier).await?;
    let board_config = match input.board_config.as_deref().map(normalize_board) {
        Some(board) => {
            if !board.ends_with("ap") || !boards.contains(&board) {
                return Err(ValidationError::InvalidBoard { identifier, board }.into());
            }
            board
        }
        None => {
            let production: Vec<&String> = boards.iter().filter(|b| b.ends_with("ap")).collect();
            match production.as_slice() {
                [only] => (*only).clone(),
                _ => return Err(ValidationError::BoardRequired(identifier).into()),
            }
        }
    };

    let ecid = check_ecid(&input.ecid, existing)?;
    let generator = input.generator.as_deref().map(check_generator).transpose()?;

    let cpid = catalog.cpid(&identifier, &board_config).await?.unwrap_or(0);
    debug!(%identifier, %board_config, cpid, "validating apnonce");
    let apnonce = check_apnonce(input.apnonce.as_deref(), cpid)?;

    Ok(Device {
        name,
        identifier,
        board_config,
        ecid,
        generator,
        apnonce,
        saved_blobs: Vec::new(),
    })
}
