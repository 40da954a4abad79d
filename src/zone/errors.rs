use crate::shared::dns::Name;
use crate::zone::rtype::RRType;
use std::fmt;

/// Error kinds raised by the zone management core. Admin-misuse and
/// bad-input variants are surfaced to the caller as-is;
/// background/transfer/load failures are logged and handled internally
/// (see call sites in `manager` and `transfer`).
#[derive(Debug)]
pub enum ZoneError {
    ZoneNotFound(Name),
    ZoneAlreadyExists(Name),
    InvalidZoneName(String),
    NameOutsideZone { name: Name, zone: Name },
    InvalidRecord(String),
    InvalidZoneTransfer(String),
    InvalidZoneFile(String),
    IoFailure(String),
    ConversionRejected(String),
    OperationNotSupported(String),
}

impl fmt::Display for ZoneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneError::ZoneNotFound(name) => write!(f, "zone not found: {}", name),
            ZoneError::ZoneAlreadyExists(name) => write!(f, "zone already exists: {}", name),
            ZoneError::InvalidZoneName(msg) => write!(f, "invalid zone name: {}", msg),
            ZoneError::NameOutsideZone { name, zone } => {
                write!(f, "name '{}' is not inside zone '{}'", name, zone)
            }
            ZoneError::InvalidRecord(msg) => write!(f, "invalid record: {}", msg),
            ZoneError::InvalidZoneTransfer(msg) => write!(f, "invalid zone transfer: {}", msg),
            ZoneError::InvalidZoneFile(msg) => write!(f, "invalid zone file: {}", msg),
            ZoneError::IoFailure(msg) => write!(f, "I/O failure: {}", msg),
            ZoneError::ConversionRejected(msg) => write!(f, "zone conversion rejected: {}", msg),
            ZoneError::OperationNotSupported(msg) => write!(f, "operation not supported: {}", msg),
        }
    }
}

impl std::error::Error for ZoneError {}

pub type ZoneResult<T> = Result<T, ZoneError>;

/// Returns an error unless `name` is in-bailiwick for `zone`.
pub fn ensure_in_bailiwick(name: &Name, zone: &Name) -> ZoneResult<()> {
    if name.is_in_zone(zone) {
        Ok(())
    } else {
        Err(ZoneError::NameOutsideZone { name: name.clone(), zone: zone.clone() })
    }
}

/// Returns an error describing a record/type mismatch for invalid-record
/// reporting at mutation call sites.
pub fn invalid_record(name: &Name, rtype: RRType, reason: &str) -> ZoneError {
    ZoneError::InvalidRecord(format!("{} {}: {}", name, rtype, reason))
}
