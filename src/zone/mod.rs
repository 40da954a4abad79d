//! The authoritative DNS zone management core: an in-memory namespace tree,
//! the query engine that answers questions against it, and the coordination
//! needed to keep zones consistent across persistence, transfer and DNSSEC
//! signing. The wire codec's byte-level parser/encoder, transport listeners,
//! recursive resolver and admin API are external collaborators consumed
//! through the interfaces this module exposes (`log_sink::LogSink`,
//! `dnssec::ZoneSigner`, `wire` conversions) rather than implemented here.

pub mod apex;
pub mod dnssec;
pub mod errors;
pub mod journal;
pub mod log_sink;
pub mod manager;
pub mod query;
pub mod record;
pub mod refresh;
pub mod rtype;
pub mod transfer;
pub mod tree;
pub mod wire;
pub mod zonefile;

pub use apex::{ApexVariant, ApexZone, ApexZoneBehavior, ApexZoneInfo, ApexZoneType, DnssecStatus};
pub use errors::{ZoneError, ZoneResult};
pub use manager::ZoneManager;
pub use query::{query, QueryRequest, QueryResponse};
pub use record::{RData, Record, RRSet, Tag};
pub use rtype::RRType;
pub use tree::{ApexMarker, FindZoneResult, ZoneNode, ZoneTree};
