use crate::shared::dns;
use crate::shared::log::LogLevel;
use crate::zone::record::SerialScheme;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::{fs, net};

/// Configuration values obtained parsing the configuration file. Extends
/// the transport-layer settings the servers have always needed with the
/// [`ZoneManagerConf`] section driving the zone management core.
#[derive(Debug, Serialize, Deserialize)]
pub struct Conf {
    pub log_level: LogLevel,
    pub udp_server: UdpServerConf,
    pub tcp_server: TcpServerConf,
    pub zone_manager: ZoneManagerConf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UdpServerConf {
    pub address: String,
    pub port: u16,
    pub write_timeout: u64,
    pub threads: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TcpServerConf {
    pub address: String,
    pub port: u16,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub threads: usize,
}

/// Drives the [`crate::zone::manager::ZoneManager`] this process hosts:
/// where zone files live, how often pending changes are flushed, the
/// defaults new zones are created with, and the zones to materialize at
/// startup.
#[derive(Debug, Serialize, Deserialize)]
pub struct ZoneManagerConf {
    pub config_root: String,
    pub server_domain: String,
    pub save_interval_secs: u64,
    pub default_ttl: u32,
    pub transfer_timeout_secs: u64,
    pub zones: Vec<ZoneEntryConf>,
}

/// One zone to materialize at startup, alongside the primaries/forwarders
/// it needs if it is not a Primary itself.
#[derive(Debug, Serialize, Deserialize)]
pub struct ZoneEntryConf {
    pub name: String,
    pub kind: ZoneKindConf,
    #[serde(default)]
    pub serial_scheme: Option<SerialSchemeConf>,
    /// Remote servers to refresh from (Secondary/Stub) or forward to
    /// (Forwarder); unused for Primary.
    #[serde(default)]
    pub upstreams: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKindConf {
    Primary,
    Secondary,
    Stub,
    Forwarder,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialSchemeConf {
    Monotonic,
    DateEncoded,
}

impl From<SerialSchemeConf> for SerialScheme {
    fn from(conf: SerialSchemeConf) -> Self {
        match conf {
            SerialSchemeConf::Monotonic => SerialScheme::Monotonic,
            SerialSchemeConf::DateEncoded => SerialScheme::DateEncoded,
        }
    }
}

impl Conf {
    /// Read and parse the configuration values from a file. The file must
    /// be JSON-encoded and follow the organization of the [Conf] struct.
    pub fn from_file(path: &str) -> Result<Self, String> {
        let file_bytes = match fs::read_to_string(path) {
            Err(err) => return Err(err.to_string()),
            Ok(v) => v,
        };
        let conf = match serde_json::from_str::<Self>(&file_bytes) {
            Err(err) => return Err(err.to_string()),
            Ok(conf) => conf,
        };
        match conf.validate() {
            Ok(_) => Ok(conf),
            Err(err) => Err(err),
        }
    }

    /// Validate a configuration struct against some common errors.
    fn validate(&self) -> Result<(), String> {
        // Udp server confs.
        if let Err(err) = net::IpAddr::from_str(self.udp_server.address.as_ref()) {
            return Err(format!("invalid udp address: {}", err));
        }
        if self.udp_server.write_timeout == 0 {
            return Err("invalid udp write timeout: 0 seconds".to_string());
        }
        if self.udp_server.threads == 0 {
            return Err("invalid udp threads: 0".to_string());
        }

        // Tcp server confs.
        if let Err(err) = net::IpAddr::from_str(self.tcp_server.address.as_ref()) {
            return Err(format!("invalid tcp address: {}", err));
        }
        if self.tcp_server.write_timeout == 0 {
            return Err("invalid tcp write timeout: cannot be 0 seconds".to_string());
        }
        if self.tcp_server.threads == 0 {
            return Err("invalid tcp threads: 0".to_string());
        }

        // Zone manager confs.
        if let Err(err) = dns::Name::from_string(&self.zone_manager.server_domain) {
            return Err(format!("server domain {} invalid: {:?}", self.zone_manager.server_domain, err));
        }
        if self.zone_manager.save_interval_secs == 0 {
            return Err("invalid save interval: 0 seconds".to_string());
        }
        for entry in &self.zone_manager.zones {
            if let Err(err) = dns::Name::from_string(&entry.name) {
                return Err(format!("zone {} invalid: {:?}", entry.name, err));
            }
            if !matches!(entry.kind, ZoneKindConf::Forwarder) {
                for upstream in &entry.upstreams {
                    if net::SocketAddr::from_str(upstream).is_err() {
                        return Err(format!("zone {} upstream address {} invalid", entry.name, upstream));
                    }
                }
            }
        }

        Ok(())
    }
}
