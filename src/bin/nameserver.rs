use zoneauth::nameserver::conf::{Conf, ZoneEntryConf, ZoneKindConf};
use zoneauth::nameserver::NameserverHandler;
use zoneauth::shared::dns;
use zoneauth::shared::log;
use zoneauth::shared::net::{start_servers, TcpParams, UdpParams};
use zoneauth::zone::dnssec::UnimplementedSigner;
use zoneauth::zone::manager::ZoneManager;
use zoneauth::zone::record::{RData, Record};
use zoneauth::zone::transfer::UnimplementedTransferClient;
use colored::Colorize;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::{env, process, time};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        log::init_log(log::LogLevel::Debug);
        print_usage();
        process::exit(1);
    }

    let conf = match Conf::from_file(&args[1]) {
        Ok(conf) => {
            log::init_log(conf.log_level);
            log::info!("Configuration parsed: {:?}.", conf);
            conf
        }
        Err(err) => {
            log::init_log(log::LogLevel::Debug);
            log::error!("Parsing configuration file: {}", err);
            process::exit(1);
        }
    };

    let server_domain = dns::Name::from_string(&conf.zone_manager.server_domain).unwrap();
    let manager = ZoneManager::new(
        conf.zone_manager.config_root.clone(),
        Arc::new(UnimplementedSigner),
        server_domain,
        time::Duration::new(conf.zone_manager.save_interval_secs, 0),
        Arc::new(UnimplementedTransferClient),
    );

    for entry in &conf.zone_manager.zones {
        if let Err(err) = materialize_zone(&manager, entry, conf.zone_manager.default_ttl) {
            log::error!("Materializing zone '{}': {}", entry.name, err);
            process::exit(1);
        }
    }

    let nameserver_handler = Arc::new(NameserverHandler(manager));

    let udp_params = UdpParams {
        address: conf.udp_server.address,
        port: conf.udp_server.port,
        write_timeout: time::Duration::new(conf.udp_server.write_timeout, 0),
        threads: conf.udp_server.threads,
    };
    let tcp_params = TcpParams {
        address: conf.tcp_server.address,
        port: conf.tcp_server.port,
        write_timeout: time::Duration::new(conf.tcp_server.write_timeout, 0),
        read_timeout: time::Duration::new(conf.tcp_server.read_timeout, 0),
        threads: conf.tcp_server.threads,
    };

    start_servers(nameserver_handler, udp_params, tcp_params);
}

/// Creates the apex zone `entry` describes against `manager`, per its kind.
fn materialize_zone(manager: &ZoneManager, entry: &ZoneEntryConf, default_ttl: u32) -> Result<(), String> {
    let name = dns::Name::from_string(&entry.name).map_err(|e| format!("{:?}", e))?;
    match entry.kind {
        ZoneKindConf::Primary => {
            let scheme = entry.serial_scheme.map(Into::into).unwrap_or(zoneauth::zone::record::SerialScheme::Monotonic);
            manager.create_primary(name, scheme, default_ttl).map_err(|e| e.to_string())
        }
        ZoneKindConf::Secondary => {
            let addrs = parse_addrs(&entry.upstreams)?;
            manager.create_secondary(name, addrs).map_err(|e| e.to_string())
        }
        ZoneKindConf::Stub => {
            let addrs = parse_addrs(&entry.upstreams)?;
            manager.create_stub(name, addrs).map_err(|e| e.to_string())
        }
        ZoneKindConf::Forwarder => {
            let targets = entry
                .upstreams
                .iter()
                .map(|addr| {
                    Record::new(name.clone(), default_ttl, RData::Fwd { forwarder: addr.clone(), priority: 10, dnssec_validation: false })
                })
                .collect();
            manager.create_forwarder(name, targets).map_err(|e| e.to_string())
        }
    }
}

fn parse_addrs(raw: &[String]) -> Result<Vec<SocketAddr>, String> {
    raw.iter().map(|s| SocketAddr::from_str(s).map_err(|e| e.to_string())).collect()
}

fn print_usage() {
    log::error!(
        "One argument should be provided when starting the nameserver: the path of the configuration file.
    Usage: {} {}",
        "path/to/nameserver/binary".bold(),
        "path/to/config/file".bold().bright_green()
    )
}
