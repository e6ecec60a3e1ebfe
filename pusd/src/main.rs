//! pusd main entry point
//!
//! Loads the configuration, builds the event reporting service and runs the
//! service host until interrupted.

use log::{error, info};
use std::env;
use std::net::SocketAddr;
use std::process;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use puscommon::{PusError, PusResult, PusdConfig};
use pusd_lib::config::constants::DEFAULT_CONFIG_PATH;
use pusd_lib::{
    build_parameters, load_config, register_events, EventReporting, PusIdent, ServiceHost, UdpTmSink,
    VerificationLog,
};

fn build_host(config: &PusdConfig) -> PusResult<ServiceHost> {
    let tm_address: SocketAddr = config
        .tm_address
        .parse()
        .map_err(|e| PusError::Config(format!("tm_address {}: {}", config.tm_address, e)))?;

    let ident = Arc::new(PusIdent::new(config.apid));
    let policy = Arc::new(config.policy);
    let sink = Arc::new(UdpTmSink::new(tm_address)?);

    let parameters = build_parameters(config)?;
    let mut events = EventReporting::new(ident, policy, Arc::new(VerificationLog), sink);
    register_events(&mut events, config, &parameters)?;
    info!("Registered {} event reports", events.reports().count());

    let mut host = ServiceHost::new(&config.tc_address, Duration::from_millis(config.process_interval_ms))?;
    host.add_service(Box::new(events));
    Ok(host)
}

fn main() {
    // Initialize logging
    env_logger::init();

    // Get config file path from command line or use default
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    info!("pusd starting, configuration {}", config_path);

    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };

    info!("APID {}, TC on {}, TM to {}", config.apid, config.tc_address, config.tm_address);

    let mut host = match build_host(&config) {
        Ok(host) => host,
        Err(e) => {
            error!("Error creating services: {}", e);
            process::exit(1);
        }
    };

    let running = host.running_flag();
    if let Err(e) = ctrlc::set_handler(move || running.store(false, Ordering::SeqCst)) {
        error!("Error installing signal handler: {}", e);
        process::exit(1);
    }

    if let Err(e) = host.run() {
        error!("Error in main loop: {}", e);
        process::exit(1);
    }

    info!("pusd shutdown complete");
}
