//! Service host for pusd
//!
//! The host receives telecommands over UDP, offers each one to the services
//! it runs and drives their periodic processing.

use log::{debug, info, warn};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use puscommon::{PusError, PusResult, TcPacket};

use crate::config::constants::{PROCESS_INTERVAL_MIN, TC_BUFFER_SIZE};
use crate::service::Service;

/// Counters kept by the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStatistics {
    /// Datagrams received
    pub received: u64,
    /// Datagrams that did not decode as a telecommand
    pub malformed: u64,
    /// Telecommands no service accepted
    pub unrouted: u64,
    /// Telecommands executed
    pub processed: u64,
}

/// Receive errors that only mean no datagram arrived. A signal interrupts a
/// read with a timeout even when handlers restart system calls.
fn is_idle(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted)
}

/// Telecommand reception and service scheduling
pub struct ServiceHost {
    socket: UdpSocket,
    services: Vec<Box<dyn Service>>,
    running: Arc<AtomicBool>,
    stats: HostStatistics,
    recv_buffer: Vec<u8>,
}

impl ServiceHost {
    /// Bind the telecommand socket. `interval` bounds how long a cycle waits
    /// for a telecommand before processing.
    pub fn new(tc_address: &str, interval: Duration) -> PusResult<Self> {
        let socket = UdpSocket::bind(tc_address)?;
        socket.set_read_timeout(Some(interval.max(PROCESS_INTERVAL_MIN)))?;

        Ok(Self {
            socket,
            services: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            stats: HostStatistics::default(),
            recv_buffer: vec![0u8; TC_BUFFER_SIZE],
        })
    }

    pub fn local_addr(&self) -> PusResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn add_service(&mut self, service: Box<dyn Service>) {
        info!("hosting service {}", service.name());
        self.services.push(service);
    }

    /// Flag cleared to stop [`ServiceHost::run`], e.g. from a signal handler
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn statistics(&self) -> HostStatistics {
        self.stats
    }

    /// Offer a telecommand to every service; returns whether one took it
    pub fn distribute(&mut self, packet: TcPacket) -> bool {
        let target = self.services.iter().find(|s| s.enqueue(packet.clone()));
        match target {
            Some(service) => {
                debug!("TC({},{}) queued for {}", packet.service, packet.subservice, service.name());
                true
            }
            None => {
                self.stats.unrouted += 1;
                debug!(
                    "TC apid {} ({},{}) not accepted by any service",
                    packet.apid, packet.service, packet.subservice
                );
                false
            }
        }
    }

    /// Wait up to one interval for a telecommand datagram and queue it.
    /// Returns whether a datagram arrived.
    pub fn poll(&mut self) -> PusResult<bool> {
        match self.socket.recv_from(&mut self.recv_buffer) {
            Ok((size, addr)) => {
                self.stats.received += 1;
                match TcPacket::from_bytes(&self.recv_buffer[..size]) {
                    Ok(packet) => {
                        self.distribute(packet);
                    }
                    Err(e) => {
                        self.stats.malformed += 1;
                        warn!("malformed TC from {}: {}", addr, e);
                    }
                }
                Ok(true)
            }
            Err(ref e) if is_idle(e.kind()) => Ok(false),
            Err(e) => Err(PusError::Io(e)),
        }
    }

    /// Process queued telecommands and run periodic work of every service
    pub fn cycle(&mut self) -> usize {
        let mut processed = 0;
        for service in self.services.iter_mut() {
            processed += service.process();
            service.update();
        }
        self.stats.processed += processed as u64;
        processed
    }

    /// Run until the running flag is cleared
    pub fn run(&mut self) -> PusResult<()> {
        info!("service host listening on {}", self.local_addr()?);

        while self.running.load(Ordering::SeqCst) {
            self.poll()?;
            self.cycle();
        }

        info!("service host stopped: {:?}", self.stats);
        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
