//! Telemetry output sinks

use log::error;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Mutex, PoisonError};

use puscommon::{PusResult, TmPacket};

/// Destination of telemetry packets; writes are fire-and-forget
pub trait TmSink: Send + Sync {
    fn write(&self, packet: TmPacket);
}

/// Collects packets in memory
#[derive(Debug, Default)]
pub struct TmCollector {
    packets: Mutex<Vec<TmPacket>>,
}

impl TmCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<TmPacket> {
        std::mem::take(&mut *self.packets.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.packets.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TmSink for TmCollector {
    fn write(&self, packet: TmPacket) {
        self.packets.lock().unwrap_or_else(PoisonError::into_inner).push(packet);
    }
}

/// Sends each packet as one UDP datagram
pub struct UdpTmSink {
    socket: UdpSocket,
    dest_addr: SocketAddr,
}

impl UdpTmSink {
    pub fn new(dest_addr: SocketAddr) -> PusResult<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?; // 0 = let OS pick a port
        Ok(Self { socket, dest_addr })
    }
}

impl TmSink for UdpTmSink {
    fn write(&self, packet: TmPacket) {
        let data = match packet.to_bytes() {
            Ok(data) => data,
            Err(e) => {
                error!("TM({},{}) not sent: {}", packet.service, packet.subservice, e);
                return;
            }
        };
        if let Err(e) = self.socket.send_to(&data, self.dest_addr) {
            error!("TM({},{}) to {} failed: {}", packet.service, packet.subservice, self.dest_addr, e);
        }
    }
}
