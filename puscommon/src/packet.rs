//! Telecommand and telemetry packets
//!
//! Packets are CCSDS space packets (CCSDS 133.0-B-2) carrying a PUS-C
//! secondary header (ECSS-E-ST-70-41C).

use crate::error::{PusError, PusResult};
use crate::time::{CucFormat, CucTime};
use crate::types::{AckFlag, AckFlags};

/// PUS version number carried in every secondary header
pub const PUS_VERSION: u8 = 2;

/// Size of the CCSDS primary header in bytes
pub const PRIMARY_HEADER_SIZE: usize = 6;

/// Size of the TC secondary header in bytes
pub const TC_SECONDARY_HEADER_SIZE: usize = 5;

/// Size of the TM secondary header without the time field
pub const TM_SECONDARY_HEADER_SIZE: usize = 7;

/// Largest packet data field the 16-bit length field can describe
pub const MAX_DATA_FIELD_SIZE: usize = 65536;

/// Largest possible space packet
pub const MAX_PACKET_SIZE: usize = PRIMARY_HEADER_SIZE + MAX_DATA_FIELD_SIZE;

const APID_MASK: u16 = 0x07ff;
const SEQ_COUNT_MASK: u16 = 0x3fff;
const SEQ_FLAGS_UNSEGMENTED: u16 = 0b11 << 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PacketType {
    Telemetry = 0,
    Telecommand = 1,
}

fn encode_primary_header(
    packet_type: PacketType,
    apid: u16,
    seq_count: u16,
    data_len: usize,
    out: &mut Vec<u8>,
) -> PusResult<()> {
    let len = data_len
        .checked_sub(1)
        .and_then(|len| u16::try_from(len).ok())
        .ok_or(PusError::PacketTooLarge {
            size: data_len,
            max: MAX_DATA_FIELD_SIZE,
        })?;
    let id = ((packet_type as u16) << 12) | (1 << 11) | (apid & APID_MASK);
    let seq = SEQ_FLAGS_UNSEGMENTED | (seq_count & SEQ_COUNT_MASK);
    out.extend_from_slice(&id.to_be_bytes());
    out.extend_from_slice(&seq.to_be_bytes());
    out.extend_from_slice(&len.to_be_bytes());
    Ok(())
}

/// Returns APID, sequence count and the packet data field
fn decode_primary_header(data: &[u8], expected: PacketType) -> PusResult<(u16, u16, &[u8])> {
    if data.len() < PRIMARY_HEADER_SIZE {
        return Err(PusError::decode("packet shorter than primary header"));
    }
    let id = u16::from_be_bytes([data[0], data[1]]);
    let seq = u16::from_be_bytes([data[2], data[3]]);
    let len = u16::from_be_bytes([data[4], data[5]]) as usize + 1;

    if id >> 13 != 0 {
        return Err(PusError::decode(format!("unsupported packet version {}", id >> 13)));
    }
    if (id >> 12) & 1 != expected as u16 {
        return Err(PusError::decode(format!("expected {:?} packet", expected)));
    }
    if (id >> 11) & 1 != 1 {
        return Err(PusError::decode("missing secondary header"));
    }
    let body = &data[PRIMARY_HEADER_SIZE..];
    if body.len() != len {
        return Err(PusError::decode(format!(
            "packet data length {} does not match {} received bytes",
            len,
            body.len()
        )));
    }
    Ok((id & APID_MASK, seq & SEQ_COUNT_MASK, body))
}

/// A telecommand packet addressed to a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcPacket {
    pub apid: u16,
    pub seq_count: u16,
    pub service: u8,
    pub subservice: u8,
    pub ack: AckFlags,
    pub source_id: u16,
    pub app_data: Vec<u8>,
}

impl TcPacket {
    pub fn new(apid: u16, service: u8, subservice: u8, app_data: Vec<u8>) -> Self {
        Self {
            apid,
            seq_count: 0,
            service,
            subservice,
            ack: AckFlags::NONE,
            source_id: 0,
            app_data,
        }
    }

    pub fn with_ack(mut self, ack: AckFlags) -> Self {
        self.ack = ack;
        self
    }

    pub fn with_seq_count(mut self, seq_count: u16) -> Self {
        self.seq_count = seq_count & SEQ_COUNT_MASK;
        self
    }

    /// Check whether the sender asked for the given acknowledgment
    pub fn requests_ack(&self, flag: AckFlag) -> bool {
        self.ack.contains(flag)
    }

    /// Encode the packet; fails if the data field does not fit the length field
    pub fn to_bytes(&self) -> PusResult<Vec<u8>> {
        let data_len = TC_SECONDARY_HEADER_SIZE + self.app_data.len();
        let mut out = Vec::with_capacity(PRIMARY_HEADER_SIZE + data_len);
        encode_primary_header(PacketType::Telecommand, self.apid, self.seq_count, data_len, &mut out)?;
        out.push((PUS_VERSION << 4) | (self.ack.0 & 0x0f));
        out.push(self.service);
        out.push(self.subservice);
        out.extend_from_slice(&self.source_id.to_be_bytes());
        out.extend_from_slice(&self.app_data);
        Ok(out)
    }

    pub fn from_bytes(data: &[u8]) -> PusResult<Self> {
        let (apid, seq_count, body) = decode_primary_header(data, PacketType::Telecommand)?;
        if body.len() < TC_SECONDARY_HEADER_SIZE {
            return Err(PusError::decode("TC shorter than secondary header"));
        }
        let version = body[0] >> 4;
        if version != PUS_VERSION {
            return Err(PusError::decode(format!("unsupported PUS version {}", version)));
        }
        Ok(Self {
            apid,
            seq_count,
            service: body[1],
            subservice: body[2],
            ack: AckFlags(body[0] & 0x0f),
            source_id: u16::from_be_bytes([body[3], body[4]]),
            app_data: body[TC_SECONDARY_HEADER_SIZE..].to_vec(),
        })
    }
}

/// A telemetry packet produced by a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmPacket {
    pub apid: u16,
    pub seq_count: u16,
    pub service: u8,
    pub subservice: u8,
    pub time: CucTime,
    pub data: Vec<u8>,
}

impl TmPacket {
    pub fn to_bytes(&self) -> PusResult<Vec<u8>> {
        let time = self.time.to_bytes();
        let data_len = TM_SECONDARY_HEADER_SIZE + time.len() + self.data.len();
        let mut out = Vec::with_capacity(PRIMARY_HEADER_SIZE + data_len);
        encode_primary_header(PacketType::Telemetry, self.apid, self.seq_count, data_len, &mut out)?;
        out.push(PUS_VERSION << 4);
        out.push(self.service);
        out.push(self.subservice);
        // Message type counter and destination id are not used
        out.extend_from_slice(&[0, 0, 0, 0]);
        out.extend_from_slice(&time);
        out.extend_from_slice(&self.data);
        Ok(out)
    }

    /// Decode a packet whose time field uses `format`
    pub fn from_bytes(data: &[u8], format: CucFormat) -> PusResult<Self> {
        let (apid, seq_count, body) = decode_primary_header(data, PacketType::Telemetry)?;
        let header_len = TM_SECONDARY_HEADER_SIZE + format.size();
        if body.len() < header_len {
            return Err(PusError::decode("TM shorter than secondary header"));
        }
        let version = body[0] >> 4;
        if version != PUS_VERSION {
            return Err(PusError::decode(format!("unsupported PUS version {}", version)));
        }
        Ok(Self {
            apid,
            seq_count,
            service: body[1],
            subservice: body[2],
            time: CucTime::from_bytes(&body[TM_SECONDARY_HEADER_SIZE..], format)?,
            data: body[header_len..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tc_wire_layout() {
        let tc = TcPacket::new(0x123, 5, 6, vec![0x01, 0x00, 0x2a])
            .with_ack(AckFlags::NONE.with(AckFlag::Acceptance).with(AckFlag::Completion))
            .with_seq_count(7);
        let bytes = tc.to_bytes().unwrap();
        assert_eq!(
            bytes,
            vec![0x19, 0x23, 0xc0, 0x07, 0x00, 0x07, 0x29, 0x05, 0x06, 0x00, 0x00, 0x01, 0x00, 0x2a]
        );
        assert_eq!(TcPacket::from_bytes(&bytes).unwrap(), tc);
    }

    #[test]
    fn test_tc_rejects_bad_length() {
        let mut bytes = TcPacket::new(1, 5, 7, vec![]).to_bytes().unwrap();
        bytes.push(0);
        assert!(TcPacket::from_bytes(&bytes).is_err());
        assert!(TcPacket::from_bytes(&bytes[..4]).is_err());
    }

    #[test]
    fn test_tc_rejects_tm() {
        let tm = TmPacket {
            apid: 1,
            seq_count: 0,
            service: 5,
            subservice: 1,
            time: CucTime::new(0, 0, CucFormat::default()),
            data: vec![],
        };
        assert!(TcPacket::from_bytes(&tm.to_bytes().unwrap()).is_err());
    }

    #[test]
    fn test_tm_wire_layout() {
        let format = CucFormat::new(4, 0).unwrap();
        let tm = TmPacket {
            apid: 0x42,
            seq_count: 3,
            service: 5,
            subservice: 4,
            time: CucTime::new(0x0a0b_0c0d, 0, format),
            data: vec![0x00, 0x2a],
        };
        let bytes = tm.to_bytes().unwrap();
        assert_eq!(bytes.len(), PRIMARY_HEADER_SIZE + TM_SECONDARY_HEADER_SIZE + 4 + 2);
        assert_eq!(&bytes[..6], &[0x08, 0x42, 0xc0, 0x03, 0x00, 0x0c]);
        assert_eq!(&bytes[6..9], &[0x20, 0x05, 0x04]);
        assert_eq!(&bytes[13..17], &[0x0a, 0x0b, 0x0c, 0x0d]);
        assert_eq!(&bytes[17..], &[0x00, 0x2a]);

        let decoded = TmPacket::from_bytes(&bytes, format).unwrap();
        assert_eq!(decoded, tm);
    }

    #[test]
    fn test_tm_rejects_truncated_time() {
        let format = CucFormat::default();
        let tm = TmPacket {
            apid: 1,
            seq_count: 0,
            service: 5,
            subservice: 1,
            time: CucTime::new(5, 0, format),
            data: vec![],
        };
        let bytes = tm.to_bytes().unwrap();
        assert!(TmPacket::from_bytes(&bytes, format).is_ok());

        // Drop the fine time bytes and fix up the length field to match
        let mut cut = bytes[..bytes.len() - 2].to_vec();
        let len = (cut.len() - PRIMARY_HEADER_SIZE - 1) as u16;
        cut[4..6].copy_from_slice(&len.to_be_bytes());
        assert!(matches!(TmPacket::from_bytes(&cut, format), Err(PusError::Decode(_))));

        assert!(TmPacket::from_bytes(&bytes[..PRIMARY_HEADER_SIZE + 3], format).is_err());
    }

    #[test]
    fn test_oversized_data_field() {
        let max_app_data = MAX_DATA_FIELD_SIZE - TC_SECONDARY_HEADER_SIZE;
        let tc = TcPacket::new(1, 5, 5, vec![0; max_app_data]);
        assert_eq!(tc.to_bytes().unwrap().len(), MAX_PACKET_SIZE);

        let tc = TcPacket::new(1, 5, 5, vec![0; max_app_data + 1]);
        assert!(matches!(
            tc.to_bytes(),
            Err(PusError::PacketTooLarge { size: 65537, max: MAX_DATA_FIELD_SIZE })
        ));

        let tm = TmPacket {
            apid: 1,
            seq_count: 0,
            service: 5,
            subservice: 8,
            time: CucTime::new(0, 0, CucFormat::default()),
            data: vec![0; MAX_DATA_FIELD_SIZE],
        };
        assert!(matches!(tm.to_bytes(), Err(PusError::PacketTooLarge { .. })));
    }
}
