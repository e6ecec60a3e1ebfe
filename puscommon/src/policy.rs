//! Packet format policy
//!
//! The policy decides the binary format of identifier and count fields, the
//! time code used in telemetry and how telemetry packets are built. It is
//! created once at startup and handed to every service.

use serde::{Deserialize, Serialize};

use crate::error::{PusError, PusResult};
use crate::field::FieldType;
use crate::packet::TmPacket;
use crate::time::{CucFormat, CucTime};

/// Format policy shared by all services of a process
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PusPolicy {
    #[serde(default = "default_id_type")]
    pub id_type: FieldType,
    #[serde(default = "default_count_type")]
    pub count_type: FieldType,
    #[serde(default)]
    pub time: CucFormat,
}

fn default_id_type() -> FieldType {
    FieldType::U16
}

fn default_count_type() -> FieldType {
    FieldType::U8
}

impl Default for PusPolicy {
    fn default() -> Self {
        Self {
            id_type: default_id_type(),
            count_type: default_count_type(),
            time: CucFormat::default(),
        }
    }
}

impl PusPolicy {
    pub fn new(id_type: FieldType, count_type: FieldType, time: CucFormat) -> PusResult<Self> {
        let policy = Self {
            id_type,
            count_type,
            time,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Identifier and count fields must be unsigned integers
    pub fn validate(&self) -> PusResult<()> {
        if self.id_type.unsigned_max().is_none() {
            return Err(PusError::Config(format!("identifier type {} is not unsigned", self.id_type)));
        }
        if self.count_type.unsigned_max().is_none() {
            return Err(PusError::Config(format!("count type {} is not unsigned", self.count_type)));
        }
        self.time.validate()
    }

    pub fn id_field(&self) -> FieldType {
        self.id_type
    }

    pub fn count_field(&self) -> FieldType {
        self.count_type
    }

    pub fn time_format(&self) -> CucFormat {
        self.time
    }

    pub fn current_time(&self) -> CucTime {
        CucTime::now(self.time)
    }

    /// Build a telemetry packet
    pub fn tm_packet(&self, apid: u16, seq_count: u16, service: u8, subservice: u8, time: CucTime, data: Vec<u8>) -> TmPacket {
        TmPacket {
            apid,
            seq_count,
            service,
            subservice,
            time,
            data,
        }
    }
}
