//! CCSDS Unsegmented time Code (CUC)

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{PusError, PusResult};

/// Octet counts of a CUC time field
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CucFormat {
    /// Bytes of whole seconds, 1 to 4
    pub coarse_bytes: u8,
    /// Bytes of binary fractions of a second, 0 to 3
    pub fine_bytes: u8,
}

impl Default for CucFormat {
    fn default() -> Self {
        Self {
            coarse_bytes: 4,
            fine_bytes: 2,
        }
    }
}

impl CucFormat {
    pub fn new(coarse_bytes: u8, fine_bytes: u8) -> PusResult<Self> {
        let format = Self {
            coarse_bytes,
            fine_bytes,
        };
        format.validate()?;
        Ok(format)
    }

    pub fn validate(&self) -> PusResult<()> {
        if !(1..=4).contains(&self.coarse_bytes) || self.fine_bytes > 3 {
            return Err(PusError::Config(format!(
                "invalid CUC format {}+{}",
                self.coarse_bytes, self.fine_bytes
            )));
        }
        Ok(())
    }

    /// Encoded size in bytes
    pub fn size(&self) -> usize {
        (self.coarse_bytes + self.fine_bytes) as usize
    }
}

/// A CUC time value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CucTime {
    pub coarse: u32,
    pub fine: u32,
    pub format: CucFormat,
}

impl CucTime {
    /// Create a time value, truncating both parts to the format width
    pub fn new(coarse: u32, fine: u32, format: CucFormat) -> Self {
        Self {
            coarse: coarse & mask(format.coarse_bytes),
            fine: fine & mask(format.fine_bytes),
            format,
        }
    }

    /// Current onboard time, counted from the UNIX epoch
    pub fn now(format: CucFormat) -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let fine_bits = 8 * format.fine_bytes as u32;
        let fine = ((duration.subsec_nanos() as u64) << fine_bits) / 1_000_000_000;
        Self::new(duration.as_secs() as u32, fine as u32, format)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.format.size());
        let coarse = self.coarse.to_be_bytes();
        out.extend_from_slice(&coarse[4 - self.format.coarse_bytes as usize..]);
        let fine = self.fine.to_be_bytes();
        out.extend_from_slice(&fine[4 - self.format.fine_bytes as usize..]);
        out
    }

    pub fn from_bytes(data: &[u8], format: CucFormat) -> PusResult<Self> {
        let bytes = data.get(..format.size()).ok_or_else(|| {
            PusError::decode(format!("CUC time needs {} bytes", format.size()))
        })?;
        let (coarse, fine) = bytes.split_at(format.coarse_bytes as usize);
        let fold = |acc: u32, b: &u8| (acc << 8) | *b as u32;
        Ok(Self {
            coarse: coarse.iter().fold(0, fold),
            fine: fine.iter().fold(0, fold),
            format,
        })
    }
}

fn mask(bytes: u8) -> u32 {
    match bytes {
        0 => 0,
        4 => u32::MAX,
        n => (1u32 << (8 * n as u32)) - 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_validation() {
        assert!(CucFormat::new(4, 2).is_ok());
        assert!(CucFormat::new(0, 2).is_err());
        assert!(CucFormat::new(4, 4).is_err());
    }

    #[test]
    fn test_time_bytes() {
        let format = CucFormat::new(4, 2).unwrap();
        let time = CucTime::new(0x0102_0304, 0x8000, format);
        assert_eq!(time.to_bytes(), vec![0x01, 0x02, 0x03, 0x04, 0x80, 0x00]);
        assert_eq!(CucTime::from_bytes(&time.to_bytes(), format).unwrap(), time);
    }

    #[test]
    fn test_time_truncated_to_format() {
        let format = CucFormat::new(2, 1).unwrap();
        let time = CucTime::new(0x0102_0304, 0x1234, format);
        assert_eq!(time.to_bytes(), vec![0x03, 0x04, 0x34]);
    }

    #[test]
    fn test_time_now() {
        let time = CucTime::now(CucFormat::default());
        assert!(time.coarse > 0);
        assert!(time.fine <= 0xffff);
        assert_eq!(time.to_bytes().len(), 6);
    }
}
