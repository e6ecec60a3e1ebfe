//! Type definitions shared between the services and their collaborators

use serde::{Deserialize, Serialize};
use std::fmt;

/// Standard PUS service types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceType {
    RequestVerification,
    DeviceAccess,
    Housekeeping,
    ParameterStatisticsReporting,
    EventReporting,
    MemoryManagement,
    FunctionManagement,
    TimeManagement,
    TimeBasedScheduling,
    OnboardMonitoring,
    LargePacketTransfer,
    RealtimeForwardingControl,
    OnboardStorageAndRetrieval,
    Test,
    OnboardControlProcedures,
    EventAction,
    OnboardParameterManagement,
    RequestSequencing,
    PositionBasedScheduling,
    FileManagement,
}

impl ServiceType {
    pub fn to_u8(&self) -> u8 {
        match self {
            ServiceType::RequestVerification => 1,
            ServiceType::DeviceAccess => 2,
            ServiceType::Housekeeping => 3,
            ServiceType::ParameterStatisticsReporting => 4,
            ServiceType::EventReporting => 5,
            ServiceType::MemoryManagement => 6,
            ServiceType::FunctionManagement => 8,
            ServiceType::TimeManagement => 9,
            ServiceType::TimeBasedScheduling => 11,
            ServiceType::OnboardMonitoring => 12,
            ServiceType::LargePacketTransfer => 13,
            ServiceType::RealtimeForwardingControl => 14,
            ServiceType::OnboardStorageAndRetrieval => 15,
            ServiceType::Test => 17,
            ServiceType::OnboardControlProcedures => 18,
            ServiceType::EventAction => 19,
            ServiceType::OnboardParameterManagement => 20,
            ServiceType::RequestSequencing => 21,
            ServiceType::PositionBasedScheduling => 22,
            ServiceType::FileManagement => 23,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(ServiceType::RequestVerification),
            2 => Some(ServiceType::DeviceAccess),
            3 => Some(ServiceType::Housekeeping),
            4 => Some(ServiceType::ParameterStatisticsReporting),
            5 => Some(ServiceType::EventReporting),
            6 => Some(ServiceType::MemoryManagement),
            8 => Some(ServiceType::FunctionManagement),
            9 => Some(ServiceType::TimeManagement),
            11 => Some(ServiceType::TimeBasedScheduling),
            12 => Some(ServiceType::OnboardMonitoring),
            13 => Some(ServiceType::LargePacketTransfer),
            14 => Some(ServiceType::RealtimeForwardingControl),
            15 => Some(ServiceType::OnboardStorageAndRetrieval),
            17 => Some(ServiceType::Test),
            18 => Some(ServiceType::OnboardControlProcedures),
            19 => Some(ServiceType::EventAction),
            20 => Some(ServiceType::OnboardParameterManagement),
            21 => Some(ServiceType::RequestSequencing),
            22 => Some(ServiceType::PositionBasedScheduling),
            23 => Some(ServiceType::FileManagement),
            _ => None,
        }
    }

    /// Upper-case identifier of the service
    pub fn name(&self) -> &'static str {
        match self {
            ServiceType::RequestVerification => "REQUEST_VERIFICATION",
            ServiceType::DeviceAccess => "DEVICE_ACCESS",
            ServiceType::Housekeeping => "HOUSEKEEPING",
            ServiceType::ParameterStatisticsReporting => "PARAMETER_STATISTICS_REPORTING",
            ServiceType::EventReporting => "EVENT_REPORTING",
            ServiceType::MemoryManagement => "MEMORY_MANAGEMENT",
            ServiceType::FunctionManagement => "FUNCTION_MANAGEMENT",
            ServiceType::TimeManagement => "TIME_MANAGEMENT",
            ServiceType::TimeBasedScheduling => "TIME_BASED_SCHEDULING",
            ServiceType::OnboardMonitoring => "ONBOARD_MONITORING",
            ServiceType::LargePacketTransfer => "LARGE_PACKET_TRANSFER",
            ServiceType::RealtimeForwardingControl => "REALTIME_FORWARDING_CONTROL",
            ServiceType::OnboardStorageAndRetrieval => "ONBOARD_STORAGE_AND_RETRIEVAL",
            ServiceType::Test => "TEST",
            ServiceType::OnboardControlProcedures => "ONBOARD_CONTROL_PROCEDURES",
            ServiceType::EventAction => "EVENT_ACTION",
            ServiceType::OnboardParameterManagement => "ONBOARD_PARAMETER_MANAGEMENT",
            ServiceType::RequestSequencing => "REQUEST_SEQUENCING",
            ServiceType::PositionBasedScheduling => "POSITION_BASED_SCHEDULING",
            ServiceType::FileManagement => "FILE_MANAGEMENT",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ServiceType::RequestVerification => "Request verification",
            ServiceType::DeviceAccess => "Device access",
            ServiceType::Housekeeping => "Housekeeping",
            ServiceType::ParameterStatisticsReporting => "Parameter statistics reporting",
            ServiceType::EventReporting => "Event reporting",
            ServiceType::MemoryManagement => "Memory management",
            ServiceType::FunctionManagement => "Function Management",
            ServiceType::TimeManagement => "Time Management",
            ServiceType::TimeBasedScheduling => "Time-based scheduling",
            ServiceType::OnboardMonitoring => "On-board monitoring",
            ServiceType::LargePacketTransfer => "Large packet transfer",
            ServiceType::RealtimeForwardingControl => "Real-time forwarding control",
            ServiceType::OnboardStorageAndRetrieval => "On-board storage and retrieval",
            ServiceType::Test => "Test",
            ServiceType::OnboardControlProcedures => "On-board control procedures",
            ServiceType::EventAction => "Event-action",
            ServiceType::OnboardParameterManagement => "On-board parameter management",
            ServiceType::RequestSequencing => "Request sequencing",
            ServiceType::PositionBasedScheduling => "Position-based scheduling",
            ServiceType::FileManagement => "File management",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Event report severity, sent as the TM subtype
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn to_u8(&self) -> u8 {
        match self {
            Severity::Info => 1,
            Severity::Low => 2,
            Severity::Medium => 3,
            Severity::High => 4,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Severity::Info),
            2 => Some(Severity::Low),
            3 => Some(Severity::Medium),
            4 => Some(Severity::High),
            _ => None,
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Info
    }
}

/// Event report identifier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReportId(pub u64);

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ReportId {
    fn from(value: u64) -> Self {
        ReportId(value)
    }
}

/// Acknowledgment flags of a telecommand
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AckFlag {
    Acceptance,
    Start,
    Progress,
    Completion,
}

impl AckFlag {
    /// Bit position in the 4-bit field of the TC secondary header
    pub fn mask(&self) -> u8 {
        match self {
            AckFlag::Acceptance => 0b0001,
            AckFlag::Start => 0b0010,
            AckFlag::Progress => 0b0100,
            AckFlag::Completion => 0b1000,
        }
    }
}

/// Set of requested acknowledgments
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AckFlags(pub u8);

impl AckFlags {
    pub const NONE: AckFlags = AckFlags(0);

    pub fn with(mut self, flag: AckFlag) -> Self {
        self.0 |= flag.mask();
        self
    }

    pub fn contains(&self, flag: AckFlag) -> bool {
        self.0 & flag.mask() != 0
    }
}

/// Verification failure code reported to service 1
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub u16);

/// Failure codes common to every service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CommonErrorCode {
    IllegalApid,
    IncompleteOrInvalidLength,
    IncorrectChecksum,
    IllegalPacketType,
    IllegalPacketSubtype,
    IllegalAppData,
}

impl CommonErrorCode {
    pub fn code(&self) -> ErrorCode {
        match self {
            CommonErrorCode::IllegalApid => ErrorCode(0),
            CommonErrorCode::IncompleteOrInvalidLength => ErrorCode(1),
            CommonErrorCode::IncorrectChecksum => ErrorCode(2),
            CommonErrorCode::IllegalPacketType => ErrorCode(3),
            CommonErrorCode::IllegalPacketSubtype => ErrorCode(4),
            CommonErrorCode::IllegalAppData => ErrorCode(5),
        }
    }
}

impl From<CommonErrorCode> for ErrorCode {
    fn from(code: CommonErrorCode) -> Self {
        code.code()
    }
}

/// Result of executing a subservice handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(ErrorCode),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// Failure code, `None` on success
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Outcome::Success => None,
            Outcome::Failure(code) => Some(*code),
        }
    }
}

impl From<bool> for Outcome {
    fn from(success: bool) -> Self {
        if success {
            Outcome::Success
        } else {
            Outcome::Failure(CommonErrorCode::IllegalAppData.code())
        }
    }
}

impl From<ErrorCode> for Outcome {
    fn from(code: ErrorCode) -> Self {
        Outcome::Failure(code)
    }
}

impl From<CommonErrorCode> for Outcome {
    fn from(code: CommonErrorCode) -> Self {
        Outcome::Failure(code.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_type_conversion() {
        let service = ServiceType::EventReporting;
        assert_eq!(service.to_u8(), 5);
        assert_eq!(ServiceType::from_u8(5), Some(ServiceType::EventReporting));
        assert_eq!(ServiceType::from_u8(7), None);
        assert_eq!(format!("{}", service), "Event reporting");
    }

    #[test]
    fn test_severity_conversion() {
        assert_eq!(Severity::High.to_u8(), 4);
        assert_eq!(Severity::from_u8(1), Some(Severity::Info));
        assert_eq!(Severity::from_u8(0), None);
        assert_eq!(Severity::default(), Severity::Info);
    }

    #[test]
    fn test_ack_flags() {
        let flags = AckFlags::NONE.with(AckFlag::Acceptance).with(AckFlag::Completion);
        assert_eq!(flags.0, 0b1001);
        assert!(flags.contains(AckFlag::Acceptance));
        assert!(!flags.contains(AckFlag::Start));
        assert!(flags.contains(AckFlag::Completion));
    }

    #[test]
    fn test_outcome_from_bool() {
        assert_eq!(Outcome::from(true), Outcome::Success);
        let failed = Outcome::from(false);
        assert!(!failed.is_success());
        assert_eq!(failed.code(), Some(ErrorCode(5)));
    }

    #[test]
    fn test_outcome_from_code() {
        let outcome = Outcome::from(ErrorCode(0x42));
        assert_eq!(outcome.code(), Some(ErrorCode(0x42)));
    }
}
