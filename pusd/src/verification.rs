//! Request verification collaborators
//!
//! Services report acceptance and completion of every telecommand that asks
//! for it. The verification service itself lives elsewhere; this module holds
//! the interface plus a recording and a logging implementation.

use log::{info, warn};
use std::sync::{Mutex, PoisonError};

use puscommon::{ErrorCode, TcPacket};

/// Receiver of acceptance and completion reports
pub trait RequestVerification: Send + Sync {
    fn accept(&self, packet: &TcPacket, code: Option<ErrorCode>, success: bool);
    fn complete(&self, packet: &TcPacket, code: Option<ErrorCode>, success: bool);
}

/// Verification stage of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStage {
    Acceptance,
    Completion,
}

/// A single verification report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub stage: VerificationStage,
    pub apid: u16,
    pub seq_count: u16,
    pub service: u8,
    pub subservice: u8,
    pub success: bool,
    pub code: Option<ErrorCode>,
}

impl VerificationReport {
    fn new(stage: VerificationStage, packet: &TcPacket, code: Option<ErrorCode>, success: bool) -> Self {
        Self {
            stage,
            apid: packet.apid,
            seq_count: packet.seq_count,
            service: packet.service,
            subservice: packet.subservice,
            success,
            code,
        }
    }
}

/// Keeps every report in memory
#[derive(Debug, Default)]
pub struct VerificationRecorder {
    reports: Mutex<Vec<VerificationReport>>,
}

impl VerificationRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all reports so far
    pub fn reports(&self) -> Vec<VerificationReport> {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Remove and return all reports so far
    pub fn take(&self) -> Vec<VerificationReport> {
        std::mem::take(&mut *self.reports.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn record(&self, report: VerificationReport) {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner).push(report);
    }
}

impl RequestVerification for VerificationRecorder {
    fn accept(&self, packet: &TcPacket, code: Option<ErrorCode>, success: bool) {
        self.record(VerificationReport::new(VerificationStage::Acceptance, packet, code, success));
    }

    fn complete(&self, packet: &TcPacket, code: Option<ErrorCode>, success: bool) {
        self.record(VerificationReport::new(VerificationStage::Completion, packet, code, success));
    }
}

/// Writes every report to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct VerificationLog;

impl VerificationLog {
    fn log(stage: VerificationStage, packet: &TcPacket, code: Option<ErrorCode>, success: bool) {
        if success {
            info!(
                "TC({},{}) seq {} {:?} succeeded",
                packet.service, packet.subservice, packet.seq_count, stage
            );
        } else {
            warn!(
                "TC({},{}) seq {} {:?} failed, code {:?}",
                packet.service, packet.subservice, packet.seq_count, stage, code.map(|c| c.0)
            );
        }
    }
}

impl RequestVerification for VerificationLog {
    fn accept(&self, packet: &TcPacket, code: Option<ErrorCode>, success: bool) {
        Self::log(VerificationStage::Acceptance, packet, code, success);
    }

    fn complete(&self, packet: &TcPacket, code: Option<ErrorCode>, success: bool) {
        Self::log(VerificationStage::Completion, packet, code, success);
    }
}
