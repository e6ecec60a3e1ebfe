//! Event report definition and serialization

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use puscommon::{FieldType, Layout, ParamValue, PusResult, ReportId, Severity};

use crate::parameter::Parameter;

/// One event report: identifier, severity, enabled flag and the parameters
/// whose values are appended to the identifier when the report is sent
#[derive(Debug)]
pub struct Report {
    id: ReportId,
    severity: Severity,
    enabled: AtomicBool,
    parameters: Vec<Arc<Parameter>>,
    id_value: ParamValue,
    layout: Layout,
}

impl Report {
    /// Create a report whose identifier is encoded as `id_type`
    pub fn new(
        id: ReportId,
        severity: Severity,
        enabled: bool,
        parameters: Vec<Arc<Parameter>>,
        id_type: FieldType,
    ) -> PusResult<Self> {
        let id_value = id_type.unsigned_value(id.0)?;
        let fields = std::iter::once(id_type)
            .chain(parameters.iter().map(|p| p.field_type()))
            .collect();

        Ok(Self {
            id,
            severity,
            enabled: AtomicBool::new(enabled),
            parameters,
            id_value,
            layout: Layout::new(fields),
        })
    }

    pub fn id(&self) -> ReportId {
        self.id
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn parameters(&self) -> &[Arc<Parameter>] {
        &self.parameters
    }

    /// Payload layout: identifier, then one field per parameter
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Encode the identifier and the current parameter values
    pub fn serialize(&self) -> PusResult<Vec<u8>> {
        let values: Vec<ParamValue> = std::iter::once(self.id_value)
            .chain(self.parameters.iter().map(|p| p.value()))
            .collect();
        self.layout.encode(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use puscommon::PusError;

    #[test]
    fn test_report_without_parameters() {
        let report = Report::new(ReportId(42), Severity::High, true, vec![], FieldType::U16).unwrap();
        assert_eq!(report.serialize().unwrap(), vec![0x00, 0x2a]);
        assert_eq!(report.layout().size(), 2);

        let report = Report::new(ReportId(42), Severity::High, true, vec![], FieldType::U32).unwrap();
        assert_eq!(report.serialize().unwrap(), vec![0x00, 0x00, 0x00, 0x2a]);
    }

    #[test]
    fn test_serialize_reads_current_values() {
        let mode = Arc::new(Parameter::new("mode", ParamValue::U8(1)));
        let temperature = Arc::new(Parameter::new("temperature", ParamValue::F32(1.0)));
        let report = Report::new(
            ReportId(7),
            Severity::Low,
            true,
            vec![mode.clone(), temperature.clone()],
            FieldType::U16,
        )
        .unwrap();
        assert_eq!(report.serialize().unwrap(), vec![0x00, 0x07, 0x01, 0x3f, 0x80, 0x00, 0x00]);

        mode.set(ParamValue::U8(2)).unwrap();
        temperature.set(ParamValue::F32(-2.0)).unwrap();
        assert_eq!(report.serialize().unwrap(), vec![0x00, 0x07, 0x02, 0xc0, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_serialized_report_decodes_with_layout() {
        let params = vec![
            Arc::new(Parameter::new("counter", ParamValue::U32(123_456))),
            Arc::new(Parameter::new("offset", ParamValue::I16(-300))),
            Arc::new(Parameter::new("valid", ParamValue::Bool(true))),
        ];
        let report = Report::new(ReportId(1000), Severity::Medium, true, params, FieldType::U16).unwrap();

        let values = report.layout().decode(&report.serialize().unwrap()).unwrap();
        assert_eq!(
            values,
            vec![
                ParamValue::U16(1000),
                ParamValue::U32(123_456),
                ParamValue::I16(-300),
                ParamValue::Bool(true),
            ]
        );
    }

    #[test]
    fn test_id_must_fit_field() {
        let result = Report::new(ReportId(256), Severity::Info, true, vec![], FieldType::U8);
        assert!(matches!(result, Err(PusError::InvalidReport(_))));
    }

    #[test]
    fn test_enable_disable_idempotent() {
        let report = Report::new(ReportId(1), Severity::Info, true, vec![], FieldType::U16).unwrap();
        assert!(report.is_enabled());
        report.disable();
        report.disable();
        assert!(!report.is_enabled());
        report.enable();
        report.enable();
        assert!(report.is_enabled());
    }
}
