//! PUS service 5: event reporting
//!
//! Reports are registered with [`EventReporting::add`] and sent either
//! explicitly with [`EventReporting::dispatch`] or by a [`Trigger`] watching a
//! parameter. Telecommands can enable and disable reports (subservices 5 and
//! 6) and ask for the list of disabled reports (subservice 7, answered with
//! subservice 8).

use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use puscommon::{Outcome, ParamValue, PusError, PusPolicy, PusResult, ReportId, ServiceType, Severity, TcPacket};

use crate::output::TmSink;
use crate::parameter::{Parameter, ParameterObserver};
use crate::report::Report;
use crate::service::{PusIdent, PusService, Service, ServiceState, TcInbox};
use crate::verification::RequestVerification;

/// Enable report generation
pub const SUBSERVICE_ENABLE: u8 = 5;
/// Disable report generation
pub const SUBSERVICE_DISABLE: u8 = 6;
/// Report the list of disabled reports
pub const SUBSERVICE_REPORT_DISABLED: u8 = 7;
/// Disabled reports list (telemetry)
pub const SUBSERVICE_DISABLED_LIST: u8 = 8;

/// Builds event telemetry and writes it to the sink
struct EventEmitter {
    ident: Arc<PusIdent>,
    policy: Arc<PusPolicy>,
    sink: Arc<dyn TmSink>,
}

impl EventEmitter {
    fn emit(&self, subservice: u8, data: Vec<u8>) {
        let packet = self.policy.tm_packet(
            self.ident.apid(),
            self.ident.seq_count(),
            ServiceType::EventReporting.to_u8(),
            subservice,
            self.policy.current_time(),
            data,
        );
        self.sink.write(packet);
    }

    fn dispatch(&self, report: &Report) -> PusResult<()> {
        if !report.is_enabled() {
            debug!("event {} disabled, not sent", report.id());
            return Ok(());
        }
        let payload = report.serialize()?;
        self.emit(report.severity().to_u8(), payload);
        Ok(())
    }
}

/// Transition condition of a trigger
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TriggerGuard {
    pub to_value: Option<ParamValue>,
    pub from_value: Option<ParamValue>,
}

impl TriggerGuard {
    /// Check a parameter change against the guard values
    pub fn matches(&self, old: &ParamValue, new: &ParamValue) -> bool {
        match (&self.from_value, &self.to_value) {
            (None, None) => true,
            (None, Some(to)) => new == to,
            (Some(from), Some(to)) => old == from && new == to,
            // Rejected when the report is added
            (Some(_), None) => false,
        }
    }
}

/// Sends a report when a parameter changes
#[derive(Debug, Clone)]
pub struct Trigger {
    parameter: Arc<Parameter>,
    guard: TriggerGuard,
}

impl Trigger {
    /// Fire on every change of `parameter`
    pub fn on_change(parameter: Arc<Parameter>) -> Self {
        Self {
            parameter,
            guard: TriggerGuard::default(),
        }
    }

    /// Fire only when the new value is `value`
    pub fn to_value(mut self, value: ParamValue) -> Self {
        self.guard.to_value = Some(value);
        self
    }

    /// Fire only on a change from `value`; needs a target set with
    /// [`Trigger::to_value`]
    pub fn from_value(mut self, value: ParamValue) -> Self {
        self.guard.from_value = Some(value);
        self
    }

    pub fn parameter(&self) -> &Arc<Parameter> {
        &self.parameter
    }

    fn validate(&self) -> PusResult<()> {
        if self.guard.from_value.is_some() && self.guard.to_value.is_none() {
            return Err(PusError::InvalidReport(format!(
                "trigger on {} has a from value but no to value",
                self.parameter.name()
            )));
        }
        let expected = self.parameter.field_type();
        for value in [self.guard.to_value, self.guard.from_value].iter().flatten() {
            if value.field_type() != expected {
                return Err(PusError::TypeMismatch {
                    expected: expected.name(),
                    actual: value.field_type().name(),
                });
            }
        }
        Ok(())
    }
}

/// Observer registered on a trigger parameter. It does not keep the report
/// or the service alive; once either is gone the parameter drops it.
struct TriggerSubscription {
    report: Weak<Report>,
    guard: TriggerGuard,
    emitter: Weak<EventEmitter>,
}

impl ParameterObserver for TriggerSubscription {
    fn notify(&self, old: &ParamValue, new: &ParamValue) {
        let (Some(report), Some(emitter)) = (self.report.upgrade(), self.emitter.upgrade()) else {
            return;
        };
        if !report.is_enabled() || !self.guard.matches(old, new) {
            return;
        }
        if let Err(e) = emitter.dispatch(&report) {
            error!("event {} trigger failed: {}", report.id(), e);
        }
    }

    fn is_active(&self) -> bool {
        self.report.strong_count() > 0 && self.emitter.strong_count() > 0
    }
}

/// Settings of a new report
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub severity: Severity,
    pub parameters: Vec<Arc<Parameter>>,
    pub enabled: bool,
    pub trigger: Option<Trigger>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            severity: Severity::Info,
            parameters: Vec::new(),
            enabled: true,
            trigger: None,
        }
    }
}

impl ReportOptions {
    pub fn new(severity: Severity) -> Self {
        Self {
            severity,
            ..Default::default()
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<Arc<Parameter>>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }
}

/// A report named by identifier or given directly
#[derive(Debug, Clone, Copy)]
pub enum ReportRef<'a> {
    Id(ReportId),
    Report(&'a Report),
}

impl From<ReportId> for ReportRef<'_> {
    fn from(id: ReportId) -> Self {
        ReportRef::Id(id)
    }
}

impl From<u64> for ReportRef<'_> {
    fn from(id: u64) -> Self {
        ReportRef::Id(ReportId(id))
    }
}

impl<'a> From<&'a Report> for ReportRef<'a> {
    fn from(report: &'a Report) -> Self {
        ReportRef::Report(report)
    }
}

impl<'a> From<&'a Arc<Report>> for ReportRef<'a> {
    fn from(report: &'a Arc<Report>) -> Self {
        ReportRef::Report(report.as_ref())
    }
}

/// Reports and telecommand handling of the event reporting service
pub struct EventReportingState {
    reports: BTreeMap<ReportId, Arc<Report>>,
    policy: Arc<PusPolicy>,
    emitter: Arc<EventEmitter>,
}

impl ServiceState for EventReportingState {}

impl EventReportingState {
    /// Decode `[count][id_1]..[id_count]`; no bytes may follow the last id
    fn parse_ids(&self, app_data: &[u8]) -> PusResult<Vec<ReportId>> {
        let count_field = self.policy.count_field();
        let id_field = self.policy.id_field();

        let count = count_field.decode_unsigned(app_data)?;
        let ids = &app_data[count_field.size()..];
        let expected = usize::try_from(count)
            .ok()
            .and_then(|n| n.checked_mul(id_field.size()))
            .ok_or_else(|| PusError::decode(format!("count {} too large", count)))?;
        if ids.len() != expected {
            return Err(PusError::decode(format!(
                "{} identifiers need {} bytes, got {}",
                count,
                expected,
                ids.len()
            )));
        }

        ids.chunks_exact(id_field.size())
            .map(|chunk| id_field.decode_unsigned(chunk).map(ReportId))
            .collect()
    }

    /// Enable or disable every listed report, or none of them
    fn toggle(&mut self, app_data: &[u8], enable: bool) -> bool {
        let ids = match self.parse_ids(app_data) {
            Ok(ids) => ids,
            Err(e) => {
                warn!("event enable/disable rejected: {}", e);
                return false;
            }
        };

        if let Some(unknown) = ids.iter().find(|id| !self.reports.contains_key(*id)) {
            warn!("event enable/disable rejected: unknown event {}", unknown);
            return false;
        }

        for id in &ids {
            if let Some(report) = self.reports.get(id) {
                if enable {
                    report.enable();
                } else {
                    report.disable();
                }
            }
        }
        info!("{} {} event(s)", if enable { "enabled" } else { "disabled" }, ids.len());
        true
    }

    fn report_disabled(&mut self, app_data: &[u8]) -> bool {
        if !app_data.is_empty() {
            warn!("disabled events request carries {} unexpected bytes", app_data.len());
            return false;
        }

        let disabled = self.disabled_ids();
        match self.encode_ids(&disabled) {
            Ok(payload) => {
                self.emitter.emit(SUBSERVICE_DISABLED_LIST, payload);
                true
            }
            Err(e) => {
                error!("disabled events report failed: {}", e);
                false
            }
        }
    }

    fn encode_ids(&self, ids: &[ReportId]) -> PusResult<Vec<u8>> {
        let count_field = self.policy.count_field();
        let id_field = self.policy.id_field();
        let mut payload = Vec::with_capacity(count_field.size() + ids.len() * id_field.size());
        count_field.encode_unsigned(ids.len() as u64, &mut payload)?;
        for id in ids {
            id_field.encode_unsigned(id.0, &mut payload)?;
        }
        Ok(payload)
    }

    fn disabled_ids(&self) -> Vec<ReportId> {
        self.reports
            .values()
            .filter(|report| !report.is_enabled())
            .map(|report| report.id())
            .collect()
    }
}

fn enable_events(state: &mut EventReportingState, app_data: &[u8]) -> Outcome {
    state.toggle(app_data, true).into()
}

fn disable_events(state: &mut EventReportingState, app_data: &[u8]) -> Outcome {
    state.toggle(app_data, false).into()
}

fn report_disabled_events(state: &mut EventReportingState, app_data: &[u8]) -> Outcome {
    state.report_disabled(app_data).into()
}

/// Event reporting service
pub struct EventReporting {
    service: PusService<EventReportingState>,
}

impl EventReporting {
    pub fn new(
        ident: Arc<PusIdent>,
        policy: Arc<PusPolicy>,
        verification: Arc<dyn RequestVerification>,
        sink: Arc<dyn TmSink>,
    ) -> Self {
        let emitter = Arc::new(EventEmitter {
            ident: ident.clone(),
            policy: policy.clone(),
            sink,
        });
        let state = EventReportingState {
            reports: BTreeMap::new(),
            policy,
            emitter,
        };

        let mut service = PusService::new(ServiceType::EventReporting, ident, verification, state);
        service.register(SUBSERVICE_ENABLE, enable_events);
        service.register(SUBSERVICE_DISABLE, disable_events);
        service.register(SUBSERVICE_REPORT_DISABLED, report_disabled_events);

        Self { service }
    }

    /// Register a new report. Fails if the identifier is taken or does not
    /// fit the identifier field, and if trigger values do not match the
    /// trigger parameter type.
    pub fn add(&mut self, id: impl Into<ReportId>, options: ReportOptions) -> PusResult<Arc<Report>> {
        let id = id.into();
        let state = self.service.state_mut();
        if state.reports.contains_key(&id) {
            return Err(PusError::DuplicateReport(id));
        }
        if let Some(trigger) = &options.trigger {
            trigger.validate()?;
        }

        let report = Arc::new(Report::new(
            id,
            options.severity,
            options.enabled,
            options.parameters,
            state.policy.id_field(),
        )?);

        if let Some(trigger) = options.trigger {
            debug!("event {} triggered by parameter {}", id, trigger.parameter.name());
            trigger.parameter.subscribe(Arc::new(TriggerSubscription {
                report: Arc::downgrade(&report),
                guard: trigger.guard,
                emitter: Arc::downgrade(&state.emitter),
            }));
        }

        state.reports.insert(id, report.clone());
        debug!("event {} added, severity {:?}", id, report.severity());
        Ok(report)
    }

    /// Send a report now, unless it is disabled
    pub fn dispatch<'a>(&self, report: impl Into<ReportRef<'a>>) -> PusResult<()> {
        let state = self.service.state();
        match report.into() {
            ReportRef::Id(id) => {
                let report = state.reports.get(&id).ok_or(PusError::UnknownReport(id))?;
                state.emitter.dispatch(report)
            }
            ReportRef::Report(report) => state.emitter.dispatch(report),
        }
    }

    pub fn report(&self, id: impl Into<ReportId>) -> Option<&Arc<Report>> {
        self.service.state().reports.get(&id.into())
    }

    /// All reports in identifier order
    pub fn reports(&self) -> impl Iterator<Item = &Arc<Report>> {
        self.service.state().reports.values()
    }

    /// Identifiers of disabled reports in ascending order
    pub fn disabled_ids(&self) -> Vec<ReportId> {
        self.service.state().disabled_ids()
    }

    pub fn enqueue(&self, packet: TcPacket) -> bool {
        self.service.enqueue(packet)
    }

    pub fn inbox(&self) -> TcInbox {
        self.service.inbox()
    }

    pub fn process(&mut self) -> usize {
        self.service.process()
    }

    pub fn update(&mut self) {
        self.service.update();
    }

    pub fn service(&self) -> &PusService<EventReportingState> {
        &self.service
    }
}

impl Service for EventReporting {
    fn name(&self) -> &'static str {
        self.service.name()
    }

    fn enqueue(&self, packet: TcPacket) -> bool {
        self.service.enqueue(packet)
    }

    fn process(&mut self) -> usize {
        self.service.process()
    }

    fn update(&mut self) {
        self.service.update();
    }
}
