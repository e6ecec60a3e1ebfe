//! Configuration loading for pusd

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use puscommon::{json_to_value, EventConfigJson, PusError, PusResult, PusdConfig};

use crate::event_reporting::{EventReporting, ReportOptions, Trigger};
use crate::parameter::Parameter;

/// Parameters by name
pub type ParameterMap = BTreeMap<String, Arc<Parameter>>;

/// Load and validate the process configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> PusResult<PusdConfig> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let config: PusdConfig = serde_json::from_reader(reader)?;
    config.validate()?;
    Ok(config)
}

/// Create the configured parameters with their initial values
pub fn build_parameters(config: &PusdConfig) -> PusResult<ParameterMap> {
    config
        .parameters
        .iter()
        .map(|p| -> PusResult<(String, Arc<Parameter>)> {
            let initial = p.initial_value().map_err(PusError::Config)?;
            Ok((p.name.clone(), Arc::new(Parameter::new(&p.name, initial))))
        })
        .collect()
}

/// Add every configured event to the service
pub fn register_events(events: &mut EventReporting, config: &PusdConfig, parameters: &ParameterMap) -> PusResult<()> {
    for event in &config.events {
        let options = report_options(event, parameters)?;
        events.add(event.id, options)?;
    }
    Ok(())
}

fn lookup(parameters: &ParameterMap, name: &str, event: u64) -> PusResult<Arc<Parameter>> {
    parameters
        .get(name)
        .cloned()
        .ok_or_else(|| PusError::Config(format!("event {}: unknown parameter {}", event, name)))
}

fn report_options(event: &EventConfigJson, parameters: &ParameterMap) -> PusResult<ReportOptions> {
    let included = event
        .parameters
        .iter()
        .map(|name| lookup(parameters, name, event.id))
        .collect::<PusResult<Vec<_>>>()?;

    let mut options = ReportOptions::new(event.severity)
        .with_parameters(included)
        .with_enabled(event.enabled);

    if let Some(trigger_config) = &event.trigger {
        let parameter = lookup(parameters, &trigger_config.parameter, event.id)?;
        let field_type = parameter.field_type();
        let guard_value = |value: &serde_json::Value| {
            json_to_value(field_type, value).map_err(|e| PusError::Config(format!("event {} trigger: {}", event.id, e)))
        };

        let mut trigger = Trigger::on_change(parameter.clone());
        if let Some(to) = &trigger_config.to {
            trigger = trigger.to_value(guard_value(to)?);
        }
        if let Some(from) = &trigger_config.from {
            trigger = trigger.from_value(guard_value(from)?);
        }
        options = options.with_trigger(trigger);
    }
    Ok(options)
}

/// Configuration constants
pub mod constants {
    use std::time::Duration;

    use puscommon::MAX_PACKET_SIZE;

    /// Default configuration file
    pub const DEFAULT_CONFIG_PATH: &str = "pusd.json";

    /// Receive buffer for one telecommand datagram
    pub const TC_BUFFER_SIZE: usize = MAX_PACKET_SIZE;

    /// Shortest processing interval accepted from configuration
    pub const PROCESS_INTERVAL_MIN: Duration = Duration::from_millis(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::TmCollector;
    use crate::service::PusIdent;
    use crate::verification::VerificationRecorder;
    use puscommon::{ParamValue, ReportId, Severity};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CONFIG_JSON: &str = r#"{
        "version": "1.0",
        "description": "Test config",
        "apid": 100,
        "policy": { "id_type": "u16", "count_type": "u8", "time": { "coarse_bytes": 4, "fine_bytes": 2 } },
        "tc_address": "127.0.0.1:0",
        "tm_address": "127.0.0.1:5601",
        "process_interval_ms": 50,
        "parameters": [
            { "name": "mode", "type": "u8", "value": 0 },
            { "name": "voltage", "type": "u16", "value": 3300 }
        ],
        "events": [
            { "id": 42, "severity": "high" },
            { "id": 43, "severity": "low", "enabled": false, "parameters": ["voltage"] },
            { "id": 44, "parameters": ["mode"], "trigger": { "parameter": "mode", "to": 2, "from": 1 } }
        ]
    }"#;

    fn write_config(json: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(json.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_load_config() {
        let temp_file = write_config(CONFIG_JSON);
        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.apid, 100);
        assert_eq!(config.process_interval_ms, 50);
        assert_eq!(config.events.len(), 3);
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(matches!(load_config("/nonexistent/pusd.json"), Err(PusError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_json() {
        let temp_file = write_config("{ not json");
        assert!(matches!(load_config(temp_file.path()), Err(PusError::Json(_))));
    }

    #[test]
    fn test_register_events() {
        let temp_file = write_config(CONFIG_JSON);
        let config = load_config(temp_file.path()).unwrap();
        let parameters = build_parameters(&config).unwrap();
        assert_eq!(parameters["voltage"].value(), ParamValue::U16(3300));

        let sink = Arc::new(TmCollector::new());
        let mut events = EventReporting::new(
            Arc::new(PusIdent::new(config.apid)),
            Arc::new(config.policy),
            Arc::new(VerificationRecorder::new()),
            sink.clone(),
        );
        register_events(&mut events, &config, &parameters).unwrap();

        assert_eq!(events.report(ReportId(42)).unwrap().severity(), Severity::High);
        assert_eq!(events.disabled_ids(), vec![ReportId(43)]);

        let mode = &parameters["mode"];
        mode.set(ParamValue::U8(2)).unwrap();
        assert!(sink.is_empty());
        mode.set(ParamValue::U8(1)).unwrap();
        mode.set(ParamValue::U8(2)).unwrap();
        let packets = sink.take();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].data, vec![0x00, 0x2c, 0x02]);
    }

    #[test]
    fn test_register_duplicate_event() {
        let mut config: PusdConfig = serde_json::from_str(CONFIG_JSON).unwrap();
        config.events[1].id = 42;
        let parameters = build_parameters(&config).unwrap();
        let mut events = EventReporting::new(
            Arc::new(PusIdent::new(config.apid)),
            Arc::new(config.policy),
            Arc::new(VerificationRecorder::new()),
            Arc::new(TmCollector::new()),
        );
        let result = register_events(&mut events, &config, &parameters);
        assert!(matches!(result, Err(PusError::DuplicateReport(ReportId(42)))));
    }
}
