//! Configuration file structures for the onboard process

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::error::{PusError, PusResult};
use crate::field::{FieldType, ParamValue};
use crate::policy::PusPolicy;
use crate::types::Severity;

/// Largest 11-bit application process identifier
pub const APID_MAX: u16 = 0x07ff;

/// Process configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PusdConfig {
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub apid: u16,
    #[serde(default)]
    pub policy: PusPolicy,
    pub tc_address: String,
    pub tm_address: String,
    #[serde(default = "default_process_interval_ms")]
    pub process_interval_ms: u64,
    #[serde(default)]
    pub parameters: Vec<ParameterConfigJson>,
    #[serde(default)]
    pub events: Vec<EventConfigJson>,
}

fn default_process_interval_ms() -> u64 {
    100
}

fn default_enabled() -> bool {
    true
}

/// JSON representation of an observable parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterConfigJson {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: FieldType,
    pub value: Value,
}

impl ParameterConfigJson {
    pub fn initial_value(&self) -> Result<ParamValue, String> {
        json_to_value(self.param_type, &self.value)
            .map_err(|e| format!("parameter {}: {}", self.name, e))
    }
}

/// JSON representation of an event report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfigJson {
    pub id: u64,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Names of the parameters included in the report, in order
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub trigger: Option<TriggerConfigJson>,
}

/// JSON representation of a report trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfigJson {
    pub parameter: String,
    #[serde(default)]
    pub to: Option<Value>,
    #[serde(default)]
    pub from: Option<Value>,
}

impl PusdConfig {
    /// Check everything that can be checked without building services
    pub fn validate(&self) -> PusResult<()> {
        if self.apid > APID_MAX {
            return Err(PusError::Config(format!("APID {} exceeds {}", self.apid, APID_MAX)));
        }
        self.policy.validate()?;

        let mut names = BTreeSet::new();
        for param in &self.parameters {
            if !names.insert(param.name.as_str()) {
                return Err(PusError::Config(format!("duplicate parameter {}", param.name)));
            }
            param.initial_value().map_err(PusError::Config)?;
        }

        for event in &self.events {
            for name in &event.parameters {
                if !names.contains(name.as_str()) {
                    return Err(PusError::Config(format!("event {}: unknown parameter {}", event.id, name)));
                }
            }
            if let Some(trigger) = &event.trigger {
                if self.parameter(&trigger.parameter).is_none() {
                    return Err(PusError::Config(format!(
                        "event {}: unknown trigger parameter {}",
                        event.id, trigger.parameter
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterConfigJson> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Convert a JSON scalar into a value of the given field type
pub fn json_to_value(field_type: FieldType, value: &Value) -> Result<ParamValue, String> {
    let mismatch = || format!("{} is not a valid {}", value, field_type);
    let parsed = match field_type {
        FieldType::Bool => ParamValue::Bool(value.as_bool().ok_or_else(mismatch)?),
        FieldType::U8 | FieldType::U16 | FieldType::U32 | FieldType::U64 => {
            let raw = value.as_u64().ok_or_else(mismatch)?;
            field_type.unsigned_value(raw).map_err(|_| mismatch())?
        }
        FieldType::I8 | FieldType::I16 | FieldType::I32 | FieldType::I64 => {
            let raw = value.as_i64().ok_or_else(mismatch)?;
            match field_type {
                FieldType::I8 => ParamValue::I8(i8::try_from(raw).map_err(|_| mismatch())?),
                FieldType::I16 => ParamValue::I16(i16::try_from(raw).map_err(|_| mismatch())?),
                FieldType::I32 => ParamValue::I32(i32::try_from(raw).map_err(|_| mismatch())?),
                _ => ParamValue::I64(raw),
            }
        }
        FieldType::F32 => ParamValue::F32(value.as_f64().ok_or_else(mismatch)? as f32),
        FieldType::F64 => ParamValue::F64(value.as_f64().ok_or_else(mismatch)?),
    };
    Ok(parsed)
}
