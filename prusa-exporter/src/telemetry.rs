//! Telemetry snapshot returned by the printer's `/api/telemetry` endpoint.
//!
//! Every field is optional. The printer omits most job fields while idle, and
//! some firmware versions send numbers as strings (`"time_est": "13380"`), so
//! fields are decoded leniently: anything that cannot be interpreted becomes
//! `None` instead of failing the whole snapshot.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One telemetry reading from the printer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Telemetry {
    /// Nozzle temperature in °C.
    #[serde(default, deserialize_with = "lenient_number")]
    pub temp_nozzle: Option<f64>,

    /// Bed temperature in °C.
    #[serde(default, deserialize_with = "lenient_number")]
    pub temp_bed: Option<f64>,

    /// Loaded filament. `""` and `"---"` mean nothing is loaded.
    #[serde(default, deserialize_with = "lenient_string")]
    pub material: Option<String>,

    /// Z axis position in millimeters.
    #[serde(default, deserialize_with = "lenient_number")]
    pub pos_z_mm: Option<f64>,

    /// Print speed multiplier (0-100).
    #[serde(default, deserialize_with = "lenient_number")]
    pub printing_speed: Option<f64>,

    /// Flow multiplier (0-100).
    #[serde(default, deserialize_with = "lenient_number")]
    pub flow_factor: Option<f64>,

    /// Job completion (0-100).
    #[serde(default, deserialize_with = "lenient_number")]
    pub progress: Option<f64>,

    /// Elapsed print time, e.g. `"  1d  0h 54m"`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub print_dur: Option<String>,

    /// Estimated remaining time in seconds.
    #[serde(default, deserialize_with = "lenient_number")]
    pub time_est: Option<f64>,

    /// File name of the job being printed.
    #[serde(default, deserialize_with = "lenient_string")]
    pub project_name: Option<String>,
}

impl Telemetry {
    /// Parse a snapshot from a JSON document.
    ///
    /// Fails only when the document is not a JSON object.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        // Go through a map so arrays are not accepted as positional structs.
        let object: serde_json::Map<String, Value> = serde_json::from_str(body)?;
        serde_json::from_value(Value::Object(object))
    }

    /// The active job, if any. An empty name counts as no job.
    pub fn active_project(&self) -> Option<&str> {
        self.project_name.as_deref().filter(|name| !name.is_empty())
    }
}

/// Accept JSON numbers and numeric strings; anything else is absent.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_from_value))
}

/// Accept JSON strings only; anything else is absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}
