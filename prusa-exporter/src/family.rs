//! Metric family value objects produced by the translator.

use prometheus_client::metrics::MetricType;
use prometheus_client::registry;

/// Kind of a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyType {
    Gauge,
    Info,
}

impl FamilyType {
    /// Get the TYPE comment string for the exposition format.
    pub fn as_str(&self) -> &'static str {
        match self {
            FamilyType::Gauge => "gauge",
            FamilyType::Info => "info",
        }
    }

    pub(crate) fn metric_type(&self) -> MetricType {
        match self {
            FamilyType::Gauge => MetricType::Gauge,
            FamilyType::Info => MetricType::Info,
        }
    }
}

/// Unit suffix of a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Celsius,
    Percent,
    Millimeters,
    Seconds,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Celsius => "celsius",
            Unit::Percent => "percent",
            Unit::Millimeters => "millimeters",
            Unit::Seconds => "seconds",
        }
    }
}

impl From<Unit> for registry::Unit {
    fn from(unit: Unit) -> Self {
        match unit {
            Unit::Celsius => registry::Unit::Celsius,
            Unit::Seconds => registry::Unit::Seconds,
            other => registry::Unit::Other(other.as_str().to_string()),
        }
    }
}

/// Static schema of a metric family: everything except its samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyDescriptor {
    pub name: &'static str,
    pub help: &'static str,
    pub family_type: FamilyType,
    pub unit: Option<Unit>,
    pub label_names: &'static [&'static str],
}

impl FamilyDescriptor {
    /// Create an empty family with this schema.
    pub fn family(&self) -> MetricFamily {
        MetricFamily {
            descriptor: *self,
            samples: Vec::new(),
        }
    }
}

/// Value carried by a single sample.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    /// A gauge reading. `None` means the reading was missing.
    Gauge(Option<f64>),
    /// Info record as key/value pairs, implicit value 1.
    Info(Vec<(String, String)>),
}

/// One sample of a family.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Label values, aligned with the descriptor's `label_names`.
    pub label_values: Vec<String>,
    pub value: SampleValue,
}

/// A metric family with its samples for one scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub descriptor: FamilyDescriptor,
    pub samples: Vec<Sample>,
}

impl MetricFamily {
    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// Add a gauge sample.
    ///
    /// Label values must line up with the descriptor's label names.
    pub fn with_gauge<I, S>(mut self, label_values: I, value: Option<f64>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let label_values: Vec<String> = label_values.into_iter().map(Into::into).collect();
        debug_assert_eq!(label_values.len(), self.descriptor.label_names.len());
        self.samples.push(Sample {
            label_values,
            value: SampleValue::Gauge(value),
        });
        self
    }

    /// Add an info record.
    pub fn with_info(mut self, record: Vec<(String, String)>) -> Self {
        self.samples.push(Sample {
            label_values: Vec::new(),
            value: SampleValue::Info(record),
        });
        self
    }

    /// Gauge value of the sample with the given label values.
    ///
    /// Returns `None` when no such sample exists, `Some(None)` when the sample
    /// exists but carries no reading.
    pub fn gauge(&self, label_values: &[&str]) -> Option<Option<f64>> {
        self.samples
            .iter()
            .find(|s| s.label_values.iter().map(String::as_str).eq(label_values.iter().copied()))
            .and_then(|s| match s.value {
                SampleValue::Gauge(v) => Some(v),
                SampleValue::Info(_) => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_FAMILY: FamilyDescriptor = FamilyDescriptor {
        name: "test",
        help: "Test family",
        family_type: FamilyType::Gauge,
        unit: Some(Unit::Percent),
        label_names: &["sensor"],
    };

    #[test]
    fn test_family_type_as_str() {
        assert_eq!(FamilyType::Gauge.as_str(), "gauge");
        assert_eq!(FamilyType::Info.as_str(), "info");
    }

    #[test]
    fn test_unit_conversion() {
        assert!(matches!(
            registry::Unit::from(Unit::Celsius),
            registry::Unit::Celsius
        ));
        assert!(matches!(
            registry::Unit::from(Unit::Seconds),
            registry::Unit::Seconds
        ));
        assert!(matches!(
            registry::Unit::from(Unit::Millimeters),
            registry::Unit::Other(ref s) if s == "millimeters"
        ));
        assert!(matches!(
            registry::Unit::from(Unit::Percent),
            registry::Unit::Other(ref s) if s == "percent"
        ));
    }

    #[test]
    fn test_gauge_lookup() {
        let family = TEST_FAMILY
            .family()
            .with_gauge(["a"], Some(1.5))
            .with_gauge(["b"], None);

        assert_eq!(family.name(), "test");
        assert_eq!(family.gauge(&["a"]), Some(Some(1.5)));
        assert_eq!(family.gauge(&["b"]), Some(None));
        assert_eq!(family.gauge(&["c"]), None);
    }
}
