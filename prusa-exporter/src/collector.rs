//! Translation of printer telemetry into Prometheus metric families.

use std::fmt::{self, Write};
use std::sync::Arc;

use parking_lot::RwLock;
use prometheus_client::collector::Collector;
use prometheus_client::encoding::{
    DescriptorEncoder, EncodeLabelValue, EncodeMetric, LabelValueEncoder,
};
use prometheus_client::metrics::gauge::ConstGauge;
use prometheus_client::metrics::info::Info;
use prometheus_client::registry::{self, Registry};
use tracing::debug;

use crate::client::{Scrape, TelemetryClient};
use crate::family::{FamilyDescriptor, FamilyType, MetricFamily, SampleValue, Unit};
use crate::mapping::{loaded_material, parse_print_duration, percent_to_ratio, progress_ratio};

const NO_LABELS: [&str; 0] = [];

pub const PRINTER_AVAILABLE: FamilyDescriptor = FamilyDescriptor {
    name: "printer_available",
    help: "Whether the printer is reachable on the network",
    family_type: FamilyType::Gauge,
    unit: None,
    label_names: &[],
};

pub const TEMPERATURE: FamilyDescriptor = FamilyDescriptor {
    name: "temperature",
    help: "Various temperatures of the printer",
    family_type: FamilyType::Gauge,
    unit: Some(Unit::Celsius),
    label_names: &["sensor"],
};

pub const PRINT_SPEED: FamilyDescriptor = FamilyDescriptor {
    name: "print_speed",
    help: "Print speed of the printer",
    family_type: FamilyType::Gauge,
    unit: Some(Unit::Percent),
    label_names: &[],
};

pub const FLOW_FACTOR: FamilyDescriptor = FamilyDescriptor {
    name: "flow_factor",
    help: "Flow factor",
    family_type: FamilyType::Gauge,
    unit: Some(Unit::Percent),
    label_names: &[],
};

pub const POSITION: FamilyDescriptor = FamilyDescriptor {
    name: "position",
    help: "Position of the axis",
    family_type: FamilyType::Gauge,
    unit: Some(Unit::Millimeters),
    label_names: &["axis"],
};

pub const MATERIAL: FamilyDescriptor = FamilyDescriptor {
    name: "material",
    help: "Info about the material loaded into the printer",
    family_type: FamilyType::Info,
    unit: None,
    label_names: &[],
};

pub const PRINT_JOB_ELAPSED_TIME: FamilyDescriptor = FamilyDescriptor {
    name: "print_job_elapsed_time",
    help: "Time elapsed since the start of the print",
    family_type: FamilyType::Gauge,
    unit: Some(Unit::Seconds),
    label_names: &["project"],
};

pub const PRINT_JOB_REMAINING_TIME: FamilyDescriptor = FamilyDescriptor {
    name: "print_job_remaining_time",
    help: "Time remaining of the print job",
    family_type: FamilyType::Gauge,
    unit: Some(Unit::Seconds),
    label_names: &["project"],
};

pub const PRINT_JOB_PROGRESS: FamilyDescriptor = FamilyDescriptor {
    name: "print_job_progress",
    help: "The progress of the print job",
    family_type: FamilyType::Gauge,
    unit: Some(Unit::Percent),
    label_names: &["project"],
};

/// Every family the exporter can produce, in emission order.
pub const CATALOG: [FamilyDescriptor; 9] = [
    PRINTER_AVAILABLE,
    TEMPERATURE,
    PRINT_SPEED,
    FLOW_FACTOR,
    POSITION,
    MATERIAL,
    PRINT_JOB_ELAPSED_TIME,
    PRINT_JOB_REMAINING_TIME,
    PRINT_JOB_PROGRESS,
];

/// The static metric catalog, without samples.
pub fn describe() -> Vec<FamilyDescriptor> {
    CATALOG.to_vec()
}

/// Translate one scrape into metric families.
///
/// Pure: the same scrape always yields the same families. Missing or
/// malformed fields only drop the affected sample.
pub fn translate(scrape: &Scrape) -> Vec<MetricFamily> {
    let telemetry = match scrape {
        Scrape::Available(telemetry) => telemetry,
        Scrape::Unavailable => {
            return vec![PRINTER_AVAILABLE.family().with_gauge(NO_LABELS, Some(0.0))];
        }
    };

    let mut families = Vec::with_capacity(CATALOG.len());

    families.push(PRINTER_AVAILABLE.family().with_gauge(NO_LABELS, Some(1.0)));

    families.push(
        TEMPERATURE
            .family()
            .with_gauge(["nozzle"], telemetry.temp_nozzle)
            .with_gauge(["bed"], telemetry.temp_bed),
    );

    families.push(single_gauge(
        PRINT_SPEED,
        telemetry.printing_speed.map(percent_to_ratio),
    ));
    families.push(single_gauge(
        FLOW_FACTOR,
        telemetry.flow_factor.map(percent_to_ratio),
    ));

    families.push(POSITION.family().with_gauge(["z"], telemetry.pos_z_mm));

    if let Some(material) = loaded_material(telemetry.material.as_deref()) {
        families.push(
            MATERIAL
                .family()
                .with_info(vec![("material".to_string(), material.to_string())]),
        );
    }

    let project = telemetry.active_project();
    families.push(job_gauge(
        PRINT_JOB_ELAPSED_TIME,
        project,
        telemetry
            .print_dur
            .as_deref()
            .map(|d| parse_print_duration(d) as f64),
    ));
    families.push(job_gauge(PRINT_JOB_REMAINING_TIME, project, telemetry.time_est));
    families.push(job_gauge(
        PRINT_JOB_PROGRESS,
        project,
        progress_ratio(telemetry.progress),
    ));

    families
}

/// An unlabeled gauge with one sample when the value is known.
fn single_gauge(descriptor: FamilyDescriptor, value: Option<f64>) -> MetricFamily {
    let family = descriptor.family();
    match value {
        Some(v) => family.with_gauge(NO_LABELS, Some(v)),
        None => family,
    }
}

/// A `project`-labeled gauge, sampled only while a job is active.
fn job_gauge(
    descriptor: FamilyDescriptor,
    project: Option<&str>,
    value: Option<f64>,
) -> MetricFamily {
    let family = descriptor.family();
    match project {
        Some(project) => family.with_gauge([project], value),
        None => family,
    }
}

/// Families of one scrape, replayed into a registry for encoding.
#[derive(Debug)]
struct ScrapedFamilies(Vec<MetricFamily>);

impl Collector for ScrapedFamilies {
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), fmt::Error> {
        for family in &self.0 {
            encode_family(family, &mut encoder)?;
        }
        Ok(())
    }
}

/// Label value escaped for the text exposition format.
///
/// Project and material names come straight from the printer and may hold
/// quotes, backslashes or line breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EscapedLabelValue<'a>(&'a str);

impl EncodeLabelValue for EscapedLabelValue<'_> {
    fn encode(&self, encoder: &mut LabelValueEncoder) -> Result<(), fmt::Error> {
        for c in self.0.chars() {
            match c {
                '\\' => encoder.write_str("\\\\")?,
                '"' => encoder.write_str("\\\"")?,
                '\n' => encoder.write_str("\\n")?,
                c => encoder.write_char(c)?,
            }
        }
        Ok(())
    }
}

fn encode_family(family: &MetricFamily, encoder: &mut DescriptorEncoder) -> fmt::Result {
    let descriptor = &family.descriptor;
    let unit = descriptor.unit.map(registry::Unit::from);

    let mut metric_encoder = encoder.encode_descriptor(
        descriptor.name,
        descriptor.help,
        unit.as_ref(),
        descriptor.family_type.metric_type(),
    )?;

    for sample in &family.samples {
        match &sample.value {
            SampleValue::Gauge(value) => {
                // A missing reading keeps its series and reports NaN.
                let gauge = ConstGauge::new(value.unwrap_or(f64::NAN));
                if sample.label_values.is_empty() {
                    // Unlabeled families hold a single sample.
                    return gauge.encode(metric_encoder);
                }
                let labels: Vec<(&str, EscapedLabelValue)> = descriptor
                    .label_names
                    .iter()
                    .copied()
                    .zip(sample.label_values.iter().map(|v| EscapedLabelValue(v)))
                    .collect();
                gauge.encode(metric_encoder.encode_family(&labels)?)?;
            }
            SampleValue::Info(record) => {
                let labels: Vec<(&str, EscapedLabelValue)> = record
                    .iter()
                    .map(|(key, value)| (key.as_str(), EscapedLabelValue(value)))
                    .collect();
                // An info family is a single record.
                return Info::new(labels).encode(metric_encoder);
            }
        }
    }

    Ok(())
}

/// Encode families in the OpenMetrics text format.
///
/// `prefix` is prepended to every family name; an empty prefix means none.
pub fn encode_families(prefix: &str, families: &[MetricFamily]) -> Result<String, fmt::Error> {
    let mut registry = if prefix.is_empty() {
        Registry::default()
    } else {
        Registry::with_prefix(prefix)
    };
    registry.register_collector(Box::new(ScrapedFamilies(families.to_vec())));

    let mut output = String::new();
    prometheus_client::encoding::text::encode(&mut output, &registry)?;
    Ok(output)
}

/// Scrape statistics.
#[derive(Debug, Clone, Default)]
pub struct ScrapeStats {
    /// Total scrapes served.
    pub scrapes: u64,
    /// Scrapes where the printer could not be reached.
    pub printer_unavailable: u64,
}

/// Polls the printer and translates the result on every scrape.
pub struct PrinterCollector {
    client: TelemetryClient,
    prefix: String,
    stats: RwLock<ScrapeStats>,
}

impl PrinterCollector {
    /// Create a new collector.
    pub fn new(client: TelemetryClient, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            stats: RwLock::new(ScrapeStats::default()),
        }
    }

    /// Poll the printer once and translate the reading.
    pub async fn collect(&self) -> Vec<MetricFamily> {
        let scrape = self.client.fetch().await;

        {
            let mut stats = self.stats.write();
            stats.scrapes += 1;
            if !scrape.is_available() {
                stats.printer_unavailable += 1;
            }
        }

        let families = translate(&scrape);
        debug!(
            available = scrape.is_available(),
            families = families.len(),
            "Translated telemetry"
        );
        families
    }

    /// Poll the printer and render the result in the exposition format.
    pub async fn render(&self) -> Result<String, fmt::Error> {
        let families = self.collect().await;
        encode_families(&self.prefix, &families)
    }

    /// The telemetry URL polled on each scrape.
    pub fn printer_url(&self) -> &str {
        self.client.url()
    }

    /// Get scrape statistics.
    pub fn stats(&self) -> ScrapeStats {
        self.stats.read().clone()
    }
}

/// Create a shareable collector handle.
pub type SharedCollector = Arc<PrinterCollector>;
