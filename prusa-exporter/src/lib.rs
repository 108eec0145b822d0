//! Prometheus metrics exporter for Prusa printer telemetry.
//!
//! This crate polls a printer's local `/api/telemetry` endpoint on every
//! scrape and exposes the readings via an HTTP `/metrics` endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │     Printer     │<────│    Collector    │<────│   HTTP Server   │
//! │ (/api/telemetry)│────>│  (translation)  │────>│   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! Nothing is cached between scrapes: each request to `/metrics` fetches a
//! fresh snapshot, translates it with [`collector::translate`] and encodes
//! the resulting families.
//!
//! # Metrics
//!
//! With the default `prusa` prefix:
//!
//! * `prusa_printer_available` - 1 if the printer answered, 0 otherwise.
//! * `prusa_temperature_celsius{sensor="nozzle"|"bed"}`
//! * `prusa_print_speed_percent`, `prusa_flow_factor_percent` (ratios, 1.0 = 100%)
//! * `prusa_position_millimeters{axis="z"}`
//! * `prusa_material_info{material=...}` - only while filament is loaded.
//! * `prusa_print_job_elapsed_time_seconds{project=...}`
//! * `prusa_print_job_remaining_time_seconds{project=...}`
//! * `prusa_print_job_progress_percent{project=...}`
//!
//! # Usage
//!
//! ```bash
//! PRINTER_HOSTNAME=prusa-mini.local prusa-exporter
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod client;
pub mod collector;
pub mod config;
pub mod family;
pub mod http;
pub mod mapping;
pub mod telemetry;

pub use client::{Scrape, TelemetryClient};
pub use collector::{PrinterCollector, SharedCollector, describe, translate};
pub use config::ExporterConfig;
pub use family::{FamilyDescriptor, MetricFamily};
pub use http::HttpServer;
pub use telemetry::Telemetry;
