//! Metric data model.
//!
//! Every source declares its [`Descriptor`]s once at construction time and
//! emits [`Measurement`]s that reference them. The orchestrator output stream
//! is a sequence of [`Sample`]s: real measurements plus, when a collection
//! cycle failed, a single [`InvalidMeasurement`] marker.

use std::fmt;
use std::sync::Arc;

use strum_macros::{AsRefStr, Display};

/// Prometheus metric type of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum MetricKind {
    /// Value that can go up and down.
    Gauge,
    /// Monotonically increasing value.
    Counter,
}

/// Static declaration of a metric: name, help text and label names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
    name: String,
    help: String,
    label_names: Vec<String>,
    kind: MetricKind,
}

impl Descriptor {
    /// Create a new shared descriptor.
    pub fn new(
        kind: MetricKind,
        name: impl Into<String>,
        help: impl Into<String>,
        label_names: &[&str],
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            help: help.into(),
            label_names: label_names.iter().map(|l| (*l).to_string()).collect(),
            kind,
        })
    }

    /// Create a gauge descriptor.
    pub fn gauge(name: impl Into<String>, help: impl Into<String>, labels: &[&str]) -> Arc<Self> {
        Self::new(MetricKind::Gauge, name, help, labels)
    }

    /// Create a counter descriptor.
    pub fn counter(
        name: impl Into<String>,
        help: impl Into<String>,
        labels: &[&str],
    ) -> Arc<Self> {
        Self::new(MetricKind::Counter, name, help, labels)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{{}}}", self.name, self.label_names.join(","))
    }
}

/// A single labelled observation of a [`Descriptor`].
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    desc: Arc<Descriptor>,
    value: f64,
    label_values: Vec<String>,
}

impl Measurement {
    /// Create a measurement.
    ///
    /// # Panics
    /// Panics if the number of label values differs from the descriptor's
    /// label names. That is a bug in the emitting source, not an operational
    /// condition.
    pub fn new(desc: &Arc<Descriptor>, value: f64, label_values: &[&str]) -> Self {
        assert_eq!(
            desc.label_names.len(),
            label_values.len(),
            "label cardinality mismatch for {desc}"
        );

        Self {
            desc: Arc::clone(desc),
            value,
            label_values: label_values.iter().map(|v| (*v).to_string()).collect(),
        }
    }

    pub fn desc(&self) -> &Arc<Descriptor> {
        &self.desc
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Label `(name, value)` pairs in descriptor order.
    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.desc
            .label_names
            .iter()
            .map(String::as_str)
            .zip(self.label_values.iter().map(String::as_str))
    }

    /// Look up a label value by name.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels().find(|(n, _)| *n == name).map(|(_, v)| v)
    }
}

/// Marker standing in for a whole failed collection cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidMeasurement {
    pub desc: Arc<Descriptor>,
    pub error: String,
}

/// Element of the orchestrator output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Measurement(Measurement),
    Invalid(InvalidMeasurement),
}

impl Sample {
    pub fn as_measurement(&self) -> Option<&Measurement> {
        match self {
            Self::Measurement(m) => Some(m),
            Self::Invalid(_) => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }
}

impl From<Measurement> for Sample {
    fn from(m: Measurement) -> Self {
        Self::Measurement(m)
    }
}

/// Convert an optional timestamp into fractional seconds since the epoch.
///
/// Absent timestamps are reported as 0.
pub fn optional_timestamp(ts: Option<&chrono::DateTime<chrono::Utc>>) -> f64 {
    match ts {
        Some(t) if t.timestamp_millis() != 0 => t.timestamp_millis() as f64 / 1000.0,
        _ => 0.0,
    }
}
