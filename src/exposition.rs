//! Prometheus text exposition of a collection cycle.
//!
//! Samples are validated the way a pedantic registry does it: every
//! measurement must belong to a described descriptor, label sets must be
//! unique within a family, and an invalid marker fails the whole scrape.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use prometheus::proto::{Counter, Gauge, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, IntGaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

use crate::collector::Orchestrator;
use crate::metric::{Descriptor, Measurement, MetricKind, Sample};

/// Name of the exporter's own build info gauge.
pub const BUILD_INFO_METRIC: &str = "paperless_exporter_build_info";

/// Errors that turn a scrape into an HTTP error.
#[derive(Debug, Error)]
pub enum ExpositionError {
    /// The collection cycle failed or timed out.
    #[error("collected metric {name} was invalid: {error}")]
    CollectionFailed { name: String, error: String },

    /// A measurement referenced a descriptor missing from `describe`.
    #[error("collected metric {0} was not described")]
    Undescribed(String),

    /// Two measurements of one family had identical label values.
    #[error("collected metric {name} {labels} was collected before with the same name and label values")]
    DuplicateSeries { name: String, labels: String },

    /// Two sources declared descriptors with the same name.
    #[error("descriptor {0} was described more than once")]
    DuplicateDescriptor(String),

    /// Encoding the text format failed.
    #[error(transparent)]
    Encode(#[from] prometheus::Error),

    /// The encoder produced invalid UTF-8.
    #[error("exposition is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Registry with metrics about the exporter process itself.
///
/// # Errors
/// Returns an error if a collector cannot be registered.
pub fn exporter_registry() -> Result<Registry, prometheus::Error> {
    let registry = Registry::new();

    let build_info = IntGaugeVec::new(
        Opts::new(
            BUILD_INFO_METRIC,
            "A metric with a constant '1' value labeled by the exporter version.",
        ),
        &["version"],
    )?;
    build_info
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1);
    registry.register(Box::new(build_info))?;

    #[cfg(target_os = "linux")]
    registry.register(Box::new(prometheus::process_collector::ProcessCollector::for_self()))?;

    Ok(registry)
}

/// Runs collection cycles and renders them for scrapers.
pub struct Exporter {
    orchestrator: Orchestrator,
    described: HashMap<String, Arc<Descriptor>>,
    registry: Option<Registry>,
}

impl Exporter {
    /// Wrap `orchestrator`, checking its descriptors once up front.
    ///
    /// # Errors
    /// Returns `DuplicateDescriptor` if two descriptors share a name.
    pub fn new(orchestrator: Orchestrator) -> Result<Self, ExpositionError> {
        let mut described = HashMap::new();
        for desc in orchestrator.describe() {
            let name = desc.name().to_string();
            if described.insert(name.clone(), desc).is_some() {
                return Err(ExpositionError::DuplicateDescriptor(name));
            }
        }

        Ok(Self {
            orchestrator,
            described,
            registry: None,
        })
    }

    /// Append the families of `registry` to every scrape.
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Content type of [`Exporter::scrape`] output.
    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }

    /// Run one collection cycle and encode it.
    ///
    /// # Errors
    /// Fails when the cycle produced an invalid marker or inconsistent
    /// measurements.
    pub async fn scrape(&self) -> Result<String, ExpositionError> {
        let samples = self.orchestrator.collect().await;

        let mut families = build_families(samples, &self.described)?;
        if let Some(registry) = &self.registry {
            families.extend(registry.gather());
            families.sort_by(|a, b| a.get_name().cmp(b.get_name()));
        }

        encode(&families)
    }
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("orchestrator", &self.orchestrator)
            .field("described", &self.described.len())
            .field("exporter_metrics", &self.registry.is_some())
            .finish_non_exhaustive()
    }
}

/// Group samples into metric families sorted by name, with metrics sorted by
/// label values and labels sorted by name.
///
/// # Errors
/// See [`ExpositionError`].
pub fn build_families(
    samples: Vec<Sample>,
    described: &HashMap<String, Arc<Descriptor>>,
) -> Result<Vec<MetricFamily>, ExpositionError> {
    let mut grouped: BTreeMap<String, (Arc<Descriptor>, Vec<Measurement>)> = BTreeMap::new();

    for sample in samples {
        let m = match sample {
            Sample::Measurement(m) => m,
            Sample::Invalid(invalid) => {
                return Err(ExpositionError::CollectionFailed {
                    name: invalid.desc.name().to_string(),
                    error: invalid.error,
                });
            }
        };

        let name = m.desc().name();
        match described.get(name) {
            Some(desc) if desc == m.desc() => {}
            _ => return Err(ExpositionError::Undescribed(m.desc().to_string())),
        }

        grouped
            .entry(name.to_string())
            .or_insert_with(|| (Arc::clone(m.desc()), Vec::new()))
            .1
            .push(m);
    }

    grouped
        .into_values()
        .map(|(desc, measurements)| build_family(&desc, measurements))
        .collect()
}

fn build_family(
    desc: &Descriptor,
    mut measurements: Vec<Measurement>,
) -> Result<MetricFamily, ExpositionError> {
    let mut label_order: Vec<usize> = (0..desc.label_names().len()).collect();
    label_order.sort_by(|a, b| desc.label_names()[*a].cmp(&desc.label_names()[*b]));

    let sort_key = |m: &Measurement| -> Vec<String> {
        label_order
            .iter()
            .map(|i| m.label_values()[*i].clone())
            .collect()
    };
    measurements.sort_by_cached_key(sort_key);

    let mut family = MetricFamily::default();
    family.set_name(desc.name().to_string());
    family.set_help(desc.help().to_string());
    family.set_field_type(match desc.kind() {
        MetricKind::Gauge => MetricType::GAUGE,
        MetricKind::Counter => MetricType::COUNTER,
    });

    let mut seen = HashSet::new();
    for m in &measurements {
        if !seen.insert(m.label_values().to_vec()) {
            let labels: Vec<_> = m.labels().map(|(k, v)| format!("{k}={v:?}")).collect();
            return Err(ExpositionError::DuplicateSeries {
                name: desc.name().to_string(),
                labels: format!("{{{}}}", labels.join(",")),
            });
        }

        let mut metric = Metric::default();
        for i in &label_order {
            let mut pair = LabelPair::default();
            pair.set_name(desc.label_names()[*i].clone());
            pair.set_value(m.label_values()[*i].clone());
            metric.mut_label().push(pair);
        }

        match desc.kind() {
            MetricKind::Gauge => {
                let mut gauge = Gauge::default();
                gauge.set_value(m.value());
                metric.set_gauge(gauge);
            }
            MetricKind::Counter => {
                let mut counter = Counter::default();
                counter.set_value(m.value());
                metric.set_counter(counter);
            }
        }

        family.mut_metric().push(metric);
    }

    Ok(family)
}

/// Encode families in the Prometheus text format.
///
/// # Errors
/// Returns an error if encoding fails.
pub fn encode(families: &[MetricFamily]) -> Result<String, ExpositionError> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
