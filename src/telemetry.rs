use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectionOutcome {
    Displayed,
    LoadFailed,
    NoUpload,
}

impl DetectionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionOutcome::Displayed => "displayed",
            DetectionOutcome::LoadFailed => "load_failed",
            DetectionOutcome::NoUpload => "no_upload",
        }
    }
}

pub struct Metrics {
    upload_counter: Counter<u64>,
    detection_counter: Counter<u64>,
    detection_duration: Histogram<u64>,
    _provider: SdkMeterProvider,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()
            .map_err(|e| prometheus::Error::Msg(e.to_string()))?;

        let provider = SdkMeterProvider::builder().with_reader(exporter).build();

        let meter = provider.meter("traffic_signs");
        global::set_meter_provider(provider.clone());

        let upload_counter = meter
            .u64_counter("uploads_total")
            .with_description("Total number of persisted uploads")
            .build();

        let detection_counter = meter
            .u64_counter("detections_total")
            .with_description("Detection triggers by outcome")
            .build();

        // Inference on CPU takes seconds, the first run also loads the model.
        let boundaries = generate_boundaries((250, 1000, 5000, 20000, 60000));

        let detection_duration = meter
            .u64_histogram("detection_duration_ms")
            .with_boundaries(boundaries)
            .with_description("Wall time of the external detection process in milliseconds")
            .build();

        Ok(Metrics {
            upload_counter,
            detection_counter,
            detection_duration,
            _provider: provider,
            registry,
        })
    }

    pub fn record_upload(&self) {
        self.upload_counter.add(1, &[]);
    }

    pub fn record_detection(&self, outcome: DetectionOutcome) {
        let attributes = vec![KeyValue::new("outcome", outcome.as_str())];
        self.detection_counter.add(1, &attributes);
    }

    pub fn record_detection_duration(&self, duration_ms: u64) {
        self.detection_duration.record(duration_ms, &[]);
    }
}

fn generate_boundaries(parts: (i32, i32, i32, i32, i32)) -> Vec<f64> {
    let first_step: usize = 250;
    let middle_step: usize = 1000;
    let end_step: usize = 5000;
    let tail_step: usize = 20000;
    let first_part = (parts.0..=parts.1).step_by(first_step);
    let middle_part = (parts.1..=parts.2).step_by(middle_step);
    let end_part = (parts.2..=parts.3).step_by(end_step);
    let tail_part = (parts.3..=parts.4).step_by(tail_step);

    let mut seen = HashSet::new();
    first_part
        .chain(middle_part)
        .chain(end_part)
        .chain(tail_part)
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}
