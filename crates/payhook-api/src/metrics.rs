//! Prometheus-backed metrics sink.
//!
//! Counters live in a registry owned by the sink rather than the process
//! global one, so several services (and tests) can run side by side.

use payhook_core::{Counter, MetricsError, MetricsSink};
use prometheus::{IntCounter, Registry, TextEncoder};
use std::collections::HashMap;

/// [`MetricsSink`] that exports every [`Counter`] as a Prometheus counter
#[derive(Debug, Clone)]
pub struct PrometheusMetricsSink {
    registry: Registry,
    counters: HashMap<Counter, IntCounter>,
}

impl PrometheusMetricsSink {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let mut counters = HashMap::with_capacity(Counter::ALL.len());

        for counter in Counter::ALL {
            let metric = IntCounter::new(counter.name(), counter.help())?;
            registry.register(Box::new(metric.clone()))?;
            counters.insert(counter, metric);
        }

        Ok(Self { registry, counters })
    }

    /// Current value of a counter
    pub fn get(&self, counter: Counter) -> u64 {
        self.counters.get(&counter).map(IntCounter::get).unwrap_or(0)
    }

    /// Render the registry in the Prometheus text exposition format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

impl MetricsSink for PrometheusMetricsSink {
    fn increment(&self, counter: Counter) -> Result<(), MetricsError> {
        let metric = self
            .counters
            .get(&counter)
            .ok_or_else(|| MetricsError::Unavailable {
                message: format!("counter '{}' is not registered", counter.name()),
            })?;
        metric.inc();
        Ok(())
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
