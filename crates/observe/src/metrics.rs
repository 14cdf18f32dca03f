use {prometheus::Encoder, std::sync::OnceLock};

/// Global metrics registry used by all components.
static REGISTRY: OnceLock<prometheus_metric_storage::StorageRegistry> = OnceLock::new();

/// Configures the global metrics registry with a common name prefix.
///
/// Must happen before the first call to [`get_storage_registry`], ideally at
/// the very beginning of `main`.
///
/// # Panics
///
/// Panics if the registry is already initialized or the prefix is invalid.
pub fn setup_registry(prefix: Option<String>) {
    let registry = prometheus::Registry::new_custom(prefix, None).unwrap();
    let storage_registry = prometheus_metric_storage::StorageRegistry::new(registry);
    if REGISTRY.set(storage_registry).is_err() {
        panic!("metrics registry is already initialized");
    }
}

/// Get the global instance of the metrics registry.
pub fn get_registry() -> &'static prometheus::Registry {
    get_storage_registry().registry()
}

/// Get the global instance of the metric storage registry.
///
/// Falls back to an unprefixed registry when [`setup_registry`] was never
/// called, which is what unit tests get.
pub fn get_storage_registry() -> &'static prometheus_metric_storage::StorageRegistry {
    REGISTRY.get_or_init(prometheus_metric_storage::StorageRegistry::default)
}

/// Renders all metrics of `registry` in the prometheus text format.
pub fn encode(registry: &prometheus::Registry) -> String {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

#[cfg(test)]
mod tests {
    use {super::*, prometheus::IntCounter};

    #[derive(prometheus_metric_storage::MetricStorage)]
    struct Metrics {
        /// Counter used by tests.
        observe_test_counter: IntCounter,
    }

    #[test]
    fn encodes_registered_metrics() {
        let metrics = Metrics::instance(get_storage_registry()).unwrap();
        metrics.observe_test_counter.inc();
        assert!(encode(get_registry()).contains("observe_test_counter 1"));
    }
}
