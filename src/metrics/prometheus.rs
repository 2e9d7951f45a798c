//! Prometheus metrics registration and export.
//!
//! Defines the metrics recorded during an evaluation run and provides
//! functions for initializing the registry and exporting it as text.

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Registry and metric handles, created together so every handle is
/// registered in the registry that gets exported.
pub struct Metrics {
    /// Registry holding every fix-forge metric.
    pub registry: Registry,
    /// Tasks evaluated, labeled by outcome (`passed` / `exhausted`).
    pub tasks_total: CounterVec,
    /// Repair steps judged, labeled by verdict.
    pub steps_total: CounterVec,
    /// Sandbox runs, labeled by verdict.
    pub sandbox_runs_total: CounterVec,
    /// Sandbox wall-clock duration in seconds, labeled by verdict.
    pub sandbox_duration: HistogramVec,
    /// Total model requests, labeled by model and status.
    pub llm_requests_total: CounterVec,
    /// Model request latency in seconds, labeled by model.
    pub llm_latency: HistogramVec,
}

impl Metrics {
    /// Creates a fresh registry with every metric registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let tasks_total = CounterVec::new(
            Opts::new("fix_forge_tasks_total", "Total number of tasks evaluated"),
            &["outcome"],
        )?;

        let steps_total = CounterVec::new(
            Opts::new("fix_forge_repair_steps_total", "Total repair steps judged"),
            &["verdict"],
        )?;

        let sandbox_runs_total = CounterVec::new(
            Opts::new("fix_forge_sandbox_runs_total", "Total sandbox executions"),
            &["verdict"],
        )?;

        let sandbox_duration = HistogramVec::new(
            HistogramOpts::new(
                "fix_forge_sandbox_duration_seconds",
                "Sandbox execution wall-clock time in seconds",
            )
            .buckets(vec![0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
            &["verdict"],
        )?;

        let llm_requests_total = CounterVec::new(
            Opts::new("fix_forge_llm_requests_total", "Total model requests"),
            &["model", "status"],
        )?;

        let llm_latency = HistogramVec::new(
            HistogramOpts::new(
                "fix_forge_llm_latency_seconds",
                "Model request latency in seconds",
            )
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
            &["model"],
        )?;

        registry.register(Box::new(tasks_total.clone()))?;
        registry.register(Box::new(steps_total.clone()))?;
        registry.register(Box::new(sandbox_runs_total.clone()))?;
        registry.register(Box::new(sandbox_duration.clone()))?;
        registry.register(Box::new(llm_requests_total.clone()))?;
        registry.register(Box::new(llm_latency.clone()))?;

        Ok(Self {
            registry,
            tasks_total,
            steps_total,
            sandbox_runs_total,
            sandbox_duration,
            llm_requests_total,
            llm_latency,
        })
    }
}

/// Global metrics for the process, set by [`init_metrics`].
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Returns the global metrics, if initialized.
pub fn get_metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

/// Initialize all metrics and register them with the registry.
///
/// Call once at startup. Calling it again is harmless: the first
/// initialization stays in place.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails.
///
/// # Example
///
/// ```ignore
/// use fix_forge::metrics::init_metrics;
///
/// init_metrics().expect("Failed to initialize metrics");
/// ```
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if METRICS.get().is_some() {
        return Ok(());
    }

    // A concurrent caller may win the race; its set is complete too.
    let _ = METRICS.set(Metrics::new()?);

    tracing::debug!("Prometheus metrics initialized");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// Returns a comment line instead of metrics when the registry has not
/// been initialized or encoding fails.
pub fn export_metrics() -> String {
    let Some(metrics) = METRICS.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = metrics.registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}
