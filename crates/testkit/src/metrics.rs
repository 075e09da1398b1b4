//! Metrics reports for headless particle runs.
//!
//! Reports are exported as JSON so CI can diff particle counts and buffer
//! sizes between runs.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Top-level metrics report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Run identifier
    pub test_name: String,

    /// Timestamp when metrics were collected (ISO 8601)
    pub timestamp: String,

    /// Git commit hash (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,

    /// Overall result
    pub result: TestResult,

    /// Simulation counters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub particles: Option<ParticleMetrics>,

    /// Vertex submission metrics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendering: Option<RenderMetrics>,

    /// Execution metrics
    pub test_execution: TestExecutionMetrics,
}

/// Overall result status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestResult {
    /// Run passed all validations
    Pass,
    /// Run failed
    Fail,
    /// Run was skipped
    Skip,
}

/// Particle simulation counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParticleMetrics {
    /// Ticks simulated
    pub ticks: u64,

    /// Particles spawned over the run
    pub total_spawned: usize,

    /// Particles expired over the run
    pub total_expired: usize,

    /// Highest live count seen after any tick
    pub peak_live: usize,

    /// Live particles at the end of the run
    pub final_live: usize,

    /// Pool capacity
    pub capacity: usize,

    /// Ticks where the pool was full after emission
    pub saturated_ticks: u64,
}

/// Vertex submission metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderMetrics {
    /// Render mode name
    pub render_mode: String,

    /// Vertex stride in f32 slots
    pub stride_slots: usize,

    /// Vertices submitted on the final tick
    pub vertices: usize,

    /// Indices submitted on the final tick
    pub indices: usize,

    /// Bytes of live vertex data on the final tick
    pub vertex_bytes: usize,

    /// Shader recompiles requested over the run
    pub shader_recompiles: u32,
}

/// Execution metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestExecutionMetrics {
    /// Wall-clock duration (seconds)
    pub duration_seconds: f64,

    /// Average tick time (microseconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_tick_time_us: Option<f64>,
}

/// Builder for constructing metrics reports
pub struct MetricsReportBuilder {
    report: MetricsReport,
}

impl MetricsReportBuilder {
    /// Create a new builder with run name
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            report: MetricsReport {
                test_name: test_name.into(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                commit_hash: None,
                result: TestResult::Pass,
                particles: None,
                rendering: None,
                test_execution: TestExecutionMetrics {
                    duration_seconds: 0.0,
                    avg_tick_time_us: None,
                },
            },
        }
    }

    /// Set result
    pub fn result(mut self, result: TestResult) -> Self {
        self.report.result = result;
        self
    }

    /// Set commit hash
    pub fn commit_hash(mut self, hash: impl Into<String>) -> Self {
        self.report.commit_hash = Some(hash.into());
        self
    }

    /// Set particle counters
    pub fn particles(mut self, metrics: ParticleMetrics) -> Self {
        self.report.particles = Some(metrics);
        self
    }

    /// Set render metrics
    pub fn rendering(mut self, metrics: RenderMetrics) -> Self {
        self.report.rendering = Some(metrics);
        self
    }

    /// Set execution metrics
    pub fn execution(mut self, metrics: TestExecutionMetrics) -> Self {
        self.report.test_execution = metrics;
        self
    }

    /// Build the metrics report
    pub fn build(self) -> MetricsReport {
        self.report
    }
}

/// Sink for writing metrics reports to JSON files
pub struct MetricsSink {
    path: std::path::PathBuf,
}

impl MetricsSink {
    /// Create a new metrics sink at the specified path
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(Self { path })
    }

    /// Write metrics report to file
    pub fn write(&self, report: &MetricsReport) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        let mut file = File::create(&self.path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn metrics_report_roundtrip() {
        let report = MetricsReportBuilder::new("fountain")
            .result(TestResult::Pass)
            .particles(ParticleMetrics {
                ticks: 120,
                total_spawned: 200,
                total_expired: 150,
                peak_live: 60,
                final_live: 50,
                capacity: 64,
                saturated_ticks: 0,
            })
            .execution(TestExecutionMetrics {
                duration_seconds: 0.25,
                avg_tick_time_us: Some(40.0),
            })
            .build();

        let json = serde_json::to_string_pretty(&report).unwrap();
        let parsed: MetricsReport = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.test_name, "fountain");
        assert_eq!(parsed.result, TestResult::Pass);
        assert_eq!(parsed.particles.as_ref().unwrap().total_spawned, 200);
        assert!(parsed.rendering.is_none());
    }

    #[test]
    fn metrics_sink_writes_file() {
        let path = std::env::temp_dir().join(format!(
            "ember-metrics-{}.json",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));

        let report = MetricsReportBuilder::new("sink_test")
            .rendering(RenderMetrics {
                render_mode: "billboard".into(),
                stride_slots: 21,
                vertices: 8,
                indices: 12,
                vertex_bytes: 672,
                shader_recompiles: 1,
            })
            .build();

        let sink = MetricsSink::create(&path).unwrap();
        sink.write(&report).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("sink_test"));
        assert!(contents.contains("\"result\": \"pass\""));
        assert!(contents.contains("\"stride_slots\": 21"));

        fs::remove_file(&path).ok();
    }
}
