//! Prometheus metrics registry.

use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, histogram::Histogram},
    registry::Registry,
};

/// Outbound call duration buckets (in seconds). 5ms to 30s.
const DURATION_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 10.0, 30.0,
];

/// Launch labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct LaunchLabels {
    /// `legacy` or `token`.
    pub mode: String,
    /// `verified` or the error kind that rejected the launch.
    pub outcome: String,
}

/// Labels carrying only an outcome.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    pub outcome: String,
}

/// Outbound target labels: `keyset`, `token_exchange`, `grade` or `execution`.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct TargetLabels {
    pub target: String,
}

/// Metrics registry holding all ltigate metrics.
pub struct MetricsRegistry {
    /// The prometheus-client registry for encoding.
    pub registry: Registry,

    pub launches_total: Family<LaunchLabels, Counter>,
    pub grade_submissions_total: Family<OutcomeLabels, Counter>,
    pub keyset_fetches_total: Family<OutcomeLabels, Counter>,
    pub executions_total: Family<OutcomeLabels, Counter>,
    pub outbound_duration_seconds: Family<TargetLabels, Histogram>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let launches_total = Family::<LaunchLabels, Counter>::default();
        registry.register(
            "ltigate_launches",
            "Launches received, by trust mode and outcome",
            launches_total.clone(),
        );

        let grade_submissions_total = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "ltigate_grade_submissions",
            "Grade passback attempts, by outcome",
            grade_submissions_total.clone(),
        );

        let keyset_fetches_total = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "ltigate_keyset_fetches",
            "Platform key set fetches, by outcome",
            keyset_fetches_total.clone(),
        );

        let executions_total = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "ltigate_executions",
            "Code executions, by outcome",
            executions_total.clone(),
        );

        let outbound_duration_seconds =
            Family::<TargetLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(DURATION_BUCKETS.iter().cloned())
            });
        registry.register(
            "ltigate_outbound_duration_seconds",
            "Duration of calls to the platform and the code runner",
            outbound_duration_seconds.clone(),
        );

        Self {
            registry,
            launches_total,
            grade_submissions_total,
            keyset_fetches_total,
            executions_total,
            outbound_duration_seconds,
        }
    }

    pub fn record_launch(&self, mode: &str, outcome: &str) {
        let labels = LaunchLabels {
            mode: mode.to_string(),
            outcome: outcome.to_string(),
        };
        self.launches_total.get_or_create(&labels).inc();
    }

    pub fn record_grade_submission(&self, outcome: &str) {
        self.grade_submissions_total
            .get_or_create(&outcome_labels(outcome))
            .inc();
    }

    pub fn record_keyset_fetch(&self, outcome: &str) {
        self.keyset_fetches_total
            .get_or_create(&outcome_labels(outcome))
            .inc();
    }

    pub fn record_execution(&self, outcome: &str) {
        self.executions_total
            .get_or_create(&outcome_labels(outcome))
            .inc();
    }

    /// Record the duration of an outbound HTTP call.
    pub fn record_outbound(&self, target: &str, duration_secs: f64) {
        let labels = TargetLabels {
            target: target.to_string(),
        };
        self.outbound_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn outcome_labels(outcome: &str) -> OutcomeLabels {
    OutcomeLabels {
        outcome: outcome.to_string(),
    }
}
