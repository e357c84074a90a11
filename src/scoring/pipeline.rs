//! Scoring pipeline - validate, score, record, respond

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use super::scorer::{FraudScorer, ScoringError};
use crate::models::{PredictionResponse, TransactionRecord, ValidationError};
use crate::telemetry::store::{MetricsStore, HIGH_RISK_THRESHOLD};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

/// Straight-line request pipeline over an injected scorer and metrics store
#[derive(Clone)]
pub struct ScoringPipeline {
    scorer: Arc<dyn FraudScorer>,
    metrics: Arc<MetricsStore>,
}

impl ScoringPipeline {
    pub fn new(scorer: Arc<dyn FraudScorer>, metrics: Arc<MetricsStore>) -> Self {
        Self { scorer, metrics }
    }

    /// Validate a raw request body, then score it
    pub fn predict(&self, body: &Value) -> Result<PredictionResponse, PipelineError> {
        let record = TransactionRecord::from_json(body)?;
        Ok(self.score_record(&record)?)
    }

    /// Score an already validated record.
    ///
    /// Metrics are only touched once the model has returned a usable
    /// probability; a failed call leaves every aggregate as it was.
    pub fn score_record(&self, record: &TransactionRecord) -> Result<PredictionResponse, ScoringError> {
        let features = record.features();
        let fraud_probability = ensure_probability(self.scorer.score(&features)?)?;

        self.metrics.record(record.transaction_amount, fraud_probability);

        if fraud_probability > HIGH_RISK_THRESHOLD {
            tracing::info!(
                fraud_probability,
                transaction_amount = record.transaction_amount,
                "High-risk transaction scored"
            );
        }

        Ok(PredictionResponse { fraud_probability })
    }
}

fn ensure_probability(p: f64) -> Result<f64, ScoringError> {
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(ScoringError::InvalidOutput(format!(
            "probability {} outside [0, 1]",
            p
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureVector;
    use serde_json::json;

    struct FixedScorer(f64);

    impl FraudScorer for FixedScorer {
        fn score(&self, _features: &FeatureVector) -> Result<f64, ScoringError> {
            Ok(self.0)
        }
    }

    struct FailingScorer;

    impl FraudScorer for FailingScorer {
        fn score(&self, _features: &FeatureVector) -> Result<f64, ScoringError> {
            Err(ScoringError::Backend("shape mismatch".to_string()))
        }
    }

    /// Echoes the device risk score back as the probability
    struct DeviceRiskScorer;

    impl FraudScorer for DeviceRiskScorer {
        fn score(&self, features: &FeatureVector) -> Result<f64, ScoringError> {
            Ok(features.values()[4])
        }
    }

    fn pipeline(scorer: impl FraudScorer + 'static) -> ScoringPipeline {
        ScoringPipeline::new(Arc::new(scorer), Arc::new(MetricsStore::new().unwrap()))
    }

    fn body(amount: f64, device_risk: f64) -> Value {
        json!({
            "transaction_amount": amount,
            "account_age_days": 120,
            "transactions_last_24h": 4,
            "merchant_risk_score": 0.3,
            "device_risk_score": device_risk
        })
    }

    fn assert_unchanged(p: &ScoringPipeline) {
        let fresh = MetricsStore::new().unwrap();
        assert_eq!(p.metrics.render().unwrap(), fresh.render().unwrap());
        assert_eq!(p.metrics.window_len(), 0);
    }

    #[test]
    fn test_three_transactions() {
        let p = pipeline(FixedScorer(0.1));
        for amount in [100.0, 200.0, 300.0] {
            let resp = p.predict(&body(amount, 0.1)).unwrap();
            assert_eq!(resp.fraud_probability, 0.1);
        }

        assert_eq!(p.metrics.avg_transaction_amount(), 200.0);
        assert_eq!(p.metrics.total_transactions(), 3);
        assert_eq!(p.metrics.high_risk_transactions(), 0);
    }

    #[test]
    fn test_high_risk_scored() {
        let p = pipeline(FixedScorer(0.95));
        let resp = p.predict(&body(50.0, 0.9)).unwrap();

        assert_eq!(resp.fraud_probability, 0.95);
        assert_eq!(p.metrics.high_risk_transactions(), 1);
        assert_eq!(p.metrics.total_transactions(), 1);
    }

    #[test]
    fn test_threshold_boundary() {
        let p = pipeline(DeviceRiskScorer);
        p.predict(&body(10.0, 0.8)).unwrap();
        assert_eq!(p.metrics.high_risk_transactions(), 0);

        p.predict(&body(10.0, 0.81)).unwrap();
        assert_eq!(p.metrics.high_risk_transactions(), 1);
    }

    #[test]
    fn test_window_keeps_latest_hundred() {
        let p = pipeline(FixedScorer(0.2));
        for amount in 1..=101 {
            p.predict(&body(amount as f64, 0.2)).unwrap();
        }

        assert_eq!(p.metrics.avg_transaction_amount(), 51.5);
        assert_eq!(p.metrics.window_len(), 100);
        assert_eq!(p.metrics.total_transactions(), 101);
    }

    #[test]
    fn test_validation_failure_leaves_metrics() {
        let p = pipeline(FixedScorer(0.99));
        let mut invalid = body(10.0, 0.1);
        invalid.as_object_mut().unwrap().remove("account_age_days");

        let err = p.predict(&invalid).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert_unchanged(&p);
    }

    #[test]
    fn test_scoring_failure_leaves_metrics() {
        let p = pipeline(FailingScorer);
        let err = p.predict(&body(10.0, 0.1)).unwrap_err();

        assert!(matches!(err, PipelineError::Scoring(ScoringError::Backend(_))));
        assert_unchanged(&p);
    }

    #[test]
    fn test_negative_amount_rejected() {
        let p = pipeline(FixedScorer(0.1));
        let err = p.predict(&body(-500.0, 0.1)).unwrap_err();

        assert!(matches!(err, PipelineError::Validation(ValidationError::Fields(_))));
        assert_unchanged(&p);
    }

    #[test]
    fn test_out_of_range_output_rejected() {
        for bad in [1.5, -0.1, f64::NAN] {
            let p = pipeline(FixedScorer(bad));
            let err = p.predict(&body(10.0, 0.1)).unwrap_err();
            assert!(matches!(err, PipelineError::Scoring(ScoringError::InvalidOutput(_))));
            assert_eq!(p.metrics.total_transactions(), 0);
        }
    }
}
