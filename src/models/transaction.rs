//! Transaction model

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Number of model input features
pub const FEATURE_COUNT: usize = 5;

/// Feature order expected by the registered model
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "transaction_amount",
    "account_age_days",
    "transactions_last_24h",
    "merchant_risk_score",
    "device_risk_score",
];

/// A validated scoring request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransactionRecord {
    pub transaction_amount: f64,
    pub account_age_days: u64,
    pub transactions_last_24h: u64,
    pub merchant_risk_score: f64,
    pub device_risk_score: f64,
}

/// Raw model input in `FEATURE_NAMES` order. No scaling is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub fraud_probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorKind {
    Missing,
    InvalidType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub reason: FieldErrorKind,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("request body must be a JSON object: {0}")]
    InvalidBody(String),

    #[error("invalid transaction fields: {}", describe(.0))]
    Fields(Vec<FieldError>),
}

fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| match e.reason {
            FieldErrorKind::Missing => format!("{} is missing", e.field),
            FieldErrorKind::InvalidType => format!("{} has an invalid type", e.field),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl TransactionRecord {
    /// Validate an arbitrary JSON value against the transaction schema.
    ///
    /// Extra keys are ignored. Every missing or mistyped field is reported,
    /// in feature order. Values are coerced, never clamped.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let obj = value.as_object().ok_or_else(|| {
            ValidationError::InvalidBody(format!("expected object, got {}", json_kind(value)))
        })?;

        let [amount_key, age_key, recent_key, merchant_key, device_key] = FEATURE_NAMES;

        let mut errors = Vec::new();
        let amount = extract(obj, amount_key, coerce_amount, &mut errors);
        let age = extract(obj, age_key, coerce_count, &mut errors);
        let recent = extract(obj, recent_key, coerce_count, &mut errors);
        let merchant = extract(obj, merchant_key, coerce_real, &mut errors);
        let device = extract(obj, device_key, coerce_real, &mut errors);

        match (amount, age, recent, merchant, device) {
            (Some(amount), Some(age), Some(recent), Some(merchant), Some(device)) => Ok(Self {
                transaction_amount: amount,
                account_age_days: age,
                transactions_last_24h: recent,
                merchant_risk_score: merchant,
                device_risk_score: device,
            }),
            _ => Err(ValidationError::Fields(errors)),
        }
    }

    pub fn features(&self) -> FeatureVector {
        FeatureVector([
            self.transaction_amount,
            self.account_age_days as f64,
            self.transactions_last_24h as f64,
            self.merchant_risk_score,
            self.device_risk_score,
        ])
    }
}

impl FeatureVector {
    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }

    /// Single-precision copy for tensor input
    pub fn to_f32(&self) -> [f32; FEATURE_COUNT] {
        self.0.map(|v| v as f32)
    }
}

fn extract<T>(
    obj: &Map<String, Value>,
    field: &'static str,
    coerce: fn(&Value) -> Option<T>,
    errors: &mut Vec<FieldError>,
) -> Option<T> {
    let Some(raw) = obj.get(field) else {
        errors.push(FieldError { field, reason: FieldErrorKind::Missing });
        return None;
    };

    let coerced = coerce(raw);
    if coerced.is_none() {
        errors.push(FieldError { field, reason: FieldErrorKind::InvalidType });
    }
    coerced
}

/// Numbers and numeric strings; must be finite.
fn coerce_real(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Like `coerce_real`, but amounts cannot be negative.
fn coerce_amount(value: &Value) -> Option<f64> {
    coerce_real(value).filter(|v| *v >= 0.0)
}

/// Non-negative integers, integral floats and integer strings.
fn coerce_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(v: f64) -> Option<u64> {
    (v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64).then(|| v as u64)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
