//! Metrics Store - scoring aggregates shared by every request
//!
//! Owns the two transaction counters, the fraud score histogram and the
//! rolling window of recent amounts behind the average-amount gauge. Each
//! store registers its collectors in its own `prometheus::Registry`, so
//! stores never share state.

use std::collections::VecDeque;

use parking_lot::Mutex;
use prometheus::{Encoder, Gauge, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Number of recent transaction amounts kept for the average gauge
pub const WINDOW_CAPACITY: usize = 100;

/// Scores strictly above this count as high risk
pub const HIGH_RISK_THRESHOLD: f64 = 0.8;

// ============================================================================
// ROLLING WINDOW
// ============================================================================

/// Bounded FIFO of the most recent observations
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append, dropping the oldest values once over capacity
    pub fn push(&mut self, value: f64) {
        self.values.push_back(value);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    /// Exact mean of the current contents, 0.0 when empty
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Scoring aggregates for one service instance.
///
/// Counters and the histogram are lock-free prometheus collectors. The
/// amount window and the gauge are updated under one lock so the gauge never
/// disagrees with the window it was computed from.
pub struct MetricsStore {
    registry: Registry,
    total_transactions: IntCounter,
    high_risk_transactions: IntCounter,
    fraud_scores: Histogram,
    avg_transaction_amount: Gauge,
    amounts: Mutex<RollingWindow>,
}

impl MetricsStore {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let total_transactions =
            IntCounter::new("total_transactions_total", "Total transactions scored")?;
        let high_risk_transactions = IntCounter::new(
            "high_risk_transactions_total",
            "Transactions with fraud probability > 0.8",
        )?;
        let fraud_scores = Histogram::with_opts(HistogramOpts::new(
            "fraud_score_distribution",
            "Distribution of fraud scores",
        ))?;
        let avg_transaction_amount = Gauge::new(
            "avg_transaction_amount",
            "Average transaction amount observed",
        )?;

        registry.register(Box::new(total_transactions.clone()))?;
        registry.register(Box::new(high_risk_transactions.clone()))?;
        registry.register(Box::new(fraud_scores.clone()))?;
        registry.register(Box::new(avg_transaction_amount.clone()))?;

        Ok(Self {
            registry,
            total_transactions,
            high_risk_transactions,
            fraud_scores,
            avg_transaction_amount,
            amounts: Mutex::new(RollingWindow::new(WINDOW_CAPACITY)),
        })
    }

    /// Record one successfully scored transaction
    pub fn record(&self, amount: f64, fraud_probability: f64) {
        self.total_transactions.inc();
        self.fraud_scores.observe(fraud_probability);

        if fraud_probability > HIGH_RISK_THRESHOLD {
            self.high_risk_transactions.inc();
        }

        let mut window = self.amounts.lock();
        window.push(amount);
        self.avg_transaction_amount.set(window.mean());
    }

    pub fn total_transactions(&self) -> u64 {
        self.total_transactions.get()
    }

    pub fn high_risk_transactions(&self) -> u64 {
        self.high_risk_transactions.get()
    }

    pub fn scored_count(&self) -> u64 {
        self.fraud_scores.get_sample_count()
    }

    pub fn avg_transaction_amount(&self) -> f64 {
        self.avg_transaction_amount.get()
    }

    pub fn window_len(&self) -> usize {
        self.amounts.lock().len()
    }

    /// Text exposition of the four scoring aggregates
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
