//! # Compile Options
//!
//! Optimizer, loss and metrics chosen before training starts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Gradient-descent update rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Optimizer {
    Sgd,
    /// AdamW with zero weight decay.
    #[default]
    Adam,
    Adamw,
}

impl FromStr for Optimizer {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sgd" => Ok(Self::Sgd),
            "adam" => Ok(Self::Adam),
            "adamw" => Ok(Self::Adamw),
            _ => Err(ModelError::Unsupported {
                kind: "optimizer",
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Optimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sgd => write!(f, "sgd"),
            Self::Adam => write!(f, "adam"),
            Self::Adamw => write!(f, "adamw"),
        }
    }
}

/// Training objective over `[batch, 1]` predictions and `0`/`1` targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Loss {
    #[default]
    BinaryCrossentropy,
    MeanSquaredError,
    MeanAbsoluteError,
    MeanAbsolutePercentageError,
    MeanSquaredLogarithmicError,
    /// Targets are mapped to `-1`/`1` first.
    Hinge,
    SquaredHinge,
    Poisson,
    KullbackLeiblerDivergence,
}

impl FromStr for Loss {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "binary_crossentropy" | "bce" => Ok(Self::BinaryCrossentropy),
            "mean_squared_error" | "mse" => Ok(Self::MeanSquaredError),
            "mean_absolute_error" | "mae" => Ok(Self::MeanAbsoluteError),
            "mean_absolute_percentage_error" | "mape" => Ok(Self::MeanAbsolutePercentageError),
            "mean_squared_logarithmic_error" | "msle" => Ok(Self::MeanSquaredLogarithmicError),
            "hinge" => Ok(Self::Hinge),
            "squared_hinge" => Ok(Self::SquaredHinge),
            "poisson" => Ok(Self::Poisson),
            "kullback_leibler_divergence" | "kld" => Ok(Self::KullbackLeiblerDivergence),
            _ => Err(ModelError::Unsupported {
                kind: "loss",
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Loss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BinaryCrossentropy => "binary_crossentropy",
            Self::MeanSquaredError => "mean_squared_error",
            Self::MeanAbsoluteError => "mean_absolute_error",
            Self::MeanAbsolutePercentageError => "mean_absolute_percentage_error",
            Self::MeanSquaredLogarithmicError => "mean_squared_logarithmic_error",
            Self::Hinge => "hinge",
            Self::SquaredHinge => "squared_hinge",
            Self::Poisson => "poisson",
            Self::KullbackLeiblerDivergence => "kullback_leibler_divergence",
        };
        f.write_str(name)
    }
}

/// Quantity reported alongside the loss.
///
/// Predictions at or above 0.5 count as class `1`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Accuracy,
    Mse,
    Mae,
    /// Mean absolute percentage error, in percent.
    Mape,
    Precision,
    Recall,
    /// Area under the ROC curve.
    #[serde(alias = "AUC")]
    Auc,
    #[serde(rename = "f1_score", alias = "f1")]
    F1,
}

/// Denominator floor for percentage errors.
const MAPE_EPSILON: f64 = 1e-7;

impl Metric {
    /// Value of the metric over matching predictions and targets.
    ///
    /// Returns 0.0 for empty input and for ratios with a zero denominator,
    /// including AUC when only one class is present.
    pub fn compute(self, predictions: &[f32], targets: &[f32]) -> f64 {
        let n = predictions.len().min(targets.len());
        if n == 0 {
            return 0.0;
        }
        let predictions = &predictions[..n];
        let targets = &targets[..n];
        let pairs = predictions.iter().zip(targets);
        match self {
            Self::Accuracy => {
                pairs.filter(|&(&p, &t)| (p >= 0.5) == (t >= 0.5)).count() as f64 / n as f64
            }
            Self::Mse => pairs.map(|(&p, &t)| f64::from(p - t).powi(2)).sum::<f64>() / n as f64,
            Self::Mae => pairs.map(|(&p, &t)| f64::from(p - t).abs()).sum::<f64>() / n as f64,
            Self::Mape => {
                let sum: f64 = pairs
                    .map(|(&p, &t)| {
                        f64::from(t - p).abs() / f64::from(t).abs().max(MAPE_EPSILON)
                    })
                    .sum();
                100.0 * sum / n as f64
            }
            Self::Precision => {
                let c = Confusion::new(predictions, targets);
                ratio(c.tp, c.tp + c.fp)
            }
            Self::Recall => {
                let c = Confusion::new(predictions, targets);
                ratio(c.tp, c.tp + c.fn_)
            }
            Self::F1 => {
                let c = Confusion::new(predictions, targets);
                ratio(2 * c.tp, 2 * c.tp + c.fp + c.fn_)
            }
            Self::Auc => auc(predictions, targets),
        }
    }
}

#[derive(Default)]
struct Confusion {
    tp: usize,
    fp: usize,
    fn_: usize,
}

impl Confusion {
    fn new(predictions: &[f32], targets: &[f32]) -> Self {
        let mut c = Self::default();
        for (&p, &t) in predictions.iter().zip(targets) {
            match (p >= 0.5, t >= 0.5) {
                (true, true) => c.tp += 1,
                (true, false) => c.fp += 1,
                (false, true) => c.fn_ += 1,
                (false, false) => {}
            }
        }
        c
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Mann-Whitney rank-sum AUC; tied scores share their average rank.
fn auc(predictions: &[f32], targets: &[f32]) -> f64 {
    let mut scored: Vec<(f32, bool)> = predictions
        .iter()
        .zip(targets)
        .map(|(&p, &t)| (p, t >= 0.5))
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));

    let positives = scored.iter().filter(|(_, pos)| *pos).count();
    let negatives = scored.len() - positives;
    if positives == 0 || negatives == 0 {
        return 0.0;
    }

    let mut rank_sum = 0.0;
    let mut start = 0;
    while start < scored.len() {
        let mut end = start + 1;
        while end < scored.len() && scored[end].0 == scored[start].0 {
            end += 1;
        }
        // Ranks start+1..=end.
        let rank = (start + 1 + end) as f64 / 2.0;
        let tied_positives = scored[start..end].iter().filter(|(_, pos)| *pos).count();
        rank_sum += rank * tied_positives as f64;
        start = end;
    }

    let positives = positives as f64;
    (rank_sum - positives * (positives + 1.0) / 2.0) / (positives * negatives as f64)
}

impl FromStr for Metric {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "accuracy" | "acc" => Ok(Self::Accuracy),
            "mse" | "mean_squared_error" => Ok(Self::Mse),
            "mae" | "mean_absolute_error" => Ok(Self::Mae),
            "mape" | "mean_absolute_percentage_error" => Ok(Self::Mape),
            "precision" => Ok(Self::Precision),
            "recall" => Ok(Self::Recall),
            "auc" => Ok(Self::Auc),
            "f1_score" | "f1" => Ok(Self::F1),
            _ => Err(ModelError::Unsupported {
                kind: "metric",
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Accuracy => "accuracy",
            Self::Mse => "mse",
            Self::Mae => "mae",
            Self::Mape => "mape",
            Self::Precision => "precision",
            Self::Recall => "recall",
            Self::Auc => "auc",
            Self::F1 => "f1_score",
        };
        f.write_str(name)
    }
}

/// Everything needed to turn a model spec into something trainable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileOptions {
    pub optimizer: Optimizer,
    pub loss: Loss,
    pub metrics: Vec<Metric>,
    pub learning_rate: f64,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            optimizer: Optimizer::Adam,
            loss: Loss::BinaryCrossentropy,
            metrics: vec![Metric::Accuracy],
            learning_rate: 0.001,
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_optimizer(mut self, optimizer: Optimizer) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_loss(mut self, loss: Loss) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_metrics(mut self, metrics: Vec<Metric>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Learning rate must be finite and positive.
    pub fn validate(&self) -> Result<()> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ModelError::InvalidOption(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }

    /// Metrics with duplicates removed, in a stable order.
    pub fn unique_metrics(&self) -> Vec<Metric> {
        let mut metrics = self.metrics.clone();
        metrics.sort();
        metrics.dedup();
        metrics
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
