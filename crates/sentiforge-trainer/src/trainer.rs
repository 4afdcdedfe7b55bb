//! # Training Loop
//!
//! A [`CompiledModel`] owns the weights, the optimizer state and the chosen
//! loss. `fit` runs full passes over the encoded training batches and
//! reports one [`EpochLogs`] per pass through an [`EpochCallback`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use candle_core::{Device, Tensor};
use candle_nn::optim::{AdamW, Optimizer as _, ParamsAdamW, SGD};
use candle_nn::VarMap;
use serde::{Deserialize, Serialize};

use sentiforge_core::{EncodedBatch, PipelineContext, SentiError};

use crate::compile::{CompileOptions, Loss, Metric, Optimizer};
use crate::error::{ModelError, Result};
use crate::layers::ModelSpec;
use crate::model::SequentialModel;

/// Probabilities are clipped to `[EPSILON, 1 - EPSILON]` before taking logs.
const EPSILON: f32 = 1e-7;

/// Loss and metrics after one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochLogs {
    /// One-based epoch number.
    pub epoch: usize,
    /// Mean loss over every training example seen in the epoch.
    pub loss: f64,
    pub metrics: BTreeMap<Metric, f64>,
}

impl fmt::Display for EpochLogs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch {}: loss {:.4}", self.epoch, self.loss)?;
        for (metric, value) in &self.metrics {
            write!(f, ", {metric} {value:.4}")?;
        }
        Ok(())
    }
}

/// Per-epoch logs of a whole `fit` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub epochs: Vec<EpochLogs>,
}

impl History {
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn last(&self) -> Option<&EpochLogs> {
        self.epochs.last()
    }

    pub fn losses(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.loss).collect()
    }
}

/// Loss and metrics over a held-out dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub loss: f64,
    pub metrics: BTreeMap<Metric, f64>,
    /// Number of examples evaluated.
    pub examples: usize,
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loss {:.4}", self.loss)?;
        for (metric, value) in &self.metrics {
            write!(f, ", {metric} {value:.4}")?;
        }
        write!(f, " ({} examples)", self.examples)
    }
}

/// Hook invoked around every training epoch.
pub trait EpochCallback {
    fn on_epoch_begin(&mut self, _epoch: usize, _epochs: usize) {}

    fn on_epoch_end(&mut self, logs: &EpochLogs);
}

impl<F: FnMut(&EpochLogs)> EpochCallback for F {
    fn on_epoch_end(&mut self, logs: &EpochLogs) {
        self(logs)
    }
}

/// Logs every finished epoch at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingCallback;

impl EpochCallback for TracingCallback {
    fn on_epoch_begin(&mut self, epoch: usize, epochs: usize) {
        tracing::debug!(epoch, epochs, "epoch started");
    }

    fn on_epoch_end(&mut self, logs: &EpochLogs) {
        tracing::info!(epoch = logs.epoch, loss = logs.loss, "{logs}");
    }
}

enum OptimizerState {
    Sgd(SGD),
    AdamW(AdamW),
}

impl OptimizerState {
    fn new(options: &CompileOptions, varmap: &VarMap) -> Result<Self> {
        let vars = varmap.all_vars();
        let lr = options.learning_rate;
        let state = match options.optimizer {
            Optimizer::Sgd => Self::Sgd(SGD::new(vars, lr)?),
            Optimizer::Adam => Self::AdamW(AdamW::new(
                vars,
                ParamsAdamW {
                    lr,
                    weight_decay: 0.0,
                    ..Default::default()
                },
            )?),
            Optimizer::Adamw => Self::AdamW(AdamW::new(
                vars,
                ParamsAdamW {
                    lr,
                    ..Default::default()
                },
            )?),
        };
        Ok(state)
    }

    fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        match self {
            Self::Sgd(opt) => opt.backward_step(loss)?,
            Self::AdamW(opt) => opt.backward_step(loss)?,
        }
        Ok(())
    }
}

/// A sequential model with its optimizer, ready to train.
pub struct CompiledModel {
    spec: ModelSpec,
    options: CompileOptions,
    metrics: Vec<Metric>,
    varmap: VarMap,
    model: SequentialModel,
    optimizer: OptimizerState,
}

impl CompiledModel {
    /// Validate `spec` against `id_space` and allocate fresh weights on CPU.
    pub fn compile(spec: &ModelSpec, options: CompileOptions, id_space: usize) -> Result<Self> {
        options.validate()?;
        let varmap = VarMap::new();
        let model = SequentialModel::build(spec, Some(id_space), &varmap, &Device::Cpu)?;
        let optimizer = OptimizerState::new(&options, &varmap)?;
        tracing::info!(
            layers = spec.len(),
            optimizer = %options.optimizer,
            loss = %options.loss,
            learning_rate = options.learning_rate,
            "model compiled"
        );
        Ok(Self {
            spec: spec.clone(),
            metrics: options.unique_metrics(),
            options,
            varmap,
            model,
            optimizer,
        })
    }

    /// Compile against the id space of a preprocessing run.
    pub fn compile_for(
        ctx: &PipelineContext,
        spec: &ModelSpec,
        options: CompileOptions,
    ) -> Result<Self> {
        Self::compile(spec, options, ctx.table().id_space())
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Train on the pipeline's training split.
    pub fn fit(
        &mut self,
        ctx: &PipelineContext,
        epochs: usize,
        callback: &mut dyn EpochCallback,
    ) -> Result<History> {
        if ctx.train().is_empty() {
            return Err(SentiError::EmptyDataset { what: "train split" }.into());
        }
        self.fit_with(|| ctx.encoded_train(), epochs, callback)
    }

    /// Train on the batches produced by `batches`, called once per epoch.
    pub fn fit_with<F, I>(
        &mut self,
        mut batches: F,
        epochs: usize,
        callback: &mut dyn EpochCallback,
    ) -> Result<History>
    where
        F: FnMut() -> I,
        I: IntoIterator<Item = EncodedBatch>,
    {
        if epochs == 0 {
            return Err(ModelError::InvalidOption(
                "epochs must be greater than 0".into(),
            ));
        }

        let mut history = History::default();
        for epoch in 1..=epochs {
            callback.on_epoch_begin(epoch, epochs);

            let mut acc = Accumulator::default();
            for batch in batches() {
                if batch.is_empty() {
                    continue;
                }
                let (ids, targets) = self.tensors(&batch)?;
                let preds = self.model.forward(&ids)?;
                let loss = self.loss(&preds, &targets)?;
                self.optimizer.backward_step(&loss)?;
                acc.add(&batch, &preds, &loss)?;
            }

            if acc.examples == 0 {
                return Err(SentiError::EmptyDataset { what: "train split" }.into());
            }
            let logs = EpochLogs {
                epoch,
                loss: acc.mean_loss(),
                metrics: acc.metrics(&self.metrics),
            };
            callback.on_epoch_end(&logs);
            history.epochs.push(logs);
        }
        Ok(history)
    }

    /// Loss and metrics on the pipeline's test split.
    pub fn evaluate(&self, ctx: &PipelineContext) -> Result<Evaluation> {
        if ctx.test().is_empty() {
            return Err(SentiError::EmptyDataset { what: "test split" }.into());
        }
        self.evaluate_batches(ctx.encoded_test())
    }

    pub fn evaluate_batches<I>(&self, batches: I) -> Result<Evaluation>
    where
        I: IntoIterator<Item = EncodedBatch>,
    {
        let mut acc = Accumulator::default();
        for batch in batches {
            if batch.is_empty() {
                continue;
            }
            let (ids, targets) = self.tensors(&batch)?;
            let preds = self.model.forward(&ids)?;
            let loss = self.loss(&preds, &targets)?;
            acc.add(&batch, &preds, &loss)?;
        }

        if acc.examples == 0 {
            return Err(SentiError::EmptyDataset { what: "test split" }.into());
        }
        let evaluation = Evaluation {
            loss: acc.mean_loss(),
            metrics: acc.metrics(&self.metrics),
            examples: acc.examples,
        };
        tracing::info!(examples = evaluation.examples, "evaluated: {evaluation}");
        Ok(evaluation)
    }

    /// One output per sequence in `batch`; labels are ignored.
    pub fn predict(&self, batch: &EncodedBatch) -> Result<Vec<f32>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let ids = self.ids(batch)?;
        let preds = self.model.forward(&ids)?;
        Ok(preds.flatten_all()?.to_vec1::<f32>()?)
    }

    /// Probability that `text` belongs to the class encoded as `1`.
    pub fn predict_text(&self, ctx: &PipelineContext, text: &str) -> Result<f32> {
        self.predict_single(&ctx.encode_text_batch(text))
    }

    pub(crate) fn predict_single(&self, batch: &EncodedBatch) -> Result<f32> {
        self.predict(batch)?
            .first()
            .copied()
            .ok_or_else(|| ModelError::InvalidOption("nothing to predict".into()))
    }

    /// Write every weight to a safetensors file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.varmap.save(path.as_ref())?;
        tracing::info!(path = %path.as_ref().display(), "weights saved");
        Ok(())
    }

    /// Overwrite the weights with those stored in a safetensors file.
    pub fn load_weights<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.varmap.load(path.as_ref())?;
        tracing::info!(path = %path.as_ref().display(), "weights loaded");
        Ok(())
    }

    fn ids(&self, batch: &EncodedBatch) -> Result<Tensor> {
        let (ids, shape) = batch.padded(1);
        Ok(Tensor::from_vec(ids, shape, self.model.device())?)
    }

    fn tensors(&self, batch: &EncodedBatch) -> Result<(Tensor, Tensor)> {
        if !batch.is_labeled() {
            return Err(ModelError::InvalidOption(
                "batch has no labels to train or evaluate on".into(),
            ));
        }
        let ids = self.ids(batch)?;
        let targets: Vec<f32> = batch.labels.iter().map(|&l| f32::from(l)).collect();
        let targets = Tensor::from_vec(targets, (batch.len(), 1), self.model.device())?;
        Ok((ids, targets))
    }

    fn loss(&self, preds: &Tensor, targets: &Tensor) -> Result<Tensor> {
        loss_value(self.options.loss, preds, targets)
    }
}

/// Scalar loss over `[batch, 1]` probabilities and `0`/`1` targets.
fn loss_value(loss: Loss, preds: &Tensor, targets: &Tensor) -> Result<Tensor> {
    let value = match loss {
        Loss::BinaryCrossentropy => {
            let p = preds.clamp(EPSILON, 1.0 - EPSILON)?;
            let pos = (targets * p.log()?)?;
            let neg = (targets.affine(-1.0, 1.0)? * p.affine(-1.0, 1.0)?.log()?)?;
            (pos + neg)?.neg()?.mean_all()?
        }
        Loss::MeanSquaredError => candle_nn::loss::mse(preds, targets)?,
        Loss::MeanAbsoluteError => (preds - targets)?.abs()?.mean_all()?,
        Loss::MeanAbsolutePercentageError => {
            let scale = targets.abs()?.maximum(EPSILON)?;
            ((targets - preds)?.abs()? / scale)?
                .mean_all()?
                .affine(100.0, 0.0)?
        }
        Loss::MeanSquaredLogarithmicError => {
            let p = preds.maximum(EPSILON)?.affine(1.0, 1.0)?.log()?;
            let t = targets.maximum(EPSILON)?.affine(1.0, 1.0)?.log()?;
            (p - t)?.sqr()?.mean_all()?
        }
        Loss::Hinge => hinge_margin(preds, targets)?.mean_all()?,
        Loss::SquaredHinge => hinge_margin(preds, targets)?.sqr()?.mean_all()?,
        Loss::Poisson => {
            let log_p = preds.affine(1.0, f64::from(EPSILON))?.log()?;
            (preds - (targets * log_p)?)?.mean_all()?
        }
        Loss::KullbackLeiblerDivergence => {
            let t = targets.clamp(EPSILON, 1f32)?;
            let p = preds.clamp(EPSILON, 1f32)?;
            (&t * (t.log()? - p.log()?)?)?.mean_all()?
        }
    };
    Ok(value)
}

/// `max(0, 1 - y * p)` with targets mapped to `-1`/`1`.
fn hinge_margin(preds: &Tensor, targets: &Tensor) -> Result<Tensor> {
    let signed = targets.affine(2.0, -1.0)?;
    Ok((signed * preds)?.affine(-1.0, 1.0)?.relu()?)
}

/// Running loss and predictions over one pass.
#[derive(Default)]
struct Accumulator {
    loss_sum: f64,
    examples: usize,
    predictions: Vec<f32>,
    targets: Vec<f32>,
}

impl Accumulator {
    fn add(&mut self, batch: &EncodedBatch, preds: &Tensor, loss: &Tensor) -> Result<()> {
        let loss = f64::from(loss.to_scalar::<f32>()?);
        self.loss_sum += loss * batch.len() as f64;
        self.examples += batch.len();
        self.predictions.extend(preds.flatten_all()?.to_vec1::<f32>()?);
        self.targets.extend(batch.labels.iter().map(|&l| f32::from(l)));
        Ok(())
    }

    fn mean_loss(&self) -> f64 {
        self.loss_sum / self.examples as f64
    }

    fn metrics(&self, metrics: &[Metric]) -> BTreeMap<Metric, f64> {
        metrics
            .iter()
            .map(|&m| (m, m.compute(&self.predictions, &self.targets)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{Activation, LayerSpec};
    use sentiforge_core::{Pipeline, PipelineConfig, Table};

    fn context(rows: usize) -> PipelineContext {
        let records = (0..rows)
            .map(|i| {
                if i % 2 == 0 {
                    vec![Some("good fun great".to_string()), Some("pos".to_string())]
                } else {
                    vec![Some("bad dull awful".to_string()), Some("neg".to_string())]
                }
            })
            .collect();
        let table = Table::new(vec!["review".into(), "sentiment".into()], records);
        let config = PipelineConfig::new("review", "sentiment")
            .with_batch_size(4)
            .with_num_oov_buckets(1);
        Pipeline::run(&table, &config).unwrap()
    }

    fn spec() -> ModelSpec {
        ModelSpec::new()
            .with_layer(LayerSpec::Embedding {
                input_dim: None,
                output_dim: 8,
            })
            .with_layer(LayerSpec::Gru {
                units: 8,
                return_sequences: false,
            })
            .with_layer(LayerSpec::Dense {
                units: 1,
                activation: Activation::Sigmoid,
            })
    }

    fn compiled(ctx: &PipelineContext) -> CompiledModel {
        CompiledModel::compile_for(ctx, &spec(), CompileOptions::new()).unwrap()
    }

    #[test]
    fn test_fit_reports_every_epoch() {
        let ctx = context(16);
        let mut model = compiled(&ctx);

        let mut seen = Vec::new();
        let mut callback = |logs: &EpochLogs| seen.push(logs.epoch);
        let history = model.fit(&ctx, 3, &mut callback).unwrap();

        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(history.len(), 3);
        for logs in &history.epochs {
            assert!(logs.loss.is_finite());
            assert!(logs.metrics.contains_key(&Metric::Accuracy));
        }
    }

    #[test]
    fn test_loss_decreases_on_separable_data() {
        let ctx = context(32);
        let options = CompileOptions::new().with_learning_rate(0.05);
        let mut model = CompiledModel::compile_for(&ctx, &spec(), options).unwrap();

        let history = model.fit(&ctx, 30, &mut TracingCallback).unwrap();
        let losses = history.losses();
        assert!(losses[losses.len() - 1] < losses[0]);
    }

    #[test]
    fn test_zero_epochs_is_rejected() {
        let ctx = context(8);
        let mut model = compiled(&ctx);
        let err = model.fit(&ctx, 0, &mut TracingCallback).unwrap_err();
        assert!(matches!(err, ModelError::InvalidOption(_)));
    }

    #[test]
    fn test_empty_train_split_is_rejected() {
        let table = Table::new(
            vec!["review".into(), "sentiment".into()],
            vec![
                vec![Some("good".into()), Some("pos".into())],
                vec![Some("bad".into()), Some("neg".into())],
            ],
        );
        let config = PipelineConfig::new("review", "sentiment").with_split_ratio(0.2);
        let ctx = Pipeline::run(&table, &config).unwrap();
        let mut model = compiled(&ctx);

        let err = model.fit(&ctx, 1, &mut TracingCallback).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Pipeline(SentiError::EmptyDataset { .. })
        ));
    }

    #[test]
    fn test_empty_test_split_is_rejected() {
        let table = Table::new(
            vec!["review".into(), "sentiment".into()],
            vec![
                vec![Some("good".into()), Some("pos".into())],
                vec![Some("bad".into()), Some("neg".into())],
            ],
        );
        let config = PipelineConfig::new("review", "sentiment").with_split_ratio(0.9);
        let ctx = Pipeline::run(&table, &config).unwrap();
        assert_eq!(ctx.train().len(), 2);
        assert!(ctx.test().is_empty());

        let model = compiled(&ctx);
        let err = model.evaluate(&ctx).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Pipeline(SentiError::EmptyDataset { what: "test split" })
        ));
    }

    #[test]
    fn test_every_optimizer_and_loss_trains() {
        let ctx = context(8);
        for optimizer in [Optimizer::Sgd, Optimizer::Adam, Optimizer::Adamw] {
            for loss in [
                Loss::BinaryCrossentropy,
                Loss::MeanSquaredError,
                Loss::MeanAbsoluteError,
                Loss::MeanAbsolutePercentageError,
                Loss::MeanSquaredLogarithmicError,
                Loss::Hinge,
                Loss::SquaredHinge,
                Loss::Poisson,
                Loss::KullbackLeiblerDivergence,
            ] {
                let options = CompileOptions::new()
                    .with_optimizer(optimizer)
                    .with_loss(loss)
                    .with_metrics(vec![Metric::Accuracy, Metric::Mse, Metric::Mae]);
                let mut model = CompiledModel::compile_for(&ctx, &spec(), options).unwrap();
                let history = model.fit(&ctx, 1, &mut TracingCallback).unwrap();
                assert_eq!(history.epochs[0].metrics.len(), 3);
                assert!(history.epochs[0].loss.is_finite(), "{optimizer} {loss}");
            }
        }
    }

    #[test]
    fn test_loss_values() {
        let device = Device::Cpu;
        let preds = Tensor::from_vec(vec![0.8f32, 0.4], (2, 1), &device).unwrap();
        let targets = Tensor::from_vec(vec![1f32, 0.0], (2, 1), &device).unwrap();
        let ones = Tensor::from_vec(vec![1f32, 1.0], (2, 1), &device).unwrap();

        let value = |loss: Loss, targets: &Tensor| {
            loss_value(loss, &preds, targets)
                .unwrap()
                .to_scalar::<f32>()
                .unwrap()
        };
        let cases = [
            (Loss::Hinge, &targets, 0.8),
            (Loss::SquaredHinge, &targets, 1.0),
            (Loss::MeanSquaredLogarithmicError, &targets, 0.062_157),
            (Loss::Poisson, &targets, 0.711_572),
            (Loss::KullbackLeiblerDivergence, &targets, 0.111_571),
            (Loss::MeanAbsolutePercentageError, &ones, 40.0),
            (Loss::MeanAbsoluteError, &targets, 0.3),
        ];
        for (loss, targets, expected) in cases {
            let got = value(loss, targets);
            assert!((got - expected).abs() < 1e-3, "{loss}: {got} != {expected}");
        }
    }

    #[test]
    fn test_more_metrics_are_reported() {
        let ctx = context(8);
        let metrics = vec![
            Metric::Precision,
            Metric::Recall,
            Metric::F1,
            Metric::Auc,
            Metric::Mape,
        ];
        let options = CompileOptions::new().with_metrics(metrics.clone());
        let mut model = CompiledModel::compile_for(&ctx, &spec(), options).unwrap();
        let history = model.fit(&ctx, 1, &mut TracingCallback).unwrap();
        for metric in metrics {
            let value = history.epochs[0].metrics[&metric];
            assert!(value.is_finite(), "{metric}");
        }
    }

    #[test]
    fn test_evaluate_and_predict() {
        let ctx = context(12);
        let mut model = compiled(&ctx);
        model.fit(&ctx, 2, &mut TracingCallback).unwrap();

        let evaluation = model.evaluate(&ctx).unwrap();
        assert_eq!(evaluation.examples, ctx.test().len());
        assert!(evaluation.loss.is_finite());

        let batch = ctx.encoded_test().next().unwrap();
        let probs = model.predict(&batch).unwrap();
        assert_eq!(probs.len(), batch.len());
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));

        let p = model.predict_text(&ctx, "").unwrap();
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_compile_rejects_narrow_embedding() {
        let ctx = context(8);
        let narrow = ModelSpec::new()
            .with_layer(LayerSpec::Embedding {
                input_dim: Some(2),
                output_dim: 4,
            })
            .with_layer(LayerSpec::SimpleRnn {
                units: 2,
                return_sequences: false,
            })
            .with_layer(LayerSpec::Dense {
                units: 1,
                activation: Activation::Sigmoid,
            });
        let err = CompiledModel::compile_for(&ctx, &narrow, CompileOptions::new()).err();
        assert!(matches!(err, Some(ModelError::InvalidLayer { index: 0, .. })));
    }
}
