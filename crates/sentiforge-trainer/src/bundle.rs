//! # Model Bundle
//!
//! Everything needed to score new text after the process that trained the
//! model has exited: the preprocessing config, the label mapping, the lookup
//! table, the layer stack, the compile options and the weights.
//!
//! On disk a bundle is a directory holding `bundle.json` and
//! `model.safetensors`.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use sentiforge_core::{
    InferencePreprocessor, LabelMapping, LookupTable, PipelineConfig, PipelineContext, Tokenizer,
};

use crate::compile::CompileOptions;
use crate::error::Result;
use crate::layers::ModelSpec;
use crate::trainer::CompiledModel;

/// File holding the bundle metadata.
pub const METADATA_FILE: &str = "bundle.json";
/// File holding the model weights.
pub const WEIGHTS_FILE: &str = "model.safetensors";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Metadata {
    pipeline: PipelineConfig,
    labels: LabelMapping,
    table: LookupTable,
    model: ModelSpec,
    compile: CompileOptions,
}

/// A trained model together with its preprocessing artifacts.
pub struct ModelBundle {
    pipeline: PipelineConfig,
    labels: LabelMapping,
    preprocessor: InferencePreprocessor,
    model: CompiledModel,
}

impl ModelBundle {
    /// Package a model trained on `ctx`.
    pub fn new(ctx: &PipelineContext, model: CompiledModel) -> Self {
        Self {
            pipeline: ctx.config().clone(),
            labels: ctx.labels().clone(),
            preprocessor: InferencePreprocessor::new(Tokenizer::new(), Arc::clone(ctx.table())),
            model,
        }
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    pub fn labels(&self) -> &LabelMapping {
        &self.labels
    }

    pub fn model(&self) -> &CompiledModel {
        &self.model
    }

    /// Probability that `text` belongs to the class encoded as `1`.
    pub fn predict_text(&self, text: &str) -> Result<f32> {
        self.model.predict_single(&self.preprocessor.encode_batch(text))
    }

    /// Surface label for `text`, with the model's output.
    pub fn classify(&self, text: &str) -> Result<(&str, f32)> {
        let p = self.predict_text(text)?;
        let label = u8::from(p >= 0.5);
        Ok((self.labels.name(label), p))
    }

    /// Write `bundle.json` and `model.safetensors` into `dir`, creating it
    /// if needed.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let metadata = Metadata {
            pipeline: self.pipeline.clone(),
            labels: self.labels.clone(),
            table: self.preprocessor.table().as_ref().clone(),
            model: self.model.spec().clone(),
            compile: self.model.options().clone(),
        };
        fs::write(
            dir.join(METADATA_FILE),
            serde_json::to_string_pretty(&metadata)?,
        )?;
        self.model.save(dir.join(WEIGHTS_FILE))?;

        tracing::info!(dir = %dir.display(), "bundle saved");
        Ok(())
    }

    /// Rebuild a bundle written by [`ModelBundle::save`].
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let json = fs::read_to_string(dir.join(METADATA_FILE))?;
        let metadata: Metadata = serde_json::from_str(&json)?;

        let mut model =
            CompiledModel::compile(&metadata.model, metadata.compile, metadata.table.id_space())?;
        model.load_weights(dir.join(WEIGHTS_FILE))?;

        tracing::info!(
            dir = %dir.display(),
            words = metadata.table.vocab_len(),
            "bundle loaded"
        );
        Ok(Self {
            pipeline: metadata.pipeline,
            labels: metadata.labels,
            preprocessor: InferencePreprocessor::new(Tokenizer::new(), Arc::new(metadata.table)),
            model,
        })
    }
}
