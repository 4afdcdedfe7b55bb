//! # SentiForge
//!
//! Umbrella crate re-exporting the preprocessing pipeline
//! ([`sentiforge_core`]) and the model trainer ([`sentiforge_trainer`]).

pub use sentiforge_core;
pub use sentiforge_trainer;

pub use sentiforge_core::{
    Dataset, EncodedBatch, LabelMapping, LookupTable, Pipeline, PipelineConfig, PipelineContext,
    SentiError, Table, Tokenizer,
};
pub use sentiforge_trainer::{
    Activation, CompileOptions, CompiledModel, LayerSpec, Loss, Metric, ModelBundle, ModelError,
    ModelSpec, Optimizer, TracingCallback,
};
