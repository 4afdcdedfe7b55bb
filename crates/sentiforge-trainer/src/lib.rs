//! # SentiForge Trainer
//!
//! Layer-by-layer model assembly, training and inference on top of the
//! batches produced by `sentiforge-core`, using candle.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sentiforge_core::{Pipeline, PipelineConfig, Table};
//! use sentiforge_trainer::{
//!     Activation, CompileOptions, CompiledModel, LayerSpec, ModelBundle, ModelSpec,
//!     TracingCallback,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let table = Table::from_csv_path("reviews.csv")?;
//! let ctx = Pipeline::run(&table, &PipelineConfig::new("review", "sentiment"))?;
//!
//! let spec = ModelSpec::new()
//!     .with_layer(LayerSpec::Embedding { input_dim: None, output_dim: 32 })
//!     .with_layer(LayerSpec::Lstm { units: 32, return_sequences: false })
//!     .with_layer(LayerSpec::Dense { units: 1, activation: Activation::Sigmoid });
//!
//! let mut model = CompiledModel::compile_for(&ctx, &spec, CompileOptions::default())?;
//! model.fit(&ctx, 5, &mut TracingCallback)?;
//! println!("{}", model.evaluate(&ctx)?);
//!
//! ModelBundle::new(&ctx, model).save("models/reviews")?;
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod compile;
pub mod error;
pub mod layers;
pub mod model;
pub mod trainer;

pub use bundle::ModelBundle;
pub use compile::{CompileOptions, Loss, Metric, Optimizer};
pub use error::{ModelError, Result};
pub use layers::{Activation, LayerSpec, ModelSpec, Shape};
pub use model::{summary, SequentialModel};
pub use trainer::{CompiledModel, EpochCallback, EpochLogs, Evaluation, History, TracingCallback};
