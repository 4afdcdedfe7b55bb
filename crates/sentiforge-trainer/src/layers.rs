//! # Layer Specifications
//!
//! A model is described as an ordered list of [`LayerSpec`]s, added and
//! removed one at a time, then validated as a whole before any weights are
//! allocated.
//!
//! Validation threads a [`Shape`] through the stack: token ids enter, an
//! embedding turns them into a feature sequence, recurrent layers consume
//! the sequence and optionally collapse it to a vector, dense layers map the
//! last dimension. The stack must end in one unit per example.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Element-wise activation applied after a dense layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
}

impl FromStr for Activation {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "linear" | "none" => Ok(Self::Linear),
            "relu" => Ok(Self::Relu),
            "sigmoid" => Ok(Self::Sigmoid),
            "tanh" => Ok(Self::Tanh),
            "softmax" => Ok(Self::Softmax),
            _ => Err(ModelError::Unsupported {
                kind: "activation",
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Relu => write!(f, "relu"),
            Self::Sigmoid => write!(f, "sigmoid"),
            Self::Tanh => write!(f, "tanh"),
            Self::Softmax => write!(f, "softmax"),
        }
    }
}

/// One layer of a sequential model with its hyper-parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "layer", rename_all = "snake_case")]
pub enum LayerSpec {
    /// Fully connected layer over the last dimension.
    Dense {
        units: usize,
        #[serde(default)]
        activation: Activation,
    },
    /// Token id → dense vector lookup.
    ///
    /// Without `input_dim` the table covers the lookup table's id space.
    Embedding {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input_dim: Option<usize>,
        output_dim: usize,
    },
    /// Elman recurrence with `tanh`.
    SimpleRnn {
        units: usize,
        #[serde(default)]
        return_sequences: bool,
    },
    /// Long short-term memory.
    Lstm {
        units: usize,
        #[serde(default)]
        return_sequences: bool,
    },
    /// Gated recurrent unit.
    Gru {
        units: usize,
        #[serde(default)]
        return_sequences: bool,
    },
}

impl LayerSpec {
    /// Short layer kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Dense { .. } => "Dense",
            Self::Embedding { .. } => "Embedding",
            Self::SimpleRnn { .. } => "SimpleRNN",
            Self::Lstm { .. } => "LSTM",
            Self::Gru { .. } => "GRU",
        }
    }

    /// Rows of the embedding table, falling back to `id_space`.
    pub fn embedding_rows(input_dim: Option<usize>, id_space: Option<usize>) -> Option<usize> {
        input_dim.or(id_space)
    }

    /// Output shape of this layer for `input`, or why it does not fit.
    fn output_shape(
        &self,
        input: Shape,
        id_space: Option<usize>,
    ) -> std::result::Result<Shape, String> {
        match *self {
            Self::Embedding {
                input_dim,
                output_dim,
            } => {
                let Some(input_dim) = Self::embedding_rows(input_dim, id_space) else {
                    return Err("input_dim is required without a lookup table".into());
                };
                if input_dim == 0 || output_dim == 0 {
                    return Err("input_dim and output_dim must be positive".into());
                }
                if input != Shape::Tokens {
                    return Err(format!("Embedding expects token ids, got {input}"));
                }
                if let Some(ids) = id_space {
                    if input_dim < ids {
                        return Err(format!(
                            "input_dim {input_dim} is smaller than the lookup table's {ids} ids"
                        ));
                    }
                }
                Ok(Shape::Sequence(output_dim))
            }
            Self::SimpleRnn {
                units,
                return_sequences,
            }
            | Self::Lstm {
                units,
                return_sequences,
            }
            | Self::Gru {
                units,
                return_sequences,
            } => {
                if units == 0 {
                    return Err("units must be positive".into());
                }
                match input {
                    Shape::Sequence(_) if return_sequences => Ok(Shape::Sequence(units)),
                    Shape::Sequence(_) => Ok(Shape::Vector(units)),
                    other => Err(format!("{} expects a sequence, got {other}", self.kind())),
                }
            }
            Self::Dense { units, .. } => {
                if units == 0 {
                    return Err("units must be positive".into());
                }
                match input {
                    Shape::Sequence(_) => Ok(Shape::Sequence(units)),
                    Shape::Vector(_) => Ok(Shape::Vector(units)),
                    Shape::Tokens => {
                        Err("Dense cannot consume raw token ids; add an Embedding first".into())
                    }
                }
            }
        }
    }
}

impl fmt::Display for LayerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dense { units, activation } => write!(f, "Dense({units}, {activation})"),
            Self::Embedding {
                input_dim: Some(input_dim),
                output_dim,
            } => write!(f, "Embedding({input_dim} -> {output_dim})"),
            Self::Embedding {
                input_dim: None,
                output_dim,
            } => write!(f, "Embedding(ids -> {output_dim})"),
            Self::SimpleRnn {
                units,
                return_sequences,
            }
            | Self::Lstm {
                units,
                return_sequences,
            }
            | Self::Gru {
                units,
                return_sequences,
            } => {
                write!(f, "{}({units}", self.kind())?;
                if *return_sequences {
                    write!(f, ", return_sequences")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Per-example tensor shape between layers (batch dimension omitted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Integer token ids of any length.
    Tokens,
    /// A sequence of feature vectors of the given width.
    Sequence(usize),
    /// A single feature vector.
    Vector(usize),
}

impl Shape {
    /// Width of the last dimension, if it has features.
    pub fn features(&self) -> Option<usize> {
        match *self {
            Shape::Tokens => None,
            Shape::Sequence(n) | Shape::Vector(n) => Some(n),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Tokens => write!(f, "(None, None) token ids"),
            Shape::Sequence(n) => write!(f, "(None, None, {n})"),
            Shape::Vector(n) => write!(f, "(None, {n})"),
        }
    }
}

/// Ordered stack of layers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelSpec {
    layers: Vec<LayerSpec>,
}

impl ModelSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer, builder style.
    pub fn with_layer(mut self, layer: LayerSpec) -> Self {
        self.layers.push(layer);
        self
    }

    /// Append a layer.
    pub fn push(&mut self, layer: LayerSpec) {
        self.layers.push(layer);
    }

    /// Remove the last layer.
    pub fn pop(&mut self) -> Option<LayerSpec> {
        self.layers.pop()
    }

    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Check the stack fits together, returning each layer's output shape.
    ///
    /// `id_space` is the size of the lookup table's id range; embeddings
    /// must be at least that wide.
    pub fn validate(&self, id_space: Option<usize>) -> Result<Vec<Shape>> {
        if self.layers.is_empty() {
            return Err(ModelError::EmptyModel);
        }

        let mut shape = Shape::Tokens;
        let mut shapes = Vec::with_capacity(self.layers.len());
        for (index, layer) in self.layers.iter().enumerate() {
            shape = layer
                .output_shape(shape, id_space)
                .map_err(|reason| ModelError::InvalidLayer { index, reason })?;
            shapes.push(shape);
        }

        if shape != Shape::Vector(1) {
            return Err(ModelError::InvalidLayer {
                index: self.layers.len() - 1,
                reason: format!("the model must end with one output per example, got {shape}"),
            });
        }

        Ok(shapes)
    }

    /// Read a layer stack from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a layer stack from a JSON file.
    pub fn from_json_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
