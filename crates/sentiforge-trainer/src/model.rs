//! Sequential model assembled from a [`ModelSpec`] with candle layers.

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::rnn::{GRUConfig, LSTMConfig, GRU, LSTM, RNN};
use candle_nn::{Embedding, Linear, VarBuilder, VarMap};

use crate::error::{ModelError, Result};
use crate::layers::{Activation, LayerSpec, ModelSpec, Shape};

/// Elman recurrence: `h_t = tanh(W x_t + U h_{t-1} + b)`.
pub struct SimpleRnn {
    input: Linear,
    recurrent: Linear,
    units: usize,
}

impl SimpleRnn {
    pub fn new(in_dim: usize, units: usize, vb: VarBuilder) -> Result<Self> {
        let input = candle_nn::linear(in_dim, units, vb.pp("input"))?;
        let recurrent = candle_nn::linear_no_bias(units, units, vb.pp("recurrent"))?;
        Ok(Self {
            input,
            recurrent,
            units,
        })
    }

    /// `xs`: `[batch, seq_len, features]`.
    pub fn forward(&self, xs: &Tensor, return_sequences: bool) -> Result<Tensor> {
        let (batch, seq_len, _) = xs.dims3()?;
        let mut h = Tensor::zeros((batch, self.units), xs.dtype(), xs.device())?;
        let mut outputs = Vec::with_capacity(if return_sequences { seq_len } else { 0 });

        for t in 0..seq_len {
            let x_t = xs.narrow(1, t, 1)?.squeeze(1)?.contiguous()?;
            h = (self.input.forward(&x_t)? + self.recurrent.forward(&h)?)?.tanh()?;
            if return_sequences {
                outputs.push(h.clone());
            }
        }

        if return_sequences {
            Ok(Tensor::stack(&outputs, 1)?)
        } else {
            Ok(h)
        }
    }
}

enum Layer {
    Embedding(Embedding),
    Dense(Linear, Activation),
    SimpleRnn(SimpleRnn, bool),
    Lstm(LSTM, bool),
    Gru(GRU, bool),
}

/// Run a candle recurrent layer over a whole sequence.
fn run_rnn<M: RNN>(
    rnn: &M,
    xs: &Tensor,
    return_sequences: bool,
    hidden: impl Fn(&M::State) -> Tensor,
) -> Result<Tensor> {
    let states = rnn.seq(&xs.contiguous()?)?;
    if return_sequences {
        return Ok(rnn.states_to_tensor(&states)?);
    }
    states
        .last()
        .map(hidden)
        .ok_or_else(|| {
            ModelError::InvalidOption("recurrent layer received an empty sequence".into())
        })
}

fn activate(xs: Tensor, activation: Activation) -> Result<Tensor> {
    let out = match activation {
        Activation::Linear => xs,
        Activation::Relu => xs.relu()?,
        Activation::Sigmoid => candle_nn::ops::sigmoid(&xs)?,
        Activation::Tanh => xs.tanh()?,
        Activation::Softmax => candle_nn::ops::softmax_last_dim(&xs)?,
    };
    Ok(out)
}

/// A stack of candle layers whose weights live in a shared [`VarMap`].
pub struct SequentialModel {
    layers: Vec<Layer>,
    device: Device,
}

impl SequentialModel {
    /// Allocate weights for every layer of `spec` in `varmap`.
    ///
    /// `spec` is validated first, with `id_space` as the minimum embedding
    /// width.
    pub fn build(
        spec: &ModelSpec,
        id_space: Option<usize>,
        varmap: &VarMap,
        device: &Device,
    ) -> Result<Self> {
        let shapes = spec.validate(id_space)?;
        let vb = VarBuilder::from_varmap(varmap, DType::F32, device);

        let mut layers = Vec::with_capacity(spec.len());
        let mut input = Shape::Tokens;
        for (index, (layer, shape)) in spec.layers().iter().zip(shapes).enumerate() {
            let vb = vb.pp(format!("layer_{index}"));
            // Validation guarantees every layer after the first sees features.
            let in_dim = input.features().unwrap_or(0);
            let built = match *layer {
                LayerSpec::Embedding {
                    input_dim,
                    output_dim,
                } => {
                    let rows = LayerSpec::embedding_rows(input_dim, id_space).unwrap_or(0);
                    Layer::Embedding(candle_nn::embedding(rows, output_dim, vb)?)
                }
                LayerSpec::Dense { units, activation } => {
                    Layer::Dense(candle_nn::linear(in_dim, units, vb)?, activation)
                }
                LayerSpec::SimpleRnn {
                    units,
                    return_sequences,
                } => Layer::SimpleRnn(SimpleRnn::new(in_dim, units, vb)?, return_sequences),
                LayerSpec::Lstm {
                    units,
                    return_sequences,
                } => Layer::Lstm(
                    candle_nn::rnn::lstm(in_dim, units, LSTMConfig::default(), vb)?,
                    return_sequences,
                ),
                LayerSpec::Gru {
                    units,
                    return_sequences,
                } => Layer::Gru(
                    candle_nn::rnn::gru(in_dim, units, GRUConfig::default(), vb)?,
                    return_sequences,
                ),
            };
            tracing::debug!(index, layer = %layer, output = %shape, "added layer");
            layers.push(built);
            input = shape;
        }

        Ok(Self {
            layers,
            device: device.clone(),
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// `ids`: `[batch, seq_len]` u32 token ids. Returns `[batch, 1]`.
    pub fn forward(&self, ids: &Tensor) -> Result<Tensor> {
        let mut xs = ids.clone();
        for layer in &self.layers {
            xs = match layer {
                Layer::Embedding(embedding) => embedding.forward(&xs)?,
                Layer::Dense(linear, activation) => activate(linear.forward(&xs)?, *activation)?,
                Layer::SimpleRnn(rnn, return_sequences) => rnn.forward(&xs, *return_sequences)?,
                Layer::Lstm(lstm, return_sequences) => {
                    run_rnn(lstm, &xs, *return_sequences, |s| s.h().clone())?
                }
                Layer::Gru(gru, return_sequences) => {
                    run_rnn(gru, &xs, *return_sequences, |s| s.h().clone())?
                }
            };
        }
        Ok(xs)
    }
}

/// Human-readable layer table, in the spirit of a Keras model summary.
pub fn summary(spec: &ModelSpec, id_space: Option<usize>) -> Result<String> {
    let shapes = spec.validate(id_space)?;
    let mut out = String::new();
    let mut total = 0usize;
    let mut input = Shape::Tokens;

    out.push_str(&format!("{:<32}{:<20}{:>12}\n", "Layer", "Output Shape", "Param #"));
    for (layer, shape) in spec.layers().iter().zip(shapes) {
        let params = param_count(layer, input, id_space);
        total += params;
        out.push_str(&format!(
            "{:<32}{:<20}{:>12}\n",
            layer.to_string(),
            shape.to_string(),
            params
        ));
        input = shape;
    }
    out.push_str(&format!("Total params: {total}\n"));
    Ok(out)
}

fn param_count(layer: &LayerSpec, input: Shape, id_space: Option<usize>) -> usize {
    let in_dim = input.features().unwrap_or(0);
    match *layer {
        LayerSpec::Embedding {
            input_dim,
            output_dim,
        } => LayerSpec::embedding_rows(input_dim, id_space).unwrap_or(0) * output_dim,
        LayerSpec::Dense { units, .. } => in_dim * units + units,
        LayerSpec::SimpleRnn { units, .. } => in_dim * units + units * units + units,
        LayerSpec::Lstm { units, .. } => 4 * (in_dim * units + units * units + 2 * units),
        LayerSpec::Gru { units, .. } => 3 * (in_dim * units + units * units + 2 * units),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(recurrent: LayerSpec) -> ModelSpec {
        ModelSpec::new()
            .with_layer(LayerSpec::Embedding {
                input_dim: Some(20),
                output_dim: 4,
            })
            .with_layer(recurrent)
            .with_layer(LayerSpec::Dense {
                units: 1,
                activation: Activation::Sigmoid,
            })
    }

    fn ids() -> Tensor {
        Tensor::from_vec(vec![3u32, 4, 5, 0, 6, 7, 0, 0], (2, 4), &Device::Cpu).unwrap()
    }

    #[test]
    fn test_forward_shapes_for_each_recurrent_kind() {
        let kinds = [
            LayerSpec::SimpleRnn {
                units: 5,
                return_sequences: false,
            },
            LayerSpec::Lstm {
                units: 5,
                return_sequences: false,
            },
            LayerSpec::Gru {
                units: 5,
                return_sequences: false,
            },
        ];
        for kind in kinds {
            let varmap = VarMap::new();
            let model =
                SequentialModel::build(&spec(kind), Some(20), &varmap, &Device::Cpu).unwrap();
            let out = model.forward(&ids()).unwrap();
            assert_eq!(out.dims(), &[2, 1]);

            let probs: Vec<f32> = out.flatten_all().unwrap().to_vec1().unwrap();
            assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }

    #[test]
    fn test_return_sequences_keeps_time_axis() {
        let varmap = VarMap::new();
        let spec = ModelSpec::new()
            .with_layer(LayerSpec::Embedding {
                input_dim: Some(20),
                output_dim: 4,
            })
            .with_layer(LayerSpec::SimpleRnn {
                units: 3,
                return_sequences: true,
            })
            .with_layer(LayerSpec::Lstm {
                units: 2,
                return_sequences: false,
            })
            .with_layer(LayerSpec::Dense {
                units: 1,
                activation: Activation::Sigmoid,
            });
        let model = SequentialModel::build(&spec, None, &varmap, &Device::Cpu).unwrap();
        assert_eq!(model.forward(&ids()).unwrap().dims(), &[2, 1]);
    }

    #[test]
    fn test_embedding_rows_default_to_id_space() {
        let spec = spec(LayerSpec::Gru {
            units: 5,
            return_sequences: false,
        });
        let mut layers = spec.layers().to_vec();
        layers[0] = LayerSpec::Embedding {
            input_dim: None,
            output_dim: 4,
        };
        let spec = layers.into_iter().fold(ModelSpec::new(), ModelSpec::with_layer);

        let varmap = VarMap::new();
        let model = SequentialModel::build(&spec, Some(20), &varmap, &Device::Cpu).unwrap();
        assert_eq!(model.forward(&ids()).unwrap().dims(), &[2, 1]);
        assert!(varmap.all_vars().iter().any(|v| v.dims() == &[20, 4]));

        let text = summary(&spec, Some(20)).unwrap();
        assert!(text.contains("Embedding(ids -> 4)"));
        assert!(text.contains("Total params: 251"));
        assert!(summary(&spec, None).is_err());
    }

    #[test]
    fn test_invalid_spec_allocates_nothing() {
        let varmap = VarMap::new();
        let bad = ModelSpec::new().with_layer(LayerSpec::Dense {
            units: 1,
            activation: Activation::Sigmoid,
        });
        assert!(SequentialModel::build(&bad, None, &varmap, &Device::Cpu).is_err());
        assert!(varmap.all_vars().is_empty());
    }

    #[test]
    fn test_summary() {
        let text = summary(
            &spec(LayerSpec::Gru {
                units: 5,
                return_sequences: false,
            }),
            None,
        )
        .unwrap();
        assert!(text.contains("Embedding(20 -> 4)"));
        assert!(text.contains("GRU(5)"));
        assert!(text.contains("Total params: 251"));
    }
}
