// ============================================================
// Layer 5 — Computation Graphs
// ============================================================
// A Graph is a loaded, pre-trained burn module with a fixed
// structure. It receives a batch's stacked host tensors, moves
// them to the device and returns its raw output.
//
// Graphs may return structured values; only a single 2-D tensor
// [batch, features] can be fed to a classification head or a
// softmax, see `GraphOutput::into_tensor`.

use std::path::Path;

use burn::{
    nn::{Embedding, EmbeddingConfig, Linear, LinearConfig},
    prelude::*,
};

use crate::error::{self, Error};
use crate::ml::encoder::{TransformerEncoder, TransformerEncoderConfig};

/// Raw value produced by a graph's forward pass.
#[derive(Debug, Clone)]
pub enum GraphOutput<B: Backend> {
    Tensor(Tensor<B, 2>),
    Tuple(Vec<GraphOutput<B>>),
}

impl<B: Backend> GraphOutput<B> {
    pub fn into_tensor(self) -> error::Result<Tensor<B, 2>> {
        match self {
            GraphOutput::Tensor(t)  => Ok(t),
            GraphOutput::Tuple(_) => Err(Error::UnexpectedOutputType(
                "graph returned a tuple where a single tensor was required",
            )),
        }
    }
}

pub trait Graph<B: Backend>: Module<B> {
    /// Evaluate the graph on stacked host tensors, placing them on `device`.
    fn forward(&self, inputs: &[TensorData], device: &B::Device) -> error::Result<GraphOutput<B>>;

    /// Width of the tensor returned by `forward`.
    fn output_dim(&self) -> usize;
}

/// Where graphs, labels and checkpoints of one model live.
pub trait ModelAccessor<B: Backend> {
    type Graph: Graph<B>;

    fn load_graph(&self, device: &B::Device) -> error::Result<Self::Graph>;

    fn repository(&self) -> &Path;

    /// Human-readable label of output class `index`.
    fn label(&self, index: usize) -> String;
}

// ─── IdentityGraph ────────────────────────────────────────────────────────────
/// Passes the first input slot through, flattened per example to
/// `[batch, width]`. Pre-extracted features go straight to the head.
#[derive(Module, Clone, Debug)]
pub struct IdentityGraph {
    width: usize,
}

impl IdentityGraph {
    pub fn new(width: usize) -> Self {
        Self { width }
    }
}

impl<B: Backend> Graph<B> for IdentityGraph {
    fn forward(&self, inputs: &[TensorData], device: &B::Device) -> error::Result<GraphOutput<B>> {
        let features = inputs
            .first()
            .ok_or_else(|| Error::InvalidInput("identity graph needs one input".into()))?;

        let batch = features.shape.first().copied().unwrap_or(0);
        let width: usize = features.shape.iter().skip(1).product();
        if features.shape.len() < 2 || width != self.width {
            return Err(Error::InvalidInput(format!(
                "identity graph expects [batch, {}] features, got {:?}",
                self.width, features.shape
            )));
        }

        let flat = TensorData::new(features.iter::<f32>().collect::<Vec<_>>(), [batch, width]);
        Ok(GraphOutput::Tensor(Tensor::from_data(flat, device)))
    }

    fn output_dim(&self) -> usize {
        self.width
    }
}

// ─── TextEncoderGraph ─────────────────────────────────────────────────────────
// ids  [batch, seq] ──embedding──▶ [batch, seq, d_model]
//                   ──transformer encoder (num_layers > 0)──▶ same shape
// mask [batch, seq] ──masked mean over seq──▶ [batch, d_model]
//                   ──projection──▶ [batch, output_dim]

#[derive(Config, Debug)]
pub struct TextEncoderConfig {
    pub vocab_size:  usize,
    pub d_model:     usize,
    pub output_dim:  usize,
    /// Self-attention layers before pooling; 0 pools the raw embeddings
    #[config(default = 0)]
    pub num_layers:  usize,
    #[config(default = 4)]
    pub num_heads:   usize,
    #[config(default = 256)]
    pub d_ff:        usize,
    /// Longest sequence the position embedding covers
    #[config(default = 512)]
    pub max_seq_len: usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
}

impl TextEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TextEncoderGraph<B> {
        TextEncoderGraph {
            embedding:  EmbeddingConfig::new(self.vocab_size, self.d_model).init(device),
            encoder:    self.encoder_config().map(|c| c.init(device)),
            projection: LinearConfig::new(self.d_model, self.output_dim).init(device),
            vocab_size: self.vocab_size,
            output_dim: self.output_dim,
        }
    }

    pub fn encoder_config(&self) -> Option<TransformerEncoderConfig> {
        (self.num_layers > 0).then(|| {
            TransformerEncoderConfig::new(self.d_model, self.num_heads, self.num_layers, self.d_ff, self.max_seq_len)
                .with_dropout(self.dropout)
        })
    }

    /// Rejects encoder settings the attention layers cannot be built with.
    pub fn check(&self) -> error::Result<()> {
        if self.num_layers == 0 {
            return Ok(());
        }
        if self.num_heads == 0 || self.d_model % self.num_heads != 0 {
            return Err(Error::Configuration(format!(
                "d_model {} is not divisible into {} attention heads",
                self.d_model, self.num_heads
            )));
        }
        if self.max_seq_len == 0 || !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::Configuration(format!(
                "invalid encoder settings: max_seq_len {}, dropout {}",
                self.max_seq_len, self.dropout
            )));
        }
        Ok(())
    }
}

#[derive(Module, Debug)]
pub struct TextEncoderGraph<B: Backend> {
    pub embedding:  Embedding<B>,
    pub encoder:    Option<TransformerEncoder<B>>,
    pub projection: Linear<B>,
    pub vocab_size: usize,
    pub output_dim: usize,
}

impl<B: Backend> Graph<B> for TextEncoderGraph<B> {
    /// Slots: token ids, token types (unused), attention mask.
    /// Without a mask slot every position counts.
    fn forward(&self, inputs: &[TensorData], device: &B::Device) -> error::Result<GraphOutput<B>> {
        let ids = inputs
            .first()
            .ok_or_else(|| Error::InvalidInput("text encoder needs token ids".into()))?;
        if ids.shape.len() != 2 {
            return Err(Error::InvalidInput(format!("token ids must be [batch, seq], got {:?}", ids.shape)));
        }
        if ids.iter::<i64>().any(|id| id < 0 || id as usize >= self.vocab_size) {
            return Err(Error::InvalidInput(format!("token id outside vocabulary of {}", self.vocab_size)));
        }
        let (batch, seq) = (ids.shape[0], ids.shape[1]);

        let mask = match inputs.get(2) {
            Some(m) if m.shape == ids.shape => Tensor::<B, 2, Int>::from_data(m.clone(), device).float(),
            Some(m) => {
                return Err(Error::InvalidInput(format!(
                    "attention mask {:?} does not match ids {:?}",
                    m.shape, ids.shape
                )))
            }
            None => Tensor::<B, 2>::ones([batch, seq], device),
        };

        let mut embedded = self.embedding.forward(Tensor::<B, 2, Int>::from_data(ids.clone(), device));
        if let Some(encoder) = &self.encoder {
            if seq > encoder.max_seq_len {
                return Err(Error::InvalidInput(format!(
                    "sequence of {seq} exceeds the encoder's {} positions",
                    encoder.max_seq_len
                )));
            }
            embedded = encoder.forward(embedded, mask.clone().equal_elem(0.0));
        }
        let [_, _, d_model] = embedded.dims();

        let summed = (embedded * mask.clone().reshape([batch, seq, 1]))
            .sum_dim(1)
            .reshape([batch, d_model]);
        let counts = mask.sum_dim(1).clamp_min(1.0);
        let pooled = summed / counts;

        Ok(GraphOutput::Tensor(self.projection.forward(pooled)))
    }

    fn output_dim(&self) -> usize {
        self.output_dim
    }
}
