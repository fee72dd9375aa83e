// ============================================================
// Layer 5 — Transformer Encoder
// ============================================================
// Self-attention stack run over embedded tokens when graph.json
// asks for encoder layers:
//
//   x [batch, seq, d_model] + position embedding
//     ──EncoderBlock × num_layers──▶ final LayerNorm
//
// Positions flagged in `mask_pad` (attention mask 0) are never
// attended to as keys.

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::gelu,
};

#[derive(Config, Debug)]
pub struct TransformerEncoderConfig {
    pub d_model:     usize,
    pub num_heads:   usize,
    pub num_layers:  usize,
    pub d_ff:        usize,
    pub max_seq_len: usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
}

impl TransformerEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TransformerEncoder<B> {
        let layers = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        TransformerEncoder {
            position_embedding: EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device),
            layers,
            final_norm:  LayerNormConfig::new(self.d_model).init(device),
            dropout:     DropoutConfig::new(self.dropout).init(),
            num_heads:   self.num_heads,
            d_ff:        self.d_ff,
            max_seq_len: self.max_seq_len,
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        EncoderBlock {
            self_attn,
            ffn_linear1: LinearConfig::new(self.d_model, self.d_ff).init(device),
            ffn_linear2: LinearConfig::new(self.d_ff, self.d_model).init(device),
            norm1:       LayerNormConfig::new(self.d_model).init(device),
            norm2:       LayerNormConfig::new(self.d_model).init(device),
            dropout:     DropoutConfig::new(self.dropout).init(),
        }
    }
}

/// Post-norm block: attention, residual, norm, GELU feed-forward, residual, norm.
#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn_input  = MhaInput::self_attn(x.clone()).mask_pad(mask_pad);
        let attn_output = self.self_attn.forward(attn_input).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));

        let ffn_out = self.ffn_linear2.forward(gelu(self.ffn_linear1.forward(x.clone())));
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct TransformerEncoder<B: Backend> {
    pub position_embedding: Embedding<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub final_norm:         LayerNorm<B>,
    pub dropout:            Dropout,
    pub num_heads:          usize,
    pub d_ff:               usize,
    pub max_seq_len:        usize,
}

impl<B: Backend> TransformerEncoder<B> {
    /// `x` is `[batch, seq, d_model]` with `seq <= max_seq_len`;
    /// `mask_pad` is `[batch, seq]`, true at padding.
    pub fn forward(&self, x: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let [batch, seq, _] = x.dims();

        let positions = Tensor::<B, 1, Int>::arange(0..seq as i64, &x.device())
            .unsqueeze::<2>()
            .expand([batch, seq]);
        let pos_emb = self.position_embedding.forward(positions);

        let mut x = self.dropout.forward(x + pos_emb);
        for layer in &self.layers {
            x = layer.forward(x, mask_pad.clone());
        }
        self.final_norm.forward(x)
    }

    /// The configuration this encoder was built from.
    pub fn config(&self) -> TransformerEncoderConfig {
        let [_, d_model] = self.position_embedding.weight.val().dims();
        TransformerEncoderConfig::new(d_model, self.num_heads, self.layers.len(), self.d_ff, self.max_seq_len)
            .with_dropout(self.dropout.prob)
    }
}
