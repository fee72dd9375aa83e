// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Four subcommands over one model repository directory:
//
//   vocab   — build tokenizer.json from a text corpus
//   init    — write graph.json + randomly initialised graph.mpk
//   train   — run a training request, print the JSON response
//   predict — run a prediction request, print the JSON response

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a word-level tokenizer from a corpus (one text per line)
    Vocab(VocabArgs),

    /// Create a text encoder graph in the repository
    Init(InitArgs),

    /// Train on the items of a request file
    Train(RequestArgs),

    /// Predict (or measure) on the items of a request file
    Predict(RequestArgs),
}

#[derive(Args, Debug)]
pub struct VocabArgs {
    /// Model repository directory
    #[arg(long, default_value = "model")]
    pub repo: PathBuf,

    /// Corpus file, one text per line
    #[arg(long)]
    pub corpus: PathBuf,

    /// Maximum vocabulary size including special tokens
    #[arg(long, default_value_t = 8000)]
    pub vocab_size: usize,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    #[arg(long, default_value = "model")]
    pub repo: PathBuf,

    /// Embedding table size; read from tokenizer.json when omitted
    #[arg(long)]
    pub vocab_size: Option<usize>,

    #[arg(long, default_value_t = 128)]
    pub d_model: usize,

    /// Width of the graph output
    #[arg(long, default_value_t = 64)]
    pub output_dim: usize,

    /// Self-attention layers; 0 pools the raw embeddings
    #[arg(long, default_value_t = 0)]
    pub num_layers: usize,

    #[arg(long, default_value_t = 4)]
    pub num_heads: usize,

    #[arg(long, default_value_t = 256)]
    pub d_ff: usize,

    /// Longest sequence the encoder accepts
    #[arg(long, default_value_t = 512)]
    pub max_seq_len: usize,
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    #[arg(long, default_value = "model")]
    pub repo: PathBuf,

    /// JSON request: { "parameters": {...}, "data": [...] }
    #[arg(long)]
    pub request: PathBuf,

    /// Shape of the request's data items
    #[arg(long, value_enum, default_value_t = InputFormat::Text)]
    pub input: InputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputFormat {
    /// { id, text, label? }
    Text,
    /// { id, width, height, bgr, label? }
    Image,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_request_defaults() {
        let cli = Cli::try_parse_from(["graph-serve", "train", "--request", "req.json"]).unwrap();
        match cli.command {
            Commands::Train(args) => {
                assert_eq!(args.repo, PathBuf::from("model"));
                assert_eq!(args.input, InputFormat::Text);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_image_input_flag() {
        let cli = Cli::try_parse_from(["graph-serve", "predict", "--request", "r.json", "--input", "image"]).unwrap();
        assert!(matches!(cli.command, Commands::Predict(RequestArgs { input: InputFormat::Image, .. })));
    }

    #[test]
    fn test_init_encoder_flags() {
        let cli = Cli::try_parse_from(["graph-serve", "init", "--num-layers", "2", "--num-heads", "8"]).unwrap();
        match cli.command {
            Commands::Init(args) => {
                assert_eq!((args.num_layers, args.num_heads, args.d_ff), (2, 8, 256));
                assert_eq!(args.vocab_size, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_vocab_requires_corpus() {
        assert!(Cli::try_parse_from(["graph-serve", "vocab"]).is_err());
    }
}
