// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes each subcommand to the
// lower layers. Library errors from a request are printed as a
// failure response (status code + message) before exiting
// with an error.

pub mod commands;

use std::fs;

use anyhow::{bail, Context, Result};
use clap::Parser;
use commands::{Commands, InitArgs, InputFormat, RequestArgs, VocabArgs};

use crate::application::{output::SupervisedOutput, service::Service};
use crate::data::input::{ImageInputConn, InputKind, TextInputConn};
use crate::domain::request::ApiRequest;
use crate::domain::response::Response;
use crate::infra::{model_repository::ModelRepository, tokenizer_store::TokenizerStore};
use crate::ml::graph::TextEncoderConfig;

#[cfg(not(feature = "wgpu"))]
type ServiceBackend = burn::backend::Autodiff<burn::backend::NdArray>;
#[cfg(feature = "wgpu")]
type ServiceBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

#[derive(Parser, Debug)]
#[command(
    name = "graph-serve",
    version,
    about = "Train and query pre-built burn graphs through JSON requests."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Vocab(args)   => run_vocab(args),
            Commands::Init(args)    => run_init(args),
            Commands::Train(args)   => run_request(args, true),
            Commands::Predict(args) => run_request(args, false),
        }
    }
}

fn run_vocab(args: VocabArgs) -> Result<()> {
    let corpus = fs::read_to_string(&args.corpus)
        .with_context(|| format!("cannot read corpus '{}'", args.corpus.display()))?;
    let texts: Vec<String> = corpus
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect();

    let store = TokenizerStore::new(&args.repo);
    let tokenizer = store.load_or_build(&texts, args.vocab_size)?;
    println!(
        "Tokenizer with {} tokens at '{}'",
        tokenizer.get_vocab_size(true),
        store.path().display()
    );
    Ok(())
}

fn run_init(args: InitArgs) -> Result<()> {
    let repo = ModelRepository::open(&args.repo)?;

    let vocab_size = match args.vocab_size {
        Some(n) => n,
        None => {
            let tokenizer = repo
                .tokenizer_store()
                .load()
                .context("no --vocab-size given and no tokenizer.json to read it from")?;
            // ids are sparse around the special tokens; size by the largest one
            tokenizer.get_vocab(true).values().max().map_or(0, |&id| id as usize + 1)
        }
    };

    let config = TextEncoderConfig::new(vocab_size, args.d_model, args.output_dim)
        .with_num_layers(args.num_layers)
        .with_num_heads(args.num_heads)
        .with_d_ff(args.d_ff)
        .with_max_seq_len(args.max_seq_len);
    let device = Default::default();
    repo.init_graph::<ServiceBackend>(&config, &device)?;
    println!("Graph initialised in '{}' (vocab {vocab_size})", args.repo.display());
    Ok(())
}

fn run_request(args: RequestArgs, train: bool) -> Result<()> {
    let text = fs::read_to_string(&args.request)
        .with_context(|| format!("cannot read request '{}'", args.request.display()))?;

    let response = match serve(&args, &text, train) {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "request failed");
            Response::failure(&e)
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    if !response.is_success() {
        bail!("request failed with status {}", response.status.code);
    }
    Ok(())
}

fn serve(args: &RequestArgs, text: &str, train: bool) -> crate::error::Result<Response> {
    let request = ApiRequest::from_json(text)?;
    let repo = ModelRepository::open(&args.repo)?;

    let input = match args.input {
        InputFormat::Text  => InputKind::Text(TextInputConn::new(repo.tokenizer_store().load()?)?),
        InputFormat::Image => InputKind::Image(ImageInputConn),
    };

    let mut service: Service<ServiceBackend, _, _, _> =
        Service::new(input, SupervisedOutput, repo, Default::default());
    service.init(&request.parameters.mllib)?;

    if train {
        service.train(&request)
    } else {
        service.predict(&request)
    }
}
