// ============================================================
// Layer 6 — Model Repository
// ============================================================
// A directory holding one model:
//
//   graph.json      — TextEncoderConfig (burn Config, JSON);
//                     num_layers > 0 selects the transformer encoder
//   graph.mpk       — graph weights (CompactRecorder)
//   corresp.txt     — optional "<index> <label>" lines
//   tokenizer.json  — optional, used by the text connector
//   checkpoint-*    — written during training
//   metrics.csv     — written during training

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::error::{Error, Result};
use crate::infra::tokenizer_store::TokenizerStore;
use crate::ml::graph::{ModelAccessor, TextEncoderConfig, TextEncoderGraph};

pub const GRAPH_CONFIG_FILE: &str = "graph.json";
pub const GRAPH_WEIGHTS:     &str = "graph";
pub const CORRESP_FILE:      &str = "corresp.txt";

pub struct ModelRepository {
    dir:    PathBuf,
    labels: BTreeMap<usize, String>,
}

impl ModelRepository {
    /// Open a repository, reading `corresp.txt` when present.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let corresp = dir.join(CORRESP_FILE);
        let labels = if corresp.exists() {
            parse_corresp(&fs::read_to_string(&corresp)?)?
        } else {
            BTreeMap::new()
        };
        tracing::debug!(dir = %dir.display(), labels = labels.len(), "model repository opened");
        Ok(Self { dir, labels })
    }

    /// Write `graph.json` and a freshly initialised `graph.mpk`.
    pub fn init_graph<B: Backend>(&self, config: &TextEncoderConfig, device: &B::Device) -> Result<PathBuf> {
        config.check()?;
        fs::create_dir_all(&self.dir)?;
        config.save(self.dir.join(GRAPH_CONFIG_FILE))?;

        let graph = config.init::<B>(device);
        let stem  = self.dir.join(GRAPH_WEIGHTS);
        CompactRecorder::new()
            .record(graph.into_record(), stem.clone())
            .map_err(|e| Error::Checkpoint(format!("cannot write '{}': {e}", stem.display())))?;

        tracing::info!(dir = %self.dir.display(), ?config, "graph initialised");
        Ok(stem)
    }

    pub fn tokenizer_store(&self) -> TokenizerStore {
        TokenizerStore::new(&self.dir)
    }
}

impl<B: Backend> ModelAccessor<B> for ModelRepository {
    type Graph = TextEncoderGraph<B>;

    fn load_graph(&self, device: &B::Device) -> Result<TextEncoderGraph<B>> {
        let config_path = self.dir.join(GRAPH_CONFIG_FILE);
        let config = TextEncoderConfig::load(&config_path)
            .map_err(|e| Error::Configuration(format!("cannot read '{}': {e}", config_path.display())))?;
        config.check()?;

        let stem = self.dir.join(GRAPH_WEIGHTS);
        let record = CompactRecorder::new()
            .load(stem.clone(), device)
            .map_err(|e| Error::Checkpoint(format!("cannot load '{}': {e}", stem.display())))?;

        tracing::info!(
            vocab_size = config.vocab_size,
            d_model    = config.d_model,
            output_dim = config.output_dim,
            layers     = config.num_layers,
            "graph loaded"
        );
        Ok(config.init::<B>(device).load_record(record))
    }

    fn repository(&self) -> &Path {
        &self.dir
    }

    fn label(&self, index: usize) -> String {
        self.labels.get(&index).cloned().unwrap_or_else(|| index.to_string())
    }
}

fn parse_corresp(text: &str) -> Result<BTreeMap<usize, String>> {
    let mut labels = BTreeMap::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (index, label) = line
            .split_once(char::is_whitespace)
            .and_then(|(i, l)| i.parse::<usize>().ok().map(|i| (i, l.trim())))
            .ok_or_else(|| Error::Configuration(format!("{CORRESP_FILE}:{}: expected '<index> <label>'", lineno + 1)))?;
        labels.insert(index, label.to_string());
    }
    Ok(labels)
}
