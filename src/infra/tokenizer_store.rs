// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Keeps `tokenizer.json` in the model repository.
//
// `load_or_build` loads an existing file, or derives a
// word-level vocabulary from a corpus and writes it in the
// HuggingFace tokenizer format. Special token ids follow the
// BERT convention:
//   [PAD]=0  [UNK]=1  [CLS]=101  [SEP]=102  [MASK]=103
// Corpus words are numbered from 104 by descending frequency.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use tokenizers::Tokenizer;

use crate::error::{Error, Result};

pub const TOKENIZER_FILE: &str = "tokenizer.json";

const SPECIAL_TOKENS: [(&str, u32); 5] = [
    ("[PAD]", 0),
    ("[UNK]", 1),
    ("[CLS]", 101),
    ("[SEP]", 102),
    ("[MASK]", 103),
];
const FIRST_WORD_ID: u32 = 104;

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Load the stored tokenizer, or build one from `texts`.
    pub fn load_or_build(&self, texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        if self.exists() {
            tracing::info!(path = %self.path().display(), "loading tokenizer");
            self.load()
        } else {
            tracing::info!(vocab_size, "building word-level tokenizer");
            self.build_and_save(texts, vocab_size)
        }
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.path();
        Tokenizer::from_file(&path)
            .map_err(|e| Error::Tokenizer(format!("cannot load '{}': {e}", path.display())))
    }

    fn build_and_save(&self, texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        fs::create_dir_all(&self.dir)?;

        let mut vocab = serde_json::Map::new();
        for (token, id) in SPECIAL_TOKENS {
            vocab.insert(token.to_string(), json!(id));
        }
        let words = most_frequent_words(texts, vocab_size.saturating_sub(SPECIAL_TOKENS.len()));
        for (offset, word) in words.iter().enumerate() {
            vocab.insert(word.clone(), json!(FIRST_WORD_ID + offset as u32));
        }

        let added_tokens: Vec<_> = SPECIAL_TOKENS
            .iter()
            .map(|(token, id)| {
                json!({
                    "id": id, "content": token, "single_word": false,
                    "lstrip": false, "rstrip": false, "normalized": false, "special": true
                })
            })
            .collect();

        let tokenizer_json = json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": null,
                "lowercase": true
            },
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": { "type": "WordLevel", "vocab": vocab, "unk_token": "[UNK]" }
        });

        let path = self.path();
        fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)?;
        tracing::info!(words = words.len(), path = %path.display(), "tokenizer saved");

        self.load()
    }
}

/// Lowercased words trimmed of edge punctuation, most frequent
/// first, ties broken alphabetically so builds are reproducible.
fn most_frequent_words(texts: &[String], limit: usize) -> Vec<String> {
    let mut freq: HashMap<String, usize> = HashMap::new();
    for text in texts {
        for word in text.split_whitespace() {
            let w = word.to_lowercase();
            let w = w.trim_matches(|c: char| !c.is_alphanumeric());
            if !w.is_empty() && SPECIAL_TOKENS.iter().all(|(t, _)| !t.eq_ignore_ascii_case(w)) {
                *freq.entry(w.to_string()).or_insert(0) += 1;
            }
        }
    }

    let mut words: Vec<(String, usize)> = freq.into_iter().collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    words.truncate(limit);
    words.into_iter().map(|(w, _)| w).collect()
}
