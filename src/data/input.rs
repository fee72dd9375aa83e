// ============================================================
// Layer 4 — Input Connectors
// ============================================================
// Two request shapes feed the same ExampleStore layout:
//
//   Image { id, width, height, bgr: [u8], label? }
//     → input  slot 0: f32 [3, height, width], RGB, scaled to [0, 1]
//     → target slot 0: i64 [1]                (when labelled)
//
//   Text  { id, text, label? }
//     → input  slots:  ids, token types, attention mask; each i64 [sequence]
//                      ids = [CLS] tokens... [SEP] [PAD]...
//     → target slot 0: i64 [1]                (when labelled, label != -1)
//
// Decoding images and tokenising text are done by external
// components; this layer only arranges their output as tensors.

use burn::tensor::TensorData;
use serde::Deserialize;
use serde_json::Value;
use tokenizers::Tokenizer;

use crate::data::preprocessor::Preprocessor;
use crate::data::store::ExampleStore;
use crate::domain::request::ApiRequest;
use crate::domain::traits::{InputTransform, TransformedInput};
use crate::error::{Error, Result};

/// The connector selected for a service.
pub enum InputKind {
    Image(ImageInputConn),
    Text(TextInputConn),
}

impl InputTransform for InputKind {
    fn transform(&self, request: &ApiRequest) -> Result<TransformedInput> {
        let input = match self {
            InputKind::Image(conn) => conn.transform(request)?,
            InputKind::Text(conn)  => conn.transform(request)?,
        };
        tracing::debug!(examples = input.store.size(), "input transformed");
        Ok(input)
    }
}

fn parse_items<T: for<'de> Deserialize<'de>>(data: &[Value]) -> Result<Vec<T>> {
    data.iter()
        .map(|v| {
            serde_json::from_value(v.clone()).map_err(|e| Error::Configuration(format!("data item: {e}")))
        })
        .collect()
}

/// Labels of -1 mark unlabelled entries.
fn target_for(label: Option<i64>) -> Vec<TensorData> {
    match label {
        Some(l) if l != -1 => vec![TensorData::new(vec![l], [1])],
        _ => Vec::new(),
    }
}

// ─── Image ────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Deserialize)]
pub struct ImageItem {
    pub id:     String,
    pub width:  usize,
    pub height: usize,
    /// Interleaved BGR bytes, row major
    pub bgr:    Vec<u8>,
    #[serde(default)]
    pub label:  Option<i64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageInputConn;

impl ImageInputConn {
    pub fn transform(&self, request: &ApiRequest) -> Result<TransformedInput> {
        let items: Vec<ImageItem> = parse_items(&request.data)?;

        let mut store = ExampleStore::new();
        let mut ids   = Vec::with_capacity(items.len());
        for item in items {
            store.add_example(vec![image_tensor(&item)?], target_for(item.label))?;
            ids.push(item.id);
        }
        Ok(TransformedInput { store, ids })
    }
}

/// BGR HWC bytes → RGB CHW floats in [0, 1].
fn image_tensor(item: &ImageItem) -> Result<TensorData> {
    let (w, h) = (item.width, item.height);
    let expected = w
        .checked_mul(h)
        .and_then(|n| n.checked_mul(3))
        .ok_or_else(|| Error::InvalidInput(format!("image '{}': {h}x{w} is too large", item.id)))?;
    if expected == 0 || item.bgr.len() != expected {
        return Err(Error::InvalidInput(format!(
            "image '{}': expected {}x{}x3 bytes, got {}",
            item.id,
            h,
            w,
            item.bgr.len()
        )));
    }

    let mut planes = vec![0.0f32; 3 * h * w];
    for (c, plane) in planes.chunks_mut(h * w).enumerate() {
        let source = 2 - c;
        for (px, value) in plane.iter_mut().enumerate() {
            *value = item.bgr[px * 3 + source] as f32 / 255.0;
        }
    }
    Ok(TensorData::new(planes, [3, h, w]))
}

// ─── Text ─────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Deserialize)]
pub struct TextItem {
    pub id:    String,
    pub text:  String,
    #[serde(default)]
    pub label: Option<i64>,
}

pub struct TextInputConn {
    tokenizer:    Tokenizer,
    preprocessor: Preprocessor,
    cls_id:       i64,
    sep_id:       i64,
}

impl TextInputConn {
    /// The tokenizer must define `[CLS]` and `[SEP]`.
    pub fn new(tokenizer: Tokenizer) -> Result<Self> {
        let special = |token: &str| {
            tokenizer
                .token_to_id(token)
                .map(i64::from)
                .ok_or_else(|| Error::Tokenizer(format!("vocabulary has no {token} token")))
        };
        let cls_id = special("[CLS]")?;
        let sep_id = special("[SEP]")?;

        Ok(Self {
            tokenizer,
            preprocessor: Preprocessor::new(),
            cls_id,
            sep_id,
        })
    }

    pub fn transform(&self, request: &ApiRequest) -> Result<TransformedInput> {
        let entries: Vec<TextItem> = parse_items(&request.data)?;
        let sequence = request.parameters.input.sequence;

        let mut store = ExampleStore::new();
        let ids = self.fill_store(&mut store, &entries, sequence)?;
        Ok(TransformedInput { store, ids })
    }

    /// Append one example per entry, in order, and return their ids.
    /// Only `entries` is read.
    pub fn fill_store(&self, store: &mut ExampleStore, entries: &[TextItem], sequence: usize) -> Result<Vec<String>> {
        if sequence < 2 {
            return Err(Error::Configuration("input.sequence must be at least 2".into()));
        }

        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries {
            let (tokens, mask) = self.encode(&entry.text, sequence)?;
            let token_types = vec![0i64; sequence];

            store.add_example(
                vec![
                    TensorData::new(tokens, [sequence]),
                    TensorData::new(token_types, [sequence]),
                    TensorData::new(mask, [sequence]),
                ],
                target_for(entry.label),
            )?;
            ids.push(entry.id.clone());
        }
        Ok(ids)
    }

    /// `[CLS] tokens [SEP]`, truncated and zero-padded to `sequence`,
    /// plus the matching attention mask.
    fn encode(&self, text: &str, sequence: usize) -> Result<(Vec<i64>, Vec<i64>)> {
        let clean = self.preprocessor.clean(text);
        let encoding = self
            .tokenizer
            .encode(clean.as_str(), false)
            .map_err(|e| Error::Tokenizer(e.to_string()))?;

        let body = sequence - 2;
        let mut tokens = Vec::with_capacity(sequence);
        tokens.push(self.cls_id);
        tokens.extend(encoding.get_ids().iter().take(body).map(|&id| i64::from(id)));
        tokens.push(self.sep_id);

        let mut mask = vec![1i64; tokens.len()];
        tokens.resize(sequence, 0);
        mask.resize(sequence, 0);
        Ok((tokens, mask))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::TokenizerStore;
    use serde_json::json;

    fn text_conn() -> (tempfile::TempDir, TextInputConn) {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        let tokenizer = store
            .load_or_build(&["the cat sat".to_string(), "a dog ran".to_string()], 64)
            .unwrap();
        (dir, TextInputConn::new(tokenizer).unwrap())
    }

    #[test]
    fn test_image_is_rgb_chw_scaled() {
        let conn = ImageInputConn;
        // one 1x2 image: pixel0 = (b=0, g=0, r=255), pixel1 = (b=255, g=0, r=0)
        let req = ApiRequest::from_value(json!({
            "data": [ { "id": "img", "width": 2, "height": 1, "bgr": [0, 0, 255, 255, 0, 0], "label": 1 } ]
        }))
        .unwrap();

        let out = conn.transform(&req).unwrap();
        let example = out.store.get(0).unwrap();
        assert_eq!(example.inputs[0].shape, vec![3, 1, 2]);

        let v: Vec<f32> = example.inputs[0].iter::<f32>().collect();
        // R plane, G plane, B plane
        assert_eq!(v, vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(example.targets[0].iter::<i64>().collect::<Vec<_>>(), vec![1]);
        assert_eq!(out.ids, vec!["img".to_string()]);
    }

    #[test]
    fn test_image_with_wrong_byte_count_fails() {
        let req = ApiRequest::from_value(json!({
            "data": [ { "id": "img", "width": 2, "height": 2, "bgr": [0, 0, 0] } ]
        }))
        .unwrap();
        assert!(matches!(ImageInputConn.transform(&req), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_image_with_overflowing_size_fails() {
        let req = ApiRequest::from_value(json!({
            "data": [ { "id": "huge", "width": 9223372036854775808u64, "height": 2, "bgr": [] } ]
        }))
        .unwrap();
        assert!(matches!(ImageInputConn.transform(&req), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_text_slots_are_padded_to_sequence() {
        let (_dir, conn) = text_conn();
        let req = ApiRequest::from_value(json!({
            "parameters": { "input": { "sequence": 8 } },
            "data": [ { "id": "t1", "text": "the  cat\tsat", "label": 2 } ]
        }))
        .unwrap();

        let out = conn.transform(&req).unwrap();
        let example = out.store.get(0).unwrap();
        assert_eq!(example.inputs.len(), 3);

        let tokens: Vec<i64> = example.inputs[0].iter::<i64>().collect();
        let mask: Vec<i64>   = example.inputs[2].iter::<i64>().collect();
        assert_eq!(tokens.len(), 8);
        assert_eq!(tokens[0], 101);
        assert_eq!(tokens[4], 102);
        assert_eq!(&tokens[5..], &[0, 0, 0]);
        assert_eq!(mask, vec![1, 1, 1, 1, 1, 0, 0, 0]);
        assert!(example.inputs[1].iter::<i64>().all(|t| t == 0));
    }

    #[test]
    fn test_long_text_keeps_final_separator() {
        let (_dir, conn) = text_conn();
        let (tokens, mask) = conn.encode("the cat sat the cat sat", 4).unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[3], 102);
        assert_eq!(mask, vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_unlabelled_text_has_no_target() {
        let (_dir, conn) = text_conn();
        let req = ApiRequest::from_value(json!({
            "data": [ { "id": "a", "text": "a dog" }, { "id": "b", "text": "a cat", "label": -1 } ]
        }))
        .unwrap();
        let out = conn.transform(&req).unwrap();
        assert!(out.store.get(0).unwrap().targets.is_empty());
        assert!(out.store.get(1).unwrap().targets.is_empty());
    }

    // The routine must read the entries it is given, not some wider
    // collection held by the connector: filling a held-out store from
    // a subset yields exactly that subset.
    #[test]
    fn test_fill_store_reads_only_given_entries() {
        let (_dir, conn) = text_conn();
        let entries: Vec<TextItem> = (0..5)
            .map(|i| TextItem { id: format!("e{i}"), text: "the cat".into(), label: Some(0) })
            .collect();

        let mut train = ExampleStore::new();
        let mut test  = ExampleStore::new();
        let train_ids = conn.fill_store(&mut train, &entries[..4], 6).unwrap();
        let test_ids  = conn.fill_store(&mut test, &entries[4..], 6).unwrap();

        assert_eq!(train.size(), 4);
        assert_eq!(test.size(), 1);
        assert_eq!(test_ids, vec!["e4".to_string()]);
        assert_eq!(train_ids.len(), 4);
    }
}
