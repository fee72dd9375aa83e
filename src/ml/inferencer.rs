// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Prediction over a whole store in one pass:
//   cached batch (every example, insertion order)
//   → forward → softmax over classes
//   → per row: classes sorted by probability, keep the best k
//
// Without `best` the records carry no categories at all; k is
// clamped to the number of classes.

use burn::{prelude::*, tensor::activation::softmax};

use crate::data::sampler::BatchSampler;
use crate::data::store::ExampleStore;
use crate::domain::response::PredictionRecord;
use crate::error::{Error, Result};
use crate::ml::graph::Graph;
use crate::ml::module::GraphModule;

pub fn predict<B: Backend, G: Graph<B>>(
    module: &GraphModule<B, G>,
    store:  &ExampleStore,
    uris:   &[String],
    best:   Option<usize>,
    label:  impl Fn(usize) -> String,
) -> Result<Vec<PredictionRecord>> {
    let batch = BatchSampler::new(store).get_cached_batch()?;
    let probs = softmax(module.forward(&batch.data)?, 1);
    tracing::debug!(examples = batch.len(), "prediction forward done");

    top_k(&probs.into_data(), uris, best, label)
}

/// Build one record per row of a `[rows, nclasses]` probability matrix.
pub fn top_k(
    probs: &TensorData,
    uris:  &[String],
    best:  Option<usize>,
    label: impl Fn(usize) -> String,
) -> Result<Vec<PredictionRecord>> {
    let [rows, nclasses] = match probs.shape.as_slice() {
        &[rows, nclasses] => [rows, nclasses],
        other => {
            return Err(Error::InvalidInput(format!("probabilities must be [rows, classes], got {other:?}")))
        }
    };
    if uris.len() != rows {
        return Err(Error::InvalidInput(format!("{} uris for {rows} predictions", uris.len())));
    }

    let k      = best.unwrap_or(0).min(nclasses);
    let values: Vec<f64> = probs.iter::<f64>().collect();

    let records = values
        .chunks(nclasses.max(1))
        .zip(uris)
        .map(|(row, uri)| {
            let mut order: Vec<usize> = (0..row.len()).collect();
            // stable: equal probabilities keep the lower class first
            order.sort_by(|&a, &b| row[b].total_cmp(&row[a]));
            order.truncate(k);

            PredictionRecord {
                uri:      uri.clone(),
                loss:     0.0,
                cats:     order.iter().map(|&c| label(c)).collect(),
                probs:    order.iter().map(|&c| row[c]).collect(),
                nclasses,
            }
        })
        .collect();
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::graph::IdentityGraph;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn uris(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("u{i}")).collect()
    }

    #[test]
    fn test_top_k_sorted_descending() {
        let probs = TensorData::new(vec![0.1f32, 0.7, 0.2, 0.5, 0.25, 0.25], [2, 3]);
        let records = top_k(&probs, &uris(2), Some(2), |c| format!("c{c}")).unwrap();

        assert_eq!(records[0].cats, vec!["c1", "c2"]);
        assert_eq!(records[1].cats, vec!["c0", "c1"]);
        assert!((records[0].probs[0] - 0.7).abs() < 1e-6);
        assert_eq!(records[0].nclasses, 3);
        assert_eq!(records[1].uri, "u1");
        assert_eq!(records[0].loss, 0.0);
    }

    #[test]
    fn test_best_is_clamped_and_optional() {
        let probs = TensorData::new(vec![0.4f32, 0.6], [1, 2]);

        let all = top_k(&probs, &uris(1), Some(10), |c| c.to_string()).unwrap();
        assert_eq!(all[0].cats.len(), 2);

        let none = top_k(&probs, &uris(1), None, |c| c.to_string()).unwrap();
        assert!(none[0].cats.is_empty());
        assert!(none[0].probs.is_empty());
    }

    #[test]
    fn test_uri_count_must_match_rows() {
        let probs = TensorData::new(vec![1.0f32], [1, 1]);
        assert!(top_k(&probs, &uris(2), Some(1), |c| c.to_string()).is_err());
    }

    #[test]
    fn test_predict_keeps_insertion_order() {
        let module = GraphModule::<TestBackend, _>::new(IdentityGraph::new(2), Default::default());
        let mut store = ExampleStore::new();
        store.add_example(vec![TensorData::new(vec![3.0f32, 0.0], [2])], vec![]).unwrap();
        store.add_example(vec![TensorData::new(vec![0.0f32, 3.0], [2])], vec![]).unwrap();

        let records = predict(&module, &store, &uris(2), Some(1), |c| ["neg", "pos"][c].to_string()).unwrap();
        assert_eq!(records[0].uri, "u0");
        assert_eq!(records[0].cats, vec!["neg"]);
        assert_eq!(records[1].cats, vec!["pos"]);

        let sum: f64 = predict(&module, &store, &uris(2), Some(2), |c| c.to_string()).unwrap()[0]
            .probs
            .iter()
            .sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_predict_on_empty_store_fails() {
        let module = GraphModule::<TestBackend, _>::new(IdentityGraph::new(2), Default::default());
        let result = predict(&module, &ExampleStore::new(), &[], None, |c| c.to_string());
        assert!(matches!(result, Err(Error::EmptyDataset(_))));
    }
}
