// ============================================================
// Layer 5 — Evaluation
// ============================================================
// Accuracy of a module over a whole store:
//   fresh unshuffled sampler → batches → softmax → argmax
//   → compare with the first target slot
//
//   acc = correct / store.size()

use burn::{prelude::*, tensor::activation::softmax};

use crate::data::example::labels_of;
use crate::data::sampler::BatchSampler;
use crate::data::store::ExampleStore;
use crate::domain::response::Measures;
use crate::error::{Error, Result};
use crate::ml::graph::Graph;
use crate::ml::module::GraphModule;

pub const ACCURACY: &str = "acc";

pub fn evaluate<B: Backend, G: Graph<B>>(
    module:     &GraphModule<B, G>,
    store:      &ExampleStore,
    batch_size: usize,
) -> Result<Measures> {
    if store.is_empty() {
        return Err(Error::EmptyDataset("nothing to evaluate"));
    }

    let mut sampler = BatchSampler::new(store);
    let mut correct = 0usize;

    for batch in sampler.epoch(batch_size.max(1)) {
        let batch  = batch?;
        let labels = labels_of(batch.first_target()?);

        let probs = softmax(module.forward(&batch.data)?, 1);
        let predicted: Vec<i64> = probs.argmax(1).into_data().iter::<i64>().collect();

        correct += predicted.iter().zip(&labels).filter(|(p, l)| p == l).count();
    }

    let acc = correct as f64 / store.size() as f64;
    tracing::debug!(correct, total = store.size(), acc, "evaluation done");

    let mut measures = Measures::new();
    measures.insert(ACCURACY.to_string(), acc);
    Ok(measures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::graph::IdentityGraph;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    /// One-hot features whose argmax is the label.
    fn separable_store(labels: &[i64], width: usize) -> ExampleStore {
        let mut store = ExampleStore::new();
        for &label in labels {
            let mut features = vec![0.0f32; width];
            features[label as usize] = 5.0;
            store
                .add_example(vec![TensorData::new(features, [width])], vec![TensorData::new(vec![label], [1])])
                .unwrap();
        }
        store
    }

    #[test]
    fn test_identity_graph_scores_perfectly() {
        let module = GraphModule::<TestBackend, _>::new(IdentityGraph::new(4), Default::default());
        let store = separable_store(&[0, 1, 2, 3], 4);

        let measures = evaluate(&module, &store, 1).unwrap();
        assert_eq!(measures[ACCURACY], 1.0);

        // batch size does not change the result
        assert_eq!(evaluate(&module, &store, 3).unwrap()[ACCURACY], 1.0);
    }

    #[test]
    fn test_wrong_labels_lower_accuracy() {
        let module = GraphModule::<TestBackend, _>::new(IdentityGraph::new(2), Default::default());
        let mut store = separable_store(&[0, 1], 2);
        store
            .add_example(vec![TensorData::new(vec![5.0f32, 0.0], [2])], vec![TensorData::new(vec![1i64], [1])])
            .unwrap();
        store
            .add_example(vec![TensorData::new(vec![0.0f32, 5.0], [2])], vec![TensorData::new(vec![0i64], [1])])
            .unwrap();

        assert_eq!(evaluate(&module, &store, 2).unwrap()[ACCURACY], 0.5);
    }

    #[test]
    fn test_unlabelled_store_fails() {
        let module = GraphModule::<TestBackend, _>::new(IdentityGraph::new(2), Default::default());
        let mut store = ExampleStore::new();
        store.add_example(vec![TensorData::new(vec![1.0f32, 0.0], [2])], vec![]).unwrap();

        assert!(matches!(evaluate(&module, &store, 1), Err(Error::MissingLabel)));
    }

    #[test]
    fn test_empty_store_fails() {
        let module = GraphModule::<TestBackend, _>::new(IdentityGraph::new(2), Default::default());
        assert!(matches!(evaluate(&module, &ExampleStore::new(), 1), Err(Error::EmptyDataset(_))));
    }
}
