// ============================================================
// Layer 4 — Example Store
// ============================================================
// Append-only, in-memory collection of pre-tensorised examples.
//
// Examples are reference counted: `split` hands out a new store
// over a contiguous sub-range without copying any tensor bytes.
// Whoever holds the store owns it; a training session takes the
// store by value.

use std::sync::Arc;

use burn::tensor::TensorData;

use crate::data::example::Example;
use crate::error::{Error, Result};

/// Ordered sequence of examples sharing one input arity.
#[derive(Debug, Clone, Default)]
pub struct ExampleStore {
    examples: Vec<Arc<Example>>,
    /// Established by the first insertion
    arity: Option<usize>,
}

impl ExampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one example. Only the input arity is validated here;
    /// tensor shapes are checked when a batch is assembled.
    pub fn add_example(&mut self, inputs: Vec<TensorData>, targets: Vec<TensorData>) -> Result<()> {
        if inputs.is_empty() {
            return Err(Error::InvalidInput("an example needs at least one input tensor".into()));
        }

        match self.arity {
            Some(expected) if expected != inputs.len() => {
                return Err(Error::ArityMismatch {
                    what: "input",
                    expected,
                    found: inputs.len(),
                });
            }
            Some(_) => {}
            None => self.arity = Some(inputs.len()),
        }

        self.examples.push(Arc::new(Example::new(inputs, targets)));
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Example> {
        self.examples.get(index).map(Arc::as_ref)
    }

    /// New store over the examples whose index lies in
    /// `[start_fraction * size, stop_fraction * size)`.
    pub fn split(&self, start_fraction: f64, stop_fraction: f64) -> Result<ExampleStore> {
        let in_unit = |f: f64| (0.0..=1.0).contains(&f);
        if !in_unit(start_fraction) || !in_unit(stop_fraction) || start_fraction > stop_fraction {
            return Err(Error::InvalidRange {
                start: start_fraction,
                stop:  stop_fraction,
            });
        }

        let start = boundary(start_fraction, self.size());
        let stop  = boundary(stop_fraction, self.size());

        let examples = self.examples[start..stop].to_vec();
        let arity    = if examples.is_empty() { None } else { self.arity };
        Ok(ExampleStore { examples, arity })
    }
}

/// First index at or above `fraction * len`.
/// Products within 1e-9 of an integer snap to it so that
/// 0.7 * 10 lands on 7 rather than 8.
fn boundary(fraction: f64, len: usize) -> usize {
    let exact   = fraction * len as f64;
    let nearest = exact.round();
    let index   = if (exact - nearest).abs() < 1e-9 { nearest } else { exact.ceil() };
    (index as usize).min(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_of(n: usize) -> ExampleStore {
        let mut store = ExampleStore::new();
        for i in 0..n {
            store
                .add_example(
                    vec![TensorData::new(vec![i as f32], [1])],
                    vec![TensorData::new(vec![i as i64], [1])],
                )
                .unwrap();
        }
        store
    }

    fn ids(store: &ExampleStore) -> Vec<i64> {
        (0..store.size())
            .map(|i| store.get(i).unwrap().targets[0].iter::<i64>().next().unwrap())
            .collect()
    }

    #[test]
    fn test_first_insertion_sets_arity() {
        let mut store = ExampleStore::new();
        let t = || TensorData::new(vec![0.0f32], [1]);

        store.add_example(vec![t(), t()], Vec::new()).unwrap();

        let err = store.add_example(vec![t()], Vec::new()).unwrap_err();
        assert!(matches!(err, Error::ArityMismatch { expected: 2, found: 1, .. }));
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_empty_inputs_rejected() {
        let mut store = ExampleStore::new();
        assert!(store.add_example(Vec::new(), Vec::new()).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_split_is_complete_and_disjoint() {
        for n in [0, 1, 5, 7, 10, 33] {
            let store = store_of(n);
            let train = store.split(0.0, 0.8).unwrap();
            let test  = store.split(0.8, 1.0).unwrap();

            assert_eq!(train.size() + test.size(), n);

            let train_ids = ids(&train);
            for id in ids(&test) {
                assert!(!train_ids.contains(&id));
            }
        }
    }

    #[test]
    fn test_split_keeps_contiguous_order() {
        let store = store_of(10);
        assert_eq!(ids(&store.split(0.3, 0.7).unwrap()), vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_split_shares_storage() {
        let store = store_of(4);
        let half  = store.split(0.0, 0.5).unwrap();
        assert!(Arc::ptr_eq(&store.examples[0], &half.examples[0]));
    }

    #[test]
    fn test_split_rejects_bad_fractions() {
        let store = store_of(4);
        assert!(matches!(store.split(0.6, 0.2), Err(Error::InvalidRange { .. })));
        assert!(matches!(store.split(-0.1, 0.5), Err(Error::InvalidRange { .. })));
        assert!(matches!(store.split(0.0, 1.5), Err(Error::InvalidRange { .. })));
        assert!(matches!(store.split(f64::NAN, 1.0), Err(Error::InvalidRange { .. })));
    }
}
