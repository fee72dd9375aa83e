// ============================================================
// Layer 4 — Batch Sampler
// ============================================================
// Serves batches from an ExampleStore through an index
// permutation. Nothing is precomputed: each call picks the next
// indices and stacks the chosen examples slot by slot.
//
//   reset(shuffle, seed)  → permutation = 0..size, maybe shuffled
//   next_batch(n)         → pop up to n indices from the END of
//                           the permutation, stack, return
//   get_cached_batch()    → the whole store as one batch,
//                           in insertion order
//
// The store is only borrowed; sampling never mutates it.

use std::time::{SystemTime, UNIX_EPOCH};

use burn::tensor::TensorData;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::example::{stack, Batch, Example};
use crate::data::store::ExampleStore;
use crate::error::{Error, Result};

pub struct BatchSampler<'a> {
    store:   &'a ExampleStore,
    /// Remaining indices; consumed from the back
    indices: Vec<usize>,
}

impl<'a> BatchSampler<'a> {
    /// A sampler with an unshuffled full permutation.
    pub fn new(store: &'a ExampleStore) -> Self {
        Self {
            store,
            indices: (0..store.size()).collect(),
        }
    }

    /// Regenerate the permutation. Without a seed the shuffle is
    /// seeded from the clock and is not reproducible.
    pub fn reset(&mut self, shuffle: bool, seed: Option<u64>) {
        self.indices.clear();
        self.indices.extend(0..self.store.size());

        if shuffle {
            let seed = seed.unwrap_or_else(clock_seed);
            let mut rng = StdRng::seed_from_u64(seed);
            self.indices.shuffle(&mut rng);
        }
    }

    /// Indices not yet served in the current pass.
    pub fn remaining(&self) -> usize {
        self.indices.len()
    }

    /// Up to `requested` examples stacked into one batch, or `None`
    /// once the permutation is exhausted.
    pub fn next_batch(&mut self, requested: usize) -> Result<Option<Batch>> {
        let count = requested.min(self.indices.len());
        if count == 0 {
            return Ok(None);
        }

        let store    = self.store;
        let split_at = self.indices.len() - count;
        let picked = self.indices[split_at..]
            .iter()
            .rev()
            .map(|&i| {
                store
                    .get(i)
                    .ok_or_else(|| Error::InvalidInput(format!("index {i} outside the store")))
            })
            .collect::<Result<Vec<&Example>>>()?;
        self.indices.truncate(split_at);

        Ok(Some(assemble(&picked)?))
    }

    /// The entire store as a single batch in insertion order.
    pub fn get_cached_batch(&mut self) -> Result<Batch> {
        self.reset(false, None);
        // popping from the back of a reversed permutation yields 0, 1, 2, ...
        self.indices.reverse();
        self.next_batch(self.store.size())?
            .ok_or(Error::EmptyDataset("no data provided"))
    }

    /// Iterate the rest of the current pass at a fixed batch size.
    pub fn epoch(&mut self, batch_size: usize) -> Epoch<'_, 'a> {
        Epoch { sampler: self, batch_size }
    }
}

/// One pass over a sampler's remaining permutation.
pub struct Epoch<'s, 'a> {
    sampler:    &'s mut BatchSampler<'a>,
    batch_size: usize,
}

impl Iterator for Epoch<'_, '_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.sampler.next_batch(self.batch_size).transpose()
    }
}

// ─── Slot-wise stacking ───────────────────────────────────────────────────────
fn assemble(examples: &[&Example]) -> Result<Batch> {
    let data_slots = examples[0].inputs.len();
    let data = (0..data_slots)
        .map(|slot| {
            let column: Vec<&TensorData> = examples.iter().map(|e| &e.inputs[slot]).collect();
            stack(slot, &column)
        })
        .collect::<Result<Vec<_>>>()?;

    let target_slots = examples[0].targets.len();
    if let Some(odd) = examples.iter().find(|e| e.targets.len() != target_slots) {
        return Err(Error::ArityMismatch {
            what:     "target",
            expected: target_slots,
            found:    odd.targets.len(),
        });
    }
    let target = (0..target_slots)
        .map(|slot| {
            let column: Vec<&TensorData> = examples.iter().map(|e| &e.targets[slot]).collect();
            stack(slot, &column)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Batch { data, target })
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}
