// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Partitions an ExampleStore by proportion:
//   train      = [0, train_fraction)
//   validation = [train_fraction, 1)
//
// The two halves share the parent's example storage and never
// overlap. The split is positional; shuffle upstream when the
// input order is meaningful.

use crate::data::store::ExampleStore;
use crate::error::Result;

/// Split `store` into (train, validation) by `train_fraction`.
pub fn split_train_val(store: &ExampleStore, train_fraction: f64) -> Result<(ExampleStore, ExampleStore)> {
    let train = store.split(0.0, train_fraction)?;
    let val   = store.split(train_fraction, 1.0)?;

    tracing::debug!(
        train = train.size(),
        validation = val.size(),
        "dataset split"
    );

    Ok((train, val))
}

/// Split off a held-out fraction for evaluation.
/// A fraction of zero keeps everything for training.
pub fn hold_out(store: ExampleStore, test_fraction: f64) -> Result<(ExampleStore, ExampleStore)> {
    if test_fraction <= 0.0 {
        return Ok((store, ExampleStore::new()));
    }
    split_train_val(&store, 1.0 - test_fraction)
}
