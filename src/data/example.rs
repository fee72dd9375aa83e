// ============================================================
// Layer 4 — Examples and Batches
// ============================================================
// An Example is one pre-tensorised unit of data:
//   inputs  — ordered tensor slots fed to the graph (never empty)
//   targets — ordered label slots (empty for inference-only data)
//
// Tensors live on the host as burn `TensorData`, so one example
// can mix ranks and dtypes (token ids next to pixel planes).
// They are moved to the device right before each forward call.
//
// A Batch stacks slot i of every selected example along a new
// leading dimension:
//   3 examples × input slot [4]  →  batch data slot [3, 4]

use burn::tensor::{DType, Element, TensorData};

use crate::error::{Error, Result};

/// One immutable (inputs, targets) tuple.
#[derive(Debug, Clone)]
pub struct Example {
    pub inputs:  Vec<TensorData>,
    pub targets: Vec<TensorData>,
}

impl Example {
    pub fn new(inputs: Vec<TensorData>, targets: Vec<TensorData>) -> Self {
        Self { inputs, targets }
    }
}

/// Stacked tensors for one forward/backward pass.
#[derive(Debug, Clone)]
pub struct Batch {
    pub data:   Vec<TensorData>,
    pub target: Vec<TensorData>,
}

impl Batch {
    /// Number of examples stacked into this batch.
    pub fn len(&self) -> usize {
        self.data.first().map(|t| t.shape[0]).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The first target slot, required by training and evaluation.
    pub fn first_target(&self) -> Result<&TensorData> {
        self.target.first().ok_or(Error::MissingLabel)
    }
}

/// Read a label tensor of shape [batch] or [batch, 1] as class indices.
pub fn labels_of(target: &TensorData) -> Vec<i64> {
    target.iter::<i64>().collect()
}

/// Stack same-shaped tensors along a new leading dimension.
///
/// `slot` is only used for error reporting.
pub fn stack(slot: usize, items: &[&TensorData]) -> Result<TensorData> {
    let first = items
        .first()
        .ok_or(Error::EmptyDataset("nothing to stack"))?;

    for item in &items[1..] {
        if item.shape != first.shape || item.dtype != first.dtype {
            return Err(Error::ShapeMismatch {
                slot,
                expected: describe(first),
                found:    describe(item),
            });
        }
    }

    let mut shape = Vec::with_capacity(first.shape.len() + 1);
    shape.push(items.len());
    shape.extend_from_slice(&first.shape);

    let stacked = match first.dtype {
        DType::F64  => stack_as::<f64>(items, shape),
        DType::I64  => stack_as::<i64>(items, shape),
        DType::I32  => stack_as::<i32>(items, shape),
        DType::U8   => stack_as::<u8>(items, shape),
        DType::Bool => stack_as::<bool>(items, shape),
        _           => stack_as::<f32>(items, shape),
    };
    Ok(stacked)
}

fn stack_as<E: Element>(items: &[&TensorData], shape: Vec<usize>) -> TensorData {
    let mut values: Vec<E> = Vec::with_capacity(shape.iter().product());
    for item in items {
        values.extend(item.iter::<E>());
    }
    TensorData::new(values, shape)
}

fn describe(data: &TensorData) -> String {
    format!("{:?}{:?}", data.dtype, data.shape)
}
