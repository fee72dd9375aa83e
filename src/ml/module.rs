// ============================================================
// Layer 5 — Graph Module Wrapper
// ============================================================
// Wraps a loaded graph with an optional classification head:
//
//   inputs ──graph──▶ [batch, output_dim] ──head?──▶ [batch, nclasses]
//
// The head is a single Linear layer attached for fine-tuning.
// Graph and head are separate burn modules so each keeps its
// own record (and optimizer state in the trainer).
//
// Parameters are enumerated graph first, then head, in module
// declaration order. The order never changes between calls.

use std::path::{Path, PathBuf};

use burn::{
    module::{AutodiffModule, ModuleMapper, ModuleVisitor, Param, ParamId},
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::error::{self, Error};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::graph::{Graph, IdentityGraph, TextEncoderGraph};

// ─── Resettable ───────────────────────────────────────────────────────────────
/// Modules whose learned state can be cleared in place. Clearing
/// re-initialises every parameter under a fresh `ParamId`.
pub trait Resettable {
    fn reset(&mut self);
}

/// A copy of `module` that shares no parameter with it: clone, clear
/// the learned state, then copy `module`'s tensor values across while
/// the copy keeps its own parameter ids.
pub fn deep_copy<B: Backend, M: Module<B> + Resettable>(module: &M) -> M {
    let mut values = TensorCollector::default();
    module.visit(&mut values);

    let mut copy = module.clone();
    copy.reset();
    copy.map(&mut TensorRestorer { values: values.values.into_iter() })
}

#[derive(Default)]
struct TensorCollector {
    values: Vec<TensorData>,
}

impl<B: Backend> ModuleVisitor<B> for TensorCollector {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.values.push(tensor.to_data());
    }
}

/// Replaces float tensors, in visit order, with the collected values.
struct TensorRestorer {
    values: std::vec::IntoIter<TensorData>,
}

impl<B: Backend> ModuleMapper<B> for TensorRestorer {
    fn map_float<const D: usize>(&mut self, _id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        match self.values.next() {
            Some(data) => {
                let require_grad = tensor.is_require_grad();
                Tensor::from_data(data, &tensor.device()).set_require_grad(require_grad)
            }
            None => tensor,
        }
    }
}

impl Resettable for IdentityGraph {
    fn reset(&mut self) {}
}

impl<B: Backend> Resettable for TextEncoderGraph<B> {
    fn reset(&mut self) {
        let weight = self.embedding.weight.val();
        let device = weight.device();
        let [vocab_size, d_model] = weight.dims();

        self.embedding  = burn::nn::EmbeddingConfig::new(vocab_size, d_model).init(&device);
        self.encoder    = self.encoder.as_ref().map(|e| e.config().init(&device));
        self.projection = LinearConfig::new(d_model, self.output_dim).init(&device);
    }
}

// ─── Classification head ──────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct ClassificationHeadConfig {
    pub d_input:  usize,
    pub nclasses: usize,
}

impl ClassificationHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ClassificationHead<B> {
        ClassificationHead {
            linear:   LinearConfig::new(self.d_input, self.nclasses).init(device),
            nclasses: self.nclasses,
        }
    }

    /// Same uniform(-1/sqrt(d_input), 1/sqrt(d_input)) draw as `init`,
    /// taken from an RNG seeded with `seed` so that runs repeat.
    pub fn init_seeded<B: Backend>(&self, device: &B::Device, seed: u64) -> ClassificationHead<B> {
        let mut rng = StdRng::seed_from_u64(seed);
        let bound = 1.0 / (self.d_input.max(1) as f32).sqrt();
        let mut draw = |n: usize| (0..n).map(|_| rng.gen_range(-bound..bound)).collect::<Vec<f32>>();

        let weight = TensorData::new(draw(self.d_input * self.nclasses), [self.d_input, self.nclasses]);
        let bias   = TensorData::new(draw(self.nclasses), [self.nclasses]);

        let mut head = self.init(device);
        head.linear.weight = Param::from_tensor(Tensor::from_data(weight, device));
        head.linear.bias   = Some(Param::from_tensor(Tensor::from_data(bias, device)));
        head
    }
}

#[derive(Module, Debug)]
pub struct ClassificationHead<B: Backend> {
    pub linear:   Linear<B>,
    pub nclasses: usize,
}

impl<B: Backend> ClassificationHead<B> {
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.linear.forward(x)
    }
}

impl<B: Backend> Resettable for ClassificationHead<B> {
    fn reset(&mut self) {
        let weight = self.linear.weight.val();
        let device = weight.device();
        let [d_input, nclasses] = weight.dims();
        self.linear = LinearConfig::new(d_input, nclasses).init(&device);
    }
}

// ─── Parameter enumeration ────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterRef {
    pub id:    ParamId,
    pub shape: Vec<usize>,
}

#[derive(Default)]
struct ParamCollector {
    params: Vec<ParameterRef>,
}

impl<B: Backend> ModuleVisitor<B> for ParamCollector {
    fn visit_float<const D: usize>(&mut self, id: ParamId, tensor: &Tensor<B, D>) {
        self.params.push(ParameterRef { id, shape: tensor.dims().to_vec() });
    }
}

// ─── GraphModule ──────────────────────────────────────────────────────────────
pub struct GraphModule<B: Backend, G: Graph<B>> {
    pub(crate) graph: G,
    pub(crate) head:  Option<ClassificationHead<B>>,
    device:           B::Device,
}

impl<B: Backend, G: Graph<B>> Clone for GraphModule<B, G> {
    fn clone(&self) -> Self {
        Self {
            graph:  self.graph.clone(),
            head:   self.head.clone(),
            device: self.device.clone(),
        }
    }
}

impl<B: Backend, G: Graph<B>> GraphModule<B, G> {
    pub fn new(graph: G, device: B::Device) -> Self {
        Self { graph, head: None, device }
    }

    /// Attach a fresh linear head mapping the graph output to `nclasses`.
    /// A seed makes its initial weights reproducible.
    pub fn attach_head(&mut self, nclasses: usize, seed: Option<u64>) {
        let d_input = self.graph.output_dim();
        tracing::info!(d_input, nclasses, ?seed, "attaching classification head");
        let config = ClassificationHeadConfig::new(d_input, nclasses);
        self.head = Some(match seed {
            Some(seed) => config.init_seeded(&self.device, seed),
            None       => config.init(&self.device),
        });
    }

    pub fn head(&self) -> Option<&ClassificationHead<B>> {
        self.head.as_ref()
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Width of `forward`'s output.
    pub fn output_dim(&self) -> usize {
        self.head
            .as_ref()
            .map(|h| h.nclasses)
            .unwrap_or_else(|| self.graph.output_dim())
    }

    pub fn forward(&self, inputs: &[TensorData]) -> error::Result<Tensor<B, 2>> {
        let base = self.graph.forward(inputs, &self.device)?.into_tensor()?;
        Ok(match &self.head {
            Some(head) => head.forward(base),
            None       => base,
        })
    }

    pub fn parameters(&self) -> Vec<ParameterRef> {
        let mut collector = ParamCollector::default();
        self.graph.visit(&mut collector);
        if let Some(head) = &self.head {
            head.visit(&mut collector);
        }
        collector.params
    }

    /// Write `checkpoint-<tag>` (and `checkpoint-<tag>-head` when a head
    /// is attached) into `repository`. Other tags are left untouched.
    pub fn save_checkpoint(&self, repository: &Path, tag: &str) -> error::Result<Vec<PathBuf>> {
        let manager = CheckpointManager::new(repository);
        let mut written = vec![manager.save::<B, G>(&self.graph, tag, "")?];
        if let Some(head) = &self.head {
            written.push(manager.save::<B, ClassificationHead<B>>(head, tag, "-head")?);
        }
        tracing::info!(tag, files = written.len(), "checkpoint saved");
        Ok(written)
    }

    #[allow(dead_code)]
    pub fn load_checkpoint(&mut self, path: &Path) -> error::Result<()> {
        tracing::warn!(path = %path.display(), "checkpoint loading requested");
        Err(Error::Unimplemented("loading a checkpoint into a graph module"))
    }
}

impl<B, G> GraphModule<B, G>
where
    B: AutodiffBackend,
    G: Graph<B> + AutodiffModule<B>,
    G::InnerModule: Graph<B::InnerBackend>,
{
    /// The same weights on the inner backend, with no gradient tracking.
    pub fn valid(&self) -> GraphModule<B::InnerBackend, G::InnerModule> {
        GraphModule {
            graph:  self.graph.valid(),
            head:   self.head.valid(),
            device: self.device.clone(),
        }
    }
}
