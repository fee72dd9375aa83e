// ============================================================
// Layer 2 — Service
// ============================================================
// Ties an input connector, an output formatter and a model
// repository to one GraphModule:
//
//   init(mllib)     → seed the backend, load the graph, attach a
//                     head when fine-tuning with nclasses
//   train(request)  → transform → hold-out split → Controller
//                     → measures + measure history
//   predict(request)→ transform → evaluation (when measures are
//                     requested) or top-k prediction records
//
// The service owns the module; training updates it in place and
// later predictions see the trained weights.

use burn::{module::AutodiffModule, tensor::backend::AutodiffBackend};

use crate::data::splitter::hold_out;
use crate::domain::request::{ApiRequest, MllibParams};
use crate::domain::response::Response;
use crate::domain::traits::{InputTransform, OutputFormatter};
use crate::error::{Error, Result};
use crate::ml::evaluator::{evaluate, ACCURACY};
use crate::ml::graph::{Graph, ModelAccessor};
use crate::ml::inferencer::predict;
use crate::ml::module::GraphModule;
use crate::ml::trainer::{Controller, TrainConfig};

pub struct Service<B, I, O, M>
where
    B: AutodiffBackend,
    M: ModelAccessor<B>,
{
    input:    I,
    output:   O,
    model:    M,
    device:   B::Device,
    module:   Option<GraphModule<B, M::Graph>>,
    nclasses: Option<usize>,
}

impl<B, I, O, M> Service<B, I, O, M>
where
    B: AutodiffBackend,
    I: InputTransform,
    O: OutputFormatter,
    M: ModelAccessor<B>,
    M::Graph: AutodiffModule<B>,
    <M::Graph as AutodiffModule<B>>::InnerModule: Graph<B::InnerBackend>,
{
    pub fn new(input: I, output: O, model: M, device: B::Device) -> Self {
        Self {
            input,
            output,
            model,
            device,
            module:   None,
            nclasses: None,
        }
    }

    pub fn init(&mut self, mllib: &MllibParams) -> Result<()> {
        if mllib.gpu {
            tracing::warn!("mllib.gpu is set; the device follows the compiled backend");
        }

        if let Some(seed) = mllib.seed {
            B::seed(seed);
        }

        let graph = self.model.load_graph(&self.device)?;
        let mut module = GraphModule::new(graph, self.device.clone());
        if mllib.finetuning {
            let nclasses = mllib
                .nclasses
                .ok_or_else(|| Error::Configuration("mllib.finetuning requires mllib.nclasses".into()))?;
            module.attach_head(nclasses, mllib.seed);
        }

        tracing::info!(
            parameters = module.parameters().len(),
            weights    = module.parameters().iter().map(|p| p.shape.iter().product::<usize>()).sum::<usize>(),
            outputs    = module.output_dim(),
            head       = module.head().is_some(),
            "service initialised"
        );
        self.nclasses = mllib.nclasses;
        self.module   = Some(module);
        Ok(())
    }

    pub fn module(&self) -> Option<&GraphModule<B, M::Graph>> {
        self.module.as_ref()
    }

    pub fn train(&mut self, request: &ApiRequest) -> Result<Response> {
        if self.module.is_none() {
            return Err(not_initialised());
        }

        let input = self.input.transform(request)?;
        let (train, test) = hold_out(input.store, request.parameters.input.test_split)?;
        let config = TrainConfig::from_params(
            &request.parameters.mllib,
            self.nclasses,
            Some(self.model.repository().to_path_buf()),
        )?;
        let iterations = config.iterations;

        let module = self.module.as_mut().ok_or_else(not_initialised)?;
        let report = Controller::new(config).run(module, train, test)?;

        let mut measures = report.measures;
        measures.insert("iteration".to_string(), iterations as f64);
        Ok(self.output.measures(measures, Some(report.history)))
    }

    pub fn predict(&self, request: &ApiRequest) -> Result<Response> {
        let module = self.module.as_ref().ok_or_else(not_initialised)?.valid();
        let input  = self.input.transform(request)?;
        let params = &request.parameters.output;

        if let Some(requested) = &params.measure {
            for name in requested.iter().filter(|n| n.as_str() != ACCURACY) {
                tracing::warn!(measure = %name, "unsupported measure ignored");
            }
            let measures = evaluate(&module, &input.store, 1)?;
            return Ok(self.output.measures(measures, None));
        }

        let records = predict(&module, &input.store, &input.ids, params.best, |c| self.model.label(c))?;
        Ok(self.output.predictions(records, params))
    }
}

fn not_initialised() -> Error {
    Error::Configuration("service is not initialised".into())
}
