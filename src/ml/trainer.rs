// ============================================================
// Layer 5 — Training Controller
// ============================================================
// Drives supervised training of a GraphModule:
//
//   Idle ─▶ Training ─┬─▶ Evaluating ───┐
//                     ├─▶ Checkpointing ┤
//                     ◀─────────────────┘
//                     └─▶ Done
//
// Per iteration i in 0..iterations:
//   1. reshuffle the training sampler (seed + i when seeded)
//   2. per batch: forward, one-hot(first target), MSE loss,
//      backward, one optimizer step for graph and head
//   3. i > 0 && i % eval_interval == 0 && held-out non-empty
//      → accuracy on the held-out store
//   4. checkpoint_interval != 0 && i % checkpoint_interval == 0
//      → checkpoint tagged i
//
// Graph and head each get their own optimizer of the chosen
// kind. Weight updates are applied in place; a failure part way
// through keeps the updates already made. Held-out evaluation
// runs on the inner backend, without gradient tracking.

use std::path::PathBuf;
use std::str::FromStr;

use burn::{
    module::AutodiffModule,
    nn::loss::{MseLoss, Reduction},
    optim::{adaptor::OptimizerAdaptor, AdamConfig, AdamWConfig, GradientsParams, Optimizer, SgdConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::example::{labels_of, Batch};
use crate::data::sampler::BatchSampler;
use crate::data::store::ExampleStore;
use crate::domain::request::MllibParams;
use crate::domain::response::{MeasureHistory, Measures};
use crate::error::{Error, Result};
use crate::infra::metrics::MetricsLogger;
use crate::ml::evaluator::evaluate;
use crate::ml::graph::Graph;
use crate::ml::module::{ClassificationHead, GraphModule};

pub const TRAIN_LOSS: &str = "train_loss";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    Adam,
    AdamW,
    Sgd,
}

impl FromStr for SolverKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ADAM"  => Ok(SolverKind::Adam),
            "ADAMW" => Ok(SolverKind::AdamW),
            "SGD"   => Ok(SolverKind::Sgd),
            _ => Err(Error::Configuration(format!(
                "unsupported solver_type '{s}' (expected ADAM, ADAMW or SGD)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub iterations:          usize,
    pub solver:              SolverKind,
    pub lr:                  f64,
    pub batch_size:          usize,
    pub eval_batch_size:     usize,
    /// Evaluate every N iterations
    pub eval_interval:       usize,
    /// Checkpoint every N iterations; 0 disables
    pub checkpoint_interval: usize,
    /// Log the loss every N batches
    pub log_interval:        usize,
    pub nclasses:            usize,
    pub seed:                Option<u64>,
    /// Receives checkpoints and metrics.csv
    pub repository:          Option<PathBuf>,
}

impl TrainConfig {
    pub fn new(nclasses: usize) -> Self {
        Self {
            iterations:          100,
            solver:              SolverKind::Adam,
            lr:                  0.0001,
            batch_size:          5,
            eval_batch_size:     1,
            eval_interval:       1,
            checkpoint_interval: 0,
            log_interval:        20,
            nclasses,
            seed:                None,
            repository:          None,
        }
    }

    /// `nclasses` falls back to `default_nclasses` when the request omits it.
    pub fn from_params(
        mllib:            &MllibParams,
        default_nclasses: Option<usize>,
        repository:       Option<PathBuf>,
    ) -> Result<Self> {
        let nclasses = mllib
            .nclasses
            .or(default_nclasses)
            .ok_or_else(|| Error::Configuration("mllib.nclasses is required for training".into()))?;

        Ok(Self {
            iterations:          mllib.solver.iterations,
            solver:              mllib.solver.solver_type.parse()?,
            lr:                  mllib.solver.base_lr,
            batch_size:          mllib.net.batch_size,
            eval_batch_size:     mllib.net.test_batch_size,
            eval_interval:       mllib.solver.test_interval,
            checkpoint_interval: mllib.solver.snapshot,
            log_interval:        mllib.solver.display,
            nclasses,
            seed:                mllib.seed,
            repository,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Training,
    Evaluating,
    Checkpointing,
    Done,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub state:       ControllerState,
    /// Latest value of every metric
    pub measures:    Measures,
    pub history:     MeasureHistory,
    /// Mean batch loss of each iteration
    pub losses:      Vec<f64>,
    pub checkpoints: Vec<PathBuf>,
}

impl Default for TrainingReport {
    fn default() -> Self {
        Self {
            state:       ControllerState::Idle,
            measures:    Measures::new(),
            history:     MeasureHistory::new(),
            losses:      Vec::new(),
            checkpoints: Vec::new(),
        }
    }
}

impl TrainingReport {
    fn record(&mut self, name: &str, value: f64) {
        self.measures.insert(name.to_string(), value);
        self.history.entry(name.to_string()).or_default().push(value);
    }
}

pub struct Controller {
    config: TrainConfig,
    state:  ControllerState,
}

impl Controller {
    pub fn new(config: TrainConfig) -> Self {
        Self { config, state: ControllerState::Idle }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Train `module` in place. Both stores are consumed by the run.
    pub fn run<B, G>(
        &mut self,
        module: &mut GraphModule<B, G>,
        train:  ExampleStore,
        test:   ExampleStore,
    ) -> Result<TrainingReport>
    where
        B: AutodiffBackend,
        G: Graph<B> + AutodiffModule<B>,
        G::InnerModule: Graph<B::InnerBackend>,
    {
        if train.is_empty() {
            return Err(Error::EmptyDataset("no training data"));
        }

        match self.config.solver {
            SolverKind::Adam => {
                let graph_optim: OptimizerAdaptor<_, G, B> = AdamConfig::new().init();
                let head_optim: OptimizerAdaptor<_, Option<ClassificationHead<B>>, B> = AdamConfig::new().init();
                self.run_with(module, train, test, graph_optim, head_optim)
            }
            SolverKind::AdamW => {
                let graph_optim: OptimizerAdaptor<_, G, B> = AdamWConfig::new().init();
                let head_optim: OptimizerAdaptor<_, Option<ClassificationHead<B>>, B> = AdamWConfig::new().init();
                self.run_with(module, train, test, graph_optim, head_optim)
            }
            SolverKind::Sgd => {
                let graph_optim: OptimizerAdaptor<_, G, B> = SgdConfig::new().init();
                let head_optim: OptimizerAdaptor<_, Option<ClassificationHead<B>>, B> = SgdConfig::new().init();
                self.run_with(module, train, test, graph_optim, head_optim)
            }
        }
    }

    fn run_with<B, G, OG, OH>(
        &mut self,
        module:          &mut GraphModule<B, G>,
        train:           ExampleStore,
        test:            ExampleStore,
        mut graph_optim: OG,
        mut head_optim:  OH,
    ) -> Result<TrainingReport>
    where
        B: AutodiffBackend,
        G: Graph<B> + AutodiffModule<B>,
        G::InnerModule: Graph<B::InnerBackend>,
        OG: Optimizer<G, B>,
        OH: Optimizer<Option<ClassificationHead<B>>, B>,
    {
        let cfg = self.config.clone();
        let metrics = cfg.repository.as_ref().map(MetricsLogger::new).transpose()?;
        let mut report  = TrainingReport::default();
        let mut sampler = BatchSampler::new(&train);

        tracing::info!(
            iterations = cfg.iterations,
            solver     = ?cfg.solver,
            lr         = cfg.lr,
            train      = train.size(),
            held_out   = test.size(),
            "training started"
        );
        self.state = ControllerState::Training;

        for i in 0..cfg.iterations {
            // ── Training phase ────────────────────────────────────────────────
            sampler.reset(true, cfg.seed.map(|s| s.wrapping_add(i as u64)));

            let mut loss_sum = 0.0f64;
            let mut batches  = 0usize;
            for batch in sampler.epoch(cfg.batch_size.max(1)) {
                let loss = self.step(module, &batch?, &mut graph_optim, &mut head_optim)?;
                loss_sum += loss;
                batches  += 1;

                if batches % cfg.log_interval.max(1) == 0 {
                    tracing::info!(iteration = i, batch = batches, loss, "training");
                }
            }

            let mean_loss = loss_sum / batches.max(1) as f64;
            report.losses.push(mean_loss);
            report.record(TRAIN_LOSS, mean_loss);
            if let Some(m) = &metrics {
                m.log(i, TRAIN_LOSS, mean_loss)?;
            }
            tracing::debug!(iteration = i, mean_loss, "iteration done");

            // ── Evaluation phase ──────────────────────────────────────────────
            if i > 0 && i % cfg.eval_interval.max(1) == 0 && !test.is_empty() {
                self.state = ControllerState::Evaluating;
                let measures = evaluate(&module.valid(), &test, cfg.eval_batch_size)?;
                for (name, value) in &measures {
                    report.record(name, *value);
                    if let Some(m) = &metrics {
                        m.log(i, name, *value)?;
                    }
                }
                tracing::info!(iteration = i, ?measures, "evaluation");
                self.state = ControllerState::Training;
            }

            // ── Checkpoint phase ──────────────────────────────────────────────
            if cfg.checkpoint_interval != 0 && i % cfg.checkpoint_interval == 0 {
                match &cfg.repository {
                    Some(dir) => {
                        self.state = ControllerState::Checkpointing;
                        report.checkpoints.extend(module.save_checkpoint(dir, &i.to_string())?);
                        self.state = ControllerState::Training;
                    }
                    None => tracing::warn!(iteration = i, "no repository configured, checkpoint skipped"),
                }
            }
        }

        self.state   = ControllerState::Done;
        report.state = ControllerState::Done;
        tracing::info!(final_loss = report.losses.last().copied(), "training done");
        Ok(report)
    }

    /// One forward/backward/update on a single batch. Returns the loss.
    fn step<B, G, OG, OH>(
        &self,
        module:      &mut GraphModule<B, G>,
        batch:       &Batch,
        graph_optim: &mut OG,
        head_optim:  &mut OH,
    ) -> Result<f64>
    where
        B: AutodiffBackend,
        G: Graph<B> + AutodiffModule<B>,
        OG: Optimizer<G, B>,
        OH: Optimizer<Option<ClassificationHead<B>>, B>,
    {
        let nclasses = self.config.nclasses;
        let labels   = labels_of(batch.first_target()?);

        let output = module.forward(&batch.data)?;
        let [rows, width] = output.dims();
        if width != nclasses {
            return Err(Error::Configuration(format!(
                "model produces {width} outputs but nclasses is {nclasses}"
            )));
        }
        if labels.len() != rows {
            return Err(Error::InvalidInput(format!("{} labels for {rows} examples", labels.len())));
        }
        let target = one_hot::<B>(&labels, nclasses, module.device())?;

        let loss  = MseLoss::new().forward(output, target, Reduction::Mean);
        let value = loss.clone().into_scalar().elem::<f64>();

        // gradients are fresh on every backward pass
        let mut grads   = loss.backward();
        let graph_grads = GradientsParams::from_module::<B, G>(&mut grads, &module.graph);
        let head_grads  = GradientsParams::from_module::<B, Option<ClassificationHead<B>>>(&mut grads, &module.head);

        module.graph = graph_optim.step(self.config.lr, module.graph.clone(), graph_grads);
        module.head  = head_optim.step(self.config.lr, module.head.clone(), head_grads);
        Ok(value)
    }
}

/// `[labels.len(), nclasses]` float matrix with a single 1 per row.
pub fn one_hot<B: Backend>(labels: &[i64], nclasses: usize, device: &B::Device) -> Result<Tensor<B, 2>> {
    let mut values = vec![0.0f32; labels.len() * nclasses];
    for (row, &label) in labels.iter().enumerate() {
        if label < 0 || label as usize >= nclasses {
            return Err(Error::LabelOutOfRange { label, nclasses });
        }
        values[row * nclasses + label as usize] = 1.0;
    }
    Ok(Tensor::from_data(TensorData::new(values, [labels.len(), nclasses]), device))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::graph::IdentityGraph;
    use burn::backend::{Autodiff, NdArray};

    type TrainBackend = Autodiff<NdArray>;

    fn labelled_store(labels: &[i64], width: usize) -> ExampleStore {
        let mut store = ExampleStore::new();
        for &label in labels {
            let mut features = vec![0.0f32; width];
            features[label as usize] = 1.0;
            store
                .add_example(vec![TensorData::new(features, [width])], vec![TensorData::new(vec![label], [1])])
                .unwrap();
        }
        store
    }

    fn module_with_head(width: usize, nclasses: usize) -> GraphModule<TrainBackend, IdentityGraph> {
        let mut module = GraphModule::new(IdentityGraph::new(width), Default::default());
        module.attach_head(nclasses, Some(5));
        module
    }

    fn quick_config(iterations: usize) -> TrainConfig {
        TrainConfig {
            iterations,
            lr:         0.05,
            batch_size: 2,
            seed:       Some(7),
            ..TrainConfig::new(3)
        }
    }

    #[test]
    fn test_solver_kind_parsing() {
        assert_eq!("adam".parse::<SolverKind>().unwrap(), SolverKind::Adam);
        assert_eq!("ADAMW".parse::<SolverKind>().unwrap(), SolverKind::AdamW);
        assert_eq!("Sgd".parse::<SolverKind>().unwrap(), SolverKind::Sgd);
        assert!(matches!("RMSPROP".parse::<SolverKind>(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_config_requires_nclasses() {
        let params = MllibParams::default();
        assert!(matches!(TrainConfig::from_params(&params, None, None), Err(Error::Configuration(_))));

        let cfg = TrainConfig::from_params(&params, Some(4), None).unwrap();
        assert_eq!(cfg.nclasses, 4);
        assert_eq!(cfg.iterations, 100);
        assert_eq!(cfg.solver, SolverKind::Adam);
    }

    #[test]
    fn test_one_hot_rows() {
        let t = one_hot::<NdArray>(&[2, 0], 3, &Default::default()).unwrap();
        t.into_data()
            .assert_eq(&TensorData::new(vec![0.0f32, 0.0, 1.0, 1.0, 0.0, 0.0], [2, 3]), false);

        assert!(matches!(
            one_hot::<NdArray>(&[3], 3, &Default::default()),
            Err(Error::LabelOutOfRange { label: 3, nclasses: 3 })
        ));
    }

    #[test]
    fn test_training_reduces_loss() {
        let mut module = module_with_head(3, 3);
        let train = labelled_store(&[0, 1, 2, 0, 1, 2], 3);

        let mut controller = Controller::new(quick_config(40));
        assert_eq!(controller.state(), ControllerState::Idle);

        let report = controller.run(&mut module, train, ExampleStore::new()).unwrap();
        assert_eq!(controller.state(), ControllerState::Done);
        assert_eq!(report.state, ControllerState::Done);
        assert_eq!(report.losses.len(), 40);
        assert!(report.losses[39] < report.losses[0]);
        assert_eq!(report.history[TRAIN_LOSS].len(), 40);
    }

    #[test]
    fn test_every_solver_kind_runs() {
        for solver in [SolverKind::Adam, SolverKind::AdamW, SolverKind::Sgd] {
            let mut module = module_with_head(3, 3);
            let train = labelled_store(&[0, 1, 2], 3);
            let cfg = TrainConfig { solver, ..quick_config(2) };
            let report = Controller::new(cfg).run(&mut module, train, ExampleStore::new()).unwrap();
            assert_eq!(report.losses.len(), 2);
        }
    }

    #[test]
    fn test_evaluation_skips_first_iteration() {
        let mut module = module_with_head(3, 3);
        let train = labelled_store(&[0, 1, 2], 3);
        let test  = labelled_store(&[0, 1], 3);

        let cfg = TrainConfig { eval_interval: 2, ..quick_config(5) };
        let report = Controller::new(cfg).run(&mut module, train, test).unwrap();

        // iterations 2 and 4
        assert_eq!(report.history["acc"].len(), 2);
        assert!(report.measures.contains_key("acc"));
    }

    #[test]
    fn test_checkpoints_and_metrics_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut module = module_with_head(3, 3);
        let train = labelled_store(&[0, 1, 2], 3);

        let cfg = TrainConfig {
            checkpoint_interval: 2,
            repository:          Some(dir.path().to_path_buf()),
            ..quick_config(5)
        };
        let report = Controller::new(cfg).run(&mut module, train, ExampleStore::new()).unwrap();

        // tags 0, 2, 4; graph and head each
        assert_eq!(report.checkpoints.len(), 6);
        assert!(dir.path().join("checkpoint-4-head.mpk").exists());

        let csv = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().filter(|l| l.contains(TRAIN_LOSS)).count(), 5);
    }

    #[test]
    fn test_unlabelled_data_aborts() {
        let mut module = module_with_head(2, 2);
        let mut train = ExampleStore::new();
        train.add_example(vec![TensorData::new(vec![1.0f32, 0.0], [2])], vec![]).unwrap();

        let cfg = TrainConfig { nclasses: 2, ..quick_config(3) };
        let mut controller = Controller::new(cfg);
        assert!(matches!(
            controller.run(&mut module, train, ExampleStore::new()),
            Err(Error::MissingLabel)
        ));
        assert_ne!(controller.state(), ControllerState::Done);
    }

    #[test]
    fn test_empty_training_store_fails() {
        let mut module = module_with_head(3, 3);
        let result = Controller::new(quick_config(1)).run(&mut module, ExampleStore::new(), ExampleStore::new());
        assert!(matches!(result, Err(Error::EmptyDataset(_))));
    }

    #[test]
    fn test_output_width_must_match_nclasses() {
        let mut module = GraphModule::<TrainBackend, _>::new(IdentityGraph::new(3), Default::default());
        let train = labelled_store(&[0, 1], 3);
        let cfg = TrainConfig { nclasses: 5, ..quick_config(1) };
        assert!(matches!(
            Controller::new(cfg).run(&mut module, train, ExampleStore::new()),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_failure_mid_run_keeps_applied_updates() {
        let mut module = module_with_head(3, 3);
        let initial: Vec<f32> = module.head().unwrap().linear.weight.val().into_data().iter::<f32>().collect();

        let train = labelled_store(&[0, 1, 2], 3);
        let mut test = ExampleStore::new();
        test.add_example(vec![TensorData::new(vec![1.0f32, 0.0, 0.0], [3])], vec![]).unwrap();

        // iterations 0 and 1 train, the evaluation after iteration 1 fails
        let mut controller = Controller::new(quick_config(5));
        assert!(matches!(controller.run(&mut module, train, test), Err(Error::MissingLabel)));
        assert_ne!(controller.state(), ControllerState::Done);

        let trained: Vec<f32> = module.head().unwrap().linear.weight.val().into_data().iter::<f32>().collect();
        assert_ne!(trained, initial);
    }
}
