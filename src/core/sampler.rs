//! Sampler contract: the pluggable metrics source driven by the worker loop

use std::time::Duration;

use crate::core::{SampleError, Snapshot};

/// Produces one snapshot per call.
///
/// Called from the worker task only, never concurrently with itself. A call
/// is expected to finish within one polling period; a slow call delays the
/// next tick rather than overlapping it.
#[cfg_attr(test, mockall::automock)]
pub trait Sampler: Send {
    fn sample(&mut self) -> Result<Snapshot, SampleError>;

    /// The worker was retimed while running. Samplers whose output depends
    /// on the period (smoothing windows) adjust here.
    fn set_period(&mut self, _period: Duration) {}
}

impl<F> Sampler for F
where
    F: FnMut() -> Result<Snapshot, SampleError> + Send,
{
    fn sample(&mut self) -> Result<Snapshot, SampleError> {
        self()
    }
}

/// Builds a fresh sampler for every `start()` of a view-model, given the
/// polling period it will run at
pub type SamplerFactory =
    Box<dyn FnMut(Duration) -> Result<Box<dyn Sampler>, SampleError> + Send>;

/// Wrap a cloneable closure so every run gets its own copy
pub fn factory_from_fn<F>(sample: F) -> SamplerFactory
where
    F: FnMut() -> Result<Snapshot, SampleError> + Clone + Send + 'static,
{
    Box::new(move |_period| Ok(Box::new(sample.clone()) as Box<dyn Sampler>))
}

/// Deterministic sampler emitting `[0]`, `[1]`, `[2]`, ... with optional
/// failing ticks. Drives the pipeline tests.
#[derive(Debug, Clone, Default)]
pub struct CountingSampler {
    tick: u64,
    failing_ticks: Vec<u64>,
}

impl CountingSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the given zero-based ticks fail with `SampleError::Unavailable`
    pub fn failing_on(mut self, ticks: &[u64]) -> Self {
        self.failing_ticks = ticks.to_vec();
        self
    }
}

impl Sampler for CountingSampler {
    fn sample(&mut self) -> Result<Snapshot, SampleError> {
        let tick = self.tick;
        self.tick += 1;
        if self.failing_ticks.contains(&tick) {
            return Err(SampleError::Unavailable(format!("tick {} failed", tick)));
        }
        Ok(Snapshot::now(vec![tick as f64]))
    }
}
