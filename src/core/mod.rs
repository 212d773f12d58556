pub mod channel;
pub mod error;
pub mod history;
pub mod poller;
pub mod presenter;
pub mod sampler;
pub mod snapshot;
pub mod system;
pub mod view_model;
pub mod worker;

pub use channel::{channel, ChannelPolicy, PushOutcome, SnapshotReceiver, SnapshotSender};
pub use error::{MonitorError, SampleError};
pub use history::HistoryBuffer;
pub use poller::Poller;
pub use presenter::{
    CpuCoresPresenter, CpuFrame, MemoryFrame, MemoryPresenter, Presenter, ProcessFrame,
    ProcessPresenter, RawPresenter, Usage,
};
pub use sampler::{factory_from_fn, CountingSampler, Sampler, SamplerFactory};
pub use snapshot::Snapshot;
pub use system::{CpuCoresSampler, MemorySampler, ProcessCpuSampler, ProcessTarget};
pub use view_model::{
    CpuCoresViewModel, MemoryViewModel, MonitorOptions, MonitorStarted, MonitorStatus,
    MonitorViewModel, ProcessViewModel,
};
pub use worker::{ErrorCallback, RunState, WorkerExit, WorkerLoop};
