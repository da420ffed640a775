//! Dashboard client: HTTP backend, pollers and effect execution.
mod backend;
mod controller;
mod persist;
mod poller;
mod runner;
mod storage;
mod types;

pub use backend::{Backend, ClientSettings, HttpBackend};
pub use controller::{Controller, ControllerSettings};
pub use persist::{ensure_dir, AtomicFileWriter, PersistError};
pub use poller::{ChannelMsgSink, MsgSink, PollSettings, PollTarget, PollerSet};
pub use runner::EffectRunner;
pub use storage::{export_filename, StateStore};
pub use types::ApiError;
