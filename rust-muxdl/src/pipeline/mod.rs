//! The download pipeline: fetch, mux, relay and deliver.

pub mod coordinator;
pub mod ffmpeg;
pub mod mux;
pub mod output;
pub mod progress;
pub mod relay;
pub mod service;

pub use coordinator::{FetchCoordinator, FetchReport};
pub use ffmpeg::{FfmpegMuxer, MuxCodecs};
pub use mux::{Multiplexer, MuxOrchestrator};
pub use output::{DownloadOutput, StagedOutput};
pub use progress::{ProgressEvent, ProgressPublisher};
pub use relay::DirectRelay;
pub use service::{DownloadService, DownloadState, MediaSummary};
