pub mod annotate;
pub mod app;
pub mod detection;
pub mod display;
pub mod error;
pub mod export;
pub mod font;
pub mod models;
pub mod pipeline;
pub mod rois;
pub mod video;

pub use app::{RunConfig, RunSummary, StopReason};
pub use detection::OccupancyDetector;
pub use display::{CancelToken, Display, HeadlessDisplay, TerminalDisplay};
pub use error::ParkError;
pub use models::{BoundsPolicy, CountSeries, OccupancyState, Roi, VideoProperties};
pub use pipeline::{Pipeline, PipelineContext, PipelineStep};
