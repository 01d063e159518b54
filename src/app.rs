//! Video pipeline orchestration: setup, per-frame processing and export.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;

use crate::annotate;
use crate::detection::OccupancyDetector;
use crate::detection::occupancy::DEFAULT_THRESHOLD;
use crate::display::{CancelToken, Display};
use crate::export::{self, PlotLabels, PlotSize};
use crate::models::{BoundsPolicy, CountSeries, Roi, VideoProperties};
use crate::rois::{self, CreateOutcome};
use crate::video::{self, FrameSink, FrameSource};

/// Everything a run needs to know
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub video: PathBuf,
    pub video_output: PathBuf,
    pub graph_output: PathBuf,
    pub rois: PathBuf,
    pub threshold: f32,
    pub start_frame: u64,
    /// Directory for gray/blur/thresh snapshots of the reference frame
    pub snapshot_dir: Option<PathBuf>,
    /// Frame rate assumed for sources that carry none
    pub fallback_fps: f64,
    pub bounds: BoundsPolicy,
    pub plot_labels: PlotLabels,
    pub plot_size: PlotSize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            video: PathBuf::from("videos/parking-lot.mp4"),
            video_output: PathBuf::from("videos/output.mp4"),
            graph_output: PathBuf::from("output.png"),
            rois: PathBuf::from("rois.txt"),
            threshold: DEFAULT_THRESHOLD,
            start_frame: 667,
            snapshot_dir: Some(PathBuf::from(".")),
            fallback_fps: 30.0,
            bounds: BoundsPolicy::Clip,
            plot_labels: PlotLabels::default(),
            plot_size: PlotSize::default(),
        }
    }
}

/// Why the processing loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    ReadFailure,
    Cancelled,
}

/// State after setup: an open source positioned at the start frame plus the final ROI set
pub struct Session {
    source: Box<dyn FrameSource>,
    pub properties: VideoProperties,
    pub rois: Vec<Roi>,
    pub detector: OccupancyDetector,
}

/// Accumulated results of the processing loop
#[derive(Debug)]
pub struct RunOutput {
    pub frames: Vec<RgbImage>,
    pub counts: CountSeries,
    pub stop: StopReason,
}

/// What a complete run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub properties: VideoProperties,
    pub total_rois: usize,
    pub counts: CountSeries,
    pub frames_written: u64,
    pub stop: StopReason,
}

/// Make sure the ROI file exists and load it
pub fn ensure_rois(path: &Path) -> Result<Vec<Roi>> {
    if !path.exists() {
        log::warn!("Could not find ROIs file {}", path.display());
        log::info!("Creating empty ROIs file");
    }
    match rois::create_empty(path)
        .with_context(|| format!("Could not create ROIs file {}", path.display()))?
    {
        CreateOutcome::Created => log::info!("Created empty ROIs file {}", path.display()),
        CreateOutcome::AlreadyExists => {}
    }

    let loaded = rois::load(path)
        .with_context(|| format!("Could not load ROIs from {}", path.display()))?;
    log::info!("Loaded {} ROIs", loaded.len());
    Ok(loaded)
}

/// Setup phase: reference frame, snapshots, ROI selection and persistence
pub fn setup(config: &RunConfig, mut source: Box<dyn FrameSource>, display: &mut dyn Display) -> Result<Session> {
    let properties = source.properties();
    log::info!(
        "Opened {}: {}x{}@{}",
        config.video.display(),
        properties.width,
        properties.height,
        properties.fps
    );

    source
        .seek(config.start_frame)
        .with_context(|| format!("Could not seek to frame {}", config.start_frame))?;
    let mut reference = source
        .read_frame()
        .with_context(|| format!("Could not read frame {}", config.start_frame))?
        .with_context(|| format!("Video ends before frame {}", config.start_frame))?;

    let detector = OccupancyDetector::new(config.threshold);
    if let Some(dir) = &config.snapshot_dir {
        detector
            .preprocessor()
            .run_with_snapshots(&reference, dir)
            .context("Could not save preprocessing snapshots")?;
        log::info!("Saved preprocessing snapshots to {}", dir.display());
    }

    let loaded = ensure_rois(&config.rois)?;
    annotate::draw_boxes(&mut reference, &loaded, annotate::UNCLASSIFIED);

    let mut selected = display
        .solicit_regions(&reference)
        .context("ROI selection failed")?;
    log::info!("Selected {} new ROIs", selected.len());
    selected.extend(loaded);
    let rois = selected;

    rois::save(&rois, &config.rois)
        .with_context(|| format!("Could not save ROIs to {}", config.rois.display()))?;
    log::info!("Saved {} ROIs to {}", rois.len(), config.rois.display());

    config.bounds.check(&rois, properties.width, properties.height)?;

    // The reference frame is processed like every other frame
    source
        .seek(config.start_frame)
        .with_context(|| format!("Could not seek to frame {}", config.start_frame))?;

    Ok(Session {
        source,
        properties,
        rois,
        detector,
    })
}

/// Processing loop: classify, annotate and accumulate until the stream ends or is cancelled
pub fn process(session: &mut Session, display: &mut dyn Display, cancel: &CancelToken) -> Result<RunOutput> {
    let result = process_frames(session, display, cancel);
    display.close();
    result
}

fn process_frames(session: &mut Session, display: &mut dyn Display, cancel: &CancelToken) -> Result<RunOutput> {
    let interval = session.properties.frame_interval();
    let total = session.rois.len();
    let mut frames = Vec::new();
    let mut counts = CountSeries::new();

    let stop = loop {
        if cancel.is_cancelled() {
            break StopReason::Cancelled;
        }

        let mut frame = match session.source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break StopReason::EndOfStream,
            Err(e) => {
                log::error!("Could not read frame: {:#}", e);
                break StopReason::ReadFailure;
            }
        };

        let state = session.detector.detect(&frame, &session.rois)?;
        annotate::annotate_frame(&mut frame, &session.rois, &state);
        display.show(frames.len(), &frame, &state)?;

        log::trace!("Frame {}: {}/{} free", frames.len(), state.free_count(), total);
        counts.push(state.free_count());
        frames.push(frame);

        if display.paced() && cancel.wait(interval) {
            break StopReason::Cancelled;
        }
    };

    log::info!("Processed {} frames ({:?})", frames.len(), stop);
    Ok(RunOutput { frames, counts, stop })
}

/// Export phase: annotated video and free-space plot
pub fn export_results(
    config: &RunConfig,
    output: &RunOutput,
    properties: VideoProperties,
    sink: &mut dyn FrameSink,
) -> Result<u64> {
    log::info!(
        "Saving video to {}:{}x{}@{}",
        config.video_output.display(),
        properties.width,
        properties.height,
        properties.fps
    );
    let written = export::write_video(&output.frames, sink)?;
    log::info!("Saved {} frames to {}", written, config.video_output.display());

    log::info!("Saving graph to {}", config.graph_output.display());
    export::plot_time_series(&output.counts, &config.plot_labels, config.plot_size, &config.graph_output)?;
    log::info!("Saved graph to {}", config.graph_output.display());

    Ok(written)
}

/// Full run on an already opened source
pub fn run_with_source(
    config: &RunConfig,
    source: Box<dyn FrameSource>,
    display: &mut dyn Display,
    cancel: &CancelToken,
) -> Result<RunSummary> {
    let mut session = setup(config, source, display)?;
    let output = process(&mut session, display, cancel)?;
    let properties = session.properties;
    let total_rois = session.rois.len();
    // Release the input before writing outputs
    drop(session);

    let mut sink = video::create_sink(&config.video_output, properties)?;
    let frames_written = export_results(config, &output, properties, sink.as_mut())?;

    Ok(RunSummary {
        properties,
        total_rois,
        counts: output.counts,
        frames_written,
        stop: output.stop,
    })
}

/// Open the configured video and run everything
pub fn run(config: &RunConfig, display: &mut dyn Display, cancel: &CancelToken) -> Result<RunSummary> {
    let source = video::open_source(&config.video, config.fallback_fps)?;
    run_with_source(config, source, display, cancel)
}
