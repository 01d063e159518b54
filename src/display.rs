//! User interaction during a run: soliciting extra ROIs and previewing output.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use image::RgbImage;

use crate::models::{OccupancyState, Roi};
use crate::rois;

/// Interaction capability injected into the video pipeline
pub trait Display {
    /// Ask for additional ROIs on the reference frame (existing ROIs already drawn)
    fn solicit_regions(&mut self, frame: &RgbImage) -> Result<Vec<Roi>>;

    /// Present one annotated frame
    fn show(&mut self, frame_index: usize, frame: &RgbImage, state: &OccupancyState) -> Result<()>;

    /// Whether playback should be paced at the source frame rate
    fn paced(&self) -> bool {
        false
    }

    fn close(&mut self) {}
}

/// No interaction at all
#[derive(Debug, Default)]
pub struct HeadlessDisplay;

impl Display for HeadlessDisplay {
    fn solicit_regions(&mut self, _frame: &RgbImage) -> Result<Vec<Roi>> {
        Ok(Vec::new())
    }

    fn show(&mut self, _frame_index: usize, _frame: &RgbImage, _state: &OccupancyState) -> Result<()> {
        Ok(())
    }
}

/// Line-oriented terminal interaction.
///
/// ROIs are typed as `x,y,w,h`, one per line; an empty line or end of input
/// finishes the selection. When `preview_path` is set, the reference frame and
/// then the latest annotated frame (at most once per `preview_interval`) are
/// written there as an image.
pub struct TerminalDisplay<R: BufRead, W: Write> {
    input: R,
    output: W,
    pub preview_path: Option<PathBuf>,
    pub preview_interval: Duration,
    last_preview: Option<Instant>,
}

impl TerminalDisplay<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio(preview_path: Option<PathBuf>) -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout(), preview_path)
    }
}

impl<R: BufRead, W: Write> TerminalDisplay<R, W> {
    pub fn new(input: R, output: W, preview_path: Option<PathBuf>) -> Self {
        Self {
            input,
            output,
            preview_path,
            preview_interval: Duration::from_secs(1),
            last_preview: None,
        }
    }

    fn write_preview(&mut self, frame: &RgbImage) -> Result<()> {
        if let Some(path) = &self.preview_path {
            frame
                .save(path)
                .with_context(|| format!("Failed to write preview {}", path.display()))?;
            self.last_preview = Some(Instant::now());
        }
        Ok(())
    }
}

impl<R: BufRead, W: Write> Display for TerminalDisplay<R, W> {
    fn solicit_regions(&mut self, frame: &RgbImage) -> Result<Vec<Roi>> {
        self.write_preview(frame)?;
        if let Some(path) = &self.preview_path {
            writeln!(self.output, "Reference frame written to {}", path.display())?;
        }
        writeln!(
            self.output,
            "Frame is {}x{}. Enter new ROIs as x,y,w,h (empty line to finish):",
            frame.width(),
            frame.height()
        )?;

        let mut selected = Vec::new();
        let mut line = String::new();
        loop {
            write!(self.output, "> ")?;
            self.output.flush()?;
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                break;
            }
            let entry = line.trim();
            if entry.is_empty() {
                break;
            }
            match rois::parse(entry) {
                Ok(parsed) => selected.extend(parsed),
                Err(e) => writeln!(self.output, "Ignored '{}': {}", entry, e)?,
            }
        }
        Ok(selected)
    }

    fn show(&mut self, frame_index: usize, frame: &RgbImage, state: &OccupancyState) -> Result<()> {
        log::debug!(
            "Frame {}: {}/{} free",
            frame_index,
            state.free_count(),
            state.total()
        );
        let due = self
            .last_preview
            .is_none_or(|at| at.elapsed() >= self.preview_interval);
        if due {
            self.write_preview(frame)?;
        }
        Ok(())
    }

    fn paced(&self) -> bool {
        true
    }

    fn close(&mut self) {
        if let Err(e) = self.output.flush() {
            log::warn!("Failed to flush terminal output: {}", e);
        }
    }
}

/// Cooperative cancellation flag, set from Ctrl-C or by the caller
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that trips on SIGINT. Can only be installed once per process.
    pub fn install_ctrlc() -> Result<Self> {
        let token = Self::new();
        let flag = token.flag.clone();
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        })
        .context("Failed to install Ctrl-C handler")?;
        Ok(token)
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleep up to `wait`, returning early with true if cancelled meanwhile
    pub fn wait(&self, wait: Duration) -> bool {
        let deadline = Instant::now() + wait;
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(10)));
        }
    }
}
