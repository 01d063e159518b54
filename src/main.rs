use clap::Parser;
use std::path::PathBuf;

use parkwatch::app::{self, RunConfig};
use parkwatch::display::{CancelToken, Display, HeadlessDisplay, TerminalDisplay};
use parkwatch::BoundsPolicy;

#[derive(Parser)]
#[command(name = "parkwatch")]
#[command(about = "Count free parking spots in a video by thresholding fixed regions")]
struct Cli {
    /// Input video file, or a directory of frame images
    #[arg(long, default_value = "videos/parking-lot.mp4")]
    video: PathBuf,

    /// Annotated output video (a path without extension writes PNG frames)
    #[arg(long, default_value = "videos/output.mp4")]
    video_output: PathBuf,

    /// Free-space plot image
    #[arg(long, default_value = "output.png")]
    graph_output: PathBuf,

    /// Mean mask intensity above which a spot is occupied
    #[arg(long, default_value_t = 20)]
    threshold: u32,

    /// Frame used for ROI selection and where processing starts
    #[arg(long, default_value_t = 667)]
    start_frame: u64,

    /// ROI file, one x,y,w,h per line
    #[arg(long, default_value = "rois.txt")]
    rois: PathBuf,

    /// Directory for gray/blur/thresh snapshots of the start frame
    #[arg(long, default_value = ".")]
    snapshot_dir: PathBuf,

    /// Frame rate to assume when the input has none (image directories)
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// Skip interactive ROI entry, preview and playback pacing
    #[arg(long)]
    headless: bool,

    /// Image file refreshed with the reference frame and live output
    #[arg(long, value_name = "FILE")]
    preview: Option<PathBuf>,

    /// Fail instead of clipping ROIs that extend past the frame
    #[arg(long)]
    strict_bounds: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn run_config(&self) -> RunConfig {
        RunConfig {
            video: self.video.clone(),
            video_output: self.video_output.clone(),
            graph_output: self.graph_output.clone(),
            rois: self.rois.clone(),
            threshold: self.threshold as f32,
            start_frame: self.start_frame,
            snapshot_dir: Some(self.snapshot_dir.clone()),
            fallback_fps: self.fps,
            bounds: if self.strict_bounds {
                BoundsPolicy::Reject
            } else {
                BoundsPolicy::Clip
            },
            ..RunConfig::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let config = args.run_config();
    let cancel = CancelToken::install_ctrlc()?;

    let mut display: Box<dyn Display> = if args.headless {
        Box::new(HeadlessDisplay)
    } else {
        Box::new(TerminalDisplay::stdio(args.preview.clone()))
    };

    let summary = app::run(&config, display.as_mut(), &cancel)?;

    println!("\n=== Parking Occupancy Results ===");
    println!("Spots monitored: {}", summary.total_rois);
    println!("Frames processed: {} ({:?})", summary.counts.len(), summary.stop);
    println!("Frames written: {}", summary.frames_written);
    if let (Some(min), Some(max)) = (summary.counts.iter().min(), summary.counts.iter().max()) {
        println!("Free spots: min {} / max {}", min, max);
    }

    Ok(())
}
