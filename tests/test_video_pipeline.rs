mod common;

use common::*;
use parkwatch::app::{self, StopReason};
use parkwatch::display::{CancelToken, HeadlessDisplay};
use parkwatch::video::memory::MemorySource;
use parkwatch::{BoundsPolicy, ParkError, Roi, rois};

#[test]
fn test_ten_frame_video_yields_ten_counts_and_frames() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let config = config_in(dir.path());
    let spots = lot_rois();

    let frames: Vec<_> = (0..10).map(|_| synthetic_frame(&spots[..1])).collect();
    write_frames(&config.video, &frames);
    rois::save(&spots, &config.rois)?;

    let summary = app::run(&config, &mut HeadlessDisplay, &CancelToken::new())?;

    assert_eq!(summary.counts, vec![3; 10]);
    assert_eq!(summary.frames_written, 10);
    assert_eq!(summary.stop, StopReason::EndOfStream);
    assert_eq!(summary.total_rois, 4);

    let written = std::fs::read_dir(&config.video_output)?.count();
    assert_eq!(written, 10);
    assert!(config.graph_output.is_file());
    for name in ["gray.png", "blur.png", "thresh.png"] {
        assert!(dir.path().join("snapshots").join(name).is_file());
    }

    Ok(())
}

#[test]
fn test_counts_follow_cars_leaving() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let config = config_in(dir.path());
    let spots = lot_rois();

    let mut frames: Vec<_> = (0..3).map(|_| synthetic_frame(&spots[..3])).collect();
    frames.extend((0..3).map(|_| synthetic_frame(&spots[..1])));
    frames.extend((0..2).map(|_| synthetic_frame(&[])));
    write_frames(&config.video, &frames);
    rois::save(&spots, &config.rois)?;

    let summary = app::run(&config, &mut HeadlessDisplay, &CancelToken::new())?;
    assert_eq!(summary.counts, vec![1, 1, 1, 3, 3, 3, 4, 4]);

    Ok(())
}

#[test]
fn test_start_frame_skips_earlier_frames() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let mut config = config_in(dir.path());
    config.start_frame = 7;
    let spots = lot_rois();

    let frames: Vec<_> = (0..10).map(|_| synthetic_frame(&spots)).collect();
    write_frames(&config.video, &frames);
    rois::save(&spots, &config.rois)?;

    let summary = app::run(&config, &mut HeadlessDisplay, &CancelToken::new())?;
    assert_eq!(summary.counts, vec![0, 0, 0]);

    Ok(())
}

#[test]
fn test_missing_roi_file_is_created_and_merged_with_selection() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let config = config_in(dir.path());
    let spots = lot_rois();
    write_frames(&config.video, &[synthetic_frame(&spots[..2])]);

    let mut display = ScriptedDisplay {
        regions: spots.clone(),
        ..Default::default()
    };
    let summary = app::run(&config, &mut display, &CancelToken::new())?;

    assert_eq!(rois::load(&config.rois)?, spots);
    assert_eq!(summary.counts, vec![2]);
    assert_eq!(display.shown, vec![2]);
    assert!(display.closed);

    Ok(())
}

#[test]
fn test_new_selections_are_saved_before_loaded_ones() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let config = config_in(dir.path());
    let spots = lot_rois();
    write_frames(&config.video, &[synthetic_frame(&[])]);
    rois::save(&spots[2..], &config.rois)?;

    let mut display = ScriptedDisplay {
        regions: spots[..2].to_vec(),
        ..Default::default()
    };
    app::run(&config, &mut display, &CancelToken::new())?;

    assert_eq!(rois::load(&config.rois)?, spots);
    Ok(())
}

#[test]
fn test_unopenable_video_aborts_before_processing() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = config_in(dir.path());

    let err = app::run(&config, &mut HeadlessDisplay, &CancelToken::new()).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ParkError>(),
        Some(ParkError::VideoOpen { .. })
    ));
    assert!(!config.rois.exists());
    assert!(!config.graph_output.exists());
}

#[test]
fn test_malformed_roi_file_is_fatal() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let config = config_in(dir.path());
    write_frames(&config.video, &[synthetic_frame(&[])]);
    std::fs::write(&config.rois, "1,2,3\n")?;

    let err = app::run(&config, &mut HeadlessDisplay, &CancelToken::new()).unwrap_err();
    assert!(err.chain().any(|e| matches!(
        e.downcast_ref::<ParkError>(),
        Some(ParkError::RoiParse { .. })
    )));

    Ok(())
}

#[test]
fn test_read_failure_ends_stream_and_keeps_partial_results() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let config = config_in(dir.path());
    let spots = lot_rois();
    rois::save(&spots, &config.rois)?;

    let frames: Vec<_> = (0..10).map(|_| synthetic_frame(&spots[..2])).collect();
    let mut source = MemorySource::new(frames, 10.0);
    source.fail_at = Some(4);

    let summary = app::run_with_source(&config, Box::new(source), &mut HeadlessDisplay, &CancelToken::new())?;

    assert_eq!(summary.stop, StopReason::ReadFailure);
    assert_eq!(summary.counts, vec![2; 4]);
    assert_eq!(summary.frames_written, 4);
    assert!(config.graph_output.is_file());

    Ok(())
}

#[test]
fn test_cancellation_stops_loop_after_current_frame() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let config = config_in(dir.path());
    let spots = lot_rois();
    rois::save(&spots, &config.rois)?;

    let cancel = CancelToken::new();
    let mut display = ScriptedDisplay {
        cancel_after: Some((3, cancel.clone())),
        ..Default::default()
    };
    let frames: Vec<_> = (0..10).map(|_| synthetic_frame(&[])).collect();
    let source = MemorySource::new(frames, 10.0);

    let summary = app::run_with_source(&config, Box::new(source), &mut display, &cancel)?;

    assert_eq!(summary.stop, StopReason::Cancelled);
    assert_eq!(summary.counts, vec![4; 3]);
    assert_eq!(summary.frames_written, 3);
    assert!(display.closed);

    Ok(())
}

#[test]
fn test_out_of_bounds_roi_clipped_by_default_and_rejected_when_strict() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let mut config = config_in(dir.path());
    let overhang = Roi::new(FRAME_WIDTH - 4, 2, 20, 12)?;
    rois::save(&[overhang], &config.rois)?;
    write_frames(&config.video, &[synthetic_frame(&[])]);

    let summary = app::run(&config, &mut HeadlessDisplay, &CancelToken::new())?;
    assert_eq!(summary.counts, vec![1]);

    config.bounds = BoundsPolicy::Reject;
    let err = app::run(&config, &mut HeadlessDisplay, &CancelToken::new()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ParkError>(),
        Some(ParkError::RoiOutOfBounds { .. })
    ));

    Ok(())
}

#[test]
fn test_roi_spanning_u32_range_is_clipped_not_fatal() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let config = config_in(dir.path());
    std::fs::write(&config.rois, "0,0,4294967295,4\n")?;
    write_frames(&config.video, &[synthetic_frame(&[]), synthetic_frame(&[])]);

    let summary = app::run(&config, &mut HeadlessDisplay, &CancelToken::new())?;

    assert_eq!(summary.total_rois, 1);
    assert_eq!(summary.counts, vec![1, 1]);
    assert_eq!(summary.frames_written, 2);

    Ok(())
}
