//! Container decode/encode through FFmpeg.
//!
//! Decoded frames are converted to RGB24 in memory. Output is MPEG-4 Part 2
//! (`mp4v`) in whatever container the output extension selects.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use ffmpeg_next as ffmpeg;
use image::RgbImage;

use super::{CODEC_TAG, FrameSink, FrameSource};
use crate::error::ParkError;
use crate::models::VideoProperties;

use ffmpeg::software::scaling::{Context as Scaler, flag::Flags};
use ffmpeg::util::format::pixel::Pixel;

/// Demuxer and decoder state for one pass over the input
struct Decoding {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::decoder::Video,
    scaler: Scaler,
    eof_sent: bool,
    /// Frames pulled from the decoder since the input was opened
    decoded: u64,
}

impl Decoding {
    fn open(path: &Path) -> Result<(Self, VideoProperties), ParkError> {
        let open_err = |reason: String| ParkError::VideoOpen {
            path: path.to_path_buf(),
            reason,
        };

        ffmpeg::init().map_err(|e| open_err(format!("initialize ffmpeg: {}", e)))?;
        let input = ffmpeg::format::input(&path).map_err(|e| open_err(e.to_string()))?;
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| open_err("file has no video track".to_string()))?;
        let stream_index = stream.index();
        let fps = f64::from(stream.avg_frame_rate());

        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| open_err(format!("load decoder parameters: {}", e)))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| open_err(format!("open video decoder: {}", e)))?;

        let scaler = Scaler::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            Flags::BILINEAR,
        )
        .map_err(|e| open_err(format!("create scaler: {}", e)))?;

        let properties = VideoProperties {
            width: decoder.width(),
            height: decoder.height(),
            fps: if fps.is_finite() { fps } else { 0.0 },
        };

        let decoding = Self {
            input,
            stream_index,
            decoder,
            scaler,
            eof_sent: false,
            decoded: 0,
        };
        Ok((decoding, properties))
    }

    fn next_packet(&mut self) -> Option<ffmpeg::Packet> {
        for (stream, packet) in self.input.packets() {
            if stream.index() == self.stream_index {
                return Some(packet);
            }
        }
        None
    }
}

pub struct FfmpegSource {
    path: PathBuf,
    decoding: Decoding,
    properties: VideoProperties,
    /// Absolute index of the frame the next read returns
    position: u64,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self, ParkError> {
        let (decoding, properties) = Decoding::open(path)?;
        log::debug!("Opened {} with ffmpeg: {:?}", path.display(), properties);

        Ok(Self {
            path: path.to_path_buf(),
            decoding,
            properties,
            position: 0,
        })
    }
}

impl FrameSource for FfmpegSource {
    fn properties(&self) -> VideoProperties {
        self.properties
    }

    /// Frame-accurate: decodes and discards frames before `index`.
    /// Seeking backwards reopens the input.
    fn seek(&mut self, index: u64) -> Result<()> {
        if index < self.decoding.decoded {
            log::debug!("Rewinding {} to frame {}", self.path.display(), index);
            let (decoding, _) = Decoding::open(&self.path)?;
            self.decoding = decoding;
        }
        self.position = index;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        let state = &mut self.decoding;
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if state.decoder.receive_frame(&mut decoded).is_ok() {
                let index = state.decoded;
                state.decoded += 1;
                if index < self.position {
                    continue;
                }
                let mut rgb = ffmpeg::frame::Video::empty();
                state
                    .scaler
                    .run(&decoded, &mut rgb)
                    .context("scale frame to RGB")?;
                self.position = index + 1;
                return frame_to_image(&rgb).map(Some);
            }
            if state.eof_sent {
                return Ok(None);
            }
            match state.next_packet() {
                Some(packet) => state
                    .decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?,
                None => {
                    state.decoder.send_eof().context("flush ffmpeg decoder")?;
                    state.eof_sent = true;
                }
            }
        }
    }
}

fn frame_to_image(frame: &ffmpeg::frame::Video) -> Result<RgbImage> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = width as usize * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(
            data.get(start..start + row_bytes)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }
    RgbImage::from_raw(width, height, pixels).ok_or_else(|| anyhow!("frame buffer size mismatch"))
}

pub struct FfmpegSink {
    output: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::Video,
    scaler: Scaler,
    encoder_time_base: ffmpeg::Rational,
    properties: VideoProperties,
    next_pts: i64,
    finished: bool,
}

impl FfmpegSink {
    pub fn create(path: &Path, properties: VideoProperties) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let mut output = ffmpeg::format::output(&path)
            .with_context(|| format!("failed to create '{}'", path.display()))?;

        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4)
            .ok_or_else(|| anyhow!("ffmpeg build has no {} encoder", CODEC_TAG))?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let fps = if properties.fps > 0.0 { properties.fps } else { 30.0 };
        let frame_rate = ffmpeg::Rational::new((fps * 1000.0).round() as i32, 1000);
        let time_base = frame_rate.invert();

        let mut stream = output.add_stream(codec).context("add video stream")?;
        let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .context("create video encoder")?;
        encoder.set_width(properties.width);
        encoder.set_height(properties.height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(time_base);
        encoder.set_frame_rate(Some(frame_rate));
        if global_header {
            encoder.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }
        let encoder = encoder.open_as(codec).context("open video encoder")?;
        stream.set_parameters(&encoder);
        stream.set_time_base(time_base);

        output.write_header().context("write container header")?;

        let scaler = Scaler::get(
            Pixel::RGB24,
            properties.width,
            properties.height,
            Pixel::YUV420P,
            properties.width,
            properties.height,
            Flags::BILINEAR,
        )
        .context("create scaler")?;

        log::debug!(
            "Encoding {} as {} at {}x{}@{}",
            path.display(),
            CODEC_TAG,
            properties.width,
            properties.height,
            fps
        );

        Ok(Self {
            output,
            encoder,
            scaler,
            encoder_time_base: time_base,
            properties,
            next_pts: 0,
            finished: false,
        })
    }

    fn drain(&mut self) -> Result<()> {
        let stream_time_base = self
            .output
            .stream(0)
            .map(|s| s.time_base())
            .ok_or_else(|| anyhow!("output has no video stream"))?;
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            packet.rescale_ts(self.encoder_time_base, stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .context("write packet")?;
        }
        Ok(())
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if self.finished {
            bail!("encoder is already finished");
        }
        let (width, height) = frame.dimensions();
        if (width, height) != (self.properties.width, self.properties.height) {
            bail!(
                "frame is {}x{}, encoder expects {}x{}",
                width,
                height,
                self.properties.width,
                self.properties.height
            );
        }

        let mut rgb = ffmpeg::frame::Video::new(Pixel::RGB24, width, height);
        let stride = rgb.stride(0);
        let row_bytes = width as usize * 3;
        let src = frame.as_raw();
        let dst = rgb.data_mut(0);
        for row in 0..height as usize {
            dst[row * stride..row * stride + row_bytes]
                .copy_from_slice(&src[row * row_bytes..(row + 1) * row_bytes]);
        }

        let mut yuv = ffmpeg::frame::Video::empty();
        self.scaler.run(&rgb, &mut yuv).context("convert frame to YUV")?;
        yuv.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.encoder.send_frame(&yuv).context("send frame to encoder")?;
        self.drain()
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.encoder.send_eof().context("flush encoder")?;
        self.drain()?;
        self.output.write_trailer().context("write container trailer")?;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.next_pts as u64
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::error!("Failed to finalize video output: {:#}", e);
        }
    }
}
