use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// `AV_TIME_BASE`: seek timestamps on an input context are in microseconds.
const SEEK_TIME_BASE: f64 = 1_000_000.0;

/// Decodes video frames via ffmpeg-next (libavformat + libavcodec).
///
/// Converts each decoded frame to RGB24 and wraps it in a [`Frame`].
/// [`VideoReader::frame_at`] seeks to the nearest preceding keyframe and
/// decodes forward, so scrubbing never walks the whole file.
pub struct FfmpegReader {
    input_ctx: Option<ffmpeg_next::format::context::Input>,
    video_stream_index: usize,
    metadata: Option<VideoMetadata>,
}

// Safety: FfmpegReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self {
            input_ctx: None,
            video_stream_index: 0,
            metadata: None,
        }
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) type Decoding = (
    ffmpeg_next::decoder::Video,
    ffmpeg_next::software::scaling::Context,
);

pub(crate) fn open_decoder(
    ictx: &ffmpeg_next::format::context::Input,
    stream_index: usize,
) -> Result<Decoding, Box<dyn std::error::Error>> {
    let stream = ictx
        .stream(stream_index)
        .ok_or("video stream disappeared")?;
    let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
    let decoder = codec_ctx.decoder().video()?;
    let scaler = ffmpeg_next::software::scaling::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        ffmpeg_next::format::Pixel::RGB24,
        decoder.width(),
        decoder.height(),
        ffmpeg_next::software::scaling::Flags::BILINEAR,
    )?;
    Ok((decoder, scaler))
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let ictx = ffmpeg_next::format::input(path)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            total_frames: stream.frames().max(0) as usize,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };

        self.video_stream_index = video_stream_index;
        self.metadata = Some(metadata.clone());
        self.input_ctx = Some(ictx);

        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let Some(ictx) = self.input_ctx.as_mut() else {
            return Box::new(std::iter::once(Err("FfmpegReader: not opened".into())));
        };
        let (decoder, scaler) = match open_decoder(ictx, self.video_stream_index) {
            Ok(d) => d,
            Err(e) => return Box::new(std::iter::once(Err(e))),
        };

        Box::new(FfmpegFrameIter::new(
            ictx,
            decoder,
            scaler,
            self.video_stream_index,
        ))
    }

    fn frame_at(&mut self, index: usize) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let metadata = self.metadata.as_ref().ok_or("FfmpegReader: not opened")?;
        if metadata.total_frames > 0 && index >= metadata.total_frames {
            return Ok(None);
        }
        let fps = metadata.fps;
        let ictx = self.input_ctx.as_mut().ok_or("FfmpegReader: not opened")?;

        let stream = ictx
            .stream(self.video_stream_index)
            .ok_or("video stream disappeared")?;
        let time_base = f64::from(stream.time_base());
        let start = match stream.start_time() {
            t if t == ffmpeg_next::ffi::AV_NOPTS_VALUE => 0,
            t => t,
        };

        if fps > 0.0 {
            let target_secs = index as f64 / fps + start as f64 * time_base;
            let ts = (target_secs * SEEK_TIME_BASE) as i64;
            ictx.seek(ts, ..ts)?;
        } else {
            ictx.seek(0, ..0)?;
        }

        let (decoder, scaler) = open_decoder(ictx, self.video_stream_index)?;
        let mut iter = FfmpegFrameIter::new(ictx, decoder, scaler, self.video_stream_index);

        while let Some(decoded) = iter.next_with_pts() {
            let (mut frame, pts) = decoded?;
            let position = match (pts, fps > 0.0) {
                (Some(pts), true) => ((pts - start) as f64 * time_base * fps).round() as usize,
                _ => frame.index(),
            };
            if position >= index {
                frame.set_index(index);
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.input_ctx = None;
        self.metadata = None;
    }
}

/// Lazy iterator that decodes video frames one at a time, avoiding the need
/// to buffer the entire video in memory.
struct FfmpegFrameIter<'a> {
    ictx: &'a mut ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    video_stream_index: usize,
    frame_index: usize,
    last_pts: Option<i64>,
    flushing: bool,
    done: bool,
}

impl<'a> FfmpegFrameIter<'a> {
    fn new(
        ictx: &'a mut ffmpeg_next::format::context::Input,
        decoder: ffmpeg_next::decoder::Video,
        scaler: ffmpeg_next::software::scaling::Context,
        video_stream_index: usize,
    ) -> Self {
        let width = decoder.width();
        let height = decoder.height();
        Self {
            ictx,
            decoder,
            scaler,
            width,
            height,
            video_stream_index,
            frame_index: 0,
            last_pts: None,
            flushing: false,
            done: false,
        }
    }

    /// Next frame together with its presentation timestamp.
    fn next_with_pts(
        &mut self,
    ) -> Option<Result<(Frame, Option<i64>), Box<dyn std::error::Error>>> {
        let item = self.next()?;
        Some(item.map(|frame| (frame, self.last_pts)))
    }

    fn try_receive(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_ok() {
            let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
            if let Err(e) = self.scaler.run(&decoded, &mut rgb_frame) {
                return Some(Err(Box::new(e)));
            }

            self.last_pts = decoded.timestamp();
            let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
            let frame = Frame::new(pixels, self.width, self.height, 3, self.frame_index);
            self.frame_index += 1;
            Some(Ok(frame))
        } else {
            None
        }
    }
}

impl Iterator for FfmpegFrameIter<'_> {
    type Item = Result<Frame, Box<dyn std::error::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Some(result) = self.try_receive() {
            return Some(result);
        }

        if self.flushing {
            self.done = true;
            return None;
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                if let Some(result) = self.try_receive() {
                    return Some(result);
                }
                self.done = true;
                return None;
            };

            if stream.index() != self.video_stream_index {
                continue;
            }

            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }

            if let Some(result) = self.try_receive() {
                return Some(result);
            }
        }
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer.
///
/// ffmpeg frames may have padding bytes at the end of each row (stride > width*3).
pub(crate) fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
