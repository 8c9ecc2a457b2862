use image::imageops::FilterType;
use image::RgbImage;

use crate::detection::domain::face_descriptor::{BoundingBox, PixelRect};
use crate::shared::frame::Frame;

use super::resize_policy::{contain_size, fit_to_size};

pub fn to_rgb_image(frame: &Frame) -> Result<RgbImage, Box<dyn std::error::Error>> {
    if frame.channels() != 3 {
        return Err(format!("expected an RGB frame, got {} channels", frame.channels()).into());
    }
    RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
        .ok_or_else(|| "frame data does not match its dimensions".into())
}

pub fn from_rgb_image(img: RgbImage, index: usize) -> Frame {
    let (w, h) = img.dimensions();
    Frame::new(img.into_raw(), w, h, 3, index)
}

/// Mirror image, as seen by a user facing their own camera.
pub fn mirror_horizontal(frame: &Frame) -> Result<Frame, Box<dyn std::error::Error>> {
    let img = to_rgb_image(frame)?;
    Ok(from_rgb_image(
        image::imageops::flip_horizontal(&img),
        frame.index(),
    ))
}

pub fn resize(
    frame: &Frame,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<Frame, Box<dyn std::error::Error>> {
    if frame.dimensions() == (width, height) {
        return Ok(frame.clone());
    }
    if width == 0 || height == 0 {
        return Err(format!("cannot resize to {width}x{height}").into());
    }
    let img = to_rgb_image(frame)?;
    let resized = image::imageops::resize(&img, width, height, filter);
    Ok(from_rgb_image(resized, frame.index()))
}

/// Live-feed resize with [`fit_to_size`]; frames are returned unchanged for
/// a degenerate box.
pub fn fit_frame_to_size(
    frame: &Frame,
    box_w: u32,
    box_h: u32,
) -> Result<Frame, Box<dyn std::error::Error>> {
    if box_w == 0 || box_h == 0 {
        return Ok(frame.clone());
    }
    let (w, h) = fit_to_size(frame.width(), frame.height(), box_w, box_h);
    resize(frame, w, h, FilterType::Triangle)
}

/// Preview resize with [`contain_size`].
pub fn contain_frame(
    frame: &Frame,
    box_w: u32,
    box_h: u32,
) -> Result<Frame, Box<dyn std::error::Error>> {
    if box_w == 0 || box_h == 0 {
        return Ok(frame.clone());
    }
    let (w, h) = contain_size(frame.width(), frame.height(), box_w, box_h);
    resize(frame, w, h, FilterType::Lanczos3)
}

/// Fixed-size thumbnail used next to face map entries.
pub fn thumbnail(
    frame: &Frame,
    width: u32,
    height: u32,
) -> Result<Frame, Box<dyn std::error::Error>> {
    resize(frame, width, height, FilterType::Lanczos3)
}

/// Copies a rectangle out of the frame.
pub fn crop(frame: &Frame, rect: PixelRect) -> Frame {
    let (x, y, w, h) = rect;
    let channels = frame.channels() as usize;
    let src = frame.as_ndarray();
    let mut data = Vec::with_capacity(w as usize * h as usize * channels);

    for row in y as usize..(y + h) as usize {
        for col in x as usize..(x + w) as usize {
            for c in 0..channels {
                data.push(src[[row, col, c]]);
            }
        }
    }

    Frame::new(data, w, h, channels as u8, 0)
}

/// Crops the frame to a face box; `None` when the box lies outside the frame.
pub fn crop_to_box(frame: &Frame, bbox: &BoundingBox) -> Option<Frame> {
    let rect = bbox.to_pixel_rect(frame.width(), frame.height())?;
    Some(crop(frame, rect))
}

/// Resizes `patch` onto `rect` of `frame`, mixing with weight `opacity`
/// (0.0 keeps the frame, 1.0 replaces the rectangle).
pub fn paste_blend(
    frame: &mut Frame,
    patch: &Frame,
    rect: PixelRect,
    opacity: f32,
) -> Result<(), Box<dyn std::error::Error>> {
    let (x, y, w, h) = rect;
    if w == 0 || h == 0 || patch.is_empty() {
        return Ok(());
    }
    let opacity = opacity.clamp(0.0, 1.0);
    let scaled = resize(patch, w, h, FilterType::Triangle)?;
    let src = scaled.as_ndarray();
    let mut dst = frame.as_ndarray_mut();

    for row in 0..h as usize {
        for col in 0..w as usize {
            for c in 0..3 {
                let under = dst[[y as usize + row, x as usize + col, c]] as f32;
                let over = src[[row, col, c]] as f32;
                dst[[y as usize + row, x as usize + col, c]] =
                    (over * opacity + under * (1.0 - opacity)).round() as u8;
            }
        }
    }
    Ok(())
}
