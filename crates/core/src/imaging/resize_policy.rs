//! Output-size policies for displaying frames inside a bounding box.

/// Live-feed resize: scale so the dominant axis of the box is honoured.
///
/// When the box is wider than tall (`box_w > box_h`) the frame is scaled to
/// the box height; otherwise (including square boxes) to the box width. Only
/// that one axis is bounded, so the other may overflow the box.
pub fn fit_to_size(width: u32, height: u32, box_w: u32, box_h: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let scale = if box_w > box_h {
        box_h as f64 / height as f64
    } else {
        box_w as f64 / width as f64
    };
    scaled(width, height, scale)
}

/// Preview resize: the largest size that keeps the whole frame inside the box.
pub fn contain_size(width: u32, height: u32, box_w: u32, box_h: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let scale = (box_w as f64 / width as f64).min(box_h as f64 / height as f64);
    let (w, h) = scaled(width, height, scale);
    (w.max(1), h.max(1))
}

fn scaled(width: u32, height: u32, scale: f64) -> (u32, u32) {
    (
        (scale * width as f64).round() as u32,
        (scale * height as f64).round() as u32,
    )
}
