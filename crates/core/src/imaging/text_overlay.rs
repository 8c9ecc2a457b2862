//! Minimal bitmap text renderer for the live FPS counter.
//!
//! Only the characters needed for `FPS: 12.3` are defined; anything else is
//! drawn as a blank cell.

use crate::shared::frame::Frame;

const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;

/// Colour of the live FPS counter.
pub const OVERLAY_GREEN: [u8; 3] = [0, 255, 0];

fn glyph(c: char) -> [u8; 7] {
    match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        _ => [0; 7],
    }
}

/// Draws `text` with its top-left corner at `(x, y)`, each font pixel
/// expanded to a `scale` x `scale` block. Pixels outside the frame are clipped.
pub fn draw_text(frame: &mut Frame, text: &str, x: u32, y: u32, scale: u32, color: [u8; 3]) {
    let scale = scale.max(1);
    let (fw, fh) = frame.dimensions();
    let advance = (GLYPH_W + 1) * scale;
    let mut arr = frame.as_ndarray_mut();

    for (i, ch) in text.chars().enumerate() {
        let origin_x = x + i as u32 * advance;
        let rows = glyph(ch);
        for (gy, bits) in rows.iter().enumerate() {
            for gx in 0..GLYPH_W {
                if bits & (1 << (GLYPH_W - 1 - gx)) == 0 {
                    continue;
                }
                for sy in 0..scale {
                    for sx in 0..scale {
                        let px = origin_x + gx * scale + sx;
                        let py = y + gy as u32 * scale + sy;
                        if px >= fw || py >= fh {
                            continue;
                        }
                        for (c, value) in color.iter().enumerate() {
                            arr[[py as usize, px as usize, c]] = *value;
                        }
                    }
                }
            }
        }
    }
}

/// Draws `FPS: x.y` in the top-left corner.
pub fn draw_fps(frame: &mut Frame, fps: f64) {
    let scale = (frame.height() / 240).max(1);
    let label = format!("FPS: {fps:.1}");
    draw_text(frame, &label, 10, 10, scale, OVERLAY_GREEN);
}
