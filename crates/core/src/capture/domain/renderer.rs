use crate::shared::frame::Frame;

/// Display sink for processed live frames.
///
/// Fire-and-forget: a renderer that cannot show a frame logs it and moves on.
pub trait Renderer: Send {
    fn display(&mut self, frame: &Frame);

    /// Current size of the display area, when the renderer has one. Live
    /// frames are fitted to it when resizing is enabled.
    fn display_size(&self) -> Option<(u32, u32)>;
}
