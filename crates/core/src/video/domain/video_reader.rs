use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Reads frames from a video or image source.
///
/// Implementations handle codec and container details while sessions work
/// with the abstract `Frame` and `VideoMetadata` types.
pub trait VideoReader: Send {
    /// Opens a video or image file and returns its metadata.
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Returns an iterator over frames in decode order.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    /// Decodes the single frame at `index`, or `None` past the end of the
    /// stream. Still images return their only frame for any index.
    ///
    /// The default walks [`VideoReader::frames`]; readers that can seek
    /// should override it.
    fn frame_at(&mut self, index: usize) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        self.frames().nth(index).transpose()
    }

    /// Releases any resources held by the reader.
    fn close(&mut self);
}

/// Picks a [`VideoReader`] for a path.
pub trait ReaderFactory: Send + Sync {
    fn reader_for(&self, path: &Path) -> Box<dyn VideoReader>;
}

/// Opens `path`, decodes the frame at `index` and closes the reader again.
///
/// Also returns the metadata so callers can tell still images from videos.
pub fn read_frame_at(
    readers: &dyn ReaderFactory,
    path: &Path,
    index: usize,
) -> Result<(VideoMetadata, Option<Frame>), Box<dyn std::error::Error>> {
    let mut reader = readers.reader_for(path);
    let metadata = reader.open(path)?;
    let frame = reader.frame_at(index);
    reader.close();
    Ok((metadata, frame?))
}
