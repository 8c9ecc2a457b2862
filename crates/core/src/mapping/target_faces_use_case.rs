use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::detection::domain::face_analyser::FaceAnalyser;
use crate::shared::constants::MAPPER_THUMBNAIL_SIZE;
use crate::shared::math::cluster;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_reader::VideoReader;

use super::domain::face_map::FaceCrop;
use super::domain::face_matcher::DEFAULT_MATCH_THRESHOLD;

/// Boxes overlapping at least this much are the same face when no embedding
/// is available.
const SAME_FACE_IOU: f64 = 0.5;

/// Progress callback: `(frames_done, total_frames)`; returning `false` cancels.
pub type ProgressCallback = Box<dyn Fn(usize, usize) -> bool + Send>;

/// Scans a target image or video for the distinct faces in it.
///
/// Every `sample_stride`-th frame is analysed. Detections are grouped into
/// identities and the largest crop of each identity is kept, ordered by first
/// appearance. The result seeds a face map with one entry per target face.
pub struct TargetFacesUseCase {
    reader: Box<dyn VideoReader>,
    analyser: Arc<dyn FaceAnalyser>,
    sample_stride: usize,
    on_progress: Option<ProgressCallback>,
}

impl TargetFacesUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        analyser: Arc<dyn FaceAnalyser>,
        sample_stride: usize,
        on_progress: Option<ProgressCallback>,
    ) -> Self {
        Self {
            reader,
            analyser,
            sample_stride: sample_stride.max(1),
            on_progress,
        }
    }

    pub fn execute(&mut self, target: &Path) -> Result<Vec<FaceCrop>, Box<dyn std::error::Error>> {
        let metadata = self.reader.open(target)?;
        let total_frames = metadata.total_frames;
        let stride = self.sample_stride;

        // (frame position, crop)
        let mut detections: Vec<(usize, FaceCrop)> = Vec::new();
        let scanned = scan_frames(
            self.reader.as_mut(),
            self.analyser.as_ref(),
            stride,
            total_frames,
            self.on_progress.as_ref(),
            &mut detections,
        );
        self.reader.close();
        scanned?;

        log::debug!(
            "Target scan of {} found {} detections",
            target.display(),
            detections.len()
        );
        Ok(unique_faces(detections))
    }
}

fn scan_frames(
    reader: &mut dyn VideoReader,
    analyser: &dyn FaceAnalyser,
    stride: usize,
    total_frames: usize,
    on_progress: Option<&ProgressCallback>,
    detections: &mut Vec<(usize, FaceCrop)>,
) -> Result<(), Box<dyn std::error::Error>> {
    for (position, frame) in reader.frames().enumerate() {
        let frame = frame?;
        if position % stride == 0 {
            for face in analyser.detect_faces(&frame)? {
                if let Some(crop) = FaceCrop::from_image(&frame, face) {
                    detections.push((position, crop));
                }
            }
        }
        if let Some(callback) = on_progress {
            if !callback(position + 1, total_frames) {
                return Err("Cancelled".into());
            }
        }
    }
    Ok(())
}

fn same_face(a: &FaceCrop, b: &FaceCrop) -> bool {
    match a.descriptor.similarity(&b.descriptor) {
        Some(s) => s >= DEFAULT_MATCH_THRESHOLD,
        None => a.descriptor.bbox.iou(&b.descriptor.bbox) >= SAME_FACE_IOU,
    }
}

fn unique_faces(detections: Vec<(usize, FaceCrop)>) -> Vec<FaceCrop> {
    let groups = cluster(detections.len(), |i, j| {
        same_face(&detections[i].1, &detections[j].1)
    });

    // detections are in frame order, so each group's first member is its
    // first appearance and the group order is already by first appearance
    groups
        .into_iter()
        .filter_map(|members| {
            members
                .into_iter()
                .map(|i| &detections[i].1)
                .max_by(|a, b| {
                    a.descriptor
                        .bbox
                        .area()
                        .partial_cmp(&b.descriptor.bbox.area())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .cloned()
        })
        .collect()
}

/// Saves each crop as a square mapper thumbnail named by its position.
pub fn write_thumbnails(
    crops: &[FaceCrop],
    writer: &dyn ImageWriter,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let size = Some((MAPPER_THUMBNAIL_SIZE, MAPPER_THUMBNAIL_SIZE));
    crops
        .iter()
        .enumerate()
        .map(|(i, crop)| {
            let path = output_dir.join(format!("{i}.png"));
            writer.write(&path, &crop.image, size)?;
            Ok(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_descriptor::{BoundingBox, FaceDescriptor};
    use crate::shared::frame::Frame;
    use crate::shared::video_metadata::VideoMetadata;
    use std::collections::HashMap;
    use std::sync::Mutex;

    // --- Stubs ---

    struct StubReader {
        frames: Vec<Frame>,
        closed: Arc<Mutex<bool>>,
    }

    impl StubReader {
        fn new(count: usize) -> Self {
            Self {
                frames: (0..count)
                    .map(|i| Frame::filled(100, 100, [i as u8, 0, 0], i))
                    .collect(),
                closed: Arc::new(Mutex::new(false)),
            }
        }
    }

    impl VideoReader for StubReader {
        fn open(&mut self, _path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            Ok(VideoMetadata {
                width: 100,
                height: 100,
                fps: 30.0,
                total_frames: self.frames.len(),
                codec: "stub".into(),
                source_path: None,
            })
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            Box::new(self.frames.drain(..).map(Ok))
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    /// Faces keyed by frame index.
    struct StubAnalyser {
        faces: HashMap<usize, Vec<FaceDescriptor>>,
        calls: Arc<Mutex<Vec<usize>>>,
    }

    impl FaceAnalyser for StubAnalyser {
        fn detect_faces(
            &self,
            frame: &Frame,
        ) -> Result<Vec<FaceDescriptor>, Box<dyn std::error::Error>> {
            self.calls.lock().unwrap().push(frame.index());
            Ok(self.faces.get(&frame.index()).cloned().unwrap_or_default())
        }
    }

    struct StubImageWriter {
        written: Arc<Mutex<Vec<(PathBuf, Option<(u32, u32)>)>>>,
    }

    impl ImageWriter for StubImageWriter {
        fn write(
            &self,
            path: &Path,
            _frame: &Frame,
            size: Option<(u32, u32)>,
        ) -> Result<(), Box<dyn std::error::Error>> {
            self.written.lock().unwrap().push((path.to_path_buf(), size));
            Ok(())
        }
    }

    fn face(x: f32, size: f32, embedding: Option<Vec<f32>>) -> FaceDescriptor {
        let d = FaceDescriptor::new(BoundingBox::new(x, 10.0, x + size, 10.0 + size), 0.9);
        match embedding {
            Some(e) => d.with_embedding(e),
            None => d,
        }
    }

    fn stub_analyser(
        faces: Vec<(usize, Vec<FaceDescriptor>)>,
    ) -> (Arc<StubAnalyser>, Arc<Mutex<Vec<usize>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let analyser = Arc::new(StubAnalyser {
            faces: faces.into_iter().collect(),
            calls: calls.clone(),
        });
        (analyser, calls)
    }

    #[test]
    fn test_groups_by_embedding_and_keeps_largest_crop() {
        let alice = vec![1.0, 0.0];
        let bob = vec![0.0, 1.0];
        let first_frame = vec![
            face(10.0, 20.0, Some(alice.clone())),
            face(60.0, 20.0, Some(bob.clone())),
        ];
        let (analyser, _) = stub_analyser(vec![
            (0, first_frame),
            (1, vec![face(12.0, 30.0, Some(alice.clone()))]),
            (2, vec![face(55.0, 25.0, Some(bob))]),
        ]);

        let mut use_case = TargetFacesUseCase::new(Box::new(StubReader::new(3)), analyser, 1, None);
        let faces = use_case.execute(Path::new("target.mp4")).unwrap();

        assert_eq!(faces.len(), 2);
        // alice first (seen left-most at frame 0 before bob), largest crop from frame 1
        assert_eq!(faces[0].image.dimensions(), (30, 30));
        let alice_embedding = faces[0].descriptor.embedding.as_deref();
        assert_eq!(alice_embedding, Some(&[1.0, 0.0][..]));
        assert_eq!(faces[1].image.dimensions(), (25, 25));
    }

    #[test]
    fn test_groups_by_overlap_without_embeddings() {
        let (analyser, _) = stub_analyser(vec![
            (0, vec![face(10.0, 20.0, None)]),
            (1, vec![face(11.0, 20.0, None), face(70.0, 20.0, None)]),
        ]);

        let mut use_case = TargetFacesUseCase::new(Box::new(StubReader::new(2)), analyser, 1, None);
        let faces = use_case.execute(Path::new("target.mp4")).unwrap();
        assert_eq!(faces.len(), 2);
    }

    #[test]
    fn test_sample_stride_skips_frames() {
        let (analyser, calls) = stub_analyser(vec![]);
        let mut use_case = TargetFacesUseCase::new(Box::new(StubReader::new(7)), analyser, 3, None);
        let faces = use_case.execute(Path::new("target.mp4")).unwrap();

        assert!(faces.is_empty());
        assert_eq!(*calls.lock().unwrap(), vec![0, 3, 6]);
    }

    #[test]
    fn test_cancellation_stops_scan_and_closes_reader() {
        let (analyser, calls) = stub_analyser(vec![]);
        let reader = StubReader::new(10);
        let closed = reader.closed.clone();
        let mut use_case = TargetFacesUseCase::new(
            Box::new(reader),
            analyser,
            1,
            Some(Box::new(|current, _total| current < 2)),
        );

        assert!(use_case.execute(Path::new("target.mp4")).is_err());
        assert_eq!(calls.lock().unwrap().len(), 2);
        assert!(*closed.lock().unwrap());
    }

    #[test]
    fn test_write_thumbnails_uses_mapper_size() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let writer = StubImageWriter {
            written: written.clone(),
        };
        let crop = FaceCrop {
            image: Frame::filled(30, 40, [0, 0, 0], 0),
            descriptor: face(0.0, 30.0, None),
        };

        let crops = [crop.clone(), crop];
        let paths = write_thumbnails(&crops, &writer, Path::new("/tmp/faces")).unwrap();

        let expected = vec![
            PathBuf::from("/tmp/faces/0.png"),
            PathBuf::from("/tmp/faces/1.png"),
        ];
        assert_eq!(paths, expected);
        let written = written.lock().unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].1, Some((120, 120)));
    }
}
