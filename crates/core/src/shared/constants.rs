pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Interval over which the live FPS counter averages, in seconds.
pub const FPS_UPDATE_INTERVAL_SECS: f64 = 0.5;

/// Side length of the thumbnails shown next to each face map entry.
pub const MAPPER_THUMBNAIL_SIZE: u32 = 120;

pub const DEFAULT_CAMERA_WIDTH: u32 = 1280;
pub const DEFAULT_CAMERA_HEIGHT: u32 = 720;
pub const DEFAULT_CAMERA_FPS: u32 = 60;

pub const PREVIEW_MAX_WIDTH: u32 = 1400;
pub const PREVIEW_MAX_HEIGHT: u32 = 800;

/// Module flag that turns on the face enhancer.
pub const FACE_ENHANCER_FLAG: &str = "face_enhancer";

/// Returns true when the path carries one of [`IMAGE_EXTENSIONS`].
pub fn is_image(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::Path;

    #[rstest]
    #[case("photo.jpg", true)]
    #[case("photo.JPEG", true)]
    #[case("scan.webp", true)]
    #[case("clip.mp4", false)]
    #[case("no_extension", false)]
    fn test_is_image(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_image(Path::new(name)), expected);
    }
}
