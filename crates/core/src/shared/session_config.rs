use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use super::constants::{
    DEFAULT_CAMERA_FPS, DEFAULT_CAMERA_HEIGHT, DEFAULT_CAMERA_WIDTH, FACE_ENHANCER_FLAG,
    PREVIEW_MAX_HEIGHT, PREVIEW_MAX_WIDTH,
};
use super::session_error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            width: DEFAULT_CAMERA_WIDTH,
            height: DEFAULT_CAMERA_HEIGHT,
            fps: DEFAULT_CAMERA_FPS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewBounds {
    pub width: u32,
    pub height: u32,
}

impl Default for PreviewBounds {
    fn default() -> Self {
        Self {
            width: PREVIEW_MAX_WIDTH,
            height: PREVIEW_MAX_HEIGHT,
        }
    }
}

/// Read-only snapshot of the session switches, taken once per frame or per
/// scrub request.
///
/// Persisted as JSON; missing keys fall back to their defaults so older
/// settings files keep loading. The source and target paths belong to the
/// running session and are never written out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigSnapshot {
    pub live_mirror: bool,
    pub live_resizable: bool,
    pub show_fps: bool,
    pub map_faces: bool,
    pub nsfw_filter: bool,
    pub many_faces: bool,
    /// Blend weight of swapped faces, 0-100.
    pub face_opacity: u32,
    pub module_flags: BTreeMap<String, bool>,
    pub camera: CameraSettings,
    pub preview_max: PreviewBounds,
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
    #[serde(skip)]
    pub target_path: Option<PathBuf>,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        let mut module_flags = BTreeMap::new();
        module_flags.insert(FACE_ENHANCER_FLAG.to_string(), false);
        Self {
            live_mirror: false,
            live_resizable: false,
            show_fps: false,
            map_faces: false,
            nsfw_filter: false,
            many_faces: false,
            face_opacity: 100,
            module_flags,
            camera: CameraSettings::default(),
            preview_max: PreviewBounds::default(),
            source_path: None,
            target_path: None,
        }
    }
}

impl ConfigSnapshot {
    /// Loads settings from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, SessionError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| SessionError::Config(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| SessionError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SessionError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SessionError::Config(format!("{}: {e}", parent.display())))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| SessionError::Config(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| SessionError::Config(format!("{}: {e}", path.display())))
    }

    /// `<config dir>/Face Relay/settings.json`, or `None` on platforms
    /// without a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("Face Relay").join("settings.json"))
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.face_opacity > 100 {
            return Err(SessionError::Config(format!(
                "face_opacity must be within 0-100, got {}",
                self.face_opacity
            )));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(SessionError::Config(
                "camera resolution must be non-zero".into(),
            ));
        }
        if self.preview_max.width == 0 || self.preview_max.height == 0 {
            return Err(SessionError::Config(
                "preview bounds must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn module_enabled(&self, flag: &str) -> bool {
        self.module_flags.get(flag).copied().unwrap_or(false)
    }

    /// Face opacity as a blend weight in `[0, 1]`.
    pub fn opacity(&self) -> f32 {
        self.face_opacity.min(100) as f32 / 100.0
    }

    pub fn swap_paths(&mut self) {
        std::mem::swap(&mut self.source_path, &mut self.target_path);
    }
}

/// Anything that can hand out the current [`ConfigSnapshot`].
///
/// Sessions take a fresh snapshot at the top of every iteration so toggles
/// made by another thread apply from the next frame on.
pub trait ConfigSource: Send + Sync {
    fn snapshot(&self) -> ConfigSnapshot;
}

impl ConfigSource for ConfigSnapshot {
    fn snapshot(&self) -> ConfigSnapshot {
        self.clone()
    }
}

impl ConfigSource for Arc<RwLock<ConfigSnapshot>> {
    fn snapshot(&self) -> ConfigSnapshot {
        match self.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
