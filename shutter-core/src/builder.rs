use std::path::PathBuf;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::error::{CameraError, Result};
use crate::types::{CameraId, Rotation};

/// 拍照完成后如何处理预览
///
/// 部分硬件拍照后不会自动停止预览，所以默认显式停止。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum PostCapture {
    #[default]
    StopPreview,
    KeepPreview,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct CaptureConfig {
    pub default_camera: CameraId,
    pub post_capture: PostCapture,
    /// 设备支持时启用自动对焦
    pub auto_focus: bool,
    /// 照片输出目录
    pub output_dir: PathBuf,
    /// 文件名前缀，生成 `<prefix><unix_millis>.jpg`
    pub file_prefix: String,
    /// 后台线程名
    pub worker_name: String,
    /// 启动时的屏幕旋转
    pub rotation: Rotation,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureConfig {
    pub fn new() -> Self {
        Self {
            default_camera: CameraId(0),
            post_capture: PostCapture::StopPreview,
            auto_focus: true,
            output_dir: std::env::temp_dir().join("shutter"),
            file_prefix: "IMG_".to_string(),
            worker_name: "shutter-camera-worker".to_string(),
            rotation: Rotation::Deg0,
        }
    }

    /// 设置默认打开的摄像头
    pub fn camera<T: Into<CameraId>>(mut self, id: T) -> Self {
        self.default_camera = id.into();
        self
    }

    pub fn post_capture(mut self, policy: PostCapture) -> Self {
        self.post_capture = policy;
        self
    }

    pub fn auto_focus(mut self, enabled: bool) -> Self {
        self.auto_focus = enabled;
        self
    }

    pub fn output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn file_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    pub fn worker_name<S: Into<String>>(mut self, name: S) -> Self {
        self.worker_name = name.into();
        self
    }

    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.file_prefix.is_empty() {
            return Err(CameraError::InvalidConfig("file_prefix must not be empty".into()));
        }
        if self.file_prefix.contains(std::path::is_separator) {
            return Err(CameraError::InvalidConfig(format!(
                "file_prefix {:?} must not contain a path separator",
                self.file_prefix
            )));
        }
        if self.worker_name.is_empty() {
            return Err(CameraError::InvalidConfig("worker_name must not be empty".into()));
        }
        Ok(())
    }

    /// 从 JSON 读取配置，缺失字段取默认值
    #[cfg(feature = "serialize")]
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| CameraError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "serialize")]
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| CameraError::InvalidConfig(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = CaptureConfig::new()
            .camera(1)
            .post_capture(PostCapture::KeepPreview)
            .auto_focus(false)
            .file_prefix("BEAR_");

        assert_eq!(config.default_camera, CameraId(1));
        assert_eq!(config.post_capture, PostCapture::KeepPreview);
        assert!(!config.auto_focus);
        assert_eq!(config.file_prefix, "BEAR_");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_prefix() {
        assert!(CaptureConfig::new().file_prefix("").validate().is_err());
        assert!(CaptureConfig::new().file_prefix("a/b").validate().is_err());
    }

    #[cfg(feature = "serialize")]
    #[test]
    fn json_fills_missing_fields() -> anyhow::Result<()> {
        let config = CaptureConfig::from_json(r#"{ "default_camera": 1, "rotation": "Deg90" }"#)?;
        assert_eq!(config.default_camera, CameraId(1));
        assert_eq!(config.rotation, Rotation::Deg90);
        assert_eq!(config.post_capture, PostCapture::StopPreview);
        assert_eq!(config.file_prefix, "IMG_");

        let again = CaptureConfig::from_json(&config.to_json()?)?;
        assert_eq!(again, config);
        Ok(())
    }

    #[cfg(feature = "serialize")]
    #[test]
    fn json_rejects_invalid_values() {
        assert!(CaptureConfig::from_json(r#"{ "file_prefix": "" }"#).is_err());
        assert!(CaptureConfig::from_json("not json").is_err());
    }
}
