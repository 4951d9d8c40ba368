use shutter_core::builder::CaptureConfig;
use shutter_core::error::{CameraError, Result};
use shutter_core::traits::Driver;

use crate::coordinator::CameraCoordinator;
use crate::store::DirectoryStore;

/// 后端枚举，用于内部标记当前平台使用的驱动
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    V4L2,
    /// 不支持的系统，只能注入自定义 Driver
    Unsupported,
}

/// 创建当前平台驱动的工厂函数
#[allow(unreachable_code)]
pub fn create_driver() -> Result<Box<dyn Driver>> {
    #[cfg(all(feature = "linux-v4l2", target_os = "linux"))]
    {
        return Ok(Box::new(shutter_backend_v4l2::V4l2Driver::new()));
    }

    Err(CameraError::Hardware(
        "No supported backend found for this OS. Please check Cargo features.".into(),
    ))
}

/// 辅助：获取首选后端类型
pub fn default_backend() -> BackendType {
    if cfg!(all(feature = "linux-v4l2", target_os = "linux")) {
        BackendType::V4L2
    } else {
        BackendType::Unsupported
    }
}

impl CameraCoordinator {
    /// 使用平台默认驱动，并把照片写入 `config.output_dir`
    pub fn with_default_backend(config: CaptureConfig) -> Result<Self> {
        let driver = create_driver()?;
        let store = DirectoryStore::from_config(&config);
        tracing::info!(backend = ?default_backend(), dir = %store.dir().display(), "Using default camera backend");
        Self::spawn(driver, store, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_agrees_with_backend_type() {
        match default_backend() {
            BackendType::V4L2 => assert!(create_driver().is_ok()),
            BackendType::Unsupported => assert!(create_driver().is_err()),
        }
    }
}
