use std::path::PathBuf;

use thiserror::Error;

use crate::types::CameraId;

#[derive(Error, Debug)]
pub enum CameraError {
    /// 打开失败：设备忙、权限不足或 ID 不存在
    #[error("Camera {id} unavailable: {reason}")]
    DeviceUnavailable { id: CameraId, reason: String },

    /// 没有已打开的设备 (拍照 / 调整预览时)
    #[error("No active camera device")]
    NoActiveDevice,

    #[error("Device reported no supported preview resolutions")]
    NoSupportedResolutions,

    /// 预览条件未满足：缺少 Surface 或尚未选定分辨率
    #[error("Preview not ready: {0}")]
    PreviewNotReady(&'static str),

    /// shutdown 之后才计算出的结果
    #[error("Response produced after shutdown")]
    StaleResponse,

    #[error("Hardware error: {0}")]
    Hardware(String),

    #[error("Failed to persist picture to {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Camera worker is no longer running")]
    WorkerGone,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CameraError {
    /// 把任意底层错误归一为 DeviceUnavailable，已经是的话原样返回
    pub fn unavailable(id: CameraId, err: CameraError) -> Self {
        match err {
            e @ CameraError::DeviceUnavailable { .. } => e,
            other => CameraError::DeviceUnavailable {
                id,
                reason: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, CameraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_wraps_foreign_errors() {
        let err = CameraError::unavailable(CameraId(2), CameraError::Hardware("EBUSY".into()));
        match err {
            CameraError::DeviceUnavailable { id, reason } => {
                assert_eq!(id, CameraId(2));
                assert!(reason.contains("EBUSY"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unavailable_keeps_original_reason() {
        let original = CameraError::DeviceUnavailable {
            id: CameraId(1),
            reason: "permission denied".into(),
        };
        let err = CameraError::unavailable(CameraId(1), original);
        assert_eq!(err.to_string(), "Camera 1 unavailable: permission denied");
    }
}
