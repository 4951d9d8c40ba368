use std::path::PathBuf;

use shutter_core::error::CameraError;
use shutter_core::types::{CameraId, Resolution};

use crate::device::OpenedDevice;

/// 产生失败事件的请求类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Worker 线程初始化驱动
    Startup,
    Open(CameraId),
    Capture,
    /// attach / resize / rotation 等预览相关请求
    Preview,
}

#[derive(Debug)]
pub struct FailedRequest {
    pub request: Request,
    pub error: CameraError,
}

/// 响应：后台 Worker 发回 UI 线程的事件
#[derive(Debug)]
pub enum CameraEvent {
    /// 设备已打开
    Opened(OpenedDevice),
    /// 照片已落盘
    Captured(PathBuf),
    /// 预览以给定分辨率运行
    PreviewStarted(Resolution),
    PreviewStopped,
    /// 请求失败 (打开失败、尺寸列表为空、持久化失败 ...)
    Failed(FailedRequest),
}

impl CameraEvent {
    pub(crate) fn failed(request: Request, error: CameraError) -> Self {
        Self::Failed(FailedRequest { request, error })
    }

    /// 交给回调风格的监听者
    pub fn deliver(self, listener: &mut dyn CameraListener) {
        match self {
            Self::Opened(device) => listener.on_device_opened(device),
            Self::Captured(path) => listener.on_frame_captured(path),
            Self::PreviewStarted(size) => listener.on_preview_started(size),
            Self::PreviewStopped => listener.on_preview_stopped(),
            Self::Failed(failure) => listener.on_failed(failure),
        }
    }
}

/// 回调风格的事件接收者，所有方法都在 UI 线程上被调用
pub trait CameraListener {
    fn on_device_opened(&mut self, _device: OpenedDevice) {}

    fn on_frame_captured(&mut self, _path: PathBuf) {}

    fn on_preview_started(&mut self, _size: Resolution) {}

    fn on_preview_stopped(&mut self) {}

    fn on_failed(&mut self, failure: FailedRequest) {
        tracing::warn!(request = ?failure.request, "Camera request failed: {}", failure.error);
    }
}
