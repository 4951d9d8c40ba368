//! UI 侧的预览绑定
//!
//! 把界面生命周期 (可见 / 隐藏、Surface 创建 / 销毁 / 测量) 翻译成协调器请求，
//! 并根据回来的事件维护 UI 自己的状态。只在 UI 线程上使用。

use shutter_core::preview;
use shutter_core::types::{CameraId, DisplayOrientation, Rect, Resolution, SurfaceId};

use crate::coordinator::{CameraCoordinator, CameraEvent, Request};
use crate::device::OpenedDevice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Measured {
    width: u32,
    height: u32,
    orientation: DisplayOrientation,
}

#[derive(Debug)]
pub struct PreviewBinding {
    camera: CameraId,
    visible: bool,
    surface: Option<SurfaceId>,
    measured: Option<Measured>,
    device: Option<OpenedDevice>,
    preview_size: Option<Resolution>,
    previewing: bool,
}

impl PreviewBinding {
    pub fn new<T: Into<CameraId>>(camera: T) -> Self {
        Self {
            camera: camera.into(),
            visible: false,
            surface: None,
            measured: None,
            device: None,
            preview_size: None,
            previewing: false,
        }
    }

    pub fn camera(&self) -> CameraId {
        self.camera
    }

    /// 最近一次打开成功的设备
    pub fn device(&self) -> Option<&OpenedDevice> {
        self.device.as_ref()
    }

    pub fn preview_size(&self) -> Option<Resolution> {
        self.preview_size
    }

    pub fn is_previewing(&self) -> bool {
        self.previewing
    }

    /// 界面可见：打开摄像头
    pub fn resume(&mut self, coordinator: &CameraCoordinator) {
        self.visible = true;
        coordinator.request_open(self.camera);
    }

    /// 界面隐藏：释放摄像头，隐藏期间绝不持有设备
    pub fn pause(&mut self, coordinator: &CameraCoordinator) {
        self.visible = false;
        coordinator.request_release();
        self.device = None;
        self.preview_size = None;
        self.previewing = false;
    }

    /// 切换摄像头；界面可见时立即打开新设备 (旧设备会先被释放)
    pub fn switch_camera<T: Into<CameraId>>(&mut self, coordinator: &CameraCoordinator, camera: T) {
        self.camera = camera.into();
        if self.visible {
            coordinator.request_open(self.camera);
        }
    }

    pub fn surface_created(&mut self, coordinator: &CameraCoordinator, surface: SurfaceId) {
        self.surface = Some(surface);
        coordinator.attach_surface(surface);
    }

    pub fn surface_destroyed(&mut self, coordinator: &CameraCoordinator) {
        if self.surface.take().is_some() {
            coordinator.detach_surface();
        }
        self.previewing = false;
    }

    /// Surface 完成测量；尺寸或横竖屏有变化且设备已打开时才请求重新选择分辨率
    pub fn measured(
        &mut self,
        coordinator: &CameraCoordinator,
        width: u32,
        height: u32,
        orientation: DisplayOrientation,
    ) {
        let measured = Measured {
            width,
            height,
            orientation,
        };
        if self.measured == Some(measured) {
            return;
        }
        self.measured = Some(measured);
        if self.device.is_some() {
            coordinator.surface_changed(width, height, orientation);
        }
    }

    /// 拍照停掉预览后重新拉起
    pub fn restart_preview(&self, coordinator: &CameraCoordinator) {
        if let (Some(m), Some(_)) = (self.measured, self.device.as_ref()) {
            coordinator.surface_changed(m.width, m.height, m.orientation);
        }
    }

    /// 根据协调器事件更新 UI 状态
    pub fn observe(&mut self, coordinator: &CameraCoordinator, event: &CameraEvent) {
        match event {
            CameraEvent::Opened(device) => {
                self.device = Some(device.clone());
                self.preview_size = None;
                self.previewing = false;
                // 测量早于设备就绪，这里补发
                if let Some(m) = self.measured {
                    coordinator.surface_changed(m.width, m.height, m.orientation);
                }
            }
            CameraEvent::PreviewStarted(size) => {
                self.preview_size = Some(*size);
                self.previewing = true;
            }
            CameraEvent::PreviewStopped => self.previewing = false,
            CameraEvent::Failed(failure) => {
                if let Request::Open(_) = failure.request {
                    self.device = None;
                    self.preview_size = None;
                    self.previewing = false;
                }
            }
            CameraEvent::Captured(_) => {}
        }
    }

    /// 预览 Surface 在容器内的位置
    pub fn layout(&self, container: Resolution) -> Rect {
        preview::fit_centered(container, self.preview_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_fills_container_until_a_size_is_known() {
        let binding = PreviewBinding::new(0);
        let rect = binding.layout(Resolution::new(640, 480));
        assert_eq!((rect.width(), rect.height()), (640, 480));
    }
}
