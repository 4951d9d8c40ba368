//! 独占硬件句柄的生命周期包装
//!
//! `Closed -> Open -> PreviewRunning -> Open -> Closed`
//!
//! `DeviceHandle` 只存在于后台 Worker 线程上，UI 线程永远拿不到它。

use shutter_core::error::{CameraError, Result};
use shutter_core::frame::CapturedFrame;
use shutter_core::preview;
use shutter_core::traits::{CameraDevice, Capabilities, Driver};
use shutter_core::types::{
    CameraId, DeviceState, DisplayOrientation, FocusMode, Resolution, Rotation, SensorInfo,
    SurfaceId,
};

/// 打开成功后交给 UI 侧的快照 (不含硬件句柄本身)
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedDevice {
    pub camera: CameraId,
    pub sensor: SensorInfo,
    /// 已应用到设备上的显示旋转角度
    pub display_orientation: u32,
    pub supported_sizes: Vec<Resolution>,
}

/// 预览尺寸调整的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewChange {
    /// 选出的尺寸与当前一致，什么都没做
    Unchanged(Resolution),
    /// 已切换到新尺寸；`running` 表示预览是否已重新启动
    Applied { size: Resolution, running: bool },
}

pub struct DeviceHandle {
    device: Option<Box<dyn CameraDevice>>,
    camera: Option<CameraId>,
    sensor: SensorInfo,
    state: DeviceState,
    surface: Option<SurfaceId>,
    preview_size: Option<Resolution>,
    rotation: Rotation,
    display_orientation: u32,
    sequence: u64,
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("camera", &self.camera)
            .field("state", &self.state)
            .field("surface", &self.surface)
            .field("preview_size", &self.preview_size)
            .field("display_orientation", &self.display_orientation)
            .finish()
    }
}

impl Default for DeviceHandle {
    fn default() -> Self {
        Self::new(Rotation::Deg0)
    }
}

impl DeviceHandle {
    pub fn new(rotation: Rotation) -> Self {
        Self {
            device: None,
            camera: None,
            sensor: SensorInfo::default(),
            state: DeviceState::Closed,
            surface: None,
            preview_size: None,
            rotation,
            display_orientation: 0,
            sequence: 0,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != DeviceState::Closed
    }

    pub fn camera(&self) -> Option<CameraId> {
        self.camera
    }

    pub fn preview_size(&self) -> Option<Resolution> {
        self.preview_size
    }

    pub fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }

    pub fn display_orientation(&self) -> u32 {
        self.display_orientation
    }

    /// 打开摄像头
    ///
    /// 先隐式释放当前句柄，保证任何时刻最多只有一个设备处于打开状态。
    /// 失败时句柄保持 Closed，错误统一为 `DeviceUnavailable`。
    pub fn open(&mut self, driver: &dyn Driver, id: CameraId, auto_focus: bool) -> Result<()> {
        // 1. 释放旧设备
        self.release();

        // 2. 传感器信息 + 打开硬件
        let sensor = driver
            .sensor_info(id)
            .map_err(|e| CameraError::unavailable(id, e))?;
        let mut device = driver.open(id).map_err(|e| CameraError::unavailable(id, e))?;

        // 3. 每次打开都重新计算方向补偿；硬件不支持旋转时只上报角度，由渲染端处理
        let degrees = preview::display_orientation(sensor, self.rotation);
        if device.capabilities().contains(Capabilities::DISPLAY_ORIENTATION) {
            if let Err(e) = device.set_display_orientation(degrees) {
                tracing::warn!(camera = %id, degrees, "Failed to set display orientation: {}", e);
            }
        }

        // 4. 自动对焦 (可选能力)
        if auto_focus && device.capabilities().contains(Capabilities::AUTO_FOCUS) {
            if let Err(e) = device.set_focus_mode(FocusMode::Auto) {
                tracing::warn!(camera = %id, "Failed to enable auto focus: {}", e);
            }
        }

        // 5. Surface 早于设备就绪时，这里补上绑定
        if let Some(surface) = self.surface {
            if let Err(e) = device.set_preview_surface(Some(surface)) {
                tracing::warn!(camera = %id, "Failed to bind preview surface: {}", e);
            }
        }

        tracing::info!(camera = %id, degrees, "Camera opened");
        self.device = Some(device);
        self.camera = Some(id);
        self.sensor = sensor;
        self.display_orientation = degrees;
        self.state = DeviceState::Open;
        self.sequence = 0;
        Ok(())
    }

    /// 当前设备的快照
    pub fn snapshot(&self) -> Result<OpenedDevice> {
        let device = self.device.as_ref().ok_or(CameraError::NoActiveDevice)?;
        let camera = self.camera.ok_or(CameraError::NoActiveDevice)?;
        let supported_sizes = device.supported_preview_sizes().unwrap_or_else(|e| {
            tracing::warn!(camera = %camera, "Failed to query preview sizes: {}", e);
            Vec::new()
        });
        Ok(OpenedDevice {
            camera,
            sensor: self.sensor,
            display_orientation: self.display_orientation,
            supported_sizes,
        })
    }

    /// 更新屏幕旋转；设备已打开时立即重新应用方向补偿
    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
        if let Some(device) = self.device.as_mut() {
            let degrees = preview::display_orientation(self.sensor, rotation);
            if !device.capabilities().contains(Capabilities::DISPLAY_ORIENTATION) {
                self.display_orientation = degrees;
                return;
            }
            match device.set_display_orientation(degrees) {
                Ok(()) => self.display_orientation = degrees,
                Err(e) => tracing::warn!(degrees, "Failed to update display orientation: {}", e),
            }
        }
    }

    /// 绑定预览 Surface (Surface 创建时调用)
    pub fn attach_surface(&mut self, surface: SurfaceId) -> Result<()> {
        self.surface = Some(surface);
        if let Some(device) = self.device.as_mut() {
            device.set_preview_surface(Some(surface))?;
        }
        Ok(())
    }

    /// 解绑 Surface (Surface 销毁时调用)，先停预览
    pub fn detach_surface(&mut self) {
        self.stop_preview();
        self.surface = None;
        if let Some(device) = self.device.as_mut() {
            if let Err(e) = device.set_preview_surface(None) {
                tracing::debug!("Ignoring surface unbind error: {}", e);
            }
        }
    }

    /// Surface 尺寸或横竖屏变化后重新选择预览分辨率
    ///
    /// 尺寸变化时严格按 停止预览 -> 设置尺寸 -> 重启预览 的顺序执行；
    /// 没有 Surface 时只记录尺寸，不启动预览。
    pub fn adjust_preview_size(
        &mut self,
        width: u32,
        height: u32,
        orientation: DisplayOrientation,
    ) -> Result<PreviewChange> {
        let device = self.device.as_ref().ok_or(CameraError::NoActiveDevice)?;
        let supported = device.supported_preview_sizes()?;

        tracing::debug!(width, height, ?orientation, "measured preview surface");
        let size = preview::select_preview_size(&supported, width, height, orientation)
            .ok_or(CameraError::NoSupportedResolutions)?;

        if self.preview_size == Some(size) {
            return Ok(PreviewChange::Unchanged(size));
        }

        // 1. 修改参数前必须先停预览
        self.stop_preview();

        // 2. 设置新尺寸
        if let Some(device) = self.device.as_mut() {
            device.set_preview_size(size)?;
        }
        self.preview_size = Some(size);
        tracing::info!(%size, "Preview size selected");

        // 3. 有 Surface 才能重启
        if self.surface.is_some() {
            self.start_preview()?;
        }
        Ok(PreviewChange::Applied {
            size,
            running: self.state == DeviceState::PreviewRunning,
        })
    }

    /// 启动预览；已在运行时是 no-op (返回 false)
    pub fn start_preview(&mut self) -> Result<bool> {
        let device = self.device.as_mut().ok_or(CameraError::NoActiveDevice)?;
        if self.state == DeviceState::PreviewRunning {
            return Ok(false);
        }
        if self.surface.is_none() {
            return Err(CameraError::PreviewNotReady("no preview surface attached"));
        }
        if self.preview_size.is_none() {
            return Err(CameraError::PreviewNotReady("no preview size selected"));
        }

        device.start_preview()?;
        self.state = DeviceState::PreviewRunning;
        tracing::debug!("Preview started");
        Ok(true)
    }

    /// 停止预览，幂等
    ///
    /// 硬件报告 "预览未运行" 之类的错误时视为已经停止。返回之前是否在运行。
    pub fn stop_preview(&mut self) -> bool {
        let Some(device) = self.device.as_mut() else {
            return false;
        };
        if self.state != DeviceState::PreviewRunning {
            return false;
        }

        if let Err(e) = device.stop_preview() {
            tracing::debug!("Tried to stop a non-existent preview, ignoring: {}", e);
        }
        self.state = DeviceState::Open;
        tracing::debug!("Preview stopped");
        true
    }

    /// 拍照
    pub fn capture(&mut self) -> Result<CapturedFrame> {
        let device = self.device.as_mut().ok_or(CameraError::NoActiveDevice)?;
        let camera = self.camera.ok_or(CameraError::NoActiveDevice)?;

        let auto_stops = device.capabilities().contains(Capabilities::AUTO_STOP_PREVIEW);
        let data = device.take_picture()?;
        if auto_stops && self.state == DeviceState::PreviewRunning {
            self.state = DeviceState::Open;
        }

        let frame = CapturedFrame::new(camera, self.sequence, data);
        self.sequence += 1;
        tracing::info!(camera = %camera, bytes = frame.len(), "Picture taken");
        Ok(frame)
    }

    /// 释放设备
    ///
    /// 无条件安全：先停预览，再释放硬件；错误只记日志，不向上传播。
    pub fn release(&mut self) {
        self.stop_preview();
        if let Some(mut device) = self.device.take() {
            if let Err(e) = device.release() {
                tracing::warn!(camera = ?self.camera, "Error while releasing camera: {}", e);
            } else {
                tracing::debug!(camera = ?self.camera, "Camera released");
            }
        }
        self.camera = None;
        self.state = DeviceState::Closed;
        // 新设备的尺寸列表可能不同，必须重新选择
        self.preview_size = None;
    }
}

// 句柄离开作用域时一定释放硬件
impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shutter_core::types::Facing;
    use shutter_simulation::{HwCall, SimCamera, SimDriver};

    fn open_with_surface(driver: &SimDriver) -> DeviceHandle {
        let mut handle = DeviceHandle::new(Rotation::Deg0);
        handle.attach_surface(SurfaceId(7)).unwrap();
        handle.open(driver, CameraId(0), true).unwrap();
        handle
    }

    #[test]
    fn open_applies_orientation_and_focus() {
        let driver = SimDriver::new();
        let probe = driver.probe();
        let handle = open_with_surface(&driver);

        assert_eq!(handle.state(), DeviceState::Open);
        assert_eq!(handle.display_orientation(), 90);
        let calls = probe.calls();
        assert!(calls.contains(&HwCall::SetOrientation(CameraId(0), 90)));
        assert!(calls.contains(&HwCall::SetFocus(CameraId(0), FocusMode::Auto)));
        assert!(calls.contains(&HwCall::SetSurface(CameraId(0), Some(SurfaceId(7)))));
    }

    #[test]
    fn orientation_is_reported_but_not_applied_without_capability() {
        let driver = SimDriver::with_cameras(vec![SimCamera::new(0)
            .facing(Facing::Back, 90)
            .capabilities(Capabilities::AUTO_FOCUS)]);
        let probe = driver.probe();
        let mut handle = DeviceHandle::new(Rotation::Deg0);
        handle.open(&driver, CameraId(0), false).unwrap();

        assert_eq!(handle.display_orientation(), 90);
        handle.set_rotation(Rotation::Deg90);
        assert_eq!(handle.display_orientation(), 0);
        assert_eq!(probe.count(|c| matches!(c, HwCall::SetOrientation(..))), 0);
    }

    #[test]
    fn reopen_releases_previous_device_first() {
        let driver = SimDriver::new();
        let probe = driver.probe();
        let mut handle = DeviceHandle::default();

        handle.open(&driver, CameraId(0), false).unwrap();
        handle.open(&driver, CameraId(1), false).unwrap();

        assert_eq!(handle.camera(), Some(CameraId(1)));
        assert_eq!(probe.max_simultaneous_open(), 1);
        let calls = probe.calls();
        let released = calls
            .iter()
            .position(|c| *c == HwCall::Release(CameraId(0)))
            .unwrap();
        let opened = calls
            .iter()
            .position(|c| *c == HwCall::Open(CameraId(1)))
            .unwrap();
        assert!(released < opened);
    }

    #[test]
    fn failed_open_leaves_handle_closed() {
        let driver = SimDriver::with_cameras(vec![
            SimCamera::new(0),
            SimCamera::new(1).failing_open("permission denied"),
        ]);
        let probe = driver.probe();
        let mut handle = DeviceHandle::default();
        handle.open(&driver, CameraId(0), false).unwrap();

        let err = handle.open(&driver, CameraId(1), false).unwrap_err();
        assert!(matches!(err, CameraError::DeviceUnavailable { id: CameraId(1), .. }));
        assert_eq!(handle.state(), DeviceState::Closed);
        assert_eq!(probe.open_devices(), 0);
    }

    #[test]
    fn stop_preview_twice_is_harmless() {
        let driver = SimDriver::new();
        let mut handle = open_with_surface(&driver);
        handle
            .adjust_preview_size(600, 800, DisplayOrientation::Portrait)
            .unwrap();
        assert_eq!(handle.state(), DeviceState::PreviewRunning);

        assert!(handle.stop_preview());
        assert_eq!(handle.state(), DeviceState::Open);
        assert!(!handle.stop_preview());
        assert_eq!(handle.state(), DeviceState::Open);
    }

    #[test]
    fn start_preview_requires_surface_and_size() {
        let driver = SimDriver::new();
        let mut handle = DeviceHandle::default();
        assert!(matches!(
            handle.start_preview(),
            Err(CameraError::NoActiveDevice)
        ));

        handle.open(&driver, CameraId(0), false).unwrap();
        assert!(matches!(
            handle.start_preview(),
            Err(CameraError::PreviewNotReady(_))
        ));

        handle.attach_surface(SurfaceId(1)).unwrap();
        assert!(matches!(
            handle.start_preview(),
            Err(CameraError::PreviewNotReady(_))
        ));
    }

    #[test]
    fn resize_goes_stop_set_start() {
        let driver = SimDriver::new();
        let probe = driver.probe();
        let mut handle = open_with_surface(&driver);

        let first = handle
            .adjust_preview_size(600, 800, DisplayOrientation::Portrait)
            .unwrap();
        assert_eq!(
            first,
            PreviewChange::Applied {
                size: Resolution::new(800, 600),
                running: true
            }
        );

        let same = handle
            .adjust_preview_size(600, 800, DisplayOrientation::Portrait)
            .unwrap();
        assert_eq!(same, PreviewChange::Unchanged(Resolution::new(800, 600)));

        handle
            .adjust_preview_size(720, 1280, DisplayOrientation::Portrait)
            .unwrap();
        assert_eq!(handle.preview_size(), Some(Resolution::new(1280, 720)));
        assert_eq!(handle.state(), DeviceState::PreviewRunning);

        let tail: Vec<HwCall> = probe.calls().into_iter().rev().take(3).collect();
        assert_eq!(
            tail,
            vec![
                HwCall::StartPreview(CameraId(0)),
                HwCall::SetPreviewSize(CameraId(0), Resolution::new(1280, 720)),
                HwCall::StopPreview(CameraId(0)),
            ]
        );
    }

    #[test]
    fn empty_size_list_is_reported() {
        let driver = SimDriver::with_cameras(vec![SimCamera::new(0).sizes(vec![])]);
        let mut handle = DeviceHandle::default();
        handle.open(&driver, CameraId(0), false).unwrap();
        assert!(matches!(
            handle.adjust_preview_size(600, 800, DisplayOrientation::Portrait),
            Err(CameraError::NoSupportedResolutions)
        ));
        assert_eq!(handle.state(), DeviceState::Open);
    }

    #[test]
    fn release_is_unconditional_and_idempotent() {
        let driver = SimDriver::new();
        let probe = driver.probe();
        let mut handle = open_with_surface(&driver);
        handle
            .adjust_preview_size(600, 800, DisplayOrientation::Portrait)
            .unwrap();

        handle.release();
        handle.release();
        assert_eq!(handle.state(), DeviceState::Closed);
        assert_eq!(handle.preview_size(), None);
        assert_eq!(probe.open_devices(), 0);
        assert_eq!(probe.count(|c| matches!(c, HwCall::Release(_))), 1);
    }

    #[test]
    fn capture_without_device_is_no_active_device() {
        let mut handle = DeviceHandle::default();
        assert!(matches!(handle.capture(), Err(CameraError::NoActiveDevice)));
    }

    #[test]
    fn auto_stopping_hardware_updates_state() {
        let driver = SimDriver::with_cameras(vec![SimCamera::new(0).capabilities(
            Capabilities::AUTO_STOP_PREVIEW,
        )]);
        let mut handle = open_with_surface(&driver);
        handle
            .adjust_preview_size(600, 800, DisplayOrientation::Portrait)
            .unwrap();

        let frame = handle.capture().unwrap();
        assert_eq!(frame.sequence, 0);
        assert_eq!(handle.state(), DeviceState::Open);
    }
}
