//! 仿真后端：不依赖任何硬件的内存摄像头。
//!
//! 每一次 "硬件调用" 都记录到共享的 [`SimProbe`] 里 (连同调用线程)，
//! 测试可以据此断言调用顺序、同时打开的设备数量以及线程归属。

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};

use shutter_core::error::{CameraError, Result};
use shutter_core::traits::{CameraDevice, Capabilities, DeviceInfo, Driver};
use shutter_core::types::{CameraId, Facing, FocusMode, Resolution, SensorInfo, SurfaceId};

/// 最小的 JPEG (SOI + EOI)，足够让持久化组件写出一个文件
pub const FAKE_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xD9];

/// 被记录下来的硬件调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HwCall {
    Initialize,
    Open(CameraId),
    SetOrientation(CameraId, u32),
    SetFocus(CameraId, FocusMode),
    SetSurface(CameraId, Option<SurfaceId>),
    SetPreviewSize(CameraId, Resolution),
    StartPreview(CameraId),
    StopPreview(CameraId),
    TakePicture(CameraId),
    Release(CameraId),
}

#[derive(Debug, Default)]
struct ProbeState {
    calls: Vec<(HwCall, ThreadId)>,
    open_now: usize,
    max_open: usize,
}

/// 硬件调用探针，可以 clone 后留在测试线程里观察
#[derive(Debug, Clone, Default)]
pub struct SimProbe {
    inner: Arc<Mutex<ProbeState>>,
}

impl SimProbe {
    fn state(&self) -> MutexGuard<'_, ProbeState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: HwCall) {
        tracing::trace!(target: "shutter::sim", ?call, "hardware call");
        self.state().calls.push((call, thread::current().id()));
    }

    fn device_opened(&self) {
        let mut state = self.state();
        state.open_now += 1;
        state.max_open = state.max_open.max(state.open_now);
    }

    fn device_closed(&self) {
        let mut state = self.state();
        state.open_now = state.open_now.saturating_sub(1);
    }

    /// 按发生顺序返回全部调用
    pub fn calls(&self) -> Vec<HwCall> {
        self.state().calls.iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn count(&self, pred: impl Fn(&HwCall) -> bool) -> usize {
        self.state().calls.iter().filter(|(c, _)| pred(c)).count()
    }

    /// 当前处于打开状态的设备数
    pub fn open_devices(&self) -> usize {
        self.state().open_now
    }

    /// 历史上同时打开的最大设备数
    pub fn max_simultaneous_open(&self) -> usize {
        self.state().max_open
    }

    /// 执行过硬件调用的线程集合
    pub fn hardware_threads(&self) -> HashSet<ThreadId> {
        self.state().calls.iter().map(|(_, t)| *t).collect()
    }

    /// 轮询直到条件满足或超时
    pub fn wait_for(&self, timeout: Duration, pred: impl Fn(&[HwCall]) -> bool) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if pred(&self.calls()) {
                return true;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return false;
            }
            thread::sleep(Duration::from_millis(2));
        }
    }
}

/// 一个仿真摄像头的描述
#[derive(Debug, Clone)]
pub struct SimCamera {
    pub id: CameraId,
    pub name: String,
    pub sensor: SensorInfo,
    pub sizes: Vec<Resolution>,
    pub capabilities: Capabilities,
    pub picture: Vec<u8>,
    /// Some(reason) 时 open 失败
    pub fail_open: Option<String>,
    pub fail_capture: bool,
}

impl SimCamera {
    pub fn new<T: Into<CameraId>>(id: T) -> Self {
        let id = id.into();
        Self {
            id,
            name: format!("Simulated Camera {}", id),
            sensor: SensorInfo::default(),
            sizes: vec![Resolution::new(800, 600), Resolution::new(1280, 720)],
            capabilities: Capabilities::AUTO_FOCUS | Capabilities::DISPLAY_ORIENTATION,
            picture: FAKE_JPEG.to_vec(),
            fail_open: None,
            fail_capture: false,
        }
    }

    pub fn facing(mut self, facing: Facing, orientation: u32) -> Self {
        self.sensor = SensorInfo {
            facing,
            orientation,
        };
        self
    }

    pub fn sizes(mut self, sizes: Vec<Resolution>) -> Self {
        self.sizes = sizes;
        self
    }

    pub fn capabilities(mut self, caps: Capabilities) -> Self {
        self.capabilities = caps;
        self
    }

    pub fn failing_open<S: Into<String>>(mut self, reason: S) -> Self {
        self.fail_open = Some(reason.into());
        self
    }

    pub fn failing_capture(mut self) -> Self {
        self.fail_capture = true;
        self
    }
}

/// 仿真驱动
#[derive(Debug)]
pub struct SimDriver {
    cameras: Vec<SimCamera>,
    probe: SimProbe,
    init_gate: Option<Receiver<()>>,
    open_gate: Option<Receiver<()>>,
    /// Some(reason) 时 initialize 失败
    fail_initialize: Option<String>,
}

impl Default for SimDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimDriver {
    /// 默认两颗摄像头：0 号后置 90°，1 号前置 270°
    pub fn new() -> Self {
        Self::with_cameras(vec![
            SimCamera::new(0).facing(Facing::Back, 90),
            SimCamera::new(1).facing(Facing::Front, 270),
        ])
    }

    pub fn with_cameras(cameras: Vec<SimCamera>) -> Self {
        Self {
            cameras,
            probe: SimProbe::default(),
            init_gate: None,
            open_gate: None,
            fail_initialize: None,
        }
    }

    pub fn probe(&self) -> SimProbe {
        self.probe.clone()
    }

    pub fn failing_initialize<S: Into<String>>(mut self, reason: S) -> Self {
        self.fail_initialize = Some(reason.into());
        self
    }

    /// 让 `initialize` 阻塞，直到返回的 Sender 发送一次或被 drop
    pub fn gate_initialize(&mut self) -> Sender<()> {
        let (tx, rx) = bounded(0);
        self.init_gate = Some(rx);
        tx
    }

    /// 让每次 `open` 在记录调用之后阻塞，直到 Sender 发送一次或被 drop
    pub fn gate_open(&mut self) -> Sender<()> {
        let (tx, rx) = bounded(0);
        self.open_gate = Some(rx);
        tx
    }

    fn camera(&self, id: CameraId) -> Result<&SimCamera> {
        self.cameras
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| CameraError::DeviceUnavailable {
                id,
                reason: "no such camera".into(),
            })
    }
}

impl Driver for SimDriver {
    fn initialize(&mut self) -> Result<()> {
        if let Some(gate) = &self.init_gate {
            // 发送或断开都视为放行
            let _ = gate.recv();
        }
        self.probe.record(HwCall::Initialize);
        match &self.fail_initialize {
            Some(reason) => Err(CameraError::Hardware(reason.clone())),
            None => Ok(()),
        }
    }

    fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        Ok(self
            .cameras
            .iter()
            .map(|c| DeviceInfo {
                id: c.id,
                name: c.name.clone(),
                backend: "Simulation".to_string(),
                sensor: c.sensor,
            })
            .collect())
    }

    fn sensor_info(&self, id: CameraId) -> Result<SensorInfo> {
        Ok(self.camera(id)?.sensor)
    }

    fn open(&self, id: CameraId) -> Result<Box<dyn CameraDevice>> {
        self.probe.record(HwCall::Open(id));
        if let Some(gate) = &self.open_gate {
            let _ = gate.recv();
        }

        let camera = self.camera(id)?;
        if let Some(reason) = &camera.fail_open {
            return Err(CameraError::DeviceUnavailable {
                id,
                reason: reason.clone(),
            });
        }

        self.probe.device_opened();
        Ok(Box::new(SimDevice {
            id,
            sizes: camera.sizes.clone(),
            capabilities: camera.capabilities,
            picture: camera.picture.clone(),
            fail_capture: camera.fail_capture,
            probe: self.probe.clone(),
            surface: None,
            preview_size: None,
            preview_running: false,
            released: false,
        }))
    }
}

/// 仿真设备句柄
#[derive(Debug)]
pub struct SimDevice {
    id: CameraId,
    sizes: Vec<Resolution>,
    capabilities: Capabilities,
    picture: Vec<u8>,
    fail_capture: bool,
    probe: SimProbe,
    surface: Option<SurfaceId>,
    preview_size: Option<Resolution>,
    preview_running: bool,
    released: bool,
}

impl SimDevice {
    fn ensure_live(&self) -> Result<()> {
        if self.released {
            return Err(CameraError::Hardware("device already released".into()));
        }
        Ok(())
    }
}

impl CameraDevice for SimDevice {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn supported_preview_sizes(&self) -> Result<Vec<Resolution>> {
        self.ensure_live()?;
        Ok(self.sizes.clone())
    }

    fn set_preview_size(&mut self, size: Resolution) -> Result<()> {
        self.ensure_live()?;
        self.probe.record(HwCall::SetPreviewSize(self.id, size));
        // 与真实硬件一致：预览运行中改尺寸是错误
        if self.preview_running {
            return Err(CameraError::Hardware(
                "cannot change preview size while preview is running".into(),
            ));
        }
        if !self.sizes.contains(&size) {
            return Err(CameraError::Hardware(format!("unsupported preview size {size}")));
        }
        self.preview_size = Some(size);
        Ok(())
    }

    fn set_display_orientation(&mut self, degrees: u32) -> Result<()> {
        self.ensure_live()?;
        self.probe.record(HwCall::SetOrientation(self.id, degrees));
        Ok(())
    }

    fn set_focus_mode(&mut self, mode: FocusMode) -> Result<()> {
        self.ensure_live()?;
        self.probe.record(HwCall::SetFocus(self.id, mode));
        Ok(())
    }

    fn set_preview_surface(&mut self, surface: Option<SurfaceId>) -> Result<()> {
        self.ensure_live()?;
        self.probe.record(HwCall::SetSurface(self.id, surface));
        self.surface = surface;
        Ok(())
    }

    fn start_preview(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.probe.record(HwCall::StartPreview(self.id));
        if self.surface.is_none() {
            return Err(CameraError::Hardware("no preview surface".into()));
        }
        self.preview_running = true;
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.probe.record(HwCall::StopPreview(self.id));
        if !self.preview_running {
            return Err(CameraError::Hardware("preview not running".into()));
        }
        self.preview_running = false;
        Ok(())
    }

    fn take_picture(&mut self) -> Result<Vec<u8>> {
        self.ensure_live()?;
        self.probe.record(HwCall::TakePicture(self.id));
        if self.fail_capture {
            return Err(CameraError::Hardware("capture failed".into()));
        }
        if self.capabilities.contains(Capabilities::AUTO_STOP_PREVIEW) {
            self.preview_running = false;
        }
        Ok(self.picture.clone())
    }

    fn release(&mut self) -> Result<()> {
        self.probe.record(HwCall::Release(self.id));
        if !self.released {
            self.released = true;
            self.preview_running = false;
            self.probe.device_closed();
        }
        Ok(())
    }
}

impl Drop for SimDevice {
    fn drop(&mut self) {
        if !self.released {
            self.probe.device_closed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_and_release_track_counts() -> Result<()> {
        let driver = SimDriver::new();
        let probe = driver.probe();

        let mut dev = driver.open(CameraId(0))?;
        assert_eq!(probe.open_devices(), 1);
        dev.release()?;
        dev.release()?;
        assert_eq!(probe.open_devices(), 0);
        assert_eq!(probe.max_simultaneous_open(), 1);
        Ok(())
    }

    #[test]
    fn failing_camera_reports_unavailable() {
        let driver = SimDriver::with_cameras(vec![SimCamera::new(3).failing_open("busy")]);
        match driver.open(CameraId(3)) {
            Err(CameraError::DeviceUnavailable { reason, .. }) => assert_eq!(reason, "busy"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
        assert!(matches!(
            driver.open(CameraId(9)),
            Err(CameraError::DeviceUnavailable { .. })
        ));
        assert_eq!(driver.probe().open_devices(), 0);
    }

    #[test]
    fn failing_initialize_is_recorded() {
        let mut driver = SimDriver::new().failing_initialize("no bus");
        let probe = driver.probe();
        assert!(matches!(driver.initialize(), Err(CameraError::Hardware(r)) if r == "no bus"));
        // 条件已满足时，无上限的等待立即返回
        assert!(probe.wait_for(Duration::MAX, |calls| calls == [HwCall::Initialize]));
    }

    #[test]
    fn preview_size_rejected_while_running() -> Result<()> {
        let driver = SimDriver::new();
        let mut dev = driver.open(CameraId(0))?;
        dev.set_preview_surface(Some(SurfaceId(1)))?;
        dev.set_preview_size(Resolution::new(800, 600))?;
        dev.start_preview()?;
        assert!(dev.set_preview_size(Resolution::new(1280, 720)).is_err());
        dev.stop_preview()?;
        assert!(dev.stop_preview().is_err());
        Ok(())
    }
}
