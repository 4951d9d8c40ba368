use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use shutter_core::builder::{CaptureConfig, PostCapture};
use shutter_core::error::CameraError;
use shutter_core::traits::Driver;
use shutter_core::types::{CameraId, DeviceState, DisplayOrientation, Rotation, SurfaceId};

use super::event::{CameraEvent, Request};
use crate::device::{DeviceHandle, PreviewChange};
use crate::pending::PendingBuffer;
use crate::store::FrameStore;

/// 指令：UI 线程发送给后台 Worker 的命令
#[derive(Debug)]
pub(crate) enum Command {
    Open(CameraId),
    Capture,
    Release,
    AttachSurface(SurfaceId),
    SurfaceChanged {
        width: u32,
        height: u32,
        orientation: DisplayOrientation,
    },
    DetachSurface,
    SetRotation(Rotation),
    /// 只用于唤醒阻塞在 recv 上的 Worker，真正的信号是 terminated 标志
    Shutdown,
}

/// 后台执行上下文
///
/// 在 Worker 线程内部构造，DeviceHandle 从创建到销毁都不离开这个线程。
pub(crate) struct Worker {
    driver: Box<dyn Driver>,
    store: Box<dyn FrameStore>,
    handle: DeviceHandle,
    config: CaptureConfig,
    events: Sender<CameraEvent>,
    terminated: Arc<AtomicBool>,
}

impl Worker {
    pub(crate) fn new(
        driver: Box<dyn Driver>,
        store: Box<dyn FrameStore>,
        config: CaptureConfig,
        events: Sender<CameraEvent>,
        terminated: Arc<AtomicBool>,
    ) -> Self {
        Self {
            driver,
            store,
            handle: DeviceHandle::new(config.rotation),
            config,
            events,
            terminated,
        }
    }

    /// Worker 线程主函数
    pub(crate) fn run(mut self, commands: Receiver<Command>, pending: Arc<PendingBuffer<Command>>) {
        // 1. 初始化驱动，失败则整个 Worker 不可用
        if let Err(e) = self.driver.initialize() {
            tracing::error!("Camera driver initialization failed: {}", e);
            self.emit(CameraEvent::failed(Request::Startup, e));
            let dropped = pending.drain();
            if !dropped.is_empty() {
                tracing::warn!(count = dropped.len(), "Dropping requests queued before startup failure");
            }
            return;
        }

        // 2. 就绪：先按顺序回放启动期间暂存的命令，再接受新命令
        let replay = pending.drain();
        tracing::debug!(count = replay.len(), "Camera worker ready");

        let mut running = true;
        for cmd in replay {
            if !self.step(cmd) {
                running = false;
                break;
            }
        }

        // 3. 循环等待指令
        if running {
            while let Ok(cmd) = commands.recv() {
                if !self.step(cmd) {
                    break;
                }
            }
        }

        // 4. 退出前一定释放硬件
        self.handle.release();
        tracing::info!("Camera worker stopped");
    }

    /// 执行一条命令；返回 false 表示 Worker 应当退出
    fn step(&mut self, cmd: Command) -> bool {
        if self.terminated.load(Ordering::Acquire) {
            tracing::debug!(?cmd, "Coordinator terminated, not executing command");
            return false;
        }

        match cmd {
            Command::Open(id) => self.open(id),
            Command::Capture => self.capture(),
            Command::Release => self.release(),
            Command::AttachSurface(surface) => self.attach_surface(surface),
            Command::SurfaceChanged {
                width,
                height,
                orientation,
            } => self.surface_changed(width, height, orientation),
            Command::DetachSurface => {
                let was_running = self.preview_running();
                self.handle.detach_surface();
                if was_running {
                    self.emit(CameraEvent::PreviewStopped);
                }
            }
            Command::SetRotation(rotation) => self.handle.set_rotation(rotation),
            Command::Shutdown => return false,
        }
        true
    }

    fn preview_running(&self) -> bool {
        self.handle.state() == DeviceState::PreviewRunning
    }

    fn open(&mut self, id: CameraId) {
        tracing::debug!(camera = %id, "Opening camera");
        let was_running = self.preview_running();

        let result = self
            .handle
            .open(&*self.driver, id, self.config.auto_focus)
            .and_then(|()| self.handle.snapshot());

        if was_running {
            self.emit(CameraEvent::PreviewStopped);
        }

        match result {
            Ok(device) => self.emit(CameraEvent::Opened(device)),
            Err(e) => {
                tracing::warn!(camera = %id, "Failed to open camera: {}", e);
                self.emit(CameraEvent::failed(Request::Open(id), e));
            }
        }
    }

    fn capture(&mut self) {
        // 拍照不排队重试：没有设备就直接丢弃
        if !self.handle.is_open() {
            tracing::debug!("{}; dropping capture request", CameraError::NoActiveDevice);
            return;
        }

        let was_running = self.preview_running();
        let frame = match self.handle.capture() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Capture failed: {}", e);
                self.emit(CameraEvent::failed(Request::Capture, e));
                return;
            }
        };

        // 1. 帧的所有权立即交给持久化组件
        let saved = self.store.persist(frame);

        // 2. 有些硬件拍照后不会自动停预览，这里显式停止
        if self.config.post_capture == PostCapture::StopPreview {
            self.handle.stop_preview();
        }
        if was_running && !self.preview_running() {
            self.emit(CameraEvent::PreviewStopped);
        }

        match saved {
            Ok(path) => {
                tracing::info!(path = %path.display(), "Picture ready");
                self.emit(CameraEvent::Captured(path));
            }
            Err(e) => {
                tracing::warn!("Failed to persist picture: {}", e);
                self.emit(CameraEvent::failed(Request::Capture, e));
            }
        }
    }

    fn release(&mut self) {
        if !self.handle.is_open() {
            return;
        }
        let was_running = self.preview_running();
        self.handle.release();
        if was_running {
            self.emit(CameraEvent::PreviewStopped);
        }
    }

    fn attach_surface(&mut self, surface: SurfaceId) {
        if let Err(e) = self.handle.attach_surface(surface) {
            tracing::warn!("Failed to attach preview surface: {}", e);
            self.emit(CameraEvent::failed(Request::Preview, e));
            return;
        }
        if self.handle.is_open() && self.handle.preview_size().is_some() {
            self.start_preview();
        }
    }

    fn surface_changed(&mut self, width: u32, height: u32, orientation: DisplayOrientation) {
        if !self.handle.is_open() {
            tracing::debug!("{}; ignoring surface change", CameraError::NoActiveDevice);
            return;
        }

        let was_running = self.preview_running();
        match self.handle.adjust_preview_size(width, height, orientation) {
            Ok(PreviewChange::Applied {
                size,
                running: true,
            }) => self.emit(CameraEvent::PreviewStarted(size)),
            Ok(PreviewChange::Applied { running: false, .. }) => {
                if was_running {
                    self.emit(CameraEvent::PreviewStopped);
                }
            }
            Ok(PreviewChange::Unchanged(_)) => {
                // 尺寸没变但预览可能已被拍照停掉，有 Surface 就重新拉起
                if self.handle.surface().is_some() {
                    self.start_preview();
                }
            }
            Err(e) => {
                tracing::warn!(width, height, "Failed to adjust preview size: {}", e);
                if was_running && !self.preview_running() {
                    self.emit(CameraEvent::PreviewStopped);
                }
                self.emit(CameraEvent::failed(Request::Preview, e));
            }
        }
    }

    fn start_preview(&mut self) {
        match self.handle.start_preview() {
            Ok(true) => {
                if let Some(size) = self.handle.preview_size() {
                    self.emit(CameraEvent::PreviewStarted(size));
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("Failed to start preview: {}", e);
                self.emit(CameraEvent::failed(Request::Preview, e));
            }
        }
    }

    /// 发送响应；shutdown 之后的结果直接丢弃
    fn emit(&self, event: CameraEvent) {
        if self.terminated.load(Ordering::Acquire) {
            tracing::debug!(?event, "{}", CameraError::StaleResponse);
            return;
        }
        if self.events.send(event).is_err() {
            tracing::debug!("Event receiver dropped");
        }
    }
}
