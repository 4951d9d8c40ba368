//! UI 线程与摄像头 Worker 之间的请求 / 响应协调器
//!
//! UI 线程只发送命令并立即返回；所有阻塞的硬件调用都在专属的后台线程上按
//! FIFO 顺序执行，结果以 [`CameraEvent`] 的形式回到 UI 线程自己的循环里
//! (`dispatch` / `try_next_event` / `next_event_timeout`)。

mod dispatch;
mod event;
mod worker;

pub use event::{CameraEvent, CameraListener, FailedRequest, Request};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Sender};

use shutter_core::builder::CaptureConfig;
use shutter_core::error::{CameraError, Result};
use shutter_core::traits::Driver;
use shutter_core::types::{CameraId, DisplayOrientation, Rotation, SurfaceId};

use crate::pending::PendingBuffer;
use crate::store::FrameStore;
use dispatch::EventDispatcher;
use worker::{Command, Worker};

/// 摄像头协调器
///
/// 每个实例拥有一条后台线程和至多一个打开的设备；生命周期跟随持有它的界面。
/// Drop 时会 shutdown 并等待后台线程退出 (后台退出前释放设备)。
#[derive(Debug)]
pub struct CameraCoordinator {
    cmd_tx: Sender<Command>,
    events: EventDispatcher,
    pending: Arc<PendingBuffer<Command>>,
    terminated: Arc<AtomicBool>,
    default_camera: CameraId,
    worker: Option<JoinHandle<()>>,
}

impl CameraCoordinator {
    /// 启动后台 Worker
    ///
    /// 驱动初始化在 Worker 线程上进行；在它完成之前提交的请求会被暂存，
    /// 就绪后按提交顺序回放，不会丢失。
    pub fn spawn<D, S>(driver: D, store: S, config: CaptureConfig) -> Result<Self>
    where
        D: Driver + 'static,
        S: FrameStore + 'static,
    {
        config.validate()?;

        // 1. 主线程 -> 后台 (不限容量：UI 线程提交命令永不阻塞)
        let (cmd_tx, cmd_rx) = unbounded::<Command>();
        // 2. 后台 -> 主线程
        let (event_tx, event_rx) = unbounded::<CameraEvent>();

        let pending = Arc::new(PendingBuffer::new());
        let terminated = Arc::new(AtomicBool::new(false));
        let default_camera = config.default_camera;

        let worker = {
            let pending = Arc::clone(&pending);
            let terminated = Arc::clone(&terminated);
            let driver: Box<dyn Driver> = Box::new(driver);
            let store: Box<dyn FrameStore> = Box::new(store);
            let name = config.worker_name.clone();

            thread::Builder::new().name(name).spawn(move || {
                // DeviceHandle 在线程内部创建，从不跨线程
                Worker::new(driver, store, config, event_tx, terminated).run(cmd_rx, pending);
            })?
        };

        Ok(Self {
            cmd_tx,
            events: EventDispatcher::new(event_rx, Arc::clone(&terminated)),
            pending,
            terminated,
            default_camera,
            worker: Some(worker),
        })
    }

    fn submit(&self, cmd: Command) {
        if self.is_terminated() {
            tracing::debug!(?cmd, "Coordinator terminated, dropping request");
            return;
        }
        // Worker 未就绪时暂存；已回放过则直接投递
        if let Some(cmd) = self.pending.enqueue(cmd) {
            if let Err(e) = self.cmd_tx.send(cmd) {
                tracing::warn!(cmd = ?e.into_inner(), "{}", CameraError::WorkerGone);
            }
        }
    }

    /// 请求打开摄像头 (会先释放当前设备)
    pub fn request_open<T: Into<CameraId>>(&self, id: T) {
        let id = id.into();
        tracing::debug!(camera = %id, "Queue request to open camera");
        self.submit(Command::Open(id));
    }

    /// 打开配置里的默认摄像头
    pub fn request_open_default(&self) {
        self.request_open(self.default_camera);
    }

    /// 请求拍照；执行时没有打开的设备则记录日志后丢弃
    pub fn request_capture(&self) {
        self.submit(Command::Capture);
    }

    /// 请求释放设备；幂等
    pub fn request_release(&self) {
        self.submit(Command::Release);
    }

    /// 预览 Surface 已创建
    pub fn attach_surface(&self, surface: SurfaceId) {
        self.submit(Command::AttachSurface(surface));
    }

    /// 预览 Surface 的测量尺寸或横竖屏发生变化
    pub fn surface_changed(&self, width: u32, height: u32, orientation: DisplayOrientation) {
        self.submit(Command::SurfaceChanged {
            width,
            height,
            orientation,
        });
    }

    /// 预览 Surface 即将销毁
    pub fn detach_surface(&self) {
        self.submit(Command::DetachSurface);
    }

    pub fn set_display_rotation(&self, rotation: Rotation) {
        self.submit(Command::SetRotation(rotation));
    }

    /// 标记为已终止
    ///
    /// 不打断正在执行的硬件调用；之后到达的响应在分发时被丢弃，
    /// Worker 执行完当前命令后释放设备并退出。
    pub fn shutdown(&self) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!("Quitting camera coordinator");
        // 唤醒可能阻塞在 recv 上的 Worker；它可能已经退出，忽略错误
        let _ = self.cmd_tx.send(Command::Shutdown);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// shutdown 并等待后台线程结束
    pub fn join(&mut self) {
        self.shutdown();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Camera worker panicked");
            }
        }
    }

    /// 非阻塞地取一个事件
    pub fn try_next_event(&self) -> Option<CameraEvent> {
        self.events.try_next()
    }

    /// 等待下一个事件；超时返回 None，调用方应把超时视为失败
    pub fn next_event_timeout(&self, timeout: Duration) -> Option<CameraEvent> {
        self.events.next_timeout(timeout)
    }

    /// 已到达但还没被取走的事件数
    pub fn pending_events(&self) -> usize {
        self.events.queued()
    }

    /// 在 UI 线程上把已到达的事件交给监听者，返回交付数量
    pub fn dispatch(&self, listener: &mut dyn CameraListener) -> usize {
        self.events.dispatch(listener)
    }
}

// 析构函数：通知后台线程退出并等待设备释放
impl Drop for CameraCoordinator {
    fn drop(&mut self) {
        self.join();
    }
}
