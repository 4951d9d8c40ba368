use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use shutter_core::error::CameraError;

use super::event::{CameraEvent, CameraListener};

/// UI 侧的响应分发器
///
/// 在交付的那一刻检查 terminated 标志，shutdown 之后到达的结果一律丢弃。
#[derive(Debug)]
pub(crate) struct EventDispatcher {
    rx: Receiver<CameraEvent>,
    terminated: Arc<AtomicBool>,
}

impl EventDispatcher {
    pub(crate) fn new(rx: Receiver<CameraEvent>, terminated: Arc<AtomicBool>) -> Self {
        Self { rx, terminated }
    }

    fn accept(&self, event: CameraEvent) -> Option<CameraEvent> {
        if self.terminated.load(Ordering::Acquire) {
            tracing::debug!(?event, "{}", CameraError::StaleResponse);
            return None;
        }
        Some(event)
    }

    pub(crate) fn try_next(&self) -> Option<CameraEvent> {
        while let Ok(event) = self.rx.try_recv() {
            if let Some(event) = self.accept(event) {
                return Some(event);
            }
        }
        None
    }

    /// 等待下一个事件；`timeout` 大到无法表示截止时间 (如 `Duration::MAX`) 时一直等
    pub(crate) fn next_timeout(&self, timeout: Duration) -> Option<CameraEvent> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.next_blocking();
        };
        while let Ok(event) = self.rx.recv_deadline(deadline) {
            if let Some(event) = self.accept(event) {
                return Some(event);
            }
        }
        None
    }

    fn next_blocking(&self) -> Option<CameraEvent> {
        while let Ok(event) = self.rx.recv() {
            if let Some(event) = self.accept(event) {
                return Some(event);
            }
        }
        None
    }

    /// 已到达、尚未取走的事件数 (包括之后会被丢弃的)
    pub(crate) fn queued(&self) -> usize {
        self.rx.len()
    }

    /// 把当前已到达的事件全部交给监听者，返回交付数量
    pub(crate) fn dispatch(&self, listener: &mut dyn CameraListener) -> usize {
        let mut delivered = 0;
        while let Some(event) = self.try_next() {
            event.deliver(listener);
            delivered += 1;
        }
        delivered
    }
}
