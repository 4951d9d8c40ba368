//! Buffer-then-replay：消费者就绪前提交的请求先暂存，就绪时按顺序一次性回放。

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
enum State<T> {
    /// 消费者尚未就绪，暂存请求
    Buffering(VecDeque<T>),
    /// 已经回放过，之后不再复用
    Drained,
}

/// 启动竞态的缓冲区
///
/// 生产者 (UI 线程) 随时可以调用 [`enqueue`](Self::enqueue)；
/// 消费者就绪时调用一次 [`drain`](Self::drain)，拿到全部暂存项 (FIFO)。
/// 之后的 `enqueue` 会把请求原样交还，由调用方直接投递给消费者。
#[derive(Debug)]
pub struct PendingBuffer<T> {
    state: Mutex<State<T>>,
}

impl<T> Default for PendingBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PendingBuffer<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Buffering(VecDeque::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 暂存一个请求
    ///
    /// 返回 `None` 表示已暂存；返回 `Some(item)` 表示缓冲区已回放，调用方需直接投递。
    pub fn enqueue(&self, item: T) -> Option<T> {
        match &mut *self.lock() {
            State::Buffering(queue) => {
                queue.push_back(item);
                None
            }
            State::Drained => Some(item),
        }
    }

    /// 取出全部暂存项并切换为 Drained
    ///
    /// 只有第一次调用会返回内容，之后总是空。
    pub fn drain(&self) -> Vec<T> {
        let mut state = self.lock();
        match std::mem::replace(&mut *state, State::Drained) {
            State::Buffering(queue) => queue.into(),
            State::Drained => Vec::new(),
        }
    }

    pub fn is_drained(&self) -> bool {
        matches!(*self.lock(), State::Drained)
    }

    /// 当前暂存的数量 (已回放时为 0)
    pub fn len(&self) -> usize {
        match &*self.lock() {
            State::Buffering(queue) => queue.len(),
            State::Drained => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn drains_in_fifo_order_exactly_once() {
        let buffer = PendingBuffer::new();
        assert_eq!(buffer.enqueue(1), None);
        assert_eq!(buffer.enqueue(2), None);
        assert_eq!(buffer.enqueue(3), None);
        assert_eq!(buffer.len(), 3);

        assert_eq!(buffer.drain(), vec![1, 2, 3]);
        assert!(buffer.is_drained());
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn empty_drain_is_noop() {
        let buffer: PendingBuffer<u32> = PendingBuffer::new();
        assert!(buffer.drain().is_empty());
        assert!(buffer.is_drained());
    }

    #[test]
    fn enqueue_after_drain_hands_item_back() {
        let buffer = PendingBuffer::new();
        buffer.drain();
        assert_eq!(buffer.enqueue("open"), Some("open"));
        assert!(buffer.is_empty());
    }

    #[test]
    fn concurrent_producer_loses_nothing() {
        let buffer = Arc::new(PendingBuffer::new());
        let producer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                let mut direct = Vec::new();
                for i in 0..1000 {
                    if let Some(item) = buffer.enqueue(i) {
                        direct.push(item);
                    }
                }
                direct
            })
        };

        let buffered = buffer.drain();
        let direct = producer.join().unwrap();

        // 缓冲部分 + 直接投递部分 = 完整且有序的序列
        let all: Vec<i32> = buffered.into_iter().chain(direct).collect();
        assert_eq!(all, (0..1000).collect::<Vec<_>>());
    }
}
