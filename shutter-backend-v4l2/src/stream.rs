use std::sync::Arc;

use v4l::buffer::Type;
// 同时引入 Stream (用于 start/stop) 和 CaptureStream (用于 next)
use v4l::io::traits::{CaptureStream, Stream as V4lStream};

use shutter_core::error::{CameraError, Result};

/// mmap 采集流
///
/// 持有设备的 Arc，保证 buffer 映射期间 fd 不会被关闭。
pub struct V4l2Stream {
    inner: v4l::io::mmap::Stream<'static>,
    is_streaming: bool,
    _dev: Arc<v4l::Device>,
}

impl std::fmt::Debug for V4l2Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V4l2Stream")
            .field("is_streaming", &self.is_streaming)
            .finish()
    }
}

impl V4l2Stream {
    pub fn new(dev: Arc<v4l::Device>, buf_count: u32) -> Result<Self> {
        let stream = v4l::io::mmap::Stream::with_buffers(&dev, Type::VideoCapture, buf_count)
            .map_err(CameraError::Io)?;

        Ok(Self {
            inner: stream,
            is_streaming: false,
            _dev: dev,
        })
    }

    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    pub fn start(&mut self) -> Result<()> {
        V4lStream::start(&mut self.inner).map_err(CameraError::Io)?;
        self.is_streaming = true;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        V4lStream::stop(&mut self.inner).map_err(CameraError::Io)?;
        self.is_streaming = false;
        Ok(())
    }

    /// 连续取 `count` 帧，只保留最后一帧
    ///
    /// 预览期间没人消费 buffer，队列里都是开流时的旧帧；
    /// 取 buffer 数 + 1 次才能拿到重新入队之后采集的新帧。
    pub fn grab_latest(&mut self, count: usize) -> Result<Vec<u8>> {
        keep_last(count, || self.grab())
    }

    /// 取下一帧并拷贝出来 (只保留 bytesused 部分)
    pub fn grab(&mut self) -> Result<Vec<u8>> {
        if !self.is_streaming {
            return Err(CameraError::Hardware("Stream not started".into()));
        }

        let (buf, meta) = CaptureStream::next(&mut self.inner).map_err(CameraError::Io)?;
        let used = match meta.bytesused as usize {
            0 => buf.len(),
            n => n.min(buf.len()),
        };
        tracing::trace!(target: "shutter::v4l2", sequence = meta.sequence, bytes = used, "frame dequeued");
        Ok(buf[..used].to_vec())
    }
}

fn keep_last<T>(count: usize, mut next: impl FnMut() -> Result<T>) -> Result<T> {
    let mut last = next()?;
    for _ in 1..count {
        last = next()?;
    }
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_last_drains_every_queued_frame() {
        let mut queue = 0..;
        let latest = keep_last(5, || Ok(queue.next().unwrap())).unwrap();
        assert_eq!(latest, 4);
        assert_eq!(queue.next(), Some(5));
    }

    #[test]
    fn keep_last_always_grabs_at_least_once() {
        let mut calls = 0;
        keep_last(0, || {
            calls += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 1);
    }

    #[test]
    fn keep_last_stops_on_first_error() {
        let mut calls = 0;
        let result: Result<u32> = keep_last(4, || {
            calls += 1;
            Err(CameraError::Hardware("dequeue failed".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
