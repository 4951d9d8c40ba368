use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use shutter_core::builder::CaptureConfig;
use shutter_core::error::{CameraError, Result};
use shutter_core::frame::CapturedFrame;

/// 持久化组件：把拍好的帧写到某处，返回文件路径
///
/// 在后台 Worker 线程上同步调用，帧的所有权随调用一起转移。
pub trait FrameStore: Send {
    fn persist(&mut self, frame: CapturedFrame) -> Result<PathBuf>;
}

impl<F> FrameStore for F
where
    F: FnMut(CapturedFrame) -> Result<PathBuf> + Send,
{
    fn persist(&mut self, frame: CapturedFrame) -> Result<PathBuf> {
        self(frame)
    }
}

/// 写入本地目录：`<dir>/<prefix><unix_millis>.jpg`
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
    prefix: String,
}

impl DirectoryStore {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(dir: P, prefix: S) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.output_dir.clone(), config.file_prefix.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 同一毫秒内连拍时追加序号，避免覆盖
    fn file_path(&self, frame: &CapturedFrame) -> PathBuf {
        let millis = frame
            .captured_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();

        let mut path = self.dir.join(format!("{}{}.jpg", self.prefix, millis));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("{}{}_{}.jpg", self.prefix, millis, n));
            n += 1;
        }
        path
    }
}

impl FrameStore for DirectoryStore {
    fn persist(&mut self, frame: CapturedFrame) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|source| CameraError::Persistence {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.file_path(&frame);
        fs::write(&path, &frame.data).map_err(|source| CameraError::Persistence {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(path = %path.display(), bytes = frame.len(), "Picture saved");
        Ok(path)
    }
}
