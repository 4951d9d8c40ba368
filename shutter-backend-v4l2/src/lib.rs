//! Linux V4L2 后端：`/dev/video<N>` 对应 `CameraId(N)`。
#![cfg(target_os = "linux")]

pub mod controls;
pub mod device;
pub mod pixel_map;
pub mod stream;

use shutter_core::error::Result;
use shutter_core::traits::{CameraDevice, DeviceInfo, Driver};
use shutter_core::types::{CameraId, SensorInfo};

/// V4L2 驱动
///
/// 本身不持有任何 fd，可以在任意线程构造后移动到 Worker 线程。
#[derive(Debug, Clone, Default)]
pub struct V4l2Driver;

impl V4l2Driver {
    pub fn new() -> Self {
        Self
    }
}

impl Driver for V4l2Driver {
    fn initialize(&mut self) -> Result<()> {
        let devices = device::list_devices()?;
        tracing::info!(target: "shutter::v4l2", count = devices.len(), "V4L2 capture devices found");
        for info in &devices {
            tracing::debug!(target: "shutter::v4l2", id = %info.id, name = %info.name, "device");
        }
        Ok(())
    }

    fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        device::list_devices()
    }

    fn sensor_info(&self, _id: CameraId) -> Result<SensorInfo> {
        // USB / CSI 摄像头一般不上报朝向，按后置、0° 处理
        Ok(SensorInfo::default())
    }

    fn open(&self, id: CameraId) -> Result<Box<dyn CameraDevice>> {
        Ok(Box::new(device::open(id)?))
    }
}
