//! # shutter
//!
//! 摄像头生命周期与拍照协调：一条后台线程独占设备，UI 线程只发请求、收事件。
//!
//! ```no_run
//! use shutter::prelude::*;
//!
//! let coordinator = CameraCoordinator::with_default_backend(CaptureConfig::new())?;
//! coordinator.request_open_default();
//! coordinator.request_capture();
//! # Ok::<(), CameraError>(())
//! ```

#![warn(missing_debug_implementations, rust_2018_idioms)]

pub mod backend;
pub mod binding;
pub mod coordinator;
pub mod device;
pub mod pending;
pub mod store;

pub use shutter_core;

pub use binding::PreviewBinding;
pub use coordinator::{CameraCoordinator, CameraEvent, CameraListener, FailedRequest, Request};
pub use device::{DeviceHandle, OpenedDevice};
pub use store::{DirectoryStore, FrameStore};

/// 预置模块，用户可以通过 `use shutter::prelude::*;` 导入常用项
pub mod prelude {
    pub use crate::binding::PreviewBinding;
    pub use crate::coordinator::{
        CameraCoordinator, CameraEvent, CameraListener, FailedRequest, Request,
    };
    pub use crate::device::OpenedDevice;
    pub use crate::store::{DirectoryStore, FrameStore};
    pub use shutter_core::prelude::*;
}
