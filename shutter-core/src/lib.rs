// 开启一些 Clippy 检查，保证代码质量
#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

// 模块定义
pub mod builder;
pub mod error;
pub mod frame;
pub mod preview;
pub mod traits;
pub mod types;

// 方便用户使用的 Prelude
pub mod prelude {
    pub use crate::builder::{CaptureConfig, PostCapture};
    pub use crate::error::{CameraError, Result};
    pub use crate::frame::CapturedFrame;
    pub use crate::preview::{display_orientation, fit_centered, select_preview_size};
    pub use crate::traits::{CameraDevice, Capabilities, DeviceInfo, Driver};
    pub use crate::types::{
        CameraId, DeviceState, DisplayOrientation, Facing, FocusMode, Rect, Resolution, Rotation,
        SensorInfo, SurfaceId,
    };
}

// 版本与构建信息常量
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
