use v4l::control::{Control, Value};
use v4l::Device;

use shutter_core::error::{CameraError, Result};
use shutter_core::types::FocusMode;

// --- 手动定义 V4L2 标准常量 (Linux ABI) ---
// 来源: /usr/include/linux/v4l2-controls.h

const V4L2_CID_CAMERA_CLASS_BASE: u32 = 0x009A0900;

const CID_FOCUS_AUTO: u32 = V4L2_CID_CAMERA_CLASS_BASE + 12; // 0x009A090C

/// 设备是否暴露了连续自动对焦控件
pub fn has_auto_focus(dev: &Device) -> bool {
    match dev.query_controls() {
        Ok(descriptions) => descriptions.iter().any(|d| d.id == CID_FOCUS_AUTO),
        Err(e) => {
            tracing::debug!(target: "shutter::v4l2", "Failed to query controls: {}", e);
            false
        }
    }
}

pub fn set_focus_mode(dev: &Device, mode: FocusMode) -> Result<()> {
    let enabled = matches!(mode, FocusMode::Auto);
    dev.set_control(Control {
        id: CID_FOCUS_AUTO,
        value: Value::Boolean(enabled),
    })
    .map_err(CameraError::Io)
}
