use bitflags::bitflags;

use crate::error::Result;
use crate::types::{CameraId, FocusMode, Resolution, SensorInfo, SurfaceId};

/// 设备基本信息
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    /// 打开设备时使用的编号
    pub id: CameraId,

    /// 对用户友好的显示名称 (e.g. "Logitech C920")
    pub name: String,

    /// 后端类型标识 (e.g. "V4L2", "Simulation")
    pub backend: String,

    /// 安装方向与朝向
    pub sensor: SensorInfo,
}

bitflags! {
    /// 设备能力位
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// 支持自动对焦
        const AUTO_FOCUS = 1 << 0;
        /// 拍照后硬件会自己停止预览
        const AUTO_STOP_PREVIEW = 1 << 1;
        /// 支持设置显示旋转
        const DISPLAY_ORIENTATION = 1 << 2;
    }
}

/// 1. 驱动入口：设备枚举与打开
///
/// Driver 会被移动到后台 Worker 线程，之后只在那个线程上被调用。
pub trait Driver: Send {
    /// 在 Worker 线程上执行的初始化 (枚举总线、加载库等)，完成后 Worker 才开始消费命令
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// 扫描总线，返回设备列表
    fn list_devices(&self) -> Result<Vec<DeviceInfo>>;

    /// 查询传感器的安装信息 (不需要打开设备)
    fn sensor_info(&self, id: CameraId) -> Result<SensorInfo>;

    /// 打开设备，获得独占句柄
    /// 失败时返回 `CameraError::DeviceUnavailable`
    fn open(&self, id: CameraId) -> Result<Box<dyn CameraDevice>>;
}

/// 2. 独占的硬件句柄
///
/// 所有方法都是阻塞调用，只能在打开它的那个线程上使用，所以不要求 Send。
pub trait CameraDevice {
    fn capabilities(&self) -> Capabilities;

    /// 硬件支持的预览尺寸 (横屏方向)
    fn supported_preview_sizes(&self) -> Result<Vec<Resolution>>;

    /// 预览运行中不得调用
    fn set_preview_size(&mut self, size: Resolution) -> Result<()>;

    fn set_display_orientation(&mut self, degrees: u32) -> Result<()>;

    fn set_focus_mode(&mut self, mode: FocusMode) -> Result<()>;

    /// 绑定 / 解绑预览输出目标
    fn set_preview_surface(&mut self, surface: Option<SurfaceId>) -> Result<()>;

    fn start_preview(&mut self) -> Result<()>;

    /// 预览未运行时硬件可能返回错误，调用方应视为已停止
    fn stop_preview(&mut self) -> Result<()>;

    /// 拍一张静态照片，返回 JPEG 字节
    fn take_picture(&mut self) -> Result<Vec<u8>>;

    /// 释放硬件资源，之后句柄不可再用
    fn release(&mut self) -> Result<()>;
}

// 为 Box<T> 实现 CameraDevice，这样 Box<dyn CameraDevice> 也能直接当设备使用
impl<D: CameraDevice + ?Sized> CameraDevice for Box<D> {
    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn supported_preview_sizes(&self) -> Result<Vec<Resolution>> {
        (**self).supported_preview_sizes()
    }

    fn set_preview_size(&mut self, size: Resolution) -> Result<()> {
        (**self).set_preview_size(size)
    }

    fn set_display_orientation(&mut self, degrees: u32) -> Result<()> {
        (**self).set_display_orientation(degrees)
    }

    fn set_focus_mode(&mut self, mode: FocusMode) -> Result<()> {
        (**self).set_focus_mode(mode)
    }

    fn set_preview_surface(&mut self, surface: Option<SurfaceId>) -> Result<()> {
        (**self).set_preview_surface(surface)
    }

    fn start_preview(&mut self) -> Result<()> {
        (**self).start_preview()
    }

    fn stop_preview(&mut self) -> Result<()> {
        (**self).stop_preview()
    }

    fn take_picture(&mut self) -> Result<Vec<u8>> {
        (**self).take_picture()
    }

    fn release(&mut self) -> Result<()> {
        (**self).release()
    }
}

// 同理，Box<dyn Driver> 也是 Driver (用于按平台选择后端的工厂函数)
impl<D: Driver + ?Sized> Driver for Box<D> {
    fn initialize(&mut self) -> Result<()> {
        (**self).initialize()
    }

    fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        (**self).list_devices()
    }

    fn sensor_info(&self, id: CameraId) -> Result<SensorInfo> {
        (**self).sensor_info(id)
    }

    fn open(&self, id: CameraId) -> Result<Box<dyn CameraDevice>> {
        (**self).open(id)
    }
}
