use std::sync::Arc;

use v4l::capability::Flags;
use v4l::video::Capture;

use shutter_core::error::{CameraError, Result};
use shutter_core::traits::{CameraDevice, Capabilities, DeviceInfo};
use shutter_core::types::{CameraId, FocusMode, Resolution, SensorInfo, SurfaceId};

use crate::controls;
use crate::pixel_map::{self, PixelLayout};
use crate::stream::V4l2Stream;

/// 预览流的 mmap buffer 数量
const BUFFER_COUNT: u32 = 4;
/// 没有预览时临时开流拍照，丢掉前几帧让自动曝光收敛
const WARMUP_FRAMES: usize = 3;

/// 枚举系统中的摄像头设备
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let mut devices = Vec::new();

    // 遍历 /dev/video* 节点
    for node in v4l::context::enum_devices() {
        let Ok(dev) = v4l::Device::new(node.index()) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        // 过滤：必须支持 Video Capture，忽略 Metadata 设备或 Output 设备
        if caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            devices.push(DeviceInfo {
                id: CameraId(node.index() as u32),
                name: node.name().unwrap_or_else(|| "Unknown Camera".into()),
                backend: "V4L2".to_string(),
                // V4L2 不上报安装方向
                sensor: SensorInfo::default(),
            });
        }
    }

    Ok(devices)
}

/// 打开 `/dev/video<id>`
pub fn open(id: CameraId) -> Result<V4l2Camera> {
    // 1. 打开设备句柄
    let dev = v4l::Device::new(id.0 as usize).map_err(CameraError::Io)?;

    let caps = dev.query_caps().map_err(CameraError::Io)?;
    if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
        return Err(CameraError::Hardware(format!(
            "{} is not a video capture device",
            caps.card
        )));
    }

    // 2. 格式协商
    let formats: Vec<_> = dev
        .enum_formats()
        .map_err(CameraError::Io)?
        .into_iter()
        .map(|f| f.fourcc)
        .collect();
    let layout = pixel_map::negotiate(&formats)
        .ok_or_else(|| CameraError::Hardware("device offers neither MJPG nor YUYV".into()))?;

    // 3. 该格式下的离散分辨率 (Stepwise 暂略)
    let mut sizes = Vec::new();
    for framesize in dev.enum_framesizes(layout.fourcc()).unwrap_or_default() {
        for discrete in framesize.size.to_discrete() {
            let size = Resolution::new(discrete.width, discrete.height);
            if !sizes.contains(&size) {
                sizes.push(size);
            }
        }
    }

    let auto_focus = controls::has_auto_focus(&dev);
    tracing::info!(
        target: "shutter::v4l2",
        camera = %id,
        card = %caps.card,
        ?layout,
        sizes = sizes.len(),
        auto_focus,
        "V4L2 device opened"
    );

    Ok(V4l2Camera {
        id,
        dev: Some(Arc::new(dev)),
        layout,
        sizes,
        auto_focus,
        format: None,
        surface: None,
        orientation: 0,
        stream: None,
    })
}

/// 打开的 V4L2 摄像头
///
/// 预览即持续运行的 mmap 采集流；拍照时从流里取一帧，没有预览就临时开一次流。
pub struct V4l2Camera {
    id: CameraId,
    dev: Option<Arc<v4l::Device>>,
    layout: PixelLayout,
    sizes: Vec<Resolution>,
    auto_focus: bool,
    format: Option<v4l::Format>,
    surface: Option<SurfaceId>,
    orientation: u32,
    stream: Option<V4l2Stream>,
}

impl std::fmt::Debug for V4l2Camera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V4l2Camera")
            .field("id", &self.id)
            .field("open", &self.dev.is_some())
            .field("layout", &self.layout)
            .field("format", &self.format)
            .field("surface", &self.surface)
            .field("orientation", &self.orientation)
            .field("stream", &self.stream)
            .finish()
    }
}

impl V4l2Camera {
    fn dev(&self) -> Result<&Arc<v4l::Device>> {
        self.dev
            .as_ref()
            .ok_or_else(|| CameraError::Hardware("device already released".into()))
    }

    fn streaming(&self) -> bool {
        self.stream.as_ref().is_some_and(V4l2Stream::is_streaming)
    }

    /// 当前生效的采集格式；还没设置过尺寸时读取驱动的默认值并强制为协商出的像素格式
    fn current_format(&mut self) -> Result<v4l::Format> {
        if let Some(fmt) = self.format {
            return Ok(fmt);
        }
        let dev = self.dev()?;
        let mut fmt = dev.format().map_err(CameraError::Io)?;
        fmt.fourcc = self.layout.fourcc();
        let applied = dev.set_format(&fmt).map_err(CameraError::Io)?;
        self.format = Some(applied);
        Ok(applied)
    }

    fn grab_still(&mut self) -> Result<Vec<u8>> {
        // 预览流里排队的是旧帧，全部出队后再取一帧
        if let Some(stream) = self.stream.as_mut().filter(|s| s.is_streaming()) {
            return stream.grab_latest(BUFFER_COUNT as usize + 1);
        }

        let mut stream = V4l2Stream::new(Arc::clone(self.dev()?), BUFFER_COUNT)?;
        stream.start()?;
        let data = stream.grab_latest(WARMUP_FRAMES + 1);
        if let Err(e) = stream.stop() {
            tracing::debug!(target: "shutter::v4l2", "Failed to stop capture stream: {}", e);
        }
        data
    }
}

impl CameraDevice for V4l2Camera {
    fn capabilities(&self) -> Capabilities {
        if self.auto_focus {
            Capabilities::AUTO_FOCUS
        } else {
            Capabilities::empty()
        }
    }

    fn supported_preview_sizes(&self) -> Result<Vec<Resolution>> {
        self.dev()?;
        Ok(self.sizes.clone())
    }

    fn set_preview_size(&mut self, size: Resolution) -> Result<()> {
        if self.streaming() {
            return Err(CameraError::Hardware(
                "cannot change format while streaming".into(),
            ));
        }
        let dev = self.dev()?;

        // 应用格式设置 (ioctl: VIDIOC_S_FMT)
        let mut fmt = dev.format().map_err(CameraError::Io)?;
        fmt.width = size.width;
        fmt.height = size.height;
        fmt.fourcc = self.layout.fourcc();
        let applied = dev.set_format(&fmt).map_err(CameraError::Io)?;

        if applied.width != size.width || applied.height != size.height {
            tracing::warn!(
                target: "shutter::v4l2",
                requested = %size,
                applied = %Resolution::new(applied.width, applied.height),
                "Driver adjusted the requested size"
            );
        }
        self.format = Some(applied);
        Ok(())
    }

    fn set_display_orientation(&mut self, degrees: u32) -> Result<()> {
        // V4L2 没有显示旋转，交给渲染端处理
        tracing::debug!(target: "shutter::v4l2", camera = %self.id, degrees, "display orientation recorded");
        self.orientation = degrees;
        Ok(())
    }

    fn set_focus_mode(&mut self, mode: FocusMode) -> Result<()> {
        controls::set_focus_mode(self.dev()?, mode)
    }

    fn set_preview_surface(&mut self, surface: Option<SurfaceId>) -> Result<()> {
        self.surface = surface;
        Ok(())
    }

    fn start_preview(&mut self) -> Result<()> {
        if self.surface.is_none() {
            return Err(CameraError::PreviewNotReady("no preview surface attached"));
        }
        if self.streaming() {
            return Ok(());
        }
        self.current_format()?;

        let mut stream = V4l2Stream::new(Arc::clone(self.dev()?), BUFFER_COUNT)?;
        stream.start()?;
        self.stream = Some(stream);
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<()> {
        match self.stream.take() {
            Some(mut stream) if stream.is_streaming() => stream.stop(),
            _ => Err(CameraError::Hardware("preview not running".into())),
        }
    }

    fn take_picture(&mut self) -> Result<Vec<u8>> {
        let fmt = self.current_format()?;
        let raw = self.grab_still()?;
        pixel_map::encode_jpeg(self.layout, &raw, fmt.width, fmt.height)
    }

    fn release(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            if stream.is_streaming() {
                stream.stop()?;
            }
        }
        // 最后一个 Arc 释放时关闭 fd
        if self.dev.take().is_some() {
            tracing::debug!(target: "shutter::v4l2", camera = %self.id, "V4L2 device closed");
        }
        Ok(())
    }
}
