use std::time::SystemTime;

use crate::types::{CameraId, Resolution};

/// 一次拍照产生的静态帧
///
/// 数据是拥有所有权的 JPEG 字节，由 Worker 线程交给持久化组件后即被丢弃。
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// 编码后的图像数据 (JPEG)
    pub data: Vec<u8>,

    /// 拍摄所用的摄像头
    pub camera: CameraId,

    /// 本次打开会话内的拍照序号，从 0 开始
    pub sequence: u64,

    /// 拍摄完成时的系统时间 (用于生成文件名)
    pub captured_at: SystemTime,
}

impl CapturedFrame {
    pub fn new(camera: CameraId, sequence: u64, data: Vec<u8>) -> Self {
        Self {
            data,
            camera,
            sequence,
            captured_at: SystemTime::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// 缩略显示时的整数降采样倍数
///
/// 源图大于目标区域时，按较短边的比例四舍五入；否则为 1。
pub fn sample_size(src: Resolution, dest: Resolution) -> u32 {
    if dest.width == 0 || dest.height == 0 {
        return 1;
    }
    if src.height <= dest.height && src.width <= dest.width {
        return 1;
    }

    let factor = if src.width > src.height {
        (src.height as f32 / dest.height as f32).round()
    } else {
        (src.width as f32 / dest.width as f32).round()
    };

    (factor as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_size_is_one_when_source_fits() {
        assert_eq!(
            sample_size(Resolution::new(640, 480), Resolution::new(1080, 1920)),
            1
        );
    }

    #[test]
    fn sample_size_uses_short_side() {
        // 横图：按高度比例 2448 / 1224 = 2
        assert_eq!(
            sample_size(Resolution::new(3264, 2448), Resolution::new(1080, 1224)),
            2
        );
        // 竖图：按宽度比例 2448 / 600 = 4.08 -> 4
        assert_eq!(
            sample_size(Resolution::new(2448, 3264), Resolution::new(600, 800)),
            4
        );
    }

    #[test]
    fn sample_size_never_drops_below_one() {
        // 3000 / 4000 = 0.75 -> 1 (round), 仍需保底
        assert_eq!(
            sample_size(Resolution::new(4000, 3000), Resolution::new(3900, 4000)),
            1
        );
    }
}
