//! 预览几何：分辨率选择、方向补偿与居中布局。
//!
//! 这里全部是纯函数，既给 Worker 线程用，也给 UI 侧的 PreviewBinding 用。

use crate::types::{DisplayOrientation, Facing, Rect, Resolution, Rotation, SensorInfo};

/// 在硬件支持的分辨率中选出宽高比最接近目标的一项
///
/// 硬件上报的尺寸始终是横屏方向，所以竖屏时目标比例取 `height / width`，
/// 横屏时取 `width / height`。差值相同时保留列表中先出现的那一个。
///
/// * `supported`: 硬件上报的预览尺寸
/// * `width` / `height`: Surface 测量到的尺寸
///
/// 列表为空或目标尺寸退化 (宽或高为 0) 时返回 `None`，调用方不得启动预览。
pub fn select_preview_size(
    supported: &[Resolution],
    width: u32,
    height: u32,
    orientation: DisplayOrientation,
) -> Option<Resolution> {
    if width == 0 || height == 0 {
        return None;
    }

    let target_ratio = match orientation {
        DisplayOrientation::Portrait => height as f64 / width as f64,
        DisplayOrientation::Landscape => width as f64 / height as f64,
    };
    tracing::debug!(target_ratio, candidates = supported.len(), "selecting preview size");

    let mut best: Option<(Resolution, f64)> = None;
    for size in supported {
        let Some(ratio) = size.aspect_ratio() else {
            continue;
        };
        let diff = (ratio - target_ratio).abs();
        // 严格小于：平局时保留第一个
        if best.map_or(true, |(_, min_diff)| diff < min_diff) {
            best = Some((*size, diff));
        }
    }

    best.map(|(size, _)| size)
}

/// 计算预览画面需要的显示旋转角度
///
/// 前置摄像头需要做镜像补偿：
/// `(360 - (sensor + rotation) % 360) % 360`；
/// 后置摄像头：`(sensor - rotation + 360) % 360`。
pub fn display_orientation(sensor: SensorInfo, rotation: Rotation) -> u32 {
    let degrees = rotation.degrees();
    let mounted = sensor.orientation % 360;
    match sensor.facing {
        Facing::Front => (360 - (mounted + degrees) % 360) % 360,
        Facing::Back => (mounted + 360 - degrees) % 360,
    }
}

/// 在容器中居中放置预览，保持宽高比、不拉伸
///
/// 没有选定预览尺寸时直接铺满容器。
pub fn fit_centered(container: Resolution, preview: Option<Resolution>) -> Rect {
    let width = container.width as u64;
    let height = container.height as u64;

    let (preview_w, preview_h) = match preview {
        Some(p) if p.width > 0 && p.height > 0 => (p.width as u64, p.height as u64),
        _ => (width, height),
    };

    if preview_w == 0 || preview_h == 0 {
        return Rect {
            left: 0,
            top: 0,
            right: container.width,
            bottom: container.height,
        };
    }

    if width * preview_h > height * preview_w {
        // 容器更宽：左右留黑边
        let scaled_w = preview_w * height / preview_h;
        Rect {
            left: ((width - scaled_w) / 2) as u32,
            top: 0,
            right: ((width + scaled_w) / 2) as u32,
            bottom: container.height,
        }
    } else {
        // 容器更高：上下留黑边
        let scaled_h = preview_h * width / preview_w;
        Rect {
            left: 0,
            top: ((height - scaled_h) / 2) as u32,
            right: container.width,
            bottom: ((height + scaled_h) / 2) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VGA_4_3: Resolution = Resolution::new(800, 600);
    const HD_16_9: Resolution = Resolution::new(1280, 720);

    #[test]
    fn portrait_target_picks_matching_aspect() {
        let sizes = [VGA_4_3, HD_16_9];
        assert_eq!(
            select_preview_size(&sizes, 600, 800, DisplayOrientation::Portrait),
            Some(VGA_4_3)
        );
        assert_eq!(
            select_preview_size(&sizes, 720, 1280, DisplayOrientation::Portrait),
            Some(HD_16_9)
        );
    }

    #[test]
    fn landscape_target_uses_width_over_height() {
        let sizes = [VGA_4_3, HD_16_9];
        assert_eq!(
            select_preview_size(&sizes, 1920, 1080, DisplayOrientation::Landscape),
            Some(HD_16_9)
        );
        assert_eq!(
            select_preview_size(&sizes, 1024, 768, DisplayOrientation::Landscape),
            Some(VGA_4_3)
        );
    }

    #[test]
    fn ties_resolve_to_first_candidate() {
        let sizes = [Resolution::new(640, 480), Resolution::new(1600, 1200)];
        assert_eq!(
            select_preview_size(&sizes, 300, 400, DisplayOrientation::Portrait),
            Some(Resolution::new(640, 480))
        );
    }

    #[test]
    fn empty_or_degenerate_input_yields_none() {
        assert_eq!(
            select_preview_size(&[], 600, 800, DisplayOrientation::Portrait),
            None
        );
        assert_eq!(
            select_preview_size(&[VGA_4_3], 0, 800, DisplayOrientation::Portrait),
            None
        );
        assert_eq!(
            select_preview_size(&[Resolution::new(640, 0)], 600, 800, DisplayOrientation::Portrait),
            None
        );
    }

    #[test]
    fn rear_sensor_orientation() {
        let rear = SensorInfo {
            facing: Facing::Back,
            orientation: 90,
        };
        assert_eq!(display_orientation(rear, Rotation::Deg0), 90);
        assert_eq!(display_orientation(rear, Rotation::Deg90), 0);
        assert_eq!(display_orientation(rear, Rotation::Deg270), 180);
    }

    #[test]
    fn front_sensor_orientation_is_mirrored() {
        let front = SensorInfo {
            facing: Facing::Front,
            orientation: 270,
        };
        assert_eq!(display_orientation(front, Rotation::Deg90), 0);
        assert_eq!(display_orientation(front, Rotation::Deg0), 90);
        assert_eq!(display_orientation(front, Rotation::Deg180), 270);
    }

    #[test]
    fn fit_centered_pillarboxes_wide_container() {
        let rect = fit_centered(Resolution::new(1000, 600), Some(Resolution::new(800, 600)));
        assert_eq!(
            rect,
            Rect {
                left: 100,
                top: 0,
                right: 900,
                bottom: 600
            }
        );
    }

    #[test]
    fn fit_centered_letterboxes_tall_container() {
        let rect = fit_centered(Resolution::new(720, 1280), Some(Resolution::new(1280, 720)));
        // 720 * 720 / 1280 = 405
        assert_eq!(rect.width(), 720);
        assert_eq!(rect.height(), 405);
        assert_eq!(rect.top, 437);
    }

    #[test]
    fn fit_centered_without_preview_fills_container() {
        let rect = fit_centered(Resolution::new(640, 480), None);
        assert_eq!(rect.width(), 640);
        assert_eq!(rect.height(), 480);
    }
}
