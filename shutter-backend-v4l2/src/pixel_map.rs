use v4l::FourCC;

use shutter_core::error::{CameraError, Result};

/// 本后端能直接产出 JPEG 的两种像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// 硬件压缩，帧本身就是 JPEG
    Mjpeg,
    /// 打包 YUV 4:2:2，拍照时需要软件编码
    Yuyv,
}

impl PixelLayout {
    pub fn fourcc(self) -> FourCC {
        match self {
            Self::Mjpeg => FourCC::new(b"MJPG"),
            Self::Yuyv => FourCC::new(b"YUYV"),
        }
    }

    pub fn from_fourcc(cc: FourCC) -> Option<Self> {
        match &cc.repr {
            b"MJPG" => Some(Self::Mjpeg),
            b"YUYV" => Some(Self::Yuyv),
            _ => None,
        }
    }
}

/// 格式协商：有 MJPG 就用 MJPG，其次 YUYV
pub fn negotiate(formats: &[FourCC]) -> Option<PixelLayout> {
    let layouts: Vec<PixelLayout> = formats
        .iter()
        .filter_map(|cc| {
            let layout = PixelLayout::from_fourcc(*cc);
            if layout.is_none() {
                tracing::trace!(target: "shutter::v4l2", "Skipping pixel format {}", cc);
            }
            layout
        })
        .collect();

    [PixelLayout::Mjpeg, PixelLayout::Yuyv]
        .into_iter()
        .find(|wanted| layouts.contains(wanted))
}

/// 把一帧原始数据变成 JPEG
pub fn encode_jpeg(layout: PixelLayout, data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    match layout {
        PixelLayout::Mjpeg => Ok(data.to_vec()),
        PixelLayout::Yuyv => {
            let expected = width as usize * height as usize * 2;
            if data.len() < expected {
                return Err(CameraError::Hardware(format!(
                    "short YUYV frame: {} bytes, expected {}",
                    data.len(),
                    expected
                )));
            }

            // 1. YUYV -> RGB
            let mut rgb = vec![0u8; width as usize * height as usize * 3];
            yuyv_to_rgb8(&data[..expected], &mut rgb);

            // 2. RGB -> JPEG
            let img = image::RgbImage::from_raw(width, height, rgb)
                .ok_or_else(|| CameraError::Hardware("Failed to create image buffer".into()))?;
            let mut jpeg = Vec::new();
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 90);
            encoder
                .encode_image(&img)
                .map_err(|e| CameraError::Hardware(format!("JPEG encoding failed: {e}")))?;
            Ok(jpeg)
        }
    }
}

// YUYV -> RGB8 (R,G,B, R,G,B...)，BT.601 整数近似
fn yuyv_to_rgb8(src: &[u8], dest: &mut [u8]) {
    for (yuyv, rgb) in src.chunks_exact(4).zip(dest.chunks_exact_mut(6)) {
        let c0 = yuyv[0] as i32 - 16;
        let d = yuyv[1] as i32 - 128;
        let c1 = yuyv[2] as i32 - 16;
        let e = yuyv[3] as i32 - 128;

        for (c, px) in [c0, c1].into_iter().zip(rgb.chunks_exact_mut(3)) {
            px[0] = clip((298 * c + 409 * e + 128) >> 8);
            px[1] = clip((298 * c - 100 * d - 208 * e + 128) >> 8);
            px[2] = clip((298 * c + 516 * d + 128) >> 8);
        }
    }
}

#[inline]
fn clip(val: i32) -> u8 {
    val.clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_mjpeg_over_yuyv() {
        let formats = [FourCC::new(b"YUYV"), FourCC::new(b"H264"), FourCC::new(b"MJPG")];
        assert_eq!(negotiate(&formats), Some(PixelLayout::Mjpeg));
        assert_eq!(negotiate(&formats[..2]), Some(PixelLayout::Yuyv));
        assert_eq!(negotiate(&[FourCC::new(b"H264")]), None);
    }

    #[test]
    fn neutral_yuyv_is_gray() {
        // Y=128, U=V=128 -> 中灰
        let mut rgb = [0u8; 6];
        yuyv_to_rgb8(&[128, 128, 128, 128], &mut rgb);
        assert!(rgb.iter().all(|&c| c == rgb[0]));
        assert!((125..=135).contains(&rgb[0]));
    }

    #[test]
    fn yuyv_frame_encodes_to_jpeg() {
        let frame = vec![128u8; 4 * 2 * 2];
        let jpeg = encode_jpeg(PixelLayout::Yuyv, &frame, 4, 2).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn short_frame_is_rejected() {
        let err = encode_jpeg(PixelLayout::Yuyv, &[0; 8], 4, 4).unwrap_err();
        assert!(matches!(err, CameraError::Hardware(_)));
    }
}
