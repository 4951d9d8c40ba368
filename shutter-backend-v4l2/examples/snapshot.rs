// 直接使用 V4L2 驱动拍一张照片 (不经过协调器)
// cargo run -p shutter-backend-v4l2 --example snapshot -- [camera-index] [output.jpg]

#[cfg(target_os = "linux")]
fn main() -> anyhow::Result<()> {
    use anyhow::Context;
    use shutter_backend_v4l2::V4l2Driver;
    use shutter_core::preview::select_preview_size;
    use shutter_core::traits::{CameraDevice, Driver};
    use shutter_core::types::{CameraId, DisplayOrientation, SurfaceId};

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let index: u32 = args.next().map(|s| s.parse()).transpose()?.unwrap_or(0);
    let output = args.next().unwrap_or_else(|| "snapshot.jpg".to_string());

    let mut driver = V4l2Driver::new();
    driver.initialize()?;
    for info in driver.list_devices()? {
        println!("  [{}] {} ({})", info.id, info.name, info.backend);
    }

    // 1. 打开并选一个接近 16:9 的尺寸
    let mut camera = driver
        .open(CameraId(index))
        .with_context(|| format!("Failed to open /dev/video{index}"))?;
    let sizes = camera.supported_preview_sizes()?;
    if let Some(size) = select_preview_size(&sizes, 1920, 1080, DisplayOrientation::Landscape) {
        println!("Using {size}");
        camera.set_preview_size(size)?;
    }

    // 2. 预览一会儿让曝光收敛，再拍
    camera.set_preview_surface(Some(SurfaceId(0)))?;
    camera.start_preview()?;
    std::thread::sleep(std::time::Duration::from_millis(500));
    let jpeg = camera.take_picture()?;
    camera.stop_preview()?;
    camera.release()?;

    std::fs::write(&output, &jpeg)?;
    println!("Wrote {} bytes to {}", jpeg.len(), output);
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn main() {
    println!("This example is only supported on Linux with V4L2.");
}
