// shutter/examples/camera_demo.rs
//
// 打开默认摄像头，预览两秒后拍一张照片。
// RUST_LOG=shutter=debug cargo run --example camera_demo -- [camera-index]

use std::time::Duration;

use anyhow::{bail, Result};
use shutter::prelude::*;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let camera: u32 = std::env::args()
        .nth(1)
        .map(|s| s.parse())
        .transpose()?
        .unwrap_or(0);

    // 1. 启动协调器 (后台线程负责初始化驱动)
    let config = CaptureConfig::new().camera(camera);
    println!("Pictures go to {}", config.output_dir.display());
    let coordinator = CameraCoordinator::with_default_backend(config)?;

    // 2. 模拟界面生命周期：Surface 创建 -> 测量 -> 可见
    let mut binding = PreviewBinding::new(camera);
    binding.surface_created(&coordinator, SurfaceId(1));
    binding.measured(&coordinator, 1280, 720, DisplayOrientation::Landscape);
    binding.resume(&coordinator);

    // 3. 等待预览启动
    loop {
        let Some(event) = coordinator.next_event_timeout(Duration::from_secs(5)) else {
            bail!("camera did not respond in time");
        };
        binding.observe(&coordinator, &event);
        match event {
            CameraEvent::Opened(device) => println!(
                "Opened camera {} ({} preview sizes)",
                device.camera,
                device.supported_sizes.len()
            ),
            CameraEvent::PreviewStarted(size) => {
                println!("Preview running at {size}");
                break;
            }
            CameraEvent::Failed(failure) => bail!("{:?} failed: {}", failure.request, failure.error),
            _ => {}
        }
    }

    std::thread::sleep(Duration::from_secs(2));

    // 4. 拍照
    coordinator.request_capture();
    loop {
        let Some(event) = coordinator.next_event_timeout(Duration::from_secs(10)) else {
            bail!("capture timed out");
        };
        binding.observe(&coordinator, &event);
        match event {
            CameraEvent::Captured(path) => {
                println!("Saved {}", path.display());
                break;
            }
            CameraEvent::Failed(failure) => bail!("{:?} failed: {}", failure.request, failure.error),
            _ => {}
        }
    }

    // 5. 界面隐藏，释放设备；协调器 Drop 时等待后台线程退出
    binding.pause(&coordinator);
    Ok(())
}
