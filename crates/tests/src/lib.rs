//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置往返测试
//! - 模拟设备 e2e 测试（无需硬件）

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{DriverConfig, ImuSyncMethod, StageTag};

    #[test]
    fn test_config_round_trips_through_toml() {
        let mut config = DriverConfig {
            camera_name: "front".to_string(),
            unite_imu_method: ImuSyncMethod::LinearInterpolation,
            tf_publish_rate: 15.0,
            ..DriverConfig::default()
        };
        config.filters[0].enabled = true;

        let text = ConfigLoader::to_toml(&config).unwrap();
        let back = ConfigLoader::load_from_str(&text, ConfigFormat::Toml).unwrap();
        assert_eq!(back.camera_name, "front");
        assert_eq!(back.unite_imu_method, ImuSyncMethod::LinearInterpolation);
        assert!(back.filter_enabled(StageTag::Decimation));
        assert_eq!(back.filters.len(), StageTag::CANONICAL_ORDER.len());
    }

    #[test]
    fn test_default_device_config_is_usable() {
        let config = DriverConfig::default();
        assert!(ConfigLoader::validate(&config).is_ok());
        assert!(device::SimulatedDevice::new(config.device).is_ok());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{
        Channel, DeviceConfig, DriverConfig, ImuSyncMethod, Message, SampleSource, StageTag,
        StreamKey, StreamKind, SystemClock,
    };
    use device::{SimulatedDevice, SimulatedSource};
    use dispatcher::{DispatchSnapshot, DriverNode, RecordingBus};

    const DEPTH: StreamKey = StreamKey::new(StreamKind::Depth, 0);
    const COLOR: StreamKey = StreamKey::new(StreamKind::Color, 0);
    const INFRA1: StreamKey = StreamKey::new(StreamKind::Infrared, 1);
    const INFRA2: StreamKey = StreamKey::new(StreamKind::Infrared, 2);
    const ACCEL: StreamKey = StreamKey::new(StreamKind::Accel, 0);
    const GYRO: StreamKey = StreamKey::new(StreamKind::Gyro, 0);

    fn small_device() -> DeviceConfig {
        DeviceConfig {
            width: 32,
            height: 16,
            fps: 60,
            accel_hz: 100,
            gyro_hz: 200,
            ..DeviceConfig::default()
        }
    }

    fn config() -> DriverConfig {
        DriverConfig {
            device: small_device(),
            ..DriverConfig::default()
        }
    }

    fn enable(config: &mut DriverConfig, tag: StageTag) {
        for filter in config.filters.iter_mut().filter(|f| f.name == tag) {
            filter.enabled = true;
        }
    }

    /// SimulatedSource -> DriverNode -> RecordingBus for `run_for`
    async fn run_bridge(config: DriverConfig, run_for: Duration) -> (Arc<RecordingBus>, DispatchSnapshot) {
        let device = Arc::new(SimulatedDevice::new(config.device.clone()).unwrap());
        let bus = Arc::new(RecordingBus::new());
        let source = Arc::new(SimulatedSource::new(device.clone()));

        let mut node = DriverNode::new(config, device, bus.clone(), Arc::new(SystemClock));
        node.start(source.clone()).unwrap();
        tokio::time::sleep(run_for).await;
        let snapshot = node.shutdown().await;

        assert!(!source.is_streaming());
        (bus, snapshot)
    }

    fn image(message: &Message) -> &contracts::ImageMessage {
        match message {
            Message::Image(image) => image,
            other => panic!("expected image, got {}", other.kind()),
        }
    }

    /// End-to-end: every enabled stream reaches the bus
    ///
    /// 验证完整的数据流：
    /// 1. 启动时发布静态消息（IMU info、外参、静态 TF）
    /// 2. frameset 中每个视频流发布 camera_info + image
    /// 3. 未同步模式下 accel / gyro 各自发布
    #[tokio::test]
    async fn test_e2e_simulated_bridge() {
        let (bus, snapshot) = run_bridge(config(), Duration::from_millis(300)).await;

        for key in [ACCEL, GYRO] {
            assert_eq!(bus.on(&Channel::ImuInfo(key)).len(), 1);
            assert!(!bus.on(&Channel::Imu(key)).is_empty(), "no samples on {key}");
        }
        for key in [COLOR, INFRA1, INFRA2] {
            assert_eq!(bus.on(&Channel::Extrinsics(key)).len(), 1);
        }
        assert_eq!(bus.on(&Channel::TfStatic).len(), 1);
        assert!(bus.on(&Channel::SyncedImu).is_empty());

        for key in [DEPTH, COLOR, INFRA1, INFRA2] {
            let images = bus.on(&Channel::Image(key));
            assert!(!images.is_empty(), "no images on {key}");
            assert_eq!(images.len(), bus.on(&Channel::CameraInfo(key)).len());
        }

        let depth = bus.on(&Channel::Image(DEPTH));
        let first = image(&depth[0]);
        assert_eq!(first.encoding, "16UC1");
        assert_eq!(first.step, 32 * 2);
        assert_eq!(first.header.frame_id, "camera_depth_optical_frame");

        assert!(snapshot.framesets_processed > 0);
        assert_eq!(snapshot.framesets_failed, 0);
        assert!(snapshot.imu_published > 0);
    }

    /// Combined IMU messages keep time order across frameset pauses
    #[tokio::test]
    async fn test_e2e_synced_imu() {
        for method in [ImuSyncMethod::Copy, ImuSyncMethod::LinearInterpolation] {
            let config = DriverConfig {
                unite_imu_method: method,
                ..config()
            };
            let (bus, _) = run_bridge(config, Duration::from_millis(300)).await;

            assert!(bus.on(&Channel::Imu(ACCEL)).is_empty());
            let synced = bus.on(&Channel::SyncedImu);
            assert!(!synced.is_empty(), "{method:?} produced nothing");

            let stamps: Vec<_> = synced
                .iter()
                .map(|m| match m {
                    Message::Imu(imu) => {
                        assert_eq!(imu.header.frame_id, "camera_imu_optical_frame");
                        imu.header.stamp
                    }
                    other => panic!("expected imu, got {}", other.kind()),
                })
                .collect();
            assert!(stamps.windows(2).all(|w| w[0] <= w[1]), "{method:?} out of order");
        }
    }

    /// Decimation shrinks depth; the colorized frame replaces depth in its slot
    #[tokio::test]
    async fn test_e2e_decimation_and_colorizer() {
        let mut config = config();
        enable(&mut config, StageTag::Decimation);
        let (bus, _) = run_bridge(config.clone(), Duration::from_millis(200)).await;
        let depth = bus.on(&Channel::Image(DEPTH));
        assert_eq!(image(&depth[0]).width, 16);
        assert_eq!(image(&depth[0]).encoding, "16UC1");

        enable(&mut config, StageTag::Colorizer);
        let (bus, _) = run_bridge(config, Duration::from_millis(200)).await;
        let depth = bus.on(&Channel::Image(DEPTH));
        assert!(depth.iter().all(|m| image(m).encoding == "rgb8"));
        assert_eq!(image(&depth[0]).width, 16);
    }

    /// Point cloud is published with texture; aligned depth follows the target
    #[tokio::test]
    async fn test_e2e_pointcloud_and_aligned_depth() {
        let mut config = DriverConfig {
            align_depth: true,
            ..config()
        };
        enable(&mut config, StageTag::Pointcloud);
        let (bus, _) = run_bridge(config, Duration::from_millis(300)).await;

        let clouds = bus.on(&Channel::PointCloud);
        assert!(!clouds.is_empty());
        let Message::PointCloud(cloud) = &clouds[0] else {
            panic!("expected point cloud");
        };
        assert_eq!(cloud.header.frame_id, "camera_depth_optical_frame");
        assert!(!cloud.points.is_empty());
        // left band carries no depth
        assert!(cloud.points.len() < 32 * 16);
        assert!(cloud.points.iter().all(|p| p[2] > 0.0));
        assert_eq!(cloud.colors.as_ref().map(Vec::len), Some(cloud.points.len()));

        let aligned = bus.on(&Channel::AlignedDepthImage(COLOR));
        assert!(!aligned.is_empty());
        assert_eq!(image(&aligned[0]).header.frame_id, "camera_color_optical_frame");
        assert!(!bus.on(&Channel::AlignedDepthImage(INFRA1)).is_empty());
        assert!(bus.on(&Channel::AlignedDepthImage(INFRA2)).is_empty());
    }

    /// Pose stream: odom transform per sample plus odometry
    #[tokio::test]
    async fn test_e2e_pose_odometry() {
        let config = DriverConfig {
            device: DeviceConfig {
                enable_pose: true,
                ..small_device()
            },
            ..config()
        };
        let (bus, snapshot) = run_bridge(config, Duration::from_millis(200)).await;

        let odometry = bus.on(&Channel::Odometry);
        assert!(!odometry.is_empty());
        assert_eq!(snapshot.poses_published as usize, odometry.len());

        let Message::Odometry(odom) = &odometry[0] else {
            panic!("expected odometry");
        };
        assert_eq!(odom.header.frame_id, "odom_frame");
        assert_eq!(odom.child_frame_id, "camera_pose_frame");
        assert_eq!(bus.on(&Channel::Tf).len(), odometry.len());
    }

    /// Periodic TF republish stops with the node
    #[tokio::test]
    async fn test_e2e_periodic_tf() {
        let config = DriverConfig {
            tf_publish_rate: 50.0,
            ..config()
        };
        let (bus, _) = run_bridge(config, Duration::from_millis(200)).await;
        assert!(bus.on(&Channel::TfStatic).is_empty());
        let ticks = bus.on(&Channel::Tf).len();
        assert!(ticks >= 2, "got {ticks} ticks");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(bus.on(&Channel::Tf).len(), ticks);
    }

    /// Stages listed but disabled can be switched on while streaming
    #[tokio::test]
    async fn test_e2e_runtime_filter_toggle() {
        let config = config();
        let device = Arc::new(SimulatedDevice::new(config.device.clone()).unwrap());
        let bus = Arc::new(RecordingBus::new());
        let source = Arc::new(SimulatedSource::new(device.clone()));
        let mut node = DriverNode::new(config, device, bus.clone(), Arc::new(SystemClock));
        node.start(source).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(bus.on(&Channel::PointCloud).is_empty());

        assert!(node.dispatcher().pipeline().set_enabled(StageTag::Pointcloud, true));
        tokio::time::sleep(Duration::from_millis(150)).await;
        node.shutdown().await;
        assert!(!bus.on(&Channel::PointCloud).is_empty());
    }
}
