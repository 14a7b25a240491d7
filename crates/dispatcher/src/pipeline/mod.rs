//! Ordered post-processing stages applied to depth framesets.
//!
//! Every stage carries a stable [`StageTag`]. Lookups go by tag, never by
//! inspecting the concrete block type.

mod pointcloud;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use contracts::{
    ContractError, DeviceService, FilterConfig, FrameFilter, Frameset, PointCloudConfig, StageTag,
};
use tracing::{debug, info, instrument, warn};

pub use pointcloud::PointCloudFilter;

/// A processing block with its tag and switch
pub struct NamedFilter {
    tag: StageTag,
    enabled: AtomicBool,
    filter: Arc<dyn FrameFilter>,
}

impl NamedFilter {
    pub fn new(tag: StageTag, filter: Arc<dyn FrameFilter>, enabled: bool) -> Self {
        Self {
            tag,
            enabled: AtomicBool::new(enabled),
            filter,
        }
    }

    pub fn tag(&self) -> StageTag {
        self.tag
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn process(&self, frameset: Frameset) -> Result<Frameset, ContractError> {
        self.filter.process(frameset)
    }
}

impl std::fmt::Debug for NamedFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedFilter")
            .field("tag", &self.tag)
            .field("enabled", &self.is_enabled())
            .field("block", &self.filter.name())
            .finish()
    }
}

/// One pipeline entry
#[derive(Debug)]
pub enum Stage {
    Processing(NamedFilter),
    /// Point cloud generation, which also publishes its own message
    PointCloud(PointCloudFilter),
}

impl Stage {
    fn named(&self) -> &NamedFilter {
        match self {
            Stage::Processing(named) => named,
            Stage::PointCloud(pc) => pc.named(),
        }
    }

    pub fn tag(&self) -> StageTag {
        self.named().tag()
    }

    pub fn is_enabled(&self) -> bool {
        self.named().is_enabled()
    }
}

/// Ordered, individually switchable stages
#[derive(Debug, Default)]
pub struct FilterPipeline {
    stages: Vec<Stage>,
}

impl FilterPipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Build the pipeline in configured order from the device's blocks
    ///
    /// Tags the device has no block for are skipped with a warning.
    #[instrument(name = "filter_pipeline_build", skip_all, fields(stages = filters.len()))]
    pub fn from_config(
        filters: &[FilterConfig],
        device: &dyn DeviceService,
        pointcloud: &PointCloudConfig,
    ) -> Self {
        let mut stages = Vec::with_capacity(filters.len());
        for entry in filters {
            let Some(block) = device.processing_block(entry.name) else {
                warn!(stage = %entry.name, "device provides no block for stage, skipped");
                continue;
            };
            let named = NamedFilter::new(entry.name, block, entry.enabled);
            let stage = match entry.name {
                StageTag::Pointcloud => {
                    Stage::PointCloud(PointCloudFilter::new(named, pointcloud.clone()))
                }
                _ => Stage::Processing(named),
            };
            debug!(stage = %entry.name, enabled = entry.enabled, "stage added");
            stages.push(stage);
        }
        info!(
            stages = stages.len(),
            enabled = stages.iter().filter(|s| s.is_enabled()).count(),
            "filter pipeline ready"
        );
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Switch a stage on or off; returns `false` for unknown tags
    pub fn set_enabled(&self, tag: StageTag, enabled: bool) -> bool {
        match self.stages.iter().find(|s| s.tag() == tag) {
            Some(stage) => {
                stage.named().set_enabled(enabled);
                info!(stage = %tag, enabled, "stage toggled");
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, tag: StageTag) -> bool {
        self.stages
            .iter()
            .any(|s| s.tag() == tag && s.is_enabled())
    }

    /// The point cloud stage, if configured
    pub fn point_cloud(&self) -> Option<&PointCloudFilter> {
        self.stages.iter().find_map(|s| match s {
            Stage::PointCloud(pc) => Some(pc),
            Stage::Processing(_) => None,
        })
    }

    /// Run every enabled stage in order
    pub fn process(&self, mut frameset: Frameset) -> Result<Frameset, ContractError> {
        for stage in self.stages.iter().filter(|s| s.is_enabled()) {
            debug!(stage = %stage.tag(), frames = frameset.len(), "applying filter");
            frameset = stage.named().process(frameset)?;
        }
        Ok(frameset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use contracts::{
        DeviceOption, Extrinsics, MotionIntrinsics, StreamKind, StreamProfile,
    };

    /// Appends its tag to a shared trace
    struct TraceBlock {
        tag: StageTag,
        trace: Arc<Mutex<Vec<StageTag>>>,
    }

    impl FrameFilter for TraceBlock {
        fn name(&self) -> &str {
            self.tag.as_str()
        }

        fn process(&self, frameset: Frameset) -> Result<Frameset, ContractError> {
            self.trace.lock().unwrap().push(self.tag);
            Ok(frameset)
        }
    }

    struct BlockDevice {
        trace: Arc<Mutex<Vec<StageTag>>>,
        missing: Option<StageTag>,
    }

    impl DeviceService for BlockDevice {
        fn name(&self) -> &str {
            "blocks"
        }

        fn stream_profiles(&self) -> Vec<StreamProfile> {
            Vec::new()
        }

        fn extrinsics(
            &self,
            _from: &StreamProfile,
            _to: &StreamProfile,
        ) -> Result<Extrinsics, ContractError> {
            Ok(Extrinsics::identity())
        }

        fn motion_intrinsics(
            &self,
            _profile: &StreamProfile,
        ) -> Result<MotionIntrinsics, ContractError> {
            Ok(MotionIntrinsics::default())
        }

        fn depth_scale(&self) -> f32 {
            0.001
        }

        fn option_value(&self, _option: DeviceOption) -> Result<f32, ContractError> {
            Ok(0.0)
        }

        fn processing_block(&self, tag: StageTag) -> Option<Arc<dyn FrameFilter>> {
            if Some(tag) == self.missing {
                return None;
            }
            Some(Arc::new(TraceBlock {
                tag,
                trace: self.trace.clone(),
            }))
        }

        fn align_to(&self, _target: StreamKind) -> Arc<dyn FrameFilter> {
            unimplemented!("not used by pipeline tests")
        }
    }

    fn entries(list: &[(StageTag, bool)]) -> Vec<FilterConfig> {
        list.iter()
            .map(|&(name, enabled)| FilterConfig { name, enabled })
            .collect()
    }

    #[test]
    fn test_configured_order_and_disabled_skipped() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let device = BlockDevice {
            trace: trace.clone(),
            missing: None,
        };
        let pipeline = FilterPipeline::from_config(
            &entries(&[
                (StageTag::Spatial, true),
                (StageTag::Decimation, true),
                (StageTag::Temporal, false),
                (StageTag::Colorizer, true),
            ]),
            &device,
            &PointCloudConfig::default(),
        );

        pipeline.process(Frameset::default()).unwrap();
        assert_eq!(
            *trace.lock().unwrap(),
            vec![StageTag::Spatial, StageTag::Decimation, StageTag::Colorizer]
        );
    }

    #[test]
    fn test_toggle_at_runtime() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let device = BlockDevice {
            trace: trace.clone(),
            missing: None,
        };
        let pipeline = FilterPipeline::from_config(
            &entries(&[(StageTag::Decimation, false)]),
            &device,
            &PointCloudConfig::default(),
        );

        pipeline.process(Frameset::default()).unwrap();
        assert!(trace.lock().unwrap().is_empty());

        assert!(pipeline.set_enabled(StageTag::Decimation, true));
        assert!(!pipeline.set_enabled(StageTag::HoleFilling, true));
        pipeline.process(Frameset::default()).unwrap();
        assert_eq!(*trace.lock().unwrap(), vec![StageTag::Decimation]);
    }

    #[test]
    fn test_point_cloud_lookup_by_tag() {
        let device = BlockDevice {
            trace: Arc::new(Mutex::new(Vec::new())),
            missing: Some(StageTag::Spatial),
        };
        let pipeline = FilterPipeline::from_config(
            &entries(&[(StageTag::Spatial, true), (StageTag::Pointcloud, true)]),
            &device,
            &PointCloudConfig::default(),
        );

        assert_eq!(pipeline.len(), 1);
        assert!(pipeline.point_cloud().is_some());
        assert!(pipeline.is_enabled(StageTag::Pointcloud));

        let empty = FilterPipeline::default();
        assert!(empty.point_cloud().is_none());
    }
}
