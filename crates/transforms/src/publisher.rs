//! Static transform computation and (re)publication.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use contracts::{
    Channel, Clock, ContractError, DeviceService, Message, MessageBus, Stamp, StaticTransform,
    StreamKind, StreamProfile, Vector3,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::axes::{optical_rotation, optical_translation, rotation_to_quaternion, to_quaternion};
use crate::error::{TransformError, TransformResult};
use crate::frames::FrameNames;

/// Pick the geometry root: depth-0, else pose-0
pub fn select_base_profile(profiles: &[StreamProfile]) -> TransformResult<StreamProfile> {
    [StreamKind::Depth, StreamKind::Pose]
        .iter()
        .find_map(|&kind| {
            profiles
                .iter()
                .find(|p| p.key.kind == kind && p.key.index == 0)
        })
        .cloned()
        .ok_or(TransformError::NoBaseStream)
}

/// Ordered set of static transforms for one session
pub struct TransformPublisher {
    names: FrameNames,
    base: OnceLock<StreamProfile>,
    transforms: Mutex<Vec<StaticTransform>>,
}

impl std::fmt::Debug for TransformPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformPublisher")
            .field("camera", &self.names.camera())
            .field("base", &self.base.get().map(|p| p.key))
            .field("transforms", &self.len())
            .finish()
    }
}

impl TransformPublisher {
    pub fn new(names: FrameNames) -> Self {
        Self {
            names,
            base: OnceLock::new(),
            transforms: Mutex::new(Vec::new()),
        }
    }

    pub fn names(&self) -> &FrameNames {
        &self.names
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StaticTransform>> {
        self.transforms
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Chosen geometry root, once `compute_all` ran
    pub fn base_profile(&self) -> Option<&StreamProfile> {
        self.base.get()
    }

    /// Select the base profile and compute transforms for every profile
    #[instrument(name = "transforms_compute_all", skip_all, fields(profiles = profiles.len()))]
    pub fn compute_all(
        &self,
        profiles: &[StreamProfile],
        device: &dyn DeviceService,
        stamp: Stamp,
    ) -> TransformResult<()> {
        let base = select_base_profile(profiles)?;
        info!(base = %base.key, "base stream selected");
        let base = self.base.get_or_init(|| base);

        for profile in profiles {
            self.compute_for(profile, base, device, stamp)?;
        }
        Ok(())
    }

    /// Append the transforms of one profile relative to the base
    ///
    /// Missing extrinsics degrade to identity with a warning.
    pub fn compute_for(
        &self,
        profile: &StreamProfile,
        base: &StreamProfile,
        device: &dyn DeviceService,
        stamp: Stamp,
    ) -> TransformResult<()> {
        let ex = match device.extrinsics(profile, base) {
            Ok(ex) => ex,
            Err(ContractError::ExtrinsicsUnavailable { from, to }) => {
                warn!(
                    from = %from,
                    to = %to,
                    "extrinsics not available, using identity transform"
                );
                contracts::Extrinsics::identity()
            }
            Err(e) => return Err(e.into()),
        };

        let q_optical = optical_rotation();
        let q = q_optical * rotation_to_quaternion(&ex.rotation) * q_optical.inverse();
        let rotation = to_quaternion(&q);
        let optical = to_quaternion(&q_optical);
        let translation = optical_translation(&ex.translation);

        let key = profile.key;
        let base_frame = self.names.frame_id(base.key);
        let frame_id = self.names.frame_id(key);
        let optical_frame_id = self.names.optical_frame_id(key);

        let mut entries = vec![
            StaticTransform {
                stamp,
                translation,
                rotation,
                parent_frame: base_frame.clone(),
                child_frame: frame_id.clone(),
            },
            StaticTransform {
                stamp,
                translation: Vector3::default(),
                rotation: optical,
                parent_frame: frame_id,
                child_frame: optical_frame_id.clone(),
            },
        ];

        if profile.is_video() && key.kind != StreamKind::Depth && key.index == 1 {
            let aligned_frame_id = self.names.aligned_depth_frame_id(key);
            entries.push(StaticTransform {
                stamp,
                translation,
                rotation,
                parent_frame: base_frame,
                child_frame: aligned_frame_id.clone(),
            });
            entries.push(StaticTransform {
                stamp,
                translation: Vector3::default(),
                rotation: optical,
                parent_frame: aligned_frame_id,
                child_frame: optical_frame_id,
            });
        }

        debug!(stream = %key, count = entries.len(), "transforms computed");
        self.lock().extend(entries);
        Ok(())
    }

    /// Snapshot of the accumulated transforms
    pub fn transforms(&self) -> Vec<StaticTransform> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Publish the whole set once on the static channel
    pub fn publish_once(&self, bus: &dyn MessageBus) -> TransformResult<()> {
        let transforms = self.transforms();
        let count = transforms.len();
        bus.publish(&Channel::TfStatic, Message::Transforms(transforms))?;
        observability::record_transforms_published(count, true);
        info!(count, "static transforms published");
        Ok(())
    }

    /// Re-stamp every entry to `stamp` and publish on the dynamic channel
    pub fn republish(&self, bus: &dyn MessageBus, stamp: Stamp) -> TransformResult<()> {
        let transforms = {
            let mut guard = self.lock();
            for transform in guard.iter_mut() {
                transform.stamp = stamp;
            }
            guard.clone()
        };
        let count = transforms.len();
        bus.publish(&Channel::Tf, Message::Transforms(transforms))?;
        observability::record_transforms_published(count, false);
        Ok(())
    }

    /// Start periodic republication at `rate_hz`
    ///
    /// The task ends when `shutdown` flips to `true` or its sender is dropped.
    pub fn spawn_republish(
        self: &Arc<Self>,
        rate_hz: f64,
        bus: Arc<dyn MessageBus>,
        clock: Arc<dyn Clock>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let publisher = Arc::clone(self);
        let period = Duration::from_secs_f64(1.0 / rate_hz);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            info!(rate_hz, "transform republish loop started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = publisher.republish(bus.as_ref(), clock.now()) {
                            warn!(error = %e, "transform republish failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("transform republish loop stopped");
        })
    }

    /// Publish according to `rate_hz`: periodic task when > 0, once otherwise
    pub fn start(
        self: &Arc<Self>,
        rate_hz: f64,
        bus: Arc<dyn MessageBus>,
        clock: Arc<dyn Clock>,
        shutdown: watch::Receiver<bool>,
    ) -> TransformResult<Option<JoinHandle<()>>> {
        if rate_hz > 0.0 {
            Ok(Some(self.spawn_republish(rate_hz, bus, clock, shutdown)))
        } else {
            self.publish_once(bus.as_ref())?;
            Ok(None)
        }
    }
}
