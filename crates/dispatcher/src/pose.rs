//! Pose path: odom transform and odometry.

use std::sync::Arc;

use contracts::{
    read_record, Channel, Frame, FramePayload, Header, Message, MessageBus, Odometry, Pose,
    PoseData, Stamp, StaticTransform, StreamKey, StreamKind, Twist,
};
use sync_engine::ClockBase;
use tracing::{instrument, trace};
use transforms::axes::{pose_orientation, pose_vector, to_quaternion, to_vector};
use transforms::FrameNames;

use crate::error::{DispatcherError, DispatcherResult};
use crate::metrics::DispatchMetrics;

/// Diagonal 6x6 covariance: three position entries then three rotation entries
fn covariance_6x6(linear: f64, angular: f64) -> [f64; 36] {
    let mut covariance = [0.0; 36];
    for i in 0..6 {
        covariance[i * 7] = if i < 3 { linear } else { angular };
    }
    covariance
}

/// Confidence-scaled (pose, twist) covariance values
pub fn pose_covariance(
    linear_accel_cov: f64,
    angular_velocity_cov: f64,
    confidence: u32,
) -> (f64, f64) {
    let confidence = confidence as i32;
    (
        linear_accel_cov * 10f64.powi(3 - confidence),
        angular_velocity_cov * 10f64.powi(1 - confidence),
    )
}

/// Publishes pose samples
pub struct PoseRouter {
    names: FrameNames,
    clock: Arc<ClockBase>,
    bus: Arc<dyn MessageBus>,
    publish_odom_tf: bool,
    linear_accel_cov: f64,
    angular_velocity_cov: f64,
    metrics: Arc<DispatchMetrics>,
}

impl PoseRouter {
    pub fn new(
        names: FrameNames,
        clock: Arc<ClockBase>,
        bus: Arc<dyn MessageBus>,
        publish_odom_tf: bool,
        covariance: contracts::ImuCovariance,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        Self {
            names,
            clock,
            bus,
            publish_odom_tf,
            linear_accel_cov: covariance.linear_accel_cov,
            angular_velocity_cov: covariance.angular_velocity_cov,
            metrics,
        }
    }

    #[instrument(
        level = "trace",
        name = "pose_router_handle",
        skip(self, frame),
        fields(frame_number = frame.frame_number)
    )]
    pub fn handle(&self, frame: &Frame) -> DispatcherResult<()> {
        let FramePayload::Pose(bytes) = &frame.payload else {
            return Err(DispatcherError::unexpected_sample(frame.key()));
        };
        let data: PoseData = read_record(frame.key(), bytes)?;
        let stamp = self.clock.to_bus_time(frame.timestamp_ms);

        let pose = Pose {
            position: to_vector(&pose_vector(&data.translation)),
            orientation: to_quaternion(&pose_orientation(&data)),
        };
        let odom_frame = self.names.odom_frame();
        let pose_frame = self.names.frame_id(StreamKey::new(StreamKind::Pose, 0));

        if self.publish_odom_tf {
            let transform = StaticTransform {
                stamp,
                translation: pose.position,
                rotation: pose.orientation,
                parent_frame: odom_frame.clone(),
                child_frame: pose_frame.clone(),
            };
            self.bus
                .publish(&Channel::Tf, Message::Transforms(vec![transform]))?;
            observability::record_transforms_published(1, false);
        }

        if !self.bus.has_subscribers(&Channel::Odometry) {
            observability::record_sample_skipped(&frame.key().name());
            self.metrics.inc_samples_skipped();
            return Ok(());
        }

        let odometry = self.odometry(&data, pose, stamp, odom_frame, pose_frame);
        self.bus
            .publish(&Channel::Odometry, Message::Odometry(odometry))?;
        self.metrics.inc_poses_published();
        trace!(
            confidence = data.tracker_confidence,
            stamp = %stamp,
            "odometry published"
        );
        Ok(())
    }

    fn odometry(
        &self,
        data: &PoseData,
        pose: Pose,
        stamp: Stamp,
        odom_frame: String,
        pose_frame: String,
    ) -> Odometry {
        let (cov_pose, cov_twist) = pose_covariance(
            self.linear_accel_cov,
            self.angular_velocity_cov,
            data.tracker_confidence,
        );
        let covariance = covariance_6x6(cov_pose, cov_twist);

        // body-frame velocities
        let inverse = pose_orientation(data).inverse();
        let twist = Twist {
            linear: to_vector(&(inverse * pose_vector(&data.velocity))),
            angular: to_vector(&(inverse * pose_vector(&data.angular_velocity))),
        };

        Odometry {
            header: Header::new(stamp, odom_frame),
            child_frame_id: pose_frame,
            pose,
            pose_covariance: covariance,
            twist,
            twist_covariance: covariance,
        }
    }
}
