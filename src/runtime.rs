// 50 Hz control loop with joystick watchdog
//
// Each tick: compose one drive request from operator input, run every camera through the
// vision pipeline and fusion gate, then let the drivetrain advance its odometry.
// The async loop only moves messages in and out; `Runtime::tick` is synchronous.

use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::config::{
    CMD_TIMEOUT, Config, ConfigError, LOOP_HZ, OBSERVATION_BUFFER_DEPTH, TOPIC_CMD_JOYSTICK, TOPIC_HEALTH,
    TOPIC_RT_MODULES, TOPIC_TELEMETRY, TOPIC_VISION_PREFIX, tick_period,
};
use crate::drivetrain::geometry::project_to_plane;
use crate::drivetrain::{Drivetrain, SimDrivetrain};
use crate::messages::{CameraObservation, DriveRequest, JoystickSample, RuntimeHealth};
use crate::telemetry::{CameraOutcome, TelemetryFrame};
use crate::teleop::DriveFrameComposer;
use crate::vision::{
    CameraSource, FieldLayoutSource, FusionDecision, JsonFileLayout, ObservationBuffer, PoseFusionGate,
    VisionPoseProducer,
};

/// Everything one tick decided
#[derive(Debug, Clone)]
pub struct TickReport {
    pub request: DriveRequest,
    /// One decision per camera, in configuration order
    pub decisions: Vec<(String, FusionDecision)>,
    pub telemetry: TelemetryFrame,
}

pub struct Runtime<D, C, L> {
    composer: DriveFrameComposer,
    producer: VisionPoseProducer<C, L>,
    gate: PoseFusionGate,
    drivetrain: D,
    latest_sample: Option<JoystickSample>,
    sample_received_at: Option<f64>,
    health: RuntimeHealth,
    tick: u64,
}

impl<D: Drivetrain, C: CameraSource, L: FieldLayoutSource> Runtime<D, C, L> {
    /// Every camera source must have a matching entry in `config.vision.cameras`
    pub fn new(config: &Config, drivetrain: D, cameras: Vec<C>, layout: L) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut mounted = Vec::with_capacity(cameras.len());
        for camera in cameras {
            let Some(camera_config) = config.camera(camera.name()) else {
                return Err(ConfigError::UnknownCamera(camera.name().to_string()));
            };
            let robot_to_camera = camera_config.robot_to_camera.to_isometry();
            mounted.push((camera, robot_to_camera));
        }

        Ok(Self {
            composer: DriveFrameComposer::new(&config.drive, &config.sweep, tick_period()),
            producer: VisionPoseProducer::new(layout, mounted, config.vision.layout_retry_ticks),
            gate: PoseFusionGate::new(&config.vision),
            drivetrain,
            latest_sample: None,
            sample_received_at: None,
            health: RuntimeHealth::CmdStale, // Start stale until first sample
            tick: 0,
        })
    }

    /// Latest joystick sample wins
    pub fn on_joystick(&mut self, sample: JoystickSample, now: f64) {
        debug!("Joystick sample: {:?}", &sample);
        self.latest_sample = Some(sample);
        self.sample_received_at = Some(now);
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    pub fn drivetrain(&self) -> &D {
        &self.drivetrain
    }

    pub fn camera_mut(&mut self, name: &str) -> Option<&mut C> {
        self.producer.camera_mut(name)
    }

    /// Run one control cycle at runtime-clock time `now` (seconds)
    pub fn tick(&mut self, now: f64) -> TickReport {
        self.tick += 1;

        // 1. Pose snapshot; every vision read this tick uses it
        let reference = self.drivetrain.current_pose();

        // 2. Compose the drive request (watchdog decides whether input is live)
        let live = self.watchdog(now);
        let sample = if live { self.latest_sample.as_ref() } else { None };
        let composition = self.composer.compose(sample);

        // 3. Single dispatch site
        match composition.request {
            DriveRequest::Idle => {}
            request @ (DriveRequest::FieldCentric(_)
            | DriveRequest::RobotCentric(_)
            | DriveRequest::Brake
            | DriveRequest::PointWheels { .. }) => self.drivetrain.apply_drive_command(&request),
        }

        // 4. Vision candidates and fusion decisions, one per camera
        let polls = self.producer.poll(self.tick, reference);
        let mut decisions = Vec::with_capacity(polls.len());
        for poll in polls {
            let decision = self.gate.evaluate(poll.candidate, now);
            if let FusionDecision::Accepted { candidate, std_devs } = &decision {
                debug!(
                    "Fusing {} pose captured at {:.3}s ({} tags)",
                    poll.camera, candidate.timestamp, candidate.tag_count
                );
                self.drivetrain
                    .inject_pose_measurement(candidate.to_pose2d(), candidate.timestamp, *std_devs);
                self.producer.record_accepted(candidate);
            }
            decisions.push((poll.camera, decision));
        }

        // 5. Heading re-seed waits until nothing else reads the pose this tick
        if composition.seed_field_centric {
            info!("Re-seeding field-centric heading");
            self.drivetrain.seed_field_centric();
        }

        // 6. Odometry
        self.drivetrain.periodic(now);

        let pose = self.drivetrain.current_pose();
        let telemetry = TelemetryFrame {
            tick: self.tick,
            pose,
            heading_deg: pose.heading_degrees(),
            vision_pose: self.producer.last_accepted().map(project_to_plane),
            vision_outcomes: decisions
                .iter()
                .map(|(camera, decision)| CameraOutcome {
                    camera: camera.clone(),
                    outcome: decision.outcome(),
                })
                .collect(),
            shaped: composition.shaped,
            request: composition.request.kind(),
            layout: self.producer.layout_state().status(),
            vision_faults: self.producer.faults(),
            health: self.health,
        };

        TickReport {
            request: composition.request,
            decisions,
            telemetry,
        }
    }

    /// True while the latest joystick sample is fresh. Logs on transitions only.
    fn watchdog(&mut self, now: f64) -> bool {
        let age = self.sample_received_at.map(|t| now - t);
        let live = age.is_some_and(|age| age <= CMD_TIMEOUT.as_secs_f64());

        match (live, self.health) {
            (true, RuntimeHealth::CmdStale) => info!("Joystick input live"),
            (false, RuntimeHealth::Ok) => {
                // Watchdog triggered - stop driving
                warn!(
                    "Joystick stale ({:.0} ms old), drivetrain idle",
                    age.unwrap_or_default() * 1000.0
                );
            }
            _ => {}
        }

        self.health = if live { RuntimeHealth::Ok } else { RuntimeHealth::CmdStale };
        live
    }
}

pub type LiveRuntime = Runtime<SimDrivetrain, ObservationBuffer, JsonFileLayout>;

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let joystick_sub = session.declare_subscriber(TOPIC_CMD_JOYSTICK).await?;
    let mut vision_subs = Vec::with_capacity(config.vision.cameras.len());
    for camera in &config.vision.cameras {
        let topic = format!("{}/{}", TOPIC_VISION_PREFIX, camera.name);
        info!("Subscribed to: {}", topic);
        let subscriber = session.declare_subscriber(topic).await?;
        vision_subs.push((camera.name.clone(), subscriber));
    }
    let pub_modules = session.declare_publisher(TOPIC_RT_MODULES).await?;
    let pub_telemetry = session.declare_publisher(TOPIC_TELEMETRY).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let drivetrain = SimDrivetrain::new(&config.drive, &config.estimator);
    let cameras = config
        .vision
        .cameras
        .iter()
        .map(|c| ObservationBuffer::new(c.name.clone(), OBSERVATION_BUFFER_DEPTH))
        .collect();
    let layout = JsonFileLayout::new(&config.vision.field_layout_path);
    let mut runtime: LiveRuntime = Runtime::new(&config, drivetrain, cameras, layout)?;

    let start = Instant::now();
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis()
    );
    info!("Subscribed to: {}", TOPIC_CMD_JOYSTICK);
    info!("Publishing to: {}, {}, {}", TOPIC_RT_MODULES, TOPIC_TELEMETRY, TOPIC_HEALTH);

    loop {
        tick.tick().await;
        let now = start.elapsed().as_secs_f64();

        // 1. Drain joystick samples (non-blocking), keep latest
        while let Ok(Some(sample)) = joystick_sub.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<JoystickSample>(&payload) {
                Ok(js) => runtime.on_joystick(js, now),
                Err(e) => warn!("Failed to parse joystick sample: {}", e),
            }
        }

        // 2. Buffer camera frames until the tick reads them
        for (name, subscriber) in &vision_subs {
            while let Ok(Some(sample)) = subscriber.try_recv() {
                let payload = sample.payload().to_bytes();
                match serde_json::from_slice::<CameraObservation>(&payload) {
                    Ok(observation) => {
                        if let Some(buffer) = runtime.camera_mut(name) {
                            buffer.push(observation, now);
                        }
                    }
                    Err(e) => warn!("Failed to parse {} observation: {}", name, e),
                }
            }
        }

        // 3. Control cycle
        let report = runtime.tick(now);

        // 4. Publish module setpoints, telemetry and health
        let modules_json = serde_json::to_string(runtime.drivetrain().module_states())?;
        pub_modules.put(modules_json).await?;

        let telemetry_json = serde_json::to_string(&report.telemetry)?;
        pub_telemetry.put(telemetry_json).await?;

        let health_json = serde_json::to_string(&runtime.health())?;
        pub_health.put(health_json).await?;
    }
}
