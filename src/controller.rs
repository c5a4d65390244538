use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};

use crate::config::Config;
use crate::constants::SHUTDOWN_JOIN_PERIODS;
use crate::error::{ServoError, ServoResult};
use crate::psdk::StatusSink;
use crate::pwm::PwmDriver;
use crate::types::{angle_to_duty_cycle, clamp_angle, GateState, StatusSnapshot};

/// Shared actuator state. Each field is individually atomic so status reads
/// never take a lock; a reader racing a toggle may pair the new angle with
/// the previous open flag, but never observes a torn scalar.
///
/// This and the stop flag are the only state crossing the boundary between
/// the command path and the status loop.
struct ActuatorState {
    current_angle: AtomicU32,
    is_open: AtomicBool,
    is_initialized: AtomicBool,
    should_stop: AtomicBool,
}

impl ActuatorState {
    fn new(angle: f32) -> Self {
        ActuatorState {
            current_angle: AtomicU32::new(angle.to_bits()),
            is_open: AtomicBool::new(false),
            is_initialized: AtomicBool::new(false),
            should_stop: AtomicBool::new(false),
        }
    }

    fn angle(&self) -> f32 {
        f32::from_bits(self.current_angle.load(Ordering::Acquire))
    }

    fn set_angle(&self, angle: f32) {
        self.current_angle.store(angle.to_bits(), Ordering::Release);
    }

    fn snapshot(&self, gpio_pin: u8, frequency: u32) -> StatusSnapshot {
        StatusSnapshot {
            current_angle: self.angle(),
            state: if self.is_open.load(Ordering::Acquire) {
                GateState::Open
            } else {
                GateState::Closed
            },
            gpio_pin,
            frequency,
        }
    }
}

/// Owns the servo: converts open/closed intent into PWM output, republishes
/// status in the background, and serializes commands arriving from the SDK
/// callback thread.
///
/// The lifecycle is cyclic: a controller may be initialized again after
/// `shutdown`.
pub struct ServoController {
    config: Config,
    state: Arc<ActuatorState>,
    driver: Mutex<Box<dyn PwmDriver>>,
    sink: Arc<dyn StatusSink>,
    status_task: Mutex<Option<JoinHandle<()>>>,
}

impl ServoController {
    pub fn new(config: Config, driver: Box<dyn PwmDriver>, sink: Arc<dyn StatusSink>) -> Self {
        let rest = config.servo.default_position;
        ServoController {
            config,
            state: Arc::new(ActuatorState::new(rest)),
            driver: Mutex::new(driver),
            sink,
            status_task: Mutex::new(None),
        }
    }

    /// Configures the PWM output, moves the servo to its rest position and
    /// starts the status loop. Idempotent: a second call while initialized
    /// warns and succeeds without touching the hardware. A configuration
    /// failure leaves the controller uninitialized and is not retried.
    pub async fn initialize(&self) -> ServoResult<()> {
        if self.state.is_initialized.load(Ordering::Acquire) {
            warn!("servo controller already initialized");
            return Ok(());
        }

        self.driver
            .lock()
            .configure(self.config.servo.gpio_pin, self.config.servo.frequency)?;

        self.state.should_stop.store(false, Ordering::Release);
        self.state.is_initialized.store(true, Ordering::Release);

        // A failed first positioning is a runtime actuation error, not an
        // initialization failure: the channel itself is up.
        if let Err(err) = self.set_position(self.config.servo.default_position) {
            warn!("could not move servo to rest position: {}", err);
        }

        let task = self.spawn_status_loop();
        *self.status_task.lock() = Some(task);

        info!("servo controller initialized");
        Ok(())
    }

    /// Moves the servo to `angle` (clamped to the travel limits). On a write
    /// failure the reported angle is left unchanged and the error is
    /// surfaced, never panicked.
    pub fn set_position(&self, angle: f32) -> ServoResult<()> {
        if !self.state.is_initialized.load(Ordering::Acquire) {
            warn!("servo controller not initialized, ignoring set_position({})", angle);
            return Err(ServoError::NotInitialized);
        }

        let angle = clamp_angle(angle);
        let duty = angle_to_duty_cycle(angle, &self.config.servo);

        if let Err(err) = self.driver.lock().write(duty) {
            warn!("servo write failed: {}", err);
            return Err(ServoError::Actuation(err));
        }

        self.state.set_angle(angle);
        info!("servo moved to {:.1}° (duty cycle: {:.2}%)", angle, duty);
        Ok(())
    }

    /// Flips the servo between the configured open and closed positions and
    /// pushes a status refresh. The open flag only changes when the physical
    /// write succeeded.
    pub fn toggle(&self) -> ServoResult<()> {
        if !self.state.is_initialized.load(Ordering::Acquire) {
            warn!("servo controller not initialized, ignoring toggle");
            return Err(ServoError::NotInitialized);
        }

        let next = if self.state.is_open.load(Ordering::Acquire) {
            GateState::Closed
        } else {
            GateState::Open
        };
        let target = match next {
            GateState::Open => self.config.servo.position_open,
            GateState::Closed => self.config.servo.position_closed,
        };

        self.set_position(target)?;
        self.state.is_open.store(next.is_open(), Ordering::Release);
        info!("servo {}", next);
        self.push_status();
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open.load(Ordering::Acquire)
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_initialized.load(Ordering::Acquire)
    }

    /// Lock-free view of the actuator. Never blocks on the actuation path.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.state
            .snapshot(self.config.servo.gpio_pin, self.config.servo.frequency)
    }

    pub fn status(&self) -> String {
        self.snapshot().render()
    }

    /// Stops the status loop, returns the servo to its rest position and
    /// parks the PWM output. Safe to call repeatedly and after a failed
    /// initialize; the second call performs no hardware access.
    pub async fn shutdown(&self) {
        if !self.state.is_initialized.swap(false, Ordering::AcqRel) {
            return;
        }

        info!("shutting down servo controller");
        self.state.should_stop.store(true, Ordering::Release);

        let task = self.status_task.lock().take();
        if let Some(mut task) = task {
            let grace = self.update_period() * SHUTDOWN_JOIN_PERIODS;
            if timeout(grace, &mut task).await.is_err() {
                warn!("status loop did not stop within {:?}, aborting it", grace);
                task.abort();
            }
        }

        // The park sequence runs to completion even if individual steps fail,
        // so process exit never leaves the PWM channel active.
        let rest = self.config.servo.default_position;
        let duty = angle_to_duty_cycle(rest, &self.config.servo);
        let mut driver = self.driver.lock();
        match driver.write(duty) {
            Ok(()) => self.state.set_angle(rest),
            Err(err) => warn!("could not return servo to rest position: {}", err),
        }
        if let Err(err) = driver.stop() {
            warn!("could not stop PWM output: {}", err);
        }
        if let Err(err) = driver.set_low() {
            warn!("could not drive pin low: {}", err);
        }

        info!("servo controller shut down");
    }

    fn update_period(&self) -> Duration {
        self.config.system.update_period()
    }

    fn push_status(&self) {
        let text = self.status();
        if let Err(err) = self.sink.push_status(&text) {
            debug!("status sink unavailable: {}", err);
        }
    }

    fn spawn_status_loop(&self) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let sink = Arc::clone(&self.sink);
        let gpio_pin = self.config.servo.gpio_pin;
        let frequency = self.config.servo.frequency;
        let period = self.update_period();
        tokio::spawn(async move {
            debug!("status loop started ({:?} period)", period);
            let mut ticker = interval(period);
            while !state.should_stop.load(Ordering::Acquire) {
                ticker.tick().await;
                let text = state.snapshot(gpio_pin, frequency).render();
                if let Err(err) = sink.push_status(&text) {
                    debug!("status sink unavailable: {}", err);
                }
            }
            debug!("status loop stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psdk::testing::RecordingSink;
    use crate::pwm::testing::{MockPwm, PwmCall, PwmProbe};

    fn test_config(update_rate: u32) -> Config {
        let mut config = Config::default();
        config.system.update_rate = update_rate;
        config
    }

    fn controller_with(
        config: Config,
    ) -> (Arc<ServoController>, Arc<PwmProbe>, Arc<RecordingSink>) {
        let (driver, probe) = MockPwm::new();
        let sink = Arc::new(RecordingSink::default());
        let controller = Arc::new(ServoController::new(config, Box::new(driver), sink.clone()));
        (controller, probe, sink)
    }

    #[tokio::test]
    async fn initialize_configures_and_moves_to_rest() {
        let (controller, probe, _) = controller_with(test_config(50));
        controller.initialize().await.unwrap();

        let calls = probe.calls.lock().clone();
        assert_eq!(
            calls[0],
            PwmCall::Configure {
                pin: controller.config.servo.gpio_pin,
                frequency: controller.config.servo.frequency
            }
        );
        let rest_duty = angle_to_duty_cycle(
            controller.config.servo.default_position,
            &controller.config.servo,
        );
        assert_eq!(calls[1], PwmCall::Write { duty: rest_duty });
        assert!(controller.is_initialized());

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let (controller, probe, _) = controller_with(test_config(50));
        controller.initialize().await.unwrap();
        let calls_after_first = probe.call_count();

        controller.initialize().await.unwrap();
        assert_eq!(probe.call_count(), calls_after_first);

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn initialize_fails_when_configuration_fails() {
        let (controller, probe, _) = controller_with(test_config(50));
        probe.fail_configure.store(true, Ordering::Relaxed);

        let err = controller.initialize().await.unwrap_err();
        assert!(matches!(err, ServoError::HardwareInit(_)));
        assert!(!controller.is_initialized());
        assert_eq!(probe.call_count(), 0);

        // Shutdown after a failed initialize is a no-op.
        controller.shutdown().await;
        assert_eq!(probe.call_count(), 0);
    }

    #[tokio::test]
    async fn commands_before_initialize_are_rejected_without_state_change() {
        let (controller, probe, _) = controller_with(test_config(50));
        let angle_before = controller.snapshot().current_angle;

        assert!(matches!(
            controller.set_position(90.0),
            Err(ServoError::NotInitialized)
        ));
        assert!(matches!(controller.toggle(), Err(ServoError::NotInitialized)));

        assert_eq!(controller.snapshot().current_angle, angle_before);
        assert!(!controller.is_open());
        assert_eq!(probe.call_count(), 0);
    }

    #[tokio::test]
    async fn toggle_alternates_between_endpoints() {
        let (controller, _, _) = controller_with(test_config(50));
        controller.initialize().await.unwrap();

        controller.toggle().unwrap();
        assert!(controller.is_open());
        assert_eq!(
            controller.snapshot().current_angle,
            controller.config.servo.position_open
        );

        controller.toggle().unwrap();
        assert!(!controller.is_open());
        assert_eq!(
            controller.snapshot().current_angle,
            controller.config.servo.position_closed
        );

        // Odd number of toggles from closed ends open, even ends closed.
        for _ in 0..5 {
            controller.toggle().unwrap();
        }
        assert!(controller.is_open());
        for _ in 0..5 {
            controller.toggle().unwrap();
        }
        assert!(!controller.is_open());

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn toggle_pushes_an_immediate_status_refresh() {
        let (controller, _, sink) = controller_with(test_config(50));
        controller.initialize().await.unwrap();

        sink.clear();
        controller.toggle().unwrap();
        let lines = sink.lines();
        assert!(lines.iter().any(|line| line.contains("OPEN")));

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn set_position_clamps_to_travel_limits() {
        let (controller, probe, _) = controller_with(test_config(50));
        controller.initialize().await.unwrap();

        controller.set_position(-10.0).unwrap();
        let low = probe.last_write().unwrap();
        controller.set_position(0.0).unwrap();
        assert_eq!(probe.last_write().unwrap(), low);
        assert_eq!(controller.snapshot().current_angle, 0.0);

        controller.set_position(200.0).unwrap();
        let high = probe.last_write().unwrap();
        controller.set_position(180.0).unwrap();
        assert_eq!(probe.last_write().unwrap(), high);
        assert_eq!(controller.snapshot().current_angle, 180.0);

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn failed_write_leaves_reported_state_unchanged() {
        let (controller, probe, _) = controller_with(test_config(50));
        controller.initialize().await.unwrap();
        controller.set_position(45.0).unwrap();

        probe.fail_writes.store(true, Ordering::Relaxed);
        assert!(matches!(
            controller.set_position(135.0),
            Err(ServoError::Actuation(_))
        ));
        assert_eq!(controller.snapshot().current_angle, 45.0);

        assert!(controller.toggle().is_err());
        assert!(!controller.is_open());

        probe.fail_writes.store(false, Ordering::Relaxed);
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_parks_the_output_and_is_idempotent() {
        let (controller, probe, _) = controller_with(test_config(50));
        controller.initialize().await.unwrap();
        controller.toggle().unwrap();

        controller.shutdown().await;
        assert!(!controller.is_initialized());

        let calls = probe.calls.lock().clone();
        let rest_duty = angle_to_duty_cycle(
            controller.config.servo.default_position,
            &controller.config.servo,
        );
        let tail = &calls[calls.len() - 3..];
        assert_eq!(tail[0], PwmCall::Write { duty: rest_duty });
        assert_eq!(tail[1], PwmCall::Stop);
        assert_eq!(tail[2], PwmCall::SetLow);

        let count = probe.call_count();
        controller.shutdown().await;
        assert_eq!(probe.call_count(), count);
    }

    #[tokio::test]
    async fn controller_can_be_reinitialized_after_shutdown() {
        let (controller, probe, _) = controller_with(test_config(50));
        controller.initialize().await.unwrap();
        controller.shutdown().await;

        controller.initialize().await.unwrap();
        assert!(controller.is_initialized());
        let configures = probe
            .calls
            .lock()
            .iter()
            .filter(|call| matches!(call, PwmCall::Configure { .. }))
            .count();
        assert_eq!(configures, 2);

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn status_loop_republishes_and_stops_on_shutdown() {
        // 200Hz keeps the test fast.
        let (controller, _, sink) = controller_with(test_config(200));
        controller.initialize().await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!sink.lines().is_empty());

        controller.shutdown().await;
        let count = sink.lines().len();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(sink.lines().len(), count);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_status_reads_never_observe_torn_state() {
        let (controller, _, _) = controller_with(test_config(50));
        controller.initialize().await.unwrap();

        std::thread::scope(|scope| {
            let reader = scope.spawn(|| {
                for _ in 0..2_000 {
                    let snapshot = controller.snapshot();
                    assert!((0.0..=180.0).contains(&snapshot.current_angle));
                }
            });
            for _ in 0..200 {
                controller.toggle().unwrap();
            }
            reader.join().unwrap();
        });

        controller.shutdown().await;
    }
}
