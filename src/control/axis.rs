use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

use libm::roundf;
use log::{debug, info};

use crate::config::{
    DEFAULT_KD, DEFAULT_KI, DEFAULT_KP, DEFAULT_TARGET_SPEED, PWM_PERIOD_TICKS,
};
use crate::control::pid::IncrementalPid;
use crate::control::telemetry::TickNotifier;
use crate::control::tracker::QuadratureTracker;
use crate::hal::{PulseCounter, PwmControl, PwmDuty};

/// Axis state both concurrency domains touch.
///
/// Every field is a single-word atomic: the task context (dispatcher) and
/// the interrupt context (control tick) never share a multi-word value.
/// Operations that logically belong to the interrupt side (re-basing the
/// position, zeroing the error integral) go through release/acquire
/// mailboxes consumed at the top of the next tick. PID and tracker scratch
/// never leave [`VelocityLoop`].
pub struct AxisShared {
    target_speed_bits: AtomicU32,
    target_position: AtomicI32,
    position: AtomicI32,
    compare_value: AtomicU32,
    direction: AtomicBool,
    running: AtomicBool,
    stop_at_target: AtomicBool,
    init_done: AtomicBool,
    reset_position: AtomicI32,
    reset_pending: AtomicBool,
    integral_reset: AtomicBool,
    tick: TickNotifier,
}

impl AxisShared {
    pub const fn new() -> Self {
        Self {
            target_speed_bits: AtomicU32::new(DEFAULT_TARGET_SPEED.to_bits()),
            target_position: AtomicI32::new(0),
            position: AtomicI32::new(0),
            compare_value: AtomicU32::new(0),
            direction: AtomicBool::new(false),
            running: AtomicBool::new(false),
            stop_at_target: AtomicBool::new(false),
            init_done: AtomicBool::new(false),
            reset_position: AtomicI32::new(0),
            reset_pending: AtomicBool::new(false),
            integral_reset: AtomicBool::new(false),
            tick: TickNotifier::new(),
        }
    }

    pub fn target_speed(&self) -> f32 {
        f32::from_bits(self.target_speed_bits.load(Ordering::Relaxed))
    }

    pub fn set_target_speed(&self, pulses_per_tick: f32) {
        self.target_speed_bits
            .store(pulses_per_tick.to_bits(), Ordering::Relaxed);
    }

    pub fn target_position(&self) -> i32 {
        self.target_position.load(Ordering::Relaxed)
    }

    pub fn set_target_position(&self, target: i32) {
        self.target_position.store(target, Ordering::Relaxed);
    }

    pub fn position(&self) -> i32 {
        self.position.load(Ordering::Relaxed)
    }

    pub fn compare_value(&self) -> u32 {
        self.compare_value.load(Ordering::Relaxed)
    }

    pub fn direction(&self) -> bool {
        self.direction.load(Ordering::Relaxed)
    }

    pub fn set_direction(&self, ccw: bool) {
        self.direction.store(ccw, Ordering::Relaxed);
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }

    pub fn stop_at_target(&self) -> bool {
        self.stop_at_target.load(Ordering::Relaxed)
    }

    pub fn set_stop_at_target(&self, stop: bool) {
        self.stop_at_target.store(stop, Ordering::Relaxed);
    }

    pub fn init_done(&self) -> bool {
        self.init_done.load(Ordering::Relaxed)
    }

    pub fn set_init_done(&self, done: bool) {
        self.init_done.store(done, Ordering::Relaxed);
    }

    pub fn tick_notifier(&self) -> &TickNotifier {
        &self.tick
    }

    /// Queues a position re-base for the next control tick and makes the
    /// new position observable to readers immediately.
    pub(crate) fn request_position_reset(&self, position: i32) {
        self.reset_position.store(position, Ordering::Relaxed);
        self.reset_pending.store(true, Ordering::Release);
        self.position.store(position, Ordering::Relaxed);
    }

    pub(crate) fn take_position_reset(&self) -> Option<i32> {
        if self.reset_pending.swap(false, Ordering::Acquire) {
            Some(self.reset_position.load(Ordering::Relaxed))
        } else {
            None
        }
    }

    pub(crate) fn request_integral_reset(&self) {
        self.integral_reset.store(true, Ordering::Release);
    }

    pub(crate) fn take_integral_reset(&self) -> bool {
        self.integral_reset.swap(false, Ordering::Acquire)
    }

    pub(crate) fn publish_tick(&self, position: i32, compare_value: u32) {
        self.position.store(position, Ordering::Relaxed);
        self.compare_value.store(compare_value, Ordering::Relaxed);
        self.tick.notify();
    }
}

impl Default for AxisShared {
    fn default() -> Self {
        Self::new()
    }
}

/// Task-side face of the axis: run/stop state, direction, targets.
///
/// Owns the PWM gate/polarity handle; the compare register belongs to
/// [`VelocityLoop`]. Phase polarity is configured in [`start`](Self::start)
/// and nowhere else, so flipping [`set_direction`](Self::set_direction)
/// while running leaves the outputs as they are until the next start.
pub struct MotorAxis<'a, P: PwmControl> {
    shared: &'a AxisShared,
    pwm: P,
}

impl<'a, P: PwmControl> MotorAxis<'a, P> {
    pub fn new(shared: &'a AxisShared, pwm: P) -> Self {
        Self { shared, pwm }
    }

    pub fn shared(&self) -> &'a AxisShared {
        self.shared
    }

    /// Applies the stored direction to the phase outputs, zeroes the error
    /// integral and starts the PWM counter.
    pub fn start(&mut self) {
        self.shared.request_integral_reset();
        let ccw = self.shared.direction();
        self.pwm.set_phase_outputs(!ccw, ccw);
        self.pwm.start();
        self.shared.set_running(true);
        info!("axis start, ccw={}", ccw);
    }

    /// Halts the PWM counter and parks both phase outputs low. The protocol
    /// maps both of its stop commands here; there is no deceleration ramp.
    pub fn stop(&mut self) {
        self.pwm.stop();
        self.pwm.force_outputs_low();
        self.shared.set_running(false);
        info!("axis stop");
    }

    /// Stores the direction flag only; output polarity follows on the next
    /// [`start`](Self::start).
    pub fn set_direction(&self, ccw: bool) {
        self.shared.set_direction(ccw);
    }

    /// Re-bases the tracked position in encoder pulses. The error integral
    /// is zeroed alongside on the consuming tick.
    pub fn set_position(&self, pulses: i32) {
        self.shared.request_position_reset(pulses);
        debug!("position reset to {}", pulses);
    }

    pub fn set_target(&self, pulses: i32) {
        self.shared.set_target_position(pulses);
    }

    pub fn set_target_speed(&self, pulses_per_tick: f32) {
        self.shared.set_target_speed(pulses_per_tick);
    }

    pub fn set_init_done(&self) {
        self.shared.set_init_done(true);
    }

    pub fn set_stop_at_target(&self, stop: bool) {
        self.shared.set_stop_at_target(stop);
    }

    pub fn position(&self) -> i32 {
        self.shared.position()
    }

    pub fn target(&self) -> i32 {
        self.shared.target_position()
    }
}

/// Interrupt-side velocity loop: tracker -> PID -> compare register.
pub struct VelocityLoop<'a, C: PulseCounter, D: PwmDuty> {
    shared: &'a AxisShared,
    counter: C,
    duty: D,
    tracker: QuadratureTracker,
    pid: IncrementalPid,
    velocity_error: f32,
    velocity_error_integral: f32,
}

impl<'a, C: PulseCounter, D: PwmDuty> VelocityLoop<'a, C, D> {
    pub fn new(shared: &'a AxisShared, counter: C, duty: D) -> Self {
        Self {
            shared,
            counter,
            duty,
            tracker: QuadratureTracker::new(),
            pid: IncrementalPid::new(DEFAULT_KP, DEFAULT_KI, DEFAULT_KD),
            velocity_error: 0.0,
            velocity_error_integral: 0.0,
        }
    }

    /// One control tick. Interrupt context: bounded time, no allocation,
    /// never blocks. Bring-up registers this as the PWM-period callback at
    /// the [`crate::config::CONTROL_TICK_COMPARE`] phase.
    pub fn on_tick(&mut self) {
        if let Some(position) = self.shared.take_position_reset() {
            self.tracker.reload(&mut self.counter, position);
            self.velocity_error_integral = 0.0;
        }
        if self.shared.take_integral_reset() {
            self.velocity_error_integral = 0.0;
        }

        let sample = self.tracker.sample(&mut self.counter);
        let mut velocity = sample.delta;
        if self.shared.direction() {
            velocity = -velocity;
        }

        self.velocity_error = self.shared.target_speed() - velocity as f32;
        self.velocity_error_integral += self.velocity_error;

        let output = self.pid.step(self.velocity_error_integral);
        let compare = roundf(output * PWM_PERIOD_TICKS as f32) as u32;
        self.duty.set_compare(compare);

        self.shared.publish_tick(sample.position, compare);
    }

    pub fn velocity_error(&self) -> f32 {
        self.velocity_error
    }

    pub fn velocity_error_integral(&self) -> f32 {
        self.velocity_error_integral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{CounterScript, MockPwm, MockPwmControl};

    fn ticks_expected(inputs: &[f32]) -> u32 {
        // Mirrors the PID recurrence over integrated error for the final
        // compare value.
        let mut pid = IncrementalPid::new(DEFAULT_KP, DEFAULT_KI, DEFAULT_KD);
        let mut out = 0.0;
        for &e in inputs {
            out = pid.step(e);
        }
        roundf(out * PWM_PERIOD_TICKS as f32) as u32
    }

    #[test]
    fn tick_publishes_position_and_compare() {
        let shared = AxisShared::new();
        let script = CounterScript::new();
        let mut vloop = VelocityLoop::new(&shared, script.handle(), MockPwm::new());

        vloop.on_tick();

        // Stalled motor at the default target of 5 pulses/tick: error 5,
        // integral 5.
        assert_eq!(vloop.velocity_error(), 5.0);
        assert_eq!(vloop.velocity_error_integral(), 5.0);
        assert_eq!(shared.compare_value(), ticks_expected(&[5.0]));
        assert_eq!(vloop.duty.compare, shared.compare_value());
        assert_eq!(shared.position(), 0);
        assert_eq!(shared.tick_notifier().current(), 1);
    }

    #[test]
    fn direction_flag_negates_velocity_sample_only() {
        let shared = AxisShared::new();
        shared.set_direction(true);
        let script = CounterScript::new();
        let mut vloop = VelocityLoop::new(&shared, script.handle(), MockPwm::new());

        script.set_count(-5);
        vloop.on_tick();

        // Raw delta -5 reads as velocity +5 in CCW mode: error is zero and
        // the published position stays the raw absolute count.
        assert_eq!(vloop.velocity_error(), 0.0);
        assert_eq!(shared.position(), -5);
    }

    #[test]
    fn position_reset_consumed_on_next_tick() {
        let shared = AxisShared::new();
        let script = CounterScript::new();
        let mut vloop = VelocityLoop::new(&shared, script.handle(), MockPwm::new());

        script.set_count(250);
        vloop.on_tick();
        vloop.velocity_error_integral = 42.0;

        shared.request_position_reset(-8_000);
        // Visible to readers before any tick runs.
        assert_eq!(shared.position(), -8_000);

        // The consuming tick clears the hardware counter and restarts the
        // integral from zero, so a stalled read accrues the bare target.
        vloop.on_tick();
        assert_eq!(vloop.velocity_error_integral(), 5.0);
        assert_eq!(shared.position(), -8_000);

        script.set_count(3);
        vloop.on_tick();
        assert_eq!(shared.position(), -7_997);
        assert_eq!(vloop.velocity_error_integral(), 5.0 + (5.0 - 3.0));
    }

    #[test]
    fn start_zeroes_integral_via_mailbox() {
        let shared = AxisShared::new();
        let script = CounterScript::new();
        let mut axis = MotorAxis::new(&shared, MockPwmControl::new());
        let mut vloop = VelocityLoop::new(&shared, script.handle(), MockPwm::new());

        vloop.on_tick();
        assert_eq!(vloop.velocity_error_integral(), 5.0);

        axis.start();
        vloop.on_tick();
        // Integral restarted from zero before this tick's error came in.
        assert_eq!(vloop.velocity_error_integral(), 5.0);
    }

    #[test]
    fn start_configures_phase_polarity_from_direction() {
        let shared = AxisShared::new();
        let mut axis = MotorAxis::new(&shared, MockPwmControl::new());

        axis.start();
        assert_eq!((axis.pwm.phase_a_high, axis.pwm.phase_b_high), (true, false));
        assert!(axis.pwm.running);
        assert!(shared.running());

        axis.stop();
        assert!(!axis.pwm.running);
        assert!(axis.pwm.forced_low);
        assert!(!shared.running());

        axis.set_direction(true);
        axis.start();
        assert_eq!((axis.pwm.phase_a_high, axis.pwm.phase_b_high), (false, true));
    }

    #[test]
    fn direction_change_while_running_leaves_polarity_untouched() {
        let shared = AxisShared::new();
        let mut axis = MotorAxis::new(&shared, MockPwmControl::new());

        axis.start();
        let before = (axis.pwm.phase_a_high, axis.pwm.phase_b_high);

        axis.set_direction(true);
        assert_eq!((axis.pwm.phase_a_high, axis.pwm.phase_b_high), before);

        // The stored flag did change; the outputs follow on the next start.
        assert!(shared.direction());
        axis.start();
        assert_eq!((axis.pwm.phase_a_high, axis.pwm.phase_b_high), (false, true));
    }
}
