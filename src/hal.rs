//! Hardware collaborator traits.
//!
//! Bring-up code (timer/comparator/counter configuration, pin routing,
//! interrupt registration) lives outside this crate. The control core only
//! sees the three capabilities below. The duty handle is owned by the
//! interrupt side while the gate/polarity handle stays with the task side,
//! so the two contexts cannot race on the same registers.

/// Bidirectional quadrature pulse counter with watch points at
/// ±[`crate::config::ENCODER_WATCH_POINT`].
///
/// Implementations accumulate every watch-point crossing (its signed
/// magnitude) from the hardware event callback and surrender the sum
/// through [`take_overflow`](Self::take_overflow). Crossings must never be
/// lost, even when several occur between drains.
pub trait PulseCounter {
    /// Current hardware count since the last [`clear`](Self::clear).
    fn count(&mut self) -> i32;

    /// Resets the hardware counter to zero.
    fn clear(&mut self);

    /// Drains the accumulated watch-point crossings: returns the signed sum
    /// since the previous call and resets it. Called exactly once per
    /// control tick.
    fn take_overflow(&mut self) -> i32;
}

/// Duty-cycle compare register of the PWM generator.
///
/// Owned by the interrupt context; [`set_compare`](Self::set_compare) is
/// called from the control tick and must be a plain register write: no
/// blocking, no allocation. Hardware latches the value at a configured
/// phase within the period (a bring-up concern).
pub trait PwmDuty {
    /// Sets the compare value in counter ticks,
    /// `0..=`[`crate::config::PWM_PERIOD_TICKS`].
    fn set_compare(&mut self, ticks: u32);
}

/// Timer gate and phase-output polarity of the PWM generator.
///
/// Owned by the task context; only `start`/`stop` paths touch it.
pub trait PwmControl {
    /// Configures the level each phase output takes on counter-empty.
    /// The compare event always drives the active phase back low.
    fn set_phase_outputs(&mut self, phase_a_high: bool, phase_b_high: bool);

    /// Forces both phase outputs low regardless of the counter.
    fn force_outputs_low(&mut self);

    /// Starts the PWM counter.
    fn start(&mut self);

    /// Halts the PWM counter.
    fn stop(&mut self);
}
