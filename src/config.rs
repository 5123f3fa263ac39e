// config.rs
// Axis controller configuration: loop timing, mechanics, protocol constants

// ============================================================================
// PWM / CONTROL LOOP TIMING
// ============================================================================

/// PWM counter resolution (1 tick = 1 us).
pub const PWM_RESOLUTION_HZ: u32 = 1_000_000;

/// PWM period in counter ticks (20 Hz carrier at 1 MHz resolution).
pub const PWM_PERIOD_TICKS: u32 = 50_000;

/// Counter compare value at which the control tick fires. Kept below the
/// period so the handler always finishes before the counter wraps.
pub const CONTROL_TICK_COMPARE: u32 = 48_000;

// ============================================================================
// ENCODER
// ============================================================================

/// Hardware pulse counter watch points; a crossing wraps the counter and
/// must be accumulated in software.
pub const ENCODER_WATCH_POINT: i32 = 30_000;

// ============================================================================
// MECHANICS
// ============================================================================

/// Encoder pulses per reported protocol step.
pub const STEPS_MUL: i32 = 4;

/// Offset centering the signed step range inside the unsigned 24-bit
/// position field the protocol carries.
pub const STEPS_OFF: u32 = 0x80_0000;

/// Base tracking-rate step period reported to the host.
pub const BASE_STEP_PERIOD: u32 = 300;

/// Motor steps per worm revolution.
pub const STEPS_PER_REV: u32 = 200;

/// Encoder pulses per worm revolution.
pub const WORM_PERIOD: u32 = BASE_STEP_PERIOD * STEPS_PER_REV;

/// Worm revolutions per axis revolution.
pub const WORM_RATIO: u32 = 144;

// ============================================================================
// PID DEFAULTS
// ============================================================================

pub const DEFAULT_KP: f32 = 0.0030;
pub const DEFAULT_KI: f32 = 0.0003;
pub const DEFAULT_KD: f32 = 0.0010;

/// Default velocity target in encoder pulses per control tick.
pub const DEFAULT_TARGET_SPEED: f32 = 5.0;

// ============================================================================
// PROTOCOL
// ============================================================================

/// Command buffer capacity; frames longer than 255 bytes are dropped.
pub const CMD_BUFFER_SIZE: usize = 256;

/// Version reported to the host by the `e` query.
pub const FIRMWARE_VERSION: u32 = 0x12_34_56;
