use log::debug;

use crate::config::{
    BASE_STEP_PERIOD, FIRMWARE_VERSION, PWM_PERIOD_TICKS, PWM_RESOLUTION_HZ, STEPS_MUL, STEPS_OFF,
    WORM_PERIOD, WORM_RATIO,
};
use crate::control::axis::MotorAxis;
use crate::hal::PwmControl;
use crate::protocol::wire::{check_empty, parse2, parse6, CmdError, Response};

const STATUS_RUNNING: u32 = 0x001;
const STATUS_TRACKING: u32 = 0x010;
const STATUS_CCW: u32 = 0x020;
const STATUS_INIT: u32 = 0x100;

/// Every operation the command set knows, tagged with its payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opcode {
    SetPosition,
    InitDone,
    SetDirection,
    SetTarget,
    SetPeriod,
    Start,
    Stop,
    InstantStop,
    SetAux,
    SetGuiding,
    SetLed,
    GetCounts,
    GetTimerFreq,
    GetTarget,
    GetPeriod,
    GetPosition,
    GetStatus,
    GetHighSpeed,
    GetWormPeriod,
    GetVersion,
}

/// Payload the opcode expects. `Ignored` commands skip terminator and axis
/// validation entirely and always acknowledge (original behavior for the
/// init-done and aux/guiding/LED ops).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PayloadKind {
    Empty,
    Hex2,
    Hex6,
    Ignored,
}

const OPS: &[(u8, Opcode, PayloadKind)] = &[
    (b'E', Opcode::SetPosition, PayloadKind::Hex6),
    (b'F', Opcode::InitDone, PayloadKind::Ignored),
    (b'G', Opcode::SetDirection, PayloadKind::Hex2),
    (b'S', Opcode::SetTarget, PayloadKind::Hex6),
    (b'I', Opcode::SetPeriod, PayloadKind::Hex6),
    (b'J', Opcode::Start, PayloadKind::Empty),
    (b'K', Opcode::Stop, PayloadKind::Empty),
    (b'L', Opcode::InstantStop, PayloadKind::Empty),
    (b'O', Opcode::SetAux, PayloadKind::Ignored),
    (b'P', Opcode::SetGuiding, PayloadKind::Ignored),
    (b'V', Opcode::SetLed, PayloadKind::Ignored),
    (b'a', Opcode::GetCounts, PayloadKind::Empty),
    (b'b', Opcode::GetTimerFreq, PayloadKind::Empty),
    (b'h', Opcode::GetTarget, PayloadKind::Empty),
    (b'i', Opcode::GetPeriod, PayloadKind::Empty),
    (b'j', Opcode::GetPosition, PayloadKind::Empty),
    (b'f', Opcode::GetStatus, PayloadKind::Empty),
    (b'g', Opcode::GetHighSpeed, PayloadKind::Empty),
    (b'D', Opcode::GetWormPeriod, PayloadKind::Empty),
    (b'e', Opcode::GetVersion, PayloadKind::Empty),
];

fn lookup(op: u8) -> Option<(Opcode, PayloadKind)> {
    OPS.iter()
        .find(|(code, _, _)| *code == op)
        .map(|&(_, opcode, payload)| (opcode, payload))
}

/// Wire position field -> encoder pulses.
fn steps_from_wire(v: u32) -> i32 {
    (v as i32).wrapping_sub(STEPS_OFF as i32) * STEPS_MUL
}

/// Encoder pulses -> wire position field (low 24 bits are rendered).
fn steps_to_wire(pulses: i32) -> u32 {
    (pulses / STEPS_MUL + STEPS_OFF as i32) as u32
}

/// Routes parsed command frames onto the axis accessors and produces one
/// response per frame.
///
/// Axis selector `'1'` is the motor axis, `'3'` addresses every implemented
/// axis in one call, and `'2'` is a reserved slot with no hardware behind
/// it: setters succeed silently, the status query reports zero.
pub struct Dispatcher<'a, P: PwmControl> {
    axis: MotorAxis<'a, P>,
}

impl<'a, P: PwmControl> Dispatcher<'a, P> {
    pub fn new(axis: MotorAxis<'a, P>) -> Self {
        Self { axis }
    }

    pub fn axis(&self) -> &MotorAxis<'a, P> {
        &self.axis
    }

    /// Handles one complete frame (leading `':'` and terminator included).
    pub fn handle(&mut self, frame: &[u8]) -> Response {
        if frame.first() != Some(&b':') {
            return Response::Error(CmdError::InvalidChar);
        }
        let op = frame.get(1).copied().unwrap_or(0);
        let Some((opcode, payload)) = lookup(op) else {
            debug!("unknown op 0x{:02x}", op);
            return Response::Error(CmdError::Unknown);
        };

        let value = match payload {
            PayloadKind::Empty => {
                if !check_empty(frame) {
                    return Response::Error(CmdError::Length);
                }
                0
            }
            PayloadKind::Hex2 => match parse2(frame) {
                Some(v) => v,
                None => return Response::Error(CmdError::Length),
            },
            PayloadKind::Hex6 => match parse6(frame) {
                Some(v) => v,
                None => return Response::Error(CmdError::Length),
            },
            PayloadKind::Ignored => 0,
        };

        let axis = frame.get(2).copied().unwrap_or(0);
        self.execute(opcode, axis, value)
    }

    fn execute(&mut self, opcode: Opcode, axis: u8, value: u32) -> Response {
        match opcode {
            Opcode::SetPosition => {
                self.apply(axis, |a| a.set_position(steps_from_wire(value)))
            }
            Opcode::InitDone => {
                self.axis.set_init_done();
                Response::Ack
            }
            Opcode::SetDirection => self.apply(axis, |a| a.set_direction(value & 0x01 != 0)),
            Opcode::SetTarget => self.apply(axis, |a| a.set_target(steps_from_wire(value))),
            Opcode::SetPeriod => self.apply(axis, |a| {
                a.set_target_speed(PWM_PERIOD_TICKS as f32 / value as f32 * STEPS_MUL as f32)
            }),
            Opcode::Start => self.apply(axis, |a| a.start()),
            Opcode::Stop | Opcode::InstantStop => self.apply(axis, |a| a.stop()),
            Opcode::SetAux | Opcode::SetGuiding | Opcode::SetLed => Response::Ack,
            Opcode::GetCounts => {
                self.answer(axis, Response::Value6(WORM_PERIOD * WORM_RATIO / STEPS_MUL as u32))
            }
            Opcode::GetTimerFreq => self.answer(axis, Response::Value6(PWM_RESOLUTION_HZ)),
            Opcode::GetTarget => {
                self.answer(axis, Response::Value6(steps_to_wire(self.axis.target())))
            }
            Opcode::GetPeriod => {
                self.answer(axis, Response::Value6(BASE_STEP_PERIOD / STEPS_MUL as u32))
            }
            Opcode::GetPosition => {
                self.answer(axis, Response::Value6(steps_to_wire(self.axis.position())))
            }
            Opcode::GetStatus => match axis {
                b'1' => Response::Value3(self.status_bits()),
                b'2' => Response::Value3(0),
                _ => Response::Error(CmdError::InvalidChar),
            },
            Opcode::GetHighSpeed => self.answer(axis, Response::Value2(1)),
            Opcode::GetWormPeriod => self.answer(axis, Response::Value6(WORM_PERIOD)),
            Opcode::GetVersion => self.answer(axis, Response::Value6(FIRMWARE_VERSION)),
        }
    }

    /// Setter routing: `'1'`/`'3'` reach the motor axis, `'2'` is the
    /// hardware-less slot and still acknowledges.
    fn apply<F: FnOnce(&mut MotorAxis<'a, P>)>(&mut self, axis: u8, f: F) -> Response {
        match axis {
            b'1' | b'3' => {
                f(&mut self.axis);
                Response::Ack
            }
            b'2' => Response::Ack,
            _ => Response::Error(CmdError::InvalidChar),
        }
    }

    /// Getter routing: both numbered slots answer; anything else is
    /// rejected, the both-axes selector included.
    fn answer(&self, axis: u8, response: Response) -> Response {
        match axis {
            b'1' | b'2' => response,
            _ => Response::Error(CmdError::InvalidChar),
        }
    }

    fn status_bits(&self) -> u32 {
        let shared = self.axis.shared();
        let mut status = 0;
        if shared.running() {
            status |= STATUS_RUNNING;
        }
        if !shared.stop_at_target() {
            status |= STATUS_TRACKING;
        }
        if shared.direction() {
            status |= STATUS_CCW;
        }
        if shared.init_done() {
            status |= STATUS_INIT;
        }
        status
    }
}
