// End-to-end session: SynScan-style frames in over a mock serial port,
// control ticks against a scripted pulse counter, responses checked byte
// for byte.

use synscan_axis::config::{PWM_PERIOD_TICKS, STEPS_MUL, STEPS_OFF};
use synscan_axis::control::axis::{AxisShared, MotorAxis, VelocityLoop};
use synscan_axis::test_utils::{CounterScript, LoopbackSerial, MockPwm, MockPwmControl};
use synscan_axis::{CommandPort, Dispatcher, TickListener};

fn pump(
    port: &mut CommandPort<'_, MockPwmControl>,
    serial: &mut LoopbackSerial,
    input: &[u8],
) -> Vec<u8> {
    serial.feed(input);
    while serial.rx_pending() > 0 {
        port.poll(serial).unwrap();
    }
    serial.take_tx().to_vec()
}

// Renders a 24-bit value the way the firmware does, for asserting against
// raw reply bytes.
fn reply6(v: u32) -> Vec<u8> {
    let digits = b"0123456789ABCDEF";
    let nibble = |shift: u32| digits[((v >> shift) & 0xF) as usize];
    vec![
        b'=',
        nibble(4),
        nibble(0),
        nibble(12),
        nibble(8),
        nibble(20),
        nibble(16),
        b'\r',
    ]
}

#[test]
fn tracking_session() {
    let shared = AxisShared::new();
    let script = CounterScript::new();
    let mut port = CommandPort::new(Dispatcher::new(MotorAxis::new(
        &shared,
        MockPwmControl::new(),
    )));
    let mut vloop = VelocityLoop::new(&shared, script.handle(), MockPwm::new());
    let mut serial = LoopbackSerial::new();

    // Host bring-up: version, sync the position, pick a rate, mark init.
    assert_eq!(pump(&mut port, &mut serial, b":e1\r"), b"=563412\r");
    assert_eq!(pump(&mut port, &mut serial, b":E1000080\r"), b"=\r");
    assert_eq!(pump(&mut port, &mut serial, b":I150C300\r"), b"=\r");
    assert_eq!(pump(&mut port, &mut serial, b":F1\r"), b"=\r");
    assert_eq!(shared.target_speed(), 4.0);

    // Start tracking: running | tracking | init.
    assert_eq!(pump(&mut port, &mut serial, b":J1\r"), b"=\r");
    assert_eq!(pump(&mut port, &mut serial, b":f1\r"), b"=111\r");

    // Motor keeps up with the commanded 4 pulses per tick; the loop
    // publishes a growing position and a sane duty compare.
    let mut listener = TickListener::new(&shared);
    for _ in 0..5 {
        vloop.on_tick();
        script.advance(4);
    }
    let report = listener.poll().expect("ticks ran");
    assert_eq!(report.seq, 5);
    assert_eq!(report.position, shared.position());
    assert_eq!(shared.position(), 16);
    assert!(report.compare_value > 0);
    assert!(report.compare_value <= PWM_PERIOD_TICKS);

    // Reported position is pulses scaled into the offset 24-bit field.
    let expected_wire = (shared.position() / STEPS_MUL + STEPS_OFF as i32) as u32;
    assert_eq!(pump(&mut port, &mut serial, b":j1\r"), reply6(expected_wire));

    // Stop; the axis parks and keeps the tracking and init bits.
    assert_eq!(pump(&mut port, &mut serial, b":K1\r"), b"=\r");
    assert_eq!(pump(&mut port, &mut serial, b":f1\r"), b"=101\r");
}

#[test]
fn position_sync_survives_watch_point_overflow() {
    let shared = AxisShared::new();
    let script = CounterScript::new();
    let mut port = CommandPort::new(Dispatcher::new(MotorAxis::new(
        &shared,
        MockPwmControl::new(),
    )));
    let mut vloop = VelocityLoop::new(&shared, script.handle(), MockPwm::new());
    let mut serial = LoopbackSerial::new();

    assert_eq!(pump(&mut port, &mut serial, b":J1\r"), b"=\r");
    vloop.on_tick();

    // Two high watch-point crossings between ticks; the counter wrapped to
    // a small residue.
    script.push_overflow(30_000);
    script.push_overflow(30_000);
    script.set_count(20);
    vloop.on_tick();

    let expected_wire = (60_020 / STEPS_MUL + STEPS_OFF as i32) as u32;
    assert_eq!(pump(&mut port, &mut serial, b":j1\r"), reply6(expected_wire));
}

#[test]
fn malformed_frames_recover() {
    let shared = AxisShared::new();
    let mut port = CommandPort::new(Dispatcher::new(MotorAxis::new(
        &shared,
        MockPwmControl::new(),
    )));
    let mut serial = LoopbackSerial::new();

    // Noise without a frame start draws no response at all.
    assert_eq!(pump(&mut port, &mut serial, b"noise\r\n"), b"");

    assert_eq!(pump(&mut port, &mut serial, b":Z1\r"), b"!0\r");
    assert_eq!(pump(&mut port, &mut serial, b":E1FFF\r"), b"!1\r");
    assert_eq!(pump(&mut port, &mut serial, b":E9FFFFFF\r"), b"!3\r");

    // The stream stays usable after every error.
    assert_eq!(pump(&mut port, &mut serial, b":g1\r"), b"=01\r");
}
