//! Integration tests for paste-dispenser.
//!
//! These tests run drivers, the bus protocol and whole dispense sequences on
//! the host simulation, from TOML configuration to handover.

use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use proptest::prelude::*;

use paste_dispenser::config::{PollPolicy, RetryPolicy, Role};
use paste_dispenser::error::{BusError, ProtocolError, SequenceError};
use paste_dispenser::input::{Action, Edge, EdgeDispatcher, Effect};
use paste_dispenser::motor::{AxisSlot, DriverState};
use paste_dispenser::protocol::{BusMaster, Command, CoordinationFlags, Target};
use paste_dispenser::sequence::{NoApplicator, TableApplicator};
use paste_dispenser::sim::{SimBus, SimDelay, SimDriver, SimDriverPins, SimPwm};
use paste_dispenser::{
    parse_config, DriverTable, Error, Hertz, Point, SequenceConfig, SequenceRegistry, Sequencer,
};

// =============================================================================
// Test configuration data
// =============================================================================

const BOARD_A: &str = r#"
[board]
address = 0x10
role = "master"
next_board = 0x11
applicator = "plunger"

[bus]
xy_address = 0x20
z_address = 0x30

[bus.retry]
max_attempts = 4
backoff_ms = 5

[bus.poll]
max_polls = 200
interval_ms = 10

[drivers.plunger]
name = "plunger"
step_frequency_hz = 15
microsteps = 1

[drivers.plunger.polarity]
enable = "active_low"
direction = "active_high"

[sequences.single]
points = [[0, 0]]
z_drop = -400
z_rise = 0

[sequences.pair]
points = [[1200, 800], [1500, 800]]
z_drop = -400
z_rise = -100
apply_steps = 30
origin = [10, 10]

[[inputs]]
line = 0
edge = "rising"
action = { forward_by = 15 }

[[inputs]]
line = 2
edge = "rising"
action = "start_sequence"
"#;

const XY: u8 = 0x20;
const Z: u8 = 0x30;
const NEXT: u8 = 0x11;
const STEP_SLICE: u8 = 1;
const COUNTER_SLICE: u8 = 0;

/// Master board with a plunger driver in a table serviced by the bus delay.
struct Rig {
    bus: SimBus,
    pwm: SimPwm,
    table: Rc<DriverTable<SimDriver, 1>>,
    slot: AxisSlot,
    flags: Rc<CoordinationFlags>,
    peer: Rc<CoordinationFlags>,
}

impl Rig {
    fn new() -> Self {
        let bus = SimBus::new();
        bus.add_stage(XY, 2);
        bus.add_stage(Z, 3);
        let peer = bus.add_peer(NEXT);
        let flags = Rc::new(CoordinationFlags::new(Role::Master));
        bus.watch(Rc::clone(&flags));

        let pwm = SimPwm::new();
        let table = Rc::new(DriverTable::<SimDriver, 1>::new());
        let mut plunger = SimDriverPins::new()
            .builder(&pwm, STEP_SLICE, COUNTER_SLICE)
            .name("plunger")
            .step_frequency(Hertz(15))
            .build()
            .unwrap();
        plunger.enable().unwrap();
        let slot = table.insert(plunger).unwrap();
        flags.set_ready(true);

        Self {
            bus,
            pwm,
            table,
            slot,
            flags,
            peer,
        }
    }

    fn master(&self) -> BusMaster<SimBus, SimDelay> {
        BusMaster::new(
            self.bus.clone(),
            SimDelay::servicing(self.pwm.clone(), Rc::clone(&self.table)),
            RetryPolicy { max_attempts: 3, backoff_ms: 2 },
            PollPolicy { max_polls: 500, interval_ms: 10 },
        )
    }
}

fn moves(commands: &[Command]) -> Vec<Command> {
    commands
        .iter()
        .copied()
        .filter(|c| *c != Command::StatusRequest)
        .collect()
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_parse_board_config() {
    let config = parse_config(BOARD_A).expect("board config should parse");

    assert_eq!(config.board.role, Role::Master);
    assert_eq!(config.board.next_board, Some(NEXT));
    assert_eq!(config.bus.retry.max_attempts, 4);
    assert_eq!(config.bus.poll.interval_ms, 10);

    let plunger = config.applicator().expect("applicator should resolve");
    assert_eq!(plunger.step_frequency, Hertz(15));

    let pair = config.sequence("pair").unwrap();
    assert_eq!(pair.points.len(), 2);
    assert_eq!(pair.apply_steps, 30);
    assert_eq!(pair.origin, Point::new(10, 10));

    let registry = SequenceRegistry::from_config(&config);
    assert_eq!(registry.len(), 2);
    assert!(registry.contains("single"));
}

#[test]
fn test_config_inputs_replace_bench_defaults() {
    let config = parse_config(BOARD_A).unwrap();
    let dispatcher = EdgeDispatcher::from_config(&config);

    assert_eq!(dispatcher.dispatch(0, Edge::Rising), Some(Action::ForwardBy(15)));
    assert_eq!(dispatcher.dispatch(2, Edge::Rising), Some(Action::StartSequence));
    assert_eq!(dispatcher.dispatch(1, Edge::Rising), None);
}

#[test]
fn test_unreachable_step_frequency_rejected() {
    let config = BOARD_A.replace("step_frequency_hz = 15", "step_frequency_hz = 5000");
    assert!(matches!(
        parse_config(&config),
        Err(Error::Config(_))
    ));
}

// =============================================================================
// Actuator driver timing
// =============================================================================

#[test]
fn test_fifteen_steps_at_fifteen_hz_take_one_second() {
    let rig = Rig::new();
    let mut delay = SimDelay::servicing(rig.pwm.clone(), Rc::clone(&rig.table));
    let clock = delay.clock();

    rig.table
        .with(rig.slot, |d| d.forward_by(15))
        .unwrap()
        .unwrap();
    while !rig.table.with(rig.slot, |d| d.motion().is_idle()).unwrap() {
        delay.delay_us(100);
        assert!(clock.now_ns() < 2_000_000_000, "bounded move never ended");
    }

    let elapsed = clock.now_ns();
    assert!(elapsed >= 1_000_000_000, "ended early at {} ns", elapsed);
    assert!(elapsed <= 1_100_000_000, "ended late at {} ns", elapsed);
    assert_eq!(rig.pwm.edges(STEP_SLICE), 15);
    assert!(!rig.pwm.is_pulsing(STEP_SLICE));
    assert_eq!(rig.table.with(rig.slot, |d| d.pulses_counted()).unwrap(), 0);
}

#[test]
fn test_enable_is_idempotent() {
    let pins = SimDriverPins::new();
    let pwm = SimPwm::new();
    let mut driver = pins
        .builder(&pwm, STEP_SLICE, COUNTER_SLICE)
        .step_frequency(Hertz(15))
        .build()
        .unwrap();

    driver.enable().unwrap();
    let once = (driver.state(), pins.enable.level());
    driver.enable().unwrap();
    assert_eq!((driver.state(), pins.enable.level()), once);

    driver.disable().unwrap();
    let once = (driver.state(), pins.enable.level());
    driver.disable().unwrap();
    assert_eq!((driver.state(), pins.enable.level()), once);
    assert_eq!(driver.state(), DriverState::Disabled);
}

#[test]
fn test_jog_button_runs_bounded_move() {
    let rig = Rig::new();
    let dispatcher = EdgeDispatcher::bench_defaults();
    let action = dispatcher.dispatch(1, Edge::Rising).unwrap();

    let effect = action.perform(&*rig.table, Some(rig.slot), &rig.flags).unwrap();
    assert_eq!(effect, Effect::None);

    let mask = rig.pwm.advance(1_000_000_000);
    rig.table.on_wrap_mask(mask).unwrap();
    assert!(rig.table.with(rig.slot, |d| d.motion().is_idle()).unwrap());
    assert_eq!(rig.pwm.edges(STEP_SLICE), 15);
}

// =============================================================================
// Coordination sequence
// =============================================================================

#[test]
fn test_single_point_sequence_issues_each_command_once() {
    let rig = Rig::new();
    let mut bus = rig.master();
    let mut sequencer = Sequencer::new(&rig.flags, XY, Z, Some(NEXT));
    let mut applicator = TableApplicator::new(&*rig.table, rig.slot);
    let sequence = SequenceConfig::new(&[Point::new(0, 0)], -400, 0).unwrap();

    let report = sequencer
        .run(&mut bus, &sequence, &mut applicator)
        .expect("sequence should complete");

    assert_eq!(
        moves(&rig.bus.commands_to(XY)),
        vec![Command::MoveXy(Point::new(0, 0)), Command::MoveXy(Point::ORIGIN)]
    );
    assert_eq!(
        moves(&rig.bus.commands_to(Z)),
        vec![Command::MoveZ(-400), Command::MoveZ(0)]
    );
    assert_eq!(rig.bus.commands_to(NEXT), vec![Command::Handover]);

    // One local bounded move of 15 steps
    assert_eq!(report.applies, 1);
    assert_eq!(report.steps_applied, 15);
    assert_eq!(rig.table.with(rig.slot, |d| d.completed_moves()).unwrap(), 1);
    assert_eq!(rig.pwm.edges(STEP_SLICE), 15);

    assert!(!rig.flags.is_master());
    assert!(rig.peer.is_master());
    assert_eq!(rig.bus.max_masters(), 1);
    assert_eq!(rig.bus.early_reports(), 0);
}

#[test]
fn test_apply_happens_between_drop_and_rise() {
    let rig = Rig::new();
    let mut bus = rig.master();
    let mut sequencer = Sequencer::new(&rig.flags, XY, Z, Some(NEXT));
    let mut applicator = TableApplicator::new(&*rig.table, rig.slot);
    let sequence = SequenceConfig::new(&[Point::new(5, 5), Point::new(9, 5)], -400, 0).unwrap();

    let report = sequencer.run(&mut bus, &sequence, &mut applicator).unwrap();

    assert_eq!(report.points, 2);
    assert_eq!(report.applies, 2);
    assert_eq!(rig.pwm.edges(STEP_SLICE), 30);

    let log: Vec<_> = rig
        .bus
        .log()
        .into_iter()
        .filter(|(_, c)| *c != Command::StatusRequest)
        .collect();
    assert_eq!(
        log,
        vec![
            (XY, Command::MoveXy(Point::new(5, 5))),
            (Z, Command::MoveZ(-400)),
            (Z, Command::MoveZ(0)),
            (XY, Command::MoveXy(Point::new(9, 5))),
            (Z, Command::MoveZ(-400)),
            (Z, Command::MoveZ(0)),
            (XY, Command::MoveXy(Point::ORIGIN)),
            (NEXT, Command::Handover),
        ]
    );
}

#[test]
fn test_long_apply_outlasts_stage_poll_bound() {
    let rig = Rig::new();
    // 500 polls of 10 ms: shorter than 100 steps at 15 Hz
    let mut bus = rig.master();
    let mut sequencer = Sequencer::new(&rig.flags, XY, Z, Some(NEXT));
    let mut applicator = TableApplicator::new(&*rig.table, rig.slot);
    let mut sequence = SequenceConfig::new(&[Point::new(4, 4)], -400, 0).unwrap();
    sequence.apply_steps = 100;

    let report = sequencer
        .run(&mut bus, &sequence, &mut applicator)
        .expect("apply should finish");

    assert_eq!(report.steps_applied, 100);
    assert_eq!(rig.pwm.edges(STEP_SLICE), 100);
    assert!(rig.table.with(rig.slot, |d| d.motion().is_idle()).unwrap());
    assert!(rig.peer.is_master());
}

#[test]
fn test_apply_timeout_stops_plunger() {
    let rig = Rig::new();
    // Wrap interrupts are never serviced, so the plunger never finishes
    let mut bus = BusMaster::new(
        rig.bus.clone(),
        SimDelay::new(),
        RetryPolicy::default(),
        PollPolicy { max_polls: 5, interval_ms: 10 },
    );
    let mut sequencer = Sequencer::new(&rig.flags, XY, Z, Some(NEXT));
    let mut applicator = TableApplicator::new(&*rig.table, rig.slot);
    let sequence = SequenceConfig::new(&[Point::new(4, 4)], -400, 0).unwrap();
    rig.flags.request_start();

    assert_eq!(
        sequencer.run(&mut bus, &sequence, &mut applicator),
        Err(Error::Sequence(SequenceError::ApplyTimeout))
    );
    assert!(sequencer.is_paused());
    assert!(!rig.flags.start_pending());
    assert!(rig.table.with(rig.slot, |d| d.motion().is_idle()).unwrap());
    assert!(!rig.pwm.is_pulsing(STEP_SLICE));
    assert!(!rig.pwm.is_counting(COUNTER_SLICE));
    assert!(rig.bus.commands_to(NEXT).is_empty());
}

#[test]
fn test_unready_board_does_not_start() {
    let rig = Rig::new();
    rig.flags.set_ready(false);
    let mut bus = rig.master();
    let mut sequencer = Sequencer::new(&rig.flags, XY, Z, Some(NEXT));
    let sequence = SequenceConfig::new(&[Point::new(0, 0)], -400, 0).unwrap();

    assert_eq!(
        sequencer.run(&mut bus, &sequence, &mut NoApplicator),
        Err(Error::Sequence(SequenceError::BoardNotReady))
    );
    assert!(rig.bus.log().is_empty());
}

#[test]
fn test_transient_nack_is_retried() {
    let rig = Rig::new();
    let mut bus = rig.master();
    let mut sequencer = Sequencer::new(&rig.flags, XY, Z, Some(NEXT));
    rig.bus
        .fail_next(Z, 2, ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));

    let sequence = SequenceConfig::new(&[Point::new(0, 0)], -400, 0).unwrap();
    sequencer
        .run(&mut bus, &sequence, &mut NoApplicator)
        .expect("two failures fit in three attempts");

    assert!(rig.peer.is_master());
    assert_eq!(rig.bus.position(Z), Some(Target::Vertical(0)));
}

#[test]
fn test_persistent_nack_pauses_sequence() {
    let rig = Rig::new();
    let mut bus = rig.master();
    let mut sequencer = Sequencer::new(&rig.flags, XY, Z, Some(NEXT));
    let nack = ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address);
    rig.bus.fail_next(Z, 3, nack);
    rig.flags.request_start();

    let sequence = SequenceConfig::new(&[Point::new(0, 0)], -400, 0).unwrap();
    let err = sequencer
        .run(&mut bus, &sequence, &mut NoApplicator)
        .unwrap_err();

    assert_eq!(
        err,
        Error::Bus(BusError { address: Z, kind: nack, attempts: 3 })
    );
    assert!(sequencer.is_paused());
    assert!(!rig.flags.start_pending());
    assert!(rig.flags.is_master());
    assert_eq!(sequencer.xy().known_position(), Some(Point::new(0, 0)));
    assert_eq!(sequencer.z().known_position(), None);
    assert!(rig.bus.commands_to(NEXT).is_empty());
}

#[test]
fn test_unexpected_status_halts_sequence() {
    let rig = Rig::new();
    let mut bus = rig.master();
    let mut sequencer = Sequencer::new(&rig.flags, XY, Z, Some(NEXT));
    rig.bus.force_status(XY, Some(0x42));

    let sequence = SequenceConfig::new(&[Point::new(0, 0)], -400, 0).unwrap();
    let err = sequencer
        .run(&mut bus, &sequence, &mut NoApplicator)
        .unwrap_err();

    assert_eq!(
        err,
        Error::Protocol(ProtocolError::UnexpectedStatus { address: XY, status: 0x42 })
    );
    assert!(rig.bus.commands_to(Z).is_empty());
    assert!(rig.bus.commands_to(NEXT).is_empty());
}

#[test]
fn test_stage_that_never_arrives_times_out() {
    let rig = Rig::new();
    let mut bus = BusMaster::new(
        rig.bus.clone(),
        SimDelay::new(),
        RetryPolicy::default(),
        PollPolicy { max_polls: 5, interval_ms: 1 },
    );
    rig.bus.force_status(XY, Some(0));

    assert_eq!(
        bus.command_and_wait(XY, &Command::MoveXy(Point::new(1, 1))),
        Err(Error::Protocol(ProtocolError::Timeout { address: XY, polls: 5 }))
    );
}

#[test]
fn test_disabled_applicator_blocks_start() {
    let rig = Rig::new();
    rig.table.with(rig.slot, |d| d.disable()).unwrap().unwrap();
    let mut bus = rig.master();
    let mut sequencer = Sequencer::new(&rig.flags, XY, Z, Some(NEXT));
    let mut applicator = TableApplicator::new(&*rig.table, rig.slot);

    let sequence = SequenceConfig::new(&[Point::new(0, 0)], -400, 0).unwrap();
    assert_eq!(
        sequencer.run(&mut bus, &sequence, &mut applicator),
        Err(Error::Sequence(SequenceError::ApplicatorNotReady))
    );
    assert!(rig.bus.log().is_empty());
}

#[test]
fn test_start_button_drives_run_pending() {
    let rig = Rig::new();
    let mut bus = rig.master();
    let mut sequencer = Sequencer::new(&rig.flags, XY, Z, Some(NEXT));
    let sequence = SequenceConfig::new(&[Point::new(0, 0)], -400, 0).unwrap();

    assert_eq!(
        sequencer.run_pending(&mut bus, &sequence, &mut NoApplicator),
        Ok(None)
    );

    Action::StartSequence
        .perform(&*rig.table, Some(rig.slot), &rig.flags)
        .unwrap();
    let report = sequencer
        .run_pending(&mut bus, &sequence, &mut NoApplicator)
        .unwrap();
    assert_eq!(report.map(|r| r.points), Some(1));
    assert!(rig.peer.is_master());
}

#[test]
fn test_mastership_passes_around_the_ring() {
    let bus = SimBus::new();
    bus.add_stage(XY, 1);
    bus.add_stage(Z, 1);
    let a = bus.add_peer(0x10);
    let b = bus.add_peer(0x11);
    a.accept_handover();
    a.set_ready(true);
    b.set_ready(true);

    let sequence = SequenceConfig::new(&[Point::new(3, 3)], -10, 0).unwrap();
    let policy = PollPolicy { max_polls: 10, interval_ms: 1 };

    let mut bus_a = BusMaster::new(bus.clone(), SimDelay::new(), RetryPolicy::default(), policy);
    let mut seq_a = Sequencer::new(&a, XY, Z, Some(0x11));
    seq_a.run(&mut bus_a, &sequence, &mut NoApplicator).unwrap();
    assert!(!a.is_master());
    assert!(b.is_master());

    // A no longer holds the bus
    assert_eq!(
        seq_a.run(&mut bus_a, &sequence, &mut NoApplicator),
        Err(Error::Sequence(SequenceError::NotMaster))
    );

    let mut bus_b = BusMaster::new(bus.clone(), SimDelay::new(), RetryPolicy::default(), policy);
    let mut seq_b = Sequencer::new(&b, XY, Z, Some(0x10));
    seq_b.run(&mut bus_b, &sequence, &mut NoApplicator).unwrap();
    assert!(a.is_master());
    assert!(!b.is_master());

    assert_eq!(bus.max_masters(), 1);
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_bounded_move_ends_idle_with_exact_count(steps in 1u32..=300, hz in 8u32..=1900) {
        let pins = SimDriverPins::new();
        let pwm = SimPwm::new();
        let mut driver = pins
            .builder(&pwm, STEP_SLICE, COUNTER_SLICE)
            .step_frequency(Hertz(hz))
            .build()
            .unwrap();

        driver.forward_by(steps).unwrap();
        let ns = (u64::from(steps) * 1_000_000_000 + u64::from(hz) - 1) / u64::from(hz);
        let mask = pwm.advance(ns);
        prop_assert_eq!(mask, driver.counter_id().mask());
        driver.on_wrap().unwrap();

        prop_assert!(driver.motion().is_idle());
        prop_assert_eq!(driver.pulses_counted(), 0);
        prop_assert!(!pwm.is_pulsing(STEP_SLICE));
        prop_assert_eq!(pwm.edges(STEP_SLICE), u64::from(steps));
    }

    #[test]
    fn prop_stop_always_returns_to_idle(bounded in any::<bool>(), steps in 1u32..=100, elapsed_ms in 0u64..500) {
        let pins = SimDriverPins::new();
        let pwm = SimPwm::new();
        let mut driver = pins
            .builder(&pwm, STEP_SLICE, COUNTER_SLICE)
            .step_frequency(Hertz(15))
            .build()
            .unwrap();

        if bounded {
            driver.backward_by(steps).unwrap();
        } else {
            driver.backward().unwrap();
        }
        pwm.advance(elapsed_ms * 1_000_000);
        driver.stop().unwrap();

        prop_assert!(driver.motion().is_idle());
        prop_assert!(!pwm.is_pulsing(STEP_SLICE));
        prop_assert!(!pwm.is_counting(COUNTER_SLICE));
    }

    #[test]
    fn prop_in_position_never_reported_early(x in any::<i32>(), y in any::<i32>(), travel in 1u32..20) {
        let bus = SimBus::new();
        bus.add_stage(XY, travel);
        let mut master = BusMaster::new(
            bus.clone(),
            SimDelay::new(),
            RetryPolicy::default(),
            PollPolicy { max_polls: 50, interval_ms: 1 },
        );

        let target = Point::new(x, y);
        let polls = master.command_and_wait(XY, &Command::MoveXy(target)).unwrap();

        prop_assert_eq!(polls, travel - 1);
        prop_assert_eq!(bus.position(XY), Some(Target::Planar(target)));
        prop_assert_eq!(bus.early_reports(), 0);
    }
}
