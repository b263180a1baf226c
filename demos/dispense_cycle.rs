//! Dispense cycle example.
//!
//! Loads a board configuration from TOML, builds the plunger driver on the
//! host simulation, runs one dispense sequence against simulated X-Y and Z
//! stage boards, and hands mastership to the next dispenser.

use std::rc::Rc;

use paste_dispenser::{
    input::{EdgeDispatcher, EVENT_EDGE_RISE},
    motor::DriverTable,
    parse_config,
    protocol::{BusMaster, Command, CoordinationFlags},
    sequence::{SequenceRegistry, Sequencer, TableApplicator},
    sim::{SimBus, SimDelay, SimDriver, SimDriverPins, SimPwm},
};

const CONFIG_TOML: &str = r#"
[board]
address = 0x10
role = "master"
next_board = 0x11
applicator = "plunger"

[bus]
xy_address = 0x20
z_address = 0x30

[drivers.plunger]
name = "plunger"
step_frequency_hz = 15

[sequences.board_a]
points = [[0, 0], [1200, 800], [1200, 1600]]
z_drop = -400
z_rise = 0
apply_steps = 15

[[inputs]]
line = 2
edge = "rising"
action = "start_sequence"
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Dispense Cycle Example ===\n");

    let config = parse_config(CONFIG_TOML)?;
    let registry = SequenceRegistry::from_config(&config);
    let sequence = registry.require("board_a")?;
    println!("Board {:#04x}, {} points", config.board.address, sequence.len());

    // Stage boards and the next dispenser on the simulated bus
    let bus = SimBus::new();
    bus.add_stage(config.bus.xy_address, 4);
    bus.add_stage(config.bus.z_address, 2);
    let next = bus.add_peer(0x11);
    let flags = Rc::new(CoordinationFlags::new(config.board.role));
    bus.watch(Rc::clone(&flags));

    // Plunger driver, finished by the simulated wrap interrupt
    let pwm = SimPwm::new();
    let pins = SimDriverPins::new();
    let table = Rc::new(DriverTable::<SimDriver, 1>::new());
    let mut plunger = pins
        .builder(&pwm, 1, 0)
        .from_config(&config, "plunger")?
        .build()?;
    plunger.enable()?;
    let slot = table.insert(plunger)?;
    flags.set_ready(true);

    let delay = SimDelay::servicing(pwm.clone(), Rc::clone(&table));
    let clock = delay.clock();
    let mut master = BusMaster::from_config(bus.clone(), delay, &config.bus);
    let mut sequencer = Sequencer::from_config(&flags, &config);
    let mut applicator = TableApplicator::new(&*table, slot);

    // Start button
    let dispatcher = EdgeDispatcher::from_config(&config);
    for action in dispatcher.dispatch_events(2, EVENT_EDGE_RISE) {
        action.perform(&*table, Some(slot), &flags)?;
    }

    match sequencer.run_pending(&mut master, sequence, &mut applicator)? {
        Some(report) => {
            println!("Dispensed {} points", report.points);
            println!("  X-Y commands: {}", report.xy_commands);
            println!("  Z commands:   {}", report.z_commands);
            println!("  Status polls: {}", report.polls);
            println!("  Plunger steps: {}", report.steps_applied);
        }
        None => println!("No start request pending"),
    }

    println!("\nFrames on the bus:");
    for (address, command) in bus.log() {
        if command != Command::StatusRequest {
            println!("  {:#04x} <- {:?}", address, command);
        }
    }

    println!("\nSimulated time: {} ms", clock.now_ns() / 1_000_000);
    println!("Plunger pulses: {}", pwm.edges(1));
    println!("This board master: {}", flags.is_master());
    println!("Next board master: {}", next.is_master());
    println!("Most simultaneous masters: {}", bus.max_masters());

    Ok(())
}
