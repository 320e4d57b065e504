//! Basic demonstration of the Shieldwall simulation.
//!
//! Run with: cargo run --example basic_demo

use shieldwall_sim::constants::{FIXED_TIMESTEP, FORMATION_SPACING};
use shieldwall_sim::{SimWorld, Team};

fn main() {
    println!("=== Shieldwall - Simulation Demo ===\n");

    let mut sim = SimWorld::new();

    // Two 10x10 blocks, 60 units apart, marching at each other.
    sim.spawn_formation_block(
        Team::Red,
        0.0,
        -30.0,
        10,
        10,
        FORMATION_SPACING,
        (0.0, 1.0),
        (0.0, 30.0),
    );
    sim.spawn_formation_block(
        Team::Blue,
        0.0,
        30.0,
        10,
        10,
        FORMATION_SPACING,
        (0.0, -1.0),
        (0.0, -30.0),
    );

    println!("Initial state:");
    print_snapshot(&mut sim);

    // 30 seconds of battle at 60 ticks/sec.
    println!("\nRunning simulation for 1800 ticks (30 seconds)...\n");
    for tick in 0..1800 {
        sim.step(FIXED_TIMESTEP);

        if (tick + 1) % 300 == 0 {
            println!(
                "--- Tick {} (t={:.1}s) ---",
                sim.current_tick(),
                sim.current_time()
            );
            print_snapshot(&mut sim);
        }
    }

    println!("\n=== Final State (JSON formations) ===\n");
    let snapshot = sim.snapshot();
    for formation in &snapshot.formations {
        println!(
            "{}",
            serde_json::to_string_pretty(formation).unwrap_or_default()
        );
    }
}

fn print_snapshot(sim: &mut SimWorld) {
    let snapshot = sim.snapshot();

    for formation in &snapshot.formations {
        println!(
            "  {} formation: center=({:.1}, {:.1}) state={}",
            formation.team, formation.x, formation.y, formation.state
        );
    }
    println!(
        "  Red: {} alive / {} dead   Blue: {} alive / {} dead",
        snapshot.red_alive, snapshot.red_dead, snapshot.blue_alive, snapshot.blue_dead
    );
    let fighting = snapshot
        .soldiers
        .iter()
        .filter(|s| s.state == "InCombat")
        .count();
    let routing = snapshot
        .soldiers
        .iter()
        .filter(|s| s.state == "Routing")
        .count();
    println!("  {fighting} in melee, {routing} routing");
}
