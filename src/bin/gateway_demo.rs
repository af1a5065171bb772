use colored::*;
use std::time::Duration;
use tokio::time::sleep;

use safety_gateway::platform::gen2;
use safety_gateway::types::signals;
use safety_gateway::{
    CanMessage, ChecksumKind, Crc8Table, GatewayParam, Platform, SafetyGateway, VirtualCanBus,
    BUS_CAMERA, BUS_VEHICLE,
};

/// Compose a protected vehicle-bus message: counter into byte 1, checksum
/// into byte 0.
fn sealed(crc: &Crc8Table, kind: ChecksumKind, address: u32, mut data: [u8; 8]) -> CanMessage {
    crc.seal(kind, &mut data);
    CanMessage::new(BUS_VEHICLE, address, &data).expect("payload fits a classic frame")
}

fn verdict(allowed: bool) -> ColoredString {
    if allowed {
        "ALLOWED".green().bold()
    } else {
        "DENIED".red().bold()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "═══════════════════════════════════════════════════════".cyan().bold());
    println!("{}", "   CAN Safety Firewall Demo - Gen2 Platform            ".cyan().bold());
    println!("{}", "═══════════════════════════════════════════════════════".cyan().bold());
    println!();

    println!("{} Creating virtual CAN bus and gateway...", "→".green());
    let bus = VirtualCanBus::new(100);
    let mut monitor_rx = bus.subscribe();
    let mut gateway = SafetyGateway::with_verbose_events(
        Platform::Gen2,
        GatewayParam::new(GatewayParam::ALTERNATE_LONGITUDINAL),
    );
    let crc = Crc8Table::new();
    println!(
        "{} Gateway ready (alternate longitudinal: {})",
        "✓".green(),
        gateway.alternate_longitudinal()
    );
    println!();

    let monitor = tokio::spawn(async move {
        while let Ok(frame) = monitor_rx.recv().await {
            let data = frame
                .data()
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(" ");
            println!(
                "{} bus {} │ ID: {} │ [{}]",
                "MONITOR:".cyan().bold(),
                frame.bus(),
                format!("{:03X}", frame.address()).yellow(),
                data.bright_white()
            );
        }
    });

    println!("{}", "── Phase 1: vehicle comes alive ──".yellow().bold());
    let mut now_us: u64 = 0;
    for counter in 0..4u8 {
        now_us += 20_000;

        let wheels = CanMessage::new(
            BUS_VEHICLE,
            gen2::msg::WHEEL_SPEEDS,
            &gen2::encode_wheel_speeds([140, 141, 139, 140]),
        )
        .expect("payload fits a classic frame");
        gateway.on_receive(&wheels, now_us);

        let torque = sealed(
            &crc,
            ChecksumKind::Crc8CounterSalted,
            gen2::msg::DRIVER_STEER,
            signals::encode_driver_torque(12, counter),
        );
        gateway.on_receive(&torque, now_us);

        let status = counter.min(3); // off -> standby -> engaged
        let cruise = sealed(
            &crc,
            ChecksumKind::Crc8,
            gen2::msg::CRUISE_STATE,
            gen2::encode_cruise_status(status, counter),
        );
        gateway.on_receive(&cruise, now_us);

        if let Some(dest) = gateway.forward(BUS_VEHICLE, &wheels) {
            let relayed = CanMessage::new(dest, wheels.address(), wheels.data())
                .expect("payload fits a classic frame");
            bus.send(relayed)?;
        }
        sleep(Duration::from_millis(20)).await;
    }

    // Operator taps Resume: the falling edge engages under alternate
    // longitudinal control.
    for resume in [true, false] {
        now_us += 20_000;
        let buttons = CanMessage::new(
            BUS_VEHICLE,
            gen2::msg::CRUISE_BUTTONS,
            &signals::encode_buttons(false, resume, false, 0),
        )
        .expect("payload fits a classic frame");
        gateway.on_receive(&buttons, now_us);
    }
    println!(
        "  vehicle moving: {}, controls allowed: {}",
        gateway.vehicle_state().vehicle_moving,
        gateway.controls_allowed()
    );
    println!();

    println!("{}", "── Phase 2: compute module commands ──".yellow().bold());
    let mut torque_cmd = 0i32;
    for _ in 0..5 {
        now_us += 10_000;
        torque_cmd += 4;
        let cmd = CanMessage::new(
            BUS_VEHICLE,
            gen2::msg::STEER_CMD,
            &signals::encode_steer_cmd(torque_cmd, 0),
        )
        .expect("payload fits a classic frame");
        let allowed = gateway.on_transmit(&cmd, now_us);
        println!(
            "  steer {:+4} -> {}",
            torque_cmd,
            verdict(allowed)
        );
        if allowed {
            bus.send(cmd)?;
        }
    }

    // An over-limit jump is refused.
    now_us += 10_000;
    let jump = CanMessage::new(
        BUS_VEHICLE,
        gen2::msg::STEER_CMD,
        &signals::encode_steer_cmd(250, 0),
    )
    .expect("payload fits a classic frame");
    println!("  steer +250 -> {}", verdict(gateway.on_transmit(&jump, now_us)));

    // Longitudinal request inside the envelope, then outside it.
    now_us += 10_000;
    let accel_ok = CanMessage::new(
        BUS_VEHICLE,
        gen2::msg::ACCEL_CMD,
        &signals::encode_accel_request(1500, 0),
    )
    .expect("payload fits a classic frame");
    println!("  accel 1.5 m/s² -> {}", verdict(gateway.on_transmit(&accel_ok, now_us)));

    let accel_bad = CanMessage::new(
        BUS_VEHICLE,
        gen2::msg::ACCEL_CMD,
        &signals::encode_accel_request(2500, 0),
    )
    .expect("payload fits a classic frame");
    println!("  accel 2.5 m/s² -> {}", verdict(gateway.on_transmit(&accel_bad, now_us)));
    println!();

    println!("{}", "── Phase 3: replay attack ──".yellow().bold());
    // The attacker replays an old driver-torque frame: its counter no
    // longer continues the sequence.
    now_us += 10_000;
    let stale = sealed(
        &crc,
        ChecksumKind::Crc8CounterSalted,
        gen2::msg::DRIVER_STEER,
        signals::encode_driver_torque(12, 0),
    );
    let accepted = gateway.on_receive(&stale, now_us);
    println!("  replayed torque frame accepted: {}", accepted);
    println!(
        "  rx rejections so far: {}",
        gateway.events().rx_rejected_count()
    );
    println!();

    println!("{}", "── Phase 4: forwarding firewall ──".yellow().bold());
    let stock_steer = CanMessage::new(
        BUS_CAMERA,
        gen2::msg::STEER_CMD,
        &signals::encode_steer_cmd(100, 0),
    )
    .expect("payload fits a classic frame");
    println!(
        "  stock steer from camera bus -> {:?} (intercepted)",
        gateway.forward(BUS_CAMERA, &stock_steer)
    );
    let benign = CanMessage::new(BUS_CAMERA, 0x2F0, &[0u8; 8]).expect("payload fits");
    println!(
        "  unrelated camera traffic   -> {:?}",
        gateway.forward(BUS_CAMERA, &benign)
    );
    println!();

    sleep(Duration::from_millis(50)).await;
    drop(bus);
    let _ = monitor.await;

    println!("{}", "═══════════════════════════════════════════════════════".cyan().bold());
    println!(
        "  events recorded: {} (rx rejected {}, tx denied {})",
        gateway.events().entries().len(),
        gateway.events().rx_rejected_count(),
        gateway.events().tx_denied_count()
    );
    println!("{}", "═══════════════════════════════════════════════════════".cyan().bold());
    Ok(())
}
