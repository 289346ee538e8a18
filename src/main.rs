use anyhow::Context;
use giiker_cube::domain::events::{handler, Subscriber};
use giiker_cube::domain::models::{CubeEvent, EventKind};
use giiker_cube::domain::settings::SettingsService;
use giiker_cube::infrastructure::bluetooth::connection::ConnectionConfig;
use giiker_cube::infrastructure::bluetooth::protocol::CubeCommand;
use giiker_cube::infrastructure::bluetooth::replay::{Recording, ReplayTransport};
use giiker_cube::infrastructure::bluetooth::DeviceSession;
use giiker_cube::infrastructure::logging;
use std::path::PathBuf;
use tracing::{error, info, warn};

fn print_event(event: &CubeEvent) {
    match event {
        CubeEvent::Connected => println!("connected"),
        CubeEvent::Disconnected => println!("disconnected"),
        CubeEvent::Move(m) => println!("move {}", m.notation),
        CubeEvent::Battery(b) => {
            println!("battery {}% ({})", b.level, b.charging_state.description())
        }
        CubeEvent::MoveCount(count) => println!("move count {}", count),
        CubeEvent::UpdateState => println!("update state"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new()?;
    let _logging_guard = logging::init_logger(&settings_service.get().log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!("Starting Giiker cube replay");

    let path: PathBuf = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: giiker_cube <recording.json>")?;
    let recording = Recording::load(&path)?;

    let config = ConnectionConfig::from_settings(settings_service.get())?;
    let transport = ReplayTransport::from_recording(&config, &recording);
    let mut session = DeviceSession::new(transport, config);

    let printer = handler(print_event);
    for kind in [
        EventKind::Connected,
        EventKind::Disconnected,
        EventKind::Move,
        EventKind::Battery,
        EventKind::MoveCount,
        EventKind::UpdateState,
    ] {
        session.subscribe(kind, printer.clone());
    }

    if let Err(e) = session.connect().await {
        error!("Could not connect: {}", e);
        return Err(e.into());
    }

    if let Some(view) = session.cube_view() {
        println!("baseline {}", serde_json::to_string(&view)?);
    }

    let has_response = |command: CubeCommand| {
        recording
            .info_responses
            .iter()
            .any(|r| r.command == command.as_byte())
    };
    if has_response(CubeCommand::Battery) {
        if let Err(e) = session.get_battery_level(true).await {
            warn!("Battery request failed: {}", e);
        }
    }
    if has_response(CubeCommand::MoveCount) {
        if let Err(e) = session.get_move_count(true).await {
            warn!("Move count request failed: {}", e);
        }
    }

    for _ in 0..recording.notifications.len() {
        session.pump().await;
    }
    // The snapshot is discarded on disconnect
    let final_state = session.face_string();

    session.disconnect().await;
    session.run().await;

    match final_state {
        Some(facelets) => println!("state {}", facelets),
        None => println!("state unknown"),
    }
    Ok(())
}
