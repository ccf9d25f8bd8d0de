use clap::{App, Arg};
use dronebus::bus::{Bus, InProcessBus};
use dronebus::fleet::Fleet;
use dronebus::router::CommandRouter;
use dronebus::service::{FleetService, ServiceConfig};
use dronebus::telemetry::{TelemetryPublisher, DEFAULT_TELEMETRY_HZ};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let matches = App::new("dronebus")
        .version("0.1.0")
        .author("Flight Systems Team")
        .about("Message-bus bridge for the drone fleet simulator")
        .arg(
            Arg::with_name("drones")
                .short("n")
                .long("drones")
                .value_name("COUNT")
                .help("Number of drones in the fleet")
                .takes_value(true)
                .default_value("4")
                .validator(|v| {
                    v.parse::<usize>()
                        .map(|_| ())
                        .map_err(|_| "drone count must be a non-negative integer".to_string())
                }),
        )
        .arg(
            Arg::with_name("hz")
                .long("hz")
                .value_name("HZ")
                .help("Telemetry publish rate in Hz")
                .takes_value(true)
                .default_value("10")
                .validator(|v| match v.parse::<f64>() {
                    Ok(hz) if hz.is_finite() && hz > 0.0 => Ok(()),
                    Ok(_) => Err("telemetry rate must be a positive, finite number".to_string()),
                    Err(_) => Err("telemetry rate must be a number".to_string()),
                }),
        )
        .arg(
            Arg::with_name("battery")
                .long("battery")
                .value_name("PERCENT")
                .help("Initial battery percent for every drone")
                .takes_value(true)
                .default_value("100"),
        )
        .get_matches();

    let drone_count: usize = matches.value_of("drones").unwrap_or("4").parse()?;
    let hz: f64 = matches
        .value_of("hz")
        .unwrap_or("10")
        .parse()
        .unwrap_or(DEFAULT_TELEMETRY_HZ);
    let battery: f64 = matches.value_of("battery").unwrap_or("100").parse()?;

    let bus: Arc<dyn Bus> = Arc::new(InProcessBus::new());
    let fleet = Arc::new(Fleet::new(drone_count));
    {
        let mut drones = fleet.write();
        for drone in drones.iter_mut() {
            drone.battery_percent = battery.clamp(0.0, 100.0);
        }
    }

    info!(drones = drone_count, hz, "starting drone bus bridge");

    let router = CommandRouter::start(Arc::clone(&bus), Arc::clone(&fleet));
    let publisher = TelemetryPublisher::start(Arc::clone(&bus), Arc::clone(&fleet), hz);
    let service = FleetService::start(
        Arc::clone(&bus),
        Arc::clone(&fleet),
        ServiceConfig::default(),
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    // Stop the publisher first so nothing is broadcast once teardown
    // begins, then quiesce both ingress surfaces, then close the bus.
    publisher.stop().await;
    router.stop().await;
    service.stop().await;
    bus.close();

    info!("drone bus bridge stopped");
    Ok(())
}
