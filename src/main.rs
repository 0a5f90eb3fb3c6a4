use std::time::Instant;

use mindfuel::config::get_configuration;
use mindfuel::startup::{Application, ApplicationError};
use mindfuel::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    let subscriber = get_subscriber(String::from("mindfuel"), String::from("info"), std::io::stdout);

    init_subscriber(subscriber).expect("Failed to initialise telemetry.");

    let config = get_configuration().expect("Missing configuration file.");
    let started_at = Instant::now();

    tracing::info!("Starting MindFuel quote dispatch");

    let application = Application::build(config).await?;
    let report = application.run_quote_dispatch().await;

    tracing::info!("MindFuel run finished in {:.2?}", started_at.elapsed());

    let report = report?;
    tracing::info!(
        "Run report for {}: daily = {:?}, weekly = {:?}, summary sent = {}",
        report.date,
        report.daily,
        report.weekly,
        report.summary_sent
    );

    Ok(())
}
