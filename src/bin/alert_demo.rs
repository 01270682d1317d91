//! Sends one test alert through the configured channels (logs only when none are configured).

use slack_cluster_pipeline::bootstrap::build_alerts;
use slack_cluster_pipeline::notify::Alert;
use slack_cluster_pipeline::PipelineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = PipelineConfig::from_env()?;
    let mux = build_alerts(&cfg);

    let alert = Alert::run_failed("alert-demo: this is a test alert, no run failed", 0);
    let report = mux.dispatch(&alert).await;

    println!("alert-demo done: email={:?} chat={:?}", report.email, report.chat);
    Ok(())
}
