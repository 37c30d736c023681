use anyhow::Context;
use unitscope::config::SessionConfig;
use unitscope::session::{RowState, TemplateSession};
use unitscope::store::HttpTransport;

/// Headless browse: connect to the template store, load the first batch,
/// print one summary line per unit.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut config = SessionConfig::default();
    if let Ok(url) = std::env::var("UNITSCOPE_STORE_URL") {
        config.store_url = url;
    }

    let transport = HttpTransport::new(config.store_url.clone());
    println!("connecting to {}", transport.base_url());
    let mut session = TemplateSession::connect(transport, config)
        .await
        .context("connecting to template store")?;
    println!(
        "{} units, sampled at {} Hz",
        session.pagination().total_units(),
        session.sampling_frequency()
    );

    let loaded = session.load_next_batch().await;
    for unit in loaded {
        match session.row(unit) {
            Some(RowState::Loaded(row)) => println!(
                "unit {:>3}  id {:>6}  {:<12}  {:>7} spikes  best ch {:>4} (id {})  \
                 p2p {:>8.2} uV  depth {:>7.1} um  {} active",
                row.unit_index,
                row.unit_id,
                row.brain_area,
                row.spike_count,
                row.best_channel,
                row.best_channel_id,
                row.peak_amplitude,
                row.position.1,
                row.active_channels.len(),
            ),
            Some(RowState::Errored(error)) => println!("unit {unit:>3}  failed: {error}"),
            _ => println!("unit {unit:>3}  pending"),
        }
    }
    if session.has_more() {
        println!("(more units available)");
    }
    Ok(())
}
