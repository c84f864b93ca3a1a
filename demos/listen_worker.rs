//! Long-running worker that reacts to notifications
//!
//! Reads `pgnotify.toml` (or the file named by `PGNOTIFY_CONFIG`), listens on
//! the configured channels and logs what arrives until Ctrl-C.
//!
//! ```sh
//! RUST_LOG=info cargo run --example listen_worker
//! ```

use pgnotify::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load()?;
    let options = ListenOptions::from_config(&config.listen)?;
    info!("Listening on {:?}", options.channels());

    let mut notifications = await_notifications(&config.database, options).await?;

    loop {
        let event = match notifications.next().await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(err) if err.is_cancelled() => {
                warn!("Interrupted twice before the first signal was handled");
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        match event {
            ListenEvent::Notification(n) => {
                info!(channel = %n.channel, pid = n.process_id, "{}", n.payload);
            }
            ListenEvent::Batch(batch) => {
                for n in batch {
                    info!(channel = %n.channel, pid = n.process_id, "{}", n.payload);
                }
            }
            ListenEvent::Timeout => {}
            ListenEvent::Signal(signal) => {
                info!("Received signal {}, stopping", signal);
                break;
            }
        }
    }

    notifications.close();
    info!("Worker stopped");
    Ok(())
}
