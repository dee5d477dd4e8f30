use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::Config;
use crate::core::orchestrator;

/// Every 6 hours, on the hour (sec min hour dom mon dow).
pub const DEFAULT_CRON: &str = "0 0 0,6,12,18 * * *";

/// Register the unified run on a cron job and start the scheduler.
pub async fn init(config: Config, cron: &str) -> Result<JobScheduler, anyhow::Error> {
    let sched = JobScheduler::new().await?;
    let config = Arc::new(config);

    let job_config = config.clone();
    sched.add(
        Job::new_async(cron, move |_uuid, _l| {
            let config = job_config.clone();
            Box::pin(async move {
                tracing::info!("Running scheduled update job...");
                run_once(&config).await;
            })
        })?
    ).await?;

    // Startup run, so a fresh deployment does not wait for the first tick
    let startup_config = config.clone();
    tokio::spawn(async move {
        tracing::info!("Running startup update...");
        run_once(&startup_config).await;
    });

    sched.start().await?;
    tracing::info!("Scheduler started with cron '{}'", cron);
    Ok(sched)
}

/// Run the scheduler until Ctrl-C.
pub async fn run_forever(config: Config, cron: &str) -> Result<(), anyhow::Error> {
    let mut sched = init(config, cron).await?;
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down scheduler...");
    sched.shutdown().await?;
    Ok(())
}

async fn run_once(config: &Config) {
    match orchestrator::run_unified(config, None).await {
        Ok(summary) if !summary.failures.is_empty() => {
            tracing::warn!("Scheduled run finished with failures: {:?}", summary.failures);
        }
        Ok(_) => {}
        Err(e) => tracing::error!("Scheduled update failed: {:#}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_cron_parses() {
        assert!(Job::new_async(DEFAULT_CRON, |_uuid, _l| Box::pin(async {})).is_ok());
        assert!(Job::new_async("not a cron", |_uuid, _l| Box::pin(async {})).is_err());
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_scheduled_run_future_is_send() {
        // Never polled: only the future's type is checked
        let config = Config::from_lookup(|_| None).unwrap();
        let fut = run_once(&config);
        assert_send(&fut);
    }
}
