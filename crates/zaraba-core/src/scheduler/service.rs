use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job, JobScheduler};

use crate::ai::SummaryClient;
use crate::config::AppConfig;
use crate::notify::Notifier;
use crate::storage::{Database, DedupGate};
use crate::{Error, Result};

/// Everything a scheduled job may need, built once at startup and shared.
/// The pool and the dedup gate are process-wide; handlers receive them
/// explicitly instead of reaching for globals.
pub struct JobContext {
    pub db: Arc<Database>,
    pub config: Arc<AppConfig>,
    pub gate: Arc<DedupGate>,
    pub notifier: Arc<Notifier>,
    pub summarizer: Option<Arc<SummaryClient>>,
}

pub type JobHandler =
    Arc<dyn Fn(Arc<JobContext>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

/// A named job bound to its recurrence
pub struct JobDescriptor {
    pub name: &'static str,
    pub schedule: Schedule,
    pub handler: JobHandler,
}

/// Either a 5-field cron expression or the `@every <n><s|m|h>` shorthand.
/// Minimum granularity is one minute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Cron(String),
    Every(Duration),
}

impl Schedule {
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();

        if let Some(interval) = spec.strip_prefix("@every ") {
            let duration = parse_interval(interval.trim())?;
            if duration < Duration::from_secs(60) {
                return Err(Error::Schedule(format!(
                    "interval '{}' is below the one-minute granularity",
                    interval
                )));
            }
            return Ok(Schedule::Every(duration));
        }

        let fields = spec.split_whitespace().count();
        if fields != 5 {
            return Err(Error::Schedule(format!(
                "expected a 5-field cron expression or '@every <n><s|m|h>', got '{}'",
                spec
            )));
        }

        // The dispatcher wants a seconds field; pin it to zero so a cron
        // minute fires once, not sixty times.
        Ok(Schedule::Cron(format!("0 {}", spec)))
    }
}

fn parse_interval(interval: &str) -> Result<Duration> {
    let (number, unit) = interval.split_at(interval.len().saturating_sub(1));
    let value: u64 = number
        .parse()
        .map_err(|_| Error::Schedule(format!("unparseable interval '{}'", interval)))?;

    let seconds = match unit {
        "s" => value,
        "m" => value * 60,
        "h" => value * 3600,
        _ => {
            return Err(Error::Schedule(format!(
                "unknown interval unit in '{}'",
                interval
            )))
        }
    };

    Ok(Duration::from_secs(seconds))
}

/// Registry of scheduled jobs, dispatched uniformly by one scheduler.
///
/// Each firing runs on its own task, so one job's duration never delays
/// another's trigger, and nothing stops two firings of the same job from
/// overlapping if its cadence outpaces its runtime.
pub struct JobRunner {
    ctx: Arc<JobContext>,
    jobs: Vec<JobDescriptor>,
}

impl JobRunner {
    pub fn new(ctx: Arc<JobContext>) -> Self {
        Self {
            ctx,
            jobs: Vec::new(),
        }
    }

    /// Register a named job with its schedule string
    pub fn register(&mut self, name: &'static str, spec: &str, handler: JobHandler) -> Result<()> {
        let schedule = Schedule::parse(spec)?;
        tracing::info!("Registered job '{}' ({})", name, spec);
        self.jobs.push(JobDescriptor {
            name,
            schedule,
            handler,
        });
        Ok(())
    }

    /// Hand every registered job to the scheduler and start it
    pub async fn start(self) -> Result<JobScheduler> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| Error::Schedule(e.to_string()))?;

        for descriptor in self.jobs {
            let name = descriptor.name;
            let handler = descriptor.handler;
            let ctx = self.ctx.clone();

            let runnable = move |_uuid, _lock| {
                let ctx = ctx.clone();
                let handler = handler.clone();
                Box::pin(async move {
                    dispatch(name, handler, ctx).await;
                }) as Pin<Box<dyn Future<Output = ()> + Send>>
            };

            let job = match &descriptor.schedule {
                Schedule::Cron(expr) => Job::new_async(expr.as_str(), runnable),
                Schedule::Every(interval) => Job::new_repeated_async(*interval, runnable),
            }
            .map_err(|e| Error::Schedule(format!("job '{}': {}", name, e)))?;

            scheduler
                .add(job)
                .await
                .map_err(|e| Error::Schedule(format!("job '{}': {}", name, e)))?;
        }

        scheduler
            .start()
            .await
            .map_err(|e| Error::Schedule(e.to_string()))?;

        tracing::info!("Scheduler started");
        Ok(scheduler)
    }
}

/// Job boundary: run the handler on its own task and absorb both errors
/// and panics, so no firing can take down the process or silence future
/// firings of any job.
async fn dispatch(name: &'static str, handler: JobHandler, ctx: Arc<JobContext>) {
    tracing::debug!("Job '{}' fired", name);

    match tokio::spawn(handler(ctx)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::error!("Job '{}' failed: {}", name, e);
        }
        Err(join_err) if join_err.is_panic() => {
            tracing::error!("Job '{}' panicked", name);
        }
        Err(join_err) => {
            tracing::error!("Job '{}' was cancelled: {}", name, join_err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_field_cron_gets_a_seconds_prefix() {
        assert_eq!(
            Schedule::parse("*/2 * * * *").unwrap(),
            Schedule::Cron("0 */2 * * * *".to_string())
        );
        assert_eq!(
            Schedule::parse("0 * * * *").unwrap(),
            Schedule::Cron("0 0 * * * *".to_string())
        );
    }

    #[test]
    fn test_interval_shorthand() {
        assert_eq!(
            Schedule::parse("@every 5m").unwrap(),
            Schedule::Every(Duration::from_secs(300))
        );
        assert_eq!(
            Schedule::parse("@every 1h").unwrap(),
            Schedule::Every(Duration::from_secs(3600))
        );
        assert_eq!(
            Schedule::parse("@every 90s").unwrap(),
            Schedule::Every(Duration::from_secs(90))
        );
    }

    #[test]
    fn test_sub_minute_interval_is_rejected() {
        assert!(matches!(
            Schedule::parse("@every 30s"),
            Err(Error::Schedule(_))
        ));
    }

    #[test]
    fn test_malformed_schedules_are_rejected() {
        assert!(Schedule::parse("* * *").is_err());
        assert!(Schedule::parse("@every fast").is_err());
        assert!(Schedule::parse("@every 5x").is_err());
        assert!(Schedule::parse("").is_err());
    }
}
