//! conesearch demo
//!
//! Runs one cone search job end to end against a synthetic catalog:
//! create → wait until terminal → print the job record as JSON.
//!
//! ```bash
//! conesearch --ra 179.5 --dec 59.98 --sr 0.5
//! RUST_LOG=debug CONESEARCH_LATENCY_MS=3000 conesearch --execution-duration 1 --ra 10 --dec 10 --sr 1
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeDelta;
use clap::{Parser, ValueEnum};
use conesearch_core::{
    ConeSearchParameters, DomainError, JobCreate, JobId, JobManager, JobRecord, JobResult,
    ManagerBuilder, ManagerConfig, UwsError, Verbosity, Worker,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Parser)]
#[command(name = "conesearch")]
#[command(about = "Run a Simple Cone Search job through the UWS job lifecycle")]
#[command(version)]
struct Args {
    /// Right ascension of the cone centre (ICRS degrees)
    #[arg(long, allow_negative_numbers = true)]
    ra: f64,

    /// Declination of the cone centre (ICRS degrees)
    #[arg(long, allow_negative_numbers = true)]
    dec: f64,

    /// Search radius (degrees)
    #[arg(long)]
    sr: f64,

    #[arg(long, value_enum, default_value_t = VerbArg::Default)]
    verb: VerbArg,

    /// Owner the job is created for
    #[arg(long, default_value = "anonymous", env = "CONESEARCH_OWNER")]
    owner: String,

    #[arg(long = "run-id", env = "CONESEARCH_RUN_ID")]
    run_id: Option<String>,

    /// Wall-clock limit for the job, in seconds
    #[arg(long = "execution-duration", env = "CONESEARCH_EXECUTION_DURATION")]
    execution_duration: Option<i64>,

    /// Job lifetime before destruction, in seconds
    #[arg(long, default_value = "3600", env = "CONESEARCH_LIFETIME")]
    lifetime: u64,

    /// Simulated catalog latency
    #[arg(long = "latency-ms", default_value = "500", env = "CONESEARCH_LATENCY_MS")]
    latency_ms: u64,

    #[arg(long = "max-concurrent-jobs", default_value = "4", env = "CONESEARCH_MAX_CONCURRENT_JOBS")]
    max_concurrent_jobs: usize,

    /// Seconds a cancelled worker gets to stop
    #[arg(long = "abort-grace", default_value = "2", env = "CONESEARCH_ABORT_GRACE")]
    abort_grace: u64,

    /// Give up waiting after this many seconds
    #[arg(long = "wait", default_value = "60")]
    wait: u64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VerbArg {
    Minimum,
    Default,
    All,
}

impl From<VerbArg> for Verbosity {
    fn from(v: VerbArg) -> Self {
        match v {
            VerbArg::Minimum => Verbosity::Minimum,
            VerbArg::Default => Verbosity::Default,
            VerbArg::All => Verbosity::All,
        }
    }
}

/// Synthetic catalog: sleeps for `latency`, then reports one VOTable whose
/// row count grows with the cone area.
struct SyntheticCatalog {
    latency: Duration,
}

impl SyntheticCatalog {
    const ROWS_PER_SQ_DEG: f64 = 2_500.0;
}

#[async_trait]
impl Worker<ConeSearchParameters> for SyntheticCatalog {
    async fn run(
        &self,
        p: ConeSearchParameters,
        cancel: CancellationToken,
    ) -> Result<Vec<JobResult>, DomainError> {
        tokio::select! {
            _ = tokio::time::sleep(self.latency) => {}
            _ = cancel.cancelled() => {
                return Err(DomainError::new("cancelled", "cone search interrupted"));
            }
        }

        let area = std::f64::consts::PI * p.sr * p.sr;
        let rows = (area * Self::ROWS_PER_SQ_DEG).round() as u64;
        let columns: u64 = match p.verb {
            Verbosity::Minimum => 3,
            Verbosity::Default => 12,
            Verbosity::All => 40,
        };
        if rows > 50_000_000 {
            return Err(DomainError::new("too_many_rows", "cone exceeds the catalog row limit")
                .with_detail(format!("{rows} rows for sr={}", p.sr)));
        }

        Ok(vec![
            JobResult::new(
                "votable",
                format!("memory://synthetic/cone?ra={}&dec={}&sr={}", p.ra, p.dec, p.sr),
            )
            .with_size(rows * columns * 16)
            .with_mime_type("application/x-votable+xml"),
        ])
    }
}

/// Abort, or return the record as is if the job finished in the meantime.
async fn abort_or_current(manager: &JobManager, id: JobId) -> Result<JobRecord, UwsError> {
    match manager.abort(id).await {
        Err(e) if e.is_invalid_transition() => manager.get(id).await,
        other => other,
    }
}

fn execution_limit(secs: i64) -> Result<TimeDelta, String> {
    TimeDelta::try_seconds(secs)
        .ok_or_else(|| format!("--execution-duration {secs} is out of range"))
}

fn wait_deadline(now: Instant, secs: u64) -> Result<Instant, String> {
    now.checked_add(Duration::from_secs(secs))
        .ok_or_else(|| format!("--wait {secs} is out of range"))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing();

    let config = ManagerConfig {
        default_lifetime: Duration::from_secs(args.lifetime),
        max_concurrent_jobs: args.max_concurrent_jobs,
        abort_grace: Duration::from_secs(args.abort_grace),
        ..ManagerConfig::default()
    };
    let manager = ManagerBuilder::new()
        .worker::<ConeSearchParameters, _>(SyntheticCatalog {
            latency: Duration::from_millis(args.latency_ms),
        })
        .config(config)
        .build()?;

    let parameters =
        ConeSearchParameters::new(args.ra, args.dec, args.sr).with_verbosity(args.verb.into());
    let mut request = JobCreate::new(parameters);
    if let Some(run_id) = args.run_id {
        request = request.run_id(run_id);
    }
    if let Some(secs) = args.execution_duration {
        request = request.execution_duration(execution_limit(secs)?);
    }

    let mut job = manager.create(&args.owner, request).await?;
    info!(job_id = %job.id, phase = %job.phase, "submitted");

    let deadline = wait_deadline(Instant::now(), args.wait)?;
    while !job.phase.is_terminal() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            warn!(job_id = %job.id, "gave up waiting; aborting");
            job = abort_or_current(&manager, job.id).await?;
            break;
        }
        tokio::select! {
            polled = manager.wait(job.id, remaining) => job = polled?,
            _ = tokio::signal::ctrl_c() => {
                warn!(job_id = %job.id, "interrupted; aborting");
                job = abort_or_current(&manager, job.id).await?;
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&job)?);
    manager.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::one_second(1, Some(TimeDelta::seconds(1)))]
    #[case::negative_passes_through(-5, Some(TimeDelta::seconds(-5)))]
    #[case::too_large(i64::MAX, None)]
    #[case::too_small(i64::MIN, None)]
    fn execution_limit_is_checked(#[case] secs: i64, #[case] expected: Option<TimeDelta>) {
        assert_eq!(execution_limit(secs).ok(), expected);
    }

    #[test]
    fn wait_deadline_rejects_overflow() {
        let now = Instant::now();
        assert_eq!(wait_deadline(now, 60).unwrap(), now + Duration::from_secs(60));
        assert!(wait_deadline(now, u64::MAX).unwrap_err().contains("--wait"));
    }

    #[test]
    fn cli_parses_negative_coordinates() {
        let args = Args::try_parse_from([
            "conesearch", "--ra", "10", "--dec", "-45.5", "--sr", "0.1", "--verb", "all",
        ])
        .unwrap();
        assert_eq!(args.dec, -45.5);
        assert!(matches!(args.verb, VerbArg::All));
    }
}
