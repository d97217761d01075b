use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::{Config, ReportJob};
use crate::delivery::{Delivery, Message};
use crate::error::Result;
use crate::render::{SiteLinks, render};
use crate::report::{ReportResult, aggregate};
use crate::review::fetch_review_statuses;
use crate::sources::collect_pages;
use crate::timestamp::Timestamp;
use crate::wiki::WikiClient;

/// Counts from one delivered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobStats {
    pub total: usize,
    pub unreviewed: usize,
    pub stale: usize,
    pub suppressed: usize,
}

impl From<&ReportResult> for JobStats {
    fn from(result: &ReportResult) -> Self {
        Self {
            total: result.total_count,
            unreviewed: result.unreviewed_count,
            stale: result.stale_count,
            suppressed: result.suppressed_count,
        }
    }
}

#[derive(Debug)]
pub struct JobOutcome {
    pub label: String,
    pub channel: String,
    pub result: Result<JobStats>,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<JobOutcome>,
    /// Shutdown was requested; jobs after the last outcome did not run.
    pub interrupted: bool,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.len() - self.failed()
    }

    /// 130 when interrupted, 1 when any job failed, else 0.
    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            130
        } else if self.failed() > 0 {
            1
        } else {
            0
        }
    }
}

pub struct Orchestrator<W, D> {
    client: W,
    delivery: D,
    config: Config,
    links: SiteLinks,
}

impl<W: WikiClient, D: Delivery> Orchestrator<W, D> {
    pub fn new(client: W, delivery: D, config: Config) -> Self {
        let links = SiteLinks::new(&config.wiki.site_url);
        Self {
            client,
            delivery,
            config,
            links,
        }
    }

    /// Run according to configured loop mode.
    ///
    /// When `shutdown` becomes true, the orchestrator stops between jobs.
    /// Returns the summary of the latest run, partial if it was interrupted.
    pub async fn run_loop(&self, mut shutdown: Option<watch::Receiver<bool>>) -> Result<RunSummary> {
        if !self.config.continuous {
            return self.run_once(shutdown.as_ref());
        }

        let poll = Duration::from_secs(self.config.report.poll_hours.saturating_mul(3600));
        let mut last = RunSummary::default();

        loop {
            if Self::shutdown_requested(shutdown.as_ref()) {
                last.interrupted = true;
                break;
            }

            last = self.run_once(shutdown.as_ref())?;
            if last.interrupted {
                break;
            }

            info!(poll_hours = self.config.report.poll_hours, "waiting for next run");
            if Self::wait_for_poll_or_shutdown(poll, &mut shutdown).await {
                last.interrupted = true;
                break;
            }
        }

        info!("shutdown requested, exiting loop");
        Ok(last)
    }

    /// Build and deliver every job's report once, with a cutoff relative to now.
    pub fn run_once(&self, shutdown: Option<&watch::Receiver<bool>>) -> Result<RunSummary> {
        let mut rng = rand::rng();
        self.run_at(Utc::now(), &mut rng, shutdown)
    }

    /// Run every job against one shared cutoff. A failing job is logged and
    /// does not stop the jobs after it.
    pub fn run_at<R: Rng + ?Sized>(
        &self,
        now: DateTime<Utc>,
        rng: &mut R,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Result<RunSummary> {
        let cutoff = Timestamp::cutoff(now, self.config.report.cutoff_hours);
        info!(cutoff = %cutoff, jobs = self.config.jobs.len(), "starting run");

        let mut summary = RunSummary::default();
        for job in &self.config.jobs {
            if Self::shutdown_requested(shutdown) {
                info!(completed = summary.outcomes.len(), "shutdown requested, skipping remaining jobs");
                summary.interrupted = true;
                break;
            }

            let result = self
                .run_job(job, &cutoff, &mut *rng)
                .map(|r| JobStats::from(&r));
            match &result {
                Ok(stats) => info!(
                    job = job.label(),
                    total = stats.total,
                    unreviewed = stats.unreviewed,
                    stale = stats.stale,
                    "report sent"
                ),
                Err(e) => error!(job = job.label(), error = %e, "job failed"),
            }
            summary.outcomes.push(JobOutcome {
                label: job.label().to_string(),
                channel: job.channel.clone(),
                result,
            });
        }

        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "run finished"
        );
        Ok(summary)
    }

    /// Sources → page list → statuses → report → delivery, for one job.
    pub fn run_job<R: Rng + ?Sized>(
        &self,
        job: &ReportJob,
        cutoff: &Timestamp,
        rng: &mut R,
    ) -> Result<ReportResult> {
        let _typing = self.delivery.start_typing(&job.channel);

        let pages = collect_pages(&job.sources, &self.client)?;
        let statuses = fetch_review_statuses(&self.client, &pages, self.config.report.batch_size)?;
        let result = aggregate(
            pages.len(),
            statuses,
            cutoff,
            &self.config.report.limits,
            &self.links,
            rng,
        );

        let message = Message::from(render(&result));
        self.delivery.send(&job.channel, &message)?;
        Ok(result)
    }

    fn shutdown_requested(shutdown: Option<&watch::Receiver<bool>>) -> bool {
        shutdown.is_some_and(|rx| *rx.borrow())
    }

    async fn wait_for_poll_or_shutdown(
        poll_duration: Duration,
        shutdown: &mut Option<watch::Receiver<bool>>,
    ) -> bool {
        if let Some(rx) = shutdown {
            tokio::select! {
                _ = tokio::time::sleep(poll_duration) => false,
                changed = rx.changed() => {
                    if changed.is_ok() {
                        *rx.borrow()
                    } else {
                        false
                    }
                }
            }
        } else {
            tokio::time::sleep(poll_duration).await;
            false
        }
    }
}
