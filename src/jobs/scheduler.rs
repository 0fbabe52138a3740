//! Fixed-interval driver for periodic work
//!
//! Three independent jobs run on their own timers:
//!
//! | Job | Default period | Work |
//! |-----|----------------|------|
//! | email queue | 30s | drain a small batch of queued emails |
//! | sequences | 5min | one [`SequenceEngine`] pass |
//! | campaigns | 1min | complete drained campaigns |
//!
//! A failing run is logged and the timer keeps going. Jobs do not exclude
//! each other; row claiming and guarded enrollment updates keep overlapping
//! runs from double-sending.
//!
//! Every drain first returns rows claimed longer than `claim-lease-secs` ago
//! to the queue, so a worker that died mid-delivery does not strand its row
//! in `sending`.

use crate::config::SchedulerConfig;
use crate::jobs::campaigns::reconcile_campaigns;
use crate::jobs::job_store::ScanJobStore;
use crate::mail::{wait_all, MailQueue, SendOutcome};
use crate::sequence::SequenceEngine;
use crate::storage::{lock_storage, SharedStorage, Storage};
use crate::LeadscopeError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Totals for one manual pass over every job
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub due_enrollments: usize,
    pub steps_sent: usize,
    pub enrollments_completed: usize,
    pub enrollments_cancelled: usize,
    pub enrollments_failed: usize,
    pub emails_delivered: usize,
    pub emails_failed: usize,
    pub emails_requeued: usize,
    pub campaigns_completed: Vec<i64>,
}

/// Owns everything the periodic jobs need
#[derive(Clone)]
pub struct Scheduler {
    storage: SharedStorage,
    queue: MailQueue,
    engine: SequenceEngine,
    scan_jobs: Arc<ScanJobStore>,
    config: SchedulerConfig,
}

/// Running scheduler; dropping it leaves the jobs running
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stops every job and waits for in-flight runs to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("Scheduler job panicked: {}", e);
            }
        }
        info!("Scheduler stopped");
    }
}

fn count_outcomes(outcomes: &[SendOutcome]) -> (usize, usize) {
    let delivered = outcomes.iter().filter(|o| o.success).count();
    let failed = outcomes.iter().filter(|o| !o.success && !o.skipped).count();
    (delivered, failed)
}

impl Scheduler {
    pub fn new(
        storage: SharedStorage,
        queue: MailQueue,
        engine: SequenceEngine,
        scan_jobs: Arc<ScanJobStore>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            storage,
            queue,
            engine,
            scan_jobs,
            config,
        }
    }

    /// Spawns the periodic jobs
    pub fn start(self) -> SchedulerHandle {
        let (shutdown, rx) = watch::channel(false);
        let mut tasks = Vec::with_capacity(3);

        let me = self.clone();
        tasks.push(spawn_periodic(
            "email queue",
            Duration::from_secs(self.config.email_queue_interval_secs),
            rx.clone(),
            move || {
                let me = me.clone();
                async move {
                    let (delivered, failed) = me.drain_emails(Utc::now()).await?;
                    if delivered + failed > 0 {
                        info!("Processed {} queued emails ({} failed)", delivered + failed, failed);
                    }
                    Ok(())
                }
            },
        ));

        let me = self.clone();
        tasks.push(spawn_periodic(
            "sequences",
            Duration::from_secs(self.config.sequence_interval_secs),
            rx.clone(),
            move || {
                let me = me.clone();
                async move {
                    let report = me.engine.tick(Utc::now())?;
                    let outcomes = wait_all(report.deliveries).await;
                    let (delivered, failed) = count_outcomes(&outcomes);
                    if report.sent > 0 {
                        info!(
                            "Processed {} sequence steps ({} delivered, {} failed)",
                            report.sent, delivered, failed
                        );
                    }
                    Ok(())
                }
            },
        ));

        let me = self;
        tasks.push(spawn_periodic(
            "campaigns",
            Duration::from_secs(me.config.campaign_interval_secs),
            rx,
            move || {
                let me = me.clone();
                async move {
                    me.reconcile(Utc::now())?;
                    let purged = me.scan_jobs.purge_expired();
                    if purged > 0 {
                        debug!("Purged {} expired scan jobs", purged);
                    }
                    Ok(())
                }
            },
        ));

        info!("Scheduler started");
        SchedulerHandle { shutdown, tasks }
    }

    /// Runs the sequence pass, a queue drain and campaign reconciliation once
    ///
    /// Waits for every delivery before reconciling, so a campaign whose
    /// last emails were sent in this pass completes in the same pass.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<PassSummary, LeadscopeError> {
        let report = self.engine.tick(now)?;
        let mut summary = PassSummary {
            due_enrollments: report.due,
            steps_sent: report.sent,
            enrollments_completed: report.completed,
            enrollments_cancelled: report.cancelled,
            enrollments_failed: report.failed,
            ..Default::default()
        };

        summary.emails_requeued = self.release_stale_claims(now)?;
        let mut deliveries = report.deliveries;
        deliveries.extend(
            self.queue
                .drain(&self.storage, self.config.email_batch_size)?,
        );
        let outcomes = wait_all(deliveries).await;
        let (delivered, failed) = count_outcomes(&outcomes);
        summary.emails_delivered = delivered;
        summary.emails_failed = failed;

        summary.campaigns_completed = self.reconcile(now)?;
        Ok(summary)
    }

    async fn drain_emails(&self, now: DateTime<Utc>) -> Result<(usize, usize), LeadscopeError> {
        self.release_stale_claims(now)?;
        let deliveries = self
            .queue
            .drain(&self.storage, self.config.email_batch_size)?;
        let outcomes = wait_all(deliveries).await;
        Ok(count_outcomes(&outcomes))
    }

    fn release_stale_claims(&self, now: DateTime<Utc>) -> Result<usize, LeadscopeError> {
        let Some(cutoff) = i64::try_from(self.config.claim_lease_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lease| now.checked_sub_signed(lease))
        else {
            return Ok(0);
        };
        let released = lock_storage(&self.storage)?.release_stale_claims(cutoff)?;
        if released > 0 {
            warn!("Returned {} stale claimed emails to the queue", released);
        }
        Ok(released)
    }

    fn reconcile(&self, now: DateTime<Utc>) -> Result<Vec<i64>, LeadscopeError> {
        let mut storage = lock_storage(&self.storage)?;
        Ok(reconcile_campaigns(&mut *storage, now)?)
    }
}

/// Runs `job` every `period` until `shutdown` flips to true
///
/// The first run happens one period after start.
fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut job: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), LeadscopeError>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    debug!("Running {} job", name);
                    if let Err(e) = job().await {
                        error!("{} job failed: {}", name, e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("{} job stopped", name);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::{LogSender, MailDispatcher, VariableRenderer};
    use crate::state::{CampaignStatus, SentEmailStatus};
    use crate::storage::{shared, NewContact, NewSentEmail, SqliteStorage, Storage};

    fn scheduler(storage: SharedStorage, config: SchedulerConfig) -> Scheduler {
        let (queue, _worker) =
            MailQueue::start(MailDispatcher::new(storage.clone(), Arc::new(LogSender)), 4);
        let engine = SequenceEngine::new(
            storage.clone(),
            Arc::new(VariableRenderer::new("Jan", "LeadScope")),
            queue.clone(),
        );
        Scheduler::new(
            storage,
            queue,
            engine,
            Arc::new(ScanJobStore::new(Duration::from_secs(60))),
            config,
        )
    }

    fn seed_campaign(storage: &SharedStorage, emails: usize) -> i64 {
        let mut guard = lock_storage(storage).unwrap();
        let contact_id = guard
            .insert_contact(
                &NewContact {
                    email: Some("info@pekarna.cz".to_string()),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
        let campaign_id = guard
            .insert_campaign("Jaro", CampaignStatus::Running)
            .unwrap();
        for i in 0..emails {
            guard
                .queue_email(
                    &NewSentEmail {
                        campaign_id: Some(campaign_id),
                        contact_id,
                        template_id: None,
                        subject: "Nabídka".to_string(),
                        body_html: "<p>Nabídka</p>".to_string(),
                        to_email: "info@pekarna.cz".to_string(),
                        tracking_id: format!("trk-{}", i),
                    },
                    Utc::now(),
                )
                .unwrap();
        }
        campaign_id
    }

    #[tokio::test]
    async fn test_run_once_drains_and_completes_campaign() {
        let storage = shared(SqliteStorage::new_in_memory().unwrap());
        let campaign_id = seed_campaign(&storage, 2);

        let summary = scheduler(storage.clone(), SchedulerConfig::default())
            .run_once(Utc::now())
            .await
            .unwrap();

        assert_eq!(summary.emails_delivered, 2);
        assert_eq!(summary.campaigns_completed, vec![campaign_id]);

        let guard = lock_storage(&storage).unwrap();
        let campaign = guard.get_campaign(campaign_id).unwrap().unwrap();
        assert_eq!(campaign.status, CampaignStatus::Completed);
        assert_eq!(campaign.total_sent, 2);
    }

    #[tokio::test]
    async fn test_run_once_respects_batch_size() {
        let storage = shared(SqliteStorage::new_in_memory().unwrap());
        let campaign_id = seed_campaign(&storage, 5);

        let summary = scheduler(storage.clone(), SchedulerConfig::default())
            .run_once(Utc::now())
            .await
            .unwrap();

        assert_eq!(summary.emails_delivered, 3);
        assert!(summary.campaigns_completed.is_empty());
        let guard = lock_storage(&storage).unwrap();
        assert_eq!(guard.list_queued_email_ids(10).unwrap().len(), 2);
        assert_eq!(
            guard.get_campaign(campaign_id).unwrap().unwrap().status,
            CampaignStatus::Running
        );
    }

    #[tokio::test]
    async fn test_run_once_recovers_email_stranded_in_sending() {
        let storage = shared(SqliteStorage::new_in_memory().unwrap());
        let campaign_id = seed_campaign(&storage, 1);
        let now = Utc::now();
        // A worker claimed the row and died before recording an outcome
        assert!(lock_storage(&storage)
            .unwrap()
            .claim_email(1, now - chrono::Duration::minutes(10))
            .unwrap());

        let summary = scheduler(storage.clone(), SchedulerConfig::default())
            .run_once(now)
            .await
            .unwrap();

        assert_eq!(summary.emails_requeued, 1);
        assert_eq!(summary.emails_delivered, 1);
        assert_eq!(summary.campaigns_completed, vec![campaign_id]);
        let guard = lock_storage(&storage).unwrap();
        assert_eq!(
            guard.get_sent_email(1).unwrap().unwrap().status,
            SentEmailStatus::Sent
        );
        assert_eq!(
            guard.get_campaign(campaign_id).unwrap().unwrap().status,
            CampaignStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_run_once_leaves_fresh_claim_alone() {
        let storage = shared(SqliteStorage::new_in_memory().unwrap());
        seed_campaign(&storage, 1);
        let now = Utc::now();
        assert!(lock_storage(&storage)
            .unwrap()
            .claim_email(1, now - chrono::Duration::seconds(5))
            .unwrap());

        let summary = scheduler(storage.clone(), SchedulerConfig::default())
            .run_once(now)
            .await
            .unwrap();

        assert_eq!(summary.emails_requeued, 0);
        assert_eq!(summary.emails_delivered, 0);
        assert!(summary.campaigns_completed.is_empty());
        assert_eq!(
            lock_storage(&storage)
                .unwrap()
                .get_sent_email(1)
                .unwrap()
                .unwrap()
                .status,
            SentEmailStatus::Sending
        );
    }

    #[tokio::test]
    async fn test_periodic_drain_and_shutdown() {
        let storage = shared(SqliteStorage::new_in_memory().unwrap());
        seed_campaign(&storage, 1);
        let config = SchedulerConfig {
            email_queue_interval_secs: 1,
            ..Default::default()
        };

        let handle = scheduler(storage.clone(), config).start();
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let sent = lock_storage(&storage)
                .unwrap()
                .get_sent_email(1)
                .unwrap()
                .is_some_and(|e| e.status == SentEmailStatus::Sent);
            if sent {
                break;
            }
        }
        handle.shutdown().await;

        let email = lock_storage(&storage).unwrap().get_sent_email(1).unwrap().unwrap();
        assert_eq!(email.status, SentEmailStatus::Sent);
    }
}
