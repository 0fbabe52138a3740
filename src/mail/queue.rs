//! Mail task queue
//!
//! Every send is an explicit hand-off to a worker task over an mpsc
//! channel. Each submission returns a [`Delivery`] that resolves to the
//! [`SendOutcome`] once the provider call has finished, so callers can
//! await completion instead of firing and forgetting.

use crate::mail::dispatcher::{MailDispatcher, SendOutcome};
use crate::storage::{lock_storage, SharedStorage, Storage};
use crate::LeadscopeError;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info};

struct MailJob {
    email_id: i64,
    reply: oneshot::Sender<SendOutcome>,
}

/// Pending completion of one submitted email
#[derive(Debug)]
pub struct Delivery {
    email_id: i64,
    rx: oneshot::Receiver<SendOutcome>,
}

impl Delivery {
    pub fn email_id(&self) -> i64 {
        self.email_id
    }

    /// Waits for the delivery attempt to finish
    pub async fn wait(self) -> SendOutcome {
        let email_id = self.email_id;
        self.rx
            .await
            .unwrap_or_else(|_| SendOutcome::failed(email_id, "Mail worker stopped before delivery"))
    }
}

/// Waits for every delivery, preserving order
pub async fn wait_all(deliveries: Vec<Delivery>) -> Vec<SendOutcome> {
    join_all(deliveries.into_iter().map(Delivery::wait)).await
}

/// Handle for submitting queued email rows to the mail worker
#[derive(Clone)]
pub struct MailQueue {
    tx: mpsc::UnboundedSender<MailJob>,
}

impl MailQueue {
    /// Spawns the mail worker
    ///
    /// The worker runs each delivery in its own task, with at most
    /// `max_in_flight` provider calls at once, and exits once every
    /// `MailQueue` clone has been dropped.
    pub fn start(dispatcher: MailDispatcher, max_in_flight: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<MailJob>();
        let permits = Arc::new(Semaphore::new(max_in_flight.max(1)));

        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let Ok(permit) = permits.clone().acquire_owned().await else {
                    break;
                };
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    let outcome = dispatcher.send(job.email_id).await;
                    drop(permit);
                    // The submitter may have stopped listening
                    let _ = job.reply.send(outcome);
                });
            }
            debug!("Mail worker stopped");
        });

        (Self { tx }, worker)
    }

    /// Hands one queued email row to the worker
    pub fn submit(&self, email_id: i64) -> Result<Delivery, LeadscopeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(MailJob { email_id, reply })
            .map_err(|_| LeadscopeError::MailQueueClosed)?;
        Ok(Delivery { email_id, rx })
    }

    /// Submits up to `batch_size` of the oldest queued rows
    pub fn drain(
        &self,
        storage: &SharedStorage,
        batch_size: u32,
    ) -> Result<Vec<Delivery>, LeadscopeError> {
        let ids = lock_storage(storage)?.list_queued_email_ids(batch_size)?;
        if !ids.is_empty() {
            info!("Submitting {} queued emails", ids.len());
        }
        ids.into_iter().map(|id| self.submit(id)).collect()
    }
}
