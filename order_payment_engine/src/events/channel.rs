//! Fan-in event delivery for order engine hooks.
//!
//! Every hook gets its own bounded channel. The engine APIs hold [`EventProducer`]s, which are clones of the sending
//! half, and publish into it without waiting for the hook to finish. The [`EventHandler`] runs each event as its own
//! task, so a slow hook (an email, a courier webhook) never holds up an order operation.
//!
//! Handlers see the event and nothing else. Once every producer has been dropped the handler finishes the jobs it has
//! already started and returns.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    name: &'static str,
    inbox: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    /// `name` only labels the log output. `buffer_size` is how many events may queue before publishers wait.
    pub fn new(name: &'static str, buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, inbox) = mpsc::channel(buffer_size.max(1));
        Self { name, inbox, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Delivers events until the last producer goes away, then waits for the jobs still in flight.
    ///
    /// Returns the number of events that were handled. A hook that panics is logged and counted as handled.
    pub async fn run(self) -> usize {
        let Self { name, mut inbox, sender, handler } = self;
        drop(sender);
        debug!("📬️ [{name}] Event handler started");
        let mut jobs = JoinSet::new();
        let mut handled = 0;
        loop {
            tokio::select! {
                ev = inbox.recv() => match ev {
                    Some(ev) => {
                        trace!("📬️ [{name}] Dispatching event");
                        jobs.spawn((handler)(ev));
                    },
                    None => break,
                },
                Some(done) = jobs.join_next() => {
                    handled += 1;
                    log_job_result(name, done);
                },
            }
        }
        if !jobs.is_empty() {
            debug!("📬️ [{name}] Waiting for {} jobs to complete", jobs.len());
        }
        while let Some(done) = jobs.join_next().await {
            handled += 1;
            log_job_result(name, done);
        }
        debug!("📬️ [{name}] Event handler has shut down after {handled} events");
        handled
    }
}

fn log_job_result(name: &str, result: Result<(), tokio::task::JoinError>) {
    match result {
        Ok(()) => trace!("📬️ [{name}] Event handled"),
        Err(e) => error!("📬️ [{name}] Event hook failed: {e}"),
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    /// Publishes the event. A closed channel is logged and otherwise ignored; events never fail an order operation.
    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}
