//! Dashboard synchronization with the applications table.
//!
//! A push channel (change feed) and a polling fallback both enqueue onto one
//! intake. A single consumer task applies everything to the
//! [`ApplicationMirror`], so mutations never interleave. Applied changes are
//! published as [`SyncNotice`]s on a broadcast channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::{Application, ApplicationStatus, ChangeEvent};
use crate::store::{ApplicationStore, ChangeFeed, StoreError};

/// Local copy of the applications table, newest first.
#[derive(Debug, Default)]
pub struct ApplicationMirror {
    entries: RwLock<Vec<Application>>,
}

impl ApplicationMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Application> {
        self.read().clone()
    }

    pub fn get(&self, id: Uuid) -> Option<Application> {
        self.read().iter().find(|a| a.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Applies one change. Returns `false` when the mirror was left unchanged,
    /// which makes replaying a delivered event a no-op.
    pub fn apply(&self, event: &ChangeEvent) -> bool {
        let mut entries = self.write();
        match event {
            ChangeEvent::Insert(app) => match entries.iter().position(|a| a.id == app.id) {
                Some(i) if entries[i] == *app => false,
                Some(i) => {
                    entries[i] = app.clone();
                    true
                }
                None => {
                    entries.insert(0, app.clone());
                    true
                }
            },
            // Updates for rows not yet mirrored are left to the next poll.
            ChangeEvent::Update(app) => match entries.iter().position(|a| a.id == app.id) {
                Some(i) if entries[i] != *app => {
                    entries[i] = app.clone();
                    true
                }
                _ => false,
            },
            ChangeEvent::Delete { id } => {
                let before = entries.len();
                entries.retain(|a| a.id != *id);
                entries.len() != before
            }
        }
    }

    /// Replaces the content only when it differs. Returns the previous length
    /// when a replacement happened.
    pub fn replace_if_changed(&self, fresh: Vec<Application>) -> Option<usize> {
        let mut entries = self.write();
        if *entries == fresh {
            return None;
        }
        let previous = entries.len();
        *entries = fresh;
        Some(previous)
    }

    pub fn replace(&self, fresh: Vec<Application>) {
        *self.write() = fresh;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Application>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Application>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// User-visible notice about an applied change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncNotice {
    Inserted { id: Uuid, ign: String },
    Updated { id: Uuid, status: ApplicationStatus },
    Deleted { id: Uuid },
    /// The mirror was replaced by a full fetch.
    Refreshed { count: usize, added: usize },
}

impl SyncNotice {
    pub fn message(&self) -> String {
        match self {
            SyncNotice::Inserted { .. } => "New application received!".to_string(),
            SyncNotice::Updated { status, .. } => format!("Application updated ({})", status),
            SyncNotice::Deleted { .. } => "Application removed".to_string(),
            SyncNotice::Refreshed { added, .. } if *added > 0 => {
                "New application received!".to_string()
            }
            SyncNotice::Refreshed { count, .. } => format!("Applications refreshed ({})", count),
        }
    }
}

/// Which channels are feeding the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    PushAndPoll,
    PollOnly,
}

#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    pub poll_interval: Duration,
    pub subscribe_timeout: Duration,
    pub notice_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            subscribe_timeout: Duration::from_secs(10),
            notice_capacity: 64,
        }
    }
}

enum Intake {
    Change(ChangeEvent),
    Poll(Vec<Application>),
    Reload {
        entries: Vec<Application>,
        done: oneshot::Sender<usize>,
    },
}

/// Handle to the running sync tasks.
pub struct SyncHandle {
    mirror: Arc<ApplicationMirror>,
    store: Arc<dyn ApplicationStore>,
    intake: mpsc::Sender<Intake>,
    notices: broadcast::Sender<SyncNotice>,
    push_active: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Starts the sync layer: initial load, consumer, poller and push forwarder.
pub async fn start(
    store: Arc<dyn ApplicationStore>,
    feed: Arc<dyn ChangeFeed>,
    config: SyncConfig,
) -> SyncHandle {
    let mirror = Arc::new(ApplicationMirror::new());
    match store.list().await {
        Ok(entries) => mirror.replace(entries),
        Err(e) => tracing::warn!(error = %e, "Initial application load failed, waiting for poll"),
    }

    let (intake_tx, intake_rx) = mpsc::channel(256);
    let (notices, _) = broadcast::channel(config.notice_capacity.max(1));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let push_active = Arc::new(AtomicBool::new(false));

    let tasks = vec![
        tokio::spawn(consume(
            Arc::clone(&mirror),
            intake_rx,
            notices.clone(),
            shutdown_rx.clone(),
        )),
        tokio::spawn(poll(
            Arc::clone(&store),
            intake_tx.clone(),
            config.poll_interval,
            shutdown_rx.clone(),
        )),
        tokio::spawn(forward_push(
            feed,
            intake_tx.clone(),
            config.subscribe_timeout,
            Arc::clone(&push_active),
            shutdown_rx,
        )),
    ];

    tracing::info!(
        applications = mirror.len(),
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "Application sync started"
    );

    SyncHandle {
        mirror,
        store,
        intake: intake_tx,
        notices,
        push_active,
        shutdown_tx,
        tasks: Mutex::new(tasks),
    }
}

impl SyncHandle {
    pub fn mirror(&self) -> Arc<ApplicationMirror> {
        Arc::clone(&self.mirror)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotice> {
        self.notices.subscribe()
    }

    pub fn mode(&self) -> SyncMode {
        if self.push_active.load(Ordering::SeqCst) {
            SyncMode::PushAndPoll
        } else {
            SyncMode::PollOnly
        }
    }

    /// Full reload through the intake. Replaces the mirror unconditionally and
    /// returns the number of applications.
    pub async fn refresh(&self) -> Result<usize, StoreError> {
        let entries = self.store.list().await?;
        let count = entries.len();
        let (done, wait) = oneshot::channel();
        if self.intake.send(Intake::Reload { entries, done }).await.is_err() {
            return Err(StoreError::Unavailable("sync layer stopped".to_string()));
        }
        Ok(wait.await.unwrap_or(count))
    }

    /// Stops all tasks and waits for them to finish.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Sync task ended abnormally");
            }
        }
        tracing::info!("Application sync stopped");
    }
}

async fn consume(
    mirror: Arc<ApplicationMirror>,
    mut intake: mpsc::Receiver<Intake>,
    notices: broadcast::Sender<SyncNotice>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let item = tokio::select! {
            item = intake.recv() => item,
            _ = shutdown.changed() => break,
        };
        let Some(item) = item else { break };

        let notice = match item {
            Intake::Change(event) => {
                if !mirror.apply(&event) {
                    continue;
                }
                metrics::counter!("sync_events_applied_total").increment(1);
                match event {
                    ChangeEvent::Insert(app) => SyncNotice::Inserted {
                        id: app.id,
                        ign: app.in_game_ign,
                    },
                    ChangeEvent::Update(app) => SyncNotice::Updated {
                        id: app.id,
                        status: app.status,
                    },
                    ChangeEvent::Delete { id } => SyncNotice::Deleted { id },
                }
            }
            Intake::Poll(entries) => {
                let count = entries.len();
                match mirror.replace_if_changed(entries) {
                    Some(previous) => SyncNotice::Refreshed {
                        count,
                        added: count.saturating_sub(previous),
                    },
                    None => continue,
                }
            }
            Intake::Reload { entries, done } => {
                let count = entries.len();
                let previous = mirror.len();
                mirror.replace(entries);
                let _ = done.send(count);
                SyncNotice::Refreshed {
                    count,
                    added: count.saturating_sub(previous),
                }
            }
        };

        tracing::debug!(notice = ?notice, "Sync notice");
        // No subscribers is fine.
        let _ = notices.send(notice);
    }
}

async fn poll(
    store: Arc<dyn ApplicationStore>,
    intake: mpsc::Sender<Intake>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately; start() already loaded.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        match store.list().await {
            Ok(entries) => {
                if intake.send(Intake::Poll(entries)).await.is_err() {
                    break;
                }
            }
            Err(e) => tracing::warn!(error = %e, "Application poll failed"),
        }
    }
}

async fn forward_push(
    feed: Arc<dyn ChangeFeed>,
    intake: mpsc::Sender<Intake>,
    subscribe_timeout: Duration,
    push_active: Arc<AtomicBool>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut events = match tokio::time::timeout(subscribe_timeout, feed.subscribe()).await {
        Ok(Ok(events)) => events,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Change feed unavailable, using polling only");
            return;
        }
        Err(_) => {
            tracing::warn!("Change feed subscribe timed out, using polling only");
            return;
        }
    };

    push_active.store(true, Ordering::SeqCst);
    tracing::info!("Change feed subscribed");

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = shutdown.changed() => break,
        };
        match event {
            Some(event) => {
                if intake.send(Intake::Change(event)).await.is_err() {
                    break;
                }
            }
            None => {
                tracing::warn!("Change feed closed, continuing with polling only");
                break;
            }
        }
    }

    push_active.store(false, Ordering::SeqCst);
}
