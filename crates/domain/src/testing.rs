//! In-memory collaborators and fixtures for tests.
//!
//! Enabled for this crate's tests and, through the `testing` feature, for
//! downstream crates.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use fake::faker::internet::en::{SafeEmail, Username};
use fake::Fake;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::{
    Application, ApplicationDraft, ApplicationStatus, ChangeEvent, Member, MemberInput,
    NewApplication, Playstyle, ScreenshotKind, ScreenshotUpload,
};
use crate::services::notification::{
    Delivery, DeliveryError, NotificationContext, NotificationTemplate, Notifier,
};
use crate::store::{
    ApplicationStore, ChangeFeed, FeedError, MemberStore, ObjectStore, StorageError, StoreError,
};

/// Public URL prefix used by [`FakeObjectStore`].
pub const FAKE_STORAGE_BASE: &str = "https://storage.test/object/public/application-screenshots";

/// A valid draft whose birthday matches `age` today.
pub fn draft(playstyle: Playstyle, age: i32, legendary_series: i32) -> ApplicationDraft {
    let today = Utc::now().date_naive();
    let birthday = today
        .checked_sub_months(Months::new(age as u32 * 12 + 1))
        .unwrap_or(today);

    ApplicationDraft {
        in_game_ign: Username().fake(),
        codm_uid: (1_000_000_000u64..9_999_999_999u64).fake::<u64>().to_string(),
        email: SafeEmail().fake(),
        fb_account_link: "https://facebook.com/profile.php?id=100001".to_string(),
        age,
        birthday,
        playstyle,
        streamer_mode: "Off".to_string(),
        legendary_series,
        can_changename: false,
        changename_time_left: None,
    }
}

pub fn screenshot(kind: ScreenshotKind) -> ScreenshotUpload {
    ScreenshotUpload {
        kind,
        file_name: "proof.png".to_string(),
        content_type: Some("image/png".to_string()),
        bytes: vec![0x89, b'P', b'N', b'G'],
    }
}

/// A stored application with all three screenshots. Reviewed statuses are
/// stamped with the current time.
pub fn stored_application(status: ApplicationStatus) -> Application {
    let reviewed = status.is_reviewed().then(Utc::now);
    application_with(status, reviewed)
}

pub fn reviewed_application(status: ApplicationStatus, reviewed_at: DateTime<Utc>) -> Application {
    application_with(status, Some(reviewed_at))
}

fn application_with(status: ApplicationStatus, reviewed_date: Option<DateTime<Utc>>) -> Application {
    let d = draft(Playstyle::Casual, 20, 5);
    let url = |kind: ScreenshotKind| {
        Some(format!(
            "{}/{}_{}_1700000000000.png",
            FAKE_STORAGE_BASE,
            d.codm_uid,
            kind.field_name()
        ))
    };
    let now = Utc::now();

    Application {
        id: Uuid::new_v4(),
        user_identifier: d.codm_uid.clone(),
        in_game_ign: d.in_game_ign.clone(),
        codm_uid: d.codm_uid.clone(),
        email: d.email.clone(),
        fb_account_link: d.fb_account_link.clone(),
        age: d.age,
        birthday: d.birthday,
        playstyle: d.playstyle,
        streamer_mode: d.streamer_mode.clone(),
        legendary_series: d.legendary_series,
        can_changename: false,
        changename_time_left: None,
        fb_like_screenshot: url(ScreenshotKind::FbLike),
        profile_screenshot: url(ScreenshotKind::Profile),
        clan_join_screenshot: url(ScreenshotKind::ClanJoin),
        status,
        admin_notes: None,
        reviewed_date,
        created_at: now,
        updated_at: now,
    }
}

fn simulated(what: &str) -> StoreError {
    StoreError::Unavailable(format!("simulated {} failure", what))
}

/// Applications table kept in a vector. Enforces the active-UID uniqueness rule.
#[derive(Default)]
pub struct InMemoryApplicationStore {
    rows: Mutex<Vec<Application>>,
    fail_writes: AtomicBool,
}

impl InMemoryApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, application: Application) {
        self.rows.lock().unwrap().push(application);
    }

    /// Rows newest first.
    pub fn all(&self) -> Vec<Application> {
        self.rows.lock().unwrap().iter().rev().cloned().collect()
    }

    pub fn get(&self, id: Uuid) -> Option<Application> {
        self.rows.lock().unwrap().iter().find(|a| a.id == id).cloned()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writes(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(simulated("write"));
        }
        Ok(())
    }
}

#[async_trait]
impl ApplicationStore for InMemoryApplicationStore {
    async fn list(&self) -> Result<Vec<Application>, StoreError> {
        Ok(self.all())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Application>, StoreError> {
        Ok(self.get(id))
    }

    async fn find_active_by_user_identifier(
        &self,
        user_identifier: &str,
    ) -> Result<Option<Application>, StoreError> {
        Ok(self
            .all()
            .into_iter()
            .find(|a| a.user_identifier == user_identifier && a.status != ApplicationStatus::Rejected))
    }

    async fn insert(&self, new: NewApplication) -> Result<Application, StoreError> {
        self.check_writes()?;
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|a| {
            a.user_identifier == new.user_identifier && a.status != ApplicationStatus::Rejected
        }) {
            return Err(StoreError::Conflict(new.user_identifier));
        }

        let now = Utc::now();
        let d = new.draft;
        let application = Application {
            id: Uuid::new_v4(),
            user_identifier: new.user_identifier,
            in_game_ign: d.in_game_ign.trim().to_string(),
            codm_uid: d.codm_uid.trim().to_string(),
            email: d.email,
            fb_account_link: d.fb_account_link,
            age: d.age,
            birthday: d.birthday,
            playstyle: d.playstyle,
            streamer_mode: d.streamer_mode,
            legendary_series: d.legendary_series,
            can_changename: d.can_changename,
            changename_time_left: d.changename_time_left,
            fb_like_screenshot: new.screenshots.fb_like,
            profile_screenshot: new.screenshots.profile,
            clan_join_screenshot: new.screenshots.clan_join,
            status: ApplicationStatus::Pending,
            admin_notes: None,
            reviewed_date: None,
            created_at: now,
            updated_at: now,
        };
        rows.push(application.clone());
        Ok(application)
    }

    async fn record_decision(
        &self,
        id: Uuid,
        status: ApplicationStatus,
        notes: Option<String>,
        reviewed_at: DateTime<Utc>,
    ) -> Result<Option<Application>, StoreError> {
        self.check_writes()?;
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows
            .iter_mut()
            .find(|a| a.id == id && a.status == ApplicationStatus::Pending)
        else {
            return Ok(None);
        };
        row.status = status;
        row.admin_notes = notes;
        row.reviewed_date = Some(reviewed_at);
        row.updated_at = reviewed_at;
        Ok(Some(row.clone()))
    }

    async fn clear_screenshots(&self, id: Uuid) -> Result<Option<Application>, StoreError> {
        self.check_writes()?;
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        *row = Application {
            updated_at: Utc::now(),
            ..row.without_screenshots()
        };
        Ok(Some(row.clone()))
    }
}

/// Roster table kept in a vector.
#[derive(Default)]
pub struct InMemoryMemberStore {
    rows: Mutex<Vec<Member>>,
}

impl InMemoryMemberStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemberStore for InMemoryMemberStore {
    async fn list(&self) -> Result<Vec<Member>, StoreError> {
        let mut members = self.rows.lock().unwrap().clone();
        members.sort_by(|a, b| (&a.role, a.created_at).cmp(&(&b.role, b.created_at)));
        Ok(members)
    }

    async fn upsert(&self, input: MemberInput) -> Result<Member, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let id = input.id.unwrap_or_else(Uuid::new_v4);
        let created_at = rows
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.created_at)
            .unwrap_or_else(Utc::now);

        let member = Member {
            id,
            ign: input.ign,
            role: input.role,
            mode: input.mode,
            description: input.description,
            photo_url: input.photo_url,
            created_at,
        };
        rows.retain(|m| m.id != id);
        rows.push(member.clone());
        Ok(member)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|m| m.id != id);
        Ok(rows.len() != before)
    }
}

/// Object store that keeps bytes in memory and counts calls.
#[derive(Default)]
pub struct FakeObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    deleted: Mutex<Vec<String>>,
    uploads: AtomicUsize,
    delete_calls: AtomicUsize,
    fail_uploads_after: Mutex<Option<usize>>,
    fail_deletes: AtomicBool,
    delete_delay: Option<Duration>,
}

impl FakeObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete calls sleep for `delay` before completing.
    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = Some(delay);
        self
    }

    /// Uploads after the first `n` successful ones fail.
    pub fn fail_uploads_after(&self, n: usize) {
        *self.fail_uploads_after.lock().unwrap() = Some(n);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Names currently stored.
    pub fn names(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    /// Every name passed to a successful delete.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn upload(
        &self,
        name: &str,
        _content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        if let Some(limit) = *self.fail_uploads_after.lock().unwrap() {
            if self.uploads.load(Ordering::SeqCst) >= limit {
                return Err(StorageError::Upload {
                    name: name.to_string(),
                    reason: "simulated upload failure".to_string(),
                });
            }
        }
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().insert(name.to_string(), bytes);
        Ok(format!("{}/{}", FAKE_STORAGE_BASE, name))
    }

    async fn delete(&self, names: &[String]) -> Result<(), StorageError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delete_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Delete("simulated delete failure".to_string()));
        }
        let mut objects = self.objects.lock().unwrap();
        for name in names {
            objects.remove(name);
        }
        self.deleted.lock().unwrap().extend(names.iter().cloned());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SentNotification {
    pub recipient: String,
    pub template: NotificationTemplate,
    pub context: NotificationContext,
}

/// Notifier that records every successful send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    failing: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        recipient: &str,
        template: NotificationTemplate,
        context: &NotificationContext,
    ) -> Result<Delivery, DeliveryError> {
        if self.failing {
            return Err(DeliveryError::Transport("simulated delivery failure".to_string()));
        }
        self.sent.lock().unwrap().push(SentNotification {
            recipient: recipient.to_string(),
            template,
            context: context.clone(),
        });
        Ok(Delivery::Sent)
    }
}

/// Change feed driven by the test through [`ChannelChangeFeed::emit`].
pub struct ChannelChangeFeed {
    sender: Mutex<Option<mpsc::Sender<ChangeEvent>>>,
    receiver: Mutex<Option<mpsc::Receiver<ChangeEvent>>>,
    failing: bool,
}

impl ChannelChangeFeed {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            failing: false,
        }
    }

    /// A feed whose subscribe always fails.
    pub fn failing() -> Self {
        Self {
            sender: Mutex::new(None),
            receiver: Mutex::new(None),
            failing: true,
        }
    }

    pub async fn emit(&self, event: ChangeEvent) {
        let sender = self.sender.lock().unwrap().clone();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }

    /// Drops the sending side; the subscriber sees the stream end.
    pub fn close(&self) {
        self.sender.lock().unwrap().take();
    }
}

impl Default for ChannelChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChangeFeed for ChannelChangeFeed {
    async fn subscribe(&self) -> Result<mpsc::Receiver<ChangeEvent>, FeedError> {
        if self.failing {
            return Err(FeedError::Subscribe("simulated subscribe failure".to_string()));
        }
        self.receiver
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| FeedError::Subscribe("already subscribed".to_string()))
    }
}
