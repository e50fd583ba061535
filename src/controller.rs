use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapter::Adapter;
use crate::credentials::CredentialProvider;
use crate::models::{EncodedImage, Language, PostType};
use crate::options::OptionUpdate;
use crate::session::{Session, SessionError};

/// How often idle sessions are looked for.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("session {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: Uuid,
    pub session: Session,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped when a remote call starts or the session is reset. A result
    /// carrying an older epoch belongs to a superseded request.
    pub epoch: u64,
}

pub type SessionStore = Arc<RwLock<HashMap<Uuid, SessionRecord>>>;

/// Drives sessions through their phases and calls the adapter in between.
/// The store lock is never held across a remote call.
pub struct Controller {
    store: SessionStore,
    adapter: Adapter,
    credentials: Arc<dyn CredentialProvider>,
    max_upload_bytes: usize,
}

impl Controller {
    pub fn new(adapter: Adapter, credentials: Arc<dyn CredentialProvider>, max_upload_bytes: usize) -> Self {
        Self { store: SessionStore::default(), adapter, credentials, max_upload_bytes }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub fn create(&self, language: Language) -> SessionRecord {
        let now = Utc::now();
        let record = SessionRecord {
            id: Uuid::new_v4(),
            session: Session::new(language),
            created_at: now,
            updated_at: now,
            epoch: 0,
        };
        self.store.write().insert(record.id, record.clone());
        info!("🆕 Created session {}", record.id);
        record
    }

    pub fn get(&self, id: Uuid) -> Result<SessionRecord, ControllerError> {
        self.store.read().get(&id).cloned().ok_or(ControllerError::NotFound(id))
    }

    pub fn remove(&self, id: Uuid) -> Result<(), ControllerError> {
        match self.store.write().remove(&id) {
            Some(_) => {
                info!("🗑️ Removed session {}", id);
                Ok(())
            }
            None => Err(ControllerError::NotFound(id)),
        }
    }

    /// Drops sessions untouched for longer than `ttl`.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let now = Utc::now();
        let mut guard = self.store.write();
        let before = guard.len();
        guard.retain(|_, record| (now - record.updated_at).to_std().map_or(true, |idle| idle <= ttl));
        let evicted = before - guard.len();
        if evicted > 0 {
            info!("🧹 Evicted {} idle sessions ({} left)", evicted, guard.len());
        }
        evicted
    }

    /// Background task calling [`Self::evict_idle`] every `every`.
    pub fn spawn_sweeper(self: Arc<Self>, ttl: Duration, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                self.evict_idle(ttl);
            }
        })
    }

    fn apply(
        &self,
        id: Uuid,
        new_epoch: bool,
        step: impl FnOnce(Session) -> Result<Session, SessionError>,
    ) -> Result<SessionRecord, ControllerError> {
        let mut guard = self.store.write();
        let record = guard.get_mut(&id).ok_or(ControllerError::NotFound(id))?;
        let next = step(record.session.clone())?;
        debug!("session {} {:?} -> {:?}", id, record.session.phase, next.phase);
        record.session = next;
        record.updated_at = Utc::now();
        if new_epoch {
            record.epoch += 1;
        }
        Ok(record.clone())
    }

    /// Applies one transition to the stored session and stores the result.
    fn transition(
        &self,
        id: Uuid,
        step: impl FnOnce(Session) -> Result<Session, SessionError>,
    ) -> Result<SessionRecord, ControllerError> {
        self.apply(id, false, step)
    }

    /// Like [`Self::transition`], and supersedes any remote call in flight.
    fn start(
        &self,
        id: Uuid,
        step: impl FnOnce(Session) -> Result<Session, SessionError>,
    ) -> Result<SessionRecord, ControllerError> {
        self.apply(id, true, step)
    }

    /// Stores the outcome of a remote call started at `epoch`. The outcome is
    /// dropped if another call started since or the session left the phase
    /// the call was made for.
    fn settle(
        &self,
        id: Uuid,
        epoch: u64,
        what: &str,
        step: impl FnOnce(Session) -> Result<Session, SessionError>,
    ) -> Result<SessionRecord, ControllerError> {
        let mut guard = self.store.write();
        let record = guard.get_mut(&id).ok_or(ControllerError::NotFound(id))?;
        if record.epoch != epoch {
            warn!("Discarding stale {} result for session {} (epoch {} < {})", what, id, epoch, record.epoch);
            return Ok(record.clone());
        }
        match step(record.session.clone()) {
            Ok(next) => {
                debug!("session {} {:?} -> {:?}", id, record.session.phase, next.phase);
                record.session = next;
                record.updated_at = Utc::now();
            }
            Err(e) => warn!("Discarding stale {} result for session {}: {}", what, id, e),
        }
        Ok(record.clone())
    }

    pub async fn upload(&self, id: Uuid, content_type: Option<&str>, body: &[u8]) -> Result<SessionRecord, ControllerError> {
        let mime = content_type.unwrap_or_default().trim().to_ascii_lowercase();
        if !mime.starts_with("image/") || body.is_empty() || body.len() > self.max_upload_bytes {
            warn!("Rejected upload for session {} (type={:?}, {} bytes)", id, mime, body.len());
            return self.transition(id, |s| {
                let message = s.language.invalid_upload_message();
                s.reject_upload(message)
            });
        }

        let epoch = self.start(id, Session::begin_analysis)?.epoch;
        let image = match EncodedImage::from_bytes(body, &mime) {
            Ok(image) => image,
            Err(e) => {
                warn!("Could not read uploaded image for session {}: {}", id, e);
                return self.settle(id, epoch, "upload", |s| {
                    let message = s.language.analysis_failed_message();
                    s.analysis_failed(message)
                });
            }
        };
        let attached = self.settle(id, epoch, "upload", |s| s.attach_reference(image.clone()))?;
        if attached.epoch != epoch {
            return Ok(attached);
        }

        info!("🔍 Analyzing upload for session {} ({}, {} bytes)", id, image.mime_type, body.len());
        let suggestions = self.adapter.analyze(&image).await;
        self.settle(id, epoch, "analysis", |s| s.analysis_succeeded(suggestions))
    }

    pub fn update_options(&self, id: Uuid, update: OptionUpdate) -> Result<SessionRecord, ControllerError> {
        self.transition(id, |s| s.apply_update(update))
    }

    /// Starts synthesis. Incomplete options make this a no-op that returns
    /// the session unchanged.
    pub async fn generate(&self, id: Uuid) -> Result<SessionRecord, ControllerError> {
        let record = match self.start(id, Session::begin_generation) {
            Err(ControllerError::Session(SessionError::NotReady)) => {
                debug!("Generate ignored for session {}: options incomplete", id);
                return self.get(id);
            }
            other => other?,
        };
        let session = &record.session;
        let Some((image, options)) = session.generation_inputs() else {
            return Err(SessionError::NotReady.into());
        };

        let result = self
            .adapter
            .synthesize(image, options, &session.custom_prompt, session.quality, self.credentials.as_ref())
            .await;

        match result {
            Ok(generated) => self.settle(id, record.epoch, "generation", |s| s.generation_succeeded(generated)),
            Err(e) => {
                let credential = e.is_credential_error();
                self.settle(id, record.epoch, "generation", |s| {
                    let message = if credential {
                        s.language.credential_failed_message()
                    } else {
                        s.language.generation_failed_message()
                    };
                    s.generation_failed(message)
                })
            }
        }
    }

    pub fn adjust(&self, id: Uuid) -> Result<SessionRecord, ControllerError> {
        self.transition(id, Session::adjust_settings)
    }

    /// Requests a caption. Only the most recently requested strategy is kept.
    pub async fn caption(&self, id: Uuid, post_type: PostType) -> Result<SessionRecord, ControllerError> {
        let record = self.start(id, |s| s.select_caption(post_type))?;
        let session = &record.session;
        let options = session.options.clone().unwrap_or_default();
        let post = self
            .adapter
            .generate_caption(&options, &session.custom_prompt, session.language, post_type)
            .await;
        self.settle(id, record.epoch, "caption", |s| s.caption_ready(post_type, post))
    }

    pub fn reset(&self, id: Uuid) -> Result<SessionRecord, ControllerError> {
        info!("🔄 Resetting session {}", id);
        self.start(id, |s| Ok(s.reset()))
    }

    pub fn set_language(&self, id: Uuid, language: Language) -> Result<SessionRecord, ControllerError> {
        self.transition(id, |s| Ok(s.set_language(language)))
    }

    pub fn toggle_language(&self, id: Uuid) -> Result<SessionRecord, ControllerError> {
        self.transition(id, |s| {
            let language = s.language.toggled();
            Ok(s.set_language(language))
        })
    }
}
