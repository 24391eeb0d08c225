//! Session — owns the audio context, the two source tracks, and the most
//! recent mix.
//!
//! A failed decode degrades only the affected track. Mix results are
//! last-writer-wins: a mix that finishes after a newer one was requested
//! is discarded. [`AudioSession::request_mix`] snapshots everything a mix
//! needs, so several requests can be in flight while the session keeps
//! taking edits.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use log::{info, warn};

use crate::config::EngineConfig;
use crate::context::AudioContext;
use crate::dsp::buffer::AudioBuffer;
use crate::dsp::mixer::MixParameters;
use crate::error::{MixError, VocalMixError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackRole {
    Vocal,
    Instrumental,
}

impl TrackRole {
    pub fn name(self) -> &'static str {
        match self {
            TrackRole::Vocal => "vocal",
            TrackRole::Instrumental => "instrumental",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum TrackStatus {
    #[default]
    Empty,
    Ready(Arc<AudioBuffer>),
    /// Decoding failed; carries the decoder diagnostic.
    Unavailable(String),
}

impl TrackStatus {
    pub fn buffer(&self) -> Option<&Arc<AudioBuffer>> {
        match self {
            TrackStatus::Ready(buffer) => Some(buffer),
            _ => None,
        }
    }
}

/// Generation ticket handed out by [`MixSession::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixTicket(u64);

#[derive(Debug, Clone)]
pub enum MixOutcome {
    /// The result became the current processed buffer.
    Applied(Arc<AudioBuffer>),
    /// A newer mix was requested meanwhile; the result was dropped.
    Superseded,
}

/// Last-writer-wins holder for the processed buffer.
///
/// Takes `&self` throughout so several in-flight mixes on one event loop
/// can share it.
#[derive(Debug, Default)]
pub struct MixSession {
    generation: Cell<u64>,
    processed: RefCell<Option<Arc<AudioBuffer>>>,
}

impl MixSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a mix request, superseding every earlier one.
    pub fn begin(&self) -> MixTicket {
        let next = self.generation.get() + 1;
        self.generation.set(next);
        MixTicket(next)
    }

    pub fn is_current(&self, ticket: MixTicket) -> bool {
        self.generation.get() == ticket.0
    }

    /// Commit the result for `ticket`. Stale results, successful or not,
    /// are discarded.
    pub fn commit(
        &self,
        ticket: MixTicket,
        result: Result<AudioBuffer, MixError>,
    ) -> Result<MixOutcome, MixError> {
        if !self.is_current(ticket) {
            warn!("discarding stale mix #{}", ticket.0);
            return Ok(MixOutcome::Superseded);
        }
        let buffer = Arc::new(result?);
        *self.processed.borrow_mut() = Some(Arc::clone(&buffer));
        Ok(MixOutcome::Applied(buffer))
    }

    pub fn processed(&self) -> Option<Arc<AudioBuffer>> {
        self.processed.borrow().clone()
    }

    pub fn clear(&self) {
        self.begin();
        self.processed.borrow_mut().take();
    }
}

/// One pending mix: the inputs as they were when it was requested, plus the
/// ticket that decides whether its result still counts.
#[derive(Debug)]
pub struct MixRequest {
    context: Rc<AudioContext>,
    mixes: Rc<MixSession>,
    ticket: MixTicket,
    vocal: Arc<AudioBuffer>,
    instrumental: Arc<AudioBuffer>,
    params: MixParameters,
}

impl MixRequest {
    pub fn ticket(&self) -> MixTicket {
        self.ticket
    }

    /// Mix and commit. Resolves to `Superseded` when a newer request was
    /// made in the meantime.
    pub async fn run(self) -> Result<MixOutcome, MixError> {
        let result = self
            .context
            .mix(self.vocal, self.instrumental, self.params)
            .await;
        self.mixes.commit(self.ticket, result)
    }
}

/// Top-level owner of one user's mixing session.
#[derive(Debug)]
pub struct AudioSession {
    config: EngineConfig,
    context: Option<Rc<AudioContext>>,
    vocal: TrackStatus,
    instrumental: TrackStatus,
    params: MixParameters,
    mixes: Rc<MixSession>,
}

impl AudioSession {
    pub fn new(config: EngineConfig) -> Self {
        AudioSession {
            config,
            context: None,
            vocal: TrackStatus::Empty,
            instrumental: TrackStatus::Empty,
            params: MixParameters::default(),
            mixes: Rc::new(MixSession::new()),
        }
    }

    /// The shared context, created on first use.
    pub fn context(&mut self) -> Result<Rc<AudioContext>, VocalMixError> {
        let context = match self.context.take() {
            Some(context) => context,
            None => Rc::new(AudioContext::new(self.config.clone())?),
        };
        Ok(Rc::clone(self.context.insert(context)))
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    pub fn params(&self) -> MixParameters {
        self.params
    }

    pub fn set_params(&mut self, params: MixParameters) {
        self.params = params;
    }

    pub fn track(&self, role: TrackRole) -> &TrackStatus {
        match role {
            TrackRole::Vocal => &self.vocal,
            TrackRole::Instrumental => &self.instrumental,
        }
    }

    fn track_mut(&mut self, role: TrackRole) -> &mut TrackStatus {
        match role {
            TrackRole::Vocal => &mut self.vocal,
            TrackRole::Instrumental => &mut self.instrumental,
        }
    }

    /// Decode `bytes` into the given track. On failure the track becomes
    /// `Unavailable` and the error is returned; nothing else changes.
    pub async fn load_track(
        &mut self,
        role: TrackRole,
        bytes: &[u8],
    ) -> Result<Arc<AudioBuffer>, VocalMixError> {
        let context = self.context()?;
        match context.decode_audio_data(bytes).await {
            Ok(buffer) => {
                let buffer = Arc::new(buffer);
                info!("{} track ready ({:.2}s)", role.name(), buffer.duration());
                *self.track_mut(role) = TrackStatus::Ready(Arc::clone(&buffer));
                Ok(buffer)
            }
            Err(e) => {
                warn!("{} track unavailable: {e}", role.name());
                *self.track_mut(role) = TrackStatus::Unavailable(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Snapshot the current tracks and parameters into a mix request. The
    /// request supersedes every earlier one, whether or not it has run.
    pub fn request_mix(&mut self) -> Result<MixRequest, VocalMixError> {
        let vocal = self
            .vocal
            .buffer()
            .cloned()
            .ok_or(VocalMixError::TrackUnavailable(TrackRole::Vocal.name()))?;
        let instrumental = self
            .instrumental
            .buffer()
            .cloned()
            .ok_or(VocalMixError::TrackUnavailable(TrackRole::Instrumental.name()))?;
        let context = self.context()?;
        Ok(MixRequest {
            context,
            mixes: Rc::clone(&self.mixes),
            ticket: self.mixes.begin(),
            vocal,
            instrumental,
            params: self.params,
        })
    }

    /// Mix the current tracks with the current parameters.
    pub async fn remix(&mut self) -> Result<MixOutcome, VocalMixError> {
        Ok(self.request_mix()?.run().await?)
    }

    pub fn processed(&self) -> Option<Arc<AudioBuffer>> {
        self.mixes.processed()
    }

    /// Encode the processed buffer for download.
    pub fn export_wav(&mut self) -> Result<Vec<u8>, VocalMixError> {
        let processed = self.processed().ok_or(VocalMixError::NothingToExport)?;
        let context = self.context()?;
        Ok(context.encode_wav(&processed)?)
    }

    /// Full application reset: tracks, mix, and the context itself.
    pub fn reset(&mut self) {
        info!("session reset");
        self.context = None;
        self.vocal = TrackStatus::Empty;
        self.instrumental = TrackStatus::Empty;
        self.params = MixParameters::default();
        self.mixes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::encoder::encode_wav;
    use crate::dsp::mixer::mix;
    use crate::error::{DecodeError, InvalidBufferError};

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn wav(channels: usize, frames: usize, value: f32) -> Vec<u8> {
        encode_wav(&AudioBuffer::new(44100, vec![vec![value; frames]; channels])).unwrap()
    }

    #[test]
    fn newer_mix_wins_over_late_older_one() {
        let mixes = MixSession::new();
        let older = mixes.begin();
        let newer = mixes.begin();

        let fresh = AudioBuffer::silent(44100, 2, 20);
        let stale = AudioBuffer::silent(44100, 2, 10);

        assert!(matches!(
            mixes.commit(newer, Ok(fresh)),
            Ok(MixOutcome::Applied(_))
        ));
        assert!(matches!(
            mixes.commit(older, Ok(stale)),
            Ok(MixOutcome::Superseded)
        ));
        assert_eq!(mixes.processed().unwrap().frame_count(), 20);
    }

    #[test]
    fn stale_failure_is_discarded_too() {
        let mixes = MixSession::new();
        let older = mixes.begin();
        let _newer = mixes.begin();
        let failure = Err(MixError::InvalidBuffer {
            role: "vocal",
            source: InvalidBufferError::NoChannels,
        });
        assert!(matches!(mixes.commit(older, failure), Ok(MixOutcome::Superseded)));
    }

    #[test]
    fn current_failure_keeps_previous_result() {
        let mixes = MixSession::new();
        let first = mixes.begin();
        mixes
            .commit(first, Ok(AudioBuffer::silent(44100, 2, 5)))
            .unwrap();

        let second = mixes.begin();
        assert!(mixes.commit(second, Err(MixError::Worker("panicked".into()))).is_err());
        assert_eq!(mixes.processed().unwrap().frame_count(), 5);
    }

    #[tokio::test]
    async fn context_is_created_lazily_and_reused() {
        init_logging();
        let mut session = AudioSession::new(EngineConfig::default());
        assert!(!session.has_context());

        let a = session.context().unwrap();
        let b = session.context().unwrap();
        assert!(Rc::ptr_eq(&a, &b));

        session.reset();
        assert!(!session.has_context());
    }

    #[tokio::test]
    async fn decode_failure_degrades_only_that_track() {
        init_logging();
        let mut session = AudioSession::new(EngineConfig::default());
        session
            .load_track(TrackRole::Instrumental, &wav(2, 100, 0.25))
            .await
            .unwrap();

        let err = session
            .load_track(TrackRole::Vocal, b"not audio at all")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VocalMixError::Decode(DecodeError::UnsupportedFormat)
        ));
        assert!(matches!(
            session.track(TrackRole::Vocal),
            TrackStatus::Unavailable(_)
        ));
        assert!(session.track(TrackRole::Instrumental).buffer().is_some());

        let err = session.remix().await.unwrap_err();
        assert!(matches!(err, VocalMixError::TrackUnavailable("vocal")));
    }

    #[tokio::test]
    async fn load_mix_and_export() {
        init_logging();
        let mut session = AudioSession::new(EngineConfig::default());
        assert!(matches!(
            session.export_wav(),
            Err(VocalMixError::NothingToExport)
        ));

        session
            .load_track(TrackRole::Vocal, &wav(1, 300, 0.5))
            .await
            .unwrap();
        session
            .load_track(TrackRole::Instrumental, &wav(2, 200, 0.5))
            .await
            .unwrap();
        session.set_params(MixParameters::new(0.5, 0.0));

        let outcome = session.remix().await.unwrap();
        let MixOutcome::Applied(mixed) = outcome else {
            panic!("expected the mix to apply");
        };
        assert_eq!(mixed.channel_count(), 2);
        assert_eq!(mixed.frame_count(), 300);

        let exported = session.export_wav().unwrap();
        assert_eq!(exported.len(), 44 + 300 * 2 * 2);
    }

    #[tokio::test]
    async fn overlapping_requests_keep_the_newest_result() {
        init_logging();
        let mut session = AudioSession::new(EngineConfig::default());
        session
            .load_track(TrackRole::Vocal, &wav(1, 100, 0.5))
            .await
            .unwrap();
        session
            .load_track(TrackRole::Instrumental, &wav(1, 100, 0.5))
            .await
            .unwrap();

        session.set_params(MixParameters::new(0.0, -1.0));
        let older = session.request_mix().unwrap();
        session.set_params(MixParameters::new(0.0, 1.0));
        let newer = session.request_mix().unwrap();
        assert_ne!(older.ticket(), newer.ticket());

        // Both are in flight at once; the newer one is polled first so the
        // older result always lands last.
        let (newer, older) = tokio::join!(newer.run(), older.run());
        let MixOutcome::Applied(mixed) = newer.unwrap() else {
            panic!("expected the newest mix to apply");
        };
        assert!(matches!(older.unwrap(), MixOutcome::Superseded));

        let processed = session.processed().unwrap();
        assert!(Arc::ptr_eq(&processed, &mixed));
        let expected = mix(
            session.track(TrackRole::Vocal).buffer().unwrap(),
            session.track(TrackRole::Instrumental).buffer().unwrap(),
            &MixParameters::new(0.0, 1.0),
            44100,
        )
        .unwrap();
        assert_eq!(*processed, expected);
    }

    #[tokio::test]
    async fn request_does_not_borrow_the_session() {
        let mut session = AudioSession::new(EngineConfig::default());
        session
            .load_track(TrackRole::Vocal, &wav(1, 10, 0.1))
            .await
            .unwrap();
        session
            .load_track(TrackRole::Instrumental, &wav(1, 10, 0.1))
            .await
            .unwrap();

        let pending = session.request_mix().unwrap();
        // The session stays editable while the request is outstanding.
        session.set_params(MixParameters::new(-1.0, 0.0));
        let newer = session.request_mix().unwrap();

        assert!(matches!(pending.run().await, Ok(MixOutcome::Superseded)));
        assert!(matches!(newer.run().await, Ok(MixOutcome::Applied(_))));
    }

    #[tokio::test]
    async fn reset_clears_tracks_and_mix() {
        let mut session = AudioSession::new(EngineConfig::default());
        session
            .load_track(TrackRole::Vocal, &wav(1, 10, 0.1))
            .await
            .unwrap();
        session
            .load_track(TrackRole::Instrumental, &wav(1, 10, 0.1))
            .await
            .unwrap();
        session.remix().await.unwrap();
        assert!(session.processed().is_some());

        session.reset();
        assert!(session.processed().is_none());
        assert!(matches!(session.track(TrackRole::Vocal), TrackStatus::Empty));
    }
}
