//! Scripted service fakes
//!
//! Each key has a queue of replies. Replies are consumed in order and the
//! last one repeats forever; a key with no script answers "not found".
//! Every call is timestamped and concurrent calls are tracked so tests can
//! check the pool's concurrency bound and pause behaviour.

use async_trait::async_trait;
use jma_enrich::services::{FeatureSource, RecordingLookup, RecordingMatch, ServiceError};
use jma_enrich::types::{FeatureBundle, Isrc, Mbid};
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub type Reply<V> = Result<Option<V>, ServiceError>;

pub struct Script<K, V> {
    queues: Mutex<HashMap<K, VecDeque<Reply<V>>>>,
}

impl<K: Eq + Hash, V: Clone> Script<K, V> {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
        }
    }

    pub fn push(&self, key: K, reply: Reply<V>) {
        self.queues
            .lock()
            .unwrap()
            .entry(key)
            .or_default()
            .push_back(reply);
    }

    fn next(&self, key: &K) -> Reply<V> {
        let mut queues = self.queues.lock().unwrap();
        match queues.get_mut(key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or(Ok(None)),
            None => Ok(None),
        }
    }
}

/// Call accounting shared by one or more fakes
#[derive(Default)]
pub struct CallTracker {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    /// (service, subject, started, finished)
    log: Mutex<Vec<(&'static str, String, Instant, Option<Instant>)>>,
}

impl CallTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn enter(&self, service: &'static str, subject: String) -> usize {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let mut log = self.log.lock().unwrap();
        log.push((service, subject, Instant::now(), None));
        log.len() - 1
    }

    fn exit(&self, index: usize) {
        self.log.lock().unwrap()[index].3 = Some(Instant::now());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self, service: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, ..)| *s == service)
            .count()
    }

    pub fn calls_for(&self, subject: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, s, ..)| s == subject)
            .count()
    }

    /// Start times of every call, across services
    pub fn start_times(&self) -> Vec<Instant> {
        self.log.lock().unwrap().iter().map(|(_, _, t, _)| *t).collect()
    }

    /// Finish time of the first call for `subject`
    pub fn first_finish(&self, subject: &str) -> Option<Instant> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .find(|(_, s, ..)| s == subject)
            .and_then(|(.., finished)| *finished)
    }
}

pub struct FakeMusicBrainz {
    pub script: Script<Isrc, RecordingMatch>,
    tracker: Arc<CallTracker>,
    delay: Duration,
    cancel_on_call: Mutex<Option<CancellationToken>>,
}

impl FakeMusicBrainz {
    pub fn new(tracker: Arc<CallTracker>) -> Self {
        Self::with_delay(tracker, Duration::ZERO)
    }

    pub fn with_delay(tracker: Arc<CallTracker>, delay: Duration) -> Self {
        Self {
            script: Script::new(),
            tracker,
            delay,
            cancel_on_call: Mutex::new(None),
        }
    }

    pub fn resolves(&self, isrc: &str, mbid: Mbid) {
        self.script.push(
            isrc_of(isrc),
            Ok(Some(RecordingMatch {
                mbid,
                title: Some(format!("Recording {}", isrc)),
                artist: Some("Test Artist".to_string()),
            })),
        );
    }

    pub fn replies(&self, isrc: &str, reply: Reply<RecordingMatch>) {
        self.script.push(isrc_of(isrc), reply);
    }

    /// Cancel `token` as soon as the first lookup arrives
    pub fn cancel_on_first_call(&self, token: CancellationToken) {
        *self.cancel_on_call.lock().unwrap() = Some(token);
    }
}

#[async_trait]
impl RecordingLookup for FakeMusicBrainz {
    fn service_name(&self) -> &'static str {
        "MusicBrainz"
    }

    async fn lookup_isrc(&self, isrc: &Isrc) -> Result<Option<RecordingMatch>, ServiceError> {
        let index = self.tracker.enter("MusicBrainz", isrc.to_string());
        let token = self.cancel_on_call.lock().unwrap().take();
        if let Some(token) = token {
            token.cancel();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reply = self.script.next(isrc);
        self.tracker.exit(index);
        reply
    }
}

pub struct FakeAcousticBrainz {
    pub script: Script<Mbid, FeatureBundle>,
    tracker: Arc<CallTracker>,
    delay: Duration,
}

impl FakeAcousticBrainz {
    pub fn new(tracker: Arc<CallTracker>) -> Self {
        Self::with_delay(tracker, Duration::ZERO)
    }

    pub fn with_delay(tracker: Arc<CallTracker>, delay: Duration) -> Self {
        Self {
            script: Script::new(),
            tracker,
            delay,
        }
    }

    pub fn has_features(&self, mbid: Mbid, tempo: f64) {
        self.script.push(mbid, Ok(Some(bundle(mbid, tempo))));
    }

    pub fn replies(&self, mbid: Mbid, reply: Reply<FeatureBundle>) {
        self.script.push(mbid, reply);
    }
}

#[async_trait]
impl FeatureSource for FakeAcousticBrainz {
    fn service_name(&self) -> &'static str {
        "AcousticBrainz"
    }

    async fn fetch_features(&self, mbid: &Mbid) -> Result<Option<FeatureBundle>, ServiceError> {
        let index = self.tracker.enter("AcousticBrainz", mbid.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reply = self.script.next(mbid);
        self.tracker.exit(index);
        reply
    }
}

pub fn isrc_of(code: &str) -> Isrc {
    Isrc::parse(code).unwrap()
}

/// Deterministic MBID for fixture number `n`
pub fn mbid_of(n: u32) -> Mbid {
    Mbid::parse(&format!("00000000-0000-4000-8000-{:012}", n)).unwrap()
}

pub fn bundle(mbid: Mbid, tempo: f64) -> FeatureBundle {
    let mut bundle = FeatureBundle::empty(mbid);
    bundle.tempo = Some(tempo);
    bundle.danceability = Some(1.1);
    bundle.key_key = Some("C".to_string());
    bundle.key_scale = Some("major".to_string());
    bundle.raw_json = Some(format!("{{\"rhythm\":{{\"bpm\":{}}}}}", tempo));
    bundle
}

pub fn transient() -> ServiceError {
    ServiceError::Transient("HTTP 500: Internal Server Error".to_string())
}
