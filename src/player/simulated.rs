use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::ZoomMode;
use super::traits::{EngineEvent, EngineEventSink, PlaybackEngine};
use crate::models::SourceDescriptor;
use crate::utils::{PlayerError, PlayerResult};

/// How a URL behaves when prepared.
#[derive(Debug, Clone)]
pub struct SimulatedMedia {
    pub duration_ms: u64,
    /// Report this failure instead of becoming ready
    pub fail_with: Option<String>,
}

#[derive(Debug)]
struct SimState {
    default_duration_ms: u64,
    load_latency: Duration,
    media: HashMap<String, SimulatedMedia>,
    fail_next_prepares: u32,

    // Bumped by every prepare and release so late completions are dropped
    load_token: u64,
    sink: Option<EngineEventSink>,
    source_url: Option<String>,
    duration_ms: u64,
    ready: bool,
    playing: bool,
    speed: f64,
    zoom_mode: ZoomMode,
    // Media position at `anchor`; advances with the clock while playing
    anchor_position_ms: u64,
    anchor: Instant,

    prepared_urls: Vec<String>,
    seeks: Vec<u64>,
    releases: u32,
}

impl SimState {
    fn position_ms(&self) -> u64 {
        if !(self.ready && self.playing) {
            return self.anchor_position_ms;
        }
        let elapsed = self.anchor.elapsed().as_millis() as f64 * self.speed;
        let position = self.anchor_position_ms.saturating_add(elapsed as u64);
        if self.duration_ms > 0 {
            position.min(self.duration_ms)
        } else {
            position
        }
    }

    fn rebase(&mut self) {
        self.anchor_position_ms = self.position_ms();
        self.anchor = Instant::now();
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Headless engine driven by the tokio clock.
///
/// Used by the demo binary and by tests. Position advances in real (or paused
/// test) time at the configured speed.
pub struct SimulatedEngine {
    state: Arc<Mutex<SimState>>,
}

/// Test and demo side of a [`SimulatedEngine`]: injects platform events and
/// exposes what the session asked the engine to do.
#[derive(Debug, Clone)]
pub struct SimulatedEngineControl {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedEngine {
    pub fn new(default_duration_ms: u64) -> (SimulatedEngine, SimulatedEngineControl) {
        let state = Arc::new(Mutex::new(SimState {
            default_duration_ms,
            load_latency: Duration::from_millis(20),
            media: HashMap::new(),
            fail_next_prepares: 0,
            load_token: 0,
            sink: None,
            source_url: None,
            duration_ms: 0,
            ready: false,
            playing: false,
            speed: 1.0,
            zoom_mode: ZoomMode::default(),
            anchor_position_ms: 0,
            anchor: Instant::now(),
            prepared_urls: Vec::new(),
            seeks: Vec::new(),
            releases: 0,
        }));

        (
            SimulatedEngine {
                state: state.clone(),
            },
            SimulatedEngineControl { state },
        )
    }
}

#[async_trait]
impl PlaybackEngine for SimulatedEngine {
    async fn prepare(
        &mut self,
        source: &SourceDescriptor,
        events: EngineEventSink,
    ) -> PlayerResult<()> {
        let (token, latency, outcome) = {
            let mut state = lock(&self.state);
            state.load_token += 1;
            state.sink = Some(events.clone());
            state.source_url = Some(source.url.clone());
            state.prepared_urls.push(source.url.clone());
            state.ready = false;
            state.playing = false;
            state.anchor_position_ms = 0;
            state.anchor = Instant::now();

            let media = state.media.get(&source.url).cloned().unwrap_or(SimulatedMedia {
                duration_ms: state.default_duration_ms,
                fail_with: None,
            });
            let outcome = if state.fail_next_prepares > 0 {
                state.fail_next_prepares -= 1;
                Err("Simulated decoder failure".to_string())
            } else {
                match media.fail_with {
                    Some(reason) => Err(reason),
                    None => Ok(media.duration_ms),
                }
            };
            (state.load_token, state.load_latency, outcome)
        };

        debug!("Preparing {} (load {})", source.url, token);
        let state = self.state.clone();
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;

            let event = {
                let mut state = lock(&state);
                if state.load_token != token {
                    trace!("Simulated load {} superseded", token);
                    return;
                }
                match outcome {
                    Ok(duration_ms) => {
                        state.ready = true;
                        state.duration_ms = duration_ms;
                        state.anchor = Instant::now();
                        EngineEvent::Ready { duration_ms }
                    }
                    Err(reason) => EngineEvent::Error(reason),
                }
            };
            events.send(event);
        });

        Ok(())
    }

    async fn play(&mut self) -> PlayerResult<()> {
        let mut state = lock(&self.state);
        if !state.ready {
            return Err(PlayerError::Engine("No source prepared".to_string()));
        }
        state.rebase();
        state.playing = true;
        Ok(())
    }

    async fn pause(&mut self) -> PlayerResult<()> {
        let mut state = lock(&self.state);
        state.rebase();
        state.playing = false;
        Ok(())
    }

    async fn seek(&mut self, position_ms: u64) -> PlayerResult<()> {
        let mut state = lock(&self.state);
        if !state.ready {
            return Err(PlayerError::Engine("No source prepared".to_string()));
        }
        state.seeks.push(position_ms);
        state.anchor_position_ms = if state.duration_ms > 0 {
            position_ms.min(state.duration_ms)
        } else {
            position_ms
        };
        state.anchor = Instant::now();
        Ok(())
    }

    async fn set_speed(&mut self, speed: f64) -> PlayerResult<()> {
        let mut state = lock(&self.state);
        state.rebase();
        state.speed = speed;
        Ok(())
    }

    async fn position_ms(&self) -> u64 {
        lock(&self.state).position_ms()
    }

    async fn buffered_percent(&self) -> u8 {
        let state = lock(&self.state);
        if state.duration_ms == 0 {
            return 0;
        }
        // Pretend a fixed read-ahead of 30 s
        let ahead = state.position_ms().saturating_add(30_000).min(state.duration_ms);
        (ahead * 100 / state.duration_ms) as u8
    }

    async fn release(&mut self) {
        let mut state = lock(&self.state);
        debug!("Releasing {:?}", state.source_url);
        state.load_token += 1;
        state.sink = None;
        state.source_url = None;
        state.ready = false;
        state.playing = false;
        state.releases += 1;
    }

    async fn set_zoom_mode(&mut self, mode: ZoomMode) -> PlayerResult<()> {
        lock(&self.state).zoom_mode = mode;
        Ok(())
    }
}

impl SimulatedEngineControl {
    /// Register how `url` behaves when prepared
    pub fn set_media(&self, url: impl Into<String>, media: SimulatedMedia) {
        lock(&self.state).media.insert(url.into(), media);
    }

    pub fn set_load_latency(&self, latency: Duration) {
        lock(&self.state).load_latency = latency;
    }

    /// The next `count` prepares report an engine error
    pub fn fail_next_prepares(&self, count: u32) {
        lock(&self.state).fail_next_prepares = count;
    }

    /// Deliver `event` through the sink of the current load
    pub fn emit(&self, event: EngineEvent) -> bool {
        let sink = lock(&self.state).sink.clone();
        sink.is_some_and(|sink| sink.send(event))
    }

    /// Tear the engine down as a platform would under memory pressure
    pub fn destroy(&self) -> bool {
        let sink = {
            let mut state = lock(&self.state);
            state.load_token += 1;
            state.ready = false;
            state.playing = false;
            state.source_url = None;
            state.sink.take()
        };
        sink.is_some_and(|sink| sink.send(EngineEvent::Released))
    }

    pub fn is_playing(&self) -> bool {
        let state = lock(&self.state);
        state.ready && state.playing
    }

    pub fn position_ms(&self) -> u64 {
        lock(&self.state).position_ms()
    }

    pub fn speed(&self) -> f64 {
        lock(&self.state).speed
    }

    pub fn zoom_mode(&self) -> ZoomMode {
        lock(&self.state).zoom_mode
    }

    pub fn source_url(&self) -> Option<String> {
        lock(&self.state).source_url.clone()
    }

    pub fn prepared_urls(&self) -> Vec<String> {
        lock(&self.state).prepared_urls.clone()
    }

    pub fn seeks(&self) -> Vec<u64> {
        lock(&self.state).seeks.clone()
    }

    pub fn releases(&self) -> u32 {
        lock(&self.state).releases
    }
}
