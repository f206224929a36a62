//! Worker - the batching scheduler and command loop
//!
//! One task owns all stream state. Everything that can wake it is a branch
//! of a single `select!`:
//!
//! ```text
//!   commands ─┐
//!   events   ─┤                      ┌─► Outbound (update, hello, ...)
//!   batch    ─┼─► Worker ─► Session ─┤
//!   track    ─┤                      └─► track fetch task ─┐
//!   tracks  ◄─┴────────────────────────────────────────────┘
//! ```
//!
//! A [`Session`] exists from `open` until the stream closes. Dropping it
//! detaches the event channel and stops both timers.

use std::future::{pending, Future};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use skstream_core::course::Route;
use skstream_core::delta::StreamMessage;
use skstream_core::mode::{self, StreamMode};
use skstream_core::settings::{SettingsOptions, StreamSettings};
use skstream_core::StreamProcessor;

use crate::command::{AlarmOptions, Command, OpenOptions, Outbound};
use crate::tracks::{TrackMap, TrackSource};
use crate::transport::{StreamEvent, StreamTransport};
use crate::WorkerError;

/// Track history refresh period
const TRACK_POLL_INTERVAL: Duration = Duration::from_secs(60);

struct TrackResult {
    generation: u64,
    result: Result<TrackMap, WorkerError>,
}

struct Session {
    processor: StreamProcessor,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    batch_timer: Option<Interval>,
    track_timer: Option<Interval>,
    /// Timers run once the server hello has arrived
    timers_started: bool,
    api_url: Option<String>,
    /// Last track fetch succeeded; periodic fetches are enabled
    has_track_source: bool,
    generation: u64,
}

impl Session {
    fn playback(&self) -> bool {
        self.processor.mode().is_playback()
    }

    fn start_timers(&mut self) {
        self.batch_timer = self
            .processor
            .settings()
            .interval_ms
            .map(|ms| repeating(Duration::from_millis(ms)));
        self.track_timer = Some(repeating(TRACK_POLL_INTERVAL));
        self.timers_started = true;
        log::debug!(
            "Worker: timers started, batch interval {:?}",
            self.processor.settings().interval_ms
        );
    }
}

fn repeating(period: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    timer
}

enum Wake {
    Shutdown,
    Command(Option<Command>),
    Event(Option<StreamEvent>),
    Batch,
    TrackPoll,
    Tracks(TrackResult),
}

async fn next_event(events: Option<&mut mpsc::UnboundedReceiver<StreamEvent>>) -> Option<StreamEvent> {
    match events {
        Some(events) => events.recv().await,
        None => pending().await,
    }
}

async fn tick(timer: Option<&mut Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => pending().await,
    }
}

pub struct Worker<T: StreamTransport, S: TrackSource + 'static> {
    transport: T,
    track_source: Arc<S>,
    commands: mpsc::Receiver<Command>,
    outbound: mpsc::Sender<Outbound>,
    /// Settings carried across sessions
    settings: StreamSettings,
    routes: Vec<Route>,
    token: Option<String>,
    session: Option<Session>,
    generation: u64,
    track_tx: mpsc::UnboundedSender<TrackResult>,
    track_rx: mpsc::UnboundedReceiver<TrackResult>,
}

impl<T: StreamTransport, S: TrackSource + 'static> Worker<T, S> {
    pub fn new(
        transport: T,
        track_source: S,
        commands: mpsc::Receiver<Command>,
        outbound: mpsc::Sender<Outbound>,
    ) -> Self {
        let (track_tx, track_rx) = mpsc::unbounded_channel();
        Worker {
            transport,
            track_source: Arc::new(track_source),
            commands,
            outbound,
            settings: StreamSettings::default(),
            routes: Vec::new(),
            token: None,
            session: None,
            generation: 0,
            track_tx,
            track_rx,
        }
    }

    /// Process commands and stream events until `shutdown` resolves or the
    /// command channel closes.
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), WorkerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        log::info!("Worker: Starting");

        loop {
            let wake = {
                let (events, batch, track) = match self.session.as_mut() {
                    Some(s) => (
                        Some(&mut s.events),
                        s.batch_timer.as_mut(),
                        s.track_timer.as_mut(),
                    ),
                    None => (None, None, None),
                };
                tokio::select! {
                    _ = &mut shutdown => Wake::Shutdown,
                    command = self.commands.recv() => Wake::Command(command),
                    event = next_event(events) => Wake::Event(event),
                    _ = tick(batch) => Wake::Batch,
                    _ = tick(track) => Wake::TrackPoll,
                    Some(result) = self.track_rx.recv() => Wake::Tracks(result),
                }
            };

            match wake {
                Wake::Shutdown => {
                    log::info!("Worker: shutdown requested");
                    break;
                }
                Wake::Command(None) => {
                    log::info!("Worker: command channel closed");
                    break;
                }
                Wake::Command(Some(command)) => self.handle_command(command).await?,
                Wake::Event(Some(event)) => self.handle_event(event).await?,
                Wake::Event(None) => self.close_stream(false).await?,
                Wake::Batch => self.on_batch_tick().await?,
                Wake::TrackPoll => self.on_track_tick(),
                Wake::Tracks(result) => self.on_tracks(result),
            }
        }

        self.session = None;
        self.transport.close();
        log::info!("Worker: Stopped");
        Ok(())
    }

    fn send(&self, message: Outbound) -> impl Future<Output = Result<(), WorkerError>> + 'static {
        log::trace!("Worker: posting {}", message.action());
        let outbound = self.outbound.clone();
        async move {
            outbound
                .send(message)
                .await
                .map_err(|_| WorkerError::ChannelClosed)
        }
    }

    async fn send_all(&mut self, messages: Vec<Outbound>) -> Result<(), WorkerError> {
        for message in messages {
            self.send(message).await?;
        }
        Ok(())
    }

    fn playback(&self) -> bool {
        match &self.session {
            Some(session) => session.playback(),
            None => self.settings.mode.is_playback(),
        }
    }

    async fn handle_command(&mut self, command: Command) -> Result<(), WorkerError> {
        match command {
            Command::Open(opts) => self.open_stream(opts).await?,
            Command::Close => self.close_stream(true).await?,
            Command::Subscribe { context, path } => {
                if self.session.is_some() {
                    self.transport.subscribe(&context, &path);
                }
            }
            Command::Settings(opts) => self.apply_settings(&opts),
            Command::Alarm(alarm) => self.action_alarm(&alarm),
            Command::Vessel { context, name } => {
                if let Some(session) = &mut self.session {
                    if !session.processor.rename(&context, &name) {
                        log::debug!("Worker: no vessel '{}' to rename", context);
                    }
                }
            }
            Command::Auth { token } => {
                log::info!("Worker: auth token updated");
                self.token = token.clone();
                self.transport.set_token(token);
            }
            Command::Routes(routes) => {
                log::debug!("Worker: {} routes", routes.len());
                if let Some(session) = &mut self.session {
                    session.processor.set_routes(routes.clone());
                }
                self.routes = routes;
            }
        }
        Ok(())
    }

    async fn reject(&mut self, reason: String) -> Result<(), WorkerError> {
        self.send(Outbound::Error {
            result: reason,
            playback: self.playback(),
        })
        .await
    }

    async fn open_stream(&mut self, opts: OpenOptions) -> Result<(), WorkerError> {
        if self.session.is_some() {
            log::warn!("Worker: stream already open, ignoring open");
            return Ok(());
        }
        if opts.url.is_empty() {
            return self.reject("Valid options not provided!".to_string()).await;
        }

        self.settings.apply(&opts.settings);
        self.settings.mode = StreamMode::from_playback(opts.is_playback());
        if opts.token.is_some() {
            self.token = opts.token.clone();
        }

        let api_url = match mode::api_url(&opts.url) {
            Ok(api_url) => Some(api_url),
            Err(e) => {
                log::warn!("Worker: {}, track history disabled", e);
                None
            }
        };

        let mut processor = StreamProcessor::new(self.settings.clone(), Utc::now());
        processor.set_routes(self.routes.clone());

        let (url, subscribe) = opts.stream_target();
        log::info!(
            "Worker: opening {} stream {}",
            if opts.is_playback() { "playback" } else { "realtime" },
            url
        );
        let events = self
            .transport
            .open(&url, subscribe.as_deref(), self.token.as_deref());

        self.generation += 1;
        self.session = Some(Session {
            processor,
            events,
            batch_timer: None,
            track_timer: None,
            timers_started: false,
            api_url,
            has_track_source: false,
            generation: self.generation,
        });

        if !opts.is_playback() {
            self.request_tracks();
        }
        Ok(())
    }

    /// Timers and listeners are detached before the transport is closed
    async fn close_stream(&mut self, from_command: bool) -> Result<(), WorkerError> {
        let playback = self.playback();
        if self.session.take().is_some() {
            log::info!(
                "Worker: stream closed by {}",
                if from_command { "command" } else { "server" }
            );
        }
        if from_command {
            self.transport.close();
        }
        self.send(Outbound::Close {
            result: from_command,
            playback,
        })
        .await
    }

    fn apply_settings(&mut self, opts: &SettingsOptions) {
        self.settings.apply(opts);
        if let Some(session) = &mut self.session {
            let change = session.processor.apply_settings(opts);
            if change.interval_changed && session.timers_started {
                session.start_timers();
            }
        }
        log::debug!("Worker: settings applied");
    }

    fn action_alarm(&mut self, alarm: &AlarmOptions) {
        let path = alarm.path();
        if alarm.raise {
            log::info!("Worker: raising alarm {}", path);
            self.transport
                .raise_alarm(&path, alarm.message.as_deref(), alarm.state.as_deref());
        } else {
            log::info!("Worker: clearing alarm {}", path);
            self.transport.clear_alarm(&path);
        }
    }

    async fn handle_event(&mut self, event: StreamEvent) -> Result<(), WorkerError> {
        match event {
            StreamEvent::Connected => {
                let playback = self.playback();
                self.send(Outbound::Open { playback }).await
            }
            StreamEvent::Closed(reason) => {
                if let Some(reason) = reason {
                    log::info!("Worker: server closed stream: {}", reason);
                }
                self.close_stream(false).await
            }
            StreamEvent::Error(error) => {
                log::warn!("Worker: stream error: {}", error);
                let playback = self.playback();
                self.send(Outbound::Error {
                    result: error,
                    playback,
                })
                .await
            }
            StreamEvent::Message(value) => {
                let messages = self.handle_message(value);
                self.send_all(messages).await
            }
        }
    }

    fn handle_message(&mut self, value: Value) -> Vec<Outbound> {
        let Some(session) = &mut self.session else {
            return Vec::new();
        };
        let playback = session.playback();

        let message = match StreamMessage::classify(value) {
            Ok(message) => message,
            Err(e) => {
                log::debug!("Worker: dropping stream message: {}", e);
                return Vec::new();
            }
        };

        match message {
            StreamMessage::Hello { self_id, raw } => {
                log::info!("Worker: hello, self is {:?}", self_id);
                session.processor.set_self_id(self_id.clone());
                session.start_timers();
                vec![Outbound::Hello {
                    self_id,
                    result: raw,
                    playback,
                }]
            }
            StreamMessage::Delta(delta) => {
                let now = Utc::now();
                let mut messages: Vec<Outbound> = session
                    .processor
                    .process_delta(&delta, now)
                    .into_iter()
                    .map(|n| Outbound::notification(n, playback))
                    .collect();
                if session.processor.is_immediate() {
                    messages.push(Outbound::Update(session.processor.emit(now)));
                }
                messages
            }
            StreamMessage::Response(result) => vec![Outbound::Response { result }],
            StreamMessage::Other(value) => {
                log::trace!("Worker: ignoring message {}", value);
                Vec::new()
            }
        }
    }

    async fn on_batch_tick(&mut self) -> Result<(), WorkerError> {
        let Some(session) = &mut self.session else {
            return Ok(());
        };
        if !session.processor.is_dirty() {
            return Ok(());
        }
        let update = session.processor.emit(Utc::now());
        self.send(Outbound::Update(update)).await
    }

    fn on_track_tick(&mut self) {
        if self.session.as_ref().is_some_and(|s| s.has_track_source) {
            self.request_tracks();
        }
    }

    /// Fetch track history in the background
    fn request_tracks(&self) {
        let Some(session) = &self.session else {
            return;
        };
        let Some(api_url) = session.api_url.clone() else {
            return;
        };
        let radius = session.processor.track_radius();
        let generation = session.generation;
        let source = Arc::clone(&self.track_source);
        let token = self.token.clone();
        let tx = self.track_tx.clone();

        tokio::spawn(async move {
            let result = source.fetch_tracks(&api_url, radius, token.as_deref()).await;
            let _ = tx.send(TrackResult { generation, result });
        });
    }

    fn on_tracks(&mut self, result: TrackResult) {
        let Some(session) = &mut self.session else {
            return;
        };
        if session.generation != result.generation {
            log::debug!("Worker: dropping tracks from a closed stream");
            return;
        }
        match result.result {
            Ok(tracks) => {
                session.has_track_source = true;
                session.processor.apply_tracks(tracks);
            }
            Err(e) => {
                session.has_track_source = false;
                log::warn!("Worker: unable to fetch AIS tracks: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::task::JoinHandle;
    use tokio::time::{sleep, timeout};

    #[derive(Clone, Default)]
    struct FakeTransport {
        calls: Arc<Mutex<Vec<String>>>,
        events: Arc<Mutex<Option<mpsc::UnboundedSender<StreamEvent>>>>,
    }

    impl StreamTransport for FakeTransport {
        fn open(
            &mut self,
            url: &str,
            subscribe: Option<&str>,
            token: Option<&str>,
        ) -> mpsc::UnboundedReceiver<StreamEvent> {
            let (tx, rx) = mpsc::unbounded_channel();
            *self.events.lock().unwrap() = Some(tx);
            self.calls.lock().unwrap().push(format!(
                "open {} {} {}",
                url,
                subscribe.unwrap_or("-"),
                token.unwrap_or("-")
            ));
            rx
        }

        fn close(&mut self) {
            self.calls.lock().unwrap().push("close".into());
        }

        fn subscribe(&mut self, context: &str, _path: &[Value]) {
            self.calls.lock().unwrap().push(format!("subscribe {}", context));
        }

        fn raise_alarm(&mut self, path: &str, _message: Option<&str>, state: Option<&str>) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("raise {} {}", path, state.unwrap_or("-")));
        }

        fn clear_alarm(&mut self, path: &str) {
            self.calls.lock().unwrap().push(format!("clear {}", path));
        }

        fn set_token(&mut self, token: Option<String>) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("token {}", token.unwrap_or_default()));
        }
    }

    #[derive(Clone, Default)]
    struct FakeTrackSource {
        fetches: Arc<AtomicUsize>,
        tracks: Arc<Mutex<Option<TrackMap>>>,
    }

    #[async_trait]
    impl TrackSource for FakeTrackSource {
        async fn fetch_tracks(
            &self,
            _api_url: &str,
            _radius: f64,
            _token: Option<&str>,
        ) -> Result<TrackMap, WorkerError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.tracks
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| WorkerError::Transport("no tracks plugin".into()))
        }
    }

    struct Harness {
        commands: mpsc::Sender<Command>,
        outbound: mpsc::Receiver<Outbound>,
        transport: FakeTransport,
        tracks: FakeTrackSource,
        _worker: JoinHandle<Result<(), WorkerError>>,
    }

    impl Harness {
        fn new(tracks: Option<TrackMap>) -> Self {
            let transport = FakeTransport::default();
            let track_source = FakeTrackSource::default();
            *track_source.tracks.lock().unwrap() = tracks;
            let (cmd_tx, cmd_rx) = mpsc::channel(16);
            let (out_tx, out_rx) = mpsc::channel(64);
            let worker = Worker::new(transport.clone(), track_source.clone(), cmd_rx, out_tx);
            Harness {
                commands: cmd_tx,
                outbound: out_rx,
                transport,
                tracks: track_source,
                _worker: tokio::spawn(worker.run(pending())),
            }
        }

        async fn command(&self, text: &str) {
            let command = Command::parse(text).unwrap();
            self.commands.send(command).await.unwrap();
        }

        fn event(&self, event: StreamEvent) {
            let events = self.transport.events.lock().unwrap();
            // the worker may already have dropped its end
            let _ = events.as_ref().unwrap().send(event);
        }

        async fn next(&mut self) -> Outbound {
            self.outbound.recv().await.unwrap()
        }

        fn calls(&self) -> Vec<String> {
            self.transport.calls.lock().unwrap().clone()
        }

        async fn open_and_hello(&mut self, interval: u64) {
            self.command(&format!(
                r#"{{"cmd":"open","options":{{"url":"ws://host/signalk/v1/stream","subscribe":"none","token":"tok","interval":{}}}}}"#,
                interval
            ))
            .await;
            // let the worker pick up the open
            sleep(Duration::from_millis(1)).await;
            self.event(StreamEvent::Connected);
            assert!(matches!(self.next().await, Outbound::Open { playback: false }));
            self.event(StreamEvent::Message(hello()));
            assert!(matches!(self.next().await, Outbound::Hello { .. }));
        }
    }

    fn hello() -> Value {
        json!({
            "name": "signalk-server",
            "version": "2.0.0",
            "self": "vessels.urn:mrn:imo:mmsi:123456789",
            "roles": ["master", "main"]
        })
    }

    fn position_delta(context: &str, lon: f64, lat: f64) -> Value {
        json!({
            "context": context,
            "updates": [{
                "timestamp": "2024-05-01T10:00:00.000Z",
                "values": [{
                    "path": "navigation.position",
                    "value": {"longitude": lon, "latitude": lat}
                }]
            }]
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_deltas_into_one_update() {
        let mut h = Harness::new(None);
        h.open_and_hello(1000).await;
        let start = Instant::now();

        sleep(Duration::from_millis(100)).await;
        h.event(StreamEvent::Message(position_delta("vessels.urn:mrn:imo:mmsi:111", 1.0, 1.0)));
        sleep(Duration::from_millis(300)).await;
        h.event(StreamEvent::Message(position_delta("vessels.urn:mrn:imo:mmsi:222", 2.0, 2.0)));
        sleep(Duration::from_millis(500)).await;
        h.event(StreamEvent::Message(position_delta("vessels.urn:mrn:imo:mmsi:333", 3.0, 3.0)));

        let Outbound::Update(update) = h.next().await else {
            panic!("expected update");
        };
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1000), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1100), "{:?}", elapsed);
        assert!(!update.playback);
        assert_eq!(update.result.store.ais_targets.len(), 3);
        assert_eq!(update.result.ais_status.updated.len(), 3);

        // nothing new arrived, so the next tick stays quiet
        assert!(timeout(Duration::from_millis(1500), h.outbound.recv())
            .await
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_mode_emits_per_delta() {
        let mut h = Harness::new(None);
        h.open_and_hello(0).await;

        h.event(StreamEvent::Message(position_delta("vessels.urn:mrn:imo:mmsi:111", 1.0, 1.0)));
        let Outbound::Update(update) = h.next().await else {
            panic!("expected update");
        };
        assert_eq!(update.result.ais_status.updated, vec!["vessels.urn:mrn:imo:mmsi:111"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notifications_are_posted() {
        let mut h = Harness::new(None);
        h.open_and_hello(1000).await;

        h.event(StreamEvent::Message(json!({
            "context": "vessels.urn:mrn:imo:mmsi:123456789",
            "updates": [{"values": [{
                "path": "notifications.mob",
                "value": {"state": "emergency", "message": "MOB"}
            }]}]
        })));
        let Outbound::Notification { kind, data, .. } = h.next().await else {
            panic!("expected notification");
        };
        assert_eq!(kind, "mob");
        assert_eq!(data.path, "notifications.mob");
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_command() {
        let mut h = Harness::new(None);
        h.open_and_hello(1000).await;
        h.command(r#"{"cmd":"close"}"#).await;

        assert!(matches!(
            h.next().await,
            Outbound::Close {
                result: true,
                playback: false
            }
        ));
        assert_eq!(h.calls().last().map(String::as_str), Some("close"));

        // a delta after close is never delivered
        h.event(StreamEvent::Message(position_delta("vessels.urn:mrn:imo:mmsi:111", 1.0, 1.0)));
        assert!(timeout(Duration::from_millis(3000), h.outbound.recv())
            .await
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_close() {
        let mut h = Harness::new(None);
        h.open_and_hello(1000).await;
        h.event(StreamEvent::Closed(Some("bye".into())));

        assert!(matches!(
            h.next().await,
            Outbound::Close { result: false, .. }
        ));
        assert!(!h.calls().contains(&"close".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_passes_token_and_subscribe() {
        let mut h = Harness::new(None);
        h.open_and_hello(500).await;
        assert_eq!(h.calls()[0], "open ws://host/signalk/v1/stream none tok");

        // a second open while connected is ignored
        h.command(r#"{"cmd":"open","options":{"url":"ws://other/signalk/v1/stream"}}"#)
            .await;
        sleep(Duration::from_millis(1)).await;
        assert_eq!(
            h.calls().iter().filter(|c| c.starts_with("open")).count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_without_url_is_rejected() {
        let mut h = Harness::new(None);
        for text in [
            r#"{"cmd":"open","options":{"url":""}}"#,
            r#"{"cmd":"open","options":{"subscribe":"none"}}"#,
            r#"{"cmd":"open"}"#,
        ] {
            h.command(text).await;
            let Outbound::Error { result, .. } = h.next().await else {
                panic!("expected error for {}", text);
            };
            assert_eq!(result, "Valid options not provided!");
        }
        assert!(h.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_track_fetch_disables_polling() {
        let mut h = Harness::new(None);
        h.open_and_hello(1000).await;
        sleep(Duration::from_secs(130)).await;
        assert_eq!(h.tracks.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracks_applied_and_polled() {
        let key = "vessels.urn:mrn:imo:mmsi:111";
        let mut fetched = HashMap::new();
        fetched.insert(key.to_string(), vec![vec![[0.0, 0.0], [0.5, 0.5]]]);
        let mut h = Harness::new(Some(fetched));
        h.open_and_hello(1000).await;

        h.event(StreamEvent::Message(position_delta(key, 1.0, 1.0)));
        let Outbound::Update(_) = h.next().await else {
            panic!("expected update");
        };

        // the 60 s poll re-fetches now that the first fetch succeeded
        sleep(Duration::from_secs(61)).await;
        assert_eq!(h.tracks.fetches.load(Ordering::SeqCst), 2);

        h.event(StreamEvent::Message(position_delta(key, 2.0, 2.0)));
        let Outbound::Update(update) = h.next().await else {
            panic!("expected update");
        };
        let track = &update.result.store.ais_targets[key].base.track;
        assert_eq!(track.last_point(), Some([2.0, 2.0]));
        assert_eq!(track.point_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_change_restarts_timer() {
        let mut h = Harness::new(None);
        h.open_and_hello(10_000).await;
        h.command(r#"{"cmd":"settings","options":{"interval":200}}"#).await;
        sleep(Duration::from_millis(1)).await;
        let start = Instant::now();

        h.event(StreamEvent::Message(position_delta("vessels.urn:mrn:imo:mmsi:111", 1.0, 1.0)));
        let Outbound::Update(_) = h.next().await else {
            panic!("expected update");
        };
        assert!(start.elapsed() <= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_vessel_rename_and_alarm() {
        let mut h = Harness::new(None);
        h.open_and_hello(1000).await;
        h.command(r#"{"cmd":"vessel","options":{"context":"self","name":"Boaty"}}"#)
            .await;
        h.command(r#"{"cmd":"alarm","options":{"raise":true,"type":"mob","state":"emergency"}}"#)
            .await;
        h.command(r#"{"cmd":"alarm","options":{"raise":false,"type":"notifications.mob"}}"#)
            .await;
        h.event(StreamEvent::Message(position_delta(
            "vessels.urn:mrn:imo:mmsi:123456789",
            1.0,
            1.0,
        )));

        let Outbound::Update(update) = h.next().await else {
            panic!("expected update");
        };
        assert_eq!(update.result.store.self_vessel.base.name.as_deref(), Some("Boaty"));
        let calls = h.calls();
        assert!(calls.contains(&"raise notifications.mob emergency".to_string()));
        assert!(calls.contains(&"clear notifications.mob".to_string()));
    }
}
