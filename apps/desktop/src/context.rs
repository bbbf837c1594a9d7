//! Application context: owns every component and routes host events.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use voffice_capture::{
    CaptureAcquirer, CaptureError, CaptureOptions, CapturePlatform, SourceEnumerator,
    SourceFallback,
};
use voffice_huddle::{
    EndReason, OfferAnswerFactory, SessionError, SessionEvent, SessionInfo, SessionManager,
    SessionRole, SessionState,
};
use voffice_presence::{HostShell, IDLE_POLL_PERIOD, IdleMonitor, Presence, PresenceFacade};
use voffice_protocol::{
    CaptureSource, MessageType, SignalData, SignalingMessage, SourceKind, SourceKinds,
};
use voffice_settings::{Settings, SettingsError, SettingsStore};
use voffice_signaling::{ChannelEvent, ChannelState, SignalSink, SignalingChannel};
use voffice_tray::{MenuAction, TrayConfig, TrayEvent, TrayHandle, TrayUpdate};

use crate::config::AppConfig;
use crate::host::HostEvent;

const APP_TITLE: &str = "VOffice";

/// Host-provided collaborators.
pub struct Services {
    pub host: Arc<dyn HostShell>,
    pub capture: Arc<dyn CapturePlatform>,
    pub settings: Arc<dyn SettingsStore>,
    /// Outbound path for session messages; the signaling channel when `None`.
    pub sink: Option<Arc<dyn SignalSink>>,
}

/// Tray-loop ends of the tray channels.
pub struct TrayEnds {
    pub events: std::sync::mpsc::Sender<TrayEvent>,
    pub updates: std::sync::mpsc::Receiver<TrayUpdate>,
}

/// Why a huddle could not be started.
#[derive(Debug, thiserror::Error)]
pub enum HuddleError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("no screen available to share")]
    NoSource,

    #[error("capture failed: {0}")]
    Capture(CaptureError),
}

impl HuddleError {
    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            HuddleError::Session(SessionError::Signaling(_)) => {
                "Not connected to the office server. Try again in a moment.".into()
            }
            HuddleError::Session(_) => "The huddle could not be started.".into(),
            HuddleError::NoSource => "No screen is available to share.".into(),
            HuddleError::Capture(e) => e.user_message(),
        }
    }
}

/// Snapshot for the `status` command.
#[derive(Debug, Clone)]
pub struct Status {
    pub presence: Presence,
    pub channel: ChannelState,
    pub session: Option<SessionInfo>,
    pub idle_seconds: u64,
}

pub struct AppContext {
    config: AppConfig,
    settings: Arc<dyn SettingsStore>,
    presence: Arc<PresenceFacade>,
    idle: IdleMonitor,
    enumerator: SourceEnumerator,
    acquirer: Arc<CaptureAcquirer>,
    channel: Arc<SignalingChannel>,
    sessions: Arc<SessionManager>,
    tray: Arc<Mutex<TrayHandle>>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AppContext {
    /// Builds every component and spawns the event pumps. Must be called
    /// inside a tokio runtime. Nothing touches the network until
    /// [`start`](Self::start).
    pub fn init(config: AppConfig, services: Services) -> anyhow::Result<(Self, TrayEnds)> {
        let settings = services.settings.load().unwrap_or_else(|e| {
            warn!(error = %e, "settings unavailable, using defaults");
            Settings::default()
        });
        if let Err(e) = settings.hotkeys.validate() {
            warn!(error = %e, "hotkey settings are invalid, the host will reject them");
        }

        let presence = Arc::new(PresenceFacade::new(
            Arc::clone(&services.host),
            settings.presence,
            settings.notifications,
        ));
        let idle = IdleMonitor::new(Arc::clone(&services.host));

        let fallback = if config.placeholder_sources {
            SourceFallback::Placeholder
        } else {
            SourceFallback::Empty
        };
        let enumerator = SourceEnumerator::new(Arc::clone(&services.capture)).with_fallback(fallback);
        let acquirer = Arc::new(CaptureAcquirer::new(Arc::clone(&services.capture)));

        let channel = Arc::new(SignalingChannel::new(config.reconnect()));
        let sink = match services.sink {
            Some(sink) => sink,
            None => Arc::clone(&channel) as Arc<dyn SignalSink>,
        };
        let factory = Arc::new(OfferAnswerFactory::new(config.ice_servers()));
        let sessions = Arc::new(SessionManager::new(sink, factory));

        let (tray, events, updates) = TrayHandle::new(TrayConfig {
            app_name: APP_TITLE.into(),
            icon_data: None,
            presence: settings.presence,
            auto_start: settings.auto_start,
        });
        let tray = Arc::new(Mutex::new(tray));

        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();
        if let Some(rx) = channel.take_events() {
            tasks.push(tokio::spawn(channel_pump(
                rx,
                Arc::clone(&sessions),
                Arc::clone(&presence),
                cancel.clone(),
            )));
        }
        if let Some(rx) = sessions.take_events() {
            tasks.push(tokio::spawn(session_pump(
                rx,
                Arc::clone(&tray),
                Arc::clone(&presence),
                cancel.clone(),
            )));
        }
        tasks.push(tokio::spawn(presence_pump(
            presence.subscribe(),
            Arc::clone(&tray),
            Arc::clone(&services.settings),
            cancel.clone(),
        )));

        let ctx = Self {
            config,
            settings: services.settings,
            presence,
            idle,
            enumerator,
            acquirer,
            channel,
            sessions,
            tray,
            cancel,
            tasks: Mutex::new(tasks),
        };
        Ok((ctx, TrayEnds { events, updates }))
    }

    /// Starts idle polling and connects to the signaling server. A failed
    /// connection is logged; huddles report it when started.
    pub async fn start(&self) {
        self.idle.start(IDLE_POLL_PERIOD);
        match self.channel.connect(&self.config.signaling_url).await {
            Ok(()) => info!(url = %self.config.signaling_url, "signaling connected"),
            Err(e) => warn!(url = %self.config.signaling_url, error = %e, "signaling unavailable"),
        }
    }

    /// Releases every resource. Safe to call more than once.
    pub async fn shutdown(&self) {
        info!("stopping services...");
        self.leave_huddle().await;
        self.idle.stop();
        self.channel.shutdown().await;
        self.cancel.cancel();
        if let Ok(tray) = self.tray.lock() {
            tray.shutdown();
        }
        let tasks: Vec<_> = self
            .tasks
            .lock()
            .map(|mut t| t.drain(..).collect())
            .unwrap_or_default();
        for task in tasks {
            let _ = task.await;
        }
    }

    /// Cancelled when the user asks to quit.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn poll_tray(&self) -> Option<TrayEvent> {
        self.tray.lock().ok().and_then(|t| t.try_recv_event())
    }

    pub async fn dispatch(&self, event: HostEvent) {
        debug!(?event, "host event");
        match event {
            HostEvent::HuddleHotkey => {
                if self.sessions.is_live().await {
                    self.leave_huddle().await;
                } else {
                    self.start_huddle_or_notify(None).await;
                }
            }
            HostEvent::MuteHotkey => {
                self.toggle_mute().await;
            }
            HostEvent::PresenceChanged(p) => {
                self.presence.set_presence(p);
            }
            HostEvent::Suspend => {
                self.presence.set_presence(Presence::Away);
                if self.leave_huddle().await {
                    info!("huddle ended for system suspend");
                }
            }
            HostEvent::Lock => {
                self.presence.set_presence(Presence::Away);
            }
            HostEvent::Resume | HostEvent::Unlock => {
                self.presence.set_presence(Presence::Online);
            }
            HostEvent::Tray(action) => self.on_tray_action(action).await,
        }
    }

    async fn on_tray_action(&self, action: MenuAction) {
        match action {
            MenuAction::TogglePresence => {
                self.presence.toggle_presence();
            }
            MenuAction::ToggleWindow => {
                if let Ok(mut tray) = self.tray.lock() {
                    let visible = !tray.state().window_visible;
                    tray.set_window_visible(visible);
                }
            }
            MenuAction::StartHuddle => self.start_huddle_or_notify(None).await,
            MenuAction::LeaveHuddle => {
                self.leave_huddle().await;
            }
            MenuAction::ToggleAutoStart => {
                match self
                    .settings
                    .update(&mut |s: &mut Settings| s.auto_start = !s.auto_start)
                {
                    Ok(s) => {
                        info!(enabled = s.auto_start, "auto-start changed");
                        if let Ok(mut tray) = self.tray.lock() {
                            tray.set_auto_start(s.auto_start);
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to save auto-start setting"),
                }
            }
            MenuAction::Quit => {
                info!("quit requested via tray");
                self.cancel.cancel();
            }
        }
    }

    async fn start_huddle_or_notify(&self, source: Option<&str>) {
        if let Err(e) = self.start_huddle(source).await {
            warn!(error = %e, "huddle not started");
            self.presence.notify(APP_TITLE, &e.user_message()).await;
        }
    }

    /// Starts a huddle sharing `source`, or the first screen when `None`.
    ///
    /// A capture failure ends the session it was acquired for.
    pub async fn start_huddle(&self, source: Option<&str>) -> Result<u64, HuddleError> {
        let generation = self.sessions.start_session(SessionRole::Initiator).await?;
        self.presence.notify(APP_TITLE, "Huddle started").await;

        let source_id = match source {
            Some(id) => id.to_string(),
            None => {
                let screens = self
                    .enumerator
                    .list_sources_or_fallback(SourceKinds::only(SourceKind::Screen))
                    .await;
                match screens.into_iter().next() {
                    Some(s) => s.id,
                    None => {
                        self.sessions
                            .on_acquisition_failed(
                                generation,
                                CaptureError::SourceNotFound("screen".into()),
                            )
                            .await;
                        return Err(HuddleError::NoSource);
                    }
                }
            }
        };

        let options = CaptureOptions {
            audio: self.config.share_audio,
        };
        let stream = match self.acquirer.acquire(&source_id, options).await {
            Ok(stream) => stream,
            Err(e) => {
                self.sessions
                    .on_acquisition_failed(generation, e.clone())
                    .await;
                return Err(HuddleError::Capture(e));
            }
        };
        self.sessions
            .attach_local_stream_to(generation, stream)
            .await?;
        info!(generation, source = %source_id, "huddle started");
        Ok(generation)
    }

    /// Ends the current huddle. Returns `false` if there was none.
    pub async fn leave_huddle(&self) -> bool {
        let ended = self.sessions.end().await;
        self.acquirer.release_all();
        ended
    }

    /// Flips the microphone. Returns `false` without a shared stream.
    pub async fn toggle_mute(&self) -> bool {
        let muted = !self.sessions.is_muted().await;
        self.sessions.set_muted(muted).await
    }

    /// Shows a notification so the user can check they arrive.
    pub async fn test_notification(&self) -> bool {
        self.presence.notify(APP_TITLE, "Test notification").await
    }

    /// Settings as currently persisted.
    pub fn settings(&self) -> Result<Settings, SettingsError> {
        self.settings.load()
    }

    /// Saves a full settings edit and applies it. A rejected hotkey leaves
    /// both the file and the running state untouched.
    pub fn update_settings(&self, settings: Settings) -> Result<Settings, SettingsError> {
        let (huddle, mute) = settings.hotkeys.validate()?;
        self.settings.save(&settings)?;
        self.presence
            .set_notifications_enabled(settings.notifications);
        self.presence.set_presence(settings.presence);
        if let Ok(mut tray) = self.tray.lock() {
            tray.set_auto_start(settings.auto_start);
        }
        info!(
            %huddle,
            %mute,
            notifications = settings.notifications,
            auto_start = settings.auto_start,
            "settings updated"
        );
        Ok(settings)
    }

    pub async fn list_sources(&self) -> Vec<CaptureSource> {
        self.enumerator
            .list_sources_or_fallback(SourceKinds::all())
            .await
    }

    pub async fn status(&self) -> Status {
        Status {
            presence: self.presence.presence(),
            channel: self.channel.state(),
            session: self.sessions.snapshot().await,
            idle_seconds: self.idle.idle_seconds(),
        }
    }
}

/// Feeds signaling traffic into the session manager.
async fn channel_pump(
    mut rx: mpsc::Receiver<ChannelEvent>,
    sessions: Arc<SessionManager>,
    presence: Arc<PresenceFacade>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            ev = rx.recv() => match ev {
                Some(ev) => ev,
                None => break,
            },
        };
        match event {
            ChannelEvent::Message(msg) => route_signal(&sessions, &presence, msg).await,
            ChannelEvent::StateChanged(ChannelState::Disconnected) => {
                if sessions.on_channel_closed().await {
                    warn!("huddle ended: signaling connection lost");
                }
            }
            ChannelEvent::StateChanged(state) => debug!(?state, "signaling state"),
            ChannelEvent::Reconnecting {
                attempt,
                next_retry_secs,
            } => info!(attempt, next_retry_secs, "reconnecting to signaling server"),
            ChannelEvent::GaveUp { attempts } => {
                warn!(attempts, "signaling server unreachable, giving up");
                sessions.on_channel_closed().await;
            }
        }
    }
    debug!("channel pump stopped");
}

/// Routes one inbound message. An offer with no huddle running answers it
/// as a new responder session.
async fn route_signal(sessions: &SessionManager, presence: &PresenceFacade, msg: SignalingMessage) {
    let is_offer = msg.msg_type == MessageType::Signal
        && matches!(msg.parse_data(), Ok(Some(SignalData::Offer { .. })));
    if is_offer && !sessions.is_live().await {
        match sessions.start_session(SessionRole::Responder).await {
            Ok(generation) => {
                info!(generation, "incoming huddle");
                presence.notify(APP_TITLE, "Incoming huddle").await;
            }
            Err(e) => {
                warn!(error = %e, "could not answer incoming huddle");
                return;
            }
        }
    }
    if !sessions.on_remote_signal(msg).await {
        debug!("signal discarded");
    }
}

/// Mirrors session state into the tray and the user's notifications.
///
/// Streams are released by the session manager when a session ends; events
/// for a replaced session can arrive after its successor attached capture.
async fn session_pump(
    mut rx: mpsc::UnboundedReceiver<SessionEvent>,
    tray: Arc<Mutex<TrayHandle>>,
    presence: Arc<PresenceFacade>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            ev = rx.recv() => match ev {
                Some(ev) => ev,
                None => break,
            },
        };
        match event {
            SessionEvent::StateChanged { state, .. } => {
                let in_huddle = matches!(state, SessionState::Negotiating | SessionState::Connected);
                if let Ok(mut t) = tray.lock() {
                    t.set_in_huddle(in_huddle);
                }
            }
            SessionEvent::RemoteStream { generation, stream } => {
                info!(
                    generation,
                    remote = %stream.id,
                    video = stream.has_video(),
                    "remote media available"
                );
            }
            SessionEvent::Ended { generation, reason } => {
                match reason {
                    EndReason::RemoteBye => {
                        presence.notify(APP_TITLE, "The other side left the huddle").await;
                    }
                    EndReason::ChannelClosed => {
                        presence.notify(APP_TITLE, "Huddle ended: connection lost").await;
                    }
                    other => debug!(generation, reason = ?other, "huddle ended"),
                }
            }
            SessionEvent::MuteChanged { muted, .. } => info!(muted, "microphone"),
        }
    }
    debug!("session pump stopped");
}

/// Mirrors presence into the tray and persists it.
async fn presence_pump(
    mut rx: watch::Receiver<Presence>,
    tray: Arc<Mutex<TrayHandle>>,
    settings: Arc<dyn SettingsStore>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
        let presence = *rx.borrow_and_update();
        if let Ok(mut t) = tray.lock() {
            t.set_presence(presence);
        }
        if let Err(e) = settings.update(&mut |s: &mut Settings| s.presence = presence) {
            warn!(error = %e, "failed to persist presence");
        }
    }
    debug!("presence pump stopped");
}
