//! Device Session
//!
//! Drives one cube connection: connect, baseline read, subscription,
//! and the battery / move count / reset exchanges. Every notification is
//! handled to completion by [`DeviceSession::pump`], one at a time, so
//! the session state needs no locking.

use crate::domain::cube::{BaselineCheck, CubeStateModel};
use crate::domain::events::{EventBus, Handler, Publisher, Subscriber};
use crate::domain::models::{BatteryReading, CubeEvent, EventKind, RawState, SessionState};
use crate::domain::notation::CubeView;
use crate::infrastructure::bluetooth::connection::{
    ConnectionConfig, CubeChannels, CubeConnection,
};
use crate::infrastructure::bluetooth::protocol::{self, CubeCommand, DecodeError, InfoResponse};
use crate::infrastructure::bluetooth::transport::{
    Monitor, Notification, Transport, TransportError,
};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("service {0} not found")]
    ServiceNotFound(Uuid),

    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("not connected")]
    NotConnected,

    #[error("info monitor closed before a response arrived")]
    MonitorClosed,

    #[error("no info response within {0:?}")]
    InfoTimeout(Duration),
}

/// Whether the next state notification acknowledges a reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResetAck {
    Idle,
    AwaitingResetAck,
}

/// Outcome of one [`DeviceSession::pump`] step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activity {
    /// An event was published
    Published(CubeEvent),
    /// The first notification repeated the baseline read
    EchoSuppressed,
    /// The notification carried an error, failed to decode or was not
    /// meant for an active monitor
    Dropped,
    /// A monitor stopped delivering
    MonitorClosed,
}

enum Wake {
    State(Option<Notification>),
    Info(CubeCommand, Option<Notification>),
    LinkDropped,
}

/// One connection to a Giiker cube
pub struct DeviceSession<T: Transport> {
    transport: T,
    config: ConnectionConfig,
    bus: EventBus,
    model: CubeStateModel,
    state: SessionState,
    channels: Option<CubeChannels>,
    baseline_check: BaselineCheck,
    reset: ResetAck,
    state_monitor: Option<Monitor>,
    battery_monitor: Option<Monitor>,
    move_count_monitor: Option<Monitor>,
    disconnect_rx: Option<oneshot::Receiver<()>>,
}

impl<T: Transport> DeviceSession<T> {
    pub fn new(transport: T, config: ConnectionConfig) -> Self {
        Self {
            transport,
            config,
            bus: EventBus::new(),
            model: CubeStateModel::new(),
            state: SessionState::Disconnected,
            channels: None,
            baseline_check: BaselineCheck::Cleared,
            reset: ResetAck::Idle,
            state_monitor: None,
            battery_monitor: None,
            move_count_monitor: None,
            disconnect_rx: None,
        }
    }

    /// Connect to the cube, read its state and start listening for moves.
    ///
    /// On failure the connection is torn down and the error returned; there
    /// is no retry.
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        self.state = SessionState::Connecting;

        if let Err(e) = self.establish().await {
            error!("Connection failed: {}", e);
            self.disconnect().await;
            return Err(e);
        }

        self.state = SessionState::Connected;
        info!("Cube connected");
        self.bus.publish(&CubeEvent::Connected);
        Ok(())
    }

    async fn establish(&mut self) -> Result<(), SessionError> {
        let connection = CubeConnection::new(&self.config);
        connection.open(&mut self.transport).await?;

        self.state = SessionState::Discovering;
        let result = connection.discover(&mut self.transport).await?;

        let frame = protocol::decode_state(&result.baseline)?;
        self.model.apply(frame.state);
        self.baseline_check = BaselineCheck::Pending(result.baseline);

        let monitor = self.transport.monitor(result.channels.state_response).await?;
        self.state_monitor = Some(monitor);
        self.disconnect_rx = Some(self.transport.on_disconnected()?);
        self.channels = Some(result.channels);
        Ok(())
    }

    /// Ask the transport to drop the link. `disconnected` is published once
    /// the transport reports the link as gone.
    pub async fn disconnect(&mut self) {
        if matches!(
            self.state,
            SessionState::Disconnected | SessionState::Disconnecting
        ) {
            return;
        }

        self.state = SessionState::Disconnecting;
        if let Err(e) = self.transport.cancel_connection().await {
            warn!("Cancelling connection failed: {}", e);
        }

        // Without a disconnect subscription nobody will report back
        if self.disconnect_rx.is_none() {
            self.teardown();
        }
    }

    fn teardown(&mut self) {
        self.state_monitor = None;
        self.battery_monitor = None;
        self.move_count_monitor = None;
        self.disconnect_rx = None;
        self.channels = None;
        self.baseline_check = BaselineCheck::Cleared;
        self.reset = ResetAck::Idle;
        self.model.clear();
        self.state = SessionState::Disconnected;
    }

    /// Wait for the next notification or link event and handle it.
    ///
    /// Returns `None` once nothing is left to wait for.
    pub async fn pump(&mut self) -> Option<Activity> {
        if self.state_monitor.is_none()
            && self.battery_monitor.is_none()
            && self.move_count_monitor.is_none()
            && self.disconnect_rx.is_none()
        {
            return None;
        }

        let wake = tokio::select! {
            biased;
            n = next_notification(&mut self.state_monitor) => Wake::State(n),
            n = next_notification(&mut self.battery_monitor) => {
                Wake::Info(CubeCommand::Battery, n)
            }
            n = next_notification(&mut self.move_count_monitor) => {
                Wake::Info(CubeCommand::MoveCount, n)
            }
            _ = link_dropped(&mut self.disconnect_rx) => Wake::LinkDropped,
        };

        let activity = match wake {
            Wake::State(Some(notification)) => self.handle_state_notification(notification),
            Wake::State(None) => {
                warn!("State monitor closed");
                self.state_monitor = None;
                Activity::MonitorClosed
            }
            Wake::Info(command, Some(notification)) => {
                self.handle_info_notification(command, notification)
            }
            Wake::Info(command, None) => {
                debug!("{:?} monitor closed", command);
                *self.info_monitor_slot(command) = None;
                Activity::MonitorClosed
            }
            Wake::LinkDropped => {
                info!("Cube disconnected");
                self.teardown();
                self.publish(CubeEvent::Disconnected)
            }
        };
        Some(activity)
    }

    /// Handle notifications until the session is disconnected
    pub async fn run(&mut self) {
        while self.pump().await.is_some() {}
    }

    fn handle_state_notification(&mut self, notification: Notification) -> Activity {
        let bytes = match notification {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Dropping state notification: {}", e);
                return Activity::Dropped;
            }
        };

        if self.baseline_check.is_echo(&bytes) {
            debug!("Ignoring echo of the baseline read");
            return Activity::EchoSuppressed;
        }

        let frame = match protocol::decode_state(&bytes) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping undecodable state frame {:02X?}: {}", bytes, e);
                return Activity::Dropped;
            }
        };
        self.model.apply(frame.state);

        let reset = std::mem::replace(&mut self.reset, ResetAck::Idle);
        let event = match (reset, frame.moves.into_iter().next()) {
            (ResetAck::AwaitingResetAck, _) => CubeEvent::UpdateState,
            (ResetAck::Idle, Some(m)) => CubeEvent::Move(m),
            (ResetAck::Idle, None) => CubeEvent::UpdateState,
        };
        debug!("State notification -> {}", event.kind());
        self.publish(event)
    }

    fn handle_info_notification(
        &mut self,
        command: CubeCommand,
        notification: Notification,
    ) -> Activity {
        match notification {
            Ok(bytes) => match matching_info_response(command, &bytes) {
                Some(response) => self.publish(info_event(response)),
                None => Activity::Dropped,
            },
            Err(e) => {
                debug!("Dropping info notification: {}", e);
                Activity::Dropped
            }
        }
    }

    fn publish(&self, event: CubeEvent) -> Activity {
        self.bus.publish(&event);
        Activity::Published(event)
    }

    fn info_monitor_slot(&mut self, command: CubeCommand) -> &mut Option<Monitor> {
        match command {
            CubeCommand::Battery => &mut self.battery_monitor,
            _ => &mut self.move_count_monitor,
        }
    }

    /// Request the battery level.
    ///
    /// With `stop_after_first` false the info subscription stays alive and
    /// later battery frames are published by [`pump`](Self::pump) until
    /// [`stop_battery_monitor`](Self::stop_battery_monitor) is called.
    pub async fn get_battery_level(
        &mut self,
        stop_after_first: bool,
    ) -> Result<BatteryReading, SessionError> {
        match self.request_info(CubeCommand::Battery, stop_after_first).await? {
            InfoResponse::Battery(reading) => Ok(reading),
            InfoResponse::MoveCount(_) => {
                Err(DecodeError::UnknownInfoTag(CubeCommand::MoveCount.as_byte()).into())
            }
        }
    }

    /// Request the lifetime move count. Monitoring works as for
    /// [`get_battery_level`](Self::get_battery_level).
    pub async fn get_move_count(&mut self, stop_after_first: bool) -> Result<u32, SessionError> {
        match self.request_info(CubeCommand::MoveCount, stop_after_first).await? {
            InfoResponse::MoveCount(count) => Ok(count),
            InfoResponse::Battery(_) => {
                Err(DecodeError::UnknownInfoTag(CubeCommand::Battery.as_byte()).into())
            }
        }
    }

    async fn request_info(
        &mut self,
        command: CubeCommand,
        stop_after_first: bool,
    ) -> Result<InfoResponse, SessionError> {
        let channels = self.connected_channels()?;

        // A new request replaces the kept monitor of the same kind
        if self.info_monitor_slot(command).take().is_some() {
            debug!("Replacing {:?} monitor", command);
        }

        // Subscribe before writing so the answer cannot slip past
        let mut monitor = self.transport.monitor(channels.info_response).await?;
        self.transport
            .write_without_response(channels.info_request, &command.as_bytes())
            .await?;
        debug!("Sent {:?} request", command);

        let response = match self.config.info_request_timeout {
            Some(limit) => tokio::time::timeout(limit, await_info(&mut monitor, command))
                .await
                .map_err(|_| SessionError::InfoTimeout(limit))??,
            None => await_info(&mut monitor, command).await?,
        };

        self.publish(info_event(response));

        if !stop_after_first {
            *self.info_monitor_slot(command) = Some(monitor);
        }
        Ok(response)
    }

    pub fn stop_battery_monitor(&mut self) -> bool {
        self.battery_monitor.take().is_some()
    }

    pub fn stop_move_count_monitor(&mut self) -> bool {
        self.move_count_monitor.take().is_some()
    }

    /// Tell the cube its current physical state is solved. The next state
    /// notification is reported as `update state` rather than a move.
    ///
    /// A second call before that notification arrives is not guarded
    /// against; an intervening genuine move is then reported as
    /// `update state`.
    pub async fn reset_solved(&mut self) -> Result<(), SessionError> {
        let channels = self.connected_channels()?;
        self.transport
            .write_without_response(
                channels.info_request,
                &CubeCommand::ResetSolved.as_bytes(),
            )
            .await?;
        self.reset = ResetAck::AwaitingResetAck;
        info!("Cube reset to solved");
        Ok(())
    }

    fn connected_channels(&self) -> Result<CubeChannels, SessionError> {
        match (self.state, self.channels) {
            (SessionState::Connected, Some(channels)) => Ok(channels),
            _ => Err(SessionError::NotConnected),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub fn raw_state(&self) -> Option<&RawState> {
        self.model.raw()
    }

    pub fn cube_view(&self) -> Option<CubeView> {
        self.model.view()
    }

    pub fn face_string(&self) -> Option<String> {
        self.model.face_string()
    }
}

impl<T: Transport> Subscriber for DeviceSession<T> {
    fn subscribe(&mut self, kind: EventKind, handler: Handler) {
        self.bus.subscribe(kind, handler);
    }

    fn unsubscribe(&mut self, kind: EventKind, handler: &Handler) -> bool {
        self.bus.unsubscribe(kind, handler)
    }
}

async fn next_notification(monitor: &mut Option<Monitor>) -> Option<Notification> {
    match monitor {
        Some(monitor) => monitor.next().await,
        None => std::future::pending().await,
    }
}

async fn link_dropped(receiver: &mut Option<oneshot::Receiver<()>>) {
    match receiver {
        Some(receiver) => {
            let _ = receiver.await;
        }
        None => std::future::pending().await,
    }
}

/// Parse `bytes` if it answers `command`; frames for other requests share
/// the characteristic and are skipped
fn matching_info_response(command: CubeCommand, bytes: &[u8]) -> Option<InfoResponse> {
    if protocol::info_tag(bytes) != Some(command.as_byte()) {
        return None;
    }
    match protocol::parse_info_frame(bytes) {
        Ok(response) => Some(response),
        Err(e) => {
            warn!("Dropping malformed info frame {:02X?}: {}", bytes, e);
            None
        }
    }
}

async fn await_info(
    monitor: &mut Monitor,
    command: CubeCommand,
) -> Result<InfoResponse, SessionError> {
    loop {
        match monitor.next().await {
            Some(Ok(bytes)) => {
                if let Some(response) = matching_info_response(command, &bytes) {
                    return Ok(response);
                }
            }
            Some(Err(e)) => debug!("Dropping info notification: {}", e),
            None => return Err(SessionError::MonitorClosed),
        }
    }
}

fn info_event(response: InfoResponse) -> CubeEvent {
    match response {
        InfoResponse::Battery(reading) => CubeEvent::Battery(reading),
        InfoResponse::MoveCount(count) => CubeEvent::MoveCount(count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::channel_handler;
    use crate::domain::models::{ChargingState, Face};
    use crate::infrastructure::bluetooth::connection::cube_services;
    use crate::infrastructure::bluetooth::protocol::fixtures::{
        pack_state, solved_with_moves, SOLVED,
    };
    use crate::infrastructure::bluetooth::replay::{ReplayHandle, ReplayTransport};
    use tokio::sync::mpsc;

    const SOLVED_STRING: &str = "UUUUUUUUURRRRRRRRRFFFFFFFFFDDDDDDDDDLLLLLLLLLBBBBBBBBB";

    struct Harness {
        session: DeviceSession<ReplayTransport>,
        replay: ReplayHandle,
        events: mpsc::UnboundedReceiver<CubeEvent>,
    }

    impl Harness {
        fn from_transport(transport: ReplayTransport, config: ConnectionConfig) -> Self {
            let replay = transport.handle();
            let mut session = DeviceSession::new(transport, config);

            let (tx, events) = mpsc::unbounded_channel();
            let forward = channel_handler(tx);
            for kind in [
                EventKind::Connected,
                EventKind::Disconnected,
                EventKind::Move,
                EventKind::Battery,
                EventKind::MoveCount,
                EventKind::UpdateState,
            ] {
                session.subscribe(kind, forward.clone());
            }

            Self {
                session,
                replay,
                events,
            }
        }

        fn new(baseline: Vec<u8>) -> Self {
            let config = ConnectionConfig::default();
            Self::from_transport(ReplayTransport::new(&config, baseline), config)
        }

        async fn connected_with(config: ConnectionConfig) -> Self {
            let transport = ReplayTransport::new(&config, SOLVED.to_vec());
            let mut harness = Self::from_transport(transport, config);
            harness.session.connect().await.unwrap();
            assert_eq!(harness.next_event(), Some(CubeEvent::Connected));
            harness
        }

        async fn connected() -> Self {
            Self::connected_with(ConnectionConfig::default()).await
        }

        fn next_event(&mut self) -> Option<CubeEvent> {
            self.events.try_recv().ok()
        }
    }

    fn notation_of(activity: Option<Activity>) -> String {
        match activity {
            Some(Activity::Published(CubeEvent::Move(m))) => m.notation,
            other => panic!("expected a move, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_reads_baseline() {
        let mut h = Harness::connected().await;
        assert!(h.session.is_connected());
        assert_eq!(h.session.state(), SessionState::Connected);
        assert_eq!(h.session.face_string().as_deref(), Some(SOLVED_STRING));
        assert_eq!(h.session.raw_state(), Some(&RawState::solved()));
        assert_eq!(h.next_event(), None);
    }

    #[tokio::test]
    async fn test_baseline_echo_is_suppressed_once() {
        let mut h = Harness::connected().await;
        h.replay.push_state(SOLVED.to_vec());
        h.replay.push_state(solved_with_moves(&[0x51]));
        h.replay.push_state(SOLVED.to_vec());

        assert_eq!(h.session.pump().await, Some(Activity::EchoSuppressed));
        assert_eq!(h.next_event(), None);

        assert_eq!(notation_of(h.session.pump().await), "R");
        match h.next_event() {
            Some(CubeEvent::Move(m)) => {
                assert_eq!(m.face, Face::R);
                assert_eq!(m.amount(), 1);
            }
            other => panic!("expected move event, got {other:?}"),
        }
        assert_eq!(h.next_event(), None);

        // Identical bytes later on are no longer treated as an echo
        assert_eq!(
            h.session.pump().await,
            Some(Activity::Published(CubeEvent::UpdateState))
        );
    }

    #[tokio::test]
    async fn test_first_distinct_notification_is_a_move() {
        let mut h = Harness::connected().await;
        h.replay.push_state(solved_with_moves(&[0x23, 0x51]));
        assert_eq!(notation_of(h.session.pump().await), "D'");
    }

    #[tokio::test]
    async fn test_move_updates_state() {
        let mut h = Harness::connected().await;
        let mut flips = [false; 12];
        flips[0] = true;
        flips[1] = true;
        let mut frame = pack_state(
            &[2, 1, 3, 4, 5, 6, 7, 8],
            &[3; 8],
            &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
            &flips,
        );
        frame.push(0x41);
        h.replay.push_state(frame);

        assert_eq!(notation_of(h.session.pump().await), "U");
        assert_eq!(h.session.raw_state().unwrap().corner_positions()[0], 2);
        assert_ne!(h.session.face_string().as_deref(), Some(SOLVED_STRING));
        let view = h.session.cube_view().unwrap();
        assert_eq!(view.edges[0].colors[0].face(), Face::D);
    }

    #[tokio::test]
    async fn test_reset_acknowledged_by_next_notification() {
        let mut h = Harness::connected().await;
        h.replay.push_state(solved_with_moves(&[0x51]));
        h.session.pump().await;
        h.next_event();

        h.session.reset_solved().await.unwrap();
        let writes = h.replay.writes();
        assert_eq!(writes.last().map(|(_, v)| v.clone()), Some(vec![0xA1]));

        h.replay.push_state(solved_with_moves(&[0x13]));
        h.replay.push_state(solved_with_moves(&[0x62]));

        assert_eq!(
            h.session.pump().await,
            Some(Activity::Published(CubeEvent::UpdateState))
        );
        assert_eq!(h.next_event(), Some(CubeEvent::UpdateState));
        assert_eq!(notation_of(h.session.pump().await), "F2");
    }

    #[tokio::test]
    async fn test_transport_error_notification_is_dropped() {
        let mut h = Harness::connected().await;
        h.replay.push_state_error("link layer hiccup");
        h.replay.push_state(SOLVED.to_vec());

        assert_eq!(h.session.pump().await, Some(Activity::Dropped));
        assert_eq!(h.next_event(), None);
        // The echo check was not consumed by the failed notification
        assert_eq!(h.session.pump().await, Some(Activity::EchoSuppressed));
    }

    #[tokio::test]
    async fn test_undecodable_notification_is_dropped() {
        let mut h = Harness::connected().await;
        h.replay.push_state(vec![0x12, 0x34]);
        h.replay.push_state(solved_with_moves(&[0x70]));

        assert_eq!(h.session.pump().await, Some(Activity::Dropped));
        assert_eq!(h.session.pump().await, Some(Activity::Dropped));
        assert_eq!(h.next_event(), None);
        assert_eq!(h.session.face_string().as_deref(), Some(SOLVED_STRING));
    }

    #[tokio::test]
    async fn test_battery_request_stops_after_first() {
        let mut h = Harness::connected().await;
        h.replay.respond_to(0xB5, vec![0xCC, 0, 0, 0, 9]);
        h.replay.respond_to(0xB5, vec![0xB5, 64, 2]);

        let reading = h.session.get_battery_level(true).await.unwrap();
        assert_eq!(reading.level, 64);
        assert_eq!(reading.charging_state, ChargingState::Charging);
        assert_eq!(h.next_event(), Some(CubeEvent::Battery(reading)));
        assert_eq!(h.replay.active_info_monitors(), 0);

        let (_, written) = h.replay.writes().pop().unwrap();
        assert_eq!(written, vec![0xB5]);
    }

    #[tokio::test]
    async fn test_move_count_monitor_stays_active() {
        let mut h = Harness::connected().await;
        h.replay.respond_to(0xCC, vec![0xCC, 0x00, 0x00, 0x01, 0x00]);

        assert_eq!(h.session.get_move_count(false).await, Ok(256));
        assert_eq!(h.next_event(), Some(CubeEvent::MoveCount(256)));
        assert_eq!(h.replay.active_info_monitors(), 1);

        h.replay.push_info(vec![0xB5, 10, 3]);
        h.replay.push_info(vec![0xCC, 0x00, 0x00, 0x01, 0x01]);
        assert_eq!(h.session.pump().await, Some(Activity::Dropped));
        assert_eq!(
            h.session.pump().await,
            Some(Activity::Published(CubeEvent::MoveCount(257)))
        );

        assert!(h.session.stop_move_count_monitor());
        assert!(!h.session.stop_move_count_monitor());
        assert_eq!(h.replay.active_info_monitors(), 0);
    }

    #[tokio::test]
    async fn test_repeated_request_replaces_monitor() {
        let mut h = Harness::connected().await;
        h.replay.respond_to(0xCC, vec![0xCC, 0x00, 0x00, 0x00, 0x07]);

        assert_eq!(h.session.get_move_count(false).await, Ok(7));
        assert_eq!(h.session.get_move_count(false).await, Ok(7));
        assert_eq!(h.next_event(), Some(CubeEvent::MoveCount(7)));
        assert_eq!(h.next_event(), Some(CubeEvent::MoveCount(7)));
        assert_eq!(h.next_event(), None);
        assert_eq!(h.replay.active_info_monitors(), 1);

        // One frame, one event
        h.replay.push_info(vec![0xCC, 0x00, 0x00, 0x00, 0x08]);
        assert_eq!(
            h.session.pump().await,
            Some(Activity::Published(CubeEvent::MoveCount(8)))
        );
        assert_eq!(h.next_event(), Some(CubeEvent::MoveCount(8)));
        assert_eq!(h.next_event(), None);

        assert_eq!(h.session.get_move_count(true).await, Ok(7));
        assert_eq!(h.next_event(), Some(CubeEvent::MoveCount(7)));
        assert_eq!(h.replay.active_info_monitors(), 0);
        assert!(!h.session.stop_move_count_monitor());
    }

    #[tokio::test]
    async fn test_info_request_timeout() {
        let config = ConnectionConfig {
            info_request_timeout: Some(Duration::from_millis(20)),
            ..ConnectionConfig::default()
        };
        let mut h = Harness::connected_with(config).await;
        assert_eq!(
            h.session.get_battery_level(true).await,
            Err(SessionError::InfoTimeout(Duration::from_millis(20)))
        );
        assert_eq!(h.next_event(), None);
    }

    #[tokio::test]
    async fn test_requests_require_connection() {
        let mut h = Harness::new(SOLVED.to_vec());
        assert_eq!(
            h.session.get_battery_level(true).await,
            Err(SessionError::NotConnected)
        );
        assert_eq!(h.session.reset_solved().await, Err(SessionError::NotConnected));
        assert_eq!(h.session.pump().await, None);
    }

    #[tokio::test]
    async fn test_connect_failure_tears_down() {
        let config = ConnectionConfig::default();
        let mut services = cube_services(&config);
        services.truncate(1);
        let transport = ReplayTransport::new(&config, SOLVED.to_vec()).with_services(services);
        let mut h = Harness::from_transport(transport, config.clone());

        assert_eq!(
            h.session.connect().await,
            Err(SessionError::ServiceNotFound(config.info_service))
        );
        assert!(h.replay.cancelled());
        assert_eq!(h.session.state(), SessionState::Disconnected);
        assert!(h.session.raw_state().is_none());
        assert_eq!(h.next_event(), None);
    }

    #[tokio::test]
    async fn test_transport_connect_failure() {
        let config = ConnectionConfig::default();
        let transport =
            ReplayTransport::new(&config, SOLVED.to_vec()).failing_connect("out of range");
        let mut h = Harness::from_transport(transport, config);

        assert!(matches!(
            h.session.connect().await,
            Err(SessionError::Transport(TransportError::Connect(_)))
        ));
        assert!(!h.session.is_connected());
    }

    #[tokio::test]
    async fn test_bad_baseline_fails_connect() {
        let mut h = Harness::new(vec![0u8; 8]);
        assert!(matches!(
            h.session.connect().await,
            Err(SessionError::Decode(DecodeError::FrameTooShort { .. }))
        ));
        assert!(h.replay.cancelled());
    }

    #[tokio::test]
    async fn test_disconnect_publishes_after_link_drops() {
        let mut h = Harness::connected().await;
        h.session.disconnect().await;
        assert_eq!(h.session.state(), SessionState::Disconnecting);
        assert_eq!(h.next_event(), None);

        assert_eq!(
            h.session.pump().await,
            Some(Activity::Published(CubeEvent::Disconnected))
        );
        assert_eq!(h.next_event(), Some(CubeEvent::Disconnected));
        assert_eq!(h.session.state(), SessionState::Disconnected);
        assert!(h.session.face_string().is_none());
        assert_eq!(h.session.pump().await, None);
    }

    #[tokio::test]
    async fn test_device_initiated_disconnect() {
        let mut h = Harness::connected().await;
        h.replay.push_state(solved_with_moves(&[0x51]));
        h.replay.drop_link();

        h.session.run().await;
        assert_eq!(h.next_event().map(|e| e.kind()), Some(EventKind::Move));
        assert_eq!(h.next_event(), Some(CubeEvent::Disconnected));
        assert!(!h.session.is_connected());
    }
}
