//! Per-room event loop behind [`RoomTimerController::subscribe`].
//!
//! One task per subscription multiplexes the timer and alarm feeds, the tick
//! schedule, in-flight flag writes and local acknowledgments, so every state
//! change for a room happens on a single logical thread.

use std::{
    collections::VecDeque,
    pin::Pin,
    task::{Context, Poll},
};

use futures::{
    Stream, StreamExt,
    future::BoxFuture,
    stream::{BoxStream, FuturesUnordered},
};
use serde::Serialize;
use serde_json::Value;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Interval, MissedTickBehavior, interval},
};
use tracing::{debug, info, warn};

use crate::{
    dao::{
        models::{RoomTimerState, alarm_flag_from_value},
        room_store::{ConnectionStatus, RoomPath, StoreEvent},
        storage::StorageResult,
    },
    error::TimerError,
    services::{
        alert::{AckHandle, Alert},
        room_timer::{RoomTimerController, raised_alarm_value},
    },
    state::{
        alarm::{AlarmEvent, AlarmMachine, AlarmPhase},
        countdown::{CountdownPhase, CountdownView, CycleKey, ExpiryTracker, Observation, compute},
        room::RoomCode,
    },
};

/// Events a subscriber may fall behind by before views start being coalesced.
const EVENT_BUFFER: usize = 32;

/// Event delivered to a room subscriber.
#[derive(Debug)]
pub enum RoomEvent {
    /// Freshly derived countdown view (after a store change or a tick).
    View(CountdownView),
    /// The countdown expired; emitted at most once per cycle.
    Expired(ExpiryNotice),
    /// The link to the shared store changed; the last known state keeps being served.
    Status(ConnectionStatus),
    /// A write issued by the subscription itself failed and will not be retried.
    WriteFailed(TimerError),
}

/// Why a subscriber is being told about an expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryOrigin {
    /// This client watched the countdown reach zero.
    FallingEdge,
    /// This client arrived after expiry while the room's alarm was still raised.
    AlarmInProgress,
}

/// Details of an expiry notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiryNotice {
    /// Room whose countdown expired.
    pub room: RoomCode,
    /// Cycle that expired.
    pub cycle: CycleKey,
    /// Epoch second the countdown reached zero.
    pub target_epoch: i64,
    /// How this client came to know about the expiry.
    pub origin: ExpiryOrigin,
}

/// Signals sent back into a subscription from the handles it gave out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LocalSignal {
    Acknowledged(CycleKey),
}

/// Live subscription to one room.
///
/// Yields [`RoomEvent`]s; dropping it stops the room's task, its ticker and
/// its store subscriptions.
pub struct RoomSubscription {
    room: RoomCode,
    events: mpsc::Receiver<RoomEvent>,
    task: JoinHandle<()>,
}

impl RoomSubscription {
    /// Room this subscription follows.
    pub fn room(&self) -> &RoomCode {
        &self.room
    }

    /// Wait for the next event; `None` once the store feeds have closed.
    pub async fn next_event(&mut self) -> Option<RoomEvent> {
        self.events.recv().await
    }
}

impl Stream for RoomSubscription {
    type Item = RoomEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for RoomSubscription {
    fn drop(&mut self) {
        self.task.abort();
        debug!(room = %self.room, "room subscription released");
    }
}

/// Start the event loop for `room` and hand back its subscription.
pub(crate) fn spawn(controller: RoomTimerController, room: RoomCode) -> RoomSubscription {
    let timer_path = RoomPath::timer(&room);
    let alarm_path = RoomPath::alarm(&room);
    let timer_feed = controller.store().subscribe(&timer_path);
    let alarm_feed = controller.store().subscribe(&alarm_path);

    let mut ticker = interval(controller.settings().tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let (local_tx, local_rx) = mpsc::unbounded_channel();

    let worker = RoomWorker {
        controller,
        room: room.clone(),
        alarm_path,
        timer_feed,
        alarm_feed,
        ticker,
        events: events_tx,
        outbox: VecDeque::new(),
        local_tx,
        local_rx,
        pending_writes: FuturesUnordered::new(),
        state: None,
        alarm_flag: None,
        tracker: ExpiryTracker::new(),
        alarm: AlarmMachine::new(),
        awaiting_flag: false,
        timer_link: ConnectionStatus::Connected,
        alarm_link: ConnectionStatus::Connected,
        reported_link: ConnectionStatus::Connected,
    };

    RoomSubscription {
        room,
        events: events_rx,
        task: tokio::spawn(worker.run()),
    }
}

struct RoomWorker {
    controller: RoomTimerController,
    room: RoomCode,
    alarm_path: RoomPath,
    timer_feed: BoxStream<'static, StoreEvent>,
    alarm_feed: BoxStream<'static, StoreEvent>,
    ticker: Interval,
    events: mpsc::Sender<RoomEvent>,
    /// Events waiting for room in `events`; consecutive views collapse into the latest.
    outbox: VecDeque<RoomEvent>,
    local_tx: mpsc::UnboundedSender<LocalSignal>,
    local_rx: mpsc::UnboundedReceiver<LocalSignal>,
    pending_writes: FuturesUnordered<BoxFuture<'static, StorageResult<()>>>,
    /// Last known shared record; kept while disconnected.
    state: Option<RoomTimerState>,
    /// Last known alarm flag, `None` until the first snapshot arrives.
    alarm_flag: Option<bool>,
    tracker: ExpiryTracker,
    alarm: AlarmMachine,
    /// The current cycle was first seen already expired; alert only if the room flag is up.
    awaiting_flag: bool,
    timer_link: ConnectionStatus,
    alarm_link: ConnectionStatus,
    reported_link: ConnectionStatus,
}

impl RoomWorker {
    async fn run(mut self) {
        debug!(room = %self.room, "room subscription started");

        loop {
            let counting = self.tracker.phase() == CountdownPhase::Counting;
            let events = self.events.clone();
            tokio::select! {
                event = self.timer_feed.next() => match event {
                    Some(StoreEvent::Value(value)) => self.on_timer_value(value),
                    Some(StoreEvent::Connection(status)) => {
                        self.timer_link = status;
                        self.report_link();
                    }
                    None => break,
                },
                event = self.alarm_feed.next() => match event {
                    Some(StoreEvent::Value(value)) => self.on_alarm_value(value.as_ref()),
                    Some(StoreEvent::Connection(status)) => {
                        self.alarm_link = status;
                        self.report_link();
                    }
                    None => break,
                },
                _ = self.ticker.tick(), if counting => self.refresh(),
                Some(result) = self.pending_writes.next(), if !self.pending_writes.is_empty() => {
                    self.on_write_done(result);
                }
                Some(signal) = self.local_rx.recv() => self.on_local_signal(signal),
                Ok(permit) = events.reserve(), if !self.outbox.is_empty() => {
                    if let Some(event) = self.outbox.pop_front() {
                        permit.send(event);
                    }
                }
            }

            if self.events.is_closed() {
                break;
            }
        }

        self.settle_alarm();
        debug!(room = %self.room, "room subscription stopped");
    }

    fn on_timer_value(&mut self, value: Option<Value>) {
        self.state = RoomTimerState::from_value(value);
        self.refresh();
    }

    fn on_alarm_value(&mut self, value: Option<&Value>) {
        let raised = alarm_flag_from_value(value);
        self.alarm_flag = Some(raised);
        self.alert_if_alarm_in_progress();
    }

    /// Re-derive the view from the last known record and the local clock.
    fn refresh(&mut self) {
        let now = self.controller.clock().now();
        let view = compute(self.state.as_ref(), now);
        let observation = self.tracker.observe(self.state.as_ref(), &view);
        self.emit(RoomEvent::View(view));

        match observation {
            Observation::Unchanged => {}
            Observation::CycleStarted(cycle) => {
                self.begin_cycle();
                debug!(room = %self.room, start = cycle.start, duration = cycle.duration, "countdown cycle observed");
            }
            Observation::Cleared => {
                self.begin_cycle();
                debug!(room = %self.room, "countdown cleared");
            }
            Observation::AlreadyExpired(cycle) => {
                self.begin_cycle();
                self.awaiting_flag = true;
                debug!(room = %self.room, start = cycle.start, "cycle first observed already expired");
                self.alert_if_alarm_in_progress();
            }
            Observation::FallingEdge(cycle) => self.on_falling_edge(cycle),
        }
    }

    /// Reset per-cycle alarm state; an alert still sounding from the previous cycle is silenced.
    fn begin_cycle(&mut self) {
        self.awaiting_flag = false;
        self.settle_alarm();
    }

    fn settle_alarm(&mut self) {
        if self.alarm.phase() == AlarmPhase::Silent {
            return;
        }
        if let Err(err) = self.alarm.apply(AlarmEvent::Silence) {
            warn!(room = %self.room, error = %err, "failed to silence alarm");
        }
    }

    fn on_falling_edge(&mut self, cycle: CycleKey) {
        if self.alarm_flag == Some(true) {
            debug!(room = %self.room, "alarm flag already raised; skipping redundant write");
        } else {
            let write = self
                .controller
                .store()
                .write(&self.alarm_path, Some(raised_alarm_value()));
            self.pending_writes.push(write);
        }
        self.raise(cycle, ExpiryOrigin::FallingEdge);
    }

    fn alert_if_alarm_in_progress(&mut self) {
        if !self.awaiting_flag || self.alarm_flag != Some(true) {
            return;
        }
        let Some(cycle) = self.tracker.cycle() else {
            return;
        };
        self.awaiting_flag = false;
        self.raise(cycle, ExpiryOrigin::AlarmInProgress);
    }

    fn raise(&mut self, cycle: CycleKey, origin: ExpiryOrigin) {
        let silence = match self.alarm.raise() {
            Ok(token) => token,
            Err(err) => {
                warn!(room = %self.room, error = %err, "alarm already handled for this cycle");
                return;
            }
        };

        let notice = ExpiryNotice {
            room: self.room.clone(),
            cycle,
            target_epoch: cycle.start.saturating_add(cycle.duration),
            origin,
        };
        info!(room = %self.room, origin = ?origin, target_epoch = notice.target_epoch, "countdown expired");
        self.emit(RoomEvent::Expired(notice.clone()));

        if let Some(presenter) = self.controller.presenter() {
            let ack = AckHandle::new(
                self.controller.clone(),
                self.room.clone(),
                cycle,
                self.local_tx.clone(),
            );
            presenter.present(Alert::new(notice, silence, ack));
        }
    }

    fn on_local_signal(&mut self, signal: LocalSignal) {
        match signal {
            LocalSignal::Acknowledged(cycle) => {
                if self.tracker.cycle() != Some(cycle) || self.alarm.phase() != AlarmPhase::Sounding {
                    debug!(room = %self.room, "ignoring acknowledgment for a finished alarm");
                    return;
                }
                if let Err(err) = self.alarm.apply(AlarmEvent::Acknowledge) {
                    warn!(room = %self.room, error = %err, "failed to acknowledge alarm");
                }
            }
        }
    }

    fn on_write_done(&mut self, result: StorageResult<()>) {
        if let Err(err) = result {
            warn!(room = %self.room, error = %err, "alarm flag write failed");
            self.emit(RoomEvent::WriteFailed(err.into()));
        }
    }

    fn report_link(&mut self) {
        let link = if self.timer_link == ConnectionStatus::Connected
            && self.alarm_link == ConnectionStatus::Connected
        {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        };
        if link == self.reported_link {
            return;
        }

        self.reported_link = link;
        match link {
            ConnectionStatus::Connected => info!(room = %self.room, "room store reachable again"),
            ConnectionStatus::Disconnected => {
                warn!(room = %self.room, "room store unreachable; serving last known countdown")
            }
        }
        self.emit(RoomEvent::Status(link));
    }

    fn emit(&mut self, event: RoomEvent) {
        if let RoomEvent::View(view) = &event {
            if let Some(RoomEvent::View(queued)) = self.outbox.back_mut() {
                *queued = *view;
                return;
            }
        }
        self.outbox.push_back(event);
    }
}
