//! Background card-presence monitor
//!
//! Polls the reader state over PC/SC, turns presence changes into
//! [`ReaderEvent`]s applied to the session (under the session's own lock),
//! and republishes what happened on a channel.

use std::ffi::CString;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use pcsc::{Context, ReaderState, Scope, State};
use tracing::{debug, info, warn};

use crate::session::{MifareSession, ReaderEvent};
use crate::transport::ReaderBackend;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const READER_RECHECK: Duration = Duration::from_secs(2);

/// Messages sent from the monitor to its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    ReaderAvailable { reader: String },
    ReaderUnavailable { error: String },
    /// Card connected and its UID read
    CardAttached { uid: String },
    /// A card was detected but could not be attached
    AttachFailed { message: String },
    CardRemoved,
}

/// Commands sent to the monitor thread
#[derive(Debug)]
pub enum MonitorCommand {
    Stop,
}

/// What the reader reported on the last poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Empty,
    CardPresent,
    ReaderGone,
}

impl Presence {
    pub fn from_state(state: State) -> Self {
        if state.intersects(State::UNKNOWN | State::UNAVAILABLE) {
            Presence::ReaderGone
        } else if state.contains(State::PRESENT) {
            Presence::CardPresent
        } else {
            Presence::Empty
        }
    }
}

/// Remembers whether the reader was already reported missing
#[derive(Debug, Default)]
struct Availability {
    missing: bool,
}

impl Availability {
    /// Record a failed lookup; true only for the first one in a row
    fn lost(&mut self) -> bool {
        !std::mem::replace(&mut self.missing, true)
    }

    fn found(&mut self) {
        self.missing = false;
    }
}

/// Event implied by a change between two polls, if any
pub fn presence_change(previous: Presence, current: Presence) -> Option<ReaderEvent> {
    match (previous, current) {
        (a, b) if a == b => None,
        (_, Presence::ReaderGone) => Some(ReaderEvent::ReaderLost),
        (_, Presence::CardPresent) => Some(ReaderEvent::CardInserted),
        (Presence::CardPresent, Presence::Empty) => Some(ReaderEvent::CardRemoved),
        (_, Presence::Empty) => None,
    }
}

/// Apply an event to the session and describe the outcome
pub fn dispatch<B: ReaderBackend>(
    session: &MifareSession<B>,
    event: ReaderEvent,
) -> Option<MonitorEvent> {
    match (event.clone(), session.handle_event(event)) {
        (ReaderEvent::CardInserted, Ok(Some(uid))) => Some(MonitorEvent::CardAttached { uid }),
        (ReaderEvent::CardInserted, Err(e)) => Some(MonitorEvent::AttachFailed {
            message: e.to_string(),
        }),
        (ReaderEvent::CardRemoved, _) => Some(MonitorEvent::CardRemoved),
        (ReaderEvent::ReaderLost, _) => Some(MonitorEvent::ReaderUnavailable {
            error: "reader removed".into(),
        }),
        (ReaderEvent::ReaderFound(reader), _) => Some(MonitorEvent::ReaderAvailable { reader }),
        (_, _) => None,
    }
}

/// Handle to a running monitor thread
pub struct MonitorHandle {
    command_tx: Sender<MonitorCommand>,
    thread: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Ask the thread to stop and wait for it
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.command_tx.send(MonitorCommand::Stop);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Card monitor thread panicked");
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Background worker watching one session's reader
pub struct CardMonitor<B: ReaderBackend + 'static> {
    session: Arc<MifareSession<B>>,
    context: Context,
    event_tx: Sender<MonitorEvent>,
    command_rx: Receiver<MonitorCommand>,
}

impl<B: ReaderBackend + 'static> CardMonitor<B> {
    /// Spawn a new monitor thread with its own PC/SC context
    pub fn spawn(
        session: Arc<MifareSession<B>>,
    ) -> Result<(Receiver<MonitorEvent>, MonitorHandle), pcsc::Error> {
        let context = Context::establish(Scope::User)?;
        let (event_tx, event_rx) = mpsc::channel();
        let (command_tx, command_rx) = mpsc::channel();

        let thread = thread::spawn(move || {
            let monitor = CardMonitor {
                session,
                context,
                event_tx,
                command_rx,
            };
            monitor.run();
        });

        Ok((
            event_rx,
            MonitorHandle {
                command_tx,
                thread: Some(thread),
            },
        ))
    }

    fn run(self) {
        info!("Card monitor started");

        let mut reader: Option<CString> = None;
        let mut presence = Presence::ReaderGone;
        let mut last_reader_check: Option<Instant> = None;
        let mut availability = Availability::default();

        loop {
            match self.command_rx.try_recv() {
                Ok(MonitorCommand::Stop) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }

            let Some(c_name) = reader.clone() else {
                if last_reader_check.map_or(true, |t| t.elapsed() >= READER_RECHECK) {
                    last_reader_check = Some(Instant::now());
                    reader = self.find_reader(&mut availability);
                    if reader.is_some() {
                        presence = Presence::Empty;
                    }
                }
                thread::sleep(POLL_INTERVAL);
                continue;
            };

            let current = self.poll(&c_name, presence);
            if let Some(event) = presence_change(presence, current) {
                debug!(?presence, ?current, "Presence changed");
                if let Some(outcome) = dispatch(&self.session, event) {
                    self.emit(outcome);
                }
            }
            presence = current;
            if current == Presence::ReaderGone {
                // dispatch already reported the loss
                availability.lost();
                reader = None;
            }

            thread::sleep(POLL_INTERVAL);
        }

        info!("Card monitor stopped");
    }

    fn find_reader(&self, availability: &mut Availability) -> Option<CString> {
        match self.session.discover() {
            Ok(name) => match CString::new(name.clone()) {
                Ok(c_name) => {
                    availability.found();
                    self.emit(MonitorEvent::ReaderAvailable { reader: name });
                    Some(c_name)
                }
                Err(_) => {
                    warn!(reader = %name, "Reader name is not a valid C string");
                    None
                }
            },
            Err(e) => {
                debug!(error = %e, "Reader unavailable");
                if availability.lost() {
                    self.emit(MonitorEvent::ReaderUnavailable {
                        error: e.to_string(),
                    });
                }
                None
            }
        }
    }

    fn poll(&self, reader: &CString, previous: Presence) -> Presence {
        let mut states = [ReaderState::new(reader.clone(), State::UNAWARE)];
        match self.context.get_status_change(Duration::ZERO, &mut states) {
            Ok(()) => Presence::from_state(states[0].event_state()),
            Err(pcsc::Error::Timeout) => previous,
            Err(e) => {
                debug!(error = %e, "Status query failed");
                Presence::ReaderGone
            }
        }
    }

    fn emit(&self, event: MonitorEvent) {
        // The owner may have dropped the receiver; keep watching regardless
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_from_state() {
        assert_eq!(Presence::from_state(State::EMPTY), Presence::Empty);
        assert_eq!(
            Presence::from_state(State::PRESENT | State::INUSE),
            Presence::CardPresent
        );
        assert_eq!(Presence::from_state(State::UNAVAILABLE), Presence::ReaderGone);
        assert_eq!(Presence::from_state(State::UNKNOWN), Presence::ReaderGone);
    }

    #[test]
    fn test_presence_change() {
        use Presence::*;

        assert_eq!(presence_change(Empty, Empty), None);
        assert_eq!(presence_change(CardPresent, CardPresent), None);
        assert_eq!(presence_change(Empty, CardPresent), Some(ReaderEvent::CardInserted));
        assert_eq!(presence_change(CardPresent, Empty), Some(ReaderEvent::CardRemoved));
        assert_eq!(presence_change(CardPresent, ReaderGone), Some(ReaderEvent::ReaderLost));
        assert_eq!(presence_change(ReaderGone, Empty), None);
        assert_eq!(presence_change(ReaderGone, CardPresent), Some(ReaderEvent::CardInserted));
    }

    #[test]
    fn test_missing_reader_reported_once() {
        let mut availability = Availability::default();
        assert!(availability.lost());
        assert!(!availability.lost());
        assert!(!availability.lost());

        availability.found();
        assert!(availability.lost());
    }
}
