use std::sync::Arc;

use mifare_card::{CardError, CardMonitor, MonitorEvent};

use super::{open_session, ReaderOptions};

/// Print monitor events until the channel closes or `count` is reached
pub fn cmd_watch(opts: &ReaderOptions, count: Option<usize>) -> Result<(), CardError> {
    let session = Arc::new(open_session(opts)?);
    let (events, handle) = CardMonitor::spawn(Arc::clone(&session))
        .map_err(|e| CardError::ReaderUnavailable(format!("failed to start monitor: {}", e)))?;

    println!("Watching for cards (Ctrl-C to stop)\n");

    let mut seen = 0;
    for event in events.iter() {
        match &event {
            MonitorEvent::ReaderAvailable { reader } => println!("Reader available: {}", reader),
            MonitorEvent::ReaderUnavailable { error } => println!("Reader unavailable: {}", error),
            MonitorEvent::CardAttached { uid } => println!("Card attached: {}", uid),
            MonitorEvent::AttachFailed { message } => println!("Card attach failed: {}", message),
            MonitorEvent::CardRemoved => println!("Card removed"),
        }
        seen += 1;
        if count.is_some_and(|limit| seen >= limit) {
            break;
        }
    }

    handle.stop();
    Ok(())
}
