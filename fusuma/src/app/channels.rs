use std::sync::mpsc;
use std::sync::Arc;

use crate::event::NativeEvent;
use crate::ipc::{EventBroadcaster, EventServer, IpcServer};
use fusuma_ipc::{Command, Response, StateEvent};

pub type IpcCommandWithResponse = (Command, tokio::sync::mpsc::Sender<Response>);

pub type SnapshotRequest = tokio::sync::oneshot::Sender<StateEvent>;

/// Wakes the main loop after something was queued for it.
pub type LoopWaker = Arc<dyn Fn() + Send + Sync>;

/// Sending half of a main-loop queue. Every successful send wakes the loop,
/// so async tasks can hand work to it without a relay task in between.
pub struct LoopSender<T> {
    tx: mpsc::Sender<T>,
    waker: LoopWaker,
}

impl<T> Clone for LoopSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            waker: Arc::clone(&self.waker),
        }
    }
}

impl<T> LoopSender<T> {
    pub fn new(tx: mpsc::Sender<T>, waker: LoopWaker) -> Self {
        Self { tx, waker }
    }

    pub fn send(&self, item: T) -> Result<(), mpsc::SendError<T>> {
        self.tx.send(item)?;
        (self.waker)();
        Ok(())
    }
}

/// Ends owned by the tokio thread.
pub struct TokioChannels {
    pub commands: LoopSender<IpcCommandWithResponse>,
    pub snapshot_requests: LoopSender<SnapshotRequest>,
    pub broadcaster: EventBroadcaster,
    pub state_event_rx: mpsc::Receiver<StateEvent>,
}

/// Ends owned by the main loop.
pub struct MainChannels {
    pub ipc_cmd_rx: mpsc::Receiver<IpcCommandWithResponse>,
    pub hotkey_cmd_tx: mpsc::Sender<Command>,
    pub hotkey_cmd_rx: mpsc::Receiver<Command>,
    pub native_event_tx: mpsc::Sender<NativeEvent>,
    pub native_event_rx: mpsc::Receiver<NativeEvent>,
    pub state_event_tx: mpsc::Sender<StateEvent>,
    pub snapshot_request_rx: mpsc::Receiver<SnapshotRequest>,
}

pub fn create_channels(waker: LoopWaker) -> (TokioChannels, MainChannels) {
    // IPC commands and snapshot requests: tokio -> main thread
    let (ipc_cmd_tx, ipc_cmd_rx) = mpsc::channel();
    let (snapshot_request_tx, snapshot_request_rx) = mpsc::channel();

    // Bound commands: keyboard hook -> main thread
    let (hotkey_cmd_tx, hotkey_cmd_rx) = mpsc::channel();

    // Native notifications: hook callbacks -> main thread
    let (native_event_tx, native_event_rx) = mpsc::channel();

    // State events: main thread -> tokio
    let (state_event_tx, state_event_rx) = mpsc::channel();

    let tokio_channels = TokioChannels {
        commands: LoopSender::new(ipc_cmd_tx, Arc::clone(&waker)),
        snapshot_requests: LoopSender::new(snapshot_request_tx, waker),
        broadcaster: EventBroadcaster::new(256),
        state_event_rx,
    };

    let main_channels = MainChannels {
        ipc_cmd_rx,
        hotkey_cmd_tx,
        hotkey_cmd_rx,
        native_event_tx,
        native_event_rx,
        state_event_tx,
        snapshot_request_rx,
    };

    (tokio_channels, main_channels)
}

/// Body of the tokio thread: both servers, the state event fan-out and the
/// Ctrl-C handler. Never returns while the process runs.
pub async fn run_async(channels: TokioChannels) {
    let TokioChannels {
        commands,
        snapshot_requests,
        broadcaster,
        state_event_rx,
    } = channels;

    tracing::info!("Tokio runtime started");

    let ipc_server = IpcServer::new(commands.clone());
    tokio::spawn(async move {
        if let Err(e) = ipc_server.run().await {
            tracing::error!("IPC server error: {:#}", e);
        }
    });

    let event_server = EventServer::new(broadcaster.clone(), snapshot_requests);
    tokio::spawn(async move {
        if let Err(e) = event_server.run().await {
            tracing::error!("Event server error: {:#}", e);
        }
    });

    // The main thread emits through a std channel; fan out from a plain thread
    std::thread::spawn(move || {
        while let Ok(event) = state_event_rx.recv() {
            broadcaster.send(event);
        }
    });

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Interrupted, asking the main loop to quit");
            let (resp_tx, _resp_rx) = tokio::sync::mpsc::channel(1);
            if commands.send((Command::Quit, resp_tx)).is_err() {
                tracing::error!("Main loop is gone");
            }
        }
        Err(e) => tracing::warn!("Cannot listen for Ctrl-C: {}", e),
    }

    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_loop_sender_wakes_on_send() {
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        let (tx, rx) = mpsc::channel();
        let sender = LoopSender::new(tx, Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        sender.clone().send(7).unwrap();
        assert_eq!(rx.try_recv().unwrap(), 7);
        assert_eq!(wakes.load(Ordering::SeqCst), 1);

        drop(rx);
        assert!(sender.send(8).is_err());
        assert_eq!(wakes.load(Ordering::SeqCst), 1);
    }
}
