use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::oneshot;

use super::transport::{serve, write_line, Connection, EVENT_ENDPOINT};
use crate::app::{LoopSender, SnapshotRequest};
use fusuma_ipc::{EventFilter, StateEvent, SubscribeRequest};

/// Fan-out point for state events. Cloning shares the channel.
#[derive(Clone)]
pub struct EventBroadcaster {
    event_tx: broadcast::Sender<StateEvent>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);
        Self { event_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.event_tx.subscribe()
    }

    pub fn send(&self, event: StateEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}

/// Event endpoint. A subscriber sends one `SubscribeRequest` line, then
/// receives matching events as JSON lines, optionally after a snapshot.
pub struct EventServer {
    endpoint: String,
    broadcaster: EventBroadcaster,
    snapshots: LoopSender<SnapshotRequest>,
}

impl EventServer {
    pub fn new(broadcaster: EventBroadcaster, snapshots: LoopSender<SnapshotRequest>) -> Self {
        Self::with_endpoint(EVENT_ENDPOINT, broadcaster, snapshots)
    }

    pub fn with_endpoint(
        endpoint: &str,
        broadcaster: EventBroadcaster,
        snapshots: LoopSender<SnapshotRequest>,
    ) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            broadcaster,
            snapshots,
        }
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            endpoint,
            broadcaster,
            snapshots,
        } = self;
        serve(&endpoint, "Event server", move |connection| {
            // Subscribe on accept so nothing sent after the snapshot is missed
            stream_events(connection, broadcaster.subscribe(), snapshots.clone())
        })
        .await
    }
}

async fn stream_events(
    connection: Box<dyn Connection>,
    mut events: broadcast::Receiver<StateEvent>,
    snapshots: LoopSender<SnapshotRequest>,
) -> Result<()> {
    let (reader, mut writer) = tokio::io::split(connection);

    let mut request_line = String::new();
    if BufReader::new(reader).read_line(&mut request_line).await? == 0 {
        return Ok(());
    }
    let request: SubscribeRequest = serde_json::from_str(request_line.trim()).unwrap_or_default();
    let filter: EventFilter = request.effective_filter();
    tracing::debug!("New event subscriber with filter: {:?}", filter);

    if request.snapshot {
        let (reply_tx, reply_rx) = oneshot::channel();
        if snapshots.send(reply_tx).is_ok() {
            if let Ok(snapshot) = reply_rx.await {
                write_line(&mut writer, &snapshot).await?;
            }
        }
    }

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(n)) => {
                tracing::warn!("Event subscriber lagged by {} messages", n);
                continue;
            }
            Err(RecvError::Closed) => return Ok(()),
        };
        if filter.matches(&event) {
            write_line(&mut writer, &event).await?;
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::ipc::client::EventClient;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_subscriber_gets_snapshot_then_filtered_events() {
        let endpoint = std::env::temp_dir()
            .join(format!("fusuma-events-{}.sock", std::process::id()))
            .to_string_lossy()
            .into_owned();
        let broadcaster = EventBroadcaster::new(16);
        let (snapshot_tx, snapshot_rx) = std::sync::mpsc::channel::<SnapshotRequest>();
        let server = EventServer::with_endpoint(
            &endpoint,
            broadcaster.clone(),
            LoopSender::new(snapshot_tx, Arc::new(|| {})),
        );
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        // Stand-in for the main loop
        std::thread::spawn(move || {
            while let Ok(reply) = snapshot_rx.recv() {
                let _ = reply.send(StateEvent::Snapshot {
                    workspaces: vec![],
                    windows: vec![],
                    current_workspace: 2,
                    focused_window_id: None,
                });
            }
        });

        let request = SubscribeRequest {
            snapshot: true,
            filter: EventFilter {
                workspace: true,
                ..Default::default()
            },
        };
        let mut client = None;
        for _ in 0..50 {
            if let Ok(c) = EventClient::connect_to(&endpoint, &request) {
                client = Some(c);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let mut client = client.expect("event server did not come up");

        let (mut client, first) = tokio::task::spawn_blocking(move || {
            let event = client.next_event().unwrap();
            (client, event)
        })
        .await
        .unwrap();
        assert!(matches!(
            first,
            Some(StateEvent::Snapshot {
                current_workspace: 2,
                ..
            })
        ));

        broadcaster.send(StateEvent::WindowFlashing { window_id: 5 });
        broadcaster.send(StateEvent::WorkspaceShown { workspace: 3 });

        let next = tokio::task::spawn_blocking(move || client.next_event().unwrap())
            .await
            .unwrap();
        assert_eq!(next, Some(StateEvent::WorkspaceShown { workspace: 3 }));
    }
}
