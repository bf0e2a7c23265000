use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use super::transport::{serve, write_line, Connection, COMMAND_ENDPOINT};
use crate::app::{IpcCommandWithResponse, LoopSender};
use fusuma_ipc::{Command, Response};

/// Command endpoint: one JSON command per line in, one JSON response per line out.
pub struct IpcServer {
    endpoint: String,
    commands: LoopSender<IpcCommandWithResponse>,
}

impl IpcServer {
    pub fn new(commands: LoopSender<IpcCommandWithResponse>) -> Self {
        Self::with_endpoint(COMMAND_ENDPOINT, commands)
    }

    pub fn with_endpoint(endpoint: &str, commands: LoopSender<IpcCommandWithResponse>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            commands,
        }
    }

    pub async fn run(self) -> Result<()> {
        let commands = self.commands;
        serve(&self.endpoint, "IPC server", move |connection| {
            handle_connection(connection, commands.clone())
        })
        .await
    }
}

async fn handle_connection(
    connection: Box<dyn Connection>,
    commands: LoopSender<IpcCommandWithResponse>,
) -> Result<()> {
    let (reader, mut writer) = tokio::io::split(connection);
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Command>(line) {
            Ok(cmd) => execute(&commands, cmd).await,
            Err(e) => Response::Error {
                message: format!("Invalid command: {}", e),
            },
        };
        write_line(&mut writer, &response).await?;
    }

    Ok(())
}

/// Hands the command to the main loop and waits for its answer.
async fn execute(commands: &LoopSender<IpcCommandWithResponse>, cmd: Command) -> Response {
    tracing::debug!("IPC command: {:?}", cmd);
    let (resp_tx, mut resp_rx) = mpsc::channel(1);
    if commands.send((cmd, resp_tx)).is_err() {
        return Response::Error {
            message: "Internal error: main loop is not running".to_string(),
        };
    }
    resp_rx.recv().await.unwrap_or(Response::Error {
        message: "Internal error: no response".to_string(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::ipc::IpcClient;
    use std::sync::Arc;
    use std::time::Duration;

    fn test_endpoint(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("fusuma-{}-{}.sock", name, std::process::id()))
            .to_string_lossy()
            .into_owned()
    }

    async fn connect_with_retry(endpoint: String) -> IpcClient {
        for _ in 0..50 {
            if let Ok(client) = IpcClient::connect_to(&endpoint) {
                return client;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("IPC server did not come up at {}", endpoint);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_command_round_trip_through_socket() {
        let endpoint = test_endpoint("cmd");
        let (cmd_tx, cmd_rx) = std::sync::mpsc::channel::<IpcCommandWithResponse>();
        let server =
            IpcServer::with_endpoint(&endpoint, LoopSender::new(cmd_tx, Arc::new(|| {})));
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        // Stand-in for the main loop
        std::thread::spawn(move || {
            while let Ok((cmd, resp_tx)) = cmd_rx.recv() {
                let response = match cmd {
                    Command::SwitchToWorkspace { workspace } if workspace < 4 => Response::Ok,
                    _ => Response::Error {
                        message: "no such workspace".to_string(),
                    },
                };
                let _ = resp_tx.blocking_send(response);
            }
        });

        let mut client = connect_with_retry(endpoint).await;
        let (ok, err, garbage) = tokio::task::spawn_blocking(move || {
            let ok = client
                .send(&Command::SwitchToWorkspace { workspace: 2 })
                .unwrap();
            let err = client
                .send(&Command::SwitchToWorkspace { workspace: 9 })
                .unwrap();
            let garbage = client.send_raw("{\"type\":\"teleport\"}").unwrap();
            (ok, err, garbage)
        })
        .await
        .unwrap();

        assert!(matches!(ok, Response::Ok));
        match err {
            Response::Error { message } => assert_eq!(message, "no such workspace"),
            other => panic!("Unexpected response {:?}", other),
        }
        match garbage {
            Response::Error { message } => assert!(message.starts_with("Invalid command")),
            other => panic!("Unexpected response {:?}", other),
        }
    }
}
