use std::io::{BufRead, BufReader, Write};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use super::transport::{connect, ClientStream, COMMAND_ENDPOINT, EVENT_ENDPOINT};
use fusuma_ipc::{Command, EventFilter, Response, StateEvent, SubscribeRequest};

/// Blocking JSON-lines connection shared by both clients.
struct LineStream {
    reader: BufReader<ClientStream>,
}

impl LineStream {
    fn open(endpoint: &str) -> Result<Self> {
        let stream = connect(endpoint)
            .with_context(|| format!("Failed to connect to fusuma daemon at {}", endpoint))?;
        Ok(Self {
            reader: BufReader::new(stream),
        })
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(line.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()?;
        Ok(())
    }

    /// `None` once the other side hangs up.
    fn read<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(line.trim_end())?))
    }
}

pub struct IpcClient {
    stream: LineStream,
}

impl IpcClient {
    pub fn connect() -> Result<Self> {
        Self::connect_to(COMMAND_ENDPOINT)
    }

    pub fn connect_to(endpoint: &str) -> Result<Self> {
        Ok(Self {
            stream: LineStream::open(endpoint)?,
        })
    }

    pub fn send(&mut self, cmd: &Command) -> Result<Response> {
        self.send_raw(&serde_json::to_string(cmd)?)
    }

    /// Sends an already serialized command line.
    pub fn send_raw(&mut self, line: &str) -> Result<Response> {
        self.stream.write_line(line)?;
        self.stream
            .read()?
            .context("Daemon closed the connection")
    }
}

/// Client for subscribing to state events
pub struct EventClient {
    stream: LineStream,
}

impl EventClient {
    pub fn connect(request: &SubscribeRequest) -> Result<Self> {
        Self::connect_to(EVENT_ENDPOINT, request)
    }

    pub fn connect_to(endpoint: &str, request: &SubscribeRequest) -> Result<Self> {
        let mut stream = LineStream::open(endpoint)?;
        stream.write_line(&serde_json::to_string(request)?)?;
        Ok(Self { stream })
    }

    /// Blocks for the next event. `None` once the daemon hangs up.
    pub fn next_event(&mut self) -> Result<Option<StateEvent>> {
        self.stream.read()
    }
}

/// Prints every event as one JSON line until the daemon exits.
pub fn subscribe_and_print(snapshot: bool, filter: Option<EventFilter>) -> Result<()> {
    let request = SubscribeRequest {
        snapshot,
        filter: filter.unwrap_or_default(),
    };

    let mut client = EventClient::connect(&request)?;
    while let Some(event) = client.next_event()? {
        println!("{}", serde_json::to_string(&event)?);
    }

    Ok(())
}
