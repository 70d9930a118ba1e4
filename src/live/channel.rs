//! Long-lived push connection with constant-delay reconnect.

use async_trait::async_trait;
use color_eyre::{
  eyre::{eyre, Report},
  Result,
};
use futures::{stream::BoxStream, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::CacheLayer;
use crate::error::SyncError;

use super::event::LiveEvent;

/// Text frames received on one connection. The stream ends when the
/// connection closes.
pub type MessageStream = BoxStream<'static, Result<String>>;

/// Opens connections for the live channel.
#[async_trait]
pub trait Connector: Send + Sync {
  async fn connect(&self, url: &Url) -> Result<MessageStream>;
}

/// `Connector` over tokio-tungstenite.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
  async fn connect(&self, url: &Url) -> Result<MessageStream> {
    let (ws, _) = tokio_tungstenite::connect_async(url.as_str())
      .await
      .map_err(|e| Report::new(SyncError::Channel(e.to_string())))?;

    let frames = ws.filter_map(|message| async move {
      match message {
        Ok(Message::Text(text)) => Some(Ok(text.to_string())),
        Ok(_) => None,
        Err(e) => Some(Err(Report::new(SyncError::Channel(e.to_string())))),
      }
    });
    Ok(frames.boxed())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
  Disconnected,
  Connecting,
  Open,
}

struct Supervisor {
  cancel: watch::Sender<bool>,
  handle: JoinHandle<()>,
}

/// Subscribers receive each event after its cache entry has been replaced.
const EVENT_BUFFER: usize = 64;

/// Live update channel.
///
/// `connect()` starts a supervisor task that keeps one connection open,
/// applies every pushed collection to the cache and re-broadcasts it. A closed
/// connection is retried after a constant delay until `disconnect()` is
/// called or the credential disappears.
pub struct LiveChannel {
  ws_url: String,
  layer: CacheLayer,
  connector: Arc<dyn Connector>,
  reconnect_delay: Duration,
  events: broadcast::Sender<LiveEvent>,
  state: Arc<watch::Sender<ChannelState>>,
  supervisor: Mutex<Option<Supervisor>>,
}

impl LiveChannel {
  pub fn new(ws_url: impl Into<String>, layer: CacheLayer, connector: Arc<dyn Connector>) -> Self {
    let (events, _) = broadcast::channel(EVENT_BUFFER);
    let (state, _) = watch::channel(ChannelState::Disconnected);
    Self {
      ws_url: ws_url.into(),
      layer,
      connector,
      reconnect_delay: Duration::from_secs(3),
      events,
      state: Arc::new(state),
      supervisor: Mutex::new(None),
    }
  }

  pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
    self.reconnect_delay = delay;
    self
  }

  pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
    self.events.subscribe()
  }

  pub fn state(&self) -> watch::Receiver<ChannelState> {
    self.state.subscribe()
  }

  pub fn is_running(&self) -> bool {
    self
      .supervisor
      .lock()
      .map(|s| s.as_ref().is_some_and(|s| !s.handle.is_finished()))
      .unwrap_or(false)
  }

  /// Start the channel. A no-op while a connection is already being kept,
  /// and when there is no credential.
  pub async fn connect(&self) -> Result<()> {
    if self.is_running() {
      debug!("live channel already running");
      return Ok(());
    }

    if self.layer.credentials().token().await?.is_none() {
      warn!("no credential, live channel not started");
      return Ok(());
    }

    let mut supervisor = self
      .supervisor
      .lock()
      .map_err(|_| eyre!("Live channel state lock poisoned"))?;
    if supervisor.as_ref().is_some_and(|s| !s.handle.is_finished()) {
      return Ok(());
    }

    let (cancel, cancel_rx) = watch::channel(false);
    let task = SupervisorTask {
      ws_url: self.ws_url.clone(),
      layer: self.layer.clone(),
      connector: self.connector.clone(),
      reconnect_delay: self.reconnect_delay,
      events: self.events.clone(),
      state: self.state.clone(),
      cancel: cancel_rx,
    };
    let handle = tokio::spawn(task.run());
    *supervisor = Some(Supervisor { cancel, handle });
    Ok(())
  }

  /// Close the connection and suppress reconnects until the next `connect()`.
  pub async fn disconnect(&self) {
    let supervisor = match self.supervisor.lock() {
      Ok(mut s) => s.take(),
      Err(poisoned) => poisoned.into_inner().take(),
    };

    if let Some(Supervisor { cancel, handle }) = supervisor {
      let _ = cancel.send(true);
      if let Err(e) = handle.await {
        warn!(error = %e, "live channel task ended abnormally");
      }
    }
    self.state.send_replace(ChannelState::Disconnected);
    info!("live channel disconnected");
  }
}

impl Drop for LiveChannel {
  fn drop(&mut self) {
    if let Ok(mut supervisor) = self.supervisor.lock() {
      if let Some(s) = supervisor.take() {
        let _ = s.cancel.send(true);
      }
    }
  }
}

/// Build `ws_url?token=<bearer>`.
pub fn channel_url(ws_url: &str, token: &str) -> Result<Url> {
  let mut url = Url::parse(ws_url).map_err(|e| eyre!("Invalid live channel url {}: {}", ws_url, e))?;
  url.query_pairs_mut().append_pair("token", token);
  Ok(url)
}

enum Closed {
  Cancelled,
  Remote,
}

struct SupervisorTask {
  ws_url: String,
  layer: CacheLayer,
  connector: Arc<dyn Connector>,
  reconnect_delay: Duration,
  events: broadcast::Sender<LiveEvent>,
  state: Arc<watch::Sender<ChannelState>>,
  cancel: watch::Receiver<bool>,
}

impl SupervisorTask {
  async fn run(mut self) {
    loop {
      let token = match self.layer.credentials().token().await {
        Ok(Some(token)) => token,
        Ok(None) => {
          info!("credential gone, live channel stopping");
          break;
        }
        Err(e) => {
          warn!(error = %e, "failed to read credential, live channel stopping");
          break;
        }
      };

      let url = match channel_url(&self.ws_url, &token) {
        Ok(url) => url,
        Err(e) => {
          warn!(error = %e, "live channel stopping");
          break;
        }
      };

      self.state.send_replace(ChannelState::Connecting);
      debug!(url = %self.ws_url, "live channel connecting");

      let connector = self.connector.clone();
      let connected = tokio::select! {
        _ = cancelled(&mut self.cancel) => break,
        result = connector.connect(&url) => result,
      };

      match connected {
        Ok(stream) => {
          self.state.send_replace(ChannelState::Open);
          info!("live channel open");
          if let Closed::Cancelled = self.pump(stream).await {
            break;
          }
          warn!("live channel closed, retrying");
        }
        Err(e) => warn!(error = %e, "live channel connect failed, retrying"),
      }

      self.state.send_replace(ChannelState::Disconnected);
      tokio::select! {
        _ = cancelled(&mut self.cancel) => break,
        _ = tokio::time::sleep(self.reconnect_delay) => {}
      }
    }
    self.state.send_replace(ChannelState::Disconnected);
  }

  async fn pump(&mut self, mut stream: MessageStream) -> Closed {
    loop {
      let next = tokio::select! {
        _ = cancelled(&mut self.cancel) => return Closed::Cancelled,
        next = stream.next() => next,
      };

      match next {
        Some(Ok(text)) => self.handle_message(&text),
        Some(Err(e)) => {
          warn!(error = %e, "live channel error");
          return Closed::Remote;
        }
        None => return Closed::Remote,
      }
    }
  }

  fn handle_message(&self, text: &str) {
    let event = match LiveEvent::parse(text) {
      Ok(Some(event)) => event,
      // Unknown types are dropped here rather than forwarded as raw JSON
      Ok(None) => {
        debug!("ignoring live message of unknown type");
        return;
      }
      Err(e) => {
        warn!(error = %e, "dropping invalid live message");
        return;
      }
    };

    let kind = event.kind();
    match event.apply(&self.layer) {
      // No subscribers is fine
      Ok(event) => {
        let _ = self.events.send(event);
      }
      Err(e) => warn!(event = kind, error = %e, "failed to apply live update"),
    }
  }
}

/// Resolves once cancellation is requested or the channel owner is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
  loop {
    if *rx.borrow() {
      return;
    }
    if rx.changed().await.is_err() {
      return;
    }
  }
}
