//! In-process stand-in for the process boundary.
//!
//! Calls travel as encoded bytes so that the client never shares memory with
//! the server: a [`Channels`] on the caller side pushes frames into a queue
//! and an [`Endpoint`] on the owning side answers them strictly in arrival
//! order against one [`Server`].

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{StoreError, StoreResult};
use crate::server::{encode_reply, Server};

/// Default number of frames that may queue before senders wait.
pub const DEFAULT_CAPACITY: usize = 64;

enum Frame {
    /// An encoded invocation and where to send the encoded reply.
    Call {
        payload: Vec<u8>,
        reply: oneshot::Sender<Vec<u8>>,
    },
    /// Acknowledged once every frame queued before it has been answered.
    Shutdown { reply: oneshot::Sender<()> },
}

/// Caller side of the boundary.
#[derive(Debug, Clone)]
pub struct Channels {
    sender: mpsc::Sender<Frame>,
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call { payload, .. } => f
                .debug_struct("Call")
                .field("len", &payload.len())
                .finish_non_exhaustive(),
            Self::Shutdown { .. } => f.debug_struct("Shutdown").finish_non_exhaustive(),
        }
    }
}

impl Channels {
    /// Sends an encoded invocation and waits for the encoded reply.
    ///
    /// # Errors
    ///
    /// [`StoreError::Transport`] if the endpoint stopped before answering.
    pub async fn request(&self, payload: Vec<u8>) -> StoreResult<Vec<u8>> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Frame::Call { payload, reply })
            .await
            .map_err(|_| StoreError::Transport("endpoint is not running".to_string()))?;
        response
            .await
            .map_err(|_| StoreError::Transport("endpoint dropped the call".to_string()))
    }

    /// Asks the endpoint to finish everything queued so far.
    ///
    /// # Errors
    ///
    /// [`StoreError::Transport`] if the endpoint stopped before answering.
    pub async fn signal_shutdown(&self) -> StoreResult<()> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Frame::Shutdown { reply })
            .await
            .map_err(|_| StoreError::Transport("endpoint is not running".to_string()))?;
        response.await.map_err(|_| {
            StoreError::Transport("endpoint dropped the shutdown signal".to_string())
        })
    }
}

/// Owning side of the boundary.
#[derive(Debug)]
pub struct Endpoint {
    receiver: mpsc::Receiver<Frame>,
}

impl Endpoint {
    /// Answers frames one at a time until every [`Channels`] is dropped.
    ///
    /// Each call runs on tokio's blocking pool, since the store works on
    /// a synchronous handle that may wait on disk syncs. The next frame is
    /// not taken until the current one has been answered.
    pub async fn serve(mut self, server: Arc<Server>) {
        while let Some(frame) = self.receiver.recv().await {
            match frame {
                Frame::Call { payload, reply } => {
                    let encoded = answer(server.clone(), payload).await;
                    if reply.send(encoded).is_err() {
                        log::debug!("caller went away before its reply was ready");
                    }
                }
                Frame::Shutdown { reply } => {
                    log::info!("shutdown requested, all earlier operations have completed");
                    let _ = reply.send(());
                }
            }
        }
        log::debug!("all channels closed, endpoint stopped");
    }

    /// Runs [`serve`](Self::serve) on the current tokio runtime.
    #[must_use]
    pub fn spawn(self, server: Arc<Server>) -> JoinHandle<()> {
        tokio::spawn(self.serve(server))
    }
}

async fn answer(server: Arc<Server>, payload: Vec<u8>) -> Vec<u8> {
    match tokio::task::spawn_blocking(move || server.handle_frame(&payload)).await {
        Ok(encoded) => encoded,
        Err(err) => {
            log::error!("call handler failed: {err}");
            encode_reply(&Err(StoreError::Transport(format!(
                "call handler failed: {err}"
            ))))
        }
    }
}

/// Creates a connected [`Channels`] / [`Endpoint`] pair.
#[must_use]
pub fn channel(capacity: usize) -> (Channels, Endpoint) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (Channels { sender }, Endpoint { receiver })
}
