//! Access proxy: forwards every operation across the boundary.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::error::{StoreError, StoreResult};
use crate::interface::{DataInterface, Invocation, Operation, LOCAL_ONLY_OPERATIONS};
use crate::ipc::{self, Channels};
use crate::server::{decode_reply, Server};
use crate::types::{Theme, UserAttributes, UserRecord};

#[derive(Debug)]
struct Gate {
    accepting: AtomicBool,
    in_flight: AtomicUsize,
    drained: Notify,
}

/// Counts one forwarded call for as long as it is alive.
struct InFlight<'a> {
    gate: &'a Gate,
}

impl<'a> InFlight<'a> {
    fn enter(gate: &'a Gate) -> StoreResult<Self> {
        // Count first so that `shutdown` either sees this call or we see
        // `accepting == false`.
        gate.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = Self { gate };
        if gate.accepting.load(Ordering::SeqCst) {
            Ok(guard)
        } else {
            Err(StoreError::ShuttingDown)
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.gate.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.gate.drained.notify_waiters();
        }
    }
}

/// The store as seen from a context that cannot open the file.
///
/// Offers the same [`DataInterface`] as [`Server`], plus
/// [`shutdown`](Self::shutdown). Any number of calls may be in flight at
/// once; they are answered in the order the endpoint receives them.
#[derive(Debug, Clone)]
pub struct Client {
    channels: Channels,
    gate: Arc<Gate>,
}

impl Client {
    /// A proxy sending through `channels`.
    #[must_use]
    pub fn new(channels: Channels) -> Self {
        Self {
            channels,
            gate: Arc::new(Gate {
                accepting: AtomicBool::new(true),
                in_flight: AtomicUsize::new(0),
                drained: Notify::new(),
            }),
        }
    }

    /// Connects a proxy to `server` through a fresh in-process channel and
    /// spawns the endpoint on the current runtime.
    #[must_use]
    pub fn connect(server: Arc<Server>) -> (Self, JoinHandle<()>) {
        let (channels, endpoint) = ipc::channel(ipc::DEFAULT_CAPACITY);
        let task = endpoint.spawn(server);
        (Self::new(channels), task)
    }

    /// Calls not yet answered.
    #[must_use]
    pub fn pending_operations(&self) -> usize {
        self.gate.in_flight.load(Ordering::SeqCst)
    }

    /// `false` once [`shutdown`](Self::shutdown) has started.
    #[must_use]
    pub fn is_accepting(&self) -> bool {
        self.gate.accepting.load(Ordering::SeqCst)
    }

    /// Dispatches by operation name. `"shutdown"` runs locally; every other
    /// name is forwarded.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidArgument`] for unknown names,
    /// [`StoreError::ShuttingDown`] once shutdown has begun, otherwise the
    /// remote failure unchanged.
    pub async fn call(&self, name: &str, args: Vec<Value>) -> StoreResult<Value> {
        if LOCAL_ONLY_OPERATIONS.contains(&name) {
            return self.shutdown().await.map(|()| Value::Null);
        }
        let invocation = Invocation {
            name: name.to_string(),
            args,
        };
        invocation.operation()?;
        self.forward(&invocation).await
    }

    /// Stops accepting calls, waits for every call already issued, lets the
    /// server finish its own queue, then closes the handle.
    ///
    /// Calls issued after this starts fail with [`StoreError::ShuttingDown`].
    ///
    /// # Errors
    ///
    /// [`StoreError::Transport`] if the endpoint is gone, or the error
    /// returned by the final `close`.
    pub async fn shutdown(&self) -> StoreResult<()> {
        self.gate.accepting.store(false, Ordering::SeqCst);
        self.drain().await;
        log::debug!("proxy drained, signalling remote shutdown");
        self.channels.signal_shutdown().await?;
        self.send(&Invocation::new(Operation::Close, vec![]))
            .await
            .map(|_| ())
    }

    async fn drain(&self) {
        loop {
            let drained = self.gate.drained.notified();
            if self.gate.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            drained.await;
        }
    }

    async fn forward(&self, invocation: &Invocation) -> StoreResult<Value> {
        let _in_flight = InFlight::enter(&self.gate)?;
        self.send(invocation).await
    }

    async fn send(&self, invocation: &Invocation) -> StoreResult<Value> {
        let payload = serde_json::to_vec(invocation)?;
        let reply = self.channels.request(payload).await?;
        decode_reply(&reply)
    }

    async fn forward_typed<T: DeserializeOwned>(
        &self,
        operation: Operation,
        args: Vec<Value>,
    ) -> StoreResult<T> {
        let value = self.forward(&Invocation::new(operation, args)).await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl DataInterface for Client {
    async fn close(&self) -> StoreResult<()> {
        self.forward_typed(Operation::Close, vec![]).await
    }

    async fn remove_db(&self) -> StoreResult<()> {
        self.forward_typed(Operation::RemoveDb, vec![]).await
    }

    async fn update_or_create_user(&self, user: UserAttributes) -> StoreResult<()> {
        let arg = serde_json::to_value(user)?;
        self.forward_typed(Operation::UpdateOrCreateUser, vec![arg])
            .await
    }

    async fn get_user_info(&self) -> StoreResult<Option<UserRecord>> {
        self.forward_typed(Operation::GetUserInfo, vec![]).await
    }

    async fn set_user_theme(&self, theme: Theme) -> StoreResult<()> {
        let arg = serde_json::to_value(theme)?;
        self.forward_typed(Operation::SetUserTheme, vec![arg]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_counts_and_refuses_after_close() {
        let gate = Gate {
            accepting: AtomicBool::new(true),
            in_flight: AtomicUsize::new(0),
            drained: Notify::new(),
        };
        {
            let _a = InFlight::enter(&gate).expect("open gate");
            let _b = InFlight::enter(&gate).expect("open gate");
            assert_eq!(gate.in_flight.load(Ordering::SeqCst), 2);
        }
        assert_eq!(gate.in_flight.load(Ordering::SeqCst), 0);

        gate.accepting.store(false, Ordering::SeqCst);
        assert!(matches!(
            InFlight::enter(&gate),
            Err(StoreError::ShuttingDown)
        ));
        assert_eq!(gate.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_name_is_rejected_locally() {
        let (channels, _endpoint) = ipc::channel(1);
        let client = Client::new(channels);
        assert!(matches!(
            client.call("dropTables", vec![]).await,
            Err(StoreError::InvalidArgument(_))
        ));
        assert_eq!(client.pending_operations(), 0);
    }
}
