//! Access interface: the side of the boundary that owns the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::interface::{DataInterface, Invocation, Operation};
use crate::logger::{set_logger, Logger};
use crate::store::HandleManager;
use crate::types::{HandleState, Theme, UserAttributes, UserRecord};

/// Arguments to [`Server::initialize`].
pub struct InitializeOptions {
    /// Application configuration directory; the database lives in its
    /// `sql` subdirectory.
    pub config_dir: PathBuf,
    /// Encryption key, ASCII letters and digits only.
    pub key: SecretString,
    /// Optional destination for the store's log output.
    pub logger: Option<Arc<dyn Logger>>,
}

impl InitializeOptions {
    /// Options without a logger.
    #[must_use]
    pub fn new(config_dir: impl Into<PathBuf>, key: SecretString) -> Self {
        Self {
            config_dir: config_dir.into(),
            key,
            logger: None,
        }
    }

    /// Forwards log output to `logger`.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }
}

impl std::fmt::Debug for InitializeOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializeOptions")
            .field("config_dir", &self.config_dir)
            .field("key", &self.key)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

/// The concrete store: lifecycle plus data operations against one handle.
#[derive(Debug, Default)]
pub struct Server {
    handle: HandleManager,
}

impl Server {
    /// A server with no open handle.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handle: HandleManager::new(),
        }
    }

    /// Installs the logger, if any, and opens the database.
    ///
    /// # Errors
    ///
    /// See [`HandleManager::initialize`].
    pub fn initialize(&self, options: InitializeOptions) -> StoreResult<()> {
        if let Some(logger) = options.logger {
            if !set_logger(logger) {
                log::debug!("a logger is already installed, keeping it");
            }
        }
        self.handle.initialize(&options.config_dir, &options.key)
    }

    /// Lifecycle state of the handle.
    #[must_use]
    pub fn state(&self) -> HandleState {
        self.handle.state()
    }

    /// Database file derived by the last `initialize`.
    #[must_use]
    pub fn database_path(&self) -> Option<PathBuf> {
        self.handle.database_path()
    }

    /// Runs one named operation and returns its result in JSON form.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidArgument`] for unknown names or missing
    /// arguments, otherwise whatever the operation fails with.
    pub fn execute(&self, invocation: &Invocation) -> StoreResult<Value> {
        let operation = invocation.operation()?;
        log::debug!("executing {operation}");
        match operation {
            Operation::Close => self.handle.close().map(|()| Value::Null),
            Operation::RemoveDb => self.handle.remove_db().map(|()| Value::Null),
            Operation::UpdateOrCreateUser => {
                let user: UserAttributes = invocation.arg(0)?;
                self.handle
                    .update_or_create_user(&user)
                    .map(|()| Value::Null)
            }
            Operation::GetUserInfo => {
                let record = self.handle.get_user_info()?;
                Ok(serde_json::to_value(record)?)
            }
            Operation::SetUserTheme => {
                let theme: Theme = invocation.arg(0)?;
                self.handle.set_user_theme(theme).map(|()| Value::Null)
            }
        }
    }

    /// Decodes an encoded [`Invocation`], runs it and encodes the outcome as
    /// a JSON `Result<Value, StoreError>`.
    ///
    /// Never fails: decode errors are reported inside the reply.
    #[must_use]
    pub fn handle_frame(&self, payload: &[u8]) -> Vec<u8> {
        let outcome = serde_json::from_slice::<Invocation>(payload)
            .map_err(StoreError::from)
            .and_then(|invocation| self.execute(&invocation));
        if let Err(err) = &outcome {
            log::warn!("operation failed: {err}");
        }
        encode_reply(&outcome)
    }
}

pub(crate) fn encode_reply(outcome: &StoreResult<Value>) -> Vec<u8> {
    serde_json::to_vec(outcome).unwrap_or_else(|err| {
        let fallback: StoreResult<Value> = Err(StoreError::Serialization(err.to_string()));
        serde_json::to_vec(&fallback).unwrap_or_default()
    })
}

pub(crate) fn decode_reply(reply: &[u8]) -> StoreResult<Value> {
    serde_json::from_slice::<StoreResult<Value>>(reply)?
}

#[async_trait]
impl DataInterface for Server {
    async fn close(&self) -> StoreResult<()> {
        self.handle.close()
    }

    async fn remove_db(&self) -> StoreResult<()> {
        self.handle.remove_db()
    }

    async fn update_or_create_user(&self, user: UserAttributes) -> StoreResult<()> {
        self.handle.update_or_create_user(&user)
    }

    async fn get_user_info(&self) -> StoreResult<Option<UserRecord>> {
        self.handle.get_user_info()
    }

    async fn set_user_theme(&self, theme: Theme) -> StoreResult<()> {
        self.handle.set_user_theme(theme)
    }
}

/// Opens a server rooted at `config_dir` with `key` and no logger.
///
/// # Errors
///
/// See [`HandleManager::initialize`].
pub fn open(config_dir: &Path, key: SecretString) -> StoreResult<Server> {
    let server = Server::new();
    server.initialize(InitializeOptions::new(config_dir, key))?;
    Ok(server)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn key() -> SecretString {
        SecretString::from("serverkey1".to_string())
    }

    #[test]
    fn test_execute_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let server = open(dir.path(), key()).expect("open");

        let user = UserAttributes::with_theme(Theme::Light).attribute("name", "Ada");
        let put = Invocation::new(
            Operation::UpdateOrCreateUser,
            vec![serde_json::to_value(&user).expect("encode")],
        );
        assert_eq!(server.execute(&put), Ok(Value::Null));

        let get = Invocation::new(Operation::GetUserInfo, vec![]);
        assert_eq!(
            server.execute(&get),
            Ok(json!({ "id": 1, "theme": "light", "attributes": { "name": "Ada" } }))
        );
    }

    #[test]
    fn test_execute_missing_argument() {
        let dir = tempfile::tempdir().expect("tempdir");
        let server = open(dir.path(), key()).expect("open");
        let call = Invocation::new(Operation::SetUserTheme, vec![]);
        assert!(matches!(
            server.execute(&call),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_handle_frame_reports_errors_in_reply() {
        let server = Server::new();

        let reply = server.handle_frame(b"not json");
        assert!(matches!(
            decode_reply(&reply),
            Err(StoreError::Serialization(_))
        ));

        let call = serde_json::to_vec(&Invocation::new(Operation::GetUserInfo, vec![]))
            .expect("encode");
        assert_eq!(
            decode_reply(&server.handle_frame(&call)),
            Err(StoreError::NotInitialized)
        );
    }

    #[test]
    fn test_reply_wire_shape() {
        let err: Value =
            serde_json::from_slice(&encode_reply(&Err(StoreError::InvalidKey))).expect("json");
        assert_eq!(err["Err"]["kind"], "InvalidKey");
        let io: Value = serde_json::from_slice(&encode_reply(&Err(StoreError::Io(
            "denied".to_string(),
        ))))
        .expect("json");
        assert_eq!(io["Err"], json!({ "kind": "Io", "detail": "denied" }));
        assert_eq!(
            serde_json::from_slice::<Value>(&encode_reply(&Ok(Value::Null))).expect("json"),
            json!({ "Ok": null })
        );
    }
}
