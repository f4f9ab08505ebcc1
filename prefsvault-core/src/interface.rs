//! The operation contract shared by the server and the client proxy.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::{StoreError, StoreResult};
use crate::types::{Theme, UserAttributes, UserRecord};

/// Operations reachable through both [`Server`](crate::Server) and
/// [`Client`](crate::Client).
///
/// `initialize` is not part of it: only the side that owns the file can
/// open it.
#[async_trait]
pub trait DataInterface: Send + Sync {
    /// Optimizes and closes the handle; no-op when nothing is open.
    async fn close(&self) -> StoreResult<()>;

    /// Closes the handle and deletes the database with its side files.
    async fn remove_db(&self) -> StoreResult<()>;

    /// Replaces the user row with `user`.
    async fn update_or_create_user(&self, user: UserAttributes) -> StoreResult<()>;

    /// The user row, `None` before the first write.
    async fn get_user_info(&self) -> StoreResult<Option<UserRecord>>;

    /// Changes only the theme of the user row.
    async fn set_user_theme(&self, theme: Theme) -> StoreResult<()>;
}

/// Wire names of the forwardable operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter)]
pub enum Operation {
    /// `close`
    #[strum(serialize = "close")]
    Close,
    /// `removeDB`
    #[strum(serialize = "removeDB")]
    RemoveDb,
    /// `updateOrCreateUser`
    #[strum(serialize = "updateOrCreateUser")]
    UpdateOrCreateUser,
    /// `getUserInfo`
    #[strum(serialize = "getUserInfo")]
    GetUserInfo,
    /// `setUserTheme`
    #[strum(serialize = "setUserTheme")]
    SetUserTheme,
}

/// Names the proxy handles itself and never forwards.
pub const LOCAL_ONLY_OPERATIONS: &[&str] = &["shutdown"];

/// One call as it crosses the boundary: an operation name plus positional
/// arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    /// Operation name, e.g. `"getUserInfo"`.
    pub name: String,
    /// Positional arguments in JSON form.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Invocation {
    /// An invocation of `operation` with `args`.
    #[must_use]
    pub fn new(operation: Operation, args: Vec<Value>) -> Self {
        Self {
            name: operation.to_string(),
            args,
        }
    }

    /// Resolves [`name`](Self::name) to an [`Operation`].
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidArgument`] for local-only or unknown names.
    pub fn operation(&self) -> StoreResult<Operation> {
        if LOCAL_ONLY_OPERATIONS.contains(&self.name.as_str()) {
            return Err(StoreError::InvalidArgument(format!(
                "'{}' is local to the client and cannot be forwarded",
                self.name
            )));
        }
        self.name
            .parse()
            .map_err(|_| StoreError::InvalidArgument(format!("unknown operation '{}'", self.name)))
    }

    /// Decodes argument `index`.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidArgument`] if the argument is missing,
    /// [`StoreError::Serialization`] if it does not decode as `T`.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> StoreResult<T> {
        let value = self.args.get(index).ok_or_else(|| {
            StoreError::InvalidArgument(format!(
                "{} expects an argument at position {index}",
                self.name
            ))
        })?;
        Ok(serde_json::from_value(value.clone())?)
    }
}
