//! Records persisted by the store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString, IntoStaticStr};

/// Identity of the single user row. Never supplied by callers.
pub const USER_ID_KEY: i64 = 1;

/// Colour scheme preference.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Theme {
    /// Follow the operating system.
    #[default]
    System,
    /// Light scheme.
    Light,
    /// Dark scheme.
    Dark,
}

impl Theme {
    /// Value stored in the `theme` column.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Caller-supplied user settings.
///
/// Written as a whole: an upsert replaces every field, it never merges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserAttributes {
    /// Theme preference.
    #[serde(default)]
    pub theme: Theme,
    /// Free-form attributes (display name, locale, window geometry, ...).
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl UserAttributes {
    /// Attributes with the given theme and nothing else.
    #[must_use]
    pub fn with_theme(theme: Theme) -> Self {
        Self {
            theme,
            attributes: Map::new(),
        }
    }

    /// Adds or replaces one free-form attribute.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// The persisted user row: fixed identity plus the last written attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Always [`USER_ID_KEY`].
    pub id: i64,
    /// Attributes as last written.
    #[serde(flatten)]
    pub user: UserAttributes,
}

/// Lifecycle of the store's single handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum HandleState {
    /// `initialize` has never run.
    Unopened,
    /// `initialize` is opening, keying or migrating the file.
    Opening,
    /// The handle is open and usable.
    Open,
    /// Closed by `close`, `removeDB` or a failed `initialize`.
    Closed,
}
