//! Reads and writes of the single user row.

use std::str::FromStr;

use prefsvault_db::{params, StepResult};

use super::handle::HandleManager;
use crate::error::{StoreError, StoreResult};
use crate::types::{Theme, UserAttributes, UserRecord, USER_ID_KEY};

const UPSERT_USER: &str = "INSERT OR REPLACE INTO users (id, theme, json) VALUES (?1, ?2, ?3)";
const SELECT_USER: &str = "SELECT id, theme, json FROM users WHERE id = ?1";
const UPDATE_THEME: &str = "UPDATE users SET theme = ?1 WHERE id = ?2";

impl HandleManager {
    /// Writes `user` as the whole user row, replacing any previous one.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotInitialized`] without an open handle,
    /// [`StoreError::QueryCompilation`] if the statement cannot be
    /// compiled, [`StoreError::Database`] if the write fails.
    pub fn update_or_create_user(&self, user: &UserAttributes) -> StoreResult<()> {
        let json = serde_json::to_string(&user.attributes)?;
        self.with_instance(|conn| {
            let mut stmt = conn
                .prepare_cached(UPSERT_USER)
                .map_err(|e| StoreError::compilation(&e))?;
            stmt.bind_values(params![USER_ID_KEY, user.theme.as_str(), json.as_str()])
                .map_err(|e| StoreError::database(&e))?;
            stmt.step().map_err(|e| StoreError::database(&e))?;
            Ok(())
        })
    }

    /// The user row, or `None` before the first write.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotInitialized`] without an open handle,
    /// [`StoreError::Serialization`] if the stored row cannot be decoded.
    pub fn get_user_info(&self) -> StoreResult<Option<UserRecord>> {
        self.with_instance(|conn| {
            let mut stmt = conn
                .prepare_cached(SELECT_USER)
                .map_err(|e| StoreError::compilation(&e))?;
            stmt.bind_values(params![USER_ID_KEY])
                .map_err(|e| StoreError::database(&e))?;
            match stmt.step().map_err(|e| StoreError::database(&e))? {
                StepResult::Done => Ok(None),
                StepResult::Row => {
                    let id = stmt.column_i64(0);
                    let theme = stmt.column_text(1);
                    let json = stmt.column_text(2);
                    decode_user(id, &theme, &json).map(Some)
                }
            }
        })
    }

    /// Changes only the theme of the user row.
    ///
    /// Without a row this is a successful no-op and a warning is logged.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotInitialized`] without an open handle,
    /// [`StoreError::Database`] if the update fails.
    pub fn set_user_theme(&self, theme: Theme) -> StoreResult<()> {
        let changed = self.with_instance(|conn| {
            let mut stmt = conn
                .prepare_cached(UPDATE_THEME)
                .map_err(|e| StoreError::compilation(&e))?;
            stmt.bind_values(params![theme.as_str(), USER_ID_KEY])
                .map_err(|e| StoreError::database(&e))?;
            stmt.step().map_err(|e| StoreError::database(&e))?;
            Ok(conn.changes())
        })?;
        if changed == 0 {
            log::warn!("setUserTheme: no user record yet, theme '{theme}' not stored");
        }
        Ok(())
    }
}

fn decode_user(id: i64, theme: &str, json: &str) -> StoreResult<UserRecord> {
    let theme = Theme::from_str(theme)
        .map_err(|_| StoreError::Serialization(format!("unknown theme '{theme}'")))?;
    let attributes = serde_json::from_str(json)?;
    Ok(UserRecord {
        id,
        user: UserAttributes { theme, attributes },
    })
}
