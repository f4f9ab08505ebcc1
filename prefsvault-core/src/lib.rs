//! Encrypted local storage for user settings.
//!
//! A [`Server`] owns the single handle to the encrypted database file. A
//! [`Client`] offers the same operations to code that cannot open the file
//! itself and forwards each call to a server over [`ipc`] channels.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use prefsvault_core::{Client, DataInterface, InitializeOptions, Server, Theme};
//! use secrecy::SecretString;
//!
//! # async fn run() -> prefsvault_core::StoreResult<()> {
//! let server = Arc::new(Server::new());
//! server.initialize(InitializeOptions::new(
//!     "/tmp/app-config",
//!     SecretString::from("abc123".to_string()),
//! ))?;
//!
//! let (client, endpoint) = Client::connect(server);
//! client.set_user_theme(Theme::Dark).await?;
//! client.shutdown().await?;
//! # drop(client);
//! # let _ = endpoint.await;
//! # Ok(())
//! # }
//! ```

mod error;
pub use error::*;

pub mod logger;

mod types;
pub use types::*;

pub mod store;

mod interface;
pub use interface::*;

pub mod ipc;

mod server;
pub use server::{open, InitializeOptions, Server};

mod client;
pub use client::Client;
