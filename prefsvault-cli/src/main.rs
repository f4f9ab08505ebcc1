//! `prefsvault`: developer CLI over the encrypted settings store.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use eyre::{eyre, Result, WrapErr};
use prefsvault_core::{Client, DataInterface, InitializeOptions, Server, Theme, UserAttributes};
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "prefsvault", version)]
#[command(about = "Inspect and edit the encrypted user settings store", long_about = None)]
struct Cli {
    /// Application config directory; the database lives in its `sql` folder.
    #[arg(long, env = "PREFSVAULT_CONFIG_DIR", global = true)]
    config_dir: Option<PathBuf>,

    /// Encryption key (ASCII letters and digits).
    #[arg(long, env = "PREFSVAULT_KEY", hide_env_values = true, global = true)]
    key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create (or open) the database and print its location.
    Init,
    /// Print the stored user record as JSON.
    Show,
    /// Change only the theme.
    SetTheme {
        /// system, light or dark
        theme: Theme,
    },
    /// Replace the whole user record.
    Put {
        /// JSON object, e.g. '{"theme":"dark","attributes":{"name":"Ada"}}'
        json: String,
    },
    /// Close and delete the database with its -wal and -shm files.
    Remove,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = run(cli).await?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

fn default_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("prefsvault"))
        .ok_or_else(|| eyre!("no config directory on this platform, pass --config-dir"))
}

async fn run(cli: Cli) -> Result<String> {
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => default_config_dir()?,
    };
    let key = cli
        .key
        .map(SecretString::from)
        .ok_or_else(|| eyre!("an encryption key is required (--key or PREFSVAULT_KEY)"))?;

    let server = Arc::new(Server::new());
    server
        .initialize(InitializeOptions::new(&config_dir, key))
        .wrap_err_with(|| format!("opening settings in {}", config_dir.display()))?;
    tracing::debug!(path = ?server.database_path(), "settings database open");

    let (client, endpoint) = Client::connect(server.clone());
    let outcome = execute(&client, &server, cli.command).await;

    let shutdown = client.shutdown().await;
    drop(client);
    if let Err(err) = endpoint.await {
        tracing::warn!("endpoint task failed: {err}");
    }

    let output = outcome?;
    shutdown.wrap_err("shutting down")?;
    Ok(output)
}

async fn execute(client: &Client, server: &Server, command: Command) -> Result<String> {
    match command {
        Command::Init => Ok(server
            .database_path()
            .map(|path| path.display().to_string())
            .unwrap_or_default()),
        Command::Show => {
            let record = client.get_user_info().await?;
            Ok(serde_json::to_string_pretty(&record)?)
        }
        Command::SetTheme { theme } => {
            client.set_user_theme(theme).await?;
            Ok(String::new())
        }
        Command::Put { json } => {
            let user: UserAttributes =
                serde_json::from_str(&json).wrap_err("parsing the user record")?;
            client.update_or_create_user(user).await?;
            Ok(String::new())
        }
        Command::Remove => {
            client.remove_db().await?;
            Ok(String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(dir: &std::path::Path, args: &[&str]) -> Cli {
        let mut argv = vec![
            "prefsvault",
            "--config-dir",
            dir.to_str().expect("utf-8 path"),
            "--key",
            "cliTestKey1",
        ];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("parse")
    }

    #[tokio::test]
    async fn test_put_set_theme_show() {
        let dir = tempfile::tempdir().expect("tempdir");

        let path = run(cli(dir.path(), &["init"])).await.expect("init");
        assert!(path.ends_with("db.sqlite"));
        assert_eq!(run(cli(dir.path(), &["show"])).await.expect("show"), "null");

        run(cli(
            dir.path(),
            &["put", r#"{"theme":"light","attributes":{"name":"Ada"}}"#],
        ))
        .await
        .expect("put");
        run(cli(dir.path(), &["set-theme", "dark"]))
            .await
            .expect("set-theme");

        let shown = run(cli(dir.path(), &["show"])).await.expect("show");
        let value: serde_json::Value = serde_json::from_str(&shown).expect("json");
        assert_eq!(value["theme"], "dark");
        assert_eq!(value["attributes"]["name"], "Ada");

        run(cli(dir.path(), &["remove"])).await.expect("remove");
        assert!(!std::path::Path::new(&path).exists());
    }

    #[test]
    fn test_rejects_unknown_theme() {
        let dir = tempfile::tempdir().expect("tempdir");
        let argv = [
            "prefsvault",
            "--config-dir",
            dir.path().to_str().expect("utf-8 path"),
            "set-theme",
            "sepia",
        ];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[tokio::test]
    async fn test_invalid_key_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let argv = [
            "prefsvault",
            "--config-dir",
            dir.path().to_str().expect("utf-8 path"),
            "--key",
            "not-valid!",
            "show",
        ];
        let err = run(Cli::try_parse_from(argv).expect("parse"))
            .await
            .expect_err("invalid key");
        assert!(format!("{err:#}").contains("invalid key"));
    }
}
