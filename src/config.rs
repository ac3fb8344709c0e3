//! Configuration file handling.
//!
//! The configuration file is stored at `$KAKEIBO_HOME/config.json`. It names the Google Sheet the
//! ledger lives in, where on each tab the ledger starts, the address the HTTP service listens on,
//! and the locations of the OAuth files.

use crate::api::column_index;
use crate::{utils, Result};
use anyhow::{bail, ensure, Context};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "kakeibo";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const CLIENT_SECRET_JSON: &str = "client_secret.json";
const TOKEN_JSON: &str = "token.json";
const CONFIG_JSON: &str = "config.json";
const FIRST_DATA_ROW: u32 = 5;
const FIRST_COLUMN: &str = "B";
const DATE_COLUMN: &str = "C";
const LISTEN: &str = "127.0.0.1:8080";

/// The configuration of the app. You instantiate it by providing the path to `$KAKEIBO_HOME` and
/// from there it loads `$KAKEIBO_HOME/config.json`. Everything that talks to the sheet receives
/// its settings from here explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    spreadsheet_id: String,
    first_column: u32,
    date_column: u32,
    listen: SocketAddr,
}

impl Config {
    /// Creates the home directory and its `.secrets` subdirectory, moves `secret_file` into
    /// `.secrets/client_secret.json` and writes an initial `config.json`.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be `$KAKEIBO_HOME`, e.g. `$HOME/kakeibo`
    /// - `secret_file` - The OAuth 2.0 client credentials JSON downloaded from Google Cloud
    /// - `sheet_url` - The URL of the kakeibo Google Sheet, e.g.
    ///   https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
    /// - `sheet_name` - The tab entries go to when a submission names none. Defaults to the
    ///   current year, e.g. `2025`.
    pub async fn create(
        dir: impl Into<PathBuf>,
        secret_file: &Path,
        sheet_url: &str,
        sheet_name: Option<&str>,
    ) -> Result<Self> {
        extract_spreadsheet_id(sheet_url)
            .context("Failed to extract spreadsheet ID from sheet URL")?;
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the kakeibo home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let secrets_dir = root.join(SECRETS);
        utils::make_dir(&secrets_dir).await?;
        utils::rename(secret_file, secrets_dir.join(CLIENT_SECRET_JSON)).await?;

        let default_sheet_name = match sheet_name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => chrono::Local::now().year().to_string(),
        };
        let config_file = ConfigFile {
            sheet_url: sheet_url.to_string(),
            default_sheet_name,
            ..ConfigFile::default()
        };
        let config_path = root.join(CONFIG_JSON);
        config_file.save(&config_path).await?;

        Self::from_parts(root, config_path, config_file)
    }

    /// Validates that `kakeibo_home`, its config file and its secrets directory exist, then loads
    /// the configuration.
    pub async fn load(kakeibo_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = kakeibo_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The kakeibo home directory is missing. Run 'kakeibo init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        let config = Self::from_parts(root, config_path, config_file)?;

        if !config.secrets.is_dir() {
            bail!(
                "The secrets directory is missing '{}'",
                config.secrets.display()
            )
        }
        Ok(config)
    }

    fn from_parts(root: PathBuf, config_path: PathBuf, config_file: ConfigFile) -> Result<Self> {
        let spreadsheet_id = extract_spreadsheet_id(&config_file.sheet_url)
            .context("Failed to extract spreadsheet ID from sheet URL")?
            .to_string();
        ensure!(
            config_file.first_data_row >= 1,
            "first_data_row must be 1 or more"
        );
        let first_column = column_index(&config_file.first_column)
            .context("Invalid first_column in config file")?;
        let date_column =
            column_index(&config_file.date_column).context("Invalid date_column in config file")?;
        let listen = config_file
            .listen
            .parse()
            .with_context(|| format!("Invalid listen address '{}'", config_file.listen))?;
        Ok(Self {
            secrets: root.join(SECRETS),
            root,
            config_path,
            config_file,
            spreadsheet_id,
            first_column,
            date_column,
            listen,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn sheet_url(&self) -> &str {
        &self.config_file.sheet_url
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    /// The tab used when a submission does not name one.
    pub fn default_sheet_name(&self) -> &str {
        &self.config_file.default_sheet_name
    }

    /// The first row below the header block, where the empty-row scan starts.
    pub fn first_data_row(&self) -> u32 {
        self.config_file.first_data_row
    }

    /// The 1-based column the first slot of a row is written to.
    pub fn first_column(&self) -> u32 {
        self.first_column
    }

    /// The 1-based column scanned for the first empty row.
    pub fn date_column(&self) -> u32 {
        self.date_column
    }

    pub fn listen(&self) -> SocketAddr {
        self.listen
    }

    /// Whether submissions with non-numeric amounts are rejected instead of counted as zero.
    pub fn strict_amounts(&self) -> bool {
        self.config_file.strict_amounts
    }

    #[cfg(test)]
    pub(crate) fn set_strict_amounts(&mut self, strict: bool) {
        self.config_file.strict_amounts = strict;
    }

    /// Returns the stored `client_secret_path` if it is absolute, otherwise resolves it against
    /// the home directory.
    pub fn client_secret_path(&self) -> PathBuf {
        self.resolve_secrets_file_path(self.config_file.client_secret_path())
    }

    /// Returns the stored `token_path` if it is absolute, otherwise resolves it against the home
    /// directory.
    pub fn token_path(&self) -> PathBuf {
        self.resolve_secrets_file_path(self.config_file.token_path())
    }

    fn resolve_secrets_file_path(&self, p: PathBuf) -> PathBuf {
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }
}

/// The serialization format of the configuration file.
///
/// ```json
/// {
///   "app_name": "kakeibo",
///   "config_version": 1,
///   "sheet_url": "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
///   "default_sheet_name": "2025",
///   "first_data_row": 5,
///   "first_column": "B",
///   "date_column": "C",
///   "listen": "127.0.0.1:8080",
///   "strict_amounts": false
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Always "kakeibo"
    app_name: String,

    config_version: u8,

    sheet_url: String,

    #[serde(default = "current_year")]
    default_sheet_name: String,

    #[serde(default = "default_first_data_row")]
    first_data_row: u32,

    /// Column letters, e.g. "B"
    #[serde(default = "default_first_column")]
    first_column: String,

    /// Column letters, e.g. "C"
    #[serde(default = "default_date_column")]
    date_column: String,

    /// Socket address for `kakeibo serve`
    #[serde(default = "default_listen")]
    listen: String,

    #[serde(default)]
    strict_amounts: bool,

    /// Relative to `$KAKEIBO_HOME` or absolute. Defaults to `.secrets/client_secret.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret_path: Option<PathBuf>,

    /// Relative to `$KAKEIBO_HOME` or absolute. Defaults to `.secrets/token.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    token_path: Option<PathBuf>,
}

fn current_year() -> String {
    chrono::Local::now().year().to_string()
}

fn default_first_data_row() -> u32 {
    FIRST_DATA_ROW
}

fn default_first_column() -> String {
    FIRST_COLUMN.to_string()
}

fn default_date_column() -> String {
    DATE_COLUMN.to_string()
}

fn default_listen() -> String {
    LISTEN.to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            sheet_url: String::new(),
            default_sheet_name: current_year(),
            first_data_row: FIRST_DATA_ROW,
            first_column: default_first_column(),
            date_column: default_date_column(),
            listen: default_listen(),
            strict_amounts: false,
            client_secret_path: None,
            token_path: None,
        }
    }
}

impl ConfigFile {
    async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = utils::read(path).await?;
        let config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        ensure!(
            config.config_version == CONFIG_VERSION,
            "Unsupported config_version {} in config file, expected {}",
            config.config_version,
            CONFIG_VERSION
        );

        Ok(config)
    }

    async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(path.as_ref(), data)
            .await
            .context("Unable to write config file")
    }

    fn client_secret_path(&self) -> PathBuf {
        self.client_secret_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(CLIENT_SECRET_JSON))
    }

    fn token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(TOKEN_JSON))
    }
}

/// Extracts the spreadsheet ID from a Google Sheets URL like
/// `https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/edit`. Query strings and fragments are
/// dropped. An empty URL yields an empty ID.
fn extract_spreadsheet_id(url: &str) -> Result<&str> {
    if url.is_empty() {
        return Ok(url);
    }

    let mut parts = url.split('/').skip_while(|part| *part != "d");
    if let (Some(_), Some(id_part)) = (parts.next(), parts.next()) {
        let id = id_part.split(['?', '#']).next().unwrap_or(id_part);
        if !id.is_empty() {
            return Ok(id);
        }
    }
    bail!(
        "Invalid Google Sheets URL format. Expected: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const URL: &str =
        "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL/edit";

    async fn write_config(dir: &Path, json: &str) -> PathBuf {
        let path = dir.join(CONFIG_JSON);
        utils::write(&path, json).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_config_create() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("kakeibo_home");
        let secret_source_file = dir.path().join("x.json");
        utils::write(&secret_source_file, "12345").await.unwrap();

        let config = Config::create(&home_dir, &secret_source_file, URL, Some("2025"))
            .await
            .unwrap();

        assert_eq!(URL, config.sheet_url());
        assert_eq!(
            "7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
            config.spreadsheet_id()
        );
        assert_eq!(config.default_sheet_name(), "2025");
        assert_eq!(config.first_data_row(), 5);
        assert_eq!(config.first_column(), 2);
        assert_eq!(config.date_column(), 3);
        assert_eq!(config.listen().to_string(), "127.0.0.1:8080");
        assert!(!config.strict_amounts());

        let found_secret = utils::read(&config.client_secret_path()).await.unwrap();
        assert_eq!(found_secret, "12345");
        assert!(!secret_source_file.exists());
        assert!(config.secrets().is_dir());

        let loaded = Config::load(&home_dir).await.unwrap();
        assert_eq!(loaded.spreadsheet_id(), config.spreadsheet_id());
        assert_eq!(loaded.default_sheet_name(), "2025");
    }

    #[tokio::test]
    async fn test_config_create_defaults_sheet_name_to_year() {
        let dir = TempDir::new().unwrap();
        let secret = dir.path().join("s.json");
        utils::write(&secret, "{}").await.unwrap();
        let config = Config::create(dir.path().join("home"), &secret, URL, None)
            .await
            .unwrap();
        assert_eq!(
            config.default_sheet_name(),
            chrono::Local::now().year().to_string()
        );
    }

    #[tokio::test]
    async fn test_load_missing_home() {
        let dir = TempDir::new().unwrap();
        let e = Config::load(dir.path().join("nope")).await.unwrap_err();
        assert!(e.to_string().contains("kakeibo init"));
    }

    #[tokio::test]
    async fn test_load_missing_secrets_dir() {
        let dir = TempDir::new().unwrap();
        write_config(
            dir.path(),
            r#"{"app_name":"kakeibo","config_version":1,"sheet_url":""}"#,
        )
        .await;
        let e = Config::load(dir.path()).await.unwrap_err();
        assert!(e.to_string().contains("secrets directory is missing"));
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            dir.path(),
            r#"{
                "app_name": "kakeibo",
                "config_version": 1,
                "sheet_url": "https://docs.google.com/spreadsheets/d/minimal"
            }"#,
        )
        .await;

        let config = ConfigFile::load(&path).await.unwrap();
        assert_eq!(config.first_data_row, 5);
        assert_eq!(config.first_column, "B");
        assert_eq!(config.date_column, "C");
        assert_eq!(config.listen, "127.0.0.1:8080");
        assert!(!config.strict_amounts);
        assert_eq!(
            config.client_secret_path(),
            PathBuf::from(SECRETS).join(CLIENT_SECRET_JSON)
        );
        assert_eq!(config.token_path(), PathBuf::from(SECRETS).join(TOKEN_JSON));
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            dir.path(),
            r#"{"app_name":"budget","config_version":1,"sheet_url":""}"#,
        )
        .await;
        let e = ConfigFile::load(&path).await.unwrap_err();
        assert!(e.to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_file_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        let original = ConfigFile {
            sheet_url: URL.to_string(),
            default_sheet_name: "家計簿".to_string(),
            first_data_row: 3,
            first_column: "A".to_string(),
            date_column: "B".to_string(),
            strict_amounts: true,
            token_path: Some(PathBuf::from("/etc/kakeibo/token.json")),
            ..ConfigFile::default()
        };
        original.save(&path).await.unwrap();
        assert_eq!(ConfigFile::load(&path).await.unwrap(), original);
    }

    #[test]
    fn test_from_parts_rejects_bad_columns() {
        let file = ConfigFile {
            date_column: "C3".to_string(),
            ..ConfigFile::default()
        };
        assert!(Config::from_parts(PathBuf::from("/x"), PathBuf::from("/x/c"), file).is_err());

        let file = ConfigFile {
            listen: "localhost".to_string(),
            ..ConfigFile::default()
        };
        assert!(Config::from_parts(PathBuf::from("/x"), PathBuf::from("/x/c"), file).is_err());
    }

    #[test]
    fn test_secret_paths_resolve_against_home() {
        let file = ConfigFile {
            token_path: Some(PathBuf::from("/abs/token.json")),
            ..ConfigFile::default()
        };
        let config = Config::from_parts(PathBuf::from("/home/k"), PathBuf::from("/home/k/c"), file)
            .unwrap();
        assert_eq!(
            config.client_secret_path(),
            PathBuf::from("/home/k/.secrets/client_secret.json")
        );
        assert_eq!(config.token_path(), PathBuf::from("/abs/token.json"));
    }

    #[test]
    fn test_serialization_omits_none_fields() {
        let json = serde_json::to_string(&ConfigFile::default()).unwrap();
        assert!(!json.contains("client_secret_path"));
        assert!(!json.contains("token_path"));
    }

    #[test]
    fn test_extract_spreadsheet_id() {
        assert_eq!(
            extract_spreadsheet_id(URL).unwrap(),
            "7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL"
        );
        assert_eq!(
            extract_spreadsheet_id("https://docs.google.com/spreadsheets/d/ABC123?foo=bar")
                .unwrap(),
            "ABC123"
        );
        assert_eq!(
            extract_spreadsheet_id("https://docs.google.com/spreadsheets/d/ABC123#gid=0").unwrap(),
            "ABC123"
        );
        assert!(extract_spreadsheet_id("https://example.com/invalid").is_err());
        assert!(extract_spreadsheet_id("https://example.com/d/").is_err());
        assert_eq!(extract_spreadsheet_id("").unwrap(), "");
    }
}
