//! These structs provide the CLI interface for the kakeibo CLI.

use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// kakeibo: Appends household expenses to a kakeibo (家計簿) Google sheet.
///
/// Expenses are submitted as small JSON objects naming the payer, the date, an amount per
/// category and a memo. Each one becomes a new row in the ledger sheet, with consumption tax split
/// out for the categories that need it.
///
/// Submissions can come from the command line (`kakeibo append`) or from a phone shortcut or web
/// form talking to `kakeibo serve`.
///
/// You will need a Google OAuth client (Desktop app) for the Sheets API. Download its credentials
/// and pass them to `kakeibo init`, then run `kakeibo auth`.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration files.
    ///
    /// This is the first command you should run. You need a few things ready beforehand.
    ///
    /// - Decide what directory you want to store data in and pass this as --kakeibo-home. By
    ///   default, it will be $HOME/kakeibo.
    ///
    /// - Get the URL of your kakeibo Google Sheet and pass it as --sheet-url.
    ///
    /// - Create a Desktop OAuth client in the Google Cloud console with the Sheets API enabled,
    ///   download its JSON credentials and pass the file as --client-secret.
    ///
    Init(InitArgs),
    /// Authenticate with Google Sheets via OAuth.
    Auth(AuthArgs),
    /// Run the HTTP endpoint that accepts submissions.
    Serve(ServeArgs),
    /// Append one submission to the ledger and print the JSON reply.
    Append(AppendArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where kakeibo configuration and credentials are held. Defaults to ~/kakeibo
    #[arg(long, env = "KAKEIBO_HOME", default_value_t = default_kakeibo_home())]
    kakeibo_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, kakeibo_home: PathBuf) -> Self {
        Self {
            log_level,
            kakeibo_home: kakeibo_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn kakeibo_home(&self) -> &DisplayPath {
        &self.kakeibo_home
    }
}

/// (Not shown): Args for the `kakeibo init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The URL to your kakeibo Google sheet. It looks like this:
    /// https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
    #[arg(long)]
    sheet_url: String,

    /// The path to your downloaded OAuth client credentials. This file will be copied to the
    /// secrets directory in the main data directory.
    #[arg(long)]
    client_secret: PathBuf,

    /// The sheet (tab) that receives submissions without a `sheetName`. Defaults to the current
    /// year, e.g. 2026.
    #[arg(long)]
    sheet_name: Option<String>,
}

impl InitArgs {
    pub fn new(
        sheet_url: impl Into<String>,
        client_secret: impl Into<PathBuf>,
        sheet_name: Option<String>,
    ) -> Self {
        Self {
            sheet_url: sheet_url.into(),
            client_secret: client_secret.into(),
            sheet_name,
        }
    }

    pub fn sheet_url(&self) -> &str {
        &self.sheet_url
    }

    pub fn client_secret(&self) -> &Path {
        &self.client_secret
    }

    pub fn sheet_name(&self) -> Option<&str> {
        self.sheet_name.as_deref()
    }
}

/// (Not shown): Args for the `kakeibo auth` command.
#[derive(Debug, Parser, Clone)]
pub struct AuthArgs {
    /// Verify and refresh authentication.
    #[arg(long)]
    verify: bool,
}

impl AuthArgs {
    pub fn new(verify: bool) -> Self {
        Self { verify }
    }

    pub fn verify(&self) -> bool {
        self.verify
    }
}

/// (Not shown): Args for the `kakeibo serve` command.
#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// The address to listen on. Defaults to the `listen` setting in config.json.
    #[arg(long)]
    listen: Option<SocketAddr>,
}

impl ServeArgs {
    pub fn new(listen: Option<SocketAddr>) -> Self {
        Self { listen }
    }

    pub fn listen(&self) -> Option<SocketAddr> {
        self.listen
    }
}

/// (Not shown): Args for the `kakeibo append` command.
#[derive(Debug, Parser, Clone)]
pub struct AppendArgs {
    /// The submission as a JSON string, e.g.
    /// '{"payer":"A","date":"2026/1/3","categories":{"食費":1200},"memo":"スーパー"}'
    #[arg(long, conflicts_with = "file")]
    data: Option<String>,

    /// A file holding the submission JSON.
    #[arg(long)]
    file: Option<PathBuf>,
}

impl AppendArgs {
    pub fn new(data: Option<String>, file: Option<PathBuf>) -> Self {
        Self { data, file }
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

fn default_kakeibo_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("kakeibo"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --kakeibo-home or KAKEIBO_HOME instead of relying on the default \
                kakeibo home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("kakeibo")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_append() {
        let args = Args::try_parse_from([
            "kakeibo",
            "--kakeibo-home",
            "/tmp/k",
            "append",
            "--data",
            r#"{"payer":"A"}"#,
        ])
        .unwrap();
        assert_eq!(args.common().kakeibo_home().path(), Path::new("/tmp/k"));
        match args.command() {
            Command::Append(append) => {
                assert_eq!(append.data(), Some(r#"{"payer":"A"}"#));
                assert!(append.file().is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_append_data_conflicts_with_file() {
        let result = Args::try_parse_from([
            "kakeibo", "append", "--data", "{}", "--file", "entry.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_serve_and_log_level() {
        let args = Args::try_parse_from([
            "kakeibo",
            "--log-level",
            "debug",
            "serve",
            "--listen",
            "0.0.0.0:9000",
        ])
        .unwrap();
        assert_eq!(args.common().log_level(), LevelFilter::DEBUG);
        match args.command() {
            Command::Serve(serve) => {
                assert_eq!(serve.listen(), Some("0.0.0.0:9000".parse().unwrap()))
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_init() {
        let args = Args::try_parse_from([
            "kakeibo",
            "init",
            "--sheet-url",
            "https://docs.google.com/spreadsheets/d/abc",
            "--client-secret",
            "client_secret.json",
        ])
        .unwrap();
        match args.command() {
            Command::Init(init) => {
                assert_eq!(init.client_secret(), Path::new("client_secret.json"));
                assert_eq!(init.sheet_name(), None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
