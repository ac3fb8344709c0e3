use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates `$KAKEIBO_HOME`, moves the OAuth client secret into `.secrets` and writes the initial
/// `config.json`.
///
/// # Arguments
/// - `kakeibo_home` - The directory to create, e.g. `$HOME/kakeibo`
/// - `secret_file` - The OAuth 2.0 client credentials JSON downloaded from Google Cloud
/// - `url` - The URL of the kakeibo Google Sheet
/// - `sheet_name` - The default tab for entries; the current year when `None`
pub async fn init(
    kakeibo_home: &Path,
    secret_file: &Path,
    url: &str,
    sheet_name: Option<&str>,
) -> Result<Out<()>> {
    let config = Config::create(kakeibo_home, secret_file, url, sheet_name)
        .await
        .context("Unable to create the data directory and configs")
        .pub_result(ErrorType::Config)?;
    Ok(format!(
        "Wrote {} with default sheet '{}'. Run 'kakeibo auth' next",
        config.config_path().display(),
        config.default_sheet_name()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::error_type;
    use crate::utils;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init() {
        let dir = TempDir::new().unwrap();
        let secret = dir.path().join("secret.json");
        utils::write(&secret, "{}").await.unwrap();
        let home = dir.path().join("kakeibo");
        let out = init(
            &home,
            &secret,
            "https://docs.google.com/spreadsheets/d/abc/edit",
            Some("2025"),
        )
        .await
        .unwrap();
        assert!(out.message().contains("'2025'"));
        assert!(out
            .message()
            .contains(&home.join("config.json").display().to_string()));
        assert!(home.join("config.json").is_file());
        assert!(home.join(".secrets").join("client_secret.json").is_file());
    }

    #[tokio::test]
    async fn test_init_bad_url_is_config_error() {
        let dir = TempDir::new().unwrap();
        let secret = dir.path().join("secret.json");
        utils::write(&secret, "{}").await.unwrap();
        let e = init(&dir.path().join("k"), &secret, "https://example.com/x", None)
            .await
            .unwrap_err();
        assert_eq!(error_type(&e), Some(ErrorType::Config));
    }
}
