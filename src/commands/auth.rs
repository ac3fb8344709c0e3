//! `kakeibo auth` and `kakeibo auth --verify`.

use crate::api::{self, Mode, TokenProvider};
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;

/// Runs the OAuth consent flow and saves the tokens. This is the only command that asks the user
/// to visit Google in a browser.
pub async fn auth(config: &Config) -> Result<Out<()>> {
    let _ = TokenProvider::initialize(config.client_secret_path(), config.token_path())
        .await
        .pub_result(ErrorType::Auth)?;
    Ok(format!("Saved OAuth tokens to {}", config.token_path().display()).into())
}

/// Refreshes the saved token and reads the default sheet to prove access. Never opens a browser;
/// a missing or unusable token is an error telling the user to run `kakeibo auth`.
pub async fn auth_verify(config: &Config) -> Result<Out<()>> {
    let mut token_provider = TokenProvider::load(config.client_secret_path(), config.token_path())
        .await
        .context(
            "Unable to use the existing tokens found in the token JSON file. \n\n\
            You should run 'kakeibo auth' (without the --verify flag).",
        )
        .pub_result(ErrorType::Auth)?;
    token_provider
        .refresh()
        .await
        .context("Unable to refresh the token")
        .pub_result(ErrorType::Auth)?;

    let sheet_name = config.default_sheet_name();
    let mut sheet = api::sheet(config, Mode::Google)
        .await
        .pub_result(ErrorType::Auth)?;
    let last_row = sheet
        .last_row(sheet_name)
        .await
        .with_context(|| format!("The token works but sheet '{sheet_name}' could not be read"))
        .pub_result(ErrorType::Sheet)?;
    Ok(format!("Your OAuth token is valid. Sheet '{sheet_name}' has {last_row} rows").into())
}
