//! OAuth 2.0 for the Google Sheets API.
//!
//! `kakeibo auth` runs the installed-app consent flow: the user opens a Google URL, approves, and
//! Google redirects the browser to a one-shot loopback server that hands us the authorization
//! code. The code is exchanged (with PKCE) for tokens, which are saved to `token.json`. Later runs
//! only load `token.json` and refresh the access token when it is about to expire; they never
//! open a browser.

use crate::api::files::{File, SecretFile, TokenFile};
use crate::api::OAUTH_SCOPES;
use crate::Result;
use anyhow::{anyhow, bail, ensure, Context};
use chrono::Utc;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use std::convert::Infallible;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// How long `kakeibo auth` waits for the user to finish in the browser.
const CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Google access tokens live for an hour when the response does not say otherwise.
const DEFAULT_EXPIRES_IN: Duration = Duration::from_secs(3600);

type GoogleClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Holds the client secret and the token file, and keeps the access token fresh.
#[derive(Debug, Clone)]
pub(crate) struct TokenProvider {
    secret: SecretFile,
    token: File<TokenFile>,
}

impl TokenProvider {
    /// Loads existing credentials. Fails when either file is missing or the token lacks a
    /// required scope; the remedy in both cases is `kakeibo auth`.
    pub(crate) async fn load(
        secret_path: impl Into<PathBuf>,
        token_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let secret_path = secret_path.into();
        let token_path = token_path.into();
        let secret = SecretFile::load(&secret_path).await?;
        ensure!(
            token_path.is_file(),
            "No OAuth token found at '{}'. Run 'kakeibo auth' first",
            token_path.display()
        );
        let token: File<TokenFile> = File::load(&token_path)
            .await
            .context("Unable to read the token JSON file")?;
        token.data().validate_scopes()?;
        Ok(Self { secret, token })
    }

    /// Runs the browser consent flow and saves the resulting tokens to `token_path`.
    pub(crate) async fn initialize(
        secret_path: impl Into<PathBuf>,
        token_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let secret_path = secret_path.into();
        let secret = SecretFile::load(&secret_path).await.with_context(|| {
            format!(
                "The OAuth client secret file is needed at '{}'",
                secret_path.display()
            )
        })?;
        let token_file = consent_flow(&secret).await?;
        let token = File::new(token_path, token_file);
        token.save().await?;
        info!("Tokens saved to {}", token.path().display());
        Ok(Self { secret, token })
    }

    /// The current access token, which may be expired.
    pub(crate) fn token(&self) -> &str {
        self.token.data().access_token()
    }

    /// Exchanges the refresh token for a new access token and saves it.
    pub(crate) async fn refresh(&mut self) -> Result<()> {
        debug!("Refreshing the OAuth access token");
        let client = oauth_client(&self.secret)?;
        let refresh_token = RefreshToken::new(self.token.data().refresh_token().to_string());
        let response = client
            .exchange_refresh_token(&refresh_token)
            .request_async(&http_client()?)
            .await
            .map_err(|e| anyhow!("Failed to refresh the access token: {e}"))?;

        let expires_at = expires_at(&response)?;
        self.token.data_mut().update(
            response.access_token().secret().clone(),
            expires_at,
            response.refresh_token().map(|t| t.secret().clone()),
        );
        self.token.save().await?;
        debug!("Access token valid until {expires_at}");
        Ok(())
    }

    /// Returns an access token, refreshing it first when it is about to expire.
    pub(crate) async fn token_with_refresh(&mut self) -> Result<String> {
        if self.token.data().is_expired() {
            self.refresh().await?;
        }
        Ok(self.token().to_string())
    }
}

fn oauth_client(secret: &SecretFile) -> Result<GoogleClient> {
    Ok(BasicClient::new(ClientId::new(secret.client_id().to_string()))
        .set_client_secret(ClientSecret::new(secret.client_secret().to_string()))
        .set_auth_uri(AuthUrl::new(secret.auth_uri().to_string()).context("Invalid auth_uri")?)
        .set_token_uri(
            TokenUrl::new(secret.token_uri().to_string()).context("Invalid token_uri")?,
        ))
}

/// Token endpoints must not be followed through redirects.
fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("Unable to create the HTTP client")
}

fn expires_at(response: &BasicTokenResponse) -> Result<chrono::DateTime<Utc>> {
    let expires_in = response.expires_in().unwrap_or(DEFAULT_EXPIRES_IN);
    let expires_in = chrono::Duration::from_std(expires_in).context("Bad token lifetime")?;
    Ok(Utc::now() + expires_in)
}

async fn consent_flow(secret: &SecretFile) -> Result<TokenFile> {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .context("Unable to start the OAuth callback listener")?;
    let port = listener.local_addr()?.port();
    let redirect = RedirectUrl::new(format!("http://localhost:{port}"))?;
    let client = oauth_client(secret)?.set_redirect_uri(redirect);

    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let (url, csrf) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(OAUTH_SCOPES.iter().map(|s| Scope::new(s.to_string())))
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .set_pkce_challenge(challenge)
        .url();

    info!("Open this URL in your browser to give kakeibo access to your sheet:\n\n{url}\n");

    let callback = tokio::time::timeout(CONSENT_TIMEOUT, wait_for_callback(listener))
        .await
        .map_err(|_| anyhow!("Timed out waiting for the browser to finish authorization"))??;

    if let Some(error) = callback.error {
        bail!("Authorization was denied: {error}");
    }
    ensure!(
        callback.state.as_deref() == Some(csrf.secret().as_str()),
        "The OAuth state did not match; try 'kakeibo auth' again"
    );
    let code = callback
        .code
        .context("The OAuth callback did not contain a code")?;

    let response = client
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(verifier)
        .request_async(&http_client()?)
        .await
        .map_err(|e| anyhow!("Failed to exchange the authorization code: {e}"))?;

    let refresh_token = response
        .refresh_token()
        .map(|t| t.secret().clone())
        .context("Google did not return a refresh token")?;
    let scopes = match response.scopes() {
        Some(scopes) => scopes.iter().map(|s| s.as_str().to_string()).collect(),
        None => OAUTH_SCOPES.iter().map(|s| s.to_string()).collect(),
    };
    let token = TokenFile::new(
        scopes,
        response.access_token().secret().clone(),
        refresh_token,
        expires_at(&response)?,
    );
    token.validate_scopes()?;
    info!("Authorization successful");
    Ok(token)
}

/// Query parameters Google sends to the redirect URI.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Callback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

impl Callback {
    /// `None` for requests that are not the OAuth redirect, like `/favicon.ico`.
    fn from_query(query: &str) -> Option<Self> {
        let mut callback = Callback::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "code" => callback.code = Some(value.into_owned()),
                "state" => callback.state = Some(value.into_owned()),
                "error" => callback.error = Some(value.into_owned()),
                _ => {}
            }
        }
        if callback.code.is_some() || callback.error.is_some() {
            Some(callback)
        } else {
            None
        }
    }
}

/// Serves the loopback redirect until a request carrying the OAuth result arrives.
async fn wait_for_callback(listener: TcpListener) -> Result<Callback> {
    let (tx, mut rx) = mpsc::channel::<Callback>(1);
    loop {
        tokio::select! {
            Some(callback) = rx.recv() => return Ok(callback),
            accepted = listener.accept() => {
                let (stream, _) = accepted.context("OAuth callback listener failed")?;
                let tx = tx.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let tx = tx.clone();
                        async move {
                            let callback = Callback::from_query(req.uri().query().unwrap_or_default());
                            let body = match &callback {
                                Some(_) => "kakeibo: authorization received, you can close this window.",
                                None => "kakeibo: waiting for authorization.",
                            };
                            if let Some(callback) = callback {
                                let _ = tx.send(callback).await;
                            }
                            Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(body))))
                        }
                    });
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        debug!("OAuth callback connection error: {e}");
                    }
                });
            }
        }
    }
}
