//! The HTTP service behind `kakeibo serve`.
//!
//! A phone shortcut or form sends an expense either as `GET /?data=<json>` or as a `POST` with a
//! JSON body. Every response is a JSON `Reply` with status 200, except for unsupported methods.
//! A `GET` without `data` is answered with a ready message so the endpoint can be probed.

use crate::api::Mode;
use crate::commands::{submit, Reply};
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes, Incoming};
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Submissions are a few hundred bytes; anything far larger is refused unread.
const MAX_BODY_BYTES: usize = 64 * 1024;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What every request handler needs.
#[derive(Debug, Clone)]
pub(crate) struct Service {
    config: Config,
    mode: Mode,
}

impl Service {
    pub(crate) fn new(config: Config, mode: Mode) -> Self {
        Self { config, mode }
    }

    /// Answers one request. Never fails; failures are reported in the JSON body.
    pub(crate) async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let span = info_span!("request", id = %Uuid::new_v4(), method = %req.method());
        async move {
            let (status, reply) = self.respond(req).await;
            debug!("Responding {status}: {}", reply.to_json());
            json_response(status, &reply)
        }
        .instrument(span)
        .await
    }

    async fn respond<B>(&self, req: Request<B>) -> (StatusCode, Reply)
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let method = req.method().clone();
        match method {
            Method::GET => match data_param(req.uri().query()) {
                Some(json) => (StatusCode::OK, self.submit(&json).await),
                None => (StatusCode::OK, Reply::ready()),
            },
            Method::POST => match read_body(req).await {
                Ok(json) => (StatusCode::OK, self.submit(&json).await),
                Err(e) => (StatusCode::OK, Reply::failure(e)),
            },
            other => (
                StatusCode::METHOD_NOT_ALLOWED,
                Reply::failure(format!("Method {other} is not allowed")),
            ),
        }
    }

    async fn submit(&self, json: &str) -> Reply {
        submit(&self.config, self.mode, json).await
    }
}

/// Serves until Ctrl-C. Each connection is handled on its own task.
pub(crate) async fn run(service: Service, listen: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("Unable to listen on {listen}"))
        .pub_result(ErrorType::Service)?;
    let local = listener.local_addr().pub_result(ErrorType::Service)?;
    info!(
        "Listening on http://{local} ({} mode, default sheet '{}')",
        service.mode,
        service.config.default_sheet_name()
    );

    let service = Arc::new(service);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("Unable to listen for Ctrl-C").pub_result(ErrorType::Service)?;
                info!("Shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Failed to accept a connection: {e}");
                        continue;
                    }
                };
                debug!("Connection from {peer}");
                let service = service.clone();
                tokio::spawn(async move {
                    let handler = service_fn(move |req: Request<Incoming>| {
                        let service = service.clone();
                        async move { Ok::<_, Infallible>(service.handle(req).await) }
                    });
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), handler)
                        .await
                    {
                        debug!("Connection from {peer} ended with an error: {e}");
                    }
                });
            }
        }
    }
}

/// The `data` query parameter, if present and non-empty.
fn data_param(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "data")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

async fn read_body<B>(req: Request<B>) -> std::result::Result<String, String>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let bytes = Limited::new(req.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| {
            if e.is::<LengthLimitError>() {
                format!("The request body is larger than {MAX_BODY_BYTES} bytes")
            } else {
                format!("Unable to read the request body: {e}")
            }
        })?
        .to_bytes();
    String::from_utf8(bytes.to_vec()).map_err(|e| format!("The request body is not UTF-8: {e}"))
}

fn json_response(status: StatusCode, reply: &Reply) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(reply.to_json())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/json; charset=utf-8"),
    );
    if status == StatusCode::METHOD_NOT_ALLOWED {
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("GET, POST"));
    }
    response
}
