use crate::api::Mode;
use crate::commands::Out;
use crate::server::{self, Service};
use crate::{Config, Result};
use std::net::SocketAddr;

/// Handles `kakeibo serve`: accepts submissions over HTTP until Ctrl-C. `listen` overrides the
/// address from the config file.
pub async fn serve(config: Config, mode: Mode, listen: Option<SocketAddr>) -> Result<Out<()>> {
    let listen = listen.unwrap_or_else(|| config.listen());
    server::run(Service::new(config, mode), listen).await?;
    Ok("Stopped serving".into())
}
