use std::net::SocketAddr;

use anyhow::{Context, Result};
use elegant_departure::tokio::Departure;
use tokio::net::{TcpListener, TcpSocket};
use tokio::signal::unix::SignalKind;

use crate::config::Config;
use crate::state::{ServiceState, State};
use crate::web::app::App;

/// The maximum backlog for TCP listen sockets before refusing connections.
const TCP_LISTEN_BACKLOG: u32 = 1024;

/// Runs the gateway HTTP server.
///
/// Binds the listener before connecting to the store, so that a taken port fails fast. Runs until
/// SIGTERM, SIGINT, SIGHUP, or SIGQUIT is received, then drains open connections.
pub async fn server(config: Config) -> Result<()> {
    tracing::info!("Starting server");

    let listener = listen(config.http_addr).context("failed to start TCP listener")?;
    let state = State::new(config).context("failed to connect to store")?;

    let signals = elegant_departure::tokio::depart()
        .on_termination()
        .on_sigint()
        .on_signal(SignalKind::hangup())
        .on_signal(SignalKind::quit());

    serve_until(listener, state, signals).await
}

/// Serves the gateway until `departure` initiates shutdown and all open connections are drained.
async fn serve_until(
    listener: TcpListener,
    state: ServiceState,
    departure: Departure<'_>,
) -> Result<()> {
    let server_handle = tokio::spawn(async move {
        App::new(state)
            .graceful_shutdown(true)
            .serve(listener)
            .await
    });

    tokio::spawn(async move {
        elegant_departure::get_shutdown_guard().wait().await;
        tracing::info!("Shutting down ...");
    });

    departure.await;

    let server_result = server_handle
        .await
        .map_err(anyhow::Error::from)
        .and_then(|result| result);
    tracing::info!("Shutdown complete");
    server_result
}

fn listen(addr: SocketAddr) -> Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }?;

    // rebinding must not wait for connections of a previous run in TIME_WAIT, while a second
    // gateway on the same port must still fail
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;

    let listener = socket.listen(TCP_LISTEN_BACKLOG)?;
    tracing::info!("HTTP server listening on {addr}");

    Ok(listener)
}
