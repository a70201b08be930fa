//! Module implementing the gateway webserver.
//!
//! The main server application is implemented in the [`App`] struct, which sets up routing and
//! middleware. To listen to incoming connections, use the [`server()`] function, which opens a TCP
//! listener, serves the application, and shuts down gracefully on termination signals.
//!
//! For end-to-end tests of the server, see the `etcdperf-test` crate, which runs the [`App`]
//! in-process against an in-memory store.

mod app;
mod middleware;
mod server;

pub use app::App;
pub use server::server;
