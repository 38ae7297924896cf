pub mod config;
pub mod connectivity;
pub mod connector;
pub mod error;
pub mod events;
pub mod rpc;
pub mod schema;
pub mod session;
pub mod transport;

#[cfg(test)]
mod tests;

/// Protocol version sent with every RPC call and checked by the host app.
pub const CONNECTOR_API_VERSION: u32 = 2;

/// Version string this client advertises to the host app.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const HOST_APP_HOSTNAME: &str = "127.0.0.1";
pub const HOST_APP_PORT: u16 = 23119;
pub const HOST_APP_BASE_URL: &str =
    const_format::concatcp!("http://", HOST_APP_HOSTNAME, ":", HOST_APP_PORT);
