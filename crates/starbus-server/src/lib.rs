//! Network front end for the property bus.
//!
//! One TCP listener serves both transports: connections whose first bytes
//! look like an HTTP request are upgraded to WebSocket, everything else is
//! treated as a raw JSON stream. Each connection gets its own decoder and
//! its own subscription to the bus event stream; the encoder is shared.

pub mod server;
mod session;

pub use server::Server;
