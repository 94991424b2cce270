//! Order-sync relay between this service and the order-taking service.
//!
//! Two unary gRPC methods with JSON message bodies: `SubmitOrder` is served
//! here, `UpdateOrderStatus` is called on the peer.

pub mod client;
pub mod codec;
pub mod server;
pub mod types;

pub use client::{CallbackClient, OrderCallback};
pub use server::OrderReceiver;
