//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` carries chat commands from clients and
//! pushes message, read-receipt and typing events back to them.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
