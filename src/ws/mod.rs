//! WebSocket transport: wire protocol, connection hub, socket handler

pub mod handler;
pub mod hub;
pub mod protocol;
