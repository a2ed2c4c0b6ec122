//! Binary RPC transport: length-prefixed JSON signals over TCP.

mod client;
mod frame;
mod server;

pub use client::RpcTransceiver;
pub use frame::{MAX_FRAME_LEN, read_frame, write_frame};
pub use server::RpcEndpoint;
