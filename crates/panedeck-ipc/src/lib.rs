pub mod client;
pub mod protocol;

pub use client::SocketChannel;
pub use protocol::{ClientEvent, ClientFrame, OutputPayload, ServerFrame};
