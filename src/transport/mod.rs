//! Transport session: one persistent websocket per console.
//!
//! Structured control messages travel as text frames and video as binary
//! frames on the same socket. [`TransportSession::spawn`] splits the socket
//! into a [`TransportReader`] (owned by the session worker) and a cloneable
//! [`TransportHandle`] whose single writer task serializes everything outbound.

mod codec;
mod session;
mod video_queue;

#[cfg(test)]
mod tests;

pub use codec::{Inbound, Outbound, WireFrame};
pub use session::{TransportHandle, TransportReader, TransportSession};
pub use video_queue::{PushOutcome, VideoQueue};
pub use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
