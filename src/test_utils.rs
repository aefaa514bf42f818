//! Test utilities shared by the unit tests
//!
//! In-memory websocket pairs and a few fixtures so session-level behavior can
//! be exercised without binding sockets.

#![cfg(test)]

use tokio::io::DuplexStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::Role;

/// Buffer size of the in-memory pipe behind [`ws_pair`]
const PIPE_CAPACITY: usize = 64 * 1024;

/// A connected (rover side, console side) websocket pair over an in-memory pipe.
pub async fn ws_pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
    let (server_io, client_io) = tokio::io::duplex(PIPE_CAPACITY);
    let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
    let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
    (server, client)
}
