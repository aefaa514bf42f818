//! Frame-type demultiplexing at the socket boundary
//!
//! Text frames carry JSON control traffic, binary frames carry raw video. The
//! distinction is made on the websocket opcode, never by looking at content.

use tokio_tungstenite::tungstenite::Message;

use crate::LinkError;
use crate::types::{ControlMessage, UplinkMessage, VideoFrame};

/// One data frame as it crossed the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    Text(String),
    Binary(Vec<u8>),
}

impl WireFrame {
    /// Data frames only; ping/pong/close and raw frames yield `None`.
    pub(crate) fn from_message(message: Message) -> Option<Self> {
        match message {
            Message::Text(text) => Some(WireFrame::Text(text)),
            Message::Binary(bytes) => Some(WireFrame::Binary(bytes)),
            Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
        }
    }

    pub(crate) fn into_message(self) -> Message {
        match self {
            WireFrame::Text(text) => Message::Text(text),
            WireFrame::Binary(bytes) => Message::Binary(bytes),
        }
    }
}

/// Something to put on the wire.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Rover → console structured message
    Uplink(UplinkMessage),
    /// Console → rover structured message
    Downlink(ControlMessage),
    /// Rover → console video
    Frame(VideoFrame),
}

/// What the rover side makes of an inbound frame.
#[derive(Debug)]
pub enum Inbound {
    Control(ControlMessage),
    /// Text that is not a valid control message
    Malformed(LinkError),
    /// Binary payload; video never flows console → rover, so this is ignored
    UnexpectedBinary(usize),
}

impl From<WireFrame> for Inbound {
    fn from(frame: WireFrame) -> Self {
        match frame {
            WireFrame::Text(text) => match ControlMessage::from_json(&text) {
                Ok(message) => Inbound::Control(message),
                Err(err) => Inbound::Malformed(err),
            },
            WireFrame::Binary(bytes) => Inbound::UnexpectedBinary(bytes.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Command;

    #[test]
    fn text_is_parsed_binary_is_not() {
        let control = Inbound::from(WireFrame::Text(r#"{"command":"stop"}"#.into()));
        assert!(matches!(control, Inbound::Control(ControlMessage { command: Command::Stop, .. })));

        // Binary that happens to contain valid JSON is still binary.
        let json_bytes = br#"{"command":"forward"}"#.to_vec();
        assert!(matches!(Inbound::from(WireFrame::Binary(json_bytes)), Inbound::UnexpectedBinary(21)));

        let garbage = Inbound::from(WireFrame::Text("{\"command\":".into()));
        assert!(matches!(garbage, Inbound::Malformed(LinkError::Protocol { .. })));
    }

    #[test]
    fn control_frames_are_not_data() {
        assert_eq!(WireFrame::from_message(Message::Ping(vec![1])), None);
        assert_eq!(WireFrame::from_message(Message::Close(None)), None);
        assert_eq!(
            WireFrame::from_message(Message::Binary(vec![0xff, 0xd8])),
            Some(WireFrame::Binary(vec![0xff, 0xd8]))
        );
    }
}
