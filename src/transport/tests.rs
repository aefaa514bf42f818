//! Transport tests over an in-memory websocket pair
//!
//! These verify that control traffic and video share one socket without
//! corrupting each other, and that closure is observed on both sides.

use super::*;
use crate::test_utils::ws_pair;
use crate::types::{Command, ControlMessage, RouteId, UplinkMessage, VideoFrame};
use futures::{SinkExt, StreamExt};
use proptest::prelude::*;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

fn ack(index: usize) -> UplinkMessage {
    UplinkMessage::ack(Command::StartRecording, format!("ack {index}"))
}

fn frame_payload(sequence: u64, len: usize) -> Vec<u8> {
    (0..len).map(|i| (sequence as usize + i) as u8).collect()
}

async fn interleave_and_collect(texts: usize, frames: usize, frame_len: usize) {
    let (server, mut client) = ws_pair().await;
    let session = TransportSession::spawn(server, frames.max(1));
    let handle = session.handle.clone();

    let video = {
        let handle = handle.clone();
        tokio::spawn(async move {
            for seq in 0..frames as u64 {
                handle
                    .send(Outbound::Frame(VideoFrame::new(frame_payload(seq, frame_len), seq)))
                    .await
                    .expect("frame accepted");
                tokio::task::yield_now().await;
            }
        })
    };
    let control = {
        let handle = handle.clone();
        tokio::spawn(async move {
            for index in 0..texts {
                handle.send(Outbound::Uplink(ack(index))).await.expect("ack accepted");
                tokio::task::yield_now().await;
            }
        })
    };
    video.await.unwrap();
    control.await.unwrap();

    let mut received_texts = Vec::new();
    let mut received_frames = Vec::new();
    while received_texts.len() < texts || received_frames.len() < frames {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("receiver stalled")
            .expect("stream ended early")
            .expect("websocket error");
        match message {
            Message::Text(text) => received_texts.push(UplinkMessage::from_json(&text).unwrap()),
            Message::Binary(bytes) => received_frames.push(bytes),
            other => panic!("unexpected message {other:?}"),
        }
    }

    let expected_texts: Vec<_> = (0..texts).map(ack).collect();
    assert_eq!(received_texts, expected_texts);
    let expected_frames: Vec<_> =
        (0..frames as u64).map(|seq| frame_payload(seq, frame_len)).collect();
    assert_eq!(received_frames, expected_frames);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn interleaved_text_and_binary_arrive_intact(
        texts in 0usize..40,
        frames in 0usize..40,
        frame_len in 1usize..4096,
    ) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(interleave_and_collect(texts, frames, frame_len));
    }
}

#[tokio::test]
async fn reader_demultiplexes_by_frame_type() {
    let (server, mut client) = ws_pair().await;
    let TransportSession { handle: _handle, mut reader } = TransportSession::spawn(server, 2);

    let downlink = ControlMessage::new(Command::Left, Some(RouteId::from("4")));
    client.send(Message::Text(downlink.to_json().unwrap())).await.unwrap();
    client.send(Message::Binary(br#"{"command":"stop"}"#.to_vec())).await.unwrap();
    client.send(Message::Text("{oops".into())).await.unwrap();

    let first = Inbound::from(reader.next().await.unwrap().unwrap());
    assert!(matches!(first, Inbound::Control(ref m) if *m == downlink));
    let second = Inbound::from(reader.next().await.unwrap().unwrap());
    assert!(matches!(second, Inbound::UnexpectedBinary(18)));
    let third = Inbound::from(reader.next().await.unwrap().unwrap());
    assert!(matches!(third, Inbound::Malformed(_)));
}

#[tokio::test]
async fn peer_close_ends_reader() {
    let (server, mut client) = ws_pair().await;
    let TransportSession { handle: _handle, mut reader } = TransportSession::spawn(server, 2);

    client.close(None).await.unwrap();
    let next = tokio::time::timeout(Duration::from_secs(2), reader.next()).await.unwrap();
    assert!(next.is_none());
}

#[tokio::test]
async fn local_close_sends_close_frame_after_pending_messages() {
    let (server, mut client) = ws_pair().await;
    let session = TransportSession::spawn(server, 2);

    session.handle.send_uplink(&ack(0)).await.unwrap();
    session.handle.close(CloseCode::Policy, "rover busy").await;

    let first = client.next().await.unwrap().unwrap();
    assert!(matches!(first, Message::Text(_)));
    match client.next().await.unwrap().unwrap() {
        Message::Close(Some(frame)) => {
            assert_eq!(frame.code, CloseCode::Policy);
            assert_eq!(frame.reason, "rover busy");
        }
        other => panic!("expected close frame, got {other:?}"),
    }

    tokio::time::timeout(Duration::from_secs(2), session.handle.closed()).await.unwrap();
    assert!(session.handle.send_uplink(&ack(1)).await.is_err());
    assert_eq!(
        session.handle.push_frame(VideoFrame::new(vec![1], 0)),
        PushOutcome::Closed
    );
}

#[tokio::test]
async fn dropped_socket_stops_writer() {
    let (server, client) = ws_pair().await;
    let session = TransportSession::spawn(server, 2);
    drop(client);

    // The writer only notices on its next write.
    let _ = session.handle.send_uplink(&ack(0)).await;
    let _ = session.handle.send_uplink(&ack(1)).await;
    tokio::time::timeout(Duration::from_secs(2), session.handle.closed()).await.unwrap();
    assert!(session.handle.is_closed());
}
