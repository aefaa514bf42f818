//! One rover, one bound console

mod common;

use common::{config, eventually, session_bound, start};
use roverlink::config::SessionPolicy;
use roverlink::console::{ButtonEdge, ConsoleEvent, OperatorConsole};
use roverlink::transport::CloseCode;
use roverlink::{Direction, MotionPrimitive, RouteId};
use std::time::Duration;

async fn closed<S>(events: &mut roverlink::console::ConsoleEvents<S>) -> (Option<CloseCode>, String)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    loop {
        let event = tokio::time::timeout(Duration::from_secs(3), events.next())
            .await
            .expect("close within 3s")
            .expect("closed event before end");
        if let ConsoleEvent::Closed { code, reason } = event {
            return (code, reason);
        }
    }
}

#[tokio::test]
async fn second_console_is_refused_while_bound() {
    let rover = start(config(SessionPolicy::Reject)).await;
    let (first, _first_events) = OperatorConsole::connect(&rover.link.url(), Some(RouteId::from("1"))).await.unwrap();
    session_bound(&rover.link, true).await;
    let bound = rover.link.active_session().await;

    let (_second, mut second_events) =
        OperatorConsole::connect(&rover.link.url(), Some(RouteId::from("1"))).await.unwrap();
    let (code, reason) = closed(&mut second_events).await;
    assert_eq!(code, Some(CloseCode::Policy));
    assert_eq!(reason, "rover busy");

    // The bound console still drives
    first.edge(ButtonEdge::Press(Direction::Left)).await.unwrap();
    eventually("left applied", || rover.actuator.current() == MotionPrimitive::Left).await;
    assert_eq!(rover.link.active_session().await, bound);

    first.close().await;
    rover.link.shutdown().await;
}

#[tokio::test]
async fn replace_policy_tears_down_previous_console() {
    let rover = start(config(SessionPolicy::Replace)).await;
    let (first, mut first_events) = OperatorConsole::connect(&rover.link.url(), Some(RouteId::from("2"))).await.unwrap();
    first.edge(ButtonEdge::Press(Direction::Forward)).await.unwrap();
    eventually("forward applied", || rover.actuator.current() == MotionPrimitive::Forward).await;

    let (second, _second_events) =
        OperatorConsole::connect(&rover.link.url(), Some(RouteId::from("2"))).await.unwrap();

    let (code, _) = closed(&mut first_events).await;
    assert_eq!(code, Some(CloseCode::Away));
    // The replaced session stopped the rover on its way out
    assert_eq!(rover.actuator.primitives()[..2], [MotionPrimitive::Forward, MotionPrimitive::Stop]);

    second.edge(ButtonEdge::Press(Direction::Right)).await.unwrap();
    eventually("right applied", || rover.actuator.current() == MotionPrimitive::Right).await;

    second.close().await;
    rover.link.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_a_moving_rover() {
    let rover = start(config(SessionPolicy::Reject)).await;
    let (console, _events) = OperatorConsole::connect(&rover.link.url(), Some(RouteId::from("9"))).await.unwrap();
    console.edge(ButtonEdge::Press(Direction::Backward)).await.unwrap();
    eventually("backward applied", || rover.actuator.current() == MotionPrimitive::Backward).await;

    let actuator = rover.actuator.clone();
    rover.link.shutdown().await;
    assert_eq!(actuator.current(), MotionPrimitive::Stop);
}
