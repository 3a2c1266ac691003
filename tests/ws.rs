//! End-to-end WebSocket chat over a real listener.

#![allow(clippy::panic, clippy::indexing_slicing)]

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use common::TestApp;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(app: &TestApp) -> SocketAddr {
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    let router = app.router.clone();
    tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;
    });
    addr
}

async fn connect(addr: SocketAddr, token: &str) -> Client {
    let Ok((socket, _)) = connect_async(format!("ws://{addr}/ws?access_token={token}")).await
    else {
        panic!("ws connect failed");
    };
    socket
}

async fn send(client: &mut Client, id: &str, payload: Value) {
    let frame = json!({ "id": id, "type": "command", "payload": payload });
    let Ok(()) = client.send(Message::text(frame.to_string())).await else {
        panic!("ws send failed");
    };
}

/// Next text frame as JSON, failing after two seconds.
async fn next_json(client: &mut Client) -> Value {
    loop {
        let Ok(Some(Ok(frame))) = tokio::time::timeout(Duration::from_secs(2), client.next()).await
        else {
            panic!("no frame received");
        };
        if let Message::Text(text) = frame {
            let Ok(value) = serde_json::from_str::<Value>(text.as_str()) else {
                panic!("frame is not JSON: {text}");
            };
            return value;
        }
    }
}

#[tokio::test]
async fn upgrade_without_token_is_rejected() {
    let app = TestApp::new();
    let addr = serve(&app).await;
    match connect_async(format!("ws://{addr}/ws")).await {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), 401);
        }
        other => panic!("expected 401, got {other:?}"),
    }
}

#[tokio::test]
async fn messages_reach_the_recipient() {
    let app = TestApp::new();
    let (employer_id, employer_token) = app.register("boss@jobs.test", "EMPLOYER").await;
    let (student_id, student_token) = app.register("stu@jobs.test", "STUDENT").await;
    let addr = serve(&app).await;

    let mut student = connect(addr, &student_token).await;
    let mut employer = connect(addr, &employer_token).await;

    send(
        &mut employer,
        "m1",
        json!({ "command": "send_message", "recipientId": student_id, "content": "Interview tomorrow?" }),
    )
    .await;

    let reply = next_json(&mut employer).await;
    assert_eq!(reply["type"], "response");
    assert_eq!(reply["id"], "m1");
    assert_eq!(reply["payload"]["event"], "receive_message");

    let pushed = next_json(&mut student).await;
    assert_eq!(pushed["type"], "event");
    assert_eq!(pushed["payload"]["event"], "receive_message");
    assert_eq!(pushed["payload"]["message"]["content"], "Interview tomorrow?");
    assert_eq!(pushed["payload"]["message"]["sender_id"].as_i64(), Some(employer_id));
    let conversation_id = pushed["payload"]["message"]["conversation_id"].clone();

    send(
        &mut student,
        "r1",
        json!({ "command": "mark_as_read", "conversation_id": conversation_id }),
    )
    .await;
    let receipt = next_json(&mut student).await;
    assert_eq!(receipt["payload"]["event"], "messages_marked_as_read");
    assert_eq!(receipt["payload"]["count"], 1);

    let read = next_json(&mut employer).await;
    assert_eq!(read["payload"]["event"], "messages_read");
    assert_eq!(read["payload"]["reader_id"].as_i64(), Some(student_id));
}

#[tokio::test]
async fn typing_reaches_joined_members_only() {
    let app = TestApp::new();
    let (_, employer_token) = app.register("boss@jobs.test", "EMPLOYER").await;
    let (student_id, student_token) = app.register("stu@jobs.test", "STUDENT").await;
    let (_, outsider_token) = app.register("other@jobs.test", "STUDENT").await;
    let addr = serve(&app).await;

    let mut employer = connect(addr, &employer_token).await;
    let mut student = connect(addr, &student_token).await;
    let mut outsider = connect(addr, &outsider_token).await;

    send(
        &mut employer,
        "m1",
        json!({ "command": "send_message", "recipient_id": student_id, "content": "hi" }),
    )
    .await;
    let reply = next_json(&mut employer).await;
    let conversation_id = reply["payload"]["message"]["conversation_id"].clone();
    let _ = next_json(&mut student).await;

    send(
        &mut outsider,
        "j0",
        json!({ "command": "join_conversation", "conversation_id": conversation_id }),
    )
    .await;
    let denied = next_json(&mut outsider).await;
    assert_eq!(denied["type"], "error");
    assert_eq!(denied["payload"]["code"], 403);

    send(
        &mut student,
        "j1",
        json!({ "command": "join_conversation", "conversation_id": conversation_id }),
    )
    .await;
    let joined = next_json(&mut student).await;
    assert_eq!(joined["payload"]["event"], "joined_conversation");

    send(
        &mut employer,
        "t1",
        json!({ "command": "update_typing", "conversation_id": conversation_id, "is_typing": true }),
    )
    .await;
    let ack = next_json(&mut employer).await;
    assert_eq!(ack["type"], "response");
    assert_eq!(ack["id"], "t1");

    let typing = next_json(&mut student).await;
    assert_eq!(typing["payload"]["event"], "user_typing");
    assert_eq!(typing["payload"]["is_typing"], true);
}

#[tokio::test]
async fn malformed_frames_get_an_error_envelope() {
    let app = TestApp::new();
    let (_, token) = app.register("stu@jobs.test", "STUDENT").await;
    let addr = serve(&app).await;
    let mut client = connect(addr, &token).await;

    let Ok(()) = client.send(Message::text("{not json".to_string())).await else {
        panic!("ws send failed");
    };
    let reply = next_json(&mut client).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["payload"]["code"], 400);

    send(&mut client, "x", json!({ "command": "dance" })).await;
    let reply = next_json(&mut client).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["id"], "x");
}
