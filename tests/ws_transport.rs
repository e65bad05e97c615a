//! Sign-in over a local WebSocket server

#![allow(clippy::unwrap_used, clippy::expect_used)]

use futures::{SinkExt, StreamExt};
use im_signin::config::ClientConfig;
use im_signin::protocol::message::try_decode_response_packet;
use im_signin::protocol::sink::{ChannelSink, SessionEvent};
use im_signin::transport::ws::WsConnector;
use im_signin::transport::{Connection, Connector, TransportEvent};
use im_signin::{encode_envelope, ConnectionState, LoginClient, ProtocolError};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

#[derive(Clone, Copy)]
enum Script {
    /// Send a text message first, then answer with code 0
    TextThenAccept,
    /// Answer with a close frame instead of a response
    CloseWithReason,
}

async fn serve_once(script: Script) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let request = loop {
            match ws.next().await {
                Some(Ok(Message::Binary(frame))) => break frame,
                Some(Ok(_)) => continue,
                _ => return,
            }
        };
        let envelope = try_decode_response_packet(&request).unwrap();
        assert_eq!(envelope.command, 1);

        match script {
            Script::TextThenAccept => {
                ws.send(Message::Text("hello".into())).await.unwrap();
                let reply = encode_envelope(1, envelope.request_id, 0, "OK", None);
                ws.send(Message::Binary(reply)).await.unwrap();
            }
            Script::CloseWithReason => {
                ws.send(Message::Close(Some(CloseFrame {
                    code: CloseCode::Policy,
                    reason: "bad token".into(),
                })))
                .await
                .unwrap();
            }
        }

        while let Some(Ok(_)) = ws.next().await {}
    });

    addr
}

fn config(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        server_url: format!("ws://{addr}/ws"),
        ..ClientConfig::default()
    }
}

#[tokio::test]
async fn test_login_over_websocket_ignores_text() {
    let addr = serve_once(Script::TextThenAccept).await;

    let (sink, mut events) = ChannelSink::new();
    let mut client = LoginClient::new(WsConnector::default(), &config(addr), sink);
    let response = client.login_default(1001, 55, "abc").await.unwrap();

    assert_eq!(response.message, "OK");
    assert_eq!(Some(response.request_id), client.session().request_id());
    assert_eq!(client.state(), &ConnectionState::Connected);
    assert!(matches!(
        events.recv().await,
        Some(SessionEvent::ConnectionStatus {
            connected: true,
            ..
        })
    ));
    assert!(matches!(
        events.recv().await,
        Some(SessionEvent::LoginResult { success: true, .. })
    ));

    client.disconnect();
}

#[tokio::test]
async fn test_close_frame_reason_is_reported() {
    let addr = serve_once(Script::CloseWithReason).await;

    let (sink, mut events) = ChannelSink::new();
    let mut client = LoginClient::new(WsConnector::default(), &config(addr), sink);
    let err = client.login_default(1, 2, "t").await.unwrap_err();

    assert!(matches!(err, ProtocolError::ConnectionClosed));
    assert_eq!(client.state(), &ConnectionState::Disconnected);

    let _connected = events.recv().await;
    assert_eq!(
        events.recv().await,
        Some(SessionEvent::ConnectionStatus {
            connected: false,
            message: "bad token".into()
        })
    );
}

#[tokio::test]
async fn test_rejects_non_websocket_url() {
    let result = WsConnector::default().connect("tcp://127.0.0.1:1").await;
    assert!(matches!(result, Err(ProtocolError::ConnectError(_))));
}

#[tokio::test]
async fn test_oversized_message_is_refused_while_reading() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Binary(vec![0u8; 256].into())).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let mut link = WsConnector::new(64, 4)
        .connect(&format!("ws://{addr}/ws"))
        .await
        .unwrap();

    assert!(matches!(
        link.events.recv().await,
        Some(TransportEvent::Error(_))
    ));
    assert_eq!(link.events.recv().await, Some(TransportEvent::Closed(None)));

    link.connection.close();
    assert!(!link.connection.is_open());
}
