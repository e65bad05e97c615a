//! Sign-in over a real TCP socket with varint length-prefixed frames

#![allow(clippy::unwrap_used, clippy::expect_used)]

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use im_signin::config::ClientConfig;
use im_signin::core::codec::FrameCodec;
use im_signin::protocol::message::try_decode_response_packet;
use im_signin::protocol::sink::ChannelSink;
use im_signin::transport::tcp::TcpConnector;
use im_signin::transport::{Connection, Connector, TransportEvent};
use im_signin::{encode_envelope, ConnectionState, LoginClient, ProtocolError, SignInRequest};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::codec::Framed;

/// Accept one connection, capture the first frame and answer it with `reply`.
async fn serve_once(reply: Option<Bytes>) -> (SocketAddr, oneshot::Receiver<Bytes>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, FrameCodec::default());

        let frame = framed.next().await.unwrap().unwrap();
        let _ = tx.send(frame);

        match reply {
            Some(reply) => {
                framed.send(reply).await.unwrap();
                // Hold the connection until the client goes away
                while framed.next().await.is_some() {}
            }
            None => drop(framed),
        }
    });

    (addr, rx)
}

fn config(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        server_url: format!("tcp://{addr}"),
        ..ClientConfig::default()
    }
}

#[tokio::test]
async fn test_login_over_tcp() {
    let reply = encode_envelope(1, 0, 0, "welcome", None);
    let (addr, sent) = serve_once(Some(reply)).await;

    let (sink, _events) = ChannelSink::new();
    let mut client = LoginClient::new(TcpConnector::default(), &config(addr), sink);
    let response = client.login_default(1001, 55, "abc").await.unwrap();

    assert_eq!(response.message, "welcome");
    assert_eq!(client.state(), &ConnectionState::Connected);

    let frame = sent.await.unwrap();
    let envelope = try_decode_response_packet(&frame).unwrap();
    let request = SignInRequest::decode(envelope.data.as_deref().unwrap()).unwrap();
    assert_eq!(request, SignInRequest::new(1001, 55, "abc"));

    client.disconnect();
    assert_eq!(client.state(), &ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_server_hangs_up() {
    let (addr, _sent) = serve_once(None).await;

    let (sink, _events) = ChannelSink::new();
    let mut client = LoginClient::new(TcpConnector::default(), &config(addr), sink);
    let err = client.login_default(1, 2, "t").await.unwrap_err();

    assert!(matches!(err, ProtocolError::ConnectionClosed));
    assert_eq!(client.state(), &ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_connect_refused() {
    // Bind then drop to get a port nobody is listening on
    let addr = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();

    let result = TcpConnector::default().connect(&format!("tcp://{addr}")).await;
    assert!(matches!(result, Err(ProtocolError::ConnectError(_))));
}

#[tokio::test]
async fn test_oversized_inbound_frame_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, FrameCodec::default());
        framed.send(Bytes::from(vec![0u8; 256])).await.unwrap();
        while framed.next().await.is_some() {}
    });

    let mut link = TcpConnector::new(64, 4)
        .connect(&addr.to_string())
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
