//! Integration tests for TCP delivery over loopback

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use meshwave_core::{
    ClientRequest, MemoryEventSink, MessageKind, NodeEvent, NodeId, Outbound, RequestId, Transport,
    TransportError, WireMessage,
};
use meshwave_transport::{Dispatcher, SendPolicy, TcpTransport, receive_one};
use tokio::net::TcpListener;

async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    (listener, addr)
}

/// An address nothing listens on
async fn dead_address() -> SocketAddr {
    let (listener, addr) = bind().await;
    drop(listener);
    addr
}

#[tokio::test]
async fn test_send_one_frame() {
    let (listener, addr) = bind().await;
    let transport = TcpTransport::new();

    let request = ClientRequest {
        request_id: RequestId::generate(),
        term: "ubuntu".into(),
        client_address: "127.0.0.1:40000".parse().unwrap(),
    };
    let sent = WireMessage::ClientRequest(request);

    let receiver = tokio::spawn(async move { receive_one(&listener).await });
    tokio_test::assert_ok!(transport.send(addr, sent.clone()).await);

    let (_, received) = receiver.await.expect("join").expect("receive");
    assert_eq!(received, sent);
}

#[tokio::test]
async fn test_connection_refused() {
    let target = dead_address().await;
    let transport = TcpTransport::new().with_connect_timeout(Duration::from_secs(2));

    let result = transport
        .send(target, WireMessage::Wave { sender: NodeId(1) })
        .await;
    match result {
        Err(TransportError::ConnectionFailed { addr, .. }) => assert_eq!(addr, target),
        other => panic!("expected connection failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_dispatcher_over_tcp() {
    let (listener, addr) = bind().await;
    let dead = dead_address().await;
    let sink = Arc::new(MemoryEventSink::new());

    let dispatcher = Dispatcher::new(
        NodeId(1),
        Arc::new(TcpTransport::new()),
        sink.clone(),
        SendPolicy::default(),
    );

    let receiver = tokio::spawn(async move { receive_one(&listener).await });
    dispatcher.dispatch(vec![
        Outbound::new(dead, WireMessage::Wave { sender: NodeId(1) }),
        Outbound::new(addr, WireMessage::Reject { sender: NodeId(1) }),
    ]);
    dispatcher.drain().await;

    let (_, received) = receiver.await.expect("join").expect("receive");
    assert_eq!(received, WireMessage::Reject { sender: NodeId(1) });

    assert_eq!(sink.sent_count(MessageKind::Wave), 1);
    assert_eq!(sink.sent_count(MessageKind::Reject), 1);
    assert!(sink.events().iter().any(
        |e| matches!(e, NodeEvent::SendFailed { to, kind: MessageKind::Wave, .. } if *to == dead)
    ));
}
