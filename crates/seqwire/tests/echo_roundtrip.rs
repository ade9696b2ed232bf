use std::sync::Arc;

use bytes::BytesMut;
use seqwire::frame::{encode_frame, FrameReader};
use seqwire::{ClientConfig, Endpoint, FramedTransport, Session};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

#[tokio::test]
async fn echo_roundtrip_through_facade() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = Endpoint::from(listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut frames = FrameReader::new(read_half);
        let mut buf = BytesMut::new();
        while let Ok(frame) = frames.read_frame().await {
            buf.clear();
            let reversed: Vec<u8> = frame.body.iter().rev().copied().collect();
            encode_frame(frame.sequence + 100, &reversed, &mut buf).unwrap();
            write_half.write_all(&buf).await.unwrap();
        }
    });

    let transport = FramedTransport::new(
        Arc::new(Session::new(endpoint)),
        ClientConfig::default(),
    );

    let messages: [&[u8]; 3] = [b"abc", b"", b"seqwire"];
    for (i, message) in messages.into_iter().enumerate() {
        transport.send(message.to_vec()).await.unwrap();
        let echo = transport.receive().await.unwrap();
        let expected: Vec<u8> = message.iter().rev().copied().collect();
        assert_eq!(echo.sequence, 100 + i as u32);
        assert_eq!(echo.body.as_ref(), expected.as_slice());
    }

    transport.dispose().await;
    server.await.unwrap();
}
