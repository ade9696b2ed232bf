//! Round trip through an in-process echo server.
//!
//! Run with:
//!   cargo run -p seqwire --example echo

use std::error::Error;
use std::sync::Arc;

use bytes::BytesMut;
use seqwire::frame::{encode_frame, FrameReader};
use seqwire::{ClientConfig, Endpoint, FramedTransport, Session};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

type BoxError = Box<dyn Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .init();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let endpoint = Endpoint::from(listener.local_addr()?);
    eprintln!("Echo server listening on {endpoint}");

    // Echo every frame back with the same sequence number until disconnect.
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await?;
        let (read_half, mut write_half) = stream.into_split();
        let mut frames = FrameReader::new(read_half);
        let mut buf = BytesMut::new();

        loop {
            match frames.read_frame().await {
                Ok(frame) => {
                    buf.clear();
                    encode_frame(frame.sequence, &frame.body, &mut buf)?;
                    write_half.write_all(&buf).await?;
                }
                Err(e) => {
                    eprintln!("Client disconnected: {e}");
                    break;
                }
            }
        }
        Ok::<_, BoxError>(())
    });

    let session = Arc::new(Session::new(endpoint));
    let transport = FramedTransport::new(session, ClientConfig::default());

    for message in ["hello", "from", "seqwire"] {
        transport.send(message.as_bytes().to_vec()).await?;
        let echo = transport.receive().await?;
        eprintln!(
            "Echoed seq {}: {}",
            echo.sequence,
            String::from_utf8_lossy(&echo.body)
        );
    }

    transport.dispose().await;
    server.await??;
    Ok(())
}
