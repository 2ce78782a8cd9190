//! WebSocket transport
//!
//! Adapts a `tokio_tungstenite::WebSocketStream` to [`FrameSource`] and
//! [`FrameSink`]. The opening handshake is done by the caller.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;

use super::frame::{Frame, FrameType};
use super::transport::{FrameSink, FrameSource};
use crate::error::TransportError;

/// Read half of a websocket
pub struct WsSource<S> {
    inner: SplitStream<WebSocketStream<S>>,
}

/// Write half of a websocket
pub struct WsSink<S> {
    inner: SplitSink<WebSocketStream<S>, Message>,
}

/// Split an established websocket into transport halves
pub fn split<S>(ws: WebSocketStream<S>) -> (WsSource<S>, WsSink<S>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, stream) = ws.split();
    (WsSource { inner: stream }, WsSink { inner: sink })
}

fn to_frame(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::text(Bytes::copy_from_slice(text.as_bytes())),
        Message::Binary(data) => Frame::binary(data),
        Message::Ping(data) => Frame::new(FrameType::Ping, data),
        Message::Pong(data) => Frame::new(FrameType::Pong, data),
        Message::Close(_) => Frame::close(),
        Message::Frame(raw) => Frame::binary(Bytes::copy_from_slice(raw.payload())),
    }
}

fn to_message(frame: Frame) -> Message {
    match frame.frame_type {
        FrameType::Text => Message::text(String::from_utf8_lossy(&frame.payload).into_owned()),
        FrameType::Binary => Message::Binary(frame.payload),
        FrameType::Ping => Message::Ping(frame.payload),
        FrameType::Pong => Message::Pong(frame.payload),
        FrameType::Close => Message::Close(None),
    }
}

fn map_error(e: tungstenite::Error) -> TransportError {
    match e {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            TransportError::Closed
        }
        other => TransportError::failed(other),
    }
}

#[async_trait]
impl<S> FrameSource for WsSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn read_frame(&mut self) -> Result<Frame, TransportError> {
        match self.inner.next().await {
            Some(Ok(message)) => Ok(to_frame(message)),
            Some(Err(e)) => Err(map_error(e)),
            None => Err(TransportError::Closed),
        }
    }
}

#[async_trait]
impl<S> FrameSink for WsSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn write_frame(&mut self, frame: Frame) -> Result<(), TransportError> {
        self.inner.send(to_message(frame)).await.map_err(map_error)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner.close().await.map_err(map_error)
    }
}

#[cfg(test)]
mod tests {
    use tokio_tungstenite::tungstenite::protocol::Role;

    use super::*;

    async fn pair() -> (
        WebSocketStream<tokio::io::DuplexStream>,
        WebSocketStream<tokio::io::DuplexStream>,
    ) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        let server = WebSocketStream::from_raw_socket(a, Role::Server, None).await;
        let client = WebSocketStream::from_raw_socket(b, Role::Client, None).await;
        (server, client)
    }

    #[tokio::test]
    async fn test_text_round_trip() {
        let (server, mut client) = pair().await;
        let (mut source, mut sink) = split(server);

        sink.write_frame(Frame::text("{\"lat\":1}")).await.unwrap();
        let message = client.next().await.unwrap().unwrap();
        assert_eq!(message, Message::text("{\"lat\":1}".to_string()));

        client.send(Message::text("hello".to_string())).await.unwrap();
        let frame = source.read_frame().await.unwrap();
        assert_eq!(frame, Frame::text("hello"));
    }

    #[tokio::test]
    async fn test_client_close() {
        let (server, mut client) = pair().await;
        let (mut source, _sink) = split(server);

        client.close(None).await.unwrap();
        let frame = source.read_frame().await.unwrap();
        assert_eq!(frame.frame_type, FrameType::Close);
    }

    #[test]
    fn test_message_mapping() {
        assert_eq!(to_message(Frame::ping()), Message::Ping(Bytes::new()));
        assert_eq!(to_message(Frame::close()), Message::Close(None));
        assert_eq!(to_frame(Message::Pong(Bytes::new())).frame_type, FrameType::Pong);
        assert_eq!(
            to_frame(Message::Binary(Bytes::from_static(b"\x01\x02"))),
            Frame::binary(Bytes::from_static(b"\x01\x02"))
        );
    }
}
