use crate::codec;
use crate::message::Message;
use bytes::{BufMut, Bytes, BytesMut};
use color_eyre::eyre::{eyre, Report, WrapErr};
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// A framed ring link.
///
/// Each frame is a 4-byte big-endian byte count followed by the UTF-16BE
/// encoding of the textual message form. The length-delimited codec holds
/// partial frames back until the whole chunk has arrived, so a record is
/// only ever surfaced complete.
#[derive(Debug)]
pub struct Connection {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            framed: Framed::new(stream, LengthDelimitedCodec::new()),
        }
    }

    /// Receives the next frame. `Some(Err(_))` is an undecodable payload;
    /// it is recoverable, the caller drops it and keeps reading. `None`
    /// means the stream ended.
    pub async fn recv(&mut self) -> Option<Result<Message, Report>> {
        match self.framed.next().await {
            Some(Ok(bytes)) => {
                let len = bytes.len();
                Some(deserialize(bytes).ok_or_else(|| {
                    eyre!("undecodable payload of {} bytes", len)
                }))
            }
            Some(Err(e)) => {
                tracing::warn!("error while reading from stream: {:?}", e);
                None
            }
            None => None,
        }
    }

    /// Frames, writes and flushes one message.
    pub async fn send(&mut self, msg: &Message) -> Result<(), Report> {
        self.framed
            .send(serialize(msg))
            .await
            .wrap_err("error while sending to sink")
    }

    /// Gracefully closes the write side.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.framed.get_mut().shutdown().await {
            tracing::warn!("error while shutting down stream: {:?}", e);
        }
    }
}

fn serialize(msg: &Message) -> Bytes {
    let text = codec::encode(msg);
    let mut bytes = BytesMut::with_capacity(text.len() * 2);
    for unit in text.encode_utf16() {
        bytes.put_u16(unit);
    }
    bytes.freeze()
}

fn deserialize(bytes: BytesMut) -> Option<Message> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    let text = String::from_utf16(&units).ok()?;
    codec::decode(&text)
}
