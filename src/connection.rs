use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use uuid::Uuid;

use crate::codec::{ProtocolError, Request, RequestCodec};
use crate::frame::Frame;

/// A client connection. Requests are decoded from the read half, replies are encoded into the
/// write half.
pub struct Connection {
    pub id: Uuid,
    pub client_address: SocketAddr,
    reader: FramedRead<OwnedReadHalf, RequestCodec>,
    writer: FramedWrite<OwnedWriteHalf, RequestCodec>,
}

impl Connection {
    pub fn new(stream: TcpStream, client_address: SocketAddr, max_request_size: usize) -> Connection {
        let (reader, writer) = stream.into_split();

        Connection {
            id: Uuid::new_v4(),
            client_address,
            reader: FramedRead::new(reader, RequestCodec::new(max_request_size)),
            writer: FramedWrite::new(writer, RequestCodec::new(max_request_size)),
        }
    }

    /// Reads the next request. Returns `None` once the peer closed the connection.
    pub async fn read_request(&mut self) -> Result<Option<Request>, ProtocolError> {
        self.reader.next().await.transpose()
    }

    pub async fn write_frame(&mut self, frame: Frame) -> Result<(), ProtocolError> {
        self.writer.send(frame).await
    }
}
