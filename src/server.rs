use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, instrument, warn};

use crate::codec::{ProtocolError, DEFAULT_MAX_REQUEST_SIZE};
use crate::commands::dispatch;
use crate::connection::Connection;
use crate::store::Store;

/// Name of the request that closes the connection. It never reaches the command table.
const QUIT: &str = "quit";

#[derive(Clone, Debug)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub max_request_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 6379,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
        }
    }
}

pub async fn run(config: Config) -> crate::Result<()> {
    let _ = tracing_subscriber::fmt()
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let listener = TcpListener::bind((config.bind.as_str(), config.port)).await?;
    serve(listener, config.max_request_size).await
}

/// Accepts connections on `listener` forever, every connection shares one store.
pub async fn serve(listener: TcpListener, max_request_size: usize) -> crate::Result<()> {
    let store = Store::new();

    info!("Server listening on {}", listener.local_addr()?);

    loop {
        let (socket, client_address) = listener.accept().await?;
        let store = store.clone();
        info!("Accepted connection from {:?}", client_address);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, client_address, store, max_request_size).await
            {
                warn!("Closing connection after protocol error: {}", e);
            }
        });
    }
}

#[instrument(
    name = "connection",
    skip(stream, store, max_request_size),
    fields(connection_id, client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    store: Store,
    max_request_size: usize,
) -> Result<(), ProtocolError> {
    let mut conn = Connection::new(stream, client_address, max_request_size);

    tracing::Span::current()
        .record("connection_id", conn.id.to_string())
        .record("client_address", conn.client_address.to_string());

    while let Some(request) = conn.read_request().await? {
        debug!("Received request from client: {:?}", request);

        if request.name == QUIT {
            break;
        }

        let reply = dispatch(request, &store);
        debug!("Sending reply to client: {:?}", reply);

        conn.write_frame(reply).await?;
    }

    info!("Connection closed");
    Ok(())
}
