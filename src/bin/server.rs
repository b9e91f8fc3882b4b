use clap::Parser;
use polydis::codec::DEFAULT_MAX_REQUEST_SIZE;
use polydis::server::{self, Config};
use polydis::Error;

const PORT: u16 = 6379;

/// An in-memory key-value server speaking the Redis protocol.
#[derive(Parser, Debug)]
struct Args {
    /// The address to bind to
    #[arg(short, long, default_value = "127.0.0.1", env = "POLYDIS_BIND")]
    bind: String,

    /// The port to listen on
    #[arg(short, long, default_value_t = PORT, env = "POLYDIS_PORT")]
    port: u16,

    /// Largest request, in bytes, a connection may buffer before it is closed
    #[arg(long, default_value_t = DEFAULT_MAX_REQUEST_SIZE, env = "POLYDIS_MAX_REQUEST_SIZE")]
    max_request_size: usize,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    server::run(Config {
        bind: args.bind,
        port: args.port,
        max_request_size: args.max_request_size,
    })
    .await
}
