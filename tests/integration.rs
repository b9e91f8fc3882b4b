use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, Duration};

use polydis::codec::DEFAULT_MAX_REQUEST_SIZE;
use polydis::server::serve;

/// Starts a server with a fresh store on an ephemeral port.
async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(serve(listener, DEFAULT_MAX_REQUEST_SIZE));

    addr
}

async fn connect(addr: SocketAddr) -> TcpStream {
    TcpStream::connect(addr).await.unwrap()
}

/// Writes `request` and asserts the server answers with exactly `expected`.
async fn assert_reply(stream: &mut TcpStream, request: &[u8], expected: &[u8]) {
    stream.write_all(request).await.unwrap();

    let mut reply = vec![0; expected.len()];
    stream.read_exact(&mut reply).await.unwrap();

    assert_eq!(
        String::from_utf8_lossy(&reply),
        String::from_utf8_lossy(expected),
        "request: {:?}",
        String::from_utf8_lossy(request)
    );
}

/// Asserts the server closed the connection without writing anything else.
async fn assert_closed(stream: &mut TcpStream) {
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();

    assert!(rest.is_empty(), "unexpected bytes: {:?}", rest);
}

#[tokio::test]
async fn ping() {
    let mut stream = connect(start_server().await).await;

    assert_reply(&mut stream, b"PING\r\n", b"+PONG\r\n").await;
    assert_reply(&mut stream, b"*1\r\n$4\r\nping\r\n", b"+PONG\r\n").await;
}

#[tokio::test]
async fn set_and_get_with_both_encodings() {
    let mut stream = connect(start_server().await).await;

    assert_reply(
        &mut stream,
        b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n",
        b"+OK\r\n",
    )
    .await;
    assert_reply(&mut stream, b"get foo\r\n", b"$3\r\nbar\r\n").await;
    assert_reply(&mut stream, b"GET missing\r\n", b"$-1\r\n").await;
}

#[tokio::test]
async fn error_replies_keep_the_connection_open() {
    let mut stream = connect(start_server().await).await;

    assert_reply(&mut stream, b"FOO bar\r\n", b"-ERR unknown command 'foo'\r\n").await;
    assert_reply(
        &mut stream,
        b"GET\r\n",
        b"-ERR wrong number of arguments for 'get' command\r\n",
    )
    .await;
    // Inline requests keep empty tokens, so the double space adds an argument.
    assert_reply(
        &mut stream,
        b"GET  foo\r\n",
        b"-ERR wrong number of arguments for 'get' command\r\n",
    )
    .await;
    assert_reply(&mut stream, b"PING\r\n", b"+PONG\r\n").await;
}

#[tokio::test]
async fn integer_and_array_replies() {
    let mut stream = connect(start_server().await).await;

    assert_reply(&mut stream, b"RPUSH list a bc\r\n", b":2\r\n").await;
    assert_reply(
        &mut stream,
        b"LRANGE list 0 -1\r\n",
        b"*2\r\n$1\r\na\r\n$2\r\nbc\r\n",
    )
    .await;
    assert_reply(&mut stream, b"LRANGE nothing 0 -1\r\n", b"*0\r\n").await;
    assert_reply(&mut stream, b"HMGET h a\r\n", b"*1\r\n$-1\r\n").await;
}

#[tokio::test]
async fn wrong_type_error() {
    let mut stream = connect(start_server().await).await;

    assert_reply(&mut stream, b"LPUSH k v\r\n", b":1\r\n").await;
    assert_reply(
        &mut stream,
        b"GET k\r\n",
        b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n",
    )
    .await;
}

#[tokio::test]
async fn pipelined_requests_are_answered_in_order() {
    let mut stream = connect(start_server().await).await;

    assert_reply(
        &mut stream,
        b"INCR c\r\nINCR c\r\n*2\r\n$4\r\nINCR\r\n$1\r\nc\r\nGET c\r\n",
        b":1\r\n:2\r\n:3\r\n$1\r\n3\r\n",
    )
    .await;
}

#[tokio::test]
async fn store_is_shared_between_connections() {
    let addr = start_server().await;
    let mut first = connect(addr).await;
    let mut second = connect(addr).await;

    assert_reply(&mut first, b"SADD s a b\r\n", b":2\r\n").await;
    assert_reply(&mut second, b"SCARD s\r\n", b":2\r\n").await;
    assert_reply(&mut second, b"FLUSHALL\r\n", b"+OK\r\n").await;
    assert_reply(&mut first, b"DBSIZE\r\n", b":0\r\n").await;
}

#[tokio::test]
async fn keys_expire() {
    let mut stream = connect(start_server().await).await;

    assert_reply(&mut stream, b"SET k v PX 50\r\n", b"+OK\r\n").await;
    assert_reply(&mut stream, b"GET k\r\n", b"$1\r\nv\r\n").await;

    sleep(Duration::from_millis(100)).await;

    assert_reply(&mut stream, b"GET k\r\n", b"$-1\r\n").await;
    assert_reply(&mut stream, b"TTL k\r\n", b":-2\r\n").await;
}

#[tokio::test]
async fn quit_closes_without_reply() {
    let mut stream = connect(start_server().await).await;

    assert_reply(&mut stream, b"SET k v\r\n", b"+OK\r\n").await;
    stream.write_all(b"QUIT\r\n").await.unwrap();

    assert_closed(&mut stream).await;
}

#[tokio::test]
async fn protocol_error_closes_the_connection() {
    let addr = start_server().await;
    let mut stream = connect(addr).await;

    stream.write_all(b"*0\r\n").await.unwrap();
    assert_closed(&mut stream).await;

    let mut other = connect(addr).await;
    assert_reply(&mut other, b"PING\r\n", b"+PONG\r\n").await;
}

#[tokio::test]
async fn sorted_set_commands_reply_with_an_error() {
    let mut stream = connect(start_server().await).await;

    assert_reply(
        &mut stream,
        b"ZADD z 1 a\r\n",
        b"-ERR sorted set command 'zadd' is not supported\r\n",
    )
    .await;
}
