use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// What the stub server does with one incoming connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StubReply {
    /// Answers with a complete HTTP response and closes the connection.
    Respond {
        /// Status code of the response.
        status: u16,
        /// Value of the `Content-Type` header.
        content_type: String,
        /// Response body.
        body: String,
    },
    /// Accepts the connection and never writes anything.
    Silent,
}

impl StubReply {
    /// A JSON response.
    #[inline]
    pub fn json<S: Into<String>>(status: u16, body: S) -> Self {
        Self::Respond {
            status,
            content_type: "application/json".to_owned(),
            body: body.into(),
        }
    }

    /// A plain text response.
    #[inline]
    pub fn text<S: Into<String>>(status: u16, body: S) -> Self {
        Self::Respond {
            status,
            content_type: "text/plain".to_owned(),
            body: body.into(),
        }
    }
}

/// A local HTTP endpoint that replays scripted replies, one per connection,
/// in order. Connections past the end of the script are dropped.
pub struct StubServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl StubServer {
    /// Binds to a random local port and starts serving `replies`.
    pub async fn start(replies: impl Into<Vec<StubReply>>) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let replies: VecDeque<_> = replies.into().into();
        let task = tokio::spawn(serve(listener, replies));
        Ok(Self { addr, task })
    }

    /// Returns the base URL, like `http://127.0.0.1:<port>`.
    #[inline]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(listener: TcpListener, mut replies: VecDeque<StubReply>) {
    // Silent connections stay open until the server is dropped.
    let mut held = vec![];
    while let Some(reply) = replies.pop_front() {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };
        match reply {
            StubReply::Silent => held.push(stream),
            StubReply::Respond {
                status,
                content_type,
                body,
            } => {
                if read_request(&mut stream).await.is_err() {
                    continue;
                }
                let head = format!(
                    "HTTP/1.1 {status} Stub\r\n\
                     Content-Type: {content_type}\r\n\
                     Content-Length: {}\r\n\
                     Connection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(head.as_bytes()).await;
                let _ = stream.write_all(body.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        }
    }
    std::future::pending::<()>().await;
}

/// Reads the request head and body, so closing the connection afterwards
/// doesn't reset it while the client is still writing.
async fn read_request(stream: &mut TcpStream) -> io::Result<()> {
    let mut buf = vec![];
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let mut received = buf.len() - head_end;
    while received < content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        received += n;
    }
    Ok(())
}
