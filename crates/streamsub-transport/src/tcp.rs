use std::io::{ErrorKind, Read};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::traits::{Connector, SocketCloser, SubscriberSocket};

/// Default timeout for establishing the TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum bytes pulled from the socket per receive.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Smallest read timeout handed to the OS (a zero timeout is rejected).
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Subscriber side of a TCP broadcast.
pub struct TcpSubscriber {
    stream: TcpStream,
    endpoint: Endpoint,
    chunk: Box<[u8]>,
}

impl TcpSubscriber {
    /// Connect to a publisher with the default connect timeout.
    pub fn connect(endpoint: &Endpoint) -> Result<Self> {
        Self::connect_timeout(endpoint, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Connect to a publisher, giving up after `timeout`.
    pub fn connect_timeout(endpoint: &Endpoint, timeout: Duration) -> Result<Self> {
        let addr = endpoint.resolve()?;
        let stream =
            TcpStream::connect_timeout(&addr, timeout).map_err(|source| TransportError::Connect {
                endpoint: endpoint.to_string(),
                source,
            })?;
        debug!(%endpoint, %addr, "connected to publisher");
        Ok(Self::from_stream(stream, endpoint.clone()))
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream, endpoint: Endpoint) -> Self {
        Self {
            stream,
            endpoint,
            chunk: vec![0u8; READ_CHUNK_SIZE].into_boxed_slice(),
        }
    }

    /// The endpoint this subscriber is attached to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl SubscriberSocket for TcpSubscriber {
    fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Bytes>> {
        self.stream
            .set_read_timeout(Some(timeout.max(MIN_READ_TIMEOUT)))?;

        loop {
            match self.stream.read(&mut self.chunk) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => return Ok(Some(Bytes::copy_from_slice(&self.chunk[..n]))),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    return Ok(None)
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn closer(&self) -> Result<SocketCloser> {
        let handle = self.stream.try_clone()?;
        Ok(SocketCloser::new(move || {
            let _ = handle.shutdown(Shutdown::Both);
        }))
    }
}

impl std::fmt::Debug for TcpSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpSubscriber")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Opens [`TcpSubscriber`] sockets.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    /// Timeout for establishing each connection.
    pub connect_timeout: Duration,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl Connector for TcpConnector {
    fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn SubscriberSocket>> {
        let subscriber = TcpSubscriber::connect_timeout(endpoint, self.connect_timeout)?;
        info!(%endpoint, "subscribed to broadcast");
        Ok(Box::new(subscriber))
    }
}

/// Connect to a publisher from async code.
#[cfg(feature = "async")]
pub async fn connect_async(endpoint: &Endpoint) -> Result<tokio::net::TcpStream> {
    let stream = tokio::net::TcpStream::connect((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(|source| TransportError::Connect {
            endpoint: endpoint.to_string(),
            source,
        })?;
    info!(%endpoint, "subscribed to broadcast");
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    fn publisher() -> (TcpListener, Endpoint) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = Endpoint::from(listener.local_addr().unwrap());
        (listener, endpoint)
    }

    #[test]
    fn receives_published_bytes() {
        let (listener, endpoint) = publisher();
        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            conn.write_all(b"broadcast").unwrap();
            thread::sleep(Duration::from_millis(200));
        });

        let mut sub = TcpSubscriber::connect(&endpoint).unwrap();
        let mut got = Vec::new();
        while got.len() < 9 {
            if let Some(chunk) = sub.recv_timeout(Duration::from_secs(2)).unwrap() {
                got.extend_from_slice(&chunk);
            }
        }
        assert_eq!(got, b"broadcast");
        server.join().unwrap();
    }

    #[test]
    fn timeout_is_not_an_error() {
        let (listener, endpoint) = publisher();
        let server = thread::spawn(move || {
            let (conn, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(300));
            drop(conn);
        });

        let mut sub = TcpSubscriber::connect(&endpoint).unwrap();
        let polled = sub.recv_timeout(Duration::from_millis(20)).unwrap();
        assert!(polled.is_none());
        server.join().unwrap();
    }

    #[test]
    fn publisher_eof_is_closed() {
        let (listener, endpoint) = publisher();
        let server = thread::spawn(move || {
            let (conn, _) = listener.accept().unwrap();
            drop(conn);
        });

        let mut sub = TcpSubscriber::connect(&endpoint).unwrap();
        server.join().unwrap();

        let err = loop {
            match sub.recv_timeout(Duration::from_millis(200)) {
                Ok(None) => continue,
                Ok(Some(_)) => panic!("no data was published"),
                Err(err) => break err,
            }
        };
        assert!(matches!(err, TransportError::Closed | TransportError::Io(_)));
    }

    #[test]
    fn closer_wakes_blocked_receive() {
        let (listener, endpoint) = publisher();
        let server = thread::spawn(move || {
            let (conn, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_secs(2));
            drop(conn);
        });

        let mut sub = TcpSubscriber::connect(&endpoint).unwrap();
        let closer = sub.closer().unwrap();
        let waker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            closer.close();
        });

        let started = std::time::Instant::now();
        let result = sub.recv_timeout(Duration::from_secs(10));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!matches!(result, Ok(Some(_))));

        waker.join().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn connect_refused_reports_endpoint() {
        let (listener, endpoint) = publisher();
        drop(listener);

        let err = TcpConnector::default()
            .connect(&endpoint)
            .err()
            .expect("nothing is listening");
        match err {
            TransportError::Connect { endpoint: ep, .. } => assert_eq!(ep, endpoint.to_string()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn connect_async_reaches_publisher() {
        let (listener, endpoint) = publisher();
        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            conn.write_all(b"x").unwrap();
        });

        let stream = connect_async(&endpoint).await.unwrap();
        assert!(stream.peer_addr().is_ok());
        server.join().unwrap();
    }
}
