use std::fmt;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use percent_encoding::percent_decode_str;
use url::{Host, Url};

use crate::error::{Error, Result};
use crate::stream::Interrupt;

const DEFAULT_TCP_PORT: u16 = 2375;

/// Where the engine listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp { host: String, port: u16 },
}

impl Endpoint {
    /// Parse `unix:///path`, `tcp://host[:port]` or `http://host[:port]`.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || Error::InvalidEndpoint(raw.to_string());
        let url = Url::parse(raw).map_err(|_| invalid())?;
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid());
        }

        match url.scheme() {
            "unix" => {
                if url.host_str().is_some_and(|h| !h.is_empty()) || url.path().is_empty() {
                    return Err(invalid());
                }
                let path = percent_decode_str(url.path())
                    .decode_utf8()
                    .map_err(|_| invalid())?;
                Ok(Self::Unix(PathBuf::from(path.as_ref())))
            }
            "tcp" | "http" => {
                if !matches!(url.path(), "" | "/") {
                    return Err(invalid());
                }
                let host = match url.host() {
                    Some(Host::Domain(name)) if !name.is_empty() => name.to_string(),
                    Some(Host::Ipv4(addr)) => addr.to_string(),
                    Some(Host::Ipv6(addr)) => addr.to_string(),
                    _ => return Err(invalid()),
                };
                Ok(Self::Tcp {
                    host,
                    port: url.port().unwrap_or(DEFAULT_TCP_PORT),
                })
            }
            _ => Err(invalid()),
        }
    }

    /// Value for the `Host` request header.
    pub fn host_header(&self) -> String {
        match self {
            Self::Unix(_) => "localhost".to_string(),
            Self::Tcp { host, port } if host.contains(':') => format!("[{host}]:{port}"),
            Self::Tcp { host, port } => format!("{host}:{port}"),
        }
    }

    /// Open a connection. `timeout` bounds TCP connects; `None` waits as long
    /// as the OS does.
    pub fn connect(&self, timeout: Option<Duration>) -> Result<Connection> {
        self.open(timeout).map_err(|source| Error::Connect {
            endpoint: self.to_string(),
            source,
        })
    }

    fn open(&self, timeout: Option<Duration>) -> io::Result<Connection> {
        match self {
            #[cfg(unix)]
            Self::Unix(path) => Ok(Connection::Unix(UnixStream::connect(path)?)),
            #[cfg(not(unix))]
            Self::Unix(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "unix sockets are not available on this platform",
            )),
            Self::Tcp { host, port } => {
                let Some(timeout) = timeout else {
                    return Ok(Connection::Tcp(TcpStream::connect((host.as_str(), *port))?));
                };
                let mut last_err = None;
                for addr in (host.as_str(), *port).to_socket_addrs()? {
                    match TcpStream::connect_timeout(&addr, timeout) {
                        Ok(stream) => return Ok(Connection::Tcp(stream)),
                        Err(e) => last_err = Some(e),
                    }
                }
                Err(last_err.unwrap_or_else(|| {
                    io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
                }))
            }
        }
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
            Self::Tcp { .. } => write!(f, "tcp://{}", self.host_header()),
        }
    }
}

/// An open socket to the engine.
#[derive(Debug)]
pub enum Connection {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Connection {
    /// A second handle on the same socket, used to abort reads on the first.
    pub fn try_clone(&self) -> io::Result<Self> {
        match self {
            Self::Tcp(s) => s.try_clone().map(Self::Tcp),
            #[cfg(unix)]
            Self::Unix(s) => s.try_clone().map(Self::Unix),
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(s) => s.read(buf),
            #[cfg(unix)]
            Self::Unix(s) => s.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(s) => s.write(buf),
            #[cfg(unix)]
            Self::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(s) => s.flush(),
            #[cfg(unix)]
            Self::Unix(s) => s.flush(),
        }
    }
}

impl Interrupt for Connection {
    fn interrupt(&self) -> io::Result<()> {
        match self {
            Self::Tcp(s) => s.interrupt(),
            #[cfg(unix)]
            Self::Unix(s) => s.interrupt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_socket() {
        assert_eq!(
            Endpoint::parse("unix:///var/run/docker.sock").unwrap(),
            Endpoint::Unix(PathBuf::from("/var/run/docker.sock"))
        );
    }

    #[test]
    fn parses_tcp_with_and_without_port() {
        assert_eq!(
            Endpoint::parse("tcp://10.1.2.3:2376").unwrap(),
            Endpoint::Tcp {
                host: "10.1.2.3".into(),
                port: 2376
            }
        );
        assert_eq!(
            Endpoint::parse("http://engine.local/").unwrap(),
            Endpoint::Tcp {
                host: "engine.local".into(),
                port: 2375
            }
        );
    }

    #[test]
    fn parses_ipv6_literal() {
        let ep = Endpoint::parse("tcp://[::1]:2375").unwrap();
        assert_eq!(
            ep,
            Endpoint::Tcp {
                host: "::1".into(),
                port: 2375
            }
        );
        assert_eq!(ep.host_header(), "[::1]:2375");
        assert_eq!(ep.to_string(), "tcp://[::1]:2375");
    }

    #[test]
    fn rejects_malformed_hosts() {
        for raw in [
            "",
            "unix://",
            "npipe:////./pipe/docker_engine",
            "tcp://",
            "tcp://host:notaport",
            "tcp://:2375",
            "tcp://host:2375/v1.43",
            "tcp://host:2375?x=1",
            "unix://relative.sock",
        ] {
            let err = Endpoint::parse(raw).unwrap_err();
            assert!(matches!(err, Error::InvalidEndpoint(_)), "{raw}: {err}");
        }
    }

    #[test]
    fn unix_path_is_percent_decoded() {
        assert_eq!(
            Endpoint::parse("unix:///run/user/1000/docker%20engine.sock").unwrap(),
            Endpoint::Unix(PathBuf::from("/run/user/1000/docker engine.sock"))
        );
    }

    #[test]
    fn connects_over_tcp_with_and_without_timeout() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let ep = Endpoint::Tcp {
            host: "127.0.0.1".into(),
            port: listener.local_addr().unwrap().port(),
        };
        assert!(matches!(ep.connect(None).unwrap(), Connection::Tcp(_)));
        assert!(matches!(
            ep.connect(Some(Duration::from_secs(1))).unwrap(),
            Connection::Tcp(_)
        ));
    }

    #[test]
    fn connect_failure_names_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let ep = Endpoint::Unix(dir.path().join("missing.sock"));
        let err = ep.connect(Some(Duration::from_secs(1))).unwrap_err();
        match err {
            Error::Connect { endpoint, .. } => assert!(endpoint.ends_with("missing.sock")),
            other => panic!("expected Connect, got {other:?}"),
        }
    }
}
