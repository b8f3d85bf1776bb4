//! Link implementations over OS handles
//!
//! - [`UdpLink`]: receive side of the renderer, one datagram per read
//! - [`UdpSender`]: transmit side of the forwarder
//! - [`SerialLink`]: a serial port in raw mode at a fixed baud rate
//!
//! All of them map "nothing arrived before the timeout" to `Ok(0)`.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::path::Path;
use std::time::Duration;

use osd_hal::{LinkRx, LinkTx};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::debug;

/// Largest datagram we accept; a full MSPv1 frame is 261 bytes
pub const DATAGRAM_SIZE: usize = 4096;

/// Zero timeouts are rejected by sockets and mean "block" to some ports
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{host}:{port} did not resolve to an address"),
        )
    })
}

/// Bound UDP socket read one datagram at a time
pub struct UdpLink {
    socket: UdpSocket,
    /// Timeout currently set on the socket
    timeout: Option<Duration>,
}

impl UdpLink {
    /// Bind to `host:port`
    pub fn bind(host: &str, port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind(resolve(host, port)?)?;
        Ok(Self {
            socket,
            timeout: None,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl LinkRx for UdpLink {
    type Error = io::Error;

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let timeout = timeout.max(MIN_TIMEOUT);
        if self.timeout != Some(timeout) {
            self.socket.set_read_timeout(Some(timeout))?;
            self.timeout = Some(timeout);
        }

        match self.socket.recv(buf) {
            Ok(n) => Ok(n),
            Err(e) if is_timeout(&e) => Ok(0),
            Err(e) => Err(e),
        }
    }
}

/// Unconnected UDP socket sending every write to one target
pub struct UdpSender {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpSender {
    /// Prepare to send to `host:port` from an ephemeral local port
    pub fn connect(host: &str, port: u16) -> io::Result<Self> {
        let target = resolve(host, port)?;
        let local: SocketAddr = if target.is_ipv4() {
            ([0u8; 4], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        Ok(Self {
            socket: UdpSocket::bind(local)?,
            target,
        })
    }

    /// Destination of every datagram
    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl LinkTx for UdpSender {
    type Error = io::Error;

    /// Each call is sent as one datagram
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let sent = self.socket.send_to(data, self.target)?;
        if sent != data.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("datagram truncated: {sent} of {} bytes", data.len()),
            ));
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Serial port opened raw, 8N1, no flow control
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    /// Timeout currently set on the port
    timeout: Duration,
}

impl SerialLink {
    /// Open `path` at `baud`
    pub fn open(path: &Path, baud: u32) -> io::Result<Self> {
        let port = serialport::new(path.to_string_lossy(), baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(MIN_TIMEOUT)
            .open()?;
        debug!(device = %path.display(), baud, "serial port open");
        Ok(Self::from_port(port))
    }

    /// Wrap a port that is already open and configured
    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        let timeout = port.timeout();
        Self { port, timeout }
    }
}

impl LinkRx for SerialLink {
    type Error = io::Error;

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let timeout = timeout.max(MIN_TIMEOUT);
        if self.timeout != timeout {
            self.port.set_timeout(timeout)?;
            self.timeout = timeout;
        }

        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if is_timeout(&e) || e.kind() == io::ErrorKind::Interrupted => Ok(0),
            Err(e) => Err(e),
        }
    }
}

impl LinkTx for SerialLink {
    type Error = io::Error;

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}
