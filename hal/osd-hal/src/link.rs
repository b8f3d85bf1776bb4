//! Byte link abstractions
//!
//! Provides the blocking read/write capability the frame readers need.
//! Implementations decide whether a "read" is one datagram or whatever a
//! serial driver has buffered.

use core::time::Duration;

/// Link receiver
pub trait LinkRx {
    /// Error type for receive operations
    type Error;

    /// Read up to `buf.len()` bytes, waiting at most `timeout`
    ///
    /// Returns `Ok(0)` when the timeout expires with no data. A timeout is
    /// not an error; callers simply try again.
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, Self::Error>;
}

/// Link transmitter
pub trait LinkTx {
    /// Error type for transmit operations
    type Error;

    /// Write all of `data` to the link
    fn write_all(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Flush any buffered data
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Combined link interface
///
/// For links that provide both directions on one handle.
pub trait Link: LinkTx + LinkRx {}

// Blanket implementation
impl<T: LinkTx + LinkRx> Link for T {}

impl<T: LinkRx + ?Sized> LinkRx for &mut T {
    type Error = T::Error;

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, Self::Error> {
        (**self).read_timeout(buf, timeout)
    }
}

impl<T: LinkTx + ?Sized> LinkTx for &mut T {
    type Error = T::Error;

    fn write_all(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        (**self).write_all(data)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        (**self).flush()
    }
}
