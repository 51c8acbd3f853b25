//! Transport-facing side of the writer.

use std::io;

/// Destination of outbound items with writability and liveness signals.
///
/// The writer only writes while [`is_writable`](Self::is_writable) holds.
/// Once [`is_active`](Self::is_active) turns false every pending item is
/// failed with [`WriteError::Closed`](super::WriteError::Closed).
pub trait OutboundSink {
    /// Item accepted by the transport.
    type Item;

    /// Whether the peer currently accepts more data.
    fn is_writable(&self) -> bool;

    /// Whether the connection is still open.
    fn is_active(&self) -> bool;

    /// Hand one item to the transport.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the transport rejects the item.
    fn write(&mut self, item: Self::Item) -> io::Result<()>;

    /// Push buffered items towards the peer.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if flushing fails.
    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}
