//! Low-level send helpers shared by the default `ResolverTransport`
//! implementation.  Reading responses happens at the message level in
//! the transport itself, where the contract's error type lives.

use std::io;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};

/// Write a serialised message to a UDP channel.  This sets or clears
/// the TC flag as appropriate.
pub async fn send_udp_bytes(sock: &UdpSocket, bytes: &mut [u8]) -> Result<(), io::Error> {
    if bytes.len() < 12 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "message too short to be a DNS message",
        ));
    }

    if bytes.len() > 512 {
        bytes[2] |= 0b0000_0010;
        sock.send(&bytes[..512]).await?;
    } else {
        bytes[2] &= 0b1111_1101;
        sock.send(bytes).await?;
    }

    Ok(())
}

/// Write a serialised message to a TCP channel.  This sends a
/// two-byte length prefix (big-endian u16) and sets or clears the TC
/// flag as appropriate.
pub async fn send_tcp_bytes(stream: &mut TcpStream, bytes: &mut [u8]) -> Result<(), io::Error> {
    if bytes.len() < 12 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "message too short to be a DNS message",
        ));
    }

    let len = if let Ok(len) = bytes.len().try_into() {
        bytes[2] &= 0b1111_1101;
        len
    } else {
        bytes[2] |= 0b0000_0010;
        u16::MAX
    };

    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(&bytes[..(len as usize)]).await?;

    Ok(())
}
