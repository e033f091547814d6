//! Versioned message codec and length-prefixed framing
//!
//! ```text
//! +-------------------+------------------+---------------------------+
//! | length (u32 LE)   | version (u16 LE) | bincode-encoded Message   |
//! +-------------------+------------------+---------------------------+
//! ```
//!
//! The length covers the version header and the message body, not itself.

use crate::error::CodecError;
use crate::protocol::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const PROTOCOL_VERSION: u16 = 1;

/// Maximum frame payload in bytes.
pub const MAX_FRAME_SIZE: u32 = 1_048_576;

pub fn encode(message: &Message) -> Result<Vec<u8>, CodecError> {
    let body = bincode::serialize(message)?;
    let mut payload = Vec::with_capacity(body.len() + 2);
    payload.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
    payload.extend_from_slice(&body);
    Ok(payload)
}

pub fn decode(payload: &[u8]) -> Result<Message, CodecError> {
    if payload.len() < 2 {
        return Err(CodecError::Truncated);
    }
    let version = u16::from_le_bytes([payload[0], payload[1]]);
    if version != PROTOCOL_VERSION {
        return Err(CodecError::VersionMismatch {
            found: version,
            expected: PROTOCOL_VERSION,
        });
    }
    Ok(bincode::deserialize(&payload[2..])?)
}

/// Reads one frame. Returns [`CodecError::ConnectionClosed`] when the peer
/// hangs up, whether between frames or in the middle of one.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, CodecError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await.map_err(closed_on_eof)?;

    let len = u32::from_le_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(CodecError::PayloadTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await.map_err(closed_on_eof)?;
    Ok(payload)
}

pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), CodecError> {
    let len = payload.len() as u32;
    if len > MAX_FRAME_SIZE {
        return Err(CodecError::PayloadTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Message, CodecError> {
    let payload = read_frame(reader).await?;
    decode(&payload)
}

pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Message,
) -> Result<(), CodecError> {
    let payload = encode(message)?;
    write_frame(writer, &payload).await
}

fn closed_on_eof(e: std::io::Error) -> CodecError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        CodecError::ConnectionClosed
    } else {
        CodecError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Attack, ChestAccess, ChestOutcome, EntityKind, EntityRef, EntityState, Vec3};

    fn framed(message: &Message) -> Vec<u8> {
        let payload = encode(message).unwrap();
        let mut frame = (payload.len() as u32).to_le_bytes().to_vec();
        frame.extend_from_slice(&payload);
        frame
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let message = Message::AddEntity(EntityRef::new(
            9,
            EntityKind::Chest,
            &EntityState::at(Vec3::new(1.0, 0.0, 2.0)),
        ));
        assert_eq!(encode(&message).unwrap(), encode(&message).unwrap());
    }

    #[test]
    fn test_version_header() {
        let payload = encode(&Message::ServerSave).unwrap();
        assert_eq!(&payload[..2], &PROTOCOL_VERSION.to_le_bytes());

        let mut wrong = payload.clone();
        wrong[0] = wrong[0].wrapping_add(1);
        match decode(&wrong) {
            Err(CodecError::VersionMismatch { expected, .. }) => {
                assert_eq!(expected, PROTOCOL_VERSION)
            }
            other => panic!("expected version mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(decode(&[]), Err(CodecError::Truncated)));
        assert!(matches!(decode(&[1]), Err(CodecError::Truncated)));

        let mut corrupted = encode(&Message::AddEntityFinish).unwrap();
        corrupted.truncate(2);
        corrupted.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(decode(&corrupted), Err(CodecError::Bincode(_))));
    }

    #[tokio::test]
    async fn test_read_message_from_mock_stream() {
        let message = Message::ChestAccess(ChestAccess::request(4, 2, true).reply(ChestOutcome::Opened));
        let mut reader = tokio_test::io::Builder::new()
            .read(&framed(&message))
            .build();

        let received = read_message(&mut reader).await.unwrap();
        assert_eq!(received, message);
    }

    #[tokio::test]
    async fn test_write_message_to_mock_stream() {
        let message = Message::Attack(Attack { player_id: 5 });
        let mut writer = tokio_test::io::Builder::new()
            .write(&framed(&message))
            .build();

        write_message(&mut writer, &message).await.unwrap();
    }

    #[tokio::test]
    async fn test_eof_is_connection_closed() {
        let mut reader = tokio_test::io::Builder::new().build();
        assert!(matches!(
            read_message(&mut reader).await,
            Err(CodecError::ConnectionClosed)
        ));

        let frame = framed(&Message::ServerSave);
        let mut reader = tokio_test::io::Builder::new()
            .read(&frame[..frame.len() - 1])
            .build();
        assert!(matches!(
            read_message(&mut reader).await,
            Err(CodecError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let mut reader = tokio_test::io::Builder::new()
            .read(&(MAX_FRAME_SIZE + 1).to_le_bytes())
            .build();
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(CodecError::PayloadTooLarge { .. })
        ));
    }
}
