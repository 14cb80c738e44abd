//! Protocol codec
//!
//! Encoding and decoding of change-event frames, over byte slices and over
//! blocking streams.

use std::io::{Read, Write};

use bytes::{BufMut, BytesMut};

use crate::error::{DuraError, Result};
use crate::notify::ChangeEvent;

use super::FrameKind;

/// Header size: 1 byte kind + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Encode an event as one frame
pub fn encode_event(event: &ChangeEvent) -> Result<BytesMut> {
    let payload = serde_json::to_vec(event)?;
    if payload.len() > MAX_PAYLOAD_SIZE as usize {
        return Err(DuraError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload.len(),
            MAX_PAYLOAD_SIZE
        )));
    }

    let mut frame = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    frame.put_u8(FrameKind::of(event) as u8);
    frame.put_u32(payload.len() as u32);
    frame.put_slice(&payload);
    Ok(frame)
}

/// Decode one complete frame
pub fn decode_event(bytes: &[u8]) -> Result<ChangeEvent> {
    if bytes.len() < HEADER_SIZE {
        return Err(DuraError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let payload_len = payload_len(&bytes[..HEADER_SIZE])?;
    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(DuraError::Protocol(format!(
            "Incomplete payload: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    decode_payload(bytes[0], &bytes[HEADER_SIZE..total_len])
}

fn payload_len(header: &[u8]) -> Result<usize> {
    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    if len > MAX_PAYLOAD_SIZE {
        return Err(DuraError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(len as usize)
}

fn decode_payload(kind_byte: u8, payload: &[u8]) -> Result<ChangeEvent> {
    let kind = FrameKind::from_byte(kind_byte).ok_or_else(|| {
        DuraError::Protocol(format!("Unknown frame kind: 0x{:02x}", kind_byte))
    })?;

    let event: ChangeEvent = serde_json::from_slice(payload)
        .map_err(|e| DuraError::Protocol(format!("Malformed event payload: {}", e)))?;

    if FrameKind::of(&event) != kind {
        return Err(DuraError::Protocol(format!(
            "Frame kind {:?} does not match payload {:?}",
            kind,
            event.kind()
        )));
    }
    Ok(event)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete frame from a stream
///
/// Blocks until a frame is received or an error occurs
pub fn read_event<R: Read>(reader: &mut R) -> Result<ChangeEvent> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let len = payload_len(&header)?;
    let mut payload = vec![0u8; len];
    if len > 0 {
        reader.read_exact(&mut payload)?;
    }

    decode_payload(header[0], &payload)
}

/// Write one frame to a stream
pub fn write_event<W: Write>(writer: &mut W, event: &ChangeEvent) -> Result<()> {
    let frame = encode_event(event)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}
