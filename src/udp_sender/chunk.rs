//! GELF chunked-datagram framing.
//!
//! A payload that fits in one datagram is sent as is. Larger payloads are
//! split into chunks, each prefixed with a 12-byte header:
//!
//! | bytes | field                                   |
//! |-------|-----------------------------------------|
//! | 0..2  | magic `0x1e 0x0f`                       |
//! | 2..10 | message id, shared by all chunks        |
//! | 10    | sequence number, starting at zero       |
//! | 11    | total number of chunks                  |

use crate::sender::SendFailureCause;

/// Marker identifying a chunked GELF datagram.
pub const CHUNK_MAGIC: [u8; 2] = [0x1e, 0x0f];
/// Size of the header preceding each chunk's payload.
pub const CHUNK_HEADER_LEN: usize = 12;
/// Largest number of chunks a GELF receiver reassembles.
pub const MAX_CHUNKS: usize = 128;

/// Random identifier tying the chunks of one message together.
pub type MessageId = [u8; 8];

/// Split `payload` into the datagrams that carry it.
///
/// Every datagram is built before any is sent so an oversized message
/// produces no traffic at all.
///
/// # Errors
///
/// Returns [`SendFailureCause::TooManyChunks`] when the payload needs more
/// than [`MAX_CHUNKS`] chunks.
pub fn frame_datagrams(
    payload: &[u8],
    max_datagram_size: usize,
    message_id: MessageId,
) -> Result<Vec<Vec<u8>>, SendFailureCause> {
    debug_assert!(max_datagram_size > CHUNK_HEADER_LEN);
    if payload.len() <= max_datagram_size {
        return Ok(vec![payload.to_vec()]);
    }

    let chunk_len = max_datagram_size - CHUNK_HEADER_LEN;
    let required = payload.len().div_ceil(chunk_len);
    if required > MAX_CHUNKS {
        return Err(SendFailureCause::TooManyChunks {
            size: payload.len(),
            required,
            max: MAX_CHUNKS,
        });
    }

    // MAX_CHUNKS fits in a byte, so neither cast truncates.
    let total = required as u8;
    let datagrams = payload
        .chunks(chunk_len)
        .enumerate()
        .map(|(sequence, fragment)| {
            let mut datagram = Vec::with_capacity(CHUNK_HEADER_LEN + fragment.len());
            datagram.extend_from_slice(&CHUNK_MAGIC);
            datagram.extend_from_slice(&message_id);
            datagram.push(sequence as u8);
            datagram.push(total);
            datagram.extend_from_slice(fragment);
            datagram
        })
        .collect();
    Ok(datagrams)
}
