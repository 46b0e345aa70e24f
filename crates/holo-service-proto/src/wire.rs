// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scalability-protocols (SP) framing over a local stream socket.
//!
//! Connection setup: each side sends
//!
//! ``0x00 || 'S' || 'P' || 0x00 || PROTOCOL(2, BE) || 0x00 0x00``
//!
//! then every message is
//!
//! ``0x01 || LENGTH(8, BE) || REQUEST_ID(4, BE) || PAYLOAD``
//!
//! * REQUEST_ID has its high bit set; a reply echoes the id of its request
//! * PAYLOAD is one CBOR command (request) or reply map
//! * LENGTH counts REQUEST_ID and PAYLOAD

use std::io::{Read, Write};

use holo_cbor::{decode_exact, encode_into, Value};

use crate::command::{BinPayload, Command};
use crate::ProtocolError;

/// SP protocol number of a requester.
pub const PROTO_REQ: u16 = 0x30;
/// SP protocol number of a replier.
pub const PROTO_REP: u16 = 0x31;
/// Largest reply a client accepts (64 MiB).
pub const MAX_MESSAGE: u64 = 64 * 1024 * 1024;
/// Largest request either side frames or reads (1 GiB); an 8k quilt bitmap
/// alone is about 200 MB.
pub const MAX_REQUEST: u64 = 1024 * 1024 * 1024;
/// Bytes before the body: type marker plus length.
pub const HEADER_LEN: usize = 9;
/// Bytes of the request id that opens every body.
pub const REQUEST_ID_LEN: usize = 4;

const MSG_TYPE: u8 = 0x01;
const ID_FLAG: u32 = 0x8000_0000;

/// Connection header announcing `proto`.
pub fn handshake(proto: u16) -> [u8; 8] {
    let p = proto.to_be_bytes();
    [0x00, b'S', b'P', 0x00, p[0], p[1], 0x00, 0x00]
}

/// Send our header, read the peer's and check it speaks `peer_proto`.
pub fn exchange_handshake<S: Read + Write>(
    stream: &mut S,
    own_proto: u16,
    peer_proto: u16,
) -> Result<(), ProtocolError> {
    stream.write_all(&handshake(own_proto))?;
    stream.flush()?;
    let mut peer = [0u8; 8];
    stream.read_exact(&mut peer)?;
    check_handshake(peer, peer_proto)
}

/// Validate a peer connection header.
pub fn check_handshake(peer: [u8; 8], expected: u16) -> Result<(), ProtocolError> {
    if peer[..4] != [0x00, b'S', b'P', 0x00] || peer[6..] != [0, 0] {
        return Err(ProtocolError::NoService);
    }
    let proto = u16::from_be_bytes([peer[4], peer[5]]);
    if proto != expected {
        return Err(ProtocolError::VersionMismatch(format!(
            "peer speaks SP protocol {proto:#x}, expected {expected:#x}"
        )));
    }
    Ok(())
}

/// Request id for sequence number `seq` (high bit set).
pub fn request_id(seq: u32) -> u32 {
    seq | ID_FLAG
}

/// Start a message buffer: header placeholder plus request id.
fn begin(id: u32, capacity: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + REQUEST_ID_LEN + capacity);
    buf.push(MSG_TYPE);
    buf.extend_from_slice(&[0u8; 8]);
    buf.extend_from_slice(&id.to_be_bytes());
    buf
}

/// Patch the length field and enforce `limit`.
fn finish(mut buf: Vec<u8>, limit: u64) -> Result<Vec<u8>, ProtocolError> {
    let len = (buf.len() - HEADER_LEN) as u64;
    if len > limit {
        return Err(ProtocolError::MessageTooBig(len));
    }
    buf[1..HEADER_LEN].copy_from_slice(&len.to_be_bytes());
    Ok(buf)
}

/// Frame a command with an empty `bin`.
pub fn encode_request(id: u32, command: &Command) -> Result<Vec<u8>, ProtocolError> {
    encode_request_with(id, command, &[] as &[u8])
}

/// Frame a command whose `bin` entry is written by `bin`.
pub fn encode_request_with<B>(id: u32, command: &Command, bin: &B) -> Result<Vec<u8>, ProtocolError>
where
    B: BinPayload + ?Sized,
{
    let mut buf = begin(id, 64 + bin.size_hint());
    command.encode_with(bin, &mut buf)?;
    finish(buf, MAX_REQUEST)
}

/// Frame a reply map (daemon side).
pub fn encode_reply(id: u32, reply: &Value) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = begin(id, 64);
    encode_into(reply, &mut buf)?;
    finish(buf, MAX_MESSAGE)
}

/// Read one framed reply and return its body.
pub fn read_message<R: Read>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    read_message_within(reader, MAX_MESSAGE)
}

/// Read one framed message of at most `limit` body bytes.
pub fn read_message_within<R: Read>(reader: &mut R, limit: u64) -> Result<Vec<u8>, ProtocolError> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header)?;
    if header[0] != MSG_TYPE {
        return Err(ProtocolError::DeserializeError(format!(
            "unexpected message type {:#04x}",
            header[0]
        )));
    }
    let mut len = [0u8; 8];
    len.copy_from_slice(&header[1..]);
    let len = u64::from_be_bytes(len);
    if len > limit {
        return Err(ProtocolError::MessageTooBig(len));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body)?;
    Ok(body)
}

/// Split a body into request id and CBOR payload, decoding the payload.
pub fn decode_body(body: &[u8]) -> Result<(u32, Value), ProtocolError> {
    if body.len() < REQUEST_ID_LEN {
        return Err(ProtocolError::DeserializeError(
            "message shorter than its request id".into(),
        ));
    }
    let (id, payload) = body.split_at(REQUEST_ID_LEN);
    let id = u32::from_be_bytes([id[0], id[1], id[2], id[3]]);
    if id & ID_FLAG == 0 {
        return Err(ProtocolError::DeserializeError(format!(
            "request id {id:#x} lacks the end-of-backtrace bit"
        )));
    }
    Ok((id, decode_exact(payload)?))
}
