//! SKK wire protocol
//!
//! Every frame starts with a one-byte tag.
//!
//! ```text
//! Client                          Server
//! '0'                             (closes)
//! '1' kana ' ' ...                '1' /cand1/cand2 '\n'   found
//!                                 '4' kana ' ' ... '\n'   not found
//!                                 '0' message             internal error
//! '2'                             "SocialSKK0.2 "
//! '3'                             "host:ip: "
//! ```

use crate::error::{Result, SkkError};

/// Read size for one request frame.
pub const BUFFER_SIZE: usize = 512;

/// Reply to the VERSION command.
pub const VERSION_STRING: &str = "SocialSKK0.2 ";

// Client tags
const CLIENT_END: u8 = b'0';
const CLIENT_REQUEST: u8 = b'1';
const CLIENT_VERSION: u8 = b'2';
const CLIENT_HOST: u8 = b'3';

// Server tags
const SERVER_ERROR: u8 = b'0';
const SERVER_FOUND: u8 = b'1';
const SERVER_NOT_FOUND: u8 = b'4';

// == Command ==
/// A request frame, borrowed from the read buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// End the session
    End,
    /// Conversion request
    Request(Request<'a>),
    /// Ask for the server version
    Version,
    /// Ask for the server host identification
    Host,
    /// Any other tag; ignored
    Unknown(u8),
}

/// Payload of a REQUEST frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request<'a> {
    /// Everything after the tag, delimiter and trailing bytes included
    pub payload: &'a [u8],
}

impl<'a> Request<'a> {
    /// The kana: payload bytes up to the first space or newline.
    pub fn query(&self) -> Result<&'a [u8]> {
        self.payload
            .iter()
            .position(|&b| b == b' ' || b == b'\n')
            .map(|end| &self.payload[..end])
            .ok_or_else(|| {
                SkkError::MalformedRequest("request has no space or newline terminator".to_string())
            })
    }
}

impl<'a> Command<'a> {
    /// Parses one frame. Returns None for an empty buffer.
    pub fn parse(frame: &'a [u8]) -> Option<Self> {
        let (&tag, rest) = frame.split_first()?;
        Some(match tag {
            CLIENT_END => Command::End,
            CLIENT_REQUEST => Command::Request(Request { payload: rest }),
            CLIENT_VERSION => Command::Version,
            CLIENT_HOST => Command::Host,
            other => Command::Unknown(other),
        })
    }
}

// == Response ==
/// A response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Candidates, already `/`-prefixed and `/`-separated
    Found(Vec<u8>),
    /// Echo of the request payload
    NotFound(Vec<u8>),
    /// Description of an internal failure
    Error(String),
    /// Server version string, sent without a trailing newline
    Version,
    /// `host:ip: ` text
    Host(String),
}

impl Response {
    /// Builds the answer to a REQUEST from the lookup outcome.
    pub fn for_lookup(request: &Request<'_>, candidates: Option<Vec<u8>>) -> Self {
        match candidates {
            Some(candidates) => Response::Found(candidates),
            None => Response::NotFound(request.payload.to_vec()),
        }
    }

    /// Serializes the frame.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Response::Found(candidates) => tagged(SERVER_FOUND, candidates, true),
            Response::NotFound(payload) => tagged(SERVER_NOT_FOUND, payload, true),
            Response::Error(message) => tagged(SERVER_ERROR, message.as_bytes(), false),
            Response::Version => VERSION_STRING.as_bytes().to_vec(),
            Response::Host(text) => text.as_bytes().to_vec(),
        }
    }
}

fn tagged(tag: u8, body: &[u8], newline: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 2);
    out.push(tag);
    out.extend_from_slice(body);
    if newline {
        out.push(b'\n');
    }
    out
}

/// Formats a HOST reply.
pub fn host_reply(hostname: &str, ip: &str) -> String {
    format!("{}:{}: ", hostname, ip)
}
