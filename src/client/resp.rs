//! RESP2 codec for the client side
//!
//! Requests are always arrays of bulk strings. Replies are decoded
//! incrementally: `parse` returns `Ok(None)` until a full frame is buffered.

use bytes::{BufMut, BytesMut};

use crate::error::{ParseError, QueryError};

#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Option<Vec<u8>>),
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// Text payload of a string reply.
    ///
    /// Error replies become `QueryError::Server`, any other shape is unexpected.
    pub fn into_text(self, command: &str) -> Result<String, QueryError> {
        match self {
            RespValue::BulkString(Some(data)) => Ok(String::from_utf8_lossy(&data).into_owned()),
            RespValue::SimpleString(s) => Ok(s),
            other => Err(other.into_query_error(command)),
        }
    }

    /// Like `into_text`, but bytes that are not valid UTF-8 are an error
    /// instead of being replaced. Used where the text is sent back to the
    /// server, such as key names.
    pub fn into_utf8_text(self, command: &str) -> Result<String, QueryError> {
        match self {
            RespValue::BulkString(Some(data)) => {
                String::from_utf8(data).map_err(|e| QueryError::InvalidUtf8 {
                    command: command.to_string(),
                    value: e.as_bytes().escape_ascii().to_string(),
                })
            }
            other => other.into_text(command),
        }
    }

    /// Elements of an array reply.
    pub fn into_array(self, command: &str) -> Result<Vec<RespValue>, QueryError> {
        match self {
            RespValue::Array(Some(elements)) => Ok(elements),
            RespValue::Array(None) => Ok(Vec::new()),
            other => Err(other.into_query_error(command)),
        }
    }

    /// Optional text: nil bulk strings map to `None`.
    pub fn into_optional_text(self, command: &str) -> Result<Option<String>, QueryError> {
        match self {
            RespValue::BulkString(None) => Ok(None),
            other => other.into_text(command).map(Some),
        }
    }

    fn into_query_error(self, command: &str) -> QueryError {
        match self {
            RespValue::Error(message) => QueryError::Server {
                command: command.to_string(),
                message,
            },
            other => QueryError::UnexpectedReply {
                command: command.to_string(),
                reply: other.summary(),
            },
        }
    }

    /// Short description of a reply for error messages
    pub fn summary(&self) -> String {
        match self {
            RespValue::SimpleString(s) => format!("+{}", s),
            RespValue::Error(s) => format!("-{}", s),
            RespValue::Integer(n) => format!(":{}", n),
            RespValue::BulkString(None) => "nil".to_string(),
            RespValue::BulkString(Some(data)) => format!("bulk({} bytes)", data.len()),
            RespValue::Array(None) => "nil array".to_string(),
            RespValue::Array(Some(elements)) => format!("array({})", elements.len()),
        }
    }
}

pub struct RespParser;

impl RespParser {
    /// Decode one frame from the front of `input`.
    ///
    /// Returns the value and the number of bytes consumed, or `None` when the
    /// buffer ends before the frame does.
    pub fn parse(input: &[u8]) -> Result<Option<(RespValue, usize)>, ParseError> {
        let Some(&type_byte) = input.first() else {
            return Ok(None);
        };

        match type_byte {
            b'+' => Ok(Self::read_line(input)
                .map(|(line, used)| (RespValue::SimpleString(lossy(line)), used))),
            b'-' => Ok(Self::read_line(input)
                .map(|(line, used)| (RespValue::Error(lossy(line)), used))),
            b':' => match Self::read_line(input) {
                Some((line, used)) => {
                    let text = lossy(line);
                    let n = text
                        .parse::<i64>()
                        .map_err(|_| ParseError::InvalidInteger(text))?;
                    Ok(Some((RespValue::Integer(n), used)))
                }
                None => Ok(None),
            },
            b'$' => Self::parse_bulk_string(input),
            b'*' => Self::parse_array(input),
            other => Err(ParseError::UnknownType(other)),
        }
    }

    fn parse_bulk_string(input: &[u8]) -> Result<Option<(RespValue, usize)>, ParseError> {
        let Some((line, header_len)) = Self::read_line(input) else {
            return Ok(None);
        };
        let len = Self::parse_length(line)?;
        let Some(len) = len else {
            return Ok(Some((RespValue::BulkString(None), header_len)));
        };

        let start = header_len;
        let end = start.saturating_add(len);
        if end.saturating_add(2) > input.len() {
            return Ok(None);
        }
        if &input[end..end + 2] != b"\r\n" {
            return Err(ParseError::MissingTerminator);
        }

        let data = input[start..end].to_vec();
        Ok(Some((RespValue::BulkString(Some(data)), end + 2)))
    }

    fn parse_array(input: &[u8]) -> Result<Option<(RespValue, usize)>, ParseError> {
        let Some((line, header_len)) = Self::read_line(input) else {
            return Ok(None);
        };
        let Some(len) = Self::parse_length(line)? else {
            return Ok(Some((RespValue::Array(None), header_len)));
        };

        let mut elements = Vec::with_capacity(len.min(1024));
        let mut offset = header_len;

        for _ in 0..len {
            match Self::parse(&input[offset..])? {
                Some((value, consumed)) => {
                    elements.push(value);
                    offset += consumed;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((RespValue::Array(Some(elements)), offset)))
    }

    /// `-1` is the nil marker; anything below that is malformed.
    fn parse_length(line: &[u8]) -> Result<Option<usize>, ParseError> {
        let text = lossy(line);
        let len = text
            .parse::<i64>()
            .map_err(|_| ParseError::InvalidLength(text.clone()))?;
        match len {
            -1 => Ok(None),
            n if n < 0 => Err(ParseError::InvalidLength(text)),
            n => Ok(Some(n as usize)),
        }
    }

    /// Line body after the type byte, plus the bytes consumed including CRLF
    fn read_line(input: &[u8]) -> Option<(&[u8], usize)> {
        Self::find_crlf(input).map(|pos| (&input[1..pos], pos + 2))
    }

    #[inline]
    fn find_crlf(input: &[u8]) -> Option<usize> {
        memchr::memchr_iter(b'\r', input).find(|&pos| input.get(pos + 1) == Some(&b'\n'))
    }

    /// Encode a command as a RESP array of bulk strings
    pub fn encode_command(args: &[&str]) -> BytesMut {
        let mut buf = BytesMut::with_capacity(16 + args.iter().map(|a| a.len() + 16).sum::<usize>());
        buf.put_u8(b'*');
        buf.extend_from_slice(args.len().to_string().as_bytes());
        buf.extend_from_slice(b"\r\n");
        for arg in args {
            buf.put_u8(b'$');
            buf.extend_from_slice(arg.len().to_string().as_bytes());
            buf.extend_from_slice(b"\r\n");
            buf.extend_from_slice(arg.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        buf
    }

    /// Encode any value. Used by servers and test doubles.
    pub fn encode(value: &RespValue) -> Vec<u8> {
        match value {
            RespValue::SimpleString(s) => format!("+{}\r\n", s).into_bytes(),
            RespValue::Error(s) => format!("-{}\r\n", s).into_bytes(),
            RespValue::Integer(n) => format!(":{}\r\n", n).into_bytes(),
            RespValue::BulkString(None) => b"$-1\r\n".to_vec(),
            RespValue::BulkString(Some(data)) => {
                let mut result = format!("${}\r\n", data.len()).into_bytes();
                result.extend_from_slice(data);
                result.extend_from_slice(b"\r\n");
                result
            }
            RespValue::Array(None) => b"*-1\r\n".to_vec(),
            RespValue::Array(Some(elements)) => {
                let mut result = format!("*{}\r\n", elements.len()).into_bytes();
                for element in elements {
                    result.extend_from_slice(&Self::encode(element));
                }
                result
            }
        }
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
