//! Ampache XML error envelopes.
//!
//! ```xml
//! <root>
//!   <error errorCode="4701">
//!     <errorAction><![CDATA[handshake]]></errorAction>
//!     <errorMessage><![CDATA[Invalid Login]]></errorMessage>
//!   </error>
//! </root>
//! ```
//!
//! Servers speaking API versions before 5 put the message directly inside
//! `<error code="...">`; both shapes are accepted.

use crate::api::ResponseError;
use crate::error::{Result, SyncError};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Parse the error envelope of an Ampache response.
///
/// Returns `Ok(None)` for a well-formed response without an error element and
/// a parse error when the document is malformed.
pub fn parse_ampache_error(xml: &str) -> Result<Option<ResponseError>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut status_code = 0;
    let mut in_error = false;
    let mut in_message = false;
    let mut child_depth = 0usize;
    let mut message: Option<String> = None;
    let mut inline_text = String::new();
    let mut error = None;

    loop {
        match reader.read_event()? {
            Event::Start(element) => match element.name().as_ref() {
                b"error" if !in_error => {
                    in_error = true;
                    status_code = error_code(&element)?;
                }
                b"errorMessage" if in_error => {
                    in_message = true;
                    child_depth += 1;
                }
                _ if in_error => child_depth += 1,
                _ => {}
            },
            Event::Empty(element) if element.name().as_ref() == b"error" && error.is_none() => {
                error = Some(ResponseError::new(error_code(&element)?, ""));
            }
            Event::Text(text) if in_error => {
                let text = text.unescape().map_err(parse_error)?;
                append_text(&text, in_message, child_depth, &mut message, &mut inline_text);
            }
            Event::CData(data) if in_error => {
                let text = String::from_utf8_lossy(&data).into_owned();
                append_text(&text, in_message, child_depth, &mut message, &mut inline_text);
            }
            Event::End(element) => match element.name().as_ref() {
                b"error" if in_error && child_depth == 0 => {
                    in_error = false;
                    let message = message.take().unwrap_or_else(|| inline_text.clone());
                    error.get_or_insert(ResponseError::new(status_code, message));
                }
                b"errorMessage" if in_message => {
                    in_message = false;
                    child_depth = child_depth.saturating_sub(1);
                }
                _ if in_error => child_depth = child_depth.saturating_sub(1),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if in_error {
        return Err(SyncError::Parse("unterminated error element".to_string()));
    }
    Ok(error)
}

/// Fail with [`SyncError::Api`] when the response carries an error envelope.
pub fn check_ampache_response(xml: &str) -> Result<()> {
    match parse_ampache_error(xml)? {
        Some(error) => Err(SyncError::Api(error)),
        None => Ok(()),
    }
}

fn error_code(element: &BytesStart<'_>) -> Result<i32> {
    for attribute in element.attributes() {
        let attribute = attribute.map_err(parse_error)?;
        if matches!(attribute.key.as_ref(), b"errorCode" | b"code") {
            let value = attribute.unescape_value().map_err(parse_error)?;
            return Ok(value.trim().parse().unwrap_or(0));
        }
    }
    Ok(0)
}

fn parse_error(err: impl std::fmt::Display) -> SyncError {
    SyncError::Parse(err.to_string())
}

fn append_text(
    text: &str,
    in_message: bool,
    child_depth: usize,
    message: &mut Option<String>,
    inline_text: &mut String,
) {
    if in_message {
        message.get_or_insert_with(String::new).push_str(text);
    } else if child_depth == 0 {
        inline_text.push_str(text);
    }
}
