//! Response marshalling.

use super::request::{check_fields, get_attributes, put_attributes, set_fields};
use super::{FieldSink, Reader, Writer};
use crate::error::{Error, ErrorContext, ErrorKind, Result};
use crate::policy::Effect;
use crate::value::AttributeValue;

/// Status sent instead of one which doesn't fit the buffer.
pub const STATUS_TOO_LONG: &str = "status too long";

/// Status sent instead of obligations which don't fit the buffer.
pub const STATUS_OBLIGATIONS_TOO_LONG: &str = "obligations too long";

const MAX_STATUS_LEN: usize = u16::MAX as usize;

/// Marshal a response to the caller's buffer and return the number of bytes
/// written.
///
/// When the status doesn't fit, the response carries [`STATUS_TOO_LONG`] and
/// no obligations. When obligations don't fit, the response carries
/// [`STATUS_OBLIGATIONS_TOO_LONG`] instead of them. Obligations which can't
/// be marshalled at all are replaced by their error as the status. Only a
/// buffer too small for the fallback is an error.
pub fn marshal_response<S: AsRef<str>>(
    b: &mut [u8],
    effect: Effect,
    obligations: &[(S, AttributeValue)],
    errs: &[Error],
) -> Result<usize> {
    let status = status_message(errs);

    let mut w = Writer::new(b);
    w.put_version()?;
    w.put_u8(effect.code())?;
    if w.put_string(&status).is_err() {
        return put_fallback(b, effect, STATUS_TOO_LONG);
    }

    match put_attributes(&mut w, obligations) {
        Ok(()) => Ok(w.written()),
        Err(err) if matches!(err.kind(), ErrorKind::RequestBufferOverflow) => {
            put_fallback(b, effect, STATUS_OBLIGATIONS_TOO_LONG)
        }
        Err(err) => {
            let status = status_message(&[err]);
            put_fallback(b, effect, &status).or_else(|_| put_fallback(b, effect, STATUS_TOO_LONG))
        }
    }
}

/// Unmarshal a response. A non-empty status is returned as
/// [`ErrorKind::ResponseServerError`].
pub fn unmarshal_response(b: &[u8]) -> Result<(Effect, Vec<(String, AttributeValue)>)> {
    let (effect, status, obligations) = get_response(b)?;
    if !status.is_empty() {
        return Err(Error::new(ErrorKind::ResponseServerError { status }));
    }

    Ok((effect, obligations))
}

/// Unmarshal a response into fields the sink provides. A non-empty status
/// is an error only if the sink has no status field.
pub fn unmarshal_response_reflection<S: FieldSink + ?Sized>(b: &[u8], sink: &mut S) -> Result<()> {
    let (effect, status, obligations) = get_response(b)?;

    if let Some(field) = sink.effect() {
        field.check_effect(effect)?;
    }
    match sink.status() {
        Some(field) => field.check_status()?,
        None if !status.is_empty() => {
            return Err(Error::new(ErrorKind::ResponseServerError { status }))
        }
        None => {}
    }
    check_fields(&obligations, sink)?;

    if let Some(field) = sink.effect() {
        field.set_effect(effect)?;
    }
    if let Some(field) = sink.status() {
        field.set_status(&status)?;
    }
    set_fields(&obligations, sink)
}

fn status_message(errs: &[Error]) -> String {
    let msg = match errs {
        [] => return String::new(),
        [err] => err.to_string(),
        errs => {
            let msgs: Vec<String> = errs.iter().map(|e| format!("{:?}", e.to_string())).collect();
            format!("multiple errors: {}", msgs.join(", "))
        }
    };

    if msg.len() <= MAX_STATUS_LEN {
        return msg;
    }

    let mut end = MAX_STATUS_LEN;
    while !msg.is_char_boundary(end) {
        end -= 1;
    }
    msg[..end].to_string()
}

fn put_fallback(b: &mut [u8], effect: Effect, status: &str) -> Result<usize> {
    let mut w = Writer::new(b);
    w.put_version()?;
    w.put_u8(effect.code())?;
    w.put_string(status)?;
    w.put_count(0)?;
    Ok(w.written())
}

fn get_response(b: &[u8]) -> Result<(Effect, String, Vec<(String, AttributeValue)>)> {
    let mut r = Reader::new(b);
    r.version()?;

    let code = r.u8()?;
    let effect =
        Effect::from_code(code).ok_or_else(|| Error::new(ErrorKind::ResponseEffect { effect: code }))?;

    let status = r.string().bind("status")?;
    let obligations = get_attributes(&mut r)?;
    Ok((effect, status, obligations))
}
