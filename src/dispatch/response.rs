//! Turning the outcome of a request into the HTTP response.

use {
    crate::{
        Context, Error, ErrorEnvelope, ErrorKind, Hook, Result,
        context::{CONTENT_TYPE_JSON, DataKind, SendState},
    },
    axum::{
        body::Body,
        response::{IntoResponse, Response},
    },
    bytes::Bytes,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, LOCATION, SET_COOKIE},
    },
};

///
/// Builds the response for a finished pipeline and fires the hook once.
///
/// A pipeline error always wins over whatever the handler sent before
/// failing. When the response cannot be built, a plain-text 500 is returned
/// and the hook still sees the failure.
///
pub(crate) fn materialize(c: &Context, result: Result<()>, hook: &Hook) -> Response {
    let mut state = c.send().take_state();
    let headers = std::mem::take(&mut state.headers);
    let built = match result {
        Err(err) => error_response(c, state.status, err),
        Ok(()) => send_response(state),
    };
    match built {
        Ok((mut response, error)) => {
            apply_staged(c, headers, &mut response);
            hook.fire(c.request(), error.as_ref());
            response
        }
        Err(err) => {
            tracing::error!(path = %c.request().path(), error = %err, "Failed to build response");
            hook.fire(c.request(), Some(&err));
            internal_server_error()
        }
    }
}

///
/// Builds the 500 response for a handler that panicked.
///
pub(crate) fn recover(c: &Context, message: String, hook: &Hook) -> Response {
    let err = c
        .send()
        .interceptor()
        .error(c.request(), Error::internal(message));
    let response = serde_json::to_vec(&err.to_envelope())
        .map_err(Error::from)
        .and_then(|body| {
            Ok(Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
                .body(Body::from(body))?)
        });
    hook.fire(c.request(), Some(&err));
    match response {
        Ok(mut response) => {
            apply_staged(c, c.send().take_state().headers, &mut response);
            response
        }
        Err(_) => internal_server_error(),
    }
}

///
/// Adds the headers staged with [`Sender::header`](crate::Sender::header)
/// and the queued cookies to `response`.
///
/// Staged headers are applied to error responses too, so a rejection can
/// carry `WWW-Authenticate` or `Retry-After`.
///
pub(crate) fn apply_staged(c: &Context, headers: HeaderMap, response: &mut Response) {
    response.headers_mut().extend(headers);
    for cookie in c.cookie().take_set_cookies() {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
}

fn error_response(
    c: &Context,
    status: Option<StatusCode>,
    err: Error,
) -> Result<(Response, Option<Error>)> {
    let err = c.send().interceptor().error(c.request(), err);
    let status = status.unwrap_or_else(|| err.status_code());
    if status.is_server_error() {
        tracing::error!(path = %c.request().path(), kind = %err.kind(), error = %err, "Request failed");
    } else {
        tracing::debug!(path = %c.request().path(), kind = %err.kind(), error = %err, "Request failed");
    }
    let body = Bytes::from(serde_json::to_vec(&err.to_envelope())?);
    let response = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
        .body(Body::from(body.clone()))?;
    Ok((response, Some(error_from_body(err.kind(), &body))))
}

fn send_response(state: SendState) -> Result<(Response, Option<Error>)> {
    let mut builder = Response::builder();
    let mut error = None;
    match state.kind {
        DataKind::None => {
            builder = builder.status(state.status.unwrap_or(StatusCode::OK));
        }
        DataKind::Redirect => {
            builder = builder
                .status(state.status.unwrap_or(StatusCode::FOUND))
                .header(LOCATION, HeaderValue::from_str(&state.value)?);
        }
        DataKind::Stream => {
            builder = builder
                .status(state.status.unwrap_or(StatusCode::OK))
                .header(
                    CONTENT_DISPOSITION,
                    HeaderValue::from_str(&format!("attachment; filename={}", state.value))?,
                )
                .header(CONTENT_LENGTH, state.body.len());
        }
        DataKind::Error => {
            let kind = state.error_kind.unwrap_or(ErrorKind::Handler);
            builder = builder.status(state.status.unwrap_or(kind.status_code()));
            error = Some(error_from_body(kind, &state.body));
        }
        DataKind::Json | DataKind::Xml | DataKind::Text | DataKind::Bool => {
            builder = builder.status(state.status.unwrap_or(StatusCode::OK));
        }
    }
    if let Some(content_type) = state.content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    Ok((builder.body(Body::from(state.body))?, error))
}

/// Rebuilds the error the client actually received from the envelope bytes.
fn error_from_body(kind: ErrorKind, body: &[u8]) -> Error {
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => Error::new(kind, envelope.error),
        Err(_) => Error::new(kind, String::from_utf8_lossy(body).into_owned()),
    }
}

fn internal_server_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        "Internal Server Error",
    )
        .into_response()
}
