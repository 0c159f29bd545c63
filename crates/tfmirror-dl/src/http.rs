use std::io::Read;

use serde::de::DeserializeOwned;
use tracing::debug;
use ureq::{http::Response, Agent, Body};

use crate::{
    cancel::{io_error, CancellableReader, CancellationToken},
    error::{Result, UpstreamError},
    types::DownloadedBinary,
};
use tfmirror_utils::hash::HashingReader;

/// Bytes of a failed response body kept for the error message.
const ERROR_BODY_EXCERPT: u64 = 4096;

/// Sends a GET request after checking for cancellation.
pub fn get(
    agent: &Agent,
    cancel: &CancellationToken,
    url: &str,
    headers: &[(&str, &str)],
) -> Result<Response<Body>> {
    cancel.check()?;
    debug!("GET {url}");

    let mut req = agent.get(url);
    for (name, value) in headers {
        req = req.header(*name, *value);
    }

    match req.call() {
        Ok(resp) => Ok(resp),
        Err(_) if cancel.is_cancelled() => Err(UpstreamError::Cancelled),
        Err(err) => Err(err.into()),
    }
}

/// Turns a non-2xx response into [`UpstreamError::HttpError`] carrying a
/// truncated body excerpt.
pub fn ensure_success(resp: Response<Body>, url: &str) -> Result<Response<Body>> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let mut excerpt = Vec::new();
    let _ = resp
        .into_body()
        .into_reader()
        .take(ERROR_BODY_EXCERPT)
        .read_to_end(&mut excerpt);

    Err(UpstreamError::HttpError {
        status: status.as_u16(),
        url: url.to_string(),
        body: String::from_utf8_lossy(&excerpt).trim().to_string(),
    })
}

/// Buffers the whole body, rejecting it if it is larger than `limit` bytes.
pub fn read_capped(
    cancel: &CancellationToken,
    resp: Response<Body>,
    url: &str,
    limit: u64,
) -> Result<Vec<u8>> {
    let reader = CancellableReader::new(resp.into_body().into_reader(), cancel);
    let mut data = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut data)
        .map_err(|err| io_error(cancel, err))?;

    if data.len() as u64 > limit {
        return Err(UpstreamError::ResponseTooLarge {
            url: url.to_string(),
            limit,
        });
    }
    Ok(data)
}

/// Decodes a JSON body straight from the stream.
pub fn read_json<T: DeserializeOwned>(
    cancel: &CancellationToken,
    resp: Response<Body>,
    url: &str,
) -> Result<T> {
    let reader = CancellableReader::new(resp.into_body().into_reader(), cancel);
    serde_json::from_reader(reader).map_err(|source| {
        if cancel.is_cancelled() {
            UpstreamError::Cancelled
        } else if source.is_io() {
            UpstreamError::Io(source.into())
        } else {
            UpstreamError::InvalidResponse {
                url: url.to_string(),
                source,
            }
        }
    })
}

/// Reads the body to the end while hashing it, in a single pass.
pub fn read_hashed(cancel: &CancellationToken, resp: Response<Body>) -> Result<DownloadedBinary> {
    let reader = CancellableReader::new(resp.into_body().into_reader(), cancel);
    let mut reader = HashingReader::new(reader);
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|err| io_error(cancel, err))?;

    Ok(DownloadedBinary {
        bytes,
        sha256: reader.finalize_hex(),
    })
}

/// Sends a GET and passes the response to `handle`, both on a worker thread.
///
/// The caller returns [`UpstreamError::Cancelled`] as soon as `cancel` fires,
/// whether the worker is waiting for response headers or inside a body read.
pub fn exchange<T, F>(
    agent: &Agent,
    cancel: &CancellationToken,
    url: &str,
    headers: &[(&str, &str)],
    handle: F,
) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&CancellationToken, Response<Body>) -> Result<T> + Send + 'static,
{
    let agent = agent.clone();
    let url = url.to_string();
    let headers: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();

    cancel.run(move |cancel| {
        let headers: Vec<(&str, &str)> = headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        let resp = get(&agent, cancel, &url, &headers)?;
        handle(cancel, resp)
    })
}

/// GET that must succeed, decoding the JSON body.
pub fn fetch_json<T>(
    agent: &Agent,
    cancel: &CancellationToken,
    url: &str,
    headers: &[(&str, &str)],
) -> Result<T>
where
    T: DeserializeOwned + Send + 'static,
{
    let owned = url.to_string();
    exchange(agent, cancel, url, headers, move |cancel, resp| {
        read_json(cancel, ensure_success(resp, &owned)?, &owned)
    })
}

/// GET that must succeed, buffering at most `limit` bytes of body.
pub fn fetch_capped(
    agent: &Agent,
    cancel: &CancellationToken,
    url: &str,
    headers: &[(&str, &str)],
    limit: u64,
) -> Result<Vec<u8>> {
    let owned = url.to_string();
    exchange(agent, cancel, url, headers, move |cancel, resp| {
        read_capped(cancel, ensure_success(resp, &owned)?, &owned, limit)
    })
}

/// One download attempt: GET on `agent`, fail on non-2xx, hash while reading.
pub fn fetch_binary(
    agent: &Agent,
    cancel: &CancellationToken,
    url: &str,
    headers: &[(&str, &str)],
) -> Result<DownloadedBinary> {
    let owned = url.to_string();
    let binary = exchange(agent, cancel, url, headers, move |cancel, resp| {
        read_hashed(cancel, ensure_success(resp, &owned)?)
    })?;
    debug!("downloaded {} bytes from {url}", binary.bytes.len());
    Ok(binary)
}
