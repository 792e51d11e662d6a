// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Streaming removal of transport content-encoding.
//!
//! The body is never buffered in full: the upstream byte stream is
//! adapted into an `AsyncRead`, run through the matching decoder and
//! turned back into a stream, so backpressure from the client write
//! propagates all the way to the upstream read. Malformed compressed
//! data surfaces as a stream error, indistinguishable from any other
//! I/O failure mid-body.

use async_compression::tokio::bufread::{BrotliDecoder, GzipDecoder, ZlibDecoder};
use futures_util::TryStreamExt;
use http_body_util::BodyExt;
use tokio::io::{AsyncRead, BufReader};
use tokio_util::io::{ReaderStream, StreamReader};

/// Wrap `body` in a decoder for the given `content-encoding` value.
///
/// Absent or unrecognised encodings pass the body through unchanged
/// (still re-chunked through the same stream plumbing).
pub fn decoding_body(body: reqwest::Body, encoding: Option<&str>) -> reqwest::Body {
    let stream = body.into_data_stream().map_err(std::io::Error::other);
    let reader = BufReader::new(StreamReader::new(stream));

    match encoding {
        Some("gzip") => stream_body(GzipDecoder::new(reader)),
        Some("deflate") => stream_body(ZlibDecoder::new(reader)),
        Some("br") => stream_body(BrotliDecoder::new(reader)),
        _ => stream_body(reader),
    }
}

fn stream_body<R>(reader: R) -> reqwest::Body
where
    R: AsyncRead + Send + Sync + 'static,
{
    reqwest::Body::wrap_stream(ReaderStream::new(reader))
}
