//! Content-Encoding handling for upstream bodies
//!
//! reqwest undoes gzip itself and strips the header. Anything still carrying a
//! Content-Encoding when it reaches us is decoded here. bilibili's comment host
//! has historically served raw deflate streams without the zlib wrapper, so
//! `deflate` tries zlib first and falls back to raw.

use std::io::Read;

use super::UpstreamError;

/// Decompress response body based on Content-Encoding header
///
/// A list such as `gzip, br` is undone last-applied first. An encoding we do
/// not know is an error: passing the bytes on would hand the caller garbage.
pub fn decompress_body(body_bytes: &[u8], content_encoding: Option<&str>) -> Result<Vec<u8>, UpstreamError> {
    let Some(header_value) = content_encoding else {
        return Ok(body_bytes.to_vec());
    };

    let mut body = body_bytes.to_vec();
    for encoding in header_value.rsplit(',') {
        body = decode_one(&body, encoding.trim())?;
    }

    tracing::debug!(
        encoding = header_value,
        original_size = body_bytes.len(),
        decompressed_size = body.len(),
        "Decompressed upstream response"
    );
    Ok(body)
}

fn decode_one(body: &[u8], encoding: &str) -> Result<Vec<u8>, UpstreamError> {
    match encoding.to_lowercase().as_str() {
        "" | "identity" => Ok(body.to_vec()),
        "gzip" | "x-gzip" => {
            let mut out = Vec::new();
            flate2::read::GzDecoder::new(body)
                .read_to_end(&mut out)
                .map_err(|e| UpstreamError::Decompress(format!("gzip: {}", e)))?;
            Ok(out)
        }
        "deflate" => inflate(body),
        "br" => {
            let mut out = Vec::new();
            brotli::BrotliDecompress(&mut std::io::Cursor::new(body), &mut out)
                .map_err(|e| UpstreamError::Decompress(format!("brotli: {}", e)))?;
            Ok(out)
        }
        "zstd" => zstd::decode_all(body).map_err(|e| UpstreamError::Decompress(format!("zstd: {}", e))),
        other => Err(UpstreamError::Decompress(format!(
            "unsupported Content-Encoding {:?}",
            other
        ))),
    }
}

fn inflate(body_bytes: &[u8]) -> Result<Vec<u8>, UpstreamError> {
    let mut out = Vec::new();
    if flate2::read::ZlibDecoder::new(body_bytes).read_to_end(&mut out).is_ok() {
        return Ok(out);
    }

    out.clear();
    flate2::read::DeflateDecoder::new(body_bytes)
        .read_to_end(&mut out)
        .map_err(|e| UpstreamError::Decompress(format!("deflate: {}", e)))?;
    Ok(out)
}
