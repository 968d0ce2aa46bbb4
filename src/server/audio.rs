// GET <audio_route>?id=<clip id>
// Streams <audio_dir>/<id>.mp3, honouring byte range requests so players
// can seek. The id is validated before the filesystem is touched.

use std::io::SeekFrom;
use std::path::Path;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use super::error::ApiError;
use super::AppState;
use crate::source::is_clip_id;

const CONTENT_TYPE_MP3: &str = "audio/mpeg";
const CACHE_FOR_A_YEAR: &str = "public, max-age=31536000";

#[derive(Debug, Deserialize)]
pub struct AudioQuery {
    id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    // No usable Range header: send everything
    Full,
    // Inclusive byte positions
    Partial { start: u64, end: u64 },
    Unsatisfiable,
}

// Interprets a Range header for a resource of `size` bytes. Headers we
// cannot parse are ignored, as HTTP allows.
pub fn resolve_range(header: Option<&str>, size: u64) -> RangeOutcome {
    let Some(ranges) = header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
        return RangeOutcome::Full;
    };
    // Multipart ranges are not supported
    if ranges.contains(',') {
        return RangeOutcome::Full;
    }
    let Some((start, end)) = ranges.split_once('-') else {
        return RangeOutcome::Full;
    };
    let (start, end) = (start.trim(), end.trim());

    if start.is_empty() {
        // Suffix range: the last N bytes
        let Ok(length) = end.parse::<u64>() else {
            return RangeOutcome::Full;
        };
        if length == 0 || size == 0 {
            return RangeOutcome::Unsatisfiable;
        }
        return RangeOutcome::Partial {
            start: size - length.min(size),
            end: size - 1,
        };
    }

    let Ok(start) = start.parse::<u64>() else {
        return RangeOutcome::Full;
    };
    let end = if end.is_empty() {
        size.saturating_sub(1)
    } else {
        match end.parse::<u64>() {
            Ok(end) => end,
            Err(_) => return RangeOutcome::Full,
        }
    };

    if start >= size {
        return RangeOutcome::Unsatisfiable;
    }
    if start > end {
        return RangeOutcome::Full;
    }
    RangeOutcome::Partial {
        start,
        end: end.min(size - 1),
    }
}

pub async fn stream_audio(
    State(state): State<AppState>,
    Query(query): Query<AudioQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::MissingId)?;
    if !is_clip_id(&id) {
        return Err(ApiError::InvalidId);
    }

    let path = state.audio_dir.join(format!("{id}.mp3"));
    if !path.starts_with(&state.audio_dir) {
        return Err(ApiError::AccessDenied);
    }

    let size = clip_size(&path).await?;
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());

    match resolve_range(range, size) {
        RangeOutcome::Full => {
            let file = open(&path).await?;
            audio_response(StatusCode::OK, size)
                .body(Body::from_stream(ReaderStream::new(file)))
                .map_err(|e| ApiError::Internal(e.to_string()))
        }
        RangeOutcome::Partial { start, end } => {
            let mut file = open(&path).await?;
            file.seek(SeekFrom::Start(start))
                .await
                .map_err(|e| ApiError::Internal(format!("seek in {}: {}", path.display(), e)))?;
            let length = end - start + 1;
            audio_response(StatusCode::PARTIAL_CONTENT, length)
                .header(header::CONTENT_RANGE, format!("bytes {start}-{end}/{size}"))
                .body(Body::from_stream(ReaderStream::new(file.take(length))))
                .map_err(|e| ApiError::Internal(e.to_string()))
        }
        RangeOutcome::Unsatisfiable => Err(ApiError::RangeNotSatisfiable { size }),
    }
}

fn audio_response(status: StatusCode, length: u64) -> axum::http::response::Builder {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, CONTENT_TYPE_MP3)
        .header(header::CONTENT_LENGTH, length)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CACHE_CONTROL, CACHE_FOR_A_YEAR)
}

async fn clip_size(path: &Path) -> Result<u64, ApiError> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => Ok(metadata.len()),
        Ok(_) => Err(ApiError::NotFound),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ApiError::NotFound),
        Err(e) => Err(ApiError::Internal(format!("stat {}: {}", path.display(), e))),
    }
}

async fn open(path: &Path) -> Result<File, ApiError> {
    File::open(path)
        .await
        .map_err(|e| ApiError::Internal(format!("open {}: {}", path.display(), e)))
}
