use std::collections::BTreeMap;
use std::io;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use ciaserve_core::stream::{ChunkSink, SinkClosed};
use ciaserve_core::util::pct::encode_path_segment;
use ciaserve_core::{ShareError, TransferOutcome};
use http::{HeaderValue, StatusCode, header};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::server::AppState;
use crate::view;

pub async fn home(State(state): State<AppState>) -> Html<String> {
    Html(view::render_home(&state.registry.snapshot()).into_string())
}

#[derive(Serialize)]
struct ProgressView<'a> {
    download_url: &'a str,
    qr_image: &'a str,
    progress: f64,
}

pub async fn progress(State(state): State<AppState>) -> Response {
    let snapshot = state.registry.snapshot();
    let body: BTreeMap<&str, ProgressView<'_>> = snapshot
        .iter()
        .map(|e| {
            (
                e.id.as_str(),
                ProgressView {
                    download_url: &e.download_url,
                    qr_image: &e.qr_image,
                    progress: e.progress,
                },
            )
        })
        .collect();
    (
        [(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"))],
        Json(body),
    )
        .into_response()
}

/// Response body side of a transfer. The channel holds a single chunk, so a
/// slow client holds back its own reader.
struct BodySink {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl ChunkSink for BodySink {
    async fn send(&mut self, chunk: Vec<u8>) -> Result<(), SinkClosed> {
        self.tx
            .send(Ok(Bytes::from(chunk)))
            .await
            .map_err(|_| SinkClosed)
    }
}

pub async fn download(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let transfer = match state.streamer.open(&id).await {
        Ok(t) => t,
        Err(ShareError::NotFound(_)) => return not_found(&id),
        Err(e) => {
            warn!(id = %id, error = %e, "could not open file");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };
    let size = transfer.size();

    let (tx, rx) = mpsc::channel(1);
    let observer = state.observer.clone();
    let mut shutdown = state.shutdown.clone();
    let file_id = id.clone();
    let span = info_span!("transfer", transfer_id = %Uuid::new_v4(), id = %id);
    tokio::spawn(
        async move {
            let mut sink = BodySink { tx };
            let finished = tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown) => None,
                res = transfer.stream(&mut sink, observer.as_ref()) => Some(res),
            };
            match finished {
                Some(Ok(TransferOutcome::Completed { bytes, chunks })) => {
                    info!(bytes, chunks, "download finished");
                }
                // the streamer already noted the disconnect
                Some(Ok(TransferOutcome::Cancelled { .. })) => {}
                Some(Err(e)) => {
                    info!(error = %e, "download aborted");
                    let failed = sink.tx.send(Err(io::Error::other(e.to_string())));
                    tokio::select! {
                        _ = failed => {}
                        _ = stop_requested(&mut shutdown) => {}
                    }
                }
                None => {
                    info!("server shutting down, download dropped");
                    observer.end(&file_id, false);
                    let _ = sink
                        .tx
                        .try_send(Err(io::Error::other("server shutting down")));
                }
            }
        }
        .instrument(span),
    );

    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_DISPOSITION, content_disposition(&id)),
            (header::ACCEPT_RANGES, HeaderValue::from_static("bytes")),
            (header::CONTENT_LENGTH, HeaderValue::from(size)),
        ],
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response()
}

/// Resolves once a stop is requested. A dropped sender means nobody will
/// ever ask, so that waits forever.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    let asked = shutdown.wait_for(|stop| *stop).await.is_ok();
    if !asked {
        std::future::pending::<()>().await;
    }
}

fn not_found(id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        format!("File <{id}> does not exist"),
    )
        .into_response()
}

fn content_disposition(id: &str) -> HeaderValue {
    if id.bytes().all(|b| (0x20..0x7f).contains(&b)) {
        let quoted = id.replace('\\', "\\\\").replace('"', "\\\"");
        if let Ok(v) = HeaderValue::from_str(&format!("attachment; filename=\"{quoted}\"")) {
            return v;
        }
    }
    HeaderValue::from_str(&format!(
        "attachment; filename*=UTF-8''{}",
        encode_path_segment(id)
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_quotes_plain_names() {
        assert_eq!(
            content_disposition("My Game.cia"),
            "attachment; filename=\"My Game.cia\""
        );
    }

    #[test]
    fn disposition_falls_back_to_rfc5987_for_non_ascii() {
        assert_eq!(
            content_disposition("ポケモン.cia"),
            "attachment; filename*=UTF-8''%E3%83%9D%E3%82%B1%E3%83%A2%E3%83%B3.cia"
        );
    }
}
