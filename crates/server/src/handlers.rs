use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use axum::Json;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, Query, State};
use tokio::io::AsyncWriteExt;

use chunkferry_protocol::{DownloadQuery, StatusResponse, UPLOAD_FIELD, UploadResponse};
use chunkferry_transfer::{
    Assembled, Assembler, Session, SplitSummary, Splitter, validate_upload_path,
};

use crate::server::AppState;
use crate::{HttpSource, ServerError};

/// `POST /upload`: splits the `file` field into a new published session.
pub(crate) async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ServerError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("malformed form: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            return Err(ServerError::BadRequest(format!(
                "form field `{UPLOAD_FIELD}` has no file name"
            )));
        };
        validate_upload_path(&file_name).map_err(|e| ServerError::BadRequest(e.to_string()))?;
        return accept_upload(&state, field, file_name).await.map(Json);
    }
    Err(ServerError::BadRequest(format!(
        "missing form field `{UPLOAD_FIELD}`"
    )))
}

async fn accept_upload(
    state: &AppState,
    mut field: Field<'_>,
    file_name: String,
) -> Result<UploadResponse, ServerError> {
    let session = Session::create(&state.layout.uploads)?;
    let id = session.id().to_string();
    let spool = state.layout.incoming.join(format!("{id}.part"));

    let received = match spool_field(&mut field, &spool).await {
        Ok(n) => n,
        Err(e) => {
            discard_spool(&spool).await;
            remove_session(session);
            return Err(e);
        }
    };
    tracing::debug!(session = %id, file = %file_name, bytes = received, "upload received");

    let splitter = Splitter::new(state.config.chunk_size).with_algorithm(state.config.digest);
    let split = {
        let spool = spool.clone();
        let file_name = file_name.clone();
        run_in_session(session, move |session| {
            split_spool(&spool, &file_name, session, splitter)
        })
        .await
    };
    discard_spool(&spool).await;
    let summary = split?;

    tracing::info!(
        session = %id,
        file = %file_name,
        chunks = summary.manifest.len(),
        bytes = summary.total_bytes,
        "upload split"
    );

    Ok(UploadResponse {
        status: true,
        base: format!("/chunks/{id}"),
        id,
        file_name,
        chunks: summary.manifest.len(),
        bytes: summary.total_bytes,
    })
}

/// Streams a multipart field to `path`.
async fn spool_field(field: &mut Field<'_>, path: &Path) -> Result<u64, ServerError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut received = 0u64;
    while let Some(bytes) = field
        .chunk()
        .await
        .map_err(|e| ServerError::BadRequest(format!("failed to read upload: {e}")))?
    {
        file.write_all(&bytes).await?;
        received += bytes.len() as u64;
    }
    file.flush().await?;
    Ok(received)
}

fn split_spool(
    spool: &Path,
    file_name: &str,
    session: &Session,
    splitter: Splitter,
) -> Result<SplitSummary, ServerError> {
    let input = std::fs::File::open(spool)?;
    let store = session.store()?;
    Ok(splitter.split(BufReader::new(input), file_name, &store)?)
}

async fn discard_spool(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "failed to remove upload spool: {e}"),
    }
}

/// Runs `work` against `session` on a blocking thread.
///
/// The session directory is removed when `work` fails or panics.
async fn run_in_session<T, F>(session: Session, work: F) -> Result<T, ServerError>
where
    T: Send + 'static,
    F: FnOnce(&Session) -> Result<T, ServerError> + Send + 'static,
{
    let id = session.id().to_string();
    let dir = session.dir().to_path_buf();
    let joined = tokio::task::spawn_blocking(move || {
        let outcome = work(&session);
        if outcome.is_err() {
            remove_session(session);
        }
        outcome
    })
    .await;

    match joined {
        Ok(outcome) => outcome,
        Err(e) => {
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => {}
                Err(rm) if rm.kind() == std::io::ErrorKind::NotFound => {}
                Err(rm) => tracing::warn!(session = %id, "failed to remove session: {rm}"),
            }
            Err(e.into())
        }
    }
}

fn remove_session(session: Session) {
    let id = session.id().to_string();
    if let Err(e) = session.remove() {
        tracing::warn!(session = %id, "failed to remove session: {e}");
    }
}

/// `GET /download?url=<base>`: rebuilds the file published at `base`.
pub(crate) async fn download(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DownloadQuery>,
) -> Result<Json<StatusResponse>, ServerError> {
    let base = query
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ServerError::BadRequest("Missing required parameters".into()))?;
    tracing::info!(%base, "download requested");

    let scratch_root = state.layout.scratch.clone();
    let downloads = state.layout.downloads.clone();
    let verify = state.config.verify_chunks;
    let assembled = tokio::task::spawn_blocking(move || {
        assemble_from(&base, &scratch_root, &downloads, verify)
    })
    .await??;

    tracing::info!(
        file = %assembled.file_name,
        path = %assembled.path.display(),
        chunks = assembled.chunks,
        bytes = assembled.bytes,
        "download complete"
    );
    Ok(Json(StatusResponse::ok()))
}

/// Runs a full assemble from `base` inside a throwaway scratch session.
fn assemble_from(
    base: &str,
    scratch_root: &Path,
    downloads: &Path,
    verify: bool,
) -> Result<Assembled, ServerError> {
    let source = HttpSource::new(base)?;
    let session = Session::create(scratch_root)?;
    let result = session.store().and_then(|store| {
        Assembler::new(source, store, downloads)
            .verify_chunks(verify)
            .run()
    });
    remove_session(session);
    Ok(result?)
}
