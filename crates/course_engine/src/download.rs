use std::path::{Path, PathBuf};

use course_core::TaskId;
use engine_logging::engine_info;
use futures_util::StreamExt;
use thiserror::Error;

use crate::api::ReqwestApi;
use crate::persist::{AtomicFileWriter, PersistError};
use crate::ApiError;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download failed: {0}")]
    Api(#[from] ApiError),
    #[error("could not save artifact: {0}")]
    Persist(#[from] PersistError),
}

/// Stream one result artifact into `{output_dir}/{path}`. The file appears
/// only once the whole body has been received.
pub async fn download_artifact(
    api: &ReqwestApi,
    task_id: &TaskId,
    path: &str,
    output_dir: &Path,
) -> Result<PathBuf, DownloadError> {
    let writer = AtomicFileWriter::new(output_dir.to_path_buf());
    let mut pending = writer.begin(path)?;
    let mut body = api.download(task_id, path).await?;
    while let Some(chunk) = body.next().await {
        pending.write_chunk(&chunk?)?;
    }
    let bytes = pending.bytes_written();
    let saved = pending.commit()?;
    engine_info!(
        "Downloaded {} of task {} ({} bytes) to {:?}",
        path,
        task_id,
        bytes,
        saved
    );
    Ok(saved)
}
