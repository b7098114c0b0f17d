use std::path::PathBuf;

use actix_multipart::{Field, Multipart};
use actix_web::http::header::{self, ContentType, HeaderMap};
use actix_web::{HttpResponse, web};
use futures_util::StreamExt;

use crate::config::{ByteSize, UploadConfig};
use crate::error::JobError;
use crate::job::JobName;
use crate::toolchain::{RunOutput, Toolchain};
use crate::workspace::Workspace;

/// Directory under which job directories are created
#[derive(Debug, Clone)]
pub struct WorkRoot(pub PathBuf);

/// Parameters of a `/run` request
#[derive(Debug)]
struct Upload {
    key: String,
    data: Vec<u8>,
    /// `Content-Length` of the file part, or the received length without one
    size: usize,
}

pub async fn run_handler(
    toolchain: web::Data<Toolchain>,
    upload_config: web::Data<UploadConfig>,
    root: web::Data<WorkRoot>,
    payload: Multipart,
) -> Result<HttpResponse, JobError> {
    run_job(&toolchain, upload_config.max_size, &root, payload)
        .await
        .inspect_err(|e| log::error!("{e}"))
}

async fn run_job(
    toolchain: &Toolchain,
    max_size: ByteSize,
    root: &WorkRoot,
    payload: Multipart,
) -> Result<HttpResponse, JobError> {
    let upload = read_params(payload, max_size).await?;
    let name = JobName::now(&upload.key);
    let workspace = Workspace::create(&root.0, &name, toolchain.extension()).await?;
    workspace.write_source(&upload.data, upload.size).await?;
    log::info!(
        "Saved job {} ({} bytes)",
        workspace.file_name(),
        upload.size
    );

    toolchain.resolve_dependencies(&workspace).await;
    let result = toolchain
        .execute(&workspace)
        .await
        .and_then(RunOutput::into_body)
        .map_err(|source| JobError::Run {
            file: workspace.file_name().to_string(),
            source,
        });

    let file_name = workspace.file_name().to_string();
    let cleanup = workspace.cleanup().await;

    match (result, cleanup) {
        (Ok(body), Ok(())) => {
            log::info!("Job {file_name} finished with {} bytes of output", body.len());
            Ok(HttpResponse::Ok()
                .insert_header(ContentType::plaintext())
                .body(body))
        }
        (Ok(body), Err(e)) => {
            log::warn!(
                "Discarding {} bytes of output of job {file_name} after failed cleanup",
                body.len()
            );
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(cleanup_err)) => {
            log::error!("{cleanup_err}");
            Err(e)
        }
    }
}

/// Reads the `key` and `file` fields; only the first occurrence of each counts
async fn read_params(mut payload: Multipart, max_size: ByteSize) -> Result<Upload, JobError> {
    let mut key: Option<String> = None;
    let mut data: Option<(Vec<u8>, usize)> = None;
    let mut budget = max_size.0;

    while let Some(field) = payload.next().await {
        let mut field = field.map_err(|e| JobError::Params(e.to_string()))?;

        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("key") if key.is_none() => {
                let bytes = read_field(&mut field, &mut budget).await?;
                let value = String::from_utf8(bytes)
                    .map_err(|_| JobError::Params("field `key` is not valid UTF-8".to_string()))?;
                key = Some(value);
            }
            Some("file") if data.is_none() => {
                let bytes = read_field(&mut field, &mut budget).await?;
                let size = declared_size(field.headers(), bytes.len());
                data = Some((bytes, size));
            }
            _ => {
                while let Some(chunk) = field.next().await {
                    chunk.map_err(|e| JobError::Params(e.to_string()))?;
                }
            }
        }
    }

    let (data, size) =
        data.ok_or_else(|| JobError::Params("missing field `file`".to_string()))?;
    Ok(Upload {
        key: key.unwrap_or_default(),
        data,
        size,
    })
}

/// Size the client declared for a part, falling back to what was received
fn declared_size(headers: &HeaderMap, received: usize) -> usize {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(received)
}

async fn read_field(field: &mut Field, budget: &mut u64) -> Result<Vec<u8>, JobError> {
    let mut buf = Vec::new();

    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| JobError::Params(e.to_string()))?;
        let len = chunk.len() as u64;
        if len > *budget {
            return Err(JobError::Params("request body too large".to_string()));
        }
        *budget -= len;
        buf.extend_from_slice(&chunk);
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::HeaderValue;

    #[test]
    fn test_declared_size_prefers_content_length() {
        let mut headers = HeaderMap::new();
        assert_eq!(declared_size(&headers, 12), 12);

        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("40"));
        assert_eq!(declared_size(&headers, 12), 40);

        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("many"));
        assert_eq!(declared_size(&headers, 12), 12);
    }
}
