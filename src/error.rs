use std::io;
use std::process::ExitStatus;

use actix_web::http::StatusCode;
use actix_web::http::header::ContentType;
use actix_web::{HttpResponse, ResponseError};

/// Failure of one stage of a job, rendered as the single 500 response
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Error during get params from request's body: {0}")]
    Params(String),

    #[error("Error during create folder: {dir}. err: {source}")]
    CreateDir { dir: String, source: io::Error },

    #[error("Error during save file: {0}")]
    SaveFile(#[source] io::Error),

    #[error("Error during run file: {file}. err: {source}")]
    Run {
        file: String,
        source: ToolchainError,
    },

    #[error("Error during delete file: {0}")]
    Cleanup(#[source] io::Error),
}

impl ResponseError for JobError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::plaintext())
            .body(self.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    #[error("toolchain command is empty")]
    EmptyCommand,

    #[error("unable to spawn {program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("{0}")]
    Failed(ExitStatus),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_stage() {
        let err = JobError::CreateDir {
            dir: "k20240101000000".to_string(),
            source: io::Error::from(io::ErrorKind::AlreadyExists),
        };
        assert!(err.to_string().starts_with("Error during create folder: k20240101000000. err:"));

        let err = JobError::Params("missing field `file`".to_string());
        assert_eq!(
            err.to_string(),
            "Error during get params from request's body: missing field `file`"
        );
    }

    #[test]
    fn test_response_is_plain_500() {
        let resp = JobError::Cleanup(io::Error::from(io::ErrorKind::NotFound)).error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "text/plain; charset=utf-8"
        );
    }
}
