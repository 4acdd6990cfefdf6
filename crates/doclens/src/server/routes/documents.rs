//! Document upload, listing, reconciliation and deletion

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::lifecycle::{DocumentUpload, IngestFailure, ReconcileReport, StoreOutcome};
use crate::server::state::AppState;
use crate::types::SourceDocument;

#[derive(Debug, Serialize)]
pub struct DocumentList {
    pub documents: Vec<SourceDocument>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct DocumentDetails {
    #[serde(flatten)]
    pub document: SourceDocument,
    pub mime_type: String,
    pub chunks_indexed: usize,
}

#[derive(Debug, Serialize)]
pub struct StoredFile {
    pub name: String,
    #[serde(flatten)]
    pub outcome: StoreOutcome,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub stored: Vec<StoredFile>,
    pub errors: Vec<IngestFailure>,
}

/// GET /api/documents
pub async fn list_documents(State(state): State<AppState>) -> Json<DocumentList> {
    let documents = state.session().list_documents();
    Json(DocumentList {
        total: documents.len(),
        documents,
    })
}

/// GET /api/documents/:name
pub async fn get_document(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<DocumentDetails>> {
    let document = state
        .session()
        .list_documents()
        .into_iter()
        .find(|d| d.name == name)
        .ok_or_else(|| Error::DocumentNotFound(name))?;

    Ok(Json(DocumentDetails {
        mime_type: document.mime_type(),
        chunks_indexed: state.session().index().chunks_for(document.id).len(),
        document,
    }))
}

/// POST /api/documents - store each uploaded file
pub async fn upload_documents(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let uploads = read_uploads(multipart).await?;
    let mut response = UploadResponse {
        stored: Vec::new(),
        errors: Vec::new(),
    };

    for upload in uploads {
        tracing::info!("Processing upload: {} ({} bytes)", upload.name, upload.data.len());
        let data = upload.data.to_vec();
        match state.session().ingest(&upload.name, data).await {
            Ok(outcome) => response.stored.push(StoredFile {
                name: upload.name,
                outcome,
            }),
            Err(e) => response.errors.push(IngestFailure {
                name: upload.name,
                error: e.to_string(),
            }),
        }
    }

    Ok(Json(response))
}

/// PUT /api/documents - make the uploaded files the complete document set
pub async fn sync_documents(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ReconcileReport>> {
    let uploads = read_uploads(multipart).await?;
    Ok(Json(state.session().sync_documents(uploads).await))
}

/// DELETE /api/documents/:name
pub async fn delete_document(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode> {
    state.session().delete_document(&name)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn read_uploads(mut multipart: Multipart) -> Result<Vec<DocumentUpload>> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Internal(format!("Failed to read multipart field: {}", e)))?
    {
        let name = match field.file_name().or(field.name()) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::Internal(format!("Failed to read '{}': {}", name, e)))?;

        uploads.push(DocumentUpload::new(name, data.to_vec()));
    }

    Ok(uploads)
}
