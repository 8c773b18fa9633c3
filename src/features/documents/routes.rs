use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::features::documents::dtos::MAX_UPLOAD_SIZE;
use crate::features::documents::handlers;
use crate::features::documents::services::DocumentService;

/// Document routes (all require authentication)
pub fn routes(service: Arc<DocumentService>) -> Router {
    Router::new()
        .route(
            "/documentos",
            post(handlers::create_document).get(handlers::list_documents),
        )
        .route(
            "/documentos/upload",
            // Multipart overhead on top of the file itself
            post(handlers::upload_document)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE + 1024 * 1024)),
        )
        .route("/documentos/my-documents", get(handlers::my_documents))
        .route("/documentos/tags", get(handlers::documents_by_tags))
        .route("/documentos/search", get(handlers::search_documents))
        .route(
            "/documentos/{id}",
            get(handlers::get_document)
                .patch(handlers::update_document)
                .delete(handlers::delete_document),
        )
        .route("/documentos/{id}/download", get(handlers::download_document))
        .route("/documentos/{id}/verify", post(handlers::verify_document))
        .route(
            "/documentos/{id}/verifications",
            get(handlers::list_verifications),
        )
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::auth::model::Role;
    use crate::shared::test_helpers::{
        create_user, data_of, spawn_fake_baas, test_supabase_client, with_user,
    };
    use axum::{http::StatusCode, routing::delete, Json};
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    const CHECKSUM: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    fn document_row(id: Uuid, owner: &str) -> Value {
        json!({
            "id": id,
            "owner_id": owner,
            "title": "Lease agreement",
            "description": "Signed copy",
            "doc_type": "contract",
            "tags": ["legal"],
            "mime_type": "application/pdf",
            "file_size": 5,
            "file_path": format!("{}/{}.pdf", owner, id),
            "checksum_sha256": CHECKSUM,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    async fn echo_insert(Json(mut body): Json<Value>) -> (StatusCode, Json<Value>) {
        body["id"] = json!(Uuid::new_v4());
        (StatusCode::CREATED, Json(body))
    }

    async fn server_for(baas: Router, role: Role) -> TestServer {
        let url = spawn_fake_baas(baas).await;
        let service = Arc::new(DocumentService::new(test_supabase_client(&url)));
        let app = with_user(routes(service), create_user("owner-1", role));
        TestServer::new(app).unwrap()
    }

    #[tokio::test]
    async fn test_list_documents_includes_total() {
        let id = Uuid::new_v4();
        let baas = Router::new().route(
            "/rest/v1/documents",
            get(move || async move { Json(json!([document_row(id, "owner-1")])) }),
        );
        let server = server_for(baas, Role::Owner).await;

        let response = server.get("/documentos").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(data_of(&body)[0]["id"], json!(id));
        assert_eq!(body["meta"]["total"], 1);
    }

    #[tokio::test]
    async fn test_create_forces_owner_and_validates() {
        let baas = Router::new().route("/rest/v1/documents", post(echo_insert));
        let server = server_for(baas, Role::Owner).await;

        let response = server
            .post("/documentos")
            .json(&json!({ "title": "  Tax return ", "tags": ["finance"] }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(data_of(&body)["owner_id"], "owner-1");
        assert_eq!(data_of(&body)["title"], "Tax return");

        server
            .post("/documentos")
            .json(&json!({ "title": "" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_stores_file_and_checksum() {
        let baas = Router::new()
            .route(
                "/storage/v1/object/documents/{*path}",
                post(|| async { Json(json!({ "Key": "ok" })) }),
            )
            .route("/rest/v1/documents", post(echo_insert));
        let server = server_for(baas, Role::Owner).await;

        let form = MultipartForm::new()
            .add_text("titulo", "Greeting")
            .add_text("etiquetas", r#"["hello","test"]"#)
            .add_part(
                "file",
                Part::bytes(b"hello".as_slice())
                    .file_name("greeting.txt")
                    .mime_type("text/plain"),
            );

        let response = server.post("/documentos/upload").multipart(form).await;
        response.assert_status(StatusCode::CREATED);

        let body: Value = response.json();
        let document = data_of(&body);
        assert_eq!(document["title"], "Greeting");
        assert_eq!(document["tags"], json!(["hello", "test"]));
        assert_eq!(document["checksum_sha256"], CHECKSUM);
        assert_eq!(document["file_size"], 5);
        let path = document["file_path"].as_str().unwrap();
        assert!(path.starts_with("owner-1/") && path.ends_with(".txt"));
    }

    #[tokio::test]
    async fn test_upload_removes_object_when_insert_fails() {
        let removals = Arc::new(AtomicUsize::new(0));
        let counter = removals.clone();
        let baas = Router::new()
            .route(
                "/storage/v1/object/documents/{*path}",
                post(|| async { Json(json!({ "Key": "ok" })) }),
            )
            .route(
                "/storage/v1/object/documents",
                delete(move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Json(json!([]))
                    }
                }),
            )
            .route(
                "/rest/v1/documents",
                post(|| async {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "message": "insert failed" })),
                    )
                }),
            );
        let server = server_for(baas, Role::Owner).await;

        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(b"%PDF-1.4".as_slice())
                .file_name("scan.pdf")
                .mime_type("application/pdf"),
        );
        let response = server.post("/documentos/upload").multipart(form).await;

        response.assert_status(StatusCode::BAD_GATEWAY);
        assert_eq!(removals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upload_rejects_disallowed_type() {
        let server = server_for(Router::new(), Role::Owner).await;

        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(b"MZ".as_slice())
                .file_name("setup.exe")
                .mime_type("application/x-msdownload"),
        );
        server
            .post("/documentos/upload")
            .multipart(form)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_id_and_query_params() {
        let server = server_for(Router::new(), Role::Owner).await;

        server
            .get("/documentos/not-a-uuid")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .get("/documentos/tags")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .get("/documentos/search")
            .add_query_param("q", "a")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_requires_ownership() {
        let id = Uuid::new_v4();
        let baas = Router::new().route(
            "/rest/v1/documents",
            get(move || async move { Json(json!([document_row(id, "someone-else")])) })
                .patch(|| async { Json(json!([])) }),
        );
        let server = server_for(baas, Role::Owner).await;

        let response = server
            .patch(&format!("/documentos/{}", id))
            .json(&json!({ "title": "Renamed" }))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        let body: Value = response.json();
        assert_eq!(body["code"], "PERMISSION_ERROR");
    }

    #[tokio::test]
    async fn test_update_by_owner() {
        let id = Uuid::new_v4();
        let baas = Router::new().route(
            "/rest/v1/documents",
            get(move || async move { Json(json!([document_row(id, "owner-1")])) }).patch(
                move |Json(patch): Json<Value>| async move {
                    let mut row = document_row(id, "owner-1");
                    row["title"] = patch["title"].clone();
                    Json(json!([row]))
                },
            ),
        );
        let server = server_for(baas, Role::Owner).await;

        let response = server
            .patch(&format!("/documentos/{}", id))
            .json(&json!({ "title": "Renamed" }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(data_of(&body)["title"], "Renamed");
    }

    #[tokio::test]
    async fn test_delete_by_owner_returns_no_content() {
        let id = Uuid::new_v4();
        let baas = Router::new()
            .route(
                "/rest/v1/documents",
                get(move || async move { Json(json!([document_row(id, "owner-1")])) })
                    .delete(move || async move { Json(json!([document_row(id, "owner-1")])) }),
            )
            .route(
                "/storage/v1/object/documents",
                delete(|| async { Json(json!([])) }),
            );
        let server = server_for(baas, Role::Owner).await;

        server
            .delete(&format!("/documentos/{}", id))
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_verify_checksum_is_case_insensitive() {
        let id = Uuid::new_v4();
        let baas = Router::new()
            .route(
                "/rest/v1/documents",
                get(move || async move { Json(json!([document_row(id, "owner-1")])) }),
            )
            .route("/rest/v1/document_verifications", post(echo_insert));
        let server = server_for(baas, Role::Auditor).await;

        let response = server
            .post(&format!("/documentos/{}/verify", id))
            .json(&json!({ "checksum": CHECKSUM.to_uppercase() }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(data_of(&body)["is_valid"], true);
        assert_eq!(data_of(&body)["message"], "Document integrity verified");

        let response = server
            .post(&format!("/documentos/{}/verify", id))
            .json(&json!({ "checksum": "0".repeat(64) }))
            .await;
        let body: Value = response.json();
        assert_eq!(data_of(&body)["is_valid"], false);
    }

    #[tokio::test]
    async fn test_download_for_share_recipient() {
        let id = Uuid::new_v4();
        let baas = Router::new()
            .route(
                "/rest/v1/documents",
                get(move || async move { Json(json!([document_row(id, "someone-else")])) }),
            )
            .route(
                "/rest/v1/document_shares",
                get(|| async { Json(json!([{ "id": Uuid::new_v4(), "expires_at": null }])) }),
            )
            .route(
                "/storage/v1/object/sign/documents/{*path}",
                post(|| async { Json(json!({ "signedURL": "/object/sign/documents/x?token=t" })) }),
            );
        let server = server_for(baas, Role::Recipient).await;

        let response = server.get(&format!("/documentos/{}/download", id)).await;
        response.assert_status_ok();
        let body: Value = response.json();
        let url = data_of(&body)["url"].as_str().unwrap();
        assert!(url.contains("/storage/v1/object/sign/documents/x?token=t"));
        assert_eq!(data_of(&body)["expires_in"], 3600);
    }

    #[tokio::test]
    async fn test_verification_history_requires_owner_or_auditor() {
        let id = Uuid::new_v4();
        let baas = || {
            Router::new()
                .route(
                    "/rest/v1/documents",
                    get(move || async move { Json(json!([document_row(id, "someone-else")])) }),
                )
                .route(
                    "/rest/v1/document_verifications",
                    get(|| async { Json(json!([])) }),
                )
        };

        let recipient = server_for(baas(), Role::Recipient).await;
        let response = recipient
            .get(&format!("/documentos/{}/verifications", id))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        let body: Value = response.json();
        assert_eq!(body["code"], "PERMISSION_ERROR");
        assert_eq!(body["error"], "Insufficient permissions");

        let auditor = server_for(baas(), Role::Auditor).await;
        auditor
            .get(&format!("/documentos/{}/verifications", id))
            .await
            .assert_status_ok();
    }
}
