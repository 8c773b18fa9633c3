use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::client::{Auth, SupabaseClient};
use crate::core::error::Result;

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

impl SupabaseClient {
    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            encode_path(path)
        )
    }

    /// Upload an object to the document bucket
    ///
    /// # Arguments
    /// * `path` - Object path inside the bucket (e.g. `{owner}/{uuid}.pdf`)
    /// * `data` - File content
    /// * `content_type` - MIME type stored with the object
    ///
    /// Existing objects are never overwritten.
    pub async fn upload(
        &self,
        auth: Auth<'_>,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let size = data.len();
        let builder = self
            .http_client
            .post(self.object_url(path))
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(data);

        self.send(self.authorize(builder, auth), "storage upload")
            .await?;

        info!("Uploaded object {} ({} bytes)", path, size);
        Ok(())
    }

    /// Create a time-limited download URL for an object
    ///
    /// # Returns
    /// Absolute URL valid for `expires_in` seconds
    pub async fn create_signed_url(
        &self,
        auth: Auth<'_>,
        path: &str,
        expires_in: u64,
    ) -> Result<String> {
        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.base_url,
            self.bucket,
            encode_path(path)
        );
        let builder = self
            .http_client
            .post(url)
            .json(&json!({ "expiresIn": expires_in }));

        let response: SignedUrlResponse = self
            .send_json(self.authorize(builder, auth), "storage sign")
            .await?;

        debug!("Signed URL created for {} ({}s)", path, expires_in);
        Ok(self.absolute_signed_url(&response.signed_url))
    }

    /// Remove objects from the document bucket
    pub async fn remove(&self, auth: Auth<'_>, paths: &[String]) -> Result<()> {
        let url = format!("{}/storage/v1/object/{}", self.base_url, self.bucket);
        let builder = self
            .http_client
            .delete(url)
            .json(&json!({ "prefixes": paths }));

        self.send(self.authorize(builder, auth), "storage remove")
            .await?;

        info!("Removed {} object(s) from bucket {}", paths.len(), self.bucket);
        Ok(())
    }

    /// Storage answers with a path relative to `/storage/v1`
    fn absolute_signed_url(&self, signed: &str) -> String {
        if signed.starts_with("http://") || signed.starts_with("https://") {
            signed.to_string()
        } else {
            format!(
                "{}/storage/v1/{}",
                self.base_url,
                signed.trim_start_matches('/')
            )
        }
    }
}

/// Percent-encode each path segment, keeping the separators
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
