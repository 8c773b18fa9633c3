use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

use super::client::{Auth, SupabaseClient};
use crate::core::error::Result;

/// User record as returned by the auth service
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BaasUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
}

/// Token pair issued by the auth service
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user: BaasUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Sign-up returns a session when email confirmation is disabled, the bare user otherwise
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SignUpOutcome {
    Session(Session),
    PendingConfirmation(BaasUser),
}

impl SignUpOutcome {
    pub fn user(&self) -> &BaasUser {
        match self {
            SignUpOutcome::Session(session) => &session.user,
            SignUpOutcome::PendingConfirmation(user) => user,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SignUpOutcome::Session(session) => Some(session),
            SignUpOutcome::PendingConfirmation(_) => None,
        }
    }
}

impl SupabaseClient {
    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let builder = self
            .http_client
            .post(self.auth_url("token?grant_type=password"))
            .json(&json!({ "email": email, "password": password }));
        self.send_json(self.authorize(builder, Auth::Anon), "auth sign in")
            .await
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Value,
    ) -> Result<SignUpOutcome> {
        let builder = self.http_client.post(self.auth_url("signup")).json(&json!({
            "email": email,
            "password": password,
            "data": metadata,
        }));
        self.send_json(self.authorize(builder, Auth::Anon), "auth sign up")
            .await
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        let builder = self
            .http_client
            .post(self.auth_url("token?grant_type=refresh_token"))
            .json(&json!({ "refresh_token": refresh_token }));
        self.send_json(self.authorize(builder, Auth::Anon), "auth refresh")
            .await
    }

    /// Resolve the user behind an access token
    pub async fn get_user(&self, access_token: &str) -> Result<BaasUser> {
        let builder = self.http_client.get(self.auth_url("user"));
        self.send_json(self.authorize(builder, Auth::User(access_token)), "auth user")
            .await
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<()> {
        let builder = self.http_client.post(self.auth_url("logout"));
        self.send(self.authorize(builder, Auth::User(access_token)), "auth sign out")
            .await?;
        Ok(())
    }

    pub async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<()> {
        let url = format!(
            "{}?redirect_to={}",
            self.auth_url("recover"),
            urlencoding::encode(redirect_to)
        );
        let builder = self.http_client.post(url).json(&json!({ "email": email }));
        self.send(self.authorize(builder, Auth::Anon), "auth recover")
            .await?;
        Ok(())
    }
}
