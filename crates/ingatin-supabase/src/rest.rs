// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PostgREST-backed [`UserStore`].

use async_trait::async_trait;
use chrono::Utc;
use ingatin_core::{
    AdapterType, HealthStatus, IngatinError, NewUser, PluginAdapter, Shift, User, UserId,
    UserPatch, UserStore,
};
use reqwest::Method;
use tracing::{debug, info};

use crate::client::{SupabaseClient, encode_filter_value, json_body, rest_error, transport_error};

/// Single-object responses: zero or several rows answer 406.
const OBJECT_ACCEPT: &str = "application/vnd.pgrst.object+json";

/// Filter matching every row of the table.
const ALL_ROWS: &str = "id=not.is.null";

/// Row store over the `users` table exposed by PostgREST.
#[derive(Debug, Clone)]
pub struct SupabaseUserStore {
    client: SupabaseClient,
    table: String,
}

impl SupabaseUserStore {
    pub fn new(client: SupabaseClient, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    fn table_url(&self, query: &str) -> String {
        self.client.rest_url(&format!("{}?{query}", self.table))
    }

    fn id_filter(id: &UserId) -> String {
        format!("id=eq.{}", encode_filter_value(id.as_str()))
    }
}

#[async_trait]
impl PluginAdapter for SupabaseUserStore {
    fn name(&self) -> &str {
        "supabase-rest"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, IngatinError> {
        let url = self.table_url("select=id&limit=1");
        let response = match self.client.request(Method::GET, &url).send().await {
            Ok(response) => response,
            Err(e) => return Ok(HealthStatus::Unhealthy(format!("unreachable: {e}"))),
        };
        if response.status().is_success() {
            Ok(HealthStatus::Healthy)
        } else {
            let err = rest_error(response, None).await;
            Ok(HealthStatus::Degraded(err.to_string()))
        }
    }
}

#[async_trait]
impl UserStore for SupabaseUserStore {
    async fn list_users(&self) -> Result<Vec<User>, IngatinError> {
        let url = self.table_url("select=*&order=created_at.desc");
        let response = self
            .client
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(rest_error(response, None).await);
        }
        let users: Vec<User> = json_body(response).await?;
        debug!(table = %self.table, count = users.len(), "listed users");
        Ok(users)
    }

    async fn get_user(&self, id: &UserId) -> Result<User, IngatinError> {
        let url = self.table_url(&format!("select=*&{}", Self::id_filter(id)));
        let response = self
            .client
            .request(Method::GET, &url)
            .header("Accept", OBJECT_ACCEPT)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(rest_error(response, Some(("user", id.as_str()))).await);
        }
        json_body(response).await
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, IngatinError> {
        let url = self.table_url("select=*");
        let response = self
            .client
            .request(Method::POST, &url)
            .header("Accept", OBJECT_ACCEPT)
            .header("Prefer", "return=representation")
            .json(user)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(rest_error(response, None).await);
        }
        let created: User = json_body(response).await?;
        info!(table = %self.table, id = %created.id, "user created");
        Ok(created)
    }

    async fn update_user(&self, id: &UserId, patch: &UserPatch) -> Result<User, IngatinError> {
        let body = patch.clone().with_updated_at(Utc::now());
        let url = self.table_url(&format!("select=*&{}", Self::id_filter(id)));
        let response = self
            .client
            .request(Method::PATCH, &url)
            .header("Accept", OBJECT_ACCEPT)
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(rest_error(response, Some(("user", id.as_str()))).await);
        }
        let updated: User = json_body(response).await?;
        debug!(table = %self.table, id = %id, "user updated");
        Ok(updated)
    }

    async fn delete_user(&self, id: &UserId) -> Result<(), IngatinError> {
        let url = self.table_url(&Self::id_filter(id));
        let response = self
            .client
            .request(Method::DELETE, &url)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(rest_error(response, None).await);
        }
        info!(table = %self.table, id = %id, "user deleted");
        Ok(())
    }

    async fn reset_attendance(&self, shift: Shift) -> Result<(), IngatinError> {
        let body = shift.patch(false).with_updated_at(Utc::now());
        let url = self.table_url(ALL_ROWS);
        let response = self
            .client
            .request(Method::PATCH, &url)
            .header("Prefer", "return=minimal")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(rest_error(response, None).await);
        }
        info!(table = %self.table, column = shift.column(), "attendance reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn row(id: &str, pagi: bool) -> serde_json::Value {
        json!({
            "id": id,
            "number": "628123456789@s.whatsapp.net",
            "name": "Budi",
            "absen_pagi": pagi,
            "absen_sore": false,
            "last_checkin": null,
            "suspend_until": null,
            "created_at": "2026-10-01T00:00:00Z",
            "updated_at": "2026-10-01T00:00:00Z"
        })
    }

    fn store(server: &MockServer) -> SupabaseUserStore {
        let client = SupabaseClient::new(
            &server.uri(),
            SecretString::from("anon-key"),
            Duration::from_secs(5),
        )
        .unwrap();
        SupabaseUserStore::new(client, "users")
    }

    #[tokio::test]
    async fn list_users_orders_newest_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .and(query_param("order", "created_at.desc"))
            .and(header("apikey", "anon-key"))
            .and(header("Authorization", "Bearer anon-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([row("2", true), row("1", false)])))
            .expect(1)
            .mount(&server)
            .await;

        let users = store(&server).list_users().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id.as_str(), "2");
        assert!(users[0].absen_pagi);
    }

    #[tokio::test]
    async fn get_user_maps_406_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .and(query_param("id", "eq.missing"))
            .and(header("Accept", OBJECT_ACCEPT))
            .respond_with(ResponseTemplate::new(406).set_body_json(json!({
                "code": "PGRST116",
                "details": "The result contains 0 rows",
                "hint": null,
                "message": "JSON object requested, multiple (or no) rows returned"
            })))
            .mount(&server)
            .await;

        let err = store(&server)
            .get_user(&UserId::from("missing"))
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "got {err:?}");
    }

    #[tokio::test]
    async fn create_user_returns_representation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/users"))
            .and(header("Prefer", "return=representation"))
            .and(body_partial_json(json!({"number": "628123456789@s.whatsapp.net"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(row("9", false)))
            .mount(&server)
            .await;

        let new_user = NewUser {
            number: "628123456789@s.whatsapp.net".into(),
            name: Some("Budi".into()),
            ..NewUser::default()
        };
        let created = store(&server).create_user(&new_user).await.unwrap();
        assert_eq!(created.id.as_str(), "9");
    }

    #[tokio::test]
    async fn create_user_surfaces_backend_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/users"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23505",
                "details": "Key (number)=(62812@s.whatsapp.net) already exists.",
                "hint": null,
                "message": "duplicate key value violates unique constraint \"users_number_key\""
            })))
            .mount(&server)
            .await;

        let err = store(&server)
            .create_user(&NewUser::default())
            .await
            .unwrap_err();
        match err {
            IngatinError::Remote { message, .. } => {
                assert!(message.starts_with("duplicate key value"));
                assert!(message.contains("already exists"));
            }
            other => panic!("expected Remote, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_user_sends_patch_with_updated_at() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/users"))
            .and(query_param("id", "eq.1"))
            .and(body_partial_json(json!({"absen_pagi": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(row("1", true)))
            .mount(&server)
            .await;

        let updated = store(&server)
            .update_user(&UserId::from("1"), &UserPatch::morning(true))
            .await
            .unwrap();
        assert!(updated.absen_pagi);

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("updated_at").is_some());
        assert!(body.get("absen_sore").is_none());
    }

    #[tokio::test]
    async fn delete_user_filters_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/users"))
            .and(query_param("id", "eq.7"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        store(&server).delete_user(&UserId::from("7")).await.unwrap();
    }

    #[tokio::test]
    async fn reset_targets_every_row() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/users"))
            .and(query_param("id", "not.is.null"))
            .and(body_partial_json(json!({"absen_sore": false})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        store(&server).reset_evening_attendance().await.unwrap();
    }

    #[tokio::test]
    async fn health_check_reports_degraded_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid API key"})))
            .mount(&server)
            .await;

        let status = store(&server).health_check().await.unwrap();
        assert!(matches!(status, HealthStatus::Degraded(msg) if msg.contains("Invalid API key")));
    }
}
