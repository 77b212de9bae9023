use crate::application::ports::{AttachPhotoArgs, RemoteBackend};
use crate::domain::entities::{
    AddAdHocArgs, Chore, CreateChoreArgs, DailyChore, RemoveArgs, UpdateChoreArgs,
    UpdateDailyChoreArgs,
};
use crate::domain::value_objects::{AccessKey, StorageId};
use crate::shared::error::RemoteError;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::time::Duration;

const MAX_LOG_BODY_CHARS: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Query,
    Mutation,
}

impl CallKind {
    fn endpoint(self) -> &'static str {
        match self {
            CallKind::Query => "api/query",
            CallKind::Mutation => "api/mutation",
        }
    }
}

/// RPC client for a Convex-style deployment: every call is a JSON POST of
/// `{path, args, format}` answered by `{status, value | errorMessage}`.
#[derive(Debug, Clone)]
pub struct HttpRemoteBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemoteBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::network(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn call<A, T>(
        &self,
        kind: CallKind,
        path: &str,
        args: &A,
        auth: Option<AccessKey>,
    ) -> Result<T, RemoteError>
    where
        A: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = rpc_body(path, args, auth.as_ref())?;
        let url = format!("{}/{}", self.base_url, kind.endpoint());
        tracing::debug!(path, ?kind, "remote call");

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        if !(200..300).contains(&status) {
            tracing::debug!(path, status, body = %preview(&text), "remote call failed");
        }
        parse_rpc_response(status, &text)
    }

    async fn mutation<A: Serialize + ?Sized>(
        &self,
        path: &str,
        args: &A,
        auth: Option<AccessKey>,
    ) -> Result<(), RemoteError> {
        let _: Value = self.call(CallKind::Mutation, path, args, auth).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteBackend for HttpRemoteBackend {
    async fn create_chore(
        &self,
        args: CreateChoreArgs,
        auth: Option<AccessKey>,
    ) -> Result<(), RemoteError> {
        self.mutation("chores:create", &args, auth).await
    }

    async fn update_chore(
        &self,
        args: UpdateChoreArgs,
        auth: Option<AccessKey>,
    ) -> Result<(), RemoteError> {
        self.mutation("chores:update", &args, auth).await
    }

    async fn remove_chore(
        &self,
        args: RemoveArgs,
        auth: Option<AccessKey>,
    ) -> Result<(), RemoteError> {
        self.mutation("chores:remove", &args, auth).await
    }

    async fn list_chores(&self, auth: Option<AccessKey>) -> Result<Vec<Chore>, RemoteError> {
        self.call(CallKind::Query, "chores:list", &json!({}), auth)
            .await
    }

    async fn list_chores_since(
        &self,
        since: i64,
        auth: Option<AccessKey>,
    ) -> Result<Vec<Chore>, RemoteError> {
        self.call(
            CallKind::Query,
            "chores:listSince",
            &json!({ "since": since }),
            auth,
        )
        .await
    }

    async fn create_daily_chore(
        &self,
        args: AddAdHocArgs,
        auth: Option<AccessKey>,
    ) -> Result<(), RemoteError> {
        self.mutation("dailyChores:addAdHoc", &args, auth).await
    }

    async fn update_daily_chore(
        &self,
        args: UpdateDailyChoreArgs,
        auth: Option<AccessKey>,
    ) -> Result<(), RemoteError> {
        self.mutation("dailyChores:toggleComplete", &args, auth)
            .await
    }

    async fn remove_daily_chore(
        &self,
        args: RemoveArgs,
        auth: Option<AccessKey>,
    ) -> Result<(), RemoteError> {
        self.mutation("dailyChores:remove", &args, auth).await
    }

    async fn list_daily_chores_by_date(
        &self,
        date: String,
        auth: Option<AccessKey>,
    ) -> Result<Vec<DailyChore>, RemoteError> {
        let list: Option<Vec<DailyChore>> = self
            .call(
                CallKind::Query,
                "dailyChores:getOrCreateDailyList",
                &json!({ "date": date }),
                auth,
            )
            .await?;
        Ok(list.unwrap_or_default())
    }

    async fn generate_upload_url(&self, auth: Option<AccessKey>) -> Result<String, RemoteError> {
        self.call(
            CallKind::Mutation,
            "photos:generateUploadUrl",
            &json!({}),
            auth,
        )
        .await
    }

    async fn attach_photo(
        &self,
        args: AttachPhotoArgs,
        auth: Option<AccessKey>,
    ) -> Result<(), RemoteError> {
        self.mutation("photos:attachPhotoToChore", &args, auth)
            .await
    }

    async fn photo_url(
        &self,
        storage_id: StorageId,
        auth: Option<AccessKey>,
    ) -> Result<Option<String>, RemoteError> {
        self.call(
            CallKind::Query,
            "photos:getPhotoUrl",
            &json!({ "storageId": storage_id }),
            auth,
        )
        .await
    }

    async fn ping(&self) -> Result<(), RemoteError> {
        let response = self
            .client
            .get(format!("{}/version", self.base_url))
            .send()
            .await?;
        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(RemoteError::api(status, "health check failed"))
        }
    }
}

/// Request body for one RPC call; the access key travels as the `accessKey` argument.
pub(crate) fn rpc_body<A: Serialize + ?Sized>(
    path: &str,
    args: &A,
    auth: Option<&AccessKey>,
) -> Result<Value, RemoteError> {
    let mut args = match serde_json::to_value(args)
        .map_err(|e| RemoteError::Rejected(format!("Unserializable arguments: {e}")))?
    {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(RemoteError::Rejected(format!(
                "Arguments for {path} must be an object, got {other}"
            )));
        }
    };
    if let Some(key) = auth {
        args.insert("accessKey".to_string(), Value::String(key.as_str().to_string()));
    }
    Ok(json!({ "path": path, "args": args, "format": "json" }))
}

/// Maps an HTTP status and RPC envelope onto a value or a classified error.
pub(crate) fn parse_rpc_response<T: DeserializeOwned>(
    status: u16,
    body: &str,
) -> Result<T, RemoteError> {
    let envelope: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) if !(200..300).contains(&status) => {
            return Err(RemoteError::api(status, preview(body)));
        }
        Err(e) => return Err(RemoteError::Rejected(format!("Malformed response: {e}"))),
    };

    match envelope.get("status").and_then(Value::as_str) {
        Some("success") => {
            let value = envelope.get("value").cloned().unwrap_or(Value::Null);
            serde_json::from_value(value)
                .map_err(|e| RemoteError::Rejected(format!("Unexpected response shape: {e}")))
        }
        Some("error") => {
            let message = envelope
                .get("errorMessage")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            Err(classify_error(status, message))
        }
        _ if !(200..300).contains(&status) => Err(RemoteError::api(status, preview(body))),
        _ => Err(RemoteError::Rejected(format!(
            "Response without status: {}",
            preview(body)
        ))),
    }
}

fn classify_error(status: u16, message: String) -> RemoteError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("not found") {
        return RemoteError::NotFound(message);
    }
    if lower.contains("unauthorized") || lower.contains("access key") {
        return RemoteError::Unauthorized(message);
    }
    match status {
        408 | 429 | 500..=599 => RemoteError::api(status, message),
        _ => RemoteError::Rejected(message),
    }
}

fn preview(body: &str) -> String {
    let mut text: String = body.chars().take(MAX_LOG_BODY_CHARS).collect();
    if body.chars().count() > MAX_LOG_BODY_CHARS {
        text.push_str("...");
    }
    text
}
