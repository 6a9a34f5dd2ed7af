use crate::api::NotificationApi;
use crate::error::*;
use crate::SdkResult;
use assetforge_core::*;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use url::Url;

const STREAM_PATH: &str = "api/notifications/stream";
const PREFERENCES_PATH: &str = "api/users/me/notification-preferences";

#[derive(Clone)]
pub struct AssetforgeClient {
    client: Client,
    pub base_url: String,
    pub timeout: Duration,
    pub token: Option<String>,
}

impl AssetforgeClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
            token: None,
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn set_token(&mut self, token: &str) {
        self.token = Some(token.to_string());
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Underlying HTTP client, shared with the SSE transport.
    pub fn http(&self) -> &Client {
        &self.client
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        // 添加Authorization头如果有token
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Stream endpoint for `user_id`.
    ///
    /// `websocket` switches the scheme to `ws`/`wss` and carries the token as a
    /// query parameter, since browsers and most WS clients cannot set headers.
    pub fn stream_url(&self, user_id: &str, websocket: bool) -> SdkResult<Url> {
        let mut url = Url::parse(&self.endpoint(STREAM_PATH))?;
        if websocket {
            let scheme = match url.scheme() {
                "https" => "wss",
                _ => "ws",
            };
            url.set_scheme(scheme)
                .map_err(|_| SdkError::NetworkError(format!("cannot use {scheme} for {url}")))?;
        }
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("userId", user_id);
            if websocket {
                if let Some(token) = &self.token {
                    pairs.append_pair("token", token);
                }
            }
        }
        Ok(url)
    }

    /// Attaches auth to a request built elsewhere (the SSE transport).
    pub fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        self.authorize(request)
    }

    async fn api_request<T>(&self, request: RequestBuilder) -> SdkResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.authorize(request.timeout(self.timeout)).send().await?;
        let body = response.error_for_status()?.bytes().await?;
        decode_envelope(&body)
    }

    async fn api_command(&self, request: RequestBuilder) -> SdkResult<()> {
        let response = self.authorize(request.timeout(self.timeout)).send().await?;
        response.error_for_status()?;
        Ok(())
    }
}

/// Unwraps the `{ status, data }` envelope every JSON endpoint returns.
fn decode_envelope<T>(body: &[u8]) -> SdkResult<T>
where
    T: serde::de::DeserializeOwned,
{
    let api_response: ApiResponse<T> = serde_json::from_slice(body)?;
    if api_response.status != "ok" {
        return Err(SdkError::ApiError {
            status: api_response.status,
        });
    }
    Ok(api_response.data)
}

#[async_trait]
impl NotificationApi for AssetforgeClient {
    async fn fetch_notifications(&self, query: &NotificationQuery) -> SdkResult<NotificationPage> {
        let request = self
            .client
            .get(self.endpoint("api/notifications"))
            .query(query);
        self.api_request(request).await
    }

    async fn fetch_unread_count(&self) -> SdkResult<u64> {
        let request = self.client.get(self.endpoint("api/notifications/unread-count"));
        let response: UnreadCountResponse = self.api_request(request).await?;
        Ok(response.count)
    }

    async fn mark_as_read(&self, ids: &[String]) -> SdkResult<()> {
        let body = MarkReadRequest { ids: ids.to_vec() };
        let request = self
            .client
            .post(self.endpoint("api/notifications/read"))
            .json(&body);
        self.api_command(request).await
    }

    async fn mark_all_as_read(&self) -> SdkResult<()> {
        let request = self.client.post(self.endpoint("api/notifications/read-all"));
        self.api_command(request).await
    }

    async fn fetch_preferences(&self) -> SdkResult<NotificationPreferences> {
        let request = self.client.get(self.endpoint(PREFERENCES_PATH));
        self.api_request(request).await
    }

    async fn save_preferences(&self, prefs: &NotificationPreferences) -> SdkResult<()> {
        let request = self.client.put(self.endpoint(PREFERENCES_PATH)).json(prefs);
        self.api_command(request).await
    }
}
