// SPDX-License-Identifier: MPL-2.0

use crate::api::types::{
    AuthResponse, Comment, Credentials, ErrorBody, NewPost, Post, SignupRequest, User,
};
use crate::state::TokenProvider;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

#[derive(Serialize)]
struct CommentBody<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct PushTokenBody<'a> {
    token: &'a str,
}

/// Client for the blogging REST API.
///
/// Credentials come from a `TokenProvider`: each request reads whatever token
/// was last stored, so a login elsewhere takes effect on the next call.
/// Failures are returned as-is; nothing here retries.
#[derive(Clone)]
pub struct BlogClient {
    http: reqwest::Client,
    base: Url,
    token: TokenProvider,
}

impl BlogClient {
    pub fn new(base_url: &str, token: TokenProvider) -> Result<Self, ClientError> {
        let mut base = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(format!("{base_url} cannot be a base")));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self { http, base, token })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    // --- auth ---

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let body = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        let request = self.request(Method::POST, &["auth", "login"])?.json(&body);
        self.send(request).await
    }

    pub async fn signup(&self, signup: &SignupRequest) -> Result<AuthResponse, ClientError> {
        let request = self.request(Method::POST, &["auth", "signup"])?.json(signup);
        self.send(request).await
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        let request = self.authed(Method::POST, &["auth", "logout"])?;
        self.send_empty(request).await
    }

    // --- posts ---

    pub async fn fetch_posts(&self) -> Result<Vec<Post>, ClientError> {
        let request = self.authed(Method::GET, &["posts"])?;
        self.send(request).await
    }

    pub async fn fetch_post(&self, post_id: &str) -> Result<Post, ClientError> {
        let request = self.authed(Method::GET, &["posts", post_id])?;
        self.send(request).await
    }

    pub async fn upload_post(&self, post: &NewPost) -> Result<Post, ClientError> {
        let request = self.authed(Method::POST, &["posts"])?.json(post);
        self.send(request).await
    }

    pub async fn delete_post(&self, post_id: &str) -> Result<(), ClientError> {
        let request = self.authed(Method::DELETE, &["posts", post_id])?;
        self.send_empty(request).await
    }

    pub async fn search_posts(&self, query: &str) -> Result<Vec<Post>, ClientError> {
        let request = self
            .authed(Method::GET, &["posts", "search"])?
            .query(&[("q", query)]);
        self.send(request).await
    }

    pub async fn register_view(&self, post_id: &str) -> Result<(), ClientError> {
        let request = self.authed(Method::POST, &["posts", post_id, "views"])?;
        self.send_empty(request).await
    }

    // --- comments and likes ---

    pub async fn add_comment(&self, post_id: &str, text: &str) -> Result<Comment, ClientError> {
        let request = self
            .authed(Method::POST, &["posts", post_id, "comments"])?
            .json(&CommentBody { text });
        self.send(request).await
    }

    pub async fn like_post(&self, post_id: &str) -> Result<(), ClientError> {
        let request = self.authed(Method::POST, &["posts", post_id, "like"])?;
        self.send_empty(request).await
    }

    pub async fn unlike_post(&self, post_id: &str) -> Result<(), ClientError> {
        let request = self.authed(Method::DELETE, &["posts", post_id, "like"])?;
        self.send_empty(request).await
    }

    pub async fn like_comment(&self, post_id: &str, comment_id: &str) -> Result<(), ClientError> {
        let request =
            self.authed(Method::POST, &["posts", post_id, "comments", comment_id, "like"])?;
        self.send_empty(request).await
    }

    pub async fn unlike_comment(&self, post_id: &str, comment_id: &str) -> Result<(), ClientError> {
        let request =
            self.authed(Method::DELETE, &["posts", post_id, "comments", comment_id, "like"])?;
        self.send_empty(request).await
    }

    // --- users ---

    pub async fn fetch_user(&self, user_id: &str) -> Result<User, ClientError> {
        let request = self.authed(Method::GET, &["users", user_id])?;
        self.send(request).await
    }

    pub async fn fetch_followers(&self, user_id: &str) -> Result<Vec<User>, ClientError> {
        let request = self.authed(Method::GET, &["users", user_id, "followers"])?;
        self.send(request).await
    }

    pub async fn fetch_following(&self, user_id: &str) -> Result<Vec<User>, ClientError> {
        let request = self.authed(Method::GET, &["users", user_id, "following"])?;
        self.send(request).await
    }

    pub async fn follow(&self, user_id: &str) -> Result<(), ClientError> {
        let request = self.authed(Method::POST, &["users", user_id, "follow"])?;
        self.send_empty(request).await
    }

    pub async fn unfollow(&self, user_id: &str) -> Result<(), ClientError> {
        let request = self.authed(Method::DELETE, &["users", user_id, "follow"])?;
        self.send_empty(request).await
    }

    pub async fn update_push_token(&self, token: &str) -> Result<(), ClientError> {
        let request = self
            .authed(Method::PUT, &["users", "me", "push-token"])?
            .json(&PushTokenBody { token });
        self.send_empty(request).await
    }

    // --- plumbing ---

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Build a request, attaching the stored token if there is one
    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ClientError> {
        let url = self.endpoint(segments)?;
        debug!(%method, %url, "api request");
        let builder = self.http.request(method, url);
        let token = self.token.current();
        Ok(if token.is_empty() {
            builder
        } else {
            builder.bearer_auth(token)
        })
    }

    /// Like `request`, but fails fast when signed out
    fn authed(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ClientError> {
        if !self.token.is_set() {
            return Err(ClientError::NotAuthenticated);
        }
        self.request(method, segments)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = Self::dispatch(request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    async fn send_empty(&self, request: RequestBuilder) -> Result<(), ClientError> {
        Self::dispatch(request).await?;
        Ok(())
    }

    async fn dispatch(request: RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::NotAuthenticated);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        Err(ClientError::Status {
            status: status.as_u16(),
            message,
        })
    }
}
