//! An assistant service for OpenAI-compatible Assistants APIs.

#[macro_use]
extern crate tracing;

mod config;
mod proto;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use autoassist_model::{
    AssistantProfile, AssistantService, ConversationMessage, ErrorKind,
    NewMessage, Run, ServiceError, ToolOutput,
};
use mime::Mime;
use reqwest::{
    Client, Method, RequestBuilder, Response, StatusCode, Url, header,
};
use serde::de::DeserializeOwned;

pub use config::{OpenAIConfig, OpenAIConfigBuilder};

const PAGE_SIZE: &str = "100";

/// Error type for [`OpenAIAssistantService`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ServiceError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_connect() || err.is_timeout() {
            ErrorKind::Unavailable
        } else {
            match err.status() {
                Some(status) => kind_of_status(status),
                None => ErrorKind::Other,
            }
        };
        Self::new(format!("{err}"), kind)
    }
}

fn kind_of_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimitExceeded,
        status if status.is_server_error() => ErrorKind::Unavailable,
        _ => ErrorKind::Other,
    }
}

/// Assistant service backed by the OpenAI Assistants API (v2).
///
/// Knowledge stores map to vector stores, profiles to assistants and
/// conversations to threads.
#[derive(Clone, Debug)]
pub struct OpenAIAssistantService {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIAssistantService {
    /// Creates a new `OpenAIAssistantService` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_url(method, format!("{}{path}", self.config.base_url))
    }

    fn request_url<U: reqwest::IntoUrl>(
        &self,
        method: Method,
        url: U,
    ) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .header("OpenAI-Beta", "assistants=v2")
            .header(header::ACCEPT, "application/json")
    }
}

/// Sends a request and decodes the JSON body of a successful response.
async fn send<T: DeserializeOwned>(
    request: RequestBuilder,
) -> Result<T, Error> {
    let resp = request.send().await?;
    let resp = check_status(resp).await?;

    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let is_json = content_type
        .and_then(|v| v.parse().ok())
        .map(|m: Mime| {
            m.essence_str() == mime::APPLICATION_JSON.essence_str()
        })
        .unwrap_or(false);
    if !is_json {
        return Err(Error::new(
            format!("Unexpected content type: {content_type:?}"),
            ErrorKind::Other,
        ));
    }

    Ok(resp.json().await?)
}

async fn check_status(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    // Prefer the message the server sent over the bare status.
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<proto::ErrorBody>(&body)
        .map(|body| body.error.message)
        .unwrap_or(body);
    debug!("request failed with {status}: {message}");
    Err(Error::new(
        format!("{status}: {message}"),
        kind_of_status(status),
    ))
}

impl AssistantService for OpenAIAssistantService {
    type Error = Error;

    fn create_knowledge_store(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static
    {
        let request = self
            .request(Method::POST, "/vector_stores")
            .json(&proto::CreateVectorStoreRequest {
                name: name.to_owned(),
            });
        async move { send::<proto::Object>(request).await.map(|obj| obj.id) }
    }

    fn create_profile(
        &self,
        profile: &AssistantProfile,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static
    {
        let request = self
            .request(Method::POST, "/assistants")
            .json(&proto::create_assistant_request(profile));
        async move { send::<proto::Object>(request).await.map(|obj| obj.id) }
    }

    fn update_profile(
        &self,
        profile_id: &str,
        profile: &AssistantProfile,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let request = self
            .request(Method::POST, &format!("/assistants/{profile_id}"))
            .json(&proto::create_assistant_request(profile));
        async move { send::<proto::Object>(request).await.map(|_| ()) }
    }

    fn create_conversation(
        &self,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static
    {
        let request = self
            .request(Method::POST, "/threads")
            .json(&serde_json::json!({}));
        async move { send::<proto::Object>(request).await.map(|obj| obj.id) }
    }

    fn delete_conversation(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let request = self
            .request(Method::DELETE, &format!("/threads/{conversation_id}"));
        async move {
            let deleted = send::<proto::Deleted>(request).await?;
            if !deleted.deleted {
                return Err(Error::new(
                    "the thread was not deleted",
                    ErrorKind::Other,
                ));
            }
            Ok(())
        }
    }

    fn append_message(
        &self,
        conversation_id: &str,
        message: &NewMessage,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let request = self
            .request(
                Method::POST,
                &format!("/threads/{conversation_id}/messages"),
            )
            .json(&proto::create_message_request(message));
        async move { send::<proto::Object>(request).await.map(|_| ()) }
    }

    fn list_messages(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<Vec<ConversationMessage>, Self::Error>>
    + Send
    + 'static {
        let this = self.clone();
        let endpoint = format!(
            "{}/threads/{conversation_id}/messages",
            self.config.base_url
        );
        async move {
            let mut messages = vec![];
            let mut after: Option<String> = None;
            loop {
                let mut params = vec![("order", "asc"), ("limit", PAGE_SIZE)];
                if let Some(after) = after.as_deref() {
                    params.push(("after", after));
                }
                let url = Url::parse_with_params(&endpoint, &params)
                    .map_err(|err| {
                        Error::new(format!("{err}"), ErrorKind::Other)
                    })?;
                let page: proto::MessageList =
                    send(this.request_url(Method::GET, url)).await?;

                trace!("got {} messages", page.data.len());
                let last_id = page.data.last().map(|msg| msg.id.clone());
                messages.extend(
                    page.data.into_iter().map(proto::message_from_object),
                );
                match (page.has_more, page.last_id.or(last_id)) {
                    (true, Some(last_id)) => after = Some(last_id),
                    _ => return Ok(messages),
                }
            }
        }
    }

    fn create_run(
        &self,
        conversation_id: &str,
        profile_id: &str,
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static {
        let path = format!("/threads/{conversation_id}/runs");
        let request = self
            .request(Method::POST, &path)
            .json(&proto::CreateRunRequest {
                assistant_id: profile_id.to_owned(),
            });
        async move {
            send::<proto::RunObject>(request)
                .await
                .map(proto::run_from_object)
        }
    }

    fn retrieve_run(
        &self,
        conversation_id: &str,
        run_id: &str,
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static {
        let request = self.request(
            Method::GET,
            &format!("/threads/{conversation_id}/runs/{run_id}"),
        );
        async move {
            send::<proto::RunObject>(request)
                .await
                .map(proto::run_from_object)
        }
    }

    fn submit_tool_outputs(
        &self,
        conversation_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static {
        let path = format!(
            "/threads/{conversation_id}/runs/{run_id}/submit_tool_outputs"
        );
        let request = self
            .request(Method::POST, &path)
            .json(&proto::SubmitToolOutputsRequest {
                tool_outputs: outputs.to_vec(),
            });
        async move {
            send::<proto::RunObject>(request)
                .await
                .map(proto::run_from_object)
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn test_status_kinds() {
        assert_eq!(
            kind_of_status(StatusCode::NOT_FOUND),
            ErrorKind::NotFound
        );
        assert_eq!(
            kind_of_status(StatusCode::TOO_MANY_REQUESTS),
            ErrorKind::RateLimitExceeded
        );
        assert_eq!(
            kind_of_status(StatusCode::BAD_GATEWAY),
            ErrorKind::Unavailable
        );
        assert_eq!(kind_of_status(StatusCode::BAD_REQUEST), ErrorKind::Other);
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        // Grab a free port and close it again, so nothing is listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = OpenAIConfigBuilder::with_api_key("sk-test")
            .with_base_url(format!("http://{addr}/v1"))
            .build();
        let service = OpenAIAssistantService::new(config);
        let err = service.create_conversation().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }
}
