use grounded_chat_model::ErrorKind;
use mime::Mime;
use reqwest::{Response, StatusCode, header};
use serde::de::DeserializeOwned;

use crate::{Error, proto};

/// Turns a transport-level failure into an [`Error`].
#[inline]
pub fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        return Error::new(
            format!("Pinecone did not respond in time: {err}"),
            ErrorKind::Connection,
        );
    }
    Error::new(
        format!("Failed to reach Pinecone: {err}"),
        ErrorKind::Connection,
    )
}

/// Reads a successful JSON response, or maps the failure to an [`Error`].
pub async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, Error> {
    let status = resp.status();
    if !status.is_success() {
        return Err(error_from_response(resp).await);
    }

    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    if let Some(content_type) = content_type {
        let is_json = content_type
            .parse()
            .map(|m: Mime| {
                m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON)
            })
            .unwrap_or(false);
        if !is_json {
            return Err(Error::new(
                format!("Unexpected content type: {content_type}"),
                ErrorKind::Upstream,
            ));
        }
    }

    resp.json().await.map_err(|err| {
        Error::new(
            format!("Malformed response from Pinecone: {err}"),
            ErrorKind::Upstream,
        )
    })
}

async fn error_from_response(resp: Response) -> Error {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    trace!("got an error body: {body}");
    let message = proto::error_message(&body).unwrap_or_else(|| {
        status.canonical_reason().unwrap_or(status.as_str()).to_owned()
    });

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::new(
            format!(
                "Pinecone rejected the API key ({status}): {message}. \
                 Please double-check your Pinecone API key and project."
            ),
            ErrorKind::Auth,
        ),
        _ => Error::new(
            format!("Pinecone API error ({status}): {message}"),
            ErrorKind::Upstream,
        ),
    }
}

#[cfg(test)]
mod tests {
    use grounded_chat_test_model::{StubReply, StubServer};
    use reqwest::Client;
    use serde_json::Value;

    use super::*;

    async fn read_reply(reply: StubReply) -> Result<Value, Error> {
        let server = StubServer::start([reply]).await.unwrap();
        let resp = Client::new().get(server.url()).send().await.unwrap();
        read_json(resp).await
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let err = read_reply(StubReply::json(
            401,
            r#"{"error":{"code":"UNAUTHENTICATED","message":"Invalid API Key"}}"#,
        ))
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
        assert!(err.message.contains("(401 Unauthorized): Invalid API Key"));
        assert!(err.message.contains("double-check your Pinecone API key"));
    }

    #[tokio::test]
    async fn test_server_error_message() {
        let err = read_reply(StubReply::json(
            500,
            r#"{"code":13,"message":"Index is being rebuilt"}"#,
        ))
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Upstream);
        assert_eq!(
            err.message,
            "Pinecone API error (500 Internal Server Error): Index is being rebuilt"
        );
    }

    #[tokio::test]
    async fn test_non_json_error_body() {
        let err = read_reply(StubReply::text(503, "<html>upstream down</html>"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Upstream);
        assert_eq!(
            err.message,
            "Pinecone API error (503 Service Unavailable): Service Unavailable"
        );
    }

    #[tokio::test]
    async fn test_content_type() {
        let value = read_reply(StubReply::Respond {
            status: 200,
            content_type: "application/vnd.pinecone+json; charset=utf-8".to_owned(),
            body: r#"{"name":"docs"}"#.to_owned(),
        })
        .await
        .unwrap();
        assert_eq!(value["name"], "docs");

        let err = read_reply(StubReply::text(200, "ok")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Upstream);
        assert_eq!(err.message, "Unexpected content type: text/plain");

        let err = read_reply(StubReply::json(200, "{not json")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Upstream);
        assert!(err.message.starts_with("Malformed response from Pinecone"));
    }
}
