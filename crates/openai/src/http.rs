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
            format!("The OpenAI API did not respond in time: {err}"),
            ErrorKind::Connection,
        );
    }
    Error::new(
        format!("Failed to reach the OpenAI API: {err}"),
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
            format!("Malformed response from OpenAI: {err}"),
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

    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return Error::new(
            format!(
                "OpenAI rejected the API key ({status}): {message}. \
                 Please check your OpenAI API key."
            ),
            ErrorKind::Auth,
        );
    }
    Error::new(
        format!("OpenAI API error ({status}): {message}"),
        ErrorKind::Upstream,
    )
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
    async fn test_status_mapping() {
        let err = read_reply(StubReply::json(
            401,
            r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#,
        ))
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
        assert_eq!(
            err.message,
            "OpenAI rejected the API key (401 Unauthorized): Incorrect API key \
             provided. Please check your OpenAI API key."
        );

        let err = read_reply(StubReply::json(
            500,
            r#"{"error":{"message":"The server had an error"}}"#,
        ))
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Upstream);
        assert_eq!(
            err.message,
            "OpenAI API error (500 Internal Server Error): The server had an error"
        );

        let err = read_reply(StubReply::text(503, "upstream connect error"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Upstream);
        assert_eq!(
            err.message,
            "OpenAI API error (503 Service Unavailable): Service Unavailable"
        );
    }

    #[tokio::test]
    async fn test_content_type() {
        let value = read_reply(StubReply::Respond {
            status: 200,
            content_type: "application/problem+json".to_owned(),
            body: r#"{"object":"list"}"#.to_owned(),
        })
        .await
        .unwrap();
        assert_eq!(value["object"], "list");

        let err = read_reply(StubReply::Respond {
            status: 200,
            content_type: "text/html".to_owned(),
            body: "<html></html>".to_owned(),
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Upstream);
        assert_eq!(err.message, "Unexpected content type: text/html");
    }
}
