use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Build an HTTP client that identifies the caller through `X-User-Id`.
pub fn build_client(user_id: Option<i64>) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(id) = user_id {
        let mut headers = HeaderMap::new();
        headers.insert("X-User-Id", HeaderValue::from_str(&id.to_string())?);
        builder = builder.default_headers(headers);
    }
    Ok(builder.build()?)
}

/// `{ success, message, data }` envelope returned by every endpoint.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[allow(dead_code)]
    pub success: bool,
    pub message: Option<String>,
    pub data: T,
}

/// Normalize non-2xx responses into errors carrying the server message.
pub async fn handle_error(resp: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    Err(anyhow::anyhow!("request failed ({}): {}", status, message))
}

/// Check the status and decode the envelope.
pub async fn read_envelope<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> anyhow::Result<Envelope<T>> {
    let resp = handle_error(resp).await?;
    Ok(resp.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_decodes_null_data() {
        let env: Envelope<Option<String>> = serde_json::from_str(
            r#"{"success":true,"message":"If the email exists","data":null}"#,
        )
        .unwrap();
        assert!(env.data.is_none());
        assert_eq!(env.message.as_deref(), Some("If the email exists"));
    }
}
