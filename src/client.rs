use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct ResponseData {
    pub status: u16,
    pub body: String,
    pub json: Option<Value>,
}

/// Blocking client for the impCentral v5 REST API. Responses follow the
/// JSON:API shape: a `data` member holding either one record or an array
/// of records, each with `id`, `type` and `attributes`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    http: Client,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        // A base without a trailing slash would swallow its last path
        // segment in Url::join.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let parsed = Url::parse(&normalized).context("parsing base URL")?;
        let http = Client::builder()
            .user_agent(HeaderValue::from_static("impctl/0.1"))
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            base_url: parsed,
            http,
            token: token.to_string(),
        })
    }

    pub fn get(&self, path: &str, query: &[(&str, String)]) -> Result<ResponseData> {
        let response = self.send(Method::GET, path, query, Option::<&Value>::None)?;
        read_response(response)
    }

    /// GET that maps a remote 404 to `None` instead of an error, for
    /// "does this entity exist" probes.
    pub fn get_optional(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<ResponseData>> {
        let response = self.send(Method::GET, path, query, Option::<&Value>::None)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        read_response(response).map(Some)
    }

    pub fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<ResponseData> {
        let response = self.send(Method::POST, path, &[], Some(body))?;
        read_response(response)
    }

    pub fn patch_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<ResponseData> {
        let response = self.send(Method::PATCH, path, &[], Some(body))?;
        read_response(response)
    }

    pub fn delete(&self, path: &str) -> Result<ResponseData> {
        let response = self.send(Method::DELETE, path, &[], Option::<&Value>::None)?;
        read_response(response)
    }

    /// DELETE carrying a JSON body, for relationship endpoints.
    pub fn delete_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<ResponseData> {
        let response = self.send(Method::DELETE, path, &[], Some(body))?;
        read_response(response)
    }

    fn send<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&T>,
    ) -> Result<Response> {
        let normalized = path.trim_start_matches('/');
        let url = self
            .base_url
            .join(normalized)
            .with_context(|| format!("joining path `{}` to base URL", path))?;

        let mut request = self
            .http
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, HeaderValue::from_static("application/vnd.api+json"));

        if !query.is_empty() {
            request = request.query(query);
        }

        if let Some(body) = body {
            request = request
                .header(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/vnd.api+json"),
                )
                .body(serde_json::to_vec(body).context("serializing request body")?);
        }

        request.send().context("sending request")
    }
}

fn read_response(response: Response) -> Result<ResponseData> {
    let response = response.error_for_status().context("request failed")?;
    let status = response.status().as_u16();
    let text = response.text().context("reading response body")?;
    let json = serde_json::from_str(&text).ok();

    Ok(ResponseData {
        status,
        body: text,
        json,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn sends_bearer_token_and_parses_json() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/products")
                .header("Authorization", "Bearer test-token");
            then.status(200).json_body(json!({"data": []}));
        });

        let client = ApiClient::new(&server.base_url(), "test-token").unwrap();
        let response = client.get("/products", &[]).unwrap();

        mock.assert();
        assert_eq!(response.status, 200);
        assert_eq!(response.json.unwrap()["data"], json!([]));
    }

    #[test]
    fn get_optional_maps_404_to_none() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/accounts/ghost");
            then.status(404).json_body(json!({"errors": []}));
        });

        let client = ApiClient::new(&server.base_url(), "t").unwrap();
        assert!(
            client
                .get_optional("/accounts/ghost", &[])
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn posts_json_api_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/products")
                .header("Content-Type", "application/vnd.api+json")
                .json_body(json!({"data": {"type": "product"}}));
            then.status(201).body(r#"{"data": {"id": "p-1"}}"#);
        });

        let client = ApiClient::new(&server.base_url(), "t").unwrap();
        let response = client
            .post_json("/products", &json!({"data": {"type": "product"}}))
            .unwrap();

        mock.assert();
        assert_eq!(response.json.unwrap()["data"]["id"], "p-1");
    }
}
