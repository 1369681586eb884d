//! Mock transformation service for testing the HTTP transfer client.

use std::time::Duration;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, Request, ResponseTemplate,
};

/// Path the mock service answers on
pub const TRANSFORM_PATH: &str = "/ml";

/// Wrapper around wiremock MockServer with convenience methods
pub struct MockTransformServer {
    pub server: MockServer,
}

impl MockTransformServer {
    /// Start a new mock transformation service
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    /// Endpoint URL to configure the client with
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.server.uri(), TRANSFORM_PATH)
    }

    /// Answer any POST with the given image bytes.
    ///
    /// The content type mirrors the real service, which labels its PNG
    /// output as a PDF.
    pub async fn mock_png(&self, body: Vec<u8>) {
        Mock::given(method("POST"))
            .and(path(TRANSFORM_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(body)
                    .insert_header("content-type", "application/pdf"),
            )
            .mount(&self.server)
            .await;
    }

    /// Answer only requests carrying the given parameters
    pub async fn mock_png_for(&self, colors: u8, size: u32, body: Vec<u8>) {
        Mock::given(method("POST"))
            .and(path(TRANSFORM_PATH))
            .and(query_param("colors", colors.to_string()))
            .and(query_param("size", size.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&self.server)
            .await;
    }

    /// Answer only multipart uploads that carry the image part and the
    /// colour form field
    pub async fn mock_multipart(&self, body: Vec<u8>) {
        Mock::given(method("POST"))
            .and(path(TRANSFORM_PATH))
            .and(|req: &Request| {
                let content_type = req
                    .headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                let text = String::from_utf8_lossy(&req.body);
                content_type.starts_with("multipart/form-data")
                    && text.contains("name=\"image\"")
                    && text.contains("filename=\"photo.jpg\"")
                    && text.contains("name=\"colors\"")
            })
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&self.server)
            .await;
    }

    /// Answer with an error status and a body that must never be decoded
    pub async fn mock_status(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path(TRANSFORM_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_string("Internal Server Error"))
            .mount(&self.server)
            .await;
    }

    /// Answer after a delay
    pub async fn mock_delayed(&self, delay: Duration, body: Vec<u8>) {
        Mock::given(method("POST"))
            .and(path(TRANSFORM_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body).set_delay(delay))
            .mount(&self.server)
            .await;
    }

    /// Requests received so far
    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }
}
