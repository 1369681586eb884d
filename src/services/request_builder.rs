use reqwest::Url;

use crate::error::RequestError;
use crate::models::{RequestId, SourceImage, TransformParameters, TransformRequest};

/// Query/form key carrying the colour count
pub const COLORS_KEY: &str = "colors";
/// Query key carrying the print size
pub const SIZE_KEY: &str = "size";

/// Turns an image plus a parameter snapshot into a request descriptor.
///
/// Owns the request id counter; ids start at 1 and strictly increase.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    endpoint: Url,
    file_field: String,
    last_id: u64,
}

impl RequestBuilder {
    pub fn new(endpoint: Url, file_field: impl Into<String>) -> Result<Self, RequestError> {
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(RequestError::InvalidEndpoint(format!(
                "unsupported scheme '{}'",
                endpoint.scheme()
            )));
        }
        let file_field = file_field.into();
        if file_field.trim().is_empty() {
            return Err(RequestError::InvalidEndpoint(
                "empty multipart field name".to_string(),
            ));
        }

        Ok(Self {
            endpoint,
            file_field,
            last_id: 0,
        })
    }

    /// Parse the endpoint and use the default `image` field
    pub fn for_endpoint(endpoint: &str) -> Result<Self, RequestError> {
        let url = Url::parse(endpoint)
            .map_err(|e| RequestError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        Self::new(url, "image")
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Id of the most recently built request
    pub fn last_id(&self) -> Option<RequestId> {
        (self.last_id > 0).then(|| RequestId::new(self.last_id))
    }

    /// Build the descriptor for one round trip.
    pub fn build(
        &mut self,
        image: &SourceImage,
        parameters: TransformParameters,
    ) -> Result<TransformRequest, RequestError> {
        parameters.validate()?;
        image.validate().map_err(RequestError::InvalidImage)?;

        self.last_id += 1;
        let id = RequestId::new(self.last_id);
        let url = self.url_for(&parameters);

        tracing::debug!(request_id = %id, url = %url, "Built transform request");

        Ok(TransformRequest {
            id,
            url,
            image: image.clone(),
            parameters,
            file_field: self.file_field.clone(),
            form_fields: vec![(COLORS_KEY.to_string(), parameters.colors().to_string())],
        })
    }

    /// Endpoint with `colors` and `size` appended; other query pairs are kept
    fn url_for(&self, parameters: &TransformParameters) -> Url {
        let mut url = self.endpoint.clone();
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != COLORS_KEY && k != SIZE_KEY)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            for (k, v) in &kept {
                pairs.append_pair(k, v);
            }
            pairs
                .append_pair(COLORS_KEY, &parameters.colors().to_string())
                .append_pair(SIZE_KEY, &parameters.size().to_string());
        }

        url
    }
}
