//! Terminal generation results and the shapes they arrive in.
//!
//! Providers have returned video bytes under two layouts over time: a
//! `videos` list of encoded video objects and the older `predictions` list.
//! Both are decoded explicitly into [`ResponseShape`]; anything else is
//! [`ResponseShape::Unrecognized`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of the `videos` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedVideo {
    #[serde(default)]
    pub bytes_base64_encoded: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub gcs_uri: Option<String>,
}

/// One entry of the legacy `predictions` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    #[serde(default)]
    pub bytes_base64_encoded: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// A recognised layout of a terminal result.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    Videos(Vec<EncodedVideo>),
    Predictions(Vec<Prediction>),
    Unrecognized,
}

impl ResponseShape {
    pub fn name(&self) -> &'static str {
        match self {
            ResponseShape::Videos(_) => "videos",
            ResponseShape::Predictions(_) => "predictions",
            ResponseShape::Unrecognized => "unrecognized",
        }
    }

    /// Decode the first non-empty payload carried by this shape.
    pub fn decode(&self) -> Option<Vec<u8>> {
        match self {
            ResponseShape::Videos(videos) => videos
                .iter()
                .find_map(|v| decode_payload(v.bytes_base64_encoded.as_deref())),
            ResponseShape::Predictions(predictions) => predictions
                .iter()
                .find_map(|p| decode_payload(p.bytes_base64_encoded.as_deref())),
            ResponseShape::Unrecognized => None,
        }
    }
}

fn decode_payload(encoded: Option<&str>) -> Option<Vec<u8>> {
    let encoded = encoded?.trim();
    if encoded.is_empty() {
        return None;
    }
    match STANDARD.decode(encoded) {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        _ => None,
    }
}

/// The `response` object of a finished operation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationResult(pub Value);

impl GenerationResult {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Result with no content, for operations that finished without a `response`.
    pub fn empty() -> Self {
        Self(Value::Null)
    }

    /// Shapes present in this result, `videos` before `predictions`.
    ///
    /// A field that is present but does not decode as its expected list is
    /// skipped. Returns `[Unrecognized]` when neither shape is present.
    pub fn shapes(&self) -> Vec<ResponseShape> {
        let mut shapes = Vec::with_capacity(2);

        if let Some(videos) = self
            .0
            .get("videos")
            .and_then(|v| serde_json::from_value::<Vec<EncodedVideo>>(v.clone()).ok())
        {
            shapes.push(ResponseShape::Videos(videos));
        }

        if let Some(predictions) = self
            .0
            .get("predictions")
            .and_then(|v| serde_json::from_value::<Vec<Prediction>>(v.clone()).ok())
        {
            shapes.push(ResponseShape::Predictions(predictions));
        }

        if shapes.is_empty() {
            shapes.push(ResponseShape::Unrecognized);
        }
        shapes
    }

    /// Video bytes from the first shape with decodable, non-empty content.
    pub fn video_bytes(&self) -> Option<(Vec<u8>, &'static str)> {
        self.shapes()
            .into_iter()
            .find_map(|shape| shape.decode().map(|bytes| (bytes, shape.name())))
    }
}
