//! Detector - Person detection adapter
//!
//! ## Responsibilities
//!
//! - Send a decoded frame to the inference server
//! - Parse the detection list
//! - Reduce detections to an attentiveness verdict (person present or not)
//!
//! The model itself is opaque; handlers only see the `Detector` trait.

use crate::error::{Error, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use image::{ImageFormat, RgbImage};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::Duration;

/// One detected object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub conf: f32,
    #[serde(default)]
    pub x1: f32,
    #[serde(default)]
    pub y1: f32,
    #[serde(default)]
    pub x2: f32,
    #[serde(default)]
    pub y2: f32,
}

/// Inference server response
#[derive(Debug, Clone, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Object detection over a decoded frame
pub trait Detector: Send + Sync {
    fn detect<'a>(&'a self, frame: &'a RgbImage) -> BoxFuture<'a, Result<Vec<Detection>>>;

    fn health_check(&self) -> BoxFuture<'_, bool>;
}

/// Which detections count as "person present"
#[derive(Debug, Clone)]
pub struct PersonFilter {
    pub label: String,
    pub min_confidence: f32,
}

impl Default for PersonFilter {
    fn default() -> Self {
        Self {
            label: "person".to_string(),
            min_confidence: 0.0,
        }
    }
}

impl PersonFilter {
    /// Attentiveness verdict: at least one matching detection
    pub fn is_attentive(&self, detections: &[Detection]) -> bool {
        detections
            .iter()
            .any(|d| d.label == self.label && d.conf >= self.min_confidence)
    }
}

/// HTTP client for the inference server
pub struct HttpDetector {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDetector {
    /// Create new detector client
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    async fn post_frame(&self, frame: &RgbImage) -> Result<Vec<Detection>> {
        let url = format!("{}/v1/detect", self.base_url);
        let jpeg = encode_jpeg(frame)?;

        let form = Form::new().part(
            "image",
            Part::bytes(jpeg)
                .file_name("frame.jpg")
                .mime_str("image/jpeg")?,
        );

        let resp = self.client.post(&url).multipart(form).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Detector(format!(
                "inference failed: {} - {}",
                status, body
            )));
        }

        let result: DetectResponse = resp.json().await?;
        tracing::debug!(detections = result.detections.len(), "Inference complete");
        Ok(result.detections)
    }
}

impl Detector for HttpDetector {
    fn detect<'a>(&'a self, frame: &'a RgbImage) -> BoxFuture<'a, Result<Vec<Detection>>> {
        self.post_frame(frame).boxed()
    }

    fn health_check(&self) -> BoxFuture<'_, bool> {
        async move {
            let url = format!("{}/healthz", self.base_url);
            match self.client.get(&url).send().await {
                Ok(resp) => resp.status().is_success(),
                Err(_) => false,
            }
        }
        .boxed()
    }
}

fn encode_jpeg(frame: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    frame
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .map_err(|e| Error::Detector(format!("failed to encode frame: {}", e)))?;
    Ok(bytes)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn detection(label: &str, conf: f32) -> Detection {
        Detection {
            label: label.to_string(),
            conf,
            x1: 0.0,
            y1: 0.0,
            x2: 10.0,
            y2: 10.0,
        }
    }

    #[test]
    fn test_person_present() {
        let filter = PersonFilter::default();
        assert!(filter.is_attentive(&[detection("chair", 0.8), detection("person", 0.4)]));
    }

    #[test]
    fn test_no_person() {
        let filter = PersonFilter::default();
        assert!(!filter.is_attentive(&[]));
        assert!(!filter.is_attentive(&[detection("dog", 0.99), detection("Person", 0.9)]));
    }

    #[test]
    fn test_min_confidence() {
        let filter = PersonFilter {
            label: "person".to_string(),
            min_confidence: 0.5,
        };
        assert!(!filter.is_attentive(&[detection("person", 0.3)]));
        assert!(filter.is_attentive(&[detection("person", 0.5)]));
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{"detections":[{"label":"person","conf":0.87,"x1":1,"y1":2,"x2":3,"y2":4},{"label":"cup","conf":0.4}]}"#;
        let resp: DetectResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.detections.len(), 2);
        assert_eq!(resp.detections[0].label, "person");
        assert_eq!(resp.detections[1].x2, 0.0);

        let empty: DetectResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.detections.is_empty());
    }

    #[test]
    fn test_encode_jpeg() {
        let frame = RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]));
        let bytes = encode_jpeg(&frame).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
