use serde::Serialize;

use super::AnalysisError;
use crate::models::{GeoPoint, Language, TrackedMedicine};

/// Base64-encoded image ready for inline transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodedImage {
    pub mime_type: String,
    pub data: String,
    /// Size of the image before encoding.
    pub byte_len: usize,
}

/// Inputs to one analysis. Built per user action and never mutated.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    image: EncodedImage,
    language: Language,
    location: Option<GeoPoint>,
    tracked_medicines: Vec<TrackedMedicine>,
}

impl AnalysisRequest {
    pub fn new(image: EncodedImage, language: Language) -> Self {
        Self {
            image,
            language,
            location: None,
            tracked_medicines: Vec::new(),
        }
    }

    /// Attach the user's position. Out-of-range coordinates are dropped.
    pub fn with_location(mut self, location: Option<GeoPoint>) -> Self {
        self.location = location.filter(GeoPoint::is_valid);
        self
    }

    pub fn with_tracked_medicines(mut self, medicines: Vec<TrackedMedicine>) -> Self {
        self.tracked_medicines = medicines;
        self
    }

    pub fn image(&self) -> &EncodedImage {
        &self.image
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn location(&self) -> Option<GeoPoint> {
        self.location
    }

    pub fn tracked_medicines(&self) -> &[TrackedMedicine] {
        &self.tracked_medicines
    }
}

/// How the service is told to shape its reply.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputContract {
    /// Schema-constrained JSON generation.
    Schema(serde_json::Value),
    /// Free text with a fenced ```json block, used when a grounding tool is
    /// active and the transport refuses schema constraints.
    FencedJson,
}

/// Fully rendered request for the inference gateway.
#[derive(Debug, Clone)]
pub struct GatewayPrompt {
    pub system: String,
    pub user: String,
    pub image: Option<EncodedImage>,
    pub output: OutputContract,
    /// Present when facility results should be grounded on real map data.
    pub grounding: Option<GeoPoint>,
}

/// Reply text exactly as the service produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawServiceReply(pub String);

impl RawServiceReply {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Transport to the remote inference service (allows mocking).
pub trait InferenceGateway {
    fn invoke(&self, prompt: &GatewayPrompt) -> Result<RawServiceReply, AnalysisError>;
}

/// Mock gateway for testing: replays a scripted sequence of outcomes and
/// records every prompt it receives.
pub struct MockGateway {
    outcomes: std::sync::Mutex<std::collections::VecDeque<Result<String, AnalysisError>>>,
    prompts: std::sync::Mutex<Vec<GatewayPrompt>>,
}

impl MockGateway {
    pub fn new(reply: &str) -> Self {
        Self::scripted(vec![Ok(reply.to_string())])
    }

    pub fn failing(error: AnalysisError) -> Self {
        Self::scripted(vec![Err(error)])
    }

    pub fn scripted(outcomes: Vec<Result<String, AnalysisError>>) -> Self {
        Self {
            outcomes: std::sync::Mutex::new(outcomes.into()),
            prompts: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<GatewayPrompt> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl InferenceGateway for MockGateway {
    fn invoke(&self, prompt: &GatewayPrompt) -> Result<RawServiceReply, AnalysisError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }
        let next = self
            .outcomes
            .lock()
            .ok()
            .and_then(|mut outcomes| outcomes.pop_front());
        match next {
            Some(Ok(text)) => Ok(RawServiceReply(text)),
            Some(Err(e)) => Err(e),
            None => Err(AnalysisError::ServiceUnavailable(
                "mock gateway has no scripted reply left".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> EncodedImage {
        EncodedImage {
            mime_type: "image/png".into(),
            data: "aGVsbG8=".into(),
            byte_len: 5,
        }
    }

    fn prompt() -> GatewayPrompt {
        GatewayPrompt {
            system: "sys".into(),
            user: "user".into(),
            image: None,
            output: OutputContract::FencedJson,
            grounding: None,
        }
    }

    #[test]
    fn request_drops_invalid_location() {
        let request = AnalysisRequest::new(image(), Language::English)
            .with_location(Some(GeoPoint::new(200.0, 10.0)));
        assert!(request.location().is_none());
    }

    #[test]
    fn request_keeps_valid_location() {
        let request = AnalysisRequest::new(image(), Language::Tamil)
            .with_location(Some(GeoPoint::new(13.08, 80.27)));
        assert_eq!(request.location(), Some(GeoPoint::new(13.08, 80.27)));
        assert_eq!(request.language(), Language::Tamil);
    }

    #[test]
    fn mock_gateway_replays_in_order() {
        let gateway = MockGateway::scripted(vec![
            Err(AnalysisError::ServiceUnavailable("reset".into())),
            Ok("second".into()),
        ]);
        assert!(gateway.invoke(&prompt()).is_err());
        assert_eq!(gateway.invoke(&prompt()).unwrap().as_str(), "second");
        assert_eq!(gateway.prompts().len(), 2);
    }

    #[test]
    fn mock_gateway_exhausted_is_unavailable() {
        let gateway = MockGateway::scripted(vec![]);
        let err = gateway.invoke(&prompt()).unwrap_err();
        assert!(matches!(err, AnalysisError::ServiceUnavailable(_)));
    }
}
