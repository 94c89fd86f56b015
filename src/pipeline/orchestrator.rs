use chrono::{Local, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

use super::extract::extract;
use super::gemini::GeminiClient;
use super::normalize::{normalize, normalize_facilities};
use super::image_codec::ImageSource;
use super::prompt::PromptBuilder;
use super::types::{AnalysisRequest, EncodedImage, InferenceGateway};
use super::AnalysisError;
use crate::config::{Config, ConfigError};
use crate::models::{GeoPoint, Language, NearbyFacilities, PrescriptionAnalysis};

/// The one message a user ever sees when an analysis does not succeed.
pub const GENERIC_FAILURE_MESSAGE: &str = "Analysis failed. Please retry with a clearer image.";

/// Coarse failure category kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Decode,
    ServiceUnavailable,
    RequestRejected,
    MalformedResponse,
}

/// User-facing failure. Displays only the generic message; the internal
/// error has already been logged by the time this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{}", GENERIC_FAILURE_MESSAGE)]
pub struct AnalysisFailure {
    kind: FailureKind,
}

impl AnalysisFailure {
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &'static str {
        GENERIC_FAILURE_MESSAGE
    }
}

impl From<&AnalysisError> for AnalysisFailure {
    fn from(error: &AnalysisError) -> Self {
        Self { kind: error.kind() }
    }
}

/// Runs one analysis end to end:
/// prompt → gateway → extract → normalize → result
///
/// Holds no per-analysis state, so it stays usable after any failure.
pub struct PrescriptionAnalyzer {
    gateway: Box<dyn InferenceGateway + Send + Sync>,
    builder: PromptBuilder,
}

impl PrescriptionAnalyzer {
    pub fn new(gateway: Box<dyn InferenceGateway + Send + Sync>, grounding_enabled: bool) -> Self {
        Self {
            gateway,
            builder: PromptBuilder::new(grounding_enabled),
        }
    }

    /// Analyzer backed by the real Gemini client.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let client = GeminiClient::from_config(config)?;
        Ok(Self::new(Box::new(client), config.grounding_enabled))
    }

    /// Analyze a prescription image as of the local calendar date.
    pub fn analyze(&self, request: &AnalysisRequest) -> Result<PrescriptionAnalysis, AnalysisFailure> {
        self.analyze_at(request, Local::now().date_naive())
    }

    /// Analyze with an injected date (the prompt carries it as today's date).
    pub fn analyze_at(
        &self,
        request: &AnalysisRequest,
        today: NaiveDate,
    ) -> Result<PrescriptionAnalysis, AnalysisFailure> {
        let analysis_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "analyze_prescription",
            analysis_id = %analysis_id,
            language = %request.language(),
            image_bytes = request.image().byte_len,
            has_location = request.location().is_some(),
            tracked = request.tracked_medicines().len(),
        );
        let _enter = span.enter();

        match self.run(request, today) {
            Ok(analysis) => {
                tracing::info!(
                    medicines = analysis.medicines.len(),
                    unclear = analysis.unclear_medicines().count(),
                    warnings = analysis.warnings.len(),
                    "Prescription analysis complete"
                );
                Ok(analysis)
            }
            Err(e) => Err(self.fail(&e)),
        }
    }

    /// Encode `source` and analyze it. `prepare` turns the encoded image
    /// into a request; a decode failure surfaces as the generic failure.
    pub fn analyze_source<F>(
        &self,
        source: &ImageSource,
        today: NaiveDate,
        prepare: F,
    ) -> Result<PrescriptionAnalysis, AnalysisFailure>
    where
        F: FnOnce(EncodedImage) -> AnalysisRequest,
    {
        match source.encode() {
            Ok(image) => self.analyze_at(&prepare(image), today),
            Err(e) => {
                let span = tracing::info_span!("analyze_prescription", source = %source);
                let _enter = span.enter();
                Err(self.fail(&e))
            }
        }
    }

    /// Look up nearby pharmacies and hospitals without an image.
    pub fn lookup_facilities(
        &self,
        point: GeoPoint,
        language: Language,
    ) -> Result<NearbyFacilities, AnalysisFailure> {
        let span = tracing::info_span!(
            "lookup_facilities",
            latitude = point.latitude,
            longitude = point.longitude,
            language = %language,
        );
        let _enter = span.enter();

        if !point.is_valid() {
            let error = AnalysisError::RequestRejected {
                status: 0,
                message: format!("coordinates out of range: {}, {}", point.latitude, point.longitude),
            };
            return Err(self.fail(&error));
        }

        let prompt = self.builder.build_facility_lookup(point, language);
        let result = self
            .gateway
            .invoke(&prompt)
            .and_then(|reply| extract(&reply).and_then(normalize_facilities));

        match result {
            Ok(facilities) => {
                tracing::info!(
                    pharmacies = facilities.pharmacies.len(),
                    hospitals = facilities.hospitals.len(),
                    "Facility lookup complete"
                );
                Ok(facilities)
            }
            Err(e) => Err(self.fail(&e)),
        }
    }

    fn run(
        &self,
        request: &AnalysisRequest,
        today: NaiveDate,
    ) -> Result<PrescriptionAnalysis, AnalysisError> {
        let prompt = self.builder.build(request, today);
        let reply = self.gateway.invoke(&prompt)?;
        let json = extract(&reply)?;
        tracing::debug!(json_len = json.len(), "Extracted JSON payload");
        normalize(json)
    }

    fn fail(&self, error: &AnalysisError) -> AnalysisFailure {
        let failure = AnalysisFailure::from(error);
        tracing::error!(kind = ?failure.kind(), error = %error, "Analysis failed");
        failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Confidence;
    use crate::pipeline::types::{EncodedImage, MockGateway, OutputContract};

    fn image() -> EncodedImage {
        EncodedImage {
            mime_type: "image/jpeg".into(),
            data: "/9j/4AAQ".into(),
            byte_len: 6,
        }
    }

    fn analyzer(gateway: MockGateway) -> PrescriptionAnalyzer {
        PrescriptionAnalyzer::new(Box::new(gateway), true)
    }

    const GOOD_REPLY: &str = r#"{"clean_prescription_text":"Tab. Azithromycin 500 mg OD x 3 days","medicines":[{"name":"Azithromycin","purpose":"Antibiotic","dosage":"500 mg","timing":"once a day","food_relation":"before food","duration":"3 days","how_to_use":"One tablet an hour before breakfast","confidence":"High"}],"doctor_notes":"","nearby_pharmacies":[],"nearby_hospitals":[],"expiry_alerts":[],"warnings":[],"overall_confidence":"High"}"#;

    #[test]
    fn successful_analysis() {
        let analyzer = analyzer(MockGateway::new(GOOD_REPLY));
        let request = AnalysisRequest::new(image(), Language::English);
        let analysis = analyzer.analyze(&request).unwrap();
        assert_eq!(analysis.medicines.len(), 1);
        assert_eq!(analysis.medicines[0].confidence, Confidence::High);
        assert!(analysis.warnings.is_empty());
    }

    #[test]
    fn fenced_reply_is_accepted() {
        let reply = format!("Here you go:\n```json\n{GOOD_REPLY}\n```");
        let analyzer = analyzer(MockGateway::new(&reply));
        let request = AnalysisRequest::new(image(), Language::English);
        assert!(analyzer.analyze(&request).is_ok());
    }

    #[test]
    fn malformed_reply_maps_to_generic_failure() {
        let analyzer = analyzer(MockGateway::new("I could not read this image, sorry."));
        let request = AnalysisRequest::new(image(), Language::English);
        let failure = analyzer.analyze(&request).unwrap_err();
        assert_eq!(failure.kind(), FailureKind::MalformedResponse);
        assert_eq!(failure.to_string(), GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn rejection_keeps_kind_but_hides_detail() {
        let gateway = MockGateway::failing(AnalysisError::RequestRejected {
            status: 403,
            message: "API key not valid".into(),
        });
        let analyzer = analyzer(gateway);
        let request = AnalysisRequest::new(image(), Language::English);
        let failure = analyzer.analyze(&request).unwrap_err();
        assert_eq!(failure.kind(), FailureKind::RequestRejected);
        assert!(!failure.to_string().contains("API key"));
    }

    #[test]
    fn analyzer_is_reusable_after_failure() {
        let gateway = MockGateway::scripted(vec![
            Err(AnalysisError::ServiceUnavailable("timeout".into())),
            Ok(GOOD_REPLY.to_string()),
        ]);
        let analyzer = analyzer(gateway);
        let request = AnalysisRequest::new(image(), Language::English);
        assert!(analyzer.analyze(&request).is_err());
        assert!(analyzer.analyze(&request).is_ok());
    }

    #[test]
    fn facility_lookup_parses_reply() {
        let reply = "```json\n{\"pharmacies\":[\"Apollo Pharmacy\"],\"hospitals\":[{\"name\":\"AIIMS\",\"lat\":28.5672,\"lng\":77.21}]}\n```";
        let analyzer = analyzer(MockGateway::new(reply));
        let facilities = analyzer
            .lookup_facilities(GeoPoint::new(28.56, 77.2), Language::English)
            .unwrap();
        assert_eq!(facilities.pharmacies.len(), 1);
        assert_eq!(facilities.hospitals[0].name, "AIIMS");
    }

    #[test]
    fn facility_lookup_rejects_invalid_point_without_calling_gateway() {
        let gateway = std::sync::Arc::new(MockGateway::new("{}"));
        let analyzer = PrescriptionAnalyzer::new(Box::new(SharedGateway(gateway.clone())), true);
        let failure = analyzer
            .lookup_facilities(GeoPoint::new(200.0, 0.0), Language::English)
            .unwrap_err();
        assert_eq!(failure.kind(), FailureKind::RequestRejected);
        assert!(gateway.prompts().is_empty());
    }

    #[test]
    fn prompt_uses_fenced_contract_with_location() {
        let gateway = std::sync::Arc::new(MockGateway::new(GOOD_REPLY));
        let analyzer = PrescriptionAnalyzer::new(Box::new(SharedGateway(gateway.clone())), true);
        let request = AnalysisRequest::new(image(), Language::Tamil)
            .with_location(Some(GeoPoint::new(13.0827, 80.2707)));
        analyzer.analyze(&request).unwrap();
        let prompts = gateway.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].output, OutputContract::FencedJson);
    }

    #[test]
    fn prompt_carries_the_given_date() {
        let gateway = std::sync::Arc::new(MockGateway::new(GOOD_REPLY));
        let analyzer = PrescriptionAnalyzer::new(Box::new(SharedGateway(gateway.clone())), true);
        let request = AnalysisRequest::new(image(), Language::English).with_tracked_medicines(vec![
            crate::models::TrackedMedicine::new("Cetirizine", date(2026, 1, 31)),
        ]);
        analyzer.analyze_at(&request, date(2026, 1, 2)).unwrap();
        assert!(gateway.prompts()[0].user.contains("Today's date is 2026-01-02"));
    }

    #[test]
    fn empty_image_source_is_generic_decode_failure() {
        let gateway = std::sync::Arc::new(MockGateway::new(GOOD_REPLY));
        let analyzer = PrescriptionAnalyzer::new(Box::new(SharedGateway(gateway.clone())), true);
        let failure = analyzer
            .analyze_source(&ImageSource::Bytes(Vec::new()), date(2026, 1, 2), |image| {
                AnalysisRequest::new(image, Language::English)
            })
            .unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Decode);
        assert_eq!(failure.to_string(), GENERIC_FAILURE_MESSAGE);
        assert!(gateway.prompts().is_empty());
    }

    #[test]
    fn missing_image_file_is_generic_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let source = ImageSource::File(dir.path().join("absent.jpg"));
        let analyzer = analyzer(MockGateway::new(GOOD_REPLY));
        let failure = analyzer
            .analyze_source(&source, date(2026, 1, 2), |image| {
                AnalysisRequest::new(image, Language::English)
            })
            .unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Decode);
        assert_eq!(failure.to_string(), GENERIC_FAILURE_MESSAGE);
        assert!(!failure.to_string().contains("absent.jpg"));
    }

    #[test]
    fn image_source_feeds_prepared_request() {
        let gateway = std::sync::Arc::new(MockGateway::new(GOOD_REPLY));
        let analyzer = PrescriptionAnalyzer::new(Box::new(SharedGateway(gateway.clone())), true);
        let source = ImageSource::Bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]);
        analyzer
            .analyze_source(&source, date(2026, 1, 2), |image| {
                AnalysisRequest::new(image, Language::Telugu)
            })
            .unwrap();
        let prompts = gateway.prompts();
        assert_eq!(prompts[0].image.as_ref().map(|i| i.byte_len), Some(4));
        assert!(prompts[0].user.contains("Telugu"));
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct SharedGateway(std::sync::Arc<MockGateway>);

    impl InferenceGateway for SharedGateway {
        fn invoke(
            &self,
            prompt: &crate::pipeline::types::GatewayPrompt,
        ) -> Result<crate::pipeline::types::RawServiceReply, AnalysisError> {
            self.0.invoke(prompt)
        }
    }
}
