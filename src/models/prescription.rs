use serde::{Deserialize, Serialize};

use super::enums::Confidence;

/// Literal used for any field the prescription does not make legible.
pub const UNCLEAR: &str = "Unclear";

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both coordinates are finite and inside the WGS84 range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// One deciphered line item of a prescription.
///
/// All text is in the requested display language. No field is ever absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    pub name: String,
    pub purpose: String,
    pub dosage: String,
    pub timing: String,
    pub food_relation: String,
    pub duration: String,
    pub how_to_use: String,
    pub confidence: Confidence,
}

impl Medicine {
    pub fn is_dosage_unclear(&self) -> bool {
        self.dosage.eq_ignore_ascii_case(UNCLEAR)
    }
}

/// A nearby pharmacy or hospital.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

impl Place {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: None,
        }
    }
}

/// Normalized result of one prescription analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionAnalysis {
    pub clean_text: String,
    /// In order of appearance on the source document.
    pub medicines: Vec<Medicine>,
    pub doctor_notes: String,
    pub nearby_pharmacies: Vec<Place>,
    pub nearby_hospitals: Vec<Place>,
    pub expiry_alerts: Vec<String>,
    /// Severe risk only. Empty for an ordinary prescription.
    pub warnings: Vec<String>,
    pub overall_confidence: String,
}

impl PrescriptionAnalysis {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Medicines whose name or dosage could not be read.
    pub fn unclear_medicines(&self) -> impl Iterator<Item = &Medicine> {
        self.medicines
            .iter()
            .filter(|m| m.is_dosage_unclear() || m.name.eq_ignore_ascii_case(UNCLEAR))
    }
}

/// Result of a standalone facility lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NearbyFacilities {
    pub pharmacies: Vec<Place>,
    pub hospitals: Vec<Place>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn medicine(name: &str, dosage: &str) -> Medicine {
        Medicine {
            name: name.into(),
            purpose: String::new(),
            dosage: dosage.into(),
            timing: String::new(),
            food_relation: String::new(),
            duration: String::new(),
            how_to_use: String::new(),
            confidence: Confidence::Medium,
        }
    }

    #[test]
    fn geo_point_range_check() {
        assert!(GeoPoint::new(12.97, 77.59).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, f64::NAN).is_valid());
    }

    #[test]
    fn unclear_medicines_match_name_or_dosage() {
        let analysis = PrescriptionAnalysis {
            medicines: vec![
                medicine("Amoxicillin", "500 mg"),
                medicine("Unclear", "250 mg"),
                medicine("Paracetamol", "unclear"),
            ],
            ..Default::default()
        };
        let names: Vec<_> = analysis.unclear_medicines().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Unclear", "Paracetamol"]);
    }

    #[test]
    fn place_without_location_omits_field() {
        let json = serde_json::to_value(Place::named("City Pharmacy")).unwrap();
        assert_eq!(json, serde_json::json!({"name": "City Pharmacy"}));
    }

    #[test]
    fn default_analysis_has_empty_arrays() {
        let json = serde_json::to_value(PrescriptionAnalysis::default()).unwrap();
        assert_eq!(json["medicines"], serde_json::json!([]));
        assert_eq!(json["warnings"], serde_json::json!([]));
        assert_eq!(json["nearby_hospitals"], serde_json::json!([]));
    }
}
