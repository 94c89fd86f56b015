use serde_json::{Map, Value};

use super::schema::fields;
use super::AnalysisError;
use crate::models::{
    Confidence, GeoPoint, Medicine, NearbyFacilities, Place, PrescriptionAnalysis, UNCLEAR,
};

type Object = Map<String, Value>;

// Accepted spellings per field: the service's snake_case first, then camelCase.
const CLEAN_TEXT_KEYS: &[&str] = &[fields::CLEAN_TEXT, "cleanPrescriptionText", "cleanText", "clean_text"];
const MEDICINES_KEYS: &[&str] = &[fields::MEDICINES];
const DOCTOR_NOTES_KEYS: &[&str] = &[fields::DOCTOR_NOTES, "doctorNotes"];
const PHARMACIES_KEYS: &[&str] = &[fields::NEARBY_PHARMACIES, "nearbyPharmacies", "pharmacies"];
const HOSPITALS_KEYS: &[&str] = &[fields::NEARBY_HOSPITALS, "nearbyHospitals", "hospitals"];
const EXPIRY_ALERTS_KEYS: &[&str] = &[fields::EXPIRY_ALERTS, "expiryAlerts"];
const WARNINGS_KEYS: &[&str] = &[fields::WARNINGS];
const OVERALL_CONFIDENCE_KEYS: &[&str] = &[fields::OVERALL_CONFIDENCE, "overallConfidence"];

const FOOD_RELATION_KEYS: &[&str] = &["food_relation", "foodRelation"];
const HOW_TO_USE_KEYS: &[&str] = &["how_to_use", "howToUse"];

const LATITUDE_KEYS: &[&str] = &["latitude", "lat"];
const LONGITUDE_KEYS: &[&str] = &["longitude", "lng", "lon"];

/// Parse extracted JSON text into a fully populated [`PrescriptionAnalysis`].
///
/// Every field is optional at this boundary. Strictness lives in the
/// defaulting and clamping below, never in rejecting the whole reply.
pub fn normalize(json: &str) -> Result<PrescriptionAnalysis, AnalysisError> {
    let root = parse_object(json)?;

    Ok(PrescriptionAnalysis {
        clean_text: text(&root, CLEAN_TEXT_KEYS),
        medicines: medicines(&root),
        doctor_notes: text(&root, DOCTOR_NOTES_KEYS),
        nearby_pharmacies: places(&root, PHARMACIES_KEYS),
        nearby_hospitals: places(&root, HOSPITALS_KEYS),
        expiry_alerts: string_list(&root, EXPIRY_ALERTS_KEYS),
        warnings: string_list(&root, WARNINGS_KEYS),
        overall_confidence: text(&root, OVERALL_CONFIDENCE_KEYS),
    })
}

/// Parse the `{pharmacies, hospitals}` reply of a facility lookup.
pub fn normalize_facilities(json: &str) -> Result<NearbyFacilities, AnalysisError> {
    let root = parse_object(json)?;

    Ok(NearbyFacilities {
        pharmacies: places(&root, PHARMACIES_KEYS),
        hospitals: places(&root, HOSPITALS_KEYS),
    })
}

fn parse_object(json: &str) -> Result<Object, AnalysisError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| AnalysisError::MalformedResponse(format!("Invalid JSON: {e}")))?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(AnalysisError::MalformedResponse(format!(
            "Expected a JSON object, got {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ──────────────────────────────────────────────
// Field accessors
// ──────────────────────────────────────────────

fn lookup<'a>(obj: &'a Object, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| obj.get(*key).filter(|v| !v.is_null()))
}

/// Scalar text, trimmed. Numbers and booleans are rendered; anything else is "".
fn text(obj: &Object, keys: &[&str]) -> String {
    match lookup(obj, keys) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn text_or_unclear(obj: &Object, keys: &[&str]) -> String {
    let value = text(obj, keys);
    if value.is_empty() {
        UNCLEAR.to_string()
    } else {
        value
    }
}

fn array<'a>(obj: &'a Object, keys: &[&str]) -> &'a [Value] {
    match lookup(obj, keys) {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    }
}

/// Non-empty string items; other item types are dropped.
fn string_list(obj: &Object, keys: &[&str]) -> Vec<String> {
    array(obj, keys)
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn coordinate(obj: &Object, keys: &[&str]) -> Option<f64> {
    match lookup(obj, keys)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ──────────────────────────────────────────────
// Medicines
// ──────────────────────────────────────────────

fn medicines(root: &Object) -> Vec<Medicine> {
    let items = array(root, MEDICINES_KEYS);
    let parsed: Vec<Medicine> = items
        .iter()
        .filter_map(Value::as_object)
        .map(medicine)
        .collect();

    if parsed.len() < items.len() {
        tracing::warn!(
            skipped = items.len() - parsed.len(),
            "Skipped non-object medicine items"
        );
    }
    parsed
}

fn medicine(obj: &Object) -> Medicine {
    let name = text_or_unclear(obj, &["name"]);
    let dosage = text_or_unclear(obj, &["dosage"]);

    let raw_confidence = text(obj, &["confidence"]);
    let mut confidence = Confidence::clamp_from(&raw_confidence);
    if confidence == Confidence::Low
        && !raw_confidence.is_empty()
        && !raw_confidence.eq_ignore_ascii_case("low")
    {
        tracing::warn!(value = %raw_confidence, "Clamped unknown confidence to Low");
    }
    if dosage.eq_ignore_ascii_case(UNCLEAR) {
        confidence = Confidence::Low;
    }

    Medicine {
        name,
        purpose: text(obj, &["purpose"]),
        dosage,
        timing: text(obj, &["timing"]),
        food_relation: text(obj, FOOD_RELATION_KEYS),
        duration: text(obj, &["duration"]),
        how_to_use: text(obj, HOW_TO_USE_KEYS),
        confidence,
    }
}

// ──────────────────────────────────────────────
// Places
// ──────────────────────────────────────────────

fn places(root: &Object, keys: &[&str]) -> Vec<Place> {
    array(root, keys).iter().filter_map(place).collect()
}

/// A place is either a bare name or `{name, latitude|lat, longitude|lng|lon}`.
/// Nameless entries are dropped; out-of-range coordinates are ignored.
fn place(value: &Value) -> Option<Place> {
    match value {
        Value::String(name) => {
            let name = name.trim();
            (!name.is_empty()).then(|| Place::named(name))
        }
        Value::Object(obj) => {
            let name = text(obj, &["name", "title"]);
            if name.is_empty() {
                return None;
            }
            let location = match (coordinate(obj, LATITUDE_KEYS), coordinate(obj, LONGITUDE_KEYS)) {
                (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)).filter(GeoPoint::is_valid),
                _ => None,
            };
            Some(Place { name, location })
        }
        _ => None,
    }
}
