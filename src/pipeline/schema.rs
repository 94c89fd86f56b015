//! Response schemas handed to the service for schema-constrained generation.
//!
//! Field names here are the wire names the normalizer reads back.

use serde_json::{json, Value};

/// Wire names of the prescription reply.
pub mod fields {
    pub const CLEAN_TEXT: &str = "clean_prescription_text";
    pub const MEDICINES: &str = "medicines";
    pub const DOCTOR_NOTES: &str = "doctor_notes";
    pub const NEARBY_PHARMACIES: &str = "nearby_pharmacies";
    pub const NEARBY_HOSPITALS: &str = "nearby_hospitals";
    pub const EXPIRY_ALERTS: &str = "expiry_alerts";
    pub const WARNINGS: &str = "warnings";
    pub const OVERALL_CONFIDENCE: &str = "overall_confidence";

    pub const MEDICINE_FIELDS: [&str; 8] = [
        "name",
        "purpose",
        "dosage",
        "timing",
        "food_relation",
        "duration",
        "how_to_use",
        "confidence",
    ];
}

fn place_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "name": { "type": "STRING" },
            "latitude": { "type": "NUMBER", "nullable": true },
            "longitude": { "type": "NUMBER", "nullable": true }
        },
        "required": ["name"]
    })
}

fn medicine_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "name": { "type": "STRING", "description": "Corrected, capitalized medicine name or \"Unclear\"" },
            "purpose": { "type": "STRING" },
            "dosage": { "type": "STRING", "description": "Exact dosage or \"Unclear\"; never guessed" },
            "timing": { "type": "STRING" },
            "food_relation": { "type": "STRING" },
            "duration": { "type": "STRING" },
            "how_to_use": { "type": "STRING", "description": "Patient-friendly instruction" },
            "confidence": { "type": "STRING", "enum": ["High", "Medium", "Low"] }
        },
        "required": fields::MEDICINE_FIELDS
    })
}

/// Schema for the full prescription analysis reply.
pub fn prescription_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            (fields::CLEAN_TEXT): { "type": "STRING" },
            (fields::MEDICINES): { "type": "ARRAY", "items": medicine_schema() },
            (fields::DOCTOR_NOTES): { "type": "STRING" },
            (fields::NEARBY_PHARMACIES): { "type": "ARRAY", "items": place_schema() },
            (fields::NEARBY_HOSPITALS): { "type": "ARRAY", "items": place_schema() },
            (fields::EXPIRY_ALERTS): { "type": "ARRAY", "items": { "type": "STRING" } },
            (fields::WARNINGS): { "type": "ARRAY", "items": { "type": "STRING" } },
            (fields::OVERALL_CONFIDENCE): { "type": "STRING" }
        },
        "required": [
            fields::CLEAN_TEXT,
            fields::MEDICINES,
            fields::DOCTOR_NOTES,
            fields::NEARBY_PHARMACIES,
            fields::NEARBY_HOSPITALS,
            fields::EXPIRY_ALERTS,
            fields::WARNINGS,
            fields::OVERALL_CONFIDENCE
        ]
    })
}

/// Schema for the standalone facility lookup reply.
pub fn facilities_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "pharmacies": { "type": "ARRAY", "items": place_schema() },
            "hospitals": { "type": "ARRAY", "items": place_schema() }
        },
        "required": ["pharmacies", "hospitals"]
    })
}
