use chrono::NaiveDate;

use super::schema::{facilities_schema, prescription_schema};
use super::types::{AnalysisRequest, GatewayPrompt, OutputContract};
use crate::models::{GeoPoint, Language, TrackedMedicine};

pub const PRESCRIPTION_SYSTEM_PROMPT: &str = r#"
You are a medical assistant specialized in reading handwritten prescriptions for
patients. Your role is to turn messy handwriting into a clean, digital,
patient-friendly explanation. You do not diagnose and you do not change what the
doctor prescribed.

RULES (ABSOLUTE, NO EXCEPTIONS):
1. Transcribe the handwriting into neat text and correct medical spelling errors.
2. NEVER guess a dosage. If a dosage or medicine name cannot be read, write exactly
   "Unclear" for that field and set that medicine's confidence to "Low".
3. Expand dosing abbreviations into plain language: OD -> once a day,
   BD -> twice a day, TID -> three times a day, QID -> four times a day,
   HS -> at bedtime, SOS -> only if needed, AC -> before food, PC -> after food.
4. For every medicine give name (capitalized), purpose, dosage, timing, relation
   to food, duration, patient-friendly usage, and confidence (High, Medium or Low).
5. "warnings" is reserved for SEVERE risk only: a lethal or near-lethal dosage, a
   dangerous interaction between listed medicines, or an illegible
   safety-critical field. For an ordinary prescription "warnings" MUST be empty.
6. Write every patient-facing field in the requested language. Medicine names
   stay in their original script.
7. When the user's location is given, list real nearby pharmacies and hospitals
   from real-world data. Never invent placeholder names.
8. When the user lists medicines they own with expiry dates, compare each against
   today's date and summarize the result in "expiry_alerts".
"#;

pub const FACILITY_SYSTEM_PROMPT: &str = r#"
You are a local health services assistant. Given a location, list real pharmacies
and hospitals close to it. Use real-world map data; never invent names. Include
coordinates when known. Write names as they appear locally.
"#;

const FENCED_JSON_INSTRUCTION: &str = "\
Reply with a single JSON object wrapped in a ```json fenced block and nothing else \
inside the fence. Use exactly these top-level keys: clean_prescription_text, \
medicines, doctor_notes, nearby_pharmacies, nearby_hospitals, expiry_alerts, \
warnings, overall_confidence. Each medicine has the keys name, purpose, dosage, \
timing, food_relation, duration, how_to_use, confidence. Each place has the keys \
name, latitude, longitude.";

const FENCED_FACILITY_INSTRUCTION: &str = "\
Reply with a single JSON object wrapped in a ```json fenced block with exactly two \
keys: pharmacies and hospitals. Each is an array of objects with the keys name, \
latitude, longitude.";

/// Renders gateway prompts. Pure: the only outside input is `today`.
#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder {
    grounding_enabled: bool,
}

impl PromptBuilder {
    pub fn new(grounding_enabled: bool) -> Self {
        Self { grounding_enabled }
    }

    /// Build the prescription analysis prompt.
    ///
    /// Grounding is only requested when a location is present; in that case the
    /// transport cannot take a schema, so the fenced-JSON convention applies.
    pub fn build(&self, request: &AnalysisRequest, today: NaiveDate) -> GatewayPrompt {
        let grounding = request.location().filter(|_| self.grounding_enabled);
        let output = match grounding {
            Some(_) => OutputContract::FencedJson,
            None => OutputContract::Schema(prescription_schema()),
        };

        let mut user = String::from("Analyze this handwritten prescription image.\n");
        user.push_str(&language_line(request.language()));
        user.push_str(&location_line(request.location()));
        user.push_str(&expiry_context(request.tracked_medicines(), today));
        if output == OutputContract::FencedJson {
            user.push_str(FENCED_JSON_INSTRUCTION);
            user.push('\n');
        } else {
            user.push_str("Provide the complete analysis in the required JSON format.\n");
        }

        GatewayPrompt {
            system: PRESCRIPTION_SYSTEM_PROMPT.trim().to_string(),
            user,
            image: Some(request.image().clone()),
            output,
            grounding,
        }
    }

    /// Build the standalone nearby-facility lookup prompt.
    pub fn build_facility_lookup(&self, point: GeoPoint, language: Language) -> GatewayPrompt {
        let grounding = Some(point).filter(|_| self.grounding_enabled);
        let output = match grounding {
            Some(_) => OutputContract::FencedJson,
            None => OutputContract::Schema(facilities_schema()),
        };

        let mut user = format!(
            "List up to five pharmacies and up to five hospitals nearest to latitude {:.6}, \
             longitude {:.6}.\n",
            point.latitude, point.longitude
        );
        user.push_str(&language_line(language));
        if output == OutputContract::FencedJson {
            user.push_str(FENCED_FACILITY_INSTRUCTION);
            user.push('\n');
        }

        GatewayPrompt {
            system: FACILITY_SYSTEM_PROMPT.trim().to_string(),
            user,
            image: None,
            output,
            grounding,
        }
    }
}

fn language_line(language: Language) -> String {
    format!(
        "Write all patient-facing text in {} (language code \"{}\").\n",
        language.display_name(),
        language.as_str()
    )
}

fn location_line(location: Option<GeoPoint>) -> String {
    match location {
        Some(p) => format!(
            "User current location: latitude {:.6}, longitude {:.6}.\n",
            p.latitude, p.longitude
        ),
        None => "Location not available. Leave nearby_pharmacies and nearby_hospitals empty \
                 unless the prescription itself names them.\n"
            .to_string(),
    }
}

fn expiry_context(medicines: &[TrackedMedicine], today: NaiveDate) -> String {
    if medicines.is_empty() {
        return "No medicine expiry data provided. Leave expiry_alerts empty.\n".to_string();
    }
    let listed = medicines
        .iter()
        .map(|m| format!("- {} (expires {})", m.name.trim(), m.expiry_date.format("%Y-%m-%d")))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "The user keeps these medicines at home:\n{listed}\n\
         Today's date is {}. Flag each medicine that is expired or expires within 30 days \
         and summarize the findings in expiry_alerts.\n",
        today.format("%Y-%m-%d")
    )
}
