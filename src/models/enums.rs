use serde::{Deserialize, Serialize};

/// A string did not name any variant of the target enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {field} value: '{value}'")]
pub struct InvalidEnum {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Confidence {
    High => "High",
    Medium => "Medium",
    Low => "Low",
});

str_enum!(ExpiryStatus {
    Safe => "safe",
    Warning => "warning",
    Expired => "expired",
});

str_enum!(Language {
    English => "en",
    Hindi => "hi",
    Bengali => "bn",
    Tamil => "ta",
    Telugu => "te",
    Marathi => "mr",
    Gujarati => "gu",
    Kannada => "kn",
    Malayalam => "ml",
    Punjabi => "pa",
    Urdu => "ur",
    Spanish => "es",
    French => "fr",
    Arabic => "ar",
});

impl Confidence {
    /// Lenient parse used on service output: case-insensitive, anything
    /// unrecognized is `Low`.
    pub fn clamp_from(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            _ => Self::Low,
        }
    }
}

impl Language {
    /// English name of the language, used inside prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Hindi => "Hindi",
            Self::Bengali => "Bengali",
            Self::Tamil => "Tamil",
            Self::Telugu => "Telugu",
            Self::Marathi => "Marathi",
            Self::Gujarati => "Gujarati",
            Self::Kannada => "Kannada",
            Self::Malayalam => "Malayalam",
            Self::Punjabi => "Punjabi",
            Self::Urdu => "Urdu",
            Self::Spanish => "Spanish",
            Self::French => "French",
            Self::Arabic => "Arabic",
        }
    }

    pub fn all() -> &'static [Language] {
        &[
            Self::English,
            Self::Hindi,
            Self::Bengali,
            Self::Tamil,
            Self::Telugu,
            Self::Marathi,
            Self::Gujarati,
            Self::Kannada,
            Self::Malayalam,
            Self::Punjabi,
            Self::Urdu,
            Self::Spanish,
            Self::French,
            Self::Arabic,
        ]
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::English
    }
}
