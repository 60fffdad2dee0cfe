use percent_encoding::percent_decode_str;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Optional identity attached to either config variant by the upstream
/// profile screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub gender: String,
}

/// Metadata of an uploaded project document, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDetails {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInterviewConfig {
    pub job_title: String,
    #[serde(default)]
    pub company: Option<String>,
    pub job_description: String,
    pub required_skills: String,
    pub experience_level: String,
    /// Flavor of the interview: "technical", "behavioral" or "mixed".
    pub interview_type: String,
    #[serde(default)]
    pub additional_notes: Option<String>,
    #[serde(default)]
    pub user_profile: Option<UserProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectiveVivaConfig {
    pub subject: String,
    pub topic: String,
    pub subject_level: String,
    #[serde(default)]
    pub additional_notes: Option<String>,
    #[serde(default)]
    pub has_project_document: bool,
    #[serde(default)]
    pub file_details: Option<FileDetails>,
    #[serde(default)]
    pub user_profile: Option<UserProfile>,
}

/// The two session flavors, discriminated once at the boundary by the wire
/// field `interviewType` ("subjective" selects a viva; anything else is a
/// job interview whose `interviewType` names the interview flavor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionConfig {
    Job(JobInterviewConfig),
    Viva(SubjectiveVivaConfig),
}

impl SessionConfig {
    pub fn user_profile(&self) -> Option<&UserProfile> {
        match self {
            SessionConfig::Job(j) => j.user_profile.as_ref(),
            SessionConfig::Viva(v) => v.user_profile.as_ref(),
        }
    }

    /// Name to address the user by, falling back to a generic role label.
    pub fn user_name(&self) -> &str {
        match self.user_profile() {
            Some(profile) if !profile.name.trim().is_empty() => &profile.name,
            _ => match self {
                SessionConfig::Job(_) => "the candidate",
                SessionConfig::Viva(_) => "the student",
            },
        }
    }

    /// Decodes the percent-encoded JSON blob that carries the configuration
    /// between screens.
    pub fn from_handoff(encoded: &str) -> Result<Self, serde_json::Error> {
        let decoded = percent_decode_str(encoded).decode_utf8_lossy();
        serde_json::from_str(&decoded)
    }
}

impl Serialize for SessionConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = match self {
            SessionConfig::Job(j) => serde_json::to_value(j),
            SessionConfig::Viva(v) => {
                // The wire shape marks vivas with interviewType=subjective.
                serde_json::to_value(v).map(|mut value| {
                    if let Some(map) = value.as_object_mut() {
                        map.insert("interviewType".into(), "subjective".into());
                    }
                    value
                })
            }
        }
        .map_err(serde::ser::Error::custom)?;
        value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SessionConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let is_viva = value
            .get("interviewType")
            .and_then(|v| v.as_str())
            .map(|t| t.eq_ignore_ascii_case("subjective"))
            .unwrap_or(false);
        if is_viva {
            serde_json::from_value(value)
                .map(SessionConfig::Viva)
                .map_err(D::Error::custom)
        } else {
            serde_json::from_value(value)
                .map(SessionConfig::Job)
                .map_err(D::Error::custom)
        }
    }
}
