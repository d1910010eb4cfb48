//! Session context inputs pushed in by the caller.
//!
//! Profile storage and lookup happen elsewhere; a session only reads what it
//! is given.

use serde::{Deserialize, Serialize};

/// A known caller, as supplied by the profile service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub profile: ProfileDetails,

    #[serde(default)]
    pub conversation_history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDetails {
    #[serde(default)]
    pub first_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_in_date: Option<String>,

    /// Any other profile fields, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A summary of one earlier conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: String,
    pub summary: String,
}

impl UserProfile {
    /// Parse a profile from its JSON form.
    pub fn from_json(raw: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// The first name, if one is set.
    pub fn first_name(&self) -> Option<&str> {
        let name = self.profile.first_name.trim();
        (!name.is_empty()).then_some(name)
    }

    /// System-prompt text describing earlier interactions, if there were any.
    pub fn history_prompt(&self) -> Option<String> {
        if self.conversation_history.is_empty() {
            return None;
        }
        let name = self.first_name().unwrap_or("The caller");
        let summaries = self
            .conversation_history
            .iter()
            .map(|h| format!("On {}, {} asked: {}", h.date, name, h.summary))
            .collect::<Vec<_>>()
            .join(" ");
        Some(format!(
            "{name} has had previous interactions. Conversation history: {summaries}"
        ))
    }
}

/// The two numbers of the current call.
///
/// `to` is the number SMS confirmations are sent from (the service line),
/// `from` is the caller's own number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumbers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

impl PhoneNumbers {
    pub fn new(to: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            to: Some(to.into()),
            from: Some(from.into()),
        }
    }

    /// The numbers as argument overrides (`{"to": .., "from": ..}`).
    pub fn as_overrides(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("to".into(), self.to.clone().into());
        map.insert("from".into(), self.from.clone().into());
        map
    }
}
