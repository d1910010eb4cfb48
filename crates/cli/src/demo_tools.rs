//! Demo capabilities for `voxturn chat`.
//!
//! Stubs that return plausible leasing-office data so a full turn (tool
//! call, follow-up, handoff) can be tried without any backend.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use voxturn_core::error::ToolError;
use voxturn_core::tool::{Capability, CapabilityRegistry};

/// A registry with every demo capability.
pub fn demo_registry() -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry.register(Arc::new(ListAvailableApartments));
    registry.register(Arc::new(CheckAvailability));
    registry.register(Arc::new(ScheduleTour));
    registry.register(Arc::new(SendConfirmationSms));
    registry.register(Arc::new(LiveAgentHandoff));
    registry
}

struct ListAvailableApartments;

#[async_trait]
impl Capability for ListAvailableApartments {
    fn name(&self) -> &str {
        "listAvailableApartments"
    }

    fn description(&self) -> &str {
        "List apartments that are currently available to rent, optionally filtered by bedroom count."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "bedrooms": { "type": "integer", "description": "Number of bedrooms" }
            }
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError> {
        let units = [
            json!({"unit": "1A", "bedrooms": 1, "rent": 1450, "available": "2026-11-01"}),
            json!({"unit": "2C", "bedrooms": 2, "rent": 1980, "available": "2026-11-15"}),
            json!({"unit": "3B", "bedrooms": 3, "rent": 2575, "available": "2026-12-01"}),
        ];
        let wanted = arguments.get("bedrooms").and_then(Value::as_u64);
        let matching: Vec<Value> = units
            .into_iter()
            .filter(|u| wanted.is_none() || u["bedrooms"].as_u64() == wanted)
            .collect();
        Ok(Value::Array(matching))
    }
}

struct CheckAvailability;

#[async_trait]
impl Capability for CheckAvailability {
    fn name(&self) -> &str {
        "checkAvailability"
    }

    fn description(&self) -> &str {
        "Check open tour slots for a given date."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "date": { "type": "string", "description": "Requested date (YYYY-MM-DD)" }
            },
            "required": ["date"]
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError> {
        let date = arguments["date"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'date' argument".into()))?;
        Ok(json!({ "date": date, "slots": ["10:00", "13:30", "16:00"] }))
    }
}

struct ScheduleTour;

#[async_trait]
impl Capability for ScheduleTour {
    fn name(&self) -> &str {
        "scheduleTour"
    }

    fn description(&self) -> &str {
        "Book an in-person or self-guided tour at a date and time."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "date": { "type": "string" },
                "time": { "type": "string" },
                "type": { "type": "string", "enum": ["in-person", "self-guided"] }
            },
            "required": ["date", "time"]
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError> {
        let date = arguments["date"].as_str().unwrap_or_default();
        let time = arguments["time"].as_str().unwrap_or_default();
        if date.is_empty() || time.is_empty() {
            return Ok(json!({ "available": false, "message": "A date and time are required." }));
        }
        Ok(json!({
            "available": true,
            "message": format!("Tour booked for {date} at {time}."),
        }))
    }
}

struct SendConfirmationSms;

#[async_trait]
impl Capability for SendConfirmationSms {
    fn name(&self) -> &str {
        "sendAppointmentConfirmationSms"
    }

    fn description(&self) -> &str {
        "Text the caller a confirmation of their appointment."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "appointmentDetails": { "type": "string" }
            }
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError> {
        match arguments.get("from").and_then(Value::as_str) {
            Some(number) => Ok(json!({ "success": true, "sentTo": number })),
            None => Ok(json!({ "success": false, "error": "No caller number on file." })),
        }
    }
}

struct LiveAgentHandoff;

#[async_trait]
impl Capability for LiveAgentHandoff {
    fn name(&self) -> &str {
        "liveAgentHandoff"
    }

    fn description(&self) -> &str {
        "Transfer the caller to a human leasing agent."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "reason": { "type": "string", "description": "Why the caller needs a person" }
            }
        })
    }

    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError> {
        let reason = arguments["reason"]
            .as_str()
            .unwrap_or("The caller asked for a live agent.");
        Ok(json!({ "reason": reason }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_every_demo_capability() {
        let registry = demo_registry();
        assert_eq!(registry.len(), 5);
        assert!(registry.contains("liveAgentHandoff"));
        assert!(registry.manifest().iter().all(|d| d.parameters["type"] == "object"));
    }

    #[tokio::test]
    async fn apartments_filter_by_bedrooms() {
        let result = ListAvailableApartments.invoke(json!({"bedrooms": 2})).await.unwrap();
        assert_eq!(result.as_array().unwrap().len(), 1);
        let all = ListAvailableApartments.invoke(json!({})).await.unwrap();
        assert_eq!(all.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn availability_requires_date() {
        assert!(CheckAvailability.invoke(json!({})).await.is_err());
    }

    #[tokio::test]
    async fn tour_reports_availability() {
        let booked = ScheduleTour
            .invoke(json!({"date": "2026-10-20", "time": "10:00"}))
            .await
            .unwrap();
        assert_eq!(booked["available"], true);
        let missing = ScheduleTour.invoke(json!("tomorrow")).await.unwrap();
        assert_eq!(missing["available"], false);
    }

    #[tokio::test]
    async fn handoff_echoes_reason() {
        let result = LiveAgentHandoff.invoke(json!({"reason": "billing"})).await.unwrap();
        assert_eq!(result["reason"], "billing");
    }
}
