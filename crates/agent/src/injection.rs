//! System injections and tool acknowledgements.
//!
//! Injections are system messages added to the follow-up request after a
//! tool ran. They steer the next reply and are never persisted.

use serde_json::Value;
use voxturn_core::message::Message;
use voxturn_core::profile::UserProfile;

/// Decides which system messages to add after a tool call.
pub trait InjectionPolicy: Send + Sync {
    fn injections(
        &self,
        function_name: &str,
        result: &Value,
        profile: Option<&UserProfile>,
    ) -> Vec<Message>;
}

/// The leasing-assistant rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultInjectionPolicy;

const APARTMENT_SUMMARY: &str = "Provide a summary of available apartments. Do not use symbols, and do not use markdown in your response.";

const SMS_CONFIRMATION: &str = "If the user agrees to receive an SMS confirmation, immediately trigger the 'sendAppointmentConfirmationSms' tool with the appointment details and the UserProfile. Do not ask for their phone number or any other details from the user.";

impl InjectionPolicy for DefaultInjectionPolicy {
    fn injections(
        &self,
        function_name: &str,
        result: &Value,
        profile: Option<&UserProfile>,
    ) -> Vec<Message> {
        match function_name {
            "listAvailableApartments" => vec![Message::system(APARTMENT_SUMMARY)],
            "checkAvailability" => profile
                .and_then(|p| {
                    let move_in = p.profile.move_in_date.as_deref()?;
                    Some(Message::system(format!(
                        "When checking availability for {}, remember that they are looking to move in on {}.",
                        p.first_name().unwrap_or("the caller"),
                        move_in
                    )))
                })
                .into_iter()
                .collect(),
            "scheduleTour" if result.get("available").and_then(Value::as_bool) == Some(true) => {
                vec![Message::system(SMS_CONFIRMATION)]
            }
            _ => Vec::new(),
        }
    }
}

/// A policy that never injects anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInjections;

impl InjectionPolicy for NoInjections {
    fn injections(&self, _: &str, _: &Value, _: Option<&UserProfile>) -> Vec<Message> {
        Vec::new()
    }
}

/// The spoken acknowledgement for a tool about to run.
///
/// The intro rotates with the turn sequence so repeated calls don't sound
/// identical.
pub fn acknowledgement(function_name: &str, turn_sequence: u64, first_name: Option<&str>) -> String {
    const INTROS: [&str; 5] = ["Sure", "Okay", "Alright", "Got it", "Certainly"];
    let word = INTROS[(turn_sequence % INTROS.len() as u64) as usize];
    let intro = match first_name {
        Some(name) => format!("{word} {name},"),
        None => format!("{word},"),
    };

    let body = match function_name {
        "listAvailableApartments" => "let me check on the available apartments for you.",
        "checkExistingAppointments" => "I'll look up your existing appointments.",
        "scheduleTour" => "I'll go ahead and schedule that tour for you.",
        "checkAvailability" => "let me verify the availability for the requested time.",
        "commonInquiries" => "one moment.",
        "sendAppointmentConfirmationSms" => {
            "I'll send that SMS off to you shortly, give it a few minutes and you should see it come through."
        }
        "liveAgentHandoff" => {
            "that may be a challenging topic to discuss, so I'm going to get you over to a live agent so they can discuss this with you, hang tight."
        }
        _ => "give me a moment while I fetch the information.",
    };

    format!("{intro} {body}")
}
