// src/messages.rs

pub fn apply_message(name: &str, apply_link: &str) -> String {
    format!(
        "@{}, you can apply to use the bot here: {}",
        name, apply_link
    )
}

pub fn verify_reminder_message(name: &str, marker: char) -> String {
    format!(
        "@{}, you must verify first. Type {}verify once your application has been accepted.",
        name, marker
    )
}

pub fn cooldown_message(name: &str, remaining_ms: u64) -> String {
    format!(
        "@{}, cooldown active. Please wait {:.1} seconds before sending another command.",
        name,
        remaining_ms as f64 / 1000.0
    )
}

pub fn already_verified_message(name: &str) -> String {
    format!("@{}, you are already verified!", name)
}

pub fn verify_success_message(name: &str) -> String {
    format!("✅ @{}, you are now verified to use the chatbot!", name)
}

pub fn verify_not_found_message(name: &str, apply_link: &str) -> String {
    format!(
        "@{}, you are not on the approved list yet. Apply here: {}",
        name, apply_link
    )
}

pub fn safe_search_message(name: &str, verdict: &str) -> String {
    format!("@{}, {}", name, verdict)
}

pub fn play_success_message(name: &str, asset: &str) -> String {
    format!("🎬 @{}, now playing '{}'!", name, asset)
}

pub fn play_not_found_message(name: &str, asset: &str) -> String {
    format!("❌ @{}, there is no media called '{}'.", name, asset)
}

pub fn empty_prompt_message(marker: char) -> String {
    format!("Please provide a message after `{}`.", marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_message_rounds_to_tenths() {
        assert_eq!(
            cooldown_message("alice", 12_345),
            "@alice, cooldown active. Please wait 12.3 seconds before sending another command."
        );
    }
}
