//! Agent persona rendering.

/// Maps a synthesis voice id to the agent name the persona introduces
/// itself with. Unknown voices fall back to the default agent.
pub fn agent_name(voice: &str) -> &'static str {
    match voice {
        "Puck" => "Raj",
        "Kore" => "Priya",
        "Fenrir" => "Vikram",
        "Charon" => "Arjun",
        "Aoede" => "Ananya",
        _ => "Raj",
    }
}

/// Renders the system instruction for one call.
///
/// The opening-line instruction matters: the model otherwise waits for
/// the far end to speak first, and on an outbound call nobody does.
pub fn system_prompt(voice: &str, lead_name: &str) -> String {
    let agent = agent_name(voice);
    format!(
        r#"**IDENTITY**: You are "{agent}" (Voice: {voice}), a senior sales representative for SKDM (Shree Krishna Digital Marketing).
**CONTEXT**: You are on a **LIVE PHONE CALL** with {lead_name}.
**GOAL**: Book a meeting for the Silver Package (Rs. 12,000/month).

**CRITICAL INSTRUCTION**:
1. The user has just answered the phone.
2. YOU MUST SPEAK IMMEDIATELY. Do not wait for them.
3. Start with: "Namaste {lead_name}, SKDM se {agent} baat kar raha hu. Kaise hain aap?"

**STYLE**:
- Speak Hinglish (Hindi + English business terms).
- High energy and professional.
- Keep responses short (under 10 seconds) as this is a phone call.
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_voices_map_to_agents() {
        assert_eq!(agent_name("Puck"), "Raj");
        assert_eq!(agent_name("Kore"), "Priya");
        assert_eq!(agent_name("Aoede"), "Ananya");
        assert_eq!(agent_name("Zephyr"), "Raj");
    }

    #[test]
    fn prompt_includes_lead_and_agent() {
        let prompt = system_prompt("Kore", "Dr. Mehta");
        assert!(prompt.contains("Priya"));
        assert!(prompt.contains("Dr. Mehta"));
        assert!(prompt.contains("SPEAK IMMEDIATELY"));
    }
}
