//! Prompt templates for simtalk generative calls.
//!
//! Every prompt is a plain template with `{key}` placeholders, rendered by
//! [`render_template`]. The builder functions below fill them from the
//! simulation's view of the agents involved.

use simtalk_core::Transcript;

use crate::types::{Prompt, RequestKind};

/// Conversation turn, persona half.
pub const CONVERSATION_SYSTEM: &str = r"You are {speaker_name}, a sim living in a small shared world.
Your personality: {personality}.
You are talking face to face with {listener_name}.
{tone}

RULES:
- Stay in character. Never mention being an AI or a simulation.
- Say exactly one short line of dialogue, at most two sentences.
- Do not prefix the line with your name or wrap it in quotes.";

/// Conversation turn, context half.
pub const CONVERSATION_USER: &str = r"How you feel about {listener_name}: friendship {friendship}, romance {romance}.

Conversation so far:
{transcript}

Say your next line as {speaker_name}.";

/// Tone line used when romance toward the listener is above the threshold.
pub const ROMANTIC_TONE: &str =
    "You are strongly attracted to them. Let some warmth and flirtation show.";

/// Tone line used otherwise.
pub const FRIENDLY_TONE: &str = "Keep the tone casual and friendly.";

/// Rendered in place of an empty transcript.
pub const OPENING_LINE_HINT: &str = "(Nothing has been said yet. You speak first.)";

/// Ambient thought, persona half.
pub const THOUGHT_SYSTEM: &str = r"You are the inner voice of {name}, a sim living in a small shared world.
Your personality: {personality}.
You are alone with your thoughts. Nobody can hear you.";

/// Ambient thought, context half.
pub const THOUGHT_USER: &str = r"Right now you feel {mood}.
People on your mind: {friends}.

Think one short private thought, under 12 words. Reply with only the thought.";

/// Post-conversation romance analysis, persona half.
pub const ROMANCE_ANALYSIS_SYSTEM: &str = r"You are a perceptive observer of relationships.
You read a conversation between two people and judge how romantic it was.
You answer with JSON only.";

/// Post-conversation romance analysis, context half.
pub const ROMANCE_ANALYSIS_USER: &str = r#"Conversation between {name_a} and {name_b}:
{transcript}

Their romance before this conversation: {romance}.

How much romantic interest do they now have in each other, from 0.0 (none) to 1.0 (in love)?
Return JSON:
{{"romance": <float 0.0-1.0>, "summary": "one sentence about the conversation"}}"#;

/// Simple template interpolation for prompts.
///
/// Replaces `{key}` with the corresponding value and `{{`/`}}` with
/// literal braces.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.replace("{{", "{").replace("}}", "}");
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

/// Everything needed to prompt one conversation turn.
#[derive(Debug, Clone)]
pub struct TurnContext<'a> {
    /// Who is speaking.
    pub speaker_name: &'a str,
    /// Speaker's personality descriptor.
    pub personality: &'a str,
    /// Who is listening.
    pub listener_name: &'a str,
    /// The conversation so far.
    pub transcript: &'a Transcript,
    /// Speaker's friendship toward the listener.
    pub friendship: f32,
    /// Speaker's romance toward the listener.
    pub romance: f32,
    /// Romance above which the romantic tone is used.
    pub romance_threshold: f32,
}

/// Build the prompt for one conversation turn.
#[must_use]
pub fn conversation_turn(ctx: &TurnContext<'_>) -> Prompt {
    let tone = if ctx.romance > ctx.romance_threshold {
        ROMANTIC_TONE
    } else {
        FRIENDLY_TONE
    };
    let transcript = if ctx.transcript.is_empty() {
        OPENING_LINE_HINT.to_string()
    } else {
        ctx.transcript.render()
    };
    let friendship = format!("{:.2}", ctx.friendship);
    let romance = format!("{:.2}", ctx.romance);

    let system = render_template(
        CONVERSATION_SYSTEM,
        &[
            ("speaker_name", ctx.speaker_name),
            ("personality", ctx.personality),
            ("listener_name", ctx.listener_name),
            ("tone", tone),
        ],
    );
    let user = render_template(
        CONVERSATION_USER,
        &[
            ("listener_name", ctx.listener_name),
            ("friendship", &friendship),
            ("romance", &romance),
            ("transcript", &transcript),
            ("speaker_name", ctx.speaker_name),
        ],
    );
    Prompt::new(RequestKind::ConversationTurn, system, user)
}

/// Build the prompt for an ambient thought.
///
/// `friends` are display names, closest first; an empty slice renders as
/// "no one in particular".
#[must_use]
pub fn thought(name: &str, personality: &str, mood: &str, friends: &[&str]) -> Prompt {
    let friends = if friends.is_empty() {
        "no one in particular".to_string()
    } else {
        friends.join(", ")
    };
    let system = render_template(THOUGHT_SYSTEM, &[("name", name), ("personality", personality)]);
    let user = render_template(THOUGHT_USER, &[("mood", mood), ("friends", &friends)]);
    Prompt::new(RequestKind::Thought, system, user)
}

/// Build the prompt for a post-conversation romance analysis.
#[must_use]
pub fn romance_analysis(
    name_a: &str,
    name_b: &str,
    transcript: &Transcript,
    current_romance: f32,
) -> Prompt {
    let romance = format!("{current_romance:.2}");
    let user = render_template(
        ROMANCE_ANALYSIS_USER,
        &[
            ("name_a", name_a),
            ("name_b", name_b),
            ("transcript", &transcript.render()),
            ("romance", &romance),
        ],
    );
    Prompt::new(RequestKind::RomanceAnalysis, ROMANCE_ANALYSIS_SYSTEM, user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use simtalk_core::AgentId;

    fn transcript() -> Transcript {
        let mut t = Transcript::new();
        t.push(AgentId::new(), "Ada", "Lovely weather today.");
        t.push(AgentId::new(), "Bo", "Perfect for a walk.");
        t
    }

    #[test]
    fn render_replaces_keys_and_unescapes_braces() {
        let out = render_template("{a} and {{literal}}", &[("a", "x")]);
        assert_eq!(out, "x and {literal}");
    }

    #[test]
    fn turn_prompt_switches_tone_on_threshold() {
        let t = Transcript::new();
        let mut ctx = TurnContext {
            speaker_name: "Ada",
            personality: "curious",
            listener_name: "Bo",
            transcript: &t,
            friendship: 0.3,
            romance: 0.2,
            romance_threshold: 0.7,
        };
        let friendly = conversation_turn(&ctx);
        assert!(friendly.system.contains(FRIENDLY_TONE));
        assert!(friendly.user.contains(OPENING_LINE_HINT));

        ctx.romance = 0.9;
        let romantic = conversation_turn(&ctx);
        assert!(romantic.system.contains(ROMANTIC_TONE));
        assert_eq!(romantic.kind, RequestKind::ConversationTurn);
    }

    #[test]
    fn turn_prompt_includes_transcript() {
        let t = transcript();
        let ctx = TurnContext {
            speaker_name: "Ada",
            personality: "curious",
            listener_name: "Bo",
            transcript: &t,
            friendship: 0.5,
            romance: 0.0,
            romance_threshold: 0.7,
        };
        let prompt = conversation_turn(&ctx);
        assert!(prompt.user.contains("Ada: Lovely weather today.\nBo: Perfect for a walk."));
        assert!(!prompt.user.contains(OPENING_LINE_HINT));
    }

    #[test]
    fn thought_without_friends() {
        let prompt = thought("Cy", "grumpy", "a bit down", &[]);
        assert!(prompt.user.contains("no one in particular"));
        assert_eq!(prompt.kind, RequestKind::Thought);
    }

    #[test]
    fn romance_prompt_asks_for_json() {
        let prompt = romance_analysis("Ada", "Bo", &transcript(), 0.25);
        assert!(prompt.user.contains(r#"{"romance": <float 0.0-1.0>"#));
        assert!(prompt.user.contains("0.25"));
    }
}
