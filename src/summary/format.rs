use chrono::Duration;

use super::aggregate::UserActivitySummary;

/// Total duration decomposed for display, floor-division cascade from milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationParts {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl From<Duration> for DurationParts {
    fn from(value: Duration) -> Self {
        let mut seconds = value.num_milliseconds() / 1000;
        let mut minutes = seconds / 60;
        seconds %= 60;
        let mut hours = minutes / 60;
        minutes %= 60;
        let days = hours / 24;
        hours %= 24;
        Self {
            days,
            hours,
            minutes,
            seconds,
        }
    }
}

pub const NO_INFORMATION: &str = "No information";

/// Renders a summary as the sequence of chat messages sent back to the user. Net counts
/// come first, with the raw added/removed split next to them.
pub fn summary_messages(display_name: &str, summary: &UserActivitySummary) -> Vec<String> {
    let voice = DurationParts::from(summary.voice_time);
    vec![
        format!("Information about **{display_name}**"),
        format!(
            "Messages sent: {} (**+**{} | **-**{})",
            summary.net_messages(),
            summary.messages_added,
            summary.messages_removed
        ),
        format!(
            "Reactions added: {} (**+**{} | **-**{})",
            summary.net_reactions_added(),
            summary.reactions_added,
            summary.reactions_removed
        ),
        format!(
            "Reactions received: {} (**+**{} | **-**{})",
            summary.net_reactions_received(),
            summary.reactions_received,
            summary.reactions_withdrawn
        ),
        format!(
            "Voice chat total time - {} days, {} hours, {} minutes, {} seconds",
            voice.days, voice.hours, voice.minutes, voice.seconds
        ),
    ]
}
