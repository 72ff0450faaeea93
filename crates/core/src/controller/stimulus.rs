use std::collections::BTreeMap;

use autoassist_model::NewMessage;
use chrono::{DateTime, Local};

/// The prompt appended to the conversation at the start of every turn.
pub const DEFAULT_PROMPT: &str = "Considering what you know and what you \
     have done so far, what would be your next move to achieve your \
     objective?";

/// The message that starts a turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stimulus {
    /// When the stimulus was created.
    pub timestamp: DateTime<Local>,
    /// The prompt text.
    pub text: String,
}

impl Stimulus {
    /// Creates a stimulus stamped with the current local time.
    #[inline]
    pub fn now<S: Into<String>>(text: S) -> Self {
        Self {
            timestamp: Local::now(),
            text: text.into(),
        }
    }

    /// Builds the conversation message.
    ///
    /// The content starts with the time in minutes, the `timestamp`
    /// metadata holds it in milliseconds.
    pub fn to_message(&self) -> NewMessage {
        let content = format!(
            "{}: {}",
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.text
        );
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "timestamp".to_owned(),
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        );
        NewMessage { content, metadata }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_to_message() {
        let timestamp = Local
            .with_ymd_and_hms(2024, 5, 17, 9, 3, 27)
            .unwrap()
            + chrono::Duration::milliseconds(42);
        let stimulus = Stimulus {
            timestamp,
            text: DEFAULT_PROMPT.to_owned(),
        };

        let message = stimulus.to_message();
        assert_eq!(
            message.content,
            format!("2024-05-17 09:03: {DEFAULT_PROMPT}")
        );
        assert_eq!(message.metadata["timestamp"], "2024-05-17 09:03:27.042");
    }
}
