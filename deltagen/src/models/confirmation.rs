use super::variant::VariantCommand;
use serde::{Deserialize, Serialize};

const EVENT_MARKER: &str = "variant_state";

/// Fields of an `EVENT variant_state "<scene>" "<name>" "<value>"` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub received_name: String,
    pub received_value: String,
}

impl Confirmation {
    /// Read the confirmed variant out of a response line.
    /// Returns `None` when the line does not carry enough quoted segments.
    pub fn parse(line: &str) -> Option<Self> {
        // with the event marker present the scene comes first and is skipped,
        // otherwise the line itself is `"<name>" "<value>"`
        let quoted = match line.find(EVENT_MARKER) {
            Some(at) => {
                let rest = &line[at + EVENT_MARKER.len()..];
                let scene_end = rest.match_indices('"').nth(1)?.0;
                &rest[scene_end + 1..]
            }
            None => line,
        };

        let segments = quoted.split('"').collect::<Vec<&str>>();
        if segments.len() < 4 {
            return None;
        }

        Some(Self {
            received_name: segments[1].to_owned(),
            received_value: segments[3].to_owned(),
        })
    }

    /// Each field confirms on its own: the received text has to occur in what was sent.
    pub fn matches(&self, sent: &VariantCommand) -> (bool, bool) {
        (
            confirms(&self.received_name, sent.name()),
            confirms(&self.received_value, sent.value()),
        )
    }
}

fn confirms(received: &str, sent: &str) -> bool {
    !received.is_empty() && sent.contains(received)
}

/// Outcome of one dispatched variant command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    /// Position in the dispatched list.
    pub index: usize,
    /// False when confirmations were not requested; both matches are false then.
    pub checked: bool,
    pub name_matched: bool,
    pub value_matched: bool,
}

impl DispatchResult {
    pub fn unchecked(index: usize) -> Self {
        Self {
            index,
            checked: false,
            name_matched: false,
            value_matched: false,
        }
    }

    /// Result for a confirmation that was waited for. `response` is `None` on timeout.
    pub fn from_response(index: usize, sent: &VariantCommand, response: Option<&str>) -> Self {
        let (name_matched, value_matched) = response
            .and_then(Confirmation::parse)
            .map(|confirmation| confirmation.matches(sent))
            .unwrap_or((false, false));
        Self {
            index,
            checked: true,
            name_matched,
            value_matched,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.checked && self.name_matched && self.value_matched
    }
}
