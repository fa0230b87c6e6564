use course_core::LogEvent;
use engine_logging::{engine_debug, engine_warn};

/// Prefix of every record line on the log stream.
pub const DATA_PREFIX: &str = "data: ";

const EXCERPT_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Event(LogEvent),
    /// A `data:` record whose payload is not a valid event; holds an excerpt.
    ParseError(String),
    /// Blank lines, lines without the prefix, and bare `data:` lines.
    Skipped,
}

/// Classify one complete line of the log stream.
pub fn decode_line(line: &str) -> LineOutcome {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineOutcome::Skipped;
    }

    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        engine_debug!("Unexpected log line format: {}", excerpt(line));
        return LineOutcome::Skipped;
    };

    match serde_json::from_str::<LogEvent>(payload) {
        Ok(event) => LineOutcome::Event(event),
        Err(err) => {
            engine_warn!("Failed to parse log line {:?}: {}", excerpt(line), err);
            // Bare `data:` keep-alives carry nothing worth reporting.
            if trimmed.chars().count() > DATA_PREFIX.len() {
                LineOutcome::ParseError(excerpt(line))
            } else {
                LineOutcome::Skipped
            }
        }
    }
}

fn excerpt(line: &str) -> String {
    line.chars().take(EXCERPT_CHARS).collect()
}
