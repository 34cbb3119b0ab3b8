//! Flattens a subject timeline into whitespace-delimited words.
//!
//! Every word remembers the event it came from so token timestamps can be
//! recovered exactly, whatever wrapper tokens are enabled.

use serde::{Deserialize, Serialize};

use meds_common::format_float;
use meds_common::numeric::round_to;
use meds_model::vocabulary::{
    END_TOKEN, EVENT_END, EVENT_START, NUMERIC_END, NUMERIC_START, START_TOKEN, TEXT_END,
    TEXT_START, UNKNOWN_TOKEN,
};
use meds_model::{Event, EventValue, SubjectTimeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializerOptions {
    pub insert_event_tokens: bool,
    pub insert_numeric_tokens: bool,
    pub insert_text_tokens: bool,
    pub add_boundary_tokens: bool,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self {
            insert_event_tokens: true,
            insert_numeric_tokens: true,
            insert_text_tokens: true,
            add_boundary_tokens: false,
        }
    }
}

impl SerializerOptions {
    /// Special tokens in id order: `<unknown>`, `<start>`, `<end>`, then enabled wrappers.
    pub fn special_tokens(&self) -> Vec<&'static str> {
        let mut specials = vec![UNKNOWN_TOKEN, START_TOKEN, END_TOKEN];
        if self.insert_event_tokens {
            specials.extend([EVENT_START, EVENT_END]);
        }
        if self.insert_numeric_tokens {
            specials.extend([NUMERIC_START, NUMERIC_END]);
        }
        if self.insert_text_tokens {
            specials.extend([TEXT_START, TEXT_END]);
        }
        specials
    }
}

/// One whitespace-delimited word and the index of its source event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub text: String,
    pub event: Option<usize>,
}

fn push_split(words: &mut Vec<Word>, text: &str, event: usize) {
    words.extend(text.split_whitespace().map(|piece| Word {
        text: piece.to_string(),
        event: Some(event),
    }));
}

fn push_token(words: &mut Vec<Word>, token: &str, event: Option<usize>) {
    words.push(Word {
        text: token.to_string(),
        event,
    });
}

/// Numeric values print rounded to two places; derived labels print as-is.
pub fn numeric_text(value: &EventValue) -> String {
    match value {
        EventValue::Number(number) => format_float(round_to(*number, 2)),
        EventValue::Label(label) => label.clone(),
    }
}

fn push_event(words: &mut Vec<Word>, event: &Event, index: usize, options: SerializerOptions) {
    if options.insert_event_tokens {
        push_token(words, EVENT_START, Some(index));
    }
    push_split(words, &event.code, index);
    if let Some(value) = &event.numeric_value {
        if options.insert_numeric_tokens {
            push_token(words, NUMERIC_START, Some(index));
        }
        push_split(words, &numeric_text(value), index);
        if options.insert_numeric_tokens {
            push_token(words, NUMERIC_END, Some(index));
        }
    }
    if let Some(text) = &event.text_value {
        if options.insert_text_tokens {
            push_token(words, TEXT_START, Some(index));
        }
        push_split(words, text, index);
        if options.insert_text_tokens {
            push_token(words, TEXT_END, Some(index));
        }
    }
    if options.insert_event_tokens {
        push_token(words, EVENT_END, Some(index));
    }
}

pub fn serialize_subject(timeline: &SubjectTimeline, options: SerializerOptions) -> Vec<Word> {
    let mut words = Vec::new();
    if options.add_boundary_tokens {
        push_token(&mut words, START_TOKEN, None);
    }
    for (index, event) in timeline.events.iter().enumerate() {
        push_event(&mut words, event, index, options);
    }
    if options.add_boundary_tokens {
        push_token(&mut words, END_TOKEN, None);
    }
    words
}

/// The serialized subject, words joined by single spaces.
pub fn subject_string(timeline: &SubjectTimeline, options: SerializerOptions) -> String {
    serialize_subject(timeline, options)
        .into_iter()
        .map(|word| word.text)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Seconds since the subject's first timed event, 0 for untimed sources.
pub fn word_timestamps(timeline: &SubjectTimeline, words: &[Word]) -> Vec<f64> {
    let base = timeline.base_time();
    words
        .iter()
        .map(|word| {
            word.event
                .and_then(|index| timeline.events.get(index))
                .map_or(0.0, |event| event.seconds_since(base))
        })
        .collect()
}
