//! Request formatter.
//!
//! Normalizes caller input before a custom-endpoint call: collapses a leading
//! run of system messages into one, and filters generation parameters through
//! the set the serving endpoint recognizes. Both normalizations are non-fatal;
//! offending input is dropped or merged with an operator-visible warning.

use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::types::{ChatMessage, MessageRole};

/// Generation parameters accepted by the custom serving endpoint. Anything
/// else is dropped before the request is sent.
pub static ACCEPTED_PARAMETERS: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    BTreeSet::from([
        "adapter_id",
        "adapter_source",
        "best_of",
        "decoder_input_details",
        "details",
        "detokenize",
        "do_sample",
        "early_stopping",
        "frequency_penalty",
        "guided_regex",
        "guided_schema",
        "ignore_eos",
        "ignore_eos_token",
        "include_stop_str_in_output",
        "length_penalty",
        "logits_processors",
        "logprobs",
        "make_synthetic_version",
        "max_new_tokens",
        "max_tokens",
        "merged_adapters",
        "min_p",
        "min_tokens",
        "n",
        "presence_penalty",
        "prompt_logprobs",
        "repetition_penalty",
        "response_format",
        "return_full_outcome",
        "seed",
        "skip_special_tokens",
        "spaces_between_special_tokens",
        "stop",
        "stop_token_ids",
        "temperature",
        "tools",
        "top_k",
        "top_p",
        "truncate",
        "truncate_prompt_tokens",
        "typical_p",
        "use_beam_search",
        "watermark",
    ])
});

/// Routing-only fields; excluded from both backends without a warning.
pub const ROUTING_FIELDS: [&str; 7] = [
    "tags",
    "model",
    "messages",
    "use_fallback",
    "fallback_model",
    "stream",
    "save_data",
];

/// Collapse a leading run of system messages into a single system message.
///
/// The run's contents are concatenated with a trailing space separator after
/// each entry (observed serving-side convention). A run of length <= 1 leaves
/// the input untouched. Non-system messages keep their order.
pub fn format_messages(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut combined = String::new();
    let mut run_len = 0;
    for message in messages {
        if message.role == MessageRole::System {
            combined.push_str(&message.content);
            combined.push(' ');
            run_len += 1;
        } else {
            break;
        }
    }
    if run_len <= 1 {
        return messages.to_vec();
    }

    tracing::warn!(
        system_prompts = run_len,
        "multiple system prompts will be combined into one prompt when saving data or calling custom models"
    );
    let mut formatted = Vec::with_capacity(messages.len() - run_len + 1);
    formatted.push(ChatMessage::system(combined));
    formatted.extend_from_slice(&messages[run_len..]);
    formatted
}

/// Filter generation parameters through the recognized allow-list.
///
/// Retained keys keep their values unchanged. Every unrecognized key that is
/// not a routing field is dropped with a warning, and one batched warning
/// lists the accepted keys for discoverability.
pub fn format_parameters(params: &Map<String, Value>) -> Map<String, Value> {
    let mut formatted = Map::new();
    let mut invalid_key_found = false;
    for (key, value) in params {
        if ACCEPTED_PARAMETERS.contains(key.as_str()) {
            formatted.insert(key.clone(), value.clone());
        } else if !ROUTING_FIELDS.contains(&key.as_str()) {
            tracing::warn!(
                parameter = %key,
                "not a valid parameter for the model; this parameter will be ignored"
            );
            invalid_key_found = true;
        }
    }
    if invalid_key_found {
        let accepted: Vec<&str> = ACCEPTED_PARAMETERS.iter().copied().collect();
        tracing::warn!(
            accepted_parameters = ?accepted,
            "the listed parameters are valid for the model"
        );
    }
    formatted
}

/// Comma-join tags for the interaction record.
pub fn tags_to_string(tags: &[String]) -> String {
    tags.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collapses_leading_system_run_into_one() {
        let messages = vec![
            ChatMessage::system("You are helpful."),
            ChatMessage::system("Answer briefly."),
            ChatMessage::user("Hi"),
            ChatMessage::assistant("Hello"),
            ChatMessage::user("What now?"),
        ];
        let formatted = format_messages(&messages);
        assert_eq!(formatted.len(), 4);
        assert_eq!(formatted[0].role, MessageRole::System);
        assert_eq!(formatted[0].content, "You are helpful. Answer briefly. ");
        assert_eq!(formatted[1..], messages[2..]);
    }

    #[test]
    fn single_system_message_is_left_unchanged() {
        let messages = vec![ChatMessage::system("One prompt"), ChatMessage::user("Hi")];
        assert_eq!(format_messages(&messages), messages);
    }

    #[test]
    fn non_leading_system_messages_are_not_collapsed() {
        let messages = vec![
            ChatMessage::user("Hi"),
            ChatMessage::system("late instruction"),
            ChatMessage::system("another"),
        ];
        assert_eq!(format_messages(&messages), messages);
    }

    #[test]
    fn empty_message_list_is_unchanged() {
        assert!(format_messages(&[]).is_empty());
    }

    #[test]
    fn parameters_output_is_subset_of_allow_list_with_unchanged_values() {
        let mut params = Map::new();
        params.insert("temperature".into(), json!(0.7));
        params.insert("top_p".into(), json!(0.9));
        params.insert("frobnicate".into(), json!(true));
        params.insert("max_new_tokens".into(), json!(64));

        let formatted = format_parameters(&params);
        assert!(
            formatted
                .keys()
                .all(|k| ACCEPTED_PARAMETERS.contains(k.as_str()))
        );
        assert_eq!(formatted.len(), 3);
        assert_eq!(formatted["temperature"], json!(0.7));
        assert_eq!(formatted["top_p"], json!(0.9));
        assert_eq!(formatted["max_new_tokens"], json!(64));
        assert!(!formatted.contains_key("frobnicate"));
    }

    #[test]
    fn routing_fields_are_excluded_without_being_retained() {
        let mut params = Map::new();
        params.insert("stream".into(), json!(true));
        params.insert("use_fallback".into(), json!(false));
        params.insert("seed".into(), json!(42));

        let formatted = format_parameters(&params);
        assert_eq!(formatted.len(), 1);
        assert_eq!(formatted["seed"], json!(42));
    }

    #[test]
    fn tags_are_comma_joined() {
        let tags = vec!["prod".to_string(), "eval".to_string()];
        assert_eq!(tags_to_string(&tags), "prod,eval");
        assert_eq!(tags_to_string(&[]), "");
    }
}
