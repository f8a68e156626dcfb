//! Local input checks, run before anything is sent to the remote API.

use crate::ai::ChatMessage;
use crate::constants::IMAGE_SIZES;
use crate::models::BinaryData;
use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt::Display;

pub fn validate_messages(messages: &[ChatMessage]) -> Result<()> {
    if !messages.iter().any(ChatMessage::has_text) {
        return Err(Error::Validation(
            "At least one non-empty message is required".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_prompt(prompt: &str) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(Error::Validation("Prompt must not be empty".to_string()));
    }
    Ok(())
}

pub fn validate_image_url(image_url: &str) -> Result<()> {
    if image_url.trim().is_empty() {
        return Err(Error::Validation("Image URL must not be empty".to_string()));
    }
    Ok(())
}

pub fn validate_image_size(size: &str) -> Result<()> {
    if !IMAGE_SIZES.contains(&size) {
        return Err(Error::Validation(format!(
            "Unsupported image size {} (expected one of {})",
            size,
            IMAGE_SIZES.join(", ")
        )));
    }
    Ok(())
}

/// Inclusive range check for numeric host parameters.
pub fn validate_range<T: PartialOrd + Display>(name: &str, value: T, (min, max): (T, T)) -> Result<()> {
    if value < min || value > max {
        return Err(Error::Validation(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        )));
    }
    Ok(())
}

/// Looks up a non-empty attachment by property name.
pub fn require_binary<'a>(
    binary: &'a HashMap<String, BinaryData>,
    property: &str,
) -> Result<&'a BinaryData> {
    let data = binary
        .get(property)
        .ok_or_else(|| Error::Validation(format!("No binary data found: {}", property)))?;
    if data.data.is_empty() {
        return Err(Error::Validation(format!(
            "Binary data is missing its payload: {}",
            property
        )));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{ChatMessageContent, MessagePart, Role};

    #[test]
    fn test_messages_with_one_non_blank_content_pass() {
        let cases = [
            vec![ChatMessage::new(Role::User, "hi")],
            vec![
                ChatMessage::new(Role::System, "  "),
                ChatMessage::new(Role::User, "hello"),
            ],
            vec![
                ChatMessage::new(Role::User, "question"),
                ChatMessage::new(Role::Assistant, ""),
            ],
        ];
        for messages in cases {
            assert!(validate_messages(&messages).is_ok());
        }
    }

    #[test]
    fn test_empty_or_blank_messages_fail() {
        assert!(matches!(validate_messages(&[]), Err(Error::Validation(_))));

        let blank = vec![
            ChatMessage::new(Role::System, ""),
            ChatMessage::new(Role::User, " \t\n"),
        ];
        assert!(matches!(validate_messages(&blank), Err(Error::Validation(_))));

        let image_only = vec![ChatMessage {
            role: Role::User,
            content: Some(ChatMessageContent::Parts(vec![MessagePart::image_url(
                "https://example.com/a.png",
            )])),
        }];
        assert!(validate_messages(&image_only).is_err());
    }

    #[test]
    fn test_prompt_and_url() {
        assert!(validate_prompt("a red fox").is_ok());
        assert!(validate_prompt("   ").is_err());
        assert!(validate_image_url("https://example.com/a.png").is_ok());
        assert!(matches!(validate_image_url(""), Err(Error::Validation(_))));
    }

    #[test]
    fn test_image_size() {
        assert!(validate_image_size("768x1024").is_ok());
        let err = validate_image_size("512x512").unwrap_err();
        assert!(err.to_string().contains("512x512"));
    }

    #[test]
    fn test_range() {
        assert!(validate_range("steps", 30, (10, 100)).is_ok());
        assert!(validate_range("steps", 10, (10, 100)).is_ok());
        let err = validate_range("temperature", 2.5, (0.0, 2.0)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: temperature must be between 0 and 2, got 2.5"
        );
    }

    #[test]
    fn test_require_binary() {
        let mut binary = HashMap::new();
        binary.insert("data".to_string(), BinaryData::new(vec![1, 2, 3]));
        binary.insert("empty".to_string(), BinaryData::new(Vec::new()));

        assert_eq!(require_binary(&binary, "data").unwrap().data, vec![1, 2, 3]);
        assert!(require_binary(&binary, "missing").is_err());
        assert!(require_binary(&binary, "empty").is_err());
    }
}
