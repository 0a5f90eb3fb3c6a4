use unicode_segmentation::UnicodeSegmentation;

const MAX_NAME_GRAPHEMES: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberName(String);

impl SubscriberName {
    /// Validates an optional display name.
    ///
    /// A missing or blank name is not an error: the subscriber is simply
    /// greeted without one.
    pub fn parse_optional(name: Option<String>) -> Result<Option<SubscriberName>, String> {
        match name {
            Some(name) if !name.trim().is_empty() => Self::parse(name).map(Some),
            _ => Ok(None),
        }
    }

    pub fn parse(name: String) -> Result<SubscriberName, String> {
        let trimmed = name.trim();
        let is_empty = trimmed.is_empty();
        let is_too_long = trimmed.graphemes(true).count() > MAX_NAME_GRAPHEMES;
        let has_control_chars = trimmed.chars().any(char::is_control);

        if is_empty || is_too_long || has_control_chars {
            return Err(format!("{} is not a valid subscriber name", name));
        }

        Ok(Self(trimmed.to_string()))
    }
}

impl AsRef<str> for SubscriberName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
