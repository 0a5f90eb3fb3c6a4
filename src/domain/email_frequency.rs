use chrono::Duration;

/// Cadence bucket a subscriber receives quotes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailFrequency {
    Daily,
    Weekly,
}

impl EmailFrequency {
    pub const ALL: [EmailFrequency; 2] = [EmailFrequency::Daily, EmailFrequency::Weekly];

    /// Minimum time that has to pass between two deliveries.
    pub fn interval(&self) -> Duration {
        match self {
            EmailFrequency::Daily => Duration::days(1),
            EmailFrequency::Weekly => Duration::days(7),
        }
    }

    pub fn parse(frequency: String) -> Result<EmailFrequency, String> {
        match frequency.as_str() {
            "daily" => Ok(EmailFrequency::Daily),
            "weekly" => Ok(EmailFrequency::Weekly),
            _ => Err(format!(
                "{} is not a valid email frequency. Use either 'daily' or 'weekly'.",
                frequency
            )),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            EmailFrequency::Daily => "Daily",
            EmailFrequency::Weekly => "Weekly",
        }
    }
}

impl Default for EmailFrequency {
    fn default() -> Self {
        EmailFrequency::Daily
    }
}

impl AsRef<str> for EmailFrequency {
    fn as_ref(&self) -> &str {
        match self {
            EmailFrequency::Daily => "daily",
            EmailFrequency::Weekly => "weekly",
        }
    }
}

impl std::fmt::Display for EmailFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}
