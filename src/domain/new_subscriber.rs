use serde::Deserialize;

use crate::domain::email_frequency::EmailFrequency;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_name::SubscriberName;
use crate::domain::subscriber_status::SubscriptionStatus;

#[derive(Debug)]
pub struct NewSubscriber {
    pub email: SubscriberEmail,
    pub name: Option<SubscriberName>,
    pub status: SubscriptionStatus,
    pub frequency: EmailFrequency,
}

/// Subscriber entry as written in the configuration files.
#[derive(Deserialize, Clone, Debug)]
pub struct SeedSubscriber {
    pub email: String,
    pub name: Option<String>,
    #[serde(default)]
    pub subscription_status: SubscriptionStatus,
    #[serde(default)]
    pub email_frequency: EmailFrequency,
}

impl TryFrom<SeedSubscriber> for NewSubscriber {
    type Error = String;

    fn try_from(seed: SeedSubscriber) -> Result<Self, Self::Error> {
        let email = SubscriberEmail::parse(seed.email)?;
        let name = SubscriberName::parse_optional(seed.name)?;

        Ok(NewSubscriber {
            email,
            name,
            status: seed.subscription_status,
            frequency: seed.email_frequency,
        })
    }
}
