pub mod delivery_attempt;
pub mod email_frequency;
pub mod new_subscriber;
pub mod quote;
pub mod subscriber;
pub mod subscriber_email;
pub mod subscriber_name;
pub mod subscriber_status;

pub use delivery_attempt::{DeliveryAttempt, DeliveryStatus, NewDeliveryAttempt};
pub use email_frequency::EmailFrequency;
pub use new_subscriber::{NewSubscriber, SeedSubscriber};
pub use quote::Quote;
pub use subscriber::Subscriber;
pub use subscriber_email::SubscriberEmail;
pub use subscriber_name::SubscriberName;
pub use subscriber_status::SubscriptionStatus;
