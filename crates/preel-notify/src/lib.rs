//! User-facing side effects: Redis Pub/Sub events and transactional email.

pub mod channel;
pub mod error;
pub mod mailer;

pub use channel::NotifyChannel;
pub use error::{NotifyError, NotifyResult};
pub use mailer::{EmailTemplate, Mailer, MailerConfig};
