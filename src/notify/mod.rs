pub mod alert;
pub mod slack;

pub use alert::Alerter;
pub use slack::{NoopNotifier, Notifier, SlackNotifier};
