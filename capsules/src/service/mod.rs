pub mod capsule;
pub mod delivery;
pub mod mailer;
pub mod notifier;
pub mod scheduler;
pub mod template;
