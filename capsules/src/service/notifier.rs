use std::sync::Arc;

use common::entities::capsule::Capsule;

use crate::{error::MailError, service::mailer::Mailer};

/// Confirms a freshly sealed capsule to its recipient. Best effort: one
/// attempt, nothing stored.
#[derive(Clone)]
pub struct CreationNotifier {
    mailer: Arc<dyn Mailer>,
}

impl CreationNotifier {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    pub async fn notify(&self, capsule: &Capsule) -> Result<(), MailError> {
        self.mailer.send_confirmation(capsule).await
    }

    pub async fn on_created(&self, capsule: &Capsule) {
        if capsule.email.trim().is_empty() {
            log::info!("Capsule {} has no email, skipping confirmation", capsule.id);
            return;
        }

        match self.notify(capsule).await {
            Ok(()) => log::info!("Confirmation email sent to {}", capsule.email),
            Err(err) => log::error!(
                "Error sending confirmation email for capsule {}: {}",
                capsule.id,
                err
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use common::entities::capsule::{Capsule, CreateCapsule};

    use super::CreationNotifier;
    use crate::service::mailer::test_mailer::{Kind, TestMailer};

    fn capsule(subject: &str, email: &str) -> Capsule {
        Capsule::seal(
            CreateCapsule {
                name: "Yui".to_string(),
                email: email.to_string(),
                subject: subject.to_string(),
                body: "Hello".to_string(),
                mood: None,
                delivery_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            },
            0,
        )
    }

    #[actix_web::test]
    async fn sends_one_confirmation() {
        let mailer = Arc::new(TestMailer::new());
        let notifier = CreationNotifier::new(mailer.clone());

        notifier.on_created(&capsule("sealed", "yui@example.com")).await;

        assert_eq!(mailer.sent(Kind::Confirmation).len(), 1);
        assert!(mailer.sent(Kind::Delivery).is_empty());
    }

    #[actix_web::test]
    async fn skips_capsules_without_email() {
        let mailer = Arc::new(TestMailer::new());
        let notifier = CreationNotifier::new(mailer.clone());

        notifier.on_created(&capsule("sealed", "  ")).await;

        assert!(mailer.sent(Kind::Confirmation).is_empty());
    }

    #[actix_web::test]
    async fn failures_are_reported_not_raised() {
        let mailer = Arc::new(TestMailer::failing(&["broken"]));
        let notifier = CreationNotifier::new(mailer.clone());
        let capsule = capsule("broken", "yui@example.com");

        assert!(notifier.notify(&capsule).await.is_err());
        notifier.on_created(&capsule).await;
        assert!(mailer.sent(Kind::Confirmation).is_empty());
    }
}
