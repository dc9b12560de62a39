use chrono::NaiveDate;
use common::{
    context::Context,
    entities::capsule::{CreateCapsule, PublicCapsule},
    error::{self, AddCode},
};
use lazy_static::lazy_static;
use mongodb::bson::oid::ObjectId;
use regex::Regex;

use crate::{
    error::ValidationError,
    repositories::capsule::CapsuleStore,
    service::{mailer::Mailer, notifier::CreationNotifier, scheduler::BusinessCalendar},
};

lazy_static! {
    static ref EMAIL: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid");
}

/// Trims every text field and checks the capsule can still be delivered.
/// The delivery date must fall strictly after `today`.
pub fn validate(capsule: CreateCapsule, today: NaiveDate) -> Result<CreateCapsule, ValidationError> {
    let name = capsule.name.trim().to_string();
    let email = capsule.email.trim().to_string();
    let subject = capsule.subject.trim().to_string();
    let body = capsule.body.trim().to_string();

    if name.is_empty() {
        return Err(ValidationError::MissingName);
    }
    if email.is_empty() {
        return Err(ValidationError::MissingEmail);
    }
    if !EMAIL.is_match(&email) {
        return Err(ValidationError::InvalidEmail);
    }
    if subject.is_empty() {
        return Err(ValidationError::MissingSubject);
    }
    if body.is_empty() {
        return Err(ValidationError::MissingBody);
    }
    if capsule.delivery_date <= today {
        return Err(ValidationError::DeliveryDateTooEarly { today });
    }

    Ok(CreateCapsule {
        name,
        email,
        subject,
        body,
        mood: capsule.mood,
        delivery_date: capsule.delivery_date,
    })
}

fn parse_id(id: &str) -> error::Result<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| anyhow::anyhow!("Invalid capsule id {}", id).code(400))
}

pub struct CapsuleService {
    context: Context,
}

impl CapsuleService {
    pub fn new(context: Context) -> Self {
        Self { context }
    }

    pub async fn create(&self, capsule: CreateCapsule) -> error::Result<PublicCapsule> {
        let calendar = self.context.try_get::<BusinessCalendar>()?;
        let capsules = self.context.try_get::<dyn CapsuleStore>()?;

        let capsule = validate(capsule, calendar.today())?;
        let capsule = capsules
            .create(capsule)
            .await
            .map_err(|err| err.into_service_error())?;

        log::info!(
            "Capsule {} sealed for {}",
            capsule.id,
            capsule.delivery_date
        );

        match self.context.get::<dyn Mailer>() {
            Some(mailer) => {
                let notifier = CreationNotifier::new(mailer);
                let sealed = capsule.clone();
                actix_web::rt::spawn(async move { notifier.on_created(&sealed).await });
            }
            None => log::warn!("No mailer configured, capsule {} not confirmed", capsule.id),
        }

        Ok(capsule.into())
    }

    pub async fn find(&self, id: &str) -> error::Result<PublicCapsule> {
        let id = parse_id(id)?;
        let capsules = self.context.try_get::<dyn CapsuleStore>()?;

        let Some(capsule) = capsules
            .get(id)
            .await
            .map_err(|err| err.into_service_error())?
        else {
            return Err(anyhow::anyhow!("Capsule not found").code(404));
        };

        Ok(capsule.into())
    }

    pub async fn list(&self) -> error::Result<Vec<PublicCapsule>> {
        let capsules = self.context.try_get::<dyn CapsuleStore>()?;

        Ok(capsules
            .list()
            .await
            .map_err(|err| err.into_service_error())?
            .into_iter()
            .map(PublicCapsule::from)
            .collect())
    }

    pub async fn delete(&self, id: &str) -> error::Result<PublicCapsule> {
        let id = parse_id(id)?;
        let capsules = self.context.try_get::<dyn CapsuleStore>()?;

        let Some(capsule) = capsules
            .remove(id)
            .await
            .map_err(|err| err.into_service_error())?
        else {
            return Err(anyhow::anyhow!("Capsule not found").code(404));
        };

        log::info!("Capsule {} deleted", capsule.id);

        Ok(capsule.into())
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, time::Duration};

    use chrono::{FixedOffset, NaiveDate};
    use common::{
        context::{Context, ServiceState},
        entities::capsule::{Capsule, CreateCapsule, Mood},
        repository::test_repository::TestRepository,
    };

    use super::{validate, CapsuleService};
    use crate::{
        error::ValidationError,
        repositories::capsule::CapsuleStore,
        service::{
            mailer::{
                test_mailer::{Kind, TestMailer},
                Mailer,
            },
            scheduler::BusinessCalendar,
        },
    };

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
    }

    fn request(delivery_date: NaiveDate) -> CreateCapsule {
        CreateCapsule {
            name: "  Ren ".to_string(),
            email: " ren@example.com ".to_string(),
            subject: " To me ".to_string(),
            body: "Keep going.\n".to_string(),
            mood: Some(Mood::Hopeful),
            delivery_date,
        }
    }

    fn context(mailer: Arc<TestMailer>) -> Context {
        let mut state = ServiceState::new("capsules");
        state.insert::<dyn CapsuleStore>(Arc::new(TestRepository::<Capsule>::new()));
        state.insert::<dyn Mailer>(mailer);
        state.insert(Arc::new(BusinessCalendar::new(
            FixedOffset::east_opt(9 * 3600).unwrap(),
        )));
        Context::new(Arc::new(state))
    }

    #[test]
    fn validation_trims_fields() {
        let capsule = validate(request(today().succ_opt().unwrap()), today()).unwrap();

        assert_eq!(capsule.name, "Ren");
        assert_eq!(capsule.email, "ren@example.com");
        assert_eq!(capsule.subject, "To me");
        assert_eq!(capsule.body, "Keep going.");
        assert_eq!(capsule.mood, Some(Mood::Hopeful));
    }

    #[test]
    fn validation_rejects_bad_fields() {
        let tomorrow = today().succ_opt().unwrap();

        let mut capsule = request(tomorrow);
        capsule.name = "   ".to_string();
        assert_eq!(validate(capsule, today()).unwrap_err(), ValidationError::MissingName);

        let mut capsule = request(tomorrow);
        capsule.email = "".to_string();
        assert_eq!(validate(capsule, today()).unwrap_err(), ValidationError::MissingEmail);

        let mut capsule = request(tomorrow);
        capsule.email = "ren at example".to_string();
        assert_eq!(validate(capsule, today()).unwrap_err(), ValidationError::InvalidEmail);

        let mut capsule = request(tomorrow);
        capsule.subject = "\t".to_string();
        assert_eq!(validate(capsule, today()).unwrap_err(), ValidationError::MissingSubject);

        let mut capsule = request(tomorrow);
        capsule.body = "\n\n".to_string();
        assert_eq!(validate(capsule, today()).unwrap_err(), ValidationError::MissingBody);
    }

    #[test]
    fn delivery_date_must_be_in_the_future() {
        assert_eq!(
            validate(request(today()), today()).unwrap_err(),
            ValidationError::DeliveryDateTooEarly { today: today() }
        );
        assert!(validate(request(today().pred_opt().unwrap()), today()).is_err());
    }

    #[actix_web::test]
    async fn create_find_delete() {
        let mailer = Arc::new(TestMailer::new());
        let service = CapsuleService::new(context(mailer));

        let created = service
            .create(request(NaiveDate::from_ymd_opt(2100, 1, 1).unwrap()))
            .await
            .unwrap();
        assert_eq!(created.name, "Ren");
        assert!(!created.email_sent);

        let found = service.find(&created.id).await.unwrap();
        assert_eq!(found, created);
        assert_eq!(service.list().await.unwrap().len(), 1);

        let deleted = service.delete(&created.id).await.unwrap();
        assert_eq!(deleted.id, created.id);
        assert_eq!(service.find(&created.id).await.unwrap_err().code, 404);
        assert_eq!(service.delete(&created.id).await.unwrap_err().code, 404);
    }

    #[actix_web::test]
    async fn create_sends_confirmation_in_background() {
        let mailer = Arc::new(TestMailer::new());
        let service = CapsuleService::new(context(mailer.clone()));

        service
            .create(request(NaiveDate::from_ymd_opt(2100, 1, 1).unwrap()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let confirmed = mailer.sent(Kind::Confirmation);
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].email, "ren@example.com");
    }

    #[actix_web::test]
    async fn confirmation_failure_does_not_fail_create() {
        let mailer = Arc::new(TestMailer::failing(&["To me"]));
        let service = CapsuleService::new(context(mailer.clone()));

        let created = service
            .create(request(NaiveDate::from_ymd_opt(2100, 1, 1).unwrap()))
            .await;
        assert!(created.is_ok());
    }

    #[actix_web::test]
    async fn invalid_input_is_a_bad_request() {
        let service = CapsuleService::new(context(Arc::new(TestMailer::new())));

        let err = service
            .create(request(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()))
            .await
            .unwrap_err();
        assert_eq!(err.code, 400);
        assert_eq!(service.find("not-an-id").await.unwrap_err().code, 400);
        assert!(service.list().await.unwrap().is_empty());
    }
}
