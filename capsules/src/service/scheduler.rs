use std::{str::FromStr, sync::Arc, time::Duration};

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use crate::{
    config::DeliveryConfig,
    error::ConfigError,
    repositories::capsule::CapsuleStore,
    service::{delivery::DeliveryJob, mailer::Mailer},
};

/// Builds the mailer for one scheduled invocation.
pub type MailerFactory = Box<dyn Fn() -> Arc<dyn Mailer> + Send + Sync>;

/// Maps wall-clock instants to calendar dates in the business timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessCalendar {
    offset: FixedOffset,
}

impl BusinessCalendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn date_at(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    pub fn today(&self) -> NaiveDate {
        self.date_at(Utc::now())
    }
}

/// A cron expression evaluated in the business timezone.
///
/// Expression format (seconds first):
/// ```text
/// sec   min   hour   day_of_month   month   day_of_week   year
/// 0     0     9      *              *       *             (optional)
/// ```
#[derive(Debug, Clone)]
pub struct DailySchedule {
    schedule: cron::Schedule,
    calendar: BusinessCalendar,
}

impl DailySchedule {
    pub fn new(expression: &str, calendar: BusinessCalendar) -> Result<Self, ConfigError> {
        let schedule = cron::Schedule::from_str(expression)?;
        Ok(Self { schedule, calendar })
    }

    pub fn calendar(&self) -> BusinessCalendar {
        self.calendar
    }

    /// The first tick strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&now.with_timezone(&self.calendar.offset))
            .next()
            .map(|next| next.with_timezone(&Utc))
    }
}

/// Runs the delivery job on every tick of a [`DailySchedule`].
///
/// Ticks run one after another on a single task, so one process never runs
/// two deliveries at once. Each tick gets a fresh mailer from `mailers`,
/// dropped when the tick ends.
pub struct DeliveryScheduler {
    schedule: DailySchedule,
    store: Arc<dyn CapsuleStore>,
    mailers: MailerFactory,
    delivery: DeliveryConfig,
}

impl DeliveryScheduler {
    pub fn new(
        schedule: DailySchedule,
        store: Arc<dyn CapsuleStore>,
        mailers: MailerFactory,
        delivery: DeliveryConfig,
    ) -> Self {
        Self {
            schedule,
            store,
            mailers,
            delivery,
        }
    }

    pub async fn run(self) {
        log::info!(
            "Delivery scheduler running with offset {}",
            self.schedule.calendar().offset()
        );

        loop {
            let now = Utc::now();
            let Some(next) = self.schedule.next_after(now) else {
                log::warn!("Delivery schedule will never fire again, stopping scheduler");
                return;
            };
            log::debug!("Next capsule delivery at {}", next);

            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;

            self.tick(self.schedule.calendar().date_at(next)).await;
        }
    }

    /// One scheduled invocation. Never fails: every error ends up in the log.
    pub async fn tick(&self, today: NaiveDate) {
        let job = DeliveryJob::new(self.store.clone(), (self.mailers)())
            .concurrency(self.delivery.concurrency);

        match tokio::time::timeout(self.delivery.timeout, job.run(today)).await {
            Ok(Ok(summary)) => log::info!(
                "Delivery run for {}: {} found, {} delivered, {} failed",
                summary.date,
                summary.found,
                summary.delivered,
                summary.failed
            ),
            Ok(Err(err)) => log::error!("Error in daily capsule delivery: {}", err),
            Err(_) => log::warn!(
                "Delivery run for {} hit its {}s deadline; unsent capsules stay queued",
                today,
                self.delivery.timeout.as_secs()
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, time::Duration};

    use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};
    use common::{
        entities::capsule::{Capsule, CreateCapsule},
        repository::test_repository::TestRepository,
    };

    use super::{BusinessCalendar, DailySchedule, DeliveryScheduler};
    use crate::{
        config::{DeliveryConfig, MailConfig},
        repositories::capsule::CapsuleStore,
        service::{
            mailer::{
                test_mailer::{Kind, TestMailer},
                Mailer, SmtpMailer,
            },
            template::HtmlLetterFormatter,
        },
    };

    fn tokyo() -> BusinessCalendar {
        BusinessCalendar::new(FixedOffset::east_opt(9 * 3600).unwrap())
    }

    #[test]
    fn business_date_follows_offset() {
        let late_utc = Utc.with_ymd_and_hms(2024, 1, 3, 16, 0, 0).unwrap();
        assert_eq!(tokyo().date_at(late_utc), NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());

        let utc = BusinessCalendar::new(FixedOffset::east_opt(0).unwrap());
        assert_eq!(utc.date_at(late_utc), NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    }

    #[test]
    fn next_tick_is_nine_in_the_morning_business_time() {
        let schedule = DailySchedule::new("0 0 9 * * *", tokyo()).unwrap();

        // 09:30 in Tokyo, so today's tick has passed
        let now = Utc.with_ymd_and_hms(2024, 1, 3, 0, 30, 0).unwrap();
        let next = schedule.next_after(now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap());

        // 08:00 in Tokyo, tick later the same day
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 23, 0, 0).unwrap();
        let next = schedule.next_after(now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap());
        assert_eq!(
            schedule.calendar().date_at(next),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
        );
    }

    #[test]
    fn malformed_cron_is_a_config_error() {
        assert!(DailySchedule::new("every morning", tokyo()).is_err());
    }

    fn letter(subject: &str) -> CreateCapsule {
        CreateCapsule {
            name: "Kai".to_string(),
            email: "kai@example.com".to_string(),
            subject: subject.to_string(),
            body: "Hello".to_string(),
            mood: None,
            delivery_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }

    fn scheduler(
        store: Arc<TestRepository<Capsule>>,
        mailer: Arc<dyn Mailer>,
        delivery: DeliveryConfig,
    ) -> DeliveryScheduler {
        DeliveryScheduler::new(
            DailySchedule::new("0 0 9 * * *", tokyo()).unwrap(),
            store,
            Box::new(move || mailer.clone()),
            delivery,
        )
    }

    #[actix_web::test]
    async fn tick_without_credentials_leaves_capsules_queued() {
        let store = Arc::new(TestRepository::<Capsule>::new());
        let capsule = store.create(letter("due")).await.unwrap();

        let formatter = Arc::new(HtmlLetterFormatter::new(tokyo().offset()));
        let mailer = Arc::new(SmtpMailer::new(MailConfig::default(), formatter));
        let scheduler = scheduler(store.clone(), mailer, DeliveryConfig::default());
        scheduler.tick(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()).await;

        let stored = store.get(capsule.id).await.unwrap().unwrap();
        assert!(!stored.email_sent);
    }

    #[actix_web::test]
    async fn tick_past_deadline_leaves_unfinished_capsules_due() {
        let store = Arc::new(TestRepository::<Capsule>::new());
        let capsule = store.create(letter("slow")).await.unwrap();

        let mailer = Arc::new(TestMailer::slow(&["slow"], Duration::from_secs(5)));
        let delivery = DeliveryConfig {
            timeout: Duration::from_millis(50),
            ..DeliveryConfig::default()
        };
        let today = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        scheduler(store.clone(), mailer.clone(), delivery).tick(today).await;

        assert!(!store.get(capsule.id).await.unwrap().unwrap().email_sent);
        let due = store.query_due_unsent(today).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, capsule.id);
        assert!(mailer.sent(Kind::Delivery).is_empty());
    }

    #[actix_web::test]
    async fn tick_delivers_with_a_fresh_mailer() {
        let store = Arc::new(TestRepository::<Capsule>::new());
        let capsule = store.create(letter("due")).await.unwrap();

        let mailer = Arc::new(TestMailer::new());
        scheduler(store.clone(), mailer.clone(), DeliveryConfig::default())
            .tick(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap())
            .await;

        assert!(store.get(capsule.id).await.unwrap().unwrap().email_sent);
    }
}
