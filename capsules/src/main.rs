use std::{
    io::{self, ErrorKind},
    sync::Arc,
};

use actix_web::HttpServer;
use capsules::{
    config::Settings,
    create_app,
    repositories::capsule::CapsuleStore,
    service::{
        mailer::{Mailer, SmtpMailer},
        scheduler::{BusinessCalendar, DailySchedule, DeliveryScheduler},
        template::{HtmlLetterFormatter, LetterFormatter},
    },
};
use common::{context::ServiceState, entities::capsule::Capsule, repository::mongo_repository::MongoRepository};

fn startup_error(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> io::Error {
    io::Error::new(ErrorKind::Other, err)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let settings = Settings::from_env().map_err(startup_error)?;

    let store: Arc<dyn CapsuleStore> = Arc::new(
        MongoRepository::<Capsule>::new(&settings.mongo_uri, &settings.database, &settings.collection)
            .await
            .map_err(startup_error)?,
    );

    let calendar = BusinessCalendar::new(settings.delivery.utc_offset);
    let schedule = DailySchedule::new(&settings.delivery.cron, calendar).map_err(startup_error)?;
    let formatter: Arc<dyn LetterFormatter> = Arc::new(HtmlLetterFormatter::new(calendar.offset()));

    if settings.mail.sender_account.is_none() || settings.mail.credential.is_none() {
        log::warn!("Mail credentials are not set, emails will fail until they are configured");
    }

    let mut state = ServiceState::new("capsules");
    state.insert::<dyn CapsuleStore>(store.clone());
    state.insert::<dyn Mailer>(Arc::new(SmtpMailer::new(
        settings.mail.clone(),
        formatter.clone(),
    )));
    state.insert(Arc::new(calendar));
    let state = Arc::new(state);

    let mail = settings.mail.clone();
    let scheduler = DeliveryScheduler::new(
        schedule,
        store,
        Box::new(move || -> Arc<dyn Mailer> {
            Arc::new(SmtpMailer::new(mail.clone(), formatter.clone()))
        }),
        settings.delivery.clone(),
    );
    actix_web::rt::spawn(scheduler.run());

    log::info!("{} service listening on port {}", state.service_name, settings.port);

    HttpServer::new(move || create_app(state.clone()))
        .bind(("0.0.0.0", settings.port))?
        .run()
        .await
}
