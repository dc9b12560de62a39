use std::sync::Arc;

use actix_web::{dev::Payload, web::Data, FromRequest, HttpRequest};
use anyhow::anyhow;
use type_map::concurrent::TypeMap;

use crate::error::{self, AddCode, ServiceError};

/// Shared dependencies of a service, keyed by type.
///
/// Stores trait objects behind `Arc`, so handlers can ask for
/// `dyn SomeStore` without knowing which backend was wired in `main`.
pub struct ServiceState {
    pub service_name: String,
    services: TypeMap,
}

impl ServiceState {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            services: TypeMap::new(),
        }
    }

    pub fn insert<T: ?Sized + Send + Sync + 'static>(&mut self, service: Arc<T>) {
        self.services.insert::<Arc<T>>(service);
    }

    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services.get::<Arc<T>>().cloned()
    }
}

#[derive(Clone)]
pub struct Context(pub Arc<ServiceState>);

impl FromRequest for Context {
    type Error = ServiceError;

    type Future = futures_util::future::LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        fn from_request_inner(req: &HttpRequest, _payload: &mut Payload) -> error::Result<Context> {
            let Some(state) = req.app_data::<Data<Arc<ServiceState>>>() else {
                return Err(anyhow!("No state provided").code(500));
            };

            Ok(Context(Arc::clone(state)))
        }
        let result = from_request_inner(req, payload);

        Box::pin(async move { result })
    }
}

impl Context {
    pub fn new(state: Arc<ServiceState>) -> Self {
        Self(state)
    }

    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.0.get::<T>()
    }

    pub fn try_get<T: ?Sized + Send + Sync + 'static>(&self) -> error::Result<Arc<T>> {
        self.0.get::<T>().ok_or_else(|| {
            anyhow!(
                "Service {} not registered in {}",
                std::any::type_name::<T>(),
                self.0.service_name
            )
            .code(500)
        })
    }
}
