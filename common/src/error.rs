use actix_web::{
    http::{header::ContentType, StatusCode},
    HttpResponse,
};

#[derive(Debug)]
pub struct ServiceError {
    pub code: u16,
    err: anyhow::Error,
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "ServiceError: {}", self.err)
    }
}

impl actix_web::error::ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::plaintext())
            .body(self.err.to_string())
    }
}

impl<E: Into<anyhow::Error>> From<E> for ServiceError {
    fn from(err: E) -> ServiceError {
        ServiceError {
            code: 400,
            err: err.into(),
        }
    }
}

pub trait AddCode {
    fn code(self, code: u16) -> ServiceError;
}

impl<E: Into<anyhow::Error>> AddCode for E {
    fn code(self, code: u16) -> ServiceError {
        ServiceError {
            code,
            err: self.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod test {
    use actix_web::{http::StatusCode, ResponseError};
    use anyhow::anyhow;

    use super::{AddCode, ServiceError};

    #[test]
    fn plain_errors_are_bad_requests() {
        let err: ServiceError = anyhow!("broken input").into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn code_overrides_status() {
        let err = anyhow!("missing").code(404);
        assert_eq!(err.code, 404);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unknown_code_falls_back_to_internal_error() {
        let err = anyhow!("weird").code(1000);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
