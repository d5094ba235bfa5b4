use movie_cache::{Caller, Role};
use rocket::request::{FromRequest, Outcome, Request};
use std::str::FromStr;

pub const SUBJECT_HEADER: &str = "X-Subject";
pub const ROLE_HEADER: &str = "X-Role";

/// Caller identity forwarded by the upstream auth layer, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestCaller(pub Option<Caller>);

impl RequestCaller {
    pub fn from_headers(subject: Option<&str>, role: Option<&str>) -> Self {
        let Some(subject) = subject.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self(None);
        };
        let role = role
            .and_then(|role| Role::from_str(role.trim()).ok())
            .unwrap_or_default();
        Self(Some(Caller::new(subject, role)))
    }

    pub fn caller(&self) -> Option<&Caller> {
        self.0.as_ref()
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestCaller {
    type Error = std::convert::Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let headers = request.headers();
        Outcome::Success(Self::from_headers(
            headers.get_one(SUBJECT_HEADER),
            headers.get_one(ROLE_HEADER),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_from_headers() {
        assert_eq!(RequestCaller::from_headers(None, Some("admin")), RequestCaller(None));
        assert_eq!(RequestCaller::from_headers(Some("  "), None), RequestCaller(None));

        let caller = RequestCaller::from_headers(Some("user-7"), Some("ADMIN"));
        assert!(caller.caller().unwrap().is_admin());

        let caller = RequestCaller::from_headers(Some("user-7"), Some("root"));
        assert_eq!(caller.caller().unwrap().role, Role::User);
    }
}
