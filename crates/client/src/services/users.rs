use std::sync::Arc;

use sbg_protocol::User;

use super::{fetch, segment};
use crate::error::ClientError;
use crate::executor::{ApiRequest, HttpExecutor};
use crate::response::Response;

/// User lookups.
pub struct Users {
    executor: Arc<dyn HttpExecutor>,
}

impl Users {
    pub(crate) fn new(executor: Arc<dyn HttpExecutor>) -> Self {
        Self { executor }
    }

    /// The user owning the auth token.
    pub async fn me(&self) -> Result<(User, Response), ClientError> {
        fetch(self.executor.as_ref(), ApiRequest::get("/user")).await
    }

    pub async fn get(&self, username: &str) -> Result<(User, Response), ClientError> {
        fetch(
            self.executor.as_ref(),
            ApiRequest::get(format!("/users/{}", segment(username))),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{MockExecutor, Reply};

    #[tokio::test]
    async fn me_reads_current_user() {
        let mock = MockExecutor::new(|req| {
            assert_eq!(req.target.as_str(), "/user");
            Ok(Reply::json(200, json!({"username": "rfranklin", "email": "r@example.com"})))
        });
        let (user, resp) = Users::new(mock.clone()).me().await.unwrap();
        assert_eq!(user.username, "rfranklin");
        assert_eq!(user.email, "r@example.com");
        assert_eq!(resp.status, 200);
    }

    #[tokio::test]
    async fn get_escapes_username() {
        let mock = MockExecutor::new(|_| Ok(Reply::json(200, json!({"username": "a b"}))));
        Users::new(mock.clone()).get("a b").await.unwrap();
        assert_eq!(mock.requests()[0].target.as_str(), "/users/a%20b");
    }

    #[tokio::test]
    async fn unknown_user_is_an_api_error() {
        let mock = MockExecutor::new(|_| {
            Ok(Reply::json(404, json!({"status": 404, "code": 1, "message": "no such user"})))
        });
        let err = Users::new(mock).get("ghost").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }
}
