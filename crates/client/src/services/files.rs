use std::sync::Arc;

use sbg_protocol::{File, ListOptions};

use super::{fetch, fetch_page, segment, send};
use crate::error::ClientError;
use crate::executor::{ApiRequest, HttpExecutor};
use crate::response::Response;

/// Files stored on the platform.
pub struct Files {
    executor: Arc<dyn HttpExecutor>,
}

impl Files {
    pub(crate) fn new(executor: Arc<dyn HttpExecutor>) -> Self {
        Self { executor }
    }

    /// One page of the files in `project_id`.
    pub async fn list(
        &self,
        project_id: &str,
        options: &ListOptions,
    ) -> Result<(Vec<File>, Response), ClientError> {
        let request = ApiRequest::get("/files")
            .query("project", project_id)
            .queries(options.to_query());
        fetch_page(self.executor.as_ref(), request).await
    }

    pub async fn get(&self, file_id: &str) -> Result<(File, Response), ClientError> {
        fetch(
            self.executor.as_ref(),
            ApiRequest::get(format!("/files/{}", segment(file_id))),
        )
        .await
    }

    pub async fn delete(&self, file_id: &str) -> Result<Response, ClientError> {
        send(
            self.executor.as_ref(),
            ApiRequest::delete(format!("/files/{}", segment(file_id))),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;
    use serde_json::json;

    use super::*;
    use crate::testing::{MockExecutor, Reply};

    #[tokio::test]
    async fn list_sends_project_and_paging() {
        let mock = MockExecutor::new(|_| {
            Ok(Reply::json(
                200,
                json!({
                    "href": "https://api/v2/files?project=me/demo",
                    "items": [
                        {"id": "f1", "name": "a.fq", "size": 10, "project": "me/demo"},
                        {"id": "f2", "name": "b.fq", "size": 20, "project": "me/demo"}
                    ],
                    "links": []
                }),
            )
            .header("x-total-matching-query", "42")
            .header("link", r#"<https://api/v2/files?project=me/demo&offset=2&limit=2>; rel="next""#))
        });
        let options = ListOptions {
            limit: 2,
            ..ListOptions::default()
        };
        let (files, resp) = Files::new(mock.clone()).list("me/demo", &options).await.unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[1].size, 20);
        assert_eq!(resp.page.total_matching_query, 42);
        assert_eq!(resp.page.next_page().offset, 2);

        let req = &mock.requests()[0];
        assert_eq!(req.target.as_str(), "/files");
        assert_eq!(
            req.query,
            vec![
                ("project".to_string(), "me/demo".to_string()),
                ("limit".to_string(), "2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn delete_uses_delete_method() {
        let mock = MockExecutor::new(|_| Ok(Reply::empty(204)));
        let resp = Files::new(mock.clone()).delete("f1").await.unwrap();
        assert_eq!(resp.status, 204);
        let req = &mock.requests()[0];
        assert_eq!(req.method, Method::DELETE);
        assert_eq!(req.target.as_str(), "/files/f1");
    }

    #[tokio::test]
    async fn get_decodes_timestamps() {
        let mock = MockExecutor::new(|_| {
            Ok(Reply::json(
                200,
                json!({"id": "f1", "created_on": "2017-05-01T10:00:00Z", "metadata": {"sample": "s1"}}),
            ))
        });
        let (file, _) = Files::new(mock).get("f1").await.unwrap();
        assert_eq!(file.created_on.unwrap().timestamp(), 1_493_632_800);
        assert_eq!(file.metadata["sample"], "s1");
    }
}
