use std::sync::Arc;

use sbg_protocol::{ListOptions, Member, Permissions, Project, ProjectCreate};

use super::{fetch, fetch_page, project_path, segment, send};
use crate::error::ClientError;
use crate::executor::{ApiRequest, HttpExecutor};
use crate::response::Response;

/// Projects and their membership.
pub struct Projects {
    executor: Arc<dyn HttpExecutor>,
}

impl Projects {
    pub(crate) fn new(executor: Arc<dyn HttpExecutor>) -> Self {
        Self { executor }
    }

    /// Projects the current user is a member of.
    pub async fn list(&self, options: &ListOptions) -> Result<(Vec<Project>, Response), ClientError> {
        let request = ApiRequest::get("/projects").queries(options.to_query());
        fetch_page(self.executor.as_ref(), request).await
    }

    /// Projects owned by `username`.
    pub async fn list_for_user(
        &self,
        username: &str,
        options: &ListOptions,
    ) -> Result<(Vec<Project>, Response), ClientError> {
        let request =
            ApiRequest::get(format!("/projects/{}", segment(username))).queries(options.to_query());
        fetch_page(self.executor.as_ref(), request).await
    }

    pub async fn get(&self, project_id: &str) -> Result<(Project, Response), ClientError> {
        fetch(self.executor.as_ref(), ApiRequest::get(self.path(project_id))).await
    }

    pub async fn create(&self, project: &ProjectCreate) -> Result<(Project, Response), ClientError> {
        fetch(
            self.executor.as_ref(),
            ApiRequest::post("/projects").json(project)?,
        )
        .await
    }

    /// Deletes the project and everything stored in it.
    pub async fn delete(&self, project_id: &str) -> Result<Response, ClientError> {
        send(self.executor.as_ref(), ApiRequest::delete(self.path(project_id))).await
    }

    /// Changes only the fields set in `changes`.
    pub async fn modify(
        &self,
        project_id: &str,
        changes: &ProjectCreate,
    ) -> Result<(Project, Response), ClientError> {
        fetch(
            self.executor.as_ref(),
            ApiRequest::patch(self.path(project_id)).json(changes)?,
        )
        .await
    }

    pub async fn members(
        &self,
        project_id: &str,
        options: &ListOptions,
    ) -> Result<(Vec<Member>, Response), ClientError> {
        let request = ApiRequest::get(format!("{}/members", self.path(project_id)))
            .queries(options.to_query());
        fetch_page(self.executor.as_ref(), request).await
    }

    pub async fn add_member(
        &self,
        project_id: &str,
        member: &Member,
    ) -> Result<(Member, Response), ClientError> {
        fetch(
            self.executor.as_ref(),
            ApiRequest::post(format!("{}/members", self.path(project_id))).json(member)?,
        )
        .await
    }

    pub async fn remove_member(
        &self,
        project_id: &str,
        username: &str,
    ) -> Result<Response, ClientError> {
        send(
            self.executor.as_ref(),
            ApiRequest::delete(self.member_path(project_id, username)),
        )
        .await
    }

    pub async fn get_member(
        &self,
        project_id: &str,
        username: &str,
    ) -> Result<(Member, Response), ClientError> {
        fetch(
            self.executor.as_ref(),
            ApiRequest::get(self.member_path(project_id, username)),
        )
        .await
    }

    /// Replaces a member's permissions. Every flag is sent, so unset ones
    /// are revoked.
    pub async fn change_permissions(
        &self,
        project_id: &str,
        username: &str,
        permissions: &Permissions,
    ) -> Result<(Permissions, Response), ClientError> {
        fetch(
            self.executor.as_ref(),
            ApiRequest::put(self.member_path(project_id, username)).json(permissions)?,
        )
        .await
    }

    fn path(&self, project_id: &str) -> String {
        format!("/projects/{}", project_path(project_id))
    }

    fn member_path(&self, project_id: &str, username: &str) -> String {
        format!("{}/members/{}", self.path(project_id), segment(username))
    }
}
