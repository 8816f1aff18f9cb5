//! Graph-store client. The graph service owns the genealogy rules; this side only
//! forwards requests and classifies its failures.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;

use super::{build_http_client, join_url, scoped};
use crate::config::ClientConfig;
use crate::errors::TreeError;
use crate::models::{
    CreateChildInput, CreateMemberInput, CreateParentInput, CreateSpouseInput, DeleteMemberResponse,
    DeleteOutcome, DirectRelations, MediaFile, Member, PhotosUpload, PicUpload, TreeContext,
    UpdateMemberInput, UpdateSpouseRelationInput,
};

/// Member and relationship CRUD scoped by tree and caller.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn get_member(&self, ctx: &TreeContext, member_id: &str) -> Result<Member, TreeError>;

    async fn list_members(&self, ctx: &TreeContext) -> Result<Vec<Member>, TreeError>;

    async fn direct_relations(
        &self,
        ctx: &TreeContext,
        member_id: &str,
    ) -> Result<DirectRelations, TreeError>;

    /// Create a member with no relationships.
    async fn create_member(
        &self,
        ctx: &TreeContext,
        input: &CreateMemberInput,
    ) -> Result<Member, TreeError>;

    async fn create_child(
        &self,
        ctx: &TreeContext,
        input: &CreateChildInput,
    ) -> Result<Member, TreeError>;

    async fn create_parent(
        &self,
        ctx: &TreeContext,
        input: &CreateParentInput,
    ) -> Result<Member, TreeError>;

    async fn create_spouse(
        &self,
        ctx: &TreeContext,
        input: &CreateSpouseInput,
    ) -> Result<Member, TreeError>;

    async fn update_member(
        &self,
        ctx: &TreeContext,
        input: &UpdateMemberInput,
    ) -> Result<Member, TreeError>;

    async fn delete_member(
        &self,
        ctx: &TreeContext,
        member_id: &str,
    ) -> Result<DeleteOutcome, TreeError>;

    async fn update_spouse_relation(
        &self,
        ctx: &TreeContext,
        input: &UpdateSpouseRelationInput,
    ) -> Result<(), TreeError>;

    async fn upload_pic(
        &self,
        ctx: &TreeContext,
        member_id: &str,
        file: MediaFile,
    ) -> Result<PicUpload, TreeError>;

    async fn upload_photos(
        &self,
        ctx: &TreeContext,
        member_id: &str,
        files: Vec<MediaFile>,
    ) -> Result<PhotosUpload, TreeError>;
}

/// Error body of the graph service.
#[derive(Debug, Deserialize)]
struct GraphServiceError {
    error: String,
    #[serde(default)]
    message: Option<String>,
}

/// Graph store reached over HTTP.
#[derive(Clone)]
pub struct HttpGraphStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpGraphStore {
    pub fn new(
        base_url: impl Into<String>,
        api_psk: Option<&str>,
        timeout: std::time::Duration,
    ) -> Result<Self, TreeError> {
        Ok(Self {
            http: build_http_client(api_psk, timeout)?,
            base_url: base_url.into(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, TreeError> {
        Self::new(
            config.graph_url.clone(),
            config.api_psk.as_deref(),
            config.request_timeout,
        )
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        ctx: &TreeContext,
    ) -> Result<T, TreeError> {
        let response = scoped(request, ctx).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.json::<GraphServiceError>().await.ok();
        Err(graph_error(status, body))
    }
}

/// Classify a graph service failure. Client-side rejections keep the service's
/// message exactly as sent, since it is shown to the user.
fn graph_error(status: StatusCode, body: Option<GraphServiceError>) -> TreeError {
    let message = body
        .map(|b| b.message.filter(|m| !m.is_empty()).unwrap_or(b.error))
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    match status {
        StatusCode::NOT_FOUND => TreeError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TreeError::Unauthorized(message),
        s if s.is_client_error() => TreeError::MutationRejected(message),
        _ => TreeError::Transport(message),
    }
}

fn file_part(file: MediaFile) -> Result<Part, TreeError> {
    Ok(Part::bytes(file.bytes)
        .file_name(file.file_name)
        .mime_str(&file.content_type)?)
}

#[async_trait]
impl GraphStore for HttpGraphStore {
    async fn get_member(&self, ctx: &TreeContext, member_id: &str) -> Result<Member, TreeError> {
        let request = self.http.get(self.url(&format!("/members/{}", member_id)));
        self.send(request, ctx).await
    }

    async fn list_members(&self, ctx: &TreeContext) -> Result<Vec<Member>, TreeError> {
        self.send(self.http.get(self.url("/members")), ctx).await
    }

    async fn direct_relations(
        &self,
        ctx: &TreeContext,
        member_id: &str,
    ) -> Result<DirectRelations, TreeError> {
        let request = self
            .http
            .get(self.url(&format!("/members/{}/direct-relations", member_id)));
        self.send(request, ctx).await
    }

    async fn create_member(
        &self,
        ctx: &TreeContext,
        input: &CreateMemberInput,
    ) -> Result<Member, TreeError> {
        self.send(self.http.post(self.url("/members")).json(input), ctx)
            .await
    }

    async fn create_child(
        &self,
        ctx: &TreeContext,
        input: &CreateChildInput,
    ) -> Result<Member, TreeError> {
        self.send(self.http.post(self.url("/relations/child")).json(input), ctx)
            .await
    }

    async fn create_parent(
        &self,
        ctx: &TreeContext,
        input: &CreateParentInput,
    ) -> Result<Member, TreeError> {
        self.send(self.http.post(self.url("/relations/parent")).json(input), ctx)
            .await
    }

    async fn create_spouse(
        &self,
        ctx: &TreeContext,
        input: &CreateSpouseInput,
    ) -> Result<Member, TreeError> {
        self.send(self.http.post(self.url("/relations/spouse")).json(input), ctx)
            .await
    }

    async fn update_member(
        &self,
        ctx: &TreeContext,
        input: &UpdateMemberInput,
    ) -> Result<Member, TreeError> {
        let request = self
            .http
            .put(self.url(&format!("/members/{}", input.id)))
            .json(input);
        self.send(request, ctx).await
    }

    async fn delete_member(
        &self,
        ctx: &TreeContext,
        member_id: &str,
    ) -> Result<DeleteOutcome, TreeError> {
        let request = self.http.delete(self.url(&format!("/members/{}", member_id)));
        let response: DeleteMemberResponse = self.send(request, ctx).await?;
        tracing::debug!("Delete of {} answered: {}", member_id, response.message);
        Ok(response.outcome())
    }

    async fn update_spouse_relation(
        &self,
        ctx: &TreeContext,
        input: &UpdateSpouseRelationInput,
    ) -> Result<(), TreeError> {
        let _: IgnoredAny = self
            .send(self.http.put(self.url("/relations/spouse")).json(input), ctx)
            .await?;
        Ok(())
    }

    async fn upload_pic(
        &self,
        ctx: &TreeContext,
        member_id: &str,
        file: MediaFile,
    ) -> Result<PicUpload, TreeError> {
        let form = Form::new().part("file", file_part(file)?);
        let request = self
            .http
            .post(self.url(&format!("/media/{}/pic", member_id)))
            .multipart(form);
        self.send(request, ctx).await
    }

    async fn upload_photos(
        &self,
        ctx: &TreeContext,
        member_id: &str,
        files: Vec<MediaFile>,
    ) -> Result<PhotosUpload, TreeError> {
        let mut form = Form::new();
        for file in files {
            form = form.part("files", file_part(file)?);
        }
        let request = self
            .http
            .post(self.url(&format!("/media/{}/photos", member_id)))
            .multipart(form);
        self.send(request, ctx).await
    }
}
