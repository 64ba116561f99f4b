//! GitLab REST v4 implementation of the host traits.
//!
//! API:
//! - GET  /projects/:id/merge_requests?state=opened
//! - GET  /projects/:id/merge_requests/:iid(/changes|/notes)
//! - POST /projects/:id/merge_requests/:iid/notes          (general)
//! - POST /projects/:id/merge_requests/:iid/discussions    (inline)
//! - PUT  /projects/:id/merge_requests/:iid                (labels)
//! - GET  /projects/:id/repository/commits/:sha(/diff)
//! - POST /projects, /projects/:id/repository/(commits|branches), ...
//!
//! Authentication is a `PRIVATE-TOKEN` header on every request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::models::{CommitInfo, DiffRefs, FileChange, FileMap, InlineComment, MergeRequest, Note};

use super::{FileAction, HostError, ProjectProvisioner, ProjectWorkspace, VersionControlHost};

/// How often, and how far apart, merge status is polled after a merge.
const MERGE_POLLS: u32 = 10;
const MERGE_POLL_INTERVAL: Duration = Duration::from_secs(2);

const PAGE_SIZE: u32 = 100;

/// Thin authenticated HTTP client for one GitLab instance.
#[derive(Clone)]
pub struct GitLabClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl std::fmt::Debug for GitLabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabClient")
            .field("api_base", &self.api_base)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl GitLabClient {
    pub fn new(url: &str, token: Option<&str>) -> Result<Self, HostError> {
        let token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                HostError::InvalidConfig(format!(
                    "no GitLab token. Set {} or [gitlab] token",
                    crate::constants::ENV_GITLAB_TOKEN
                ))
            })?;
        let http = reqwest::Client::builder()
            .user_agent(format!(
                "{}/{}",
                crate::constants::APP_NAME,
                crate::constants::VERSION
            ))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base(url),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, HostError> {
        let url = self.url(path);
        tracing::debug!("{method} {url}");
        let mut req = self
            .http
            .request(method.clone(), &url)
            .header("PRIVATE-TOKEN", &self.token);
        if let Some(body) = body {
            req = req.json(body);
        }
        let response = req.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            if status == 404 {
                return Err(HostError::NotFound(format!("{method} {url}")));
            }
            return Err(HostError::Status {
                method: method.to_string(),
                url,
                status,
                body,
            });
        }
        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, HostError> {
        let response = self.request(method, path, body).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| HostError::Decode(format!("{path}: {e}")))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, HostError> {
        self.fetch(Method::GET, path, None).await
    }

    async fn send(&self, method: Method, path: &str, body: &Value) -> Result<(), HostError> {
        self.request(method, path, Some(body)).await.map(|_| ())
    }
}

/// `https://gitlab.example.com/` becomes `https://gitlab.example.com/api/v4`.
fn api_base(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.ends_with("/api/v4") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/api/v4")
    }
}

#[derive(Debug, Deserialize)]
struct ApiMergeRequest {
    iid: u64,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    source_branch: String,
    #[serde(default)]
    target_branch: String,
    #[serde(default)]
    web_url: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    diff_refs: Option<ApiDiffRefs>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiDiffRefs {
    base_sha: Option<String>,
    start_sha: Option<String>,
    head_sha: Option<String>,
}

impl ApiMergeRequest {
    fn head_sha(&self) -> String {
        self.sha
            .clone()
            .or_else(|| self.diff_refs.as_ref().and_then(|r| r.head_sha.clone()))
            .unwrap_or_default()
    }

    fn diff_refs(&self) -> Option<DiffRefs> {
        let refs = self.diff_refs.as_ref()?;
        let base_sha = refs.base_sha.clone()?;
        let head_sha = refs.head_sha.clone()?;
        Some(DiffRefs {
            start_sha: refs.start_sha.clone().unwrap_or_else(|| base_sha.clone()),
            base_sha,
            head_sha,
        })
    }

    fn into_model(self) -> MergeRequest {
        MergeRequest {
            iid: self.iid,
            head_sha: self.head_sha(),
            title: self.title,
            description: self.description.unwrap_or_default(),
            source_branch: self.source_branch,
            target_branch: self.target_branch,
            web_url: self.web_url,
            state: self.state,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiChanges {
    #[serde(default)]
    changes: Vec<FileChange>,
}

#[derive(Debug, Deserialize)]
struct ApiCommit {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    author_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiNote {
    id: u64,
    #[serde(default)]
    body: String,
    #[serde(default)]
    system: bool,
}

#[derive(Debug, Deserialize)]
struct ApiProject {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    web_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiNamespace {
    id: u64,
}

/// Discussion payload anchoring `comment` to the new side of the diff.
fn inline_payload(comment: &InlineComment, refs: &DiffRefs) -> Value {
    json!({
        "body": comment.body,
        "position": {
            "position_type": "text",
            "base_sha": refs.base_sha,
            "start_sha": refs.start_sha,
            "head_sha": refs.head_sha,
            "new_path": comment.file_path,
            "old_path": comment.file_path,
            "new_line": comment.new_line,
        }
    })
}

/// Commit payload creating or updating every file in `files`.
fn commit_payload(branch: &str, message: &str, files: &FileMap, action: FileAction) -> Value {
    let actions: Vec<Value> = files
        .iter()
        .map(|(path, content)| {
            json!({
                "action": action.as_str(),
                "file_path": path,
                "content": content,
            })
        })
        .collect();
    json!({
        "branch": branch,
        "commit_message": message,
        "actions": actions,
    })
}

/// A single GitLab project.
#[derive(Debug, Clone)]
pub struct GitLabHost {
    client: GitLabClient,
    /// Numeric id or `namespace/name` path.
    project: String,
    web_url: String,
}

impl GitLabHost {
    pub fn new(client: GitLabClient, project: impl Into<String>) -> Self {
        Self {
            client,
            project: project.into(),
            web_url: String::new(),
        }
    }

    fn with_web_url(mut self, web_url: String) -> Self {
        self.web_url = web_url;
        self
    }

    fn project_path(&self) -> String {
        format!("/projects/{}", urlencoding::encode(&self.project))
    }

    fn mr_path(&self, iid: u64) -> String {
        format!("{}/merge_requests/{iid}", self.project_path())
    }

    async fn api_merge_request(&self, iid: u64) -> Result<ApiMergeRequest, HostError> {
        self.client.get(&self.mr_path(iid)).await
    }
}

#[async_trait]
impl VersionControlHost for GitLabHost {
    async fn list_open_merge_requests(&self) -> Result<Vec<MergeRequest>, HostError> {
        let path = format!(
            "{}/merge_requests?state=opened&per_page={PAGE_SIZE}",
            self.project_path()
        );
        let mrs: Vec<ApiMergeRequest> = self.client.get(&path).await?;
        Ok(mrs.into_iter().map(ApiMergeRequest::into_model).collect())
    }

    async fn merge_request(&self, iid: u64) -> Result<MergeRequest, HostError> {
        Ok(self.api_merge_request(iid).await?.into_model())
    }

    async fn merge_request_changes(&self, iid: u64) -> Result<Vec<FileChange>, HostError> {
        let changes: ApiChanges = self
            .client
            .get(&format!("{}/changes", self.mr_path(iid)))
            .await?;
        Ok(changes.changes)
    }

    async fn commit_changes(&self, sha: &str) -> Result<Vec<FileChange>, HostError> {
        let path = format!(
            "{}/repository/commits/{}/diff?per_page={PAGE_SIZE}",
            self.project_path(),
            urlencoding::encode(sha)
        );
        self.client.get(&path).await
    }

    async fn commit(&self, sha: &str) -> Result<CommitInfo, HostError> {
        let path = format!(
            "{}/repository/commits/{}",
            self.project_path(),
            urlencoding::encode(sha)
        );
        let commit: ApiCommit = self.client.get(&path).await?;
        Ok(CommitInfo {
            id: commit.id,
            title: commit.title.unwrap_or_default(),
            message: commit.message.unwrap_or_default(),
            author_name: commit.author_name.unwrap_or_default(),
        })
    }

    async fn notes(&self, iid: u64) -> Result<Vec<Note>, HostError> {
        let path = format!(
            "{}/notes?sort=desc&order_by=created_at&per_page={PAGE_SIZE}",
            self.mr_path(iid)
        );
        let notes: Vec<ApiNote> = self.client.get(&path).await?;
        Ok(notes
            .into_iter()
            .filter(|n| !n.system)
            .map(|n| Note {
                id: n.id,
                body: n.body,
            })
            .collect())
    }

    async fn post_note(&self, iid: u64, body: &str) -> Result<(), HostError> {
        self.client
            .send(
                Method::POST,
                &format!("{}/notes", self.mr_path(iid)),
                &json!({ "body": body }),
            )
            .await
    }

    async fn post_inline_comment(
        &self,
        iid: u64,
        comment: &InlineComment,
    ) -> Result<(), HostError> {
        let mr = self.api_merge_request(iid).await?;
        let refs = mr
            .diff_refs()
            .ok_or_else(|| HostError::Decode(format!("merge request !{iid} has no diff_refs")))?;
        self.client
            .send(
                Method::POST,
                &format!("{}/discussions", self.mr_path(iid)),
                &inline_payload(comment, &refs),
            )
            .await
    }

    async fn set_labels(&self, iid: u64, labels: &[String]) -> Result<(), HostError> {
        if labels.is_empty() {
            return Ok(());
        }
        self.client
            .send(
                Method::PUT,
                &self.mr_path(iid),
                &json!({ "add_labels": labels.join(",") }),
            )
            .await
    }
}

#[async_trait]
impl ProjectWorkspace for GitLabHost {
    fn web_url(&self) -> &str {
        &self.web_url
    }

    fn as_host(&self) -> &dyn VersionControlHost {
        self
    }

    async fn commit_files(
        &self,
        branch: &str,
        message: &str,
        files: &FileMap,
        action: FileAction,
    ) -> Result<(), HostError> {
        if files.is_empty() {
            return Ok(());
        }
        self.client
            .send(
                Method::POST,
                &format!("{}/repository/commits", self.project_path()),
                &commit_payload(branch, message, files, action),
            )
            .await
    }

    async fn create_branch(&self, name: &str, from: &str) -> Result<(), HostError> {
        self.client
            .send(
                Method::POST,
                &format!("{}/repository/branches", self.project_path()),
                &json!({ "branch": name, "ref": from }),
            )
            .await
    }

    async fn open_merge_request(
        &self,
        source_branch: &str,
        target_branch: &str,
        title: &str,
        description: &str,
    ) -> Result<MergeRequest, HostError> {
        let mr: ApiMergeRequest = self
            .client
            .fetch(
                Method::POST,
                &format!("{}/merge_requests", self.project_path()),
                Some(&json!({
                    "source_branch": source_branch,
                    "target_branch": target_branch,
                    "title": title,
                    "description": description,
                    "remove_source_branch": true,
                })),
            )
            .await?;
        Ok(mr.into_model())
    }

    async fn merge(&self, iid: u64) -> Result<bool, HostError> {
        self.client
            .send(
                Method::PUT,
                &format!("{}/merge", self.mr_path(iid)),
                &json!({}),
            )
            .await?;

        for poll in 1..=MERGE_POLLS {
            let mr = self.api_merge_request(iid).await?;
            if mr.state == "merged" {
                return Ok(true);
            }
            tracing::debug!(iid, poll, state = %mr.state, "waiting for merge");
            tokio::time::sleep(MERGE_POLL_INTERVAL).await;
        }
        Ok(false)
    }
}

/// Creates benchmark projects in a group (or the token owner's namespace).
#[derive(Debug, Clone)]
pub struct GitLabProvisioner {
    client: GitLabClient,
    group: Option<String>,
}

impl GitLabProvisioner {
    pub fn new(client: GitLabClient, group: Option<String>) -> Self {
        Self { client, group }
    }

    async fn namespace_id(&self) -> Option<u64> {
        let group = self.group.as_deref()?;
        let path = format!("/groups/{}", urlencoding::encode(group));
        match self.client.get::<ApiNamespace>(&path).await {
            Ok(ns) => Some(ns.id),
            Err(e) => {
                tracing::warn!("could not resolve group '{group}': {e}");
                None
            }
        }
    }
}

#[async_trait]
impl ProjectProvisioner for GitLabProvisioner {
    async fn cleanup_projects(&self, prefix: &str) -> Result<usize, HostError> {
        let path = format!(
            "/projects?search={}&owned=true&simple=true&per_page={PAGE_SIZE}",
            urlencoding::encode(prefix)
        );
        let projects: Vec<ApiProject> = self.client.get(&path).await?;
        let mut removed = 0;
        for project in projects.iter().filter(|p| p.name.starts_with(prefix)) {
            match self
                .client
                .request(Method::DELETE, &format!("/projects/{}", project.id), None)
                .await
            {
                Ok(_) => {
                    tracing::info!("deleted stale project {}", project.name);
                    removed += 1;
                }
                Err(e) => tracing::warn!("failed to delete project {}: {e}", project.name),
            }
        }
        Ok(removed)
    }

    async fn create_project(&self, name: &str) -> Result<Box<dyn ProjectWorkspace>, HostError> {
        let mut body = json!({
            "name": name,
            "path": name,
            "visibility": "private",
            "initialize_with_readme": false,
        });

        let created = match self.namespace_id().await {
            Some(namespace_id) => {
                body["namespace_id"] = json!(namespace_id);
                match self
                    .client
                    .fetch::<ApiProject>(Method::POST, "/projects", Some(&body))
                    .await
                {
                    Ok(project) => project,
                    Err(e) => {
                        tracing::warn!("creating {name} in group failed ({e}); using user namespace");
                        if let Some(map) = body.as_object_mut() {
                            map.remove("namespace_id");
                        }
                        self.client
                            .fetch::<ApiProject>(Method::POST, "/projects", Some(&body))
                            .await?
                    }
                }
            }
            None => {
                self.client
                    .fetch::<ApiProject>(Method::POST, "/projects", Some(&body))
                    .await?
            }
        };

        tracing::info!("created project {} ({})", name, created.web_url);
        Ok(Box::new(
            GitLabHost::new(self.client.clone(), created.id.to_string())
                .with_web_url(created.web_url),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn api_base_appends_version_once() {
        assert_eq!(api_base("https://gitlab.com"), "https://gitlab.com/api/v4");
        assert_eq!(api_base("https://gitlab.com/"), "https://gitlab.com/api/v4");
        assert_eq!(
            api_base("https://git.example/api/v4/"),
            "https://git.example/api/v4"
        );
    }

    #[test]
    fn client_requires_token() {
        assert!(matches!(
            GitLabClient::new("https://gitlab.com", None),
            Err(HostError::InvalidConfig(_))
        ));
        assert!(GitLabClient::new("https://gitlab.com", Some("  ")).is_err());
    }

    #[test]
    fn project_paths_are_url_encoded() {
        let client = GitLabClient::new("https://gitlab.com", Some("t")).unwrap();
        let host = GitLabHost::new(client, "team/payments");
        assert_eq!(host.project_path(), "/projects/team%2Fpayments");
        assert_eq!(host.mr_path(7), "/projects/team%2Fpayments/merge_requests/7");
    }

    #[test]
    fn merge_request_tolerates_null_fields() {
        let raw = json!({
            "iid": 3,
            "title": "Feat: fees",
            "description": null,
            "sha": null,
            "source_branch": "feat/fees",
            "target_branch": "main",
            "web_url": "https://gitlab.com/x/-/merge_requests/3",
            "state": "opened",
            "diff_refs": {"base_sha": "b", "start_sha": null, "head_sha": "h"}
        });
        let api: ApiMergeRequest = serde_json::from_value(raw).unwrap();
        let refs = api.diff_refs().unwrap();
        assert_eq!(refs.start_sha, "b");
        let mr = api.into_model();
        assert_eq!(mr.head_sha, "h");
        assert_eq!(mr.description, "");
    }

    #[test]
    fn inline_payload_targets_new_line() {
        let comment = InlineComment {
            file_path: "fees.py".into(),
            new_line: 12,
            body: "fix".into(),
        };
        let refs = DiffRefs {
            base_sha: "b".into(),
            start_sha: "s".into(),
            head_sha: "h".into(),
        };
        let payload = inline_payload(&comment, &refs);
        assert_eq!(payload["position"]["new_line"], json!(12));
        assert_eq!(payload["position"]["position_type"], json!("text"));
        assert_eq!(payload["position"]["start_sha"], json!("s"));
    }

    #[test]
    fn commit_payload_lists_every_file() {
        let mut files = FileMap::new();
        files.insert("a.py".into(), "x = 1".into());
        files.insert("tests/test_a.py".into(), "def test(): pass".into());
        let payload = commit_payload("main", "Init", &files, FileAction::Create);
        let actions = payload["actions"].as_array().unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[1]["file_path"], json!("tests/test_a.py"));
        assert_eq!(actions[0]["action"], json!("create"));
    }
}
