//! Version-control host capabilities.
//!
//! [`VersionControlHost`] is what the review pipeline needs from a single
//! project: read merge requests and diffs, post notes and positioned
//! comments, set labels. [`ProjectProvisioner`] and [`ProjectWorkspace`]
//! add the throwaway-project lifecycle the benchmark drives.

pub mod gitlab;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CommitInfo, FileChange, FileMap, InlineComment, MergeRequest, Note};

/// Errors from host API calls.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {url} returned HTTP {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("unexpected response from host: {0}")]
    Decode(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid host configuration: {0}")]
    InvalidConfig(String),
}

/// Operations on one project's merge requests.
#[async_trait]
pub trait VersionControlHost: Send + Sync {
    async fn list_open_merge_requests(&self) -> Result<Vec<MergeRequest>, HostError>;

    async fn merge_request(&self, iid: u64) -> Result<MergeRequest, HostError>;

    /// Per-file changes of the whole merge request.
    async fn merge_request_changes(&self, iid: u64) -> Result<Vec<FileChange>, HostError>;

    /// Per-file changes introduced by one commit.
    async fn commit_changes(&self, sha: &str) -> Result<Vec<FileChange>, HostError>;

    async fn commit(&self, sha: &str) -> Result<CommitInfo, HostError>;

    /// Notes on a merge request, in any order.
    async fn notes(&self, iid: u64) -> Result<Vec<Note>, HostError>;

    async fn post_note(&self, iid: u64, body: &str) -> Result<(), HostError>;

    /// Post a comment anchored to a line of the new file.
    async fn post_inline_comment(&self, iid: u64, comment: &InlineComment)
    -> Result<(), HostError>;

    /// Add labels to a merge request.
    async fn set_labels(&self, iid: u64, labels: &[String]) -> Result<(), HostError>;
}

/// Whether a commit creates files or overwrites existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Create,
    Update,
}

impl FileAction {
    pub fn as_str(self) -> &'static str {
        match self {
            FileAction::Create => "create",
            FileAction::Update => "update",
        }
    }
}

/// A freshly provisioned project the benchmark can write to.
#[async_trait]
pub trait ProjectWorkspace: VersionControlHost {
    /// Browser URL of the project.
    fn web_url(&self) -> &str;

    /// This workspace viewed as a plain host.
    fn as_host(&self) -> &dyn VersionControlHost;

    async fn commit_files(
        &self,
        branch: &str,
        message: &str,
        files: &FileMap,
        action: FileAction,
    ) -> Result<(), HostError>;

    async fn create_branch(&self, name: &str, from: &str) -> Result<(), HostError>;

    async fn open_merge_request(
        &self,
        source_branch: &str,
        target_branch: &str,
        title: &str,
        description: &str,
    ) -> Result<MergeRequest, HostError>;

    /// Merge and wait for the host to report the request as merged.
    /// Returns `false` when it never did.
    async fn merge(&self, iid: u64) -> Result<bool, HostError>;
}

/// Creates and removes benchmark projects.
#[async_trait]
pub trait ProjectProvisioner: Send + Sync {
    /// Delete projects whose name starts with `prefix`. Returns how many
    /// were removed.
    async fn cleanup_projects(&self, prefix: &str) -> Result<usize, HostError>;

    async fn create_project(&self, name: &str) -> Result<Box<dyn ProjectWorkspace>, HostError>;
}
