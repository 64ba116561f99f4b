//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use reviewbench::config::ReviewerConfig;
use reviewbench::diff::ExtensionFilter;
use reviewbench::host::{
    FileAction, HostError, ProjectProvisioner, ProjectWorkspace, VersionControlHost,
};
use reviewbench::models::{
    CommitInfo, FileChange, FileMap, InlineComment, MergeRequest, Note, TestOutcome,
};
use reviewbench::providers::TextCompletionProvider;
use reviewbench::review::Reviewer;
use reviewbench::runner::{RunnerError, TestRunner};

/// One recorded provider call.
#[derive(Debug, Clone)]
pub struct Call {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f64,
}

/// Returns canned answers in order, then empty strings.
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(responses: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TextCompletionProvider for ScriptedProvider {
    async fn ask(&self, system_prompt: &str, user_prompt: &str, temperature: f64) -> String {
        self.calls.lock().unwrap().push(Call {
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            temperature,
        });
        self.responses.lock().unwrap().pop_front().unwrap_or_default()
    }
}

/// A provider that always answers with the same text.
pub struct ConstantProvider {
    pub answer: String,
    pub calls: Mutex<usize>,
}

impl ConstantProvider {
    pub fn new(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.to_string(),
            calls: Mutex::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl TextCompletionProvider for ConstantProvider {
    async fn ask(&self, _system: &str, _user: &str, _temperature: f64) -> String {
        *self.calls.lock().unwrap() += 1;
        self.answer.clone()
    }
}

/// Everything the fake host has seen.
#[derive(Default)]
pub struct HostState {
    pub open: Vec<MergeRequest>,
    pub mr_changes: HashMap<u64, Vec<FileChange>>,
    pub commit_changes: HashMap<String, Vec<FileChange>>,
    pub commits: HashMap<String, CommitInfo>,
    pub notes: Vec<(u64, Note)>,
    pub inline: Vec<(u64, InlineComment)>,
    pub labels: Vec<(u64, Vec<String>)>,
    pub committed: Vec<(String, String, FileMap, FileAction)>,
    pub branches: Vec<String>,
    pub merged: Vec<u64>,
    /// Inline posts to reject before accepting any.
    pub failing_inline_posts: usize,
    pub fail_listing: bool,
    pub fail_labels: bool,
    next_note_id: u64,
}

/// In-memory host. Clones share state.
#[derive(Clone, Default)]
pub struct FakeHost {
    pub state: Arc<Mutex<HostState>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(&self, f: impl FnOnce(&mut HostState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn add_open(&self, mr: MergeRequest, changes: Vec<FileChange>) {
        let mut state = self.state.lock().unwrap();
        state.mr_changes.insert(mr.iid, changes);
        state.open.retain(|m| m.iid != mr.iid);
        state.open.push(mr);
    }

    pub fn push_revision(&self, iid: u64, commit: CommitInfo, changes: Vec<FileChange>) {
        let mut state = self.state.lock().unwrap();
        if let Some(mr) = state.open.iter_mut().find(|m| m.iid == iid) {
            mr.head_sha = commit.id.clone();
        }
        state.commit_changes.insert(commit.id.clone(), changes);
        state.commits.insert(commit.id.clone(), commit);
    }

    pub fn notes_for(&self, iid: u64) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .notes
            .iter()
            .filter(|(i, _)| *i == iid)
            .map(|(_, n)| n.body.clone())
            .collect()
    }

    pub fn inline_comments(&self) -> Vec<InlineComment> {
        let state = self.state.lock().unwrap();
        state.inline.iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn labels(&self) -> Vec<(u64, Vec<String>)> {
        self.state.lock().unwrap().labels.clone()
    }

    fn not_found(what: impl Into<String>) -> HostError {
        HostError::NotFound(what.into())
    }
}

#[async_trait]
impl VersionControlHost for FakeHost {
    async fn list_open_merge_requests(&self) -> Result<Vec<MergeRequest>, HostError> {
        let state = self.state.lock().unwrap();
        if state.fail_listing {
            return Err(HostError::Decode("listing unavailable".into()));
        }
        Ok(state.open.clone())
    }

    async fn merge_request(&self, iid: u64) -> Result<MergeRequest, HostError> {
        let state = self.state.lock().unwrap();
        state
            .open
            .iter()
            .find(|m| m.iid == iid)
            .cloned()
            .ok_or_else(|| Self::not_found(format!("merge request {iid}")))
    }

    async fn merge_request_changes(&self, iid: u64) -> Result<Vec<FileChange>, HostError> {
        let state = self.state.lock().unwrap();
        Ok(state.mr_changes.get(&iid).cloned().unwrap_or_default())
    }

    async fn commit_changes(&self, sha: &str) -> Result<Vec<FileChange>, HostError> {
        let state = self.state.lock().unwrap();
        state
            .commit_changes
            .get(sha)
            .cloned()
            .ok_or_else(|| Self::not_found(format!("commit {sha}")))
    }

    async fn commit(&self, sha: &str) -> Result<CommitInfo, HostError> {
        let state = self.state.lock().unwrap();
        state
            .commits
            .get(sha)
            .cloned()
            .ok_or_else(|| Self::not_found(format!("commit {sha}")))
    }

    async fn notes(&self, iid: u64) -> Result<Vec<Note>, HostError> {
        let state = self.state.lock().unwrap();
        let mut notes: Vec<Note> = state
            .notes
            .iter()
            .filter(|(i, _)| *i == iid)
            .map(|(_, n)| n.clone())
            .collect();
        notes.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(notes)
    }

    async fn post_note(&self, iid: u64, body: &str) -> Result<(), HostError> {
        let mut state = self.state.lock().unwrap();
        state.next_note_id += 1;
        let id = state.next_note_id;
        state.notes.push((
            iid,
            Note {
                id,
                body: body.to_string(),
            },
        ));
        Ok(())
    }

    async fn post_inline_comment(
        &self,
        iid: u64,
        comment: &InlineComment,
    ) -> Result<(), HostError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_inline_posts > 0 {
            state.failing_inline_posts -= 1;
            return Err(HostError::Status {
                method: "POST".into(),
                url: format!("/merge_requests/{iid}/discussions"),
                status: 500,
                body: "boom".into(),
            });
        }
        state.inline.push((iid, comment.clone()));
        Ok(())
    }

    async fn set_labels(&self, iid: u64, labels: &[String]) -> Result<(), HostError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_labels {
            return Err(HostError::Status {
                method: "PUT".into(),
                url: format!("/merge_requests/{iid}"),
                status: 403,
                body: "forbidden".into(),
            });
        }
        state.labels.push((iid, labels.to_vec()));
        Ok(())
    }
}

#[async_trait]
impl ProjectWorkspace for FakeHost {
    fn web_url(&self) -> &str {
        "https://gitlab.test/bench/project"
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
        self.state.lock().unwrap().committed.push((
            branch.to_string(),
            message.to_string(),
            files.clone(),
            action,
        ));
        Ok(())
    }

    async fn create_branch(&self, name: &str, _from: &str) -> Result<(), HostError> {
        self.state.lock().unwrap().branches.push(name.to_string());
        Ok(())
    }

    async fn open_merge_request(
        &self,
        source_branch: &str,
        target_branch: &str,
        title: &str,
        description: &str,
    ) -> Result<MergeRequest, HostError> {
        let mut state = self.state.lock().unwrap();
        let mr = MergeRequest {
            iid: state.open.len() as u64 + 1,
            title: title.to_string(),
            description: description.to_string(),
            head_sha: "feedface00112233445566778899aabbccddeeff".to_string(),
            source_branch: source_branch.to_string(),
            target_branch: target_branch.to_string(),
            web_url: "https://gitlab.test/bench/project/-/merge_requests/1".to_string(),
            state: "opened".to_string(),
        };
        state.open.push(mr.clone());
        Ok(mr)
    }

    async fn merge(&self, iid: u64) -> Result<bool, HostError> {
        self.state.lock().unwrap().merged.push(iid);
        Ok(true)
    }
}

/// Hands out one shared [`FakeHost`] as every new project.
pub struct FakeProvisioner {
    pub host: FakeHost,
    pub created: Mutex<Vec<String>>,
    pub cleaned: Mutex<Vec<String>>,
    refuse_projects: bool,
}

impl FakeProvisioner {
    pub fn new(host: FakeHost) -> Arc<Self> {
        Arc::new(Self {
            host,
            created: Mutex::new(Vec::new()),
            cleaned: Mutex::new(Vec::new()),
            refuse_projects: false,
        })
    }

    /// A provisioner whose namespace rejects new projects.
    pub fn refusing(host: FakeHost) -> Arc<Self> {
        Arc::new(Self {
            host,
            created: Mutex::new(Vec::new()),
            cleaned: Mutex::new(Vec::new()),
            refuse_projects: true,
        })
    }
}

#[async_trait]
impl ProjectProvisioner for FakeProvisioner {
    async fn cleanup_projects(&self, prefix: &str) -> Result<usize, HostError> {
        self.cleaned.lock().unwrap().push(prefix.to_string());
        Ok(0)
    }

    async fn create_project(&self, name: &str) -> Result<Box<dyn ProjectWorkspace>, HostError> {
        self.created.lock().unwrap().push(name.to_string());
        if self.refuse_projects {
            return Err(HostError::Status {
                method: "POST".into(),
                url: "/projects".into(),
                status: 400,
                body: "namespace is full".into(),
            });
        }
        Ok(Box::new(self.host.clone()))
    }
}

/// Returns canned outcomes in order and records the files it was given.
pub struct FakeRunner {
    outcomes: Mutex<VecDeque<TestOutcome>>,
    pub runs: Mutex<Vec<FileMap>>,
    broken: bool,
}

impl FakeRunner {
    pub fn new(outcomes: Vec<TestOutcome>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            runs: Mutex::new(Vec::new()),
            broken: false,
        })
    }

    /// A runner whose test command cannot be started.
    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(VecDeque::new()),
            runs: Mutex::new(Vec::new()),
            broken: true,
        })
    }
}

#[async_trait]
impl TestRunner for FakeRunner {
    async fn run(&self, files: &FileMap) -> Result<TestOutcome, RunnerError> {
        self.runs.lock().unwrap().push(files.clone());
        if self.broken {
            return Err(RunnerError::EmptyCommand);
        }
        Ok(self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| TestOutcome::not_run("no outcome scripted")))
    }
}

pub fn outcome(passed: u32, failed: u32, success: bool) -> TestOutcome {
    TestOutcome {
        passed,
        failed,
        success,
        raw_output: format!("{passed} passed, {failed} failed"),
    }
}

/// Review settings with no delays and a small retry budget.
pub fn fast_config(max_retries: u32) -> ReviewerConfig {
    ReviewerConfig {
        max_retries_per_agent: max_retries,
        retry_delay: Duration::ZERO,
        ..ReviewerConfig::default()
    }
}

pub fn reviewer(provider: Arc<dyn TextCompletionProvider>, max_retries: u32) -> Reviewer {
    Reviewer::new(
        provider,
        fast_config(max_retries),
        ExtensionFilter::default(),
        vec![
            "ready-for-merge".to_string(),
            "needs-review".to_string(),
            "changes-requested".to_string(),
        ],
    )
}

pub const FEES_DIFF: &str = "@@ -0,0 +1,5 @@\n\
+def apply_fee(amount):\n\
+    fee = amount * 0.015\n\
+    total = amount + fee\n\
+    return round(total, 2)\n\
+\n";

pub fn fees_change() -> FileChange {
    FileChange {
        old_path: "bank/fees.py".to_string(),
        new_path: "bank/fees.py".to_string(),
        diff: FEES_DIFF.to_string(),
        new_file: true,
        deleted_file: false,
    }
}

pub fn merge_request(iid: u64, head: &str) -> MergeRequest {
    MergeRequest {
        iid,
        title: "Feat: transaction fees".to_string(),
        description: "Adds a percentage fee".to_string(),
        head_sha: head.to_string(),
        source_branch: "feat/fees".to_string(),
        target_branch: "main".to_string(),
        web_url: format!("https://gitlab.test/bank/-/merge_requests/{iid}"),
        state: "opened".to_string(),
    }
}

pub const LEAD_JSON: &str = r#"```json
{
  "tldr": "Adds a transaction fee.",
  "risk_assessment": "HIGH",
  "review_summary": "Money math uses floats.",
  "architect_instructions": "Check Decimal usage in fee math.",
  "labels_to_add": ["changes-requested", "security-risk"],
  "final_decision": "CHANGES_REQUESTED"
}
```"#;

pub const TWO_BUGS_JSON: &str = r#"Here are the issues:
[
  {"file_path": "bank/fees.py", "bad_code_snippet": "fee = amount * 0.015", "issue_type": "Precision Error", "severity": "critical", "description": "Float money math.", "suggested_fix": "    fee = amount * Decimal('0.015')"},
  {"file_path": "bank/fees.py", "bad_code_snippet": "return round(total, 2)", "issue_type": "Rounding", "severity": "high", "description": "Banker's rounding on floats.", "suggested_fix": "    return total.quantize(Decimal('0.01'), rounding=ROUND_HALF_UP)"},
]"#;

pub const ONE_BUG_JSON: &str = r#"[{"file_path": "bank/fees.py", "bad_code_snippet": "fee = amount * 0.015", "issue_type": "Precision Error", "severity": "critical", "description": "Float money math.", "suggested_fix": "    fee = amount * Decimal('0.015')"}]"#;
