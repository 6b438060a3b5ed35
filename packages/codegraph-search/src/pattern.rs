//! `PatternSearcher` adapter: wraps an external structural matcher process,
//! validating requests and classifying failures into user-facing vs
//! internal errors at the adapter boundary (spec §4.8).

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::SearchConfig;
use crate::error::{Result, SearchError};

/// Exit code the structural matcher binary is expected to use to report a
/// pattern syntax error, as distinct from a crash or a missing binary. Any
/// other non-zero exit is a system error.
const SYNTAX_ERROR_EXIT_CODE: i32 = 2;

/// Closed strictness vocabulary (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    Cst,
    Smart,
    Ast,
    Relaxed,
    Signature,
}

impl Default for Strictness {
    fn default() -> Self {
        Strictness::Smart
    }
}

impl Strictness {
    fn as_arg(&self) -> &'static str {
        match self {
            Strictness::Cst => "cst",
            Strictness::Smart => "smart",
            Strictness::Ast => "ast",
            Strictness::Relaxed => "relaxed",
            Strictness::Signature => "signature",
        }
    }
}

const KNOWN_LANGUAGES: &[&str] = &[
    "go", "python", "rust", "javascript", "typescript", "java", "c", "cpp", "ruby",
];

#[derive(Debug, Clone)]
pub struct PatternRequest {
    pub pattern: String,
    pub language: String,
    pub file_globs: Vec<String>,
    pub strictness: Strictness,
    pub context_lines: usize,
    pub limit: usize,
    pub project_root: PathBuf,
}

impl PatternRequest {
    fn validate(&self) -> Result<()> {
        if self.pattern.trim().is_empty() {
            return Err(SearchError::validation("pattern must not be empty"));
        }
        if !KNOWN_LANGUAGES.contains(&self.language.as_str()) {
            return Err(SearchError::validation(format!(
                "unknown language: {}",
                self.language
            )));
        }
        if !self.project_root.exists() {
            return Err(SearchError::validation(format!(
                "project root does not exist: {}",
                self.project_root.display()
            )));
        }
        for glob in &self.file_globs {
            if glob_escapes_root(&self.project_root, glob) {
                return Err(SearchError::validation(format!(
                    "path-outside-root: file glob escapes project root: {glob}"
                )));
            }
        }
        Ok(())
    }
}

/// Lexically resolves `.`/`..` components without touching the filesystem —
/// the globs here may contain wildcard segments that don't exist on disk, so
/// `Path::canonicalize` isn't an option.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// True if `glob`, joined onto `root` and lexically normalized, would
/// reference anything outside `root` — the "path-outside-root" user error
/// (spec §4.8).
fn glob_escapes_root(root: &Path, glob: &str) -> bool {
    let candidate = Path::new(glob);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };
    !normalize_lexically(&joined).starts_with(normalize_lexically(root))
}

#[derive(Debug, Clone)]
pub struct PatternMatch {
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub match_text: String,
    pub context: String,
    pub bindings: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct PatternResponse {
    pub matches: Vec<PatternMatch>,
}

#[async_trait::async_trait]
pub trait PatternMatcher: Send + Sync {
    async fn search(&self, request: &PatternRequest) -> Result<PatternResponse>;
}

/// One line of the matcher subprocess's JSON-lines output.
#[derive(Debug, Deserialize)]
struct RawMatch {
    file_path: String,
    start_line: usize,
    end_line: usize,
    match_text: String,
    #[serde(default)]
    context: String,
    #[serde(default)]
    bindings: HashMap<String, String>,
}

/// Shells out to an external structural-matcher binary, passing the request
/// as CLI flags and parsing JSON-lines matches from stdout.
pub struct SubprocessPatternMatcher {
    binary_path: PathBuf,
    default_timeout: Duration,
}

impl SubprocessPatternMatcher {
    pub fn new(binary_path: PathBuf, config: &SearchConfig) -> Self {
        Self {
            binary_path,
            default_timeout: config.pattern_search_timeout,
        }
    }

    fn build_command(&self, request: &PatternRequest) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.arg("--pattern").arg(&request.pattern);
        cmd.arg("--language").arg(&request.language);
        cmd.arg("--strictness").arg(request.strictness.as_arg());
        cmd.arg("--context-lines").arg(request.context_lines.to_string());
        cmd.arg("--limit").arg(request.limit.to_string());
        cmd.arg("--project-root").arg(&request.project_root);
        for glob in &request.file_globs {
            cmd.arg("--glob").arg(glob);
        }
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait::async_trait]
impl PatternMatcher for SubprocessPatternMatcher {
    async fn search(&self, request: &PatternRequest) -> Result<PatternResponse> {
        request.validate()?;

        let mut command = self.build_command(request);
        let run = async {
            let output = command
                .output()
                .await
                .map_err(|e| SearchError::backend(format!("failed to spawn structural matcher: {e}")))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(classify_exit_status(output.status, &stderr));
            }

            parse_matches(&output.stdout)
        };

        match timeout(self.default_timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(SearchError::timeout(format!(
                "structural search exceeded {:?}",
                self.default_timeout
            ))),
        }
    }
}

/// Classifies a non-zero matcher exit into a user error (pattern syntax,
/// verbatim to the caller) or a system error (spawn/crash/missing binary).
fn classify_exit_status(status: ExitStatus, stderr: &str) -> SearchError {
    if status.code() == Some(SYNTAX_ERROR_EXIT_CODE) {
        SearchError::validation(format!("pattern syntax error: {}", stderr.trim()))
    } else {
        SearchError::backend(format!("structural matcher exited with {status}: {stderr}"))
    }
}

fn parse_matches(stdout: &[u8]) -> Result<PatternResponse> {
    let text = String::from_utf8_lossy(stdout);
    let mut matches = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let raw: RawMatch = serde_json::from_str(line)
            .map_err(|e| SearchError::backend(format!("failed to parse matcher output: {e}")))?;
        matches.push(PatternMatch {
            file_path: raw.file_path,
            start_line: raw.start_line,
            end_line: raw.end_line,
            match_text: raw.match_text,
            context: raw.context,
            bindings: raw.bindings,
        });
    }

    Ok(PatternResponse { matches })
}
