//! `FullTextIndex`: keyword search backend.
//!
//! Indexed objects are *files*, not chunks. Backend: `tantivy` 0.22 — already
//! a dependency the teacher's `LexicalStage` declared but never wired up
//! (its "index" was a placeholder token counter with a
//! `// TODO: Use Tantivy to index the file` comment). This module completes
//! that wiring.
//!
//! `apply_delta` receives the same `(added, updated, deleted_ids)` triple as
//! `VectorIndex`, at chunk granularity; since this backend indexes at file
//! granularity, it tracks which chunk ids contribute text to which file and
//! rebuilds that file's document whenever the set of contributing chunks
//! changes. This resolves the spec's open question ("derived from the
//! store's own text tables, or self-maintained") in favor of self-maintained,
//! since the reference `ChunkReader` here has no text-table of its own.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, RegexQuery, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, Term};
use tokio::sync::Mutex as AsyncMutex;

use crate::chunk::Delta;
use crate::error::{Result, SearchError};

const DEFAULT_SNIPPET_WINDOW: usize = 16; // tokens each side, ~32 total
const MAX_HIGHLIGHTS_PER_FILE: usize = 3;

#[derive(Debug, Clone)]
pub struct ExactSearchOptions {
    pub limit: usize,
    pub language: String,
    pub file_path: String,
}

impl Default for ExactSearchOptions {
    fn default() -> Self {
        Self {
            limit: 15,
            language: String::new(),
            file_path: String::new(),
        }
    }
}

impl ExactSearchOptions {
    fn clamped_limit(&self) -> usize {
        self.limit.clamp(1, 100)
    }
}

#[derive(Debug, Clone)]
pub struct ExactSearchResult {
    pub file_path: String,
    pub language: Option<String>,
    pub line_count: Option<u64>,
    pub score: f32,
    pub highlights: Vec<String>,
}

struct FileFields {
    path: Field,
    language: Field,
    content: Field,
    line_count: Field,
}

fn build_schema() -> (Schema, FileFields) {
    let mut builder = Schema::builder();
    let path = builder.add_text_field("path", STRING | STORED);
    let language = builder.add_text_field("language", STRING | STORED);
    let content = builder.add_text_field("content", TEXT | STORED);
    let line_count = builder.add_u64_field("line_count", STORED);
    let schema = builder.build();
    (schema, FileFields { path, language, content, line_count })
}

/// What a file's document is built from: every chunk id currently
/// contributing text, in stable order, so rebuilds are deterministic.
#[derive(Default)]
struct FileContributors {
    chunk_ids: BTreeSet<String>,
}

pub struct FullTextIndex {
    index: Index,
    writer: AsyncMutex<IndexWriter>,
    reader: IndexReader,
    fields: FileFields,
    /// file_path -> contributing chunk ids
    file_contributors: DashMap<String, RwLock<FileContributors>>,
    /// chunk id -> (file_path, text, language)
    chunk_info: DashMap<String, (String, String, Option<String>)>,
}

impl FullTextIndex {
    pub fn new() -> Result<Self> {
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);
        let writer = index
            .writer(50_000_000)
            .map_err(|e| SearchError::backend(format!("tantivy writer init failed: {e}")))?;
        let reader = index
            .reader()
            .map_err(|e| SearchError::backend(format!("tantivy reader init failed: {e}")))?;

        Ok(Self {
            index,
            writer: AsyncMutex::new(writer),
            reader,
            fields,
            file_contributors: DashMap::new(),
            chunk_info: DashMap::new(),
        })
    }

    fn file_text(&self, file_path: &str) -> (String, Option<String>, u64) {
        let contributors = self.file_contributors.get(file_path);
        let mut parts = Vec::new();
        let mut language = None;
        if let Some(entry) = contributors {
            for id in entry.read().chunk_ids.iter() {
                if let Some(info) = self.chunk_info.get(id) {
                    parts.push(info.1.clone());
                    if language.is_none() {
                        language = info.2.clone();
                    }
                }
            }
        }
        let content = parts.join("\n");
        let line_count = content.lines().count() as u64;
        (content, language, line_count)
    }

    async fn reindex_file(&self, file_path: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.delete_term(Term::from_field_text(self.fields.path, file_path));

        let has_contributors = self
            .file_contributors
            .get(file_path)
            .map(|e| !e.read().chunk_ids.is_empty())
            .unwrap_or(false);

        if has_contributors {
            let (content, language, line_count) = self.file_text(file_path);
            writer
                .add_document(doc!(
                    self.fields.path => file_path,
                    self.fields.language => language.unwrap_or_default(),
                    self.fields.content => content,
                    self.fields.line_count => line_count,
                ))
                .map_err(|e| SearchError::backend(format!("tantivy add_document failed: {e}")))?;
        }

        writer
            .commit()
            .map_err(|e| SearchError::backend(format!("tantivy commit failed: {e}")))?;
        drop(writer);
        self.reader
            .reload()
            .map_err(|e| SearchError::backend(format!("tantivy reload failed: {e}")))?;
        Ok(())
    }

    /// Maintains the per-file chunk-contributor tracking, then rebuilds and
    /// reindexes every file touched by this delta. See the module doc for
    /// why this backend is self-maintained rather than a no-op.
    pub async fn apply_delta(&self, delta: &Delta) -> Result<()> {
        let mut touched_files: HashMap<String, ()> = HashMap::new();

        for id in &delta.deleted_ids {
            if let Some((_, (file_path, _, _))) = self.chunk_info.remove(id) {
                if let Some(entry) = self.file_contributors.get(&file_path) {
                    entry.write().chunk_ids.remove(id);
                }
                touched_files.insert(file_path, ());
            }
        }

        for chunk in delta.updated.iter().chain(delta.added.iter()) {
            let Some(file_path) = chunk.file_path().map(str::to_string) else {
                continue;
            };
            if let Some((old_path, _, _)) = self.chunk_info.get(&chunk.id).map(|r| r.clone()) {
                if old_path != file_path {
                    if let Some(entry) = self.file_contributors.get(&old_path) {
                        entry.write().chunk_ids.remove(&chunk.id);
                    }
                    touched_files.insert(old_path, ());
                }
            }
            let language = chunk.metadata.get("language").cloned();
            self.chunk_info
                .insert(chunk.id.clone(), (file_path.clone(), chunk.text.clone(), language));
            self.file_contributors
                .entry(file_path.clone())
                .or_default()
                .write()
                .chunk_ids
                .insert(chunk.id.clone());
            touched_files.insert(file_path, ());
        }

        for file_path in touched_files.keys() {
            self.reindex_file(file_path).await?;
        }

        Ok(())
    }

    pub fn query(&self, query_string: &str, options: &ExactSearchOptions) -> Result<Vec<ExactSearchResult>> {
        if query_string.trim().is_empty() {
            return Err(SearchError::validation("query string must not be empty"));
        }
        let limit = options.clamped_limit();

        let query_parser = QueryParser::for_index(&self.index, vec![self.fields.content]);
        let content_query = query_parser
            .parse_query(query_string)
            .map_err(|e| SearchError::validation(format!("invalid query syntax: {e}")))?;

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, content_query)];

        if !options.language.is_empty() {
            let term = Term::from_field_text(self.fields.language, &options.language);
            clauses.push((
                Occur::Must,
                Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
            ));
        }

        if !options.file_path.is_empty() {
            let pattern = glob_to_regex(&options.file_path);
            let regex = RegexQuery::from_pattern(&pattern, self.fields.path)
                .map_err(|e| SearchError::validation(format!("invalid file_path pattern: {e}")))?;
            clauses.push((Occur::Must, Box::new(regex)));
        }

        let query: Box<dyn Query> = if clauses.len() == 1 {
            clauses.pop().unwrap().1
        } else {
            Box::new(BooleanQuery::new(clauses))
        };

        let searcher = self.reader.searcher();
        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .map_err(|e| SearchError::backend(format!("tantivy search failed: {e}")))?;

        let terms = extract_highlight_terms(query_string);

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let retrieved = searcher
                .doc::<tantivy::TantivyDocument>(address)
                .map_err(|e| SearchError::backend(format!("tantivy doc fetch failed: {e}")))?;

            let path = field_text(&retrieved, self.fields.path).unwrap_or_default();
            let language = field_text(&retrieved, self.fields.language).filter(|s| !s.is_empty());
            let content = field_text(&retrieved, self.fields.content).unwrap_or_default();
            let line_count = field_u64(&retrieved, self.fields.line_count);

            let highlights = extract_highlights(&content, &terms, MAX_HIGHLIGHTS_PER_FILE, DEFAULT_SNIPPET_WINDOW);

            results.push(ExactSearchResult {
                file_path: path,
                language,
                line_count,
                score,
                highlights,
            });
        }

        Ok(results)
    }
}

fn field_text(doc: &tantivy::TantivyDocument, field: Field) -> Option<String> {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn field_u64(doc: &tantivy::TantivyDocument, field: Field) -> Option<u64> {
    doc.get_first(field).and_then(|v| v.as_u64())
}

/// Translates the `%`-boundary glob into an anchored regex for `RegexQuery`.
fn glob_to_regex(pattern: &str) -> String {
    let mut regex = String::from("^");
    for part in pattern.split('%') {
        regex.push_str(&regex_escape(part));
        regex.push_str(".*");
    }
    // split() on a pattern with no leading/trailing '%' still joins with ".*"
    // between segments only; trim the trailing ".*" introduced by the last split.
    if !pattern.ends_with('%') && regex.ends_with(".*") {
        regex.truncate(regex.len() - 2);
    }
    regex.push('$');
    regex
}

fn regex_escape(s: &str) -> String {
    let mut out = String::new();
    for c in s.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Extracts phrase and word terms from the closed query grammar for
/// highlighting purposes: quoted spans become phrases, remaining
/// whitespace-separated tokens (minus boolean operators and trailing
/// wildcards) become words.
fn extract_highlight_terms(query: &str) -> (Vec<String>, Vec<String>) {
    let mut phrases = Vec::new();
    let mut rest = String::new();
    let mut in_quote = false;
    let mut current = String::new();

    for c in query.chars() {
        if c == '"' {
            if in_quote {
                phrases.push(current.trim().to_lowercase());
                current.clear();
            }
            in_quote = !in_quote;
        } else if in_quote {
            current.push(c);
        } else {
            rest.push(c);
        }
    }

    let words: Vec<String> = rest
        .split_whitespace()
        .filter(|t| !matches!(*t, "AND" | "OR" | "NOT"))
        .map(|t| t.trim_end_matches('*').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    (phrases, words)
}

struct Token<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

fn tokenize_with_offsets(content: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in content.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start {
                tokens.push(Token { text: &content[s..i], start: s, end: i });
                start = None;
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push(Token { text: &content[s..], start: s, end: content.len() });
    }
    tokens
}

fn extract_highlights(
    content: &str,
    terms: &(Vec<String>, Vec<String>),
    max_snippets: usize,
    window: usize,
) -> Vec<String> {
    let (phrases, words) = terms;
    let tokens = tokenize_with_offsets(content);
    let lower = content.to_lowercase();
    let mut used: Vec<(usize, usize)> = Vec::new();
    let mut snippets = Vec::new();

    for phrase in phrases {
        if snippets.len() >= max_snippets {
            break;
        }
        if phrase.is_empty() {
            continue;
        }
        if let Some(byte_idx) = lower.find(phrase.as_str()) {
            let phrase_end = byte_idx + phrase.len();
            let start_tok = tokens.iter().position(|t| t.end > byte_idx);
            let end_tok = tokens.iter().rposition(|t| t.start < phrase_end);
            if let (Some(s), Some(e)) = (start_tok, end_tok) {
                if used.iter().any(|&(us, ue)| s < ue && us < e + 1) {
                    continue;
                }
                used.push((s, e + 1));
                snippets.push(render_snippet(&tokens, s, e, window));
            }
        }
    }

    for word in words {
        if snippets.len() >= max_snippets {
            break;
        }
        if word.is_empty() {
            continue;
        }
        if let Some(idx) = tokens
            .iter()
            .position(|t| t.text.to_lowercase().trim_matches(|c: char| !c.is_alphanumeric()) == word.as_str())
        {
            if used.iter().any(|&(us, ue)| idx < ue && us < idx + 1) {
                continue;
            }
            used.push((idx, idx + 1));
            snippets.push(render_snippet(&tokens, idx, idx, window));
        }
    }

    snippets
}

fn render_snippet(tokens: &[Token], start_tok: usize, end_tok: usize, window: usize) -> String {
    let win_start = start_tok.saturating_sub(window);
    let win_end = (end_tok + window + 1).min(tokens.len());

    let mut parts = Vec::new();
    for (i, t) in tokens.iter().enumerate().take(win_end).skip(win_start) {
        if i == start_tok {
            parts.push("<mark>".to_string());
        }
        parts.push(t.text.to_string());
        if i == end_tok {
            parts.push("</mark>".to_string());
        }
    }
    parts.join(" ").replace("<mark> ", "<mark>").replace(" </mark>", "</mark>")
}
