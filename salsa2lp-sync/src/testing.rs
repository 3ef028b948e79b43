//! In-memory fakes for every collaborator trait, plus fixture builders.
//!
//! Enabled with the `test-support` feature. Not covered by semver.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use salsa2lp_core::config::{Committer, SyncConfig};
use salsa2lp_core::tool::{Invocation, ToolOutput, ToolRunner};
use salsa2lp_core::types::{PackageName, PackageRef};
use salsa2lp_core::ToolError;

use crate::download::ArtifactDownloader;
use crate::error::{DownloadError, MergeError, VcsError};
use crate::extract::CompressionKind;
use crate::hosting::{
    AccessToken, HostingApi, HostingError, NewRecipe, RemoteRecipe, RemoteRepository, TokenScope,
};
use crate::error::merge_io;
use crate::merge::VCS_DIR;
use crate::pipeline::{Collaborators, SyncEngine};
use crate::source::{Checkout, PackagingSource};
use crate::vcs::Vcs;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Files as `(relative path, contents)` pairs.
pub type Files = Vec<(String, Vec<u8>)>;

fn write_files(root: &Path, files: &[(String, Vec<u8>)]) -> std::io::Result<()> {
    for (rel, content) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
    }
    Ok(())
}

fn read_files(root: &Path) -> Result<BTreeMap<String, Vec<u8>>, VcsError> {
    let mut out = BTreeMap::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.depth() == 1 && e.file_name() == VCS_DIR));
    for entry in walker {
        let entry = entry.map_err(|e| VcsError::Failed {
            operation: "read tree",
            diagnostic: e.to_string(),
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .into_owned();
        let bytes = fs::read(entry.path()).map_err(|source| VcsError::Io {
            path: entry.path().to_path_buf(),
            source,
        })?;
        out.insert(rel, bytes);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Minimal packaging metadata: `debian/{rules,control,changelog}`.
pub fn packaging_files(name: &str, version: &str, distribution: &str) -> Files {
    vec![
        (
            "debian/rules".to_string(),
            b"#!/usr/bin/make -f\n%:\n\tdh $@\n".to_vec(),
        ),
        (
            "debian/control".to_string(),
            format!("Source: {name}\nMaintainer: Test <test@example.org>\n").into_bytes(),
        ),
        (
            "debian/changelog".to_string(),
            format!(
                "{name} ({version}) {distribution}; urgency=medium\n\n  * Test entry.\n\n -- Test <test@example.org>  Mon, 01 Jan 2024 00:00:00 +0000\n"
            )
            .into_bytes(),
        ),
        (
            "debian/watch".to_string(),
            b"version=4\n".to_vec(),
        ),
    ]
}

/// A compressed tarball holding `entries` (paths as given, no prefixing).
pub fn tar_archive(kind: CompressionKind, entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_entry_type(tar::EntryType::Regular);
        builder
            .append_data(&mut header, path, *content)
            .expect("append tar entry");
    }
    let raw = builder.into_inner().expect("finish tar");
    compress(kind, &raw)
}

/// One member of a hand-assembled tarball.
#[derive(Debug, Clone, Copy)]
pub enum TarMember<'a> {
    File(&'a str, &'a [u8]),
    Dir(&'a str),
    /// Symbolic link at `.0` pointing at `.1`.
    Symlink(&'a str, &'a str),
    /// Hard link at `.0` naming the earlier member `.1`.
    HardLink(&'a str, &'a str),
}

/// A compressed tarball holding `members` in order, links included.
pub fn tar_members(kind: CompressionKind, members: &[TarMember<'_>]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for member in members {
        let mut header = tar::Header::new_gnu();
        header.set_mtime(0);
        match *member {
            TarMember::File(path, content) => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_mode(0o644);
                header.set_size(content.len() as u64);
                builder
                    .append_data(&mut header, path, content)
                    .expect("append file");
            }
            TarMember::Dir(path) => {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                builder
                    .append_data(&mut header, path, std::io::empty())
                    .expect("append dir");
            }
            TarMember::Symlink(path, target) | TarMember::HardLink(path, target) => {
                let entry_type = if matches!(member, TarMember::Symlink(..)) {
                    tar::EntryType::Symlink
                } else {
                    tar::EntryType::Link
                };
                header.set_entry_type(entry_type);
                header.set_mode(0o777);
                header.set_size(0);
                header.set_link_name(target).expect("link name");
                builder
                    .append_data(&mut header, path, std::io::empty())
                    .expect("append link");
            }
        }
    }
    let raw = builder.into_inner().expect("finish tar");
    compress(kind, &raw)
}

/// Compress `raw` with `kind`.
pub fn compress(kind: CompressionKind, raw: &[u8]) -> Vec<u8> {
    match kind {
        CompressionKind::Xz => {
            let mut enc = xz2::write::XzEncoder::new(Vec::new(), 6);
            enc.write_all(raw).expect("xz write");
            enc.finish().expect("xz finish")
        }
        CompressionKind::Bzip2 => {
            let mut enc = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
            enc.write_all(raw).expect("bz2 write");
            enc.finish().expect("bz2 finish")
        }
        CompressionKind::Gzip => {
            let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            enc.write_all(raw).expect("gz write");
            enc.finish().expect("gz finish")
        }
    }
}

// ---------------------------------------------------------------------------
// FakeToolRunner
// ---------------------------------------------------------------------------

/// Answers by program name; unscripted programs exit 127.
#[derive(Debug, Default)]
pub struct FakeToolRunner {
    replies: Mutex<HashMap<String, ToolOutput>>,
    calls: Mutex<Vec<Invocation>>,
}

impl FakeToolRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, program: &str, output: ToolOutput) -> Self {
        self.set(program, output);
        self
    }

    pub fn set(&self, program: &str, output: ToolOutput) {
        lock(&self.replies).insert(program.to_string(), output);
    }

    /// Scripts `dpkg-source --print-format` to report `format`.
    pub fn with_format(self, format: &str) -> Self {
        self.with("dpkg-source", ToolOutput::ok(format!("{format}\n")))
    }

    pub fn calls(&self) -> Vec<Invocation> {
        lock(&self.calls).clone()
    }
}

impl ToolRunner for FakeToolRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
        lock(&self.calls).push(invocation.clone());
        Ok(lock(&self.replies)
            .get(&invocation.program)
            .cloned()
            .unwrap_or_else(|| ToolOutput::failed(127, format!("{}: not scripted", invocation.program))))
    }
}

// ---------------------------------------------------------------------------
// FakeSource
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct SourcePackage {
    files: Files,
    commit: String,
}

/// Packaging sources served from memory.
#[derive(Debug, Default)]
pub struct FakeSource {
    packages: Mutex<HashMap<PackageName, SourcePackage>>,
    checkouts: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `files` at `commit` for `name`; replaces earlier content.
    pub fn set(&self, name: &str, files: Files, commit: &str) {
        lock(&self.packages).insert(
            PackageName::from(name),
            SourcePackage {
                files,
                commit: commit.to_string(),
            },
        );
    }

    pub fn remove_file(&self, name: &str, rel: &str) {
        if let Some(pkg) = lock(&self.packages).get_mut(&PackageName::from(name)) {
            pkg.files.retain(|(path, _)| path != rel);
        }
    }

    pub fn checkouts(&self) -> usize {
        self.checkouts.load(Ordering::SeqCst)
    }
}

impl PackagingSource for FakeSource {
    fn url(&self, package: &PackageRef) -> String {
        format!("fake://{}/{}", package.source_group, package.name)
    }

    fn checkout(&self, package: &PackageRef, dest: &Path) -> Result<Checkout, VcsError> {
        self.checkouts.fetch_add(1, Ordering::SeqCst);
        let pkg = lock(&self.packages)
            .get(&package.name)
            .cloned()
            .ok_or_else(|| VcsError::Failed {
                operation: "clone",
                diagnostic: format!("repository {} not found", package.name),
            })?;
        write_files(dest, &pkg.files).map_err(|source| VcsError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        fs::create_dir_all(dest.join(VCS_DIR)).map_err(|source| VcsError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        Ok(Checkout {
            url: self.url(package),
            commit: pkg.commit,
        })
    }
}

// ---------------------------------------------------------------------------
// FakeDownloader
// ---------------------------------------------------------------------------

/// Drops prepared archives into the download directory.
#[derive(Debug, Default)]
pub struct FakeDownloader {
    archives: Mutex<Vec<(String, Vec<u8>)>>,
    failure: Mutex<Option<String>>,
    fetches: AtomicUsize,
}

impl FakeDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_archive(&self, file_name: &str, bytes: Vec<u8>) {
        lock(&self.archives).push((file_name.to_string(), bytes));
    }

    pub fn clear(&self) {
        lock(&self.archives).clear();
    }

    /// Every subsequent fetch fails with `stderr`.
    pub fn fail_with(&self, stderr: &str) {
        *lock(&self.failure) = Some(stderr.to_string());
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ArtifactDownloader for FakeDownloader {
    fn fetch(&self, _tree: &Path, dest: &Path) -> Result<(), DownloadError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(stderr) = lock(&self.failure).clone() {
            return Err(DownloadError::Failed {
                diagnostic: ToolOutput::failed(1, stderr).diagnostic(),
            });
        }
        for (name, bytes) in lock(&self.archives).iter() {
            let path = dest.join(name);
            fs::write(&path, bytes).map_err(|source| DownloadError::Io { path, source })?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeHosting
// ---------------------------------------------------------------------------

/// Write-call counters of [`FakeHosting`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HostingWrites {
    pub repositories_created: usize,
    pub tokens_issued: usize,
    pub recipes_created: usize,
    pub recipes_updated: usize,
}

impl HostingWrites {
    pub fn recipe_writes(&self) -> usize {
        self.recipes_created + self.recipes_updated
    }
}

#[derive(Debug, Default)]
struct HostingState {
    repositories: BTreeMap<String, RemoteRepository>,
    recipes: BTreeMap<String, RemoteRecipe>,
    created_recipes: Vec<NewRecipe>,
    writes: HostingWrites,
    token_lifetime: Option<Duration>,
}

/// Hosting API backed by maps.
#[derive(Debug, Default)]
pub struct FakeHosting {
    state: Mutex<HostingState>,
}

impl FakeHosting {
    pub const IDENTITY: &'static str = "sync-bot";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_repository(&self, path: &str) {
        lock(&self.state).repositories.insert(
            path.to_string(),
            RemoteRepository {
                path: path.to_string(),
                resource: format!("fake:{path}"),
            },
        );
    }

    pub fn has_repository(&self, path: &str) -> bool {
        lock(&self.state).repositories.contains_key(path)
    }

    pub fn add_recipe(&self, name: &str, text: &str) {
        lock(&self.state).recipes.insert(
            name.to_string(),
            RemoteRecipe {
                name: name.to_string(),
                text: text.to_string(),
                resource: format!("fake:+recipe/{name}"),
            },
        );
    }

    pub fn recipe_text(&self, name: &str) -> Option<String> {
        lock(&self.state).recipes.get(name).map(|r| r.text.clone())
    }

    pub fn created_recipes(&self) -> Vec<NewRecipe> {
        lock(&self.state).created_recipes.clone()
    }

    /// Issue tokens that expire `lifetime` after issuance, ignoring the
    /// requested expiry. A negative lifetime yields already-expired tokens.
    pub fn set_token_lifetime(&self, lifetime: Duration) {
        lock(&self.state).token_lifetime = Some(lifetime);
    }

    pub fn writes(&self) -> HostingWrites {
        lock(&self.state).writes
    }
}

impl HostingApi for FakeHosting {
    fn find_repository(&self, path: &str) -> Result<Option<RemoteRepository>, HostingError> {
        Ok(lock(&self.state).repositories.get(path).cloned())
    }

    fn create_repository(
        &self,
        team: &str,
        name: &PackageName,
    ) -> Result<RemoteRepository, HostingError> {
        let path = format!("~{team}/+git/{name}");
        let mut state = lock(&self.state);
        let repository = RemoteRepository {
            path: path.clone(),
            resource: format!("fake:{path}"),
        };
        state.repositories.insert(path, repository.clone());
        state.writes.repositories_created += 1;
        Ok(repository)
    }

    fn identity(&self) -> Result<String, HostingError> {
        Ok(Self::IDENTITY.to_string())
    }

    fn issue_access_token(
        &self,
        repository: &RemoteRepository,
        scopes: &[TokenScope],
        expires_at: DateTime<Utc>,
    ) -> Result<AccessToken, HostingError> {
        if scopes.is_empty() {
            return Err(HostingError::Decode {
                operation: "issueAccessToken",
                message: "no scopes requested".to_string(),
            });
        }
        let mut state = lock(&self.state);
        if !state.repositories.contains_key(&repository.path) {
            return Err(HostingError::NotFound {
                what: repository.path.clone(),
            });
        }
        state.writes.tokens_issued += 1;
        let expires_at = match state.token_lifetime {
            Some(lifetime) => Utc::now() + lifetime,
            None => expires_at,
        };
        Ok(AccessToken {
            secret: format!("token-{}", state.writes.tokens_issued),
            expires_at,
        })
    }

    fn find_recipe(
        &self,
        _team: &str,
        name: &PackageName,
    ) -> Result<Option<RemoteRecipe>, HostingError> {
        Ok(lock(&self.state).recipes.get(&name.0).cloned())
    }

    fn create_recipe(&self, recipe: &NewRecipe) -> Result<RemoteRecipe, HostingError> {
        let mut state = lock(&self.state);
        let remote = RemoteRecipe {
            name: recipe.name.clone(),
            text: recipe.text.clone(),
            resource: format!("fake:+recipe/{}", recipe.name),
        };
        state.recipes.insert(recipe.name.clone(), remote.clone());
        state.created_recipes.push(recipe.clone());
        state.writes.recipes_created += 1;
        Ok(remote)
    }

    fn update_recipe_text(&self, recipe: &RemoteRecipe, text: &str) -> Result<(), HostingError> {
        let mut state = lock(&self.state);
        let stored = state
            .recipes
            .get_mut(&recipe.name)
            .ok_or_else(|| HostingError::NotFound {
                what: recipe.resource.clone(),
            })?;
        stored.text = text.to_string();
        state.writes.recipes_updated += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeVcs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct RemoteSnapshot {
    files: BTreeMap<String, Vec<u8>>,
    head: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct LocalRepo {
    remotes: HashMap<String, String>,
    recorded_digest: Option<String>,
    head: Option<String>,
}

#[derive(Debug, Default)]
struct VcsState {
    remotes: HashMap<String, RemoteSnapshot>,
    locals: HashMap<PathBuf, LocalRepo>,
    commits: usize,
    pushes: usize,
    messages: Vec<String>,
    reject_pushes: bool,
}

/// SHA-256 over every file and symlink below `root` (excluding `.git/`),
/// in path order. Directories contribute nothing, as in git.
pub fn tree_digest(root: &Path) -> Result<String, MergeError> {
    let mut hasher = Sha256::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.depth() == 1 && e.file_name() == VCS_DIR));

    for entry in walker {
        let entry = entry?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        hasher.update(rel.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        if file_type.is_symlink() {
            let link = fs::read_link(entry.path()).map_err(|e| merge_io(entry.path(), e))?;
            hasher.update(b"link:");
            hasher.update(link.to_string_lossy().as_bytes());
        } else {
            let bytes = fs::read(entry.path()).map_err(|e| merge_io(entry.path(), e))?;
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(&bytes);
        }
        hasher.update([0u8]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Git simulated on the filesystem plus in-memory remotes.
///
/// Remotes are keyed by URL with any credentials stripped, so a fresh token
/// per attempt still reaches the same remote. Dirtiness compares
/// [`tree_digest`] against the digest recorded at the last checkout or commit.
#[derive(Debug, Default)]
pub struct FakeVcs {
    state: Mutex<VcsState>,
}

/// URL without its userinfo part.
pub fn remote_key(url: &str) -> String {
    match url.split_once('@') {
        Some((_, rest)) => rest.to_string(),
        None => url.to_string(),
    }
}

fn empty_digest() -> String {
    hex::encode(Sha256::digest(b""))
}

fn digest(repo: &Path) -> Result<String, VcsError> {
    tree_digest(repo).map_err(|e| VcsError::Failed {
        operation: "status",
        diagnostic: e.to_string(),
    })
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a remote (keyed like [`remote_key`]) with `files`.
    pub fn seed_remote(&self, key: &str, files: Files, head: &str) {
        lock(&self.state).remotes.insert(
            key.to_string(),
            RemoteSnapshot {
                files: files.into_iter().collect(),
                head: Some(head.to_string()),
            },
        );
    }

    pub fn remote_files(&self, key: &str) -> Option<BTreeMap<String, Vec<u8>>> {
        lock(&self.state).remotes.get(key).map(|r| r.files.clone())
    }

    pub fn reject_pushes(&self, reject: bool) {
        lock(&self.state).reject_pushes = reject;
    }

    pub fn commits(&self) -> usize {
        lock(&self.state).commits
    }

    pub fn pushes(&self) -> usize {
        lock(&self.state).pushes
    }

    pub fn messages(&self) -> Vec<String> {
        lock(&self.state).messages.clone()
    }

    fn not_a_repo(repo: &Path) -> VcsError {
        VcsError::Failed {
            operation: "open",
            diagnostic: format!("{} is not a repository", repo.display()),
        }
    }
}

impl Vcs for FakeVcs {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), VcsError> {
        let key = remote_key(url);
        let snapshot = lock(&self.state)
            .remotes
            .get(&key)
            .cloned()
            .ok_or_else(|| VcsError::Failed {
                operation: "clone",
                diagnostic: format!("repository {key} not found"),
            })?;
        let files: Files = snapshot.files.into_iter().collect();
        write_files(dest, &files).map_err(|source| VcsError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        fs::create_dir_all(dest.join(VCS_DIR)).map_err(|source| VcsError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        let local = LocalRepo {
            recorded_digest: Some(digest(dest)?),
            head: snapshot.head,
            ..LocalRepo::default()
        };
        lock(&self.state).locals.insert(dest.to_path_buf(), local);
        Ok(())
    }

    fn head_commit(&self, repo: &Path) -> Result<String, VcsError> {
        lock(&self.state)
            .locals
            .get(repo)
            .and_then(|l| l.head.clone())
            .ok_or_else(|| VcsError::Failed {
                operation: "rev-parse",
                diagnostic: "HEAD is unborn".to_string(),
            })
    }

    fn init(&self, repo: &Path, _branch: &str) -> Result<(), VcsError> {
        fs::create_dir_all(repo.join(VCS_DIR)).map_err(|source| VcsError::Io {
            path: repo.to_path_buf(),
            source,
        })?;
        lock(&self.state)
            .locals
            .insert(repo.to_path_buf(), LocalRepo::default());
        Ok(())
    }

    fn add_remote(&self, repo: &Path, name: &str, url: &str) -> Result<(), VcsError> {
        let mut state = lock(&self.state);
        let local = state
            .locals
            .get_mut(repo)
            .ok_or_else(|| Self::not_a_repo(repo))?;
        local.remotes.insert(name.to_string(), remote_key(url));
        Ok(())
    }

    fn fetch_and_checkout(&self, repo: &Path, remote: &str, _branch: &str) -> Result<(), VcsError> {
        let snapshot = {
            let state = lock(&self.state);
            let local = state.locals.get(repo).ok_or_else(|| Self::not_a_repo(repo))?;
            let key = local.remotes.get(remote).ok_or_else(|| VcsError::Failed {
                operation: "fetch",
                diagnostic: format!("no remote {remote}"),
            })?;
            state.remotes.get(key).cloned().unwrap_or_default()
        };
        let files: Files = snapshot.files.into_iter().collect();
        write_files(repo, &files).map_err(|source| VcsError::Io {
            path: repo.to_path_buf(),
            source,
        })?;
        let recorded = digest(repo)?;
        let mut state = lock(&self.state);
        if let Some(local) = state.locals.get_mut(repo) {
            local.recorded_digest = Some(recorded);
            local.head = snapshot.head;
        }
        Ok(())
    }

    fn is_dirty(&self, repo: &Path) -> Result<bool, VcsError> {
        let recorded = lock(&self.state)
            .locals
            .get(repo)
            .ok_or_else(|| Self::not_a_repo(repo))?
            .recorded_digest
            .clone()
            .unwrap_or_else(empty_digest);
        Ok(digest(repo)? != recorded)
    }

    fn commit_all(
        &self,
        repo: &Path,
        message: &str,
        _committer: &Committer,
    ) -> Result<String, VcsError> {
        let recorded = digest(repo)?;
        let mut state = lock(&self.state);
        state.commits += 1;
        let commit = format!("fakecommit{:04}", state.commits);
        state.messages.push(message.to_string());
        let local = state
            .locals
            .get_mut(repo)
            .ok_or_else(|| Self::not_a_repo(repo))?;
        local.recorded_digest = Some(recorded);
        local.head = Some(commit.clone());
        Ok(commit)
    }

    fn push(&self, repo: &Path, remote: &str, _branch: &str) -> Result<(), VcsError> {
        let files = read_files(repo)?;
        let mut state = lock(&self.state);
        if state.reject_pushes {
            return Err(VcsError::Rejected {
                diagnostic: "[rejected] main -> main (fetch first)".to_string(),
            });
        }
        let local = state.locals.get(repo).ok_or_else(|| Self::not_a_repo(repo))?;
        let key = local.remotes.get(remote).cloned().ok_or_else(|| VcsError::Failed {
            operation: "push",
            diagnostic: format!("no remote {remote}"),
        })?;
        let head = local.head.clone();
        state.remotes.insert(key, RemoteSnapshot { files, head });
        state.pushes += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// All fakes wired together with a config rooted in a temp directory.
pub struct Harness {
    pub config: SyncConfig,
    pub source: Arc<FakeSource>,
    pub downloader: Arc<FakeDownloader>,
    pub hosting: Arc<FakeHosting>,
    pub vcs: Arc<FakeVcs>,
    pub tools: Arc<FakeToolRunner>,
}

impl Harness {
    /// Defaults for `home`; `dpkg-source` reports `3.0 (quilt)`.
    pub fn new(home: &Path) -> Self {
        Self {
            config: SyncConfig::defaults_at(home),
            source: Arc::new(FakeSource::new()),
            downloader: Arc::new(FakeDownloader::new()),
            hosting: Arc::new(FakeHosting::new()),
            vcs: Arc::new(FakeVcs::new()),
            tools: Arc::new(FakeToolRunner::new().with_format("3.0 (quilt)")),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            source: self.source.clone(),
            downloader: self.downloader.clone(),
            hosting: self.hosting.clone(),
            vcs: self.vcs.clone(),
            tools: self.tools.clone(),
        }
    }

    pub fn engine(&self) -> SyncEngine {
        SyncEngine::new(self.config.clone(), self.collaborators()).expect("engine")
    }

    /// Remote key of the destination repository for `package`.
    pub fn destination_key(&self, package: &str) -> String {
        format!(
            "{}/{}",
            self.config.git_host,
            self.config.repository_path(&PackageName::from(package))
        )
    }

    /// Register an artifact-referencing package with an upstream tarball.
    pub fn add_quilt_package(&self, name: &str, version: &str, upstream: &[(&str, &[u8])]) {
        self.source
            .set(name, packaging_files(name, version, "unstable"), "c0ffee");
        let upstream_version = version.split('-').next().unwrap_or(version);
        let prefixed: Vec<(String, &[u8])> = upstream
            .iter()
            .map(|(path, content)| (format!("{name}-{upstream_version}/{path}"), *content))
            .collect();
        let entries: Vec<(&str, &[u8])> = prefixed.iter().map(|(p, c)| (p.as_str(), *c)).collect();
        self.downloader.add_archive(
            &format!("{name}_{upstream_version}.orig.tar.xz"),
            tar_archive(CompressionKind::Xz, &entries),
        );
    }
}
