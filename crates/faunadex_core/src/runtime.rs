use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use walkdir::WalkDir;

use crate::config::{DEFAULT_SCRAPE_DIR, load_config};

pub const STATE_DIR_NAME: &str = ".faunadex";
pub const INDEX_FILENAME: &str = "species_index.json";
pub const PAGES_DIRNAME: &str = "pages";
pub const EXTRACTED_FILENAME: &str = "extracted.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Flag,
    Env,
    Config,
    Heuristic,
    Default,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::Config => "config",
            Self::Heuristic => "heuristic",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub project_root: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub archive: Option<PathBuf>,
    pub scrape_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub cwd: PathBuf,
    pub executable_dir: Option<PathBuf>,
}

impl ResolutionContext {
    pub fn from_process() -> Result<Self> {
        let cwd = env::current_dir().context("failed to read current directory")?;
        let executable_dir = env::current_exe()
            .ok()
            .and_then(|path| path.parent().map(Path::to_path_buf));
        Ok(Self {
            cwd,
            executable_dir,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub project_root: PathBuf,
    pub state_dir: PathBuf,
    pub config_path: PathBuf,
    /// `None` when no flag, env var, or config entry names an archive.
    pub archive_path: Option<PathBuf>,
    pub scrape_dir: PathBuf,
    pub index_path: PathBuf,
    pub pages_dir: PathBuf,
    pub extracted_path: PathBuf,
    pub root_source: ValueSource,
    pub config_source: ValueSource,
    pub archive_source: ValueSource,
    pub scrape_source: ValueSource,
}

#[derive(Debug, Clone)]
pub struct RuntimeStatus {
    pub project_root_exists: bool,
    pub state_dir_exists: bool,
    pub config_exists: bool,
    pub archive_exists: bool,
    pub scrape_dir_exists: bool,
    pub index_exists: bool,
    pub index_size_bytes: Option<u64>,
    pub cached_pages: usize,
    pub extracted_exists: bool,
    pub warnings: Vec<String>,
}

impl ResolvedPaths {
    pub fn diagnostics(&self) -> String {
        let archive = self
            .archive_path
            .as_deref()
            .map(normalize_for_display)
            .unwrap_or_else(|| "<unset>".to_string());
        format!(
            "project_root={} ({})\nstate_dir={}\nconfig_path={} ({})\narchive_path={} ({})\nscrape_dir={} ({})\nindex_path={}\npages_dir={}\nextracted_path={}",
            normalize_for_display(&self.project_root),
            self.root_source.as_str(),
            normalize_for_display(&self.state_dir),
            normalize_for_display(&self.config_path),
            self.config_source.as_str(),
            archive,
            self.archive_source.as_str(),
            normalize_for_display(&self.scrape_dir),
            self.scrape_source.as_str(),
            normalize_for_display(&self.index_path),
            normalize_for_display(&self.pages_dir),
            normalize_for_display(&self.extracted_path),
        )
    }

    pub fn require_archive(&self) -> Result<&Path> {
        match self.archive_path.as_deref() {
            Some(path) => Ok(path),
            None => bail!(
                "no archive configured\nPass --archive <path>, set FAUNADEX_ARCHIVE, or set [archive] path in {}",
                normalize_for_display(&self.config_path)
            ),
        }
    }
}

pub fn inspect_runtime(paths: &ResolvedPaths) -> Result<RuntimeStatus> {
    let project_root_exists = paths.project_root.exists();
    let state_dir_exists = paths.state_dir.exists();
    let config_exists = paths.config_path.exists();
    let archive_exists = paths.archive_path.as_deref().is_some_and(Path::exists);
    let scrape_dir_exists = paths.scrape_dir.exists();
    let extracted_exists = paths.extracted_path.exists();
    let index_exists = paths.index_path.exists();
    let index_size_bytes = if index_exists {
        let metadata = fs::metadata(&paths.index_path)
            .with_context(|| format!("failed to inspect {}", paths.index_path.display()))?;
        Some(metadata.len())
    } else {
        None
    };
    let cached_pages = count_cached_pages(&paths.pages_dir)?;

    let mut warnings = Vec::new();
    match paths.archive_path.as_deref() {
        None => warnings.push(
            "no archive configured; `index build` and `pages` need --archive or FAUNADEX_ARCHIVE"
                .to_string(),
        ),
        Some(path) if !archive_exists => warnings.push(format!(
            "archive {} does not exist",
            normalize_for_display(path)
        )),
        Some(_) => {}
    }
    if !state_dir_exists {
        warnings.push(".faunadex/ is missing; run `faunadex init` to materialize config".to_string());
    }
    if !index_exists {
        warnings.push(format!(
            "{INDEX_FILENAME} is missing; run `faunadex index build`"
        ));
    }

    Ok(RuntimeStatus {
        project_root_exists,
        state_dir_exists,
        config_exists,
        archive_exists,
        scrape_dir_exists,
        index_exists,
        index_size_bytes,
        cached_pages,
        extracted_exists,
        warnings,
    })
}

fn count_cached_pages(pages_dir: &Path) -> Result<usize> {
    if !pages_dir.is_dir() {
        return Ok(0);
    }
    let mut count = 0usize;
    for entry in WalkDir::new(pages_dir).max_depth(1).follow_links(false) {
        let entry = entry.with_context(|| format!("failed to walk {}", pages_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|ext| ext.to_str()) == Some("html") {
            count += 1;
        }
    }
    Ok(count)
}

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct InitReport {
    pub created_dirs: Vec<PathBuf>,
    pub wrote_config: bool,
}

pub fn resolve_paths(
    context: &ResolutionContext,
    overrides: &PathOverrides,
) -> Result<ResolvedPaths> {
    resolve_paths_with_lookup(context, overrides, |key| env::var(key).ok())
}

fn resolve_paths_with_lookup<F>(
    context: &ResolutionContext,
    overrides: &PathOverrides,
    lookup_env: F,
) -> Result<ResolvedPaths>
where
    F: Fn(&str) -> Option<String>,
{
    let (project_root, root_source) = resolve_project_root(context, overrides, &lookup_env)
        .context("failed to resolve project root")?;
    let state_dir = project_root.join(STATE_DIR_NAME);

    let (config_path, config_source) = if let Some(path) = overrides.config.as_deref() {
        (
            absolutize_from_project(path, &project_root),
            ValueSource::Flag,
        )
    } else if let Some(value) = env_value(&lookup_env, "FAUNADEX_CONFIG") {
        (
            absolutize_from_project(Path::new(&value), &project_root),
            ValueSource::Env,
        )
    } else {
        (state_dir.join("config.toml"), ValueSource::Default)
    };
    let config = load_config(&config_path)?;

    let (archive_path, archive_source) = if let Some(path) = overrides.archive.as_deref() {
        (
            Some(absolutize_from_project(path, &project_root)),
            ValueSource::Flag,
        )
    } else if let Some(value) = env_value(&lookup_env, "FAUNADEX_ARCHIVE") {
        (
            Some(absolutize_from_project(Path::new(&value), &project_root)),
            ValueSource::Env,
        )
    } else if let Some(value) = config.archive_path() {
        (
            Some(absolutize_from_project(Path::new(value), &project_root)),
            ValueSource::Config,
        )
    } else {
        (None, ValueSource::Default)
    };

    let (scrape_dir, scrape_source) = if let Some(path) = overrides.scrape_dir.as_deref() {
        (
            absolutize_from_project(path, &project_root),
            ValueSource::Flag,
        )
    } else if let Some(value) = env_value(&lookup_env, "FAUNADEX_SCRAPE_DIR") {
        (
            absolutize_from_project(Path::new(&value), &project_root),
            ValueSource::Env,
        )
    } else if let Some(value) = config.scrape_dir() {
        (
            absolutize_from_project(Path::new(value), &project_root),
            ValueSource::Config,
        )
    } else {
        (project_root.join(DEFAULT_SCRAPE_DIR), ValueSource::Default)
    };

    Ok(ResolvedPaths {
        index_path: scrape_dir.join(INDEX_FILENAME),
        pages_dir: scrape_dir.join(PAGES_DIRNAME),
        extracted_path: scrape_dir.join(EXTRACTED_FILENAME),
        project_root,
        state_dir,
        config_path,
        archive_path,
        scrape_dir,
        root_source,
        config_source,
        archive_source,
        scrape_source,
    })
}

fn env_value<F>(lookup_env: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup_env(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn init_layout(paths: &ResolvedPaths, options: &InitOptions) -> Result<InitReport> {
    let mut created_dirs = Vec::new();

    let required_dirs = [
        paths.state_dir.clone(),
        paths.scrape_dir.clone(),
        paths.pages_dir.clone(),
    ];
    for dir in &required_dirs {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            created_dirs.push(dir.clone());
        }
    }

    let wrote_config = write_text_file(
        &paths.config_path,
        &render_materialized_config(paths),
        options.force,
    )?;

    Ok(InitReport {
        created_dirs,
        wrote_config,
    })
}

pub fn render_materialized_config(paths: &ResolvedPaths) -> String {
    let archive_line = match paths.archive_path.as_deref() {
        Some(path) => format!("path = \"{}\"", normalize_for_display(path)),
        None => "# path = \"wikipedia_en_all_maxi\"".to_string(),
    };
    let scrape_dir = normalize_for_display(&paths.scrape_dir);
    format!(
        "# faunadex configuration (materialized by `faunadex init`)\n\n[archive]\n# A .zim file (needs the `zim` feature), an exploded dump directory, or a .zip of one.\n{archive_line}\n\n[output]\nscrape_dir = \"{scrape_dir}\"\n",
    )
}

fn resolve_project_root<F>(
    context: &ResolutionContext,
    overrides: &PathOverrides,
    lookup_env: &F,
) -> Result<(PathBuf, ValueSource)>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = overrides.project_root.as_deref() {
        return Ok((absolutize(path, &context.cwd), ValueSource::Flag));
    }

    if let Some(value) = env_value(lookup_env, "FAUNADEX_PROJECT_ROOT") {
        return Ok((
            absolutize(Path::new(&value), &context.cwd),
            ValueSource::Env,
        ));
    }

    let root = detect_project_root_heuristic(&context.cwd, context.executable_dir.as_deref());
    Ok((root, ValueSource::Heuristic))
}

fn detect_project_root_heuristic(cwd: &Path, executable_dir: Option<&Path>) -> PathBuf {
    let mut seen = HashSet::new();
    for candidate in candidate_roots(cwd, executable_dir) {
        let key = normalize_for_display(&candidate);
        if !seen.insert(key) {
            continue;
        }
        if candidate.join(STATE_DIR_NAME).is_dir() {
            return candidate;
        }
    }
    cwd.to_path_buf()
}

fn candidate_roots(cwd: &Path, executable_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut out = cwd.ancestors().map(Path::to_path_buf).collect::<Vec<_>>();
    if let Some(exe_dir) = executable_dir {
        out.extend(exe_dir.ancestors().map(Path::to_path_buf));
    }
    out
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn absolutize_from_project(path: &Path, project_root: &Path) -> PathBuf {
    absolutize(path, project_root)
}

fn write_text_file(path: &Path, content: &str, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }

    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create parent directory {}", parent.display()))?;
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

pub fn normalize_for_display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
