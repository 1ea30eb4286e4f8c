//! Named Markdown prompt templates with `{{placeholder}}` substitution.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use regex::Regex;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}").unwrap());

const TEMPLATE_EXT: &str = "md";

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("prompt template '{name}' not found in '{}'", dir.display())]
    TemplateNotFound { name: String, dir: PathBuf },

    #[error("missing value for template parameter '{0}'")]
    MissingParameter(String),

    #[error("failed to read prompt template '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// The closed set of names a template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    Context,
    Query,
}

impl Placeholder {
    pub const ALL: [Self; 2] = [Self::Context, Self::Query];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Context => "context",
            Self::Query => "query",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PromptParams {
    pub context: Option<String>,
    pub query: Option<String>,
}

impl PromptParams {
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    #[must_use]
    pub fn get(&self, placeholder: Placeholder) -> Option<&str> {
        match placeholder {
            Placeholder::Context => self.context.as_deref(),
            Placeholder::Query => self.query.as_deref(),
        }
    }
}

/// Replace every `{{name}}` in `template` in a single pass. Substituted
/// values are not rescanned.
///
/// # Errors
///
/// Returns [`PromptError::MissingParameter`] for the first placeholder that
/// has no value, including names outside [`Placeholder`].
pub fn substitute(template: &str, params: &PromptParams) -> Result<String, PromptError> {
    let mut used = BTreeSet::new();
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = Placeholder::from_name(name.as_str())
            .and_then(|p| {
                used.insert(p.name());
                params.get(p)
            })
            .ok_or_else(|| PromptError::MissingParameter(name.as_str().to_owned()))?;

        out.push_str(&template[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }
    out.push_str(&template[last..]);

    for placeholder in Placeholder::ALL {
        if params.get(placeholder).is_some() && !used.contains(placeholder.name()) {
            tracing::warn!(
                parameter = placeholder.name(),
                "prompt parameter supplied but not used by template"
            );
        }
    }

    Ok(out)
}

/// Loads templates from `<dir>/<name>.md` and caches them per name.
pub struct PromptBank {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<str>>>,
}

impl std::fmt::Debug for PromptBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptBank")
            .field("dir", &self.dir)
            .field("cached", &self.cached_count())
            .finish()
    }
}

impl PromptBank {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Template text, read from disk on first use.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::TemplateNotFound`] if no such template exists.
    pub fn load(&self, name: &str) -> Result<Arc<str>, PromptError> {
        if let Some(hit) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(Arc::clone(hit));
        }

        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(self.not_found(name));
        }

        let path = self.dir.join(format!("{name}.{TEMPLATE_EXT}"));
        let text: Arc<str> = match std::fs::read_to_string(&path) {
            Ok(text) => text.into(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(self.not_found(name));
            }
            Err(source) => {
                return Err(PromptError::Io {
                    name: name.to_owned(),
                    source,
                });
            }
        };

        tracing::debug!(name, path = %path.display(), "prompt template loaded");
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_owned(), Arc::clone(&text));
        Ok(text)
    }

    /// # Errors
    ///
    /// Returns an error if the template is missing or a placeholder has no value.
    pub fn render(&self, name: &str, params: &PromptParams) -> Result<String, PromptError> {
        let template = self.load(name)?;
        substitute(&template, params)
    }

    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Sorted names of the templates available in the prompt directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be read.
    pub fn list(&self) -> Result<Vec<String>, PromptError> {
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(PromptError::Io {
                    name: self.dir.display().to_string(),
                    source,
                });
            }
        };

        let mut names: Vec<String> = read_dir
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXT) {
                    return None;
                }
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_owned)
            })
            .collect();
        names.sort();
        Ok(names)
    }

    fn not_found(&self, name: &str) -> PromptError {
        PromptError::TemplateNotFound {
            name: name.to_owned(),
            dir: self.dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank_with(templates: &[(&str, &str)]) -> (tempfile::TempDir, PromptBank) {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in templates {
            std::fs::write(dir.path().join(format!("{name}.md")), body).unwrap();
        }
        let bank = PromptBank::new(dir.path());
        (dir, bank)
    }

    #[test]
    fn substitutes_all_occurrences() {
        let params = PromptParams::default()
            .with_context("module a;")
            .with_query("what is a?");
        let out = substitute("Q: {{query}}\nC: {{context}}\nAgain: {{query}}", &params).unwrap();
        assert_eq!(out, "Q: what is a?\nC: module a;\nAgain: what is a?");
    }

    #[test]
    fn values_are_not_rescanned() {
        let params = PromptParams::default()
            .with_context("{{query}}")
            .with_query("q");
        let out = substitute("{{context}} / {{query}}", &params).unwrap();
        assert_eq!(out, "{{query}} / q");
    }

    #[test]
    fn missing_value_is_an_error() {
        let params = PromptParams::default().with_query("q");
        let err = substitute("{{context}} {{query}}", &params).unwrap_err();
        assert!(matches!(err, PromptError::MissingParameter(ref n) if n == "context"));
    }

    #[test]
    fn unknown_placeholder_is_missing() {
        let params = PromptParams::default()
            .with_context("c")
            .with_query("q");
        let err = substitute("{{context}} {{language}}", &params).unwrap_err();
        assert!(matches!(err, PromptError::MissingParameter(ref n) if n == "language"));
    }

    #[test]
    fn unused_parameter_is_tolerated() {
        let params = PromptParams::default()
            .with_context("c")
            .with_query("q");
        assert_eq!(substitute("only {{query}}", &params).unwrap(), "only q");
    }

    #[test]
    fn non_placeholder_braces_pass_through() {
        let params = PromptParams::default();
        let text = "assign y = {a, b}; {{ spaced }} {x}";
        assert_eq!(substitute(text, &params).unwrap(), text);
    }

    #[test]
    fn placeholder_names_round_trip() {
        for p in Placeholder::ALL {
            assert_eq!(Placeholder::from_name(p.name()), Some(p));
        }
        assert_eq!(Placeholder::from_name("Context"), None);
    }

    #[test]
    fn render_loads_and_caches() {
        let (dir, bank) = bank_with(&[("agent_main_user", "Context:\n{{context}}\n\nQ: {{query}}")]);
        let params = PromptParams::default()
            .with_context("ctx")
            .with_query("why?");
        assert_eq!(
            bank.render("agent_main_user", &params).unwrap(),
            "Context:\nctx\n\nQ: why?"
        );
        assert_eq!(bank.cached_count(), 1);

        std::fs::write(dir.path().join("agent_main_user.md"), "changed {{query}}").unwrap();
        assert_eq!(
            bank.render("agent_main_user", &params).unwrap(),
            "Context:\nctx\n\nQ: why?"
        );

        bank.clear_cache();
        assert_eq!(bank.cached_count(), 0);
        assert_eq!(bank.render("agent_main_user", &params).unwrap(), "changed why?");
    }

    #[test]
    fn missing_template_is_not_found() {
        let (_dir, bank) = bank_with(&[]);
        let err = bank.load("agent_main_system").unwrap_err();
        assert!(matches!(err, PromptError::TemplateNotFound { ref name, .. } if name == "agent_main_system"));
    }

    #[test]
    fn path_like_names_are_rejected() {
        let (_dir, bank) = bank_with(&[("ok", "fine")]);
        assert!(matches!(
            bank.load("../ok"),
            Err(PromptError::TemplateNotFound { .. })
        ));
        assert!(matches!(
            bank.load(""),
            Err(PromptError::TemplateNotFound { .. })
        ));
    }

    #[test]
    fn list_returns_sorted_template_names() {
        let (dir, bank) = bank_with(&[("b_prompt", "b"), ("a_prompt", "a")]);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        assert_eq!(bank.list().unwrap(), ["a_prompt", "b_prompt"]);
    }

    #[test]
    fn list_of_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let bank = PromptBank::new(dir.path().join("absent"));
        assert!(bank.list().unwrap().is_empty());
    }
}
