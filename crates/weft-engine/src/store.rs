//! Template store with lazy bulk-loading.
//!
//! # Thread Safety
//!
//! The store is shared by every render on an engine:
//! - Lookups take a read lock and clone an `Arc<Template>`
//! - The bulk-load runs at most once, serialized by `load_lock` with a
//!   double-checked `loaded` flag
//! - `reload()` clears everything and loads again

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::definitions::{Definitions, parse_definitions};
use crate::directive::{AttrDirective, Directive, DirectiveRegistry};
use crate::error::{LoadError, RenderError};
use crate::markup::{Node, parse_fragment};
use crate::source::DefinitionSource;

/// Named, immutable markup fragment.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    content: Vec<Node>,
}

impl Template {
    /// Create a template from parsed nodes.
    #[must_use]
    pub fn new(name: impl Into<String>, content: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }

    /// Name the template is registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Top-level nodes.
    #[must_use]
    pub fn content(&self) -> &[Node] {
        &self.content
    }
}

/// Entry counts from loading one or more definitions documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Templates registered, including directive content templates.
    pub templates: usize,
    /// Element directives registered.
    pub directives: usize,
    /// Attribute directives registered.
    pub attr_directives: usize,
}

impl std::ops::AddAssign for LoadSummary {
    fn add_assign(&mut self, other: Self) {
        self.templates += other.templates;
        self.directives += other.directives;
        self.attr_directives += other.attr_directives;
    }
}

/// Name-keyed template registry backed by optional definition sources.
pub struct TemplateStore {
    templates: RwLock<HashMap<String, Arc<Template>>>,
    directives: DirectiveRegistry,
    sources: Vec<Arc<dyn DefinitionSource>>,
    /// Serializes bulk-loads.
    load_lock: Mutex<()>,
    /// Set once the sources have been loaded.
    loaded: AtomicBool,
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateStore {
    /// Create an empty store with no definition sources.
    #[must_use]
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
            directives: DirectiveRegistry::new(),
            sources: Vec::new(),
            load_lock: Mutex::new(()),
            loaded: AtomicBool::new(false),
        }
    }

    /// Add a definition source consulted by the lazy bulk-load.
    pub fn add_source(&mut self, source: Arc<dyn DefinitionSource>) {
        self.sources.push(source);
        self.loaded.store(false, Ordering::Release);
    }

    /// Register a template, replacing any previous one with the same name.
    pub fn register(&self, name: impl Into<String>, content: Vec<Node>) {
        let template = Template::new(name, content);
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(template.name.clone(), Arc::new(template));
    }

    /// Parse markup and register it as a template.
    pub fn register_markup(&self, name: impl Into<String>, src: &str) -> Result<(), LoadError> {
        let content = parse_fragment(src)?;
        self.register(name, content);
        Ok(())
    }

    /// Parse a definitions document and register every entry it declares.
    pub fn load_str(&self, src: &str) -> Result<LoadSummary, LoadError> {
        let defs = parse_definitions(src)?;
        Ok(self.apply(defs))
    }

    /// Look up a template, bulk-loading the sources on the first miss.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::NoSources`] when nothing has been registered and
    /// no source is configured, [`RenderError::TemplateNotFound`] when the
    /// name is still unknown after loading.
    pub fn lookup(&self, name: &str) -> Result<Arc<Template>, RenderError> {
        if let Some(template) = self.get(name) {
            return Ok(template);
        }

        if self.sources.is_empty() {
            if self.is_empty() {
                return Err(LoadError::NoSources.into());
            }
            return Err(RenderError::TemplateNotFound(name.to_owned()));
        }

        if self.ensure_loaded()? {
            if let Some(template) = self.get(name) {
                return Ok(template);
            }
        }
        Err(RenderError::TemplateNotFound(name.to_owned()))
    }

    /// Element directive for a tag, loading the sources first if needed.
    pub fn directive(&self, tag: &str) -> Result<Option<Arc<Directive>>, LoadError> {
        if let Some(directive) = self.directives.get(tag) {
            return Ok(Some(directive));
        }
        if self.ensure_loaded()? {
            return Ok(self.directives.get(tag));
        }
        Ok(None)
    }

    /// Attribute directive by name, loading the sources first if needed.
    pub fn attr_directive(&self, name: &str) -> Result<Option<Arc<AttrDirective>>, LoadError> {
        if let Some(directive) = self.directives.get_attr(name) {
            return Ok(Some(directive));
        }
        if self.ensure_loaded()? {
            return Ok(self.directives.get_attr(name));
        }
        Ok(None)
    }

    /// Directive registry fed by the definitions documents.
    #[must_use]
    pub fn directives(&self) -> &DirectiveRegistry {
        &self.directives
    }

    /// Drop every registration and load the sources again.
    pub fn reload(&self) -> Result<LoadSummary, LoadError> {
        let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.directives.clear();
        self.loaded.store(false, Ordering::Release);

        let summary = self.load_sources()?;
        self.loaded.store(true, Ordering::Release);
        Ok(summary)
    }

    /// Load the sources now unless already loaded.
    pub fn preload(&self) -> Result<LoadSummary, LoadError> {
        let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.loaded.load(Ordering::Acquire) {
            return Ok(LoadSummary::default());
        }
        let summary = self.load_sources()?;
        self.loaded.store(true, Ordering::Release);
        Ok(summary)
    }

    /// Registered template names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn get(&self, name: &str) -> Option<Arc<Template>> {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn is_empty(&self) -> bool {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Run the one-time bulk-load. Returns false when there are no sources.
    fn ensure_loaded(&self) -> Result<bool, LoadError> {
        if self.sources.is_empty() {
            return Ok(false);
        }
        if self.loaded.load(Ordering::Acquire) {
            return Ok(true);
        }
        self.preload()?;
        Ok(true)
    }

    fn load_sources(&self) -> Result<LoadSummary, LoadError> {
        let mut summary = LoadSummary::default();
        for source in &self.sources {
            let name = source.name();
            let defs = parse_definitions(&source.read()?)?;
            let loaded = self.apply(defs);
            tracing::debug!(
                source = %name,
                templates = loaded.templates,
                directives = loaded.directives,
                attr_directives = loaded.attr_directives,
                "Definitions loaded"
            );
            summary += loaded;
        }
        tracing::info!(
            sources = self.sources.len(),
            templates = summary.templates,
            directives = summary.directives,
            "Template store loaded"
        );
        Ok(summary)
    }

    fn apply(&self, defs: Definitions) -> LoadSummary {
        let summary = LoadSummary {
            templates: defs.templates.len(),
            directives: defs.directives.len(),
            attr_directives: defs.attr_directives.len(),
        };
        for (name, content) in defs.templates {
            self.register(name, content);
        }
        for directive in defs.directives {
            self.directives.register(directive);
        }
        for directive in defs.attr_directives {
            self.directives.register_attr(directive);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::source::StringSource;
    use pretty_assertions::assert_eq;

    struct CountingSource {
        reads: Arc<AtomicUsize>,
        content: &'static str,
    }

    impl DefinitionSource for CountingSource {
        fn name(&self) -> String {
            "counting".to_owned()
        }

        fn read(&self) -> Result<String, LoadError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.content.to_owned())
        }
    }

    const DEFS: &str = r#"<defs>
        <template name="a">A</template>
        <template name="b">B</template>
        <directive name="Chip"><content>chip</content></directive>
    </defs>"#;

    #[test]
    fn test_register_and_lookup() {
        let store = TemplateStore::new();
        store.register_markup("hello", "Hello").unwrap();
        let template = store.lookup("hello").unwrap();
        assert_eq!(template.name(), "hello");
        assert_eq!(template.content().len(), 1);
    }

    #[test]
    fn test_register_overwrites() {
        let store = TemplateStore::new();
        store.register_markup("t", "one").unwrap();
        store.register_markup("t", "<b>two</b>").unwrap();
        let template = store.lookup("t").unwrap();
        assert!(template.content()[0].as_element().is_some());
    }

    #[test]
    fn test_empty_store_without_sources_is_config_error() {
        let store = TemplateStore::new();
        let err = store.lookup("anything").unwrap_err();
        assert!(matches!(err, RenderError::Load(LoadError::NoSources)));
    }

    #[test]
    fn test_miss_with_registrations_is_not_found() {
        let store = TemplateStore::new();
        store.register_markup("known", "x").unwrap();
        let err = store.lookup("unknown").unwrap_err();
        assert!(matches!(err, RenderError::TemplateNotFound(ref n) if n == "unknown"));
    }

    #[test]
    fn test_lazy_load_runs_once() {
        let reads = Arc::new(AtomicUsize::new(0));
        let mut store = TemplateStore::new();
        store.add_source(Arc::new(CountingSource {
            reads: Arc::clone(&reads),
            content: DEFS,
        }));

        assert_eq!(reads.load(Ordering::SeqCst), 0);
        assert!(store.lookup("a").is_ok());
        assert!(store.lookup("b").is_ok());
        assert!(matches!(
            store.lookup("missing"),
            Err(RenderError::TemplateNotFound(_))
        ));
        assert!(store.directive("chip").unwrap().is_some());
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_programmatic_hit_does_not_load() {
        let reads = Arc::new(AtomicUsize::new(0));
        let mut store = TemplateStore::new();
        store.add_source(Arc::new(CountingSource {
            reads: Arc::clone(&reads),
            content: DEFS,
        }));
        store.register_markup("local", "x").unwrap();

        assert!(store.lookup("local").is_ok());
        assert_eq!(reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reload_clears_and_reloads() {
        let mut store = TemplateStore::new();
        store.add_source(Arc::new(StringSource::new("defs", DEFS)));
        store.register_markup("local", "x").unwrap();

        let summary = store.reload().unwrap();
        assert_eq!(
            summary,
            LoadSummary {
                templates: 3,
                directives: 1,
                attr_directives: 0,
            }
        );
        assert_eq!(store.names(), vec!["a", "b", "chip"]);
    }

    #[test]
    fn test_sources_load_in_order() {
        let mut store = TemplateStore::new();
        store.add_source(Arc::new(StringSource::new(
            "first",
            r#"<d><template name="t">first</template></d>"#,
        )));
        store.add_source(Arc::new(StringSource::new(
            "second",
            r#"<d><template name="t">second</template></d>"#,
        )));

        let template = store.lookup("t").unwrap();
        assert!(matches!(&template.content()[0], Node::Text(t) if t.content == "second"));
    }

    #[test]
    fn test_failed_source_surfaces_error() {
        let mut store = TemplateStore::new();
        store.add_source(Arc::new(StringSource::new("bad", "<d><template>")));
        assert!(matches!(store.lookup("x"), Err(RenderError::Load(_))));
    }

    #[test]
    fn test_directive_lookup_without_sources() {
        let store = TemplateStore::new();
        assert!(store.directive("div").unwrap().is_none());
    }
}
