//! Custom element and attribute directives.
//!
//! A directive is declared in a definitions document as
//!
//! ```xml
//! <directive name="UserCard" required-attr="user">
//!   <content><div class="card">${user.name}</div></content>
//!   <post-script>invoke('cardShown', user.id)</post-script>
//! </directive>
//! ```
//!
//! and is used in markup as `<user-card user="${current}"/>`. The element is
//! replaced by the rendered `<content>`, then the post-script runs against
//! the same context. Attribute directives (`<attr-directive>`) run a script
//! whenever their attribute appears on an element.
//!
//! Expansion itself lives on [`Engine`](crate::Engine); this module holds the
//! declarations and their registry.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use crate::context::RenderContext;
use crate::expr::Script;

/// Convert a declared `PascalCase` directive name to its markup tag name.
///
/// A `-` is inserted before every capital letter except the first and the
/// result is lowercased: `UserCard` becomes `user-card`.
#[must_use]
pub fn tag_name(name: &str) -> String {
    let mut tag = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                tag.push('-');
            }
            tag.extend(c.to_lowercase());
        } else {
            tag.push(c);
        }
    }
    tag
}

/// Custom element directive.
#[derive(Debug, Clone)]
pub struct Directive {
    /// Markup tag name; also the name of the content template.
    pub tag: String,
    /// Name as declared.
    pub name: String,
    /// Attributes that must be present on every use.
    pub required: Vec<String>,
    /// Script run after rendering, against the render context.
    pub post_script: Option<Script>,
}

impl Directive {
    /// Create a directive from its declared name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            tag: tag_name(&name),
            name,
            required: Vec::new(),
            post_script: None,
        }
    }

    /// Set the required attributes.
    #[must_use]
    pub fn with_required(mut self, required: Vec<String>) -> Self {
        self.required = required;
        self
    }

    /// Set the post-render script.
    #[must_use]
    pub fn with_post_script(mut self, script: Script) -> Self {
        self.post_script = Some(script);
        self
    }
}

/// Custom attribute directive.
#[derive(Debug, Clone)]
pub struct AttrDirective {
    /// Attribute name that triggers the directive.
    pub name: String,
    /// Script run with `element` and `value` bound.
    pub script: Script,
}

/// Result of expanding a custom element directive.
#[derive(Debug)]
pub struct DirectiveOutput {
    /// Rendered markup that replaces the element.
    pub html: String,
    /// Value of the post-script (`null` without one).
    pub post_result: Value,
    /// Context after rendering and the post-script.
    pub context: RenderContext,
}

/// Registered element and attribute directives.
#[derive(Debug, Default)]
pub struct DirectiveRegistry {
    elements: RwLock<HashMap<String, Arc<Directive>>>,
    attributes: RwLock<HashMap<String, Arc<AttrDirective>>>,
}

impl DirectiveRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an element directive under its tag name, replacing any previous one.
    pub fn register(&self, directive: Directive) {
        let mut elements = self.elements.write().unwrap_or_else(PoisonError::into_inner);
        if elements.contains_key(&directive.tag) {
            tracing::warn!(tag = %directive.tag, "Directive redefined");
        }
        elements.insert(directive.tag.clone(), Arc::new(directive));
    }

    /// Register an attribute directive, replacing any previous one.
    pub fn register_attr(&self, directive: AttrDirective) {
        let mut attributes = self
            .attributes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if attributes.contains_key(&directive.name) {
            tracing::warn!(name = %directive.name, "Attribute directive redefined");
        }
        attributes.insert(directive.name.clone(), Arc::new(directive));
    }

    /// Element directive for a tag.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<Arc<Directive>> {
        self.elements
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tag)
            .cloned()
    }

    /// Attribute directive by attribute name.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<Arc<AttrDirective>> {
        self.attributes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// True when at least one attribute directive is registered.
    #[must_use]
    pub fn has_attr_directives(&self) -> bool {
        !self
            .attributes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Registered element directive tags, sorted.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .elements
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        tags.sort();
        tags
    }

    /// Registered attribute directive names, sorted.
    #[must_use]
    pub fn attr_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .attributes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Remove every directive.
    pub fn clear(&self) {
        self.elements
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.attributes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tag_name() {
        assert_eq!(tag_name("UserCard"), "user-card");
        assert_eq!(tag_name("Tabs"), "tabs");
        assert_eq!(tag_name("DatePickerField"), "date-picker-field");
        assert_eq!(tag_name("already-kebab"), "already-kebab");
        assert_eq!(tag_name("OTPInput"), "o-t-p-input");
    }

    #[test]
    fn test_directive_builder() {
        let directive = Directive::new("UserCard").with_required(vec!["user".to_owned()]);
        assert_eq!(directive.tag, "user-card");
        assert_eq!(directive.name, "UserCard");
        assert_eq!(directive.required, vec!["user"]);
        assert!(directive.post_script.is_none());
    }

    #[test]
    fn test_registry_lookup_and_overwrite() {
        let registry = DirectiveRegistry::new();
        registry.register(Directive::new("UserCard"));
        registry.register(Directive::new("UserCard").with_required(vec!["id".to_owned()]));
        registry.register(Directive::new("Badge"));

        assert_eq!(registry.tags(), vec!["badge", "user-card"]);
        assert_eq!(registry.get("user-card").unwrap().required, vec!["id"]);
        assert!(registry.get("UserCard").is_none());
    }

    #[test]
    fn test_attr_registry() {
        let registry = DirectiveRegistry::new();
        assert!(!registry.has_attr_directives());
        registry.register_attr(AttrDirective {
            name: "track".to_owned(),
            script: Script::default(),
        });
        assert!(registry.has_attr_directives());
        assert!(registry.get_attr("track").is_some());
        assert_eq!(registry.attr_names(), vec!["track"]);

        registry.clear();
        assert!(registry.get_attr("track").is_none());
    }
}
