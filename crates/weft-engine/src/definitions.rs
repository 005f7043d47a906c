//! Definitions document reader.
//!
//! A definitions document is any XML document whose root element contains,
//! in any order:
//!
//! - `<template name="…">…</template>`
//! - `<directive name="PascalName" required-attr="a,b">` with `<content>` and
//!   an optional `<post-script>`
//! - `<attr-directive name="…">` with a `<script>`
//!
//! Other root children are skipped with a warning.

use crate::directive::{AttrDirective, Directive};
use crate::error::LoadError;
use crate::expr::{Script, parse_script};
use crate::markup::{Element, Node, parse_document};

/// Entries of one definitions document, in document order per kind.
#[derive(Debug, Default)]
pub(crate) struct Definitions {
    pub templates: Vec<(String, Vec<Node>)>,
    pub directives: Vec<Directive>,
    pub attr_directives: Vec<AttrDirective>,
}

/// Parse a definitions document.
pub(crate) fn parse_definitions(src: &str) -> Result<Definitions, LoadError> {
    let root = parse_document(src)?;
    let mut defs = Definitions::default();

    for entry in root.child_elements() {
        match entry.tag.as_str() {
            "template" => {
                let name = required_name(entry)?;
                defs.templates.push((name, entry.children.clone()));
            }
            "directive" => {
                let (directive, content) = directive(entry)?;
                defs.templates.push((directive.tag.clone(), content));
                defs.directives.push(directive);
            }
            "attr-directive" => defs.attr_directives.push(attr_directive(entry)?),
            other => {
                tracing::warn!(tag = %other, "Skipping unknown definitions entry");
            }
        }
    }

    Ok(defs)
}

fn required_name(entry: &Element) -> Result<String, LoadError> {
    match entry.attr_value("name").map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name.to_owned()),
        _ => Err(LoadError::InvalidDefinition(format!(
            "<{}> requires a non-empty `name` attribute",
            entry.tag
        ))),
    }
}

fn directive(entry: &Element) -> Result<(Directive, Vec<Node>), LoadError> {
    let name = required_name(entry)?;
    let content = entry.child("content").ok_or_else(|| {
        LoadError::InvalidDefinition(format!("directive `{name}` has no <content>"))
    })?;

    let required = entry
        .attr_value("required-attr")
        .map(parse_required)
        .unwrap_or_default();

    let mut directive = Directive::new(name).with_required(required);
    if let Some(post) = entry.child("post-script") {
        let script = compile(&directive.name, &post.text_content())?;
        directive = directive.with_post_script(script);
    }

    Ok((directive, content.children.clone()))
}

fn attr_directive(entry: &Element) -> Result<AttrDirective, LoadError> {
    let name = required_name(entry)?;
    let body = entry.child("script").ok_or_else(|| {
        LoadError::InvalidDefinition(format!("attribute directive `{name}` has no <script>"))
    })?;
    let script = compile(&name, &body.text_content())?;
    Ok(AttrDirective { name, script })
}

fn compile(owner: &str, body: &str) -> Result<Script, LoadError> {
    parse_script(body).map_err(|source| LoadError::Script {
        owner: owner.to_owned(),
        source,
    })
}

/// Split a `required-attr` list: comma-separated, trimmed, empties dropped.
fn parse_required(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DEFS: &str = r#"<?xml version="1.0"?>
<definitions>
  <template name="greeting">Hello ${name}</template>
  <directive name="UserCard" required-attr="user, size,">
    <content><div class="card">${user.name}</div></content>
    <post-script>let _shown = true; _shown</post-script>
  </directive>
  <attr-directive name="track">
    <script>invoke('track', value)</script>
  </attr-directive>
  <widget name="ignored"/>
</definitions>"#;

    #[test]
    fn test_parse_all_entry_kinds() {
        let defs = parse_definitions(DEFS).unwrap();

        let names: Vec<&str> = defs.templates.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["greeting", "user-card"]);

        let directive = &defs.directives[0];
        assert_eq!(directive.tag, "user-card");
        assert_eq!(directive.required, vec!["user", "size"]);
        assert!(directive.post_script.is_some());

        assert_eq!(defs.attr_directives[0].name, "track");
    }

    #[test]
    fn test_directive_content_becomes_template() {
        let defs = parse_definitions(DEFS).unwrap();
        let (_, content) = &defs.templates[1];
        let div = content.iter().find_map(Node::as_element).unwrap();
        assert_eq!(div.tag, "div");
    }

    #[test]
    fn test_missing_name_is_invalid() {
        let err = parse_definitions("<d><template>x</template></d>").unwrap_err();
        assert!(matches!(err, LoadError::InvalidDefinition(_)));
    }

    #[test]
    fn test_directive_without_content_is_invalid() {
        let err = parse_definitions(r#"<d><directive name="Empty"/></d>"#).unwrap_err();
        assert!(matches!(err, LoadError::InvalidDefinition(ref m) if m.contains("Empty")));
    }

    #[test]
    fn test_bad_post_script_names_owner() {
        let src = r#"<d><directive name="Broken"><content/><post-script>x = 1</post-script></directive></d>"#;
        let err = parse_definitions(src).unwrap_err();
        assert!(matches!(err, LoadError::Script { ref owner, .. } if owner == "Broken"));
    }

    #[test]
    fn test_parse_required() {
        assert_eq!(parse_required(" a ,b,, c "), vec!["a", "b", "c"]);
        assert!(parse_required("").is_empty());
    }
}
