use std::collections::HashMap;

use regex::Regex;

use crate::config::Resource;

/// Matches request paths against configured resource patterns.
///
/// A pattern segment `*` matches one path segment, `**` matches everything below it.
/// Literal segments win over `*`, which wins over `**`.
#[derive(Debug)]
pub struct ResourceMatcher {
    root: Node,
    cached_sep_regex: Regex,
}

impl ResourceMatcher {
    pub fn new(list: &[Resource], sep_regex_str: &str) -> anyhow::Result<Self> {
        let sep_regex = Regex::new(sep_regex_str)?;
        let root = Node::default();
        let mut matcher = ResourceMatcher { root, cached_sep_regex: sep_regex };

        for it in list {
            if it.pattern.is_empty() {
                anyhow::bail!("empty resource pattern");
            }
            let parts = matcher.get_seg_parts(&it.pattern);
            matcher.root.insert(&parts, it);
        }
        Ok(matcher)
    }

    pub fn elect(&self, path: &str) -> Option<&Resource> {
        let seg_parts = self.get_seg_parts(path);
        self.root.get(&seg_parts, 0)
    }

    #[inline]
    fn get_seg_parts<'a>(&self, path: &'a str) -> Vec<&'a str> {
        self.cached_sep_regex.split(path).filter(|it| !it.is_empty()).collect::<Vec<_>>()
    }
}

#[derive(Default, Debug)]
struct Node {
    name: String,
    resource: Option<Resource>,
    children: HashMap<String, Node>,
}

impl Node {
    fn new(name: &str) -> Self {
        Node {
            name: name.to_string(),
            resource: None,
            children: HashMap::new(),
        }
    }

    fn insert(&mut self, parts: &[&str], resource: &Resource) {
        if self.name.as_str() == "**" {
            return;
        }
        let part = match parts.first() {
            // the root itself, e.g. pattern "/"
            None => {
                self.resource.get_or_insert_with(|| resource.clone());
                return;
            }
            Some(part) => *part,
        };

        let child = self.children.entry(part.to_string()).or_insert_with(|| Node::new(part));
        if parts.len() == 1 || part == "**" {
            // first pattern registered for a path keeps it
            child.resource.get_or_insert_with(|| resource.clone());
            return;
        }
        child.insert(&parts[1..], resource);
    }

    fn get(&self, parts: &[&str], level: usize) -> Option<&Resource> {
        if self.name == "**" {
            return self.resource.as_ref();
        }
        if level >= parts.len() {
            return self.resource.as_ref()
                .or_else(|| self.children.get("**").and_then(|it| it.resource.as_ref()));
        }

        let part = parts[level];
        self.children.get(part).and_then(|it| it.get(parts, level + 1))
            .or_else(|| self.children.get("*").and_then(|it| it.get(parts, level + 1)))
            .or_else(|| self.children.get("**").and_then(|it| it.get(parts, level + 1)))
    }
}
