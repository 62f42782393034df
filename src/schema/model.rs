//! Compiled JSON Schema documents
//!
//! A schema resource is compiled into an arena of [`SchemaNode`]s addressed
//! by [`SchemaId`]. References are linked to node ids once every resource the
//! document needs has been added, so recursive schemas are plain cycles of
//! ids and a linked document never holds an unresolved `$ref`.

use std::collections::HashMap;
use std::time::SystemTime;

use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde_json::{Map, Value};
use tower_lsp::lsp_types::Url;

use super::uri::resolve_against;
use crate::error::SchemaError;

/// Index of a node inside a [`SchemaDocument`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaId(pub usize);

/// A compiled `patternProperties` regex
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn is_match(&self, key: &str) -> bool {
        self.0.is_match(key)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// `items` in its single-schema or tuple form
#[derive(Debug, Clone, PartialEq)]
pub enum Items {
    Single(SchemaId),
    Tuple(Vec<SchemaId>),
}

/// One schema object (or boolean schema) with the keywords we understand
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaNode {
    /// `Some(b)` for the boolean schemas `true` and `false`
    pub boolean: Option<bool>,
    /// Stands in for a reference that could not be resolved
    pub unresolved: bool,
    pub types: Vec<String>,
    pub properties: IndexMap<String, SchemaId>,
    pub pattern_properties: Vec<(Pattern, SchemaId)>,
    pub additional_properties: Option<SchemaId>,
    pub items: Option<Items>,
    pub additional_items: Option<SchemaId>,
    pub enum_values: Option<Vec<Value>>,
    pub const_value: Option<Value>,
    pub required: Vec<String>,
    pub any_of: Vec<SchemaId>,
    pub one_of: Vec<SchemaId>,
    pub all_of: Vec<SchemaId>,
    pub reference: Option<SchemaId>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub markdown_description: Option<String>,
    pub default: Option<Value>,
}

impl SchemaNode {
    /// The `false` schema, which rejects every value
    pub fn is_false(&self) -> bool {
        self.boolean == Some(false)
    }

    /// Values allowed by `enum` and `const`, if the node restricts them
    pub fn allowed_values(&self) -> Option<Vec<Value>> {
        match (&self.const_value, &self.enum_values) {
            (Some(value), _) => Some(vec![value.clone()]),
            (None, Some(values)) => Some(values.clone()),
            (None, None) => None,
        }
    }

    /// Human readable documentation, preferring the markdown variant
    pub fn documentation(&self) -> Option<&str> {
        self.markdown_description
            .as_deref()
            .or(self.description.as_deref())
    }
}

/// A fully linked schema together with what went wrong while loading it
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    pub uri: Url,
    pub root: SchemaId,
    nodes: Vec<SchemaNode>,
    /// Other resources this document referenced through `$ref`, whether or
    /// not they could be loaded
    pub resources: Vec<Url>,
    pub diagnostics: Vec<SchemaError>,
    pub fetched_at: Option<SystemTime>,
}

impl SchemaDocument {
    /// A document that matches nothing, standing in for a schema that could
    /// not be loaded
    pub fn unavailable(uri: Url, error: SchemaError) -> Self {
        Self {
            uri,
            root: SchemaId(0),
            nodes: vec![SchemaNode {
                unresolved: true,
                ..Default::default()
            }],
            resources: Vec::new(),
            diagnostics: vec![error],
            fetched_at: None,
        }
    }

    pub fn node(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    pub fn root_node(&self) -> &SchemaNode {
        self.node(self.root)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `uri` contributed to this document
    pub fn depends_on(&self, uri: &Url) -> bool {
        let uri = without_fragment(uri);
        self.uri == uri || self.resources.contains(&uri)
    }
}

struct Resource {
    value: Value,
    pointers: HashMap<String, SchemaId>,
}

/// Builds a [`SchemaDocument`] from one or more schema resources.
///
/// The caller adds the root resource, then keeps adding (or marking
/// unavailable) whatever [`SchemaCompiler::missing_resources`] reports until
/// nothing is missing, then calls [`SchemaCompiler::finish`].
#[derive(Default)]
pub struct SchemaCompiler {
    nodes: Vec<SchemaNode>,
    resources: IndexMap<Url, Resource>,
    unavailable: HashMap<Url, SchemaError>,
    pending: Vec<(SchemaId, Url)>,
    diagnostics: Vec<SchemaError>,
}

impl SchemaCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile a resource and return the id of its root node
    pub fn add_resource(&mut self, uri: &Url, value: Value) -> SchemaId {
        let key = without_fragment(uri);
        let mut pointers = HashMap::new();
        let root = self.compile(&key, &value, String::new(), &mut pointers);
        self.resources.insert(key, Resource { value, pointers });
        root
    }

    /// Record a referenced resource that could not be loaded
    pub fn mark_unavailable(&mut self, uri: &Url, error: SchemaError) {
        self.diagnostics.push(error.clone());
        self.unavailable.insert(without_fragment(uri), error);
    }

    /// External resources referenced so far that are neither loaded nor
    /// known to be unavailable
    pub fn missing_resources(&self) -> Vec<Url> {
        let mut missing: Vec<Url> = Vec::new();
        for (_, target) in &self.pending {
            let key = without_fragment(target);
            if !self.resources.contains_key(&key)
                && !self.unavailable.contains_key(&key)
                && !missing.contains(&key)
            {
                missing.push(key);
            }
        }
        missing
    }

    /// Link every reference and produce the document
    pub fn finish(mut self, uri: Url, root: SchemaId, fetched_at: Option<SystemTime>) -> SchemaDocument {
        while let Some((from, target)) = self.pending.pop() {
            let resolved = match self.lookup(&target) {
                Some(id) => id,
                None => {
                    tracing::debug!("Unresolved reference {} in {}", target, uri);
                    self.diagnostics.push(SchemaError::UnresolvedReference {
                        uri: uri.to_string(),
                        reference: target.to_string(),
                    });
                    self.push(SchemaNode {
                        unresolved: true,
                        ..Default::default()
                    })
                }
            };
            self.nodes[from.0].reference = Some(resolved);
        }

        // Unavailable resources count too, so resetting one reloads us
        let own = without_fragment(&uri);
        let resources = self
            .resources
            .keys()
            .chain(self.unavailable.keys())
            .filter(|key| **key != own)
            .cloned()
            .collect();

        SchemaDocument {
            uri,
            root,
            nodes: self.nodes,
            resources,
            diagnostics: self.diagnostics,
            fetched_at,
        }
    }

    fn push(&mut self, node: SchemaNode) -> SchemaId {
        self.nodes.push(node);
        SchemaId(self.nodes.len() - 1)
    }

    fn lookup(&mut self, target: &Url) -> Option<SchemaId> {
        let key = without_fragment(target);
        let pointer = target
            .fragment()
            .map(|fragment| percent_decode_str(fragment).decode_utf8_lossy().into_owned())
            .unwrap_or_default();

        let resource = self.resources.get(&key)?;
        if let Some(id) = resource.pointers.get(&pointer) {
            return Some(*id);
        }
        // Plain-name fragments ($anchor) are not supported
        if !pointer.starts_with('/') {
            return None;
        }

        // A pointer into a part of the resource that was not compiled as a
        // schema, e.g. below an unknown keyword
        let value = resource.value.pointer(&pointer)?.clone();
        let mut pointers = HashMap::new();
        let id = self.compile(&key, &value, pointer, &mut pointers);
        if let Some(resource) = self.resources.get_mut(&key) {
            resource.pointers.extend(pointers);
        }
        Some(id)
    }

    fn compile(
        &mut self,
        base: &Url,
        value: &Value,
        pointer: String,
        pointers: &mut HashMap<String, SchemaId>,
    ) -> SchemaId {
        let id = self.push(SchemaNode::default());
        pointers.insert(pointer.clone(), id);
        let node = match value {
            Value::Bool(b) => SchemaNode {
                boolean: Some(*b),
                ..Default::default()
            },
            Value::Object(map) => self.compile_object(id, base, map, &pointer, pointers),
            // Anything else is not a schema and constrains nothing
            _ => SchemaNode::default(),
        };
        self.nodes[id.0] = node;
        id
    }

    fn compile_object(
        &mut self,
        id: SchemaId,
        base: &Url,
        map: &Map<String, Value>,
        pointer: &str,
        pointers: &mut HashMap<String, SchemaId>,
    ) -> SchemaNode {
        let mut node = SchemaNode::default();

        node.types = match map.get("type") {
            Some(Value::String(ty)) => vec![ty.clone()],
            Some(Value::Array(types)) => types
                .iter()
                .filter_map(|ty| ty.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };

        if let Some(Value::Object(properties)) = map.get("properties") {
            for (name, schema) in properties {
                let at = format!("{pointer}/properties/{}", escape_pointer(name));
                let child = self.compile(base, schema, at, pointers);
                node.properties.insert(name.clone(), child);
            }
        }

        if let Some(Value::Object(patterns)) = map.get("patternProperties") {
            for (pattern, schema) in patterns {
                let at = format!("{pointer}/patternProperties/{}", escape_pointer(pattern));
                let child = self.compile(base, schema, at, pointers);
                match Regex::new(pattern) {
                    Ok(regex) => node.pattern_properties.push((Pattern(regex), child)),
                    Err(err) => {
                        tracing::warn!("Ignoring pattern {:?} in {}: {}", pattern, base, err)
                    }
                }
            }
        }

        if let Some(schema) = map.get("additionalProperties") {
            let at = format!("{pointer}/additionalProperties");
            node.additional_properties = Some(self.compile(base, schema, at, pointers));
        }

        match map.get("items") {
            Some(Value::Array(schemas)) => {
                let tuple = schemas
                    .iter()
                    .enumerate()
                    .map(|(i, schema)| self.compile(base, schema, format!("{pointer}/items/{i}"), pointers))
                    .collect();
                node.items = Some(Items::Tuple(tuple));
            }
            Some(schema) => {
                let at = format!("{pointer}/items");
                node.items = Some(Items::Single(self.compile(base, schema, at, pointers)));
            }
            None => {}
        }

        if let Some(schema) = map.get("additionalItems") {
            let at = format!("{pointer}/additionalItems");
            node.additional_items = Some(self.compile(base, schema, at, pointers));
        }

        if let Some(Value::Array(values)) = map.get("enum") {
            node.enum_values = Some(values.clone());
        }
        node.const_value = map.get("const").cloned();

        if let Some(Value::Array(required)) = map.get("required") {
            node.required = required
                .iter()
                .filter_map(|name| name.as_str().map(str::to_string))
                .collect();
        }

        node.any_of = self.compile_list(base, map, "anyOf", pointer, pointers);
        node.one_of = self.compile_list(base, map, "oneOf", pointer, pointers);
        node.all_of = self.compile_list(base, map, "allOf", pointer, pointers);

        for keyword in ["definitions", "$defs"] {
            if let Some(Value::Object(definitions)) = map.get(keyword) {
                for (name, schema) in definitions {
                    let at = format!("{pointer}/{keyword}/{}", escape_pointer(name));
                    self.compile(base, schema, at, pointers);
                }
            }
        }

        if let Some(Value::String(reference)) = map.get("$ref") {
            self.pending.push((id, resolve_against(base, reference)));
        }

        node.title = string_keyword(map, "title");
        node.description = string_keyword(map, "description");
        node.markdown_description = string_keyword(map, "markdownDescription");
        node.default = map.get("default").cloned();

        node
    }

    fn compile_list(
        &mut self,
        base: &Url,
        map: &Map<String, Value>,
        keyword: &str,
        pointer: &str,
        pointers: &mut HashMap<String, SchemaId>,
    ) -> Vec<SchemaId> {
        let Some(Value::Array(schemas)) = map.get(keyword) else {
            return Vec::new();
        };
        schemas
            .iter()
            .enumerate()
            .map(|(i, schema)| self.compile(base, schema, format!("{pointer}/{keyword}/{i}"), pointers))
            .collect()
    }
}

fn string_keyword(map: &Map<String, Value>, keyword: &str) -> Option<String> {
    map.get(keyword).and_then(Value::as_str).map(str::to_string)
}

/// Escape a key for use as a JSON pointer token
pub fn escape_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

pub fn without_fragment(uri: &Url) -> Url {
    let mut uri = uri.clone();
    uri.set_fragment(None);
    uri
}
