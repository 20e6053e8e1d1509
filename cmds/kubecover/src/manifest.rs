//! In-memory model of rendered Kubernetes manifests.
//!
//! Resources are kept as plain JSON values so that kinds unknown to any
//! schema (kuttl's `TestAssert`, custom resources) pass through a render and
//! stage cycle untouched.

use std::{fmt, slice};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::instrument;

/// Separator written between YAML documents, matching `kustomize build` output.
const DOCUMENT_SEPARATOR: &str = "---\n";

/// A single rendered resource document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(JsonValue);

impl Resource {
	pub fn new(value: JsonValue) -> Self {
		Self(value)
	}

	pub fn kind(&self) -> Option<&str> {
		self.0.get("kind").and_then(JsonValue::as_str)
	}

	pub fn api_version(&self) -> Option<&str> {
		self.0.get("apiVersion").and_then(JsonValue::as_str)
	}

	pub fn name(&self) -> Option<&str> {
		self.0.pointer("/metadata/name").and_then(JsonValue::as_str)
	}

	pub fn namespace(&self) -> Option<&str> {
		self.0
			.pointer("/metadata/namespace")
			.and_then(JsonValue::as_str)
	}

	/// Identifying metadata of this resource. Missing fields become empty strings.
	pub fn id(&self) -> ResourceId {
		ResourceId {
			api_version: self.api_version().unwrap_or_default().to_string(),
			kind: self.kind().unwrap_or_default().to_string(),
			namespace: self.namespace().map(str::to_string),
			name: self.name().unwrap_or_default().to_string(),
		}
	}

	pub fn as_value(&self) -> &JsonValue {
		&self.0
	}

	pub fn into_value(self) -> JsonValue {
		self.0
	}
}

impl From<JsonValue> for Resource {
	fn from(value: JsonValue) -> Self {
		Self(value)
	}
}

/// Identity of a resource: what a cluster uses to tell two objects apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
	pub api_version: String,
	pub kind: String,
	pub namespace: Option<String>,
	pub name: String,
}

impl fmt::Display for ResourceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.namespace {
			Some(namespace) => write!(f, "{}/{}/{}", namespace, self.kind, self.name),
			None => write!(f, "{}/{}", self.kind, self.name),
		}
	}
}

/// Ordered collection of resources produced by one render.
///
/// Order is significant: it is the order the renderer emitted documents in,
/// and the order they are written to the staged test file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceList {
	resources: Vec<Resource>,
}

impl ResourceList {
	pub fn new(resources: Vec<Resource>) -> Self {
		Self { resources }
	}

	/// Parse a multi-document YAML stream. Empty documents are skipped.
	///
	/// Integers must fit in 64 bits, the same limit the Kubernetes API puts on
	/// integer fields; larger ones are a parse error naming the field.
	#[instrument(skip_all)]
	pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
		let mut resources = Vec::new();
		for doc in serde_yaml::Deserializer::from_str(content) {
			let value = JsonValue::deserialize(doc)?;
			if value.is_null() {
				continue;
			}
			resources.push(Resource(value));
		}
		Ok(Self { resources })
	}

	/// Serialize every resource, in order, as one multi-document YAML stream.
	#[instrument(skip_all, fields(resources = self.resources.len()))]
	pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
		let mut output = String::new();
		for (idx, resource) in self.resources.iter().enumerate() {
			if idx > 0 {
				output.push_str(DOCUMENT_SEPARATOR);
			}
			output.push_str(&serde_yaml::to_string(&resource.0)?);
		}
		Ok(output)
	}

	pub fn push(&mut self, resource: Resource) {
		self.resources.push(resource);
	}

	pub fn resources(&self) -> &[Resource] {
		&self.resources
	}

	pub fn iter(&self) -> slice::Iter<'_, Resource> {
		self.resources.iter()
	}

	pub fn len(&self) -> usize {
		self.resources.len()
	}

	pub fn is_empty(&self) -> bool {
		self.resources.is_empty()
	}

	/// Kinds of all resources in document order; documents without a kind are skipped.
	pub fn kinds(&self) -> Vec<&str> {
		self.resources.iter().filter_map(Resource::kind).collect()
	}

	pub fn ids(&self) -> Vec<ResourceId> {
		self.resources.iter().map(Resource::id).collect()
	}
}

impl FromIterator<Resource> for ResourceList {
	fn from_iter<I: IntoIterator<Item = Resource>>(iter: I) -> Self {
		Self {
			resources: iter.into_iter().collect(),
		}
	}
}

impl<'a> IntoIterator for &'a ResourceList {
	type Item = &'a Resource;
	type IntoIter = slice::Iter<'a, Resource>;

	fn into_iter(self) -> Self::IntoIter {
		self.resources.iter()
	}
}

impl IntoIterator for ResourceList {
	type Item = Resource;
	type IntoIter = std::vec::IntoIter<Resource>;

	fn into_iter(self) -> Self::IntoIter {
		self.resources.into_iter()
	}
}
