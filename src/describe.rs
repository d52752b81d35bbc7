//! Schema → field descriptor projection for form renderers.
//!
//! Descriptors say what must be rendered for a user to submit a form the
//! decoder accepts: names follow the same key grammar, and constraint
//! payloads are passed through untouched. Nothing is cast here.
use serde::Serialize;
use serde_json::Value as Json;

use crate::config::{index_path, CodecConfig};
use crate::error::DescribeError;
use crate::schema::{ArgSpec, NativeValues, SchemaNode, Shape};
use crate::sources::SourceRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    OneOfSelector,
    Struct,
    UnstructList,
    UnstructDict,
    NativeConstraint,
    NativeOptions,
    InstanceSelector,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

impl FieldOption {
    fn plain(value: impl Into<String>) -> Self {
        let value = value.into();
        Self { label: value.clone(), value }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    /// Form key of the field.
    pub name: String,
    pub display_name: String,
    pub kind: FieldKind,
    /// Stringified schema type; also the type a submission should carry.
    pub type_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Json>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FieldDescriptor>,
}

/// One descriptor per declared argument, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormDescriptor {
    pub args: Vec<FieldDescriptor>,
    pub kwargs: Vec<FieldDescriptor>,
}

pub struct Describer<'a> {
    config: &'a CodecConfig,
    sources: Option<&'a SourceRegistry>,
}

impl<'a> Describer<'a> {
    pub fn new(config: &'a CodecConfig) -> Self {
        Self { config, sources: None }
    }

    /// Populate instance selectors from `sources`. Without a registry they
    /// are described with no options.
    pub fn with_sources(mut self, sources: &'a SourceRegistry) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn describe_argspec(&self, spec: &ArgSpec) -> Result<FormDescriptor, DescribeError> {
        self.config.validate()?;
        Ok(FormDescriptor {
            args: spec.args.iter().map(|n| self.describe(n)).collect::<Result<_, _>>()?,
            kwargs: spec.kwargs.values().map(|n| self.describe(n)).collect::<Result<_, _>>()?,
        })
    }

    pub fn describe(&self, node: &SchemaNode) -> Result<FieldDescriptor, DescribeError> {
        self.shape(&node.shape, &node.name, 0)
    }

    fn field(&self, path: &str, shape: &Shape, kind: FieldKind) -> FieldDescriptor {
        FieldDescriptor {
            name: path.to_string(),
            display_name: self.config.display_name(path).to_string(),
            kind,
            type_name: shape.descriptor().to_string(),
            options: Vec::new(),
            constraint: None,
            children: Vec::new(),
        }
    }

    fn shape(&self, shape: &Shape, path: &str, depth: usize) -> Result<FieldDescriptor, DescribeError> {
        if depth > self.config.max_depth {
            return Err(DescribeError::DepthExceeded {
                path: path.to_string(),
                limit: self.config.max_depth,
            });
        }

        let d = match shape {
            Shape::ChoiceOfOne(candidates) => FieldDescriptor {
                options: candidates.iter().map(|c| FieldOption::plain(&c.key)).collect(),
                children: candidates
                    .iter()
                    .map(|c| self.shape(&c.shape, path, depth + 1))
                    .collect::<Result<_, _>>()?,
                ..self.field(path, shape, FieldKind::OneOfSelector)
            },
            Shape::StructList(items) => FieldDescriptor {
                children: items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.shape(item, &index_path(path, i), depth + 1))
                    .collect::<Result<_, _>>()?,
                ..self.field(path, shape, FieldKind::Struct)
            },
            Shape::StructDict(children) => FieldDescriptor {
                children: children
                    .iter()
                    .map(|(key, child)| self.shape(child, &self.config.child_path(path, key), depth + 1))
                    .collect::<Result<_, _>>()?,
                ..self.field(path, shape, FieldKind::Struct)
            },
            Shape::UnstructList { .. } => self.field(path, shape, FieldKind::UnstructList),
            Shape::UnstructDict { .. } => self.field(path, shape, FieldKind::UnstructDict),
            Shape::Native { values: NativeValues::Options(items), .. } => FieldDescriptor {
                options: items.iter().map(|v| FieldOption::plain(option_text(v))).collect(),
                constraint: Some(Json::Array(items.clone())),
                ..self.field(path, shape, FieldKind::NativeOptions)
            },
            Shape::Native { values, .. } => FieldDescriptor {
                constraint: match values {
                    NativeValues::Constraint(c) => Some(c.clone()),
                    _ => None,
                },
                ..self.field(path, shape, FieldKind::NativeConstraint)
            },
            Shape::Instance { class } => FieldDescriptor {
                options: self.instance_options(path, class)?,
                ..self.field(path, shape, FieldKind::InstanceSelector)
            },
        };
        Ok(d)
    }

    fn instance_options(&self, path: &str, class: &str) -> Result<Vec<FieldOption>, DescribeError> {
        let Some(sources) = self.sources else {
            tracing::debug!(path, class, "no source registry, instance selector left empty");
            return Ok(Vec::new());
        };
        let choices = sources
            .choices(class)
            .map_err(|source| DescribeError::Source { path: path.to_string(), source })?;
        Ok(choices
            .into_iter()
            .map(|c| FieldOption { value: c.id, label: c.label })
            .collect())
    }
}

/// Strings render bare, everything else as JSON text.
fn option_text(v: &Json) -> String {
    match v {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Describe a whole argspec without instance sources.
pub fn describe_argspec(spec: &ArgSpec, config: &CodecConfig) -> Result<FormDescriptor, DescribeError> {
    Describer::new(config).describe_argspec(spec)
}
