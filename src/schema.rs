//! Schema model: argspec documents resolved into a typed shape tree.
//!
//! An argspec pairs a type expression with a `values` payload whose meaning
//! depends on the type. Resolution happens once, up front, so the decoder
//! and describer only ever see well-formed [`Shape`]s.
pub mod type_expr;

use std::collections::BTreeMap;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value as Json;

pub use type_expr::TypeDescriptor;

use crate::cast::NativeType;
use crate::config::{index_path, CodecConfig};
use crate::error::SchemaError;
use crate::path_de;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Top-level argument declarations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArgSpec {
    pub args: Vec<SchemaNode>,
    /// Declaration order is kept; it is also the output order.
    pub kwargs: IndexMap<String, SchemaNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub name: String,
    pub shape: Shape,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Native { ty: NativeType, values: NativeValues },
    /// Exactly one candidate is active. Never empty.
    ChoiceOfOne(Vec<Candidate>),
    /// Positional children, fixed arity.
    StructList(Vec<Shape>),
    /// Named children, fixed key set, iterated in key order.
    StructDict(BTreeMap<String, Shape>),
    /// Members found at decode time as `path[<integer>]`.
    UnstructList { element: Option<TypeDescriptor> },
    /// Members found at decode time as `path[<anything>]`.
    UnstructDict { element: Option<TypeDescriptor> },
    /// Pick an existing instance of a registered class.
    Instance { class: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Stringified candidate type, e.g. `"int"` or `"dict"`.
    pub key: String,
    pub shape: Shape,
}

/// Constraint payload of a native leaf, kept verbatim for the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValues {
    Unconstrained,
    /// A fixed list of permitted values.
    Options(Vec<Json>),
    /// Anything else, typically a range string such as `">=0"`.
    Constraint(Json),
}

// ————————————————————————————————————————————————————————————————————————————
// DOCUMENT FORMAT
// ————————————————————————————————————————————————————————————————————————————

#[derive(Deserialize)]
struct RawArgSpec {
    #[serde(default)]
    args: Vec<RawArg>,
    #[serde(default)]
    kwargs: IndexMap<String, RawNode>,
}

#[derive(Deserialize)]
struct RawArg {
    name: String,
    #[serde(flatten)]
    node: RawNode,
}

#[derive(Deserialize)]
struct RawNode {
    #[serde(rename = "type")]
    ty: Json,
    #[serde(default)]
    values: Json,
}

impl ArgSpec {
    pub fn from_json(doc: Json) -> Result<Self, SchemaError> {
        let raw: RawArgSpec = path_de::from_value_with_path(doc)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawArgSpec) -> Result<Self, SchemaError> {
        let args = raw
            .args
            .into_iter()
            .map(|a| SchemaNode::resolve(a.name, &a.node.ty, &a.node.values))
            .collect::<Result<Vec<_>, _>>()?;
        let mut kwargs = IndexMap::with_capacity(raw.kwargs.len());
        for (name, node) in raw.kwargs {
            let resolved = SchemaNode::resolve(name.clone(), &node.ty, &node.values)?;
            kwargs.insert(name, resolved);
        }
        Ok(ArgSpec { args, kwargs })
    }

    /// All top-level nodes, args first.
    pub fn nodes(&self) -> impl Iterator<Item = &SchemaNode> {
        self.args.iter().chain(self.kwargs.values())
    }
}

impl FromStr for ArgSpec {
    type Err = SchemaError;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let raw: RawArgSpec = path_de::from_str_with_path(src)?;
        Self::from_raw(raw)
    }
}

impl SchemaNode {
    /// Resolve one `{type, values}` pair.
    pub fn resolve(name: impl Into<String>, ty: &Json, values: &Json) -> Result<Self, SchemaError> {
        let name = name.into();
        let ty = type_from_json(&name, ty)?;
        let shape = Shape::resolve(&name, &ty, values)?;
        Ok(SchemaNode { name, shape })
    }

    /// Same as [`SchemaNode::resolve`] with a textual type expression.
    pub fn parse(name: impl Into<String>, ty: &str, values: Json) -> Result<Self, SchemaError> {
        let name = name.into();
        let ty = TypeDescriptor::parse(ty)?;
        let shape = Shape::resolve(&name, &ty, &values)?;
        Ok(SchemaNode { name, shape })
    }
}

fn type_from_json(name: &str, ty: &Json) -> Result<TypeDescriptor, SchemaError> {
    match ty {
        Json::String(expr) => TypeDescriptor::parse(expr),
        Json::Array(items) => items
            .iter()
            .map(|t| type_from_json(name, t))
            .collect::<Result<Vec<_>, _>>()
            .map(TypeDescriptor::StructList),
        Json::Null => Err(SchemaError::MissingField { name: name.to_string(), field: "type" }),
        other => Err(SchemaError::TypeExpr {
            expr: other.to_string(),
            message: "type must be a string or an array of types".to_string(),
        }),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// RESOLUTION
// ————————————————————————————————————————————————————————————————————————————

impl Shape {
    pub fn resolve(name: &str, ty: &TypeDescriptor, values: &Json) -> Result<Self, SchemaError> {
        let values_err = |message: &'static str| SchemaError::Values {
            name: name.to_string(),
            type_name: ty.to_string(),
            message,
        };

        match ty {
            TypeDescriptor::Native(t) => Ok(Shape::Native {
                ty: *t,
                values: match values {
                    Json::Null => NativeValues::Unconstrained,
                    Json::Array(items) => NativeValues::Options(items.clone()),
                    other => NativeValues::Constraint(other.clone()),
                },
            }),
            TypeDescriptor::ChoiceOfOne(candidates) => {
                if candidates.is_empty() {
                    return Err(SchemaError::EmptyChoice { name: name.to_string() });
                }
                let payloads = values
                    .as_object()
                    .ok_or_else(|| values_err("other than a mapping of candidate types"))?;
                let mut out: Vec<Candidate> = Vec::with_capacity(candidates.len());
                for candidate in candidates {
                    let key = candidate.to_string();
                    if out.iter().any(|c| c.key == key) {
                        return Err(SchemaError::DuplicateCandidate {
                            name: name.to_string(),
                            candidate: key,
                        });
                    }
                    let payload = payloads.get(&key).ok_or_else(|| SchemaError::MissingCandidate {
                        name: name.to_string(),
                        candidate: key.clone(),
                    })?;
                    let shape = Shape::resolve(name, candidate, payload)?;
                    out.push(Candidate { key, shape });
                }
                Ok(Shape::ChoiceOfOne(out))
            }
            TypeDescriptor::StructList(types) => {
                let payloads = values
                    .as_array()
                    .ok_or_else(|| values_err("other than one entry per position"))?;
                if payloads.len() != types.len() {
                    return Err(SchemaError::Arity {
                        name: name.to_string(),
                        expected: types.len(),
                        actual: payloads.len(),
                    });
                }
                types
                    .iter()
                    .zip(payloads)
                    .enumerate()
                    .map(|(i, (t, v))| Shape::resolve(&index_path(name, i), t, v))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Shape::StructList)
            }
            TypeDescriptor::Dict(element) => match values {
                Json::Null => Ok(Shape::UnstructDict { element: element.as_deref().cloned() }),
                Json::Object(children) if element.is_none() => {
                    let mut out = BTreeMap::new();
                    for (key, child) in children {
                        let child_name = format!("{name}.{key}");
                        let ty = child.get("type").ok_or_else(|| SchemaError::MissingField {
                            name: child_name.clone(),
                            field: "type",
                        })?;
                        let child_values = child.get("values").unwrap_or(&Json::Null);
                        let node = SchemaNode::resolve(child_name, ty, child_values)?;
                        out.insert(key.clone(), node.shape);
                    }
                    Ok(Shape::StructDict(out))
                }
                Json::Object(_) => Err(values_err("alongside an element type")),
                _ => Err(values_err("other than null or a mapping of children")),
            },
            TypeDescriptor::List(element) => match values {
                Json::Null => Ok(Shape::UnstructList { element: element.as_deref().cloned() }),
                _ => Err(values_err("other than null; declare a struct list as [t, ...]")),
            },
            TypeDescriptor::Instance(class) => match values {
                Json::Null => Ok(Shape::Instance { class: class.clone() }),
                _ => Err(values_err("other than null")),
            },
        }
    }

    /// The type this shape was resolved from.
    pub fn descriptor(&self) -> TypeDescriptor {
        match self {
            Shape::Native { ty, .. } => TypeDescriptor::Native(*ty),
            Shape::ChoiceOfOne(cs) => {
                TypeDescriptor::ChoiceOfOne(cs.iter().map(|c| c.shape.descriptor()).collect())
            }
            Shape::StructList(xs) => {
                TypeDescriptor::StructList(xs.iter().map(Shape::descriptor).collect())
            }
            Shape::StructDict(_) => TypeDescriptor::Dict(None),
            Shape::UnstructList { element } => TypeDescriptor::List(element.clone().map(Box::new)),
            Shape::UnstructDict { element } => TypeDescriptor::Dict(element.clone().map(Box::new)),
            Shape::Instance { class } => TypeDescriptor::Instance(class.clone()),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Shape::Native { .. } => "native",
            Shape::ChoiceOfOne(_) => "choice_of_one",
            Shape::StructList(_) => "struct_list",
            Shape::StructDict(_) => "struct_dict",
            Shape::UnstructList { .. } => "unstruct_list",
            Shape::UnstructDict { .. } => "unstruct_dict",
            Shape::Instance { .. } => "instance",
        }
    }

    /// Push the form path of every unstructured collection below `path`.
    /// Choice candidates share their parent's path.
    pub fn unstructured_paths(&self, path: &str, config: &CodecConfig, out: &mut Vec<String>) {
        self.walk_bracketed(path, config, false, 0, out)
    }

    /// Like [`Shape::unstructured_paths`], plus the path of every struct
    /// list, so keys indexed past a declared arity can be caught.
    pub fn indexed_paths(&self, path: &str, config: &CodecConfig, out: &mut Vec<String>) {
        self.walk_bracketed(path, config, true, 0, out)
    }

    fn walk_bracketed(
        &self,
        path: &str,
        config: &CodecConfig,
        struct_lists: bool,
        depth: usize,
        out: &mut Vec<String>,
    ) {
        if depth > config.max_depth {
            return;
        }
        match self {
            Shape::UnstructList { .. } | Shape::UnstructDict { .. } => out.push(path.to_string()),
            Shape::ChoiceOfOne(cs) => {
                for c in cs {
                    c.shape.walk_bracketed(path, config, struct_lists, depth + 1, out);
                }
            }
            Shape::StructList(xs) => {
                if struct_lists {
                    out.push(path.to_string());
                }
                for (i, x) in xs.iter().enumerate() {
                    x.walk_bracketed(&index_path(path, i), config, struct_lists, depth + 1, out);
                }
            }
            Shape::StructDict(children) => {
                for (key, child) in children {
                    let child_path = config.child_path(path, key);
                    child.walk_bracketed(&child_path, config, struct_lists, depth + 1, out);
                }
            }
            Shape::Native { .. } | Shape::Instance { .. } => {}
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
