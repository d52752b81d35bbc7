//! Schema-directed decoding of a flat form into a typed value tree.
//!
//! The decoder walks the schema, not the form: every declared struct slot
//! is visited whether or not the form mentions it, and unstructured
//! collections pick up whatever members the key pre-pass found.
use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::cast::{self, is_no_type, NativeType};
use crate::config::{index_path, CodecConfig};
use crate::error::DecodeError;
use crate::form::{FlatForm, KeyIndex, Member};
use crate::schema::{ArgSpec, Candidate, SchemaNode, Shape, TypeDescriptor};
use crate::value::{Slot, Value};

// ————————————————————————————————————————————————————————————————————————————
// OUTPUT
// ————————————————————————————————————————————————————————————————————————————

/// Decoded call arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Arguments {
    /// One entry per declared arg; unset ones are `null`.
    pub args: Vec<Value>,
    /// Only kwargs that resolved to something.
    pub kwargs: IndexMap<String, Value>,
}

/// Non-fatal findings recorded while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// No candidate of a choice-of-one had its keys in the form.
    NoMatchingChoice { path: String, candidates: Vec<String> },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::NoMatchingChoice { path, candidates } => write!(
                f,
                "could not find valid entry for '{path}' (candidates: {})",
                candidates.join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Decoded {
    pub arguments: Arguments,
    pub diagnostics: Vec<Diagnostic>,
}

// ————————————————————————————————————————————————————————————————————————————
// FRONT API
// ————————————————————————————————————————————————————————————————————————————

/// Decode every declared arg and kwarg of `spec` from `form`.
///
/// Args whose node resolves to nothing become `null` (the position must
/// exist); such kwargs are left out.
pub fn decode(spec: &ArgSpec, form: &FlatForm, config: &CodecConfig) -> Result<Decoded, DecodeError> {
    let mut decoder = Decoder::new(spec.nodes(), form, config)?;

    let mut arguments = Arguments::default();
    for node in &spec.args {
        let slot = decoder.decode_node(node)?;
        arguments.args.push(slot.or_null());
    }
    for (name, node) in &spec.kwargs {
        if let Some(v) = decoder.decode_node(node)?.present() {
            arguments.kwargs.insert(name.clone(), v);
        }
    }

    tracing::debug!(
        args = arguments.args.len(),
        kwargs = arguments.kwargs.len(),
        diagnostics = decoder.diagnostics.len(),
        "decoded submission"
    );
    Ok(Decoded { arguments, diagnostics: decoder.diagnostics })
}

/// Decode a single schema node; the result may be [`Slot::Absent`].
pub fn decode_one(
    node: &SchemaNode,
    form: &FlatForm,
    config: &CodecConfig,
) -> Result<(Slot, Vec<Diagnostic>), DecodeError> {
    let mut decoder = Decoder::new([node], form, config)?;
    let slot = decoder.decode_node(node)?;
    Ok((slot, decoder.diagnostics))
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

struct Decoder<'a> {
    form: &'a FlatForm,
    index: KeyIndex<'a>,
    config: &'a CodecConfig,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Decoder<'a> {
    fn new<'s>(
        nodes: impl IntoIterator<Item = &'s SchemaNode>,
        form: &'a FlatForm,
        config: &'a CodecConfig,
    ) -> Result<Self, DecodeError> {
        config.validate()?;
        let mut prefixes = Vec::new();
        for node in nodes {
            node.shape.indexed_paths(&node.name, config, &mut prefixes);
        }
        let index = KeyIndex::build(&prefixes, form)?;
        Ok(Self { form, index, config, diagnostics: Vec::new() })
    }

    fn decode_node(&mut self, node: &SchemaNode) -> Result<Slot, DecodeError> {
        self.shape(&node.shape, &node.name, 0)
    }

    fn shape(&mut self, shape: &Shape, path: &str, depth: usize) -> Result<Slot, DecodeError> {
        if depth > self.config.max_depth {
            return Err(DecodeError::DepthExceeded {
                path: path.to_string(),
                limit: self.config.max_depth,
            });
        }
        tracing::trace!(path, kind = shape.kind_name(), "decoding");

        match shape {
            Shape::ChoiceOfOne(candidates) => self.choice(candidates, path, depth),
            Shape::StructList(items) => {
                self.check_arity(path, items.len())?;
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(self.shape(item, &index_path(path, i), depth + 1)?.or_null());
                }
                Ok(Slot::Present(Value::List(out)))
            }
            Shape::StructDict(children) => {
                let mut out = IndexMap::with_capacity(children.len());
                for (key, child) in children {
                    let child_path = self.config.child_path(path, key);
                    out.insert(key.clone(), self.shape(child, &child_path, depth + 1)?.or_null());
                }
                Ok(Slot::Present(Value::Map(out)))
            }
            Shape::UnstructList { element } => self.unstruct_list(element.as_ref(), path),
            Shape::UnstructDict { element } => self.unstruct_dict(element.as_ref(), path),
            Shape::Native { ty, .. } => self.leaf(path, ty.as_str()),
            Shape::Instance { class } => self.instance(path, class),
        }
    }

    /// First candidate present in the form wins. An unmatched choice is
    /// soft: it resolves to `Absent` and leaves a diagnostic.
    fn choice(&mut self, candidates: &[Candidate], path: &str, depth: usize) -> Result<Slot, DecodeError> {
        for candidate in candidates {
            if self.probe(&candidate.shape, path, depth + 1) {
                tracing::debug!(path, candidate = %candidate.key, "selected candidate");
                return self.shape(&candidate.shape, path, depth + 1);
            }
        }
        let diagnostic = Diagnostic::NoMatchingChoice {
            path: path.to_string(),
            candidates: candidates.iter().map(|c| c.key.clone()).collect(),
        };
        tracing::warn!(%diagnostic, "choice-of-one left unset");
        self.diagnostics.push(diagnostic);
        Ok(Slot::Absent)
    }

    /// Does the form carry anything for `shape` at `path`?
    fn probe(&self, shape: &Shape, path: &str, depth: usize) -> bool {
        if depth > self.config.max_depth {
            return false;
        }
        match shape {
            Shape::Native { ty, .. } => self.submitted_as(path, ty.as_str()),
            Shape::Instance { class } => self.submitted_as(path, class),
            Shape::ChoiceOfOne(cs) => cs.iter().any(|c| self.probe(&c.shape, path, depth + 1)),
            Shape::StructList(items) => items
                .iter()
                .enumerate()
                .any(|(i, item)| self.probe(item, &index_path(path, i), depth + 1)),
            Shape::StructDict(children) => children
                .iter()
                .any(|(key, child)| self.probe(child, &self.config.child_path(path, key), depth + 1)),
            Shape::UnstructList { .. } => {
                self.index.members(path).iter().any(|m| !matches!(m.index(), Ok(None)))
            }
            Shape::UnstructDict { .. } => !self.index.members(path).is_empty(),
        }
    }

    fn submitted_as(&self, path: &str, type_name: &str) -> bool {
        self.form
            .get(path)
            .and_then(|e| e.type_name())
            .is_some_and(|t| t == type_name)
    }

    fn leaf(&self, path: &str, declared: &str) -> Result<Slot, DecodeError> {
        let Some(entry) = self.form.get(path) else {
            return Ok(Slot::Absent);
        };
        let (raw, submitted) = entry.value_and_type(path)?;
        check_whitelisted(submitted)?;
        check_declared(path, declared, submitted)?;
        Ok(cast::cast(raw, submitted, Some(path))?)
    }

    /// Instances decode to the submitted identifier; resolving it is up to
    /// the caller's source registry.
    fn instance(&self, path: &str, class: &str) -> Result<Slot, DecodeError> {
        let Some(entry) = self.form.get(path) else {
            return Ok(Slot::Absent);
        };
        let (id, submitted) = entry.value_and_type(path)?;
        check_declared(path, class, submitted)?;
        if is_no_type(submitted) {
            return Ok(Slot::Present(Value::Null));
        }
        if id.is_empty() {
            return Ok(Slot::Absent);
        }
        Ok(Slot::Present(Value::str(id)))
    }

    /// Bare `path[i]` keys must address a declared position.
    fn check_arity(&self, path: &str, arity: usize) -> Result<(), DecodeError> {
        for member in self.index.members(path) {
            if let Some(index) = member.index()? {
                if index >= arity {
                    return Err(DecodeError::IndexOutOfRange { path: path.to_string(), index, arity });
                }
            }
        }
        Ok(())
    }

    fn unstruct_list(&self, element: Option<&TypeDescriptor>, path: &str) -> Result<Slot, DecodeError> {
        let mut indexed: BTreeMap<usize, &Member<'a>> = BTreeMap::new();
        for member in self.index.members(path) {
            let Some(i) = member.index()? else {
                tracing::debug!(key = member.key, "skipping non-index member");
                continue;
            };
            if indexed.insert(i, member).is_some() {
                return Err(DecodeError::DuplicateIndex { path: path.to_string(), index: i });
            }
        }

        let mut out = Vec::with_capacity(indexed.len());
        for member in indexed.into_values() {
            let (raw, submitted) = member.entry.value_and_type(member.key)?;
            check_element(member.key, element, submitted)?;
            if let Some(v) = cast::cast(raw, submitted, Some(path))?.present() {
                out.push(v);
            }
        }
        if out.is_empty() {
            return Ok(Slot::Absent);
        }
        Ok(Slot::Present(Value::List(out)))
    }

    fn unstruct_dict(&self, element: Option<&TypeDescriptor>, path: &str) -> Result<Slot, DecodeError> {
        let mut out = IndexMap::new();
        for member in self.index.members(path) {
            let (key, raw, submitted) = member.entry.keyed(member.key)?;
            if key.is_empty() {
                continue;
            }
            check_element(member.key, element, submitted)?;
            let Some(v) = cast::cast(raw, submitted, Some(path))?.present() else {
                continue;
            };
            if out.insert(key.to_string(), v).is_some() {
                return Err(DecodeError::DuplicateKey { path: path.to_string(), key: key.to_string() });
            }
        }
        if out.is_empty() {
            return Ok(Slot::Absent);
        }
        Ok(Slot::Present(Value::Map(out)))
    }
}

/// A submitted type outside the whitelist is rejected as such, before it
/// is compared with anything declared.
fn check_whitelisted(submitted: &str) -> Result<(), DecodeError> {
    if !is_no_type(submitted) {
        submitted.parse::<NativeType>()?;
    }
    Ok(())
}

/// A leaf must be submitted with its declared type, or as "no type".
fn check_declared(path: &str, declared: &str, submitted: &str) -> Result<(), DecodeError> {
    if submitted == declared || is_no_type(submitted) {
        return Ok(());
    }
    Err(DecodeError::TypeMismatch {
        path: path.to_string(),
        declared: declared.to_string(),
        submitted: submitted.to_string(),
    })
}

/// Unstructured members follow their own submitted type unless the
/// collection declares a native element type.
fn check_element(key: &str, element: Option<&TypeDescriptor>, submitted: &str) -> Result<(), DecodeError> {
    match element {
        Some(TypeDescriptor::Native(t)) => {
            check_whitelisted(submitted)?;
            check_declared(key, t.as_str(), submitted)
        }
        _ => Ok(()),
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CastError;
    use serde_json::json;

    fn node(name: &str, ty: &str, values: serde_json::Value) -> SchemaNode {
        SchemaNode::parse(name, ty, values).unwrap()
    }

    fn one(n: &SchemaNode, form: &FlatForm) -> Slot {
        decode_one(n, form, &CodecConfig::default()).unwrap().0
    }

    fn to_json(slot: Slot) -> serde_json::Value {
        serde_json::to_value(slot.or_null()).unwrap()
    }

    #[test]
    fn struct_dict_fills_missing_keys_with_null() {
        let n = node("a", "dict", json!({
            "x": {"type": "int", "values": null},
            "y": {"type": "str", "values": null}
        }));
        let form = FlatForm::new().with("a-x", ["5", "int"]);
        assert_eq!(to_json(one(&n, &form)), json!({"x": 5, "y": null}));
    }

    #[test]
    fn struct_list_keeps_arity() {
        let n = node("p", "[int, str, float]", json!([null, null, null]));
        let form = FlatForm::new().with("p[2]", ["1.5", "float"]).with("p[1]", ["", "str"]);
        let v = one(&n, &form).or_null();
        assert_eq!(v.as_list().map(<[Value]>::len), Some(3));
        assert_eq!(serde_json::to_value(v).unwrap(), json!([null, null, 1.5]));
    }

    #[test]
    fn struct_round_trip_through_key_grammar() {
        let n = node("r", "dict", json!({
            "pos": {"type": "[int, bool]", "values": [null, null]},
            "inner": {"type": "dict", "values": {"name": {"type": "str"}}}
        }));
        let form = FlatForm::new()
            .with("r-pos[0]", ["7", "int"])
            .with("r-pos[1]", ["on", "bool"])
            .with("r-inner-name", ["hello", "str"]);
        assert_eq!(
            to_json(one(&n, &form)),
            json!({"inner": {"name": "hello"}, "pos": [7, true]})
        );
    }

    #[test]
    fn struct_dict_output_is_key_ordered() {
        let n = node("a", "dict", json!({
            "b": {"type": "int"}, "a": {"type": "int"}, "c": {"type": "int"}
        }));
        let v = one(&n, &FlatForm::new()).or_null();
        let keys: Vec<_> = v.as_map().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }

    #[test]
    fn unstruct_list_orders_by_numeric_index() {
        let n = node("xs", "list", json!(null));
        let form = FlatForm::new()
            .with("xs[2]", ["c", "str"])
            .with("xs[10]", ["d", "str"])
            .with("xs[0]", ["a", "str"])
            .with("xs[1]", ["b", "str"]);
        assert_eq!(to_json(one(&n, &form)), json!(["a", "b", "c", "d"]));
    }

    #[test]
    fn unstruct_list_drops_blanks_and_skips_non_index_keys() {
        let n = node("xs", "list", json!(null));
        let form = FlatForm::new()
            .with("xs[0]", ["1", "int"])
            .with("xs[1]", ["", "int"])
            .with("xs[x]", ["9", "int"])
            .with("xs[2]", ["3", "int"]);
        assert_eq!(to_json(one(&n, &form)), json!([1, 3]));
    }

    #[test]
    fn unstruct_list_rejects_duplicate_indices() {
        let n = node("xs", "list", json!(null));
        let form = FlatForm::new().with("xs[1]", ["1", "int"]).with("xs[01]", ["2", "int"]);
        let err = decode_one(&n, &form, &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, DecodeError::DuplicateIndex { index: 1, .. }));
    }

    #[test]
    fn unstruct_dict_takes_literal_keys() {
        let n = node("kw", "dict", json!(null));
        let form = FlatForm::new()
            .with("kw[0]", ["alpha", "1", "int"])
            .with("kw[1]", ["beta", "x", "str"])
            .with("kw[2]", ["", "2", "int"])
            .with("kw[3]", ["gamma", "", "int"]);
        assert_eq!(to_json(one(&n, &form)), json!({"alpha": 1, "beta": "x"}));
    }

    #[test]
    fn unstruct_dict_rejects_duplicate_keys() {
        let n = node("kw", "dict", json!(null));
        let form = FlatForm::new()
            .with("kw[a]", ["k", "1", "int"])
            .with("kw[b]", ["k", "2", "int"]);
        let err = decode_one(&n, &form, &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, DecodeError::DuplicateKey { .. }));
    }

    #[test]
    fn declared_element_type_is_enforced() {
        let n = node("xs", "list[int]", json!(null));
        let form = FlatForm::new().with("xs[0]", ["1", "str"]);
        let err = decode_one(&n, &form, &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, DecodeError::TypeMismatch { .. }));
    }

    #[test]
    fn empty_unstructured_collections_are_absent() {
        let form = FlatForm::new().with("other[0]", ["1", "int"]);
        assert!(one(&node("xs", "list", json!(null)), &form).is_absent());
        assert!(one(&node("kw", "dict", json!(null)), &form).is_absent());
    }

    #[test]
    fn choice_selects_the_submitted_candidate() {
        let n = node("a", "one([int, float, str])", json!({"int": null, "float": null, "str": null}));
        let form = FlatForm::new()
            .with("a", ["2.5", "float"])
            .with("a-int", ["1", "int"])
            .with("ab", ["1", "int"]);
        assert_eq!(one(&n, &form), Slot::Present(Value::float(2.5)));
    }

    #[test]
    fn choice_over_structured_candidates() {
        let n = node("arg1", "one([int, dict])", json!({
            "int": ">=0",
            "dict": {"subkey1": {"type": "one([int, float])", "values": {"int": null, "float": null}}}
        }));
        let form = FlatForm::new().with("arg1-subkey1", ["-1.5", "float"]);
        assert_eq!(to_json(one(&n, &form)), json!({"subkey1": -1.5}));
    }

    #[test]
    fn unmatched_choice_is_soft() {
        let n = node("a", "one([int, float])", json!({"int": null, "float": null}));
        let form = FlatForm::new().with("a", ["x", "str"]);
        let (slot, diags) = decode_one(&n, &form, &CodecConfig::default()).unwrap();
        assert!(slot.is_absent());
        assert_eq!(
            diags,
            vec![Diagnostic::NoMatchingChoice {
                path: "a".into(),
                candidates: vec!["int".into(), "float".into()],
            }]
        );
    }

    #[test]
    fn cast_errors_on_a_selected_candidate_propagate() {
        let n = node("a", "one([int, float])", json!({"int": null, "float": null}));
        let form = FlatForm::new().with("a", ["abc", "int"]);
        let err = decode_one(&n, &form, &CodecConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Cast(CastError::InvalidValue { ref context, .. }) if context.as_deref() == Some("a")
        ));
    }

    #[test]
    fn non_whitelisted_type_never_casts() {
        let n = node("xs", "list", json!(null));
        let form = FlatForm::new().with("xs[0]", ["rm -rf /", "os.system"]);
        let err = decode_one(&n, &form, &CodecConfig::default()).unwrap_err();
        assert_eq!(err.kind(), "InvalidType");
    }

    #[test]
    fn non_whitelisted_type_on_a_native_leaf_is_invalid_type() {
        let n = node("a", "int", json!(null));
        let form = FlatForm::new().with("a", ["5", "os.system"]);
        let err = decode_one(&n, &form, &CodecConfig::default()).unwrap_err();
        assert_eq!(err.kind(), "InvalidType");
        assert!(matches!(err, DecodeError::Cast(CastError::InvalidType(ref t)) if t == "os.system"));

        let typed = node("xs", "list[int]", json!(null));
        let form = FlatForm::new().with("xs[0]", ["5", "os.system"]);
        assert_eq!(decode_one(&typed, &form, &CodecConfig::default()).unwrap_err().kind(), "InvalidType");
    }

    #[test]
    fn oversized_list_index_is_rejected() {
        let n = node("xs", "list", json!(null));
        let form = FlatForm::new().with("xs[99999999999999999999999]", ["5", "int"]);
        let err = decode_one(&n, &form, &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, DecodeError::IndexOverflow { ref key } if key == "xs[99999999999999999999999]"));
    }

    #[test]
    fn struct_list_rejects_indices_past_its_arity() {
        let n = node("p", "[int]", json!([null]));
        let form = FlatForm::new().with("p[0]", ["1", "int"]).with("p[5]", ["2", "int"]);
        let err = decode_one(&n, &form, &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, DecodeError::IndexOutOfRange { index: 5, arity: 1, .. }));

        let nested = node("p", "[int, list]", json!([null, null]));
        let form = FlatForm::new().with("p[0]", ["1", "int"]).with("p[1][7]", ["2", "int"]);
        assert_eq!(to_json(one(&nested, &form)), json!([1, [2]]));
    }

    #[test]
    fn native_leaf_must_match_declared_type() {
        let n = node("a", "int", json!(null));
        let bad = FlatForm::new().with("a", ["1", "str"]);
        assert!(matches!(
            decode_one(&n, &bad, &CodecConfig::default()),
            Err(DecodeError::TypeMismatch { .. })
        ));
        let none = FlatForm::new().with("a", ["", "None"]);
        assert_eq!(one(&n, &none), Slot::Present(Value::Null));
    }

    #[test]
    fn instance_leaf_keeps_identifier() {
        let n = node("ds", "cls(app.Dataset)", json!(null));
        let form = FlatForm::new().with("ds", ["ds-42", "app.Dataset"]);
        assert_eq!(one(&n, &form), Slot::Present(Value::str("ds-42")));
        assert!(one(&n, &FlatForm::new()).is_absent());
    }

    #[test]
    fn top_level_args_null_kwargs_omitted() {
        let spec = ArgSpec::from_json(json!({
            "args": [{"name": "xs", "type": "list", "values": null}],
            "kwargs": {
                "kw": {"type": "dict", "values": null},
                "n": {"type": "int", "values": null}
            }
        }))
        .unwrap();
        let form = FlatForm::new().with("n", ["3", "int"]);
        let out = decode(&spec, &form, &CodecConfig::default()).unwrap();
        assert_eq!(
            serde_json::to_value(&out.arguments).unwrap(),
            json!({"args": [null], "kwargs": {"n": 3}})
        );
    }

    #[test]
    fn custom_delimiter() {
        let n = node("a", "dict", json!({"x": {"type": "int"}}));
        let form = FlatForm::new().with("a.x", ["1", "int"]);
        let (slot, _) = decode_one(&n, &form, &CodecConfig::with_delimiter(".")).unwrap();
        assert_eq!(to_json(slot), json!({"x": 1}));
    }

    #[test]
    fn depth_limit_is_enforced() {
        let n = node("a", "dict", json!({"b": {"type": "dict", "values": {"c": {"type": "int"}}}}));
        let cfg = CodecConfig { max_depth: 1, ..CodecConfig::default() };
        let err = decode_one(&n, &FlatForm::new(), &cfg).unwrap_err();
        assert!(matches!(err, DecodeError::DepthExceeded { limit: 1, .. }));
    }
}
