//! Registry of "pick an existing instance" sources.
//!
//! A class path (the `x.y.Z` in `cls(x.y.Z)`) is bound to a [`Source`]
//! that can list and look up instances, plus a display format used to
//! label them in selectors. The registry is an ordinary value handed to
//! the describer; there is no global state.
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern compiles"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Primary identifier; this is what a form submits.
    pub id: String,
    #[serde(default)]
    pub attrs: IndexMap<String, String>,
}

pub trait Source: Send + Sync {
    fn list(&self) -> Vec<Instance>;

    fn get(&self, id: &str) -> Option<Instance> {
        self.list().into_iter().find(|i| i.id == id)
    }
}

/// A fixed set of instances.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticSource(pub Vec<Instance>);

impl Source for StaticSource {
    fn list(&self) -> Vec<Instance> {
        self.0.clone()
    }
    fn get(&self, id: &str) -> Option<Instance> {
        self.0.iter().find(|i| i.id == id).cloned()
    }
}

/// `"{name} ({version})"`-style label template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFormat {
    template: String,
    attrs: Vec<String>,
}

impl DisplayFormat {
    pub fn new(template: impl Into<String>) -> Result<Self, SourceError> {
        let template = template.into();
        let attrs: Vec<String> = PLACEHOLDER
            .captures_iter(&template)
            .map(|c| c[1].to_string())
            .collect();
        if attrs.is_empty() {
            return Err(SourceError::EmptyFormat(template));
        }
        Ok(Self { template, attrs })
    }

    pub fn render(&self, class: &str, instance: &Instance) -> Result<String, SourceError> {
        if let Some(missing) = self.attrs.iter().find(|a| !instance.attrs.contains_key(*a)) {
            return Err(SourceError::MissingAttribute {
                class: class.to_string(),
                id: instance.id.clone(),
                attr: missing.clone(),
            });
        }
        let label = PLACEHOLDER.replace_all(&self.template, |c: &regex::Captures<'_>| {
            instance.attrs.get(&c[1]).cloned().unwrap_or_default()
        });
        Ok(label.into_owned())
    }
}

struct Binding {
    source: Box<dyn Source>,
    display: DisplayFormat,
}

/// One selectable instance: submitted id and human label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub id: String,
    pub label: String,
}

#[derive(Default)]
pub struct SourceRegistry {
    bindings: IndexMap<String, Binding>,
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.bindings.keys()).finish()
    }
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `class` to `source`, replacing any earlier binding.
    pub fn register(&mut self, class: impl Into<String>, source: impl Source + 'static, display: DisplayFormat) {
        let class = class.into();
        tracing::debug!(%class, "registered source");
        self.bindings.insert(class, Binding { source: Box::new(source), display });
    }

    pub fn contains(&self, class: &str) -> bool {
        self.bindings.contains_key(class)
    }

    fn binding(&self, class: &str) -> Result<&Binding, SourceError> {
        self.bindings
            .get(class)
            .ok_or_else(|| SourceError::UnknownSource(class.to_string()))
    }

    /// All instances of `class` as selector choices, in source order.
    pub fn choices(&self, class: &str) -> Result<Vec<Choice>, SourceError> {
        let b = self.binding(class)?;
        b.source
            .list()
            .iter()
            .map(|i| {
                Ok(Choice { id: i.id.clone(), label: b.display.render(class, i)? })
            })
            .collect()
    }

    /// Look up the instance a decoded identifier refers to.
    pub fn resolve(&self, class: &str, id: &str) -> Result<Option<Instance>, SourceError> {
        Ok(self.binding(class)?.source.get(id))
    }
}

/// On-disk registry description: class → display template + instances.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticRegistryDoc(pub IndexMap<String, StaticBindingDoc>);

#[derive(Debug, Clone, Deserialize)]
pub struct StaticBindingDoc {
    pub display: String,
    pub instances: StaticSource,
}

impl StaticRegistryDoc {
    pub fn into_registry(self) -> Result<SourceRegistry, SourceError> {
        let mut registry = SourceRegistry::new();
        for (class, doc) in self.0 {
            let display = DisplayFormat::new(doc.display)?;
            registry.register(class, doc.instances, display);
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(id: &str, name: &str, version: &str) -> Instance {
        let mut attrs = IndexMap::new();
        attrs.insert("name".to_string(), name.to_string());
        attrs.insert("version".to_string(), version.to_string());
        Instance { id: id.to_string(), attrs }
    }

    fn registry() -> SourceRegistry {
        let mut r = SourceRegistry::new();
        r.register(
            "app.Dataset",
            StaticSource(vec![dataset("d1", "iris", "1"), dataset("d2", "mnist", "3")]),
            DisplayFormat::new("{name} ({version})").unwrap(),
        );
        r
    }

    #[test]
    fn choices_use_the_display_format() {
        let choices = registry().choices("app.Dataset").unwrap();
        assert_eq!(
            choices,
            vec![
                Choice { id: "d1".into(), label: "iris (1)".into() },
                Choice { id: "d2".into(), label: "mnist (3)".into() },
            ]
        );
    }

    #[test]
    fn resolve_and_unknown_class() {
        let r = registry();
        assert_eq!(r.resolve("app.Dataset", "d2").unwrap().unwrap().id, "d2");
        assert_eq!(r.resolve("app.Dataset", "nope").unwrap(), None);
        assert_eq!(
            r.choices("app.Model"),
            Err(SourceError::UnknownSource("app.Model".into()))
        );
    }

    #[test]
    fn missing_attribute_is_reported() {
        let mut r = SourceRegistry::new();
        r.register(
            "x.Y",
            StaticSource(vec![Instance { id: "1".into(), attrs: IndexMap::new() }]),
            DisplayFormat::new("{name}").unwrap(),
        );
        assert!(matches!(r.choices("x.Y"), Err(SourceError::MissingAttribute { .. })));
        assert!(DisplayFormat::new("plain").is_err());
    }

    #[test]
    fn loads_from_json() {
        let doc: StaticRegistryDoc = serde_json::from_value(serde_json::json!({
            "app.Dataset": {
                "display": "{name}",
                "instances": [{"id": "d1", "attrs": {"name": "iris"}}]
            }
        }))
        .unwrap();
        let r = doc.into_registry().unwrap();
        assert!(r.contains("app.Dataset"));
        assert_eq!(r.choices("app.Dataset").unwrap()[0].label, "iris");
    }
}
