//! Template registry
//!
//! Owns every template instance in an arena indexed by [`TemplateId`].
//! Base instances are looked up by `(class, key)`; copies and anonymous
//! instances live in the arena without a lookup entry.
//!
//! References to keys that are not defined yet create placeholders, and
//! copies of not-yet-complete bases are deferred. Both are settled by
//! [`Registry::check_for_undefined_objects`], which must succeed before any
//! template is used.

use std::collections::{HashMap, HashSet};

use serde_yaml::{Mapping, Value as YamlValue};

use super::error::ConfigError;
use super::schema::{ClassSchema, builtin_schemas};
use super::value::{Fields, Value};

/// Handle to a template in the registry arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateId(usize);

impl TemplateId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A resolved template instance
#[derive(Debug, Clone)]
pub struct Template {
    pub id: TemplateId,
    pub class: String,
    /// Key of the base instance this is (or was copied from); `None` when anonymous
    pub key: Option<String>,
    /// Configured values, defaults merged in
    pub fields: Fields,
    /// Values computed by initialization hooks
    pub derived: Fields,
    initialized: bool,
}

impl Template {
    /// Field value, falling back to derived values
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).or_else(|| self.derived.get(field))
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[derive(Debug, Clone)]
enum SlotState {
    /// Referenced before its definition was seen
    Placeholder,
    /// Copy requested while the base (or something inside it) was still undefined
    DeferredCopy { base: TemplateId, overrides: Fields },
    Defined(Template),
}

#[derive(Debug, Clone)]
struct Slot {
    class: String,
    key: Option<String>,
    state: SlotState,
}

/// Arena of templates plus the class schemas that shape them
#[derive(Debug, Clone)]
pub struct Registry {
    schemas: HashMap<String, ClassSchema>,
    slots: Vec<Slot>,
    base_instances: HashMap<(String, String), TemplateId>,
    /// Every field ever seen per class, in first-seen order
    class_fields: HashMap<String, Vec<String>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Registry preloaded with the built-in classes
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for schema in builtin_schemas() {
            registry.register_class(schema);
        }
        registry
    }

    /// Registry with no classes at all
    pub fn empty() -> Self {
        Self {
            schemas: HashMap::new(),
            slots: Vec::new(),
            base_instances: HashMap::new(),
            class_fields: HashMap::new(),
        }
    }

    /// Add (or replace) a class declaration
    pub fn register_class(&mut self, schema: ClassSchema) {
        self.class_fields
            .insert(schema.name.clone(), schema.declared_fields());
        self.schemas.insert(schema.name.clone(), schema);
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.schemas.contains_key(class)
    }

    pub fn schema(&self, class: &str) -> Result<&ClassSchema, ConfigError> {
        self.schemas.get(class).ok_or_else(|| ConfigError::UnknownClass {
            class: class.to_string(),
        })
    }

    /// True if `class` is `ancestor` or derives from it
    pub fn is_a(&self, class: &str, ancestor: &str) -> bool {
        let mut current = Some(class);
        while let Some(name) = current {
            if name == ancestor {
                return true;
            }
            current = self.schemas.get(name).and_then(|s| s.parent.as_deref());
        }
        false
    }

    /// Full field list of a class: declared fields, then any seen in config
    pub fn class_fields(&self, class: &str) -> &[String] {
        self.class_fields
            .get(class)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Record field names for `class`; names already known keep their place
    pub(crate) fn note_fields<'f>(&mut self, class: &str, names: impl IntoIterator<Item = &'f str>) {
        let known = self.class_fields.entry(class.to_string()).or_default();
        for name in names {
            if !known.iter().any(|k| k == name) {
                known.push(name.to_string());
            }
        }
    }

    /// Define the base instance `class[key]`.
    ///
    /// Fills a placeholder if the key was referenced earlier.
    pub fn define(&mut self, class: &str, key: &str, fields: Fields) -> Result<TemplateId, ConfigError> {
        self.schema(class)?;
        let lookup = (class.to_string(), key.to_string());
        let id = match self.base_instances.get(&lookup) {
            Some(&id) if matches!(self.slots[id.0].state, SlotState::Placeholder) => id,
            Some(_) => {
                return Err(ConfigError::DuplicateKey {
                    class: class.to_string(),
                    key: key.to_string(),
                });
            }
            None => {
                let id = self.allocate(class, Some(key), SlotState::Placeholder);
                self.base_instances.insert(lookup, id);
                id
            }
        };

        let template = self.setup(id, class, Some(key), fields)?;
        log::debug!("Defined {class}[{key}]");
        self.slots[id.0].state = SlotState::Defined(template);
        Ok(id)
    }

    /// Define a one-off instance with no lookup key
    pub fn anonymous_instance(&mut self, class: &str, fields: Fields) -> Result<TemplateId, ConfigError> {
        self.schema(class)?;
        let id = self.allocate(class, None, SlotState::Placeholder);
        let template = self.setup(id, class, None, fields)?;
        self.slots[id.0].state = SlotState::Defined(template);
        Ok(id)
    }

    /// The shared base instance `class[key]`.
    ///
    /// An undefined key yields a placeholder that a later definition fills.
    pub fn reference(&mut self, class: &str, key: &str) -> Result<TemplateId, ConfigError> {
        self.schema(class)?;
        let lookup = (class.to_string(), key.to_string());
        if let Some(&id) = self.base_instances.get(&lookup) {
            return Ok(id);
        }
        let id = self.allocate(class, Some(key), SlotState::Placeholder);
        self.base_instances.insert(lookup, id);
        log::debug!("Forward reference to {class}[{key}]");
        Ok(id)
    }

    /// Strict lookup of a defined base instance
    pub fn lookup(&self, class: &str, key: &str) -> Result<TemplateId, ConfigError> {
        let undefined = || ConfigError::UndefinedReference {
            class: class.to_string(),
            key: key.to_string(),
        };
        let id = *self
            .base_instances
            .get(&(class.to_string(), key.to_string()))
            .ok_or_else(undefined)?;
        match self.slots[id.0].state {
            SlotState::Defined(_) => Ok(id),
            _ => Err(undefined()),
        }
    }

    /// Keys of every defined base instance of `class` or its subclasses, sorted
    pub fn keys_of(&self, class: &str) -> Vec<(String, String)> {
        let mut keys: Vec<_> = self
            .base_instances
            .iter()
            .filter(|((c, _), id)| {
                self.is_a(c, class) && matches!(self.slots[id.0].state, SlotState::Defined(_))
            })
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// A fresh copy of `base` with `overrides` applied on top.
    ///
    /// Nested templates are copied too. If anything reachable from `base`
    /// is still undefined the copy is deferred until the final check.
    pub fn instance_copy(&mut self, base: TemplateId, overrides: Fields) -> Result<TemplateId, ConfigError> {
        let slot = self.slot(base)?;
        let (class, key) = (slot.class.clone(), slot.key.clone());
        let id = self.allocate(&class, key.as_deref(), SlotState::Placeholder);
        if self.is_complete(base) {
            let template = self.materialize_copy(id, base, overrides)?;
            self.slots[id.0].state = SlotState::Defined(template);
        } else {
            self.slots[id.0].state = SlotState::DeferredCopy { base, overrides };
        }
        Ok(id)
    }

    /// Settle deferred copies, then fail on anything still undefined
    pub fn check_for_undefined_objects(&mut self) -> Result<(), ConfigError> {
        loop {
            let ready: Vec<(TemplateId, TemplateId, Fields)> = self
                .slots
                .iter()
                .enumerate()
                .filter_map(|(i, slot)| match &slot.state {
                    SlotState::DeferredCopy { base, overrides } if self.is_complete(*base) => {
                        Some((TemplateId(i), *base, overrides.clone()))
                    }
                    _ => None,
                })
                .collect();
            if ready.is_empty() {
                break;
            }
            for (id, base, overrides) in ready {
                let template = self.materialize_copy(id, base, overrides)?;
                self.slots[id.0].state = SlotState::Defined(template);
            }
        }

        for slot in &self.slots {
            if !matches!(slot.state, SlotState::Defined(_)) {
                return Err(ConfigError::UndefinedReference {
                    class: slot.class.clone(),
                    key: self.missing_key(slot),
                });
            }
        }
        Ok(())
    }

    /// Resolved template (strict: placeholders are an error)
    pub fn get(&self, id: TemplateId) -> Result<&Template, ConfigError> {
        let slot = self.slot(id)?;
        match &slot.state {
            SlotState::Defined(template) => Ok(template),
            _ => Err(ConfigError::UndefinedReference {
                class: slot.class.clone(),
                key: slot.key.clone().unwrap_or_default(),
            }),
        }
    }

    /// Render a template back into document syntax: `{"Class(key)": {fields}}`
    pub fn serialize(&self, id: TemplateId) -> Result<YamlValue, ConfigError> {
        let template = self.get(id)?;
        let mut body = Mapping::new();
        for field in self.class_fields(&template.class) {
            if let Some(value) = template.fields.get(field) {
                body.insert(YamlValue::String(field.clone()), self.serialize_value(value)?);
            }
        }
        let head = match &template.key {
            Some(key) => format!("{}({key})", template.class),
            None => format!("{}[]", template.class),
        };
        let mut outer = Mapping::new();
        outer.insert(YamlValue::String(head), YamlValue::Mapping(body));
        Ok(YamlValue::Mapping(outer))
    }

    fn serialize_value(&self, value: &Value) -> Result<YamlValue, ConfigError> {
        Ok(match value {
            Value::Null => YamlValue::Null,
            Value::Bool(b) => YamlValue::Bool(*b),
            Value::Int(i) => YamlValue::Number((*i).into()),
            Value::Float(x) => YamlValue::Number((*x).into()),
            Value::Str(s) => YamlValue::String(s.clone()),
            Value::List(items) => YamlValue::Sequence(
                items
                    .iter()
                    .map(|v| self.serialize_value(v))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Map(map) => {
                let mut out = Mapping::new();
                for (k, v) in map {
                    out.insert(YamlValue::String(k.clone()), self.serialize_value(v)?);
                }
                YamlValue::Mapping(out)
            }
            Value::Template(id) => self.serialize(*id)?,
        })
    }

    fn allocate(&mut self, class: &str, key: Option<&str>, state: SlotState) -> TemplateId {
        let id = TemplateId(self.slots.len());
        self.slots.push(Slot {
            class: class.to_string(),
            key: key.map(str::to_string),
            state,
        });
        id
    }

    fn slot(&self, id: TemplateId) -> Result<&Slot, ConfigError> {
        self.slots.get(id.0).ok_or_else(|| ConfigError::UndefinedReference {
            class: "?".into(),
            key: format!("#{}", id.0),
        })
    }

    /// Merge defaults, check required fields, run initialization once
    fn setup(
        &mut self,
        id: TemplateId,
        class: &str,
        key: Option<&str>,
        config: Fields,
    ) -> Result<Template, ConfigError> {
        let schema = self.schema(class)?.clone();
        let mut fields: Fields = schema.defaults.iter().cloned().collect();
        fields.extend(config);

        let missing: Vec<String> = schema
            .required
            .iter()
            .filter(|f| fields.get(*f).is_none_or(Value::is_null))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingRequiredField {
                class: class.to_string(),
                key: key.map(str::to_string),
                fields: missing,
            });
        }

        self.note_fields(class, fields.keys().map(String::as_str));

        let mut template = Template {
            id,
            class: class.to_string(),
            key: key.map(str::to_string),
            fields,
            derived: Fields::new(),
            initialized: false,
        };
        Self::initialize(&schema, &mut template)?;
        Ok(template)
    }

    fn initialize(schema: &ClassSchema, template: &mut Template) -> Result<(), ConfigError> {
        if template.initialized {
            return Ok(());
        }
        for hook in &schema.hooks {
            hook(template)?;
        }
        template.initialized = true;
        Ok(())
    }

    /// Everything reachable from `id` is defined (deferred copies count as pending)
    fn is_complete(&self, id: TemplateId) -> bool {
        let mut stack = vec![id];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            match self.slots.get(id.0).map(|s| &s.state) {
                Some(SlotState::Defined(template)) => {
                    for value in template.fields.values() {
                        collect_templates(value, &mut stack);
                    }
                }
                _ => return false,
            }
        }
        true
    }

    fn materialize_copy(
        &mut self,
        id: TemplateId,
        base: TemplateId,
        overrides: Fields,
    ) -> Result<Template, ConfigError> {
        let base_template = self.get(base)?.clone();
        let mut copying = vec![base];
        let mut fields = Fields::new();
        for (name, value) in &base_template.fields {
            fields.insert(name.clone(), self.copy_value(value, &mut copying)?);
        }
        fields.extend(overrides);
        self.setup(id, &base_template.class, base_template.key.as_deref(), fields)
    }

    fn copy_value(&mut self, value: &Value, copying: &mut Vec<TemplateId>) -> Result<Value, ConfigError> {
        Ok(match value {
            Value::List(items) => Value::List(
                items
                    .iter()
                    .map(|v| self.copy_value(v, copying))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Map(map) => {
                let mut out = std::collections::BTreeMap::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.copy_value(v, copying)?);
                }
                Value::Map(out)
            }
            // A template that (indirectly) contains itself stays shared
            Value::Template(nested) if copying.contains(nested) => Value::Template(*nested),
            Value::Template(nested) => {
                let source = self.get(*nested)?.clone();
                copying.push(*nested);
                let mut fields = Fields::new();
                for (name, v) in &source.fields {
                    fields.insert(name.clone(), self.copy_value(v, copying)?);
                }
                copying.pop();
                let copy_id = self.allocate(&source.class, source.key.as_deref(), SlotState::Placeholder);
                let template = self.setup(copy_id, &source.class, source.key.as_deref(), fields)?;
                self.slots[copy_id.0].state = SlotState::Defined(template);
                Value::Template(copy_id)
            }
            other => other.clone(),
        })
    }

    /// Key to report for an unsettled slot: the deepest undefined base
    fn missing_key(&self, slot: &Slot) -> String {
        match &slot.state {
            SlotState::DeferredCopy { base, .. } => self
                .slots
                .get(base.0)
                .map(|b| self.missing_key(b))
                .unwrap_or_default(),
            _ => slot.key.clone().unwrap_or_default(),
        }
    }
}

fn collect_templates(value: &Value, out: &mut Vec<TemplateId>) {
    match value {
        Value::Template(id) => out.push(*id),
        Value::List(items) => items.iter().for_each(|v| collect_templates(v, out)),
        Value::Map(map) => map.values().for_each(|v| collect_templates(v, out)),
        _ => {}
    }
}
