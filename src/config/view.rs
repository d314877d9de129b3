//! Typed access to resolved templates

use super::error::ConfigError;
use super::registry::{Registry, Template, TemplateId};
use super::value::Value;

/// Something that can be built from a resolved template
pub trait FromTemplate: Sized {
    fn from_template(view: &TemplateView<'_>) -> Result<Self, ConfigError>;
}

/// Read-only view of one template with typed, error-reporting getters
#[derive(Clone, Copy)]
pub struct TemplateView<'r> {
    registry: &'r Registry,
    template: &'r Template,
}

impl Registry {
    pub fn view(&self, id: TemplateId) -> Result<TemplateView<'_>, ConfigError> {
        Ok(TemplateView {
            registry: self,
            template: self.get(id)?,
        })
    }

    /// Build a typed blueprint from a template
    pub fn build<T: FromTemplate>(&self, id: TemplateId) -> Result<T, ConfigError> {
        T::from_template(&self.view(id)?)
    }

    /// Build a typed blueprint from the base instance `class[key]`
    pub fn build_key<T: FromTemplate>(&self, class: &str, key: &str) -> Result<T, ConfigError> {
        self.build(self.lookup(class, key)?)
    }
}

impl<'r> TemplateView<'r> {
    pub fn id(&self) -> TemplateId {
        self.template.id
    }

    pub fn class(&self) -> &'r str {
        &self.template.class
    }

    pub fn key(&self) -> Option<&'r str> {
        self.template.key.as_deref()
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn is_a(&self, ancestor: &str) -> bool {
        self.registry.is_a(&self.template.class, ancestor)
    }

    /// Error naming this template and `field`
    pub fn error(&self, field: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::invalid(self.class(), self.key(), field, reason)
    }

    /// Raw value; `None` when absent or null
    pub fn value(&self, field: &str) -> Option<&'r Value> {
        self.template.get(field).filter(|v| !v.is_null())
    }

    fn require(&self, field: &str) -> Result<&'r Value, ConfigError> {
        self.value(field).ok_or_else(|| ConfigError::MissingRequiredField {
            class: self.class().to_string(),
            key: self.key().map(str::to_string),
            fields: vec![field.to_string()],
        })
    }

    pub fn f32(&self, field: &str) -> Result<f32, ConfigError> {
        self.require(field)?
            .as_f64()
            .map(|x| x as f32)
            .ok_or_else(|| self.error(field, "expected a number"))
    }

    pub fn opt_f32(&self, field: &str) -> Result<Option<f32>, ConfigError> {
        match self.value(field) {
            None => Ok(None),
            Some(_) => self.f32(field).map(Some),
        }
    }

    pub fn f32_or(&self, field: &str, default: f32) -> Result<f32, ConfigError> {
        Ok(self.opt_f32(field)?.unwrap_or(default))
    }

    /// Non-negative integer field
    pub fn usize(&self, field: &str) -> Result<usize, ConfigError> {
        self.require(field)?
            .as_i64()
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| self.error(field, "expected a non-negative integer"))
    }

    pub fn bool_or(&self, field: &str, default: bool) -> Result<bool, ConfigError> {
        match self.value(field) {
            None => Ok(default),
            Some(v) => v.as_bool().ok_or_else(|| self.error(field, "expected true or false")),
        }
    }

    pub fn str(&self, field: &str) -> Result<&'r str, ConfigError> {
        self.require(field)?
            .as_str()
            .ok_or_else(|| self.error(field, "expected a string"))
    }

    pub fn list(&self, field: &str) -> Result<&'r [Value], ConfigError> {
        match self.value(field) {
            None => Ok(&[]),
            Some(v) => v.as_list().ok_or_else(|| self.error(field, "expected a list")),
        }
    }

    /// Nested template, checked against an expected base class
    pub fn template(&self, field: &str, class: &str) -> Result<TemplateView<'r>, ConfigError> {
        let value = self.require(field)?;
        self.nested(field, value, class)
    }

    pub fn opt_template(&self, field: &str, class: &str) -> Result<Option<TemplateView<'r>>, ConfigError> {
        match self.value(field) {
            None => Ok(None),
            Some(value) => self.nested(field, value, class).map(Some),
        }
    }

    /// List of nested templates, each checked against `class`
    pub fn templates(&self, field: &str, class: &str) -> Result<Vec<TemplateView<'r>>, ConfigError> {
        self.list(field)?
            .iter()
            .map(|value| self.nested(field, value, class))
            .collect()
    }

    /// Interpret an arbitrary value (e.g. a list element) as a nested template
    pub fn nested(&self, field: &str, value: &Value, class: &str) -> Result<TemplateView<'r>, ConfigError> {
        let id = value
            .as_template()
            .ok_or_else(|| self.error(field, format!("expected a {class} instance")))?;
        let view = self.registry.view(id)?;
        if !view.is_a(class) {
            return Err(self.error(
                field,
                format!("expected a {class} instance, found {}", view.class()),
            ));
        }
        Ok(view)
    }

    pub fn build<T: FromTemplate>(&self) -> Result<T, ConfigError> {
        T::from_template(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let mut registry = Registry::new();
        registry
            .load_str("Projectile[Dart]: {speed: 120, damage: 2, piercing: 3}\n", "doc")
            .unwrap();
        registry.check_for_undefined_objects().unwrap();
        let view = registry.view(registry.lookup("Projectile", "Dart").unwrap()).unwrap();
        assert_eq!(view.f32("speed").unwrap(), 120.0);
        assert_eq!(view.usize("piercing").unwrap(), 3);
        assert_eq!(view.opt_f32("max_speed").unwrap(), None);
        assert!(view.list("effects").unwrap().is_empty());
        assert!(matches!(view.str("speed"), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_nested_class_checked() {
        let mut registry = Registry::new();
        registry
            .load_str(
                "Projectile[Dart]: {speed: 120}\nWeapon[Bad]:\n  rate_of_fire: 1\n  projectile: Projectile[Dart]\n",
                "doc",
            )
            .unwrap();
        registry.check_for_undefined_objects().unwrap();
        let view = registry.view(registry.lookup("Weapon", "Bad").unwrap()).unwrap();
        assert!(view.template("projectile", "Projectile").is_ok());
        assert!(view.template("projectile", "Shield").is_err());
    }
}
