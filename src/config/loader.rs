//! Document loading
//!
//! Strings of the form `Class[key]` reference (or, with an empty key,
//! anonymously create) an instance; `Class(key)` produces a copy. A mapping
//! entry whose key has one of those forms and whose value is a mapping is a
//! definition or a copy with overrides.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_yaml::{Mapping, Value as YamlValue};

use super::error::ConfigError;
use super::registry::{Registry, TemplateId};
use super::value::{Fields, Value, number_value, scalar_key};

/// Subdirectories of a config tree, in load order
pub const CATEGORY_ORDER: [&str; 8] = [
    "behaviors",
    "projectiles",
    "shields",
    "weapons",
    "ships",
    "formations",
    "levels",
    "campaigns",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    /// `Class[key]`
    Bracket,
    /// `Class(key)`
    Paren,
}

/// Split `Class[key]` / `Class(key)` into its parts.
///
/// Both class and key must be word characters, and the key may be empty.
fn parse_instance_name(s: &str) -> Option<(&str, &str, Form)> {
    let (form, open, close) = match s.chars().last()? {
        ']' => (Form::Bracket, '[', ']'),
        ')' => (Form::Paren, '(', ')'),
        _ => return None,
    };
    let open_at = s.find(open)?;
    let class = &s[..open_at];
    let key = s[open_at + 1..].strip_suffix(close)?;
    let is_word_run = |t: &str| t.chars().all(is_word);
    if class.is_empty() || !is_word_run(class) || !is_word_run(key) {
        return None;
    }
    Some((class, key, form))
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Brackets and braces pair up outside quoted runs
fn is_balanced(text: &str) -> bool {
    let mut depth = 0i32;
    let mut quote = None;
    for c in text.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[' | '{') => depth += 1,
            (None, ']' | '}') => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0 && quote.is_none()
}

impl Registry {
    /// Byte length of the `Class[key]` / `Class(key)` token opening `s`,
    /// if its class is registered
    fn instance_token_len(&self, s: &str) -> Option<usize> {
        let open = s.find(['[', '('])?;
        let class = &s[..open];
        if class.is_empty() || !class.chars().all(is_word) || !self.has_class(class) {
            return None;
        }
        let close = if s[open..].starts_with('[') { ']' } else { ')' };
        let key_end = open + 1 + s[open + 1..].find(|c: char| !is_word(c))?;
        if !s[key_end..].starts_with(close) {
            return None;
        }
        let end = key_end + 1;
        s[end..].chars().next().is_none_or(|c| !is_word(c)).then_some(end)
    }

    /// Rewrite one line so the YAML parser accepts the instance syntax.
    ///
    /// Brackets are YAML flow indicators, so instance names of registered
    /// classes are quoted. A definition given inline as a field value
    /// (`field: Class(key): {..}`) is wrapped into a one-entry flow mapping.
    fn quote_instance_names(&self, line: &str) -> String {
        let mut out = String::with_capacity(line.len() + 8);
        let mut quote: Option<char> = None;
        let mut prev: Option<char> = None;
        let mut wrap_from = None;
        let mut comment = "";
        let mut i = 0;
        while let Some(c) = line[i..].chars().next() {
            let rest = &line[i..];
            if let Some(q) = quote {
                if c == q {
                    quote = None;
                }
            } else if c == '#' && prev.is_none_or(char::is_whitespace) {
                comment = rest;
                break;
            } else if prev.is_some_and(is_word) {
                // Inside a word: neither a token start nor a quote
            } else if c == '"' || c == '\'' {
                quote = Some(c);
            } else if let Some(len) = self.instance_token_len(rest) {
                let inline_body = rest[len..]
                    .strip_prefix(": ")
                    .map(str::trim_start)
                    .is_some_and(|after| !after.is_empty() && !after.starts_with('#'));
                if wrap_from.is_none() && inline_body && out.trim_end().ends_with(':') {
                    wrap_from = Some(out.len());
                }
                out.push('"');
                out.push_str(&rest[..len]);
                out.push('"');
                prev = rest[..len].chars().last();
                i += len;
                continue;
            }
            out.push(c);
            prev = Some(c);
            i += c.len_utf8();
        }

        if let Some(from) = wrap_from {
            let body = out[from..].trim_end();
            if is_balanced(body) {
                out = format!("{}{{{body}}}", &out[..from]);
            }
        }
        if !comment.is_empty() {
            if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                out.push(' ');
            }
            out.push_str(comment);
        }
        out
    }

    /// Quote instance syntax line by line; line numbers are preserved
    fn prepare_document(&self, text: &str) -> String {
        text.lines()
            .map(|line| self.quote_instance_names(line))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Load one document, returning its resolved value.
    ///
    /// Forward references stay pending until
    /// [`Registry::check_for_undefined_objects`] is called.
    pub fn load_str(&mut self, text: &str, source: &str) -> Result<Value, ConfigError> {
        let raw: YamlValue = serde_yaml::from_str(&self.prepare_document(text)).map_err(|e| ConfigError::Parse {
            source: source.to_string(),
            message: e.to_string(),
        })?;
        self.resolve(&raw)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<Value, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        self.load_str(&text, &path.display().to_string())
    }

    /// Load a config tree category by category, then settle references.
    ///
    /// Missing category directories are skipped; files load in name order.
    pub fn load_dir(&mut self, root: &Path) -> Result<(), ConfigError> {
        let mut loaded = 0usize;
        for category in CATEGORY_ORDER {
            let dir = root.join(category);
            if !dir.is_dir() {
                continue;
            }
            let entries = fs::read_dir(&dir).map_err(|e| ConfigError::Io {
                path: dir.display().to_string(),
                message: e.to_string(),
            })?;
            let mut files: Vec<_> = entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|p| {
                    p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e == "yaml" || e == "yml")
                })
                .collect();
            files.sort();
            for file in files {
                self.load_file(&file)?;
                loaded += 1;
            }
        }
        self.check_for_undefined_objects()?;
        log::info!("Loaded {loaded} config files from {}", root.display());
        Ok(())
    }

    /// Define `class[key]` from an unresolved YAML mapping
    pub fn define_yaml(&mut self, class: &str, key: &str, body: &YamlValue) -> Result<TemplateId, ConfigError> {
        let fields = self.resolve_body(class, Some(key), body)?;
        self.define(class, key, fields)
    }

    fn resolve(&mut self, raw: &YamlValue) -> Result<Value, ConfigError> {
        match raw {
            YamlValue::Null => Ok(Value::Null),
            YamlValue::Bool(b) => Ok(Value::Bool(*b)),
            YamlValue::Number(n) => Ok(number_value(n)),
            YamlValue::String(s) => match self.instance_name(s) {
                Some((class, key, form)) => self
                    .resolve_instance(class, key, form, None)
                    .map(Value::Template),
                None => Ok(Value::Str(s.clone())),
            },
            YamlValue::Sequence(items) => items
                .iter()
                .map(|item| self.resolve(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            YamlValue::Mapping(map) => self.resolve_mapping(map),
            YamlValue::Tagged(tagged) => self.resolve(&tagged.value),
        }
    }

    fn resolve_mapping(&mut self, map: &Mapping) -> Result<Value, ConfigError> {
        let mut out = BTreeMap::new();
        let mut sole_block = None;
        for (raw_key, raw_value) in map {
            let Some(key) = scalar_key(raw_key) else {
                return Err(ConfigError::Parse {
                    source: "mapping".into(),
                    message: format!("unsupported mapping key {raw_key:?}"),
                });
            };
            let block = match self.instance_name(&key) {
                Some((class, name, form)) if raw_value.is_mapping() || raw_value.is_null() => {
                    let (class, name) = (class.to_string(), name.to_string());
                    Some(self.resolve_instance(&class, &name, form, Some(raw_value))?)
                }
                Some((class, name, _)) => {
                    return Err(ConfigError::invalid(
                        class,
                        Some(name),
                        &key,
                        "definition body must be a mapping",
                    ));
                }
                None => None,
            };
            match block {
                Some(id) => {
                    let entry_key = self.get(id).ok().and_then(|t| t.key.clone()).unwrap_or(key);
                    if map.len() == 1 {
                        sole_block = Some(id);
                    }
                    out.insert(entry_key, Value::Template(id));
                }
                None => {
                    let value = self.resolve(raw_value)?;
                    out.insert(key, value);
                }
            }
        }
        Ok(match sole_block {
            Some(id) => Value::Template(id),
            None => Value::Map(out),
        })
    }

    fn instance_name<'s>(&self, s: &'s str) -> Option<(&'s str, &'s str, Form)> {
        parse_instance_name(s).filter(|(class, _, _)| self.has_class(class))
    }

    fn resolve_instance(
        &mut self,
        class: &str,
        key: &str,
        form: Form,
        body: Option<&YamlValue>,
    ) -> Result<TemplateId, ConfigError> {
        let key_opt = (!key.is_empty()).then_some(key);
        match (form, body) {
            (_, _) if key.is_empty() => {
                let fields = match body {
                    Some(body) => self.resolve_body(class, None, body)?,
                    None => Fields::new(),
                };
                self.anonymous_instance(class, fields)
            }
            (Form::Bracket, Some(body)) => self.define_yaml(class, key, body),
            (Form::Bracket, None) => self.reference(class, key),
            (Form::Paren, body) => {
                let overrides = match body {
                    Some(body) => self.resolve_body(class, key_opt, body)?,
                    None => Fields::new(),
                };
                let base = self.reference(class, key)?;
                self.instance_copy(base, overrides)
            }
        }
    }

    fn resolve_body(&mut self, class: &str, key: Option<&str>, body: &YamlValue) -> Result<Fields, ConfigError> {
        let map = match body {
            YamlValue::Null => return Ok(Fields::new()),
            YamlValue::Mapping(map) => map,
            _ => {
                return Err(ConfigError::invalid(
                    class,
                    key,
                    "<body>",
                    "definition body must be a mapping",
                ));
            }
        };
        let mut fields = Fields::new();
        let mut order = Vec::with_capacity(map.len());
        for (raw_key, raw_value) in map {
            let Some(field) = scalar_key(raw_key) else {
                return Err(ConfigError::invalid(class, key, "<body>", "field names must be scalars"));
            };
            let value = self.resolve(raw_value)?;
            order.push(field.clone());
            fields.insert(field, value);
        }
        self.note_fields(class, order.iter().map(String::as_str));
        Ok(fields)
    }
}
