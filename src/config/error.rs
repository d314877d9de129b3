use std::fmt;

/// Errors raised while loading or querying templates.
///
/// All of these are fatal at load time: the simulation never starts with a
/// partially resolved entity graph.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    UnknownClass {
        class: String,
    },
    DuplicateKey {
        class: String,
        key: String,
    },
    MissingRequiredField {
        class: String,
        key: Option<String>,
        fields: Vec<String>,
    },
    UndefinedReference {
        class: String,
        key: String,
    },
    InvalidValue {
        class: String,
        key: Option<String>,
        field: String,
        reason: String,
    },
    Parse {
        source: String,
        message: String,
    },
    Io {
        path: String,
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(
        class: &str,
        key: Option<&str>,
        field: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            class: class.to_string(),
            key: key.map(str::to_string),
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

fn instance_name(class: &str, key: Option<&str>) -> String {
    format!("{class}[{}]", key.unwrap_or(""))
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownClass { class } => write!(f, "unknown template class: {class}"),
            Self::DuplicateKey { class, key } => {
                write!(f, "base instance of {class}[{key}] already exists")
            }
            Self::MissingRequiredField { class, key, fields } => write!(
                f,
                "{} is missing required fields: {}",
                instance_name(class, key.as_deref()),
                fields.join(", ")
            ),
            Self::UndefinedReference { class, key } => {
                write!(f, "no base instance of {class}[{key}] was defined")
            }
            Self::InvalidValue {
                class,
                key,
                field,
                reason,
            } => write!(
                f,
                "invalid value for {}.{field}: {reason}",
                instance_name(class, key.as_deref())
            ),
            Self::Parse { source, message } => write!(f, "failed to parse {source}: {message}"),
            Self::Io { path, message } => write!(f, "failed to read {path}: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}
