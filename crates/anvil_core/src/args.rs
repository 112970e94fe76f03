//! Command argument schema, values and the tokenize → resolve pipeline.

pub mod resolver;
pub mod tokenizer;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::host::{ChannelRef, InboundMessage, RoleRef, UserRef};

pub use resolver::{ArgumentResolver, ResolveContext};
pub use tokenizer::{Token, tokenize};

/// Declared type of a command argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgType {
    Text,
    Number,
    Integer,
    Boolean,
    User,
    Channel,
    Role,
    /// Resolved through a registered [`ArgumentType`]
    Custom(String),
}

impl ArgType {
    /// Parse the type name used in fragment manifests
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "string" | "text" => Self::Text,
            "number" | "float" => Self::Number,
            "integer" | "int" => Self::Integer,
            "boolean" | "bool" | "state" => Self::Boolean,
            "user" | "member" => Self::User,
            "channel" => Self::Channel,
            "role" => Self::Role,
            _ => Self::Custom(name.trim().to_string()),
        }
    }

    /// Whether a `--flag` of this type consumes a value
    pub fn takes_value(&self) -> bool {
        !matches!(self, Self::Boolean)
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Number => write!(f, "a number"),
            Self::Integer => write!(f, "a whole number"),
            Self::Boolean => write!(f, "yes/no"),
            Self::User => write!(f, "a user"),
            Self::Channel => write!(f, "a channel"),
            Self::Role => write!(f, "a role"),
            Self::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// A typed, resolved argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Text(String),
    Number(f64),
    Integer(i64),
    Boolean(bool),
    User(UserRef),
    Channel(ChannelRef),
    Role(RoleRef),
    /// Output of a custom argument type
    Custom(serde_json::Value),
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{}", s),
            Self::Number(n) => write!(f, "{}", n),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::User(u) => write!(f, "<@{}>", u.id),
            Self::Channel(c) => write!(f, "<#{}>", c.id),
            Self::Role(r) => write!(f, "<@&{}>", r.id),
            Self::Custom(serde_json::Value::String(s)) => write!(f, "{}", s),
            Self::Custom(v) => write!(f, "{}", v),
        }
    }
}

/// Invocation data available to computed default values.
pub struct DefaultContext<'a> {
    pub message: &'a InboundMessage,
    pub command: &'a str,
}

/// Defaults that are derived from where a command was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextDefault {
    /// The invoking user
    Author,
    /// The channel the command was sent in
    Channel,
}

pub type DefaultFn = Arc<dyn Fn(&DefaultContext<'_>) -> Option<ArgValue> + Send + Sync>;

/// Value used when an argument is not supplied.
#[derive(Clone)]
pub enum DefaultValue {
    /// Coerced through the argument's type exactly like user input
    Literal(String),
    Contextual(ContextDefault),
    Computed(DefaultFn),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => f.debug_tuple("Literal").field(s).finish(),
            Self::Contextual(c) => f.debug_tuple("Contextual").field(c).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "{}", s),
            Self::Contextual(ContextDefault::Author) => write!(f, "you"),
            Self::Contextual(ContextDefault::Channel) => write!(f, "this channel"),
            Self::Computed(_) => write!(f, "computed"),
        }
    }
}

/// One entry of a command's ordered argument schema.
#[derive(Debug, Clone)]
pub struct ArgumentSpec {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub kind: ArgType,
    pub default: Option<DefaultValue>,
    /// Single-letter alias, usable as `-x`
    pub short: Option<char>,
    /// Swallows every remaining positional token
    pub variadic: bool,
}

impl ArgumentSpec {
    pub fn new(name: impl Into<String>, kind: ArgType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            required: false,
            kind,
            default: None,
            short: None,
            variadic: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }
}

/// Resolver for a user-defined argument type.
#[async_trait]
pub trait ArgumentType: Send + Sync {
    /// Type name referenced from argument schemas
    fn name(&self) -> &str;

    /// Convert the raw token, or explain why it is not valid
    async fn resolve(
        &self,
        raw: &str,
        ctx: &ResolveContext<'_>,
    ) -> std::result::Result<ArgValue, String>;
}

/// Registered custom argument types, keyed by name.
#[derive(Clone, Default)]
pub struct ArgumentTypes {
    types: HashMap<String, Arc<dyn ArgumentType>>,
}

impl ArgumentTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: Arc<dyn ArgumentType>) {
        self.types.insert(kind.name().to_string(), kind);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ArgumentType>> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }
}

/// The resolved argument bag handed to a command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: BTreeMap<String, ArgValue>,
    extra_positionals: Vec<String>,
    extra_flags: BTreeMap<String, Option<String>>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(ArgValue::Number(n)) => Some(*n),
            Some(ArgValue::Integer(n)) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ArgValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    /// True when a boolean argument resolved to true or an undeclared flag was passed
    pub fn flag(&self, name: &str) -> bool {
        match self.values.get(name) {
            Some(ArgValue::Boolean(b)) => *b,
            Some(_) => false,
            None => self.extra_flags.contains_key(name),
        }
    }

    pub fn user(&self, name: &str) -> Option<&UserRef> {
        match self.values.get(name) {
            Some(ArgValue::User(u)) => Some(u),
            _ => None,
        }
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelRef> {
        match self.values.get(name) {
            Some(ArgValue::Channel(c)) => Some(c),
            _ => None,
        }
    }

    pub fn role(&self, name: &str) -> Option<&RoleRef> {
        match self.values.get(name) {
            Some(ArgValue::Role(r)) => Some(r),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArgValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Positional tokens that did not bind to any schema entry
    pub fn extra_positionals(&self) -> &[String] {
        &self.extra_positionals
    }

    /// Flags that are not part of the schema
    pub fn extra_flags(&self) -> &BTreeMap<String, Option<String>> {
        &self.extra_flags
    }

    pub(crate) fn push_extra_positional(&mut self, token: String) {
        self.extra_positionals.push(token);
    }

    pub(crate) fn insert_extra_flag(&mut self, name: String, value: Option<String>) {
        self.extra_flags.entry(name).or_insert(value);
    }
}

/// Interpret on/off style words as a boolean.
pub fn translate_state(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "on" | "1" | "enable" | "enabled" => Some(true),
        "false" | "no" | "n" | "off" | "0" | "disable" | "disabled" => Some(false),
        _ => None,
    }
}

/// Render the usage line of a schema: `name <required> [optional]`.
pub fn usage_line(name: &str, schema: &[ArgumentSpec]) -> String {
    let mut usage = name.to_string();
    for spec in schema {
        let label = if spec.variadic {
            format!("{}...", spec.name)
        } else {
            spec.name.clone()
        };
        if spec.required {
            usage.push_str(&format!(" <{}>", label));
        } else {
            usage.push_str(&format!(" [{}]", label));
        }
    }
    usage
}
