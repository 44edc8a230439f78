//! Deploy-time value expressions.
//!
//! Values only known once the provisioning engine has created a resource
//! (collection endpoint, role ARN, API id) are carried as [`Expr`] and
//! rendered as CloudFormation intrinsic functions. Literal operands are
//! folded at synthesis time where the result is already known.

use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map as JsonMap, Value};

use crate::error::ResolveError;

/// Schemes removed (wherever they occur) from endpoints handed to dependents.
pub const URL_SCHEMES: [&str; 2] = ["https://", "http://"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(String),
    /// Parameter, pseudo parameter or resource physical id.
    Ref(String),
    GetAtt {
        logical_id: String,
        attribute: String,
    },
    Join {
        delimiter: String,
        list: Box<ListExpr>,
    },
    Select {
        index: usize,
        list: Box<ListExpr>,
    },
    Sub(String),
}

/// List-valued operand of `Fn::Join` and `Fn::Select`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListExpr {
    Items(Vec<Expr>),
    Split { delimiter: String, source: Box<Expr> },
}

impl Expr {
    pub fn literal(value: impl Into<String>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Expr::Ref(name.into())
    }

    pub fn get_att(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Expr::GetAtt {
            logical_id: logical_id.into(),
            attribute: attribute.into(),
        }
    }

    pub fn sub(template: impl Into<String>) -> Self {
        Expr::Sub(template.into())
    }

    /// `Fn::Join` over `parts`. Adjacent literals are merged when the
    /// delimiter is empty; an all-literal join collapses to one literal.
    pub fn join(delimiter: impl Into<String>, parts: Vec<Expr>) -> Self {
        let delimiter = delimiter.into();
        if parts.iter().all(|p| p.as_literal().is_some()) {
            let joined = parts
                .iter()
                .filter_map(Expr::as_literal)
                .collect::<Vec<_>>()
                .join(&delimiter);
            return Expr::Literal(joined);
        }
        let parts = if delimiter.is_empty() {
            merge_literals(parts)
        } else {
            parts
        };
        Expr::Join {
            delimiter,
            list: Box::new(ListExpr::Items(parts)),
        }
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Expr::Literal(s) => Some(s),
            _ => None,
        }
    }

    /// Removes every occurrence of `https://` and `http://` from `source`,
    /// not only a leading one.
    ///
    /// Non-literal sources become nested split/join pairs, which evaluate to
    /// the input unchanged when no scheme is present.
    pub fn strip_scheme(source: Expr) -> Expr {
        if let Expr::Literal(s) = &source {
            return Expr::Literal(strip_scheme_str(s));
        }
        URL_SCHEMES.iter().fold(source, |acc, scheme| Expr::Join {
            delimiter: String::new(),
            list: Box::new(ListExpr::Split {
                delimiter: (*scheme).to_string(),
                source: Box::new(acc),
            }),
        })
    }

    /// Renders a serializable document as a JSON string, keeping any
    /// embedded expressions as `Fn::Join` parts.
    ///
    /// Fails if the document already contains token marker text, since the
    /// embedded expressions could then not be placed unambiguously.
    pub fn json_document<T: Serialize>(document: &T) -> Result<Expr, serde_json::Error> {
        let mut value = serde_json::to_value(document)?;
        if serde_json::to_string(&value)?.contains(TOKEN_MARKER_PREFIX) {
            return Err(ser::Error::custom(format!(
                "document contains reserved text {TOKEN_MARKER_PREFIX}"
            )));
        }
        let mut tokens = Vec::new();
        tokenize(&mut value, &mut tokens);
        let text = serde_json::to_string(&value)?;
        if tokens.is_empty() {
            return Ok(Expr::Literal(text));
        }

        let mut parts = Vec::with_capacity(tokens.len() * 2 + 1);
        let mut rest = text.as_str();
        for (i, token) in tokens.into_iter().enumerate() {
            let marker = token_marker(i);
            let Some((before, after)) = rest.split_once(&marker) else {
                return Err(ser::Error::custom(format!("token {marker} lost while rendering")));
            };
            parts.push(Expr::literal(before));
            parts.push(token);
            rest = after;
        }
        parts.push(Expr::literal(rest));
        Ok(Expr::join("", parts))
    }

    /// Logical ids (and parameter names) this expression refers to.
    pub fn references(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references(&self, out: &mut Vec<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Ref(name) => out.push(name.clone()),
            Expr::GetAtt { logical_id, .. } => out.push(logical_id.clone()),
            Expr::Join { list, .. } | Expr::Select { list, .. } => list.collect_references(out),
            Expr::Sub(template) => {
                for name in sub_variables(template) {
                    let id = name.split('.').next().unwrap_or(name);
                    out.push(id.to_string());
                }
            }
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Expr::Literal(s) => Value::String(s.clone()),
            Expr::Ref(name) => json!({ "Ref": name }),
            Expr::GetAtt {
                logical_id,
                attribute,
            } => json!({ "Fn::GetAtt": [logical_id, attribute] }),
            Expr::Join { delimiter, list } => json!({ "Fn::Join": [delimiter, list.to_value()] }),
            Expr::Select { index, list } => json!({ "Fn::Select": [index, list.to_value()] }),
            Expr::Sub(template) => json!({ "Fn::Sub": template }),
        }
    }

    /// True for a JSON object shaped like a single intrinsic function call.
    pub fn is_intrinsic(value: &Value) -> bool {
        match value.as_object() {
            Some(map) if map.len() == 1 => map
                .keys()
                .next()
                .is_some_and(|k| k == "Ref" || k.starts_with("Fn::")),
            _ => false,
        }
    }

    pub fn from_value(value: &Value) -> Result<Expr, ResolveError> {
        match value {
            Value::String(s) => Ok(Expr::Literal(s.clone())),
            Value::Number(n) => Ok(Expr::Literal(n.to_string())),
            Value::Bool(b) => Ok(Expr::Literal(b.to_string())),
            Value::Object(map) if Expr::is_intrinsic(value) => parse_intrinsic(map),
            other => Err(ResolveError::MalformedIntrinsic(other.to_string())),
        }
    }
}

impl ListExpr {
    pub fn to_value(&self) -> Value {
        match self {
            ListExpr::Items(items) => Value::Array(items.iter().map(Expr::to_value).collect()),
            ListExpr::Split { delimiter, source } => {
                json!({ "Fn::Split": [delimiter, source.to_value()] })
            }
        }
    }

    pub fn from_value(value: &Value) -> Result<ListExpr, ResolveError> {
        match value {
            Value::Array(items) => Ok(ListExpr::Items(
                items.iter().map(Expr::from_value).collect::<Result<_, _>>()?,
            )),
            Value::Object(map) => match map.get("Fn::Split").and_then(Value::as_array) {
                Some(args) if args.len() == 2 => Ok(ListExpr::Split {
                    delimiter: expect_str(&args[0], "Fn::Split")?.to_string(),
                    source: Box::new(Expr::from_value(&args[1])?),
                }),
                _ => Err(ResolveError::MalformedIntrinsic(value.to_string())),
            },
            other => Err(ResolveError::MalformedIntrinsic(other.to_string())),
        }
    }

    fn collect_references(&self, out: &mut Vec<String>) {
        match self {
            ListExpr::Items(items) => items.iter().for_each(|e| e.collect_references(out)),
            ListExpr::Split { source, .. } => source.collect_references(out),
        }
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::Literal(value.to_string())
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::Literal(value)
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Expr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Expr::from_value(&value).map_err(de::Error::custom)
    }
}

/// String form of [`Expr::strip_scheme`]: removes every scheme occurrence,
/// as the split/join expression does once evaluated.
pub fn strip_scheme_str(s: &str) -> String {
    URL_SCHEMES
        .iter()
        .fold(s.to_string(), |acc, scheme| acc.split(scheme).collect::<String>())
}

/// `${Name}` and `${Id.Attr}` variables of an `Fn::Sub` template; `${!x}` escapes are skipped.
pub(crate) fn sub_variables(template: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        let name = &after[..end];
        if !name.starts_with('!') {
            out.push(name);
        }
        rest = &after[end + 1..];
    }
    out
}

fn parse_intrinsic(map: &JsonMap<String, Value>) -> Result<Expr, ResolveError> {
    let Some((key, arg)) = map.iter().next() else {
        return Err(ResolveError::MalformedIntrinsic("{}".to_string()));
    };
    let malformed = || ResolveError::MalformedIntrinsic(format!("{key}: {arg}"));
    match key.as_str() {
        "Ref" => Ok(Expr::Ref(expect_str(arg, key)?.to_string())),
        "Fn::GetAtt" => match arg {
            Value::String(s) => {
                let (id, attr) = s.split_once('.').ok_or_else(malformed)?;
                Ok(Expr::get_att(id, attr))
            }
            Value::Array(args) if args.len() == 2 => Ok(Expr::get_att(
                expect_str(&args[0], key)?,
                expect_str(&args[1], key)?,
            )),
            _ => Err(malformed()),
        },
        "Fn::Join" => match arg {
            Value::Array(args) if args.len() == 2 => Ok(Expr::Join {
                delimiter: expect_str(&args[0], key)?.to_string(),
                list: Box::new(ListExpr::from_value(&args[1])?),
            }),
            _ => Err(malformed()),
        },
        "Fn::Select" => match arg {
            Value::Array(args) if args.len() == 2 => {
                let index = match &args[0] {
                    Value::Number(n) => n.as_u64().map(|n| n as usize),
                    Value::String(s) => s.parse().ok(),
                    _ => None,
                }
                .ok_or_else(malformed)?;
                Ok(Expr::Select {
                    index,
                    list: Box::new(ListExpr::from_value(&args[1])?),
                })
            }
            _ => Err(malformed()),
        },
        "Fn::Sub" => Ok(Expr::Sub(expect_str(arg, key)?.to_string())),
        _ => Err(malformed()),
    }
}

fn expect_str<'a>(value: &'a Value, function: &str) -> Result<&'a str, ResolveError> {
    value
        .as_str()
        .ok_or_else(|| ResolveError::MalformedIntrinsic(format!("{function}: expected string, got {value}")))
}

fn merge_literals(parts: Vec<Expr>) -> Vec<Expr> {
    let mut out: Vec<Expr> = Vec::with_capacity(parts.len());
    for part in parts {
        if let Expr::Literal(s) = &part {
            if s.is_empty() {
                continue;
            }
            if let Some(Expr::Literal(prev)) = out.last_mut() {
                prev.push_str(s);
                continue;
            }
        }
        out.push(part);
    }
    out
}

const TOKEN_MARKER_PREFIX: &str = "${Token[";

fn token_marker(i: usize) -> String {
    format!("{TOKEN_MARKER_PREFIX}{i}]}}")
}

fn tokenize(value: &mut Value, tokens: &mut Vec<Expr>) {
    if Expr::is_intrinsic(value) {
        if let Ok(expr) = Expr::from_value(value) {
            *value = Value::String(token_marker(tokens.len()));
            tokens.push(expr);
        }
        return;
    }
    match value {
        Value::Array(items) => items.iter_mut().for_each(|v| tokenize(v, tokens)),
        Value::Object(map) => map.values_mut().for_each(|v| tokenize(v, tokens)),
        _ => {}
    }
}
