//! Resource grammar: `type:identifier[:sub]` addressing for the three
//! families of broker resource (plain messaging subjects, JetStream streams,
//! and KV buckets), with the wildcard rules each family and position allows.

use std::fmt;

use thiserror::Error;

use crate::template::contains_variables;

/// The three resource families nauts understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// Plain NATS core messaging subjects.
    Msg,
    /// JetStream streams.
    Js,
    /// JetStream KV buckets.
    Kv,
}

impl ResourceType {
    fn token(self) -> &'static str {
        match self {
            Self::Msg => "msg",
            Self::Js => "js",
            Self::Kv => "kv",
        }
    }

    fn parse(token: &str) -> Option<Self> {
        match token {
            "msg" => Some(Self::Msg),
            "js" => Some(Self::Js),
            "kv" => Some(Self::Kv),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A parsed resource reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Resource family.
    pub kind: ResourceType,
    /// Primary identifier: subject for `msg`, stream for `js`, bucket for `kv`.
    pub identifier: String,
    /// Secondary identifier: queue group for `msg`, consumer for `js`, key for `kv`.
    pub sub_identifier: Option<String>,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.identifier)?;
        if let Some(sub) = &self.sub_identifier {
            write!(f, ":{sub}")?;
        }
        Ok(())
    }
}

/// Errors raised while parsing or validating a resource reference.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResourceError {
    /// The resource string did not contain a recognized `type:` prefix.
    #[error("unknown resource type: {0}")]
    UnknownType(String),
    /// The identifier portion was empty.
    #[error("empty identifier in resource: {0}")]
    EmptyIdentifier(String),
    /// The sub-identifier portion was present but empty.
    #[error("empty sub-identifier in resource: {0}")]
    EmptySubIdentifier(String),
    /// A wildcard token appeared where this family/position forbids it.
    #[error("wildcard not permitted here: {0}")]
    WildcardNotPermitted(String),
    /// A `>` token appeared somewhere other than as the final dot-token.
    #[error("'>' must be the final token: {0}")]
    GreaterNotTerminal(String),
}

/// Split a raw resource string into `type`, `identifier`, and an optional
/// `sub_identifier`, on the first and second `:` respectively.
///
/// A value containing unresolved `{{ .. }}` template markers bypasses
/// wildcard validation here; callers must re-validate after interpolation.
pub fn parse_resource(raw: &str) -> Result<Resource, ResourceError> {
    let mut parts = raw.splitn(3, ':');
    let type_token = parts.next().unwrap_or_default();
    let kind = ResourceType::parse(type_token).ok_or_else(|| ResourceError::UnknownType(raw.to_string()))?;

    let identifier = parts
        .next()
        .ok_or_else(|| ResourceError::EmptyIdentifier(raw.to_string()))?;
    if identifier.is_empty() {
        return Err(ResourceError::EmptyIdentifier(raw.to_string()));
    }

    let sub_identifier = match parts.next() {
        Some("") => return Err(ResourceError::EmptySubIdentifier(raw.to_string())),
        Some(sub) => Some(sub.to_string()),
        None => None,
    };

    let resource = Resource {
        kind,
        identifier: identifier.to_string(),
        sub_identifier,
    };

    if contains_variables(raw) {
        return Ok(resource);
    }

    validate(&resource)?;
    Ok(resource)
}

/// Validate the wildcard rules for a fully-resolved resource (no remaining
/// template markers).
pub fn validate(resource: &Resource) -> Result<(), ResourceError> {
    match resource.kind {
        ResourceType::Msg => {
            validate_field(&resource.identifier, true, true)?;
            if let Some(sub) = &resource.sub_identifier {
                validate_field(sub, true, false)?;
            }
        }
        ResourceType::Js => {
            validate_field(&resource.identifier, true, false)?;
            if let Some(sub) = &resource.sub_identifier {
                validate_field(sub, true, false)?;
            }
        }
        ResourceType::Kv => {
            validate_field(&resource.identifier, true, false)?;
            if let Some(sub) = &resource.sub_identifier {
                validate_field(sub, true, true)?;
            }
        }
    }
    Ok(())
}

/// Validate a single dot-delimited field against the wildcard rules allowed
/// at that position.
fn validate_field(value: &str, allow_star: bool, allow_gt: bool) -> Result<(), ResourceError> {
    let tokens: Vec<&str> = value.split('.').collect();
    let last = tokens.len() - 1;
    for (i, tok) in tokens.iter().enumerate() {
        match *tok {
            ">" => {
                if !allow_gt {
                    return Err(ResourceError::WildcardNotPermitted(value.to_string()));
                }
                if i != last {
                    return Err(ResourceError::GreaterNotTerminal(value.to_string()));
                }
            }
            "*" => {
                if !allow_star {
                    return Err(ResourceError::WildcardNotPermitted(value.to_string()));
                }
            }
            t if t.contains('*') || t.contains('>') => {
                return Err(ResourceError::WildcardNotPermitted(value.to_string()));
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Parse ──────────────────────────────────────────────────────────

    #[test]
    fn parses_msg_resource_without_sub() {
        let r = parse_resource("msg:orders.new").unwrap();
        assert_eq!(r.kind, ResourceType::Msg);
        assert_eq!(r.identifier, "orders.new");
        assert_eq!(r.sub_identifier, None);
    }

    #[test]
    fn parses_msg_resource_with_queue() {
        let r = parse_resource("msg:orders.new:workers").unwrap();
        assert_eq!(r.sub_identifier.as_deref(), Some("workers"));
    }

    #[test]
    fn rejects_unknown_type() {
        assert!(matches!(
            parse_resource("bogus:foo"),
            Err(ResourceError::UnknownType(_))
        ));
    }

    #[test]
    fn rejects_empty_identifier() {
        assert!(matches!(
            parse_resource("msg:"),
            Err(ResourceError::EmptyIdentifier(_))
        ));
    }

    #[test]
    fn rejects_empty_sub_identifier() {
        assert!(matches!(
            parse_resource("msg:orders:"),
            Err(ResourceError::EmptySubIdentifier(_))
        ));
    }

    #[test]
    fn round_trips_through_display() {
        for raw in ["msg:orders.new", "msg:orders.new:workers", "kv:bucket:key"] {
            let r = parse_resource(raw).unwrap();
            let reparsed = parse_resource(&r.to_string()).unwrap();
            assert_eq!(r, reparsed);
        }
    }

    // ── Wildcard boundary rules ────────────────────────────────────────

    #[test]
    fn msg_identifier_allows_star_and_terminal_greater() {
        assert!(parse_resource("msg:orders.*").is_ok());
        assert!(parse_resource("msg:orders.>").is_ok());
    }

    #[test]
    fn msg_greater_must_be_terminal() {
        assert!(matches!(
            parse_resource("msg:orders.>.more"),
            Err(ResourceError::GreaterNotTerminal(_))
        ));
    }

    #[test]
    fn msg_greater_must_be_standalone_token() {
        assert!(matches!(
            parse_resource("msg:orders.foo>bar"),
            Err(ResourceError::WildcardNotPermitted(_))
        ));
    }

    #[test]
    fn msg_queue_disallows_greater() {
        assert!(matches!(
            parse_resource("msg:orders.new:workers.>"),
            Err(ResourceError::WildcardNotPermitted(_))
        ));
    }

    #[test]
    fn js_identifier_disallows_greater() {
        assert!(matches!(
            parse_resource("js:orders.>"),
            Err(ResourceError::WildcardNotPermitted(_))
        ));
        assert!(parse_resource("js:orders.*").is_ok());
    }

    #[test]
    fn kv_identifier_disallows_greater_but_key_allows_it() {
        assert!(matches!(
            parse_resource("kv:bucket.>"),
            Err(ResourceError::WildcardNotPermitted(_))
        ));
        assert!(parse_resource("kv:bucket:key.>").is_ok());
        assert!(parse_resource("kv:bucket:key.*").is_ok());
    }

    // ── Template bypass ────────────────────────────────────────────────

    #[test]
    fn unresolved_template_bypasses_validation() {
        // Would fail wildcard validation if checked eagerly (js disallows '>'),
        // but the template marker defers that check until after interpolation.
        let r = parse_resource("js:{{ user.attr.stream }}.>").unwrap();
        assert_eq!(r.identifier, "{{ user.attr.stream }}.>");
    }

    #[test]
    fn resolved_template_output_is_validated() {
        let r = Resource {
            kind: ResourceType::Js,
            identifier: "orders.>".to_string(),
            sub_identifier: None,
        };
        assert!(validate(&r).is_err());
    }
}
