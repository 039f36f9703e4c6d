use crate::error::DefinitionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP method a function is reachable with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
    #[serde(rename = "PUT")]
    Put,
}

impl Method {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A function served over HTTP at `host:port` + `path`.
///
/// Host and port are resolved when the definition is parsed, so two calls
/// compare equal exactly when method, host, port and path all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HttpCall {
    pub method: Method,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl HttpCall {
    /// Parse a `host[:port]/path` URI, appending `default_port` when the
    /// authority has none.
    pub fn parse(method: Method, uri: &str, default_port: u16) -> Result<Self, DefinitionError> {
        let (authority, path) = match uri.find('/') {
            Some(idx) => uri.split_at(idx),
            None => (uri, ""),
        };
        let invalid = || DefinitionError::InvalidAddress {
            address: authority.to_string(),
        };

        let (host, port) = if let Some(rest) = authority.strip_prefix('[') {
            // Bracketed IPv6 literal, optionally followed by ":port".
            let close = rest.find(']').ok_or_else(invalid)?;
            let host = &authority[..close + 2];
            match &rest[close + 1..] {
                "" => (host, None),
                tail => (host, Some(tail.strip_prefix(':').ok_or_else(invalid)?)),
            }
        } else {
            match authority.rsplit_once(':') {
                Some((host, _)) if host.contains(':') => return Err(invalid()),
                Some((host, port)) => (host, Some(port)),
                None => (authority, None),
            }
        };

        let port = match port {
            Some(port) => port.parse::<u16>().map_err(|_| invalid())?,
            None => default_port,
        };

        Ok(Self {
            method,
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    /// `host:port/path`, the part of the canonical key after the method.
    pub fn uri(&self) -> String {
        format!("{}:{}{}", self.host, self.port, self.path)
    }

    /// Address to dial. A definition written without a host targets the
    /// local node.
    pub fn url(&self) -> String {
        let host = if self.host.is_empty() {
            "localhost"
        } else {
            self.host.as_str()
        };
        format!("http://{}:{}{}", host, self.port, self.path)
    }

    pub fn targets(&self, host: &str, port: u16) -> bool {
        self.host == host && self.port == port
    }
}

impl fmt::Display for HttpCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}{}", self.method, self.host, self.port, self.path)
    }
}

/// A node of the call graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FunctionDefinition {
    /// Reachable over HTTP; evaluating it dials another node.
    Http(HttpCall),
    /// Named pointer to another entry of the same tree.
    Reference { name: String },
    /// Inert value.
    Literal { data: String },
}

impl FunctionDefinition {
    pub fn parse(tag: &str, data: &str, default_port: u16) -> Result<Self, DefinitionError> {
        if let Some(method) = Method::parse(tag) {
            return HttpCall::parse(method, data, default_port).map(FunctionDefinition::Http);
        }

        match tag {
            "CALL" => Ok(FunctionDefinition::Reference {
                name: data.to_string(),
            }),
            "DATA" => Ok(FunctionDefinition::Literal {
                data: data.to_string(),
            }),
            _ => Err(DefinitionError::UnknownType {
                tag: tag.to_string(),
            }),
        }
    }

    /// Parse a `"<TYPE> <data>"` key. Exactly two whitespace-separated
    /// tokens are accepted.
    pub fn parse_key(key: &str, default_port: u16) -> Result<Self, DefinitionError> {
        let mut tokens = key.split_whitespace();
        match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(tag), Some(data), None) => Self::parse(tag, data, default_port),
            _ => Err(DefinitionError::InvalidKey {
                key: key.to_string(),
            }),
        }
    }

    /// True for definitions that forward to another tree entry or node.
    pub fn is_reference(&self) -> bool {
        match self {
            FunctionDefinition::Http(_) | FunctionDefinition::Reference { .. } => true,
            FunctionDefinition::Literal { .. } => false,
        }
    }

    pub fn as_http(&self) -> Option<&HttpCall> {
        match self {
            FunctionDefinition::Http(call) => Some(call),
            _ => None,
        }
    }

    /// Name used when reporting an unresolved forward to this definition.
    pub fn reference_name(&self) -> String {
        match self {
            FunctionDefinition::Reference { name } => name.clone(),
            other => other.to_string(),
        }
    }
}

impl From<HttpCall> for FunctionDefinition {
    fn from(call: HttpCall) -> Self {
        FunctionDefinition::Http(call)
    }
}

impl fmt::Display for FunctionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionDefinition::Http(call) => call.fmt(f),
            FunctionDefinition::Reference { name } => write!(f, "CALL {name}"),
            FunctionDefinition::Literal { data } => write!(f, "DATA {data}"),
        }
    }
}
