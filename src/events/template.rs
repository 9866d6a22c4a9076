//! Path templates such as `prayerRequests/{requestId}/prayers/{userId}`

use std::collections::HashMap;
use std::fmt;

use crate::types::{HearthError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Parsed document path template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut names = Vec::new();

        for part in template.trim_matches('/').split('/') {
            if part.is_empty() {
                return Err(HearthError::Config(format!(
                    "empty segment in path template: {}",
                    template
                )));
            }

            match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(name) if !name.is_empty() => {
                    if names.contains(&name) {
                        return Err(HearthError::Config(format!(
                            "duplicate parameter {{{}}} in {}",
                            name, template
                        )));
                    }
                    names.push(name);
                    segments.push(Segment::Param(name.to_string()));
                }
                Some(_) => {
                    return Err(HearthError::Config(format!(
                        "unnamed parameter in path template: {}",
                        template
                    )))
                }
                None => segments.push(Segment::Literal(part.to_string())),
            }
        }

        if segments.len() % 2 != 0 {
            return Err(HearthError::Config(format!(
                "path template must name a document: {}",
                template
            )));
        }

        Ok(Self {
            raw: template.trim_matches('/').to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match a document path, extracting parameters
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(_) if part.is_empty() => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(PathParams(params))
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parameters extracted from a matched path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(HashMap<String, String>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Parameter that the route template guarantees
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| HearthError::Internal(format!("missing path parameter {}", name)))
    }
}
