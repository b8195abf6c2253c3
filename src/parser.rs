use regex::Regex;

/// Service/location pair pulled out of raw text. Either side may be absent;
/// the caller decides whether an empty service means "no intent".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    pub service: Option<String>,
    pub location: Option<String>,
}

/// Deterministic fallback for when the remote extractor is unreachable.
/// Recognizes "need/looking for X in/near/at/around Y" style queries.
pub struct LocalParser {
    connector: Regex,
    loose: Regex,
}

impl LocalParser {
    pub fn new() -> Self {
        Self {
            connector: Regex::new(
                r"(?i)(?:need|looking for|i need|please find)?\s*([a-z\s]+?)\s+(?:in|near|at|around)\s+([a-z\s]+)",
            )
            .expect("connector pattern is valid"),
            loose: Regex::new(r"(?i)^([a-z\s]+?)\s+([a-z0-9\-\s]+)$")
                .expect("loose pattern is valid"),
        }
    }

    /// Never fails outright: if neither pattern matches, the whole trimmed
    /// input becomes the service with no location.
    pub fn parse(&self, text: &str) -> ParsedQuery {
        if text.trim().is_empty() {
            return ParsedQuery {
                service: None,
                location: None,
            };
        }

        let lowered = text.to_lowercase();

        if let Some(caps) = self.connector.captures(&lowered) {
            return ParsedQuery {
                service: Some(caps[1].trim().to_string()),
                location: Some(caps[2].trim().to_string()),
            };
        }

        if let Some(caps) = self.loose.captures(&lowered) {
            return ParsedQuery {
                service: Some(caps[1].trim().to_string()),
                location: Some(caps[2].trim().to_string()),
            };
        }

        ParsedQuery {
            service: Some(text.trim().to_string()),
            location: None,
        }
    }
}

impl Default for LocalParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_pattern_splits_service_and_location() {
        let parser = LocalParser::new();
        let parsed = parser.parse("looking for a plumber near Delhi");
        assert_eq!(parsed.service.as_deref(), Some("a plumber"));
        assert_eq!(parsed.location.as_deref(), Some("delhi"));
    }

    #[test]
    fn connector_pattern_handles_in() {
        let parser = LocalParser::new();
        let parsed = parser.parse("need electrician in mumbai");
        assert_eq!(parsed.service.as_deref(), Some("electrician"));
        assert_eq!(parsed.location.as_deref(), Some("mumbai"));
    }

    #[test]
    fn loose_pattern_splits_first_word_group() {
        let parser = LocalParser::new();
        let parsed = parser.parse("plumber delhi-ncr");
        assert_eq!(parsed.service.as_deref(), Some("plumber"));
        assert_eq!(parsed.location.as_deref(), Some("delhi-ncr"));
    }

    #[test]
    fn unmatched_input_becomes_service_without_location() {
        let parser = LocalParser::new();
        let parsed = parser.parse("plumber");
        assert_eq!(parsed.service.as_deref(), Some("plumber"));
        assert_eq!(parsed.location, None);
    }

    #[test]
    fn whitespace_only_input_has_no_service() {
        let parser = LocalParser::new();
        let parsed = parser.parse("   ");
        assert_eq!(parsed.service, None);
        assert_eq!(parsed.location, None);
    }
}
