use crate::resolver::{ResolutionResult, SearchStatus};

/// Channel-agnostic outbound reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPayload {
    pub text: String,
    pub count: usize,
}

/// Render a resolution into reply text. Pure; the channel glue decides
/// whether and how to deliver it.
pub fn format_reply(result: &ResolutionResult) -> ReplyPayload {
    let near = match &result.query.location {
        Some(location) => format!(" near {}", location),
        None => String::new(),
    };

    if result.status == SearchStatus::Empty || result.listings.is_empty() {
        return ReplyPayload {
            text: format!(
                "⚠️ No listings found for \"{}\"{}.",
                result.query.service, near
            ),
            count: 0,
        };
    }

    let mut text = format!(
        "✅ Found {} result(s) for \"{}\"{}:\n\n",
        result.listings.len(),
        result.query.service,
        near
    );

    for listing in &result.listings {
        text.push_str(&format!("🔹 {}\n🔗 {}\n", listing.title, listing.url));
        if let Some(phone) = &listing.phone {
            text.push_str(&format!("📞 {}\n", phone));
        }
        if let Some(excerpt) = &listing.excerpt {
            text.push_str(&format!("📝 {}\n", excerpt));
        }
        text.push('\n');
    }

    ReplyPayload {
        count: result.listings.len(),
        text: text.trim_end().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listings::ListingRecord;
    use crate::resolver::QueryEcho;

    fn found(listings: Vec<ListingRecord>) -> ResolutionResult {
        ResolutionResult {
            status: SearchStatus::Found,
            listings,
            query: QueryEcho {
                service: "plumber".to_string(),
                location: Some("delhi".to_string()),
            },
        }
    }

    #[test]
    fn found_reply_names_count_service_and_listings() {
        let reply = format_reply(&found(vec![
            ListingRecord {
                id: Some(1),
                title: "Delhi Plumbing Co".to_string(),
                url: "https://example.com/listing/1".to_string(),
                phone: Some("+91 11 2345 6789".to_string()),
                excerpt: Some("24/7 emergency plumbing".to_string()),
            },
            ListingRecord {
                id: Some(2),
                title: "Pipe Masters".to_string(),
                url: "https://example.com/listing/2".to_string(),
                phone: None,
                excerpt: None,
            },
        ]));

        assert_eq!(reply.count, 2);
        assert!(reply.text.contains("Found 2 result(s) for \"plumber\" near delhi"));
        assert!(reply.text.contains("Delhi Plumbing Co"));
        assert!(reply.text.contains("https://example.com/listing/1"));
        assert!(reply.text.contains("+91 11 2345 6789"));
        assert!(reply.text.contains("24/7 emergency plumbing"));
        assert!(reply.text.contains("Pipe Masters"));
    }

    #[test]
    fn optional_lines_are_omitted_when_absent() {
        let reply = format_reply(&found(vec![ListingRecord {
            id: Some(2),
            title: "Pipe Masters".to_string(),
            url: "https://example.com/listing/2".to_string(),
            phone: None,
            excerpt: None,
        }]));
        assert!(!reply.text.contains("📞"));
        assert!(!reply.text.contains("📝"));
    }

    #[test]
    fn empty_result_echoes_the_query() {
        let reply = format_reply(&ResolutionResult {
            status: SearchStatus::Empty,
            listings: Vec::new(),
            query: QueryEcho {
                service: "plumber".to_string(),
                location: None,
            },
        });

        assert_eq!(reply.count, 0);
        assert!(reply.text.contains("No listings found for \"plumber\""));
        assert!(!reply.text.contains("near"));
    }
}
