//! Slash-delimited topic patterns with single- and multi-segment
//! wildcards.

/// One segment of a topic pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*` — exactly one segment.
    Any,
    /// `**` — zero or more segments.
    Rest,
}

/// A parsed topic pattern, e.g. `tool.execute/shell/**`.
#[derive(Debug, Clone)]
pub struct TopicPattern {
    segments: Vec<Segment>,
    source: String,
}

impl TopicPattern {
    /// Parse a pattern. Empty segments are ignored, so `/a//b/` equals
    /// `a/b`.
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "*" => Segment::Any,
                "**" => Segment::Rest,
                literal => Segment::Literal(literal.to_string()),
            })
            .collect();
        Self {
            segments,
            source: pattern.to_string(),
        }
    }

    /// The original pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the pattern matches a topic.
    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        let parts: Vec<&str> = topic.split('/').filter(|s| !s.is_empty()).collect();
        match_segments(&self.segments, &parts)
    }
}

fn match_segments(pattern: &[Segment], topic: &[&str]) -> bool {
    match pattern.first() {
        None => topic.is_empty(),
        Some(Segment::Rest) => {
            // Greedy-or-empty: try consuming 0..=n topic segments.
            (0..=topic.len()).any(|skip| match_segments(&pattern[1..], &topic[skip..]))
        }
        Some(Segment::Any) => {
            !topic.is_empty() && match_segments(&pattern[1..], &topic[1..])
        }
        Some(Segment::Literal(expected)) => {
            topic.first() == Some(&expected.as_str())
                && match_segments(&pattern[1..], &topic[1..])
        }
    }
}
