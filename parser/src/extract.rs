use regex_lite::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::deal::Cashback;
use crate::deal::Coupon;
use crate::deal::Deal;

/// Parses one assistant reply into structured deals.
///
/// The text is segmented at each numbered bold item marker ("1. **Name**");
/// each segment is walked independently, so one malformed segment never
/// takes down the rest of the result set. A segment without an extractable
/// name yields nothing.
pub fn parse_deals(text: &str) -> Vec<Deal> {
    split_segments(text)
        .into_iter()
        .filter_map(|segment| {
            let deal = parse_segment(segment);
            if deal.is_none() {
                debug!("dropping segment without an offer name");
            }
            deal
        })
        .collect()
}

/// Slices the text between consecutive item markers. Preamble before the
/// first marker carries no offer and is ignored.
fn split_segments(text: &str) -> Vec<&str> {
    let starts: Vec<usize> = marker_re().find_iter(text).map(|m| m.start()).collect();
    let mut segments = Vec::with_capacity(starts.len());
    for (index, start) in starts.iter().enumerate() {
        let end = starts.get(index + 1).copied().unwrap_or(text.len());
        let segment = text[*start..end].trim();
        if !segment.is_empty() {
            segments.push(segment);
        }
    }
    segments
}

/// Which list the walker is currently collecting into.
#[derive(Clone, Copy, PartialEq)]
enum Section {
    Fields,
    Coupons,
    Cashback,
    Steps,
}

fn parse_segment(segment: &str) -> Option<Deal> {
    let name = capture(bold_re(), segment)?;

    let mut builder = DealBuilder::default();
    let mut section = Section::Fields;
    for raw_line in segment.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if contains(coupons_header_re(), line) {
            section = Section::Coupons;
            continue;
        }
        if contains(cashback_header_re(), line) {
            section = Section::Cashback;
            continue;
        }
        if contains(steps_header_re(), line) {
            section = Section::Steps;
            continue;
        }

        match section {
            Section::Fields => builder.scan_labeled_line(line),
            Section::Coupons => {
                // Any capitalized label line ends the list.
                if is_section_label(line) {
                    section = Section::Fields;
                    builder.scan_labeled_line(line);
                } else if let Some((code, description)) = coupon_entry(line) {
                    builder.coupons.push(Coupon { code, description });
                }
            }
            Section::Cashback => {
                if is_section_label(line) {
                    section = Section::Fields;
                    builder.scan_labeled_line(line);
                } else if let Some((platform, amount)) = cashback_entry(line) {
                    builder.cashback.push(Cashback { platform, amount });
                }
            }
            Section::Steps => {
                if is_section_label(line) {
                    section = Section::Fields;
                    builder.scan_labeled_line(line);
                } else {
                    let step = step_prefix_re().replace(line, "").trim().to_string();
                    if !step.is_empty() {
                        builder.steps.push(step);
                    }
                }
            }
        }
    }

    Some(builder.build(name))
}

#[derive(Default)]
struct DealBuilder {
    current_price: Option<String>,
    original_price: Option<String>,
    description: Option<String>,
    product_link: Option<String>,
    expiration: Option<String>,
    coupons: Vec<Coupon>,
    cashback: Vec<Cashback>,
    steps: Vec<String>,
}

impl DealBuilder {
    /// Picks up any labeled fields present on the line. First occurrence
    /// wins; labels may share a line with the item marker itself.
    fn scan_labeled_line(&mut self, line: &str) {
        if self.current_price.is_none() {
            self.current_price = capture(current_price_re(), line).map(|raw| strip_price(&raw));
        }
        if self.original_price.is_none() {
            self.original_price = capture(original_price_re(), line).map(|raw| strip_price(&raw));
        }
        if self.description.is_none() {
            self.description = capture(description_re(), line);
        }
        if self.product_link.is_none() {
            self.product_link = capture(link_re(), line);
        }
        if self.expiration.is_none() {
            self.expiration = capture(expiration_re(), line);
        }
    }

    fn build(self, name: String) -> Deal {
        Deal {
            name,
            current_price: self.current_price,
            original_price: self.original_price,
            description: self.description,
            product_link: self.product_link,
            expiration: self.expiration,
            coupons: self.coupons,
            cashback: self.cashback,
            steps: self.steps,
        }
    }
}

/// `CODE - description` bullet; both halves must be non-empty.
fn coupon_entry(line: &str) -> Option<(String, String)> {
    let captures = coupon_re().captures(line)?;
    let code = captures.get(1)?.as_str().trim();
    let description = captures.get(2)?.as_str().trim();
    if code.is_empty() || description.is_empty() {
        return None;
    }
    Some((code.to_string(), description.to_string()))
}

/// `- platform: amount` bullet; both halves must be non-empty.
fn cashback_entry(line: &str) -> Option<(String, String)> {
    let captures = cashback_re().captures(line)?;
    let platform = captures.get(1)?.as_str().trim();
    let amount = captures.get(2)?.as_str().trim();
    if platform.is_empty() || amount.is_empty() {
        return None;
    }
    Some((platform.to_string(), amount.to_string()))
}

fn is_section_label(line: &str) -> bool {
    contains(section_label_re(), line)
}

/// Keeps digits and the decimal point, dropping currency symbols and
/// thousands separators.
fn strip_price(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect()
}

fn capture(re: &Regex, haystack: &str) -> Option<String> {
    let text = re.captures(haystack)?.get(1)?.as_str().trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}

fn contains(re: &Regex, haystack: &str) -> bool {
    re.is_match(haystack)
}

macro_rules! cached_regex {
    ($name:ident, $pattern:expr) => {
        // Patterns are compile-time constants; failing to build one is a bug.
        #[expect(clippy::unwrap_used)]
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).unwrap())
        }
    };
}

cached_regex!(marker_re, r"\d+\.\s*\*\*");
cached_regex!(bold_re, r"\*\*([^*]+)\*\*");
cached_regex!(
    current_price_re,
    r"(?i)current\s*price[^0-9\n]*([0-9][0-9,]*(?:\.[0-9]+)?)"
);
cached_regex!(
    original_price_re,
    r"(?i)original\s*price[^0-9\n]*([0-9][0-9,]*(?:\.[0-9]+)?)"
);
cached_regex!(description_re, r"(?i)description\s*:\s*([^\n]+)");
cached_regex!(link_re, r"(?i)(?:product\s*)?link\s*:\s*([^\n]+)");
cached_regex!(expiration_re, r"(?i)expir(?:ation|es)[^:\n]*:\s*([^\n]+)");
cached_regex!(coupons_header_re, r"(?i)available\s+coupons");
cached_regex!(cashback_header_re, r"(?i)cashback\s+offers");
cached_regex!(steps_header_re, r"(?i)how\s+to\s+get\s+this\s+deal");
cached_regex!(coupon_re, r"^(?:[-*•]\s+)?(\S+)\s*-\s*(.+)$");
cached_regex!(cashback_re, r"^[-*•]\s*([^:]+)\s*:\s*(.+)$");
cached_regex!(step_prefix_re, r"^(?:\d+[.)]\s*|[-*•]\s*)");
cached_regex!(section_label_re, r"^\*{0,2}[A-Z][A-Za-z0-9 '&/-]*\*{0,2}\s*:");
