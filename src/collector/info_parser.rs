//! INFO bulk-reply parser
//!
//! ```text
//! # Server\r\n
//! redis_version:7.2.4\r\n
//! redis_mode:standalone\r\n
//! ```
//!
//! Section headers and blank lines are skipped. Every other line is split on
//! its first `:`; a later duplicate name overwrites an earlier one. Lines
//! without a `:` are dropped rather than failing the whole reply, which keeps
//! the collector working across minor protocol drift between server versions.

use std::collections::BTreeMap;

use tracing::trace;

/// Field name to field value, for one INFO category
pub type ParsedStats = BTreeMap<String, String>;

pub fn parse_info_reply(raw: &str) -> ParsedStats {
    let mut stats = ParsedStats::new();

    for line in raw.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() || is_section_header(line) {
            trace!("Skipping reply line {:?}", line);
            continue;
        }

        match line.split_once(':') {
            Some((name, value)) => {
                stats.insert(name.to_string(), value.to_string());
            }
            None => trace!("Dropping line without separator {:?}", line),
        }
    }

    stats
}

/// `^\s*#\s*\w+\s*$`
fn is_section_header(line: &str) -> bool {
    let Some(rest) = line.trim_start().strip_prefix('#') else {
        return false;
    };
    let word = rest.trim();
    !word.is_empty() && word.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
