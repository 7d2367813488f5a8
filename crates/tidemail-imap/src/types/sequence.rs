//! Sequence-set expansion and packing.
//!
//! IMAP sequence sets are comma-separated runs of message numbers or UIDs:
//! `1`, `1:5`, `1,3,5:10`, `12:*`. Expansion substitutes `*` with the
//! caller-provided highest value (EXISTS for sequence numbers, UIDNEXT-1 for
//! UID sets); packing is the inverse, producing the minimal run-length
//! encoding of an ascending list.

use crate::{Error, Result};

/// Expands a sequence set into the concrete numbers it covers.
///
/// `star` is the substitution value for `*`. Ranges may be written in either
/// direction (`5:1` equals `1:5`).
///
/// # Errors
///
/// Returns [`Error::Programming`] for an empty set or a malformed token.
pub fn expand_sequence(set: &str, star: u32) -> Result<Vec<u32>> {
    if set.trim().is_empty() {
        return Err(Error::Programming("empty sequence set".to_string()));
    }

    let mut out = Vec::new();
    for token in set.split(',') {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::Programming(format!("malformed sequence set: {set:?}")));
        }
        match token.split_once(':') {
            Some((lo, hi)) => {
                let lo = parse_seq_number(lo, star, set)?;
                let hi = parse_seq_number(hi, star, set)?;
                let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
                out.extend(lo..=hi);
            }
            None => out.push(parse_seq_number(token, star, set)?),
        }
    }
    Ok(out)
}

fn parse_seq_number(token: &str, star: u32, set: &str) -> Result<u32> {
    if token == "*" {
        return Ok(star);
    }
    token
        .parse::<u32>()
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| Error::Programming(format!("malformed sequence set: {set:?}")))
}

/// Packs a list of message numbers into the minimal sequence-set encoding.
///
/// The input is sorted ascending and deduplicated; adjacent numbers collapse
/// into `lo:hi` runs. An empty input produces an empty string.
#[must_use]
pub fn pack_sequence(numbers: &[u32]) -> String {
    let mut sorted: Vec<u32> = numbers.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut runs: Vec<String> = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return String::new();
    };

    let (mut lo, mut hi) = (first, first);
    for n in iter {
        if n == hi + 1 {
            hi = n;
        } else {
            runs.push(render_run(lo, hi));
            lo = n;
            hi = n;
        }
    }
    runs.push(render_run(lo, hi));
    runs.join(",")
}

fn render_run(lo: u32, hi: u32) -> String {
    if lo == hi {
        lo.to_string()
    } else {
        format!("{lo}:{hi}")
    }
}

/// Validates a sequence-set string without expanding it.
///
/// # Errors
///
/// Returns [`Error::Programming`] for an empty or malformed set.
pub fn validate_sequence(set: &str) -> Result<()> {
    if set.trim().is_empty() {
        return Err(Error::Programming("empty sequence set".to_string()));
    }
    for token in set.split(',') {
        let token = token.trim();
        let ok = match token.split_once(':') {
            Some((lo, hi)) => is_seq_number(lo) && is_seq_number(hi),
            None => is_seq_number(token),
        };
        if !ok {
            return Err(Error::Programming(format!("malformed sequence set: {set:?}")));
        }
    }
    Ok(())
}

fn is_seq_number(token: &str) -> bool {
    token == "*" || token.parse::<u32>().is_ok_and(|n| n > 0)
}
