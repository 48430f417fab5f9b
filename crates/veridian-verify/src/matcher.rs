//! Equality relations between on-chain and recompiled bytecode.

use std::fmt;

use veridian_core::bytecode::strip_metadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Byte-for-byte equality.
    Perfect,
    /// Equality after stripping the trailing metadata section on both sides.
    Partial,
    None,
}

impl MatchKind {
    pub fn is_match(&self) -> bool {
        !matches!(self, MatchKind::None)
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchKind::Perfect => "perfect",
            MatchKind::Partial => "partial",
            MatchKind::None => "none",
        })
    }
}

/// The strongest relation that holds between the two bytecodes.
///
/// Empty input on either side never matches, and a malformed metadata tail
/// fails the partial relation instead of matching on garbage.
pub fn match_bytecodes(onchain: &[u8], recompiled: &[u8]) -> MatchKind {
    if onchain.is_empty() || recompiled.is_empty() {
        return MatchKind::None;
    }
    if onchain == recompiled {
        return MatchKind::Perfect;
    }
    match (strip_metadata(onchain), strip_metadata(recompiled)) {
        (Some(a), Some(b)) if a == b => MatchKind::Partial,
        _ => MatchKind::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_tail(code: &[u8], aux: &[u8]) -> Vec<u8> {
        let mut out = code.to_vec();
        out.extend_from_slice(aux);
        out.extend_from_slice(&(aux.len() as u16).to_be_bytes());
        out
    }

    #[test]
    fn test_perfect() {
        let code = with_tail(&[0x60, 0x80], &[0xa0, 0x01]);
        assert_eq!(match_bytecodes(&code, &code), MatchKind::Perfect);
    }

    #[test]
    fn test_partial_on_differing_metadata() {
        let a = with_tail(&[0x60, 0x80], &[0xa0, 0x01]);
        let b = with_tail(&[0x60, 0x80], &[0xa0, 0x02]);
        assert_eq!(match_bytecodes(&a, &b), MatchKind::Partial);
    }

    #[test]
    fn test_partial_on_differing_metadata_lengths() {
        let a = with_tail(&[0x60, 0x80], &[0xa0, 0x01]);
        let b = with_tail(&[0x60, 0x80], &[0xa0, 0x02, 0x03]);
        assert_eq!(match_bytecodes(&a, &b), MatchKind::Partial);
    }

    #[test]
    fn test_none_on_differing_code() {
        let a = with_tail(&[0x60, 0x80], &[0xa0, 0x01]);
        let b = with_tail(&[0x60, 0x81], &[0xa0, 0x01]);
        assert_eq!(match_bytecodes(&a, &b), MatchKind::None);
    }

    #[test]
    fn test_malformed_tail_is_none() {
        // Identical executable parts but one side declares an auxdata
        // length larger than the code.
        let a = with_tail(&[0x60, 0x80], &[0xa0, 0x01]);
        let b = [0x60, 0x80, 0xff, 0xff];
        assert_eq!(match_bytecodes(&a, &b), MatchKind::None);
    }

    #[test]
    fn test_empty_never_matches() {
        assert_eq!(match_bytecodes(&[], &[]), MatchKind::None);
        assert_eq!(match_bytecodes(&[0x60], &[]), MatchKind::None);
    }
}
