//! Orthographic rules for historical print.
//!
//! Symbols in the character indexer are strings: a base letter optionally
//! decorated with diacritics, written either as backslash escapes preceding
//! the letter (`\'o`, `\~n`), as Unicode combining marks following it, or as
//! a precomposed Latin letter (`ó`, `ñ`). The helpers here reduce a symbol to
//! its base letter, and [`OrthographyRules`] derives the side tables that gate
//! which glyph substitutions receive smoothing mass.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

use super::indexer::SymbolIndexer;

/// The space symbol.
pub const SPACE: &str = " ";
/// The hyphen symbol.
pub const HYPHEN: &str = "-";
/// The long-s symbol.
pub const LONG_S: &str = "|";
/// Escape prefix marking a tilde over the following letter.
pub const TILDE_ESCAPE: &str = "\\~";
/// Unicode combining tilde.
pub const TILDE_COMBINING: char = '\u{0303}';

const COMBINING_RANGE: std::ops::RangeInclusive<char> = '\u{0300}'..='\u{036F}';

/// Symbols whose rendering may be swapped for a visually similar letter.
pub const CHARS_THAT_CAN_BE_REPLACED: [&str; 5] = ["s", "u", "v", "i", "j"];

/// Letters that may stand in for a replaceable symbol.
pub const VALID_SUBSTITUTION_CHARS: [&str; 6] = ["u", "v", "i", "j", "f", "l"];

// (precomposed, base letter, carries a tilde)
static PRECOMPOSED: Lazy<HashMap<char, (char, bool)>> = Lazy::new(|| {
    let table: &[(&str, char, bool)] = &[
        ("àáâäāă", 'a', false),
        ("ã", 'a', true),
        ("èéêëēĕ", 'e', false),
        ("ẽ", 'e', true),
        ("ìíîïīĭı", 'i', false),
        ("ĩ", 'i', true),
        ("òóôöōŏ", 'o', false),
        ("õ", 'o', true),
        ("ùúûüūŭ", 'u', false),
        ("ũ", 'u', true),
        ("ñ", 'n', true),
        ("ç", 'c', false),
        ("ÀÁÂÄĀĂ", 'A', false),
        ("Ã", 'A', true),
        ("ÈÉÊËĒĔ", 'E', false),
        ("Ẽ", 'E', true),
        ("ÌÍÎÏĪĬ", 'I', false),
        ("Ĩ", 'I', true),
        ("ÒÓÔÖŌŎ", 'O', false),
        ("Õ", 'O', true),
        ("ÙÚÛÜŪŬ", 'U', false),
        ("Ũ", 'U', true),
        ("Ñ", 'N', true),
        ("Ç", 'C', false),
    ];
    let mut map = HashMap::new();
    for (letters, base, tilde) in table {
        for c in letters.chars() {
            map.insert(c, (*base, *tilde));
        }
    }
    map
});

/// A symbol split into its base letter and diacritic markers.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DecomposedSymbol {
    base: char,
    decorated: bool,
    tilde: bool,
}

fn decompose(symbol: &str) -> Option<DecomposedSymbol> {
    let mut rest = symbol;
    let mut decorated = false;
    let mut tilde = false;

    // Escapes precede the letter; `\\` is a literal backslash, not an escape.
    while rest.starts_with('\\') && !rest.starts_with("\\\\") {
        let mut chars = rest.chars();
        chars.next();
        let marker = chars.next()?;
        decorated = true;
        tilde |= marker == '~';
        rest = chars.as_str();
    }

    let mut chars = rest.chars();
    let mut base = chars.next()?;
    if base == '\\' {
        // literal backslash consumes its doubled form
        chars.next();
    }
    if let Some(&(plain, has_tilde)) = PRECOMPOSED.get(&base) {
        base = plain;
        decorated = true;
        tilde |= has_tilde;
    }
    for c in chars {
        if COMBINING_RANGE.contains(&c) {
            decorated = true;
            tilde |= c == TILDE_COMBINING;
        }
    }
    Some(DecomposedSymbol {
        base,
        decorated,
        tilde,
    })
}

/// Returns `symbol` with every diacritic removed.
///
/// Symbols that cannot be decomposed are returned unchanged.
pub fn base_letter(symbol: &str) -> String {
    match decompose(symbol) {
        Some(d) if d.decorated => d.base.to_string(),
        _ => symbol.to_string(),
    }
}

/// Whether the symbol carries at least one diacritic.
pub fn has_diacritic(symbol: &str) -> bool {
    decompose(symbol).is_some_and(|d| d.decorated)
}

/// Whether the symbol carries a tilde.
pub fn has_tilde(symbol: &str) -> bool {
    decompose(symbol).is_some_and(|d| d.tilde)
}

/// Punctuation is anything whose base letter is neither alphabetic nor a digit.
pub fn is_punctuation(symbol: &str) -> bool {
    match decompose(symbol) {
        Some(d) => !d.base.is_alphabetic() && !d.base.is_numeric(),
        None => true,
    }
}

/// The spellings under which a tilde-decorated `base` may appear in an indexer.
pub fn tilde_forms(base: &str) -> Vec<String> {
    let mut forms = vec![
        format!("{TILDE_ESCAPE}{base}"),
        format!("{base}{TILDE_COMBINING}"),
    ];
    if let Some(b) = base.chars().next() {
        forms.extend(
            PRECOMPOSED
                .iter()
                .filter(|(_, (plain, tilde))| *plain == b && *tilde)
                .map(|(c, _)| c.to_string()),
        );
    }
    forms
}

/// Hand-authored orthographic side tables derived from a character indexer.
///
/// These sets are fixed for a run and decide which `(lm char, glyph)` cells
/// of the substitution model may ever receive probability mass.
#[derive(Debug, Clone, Default)]
pub struct OrthographyRules {
    /// Characters that may be silently dropped.
    pub can_be_elided: HashSet<usize>,
    /// Characters that may be printed as a doubled letter.
    pub can_be_doubled: HashSet<usize>,
    /// Characters whose rendering may be swapped for a look-alike.
    pub can_be_replaced: HashSet<usize>,
    /// Characters that may stand in for a replaceable character.
    pub valid_substitutions: HashSet<usize>,
    /// Character to its elision-tilde-decorated counterpart.
    pub add_tilde: HashMap<usize, usize>,
    /// Decorated character to its undecorated base letter.
    pub diacritic_disregard: HashMap<usize, usize>,
    /// Index of `s`, when present.
    pub s_char: Option<usize>,
    /// Index of long-s, when present.
    pub long_s_char: Option<usize>,
    /// Index of `f`, when present.
    pub f_char: Option<usize>,
    /// Index of `l`, when present.
    pub l_char: Option<usize>,
    /// Index of the hyphen, when present.
    pub hyphen_char: Option<usize>,
    /// Index of the space, when present.
    pub space_char: Option<usize>,
}

impl OrthographyRules {
    /// Derives every side table from the characters in `indexer`.
    pub fn from_indexer(indexer: &SymbolIndexer) -> Self {
        let mut rules = Self {
            s_char: indexer.get_index("s"),
            long_s_char: indexer.get_index(LONG_S),
            f_char: indexer.get_index("f"),
            l_char: indexer.get_index("l"),
            hyphen_char: indexer.get_index(HYPHEN),
            space_char: indexer.get_index(SPACE),
            ..Self::default()
        };

        rules.can_be_replaced = CHARS_THAT_CAN_BE_REPLACED
            .iter()
            .filter_map(|c| indexer.get_index(c))
            .collect();
        rules.valid_substitutions = VALID_SUBSTITUTION_CHARS
            .iter()
            .filter_map(|c| indexer.get_index(c))
            .collect();

        for (i, symbol) in indexer.iter() {
            if is_punctuation(symbol) {
                continue;
            }
            let base = base_letter(symbol);
            if !has_diacritic(symbol) {
                rules.can_be_elided.insert(i);
                rules.can_be_doubled.insert(i);
            } else if let Some(b) = indexer.get_index(&base) {
                rules.diacritic_disregard.insert(i, b);
            }
            if !has_tilde(symbol)
                && let Some(t) = tilde_forms(&base)
                    .iter()
                    .find_map(|form| indexer.get_index(form))
            {
                rules.add_tilde.insert(i, t);
            }
        }
        rules
    }
}
