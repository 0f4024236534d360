//! Era classifier — deterministic, lexicon-based tagging of source style.
//!
//! Scores each era by marker density over the chunk's tokens and picks the
//! highest scorer above a minimum evidence bar. Ambiguous text defaults to
//! `Modern`, the least aggressive threshold/creativity setting, so
//! unclassified content is never over-rewritten.

use gradelit_core::Era;

/// Markers with characteristic early-modern inflections and pronouns.
const EARLY_MODERN_MARKERS: &[&str] = &[
    "thou", "thee", "thy", "thine", "ye", "hath", "doth", "dost", "didst", "shalt", "wilt",
    "art", "wherefore", "whence", "hither", "thither", "prithee", "'tis", "tis", "nay",
    "forsooth", "mayst", "canst", "hast",
];

/// Formal Victorian diction and British spellings.
const VICTORIAN_MARKERS: &[&str] = &[
    "whilst", "amongst", "endeavour", "endeavoured", "countenance", "carriage", "parlour",
    "drawing-room", "governess", "scarcely", "exceedingly", "agreeable", "disagreeable",
    "acquaintance", "connexion", "shew", "chuse", "herewith", "hitherto", "forthwith",
    "entreat", "vexed", "colour", "honour", "favour", "labour",
];

/// American 19th-century colloquial and dialect markers.
const AMERICAN_19C_MARKERS: &[&str] = &[
    "ain't", "warn't", "hain't", "reckon", "reckoned", "yonder", "by-and-by", "considerable",
    "mighty", "powerful", "tolerable", "betwixt", "sivilize", "kin", "dasn't", "'bout",
    "'spect", "allowed", "noways", "truck", "corn-pone", "raft", "injun",
];

/// Ordinary words that happen to end in "-eth".
const ETH_EXCEPTIONS: &[&str] = &[
    "teeth", "beneath", "underneath", "elizabeth", "macbeth", "twentieth", "thirtieth",
    "fortieth", "fiftieth", "sixtieth", "seventieth", "eightieth", "ninetieth",
];

/// Suffix evidence for early-modern verb inflections ("goeth", "speaketh").
fn has_eth_suffix(token: &str) -> bool {
    token.len() > 4 && token.ends_with("eth") && !ETH_EXCEPTIONS.contains(&token)
}

/// Classify the era of a chunk of prose.
///
/// Pure and pattern-based; a single pass over the tokens, so it stays
/// cheap enough to run inline on every ingested chunk.
pub fn classify_era(text: &str) -> Era {
    let tokens: Vec<String> = text
        .split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| c.is_ascii_punctuation() && c != '\'' && c != '-')
                .to_lowercase()
        })
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.is_empty() {
        return Era::Modern;
    }

    let mut early_modern = 0usize;
    let mut victorian = 0usize;
    let mut american_19c = 0usize;

    for token in &tokens {
        if EARLY_MODERN_MARKERS.contains(&token.as_str()) || has_eth_suffix(token) {
            early_modern += 1;
        }
        if VICTORIAN_MARKERS.contains(&token.as_str()) {
            victorian += 1;
        }
        if AMERICAN_19C_MARKERS.contains(&token.as_str()) {
            american_19c += 1;
        }
    }

    // Evidence bar: at least one marker per ~60 tokens, minimum one.
    let bar = (tokens.len() / 60).max(1);

    let best = early_modern.max(victorian).max(american_19c);
    if best < bar {
        return Era::Modern;
    }

    // Ties resolve oldest-first: early-modern markers are the rarest in
    // other eras, so their presence is the strongest signal.
    if early_modern == best {
        Era::EarlyModern
    } else if victorian == best {
        Era::Victorian
    } else {
        Era::American19c
    }
}
