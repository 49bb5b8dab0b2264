// src/matching/normalize.rs
// Canonicalizes raw item names prior to matching, and sanitizes free-text
// fields against markup injection. Both are pure functions.

use once_cell::sync::Lazy;
use regex::Regex;

/// Known-variant rewrites applied case-insensitively on word boundaries.
/// Every right-hand side is a fixed point of the whole rewrite-and-case
/// pipeline, which is what keeps `normalize` idempotent.
const VARIANT_REWRITES: [(&str, &str); 12] = [
    (r"vit\.?\s+c\b", "Vitamin C"),
    (r"vit\.?\s+d3?\b", "Vitamin D"),
    (r"vit\.?\s+b12\b", "Vitamin B12"),
    (r"omega[\s-]?3\b", "Omega-3"),
    (r"omega[\s-]?6\b", "Omega-6"),
    (r"co\s?q\s?10\b", "CoQ10"),
    (r"l\.\s*acidophilus\b", "Lactobacillus acidophilus"),
    (r"l\.\s*rhamnosus\b", "Lactobacillus rhamnosus"),
    (r"b\.\s*longum\b", "Bifidobacterium longum"),
    (r"b\.\s*bifidum\b", "Bifidobacterium bifidum"),
    (r"evoo\b", "Extra Virgin Olive Oil"),
    (r"msg\b", "Monosodium Glutamate"),
];

/// Stopwords kept lowercase unless they lead the name.
const STOPWORDS: [&str; 11] = [
    "and", "or", "of", "the", "in", "on", "at", "to", "for", "with", "by",
];

/// Punctuation treated as noise. Hyphens and periods survive; scientific
/// names and compound terms need them.
const NOISE_CHARS: [char; 10] = [',', ';', '"', '\'', '(', ')', '[', ']', '{', '}'];

static VARIANT_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    VARIANT_REWRITES
        .iter()
        .map(|(pat, repl)| {
            let re = Regex::new(&format!(r"(?i)\b{}", pat)).expect("invalid variant pattern");
            (re, *repl)
        })
        .collect()
});

static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("invalid tag pattern"));

/// Words appearing in variant rewrite outputs keep that exact spelling
/// through the casing pass ("acidophilus" stays lowercase, "CoQ10" keeps
/// its interior capitals), which keeps `normalize` idempotent.
static VARIANT_WORDS: Lazy<std::collections::HashMap<String, &'static str>> = Lazy::new(|| {
    let mut words = std::collections::HashMap::new();
    for (_, replacement) in VARIANT_REWRITES {
        for word in replacement.split(' ') {
            words.insert(word.to_lowercase(), word);
        }
    }
    words
});

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strips HTML tags and escapes what remains. Applied to every free-text
/// field (business name, address, bio, item names) before any normalization.
pub fn sanitize_free_text(raw: &str) -> String {
    let stripped = HTML_TAG_RE.replace_all(raw.trim(), "");
    let mut out = String::with_capacity(stripped.len());
    for c in stripped.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn is_stopword(word: &str) -> bool {
    let lower = word.to_lowercase();
    STOPWORDS.iter().any(|s| *s == lower)
}

/// Capitalizes one whitespace-delimited word, treating each hyphen- or
/// period-joined segment independently. Segments that already carry mixed
/// case (CoQ10, pH) are left alone; the variant table owns those spellings.
fn capitalize_word(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut segment = String::new();
    let flush = |segment: &mut String, out: &mut String| {
        if segment.is_empty() {
            return;
        }
        let has_upper = segment.chars().any(|c| c.is_uppercase());
        let has_lower = segment.chars().any(|c| c.is_lowercase());
        if has_upper && has_lower {
            out.push_str(segment);
        } else {
            let mut chars = segment.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(&chars.as_str().to_lowercase());
            }
        }
        segment.clear();
    };
    for c in word.chars() {
        if c == '-' || c == '.' {
            flush(&mut segment, &mut out);
            out.push(c);
        } else {
            segment.push(c);
        }
    }
    flush(&mut segment, &mut out);
    out
}

/// Canonicalizes a raw item name: whitespace, known-variant substitution,
/// noise punctuation, then word casing. Deterministic and idempotent;
/// empty input is returned unchanged.
pub fn normalize(raw: &str) -> String {
    if raw.trim().is_empty() {
        return raw.to_string();
    }

    let mut text = collapse_whitespace(raw);

    for (re, replacement) in VARIANT_PATTERNS.iter() {
        text = re.replace_all(&text, *replacement).into_owned();
    }

    text = text.chars().filter(|c| !NOISE_CHARS.contains(c)).collect();
    text = collapse_whitespace(&text);

    let mut words = Vec::new();
    for (i, word) in text.split(' ').enumerate() {
        if i > 0 && is_stopword(word) {
            words.push(word.to_lowercase());
        } else if let Some(canonical) = VARIANT_WORDS.get(&word.to_lowercase()) {
            words.push((*canonical).to_string());
        } else {
            words.push(capitalize_word(word));
        }
    }
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_and_cases_words() {
        assert_eq!(normalize("  organic   stevia  extract "), "Organic Stevia Extract");
        assert_eq!(normalize("SUNFLOWER OIL"), "Sunflower Oil");
    }

    #[test]
    fn applies_variant_table() {
        assert_eq!(normalize("vit c"), "Vitamin C");
        assert_eq!(normalize("omega 3"), "Omega-3");
        assert_eq!(normalize("coq10"), "CoQ10");
        assert_eq!(normalize("L. acidophilus"), "Lactobacillus acidophilus");
    }

    #[test]
    fn strips_noise_but_keeps_hyphens_and_periods() {
        assert_eq!(normalize("stevia, (raw)"), "Stevia Raw");
        assert_eq!(normalize("gluten-free flour"), "Gluten-Free Flour");
    }

    #[test]
    fn lowercases_stopwords_except_leading() {
        assert_eq!(normalize("oil of oregano"), "Oil of Oregano");
        assert_eq!(normalize("of the earth"), "Of the Earth");
    }

    #[test]
    fn normalization_is_idempotent() {
        for s in [
            "vit c",
            "omega 3 fish oil",
            "coq10",
            "L. acidophilus",
            "ORGANIC stevia, extract",
            "oil of oregano",
            "gluten-free flour",
            "",
            "   ",
        ] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn empty_input_unchanged() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "   ");
    }

    #[test]
    fn sanitizer_strips_tags_and_escapes() {
        assert_eq!(
            sanitize_free_text("<script>alert(1)</script>Acme & Co"),
            "alert(1)Acme &amp; Co"
        );
        assert_eq!(sanitize_free_text("  \"Best\" Foods  "), "&quot;Best&quot; Foods");
    }
}
