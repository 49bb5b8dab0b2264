// src/matching/semantic.rs
// Category-based veto for batch high-confidence approval. String similarity
// alone occasionally pairs names that are lexically close but semantically
// wrong ("Vitamin C" vs "Amino C-Complex"); this guard is deliberately
// conservative and gates only the batch path, never the per-item classifier.

/// Keyword sets for mutually exclusive item categories.
const CATEGORY_KEYWORDS: [(&str, &[&str]); 9] = [
    ("vitamin", &["vitamin"]),
    ("amino", &["amino"]),
    ("mineral", &["calcium", "iron", "zinc", "magnesium", "selenium"]),
    ("omega", &["omega"]),
    ("probiotic", &["probiotic", "lactobacillus", "bifidobacterium"]),
    ("prebiotic", &["prebiotic", "inulin", "fructooligosaccharide"]),
    ("certification", &["certified", "certification"]),
    ("additive", &["additive", "preservative"]),
    ("adhesive", &["adhesive", "glue", "sealant"]),
];

/// Known-problematic cross-category confusions observed in practice.
const CONFLICTING_CATEGORIES: [(&str, &str); 6] = [
    ("vitamin", "amino"),
    ("additive", "adhesive"),
    ("probiotic", "prebiotic"),
    ("mineral", "vitamin"),
    ("omega", "amino"),
    ("certification", "additive"),
];

/// Names whose lengths differ by more than this ratio are implausible
/// matches regardless of category.
const MAX_LENGTH_RATIO: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub category: String,
    pub keywords: Vec<String>,
}

/// The rule table is heuristic and hand-tuned to observed false positives,
/// so it is pluggable: `Default` supplies the built-in rules and the
/// constructor accepts replacements.
#[derive(Debug, Clone)]
pub struct SemanticGuard {
    categories: Vec<CategoryRule>,
    conflicts: Vec<(String, String)>,
    max_length_ratio: f64,
}

impl Default for SemanticGuard {
    fn default() -> Self {
        let categories = CATEGORY_KEYWORDS
            .iter()
            .map(|(category, keywords)| CategoryRule {
                category: category.to_string(),
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
            })
            .collect();
        let conflicts = CONFLICTING_CATEGORIES
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        Self::new(categories, conflicts, MAX_LENGTH_RATIO)
    }
}

impl SemanticGuard {
    pub fn new(
        categories: Vec<CategoryRule>,
        conflicts: Vec<(String, String)>,
        max_length_ratio: f64,
    ) -> Self {
        Self {
            categories,
            conflicts,
            max_length_ratio,
        }
    }

    fn categories_of(&self, name: &str) -> Vec<&str> {
        let lower = name.to_lowercase();
        self.categories
            .iter()
            .filter(|rule| rule.keywords.iter().any(|k| lower.contains(k.as_str())))
            .map(|rule| rule.category.as_str())
            .collect()
    }

    /// Returns false (veto) when the two names fall on opposite sides of a
    /// known-problematic category boundary, or when their lengths differ by
    /// more than the configured ratio. Pure and stateless.
    pub fn is_plausible(&self, original_name: &str, suggested_name: &str) -> bool {
        let len_a = original_name.chars().count().max(1) as f64;
        let len_b = suggested_name.chars().count().max(1) as f64;
        if len_a.max(len_b) / len_a.min(len_b) > self.max_length_ratio {
            return false;
        }

        let cats_a = self.categories_of(original_name);
        let cats_b = self.categories_of(suggested_name);
        for (x, y) in &self.conflicts {
            let a_x = cats_a.contains(&x.as_str());
            let a_y = cats_a.contains(&y.as_str());
            let b_x = cats_b.contains(&x.as_str());
            let b_y = cats_b.contains(&y.as_str());
            // Opposite sides only: a name sitting in both categories is
            // ambiguous, not conflicting.
            if (a_x && !a_y && b_y && !b_x) || (a_y && !a_x && b_x && !b_y) {
                return false;
            }
        }
        true
    }
}
