//! Bag-of-subjects features for a pair of logical expressions.

use std::collections::HashMap;

use reasoner::Expression;

/// Fixed vocabulary mapping symbol names to feature indices.
///
/// Index 0 is the unknown-symbol bucket; the i-th subject maps to `i + 1`.
/// Words are carried alongside for checkpoint compatibility but do not
/// contribute features.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolTable {
    subjects: Vec<String>,
    words: Vec<String>,
    subject_index: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn new(subjects: Vec<String>, words: Vec<String>) -> Self {
        let subject_index = index_of(&subjects);
        if subject_index.len() != subjects.len() {
            tracing::warn!(
                subjects = subjects.len(),
                distinct = subject_index.len(),
                "Duplicate subjects in vocabulary; later entries win"
            );
        }
        Self {
            subjects,
            words,
            subject_index,
        }
    }

    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn num_subjects(&self) -> usize {
        self.subjects.len()
    }

    pub fn num_words(&self) -> usize {
        self.words.len()
    }

    /// Feature index of a subject, or `None` for unknown symbols.
    pub fn subject(&self, symbol: &str) -> Option<usize> {
        self.subject_index.get(symbol).copied()
    }
}

fn index_of(symbols: &[String]) -> HashMap<String, usize> {
    symbols
        .iter()
        .enumerate()
        .map(|(i, s)| (s.clone(), i + 1))
        .collect()
}

/// Maps an expression pair to a `2 * (num_subjects + 1)` feature vector.
#[derive(Debug, Clone)]
pub struct Vectorizer {
    table: SymbolTable,
}

impl Vectorizer {
    pub fn new(table: SymbolTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    /// Width of one expression's segment.
    pub fn segment_len(&self) -> usize {
        self.table.num_subjects() + 1
    }

    /// Total feature vector length.
    pub fn input_dim(&self) -> usize {
        2 * self.segment_len()
    }

    pub fn vectorize(&self, pair: (&Expression, &Expression)) -> Vec<f32> {
        let seg = self.segment_len();
        let mut features = vec![0.0_f32; 2 * seg];
        for (offset, expr) in [(0, pair.0), (seg, pair.1)] {
            for symbol in expr.constants() {
                let idx = self.table.subject(symbol).unwrap_or(0);
                features[offset + idx] = 1.0;
            }
        }
        features
    }

    pub fn vectorize_all<'a, I>(&self, pairs: I) -> Vec<Vec<f32>>
    where
        I: IntoIterator<Item = (&'a Expression, &'a Expression)>,
    {
        pairs.into_iter().map(|p| self.vectorize(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SymbolTable {
        SymbolTable::new(
            ["a", "b", "distanceAt", "distanceBetweenBoundedBy"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            vec![],
        )
    }

    #[test]
    fn test_subject_indices_start_at_one() {
        let t = table();
        assert_eq!(t.subject("a"), Some(1));
        assert_eq!(t.subject("distanceBetweenBoundedBy"), Some(4));
        assert_eq!(t.subject("c"), None);
    }

    #[test]
    fn test_vector_layout() {
        let v = Vectorizer::new(table());
        let left = Expression::new("distanceAt(a, 3, 0)");
        let right = Expression::new("distanceBetweenBoundedBy(D1, Item1, b, T)");
        let x = v.vectorize((&left, &right));

        assert_eq!(x.len(), 10);
        // left: "3" and "0" are unknown, a and distanceAt known
        assert_eq!(&x[..5], &[1.0, 1.0, 0.0, 1.0, 0.0]);
        // right: b and distanceBetweenBoundedBy, no unknowns
        assert_eq!(&x[5..], &[0.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_vectorize_is_deterministic() {
        let v = Vectorizer::new(table());
        let l = Expression::new("distanceAt(b, 7, 12)");
        let r = Expression::new("distanceAt(Item2, D2, T)");
        assert_eq!(v.vectorize((&l, &r)), v.vectorize((&l, &r)));
    }

    #[test]
    fn test_empty_vocabulary() {
        let v = Vectorizer::new(SymbolTable::new(vec![], vec![]));
        let e = Expression::new("p(a)");
        assert_eq!(v.vectorize((&e, &e)), vec![1.0, 1.0]);
        assert_eq!(v.input_dim(), 2);
    }
}
