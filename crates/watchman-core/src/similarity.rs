//! Name similarity primitives.
//!
//! Fuzzy comparison happens over the tokenized significant terms produced
//! by [`crate::normalize`]. The base measure is Jaro-Winkler (via
//! [`strsim`]); [`token_set_jaro_winkler`] lifts it to token arrays and
//! [`name_similarity`] adds a whole-string comparison so that a query
//! which is a clean prefix of a longer recorded name (a person searched
//! without their second surname, say) still scores high.

use strsim::jaro_winkler;

/// Token-set Jaro-Winkler between two token arrays.
///
/// For each token in the smaller array, take the best Jaro-Winkler match
/// in the larger; average those best scores; scale by
/// `min(|a|,|b|) / max(|a|,|b|)` to penalize length mismatch. Returns a
/// value in `[0, 1]` and is commutative.
pub fn token_set_jaro_winkler(a: &[String], b: &[String]) -> f64 {
  if a.is_empty() || b.is_empty() {
    return 0.0;
  }
  if a.len() == b.len() {
    // Best-match direction matters when the arrays are the same size;
    // take both so the measure stays commutative.
    return directed(a, b).max(directed(b, a));
  }
  if a.len() < b.len() {
    directed(a, b)
  } else {
    directed(b, a)
  }
}

/// One direction of the token-set comparison: `smaller` against `larger`.
fn directed(smaller: &[String], larger: &[String]) -> f64 {
  let mut sum = 0.0;
  for token in smaller {
    let best = larger
      .iter()
      .map(|candidate| jaro_winkler(token, candidate))
      .fold(0.0, f64::max);
    sum += best;
  }
  let average = sum / smaller.len() as f64;
  average * (smaller.len() as f64 / larger.len() as f64)
}

/// The name score used by the search engine: the better of the token-set
/// comparison and plain Jaro-Winkler over the concatenated fields. The
/// concatenated form rewards shared prefixes, which keeps a two-token
/// query against a three-token recorded name from being over-penalized.
/// Tokens are joined without separators; shared whitespace must not count
/// as a match.
pub fn name_similarity(a: &[String], b: &[String]) -> f64 {
  if a.is_empty() || b.is_empty() {
    return 0.0;
  }
  let joined = jaro_winkler(&a.concat(), &b.concat());
  token_set_jaro_winkler(a, b).max(joined)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tokens(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
  }

  #[test]
  fn identical_arrays_score_one() {
    let a = tokens("nicolas maduro");
    assert!((token_set_jaro_winkler(&a, &a) - 1.0).abs() < 1e-9);
  }

  #[test]
  fn empty_input_scores_zero() {
    let a = tokens("nicolas maduro");
    assert_eq!(token_set_jaro_winkler(&a, &[]), 0.0);
    assert_eq!(token_set_jaro_winkler(&[], &a), 0.0);
    assert_eq!(name_similarity(&[], &a), 0.0);
  }

  #[test]
  fn commutative_and_in_range() {
    let pairs = [
      ("nicolas maduro", "maduro moros nicolas"),
      ("anglo caribbean", "anglo caribbean trading"),
      ("abc", "xyz"),
      ("alpha beta", "gamma delta"),
      ("one two three", "three two one"),
    ];
    for (x, y) in pairs {
      let (a, b) = (tokens(x), tokens(y));
      let ab = token_set_jaro_winkler(&a, &b);
      let ba = token_set_jaro_winkler(&b, &a);
      assert!((ab - ba).abs() < 1e-12, "{x:?} vs {y:?}");
      assert!((0.0..=1.0).contains(&ab), "{x:?} vs {y:?} scored {ab}");
    }
  }

  #[test]
  fn length_mismatch_is_penalized() {
    let a = tokens("nicolas maduro");
    let b = tokens("nicolas maduro moros");
    let score = token_set_jaro_winkler(&a, &b);
    // All query tokens match exactly, scaled by 2/3.
    assert!((score - 2.0 / 3.0).abs() < 1e-9, "scored {score}");
  }

  #[test]
  fn name_similarity_rewards_shared_prefix() {
    let a = tokens("nicolas maduro");
    let b = tokens("nicolas maduro moros");
    let score = name_similarity(&a, &b);
    assert!(score >= 0.90, "scored {score}");
  }

  #[test]
  fn unrelated_names_score_low() {
    let a = tokens("cobalt refinery");
    let b = tokens("tidewater middle east");
    assert!(name_similarity(&a, &b) < 0.75);
  }
}
