//! The search engine: scores every candidate in a snapshot against a
//! query entity and returns the top-K ranked matches.
//!
//! The total score is a weighted sum of per-field sub-scores in `[0, 1]`.
//! A field participates only when both the query and the candidate carry
//! data for it; the weights of the participating fields are renormalized
//! to sum to 1. Ties are broken by the source list's refresh time (newer
//! first), then source ID, so results are deterministic.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::{
  corpus::Snapshot,
  entity::{Entity, SourceList},
  error::{Error, Result},
  similarity::name_similarity,
};

// ─── Options & weights ───────────────────────────────────────────────────────

/// Caller-tunable search behavior.
#[derive(Debug, Clone)]
pub struct SearchOpts {
  /// Maximum number of results returned.
  pub limit:           usize,
  /// Results scoring below this are dropped.
  pub min_match:       f64,
  /// Attach per-field sub-scores and effective weights to each result.
  pub debug:           bool,
  /// Scan cutoff. Past it the engine either returns what it has
  /// (`partial_results`) or fails with [`Error::Cancelled`].
  pub deadline:        Option<Instant>,
  /// Opt in to best-effort results when the deadline passes mid-scan.
  pub partial_results: bool,
}

impl Default for SearchOpts {
  fn default() -> Self {
    SearchOpts {
      limit:           10,
      min_match:       0.0,
      debug:           false,
      deadline:        None,
      partial_results: false,
    }
  }
}

/// Relative weight of each scored field. Defaults sum to 1 when every
/// field participates; missing fields are excluded and the remainder is
/// renormalized.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
  pub name:           f64,
  pub alt_names:      f64,
  pub addresses:      f64,
  pub government_ids: f64,
  pub contact:        f64,
  pub dates:          f64,
  pub identifiers:    f64,
}

impl Default for ScoreWeights {
  fn default() -> Self {
    ScoreWeights {
      name:           0.50,
      alt_names:      0.15,
      addresses:      0.10,
      government_ids: 0.10,
      contact:        0.05,
      dates:          0.05,
      identifiers:    0.05,
    }
  }
}

/// Candidates whose name sub-score falls below this are discarded early
/// unless an exact government-ID or contact match rescues them.
const NAME_GATE: f64 = 0.10;

// ─── Response types ──────────────────────────────────────────────────────────

/// One scored field, surfaced when debug output is requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldScore {
  pub field:  String,
  pub score:  f64,
  /// The effective (renormalized) weight this field carried.
  pub weight: f64,
}

/// A matched entity with its total score attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchedEntity {
  #[serde(flatten)]
  pub entity: Entity,
  #[serde(rename = "match")]
  pub match_score: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub debug: Option<Vec<FieldScore>>,
}

fn is_false(b: &bool) -> bool {
  !*b
}

/// The top-level search result. Echoes the normalized query so clients
/// can verify what was compared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
  pub query:    Entity,
  pub entities: Vec<SearchedEntity>,
  /// Set when a deadline cut the scan short (best-effort results).
  #[serde(default, skip_serializing_if = "is_false")]
  pub partial:  bool,
}

// ─── Scoring ─────────────────────────────────────────────────────────────────

struct Scored {
  total:  f64,
  fields: Vec<FieldScore>,
}

fn contact_values(e: &Entity) -> Vec<String> {
  let mut out: Vec<String> = Vec::new();
  out.extend(e.prepared_fields.phone_numbers.iter().cloned());
  out.extend(e.prepared_fields.fax_numbers.iter().cloned());
  out.extend(e.contact.email_addresses.iter().map(|v| v.to_lowercase()));
  out.extend(e.contact.websites.iter().map(|v| v.to_lowercase()));
  out
}

fn exact_government_id_match(query: &Entity, candidate: &Entity) -> bool {
  query.government_ids().iter().any(|q| {
    candidate.government_ids().iter().any(|c| {
      q.id_type == c.id_type
        && q.country.eq_ignore_ascii_case(&c.country)
        && q.identifier.eq_ignore_ascii_case(&c.identifier)
    })
  })
}

fn best_alt_name_score(query: &Entity, candidate: &Entity) -> f64 {
  let mut query_names: Vec<&[String]> = Vec::new();
  if !query.prepared_fields.name_fields.is_empty() {
    query_names.push(&query.prepared_fields.name_fields);
  }
  for alt in &query.prepared_fields.alt_name_fields {
    if !alt.is_empty() {
      query_names.push(alt);
    }
  }

  let mut best = 0.0_f64;
  for alt in &candidate.prepared_fields.alt_name_fields {
    if alt.is_empty() {
      continue;
    }
    for q in &query_names {
      best = best.max(name_similarity(q, alt));
    }
  }
  best
}

fn best_address_score(query: &Entity, candidate: &Entity) -> f64 {
  let mut best = 0.0_f64;
  for q in &query.prepared_fields.addresses {
    let mut q_tokens = q.line1_fields.clone();
    q_tokens.extend(q.city_fields.iter().cloned());
    if q_tokens.is_empty() {
      continue;
    }
    for c in &candidate.prepared_fields.addresses {
      let mut c_tokens = c.line1_fields.clone();
      c_tokens.extend(c.city_fields.iter().cloned());
      if c_tokens.is_empty() {
        continue;
      }
      best = best.max(name_similarity(&q_tokens, &c_tokens));
    }
  }
  best
}

fn date_score(query: &Entity, candidate: &Entity) -> Option<f64> {
  let q = query.key_date()?;
  let c = candidate.key_date()?;
  if q == c {
    Some(1.0)
  } else if chrono::Datelike::year(&q) == chrono::Datelike::year(&c) {
    Some(0.5)
  } else {
    Some(0.0)
  }
}

/// Score `candidate` against `query`. Returns `None` when no field can be
/// compared or the candidate is gated out.
fn score_entity(
  query: &Entity,
  candidate: &Entity,
  weights: &ScoreWeights,
) -> Option<Scored> {
  let mut pieces: Vec<(&'static str, f64, f64)> = Vec::with_capacity(7);

  // Exact matches are computed up front so they can bypass the name gate.
  let query_ids = query.government_ids();
  let candidate_ids = candidate.government_ids();
  let id_score = if !query_ids.is_empty() && !candidate_ids.is_empty() {
    Some(if exact_government_id_match(query, candidate) {
      1.0
    } else {
      0.0
    })
  } else {
    None
  };

  let query_contact = contact_values(query);
  let candidate_contact = contact_values(candidate);
  let contact_score =
    if !query_contact.is_empty() && !candidate_contact.is_empty() {
      let hit = query_contact
        .iter()
        .any(|q| candidate_contact.iter().any(|c| c == q));
      Some(if hit { 1.0 } else { 0.0 })
    } else {
      None
    };

  let exact_rescue =
    id_score == Some(1.0) || contact_score == Some(1.0);

  if !query.prepared_fields.name_fields.is_empty()
    && !candidate.prepared_fields.name_fields.is_empty()
  {
    let score = name_similarity(
      &query.prepared_fields.name_fields,
      &candidate.prepared_fields.name_fields,
    );
    if score < NAME_GATE && !exact_rescue {
      return None;
    }
    pieces.push(("name", score, weights.name));
  }

  if !candidate.prepared_fields.alt_name_fields.is_empty()
    && (!query.prepared_fields.name_fields.is_empty()
      || !query.prepared_fields.alt_name_fields.is_empty())
  {
    pieces.push((
      "altNames",
      best_alt_name_score(query, candidate),
      weights.alt_names,
    ));
  }

  if !query.prepared_fields.addresses.is_empty()
    && !candidate.prepared_fields.addresses.is_empty()
  {
    pieces.push((
      "addresses",
      best_address_score(query, candidate),
      weights.addresses,
    ));
  }

  if let Some(score) = id_score {
    pieces.push(("governmentIds", score, weights.government_ids));
  }
  if let Some(score) = contact_score {
    pieces.push(("contact", score, weights.contact));
  }
  if let Some(score) = date_score(query, candidate) {
    pieces.push(("dates", score, weights.dates));
  }

  let query_hard = query.hard_identifiers();
  let candidate_hard = candidate.hard_identifiers();
  if !query_hard.is_empty() && !candidate_hard.is_empty() {
    let hit = query_hard
      .iter()
      .any(|q| candidate_hard.iter().any(|c| c.eq_ignore_ascii_case(q)));
    pieces.push((
      "identifiers",
      if hit { 1.0 } else { 0.0 },
      weights.identifiers,
    ));
  }

  let weight_sum: f64 = pieces.iter().map(|(_, _, w)| w).sum();
  if weight_sum <= 0.0 {
    return None;
  }

  let total = pieces
    .iter()
    .map(|(_, score, weight)| score * weight / weight_sum)
    .sum();
  let fields = pieces
    .into_iter()
    .map(|(field, score, weight)| FieldScore {
      field:  field.to_string(),
      score,
      weight: weight / weight_sum,
    })
    .collect();

  Some(Scored { total, fields })
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// How often the deadline is checked while scanning candidates.
const DEADLINE_STRIDE: usize = 512;

/// Score every compatible candidate in `snapshot` against `query` and
/// return up to `opts.limit` results with total score ≥ `opts.min_match`,
/// ranked descending.
///
/// The query must already be normalized (see
/// [`Entity::normalize`](crate::entity::Entity)).
pub fn search(
  snapshot: &Snapshot,
  query: &Entity,
  opts: &SearchOpts,
  weights: &ScoreWeights,
) -> Result<SearchResponse> {
  query.validate()?;

  let restrict_source =
    (query.source != SourceList::ApiRequest).then_some(query.source);

  let mut scored: Vec<(usize, Scored)> = Vec::new();
  let mut partial = false;

  for (idx, candidate) in snapshot.entities.iter().enumerate() {
    if idx % DEADLINE_STRIDE == 0
      && let Some(deadline) = opts.deadline
      && Instant::now() >= deadline
    {
      if !opts.partial_results {
        return Err(Error::Cancelled);
      }
      partial = true;
      break;
    }

    if candidate.kind != query.kind {
      continue;
    }
    if let Some(source) = restrict_source
      && candidate.source != source
    {
      continue;
    }
    if let Some(s) = score_entity(query, candidate, weights)
      && s.total > 0.0
      && s.total >= opts.min_match
    {
      scored.push((idx, s));
    }
  }

  scored.sort_by(|(a_idx, a), (b_idx, b)| {
    let a_entity = &snapshot.entities[*a_idx];
    let b_entity = &snapshot.entities[*b_idx];
    b.total
      .total_cmp(&a.total)
      .then_with(|| {
        let a_at = snapshot.refreshed_at(a_entity.source);
        let b_at = snapshot.refreshed_at(b_entity.source);
        b_at.cmp(&a_at)
      })
      .then_with(|| a_entity.source_id.cmp(&b_entity.source_id))
  });
  scored.truncate(opts.limit.max(1));

  let entities = scored
    .into_iter()
    .map(|(idx, s)| SearchedEntity {
      entity:      snapshot.entities[idx].clone(),
      match_score: s.total,
      debug:       opts.debug.then_some(s.fields),
    })
    .collect();

  Ok(SearchResponse {
    query: query.clone(),
    entities,
    partial,
  })
}
