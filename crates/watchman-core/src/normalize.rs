//! The normalization pipeline.
//!
//! Applied once per entity after parsing and once per query before
//! searching, so that fuzzy matching is deterministic. Every function here
//! is pure and idempotent: feeding a step its own output yields the same
//! output.
//!
//! Pipeline order:
//!   1. Unicode NFD decomposition, combining marks dropped
//!   2. lowercasing
//!   3. punctuation scrubbing (`.` `,` removed, `-` becomes a space)
//!   4. company-suffix stripping (business / organization names only)
//!   5. stop-word removal (tokenized `*_fields` only)
//!   6. phone normalization (digits only)
//!   7. country canonicalization (ISO-3166 alpha-2)
//!   8. whitespace tokenization

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::entity::{
  Address, Entity, EntityKind, PreparedAddress, PreparedFields,
};

// ─── Word lists ──────────────────────────────────────────────────────────────

/// Trailing/embedded corporate suffixes stripped from business and
/// organization names before comparison.
const COMPANY_SUFFIXES: &[&str] =
  &["co", "inc", "gmbh", "llc", "llp", "ltd", "ltda"];

/// Language-agnostic function words plus generic corporate fillers, dropped
/// when producing tokenized name fields. The untokenized normalized string
/// keeps them.
const STOPWORDS: &[&str] = &[
  "the", "of", "and", "a", "an", "&", "co", "company", "corp",
  "corporation", "inc", "incorporated", "ltd", "limited", "llc", "llp",
  "gmbh", "sa", "ltda",
];

// ─── String steps ────────────────────────────────────────────────────────────

/// Decompose to NFD, drop combining marks, lowercase, scrub punctuation,
/// and collapse whitespace.
///
/// `Nicolás Maduro` → `nicolas maduro`; `11,420.2-1 CORP.` → `114202 1 corp`.
pub fn lower_and_remove_punctuation(input: &str) -> String {
  let mut out = String::with_capacity(input.len());
  for c in input.nfd() {
    if is_combining_mark(c) {
      continue;
    }
    match c {
      '.' | ',' => {}
      '-' => out.push(' '),
      _ => out.extend(c.to_lowercase()),
    }
  }
  out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop corporate suffix tokens (` co`, ` inc`, ` ltd`, …) from an already
/// normalized name. Word-boundary aware: `cobalt refinery co inc` →
/// `cobalt refinery`, but `coinc corp` is untouched.
pub fn strip_company_suffixes(normalized: &str) -> String {
  let kept: Vec<&str> = normalized
    .split_whitespace()
    .filter(|token| !COMPANY_SUFFIXES.contains(token))
    .collect();
  if kept.is_empty() {
    // A name made entirely of suffixes stays as-is rather than vanishing.
    normalized.to_string()
  } else {
    kept.join(" ")
  }
}

/// Split a normalized name into its significant terms.
pub fn remove_stopwords(normalized: &str) -> Vec<String> {
  normalized
    .split_whitespace()
    .filter(|token| !STOPWORDS.contains(token))
    .map(str::to_string)
    .collect()
}

/// Reduce a phone or fax number to its decimal digits. Returns an empty
/// string when no digits remain; callers discard those.
pub fn normalize_phone(input: &str) -> String {
  input.chars().filter(char::is_ascii_digit).collect()
}

/// Map a country name or alias to its ISO-3166 alpha-2 code (lowercase).
/// Two-letter inputs are already codes and only fold case; unrecognized
/// names pass through unchanged.
pub fn normalize_country(input: &str) -> String {
  let trimmed = input.trim();
  if trimmed.is_empty() {
    return String::new();
  }
  if trimmed.len() == 2 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
    return trimmed.to_ascii_lowercase();
  }
  let key = lower_and_remove_punctuation(trimmed);
  for (name, code) in COUNTRY_ALIASES {
    if *name == key {
      return (*code).to_string();
    }
  }
  input.to_string()
}

/// Common names and aliases seen in the upstream list files. Keys are in
/// `lower_and_remove_punctuation` form.
const COUNTRY_ALIASES: &[(&str, &str)] = &[
  ("afghanistan", "af"),
  ("belarus", "by"),
  ("brazil", "br"),
  ("burma", "mm"),
  ("canada", "ca"),
  ("china", "cn"),
  ("colombia", "co"),
  ("cuba", "cu"),
  ("cyprus", "cy"),
  ("democratic people's republic of korea", "kp"),
  ("egypt", "eg"),
  ("france", "fr"),
  ("germany", "de"),
  ("hong kong", "hk"),
  ("india", "in"),
  ("iran", "ir"),
  ("iraq", "iq"),
  ("islamic republic of iran", "ir"),
  ("israel", "il"),
  ("italy", "it"),
  ("japan", "jp"),
  ("korea north", "kp"),
  ("lebanon", "lb"),
  ("liberia", "lr"),
  ("libya", "ly"),
  ("malta", "mt"),
  ("marshall islands", "mh"),
  ("mexico", "mx"),
  ("myanmar", "mm"),
  ("netherlands", "nl"),
  ("nicaragua", "ni"),
  ("north korea", "kp"),
  ("pakistan", "pk"),
  ("panama", "pa"),
  ("people's republic of china", "cn"),
  ("russia", "ru"),
  ("russian federation", "ru"),
  ("saudi arabia", "sa"),
  ("singapore", "sg"),
  ("somalia", "so"),
  ("spain", "es"),
  ("sudan", "sd"),
  ("switzerland", "ch"),
  ("syria", "sy"),
  ("syrian arab republic", "sy"),
  ("turkey", "tr"),
  ("turkiye", "tr"),
  ("uae", "ae"),
  ("ukraine", "ua"),
  ("united arab emirates", "ae"),
  ("united kingdom", "gb"),
  ("united states", "us"),
  ("united states of america", "us"),
  ("usa", "us"),
  ("venezuela", "ve"),
  ("vietnam", "vn"),
  ("yemen", "ye"),
  ("zimbabwe", "zw"),
];

// ─── Entity normalization ────────────────────────────────────────────────────

/// Normalize a name for the given entity kind: businesses and
/// organizations additionally lose their corporate suffixes.
fn normalize_name(kind: EntityKind, name: &str) -> String {
  let normalized = lower_and_remove_punctuation(name);
  match kind {
    EntityKind::Business | EntityKind::Organization => {
      strip_company_suffixes(&normalized)
    }
    _ => normalized,
  }
}

fn prepare_address(addr: &Address) -> PreparedAddress {
  let line1 = lower_and_remove_punctuation(&addr.line1);
  let line2 = lower_and_remove_punctuation(&addr.line2);
  let city = lower_and_remove_punctuation(&addr.city);
  PreparedAddress {
    line1_fields: line1.split_whitespace().map(str::to_string).collect(),
    line2_fields: line2.split_whitespace().map(str::to_string).collect(),
    city_fields: city.split_whitespace().map(str::to_string).collect(),
    line1,
    line2,
    city,
    postal_code: addr.postal_code.to_lowercase(),
    state: addr.state.to_lowercase(),
    country: normalize_country(&addr.country).to_lowercase(),
  }
}

impl Entity {
  /// Populate [`PreparedFields`] and canonicalize country fields in place.
  ///
  /// Idempotent: `e.normalize().normalize() == e.normalize()`.
  pub fn normalize(mut self) -> Entity {
    let mut prepared = PreparedFields {
      name: normalize_name(self.kind, &self.name),
      ..PreparedFields::default()
    };
    prepared.name_fields = remove_stopwords(&prepared.name);

    prepared.alt_names = self
      .alt_names()
      .iter()
      .map(|alt| normalize_name(self.kind, alt))
      .collect();
    prepared.alt_name_fields = prepared
      .alt_names
      .iter()
      .map(|alt| remove_stopwords(alt))
      .collect();

    prepared.phone_numbers = self
      .contact
      .phone_numbers
      .iter()
      .map(|p| normalize_phone(p))
      .filter(|p| !p.is_empty())
      .collect();
    prepared.fax_numbers = self
      .contact
      .fax_numbers
      .iter()
      .map(|p| normalize_phone(p))
      .filter(|p| !p.is_empty())
      .collect();

    prepared.addresses = self.addresses.iter().map(prepare_address).collect();

    self.prepared_fields = prepared;

    // Country fields carried on the entity itself are canonicalized in
    // place so exact-match comparisons line up across sources.
    if let Some(p) = &mut self.person {
      for id in &mut p.government_ids {
        id.country = normalize_country(&id.country);
      }
    }
    if let Some(b) = &mut self.business {
      for id in &mut b.government_ids {
        id.country = normalize_country(&id.country);
      }
    }
    if let Some(o) = &mut self.organization {
      for id in &mut o.government_ids {
        id.country = normalize_country(&id.country);
      }
    }
    if let Some(a) = &mut self.aircraft {
      a.flag = normalize_country(&a.flag);
    }
    if let Some(v) = &mut self.vessel {
      v.flag = normalize_country(&v.flag);
    }

    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entity::{
    ContactInfo, GovernmentId, GovernmentIdType, SourceList,
  };

  #[test]
  fn lower_and_remove_punctuation_vectors() {
    let cases = [
      ("Nicolás Maduro", "nicolas maduro"),
      ("Delcy Rodríguez", "delcy rodriguez"),
      ("Raúl Castro", "raul castro"),
      ("ANGLO-CARIBBEAN ", "anglo caribbean"),
      ("11420 CORP.", "11420 corp"),
      ("11,420.2-1 CORP.", "114202 1 corp"),
    ];
    for (input, expected) in cases {
      assert_eq!(
        lower_and_remove_punctuation(input),
        expected,
        "input {input:?}"
      );
    }
  }

  #[test]
  fn lower_and_remove_punctuation_is_idempotent() {
    for input in ["Nicolás Maduro", "11,420.2-1 CORP.", "ANGLO-CARIBBEAN "] {
      let once = lower_and_remove_punctuation(input);
      assert_eq!(lower_and_remove_punctuation(&once), once);
    }
  }

  #[test]
  fn company_suffixes_stripped_on_word_boundaries() {
    assert_eq!(
      strip_company_suffixes("cobalt refinery co inc"),
      "cobalt refinery"
    );
    assert_eq!(strip_company_suffixes("coltan mining"), "coltan mining");
    assert_eq!(strip_company_suffixes("anglo caribbean co ltd"), "anglo caribbean");
  }

  #[test]
  fn suffix_only_name_survives() {
    assert_eq!(strip_company_suffixes("ltd"), "ltd");
  }

  #[test]
  fn stopwords_removed_from_fields_only() {
    assert_eq!(
      remove_stopwords("bank of the east"),
      vec!["bank".to_string(), "east".to_string()]
    );
  }

  #[test]
  fn phone_normalization_yields_digits_only() {
    for input in ["+1 (555) 010-2345", "555.010.2345", "nope"] {
      let out = normalize_phone(input);
      assert!(out.chars().all(|c| c.is_ascii_digit()), "output {out:?}");
    }
    assert_eq!(normalize_phone("+58 212 555 0001"), "582125550001");
  }

  #[test]
  fn country_normalization() {
    assert_eq!(normalize_country("United States"), "us");
    assert_eq!(normalize_country("US"), "us");
    assert_eq!(normalize_country("Venezuela"), "ve");
    assert_eq!(normalize_country("United Kingdom"), "gb");
    // Unrecognized names pass through unchanged.
    assert_eq!(normalize_country("Atlantis"), "Atlantis");
    assert_eq!(normalize_country(""), "");
  }

  #[test]
  fn country_output_length_is_two_for_recognized() {
    for (name, _) in COUNTRY_ALIASES {
      assert_eq!(normalize_country(name).len(), 2, "alias {name:?}");
    }
  }

  fn person_entity(name: &str) -> Entity {
    let mut e = Entity::new(EntityKind::Person, SourceList::UsOfac);
    e.name = name.to_string();
    if let Some(p) = &mut e.person {
      p.name = name.to_string();
    }
    e
  }

  #[test]
  fn normalize_is_idempotent_field_by_field() {
    let mut e = person_entity("Nicolás MADURO MOROS");
    e.contact = ContactInfo {
      phone_numbers: vec!["+58 (212) 555-0001".into()],
      ..ContactInfo::default()
    };
    e.addresses = vec![Address {
      line1: "Palacio de Miraflores".into(),
      city: "Caracas".into(),
      country: "Venezuela".into(),
      ..Address::default()
    }];
    if let Some(p) = &mut e.person {
      p.government_ids = vec![GovernmentId {
        id_type:    GovernmentIdType::Cedula,
        country:    "Venezuela".into(),
        identifier: "5892464".into(),
      }];
    }

    let once = e.normalize();
    let twice = once.clone().normalize();
    assert_eq!(once, twice);
  }

  #[test]
  fn normalize_populates_prepared_fields() {
    let e = person_entity("Nicolás MADURO MOROS").normalize();
    assert_eq!(e.prepared_fields.name, "nicolas maduro moros");
    assert_eq!(
      e.prepared_fields.name_fields,
      vec!["nicolas", "maduro", "moros"]
    );
  }

  #[test]
  fn normalize_strips_business_suffixes() {
    let mut e = Entity::new(EntityKind::Business, SourceList::UsOfac);
    e.name = "COBALT REFINERY CO. INC.".into();
    let e = e.normalize();
    assert_eq!(e.prepared_fields.name, "cobalt refinery");
  }

  #[test]
  fn normalize_canonicalizes_gov_id_countries() {
    let mut e = person_entity("Test Person");
    if let Some(p) = &mut e.person {
      p.government_ids = vec![GovernmentId {
        id_type:    GovernmentIdType::Passport,
        country:    "United States".into(),
        identifier: "123456789".into(),
      }];
    }
    let e = e.normalize();
    assert_eq!(e.government_ids()[0].country, "us");
  }
}
