//! Entity: the unit of the screening corpus.
//!
//! Every watchlist row, regardless of source, is normalized into one
//! [`Entity`]: a display name, a kind tag, exactly one populated
//! kind-specific record, and the shared contact / address / sanctions
//! sub-records. [`PreparedFields`] is derived by
//! [`Entity::normalize`](crate::normalize) and never serialized.

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Error;

// ─── Tags ────────────────────────────────────────────────────────────────────

/// The kind of real-world thing an entity represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
  Person,
  Business,
  Organization,
  Aircraft,
  Vessel,
}

impl Default for EntityKind {
  fn default() -> Self {
    Self::Person
  }
}

impl EntityKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Person => "person",
      Self::Business => "business",
      Self::Organization => "organization",
      Self::Aircraft => "aircraft",
      Self::Vessel => "vessel",
    }
  }
}

impl fmt::Display for EntityKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for EntityKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Error> {
    match s {
      "person" => Ok(Self::Person),
      "business" => Ok(Self::Business),
      "organization" => Ok(Self::Organization),
      "aircraft" => Ok(Self::Aircraft),
      "vessel" => Ok(Self::Vessel),
      other => Err(Error::UnknownEntityKind(other.to_string())),
    }
  }
}

/// The upstream watchlist an entity was ingested from.
///
/// `ApiRequest` marks entities assembled from inbound query parameters;
/// they never enter the corpus.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SourceList {
  UsOfac,
  UsCsl,
  EuCsl,
  UkCsl,
  #[default]
  ApiRequest,
}

impl SourceList {
  /// Every list that participates in a refresh, in publication order.
  pub const ALL: [SourceList; 4] =
    [Self::UsOfac, Self::UsCsl, Self::EuCsl, Self::UkCsl];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::UsOfac => "us_ofac",
      Self::UsCsl => "us_csl",
      Self::EuCsl => "eu_csl",
      Self::UkCsl => "uk_csl",
      Self::ApiRequest => "api_request",
    }
  }
}

impl fmt::Display for SourceList {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SourceList {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Error> {
    match s {
      "us_ofac" => Ok(Self::UsOfac),
      "us_csl" => Ok(Self::UsCsl),
      "eu_csl" => Ok(Self::EuCsl),
      "uk_csl" => Ok(Self::UkCsl),
      "api_request" => Ok(Self::ApiRequest),
      other => Err(Error::UnknownSourceList(other.to_string())),
    }
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
  #[default]
  Unknown,
  Male,
  Female,
}

impl Gender {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Unknown => "unknown",
      Self::Male => "male",
      Self::Female => "female",
    }
  }
}

impl FromStr for Gender {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Error> {
    match s.to_ascii_lowercase().as_str() {
      "unknown" | "" => Ok(Self::Unknown),
      "male" | "m" => Ok(Self::Male),
      "female" | "f" => Ok(Self::Female),
      other => Err(Error::InvalidQuery(format!("unknown gender {other:?}"))),
    }
  }
}

// ─── Government IDs ──────────────────────────────────────────────────────────

/// The closed set of ID document types used for exact-match boosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GovernmentIdType {
  Passport,
  DriversLicense,
  NationalId,
  TaxId,
  Ssn,
  Cedula,
  Curp,
  Cuit,
  Electoral,
  BusinessRegistration,
  CommercialRegistry,
  BirthCertificate,
  RefugeeId,
  DiplomaticPassport,
  PersonalId,
  Citizenship,
  Nationality,
}

impl GovernmentIdType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Passport => "passport",
      Self::DriversLicense => "drivers-license",
      Self::NationalId => "national-id",
      Self::TaxId => "tax-id",
      Self::Ssn => "ssn",
      Self::Cedula => "cedula",
      Self::Curp => "curp",
      Self::Cuit => "cuit",
      Self::Electoral => "electoral",
      Self::BusinessRegistration => "business-registration",
      Self::CommercialRegistry => "commercial-registry",
      Self::BirthCertificate => "birth-certificate",
      Self::RefugeeId => "refugee-id",
      Self::DiplomaticPassport => "diplomatic-passport",
      Self::PersonalId => "personal-id",
      Self::Citizenship => "citizenship",
      Self::Nationality => "nationality",
    }
  }
}

impl FromStr for GovernmentIdType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Error> {
    match s {
      "passport" => Ok(Self::Passport),
      "drivers-license" => Ok(Self::DriversLicense),
      "national-id" => Ok(Self::NationalId),
      "tax-id" => Ok(Self::TaxId),
      "ssn" => Ok(Self::Ssn),
      "cedula" => Ok(Self::Cedula),
      "curp" => Ok(Self::Curp),
      "cuit" => Ok(Self::Cuit),
      "electoral" => Ok(Self::Electoral),
      "business-registration" => Ok(Self::BusinessRegistration),
      "commercial-registry" => Ok(Self::CommercialRegistry),
      "birth-certificate" => Ok(Self::BirthCertificate),
      "refugee-id" => Ok(Self::RefugeeId),
      "diplomatic-passport" => Ok(Self::DiplomaticPassport),
      "personal-id" => Ok(Self::PersonalId),
      "citizenship" => Ok(Self::Citizenship),
      "nationality" => Ok(Self::Nationality),
      other => Err(Error::UnknownGovernmentIdType(other.to_string())),
    }
  }
}

/// An identity document issued by a government.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernmentId {
  #[serde(rename = "type")]
  pub id_type:    GovernmentIdType,
  /// ISO-3166 alpha-2 after normalization.
  pub country:    String,
  pub identifier: String,
}

// ─── Kind-specific records ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
  pub name:           String,
  pub alt_names:      Vec<String>,
  pub gender:         Gender,
  pub birth_date:     Option<NaiveDate>,
  pub place_of_birth: String,
  pub death_date:     Option<NaiveDate>,
  pub titles:         Vec<String>,
  pub government_ids: Vec<GovernmentId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Business {
  pub name:           String,
  pub alt_names:      Vec<String>,
  pub created:        Option<NaiveDate>,
  pub dissolved:      Option<NaiveDate>,
  pub government_ids: Vec<GovernmentId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
  pub name:           String,
  pub alt_names:      Vec<String>,
  pub created:        Option<NaiveDate>,
  pub dissolved:      Option<NaiveDate>,
  pub government_ids: Vec<GovernmentId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aircraft {
  pub name:          String,
  pub alt_names:     Vec<String>,
  #[serde(rename = "type")]
  pub aircraft_type: String,
  /// ISO-3166 alpha-2 after normalization.
  pub flag:          String,
  pub built:         Option<NaiveDate>,
  /// ICAO aircraft type designator.
  pub icao_code:     String,
  pub model:         String,
  pub serial_number: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vessel {
  pub name:        String,
  pub alt_names:   Vec<String>,
  /// Seven-digit International Maritime Organization number.
  pub imo_number:  String,
  #[serde(rename = "type")]
  pub vessel_type: String,
  /// ISO-3166 alpha-2 after normalization.
  pub flag:        String,
  pub built:       Option<NaiveDate>,
  pub model:       String,
  pub tonnage:     u32,
  /// Maritime Mobile Service Identity, nine-digit radio identifier.
  pub mmsi:        String,
  pub call_sign:   String,
  pub gross_registered_tonnage: u32,
  pub owner:       String,
}

// ─── Shared sub-records ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
  pub email_addresses: Vec<String>,
  pub phone_numbers:   Vec<String>,
  pub fax_numbers:     Vec<String>,
  pub websites:        Vec<String>,
}

impl ContactInfo {
  pub fn is_empty(&self) -> bool {
    self.email_addresses.is_empty()
      && self.phone_numbers.is_empty()
      && self.fax_numbers.is_empty()
      && self.websites.is_empty()
  }
}

/// A postal record for any physical location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
  pub line1:       String,
  pub line2:       String,
  pub city:        String,
  pub postal_code: String,
  pub state:       String,
  /// ISO-3166 alpha-2 after normalization.
  pub country:     String,
  pub latitude:    Option<f64>,
  pub longitude:   Option<f64>,
}

impl Address {
  /// Single space-collapsed lowercase string used as a fallback comparison
  /// key and as the `address` query-parameter encoding.
  pub fn format(&self) -> String {
    let joined = format!(
      "{} {} {} {} {} {}",
      self.line1, self.line2, self.city, self.postal_code, self.state,
      self.country,
    );
    joined
      .split_whitespace()
      .collect::<Vec<_>>()
      .join(" ")
      .to_lowercase()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoAddress {
  pub currency: String,
  pub address:  String,
}

/// A free-form reference to a linked entity. Stored as strings, not entity
/// pointers, so snapshots never form cyclic graphs. Resolution is a caller
/// concern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affiliation {
  pub entity_name: String,
  /// e.g. "Linked To", "Subsidiary Of", "Owned By".
  #[serde(rename = "type")]
  pub kind:        String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub details:     String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SanctionsInfo {
  /// Program codes, e.g. "SDGT", "IRGC".
  pub programs:    Vec<String>,
  /// Subject to secondary sanctions.
  pub secondary:   bool,
  pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalInfo {
  /// e.g. "Former Name", "Previous Flag".
  #[serde(rename = "type")]
  pub kind:  String,
  pub value: String,
  pub date:  Option<NaiveDate>,
}

// ─── Prepared fields ─────────────────────────────────────────────────────────

/// Derived comparison keys, populated by [`Entity::normalize`]. A pure
/// function of the other fields; never serialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedFields {
  /// The normalized primary name, punctuation scrubbed but stop-words kept.
  pub name:            String,
  pub alt_names:       Vec<String>,
  /// Significant terms of `name` (stop-words removed).
  pub name_fields:     Vec<String>,
  pub alt_name_fields: Vec<Vec<String>>,
  pub phone_numbers:   Vec<String>,
  pub fax_numbers:     Vec<String>,
  pub addresses:       Vec<PreparedAddress>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedAddress {
  pub line1:        String,
  pub line1_fields: Vec<String>,
  pub line2:        String,
  pub line2_fields: Vec<String>,
  pub city:         String,
  pub city_fields:  Vec<String>,
  pub postal_code:  String,
  pub state:        String,
  pub country:      String,
}

// ─── Entity ──────────────────────────────────────────────────────────────────

/// A single watchlist record in the unified schema.
///
/// Exactly one of the five kind records is populated, matching `kind`
/// (checked by [`Entity::validate`]). `source_data` retains the original
/// source rows for provenance; its shape varies per list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
  pub name:   String,
  #[serde(rename = "entityType")]
  pub kind:   EntityKind,
  #[serde(rename = "sourceList")]
  pub source: SourceList,

  /// The source's own row identifier (the SDN entity number for OFAC).
  #[serde(rename = "sourceID")]
  pub source_id: String,

  pub person:       Option<Person>,
  pub business:     Option<Business>,
  pub organization: Option<Organization>,
  pub aircraft:     Option<Aircraft>,
  pub vessel:       Option<Vessel>,

  pub contact:   ContactInfo,
  pub addresses: Vec<Address>,

  pub crypto_addresses: Vec<CryptoAddress>,

  pub affiliations:    Vec<Affiliation>,
  pub sanctions_info:  Option<SanctionsInfo>,
  pub historical_info: Vec<HistoricalInfo>,

  #[serde(skip)]
  pub prepared_fields: PreparedFields,

  /// Original list rows, retained verbatim for downstream inspection.
  #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
  pub source_data: serde_json::Value,
}

impl Entity {
  /// An empty entity of the given kind with its kind record populated.
  pub fn new(kind: EntityKind, source: SourceList) -> Self {
    let mut e = Entity {
      kind,
      source,
      ..Entity::default()
    };
    match kind {
      EntityKind::Person => e.person = Some(Person::default()),
      EntityKind::Business => e.business = Some(Business::default()),
      EntityKind::Organization => {
        e.organization = Some(Organization::default())
      }
      EntityKind::Aircraft => e.aircraft = Some(Aircraft::default()),
      EntityKind::Vessel => e.vessel = Some(Vessel::default()),
    }
    e
  }

  /// Check the kind-tag ↔ populated-record invariant.
  pub fn validate(&self) -> Result<(), Error> {
    let records = [
      self.person.is_some(),
      self.business.is_some(),
      self.organization.is_some(),
      self.aircraft.is_some(),
      self.vessel.is_some(),
    ];
    let populated = records.iter().filter(|p| **p).count();
    let matching = match self.kind {
      EntityKind::Person => self.person.is_some(),
      EntityKind::Business => self.business.is_some(),
      EntityKind::Organization => self.organization.is_some(),
      EntityKind::Aircraft => self.aircraft.is_some(),
      EntityKind::Vessel => self.vessel.is_some(),
    };
    if populated != 1 || !matching {
      return Err(Error::KindMismatch {
        source_id: self.source_id.clone(),
        kind:      self.kind.as_str().to_string(),
      });
    }
    Ok(())
  }

  /// The alternate names of whichever kind record is populated.
  pub fn alt_names(&self) -> &[String] {
    if let Some(p) = &self.person {
      &p.alt_names
    } else if let Some(b) = &self.business {
      &b.alt_names
    } else if let Some(o) = &self.organization {
      &o.alt_names
    } else if let Some(a) = &self.aircraft {
      &a.alt_names
    } else if let Some(v) = &self.vessel {
      &v.alt_names
    } else {
      &[]
    }
  }

  /// The government IDs of whichever kind record carries them.
  pub fn government_ids(&self) -> &[GovernmentId] {
    if let Some(p) = &self.person {
      &p.government_ids
    } else if let Some(b) = &self.business {
      &b.government_ids
    } else if let Some(o) = &self.organization {
      &o.government_ids
    } else {
      &[]
    }
  }

  /// The comparison date for the kind: birth (person), created
  /// (business / organization), or built (aircraft / vessel).
  pub fn key_date(&self) -> Option<NaiveDate> {
    if let Some(p) = &self.person {
      p.birth_date
    } else if let Some(b) = &self.business {
      b.created
    } else if let Some(o) = &self.organization {
      o.created
    } else if let Some(a) = &self.aircraft {
      a.built
    } else if let Some(v) = &self.vessel {
      v.built
    } else {
      None
    }
  }

  /// Hard identifiers compared for exact equality during scoring:
  /// IMO number, MMSI, call sign, ICAO type code, and serial number.
  pub fn hard_identifiers(&self) -> Vec<&str> {
    let mut out = Vec::new();
    if let Some(a) = &self.aircraft {
      for v in [a.icao_code.as_str(), a.serial_number.as_str()] {
        if !v.is_empty() {
          out.push(v);
        }
      }
    }
    if let Some(v) = &self.vessel {
      for id in [
        v.imo_number.as_str(),
        v.mmsi.as_str(),
        v.call_sign.as_str(),
      ] {
        if !id.is_empty() {
          out.push(id);
        }
      }
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn validate_accepts_matching_record() {
    let e = Entity::new(EntityKind::Vessel, SourceList::UsOfac);
    assert!(e.validate().is_ok());
  }

  #[test]
  fn validate_rejects_missing_record() {
    let mut e = Entity::new(EntityKind::Person, SourceList::UsOfac);
    e.person = None;
    assert!(e.validate().is_err());
  }

  #[test]
  fn validate_rejects_two_records() {
    let mut e = Entity::new(EntityKind::Person, SourceList::UsOfac);
    e.vessel = Some(Vessel::default());
    assert!(e.validate().is_err());
  }

  #[test]
  fn address_format_collapses_and_lowercases() {
    let addr = Address {
      line1: "123 Main St".into(),
      city: "Springfield".into(),
      country: "US".into(),
      ..Address::default()
    };
    assert_eq!(addr.format(), "123 main st springfield us");
  }

  #[test]
  fn wire_names_match_contract() {
    let e = Entity::new(EntityKind::Person, SourceList::UsOfac);
    let json = serde_json::to_value(&e).unwrap();
    assert_eq!(json["entityType"], "person");
    assert_eq!(json["sourceList"], "us_ofac");
    assert!(json.get("sourceID").is_some());
    assert!(json.get("preparedFields").is_none());
  }

  #[test]
  fn kind_tags_round_trip() {
    for kind in [
      EntityKind::Person,
      EntityKind::Business,
      EntityKind::Organization,
      EntityKind::Aircraft,
      EntityKind::Vessel,
    ] {
      assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
    }
  }
}
