//! Query-parameter encoding of the search contract.
//!
//! HTTP callers express a query [`Entity`] and [`SearchOpts`] as URL query
//! parameters. Encoding and decoding both live here, as ordered
//! `(key, value)` pairs, so the client library and the API server cannot
//! drift apart: `decode(encode(e))` reproduces the fields that matter for
//! matching.
//!
//! Addresses are flattened by [`Address::format`] on encode; the inverse
//! records the whole formatted string as `line1`, which is exactly the
//! comparison key the scorer uses.

use std::{collections::BTreeMap, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  entity::{
    Address, CryptoAddress, Entity, EntityKind, Gender, GovernmentId,
    GovernmentIdType, SourceList,
  },
  error::{Error, Result},
  search::SearchOpts,
};

// ─── List info ───────────────────────────────────────────────────────────────

/// The `GET /v2/listinfo` response: what the most recent publication holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInfoResponse {
  /// Entity count per source name.
  pub lists:       BTreeMap<String, usize>,
  /// SHA-256 content hash per source name, hex encoded.
  pub list_hashes: BTreeMap<String, String>,
  pub started_at:  Option<DateTime<Utc>>,
  pub ended_at:    Option<DateTime<Utc>>,
  /// Version of the service that produced the snapshot.
  pub version:     String,
}

/// The `POST /v2/ingest/{fileType}` response: the preview of a parsed
/// dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestFileResponse {
  pub file_type: String,
  pub entities:  Vec<Entity>,
}

// ─── Encoding ────────────────────────────────────────────────────────────────

type Pairs = Vec<(String, String)>;

fn add(pairs: &mut Pairs, key: &str, value: impl Into<String>) {
  pairs.push((key.to_string(), value.into()));
}

/// Insert or replace a single-valued key.
fn set(pairs: &mut Pairs, key: &str, value: impl Into<String>) {
  let value = value.into();
  if let Some(existing) = pairs.iter_mut().find(|(k, _)| k == key) {
    existing.1 = value;
  } else {
    pairs.push((key.to_string(), value));
  }
}

fn add_date(pairs: &mut Pairs, key: &str, date: Option<NaiveDate>) {
  if let Some(d) = date {
    set(pairs, key, d.format("%Y-%m-%d").to_string());
  }
}

fn add_government_ids(pairs: &mut Pairs, ids: &[GovernmentId]) {
  for id in ids {
    add(
      pairs,
      &format!("gov_{}", id.id_type.as_str()),
      format!("{}:{}", id.country, id.identifier),
    );
  }
}

/// Encode search options as query parameters.
pub fn encode_opts(pairs: &mut Pairs, opts: &SearchOpts) {
  if opts.limit > 0 {
    set(pairs, "limit", opts.limit.to_string());
  }
  if opts.min_match > 0.0 {
    set(pairs, "minMatch", format!("{:.2}", opts.min_match));
  }
  if opts.debug {
    set(pairs, "debug", "yes");
  }
}

/// Encode a query entity as ordered query parameters.
pub fn encode_entity(entity: &Entity) -> Pairs {
  let mut pairs = Pairs::new();
  set(&mut pairs, "type", entity.kind.as_str());
  if entity.source != SourceList::ApiRequest {
    set(&mut pairs, "source", entity.source.as_str());
  }
  if !entity.name.is_empty() {
    set(&mut pairs, "name", entity.name.clone());
  }

  if let Some(p) = &entity.person {
    if !p.name.is_empty() {
      set(&mut pairs, "name", p.name.clone());
    }
    for alt in &p.alt_names {
      add(&mut pairs, "altNames", alt.clone());
    }
    if p.gender != Gender::Unknown {
      set(&mut pairs, "gender", p.gender.as_str());
    }
    add_date(&mut pairs, "birthDate", p.birth_date);
    for title in &p.titles {
      add(&mut pairs, "titles", title.clone());
    }
    add_government_ids(&mut pairs, &p.government_ids);
  }
  if let Some(b) = &entity.business {
    if !b.name.is_empty() {
      set(&mut pairs, "name", b.name.clone());
    }
    for alt in &b.alt_names {
      add(&mut pairs, "altNames", alt.clone());
    }
    add_date(&mut pairs, "created", b.created);
    add_government_ids(&mut pairs, &b.government_ids);
  }
  if let Some(o) = &entity.organization {
    if !o.name.is_empty() {
      set(&mut pairs, "name", o.name.clone());
    }
    for alt in &o.alt_names {
      add(&mut pairs, "altNames", alt.clone());
    }
    add_date(&mut pairs, "created", o.created);
    add_government_ids(&mut pairs, &o.government_ids);
  }
  if let Some(a) = &entity.aircraft {
    if !a.name.is_empty() {
      set(&mut pairs, "name", a.name.clone());
    }
    for alt in &a.alt_names {
      add(&mut pairs, "altNames", alt.clone());
    }
    if !a.aircraft_type.is_empty() {
      set(&mut pairs, "aircraftType", a.aircraft_type.clone());
    }
    if !a.flag.is_empty() {
      set(&mut pairs, "flag", a.flag.clone());
    }
    add_date(&mut pairs, "built", a.built);
    if !a.icao_code.is_empty() {
      set(&mut pairs, "icaoCode", a.icao_code.clone());
    }
    if !a.model.is_empty() {
      set(&mut pairs, "model", a.model.clone());
    }
    if !a.serial_number.is_empty() {
      set(&mut pairs, "serialNumber", a.serial_number.clone());
    }
  }
  if let Some(v) = &entity.vessel {
    if !v.name.is_empty() {
      set(&mut pairs, "name", v.name.clone());
    }
    for alt in &v.alt_names {
      add(&mut pairs, "altNames", alt.clone());
    }
    if !v.imo_number.is_empty() {
      set(&mut pairs, "imoNumber", v.imo_number.clone());
    }
    if !v.vessel_type.is_empty() {
      set(&mut pairs, "vesselType", v.vessel_type.clone());
    }
    if !v.flag.is_empty() {
      set(&mut pairs, "flag", v.flag.clone());
    }
    add_date(&mut pairs, "built", v.built);
    if !v.model.is_empty() {
      set(&mut pairs, "model", v.model.clone());
    }
    if v.tonnage > 0 {
      set(&mut pairs, "tonnage", v.tonnage.to_string());
    }
    if !v.mmsi.is_empty() {
      set(&mut pairs, "mmsi", v.mmsi.clone());
    }
    if !v.call_sign.is_empty() {
      set(&mut pairs, "callSign", v.call_sign.clone());
    }
    if !v.owner.is_empty() {
      set(&mut pairs, "owner", v.owner.clone());
    }
  }

  for email in &entity.contact.email_addresses {
    add(&mut pairs, "emailAddress", email.clone());
  }
  for phone in &entity.contact.phone_numbers {
    add(&mut pairs, "phoneNumber", phone.clone());
  }
  for fax in &entity.contact.fax_numbers {
    add(&mut pairs, "faxNumber", fax.clone());
  }
  for site in &entity.contact.websites {
    add(&mut pairs, "website", site.clone());
  }
  for addr in &entity.addresses {
    add(&mut pairs, "address", addr.format());
  }
  for crypto in &entity.crypto_addresses {
    add(
      &mut pairs,
      "cryptoAddress",
      format!("{}:{}", crypto.currency, crypto.address),
    );
  }

  pairs
}

// ─── Decoding ────────────────────────────────────────────────────────────────

fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
    Error::InvalidDate {
      field: field.to_string(),
      value: value.to_string(),
    }
  })
}

fn parse_government_id(key: &str, value: &str) -> Result<GovernmentId> {
  let type_str = key.strip_prefix("gov_").unwrap_or(key);
  let id_type = GovernmentIdType::from_str(type_str)?;
  let (country, identifier) = value.split_once(':').ok_or_else(|| {
    Error::InvalidQuery(format!(
      "{key} must be <country>:<identifier>, got {value:?}"
    ))
  })?;
  Ok(GovernmentId {
    id_type,
    country: country.to_string(),
    identifier: identifier.to_string(),
  })
}

/// Decode query parameters into a query entity and search options.
///
/// The `type` parameter is required. Unknown keys are ignored so callers
/// can carry their own metadata; malformed values for known keys are
/// rejected with [`Error::InvalidQuery`] or [`Error::InvalidDate`].
pub fn decode(pairs: &[(String, String)]) -> Result<(Entity, SearchOpts)> {
  let kind_value = pairs
    .iter()
    .find(|(k, _)| k == "type")
    .map(|(_, v)| v.as_str())
    .ok_or_else(|| {
      Error::InvalidQuery("missing required parameter: type".to_string())
    })?;
  let kind = EntityKind::from_str(kind_value)
    .map_err(|e| Error::InvalidQuery(e.to_string()))?;

  let source = match pairs.iter().find(|(k, _)| k == "source") {
    Some((_, v)) => SourceList::from_str(v)
      .map_err(|e| Error::InvalidQuery(e.to_string()))?,
    None => SourceList::ApiRequest,
  };

  let mut entity = Entity::new(kind, source);
  let mut opts = SearchOpts::default();

  for (key, value) in pairs {
    match key.as_str() {
      "type" | "source" => {}

      "name" => {
        entity.name = value.clone();
        match kind {
          EntityKind::Person => {
            entity.person.as_mut().unwrap().name = value.clone()
          }
          EntityKind::Business => {
            entity.business.as_mut().unwrap().name = value.clone()
          }
          EntityKind::Organization => {
            entity.organization.as_mut().unwrap().name = value.clone()
          }
          EntityKind::Aircraft => {
            entity.aircraft.as_mut().unwrap().name = value.clone()
          }
          EntityKind::Vessel => {
            entity.vessel.as_mut().unwrap().name = value.clone()
          }
        }
      }
      "altNames" => match kind {
        EntityKind::Person => {
          entity.person.as_mut().unwrap().alt_names.push(value.clone())
        }
        EntityKind::Business => entity
          .business
          .as_mut()
          .unwrap()
          .alt_names
          .push(value.clone()),
        EntityKind::Organization => entity
          .organization
          .as_mut()
          .unwrap()
          .alt_names
          .push(value.clone()),
        EntityKind::Aircraft => entity
          .aircraft
          .as_mut()
          .unwrap()
          .alt_names
          .push(value.clone()),
        EntityKind::Vessel => {
          entity.vessel.as_mut().unwrap().alt_names.push(value.clone())
        }
      },

      "gender" => {
        if let Some(p) = entity.person.as_mut() {
          p.gender = Gender::from_str(value)?;
        }
      }
      "birthDate" => {
        if let Some(p) = entity.person.as_mut() {
          p.birth_date = Some(parse_date(key, value)?);
        }
      }
      "titles" => {
        if let Some(p) = entity.person.as_mut() {
          p.titles.push(value.clone());
        }
      }
      "created" => {
        let created = Some(parse_date(key, value)?);
        if let Some(b) = entity.business.as_mut() {
          b.created = created;
        } else if let Some(o) = entity.organization.as_mut() {
          o.created = created;
        }
      }
      "built" => {
        let built = Some(parse_date(key, value)?);
        if let Some(a) = entity.aircraft.as_mut() {
          a.built = built;
        } else if let Some(v) = entity.vessel.as_mut() {
          v.built = built;
        }
      }

      "aircraftType" => {
        if let Some(a) = entity.aircraft.as_mut() {
          a.aircraft_type = value.clone();
        }
      }
      "icaoCode" => {
        if let Some(a) = entity.aircraft.as_mut() {
          a.icao_code = value.clone();
        }
      }
      "serialNumber" => {
        if let Some(a) = entity.aircraft.as_mut() {
          a.serial_number = value.clone();
        }
      }
      "flag" => {
        if let Some(a) = entity.aircraft.as_mut() {
          a.flag = value.clone();
        } else if let Some(v) = entity.vessel.as_mut() {
          v.flag = value.clone();
        }
      }
      "model" => {
        if let Some(a) = entity.aircraft.as_mut() {
          a.model = value.clone();
        } else if let Some(v) = entity.vessel.as_mut() {
          v.model = value.clone();
        }
      }

      "imoNumber" => {
        if let Some(v) = entity.vessel.as_mut() {
          v.imo_number = value.clone();
        }
      }
      "vesselType" => {
        if let Some(v) = entity.vessel.as_mut() {
          v.vessel_type = value.clone();
        }
      }
      "tonnage" => {
        if let Some(v) = entity.vessel.as_mut() {
          v.tonnage = value.parse().map_err(|_| {
            Error::InvalidQuery(format!("tonnage must be numeric: {value:?}"))
          })?;
        }
      }
      "mmsi" => {
        if let Some(v) = entity.vessel.as_mut() {
          v.mmsi = value.clone();
        }
      }
      "callSign" => {
        if let Some(v) = entity.vessel.as_mut() {
          v.call_sign = value.clone();
        }
      }
      "owner" => {
        if let Some(v) = entity.vessel.as_mut() {
          v.owner = value.clone();
        }
      }

      "emailAddress" => {
        entity.contact.email_addresses.push(value.clone())
      }
      "phoneNumber" => entity.contact.phone_numbers.push(value.clone()),
      "faxNumber" => entity.contact.fax_numbers.push(value.clone()),
      "website" => entity.contact.websites.push(value.clone()),

      "address" => entity.addresses.push(Address {
        line1: value.clone(),
        ..Address::default()
      }),
      "cryptoAddress" => {
        let (currency, address) =
          value.split_once(':').ok_or_else(|| {
            Error::InvalidQuery(format!(
              "cryptoAddress must be <currency>:<address>, got {value:?}"
            ))
          })?;
        entity.crypto_addresses.push(CryptoAddress {
          currency: currency.to_string(),
          address:  address.to_string(),
        });
      }

      "limit" => {
        opts.limit = value.parse().map_err(|_| {
          Error::InvalidQuery(format!("limit must be numeric: {value:?}"))
        })?;
      }
      "minMatch" => {
        opts.min_match = value.parse().map_err(|_| {
          Error::InvalidQuery(format!("minMatch must be numeric: {value:?}"))
        })?;
      }
      "debug" => opts.debug = value == "yes",

      key if key.starts_with("gov_") => {
        let id = parse_government_id(key, value)?;
        if let Some(p) = entity.person.as_mut() {
          p.government_ids.push(id);
        } else if let Some(b) = entity.business.as_mut() {
          b.government_ids.push(id);
        } else if let Some(o) = entity.organization.as_mut() {
          o.government_ids.push(id);
        }
      }

      // Unknown keys are a caller concern, not an error.
      _ => {}
    }
  }

  Ok((entity, opts))
}
