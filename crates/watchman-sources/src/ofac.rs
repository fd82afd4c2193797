//! OFAC Specially Designated Nationals adapter.
//!
//! The SDN list ships as three comma-delimited files joined on the SDN
//! entity number: `sdn.csv` (the entities), `alt.csv` (alternate names),
//! and `add.csv` (addresses). Structured data hides in the free-text
//! remarks column; see [`crate::remarks`]. The literal `-0-` marks an
//! absent value throughout.

use std::collections::HashMap;

use watchman_core::entity::{
  Entity, EntityKind, HistoricalInfo, SourceList,
};

use crate::{
  csvutil::split_records,
  download::FileSource,
  error::{Error, Result},
  remarks,
};

pub const SDN_FILE: &str = "sdn.csv";
pub const ALT_FILE: &str = "alt.csv";
pub const ADD_FILE: &str = "add.csv";

const DEFAULT_BASE_URL: &str = "https://www.treasury.gov/ofac/downloads";

/// Upstream endpoint, overridable for testing via `OFAC_DOWNLOAD_URL`.
fn base_url() -> String {
  std::env::var("OFAC_DOWNLOAD_URL")
    .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

/// The raw SDN file set for one refresh.
pub struct OfacFiles {
  pub sdn: String,
  pub alt: String,
  pub add: String,
}

impl OfacFiles {
  /// Bytes hashed for the source's content hash, in a fixed order.
  pub fn content(&self) -> Vec<u8> {
    let mut out = Vec::with_capacity(
      self.sdn.len() + self.alt.len() + self.add.len(),
    );
    out.extend_from_slice(self.sdn.as_bytes());
    out.extend_from_slice(self.alt.as_bytes());
    out.extend_from_slice(self.add.as_bytes());
    out
  }
}

pub async fn fetch<S: FileSource>(source: &S) -> Result<OfacFiles> {
  let base = base_url();
  let sdn = source.fetch(SDN_FILE, &format!("{base}/{SDN_FILE}")).await?;
  let alt = source.fetch(ALT_FILE, &format!("{base}/{ALT_FILE}")).await?;
  let add = source.fetch(ADD_FILE, &format!("{base}/{ADD_FILE}")).await?;
  Ok(OfacFiles {
    sdn: String::from_utf8_lossy(&sdn).into_owned(),
    alt: String::from_utf8_lossy(&alt).into_owned(),
    add: String::from_utf8_lossy(&add).into_owned(),
  })
}

// ─── Column helpers ──────────────────────────────────────────────────────────

/// `-0-` (with any padding) denotes an absent value.
fn col(row: &[String], idx: usize) -> &str {
  let value = row.get(idx).map(String::as_str).unwrap_or("").trim();
  if value == "-0-" { "" } else { value }
}

fn parse_tonnage(value: &str) -> u32 {
  value.replace(',', "").parse().unwrap_or(0)
}

/// `SDGT] [NPWMD] [IRGC` → `["SDGT", "NPWMD", "IRGC"]`.
fn split_programs(value: &str) -> Vec<String> {
  value
    .split("] [")
    .map(|p| p.trim_matches(['[', ']', ' ']).to_string())
    .filter(|p| !p.is_empty())
    .collect()
}

/// OFAC records individuals as `LAST, First [Middle]`; flip to reading
/// order so name comparison sees `First Middle LAST`.
fn reorder_sdn_name(name: &str) -> String {
  match name.split_once(", ") {
    Some((last, first)) => format!("{first} {last}"),
    None => name.to_string(),
  }
}

fn kind_of(sdn_type: &str) -> EntityKind {
  match sdn_type.to_ascii_lowercase().as_str() {
    "individual" => EntityKind::Person,
    "vessel" => EntityKind::Vessel,
    "aircraft" => EntityKind::Aircraft,
    _ => EntityKind::Business,
  }
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

/// Number of columns in `sdn.csv`.
const SDN_COLUMNS: usize = 12;

/// Parse the SDN file set into normalized entities, in file order.
///
/// Rows that fail to parse are logged and skipped; an empty or
/// structurally broken `sdn.csv` fails the whole source.
pub fn parse(files: &OfacFiles) -> Result<Vec<Entity>> {
  let rows = split_records(&files.sdn, ',');
  if rows.is_empty() {
    return Err(Error::MalformedFile {
      file:   SDN_FILE.to_string(),
      detail: "no records".to_string(),
    });
  }

  let mut order: Vec<String> = Vec::with_capacity(rows.len());
  let mut entities: HashMap<String, Entity> = HashMap::new();

  for row in &rows {
    if row.len() < SDN_COLUMNS {
      tracing::warn!(
        columns = row.len(),
        "skipping short sdn.csv row"
      );
      continue;
    }
    let ent_num = col(row, 0);
    let raw_name = col(row, 1);
    if ent_num.is_empty() || raw_name.is_empty() {
      tracing::warn!("skipping sdn.csv row without id and name");
      continue;
    }

    let kind = kind_of(col(row, 2));
    let mut entity = Entity::new(kind, SourceList::UsOfac);
    entity.source_id = ent_num.to_string();
    entity.name = match kind {
      EntityKind::Person => reorder_sdn_name(raw_name),
      _ => raw_name.to_string(),
    };

    let programs = split_programs(col(row, 3));
    if !programs.is_empty() {
      entity
        .sanctions_info
        .get_or_insert_with(Default::default)
        .programs = programs;
    }

    match kind {
      EntityKind::Person => {
        let p = entity.person.as_mut().unwrap();
        p.name = entity.name.clone();
        let title = col(row, 4);
        if !title.is_empty() {
          p.titles.push(title.to_string());
        }
      }
      EntityKind::Vessel => {
        let v = entity.vessel.as_mut().unwrap();
        v.name = entity.name.clone();
        v.call_sign = col(row, 5).to_string();
        v.vessel_type = col(row, 6).to_string();
        v.tonnage = parse_tonnage(col(row, 7));
        v.gross_registered_tonnage = parse_tonnage(col(row, 8));
        v.flag = col(row, 9).to_string();
        v.owner = col(row, 10).to_string();
      }
      EntityKind::Aircraft => {
        let a = entity.aircraft.as_mut().unwrap();
        a.name = entity.name.clone();
        a.flag = col(row, 9).to_string();
      }
      EntityKind::Business => {
        entity.business.as_mut().unwrap().name = entity.name.clone();
      }
      EntityKind::Organization => {}
    }

    for clause in remarks::clauses(col(row, 11)) {
      remarks::apply(&mut entity, clause);
    }

    entity.source_data = serde_json::json!({ "sdn": row });

    order.push(ent_num.to_string());
    entities.insert(ent_num.to_string(), entity);
  }

  for row in split_records(&files.alt, ',') {
    if row.len() < 4 {
      continue;
    }
    let Some(entity) = entities.get_mut(col(&row, 0)) else {
      continue;
    };
    let alt_name = col(&row, 3).to_string();
    if alt_name.is_empty() {
      continue;
    }
    match col(&row, 2) {
      "fka" | "f.k.a." => entity.historical_info.push(HistoricalInfo {
        kind:  "Former Name".to_string(),
        value: alt_name,
        date:  None,
      }),
      _ => push_alt_name(entity, alt_name),
    }
  }

  for row in split_records(&files.add, ',') {
    if row.len() < 5 {
      continue;
    }
    let Some(entity) = entities.get_mut(col(&row, 0)) else {
      continue;
    };
    let address = watchman_core::entity::Address {
      line1: col(&row, 2).to_string(),
      city: col(&row, 3).to_string(),
      country: col(&row, 4).to_string(),
      ..Default::default()
    };
    if address.line1.is_empty()
      && address.city.is_empty()
      && address.country.is_empty()
    {
      continue;
    }
    entity.addresses.push(address);
  }

  Ok(
    order
      .into_iter()
      .filter_map(|id| entities.remove(&id))
      .map(Entity::normalize)
      .collect(),
  )
}

fn push_alt_name(entity: &mut Entity, alt: String) {
  let alt = match entity.kind {
    EntityKind::Person => reorder_sdn_name(&alt),
    _ => alt,
  };
  if let Some(p) = entity.person.as_mut() {
    p.alt_names.push(alt);
  } else if let Some(b) = entity.business.as_mut() {
    b.alt_names.push(alt);
  } else if let Some(o) = entity.organization.as_mut() {
    o.alt_names.push(alt);
  } else if let Some(a) = entity.aircraft.as_mut() {
    a.alt_names.push(alt);
  } else if let Some(v) = entity.vessel.as_mut() {
    v.alt_names.push(alt);
  }
}
