//! US Consolidated Screening List adapter.
//!
//! One comma-delimited file with a header row; columns are looked up by
//! name so upstream column reordering does not break the parse. ID and
//! remark columns reuse the SDN remark classifier, since the CSL carries the
//! same clause shapes for its OFAC-derived rows.

use watchman_core::entity::{Address, Entity, EntityKind, SourceList};

use crate::{
  csvutil::{column_index, split_records},
  download::FileSource,
  error::{Error, Result},
  remarks,
};

pub const FILE: &str = "us_csl.csv";

const DEFAULT_URL: &str =
  "https://api.trade.gov/static/consolidated_screening_list/consolidated.csv";

fn download_url() -> String {
  std::env::var("US_CSL_DOWNLOAD_URL")
    .unwrap_or_else(|_| DEFAULT_URL.to_string())
}

pub async fn fetch<S: FileSource>(source: &S) -> Result<Vec<u8>> {
  source.fetch(FILE, &download_url()).await
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

struct Columns {
  id:          Option<usize>,
  kind:        Option<usize>,
  programs:    Option<usize>,
  name:        Option<usize>,
  title:       Option<usize>,
  addresses:   Option<usize>,
  call_sign:   Option<usize>,
  vessel_type: Option<usize>,
  tonnage:     Option<usize>,
  grt:         Option<usize>,
  vessel_flag: Option<usize>,
  vessel_owner: Option<usize>,
  remarks:     Option<usize>,
  alt_names:   Option<usize>,
  birth_dates: Option<usize>,
  birth_places: Option<usize>,
  ids:         Option<usize>,
}

impl Columns {
  fn from_header(header: &[String]) -> Result<Self> {
    let cols = Columns {
      id:           column_index(header, "_id"),
      kind:         column_index(header, "type"),
      programs:     column_index(header, "programs"),
      name:         column_index(header, "name"),
      title:        column_index(header, "title"),
      addresses:    column_index(header, "addresses"),
      call_sign:    column_index(header, "call_sign"),
      vessel_type:  column_index(header, "vessel_type"),
      tonnage:      column_index(header, "gross_tonnage"),
      grt:          column_index(header, "gross_registered_tonnage"),
      vessel_flag:  column_index(header, "vessel_flag"),
      vessel_owner: column_index(header, "vessel_owner"),
      remarks:      column_index(header, "remarks"),
      alt_names:    column_index(header, "alt_names"),
      birth_dates:  column_index(header, "dates_of_birth"),
      birth_places: column_index(header, "places_of_birth"),
      ids:          column_index(header, "ids"),
    };
    if cols.name.is_none() || cols.id.is_none() {
      return Err(Error::MalformedFile {
        file:   FILE.to_string(),
        detail: "header is missing _id / name columns".to_string(),
      });
    }
    Ok(cols)
  }
}

fn get<'a>(row: &'a [String], idx: Option<usize>) -> &'a str {
  idx.and_then(|i| row.get(i)).map(String::as_str).unwrap_or("").trim()
}

fn kind_of(value: &str) -> EntityKind {
  match value.to_ascii_lowercase().as_str() {
    "individual" => EntityKind::Person,
    "vessel" => EntityKind::Vessel,
    "aircraft" => EntityKind::Aircraft,
    _ => EntityKind::Business,
  }
}

/// `street, city, country; street, city, country` → addresses.
fn parse_addresses(value: &str) -> Vec<Address> {
  let mut out = Vec::new();
  for part in value.split("; ") {
    let part = part.trim();
    if part.is_empty() {
      continue;
    }
    let pieces: Vec<&str> = part.split(", ").collect();
    let addr = match pieces.len() {
      0 => continue,
      1 => Address {
        line1: pieces[0].to_string(),
        ..Default::default()
      },
      2 => Address {
        line1: pieces[0].to_string(),
        city: pieces[1].to_string(),
        ..Default::default()
      },
      n => Address {
        line1: pieces[..n - 2].join(", "),
        city: pieces[n - 2].to_string(),
        country: pieces[n - 1].to_string(),
        ..Default::default()
      },
    };
    out.push(addr);
  }
  out
}

/// Parse the consolidated list. Rows missing both name and identifier
/// are dropped; a missing header fails the source.
pub fn parse(raw: &[u8]) -> Result<Vec<Entity>> {
  let text = String::from_utf8_lossy(raw);
  let mut rows = split_records(&text, ',').into_iter();
  let header = rows.next().ok_or_else(|| Error::MalformedFile {
    file:   FILE.to_string(),
    detail: "empty file".to_string(),
  })?;
  let cols = Columns::from_header(&header)?;

  let mut entities = Vec::new();
  for row in rows {
    let id = get(&row, cols.id);
    let name = get(&row, cols.name);
    if id.is_empty() && name.is_empty() {
      tracing::warn!("skipping us_csl row without id and name");
      continue;
    }

    let kind = kind_of(get(&row, cols.kind));
    let mut entity = Entity::new(kind, SourceList::UsCsl);
    entity.source_id = id.to_string();
    entity.name = name.to_string();

    let alt_names: Vec<String> = get(&row, cols.alt_names)
      .split("; ")
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(str::to_string)
      .collect();

    match kind {
      EntityKind::Person => {
        let p = entity.person.as_mut().unwrap();
        p.name = name.to_string();
        p.alt_names = alt_names;
        let title = get(&row, cols.title);
        if !title.is_empty() {
          p.titles.push(title.to_string());
        }
        p.birth_date = get(&row, cols.birth_dates)
          .split("; ")
          .find_map(remarks::parse_remark_date);
        let pob = get(&row, cols.birth_places);
        if let Some(first) = pob.split("; ").next()
          && !first.is_empty()
        {
          p.place_of_birth = first.to_string();
        }
      }
      EntityKind::Vessel => {
        let v = entity.vessel.as_mut().unwrap();
        v.name = name.to_string();
        v.alt_names = alt_names;
        v.call_sign = get(&row, cols.call_sign).to_string();
        v.vessel_type = get(&row, cols.vessel_type).to_string();
        v.tonnage =
          get(&row, cols.tonnage).replace(',', "").parse().unwrap_or(0);
        v.gross_registered_tonnage =
          get(&row, cols.grt).replace(',', "").parse().unwrap_or(0);
        v.flag = get(&row, cols.vessel_flag).to_string();
        v.owner = get(&row, cols.vessel_owner).to_string();
      }
      EntityKind::Aircraft => {
        let a = entity.aircraft.as_mut().unwrap();
        a.name = name.to_string();
        a.alt_names = alt_names;
      }
      EntityKind::Business => {
        let b = entity.business.as_mut().unwrap();
        b.name = name.to_string();
        b.alt_names = alt_names;
      }
      EntityKind::Organization => {}
    }

    let programs: Vec<String> = get(&row, cols.programs)
      .split("; ")
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(str::to_string)
      .collect();
    if !programs.is_empty() {
      entity
        .sanctions_info
        .get_or_insert_with(Default::default)
        .programs = programs;
    }

    entity.addresses = parse_addresses(get(&row, cols.addresses));

    for clause in remarks::clauses(get(&row, cols.ids)) {
      remarks::apply(&mut entity, clause);
    }
    for clause in remarks::clauses(get(&row, cols.remarks)) {
      remarks::apply(&mut entity, clause);
    }

    entity.source_data = serde_json::json!({ "csl": row });
    entities.push(entity.normalize());
  }

  Ok(entities)
}
