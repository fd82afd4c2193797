//! EU Consolidated Sanctions List adapter.
//!
//! The EU publishes a semicolon-delimited file where one sanctioned party
//! spans several rows sharing an `Entity_LogicalId`: one row per name
//! alias, address, birth date, or identification document. Rows are
//! grouped on the logical ID; the first whole name becomes the primary
//! name and the rest become alternates.
//!
//! The public download URL requires an opaque token; `EU_CSL_TOKEN`
//! overrides the published default and `EU_CSL_DOWNLOAD_URL` replaces the
//! endpoint wholesale for testing.

use std::collections::HashMap;

use watchman_core::entity::{
  Address, Entity, EntityKind, Gender, GovernmentId, GovernmentIdType,
  SourceList,
};

use crate::{
  csvutil::{column_index, split_records},
  download::FileSource,
  error::{Error, Result},
  remarks,
};

pub const FILE: &str = "eu_csl.csv";

/// Hardcoded on the EU site; override with `EU_CSL_TOKEN`.
const DEFAULT_TOKEN: &str = "dG9rZW4tMjAxNw";

fn download_url() -> String {
  if let Ok(url) = std::env::var("EU_CSL_DOWNLOAD_URL") {
    return url;
  }
  let token = std::env::var("EU_CSL_TOKEN")
    .unwrap_or_else(|_| DEFAULT_TOKEN.to_string());
  format!(
    "https://webgate.ec.europa.eu/fsd/fsf/public/files/csvFullSanctionsList_1_1/content?token={token}"
  )
}

pub async fn fetch<S: FileSource>(source: &S) -> Result<Vec<u8>> {
  source.fetch(FILE, &download_url()).await
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

struct Columns {
  logical_id:   usize,
  subject_type: Option<usize>,
  whole_name:   Option<usize>,
  gender:       Option<usize>,
  title:        Option<usize>,
  street:       Option<usize>,
  city:         Option<usize>,
  zip:          Option<usize>,
  country:      Option<usize>,
  birth_date:   Option<usize>,
  id_number:    Option<usize>,
  id_type:      Option<usize>,
  id_country:   Option<usize>,
}

impl Columns {
  fn from_header(header: &[String]) -> Result<Self> {
    let logical_id = column_index(header, "Entity_LogicalId").ok_or_else(
      || Error::MalformedFile {
        file:   FILE.to_string(),
        detail: "header is missing Entity_LogicalId".to_string(),
      },
    )?;
    Ok(Columns {
      logical_id,
      subject_type: column_index(header, "Entity_SubjectType"),
      whole_name: column_index(header, "NameAlias_WholeName"),
      gender: column_index(header, "NameAlias_Gender"),
      title: column_index(header, "NameAlias_Title"),
      street: column_index(header, "Address_Street"),
      city: column_index(header, "Address_City"),
      zip: column_index(header, "Address_ZipCode"),
      country: column_index(header, "Address_CountryIso2Code"),
      birth_date: column_index(header, "BirthDate_BirthDate"),
      id_number: column_index(header, "Identification_Number"),
      id_type: column_index(header, "Identification_TypeCode"),
      id_country: column_index(header, "Identification_CountryIso2Code"),
    })
  }
}

fn get<'a>(row: &'a [String], idx: Option<usize>) -> &'a str {
  idx.and_then(|i| row.get(i)).map(String::as_str).unwrap_or("").trim()
}

/// `P` marks a person; enterprises (`E`) map onto organizations.
fn kind_of(subject_type: &str) -> EntityKind {
  match subject_type.to_ascii_lowercase().as_str() {
    "p" | "person" => EntityKind::Person,
    _ => EntityKind::Organization,
  }
}

fn id_type_of(code: &str) -> GovernmentIdType {
  match code.to_ascii_lowercase().as_str() {
    "passport" => GovernmentIdType::Passport,
    "id" | "nid" => GovernmentIdType::NationalId,
    "ssn" => GovernmentIdType::Ssn,
    "regnumber" => GovernmentIdType::BusinessRegistration,
    _ => GovernmentIdType::PersonalId,
  }
}

/// Fold one row into the entity under construction.
fn merge_row(entity: &mut Entity, row: &[String], cols: &Columns) {
  let whole_name = get(row, cols.whole_name);
  if !whole_name.is_empty() && whole_name != entity.name {
    if let Some(p) = entity.person.as_mut() {
      if !p.alt_names.iter().any(|n| n == whole_name) {
        p.alt_names.push(whole_name.to_string());
      }
    } else if let Some(o) = entity.organization.as_mut()
      && !o.alt_names.iter().any(|n| n == whole_name)
    {
      o.alt_names.push(whole_name.to_string());
    }
  }

  if let Some(p) = entity.person.as_mut() {
    match get(row, cols.gender) {
      "M" => p.gender = Gender::Male,
      "F" => p.gender = Gender::Female,
      _ => {}
    }
    let title = get(row, cols.title);
    if !title.is_empty() && !p.titles.iter().any(|t| t == title) {
      p.titles.push(title.to_string());
    }
    if p.birth_date.is_none() {
      p.birth_date = remarks::parse_remark_date(get(row, cols.birth_date));
    }
  }

  let street = get(row, cols.street);
  let city = get(row, cols.city);
  let country = get(row, cols.country);
  if !street.is_empty() || !city.is_empty() || !country.is_empty() {
    let addr = Address {
      line1: street.to_string(),
      city: city.to_string(),
      postal_code: get(row, cols.zip).to_string(),
      country: country.to_string(),
      ..Default::default()
    };
    if !entity.addresses.contains(&addr) {
      entity.addresses.push(addr);
    }
  }

  let id_number = get(row, cols.id_number);
  if !id_number.is_empty() {
    let id = GovernmentId {
      id_type:    id_type_of(get(row, cols.id_type)),
      country:    get(row, cols.id_country).to_string(),
      identifier: id_number.to_string(),
    };
    let ids = if let Some(p) = entity.person.as_mut() {
      Some(&mut p.government_ids)
    } else {
      entity.organization.as_mut().map(|o| &mut o.government_ids)
    };
    if let Some(ids) = ids
      && !ids.contains(&id)
    {
      ids.push(id);
    }
  }
}

/// Parse the EU list. Rows with neither a name nor a logical ID are
/// dropped; a file without the logical-ID column fails the source.
pub fn parse(raw: &[u8]) -> Result<Vec<Entity>> {
  let text = String::from_utf8_lossy(raw);
  let mut rows = split_records(&text, ';').into_iter();
  let header = rows.next().ok_or_else(|| Error::MalformedFile {
    file:   FILE.to_string(),
    detail: "empty file".to_string(),
  })?;
  let cols = Columns::from_header(&header)?;

  let mut order: Vec<String> = Vec::new();
  let mut entities: HashMap<String, Entity> = HashMap::new();

  for row in rows {
    let logical_id = get(&row, Some(cols.logical_id));
    let whole_name = get(&row, cols.whole_name);
    if logical_id.is_empty() && whole_name.is_empty() {
      tracing::warn!("skipping eu_csl row without id and name");
      continue;
    }

    let entity = entities.entry(logical_id.to_string()).or_insert_with(|| {
      let kind = kind_of(get(&row, cols.subject_type));
      let mut e = Entity::new(kind, SourceList::EuCsl);
      e.source_id = logical_id.to_string();
      e.name = whole_name.to_string();
      match kind {
        EntityKind::Person => {
          e.person.as_mut().unwrap().name = whole_name.to_string()
        }
        _ => {
          e.organization.as_mut().unwrap().name = whole_name.to_string()
        }
      }
      e.source_data = serde_json::json!({ "rows": [] });
      order.push(logical_id.to_string());
      e
    });

    merge_row(entity, &row, &cols);
    if let Some(rows_json) = entity
      .source_data
      .get_mut("rows")
      .and_then(|v| v.as_array_mut())
    {
      rows_json.push(serde_json::json!(row));
    }
  }

  Ok(
    order
      .into_iter()
      .filter_map(|id| entities.remove(&id))
      .map(Entity::normalize)
      .collect(),
  )
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  const HEADER: &str = "fileGenerationDate;Entity_LogicalId;\
                        Entity_SubjectType;NameAlias_WholeName;\
                        NameAlias_Gender;NameAlias_Title;Address_Street;\
                        Address_City;Address_ZipCode;\
                        Address_CountryIso2Code;BirthDate_BirthDate;\
                        Identification_Number;Identification_TypeCode;\
                        Identification_CountryIso2Code\n";

  fn file(rows: &str) -> Vec<u8> {
    format!("{HEADER}{rows}").into_bytes()
  }

  #[test]
  fn groups_rows_by_logical_id() {
    let raw = file(concat!(
      "2024-01-01;13;P;Aleksandr IVANOV;M;;;;;;1960-05-01;;;\n",
      "2024-01-01;13;P;Alexander IVANOV;;;;;;;;;;\n",
      "2024-01-01;13;P;;;;Tverskaya 1;Moscow;101000;RU;;;;\n",
      "2024-01-01;13;P;;;;;;;;;(ru) 4509123456;id;RU\n",
      "2024-01-01;14;E;EXAMPLE CONCERN;;;;;;;;;;\n",
    ));
    let entities = parse(&raw).unwrap();
    assert_eq!(entities.len(), 2);

    let ivanov = &entities[0];
    assert_eq!(ivanov.kind, EntityKind::Person);
    assert_eq!(ivanov.source, SourceList::EuCsl);
    assert_eq!(ivanov.source_id, "13");
    assert_eq!(ivanov.name, "Aleksandr IVANOV");

    let p = ivanov.person.as_ref().unwrap();
    assert_eq!(p.alt_names, vec!["Alexander IVANOV"]);
    assert_eq!(p.gender, Gender::Male);
    assert_eq!(p.birth_date, NaiveDate::from_ymd_opt(1960, 5, 1));
    assert_eq!(p.government_ids.len(), 1);
    assert_eq!(p.government_ids[0].id_type, GovernmentIdType::NationalId);

    assert_eq!(ivanov.addresses.len(), 1);
    assert_eq!(ivanov.addresses[0].city, "Moscow");
    assert_eq!(ivanov.prepared_fields.addresses[0].country, "ru");

    let concern = &entities[1];
    assert_eq!(concern.kind, EntityKind::Organization);
    assert_eq!(concern.organization.as_ref().unwrap().name, "EXAMPLE CONCERN");
  }

  #[test]
  fn duplicate_aliases_are_collapsed() {
    let raw = file(concat!(
      "2024-01-01;13;P;Aleksandr IVANOV;;;;;;;;;;\n",
      "2024-01-01;13;P;Aleksandr IVANOV;;;;;;;;;;\n",
    ));
    let entities = parse(&raw).unwrap();
    assert!(entities[0].person.as_ref().unwrap().alt_names.is_empty());
  }

  #[test]
  fn rows_without_id_and_name_are_dropped() {
    let raw = file("2024-01-01;;P;;;;;;;;;;;\n");
    assert!(parse(&raw).unwrap().is_empty());
  }

  #[test]
  fn missing_logical_id_column_fails() {
    let raw = b"a;b;c\n1;2;3\n".to_vec();
    assert!(matches!(
      parse(&raw).unwrap_err(),
      Error::MalformedFile { .. }
    ));
  }
}
