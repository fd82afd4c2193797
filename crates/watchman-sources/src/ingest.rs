//! Ingest preview: parse a caller-supplied CSV into entities.
//!
//! `POST /v2/ingest/{fileType}` lets integrators see how a dataset would
//! look in the unified schema before it ships as a regular source. The
//! parsed entities are returned to the caller and never touch the corpus.

use std::str::FromStr;

use watchman_core::entity::{Address, Entity, EntityKind, Gender, SourceList};

use crate::{
  csvutil::{column_index, split_records},
  error::{Error, Result},
  remarks,
};

/// Recognized file types: the entity kinds a preview CSV can declare.
const FILE_TYPES: &[&str] =
  &["person", "business", "organization", "aircraft", "vessel"];

/// Parse one preview CSV of the given type.
///
/// The header must carry a `name` column; `altNames` (pipe-separated),
/// `birthDate`/`created`, `gender`, `emailAddress`, `phoneNumber`, and
/// `address` are optional. Rows without a name are skipped.
pub fn parse_file(file_type: &str, body: &[u8]) -> Result<Vec<Entity>> {
  if !FILE_TYPES.contains(&file_type) {
    return Err(Error::UnknownFileType(file_type.to_string()));
  }
  let kind = EntityKind::from_str(file_type)
    .expect("FILE_TYPES entries are entity kinds");

  let text = String::from_utf8_lossy(body);
  let mut rows = split_records(&text, ',').into_iter();
  let header = rows.next().ok_or_else(|| Error::MalformedFile {
    file:   file_type.to_string(),
    detail: "empty file".to_string(),
  })?;
  let name_col =
    column_index(&header, "name").ok_or_else(|| Error::MalformedFile {
      file:   file_type.to_string(),
      detail: "header is missing a name column".to_string(),
    })?;
  let alt_col = column_index(&header, "altNames");
  let date_col = column_index(&header, "birthDate")
    .or_else(|| column_index(&header, "created"));
  let gender_col = column_index(&header, "gender");
  let email_col = column_index(&header, "emailAddress");
  let phone_col = column_index(&header, "phoneNumber");
  let address_col = column_index(&header, "address");

  let get = |row: &[String], idx: Option<usize>| -> String {
    idx
      .and_then(|i| row.get(i))
      .map(|s| s.trim().to_string())
      .unwrap_or_default()
  };

  let mut entities = Vec::new();
  for (line, row) in rows.enumerate() {
    let name = get(&row, Some(name_col));
    if name.is_empty() {
      tracing::warn!(line, "skipping ingest row without a name");
      continue;
    }

    let mut entity = Entity::new(kind, SourceList::ApiRequest);
    entity.source_id = (line + 1).to_string();
    entity.name = name.clone();

    let alt_names: Vec<String> = get(&row, alt_col)
      .split('|')
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(str::to_string)
      .collect();
    let date = remarks::parse_remark_date(&get(&row, date_col));

    match kind {
      EntityKind::Person => {
        let p = entity.person.as_mut().unwrap();
        p.name = name;
        p.alt_names = alt_names;
        p.birth_date = date;
        if let Ok(g) = Gender::from_str(&get(&row, gender_col)) {
          p.gender = g;
        }
      }
      EntityKind::Business => {
        let b = entity.business.as_mut().unwrap();
        b.name = name;
        b.alt_names = alt_names;
        b.created = date;
      }
      EntityKind::Organization => {
        let o = entity.organization.as_mut().unwrap();
        o.name = name;
        o.alt_names = alt_names;
        o.created = date;
      }
      EntityKind::Aircraft => {
        let a = entity.aircraft.as_mut().unwrap();
        a.name = name;
        a.alt_names = alt_names;
        a.built = date;
      }
      EntityKind::Vessel => {
        let v = entity.vessel.as_mut().unwrap();
        v.name = name;
        v.alt_names = alt_names;
        v.built = date;
      }
    }

    let email = get(&row, email_col);
    if !email.is_empty() {
      entity.contact.email_addresses.push(email);
    }
    let phone = get(&row, phone_col);
    if !phone.is_empty() {
      entity.contact.phone_numbers.push(phone);
    }
    let address = get(&row, address_col);
    if !address.is_empty() {
      entity.addresses.push(Address {
        line1: address,
        ..Default::default()
      });
    }

    entity.source_data = serde_json::json!({ "row": row });
    entities.push(entity.normalize());
  }

  Ok(entities)
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  #[test]
  fn parses_a_person_preview() {
    let body = concat!(
      "name,altNames,birthDate,gender,emailAddress,phoneNumber,address\n",
      "\"Juan Perez\",\"J. Perez|Juancho Perez\",1970-02-14,male,",
      "jp@example.com,+507 555 0100,\"Calle 50 Panama City\"\n",
    );
    let entities = parse_file("person", body.as_bytes()).unwrap();
    assert_eq!(entities.len(), 1);

    let e = &entities[0];
    assert_eq!(e.kind, EntityKind::Person);
    assert_eq!(e.source, SourceList::ApiRequest);
    let p = e.person.as_ref().unwrap();
    assert_eq!(p.alt_names, vec!["J. Perez", "Juancho Perez"]);
    assert_eq!(p.birth_date, NaiveDate::from_ymd_opt(1970, 2, 14));
    assert_eq!(p.gender, Gender::Male);
    assert_eq!(e.prepared_fields.phone_numbers, vec!["5075550100"]);
  }

  #[test]
  fn parses_a_business_preview() {
    let body = "name,created\n\"ACME TRADING LLC\",2001-06-01\n";
    let entities = parse_file("business", body.as_bytes()).unwrap();
    assert_eq!(entities[0].kind, EntityKind::Business);
    assert_eq!(
      entities[0].business.as_ref().unwrap().created,
      NaiveDate::from_ymd_opt(2001, 6, 1)
    );
    assert_eq!(entities[0].prepared_fields.name, "acme trading");
  }

  #[test]
  fn unknown_file_type_is_rejected() {
    assert!(matches!(
      parse_file("starship", b"name\nX\n").unwrap_err(),
      Error::UnknownFileType(_)
    ));
  }

  #[test]
  fn nameless_rows_are_skipped() {
    let body = "name,created\n,2001-06-01\n\"REAL CO\",\n";
    let entities = parse_file("business", body.as_bytes()).unwrap();
    assert_eq!(entities.len(), 1);
  }
}
