//! UK Consolidated Sanctions List adapter.
//!
//! The UK publishes its list as XML: one `<Designation>` per sanctioned
//! party with nested `<Name>`, `<Address>`, and ship detail blocks. The
//! reader is a flat event loop; element text is routed by the enclosing
//! block, and a designation is flushed into an [`Entity`] when its end
//! tag closes.

use chrono::NaiveDate;
use quick_xml::events::Event;
use watchman_core::entity::{Address, Entity, EntityKind, SourceList};

use crate::{
  download::FileSource,
  error::{Error, Result},
};

pub const FILE: &str = "uk_csl.xml";

const DEFAULT_URL: &str =
  "https://assets.publishing.service.gov.uk/media/uk-sanctions-list.xml";

fn download_url() -> String {
  std::env::var("UK_CSL_DOWNLOAD_URL")
    .unwrap_or_else(|_| DEFAULT_URL.to_string())
}

pub async fn fetch<S: FileSource>(source: &S) -> Result<Vec<u8>> {
  source.fetch(FILE, &download_url()).await
}

// ─── Designation builder ─────────────────────────────────────────────────────

#[derive(Default)]
struct NameBlock {
  name_type: String,
  parts:     Vec<String>,
}

#[derive(Default)]
struct AddressBlock {
  line1:       String,
  line2:       String,
  city:        String,
  postal_code: String,
  country:     String,
}

#[derive(Default)]
struct Designation {
  unique_id:  String,
  regime:     String,
  kind:       String,
  names:      Vec<NameBlock>,
  addresses:  Vec<AddressBlock>,
  birth_date: Option<NaiveDate>,
  imo_number: String,
}

impl Designation {
  fn build(self) -> Option<Entity> {
    let mut named: Vec<(String, String)> = self
      .names
      .into_iter()
      .filter_map(|n| {
        let joined = n.parts.join(" ");
        let joined = joined.trim();
        if joined.is_empty() {
          None
        } else {
          Some((n.name_type, joined.to_string()))
        }
      })
      .collect();
    if named.is_empty() {
      return None;
    }
    // Primary name when marked, first listed name otherwise.
    let primary_idx = named
      .iter()
      .position(|(t, _)| t == "Primary Name")
      .unwrap_or(0);
    let (_, primary) = named.remove(primary_idx);
    let alt_names: Vec<String> =
      named.into_iter().map(|(_, n)| n).collect();

    let kind = match self.kind.as_str() {
      "Individual" => EntityKind::Person,
      "Ship" => EntityKind::Vessel,
      _ => EntityKind::Organization,
    };
    let mut entity = Entity::new(kind, SourceList::UkCsl);
    entity.source_data = serde_json::json!({
      "uniqueID": self.unique_id.clone(),
      "regimeName": self.regime.clone(),
      "individualEntityShip": self.kind.clone(),
    });
    entity.source_id = self.unique_id;
    entity.name = primary.clone();

    match kind {
      EntityKind::Person => {
        let p = entity.person.as_mut().unwrap();
        p.name = primary;
        p.alt_names = alt_names;
        p.birth_date = self.birth_date;
      }
      EntityKind::Vessel => {
        let v = entity.vessel.as_mut().unwrap();
        v.name = primary;
        v.alt_names = alt_names;
        v.imo_number = self.imo_number;
      }
      _ => {
        let o = entity.organization.as_mut().unwrap();
        o.name = primary;
        o.alt_names = alt_names;
      }
    }

    entity.addresses = self
      .addresses
      .into_iter()
      .map(|a| Address {
        line1: a.line1,
        line2: a.line2,
        city: a.city,
        postal_code: a.postal_code,
        country: a.country,
        ..Default::default()
      })
      .collect();

    if !self.regime.is_empty() {
      entity
        .sanctions_info
        .get_or_insert_with(Default::default)
        .programs = vec![self.regime];
    }

    Some(entity.normalize())
  }
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

/// The UK list writes dates as `dd/mm/yyyy`.
fn parse_uk_date(value: &str) -> Option<NaiveDate> {
  let v = value.trim();
  NaiveDate::parse_from_str(v, "%d/%m/%Y")
    .or_else(|_| NaiveDate::parse_from_str(v, "%Y-%m-%d"))
    .ok()
}

/// Parse the UK list XML into normalized entities, in document order.
pub fn parse(raw: &[u8]) -> Result<Vec<Entity>> {
  let mut reader = quick_xml::Reader::from_reader(raw);
  reader.config_mut().trim_text(true);

  let mut entities: Vec<Entity> = Vec::new();
  let mut designation: Option<Designation> = None;
  let mut name: Option<NameBlock> = None;
  let mut address: Option<AddressBlock> = None;
  let mut element: Vec<u8> = Vec::new();
  let mut buf = Vec::new();
  let mut seen_designations = false;

  loop {
    match reader.read_event_into(&mut buf) {
      Ok(Event::Start(ref e)) => {
        element = e.name().as_ref().to_vec();
        match element.as_slice() {
          b"Designation" => {
            seen_designations = true;
            designation = Some(Designation::default());
          }
          b"Name" => name = Some(NameBlock::default()),
          b"Address" => address = Some(AddressBlock::default()),
          _ => {}
        }
      }
      Ok(Event::Text(ref t)) => {
        let Some(d) = designation.as_mut() else {
          buf.clear();
          continue;
        };
        let text = t.unescape().map_err(|e| Error::MalformedFile {
          file:   FILE.to_string(),
          detail: e.to_string(),
        })?;
        let text = text.trim();
        if text.is_empty() {
          buf.clear();
          continue;
        }
        match element.as_slice() {
          b"UniqueID" => d.unique_id = text.to_string(),
          b"RegimeName" => d.regime = text.to_string(),
          b"IndividualEntityShip" => d.kind = text.to_string(),
          b"NameType" => {
            if let Some(n) = name.as_mut() {
              n.name_type = text.to_string();
            }
          }
          b"Name1" | b"Name2" | b"Name3" | b"Name4" | b"Name5"
          | b"Name6" => {
            if let Some(n) = name.as_mut() {
              n.parts.push(text.to_string());
            }
          }
          b"AddressLine1" => {
            if let Some(a) = address.as_mut() {
              a.line1 = text.to_string();
            }
          }
          b"AddressLine2" => {
            if let Some(a) = address.as_mut() {
              a.line2 = text.to_string();
            }
          }
          b"AddressLine3" => {
            if let Some(a) = address.as_mut() {
              a.city = text.to_string();
            }
          }
          b"AddressPostalCode" => {
            if let Some(a) = address.as_mut() {
              a.postal_code = text.to_string();
            }
          }
          b"AddressCountry" => {
            if let Some(a) = address.as_mut() {
              a.country = text.to_string();
            }
          }
          b"DOB" => {
            if d.birth_date.is_none() {
              d.birth_date = parse_uk_date(text);
            }
          }
          b"IMONumber" => d.imo_number = text.to_string(),
          _ => {}
        }
      }
      Ok(Event::End(ref e)) => match e.name().as_ref() {
        b"Designation" => {
          if let Some(entity) =
            designation.take().and_then(Designation::build)
          {
            entities.push(entity);
          } else {
            tracing::warn!("skipping uk_csl designation without a name");
          }
        }
        b"Name" => {
          if let (Some(d), Some(n)) = (designation.as_mut(), name.take()) {
            d.names.push(n);
          }
        }
        b"Address" => {
          if let (Some(d), Some(a)) =
            (designation.as_mut(), address.take())
          {
            d.addresses.push(a);
          }
        }
        _ => {}
      },
      Ok(Event::Eof) => break,
      Err(e) => {
        return Err(Error::MalformedFile {
          file:   FILE.to_string(),
          detail: e.to_string(),
        });
      }
      _ => {}
    }
    buf.clear();
  }

  if !seen_designations {
    return Err(Error::MalformedFile {
      file:   FILE.to_string(),
      detail: "no designations found".to_string(),
    });
  }

  Ok(entities)
}

#[cfg(test)]
mod tests {
  use watchman_core::entity::Gender;

  use super::*;

  const XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Designations>
  <Designation>
    <LastUpdated>2024-03-01</LastUpdated>
    <UniqueID>AFG0001</UniqueID>
    <RegimeName>The Afghanistan (Sanctions) (EU Exit) Regulations 2020</RegimeName>
    <IndividualEntityShip>Individual</IndividualEntityShip>
    <Names>
      <Name>
        <NameType>Primary Name</NameType>
        <Name1>Abdul</Name1>
        <Name6>AZIZI</Name6>
      </Name>
      <Name>
        <NameType>Alias</NameType>
        <Name6>Abdul Aziz</Name6>
      </Name>
    </Names>
    <Addresses>
      <Address>
        <AddressLine1>Sheykhan Village</AddressLine1>
        <AddressLine3>Pirkowti Area</AddressLine3>
        <AddressCountry>Afghanistan</AddressCountry>
      </Address>
    </Addresses>
    <IndividualDetails>
      <DOBs>
        <DOB>01/01/1972</DOB>
      </DOBs>
    </IndividualDetails>
  </Designation>
  <Designation>
    <UniqueID>RUS0305</UniqueID>
    <RegimeName>The Russia (Sanctions) (EU Exit) Regulations 2019</RegimeName>
    <IndividualEntityShip>Ship</IndividualEntityShip>
    <Names>
      <Name>
        <NameType>Primary Name</NameType>
        <Name6>SUN SHIP</Name6>
      </Name>
    </Names>
    <ShipDetails>
      <IMONumber>9524475</IMONumber>
    </ShipDetails>
  </Designation>
</Designations>
"#;

  #[test]
  fn parses_individuals_and_ships() {
    let entities = parse(XML.as_bytes()).unwrap();
    assert_eq!(entities.len(), 2);

    let azizi = &entities[0];
    assert_eq!(azizi.kind, EntityKind::Person);
    assert_eq!(azizi.source, SourceList::UkCsl);
    assert_eq!(azizi.source_id, "AFG0001");
    assert_eq!(azizi.name, "Abdul AZIZI");

    let p = azizi.person.as_ref().unwrap();
    assert_eq!(p.alt_names, vec!["Abdul Aziz"]);
    assert_eq!(p.gender, Gender::Unknown);
    assert_eq!(p.birth_date, NaiveDate::from_ymd_opt(1972, 1, 1));

    assert_eq!(azizi.addresses.len(), 1);
    assert_eq!(azizi.addresses[0].city, "Pirkowti Area");
    assert_eq!(azizi.prepared_fields.addresses[0].country, "af");

    let ship = &entities[1];
    assert_eq!(ship.kind, EntityKind::Vessel);
    assert_eq!(ship.vessel.as_ref().unwrap().imo_number, "9524475");
  }

  #[test]
  fn regime_name_becomes_a_program() {
    let entities = parse(XML.as_bytes()).unwrap();
    let programs =
      &entities[0].sanctions_info.as_ref().unwrap().programs;
    assert_eq!(programs.len(), 1);
    assert!(programs[0].contains("Afghanistan"));
  }

  #[test]
  fn garbage_input_fails_the_source() {
    assert!(matches!(
      parse(b"not xml at all").unwrap_err(),
      Error::MalformedFile { .. }
    ));
  }

  #[test]
  fn designation_without_names_is_skipped() {
    let xml = r#"<Designations>
      <Designation>
        <UniqueID>X1</UniqueID>
        <IndividualEntityShip>Individual</IndividualEntityShip>
      </Designation>
    </Designations>"#;
    let entities = parse(xml.as_bytes()).unwrap();
    assert!(entities.is_empty());
  }
}
