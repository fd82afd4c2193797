//! Classification of SDN-style remark clauses.
//!
//! OFAC and the US CSL pack structured data into free-text remark
//! columns: `DOB 23 Nov 1962; POB Caracas, Venezuela; Passport 123456
//! (Venezuela); Linked To: SOME ENTITY.` Clauses are separated by `; `;
//! a key:value clause splits on the first `: `. Deeply nested values can
//! still mis-classify, so tests pin the observed upstream rows rather
//! than an idealized grammar.

use chrono::NaiveDate;
use watchman_core::entity::{
  Affiliation, Entity, Gender, GovernmentId, GovernmentIdType,
  HistoricalInfo, SanctionsInfo,
};

/// Split a remarks column into its clauses.
pub fn clauses(remarks: &str) -> impl Iterator<Item = &str> {
  remarks
    .split("; ")
    .map(str::trim)
    .filter(|c| !c.is_empty() && *c != "-0-")
}

/// Longest-prefix table of ID document keys. Order matters: the first
/// match wins, so more specific keys come first.
const ID_KEYS: &[(&str, GovernmentIdType)] = &[
  ("Diplomatic Passport", GovernmentIdType::DiplomaticPassport),
  ("Passport", GovernmentIdType::Passport),
  ("National ID No.", GovernmentIdType::NationalId),
  ("Cedula No.", GovernmentIdType::Cedula),
  ("C.U.R.P.", GovernmentIdType::Curp),
  ("C.U.I.T.", GovernmentIdType::Cuit),
  ("Tax ID No.", GovernmentIdType::TaxId),
  ("SSN", GovernmentIdType::Ssn),
  ("Driver's License No.", GovernmentIdType::DriversLicense),
  ("Electoral Registry No.", GovernmentIdType::Electoral),
  (
    "Business Registration Document #",
    GovernmentIdType::BusinessRegistration,
  ),
  (
    "Business Registration Number",
    GovernmentIdType::BusinessRegistration,
  ),
  (
    "Commercial Registry Number",
    GovernmentIdType::CommercialRegistry,
  ),
  ("Birth Certificate Number", GovernmentIdType::BirthCertificate),
  ("Refugee ID Card", GovernmentIdType::RefugeeId),
  ("Personal ID Card", GovernmentIdType::PersonalId),
];

/// Parse the date formats OFAC uses in remarks: `23 Nov 1962` and
/// `1962-11-23`. Partial dates (`circa 1962`) yield `None`.
pub fn parse_remark_date(value: &str) -> Option<NaiveDate> {
  let v = value.trim();
  NaiveDate::parse_from_str(v, "%d %b %Y")
    .or_else(|_| NaiveDate::parse_from_str(v, "%d %B %Y"))
    .or_else(|_| NaiveDate::parse_from_str(v, "%Y-%m-%d"))
    .ok()
}

/// Split `123456 (Venezuela) expires 2025` into the identifier and the
/// issuing country.
fn identifier_and_country(rest: &str) -> (String, String) {
  let rest = rest.trim().trim_end_matches('.');
  if let Some(open) = rest.find(" (")
    && let Some(close) = rest[open..].find(')')
  {
    let identifier = rest[..open].trim().to_string();
    let country = rest[open + 2..open + close].trim().to_string();
    return (identifier, country);
  }
  (rest.to_string(), String::new())
}

fn push_government_id(entity: &mut Entity, id: GovernmentId) {
  if let Some(p) = entity.person.as_mut() {
    p.government_ids.push(id);
  } else if let Some(b) = entity.business.as_mut() {
    b.government_ids.push(id);
  } else if let Some(o) = entity.organization.as_mut() {
    o.government_ids.push(id);
  }
}

fn sanctions_info(entity: &mut Entity) -> &mut SanctionsInfo {
  entity.sanctions_info.get_or_insert_with(SanctionsInfo::default)
}

/// Strip a leading `alt.` / `Alt.` qualifier.
fn strip_alt(clause: &str) -> &str {
  for prefix in ["alt. ", "Alt. ", "alt.", "Alt."] {
    if let Some(rest) = clause.strip_prefix(prefix) {
      return rest.trim_start();
    }
  }
  clause
}

/// Value of a `Key: value` or `Key value` clause, given the key.
fn value_after<'a>(clause: &'a str, key: &str) -> Option<&'a str> {
  let rest = clause.strip_prefix(key)?;
  Some(rest.trim_start_matches(':').trim())
}

/// Classify one remark clause onto `entity`. Unrecognized clauses are
/// left alone; the raw remarks stay available in `source_data`.
pub fn apply(entity: &mut Entity, clause: &str) {
  let clause = strip_alt(clause.trim());
  if clause.is_empty() {
    return;
  }

  // Person biography.
  if let Some(value) = value_after(clause, "DOB") {
    if let Some(p) = entity.person.as_mut()
      && p.birth_date.is_none()
    {
      p.birth_date = parse_remark_date(value);
    }
    return;
  }
  if let Some(value) = value_after(clause, "POB") {
    if let Some(p) = entity.person.as_mut()
      && p.place_of_birth.is_empty()
    {
      p.place_of_birth = value.to_string();
    }
    return;
  }
  if let Some(value) = value_after(clause, "Gender") {
    if let Some(p) = entity.person.as_mut() {
      p.gender = match value {
        "Male" => Gender::Male,
        "Female" => Gender::Female,
        _ => Gender::Unknown,
      };
    }
    return;
  }
  if let Some(value) = value_after(clause, "citizen") {
    push_government_id(entity, GovernmentId {
      id_type:    GovernmentIdType::Citizenship,
      country:    value.trim_end_matches('.').to_string(),
      identifier: String::new(),
    });
    return;
  }
  if let Some(value) = value_after(clause, "nationality") {
    push_government_id(entity, GovernmentId {
      id_type:    GovernmentIdType::Nationality,
      country:    value.trim_end_matches('.').to_string(),
      identifier: String::new(),
    });
    return;
  }

  // Contact info.
  if let Some(value) = value_after(clause, "Email Address") {
    entity.contact.email_addresses.push(value.to_string());
    return;
  }
  if let Some(value) = value_after(clause, "Website") {
    entity.contact.websites.push(value.to_string());
    return;
  }
  if let Some(value) = value_after(clause, "Telephone") {
    entity.contact.phone_numbers.push(value.to_string());
    return;
  }
  if let Some(value) = value_after(clause, "Fax") {
    entity.contact.fax_numbers.push(value.to_string());
    return;
  }

  // Vessel identifiers sometimes live in remarks instead of columns.
  if let Some(pos) = clause.find("IMO ") {
    let digits: String = clause[pos + 4..]
      .chars()
      .take_while(char::is_ascii_digit)
      .collect();
    if digits.len() == 7
      && let Some(v) = entity.vessel.as_mut()
      && v.imo_number.is_empty()
    {
      v.imo_number = digits;
      return;
    }
  }
  if let Some(value) = value_after(clause, "MMSI") {
    if let Some(v) = entity.vessel.as_mut() {
      v.mmsi = value.trim_end_matches('.').to_string();
    }
    return;
  }

  // Aircraft details.
  if let Some(value) = value_after(clause, "Aircraft Model") {
    if let Some(a) = entity.aircraft.as_mut() {
      a.model = value.trim_end_matches('.').to_string();
    }
    return;
  }
  if let Some(value) =
    value_after(clause, "Manufacturer's Serial Number (MSN)")
  {
    if let Some(a) = entity.aircraft.as_mut() {
      a.serial_number = value.trim_end_matches('.').to_string();
    }
    return;
  }

  // Relationships and sanctions metadata.
  if let Some(value) = value_after(clause, "Linked To") {
    entity.affiliations.push(Affiliation {
      entity_name: value.trim_end_matches('.').to_string(),
      kind:        "Linked To".to_string(),
      details:     String::new(),
    });
    return;
  }
  if let Some(value) =
    value_after(clause, "Additional Sanctions Information -")
  {
    let info = sanctions_info(entity);
    if value.contains("Secondary Sanctions") {
      info.secondary = true;
    }
    if info.description.is_empty() {
      info.description = value.trim_end_matches('.').to_string();
    }
    return;
  }
  if let Some(value) = value_after(clause, "Former Name") {
    entity.historical_info.push(HistoricalInfo {
      kind:  "Former Name".to_string(),
      value: value.trim_matches(['\'', '.', ' ']).to_string(),
      date:  None,
    });
    return;
  }
  if let Some(value) = value_after(clause, "Organization Established Date")
  {
    let date = parse_remark_date(value.trim_end_matches('.'));
    if let Some(b) = entity.business.as_mut() {
      b.created = date;
    } else if let Some(o) = entity.organization.as_mut() {
      o.created = date;
    }
    return;
  }
  if let Some(value) = value_after(clause, "a.k.a.") {
    let name = value.trim_matches(['\'', '.', ' ']).to_string();
    if !name.is_empty()
      && let Some(p) = entity.person.as_mut()
    {
      p.alt_names.push(name);
    }
    return;
  }

  // Government IDs, longest key first.
  for (key, id_type) in ID_KEYS {
    if let Some(rest) = clause.strip_prefix(key) {
      let (identifier, country) = identifier_and_country(rest);
      if !identifier.is_empty() {
        push_government_id(entity, GovernmentId {
          id_type: *id_type,
          country,
          identifier,
        });
      }
      return;
    }
  }
}

#[cfg(test)]
mod tests {
  use watchman_core::entity::{EntityKind, SourceList};

  use super::*;

  fn person() -> Entity {
    Entity::new(EntityKind::Person, SourceList::UsOfac)
  }

  fn business() -> Entity {
    Entity::new(EntityKind::Business, SourceList::UsOfac)
  }

  #[test]
  fn dob_and_pob() {
    let mut e = person();
    apply(&mut e, "DOB 23 Nov 1962");
    apply(&mut e, "POB Caracas, Venezuela");
    let p = e.person.as_ref().unwrap();
    assert_eq!(p.birth_date, NaiveDate::from_ymd_opt(1962, 11, 23));
    assert_eq!(p.place_of_birth, "Caracas, Venezuela");
  }

  #[test]
  fn partial_dob_is_skipped() {
    let mut e = person();
    apply(&mut e, "DOB circa 1962");
    assert!(e.person.as_ref().unwrap().birth_date.is_none());
  }

  #[test]
  fn passport_with_country() {
    let mut e = person();
    apply(&mut e, "Passport 123456789 (Venezuela)");
    let ids = &e.person.as_ref().unwrap().government_ids;
    assert_eq!(ids.len(), 1);
    assert_eq!(ids[0].id_type, GovernmentIdType::Passport);
    assert_eq!(ids[0].identifier, "123456789");
    assert_eq!(ids[0].country, "Venezuela");
  }

  #[test]
  fn cedula_goes_to_the_person_record() {
    let mut e = person();
    apply(&mut e, "Cedula No. 5892464 (Venezuela)");
    let ids = &e.person.as_ref().unwrap().government_ids;
    assert_eq!(ids[0].id_type, GovernmentIdType::Cedula);
  }

  #[test]
  fn business_registration_document() {
    let mut e = business();
    apply(&mut e, "Business Registration Document # 18745 (Iran)");
    let ids = &e.business.as_ref().unwrap().government_ids;
    assert_eq!(ids[0].id_type, GovernmentIdType::BusinessRegistration);
    assert_eq!(ids[0].identifier, "18745");
    assert_eq!(ids[0].country, "Iran");
  }

  #[test]
  fn alt_email_is_still_an_email() {
    // The `alt.` qualifier embeds the `; ` delimiter upstream; pin the
    // observed behavior.
    let mut e = business();
    apply(&mut e, "alt. Email Address info@tidewaterco.ir");
    assert_eq!(e.contact.email_addresses, vec!["info@tidewaterco.ir"]);
  }

  #[test]
  fn telephone_and_fax_with_colons() {
    let mut e = business();
    apply(&mut e, "Telephone: 982188553321");
    apply(&mut e, "Alt. Fax: 982188708911.");
    assert_eq!(e.contact.phone_numbers, vec!["982188553321"]);
    assert_eq!(e.contact.fax_numbers, vec!["982188708911."]);
  }

  #[test]
  fn secondary_sanctions_flag() {
    let mut e = business();
    apply(
      &mut e,
      "Additional Sanctions Information - Subject to Secondary Sanctions",
    );
    assert!(e.sanctions_info.as_ref().unwrap().secondary);
  }

  #[test]
  fn linked_to_becomes_affiliation() {
    let mut e = business();
    apply(&mut e, "Linked To: ISLAMIC REVOLUTIONARY GUARD CORPS.");
    assert_eq!(e.affiliations.len(), 1);
    assert_eq!(
      e.affiliations[0].entity_name,
      "ISLAMIC REVOLUTIONARY GUARD CORPS"
    );
    assert_eq!(e.affiliations[0].kind, "Linked To");
  }

  #[test]
  fn imo_in_remarks_fills_the_vessel() {
    let mut e = Entity::new(EntityKind::Vessel, SourceList::UsOfac);
    apply(&mut e, "Vessel Registration Identification IMO 9126493");
    assert_eq!(e.vessel.as_ref().unwrap().imo_number, "9126493");
  }

  #[test]
  fn citizen_maps_to_citizenship() {
    let mut e = person();
    apply(&mut e, "citizen Venezuela");
    let ids = &e.person.as_ref().unwrap().government_ids;
    assert_eq!(ids[0].id_type, GovernmentIdType::Citizenship);
    assert_eq!(ids[0].country, "Venezuela");
  }

  #[test]
  fn unrecognized_clause_is_ignored() {
    let mut e = person();
    apply(&mut e, "IFCA Determination - Port Operator");
    assert!(e.person.as_ref().unwrap().government_ids.is_empty());
    assert!(e.contact.is_empty());
  }
}
