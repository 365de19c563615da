//! Field catalog for the leave/license entity.
//!
//! The records API identifies columns by opaque numeric ids. This table is the
//! only place those ids are given human-readable names; the normalizer, the
//! tool contract defaults and the CLI listing all read from it.

use std::borrow::Cow;

/// Employee ("Empleado").
pub const EMPLOYEE: &str = "912";
/// Leave start date.
pub const START_DATE: &str = "651";
/// Leave end date.
pub const END_DATE: &str = "665";
/// Date the employee is back at work.
pub const REINSTATEMENT_DATE: &str = "653";

/// Fields emitted first, in this order, whenever a record carries them.
pub const PRIORITY_FIELDS: [&str; 4] = [EMPLOYEE, START_DATE, END_DATE, REINSTATEMENT_DATE];

/// Bookkeeping keys the records API adds to every row.
pub const SYSTEM_KEYS: [&str; 5] = [
    "id",
    "date_added",
    "date_updated",
    "created_by",
    "parent_item_id",
];

/// Column selection used when the caller does not pick one.
pub const DEFAULT_SELECTION: [&str; 4] = [START_DATE, END_DATE, REINSTATEMENT_DATE, EMPLOYEE];

/// [`DEFAULT_SELECTION`] as the comma-joined `select_fields` value.
pub const DEFAULT_SELECT_FIELDS: &str = "651,665,653,912";

/// One catalog row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldEntry {
    pub id: &'static str,
    pub name: &'static str,
}

static FIELDS: &[FieldEntry] = &[
    FieldEntry {
        id: START_DATE,
        name: "Fecha de inicio",
    },
    FieldEntry {
        id: END_DATE,
        name: "Fecha Finalización",
    },
    FieldEntry {
        id: REINSTATEMENT_DATE,
        name: "Reincorporación",
    },
    FieldEntry {
        id: EMPLOYEE,
        name: "Empleado",
    },
];

/// All known fields, in catalog order.
pub fn entries() -> &'static [FieldEntry] {
    FIELDS
}

/// Name of a known field, if any.
pub fn name_of(field_id: &str) -> Option<&'static str> {
    FIELDS.iter().find(|f| f.id == field_id).map(|f| f.name)
}

/// Resolve a field id to its display name.
///
/// Total: ids missing from the catalog get the placeholder `"Field <id>"`.
pub fn lookup(field_id: &str) -> Cow<'static, str> {
    match name_of(field_id) {
        Some(name) => Cow::Borrowed(name),
        None => Cow::Owned(format!("Field {field_id}")),
    }
}

pub fn is_system_key(key: &str) -> bool {
    SYSTEM_KEYS.contains(&key)
}

pub fn is_priority_field(key: &str) -> bool {
    PRIORITY_FIELDS.contains(&key)
}
