//! relationship validates and persists referential constraints between two
//! tables of one database.
//!
//! A relationship pairs an ordered list of primary-side columns with an
//! equally long list of secondary-side columns of matching types.  When
//! referential integrity is requested, the primary side must be backed by a
//! unique index and the secondary side by a non-unique one; missing indexes
//! are created (as metadata) inside the same exclusive-write scope as the
//! relationship record itself.

use bitflags::bitflags;
use itertools::Itertools;
use std::collections::HashSet;

use crate::data_type::DataType;
use crate::database::Database;
use crate::table::{Index, Table};
use crate::value::Value;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RelationshipFlags: u32 {
        const ONE_TO_ONE = 0x00000001;
        const NO_REFERENTIAL_INTEGRITY = 0x00000002;
        const CASCADE_UPDATES = 0x00000100;
        const CASCADE_DELETES = 0x00001000;
        const CASCADE_NULL = 0x00002000;
        const LEFT_OUTER_JOIN = 0x01000000;
        const RIGHT_OUTER_JOIN = 0x02000000;
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Tables must belong to the same database to be related.")]
    DifferentDatabases,
    #[error("A relationship must relate at least one pair of columns.")]
    NoColumns,
    #[error("Unbalanced column lists: {primary} primary columns against {secondary} secondary columns.")]
    MismatchedColumnCounts { primary: usize, secondary: usize },
    #[error("Column {column} not found in table {table}.")]
    ColumnNotFound { table: String, column: String },
    #[error("Matched columns must have the same type: {primary_column} is {primary_type} but {secondary_column} is {secondary_type}.")]
    ColumnTypeMismatch {
        primary_column: String,
        primary_type: DataType,
        secondary_column: String,
        secondary_type: DataType,
    },
    #[error("A stored relationship record is malformed.")]
    BadRecord,
    #[error("Error persisting relationship: {0}")]
    Database(#[from] crate::database::Error),
    #[error("Error taking the write latch: {0}")]
    Channel(#[from] crate::page_channel::Error),
}

/// One persisted relationship between two tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    name: String,
    primary_table: String,
    secondary_table: String,
    flags: RelationshipFlags,
    primary_columns: Vec<String>,
    secondary_columns: Vec<String>,
}

impl Relationship {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_table(&self) -> &str {
        &self.primary_table
    }

    pub fn secondary_table(&self) -> &str {
        &self.secondary_table
    }

    pub fn flags(&self) -> RelationshipFlags {
        self.flags
    }

    pub fn primary_columns(&self) -> &[String] {
        &self.primary_columns
    }

    pub fn secondary_columns(&self) -> &[String] {
        &self.secondary_columns
    }

    pub fn has_referential_integrity(&self) -> bool {
        !self
            .flags
            .contains(RelationshipFlags::NO_REFERENTIAL_INTEGRITY)
    }

    pub fn is_one_to_one(&self) -> bool {
        self.flags.contains(RelationshipFlags::ONE_TO_ONE)
    }

    pub fn cascades_deletes(&self) -> bool {
        self.flags.contains(RelationshipFlags::CASCADE_DELETES)
    }

    pub fn cascades_updates(&self) -> bool {
        self.flags.contains(RelationshipFlags::CASCADE_UPDATES)
    }

    /// Serializes the record as one row of values, the layout
    /// `Database::write_relationship` persists.
    pub(crate) fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.name.clone()),
            Value::Text(self.primary_table.clone()),
            Value::Text(self.secondary_table.clone()),
            Value::Long(self.flags.bits() as i32),
            Value::Text(self.primary_columns.iter().join(";")),
            Value::Text(self.secondary_columns.iter().join(";")),
        ]
    }

    pub(crate) fn from_values(values: Vec<Value>) -> Result<Relationship, Error> {
        fn text(v: &Value) -> Result<String, Error> {
            v.as_text().cloned().ok_or(Error::BadRecord)
        }
        fn split_columns(joined: &str) -> Vec<String> {
            joined
                .split(';')
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        }
        if values.len() != 6 {
            return Err(Error::BadRecord);
        }
        let flag_bits = *values[3].as_long().ok_or(Error::BadRecord)? as u32;
        Ok(Relationship {
            name: text(&values[0])?,
            primary_table: text(&values[1])?,
            secondary_table: text(&values[2])?,
            flags: RelationshipFlags::from_bits_truncate(flag_bits),
            primary_columns: split_columns(&text(&values[4])?),
            secondary_columns: split_columns(&text(&values[5])?),
        })
    }
}

/// Accumulates the description of a relationship to be created.
#[derive(Debug, Clone, Default)]
pub struct RelationshipBuilder {
    name: Option<String>,
    flags: RelationshipFlags,
    primary_columns: Vec<String>,
    secondary_columns: Vec<String>,
}

impl Default for RelationshipFlags {
    fn default() -> Self {
        RelationshipFlags::NO_REFERENTIAL_INTEGRITY
    }
}

impl RelationshipBuilder {
    pub fn new() -> RelationshipBuilder {
        RelationshipBuilder {
            name: None,
            flags: RelationshipFlags::NO_REFERENTIAL_INTEGRITY,
            primary_columns: Vec::new(),
            secondary_columns: Vec::new(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Adds one primary/secondary column pair.
    pub fn add_columns(mut self, primary: &str, secondary: &str) -> Self {
        self.primary_columns.push(primary.to_string());
        self.secondary_columns.push(secondary.to_string());
        self
    }

    /// Asks for referential integrity to be enforced (clears the default
    /// no-integrity flag).
    pub fn referential_integrity(mut self) -> Self {
        self.flags.remove(RelationshipFlags::NO_REFERENTIAL_INTEGRITY);
        self
    }

    pub fn one_to_one(mut self) -> Self {
        self.flags.insert(RelationshipFlags::ONE_TO_ONE);
        self
    }

    pub fn cascade_updates(mut self) -> Self {
        self.flags.insert(RelationshipFlags::CASCADE_UPDATES);
        self
    }

    pub fn cascade_deletes(mut self) -> Self {
        self.flags.insert(RelationshipFlags::CASCADE_DELETES);
        self
    }

    pub fn cascade_null(mut self) -> Self {
        self.flags.insert(RelationshipFlags::CASCADE_NULL);
        self
    }

    pub fn left_outer_join(mut self) -> Self {
        self.flags.insert(RelationshipFlags::LEFT_OUTER_JOIN);
        self
    }

    pub fn right_outer_join(mut self) -> Self {
        self.flags.insert(RelationshipFlags::RIGHT_OUTER_JOIN);
        self
    }
}

/// Validates and persists one relationship.
pub struct RelationshipCreator;

impl RelationshipCreator {
    /// Validates `builder` against the two tables and, if every rule holds,
    /// persists the relationship record.  Any indexes referential integrity
    /// needs are created in the same exclusive-write scope.
    pub fn create_relationship(
        db: &Database,
        primary: &Table<'_>,
        secondary: &Table<'_>,
        builder: RelationshipBuilder,
    ) -> Result<Relationship, Error> {
        validate(db, primary, secondary, &builder)?;

        let name = builder
            .name
            .clone()
            .unwrap_or_else(|| format!("{}{}", primary.name(), secondary.name()));
        let relationship = Relationship {
            name,
            primary_table: primary.name().to_string(),
            secondary_table: secondary.name().to_string(),
            flags: builder.flags,
            primary_columns: builder.primary_columns,
            secondary_columns: builder.secondary_columns,
        };

        let latch = db.channel().start_exclusive_write()?;
        if relationship.has_referential_integrity() {
            ensure_primary_index(primary, &relationship.primary_columns);
            ensure_secondary_index(primary, secondary, &relationship.secondary_columns);
        }
        db.write_relationship(&relationship, &latch)?;
        log::debug!(
            "created relationship {} between {} and {}",
            relationship.name,
            relationship.primary_table,
            relationship.secondary_table
        );
        Ok(relationship)
    }
}

fn validate(
    db: &Database,
    primary: &Table<'_>,
    secondary: &Table<'_>,
    builder: &RelationshipBuilder,
) -> Result<(), Error> {
    if !std::ptr::eq(primary.database(), db) || !std::ptr::eq(secondary.database(), db) {
        return Err(Error::DifferentDatabases);
    }
    if builder.primary_columns.is_empty() {
        return Err(Error::NoColumns);
    }
    if builder.primary_columns.len() != builder.secondary_columns.len() {
        return Err(Error::MismatchedColumnCounts {
            primary: builder.primary_columns.len(),
            secondary: builder.secondary_columns.len(),
        });
    }
    for i in 0..builder.primary_columns.len() {
        let pcol = primary
            .column(&builder.primary_columns[i])
            .map_err(|_| Error::ColumnNotFound {
                table: primary.name().to_string(),
                column: builder.primary_columns[i].clone(),
            })?;
        let scol = secondary
            .column(&builder.secondary_columns[i])
            .map_err(|_| Error::ColumnNotFound {
                table: secondary.name().to_string(),
                column: builder.secondary_columns[i].clone(),
            })?;
        if pcol.data_type() != scol.data_type() {
            return Err(Error::ColumnTypeMismatch {
                primary_column: pcol.name().to_string(),
                primary_type: pcol.data_type(),
                secondary_column: scol.name().to_string(),
                secondary_type: scol.data_type(),
            });
        }
    }
    Ok(())
}

/// Guarantees a unique index over the primary columns, creating one with a
/// generated name if the table has none.
fn ensure_primary_index(primary: &Table<'_>, columns: &[String]) {
    if primary.find_index(columns, true).is_some() {
        return;
    }
    let name = unique_primary_index_name(&primary.index_names());
    let refs: Vec<&str> = columns.iter().map(|s| s.as_str()).collect();
    log::debug!("creating unique index {} on {}", name, primary.name());
    primary.add_index(Index::new(&name, &refs, true));
}

/// Guarantees a non-unique index over the secondary columns on the
/// secondary table.
fn ensure_secondary_index(primary: &Table<'_>, secondary: &Table<'_>, columns: &[String]) {
    if secondary.find_index(columns, false).is_some() {
        return;
    }
    let name =
        unique_secondary_index_name(primary.name(), secondary.name(), &secondary.index_names());
    let refs: Vec<&str> = columns.iter().map(|s| s.as_str()).collect();
    log::debug!("creating index {} on {}", name, secondary.name());
    secondary.add_index(Index::new(&name, &refs, false));
}

/// Generates a primary-side index name not already in `existing`
/// (case-insensitively): base `".r"`, suffix starting at `'C'` and advancing
/// through ASCII, wrapping to `'a'` in place of the `'['` that follows
/// `'Z'`.
pub fn unique_primary_index_name(existing: &[String]) -> String {
    let taken: HashSet<String> = existing.iter().map(|n| n.to_uppercase()).collect();
    let mut suffix = b'C';
    loop {
        let candidate = format!(".r{}", suffix as char);
        if !taken.contains(&candidate.to_uppercase()) {
            return candidate;
        }
        suffix += 1;
        if suffix == b'[' {
            suffix = b'a';
        }
    }
}

/// Generates a secondary-side index name not already in `existing`
/// (case-insensitively): the two table names concatenated, then numeric
/// suffixes `1, 2, …` on collision.
pub fn unique_secondary_index_name(
    primary_table: &str,
    secondary_table: &str,
    existing: &[String],
) -> String {
    let taken: HashSet<String> = existing.iter().map(|n| n.to_uppercase()).collect();
    let base = format!("{}{}", primary_table, secondary_table);
    if !taken.contains(&base.to_uppercase()) {
        return base;
    }
    let mut n = 1_u32;
    loop {
        let candidate = format!("{}{}", base, n);
        if !taken.contains(&candidate.to_uppercase()) {
            return candidate;
        }
        n += 1;
    }
}
