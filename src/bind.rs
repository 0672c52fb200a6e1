//! Column binding.
//!
//! At session start the row source's live layout is matched to the stored
//! destination descriptors by stable external identity, producing the
//! ordered binding list both load strategies consume. Slots are recorded
//! here, once per session, never re-derived per row.

use std::collections::HashSet;

use crate::error::{LoadError, Result};
use crate::schema::{ColumnDescriptor, LogicalType};
use crate::source::ColumnLayout;

/// Runtime pairing of one source column to one destination descriptor.
#[derive(Debug, Clone)]
pub struct ColumnBinding {
    /// Index into the row source's fixed-layout buffer.
    pub slot: usize,

    /// Logical type of the source cell, used for extraction.
    pub source_type: LogicalType,

    /// Matched destination column descriptor, used for encoding.
    pub descriptor: ColumnDescriptor,
}

/// Match the live layout to the stored descriptors.
///
/// Walks the layout in its given order and resolves each column's external
/// identity against the descriptor names. Partial binding is not permitted:
/// any unresolved column, or two columns resolving to the same descriptor,
/// fails the whole bind before a single row is processed.
pub fn bind(layout: &ColumnLayout, descriptors: &[ColumnDescriptor]) -> Result<Vec<ColumnBinding>> {
    let mut bound: HashSet<&str> = HashSet::with_capacity(layout.len());
    let mut bindings = Vec::with_capacity(layout.len());

    for input in &layout.columns {
        let descriptor = descriptors
            .iter()
            .find(|d| d.name == input.external_name)
            .ok_or_else(|| LoadError::UnresolvedColumn(input.external_name.clone()))?;

        if !bound.insert(input.external_name.as_str()) {
            return Err(LoadError::DuplicateBinding(input.external_name.clone()));
        }

        bindings.push(ColumnBinding {
            slot: input.slot,
            source_type: input.logical_type,
            descriptor: descriptor.clone(),
        });
    }

    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::descriptor_from_column;
    use crate::source::InputColumn;
    use tokio_postgres::types::Type;

    fn descriptors() -> Vec<ColumnDescriptor> {
        vec![
            descriptor_from_column("a", &Type::INT4, -1),
            descriptor_from_column("b", &Type::VARCHAR, 10 + 4),
            descriptor_from_column("c", &Type::BOOL, -1),
        ]
    }

    #[test]
    fn test_bind_follows_layout_order() {
        // Layout order differs from descriptor order; bindings follow layout.
        let layout = ColumnLayout::new(vec![
            InputColumn::simple("c", 2, LogicalType::Bool),
            InputColumn::simple("a", 0, LogicalType::Int32),
        ]);
        let bindings = bind(&layout, &descriptors()).unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].descriptor.name, "c");
        assert_eq!(bindings[0].slot, 2);
        assert_eq!(bindings[1].descriptor.name, "a");
        assert_eq!(bindings[1].slot, 0);
    }

    #[test]
    fn test_bind_matches_external_identity_not_display_name() {
        let mut col = InputColumn::simple("display label", 0, LogicalType::Int32);
        col.external_name = "a".to_string();
        let layout = ColumnLayout::new(vec![col]);
        let bindings = bind(&layout, &descriptors()).unwrap();
        assert_eq!(bindings[0].descriptor.name, "a");
    }

    #[test]
    fn test_unresolved_column_fails_whole_bind() {
        let layout = ColumnLayout::new(vec![
            InputColumn::simple("a", 0, LogicalType::Int32),
            InputColumn::simple("missing", 1, LogicalType::Int32),
        ]);
        let err = bind(&layout, &descriptors()).unwrap_err();
        match err {
            LoadError::UnresolvedColumn(name) => assert_eq!(name, "missing"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let layout = ColumnLayout::new(vec![
            InputColumn::simple("a", 0, LogicalType::Int32),
            InputColumn::simple("a", 1, LogicalType::Int64),
        ]);
        let err = bind(&layout, &descriptors()).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateBinding(_)));
    }
}
