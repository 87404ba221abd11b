use common::types::ColumnDef;

/// Pure diff of described-vs-requested columns into an ADD/DROP/ALTER TYPE
/// plan (spec §4.5.3, §4.6). Primary-key membership is never part of the
/// plan — it's fixed for the lifetime of a table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub added: Vec<ColumnDef>,
    pub dropped: Vec<ColumnDef>,
    pub retyped: Vec<ColumnDef>,
}

/// Diffs `existing` (as returned by `describe_table`) against `requested`
/// (what the upstream wants). Ordering within each set is alphabetical by
/// column name for reproducible output (spec §4.6).
pub fn reconcile(existing: &[ColumnDef], requested: &[ColumnDef]) -> ReconcilePlan {
    let mut added: Vec<ColumnDef> = requested
        .iter()
        .filter(|r| !existing.iter().any(|e| e.name == r.name))
        .cloned()
        .collect();
    added.sort_by(|a, b| a.name.cmp(&b.name));

    let mut dropped: Vec<ColumnDef> = existing
        .iter()
        .filter(|e| !requested.iter().any(|r| r.name == e.name))
        .cloned()
        .collect();
    dropped.sort_by(|a, b| a.name.cmp(&b.name));

    let mut retyped: Vec<ColumnDef> = requested
        .iter()
        .filter(|r| {
            existing
                .iter()
                .any(|e| e.name == r.name && e.column_type != r.column_type)
        })
        .cloned()
        .collect();
    retyped.sort_by(|a, b| a.name.cmp(&b.name));

    ReconcilePlan { added, dropped, retyped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::ColumnType;

    #[test]
    fn added_columns_are_those_missing_from_existing() {
        let existing = vec![ColumnDef::new("id", ColumnType::Int)];
        let requested = vec![
            ColumnDef::new("id", ColumnType::Int),
            ColumnDef::new("title", ColumnType::String),
        ];
        let plan = reconcile(&existing, &requested);
        assert_eq!(plan.added.len(), 1);
        assert_eq!(plan.added[0].name, "title");
        assert!(plan.dropped.is_empty());
        assert!(plan.retyped.is_empty());
    }

    #[test]
    fn dropped_columns_are_those_missing_from_requested() {
        let existing = vec![
            ColumnDef::new("id", ColumnType::Int),
            ColumnDef::new("legacy", ColumnType::String),
        ];
        let requested = vec![ColumnDef::new("id", ColumnType::Int)];
        let plan = reconcile(&existing, &requested);
        assert_eq!(plan.dropped.len(), 1);
        assert_eq!(plan.dropped[0].name, "legacy");
    }

    #[test]
    fn retyped_columns_keep_their_primary_key_flag_changes_ignored() {
        let existing = vec![ColumnDef::new("amount", ColumnType::Int)];
        let requested = vec![ColumnDef::new("amount", ColumnType::Double).primary_key(true)];
        let plan = reconcile(&existing, &requested);
        assert_eq!(plan.retyped.len(), 1);
        assert_eq!(plan.retyped[0].column_type, ColumnType::Double);
    }

    #[test]
    fn plan_ordering_is_alphabetical_within_each_set() {
        let existing = vec![];
        let requested = vec![
            ColumnDef::new("zeta", ColumnType::Int),
            ColumnDef::new("alpha", ColumnType::Int),
        ];
        let plan = reconcile(&existing, &requested);
        assert_eq!(plan.added[0].name, "alpha");
        assert_eq!(plan.added[1].name, "zeta");
    }
}
