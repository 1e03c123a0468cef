//! Binding plans: source position → record field.

use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;

use super::BindError;
use super::schema::{Record, Source};
use super::value::{SourceValue, assign};

/// Maps every position of one source shape to a field index, or to nothing.
///
/// Built from a record's descriptor and the ordered keys (JSON keys, form
/// names, SQL column names) of a concrete source. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingPlan {
    targets: Vec<Option<usize>>,
}

impl BindingPlan {
    pub fn build<R: Record, K: AsRef<str>>(source: Source, keys: &[K]) -> Self {
        let targets = keys
            .iter()
            .map(|key| {
                R::FIELDS
                    .iter()
                    .position(|field| field.tag(source) == Some(key.as_ref()))
            })
            .collect();

        Self { targets }
    }

    /// Number of source positions this plan was built for.
    pub fn arity(&self) -> usize {
        self.targets.len()
    }

    pub fn target(&self, position: usize) -> Option<usize> {
        self.targets.get(position).copied().flatten()
    }

    /// Positions that map to no field.
    pub fn unmatched(&self) -> impl Iterator<Item = usize> + '_ {
        self.targets
            .iter()
            .enumerate()
            .filter_map(|(position, target)| target.is_none().then_some(position))
    }

    /// Assigns one value per source position. Unbound positions are dropped.
    ///
    /// # Panics
    /// If the number of values differs from the plan's arity.
    pub fn apply<R: Record>(&self, record: &mut R, values: Vec<SourceValue>) -> Result<(), BindError> {
        assert_eq!(
            values.len(),
            self.arity(),
            "plan/shape mismatch for {}",
            std::any::type_name::<R>()
        );

        for (value, target) in values.into_iter().zip(&self.targets) {
            if let Some(index) = target {
                assign(record, *index, value)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PlanKey {
    record: TypeId,
    source: Source,
    keys: Vec<String>,
}

/// Shared cache of plans keyed by record type, source and key signature.
///
/// Plans are only dropped through [`PlanCache::invalidate`].
#[derive(Debug, Default)]
pub struct PlanCache {
    plans: DashMap<PlanKey, Arc<BindingPlan>>,
}

impl PlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan_for<R: Record, K: AsRef<str>>(&self, source: Source, keys: &[K]) -> Arc<BindingPlan> {
        let key = PlanKey {
            record: TypeId::of::<R>(),
            source,
            keys: keys.iter().map(|k| k.as_ref().to_owned()).collect(),
        };

        if let Some(plan) = self.plans.get(&key) {
            return Arc::clone(plan.value());
        }

        let entry = self
            .plans
            .entry(key)
            .or_insert_with(|| Arc::new(BindingPlan::build::<R, K>(source, keys)));
        Arc::clone(entry.value())
    }

    /// Drops every plan built for `R`.
    pub fn invalidate<R: Record>(&self) {
        let record = TypeId::of::<R>();
        self.plans.retain(|key, _| key.record != record);
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::schema::{Field, FieldKind, Slot, View};

    #[derive(Debug, Default)]
    struct Row {
        id: i64,
        email: String,
        note: String,
    }

    impl Record for Row {
        const FIELDS: &'static [Field] = &[
            Field::new("id", FieldKind::I64).column("id").json("id"),
            Field::new("email", FieldKind::Str).column("email").json("email"),
            // untagged: never populated
            Field::new("note", FieldKind::Str),
        ];

        fn slot_mut(&mut self, index: usize) -> Slot<'_> {
            match index {
                0 => Slot::I64(&mut self.id),
                1 => Slot::Str(&mut self.email),
                2 => Slot::Str(&mut self.note),
                _ => crate::binding::no_such_slot::<Self>(index),
            }
        }

        fn slot(&self, index: usize) -> View<'_> {
            match index {
                0 => View::I64(self.id),
                1 => View::Str(&self.email),
                2 => View::Str(&self.note),
                _ => crate::binding::no_such_slot::<Self>(index),
            }
        }
    }

    #[test]
    fn test_plan_maps_by_name_not_position() {
        let plan = BindingPlan::build::<Row, _>(Source::Column, &["email", "extra", "id", "note"]);

        assert_eq!(plan.arity(), 4);
        assert_eq!(plan.target(0), Some(1));
        assert_eq!(plan.target(1), None);
        assert_eq!(plan.target(2), Some(0));
        // `note` has no column tag
        assert_eq!(plan.target(3), None);
        assert_eq!(plan.unmatched().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_apply_skips_unbound_positions() {
        let plan = BindingPlan::build::<Row, _>(Source::Column, &["email", "note", "id"]);
        let mut row = Row::default();

        plan.apply(
            &mut row,
            vec![
                SourceValue::Str("a@b.co".into()),
                SourceValue::Str("ignored".into()),
                SourceValue::Int(7),
            ],
        )
        .unwrap();

        assert_eq!(row.id, 7);
        assert_eq!(row.email, "a@b.co");
        assert!(row.note.is_empty());
    }

    #[test]
    #[should_panic(expected = "plan/shape mismatch")]
    fn test_apply_panics_on_arity_mismatch() {
        let plan = BindingPlan::build::<Row, _>(Source::Column, &["id", "email"]);
        let mut row = Row::default();
        let _ = plan.apply(&mut row, vec![SourceValue::Int(1)]);
    }

    #[test]
    fn test_cache_reuses_and_invalidates() {
        let cache = PlanCache::new();

        let first = cache.plan_for::<Row, _>(Source::Column, &["id", "email"]);
        let again = cache.plan_for::<Row, _>(Source::Column, &["id", "email"]);
        assert!(Arc::ptr_eq(&first, &again));

        let reordered = cache.plan_for::<Row, _>(Source::Column, &["email", "id"]);
        assert!(!Arc::ptr_eq(&first, &reordered));
        assert_eq!(reordered.target(0), Some(1));
        assert_eq!(cache.len(), 2);

        cache.invalidate::<Row>();
        assert!(cache.is_empty());
    }
}
