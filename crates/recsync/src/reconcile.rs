//! Merging fetched records with local pending state.

use std::collections::{HashMap, HashSet};

use recsync_core::{Record, RecordId, SortDescriptor, sort_records};

/// Combine fetched records with the pending queues into one view.
///
/// Records pending deletion are dropped. A pending upload replaces the
/// fetched record with the same identity, and the remaining uploads are
/// appended. The result is stable-sorted by `sort`; records that have never
/// reached the service sort using only the fields they have.
pub fn reconcile(
    remote: &[Record],
    uploads: Vec<Record>,
    deletions: &[RecordId],
    sort: &[SortDescriptor],
) -> Vec<Record> {
    let deleted: HashSet<&RecordId> = deletions.iter().collect();

    let mut local: HashMap<RecordId, Record> = HashMap::with_capacity(uploads.len());
    let mut local_order: Vec<RecordId> = Vec::with_capacity(uploads.len());
    for record in uploads {
        if deleted.contains(record.id()) {
            continue;
        }
        let id = record.id().clone();
        if local.insert(id.clone(), record).is_none() {
            local_order.push(id);
        }
    }

    let mut merged: Vec<Record> = Vec::with_capacity(remote.len() + local.len());
    for record in remote {
        if deleted.contains(record.id()) {
            continue;
        }
        match local.remove(record.id()) {
            Some(pending) => merged.push(pending),
            None => merged.push(record.clone()),
        }
    }

    merged.extend(local_order.into_iter().filter_map(|id| local.remove(&id)));

    sort_records(&mut merged, sort);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use recsync_core::{FieldValue, SortKey};

    fn item(id: &str, rank: i64) -> Record {
        Record::with_id(RecordId::new(id).unwrap(), "item")
            .unwrap()
            .with("rank", rank)
            .unwrap()
    }

    fn id(s: &str) -> RecordId {
        RecordId::new(s).unwrap()
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.id().as_str()).collect()
    }

    #[test]
    fn pending_deletions_are_excluded() {
        let remote = vec![item("a", 1), item("b", 2), item("c", 3)];
        let view = reconcile(&remote, vec![], &[id("b")], &[]);
        assert_eq!(ids(&view), vec!["a", "c"]);
    }

    #[test]
    fn pending_upload_wins_over_fetched_copy() {
        let remote = vec![item("a", 1), item("b", 2)];
        let view = reconcile(&remote, vec![item("a", 10)], &[], &[]);

        assert_eq!(view.len(), 2);
        assert_eq!(view[0].get("rank"), Some(&FieldValue::Int(10)));
    }

    #[test]
    fn remaining_uploads_are_appended_then_sorted() {
        let remote = vec![item("a", 5), item("b", 1)];
        let view = reconcile(
            &remote,
            vec![item("new", 3)],
            &[],
            &[SortDescriptor::ascending(SortKey::Field("rank".into()))],
        );
        assert_eq!(ids(&view), vec!["b", "new", "a"]);
    }

    #[test]
    fn upload_also_pending_deletion_is_hidden() {
        let view = reconcile(&[], vec![item("x", 1)], &[id("x")], &[]);
        assert!(view.is_empty());
    }

    #[test]
    fn unsorted_view_keeps_fetch_then_queue_order() {
        let remote = vec![item("b", 0), item("a", 0)];
        let view = reconcile(&remote, vec![item("z", 0), item("y", 0)], &[], &[]);
        assert_eq!(ids(&view), vec!["b", "a", "z", "y"]);
    }
}
