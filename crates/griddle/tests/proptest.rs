//! Property-based tests for griddle using proptest.

use griddle::{
    compile, AggregateDescriptor, AggregateFunction, DataSourceRequest, FilterNode,
    GroupDescriptor, Operator, Record, Scalar, SortDescriptor,
};
use proptest::prelude::*;

#[derive(Debug, Clone, Record)]
struct Item {
    value: i64,
    name: String,
    tag: Option<String>,
}

fn item_strategy() -> impl Strategy<Value = Item> {
    (
        -50i64..50,
        "[a-zA-Z]{0,8}",
        prop::option::of("[a-c]{1,2}"),
    )
        .prop_map(|(value, name, tag)| Item { value, name, tag })
}

fn items_strategy() -> impl Strategy<Value = Vec<Item>> {
    prop::collection::vec(item_strategy(), 0..60)
}

fn matching<'a>(items: &'a [Item], node: &FilterNode) -> Vec<&'a Item> {
    compile::<Item, _>(node, &griddle::RecordResolver)
        .unwrap()
        .filter(items)
}

fn same(a: &[&Item], b: &[&Item]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| std::ptr::eq(*x, *y))
}

proptest! {
    /// An `and` of equality leaves selects the intersection of what each
    /// leaf selects on its own.
    #[test]
    fn and_of_eq_is_intersection(
        items in items_strategy(),
        value in -50i64..50,
        tag in "[a-c]{1,2}",
    ) {
        let by_value = FilterNode::leaf("value", Operator::Eq, value);
        let by_tag = FilterNode::leaf("tag", Operator::Eq, tag.as_str());
        let both = matching(&items, &FilterNode::all(vec![by_value.clone(), by_tag.clone()]));

        let left = matching(&items, &by_value);
        let right = matching(&items, &by_tag);
        let expected: Vec<&Item> = left
            .into_iter()
            .filter(|i| right.iter().any(|r| std::ptr::eq(*r, *i)))
            .collect();

        prop_assert!(same(&both, &expected));
    }

    /// `or` of leaves selects the union, in input order.
    #[test]
    fn or_of_eq_is_union(items in items_strategy(), a in -50i64..50, b in -50i64..50) {
        let either = matching(
            &items,
            &FilterNode::any(vec![
                FilterNode::leaf("value", Operator::Eq, a),
                FilterNode::leaf("value", Operator::Eq, b),
            ]),
        );
        let expected: Vec<&Item> = items.iter().filter(|i| i.value == a || i.value == b).collect();
        prop_assert!(same(&either, &expected));
    }

    /// Over non-null values, contains and doesnotcontain split the input.
    #[test]
    fn contains_and_doesnotcontain_are_complementary(
        items in items_strategy(),
        needle in "[a-zA-Z]{0,2}",
    ) {
        let hit = matching(&items, &FilterNode::leaf("name", Operator::Contains, needle.as_str()));
        let miss = matching(
            &items,
            &FilterNode::leaf("name", Operator::DoesNotContain, needle.as_str()),
        );

        prop_assert_eq!(hit.len() + miss.len(), items.len());
        prop_assert!(hit.iter().all(|h| !miss.iter().any(|m| std::ptr::eq(*h, *m))));
    }

    /// Running the same request twice gives the same answer.
    #[test]
    fn execution_is_deterministic(
        items in items_strategy(),
        threshold in -50i64..50,
        page in 0i64..5,
        page_size in 0i64..10,
    ) {
        let request = DataSourceRequest::new()
            .filter(griddle::FilterDescriptor::leaf("value", "gte", threshold))
            .sort_by(SortDescriptor::desc("tag"))
            .sort_by(SortDescriptor::asc("name"))
            .aggregate(AggregateDescriptor::new(AggregateFunction::Sum, "value"))
            .page(page, page_size);

        let first = request.apply(&items).unwrap();
        let second = request.apply(&items).unwrap();
        prop_assert!(same(
            first.data.records().unwrap(),
            second.data.records().unwrap()
        ));
        prop_assert_eq!(first.total, second.total);
        prop_assert_eq!(first.aggregates, second.aggregates);
    }

    /// A page holds at most `pageSize` records and never exceeds the total.
    #[test]
    fn page_respects_bounds(
        items in items_strategy(),
        page in 0i64..8,
        page_size in 1i64..10,
    ) {
        let result = DataSourceRequest::new().page(page, page_size).apply(&items).unwrap();
        let skip = (page * page_size) as usize;
        let expected = items.len().saturating_sub(skip).min(page_size as usize);

        prop_assert_eq!(result.total, items.len());
        prop_assert_eq!(result.data.len(), expected);
    }

    /// Group counts add up to the number of grouped records, at every level.
    #[test]
    fn group_counts_cover_input(items in items_strategy()) {
        let request = DataSourceRequest::new()
            .group_by(
                GroupDescriptor::new("tag")
                    .with_aggregate(AggregateDescriptor::new(AggregateFunction::Count, "value")),
            )
            .group_by(GroupDescriptor::new("value"));
        let result = request.apply(&items).unwrap();
        let groups = result.data.groups().unwrap();

        prop_assert_eq!(groups.iter().map(|g| g.count).sum::<usize>(), items.len());
        for group in groups {
            let inner = group.items.groups().unwrap();
            prop_assert_eq!(inner.iter().map(|g| g.count).sum::<usize>(), group.count);
            prop_assert_eq!(group.items.record_count(), group.count);
            prop_assert_eq!(
                group.aggregates.get(AggregateFunction::Count, "value"),
                Some(&Scalar::from(group.count))
            );
        }
    }

    /// Sorting keeps the records and orders them by the key.
    #[test]
    fn sort_orders_by_key(items in items_strategy()) {
        let result = DataSourceRequest::new()
            .sort_by(SortDescriptor::asc("value"))
            .apply(&items)
            .unwrap();
        let values: Vec<i64> = result.data.records().unwrap().iter().map(|i| i.value).collect();

        prop_assert_eq!(values.len(), items.len());
        prop_assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }
}
