//! Builders shared by the unit tests

use crate::model::*;

pub(crate) fn attr(local_id: &str, display_form: &str) -> Attribute {
    Attribute::new(local_id, ObjRef::identifier(display_form))
}

pub(crate) fn simple(local_id: &str, item: &str) -> Measure {
    Measure::new(
        local_id,
        MeasureDefinition::Simple(SimpleMeasureDefinition::new(ObjRef::identifier(item))),
    )
}

pub(crate) fn sum(local_id: &str, fact: &str) -> Measure {
    let mut def = SimpleMeasureDefinition::new(ObjRef::identifier(fact));
    def.aggregation = Some(Aggregation::Sum);
    Measure::new(local_id, MeasureDefinition::Simple(def))
}

pub(crate) fn pop(local_id: &str, master: &str, pop_attribute: &str) -> Measure {
    Measure::new(
        local_id,
        MeasureDefinition::PoP(PopMeasureDefinition {
            measure_identifier: master.into(),
            pop_attribute: ObjRef::identifier(pop_attribute),
        }),
    )
}

pub(crate) fn previous_period(local_id: &str, master: &str) -> Measure {
    Measure::new(
        local_id,
        MeasureDefinition::PreviousPeriod(PreviousPeriodMeasureDefinition {
            measure_identifier: master.into(),
            date_data_sets: vec![PreviousPeriodDateDataSet {
                data_set: ObjRef::identifier("date"),
                periods_ago: 1,
            }],
        }),
    )
}

pub(crate) fn arithmetic(local_id: &str, operands: &[&str], operator: ArithmeticOperator) -> Measure {
    Measure::new(
        local_id,
        MeasureDefinition::Arithmetic(ArithmeticMeasureDefinition {
            measure_identifiers: operands.iter().map(|s| s.to_string()).collect(),
            operator,
        }),
    )
}

pub(crate) fn values(items: &[&str]) -> AttributeElements {
    AttributeElements::Values {
        values: items.iter().map(|v| Some(v.to_string())).collect(),
    }
}

pub(crate) fn negative_filter(display_form: &str, items: &[&str]) -> Filter {
    Filter::NegativeAttributeFilter(NegativeAttributeFilter {
        display_form: ObjRef::identifier(display_form),
        not_in: values(items),
    })
}

pub(crate) fn positive_filter(display_form: &str, items: &[&str]) -> Filter {
    Filter::PositiveAttributeFilter(PositiveAttributeFilter {
        display_form: ObjRef::identifier(display_form),
        in_elements: values(items),
    })
}

pub(crate) fn measure_value_filter(measure: &str, threshold: Option<f64>) -> Filter {
    Filter::MeasureValueFilter(MeasureValueFilter {
        measure: ObjRefInScope::local(measure),
        condition: threshold.map(|value| {
            MeasureValueFilterCondition::Comparison(ComparisonCondition {
                operator: ComparisonOperator::GreaterThan,
                value,
                treat_null_values_as: None,
            })
        }),
    })
}

pub(crate) fn total(total_type: TotalType, measure: &str, attribute: &str) -> Total {
    Total {
        total_type,
        measure_identifier: measure.into(),
        attribute_identifier: attribute.into(),
    }
}

pub(crate) fn measure_sort(locators: Vec<LocatorItem>) -> SortItem {
    SortItem::MeasureSortItem(MeasureSortItem {
        direction: SortDirection::Desc,
        locators,
    })
}

pub(crate) fn measure_locator(measure: &str) -> LocatorItem {
    LocatorItem::MeasureLocatorItem(MeasureLocator {
        measure_identifier: measure.into(),
    })
}

pub(crate) fn attribute_locator(attribute: &str, element: &str) -> LocatorItem {
    LocatorItem::AttributeLocatorItem(AttributeLocator {
        attribute_identifier: attribute.into(),
        element: element.into(),
    })
}

/// A definition touching every kind of reference: aliases, a PoP measure and
/// an arithmetic measure on top of it, no-op filters, sorts, totals, buckets.
pub(crate) fn sample_definition() -> ExecutionDefinition {
    let region = attr("region", "label.region").with_alias("Sales Region");
    let year = attr("year", "date.year");

    let revenue = sum("revenue", "fact.amount")
        .with_alias("Revenue")
        .with_format("$#,##0");
    let revenue_ly = pop("revenue_ly", "revenue", "date.year").with_title("Revenue LY");
    let growth = arithmetic("growth", &["revenue", "revenue_ly"], ArithmeticOperator::Change)
        .with_title("Growth");

    let mut def = ExecutionDefinition::new("workspace-1");
    def.attributes = vec![region.clone(), year];
    def.measures = vec![revenue.clone(), revenue_ly.clone(), growth.clone()];
    def.filters = vec![
        positive_filter("label.region", &["East"]),
        negative_filter("label.region", &[]),
        measure_value_filter("growth", None),
        measure_value_filter("revenue", Some(100.0)),
        Filter::RankingFilter(RankingFilter {
            measure: ObjRefInScope::local("revenue"),
            attributes: Some(vec![ObjRefInScope::local("region")]),
            operator: RankingOperator::Top,
            value: 10,
        }),
    ];
    def.sort_by = vec![
        SortItem::AttributeSortItem(AttributeSortItem {
            direction: SortDirection::Asc,
            attribute_identifier: "year".into(),
            aggregation: None,
        }),
        measure_sort(vec![
            attribute_locator("year", "2020"),
            measure_locator("revenue"),
        ]),
    ];
    def.dimensions = vec![
        Dimension {
            item_identifiers: vec!["region".into()],
            totals: Some(vec![total(TotalType::Sum, "revenue", "region")]),
        },
        Dimension::new(["year", MEASURE_GROUP]),
    ];
    def.buckets = vec![
        Bucket {
            local_identifier: Some("measures".into()),
            items: vec![
                BucketItem::Measure(revenue),
                BucketItem::Measure(revenue_ly),
                BucketItem::Measure(growth),
            ],
            totals: None,
        },
        Bucket {
            local_identifier: Some("view".into()),
            items: vec![BucketItem::Attribute(region)],
            totals: Some(vec![total(TotalType::Sum, "revenue", "region")]),
        },
    ];
    def
}
