//! Local identifier rewiring of filters, sorts, dimensions and totals
//!
//! The same passes run in both directions: the normalizer resolves original
//! identifiers to normalized ones, the denormalizer resolves them back. The
//! direction lives entirely in the `resolve` function handed in.

use crate::model::{Bucket, Dimension, Filter, LocatorItem, SortItem, Total, MEASURE_GROUP};
use crate::Result;

/// Rewrite local references of measure value filters and ranking filters.
/// Other filters carry no local references and stay untouched.
pub(crate) fn rewire_filters<F>(filters: &mut [Filter], resolve: &F) -> Result<()>
where
    F: Fn(&str) -> Result<String>,
{
    for filter in filters.iter_mut() {
        match filter {
            Filter::MeasureValueFilter(f) => {
                if let Some(id) = f.measure.local_id_mut() {
                    *id = resolve(id.as_str())?;
                }
            }
            Filter::RankingFilter(f) => {
                if let Some(id) = f.measure.local_id_mut() {
                    *id = resolve(id.as_str())?;
                }
                for attribute in f.attributes.iter_mut().flatten() {
                    if let Some(id) = attribute.local_id_mut() {
                        *id = resolve(id.as_str())?;
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

pub(crate) fn rewire_sorts<F>(sorts: &mut [SortItem], resolve: &F) -> Result<()>
where
    F: Fn(&str) -> Result<String>,
{
    for sort in sorts.iter_mut() {
        match sort {
            SortItem::AttributeSortItem(item) => {
                item.attribute_identifier = resolve(&item.attribute_identifier)?;
            }
            SortItem::MeasureSortItem(item) => {
                for locator in item.locators.iter_mut() {
                    match locator {
                        LocatorItem::AttributeLocatorItem(l) => {
                            l.attribute_identifier = resolve(&l.attribute_identifier)?;
                        }
                        LocatorItem::MeasureLocatorItem(l) => {
                            l.measure_identifier = resolve(&l.measure_identifier)?;
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn rewire_totals<F>(totals: &mut [Total], resolve: &F) -> Result<()>
where
    F: Fn(&str) -> Result<String>,
{
    for total in totals.iter_mut() {
        total.attribute_identifier = resolve(&total.attribute_identifier)?;
        total.measure_identifier = resolve(&total.measure_identifier)?;
    }
    Ok(())
}

/// Rewrite dimension items (the measure group marker is kept) and totals
pub(crate) fn rewire_dimensions<F>(dimensions: &mut [Dimension], resolve: &F) -> Result<()>
where
    F: Fn(&str) -> Result<String>,
{
    for dimension in dimensions.iter_mut() {
        for item in dimension.item_identifiers.iter_mut() {
            if item.as_str() != MEASURE_GROUP {
                *item = resolve(item.as_str())?;
            }
        }
        if let Some(totals) = dimension.totals.as_mut() {
            rewire_totals(totals, resolve)?;
        }
    }
    Ok(())
}

/// Rewrite bucket totals, leaving identifiers without a counterpart as they are
pub(crate) fn rewire_bucket_totals<F>(buckets: &mut [Bucket], lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    let lenient = |id: &mut String| match lookup(id.as_str()) {
        Some(mapped) => *id = mapped,
        None => tracing::warn!(local_id = %id, "bucket total references unknown localId, kept as is"),
    };

    for total in buckets.iter_mut().flat_map(|b| b.totals.iter_mut().flatten()) {
        lenient(&mut total.attribute_identifier);
        lenient(&mut total.measure_identifier);
    }
}
