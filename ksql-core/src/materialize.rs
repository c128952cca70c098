use crate::{KsqlError, Record, Result, RowLabeled, StructInfo, StructInfoCache};
use anyhow::Context;
use std::sync::Arc;

fn field_ident<R: Record>(index: usize) -> &'static str {
    R::declared_fields()
        .get(index)
        .map(|v| v.ident)
        .unwrap_or("?")
}

/// Fills `record` from the values of `row`.
///
/// Plain records are matched by column name, columns without a field are
/// skipped and fields without a column keep their current value. Nested
/// records are filled by position across the columns of their members.
pub fn fill_one<R: Record>(
    cache: &StructInfoCache,
    info: &StructInfo,
    row: RowLabeled,
    record: &mut R,
) -> Result<()> {
    if info.is_nested() {
        return fill_nested(cache, info, row, record);
    }
    let RowLabeled { labels, values } = row;
    for (label, value) in labels.iter().zip(values.into_vec()) {
        let field = info.by_name(label);
        if !field.valid {
            continue;
        }
        record.decode_field(field.index, value).with_context(|| {
            format!(
                "Could not decode column `{}` into field `{}` of `{}`",
                label,
                field_ident::<R>(field.index),
                info.type_name()
            )
        })?;
    }
    Ok(())
}

fn fill_nested<R: Record>(
    cache: &StructInfoCache,
    info: &StructInfo,
    row: RowLabeled,
    record: &mut R,
) -> Result<()> {
    let mut members: Vec<(usize, Arc<StructInfo>)> = Vec::with_capacity(info.fields().len());
    for field in info.fields() {
        let nested = R::nested_struct_info(cache, field.index).ok_or_else(|| {
            KsqlError::InvalidShape {
                type_name: info.type_name(),
                reason: format!("field `{}` does not hold a record", field.name),
            }
        })??;
        members.push((field.index, nested));
    }
    let expected: usize = members.iter().map(|(_, v)| v.fields().len()).sum();
    if row.values.len() != expected {
        return Err(KsqlError::InvalidShape {
            type_name: info.type_name(),
            reason: format!(
                "the query returned {} columns but the nested struct expects {}",
                row.values.len(),
                expected
            ),
        }
        .into());
    }
    let RowLabeled { labels, values } = row;
    let mut cells = labels.iter().zip(values.into_vec());
    for (index, nested) in members {
        let Some(target) = record.nested_field(index) else {
            return Err(KsqlError::InvalidShape {
                type_name: info.type_name(),
                reason: format!("field `{}` does not hold a record", field_ident::<R>(index)),
            }
            .into());
        };
        for column in nested.fields() {
            let Some((label, value)) = cells.next() else {
                break;
            };
            target.decode_field(column.index, value).with_context(|| {
                format!(
                    "Could not decode column `{}` into `{}.{}` of `{}`",
                    label,
                    field_ident::<R>(index),
                    column.name,
                    info.type_name()
                )
            })?;
        }
    }
    Ok(())
}

/// Replaces the content of `records` with one record per row.
pub fn fill_many<R, I>(
    cache: &StructInfoCache,
    info: &StructInfo,
    rows: I,
    records: &mut Vec<R>,
) -> Result<()>
where
    R: Record + Default,
    I: IntoIterator<Item = RowLabeled>,
{
    records.clear();
    for row in rows {
        let mut record = R::default();
        fill_one(cache, info, row, &mut record)?;
        records.push(record);
    }
    Ok(())
}
