//! Filter compiler: turns declarative (field, operator, value) filters into
//! predicate fragments with named, index-qualified parameters. The shared
//! parameter map is reused across every step query of one funnel request.

use beacon_core::error::{BeaconError, BeaconResult};
use beacon_core::store::{ParamValue, Params};
use beacon_core::types::{Filter, FilterOperator, FilterValue};

/// Escape `LIKE` wildcards so user input matches literally.
pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '%' || c == '_' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Compile filters into a single ` AND ...` predicate string, binding one
/// parameter per filter index into `params`. Filters with an invalid value
/// shape are rejected, not dropped.
pub fn compile_filters(
    filters: &[Filter],
    prefix: &str,
    params: &mut Params,
) -> BeaconResult<String> {
    let mut conditions = Vec::with_capacity(filters.len());

    for (index, filter) in filters.iter().enumerate() {
        conditions.push(compile_filter(filter, index, prefix, params)?);
    }

    if conditions.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" AND {}", conditions.join(" AND ")))
    }
}

fn compile_filter(
    filter: &Filter,
    index: usize,
    prefix: &str,
    params: &mut Params,
) -> BeaconResult<String> {
    let column = filter.field.column();
    let key = format!("{prefix}_{index}");

    let condition = match filter.operator {
        FilterOperator::IsNull => format!("{column} IS NULL"),
        FilterOperator::IsNotNull => format!("{column} IS NOT NULL"),
        FilterOperator::In => {
            params.insert(key.clone(), ParamValue::StrList(require_list(filter, index)?));
            format!("{column} IN {{{key}:Array(String)}}")
        }
        FilterOperator::NotIn => {
            params.insert(key.clone(), ParamValue::StrList(require_list(filter, index)?));
            format!("{column} NOT IN {{{key}:Array(String)}}")
        }
        FilterOperator::Equals => {
            let value = require_single(filter, index)?;
            params.insert(key.clone(), ParamValue::Str(value.to_string()));
            format!("{column} = {{{key}:String}}")
        }
        FilterOperator::NotEquals => {
            let value = require_single(filter, index)?;
            params.insert(key.clone(), ParamValue::Str(value.to_string()));
            format!("{column} != {{{key}:String}}")
        }
        FilterOperator::Contains => {
            let value = require_single(filter, index)?;
            params.insert(key.clone(), ParamValue::Str(format!("%{}%", escape_like(value))));
            format!("{column} LIKE {{{key}:String}}")
        }
        FilterOperator::NotContains => {
            let value = require_single(filter, index)?;
            params.insert(key.clone(), ParamValue::Str(format!("%{}%", escape_like(value))));
            format!("{column} NOT LIKE {{{key}:String}}")
        }
        FilterOperator::StartsWith => {
            let value = require_single(filter, index)?;
            params.insert(key.clone(), ParamValue::Str(format!("{}%", escape_like(value))));
            format!("{column} LIKE {{{key}:String}}")
        }
        FilterOperator::EndsWith => {
            let value = require_single(filter, index)?;
            params.insert(key.clone(), ParamValue::Str(format!("%{}", escape_like(value))));
            format!("{column} LIKE {{{key}:String}}")
        }
    };

    Ok(condition)
}

fn require_single<'a>(filter: &'a Filter, index: usize) -> BeaconResult<&'a str> {
    match &filter.value {
        Some(FilterValue::Single(value)) if !value.is_empty() => Ok(value),
        _ => Err(BeaconError::InvalidArgument(format!(
            "filter {index}: operator requires a non-empty string value"
        ))),
    }
}

fn require_list(filter: &Filter, index: usize) -> BeaconResult<Vec<String>> {
    match &filter.value {
        Some(FilterValue::Many(values)) if !values.is_empty() => Ok(values.clone()),
        _ => Err(BeaconError::InvalidArgument(format!(
            "filter {index}: operator requires a non-empty list value"
        ))),
    }
}
