//! Statement execution: row (de)serialization, expression evaluation,
//! nested-loop joins, grouping/aggregation, and the INSERT/SELECT/UPDATE/
//! DELETE operations themselves.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::catalog::{self, ColumnInfo, ColumnType};
use crate::common::{Error, Result};
use crate::concurrency::Engine;

use super::ast::{AggArg, AggFunc, BinOp, Expr, LogicalOp, SelectItem, SelectStatement, Value};
use super::planner::{self, PlanKind, PlanNode};

const DELETED_SENTINEL: &[u8] = b"DELETED";

fn table_prefix_range(table: &str) -> (Vec<u8>, Vec<u8>) {
    let lo = format!("{table}:").into_bytes();
    let mut hi = lo.clone();
    hi.push(0xFF);
    (lo, hi)
}

/// Render a [`Value`] the way it is written into a serialized row.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Null => "None".to_string(),
        Value::Bool(b) => b.to_string(),
    }
}

fn serialize_row(values: &[Value]) -> String {
    values.iter().map(value_to_string).collect::<Vec<_>>().join("|")
}

fn coerce_field(raw: &str, col_type: ColumnType) -> Result<Value> {
    if raw == "None" {
        return Ok(Value::Null);
    }
    match col_type {
        ColumnType::Int => raw
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| Error::type_error(format!("stored field '{raw}' is not a valid INT"))),
        ColumnType::Float => raw
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| Error::type_error(format!("stored field '{raw}' is not a valid FLOAT"))),
        ColumnType::Text => Ok(Value::Text(raw.to_string())),
    }
}

fn coerce_for_column(value: &Value, target: ColumnType) -> Result<Value> {
    match (target, value) {
        (ColumnType::Int, Value::Int(n)) => Ok(Value::Int(*n)),
        (ColumnType::Int, Value::Float(f)) => Ok(Value::Int(*f as i64)),
        (ColumnType::Int, Value::Text(s)) => s
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| Error::type_error(format!("cannot coerce '{s}' to INT"))),
        (ColumnType::Int, Value::Null) => Ok(Value::Null),
        (ColumnType::Float, Value::Int(n)) => Ok(Value::Float(*n as f64)),
        (ColumnType::Float, Value::Float(f)) => Ok(Value::Float(*f)),
        (ColumnType::Float, Value::Text(s)) => s
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| Error::type_error(format!("cannot coerce '{s}' to FLOAT"))),
        (ColumnType::Float, Value::Null) => Ok(Value::Null),
        (ColumnType::Text, other) => Ok(Value::Text(value_to_string(other))),
        (_, Value::Bool(_)) => Err(Error::type_error("cannot store a boolean expression result in a row".to_string())),
    }
}

/// One joined-relation's worth of columns inside a [`RowView`], in
/// catalog ordinal order (needed to expand `*`).
#[derive(Debug, Clone)]
struct SourceRow {
    alias: String,
    key: Vec<u8>,
    columns: Vec<(String, Value)>,
}

impl SourceRow {
    fn get(&self, name: &str) -> Option<&Value> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

fn build_source_row(alias: &str, key: Vec<u8>, raw_value: &[u8], columns: &[ColumnInfo]) -> Result<SourceRow> {
    let text = String::from_utf8_lossy(raw_value);
    let fields: Vec<&str> = text.split('|').collect();
    let mut values = Vec::with_capacity(columns.len());
    for col in columns {
        let raw = fields.get(col.ordinal).copied().unwrap_or("None");
        values.push((col.name.clone(), coerce_field(raw, col.col_type)?));
    }
    Ok(SourceRow { alias: alias.to_string(), key, columns: values })
}

/// A single (possibly joined) row, addressable by unqualified or
/// `alias.column`-qualified names.
#[derive(Debug, Clone)]
pub struct RowView {
    sources: Vec<SourceRow>,
}

impl RowView {
    fn single(source: SourceRow) -> Self {
        RowView { sources: vec![source] }
    }

    fn merge(left: RowView, right: RowView) -> RowView {
        let mut sources = left.sources;
        sources.extend(right.sources);
        RowView { sources }
    }

    /// Resolve a column reference. `prefer_left` controls ambiguity
    /// handling: an ON-condition view resolves an unqualified conflict to
    /// the left (first-joined) table per the nested-loop join convention;
    /// everywhere else an unqualified reference matching more than one
    /// source table is a schema error naming the column.
    fn resolve(&self, name: &str, prefer_left: bool) -> Result<Value> {
        if let Some((qual, col)) = name.split_once('.') {
            for source in &self.sources {
                if source.alias == qual {
                    return source
                        .get(col)
                        .cloned()
                        .ok_or_else(|| Error::schema(format!("unknown column '{name}'")));
                }
            }
            return Err(Error::schema(format!("unknown table or alias '{qual}' in '{name}'")));
        }

        if prefer_left {
            for source in &self.sources {
                if let Some(v) = source.get(name) {
                    return Ok(v.clone());
                }
            }
            return Err(Error::schema(format!("unknown column '{name}'")));
        }

        let mut found = None;
        let mut count = 0;
        for source in &self.sources {
            if let Some(v) = source.get(name) {
                count += 1;
                found = Some(v.clone());
            }
        }
        match count {
            0 => Err(Error::schema(format!("unknown column '{name}'"))),
            1 => Ok(found.unwrap()),
            _ => Err(Error::schema(format!("ambiguous column reference '{name}'"))),
        }
    }
}

fn is_numeric(v: &Value) -> bool {
    matches!(v, Value::Int(_) | Value::Float(_))
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(n) => Some(*n as f64),
        Value::Float(f) => Some(*f),
        Value::Text(s) => s.parse::<f64>().ok(),
        Value::Null | Value::Bool(_) => None,
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        Value::Float(f) => *f != 0.0,
        Value::Text(s) => !s.is_empty(),
        Value::Null => false,
    }
}

/// Compare two values, coercing to a common type per §4.9.2: numeric if
/// either side is numeric and the other parses as a number, string
/// otherwise.
fn compare_values(l: &Value, r: &Value, op: BinOp) -> bool {
    if is_numeric(l) || is_numeric(r) {
        if let (Some(a), Some(b)) = (as_f64(l), as_f64(r)) {
            let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            return match op {
                BinOp::Eq => ord == Ordering::Equal,
                BinOp::Neq => ord != Ordering::Equal,
                BinOp::Gt => ord == Ordering::Greater,
                BinOp::Gte => ord != Ordering::Less,
                BinOp::Lt => ord == Ordering::Less,
                BinOp::Lte => ord != Ordering::Greater,
            };
        }
    }
    let (ls, rs) = (value_to_string(l), value_to_string(r));
    let ord = ls.cmp(&rs);
    match op {
        BinOp::Eq => ls == rs,
        BinOp::Neq => ls != rs,
        BinOp::Gt => ord == Ordering::Greater,
        BinOp::Gte => ord != Ordering::Less,
        BinOp::Lt => ord == Ordering::Less,
        BinOp::Lte => ord != Ordering::Greater,
    }
}

fn eval_expr(expr: &Expr, row: &RowView, prefer_left: bool) -> Result<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Column(name) => row.resolve(name, prefer_left),
        Expr::Comparison { left, op, right } => {
            let l = eval_expr(left, row, prefer_left)?;
            let r = eval_expr(right, row, prefer_left)?;
            Ok(Value::Bool(compare_values(&l, &r, *op)))
        }
        Expr::Logical { left, op, right } => {
            let l = eval_expr(left, row, prefer_left)?;
            match op {
                LogicalOp::And if !truthy(&l) => Ok(Value::Bool(false)),
                LogicalOp::Or if truthy(&l) => Ok(Value::Bool(true)),
                _ => {
                    let r = eval_expr(right, row, prefer_left)?;
                    Ok(Value::Bool(truthy(&r)))
                }
            }
        }
    }
}

fn scan_table(engine: &Engine, table: &str, alias: &str) -> Result<Vec<RowView>> {
    let columns = catalog::describe_table(engine, table)?;
    let (lo, hi) = table_prefix_range(table);
    let mut rows = Vec::new();
    for (key, value) in engine.range_scan(&lo, &hi)? {
        if value == DELETED_SENTINEL {
            continue;
        }
        rows.push(RowView::single(build_source_row(alias, key, &value, &columns)?));
    }
    Ok(rows)
}

/// Evaluate the access/join/filter portion of a plan tree, returning the
/// row set it produces. `Sort`/`Limit`/`Project` nodes are transparent
/// here — they exist in the plan for cost estimation and `EXPLAIN`
/// rendering; [`execute_select`] applies ORDER BY/LIMIT/GROUP BY/
/// projection itself against the row set this function returns, per the
/// operation order in §4.9.
fn eval_plan(node: &PlanNode, engine: &Engine) -> Result<Vec<RowView>> {
    match &node.kind {
        PlanKind::Scan { table, alias } | PlanKind::IndexScan { table, alias, .. } => {
            scan_table(engine, table, alias)
        }
        PlanKind::NestedLoopJoin { left, right, on } => {
            let left_rows = eval_plan(left, engine)?;
            let right_rows = eval_plan(right, engine)?;
            let mut out = Vec::new();
            for l in &left_rows {
                for r in &right_rows {
                    let merged = RowView::merge(l.clone(), r.clone());
                    if truthy(&eval_expr(on, &merged, true)?) {
                        out.push(merged);
                    }
                }
            }
            Ok(out)
        }
        PlanKind::Filter { input, predicate } => {
            let rows = eval_plan(input, engine)?;
            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                if truthy(&eval_expr(predicate, &row, false)?) {
                    out.push(row);
                }
            }
            Ok(out)
        }
        PlanKind::Sort { input, .. } | PlanKind::Limit { input, .. } | PlanKind::Project { input, .. } => {
            eval_plan(input, engine)
        }
    }
}

fn value_partial_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => {
            if is_numeric(a) || is_numeric(b) {
                if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
                    return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
                }
            }
            value_to_string(a).cmp(&value_to_string(b))
        }
    }
}

fn sort_rows_by_key(rows: &mut Vec<RowView>, key: &str) -> Result<()> {
    let mut keyed: Vec<(Value, RowView)> = Vec::with_capacity(rows.len());
    for row in rows.drain(..) {
        let v = row.resolve(key, false)?;
        keyed.push((v, row));
    }
    keyed.sort_by(|a, b| value_partial_cmp(&a.0, &b.0));
    rows.extend(keyed.into_iter().map(|(_, row)| row));
    Ok(())
}

fn project_row(select: &SelectStatement, row: &RowView) -> Result<Vec<Value>> {
    if select.items.len() == 1 && select.items[0] == SelectItem::Star {
        let mut out = Vec::new();
        for source in &row.sources {
            out.extend(source.columns.iter().map(|(_, v)| v.clone()));
        }
        return Ok(out);
    }
    let mut out = Vec::with_capacity(select.items.len());
    for item in &select.items {
        match item {
            SelectItem::Star => return Err(Error::schema("'*' cannot be combined with other select items".to_string())),
            SelectItem::Column(name) => out.push(row.resolve(name, false)?),
            SelectItem::Aggregate { .. } => {
                return Err(Error::schema("aggregate function used outside GROUP BY context".to_string()))
            }
        }
    }
    Ok(out)
}

fn select_columns(select: &SelectStatement, engine: &Engine) -> Result<Vec<String>> {
    if select.items.len() == 1 && select.items[0] == SelectItem::Star {
        let mut cols: Vec<String> = catalog::describe_table(engine, &select.from.name)?
            .into_iter()
            .map(|c| c.name)
            .collect();
        for join in &select.joins {
            cols.extend(catalog::describe_table(engine, &join.table.name)?.into_iter().map(|c| c.name));
        }
        return Ok(cols);
    }
    Ok(select.items.iter().map(|i| i.label()).collect())
}

fn eval_aggregate(func: AggFunc, arg: &AggArg, members: &[RowView]) -> Result<Value> {
    let column = match (func, arg) {
        (AggFunc::Count, AggArg::Star) => return Ok(Value::Int(members.len() as i64)),
        (_, AggArg::Star) => return Err(Error::schema(format!("{} does not support '*'", func.name()))),
        (_, AggArg::Column(name)) => name,
    };

    match func {
        AggFunc::Count => {
            let mut n = 0i64;
            for row in members {
                if !matches!(row.resolve(column, false)?, Value::Null) {
                    n += 1;
                }
            }
            Ok(Value::Int(n))
        }
        AggFunc::Sum => {
            let mut sum = 0f64;
            let mut saw_float = false;
            let mut any = false;
            for row in members {
                match row.resolve(column, false)? {
                    Value::Int(n) => {
                        sum += n as f64;
                        any = true;
                    }
                    Value::Float(f) => {
                        sum += f;
                        saw_float = true;
                        any = true;
                    }
                    Value::Null => {}
                    other => return Err(Error::type_error(format!("SUM over non-numeric value {other:?}"))),
                }
            }
            if !any {
                return Ok(Value::Null);
            }
            Ok(if saw_float { Value::Float(sum) } else { Value::Int(sum as i64) })
        }
        AggFunc::Avg => {
            let mut sum = 0f64;
            let mut count = 0i64;
            for row in members {
                match row.resolve(column, false)? {
                    Value::Int(n) => {
                        sum += n as f64;
                        count += 1;
                    }
                    Value::Float(f) => {
                        sum += f;
                        count += 1;
                    }
                    Value::Null => {}
                    other => return Err(Error::type_error(format!("AVG over non-numeric value {other:?}"))),
                }
            }
            if count == 0 {
                return Ok(Value::Null);
            }
            Ok(Value::Float(sum / count as f64))
        }
        AggFunc::Min | AggFunc::Max => {
            let mut best: Option<Value> = None;
            for row in members {
                let v = row.resolve(column, false)?;
                if matches!(v, Value::Null) {
                    continue;
                }
                best = Some(match best {
                    None => v,
                    Some(cur) => {
                        let replace = if func == AggFunc::Min {
                            compare_values(&v, &cur, BinOp::Lt)
                        } else {
                            compare_values(&v, &cur, BinOp::Gt)
                        };
                        if replace { v } else { cur }
                    }
                });
            }
            Ok(best.unwrap_or(Value::Null))
        }
    }
}

fn project_group(select: &SelectStatement, members: &[RowView]) -> Result<Vec<Value>> {
    let mut out = Vec::with_capacity(select.items.len());
    for item in &select.items {
        match item {
            SelectItem::Star => return Err(Error::schema("'*' is not valid in a grouped SELECT".to_string())),
            SelectItem::Column(name) => {
                let v = match members.first() {
                    Some(row) => row.resolve(name, false)?,
                    None => Value::Null,
                };
                out.push(v);
            }
            SelectItem::Aggregate { func, arg } => out.push(eval_aggregate(*func, arg, members)?),
        }
    }
    Ok(out)
}

fn sort_grouped(rows: &mut [Vec<Value>], select: &SelectStatement, key: &str) -> Result<()> {
    let idx = select
        .items
        .iter()
        .position(|i| i.label() == key)
        .ok_or_else(|| Error::schema(format!("ORDER BY column '{key}' is not in the SELECT list")))?;
    rows.sort_by(|a, b| value_partial_cmp(&a[idx], &b[idx]));
    Ok(())
}

/// Execute a SELECT (or the SELECT wrapped by an EXPLAIN), returning
/// output column labels and projected tuples.
pub fn execute_select(select: &SelectStatement, engine: &Engine) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
    require_table(engine, &select.from.name)?;
    for join in &select.joins {
        require_table(engine, &join.table.name)?;
    }

    let plan = planner::plan_select(select, engine)?;
    let rows = eval_plan(&plan, engine)?;

    let has_aggregates = select.items.iter().any(|i| matches!(i, SelectItem::Aggregate { .. }));
    if select.group_by.is_empty() && !has_aggregates {
        let mut rows = rows;
        if let Some(key) = &select.order_by {
            sort_rows_by_key(&mut rows, key)?;
        }
        if let Some(limit) = select.limit {
            rows.truncate(limit as usize);
        }
        let columns = select_columns(select, engine)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(project_row(select, row)?);
        }
        return Ok((columns, out));
    }

    let mut groups: Vec<(Vec<Value>, Vec<RowView>)> = Vec::new();
    for row in rows {
        let key: Vec<Value> = select
            .group_by
            .iter()
            .map(|c| row.resolve(c, false))
            .collect::<Result<_>>()?;
        if let Some(existing) = groups.iter_mut().find(|(k, _)| *k == key) {
            existing.1.push(row);
        } else {
            groups.push((key, vec![row]));
        }
    }
    if groups.is_empty() && select.group_by.is_empty() {
        groups.push((Vec::new(), Vec::new()));
    }

    let mut group_rows = Vec::with_capacity(groups.len());
    for (_, members) in &groups {
        group_rows.push(project_group(select, members)?);
    }
    if let Some(key) = &select.order_by {
        sort_grouped(&mut group_rows, select, key)?;
    }
    if let Some(limit) = select.limit {
        group_rows.truncate(limit as usize);
    }

    let columns = select.items.iter().map(|i| i.label()).collect();
    Ok((columns, group_rows))
}

fn require_table(engine: &Engine, table: &str) -> Result<Vec<ColumnInfo>> {
    if !catalog::table_exists(engine, table)? {
        return Err(Error::schema(format!("unknown table '{table}'")));
    }
    catalog::describe_table(engine, table)
}

/// Monotonically-increasing row id allocator, one counter per table.
/// Seeded from the wall clock so ids stay increasing across process
/// restarts; a same-microsecond collision within a single run falls back
/// to incrementing the last-issued id (§9).
pub struct RowIdGenerator {
    last: Mutex<HashMap<String, u64>>,
}

impl RowIdGenerator {
    pub fn new() -> Self {
        RowIdGenerator { last: Mutex::new(HashMap::new()) }
    }

    fn next(&self, table: &str) -> u64 {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        let mut last = self.last.lock();
        let entry = last.entry(table.to_string()).or_insert(0);
        let id = if micros > *entry { micros } else { *entry + 1 };
        *entry = id;
        id
    }
}

impl Default for RowIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// `INSERT INTO table VALUES (...)`.
pub fn execute_insert(engine: &Engine, table: &str, values: &[Value], row_ids: &RowIdGenerator) -> Result<String> {
    let columns = require_table(engine, table)?;
    if values.len() != columns.len() {
        return Err(Error::schema(format!(
            "column count mismatch: table '{table}' has {} columns, {} values given",
            columns.len(),
            values.len()
        )));
    }

    let mut coerced = Vec::with_capacity(values.len());
    for (value, col) in values.iter().zip(&columns) {
        coerced.push(coerce_for_column(value, col.col_type)?);
    }

    let row_id = row_ids.next(table);
    let key = format!("{table}:{row_id:018}").into_bytes();
    engine.insert(key, serialize_row(&coerced).into_bytes())?;
    catalog::adjust_row_count(engine, table, 1)?;
    Ok(format!("INSERT 1 row into '{table}'"))
}

/// `UPDATE table SET ... [WHERE ...]`.
pub fn execute_update(
    engine: &Engine,
    table: &str,
    assignments: &[(String, Expr)],
    filter: Option<&Expr>,
) -> Result<String> {
    let columns = require_table(engine, table)?;
    let (lo, hi) = table_prefix_range(table);
    let mut updated = 0u64;

    for (key, raw) in engine.range_scan(&lo, &hi)? {
        if raw == DELETED_SENTINEL {
            continue;
        }
        let row = RowView::single(build_source_row(table, key.clone(), &raw, &columns)?);
        let matches = match filter {
            Some(expr) => truthy(&eval_expr(expr, &row, false)?),
            None => true,
        };
        if !matches {
            continue;
        }

        let mut new_values: Vec<Value> = row.sources[0].columns.iter().map(|(_, v)| v.clone()).collect();
        for (column, expr) in assignments {
            let idx = columns
                .iter()
                .position(|c| &c.name == column)
                .ok_or_else(|| Error::schema(format!("unknown column '{column}' in table '{table}'")))?;
            let new_value = eval_expr(expr, &row, false)?;
            new_values[idx] = coerce_for_column(&new_value, columns[idx].col_type)?;
        }
        engine.insert(key, serialize_row(&new_values).into_bytes())?;
        updated += 1;
    }

    Ok(format!("UPDATE {updated} rows in '{table}'"))
}

/// `DELETE FROM table [WHERE ...]`.
pub fn execute_delete(engine: &Engine, table: &str, filter: Option<&Expr>) -> Result<String> {
    let columns = require_table(engine, table)?;
    let (lo, hi) = table_prefix_range(table);
    let mut deleted = 0i64;

    for (key, raw) in engine.range_scan(&lo, &hi)? {
        if raw == DELETED_SENTINEL {
            continue;
        }
        let row = RowView::single(build_source_row(table, key.clone(), &raw, &columns)?);
        let matches = match filter {
            Some(expr) => truthy(&eval_expr(expr, &row, false)?),
            None => true,
        };
        if !matches {
            continue;
        }
        engine.insert(key, DELETED_SENTINEL.to_vec())?;
        deleted += 1;
    }

    if deleted > 0 {
        catalog::adjust_row_count(engine, table, -deleted)?;
    }
    Ok(format!("DELETE {deleted} rows from '{table}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::create_table;
    use crate::execution::parser::parse;
    use crate::execution::ast::Statement;
    use tempfile::tempdir;

    fn open_test_engine(dir: &tempfile::TempDir) -> Engine {
        Engine::open_with_pool_size(dir.path().join("test.db"), 64).unwrap()
    }

    fn select_of(sql: &str) -> SelectStatement {
        match parse(sql).unwrap() {
            Statement::Select(s) => s,
            Statement::Explain(s) => *s,
            other => panic!("expected a SELECT, got {other:?}"),
        }
    }

    #[test]
    fn test_insert_and_select_round_trip() {
        let dir = tempdir().unwrap();
        let engine = open_test_engine(&dir);
        create_table(&engine, "users", &[("id".to_string(), ColumnType::Int), ("name".to_string(), ColumnType::Text)]).unwrap();
        let row_ids = RowIdGenerator::new();
        execute_insert(&engine, "users", &[Value::Int(1), Value::Text("Alice".to_string())], &row_ids).unwrap();
        execute_insert(&engine, "users", &[Value::Int(2), Value::Text("Bob".to_string())], &row_ids).unwrap();

        let select = select_of("SELECT * FROM users ORDER BY id");
        let (columns, rows) = execute_select(&select, &engine).unwrap();
        assert_eq!(columns, vec!["id".to_string(), "name".to_string()]);
        assert_eq!(
            rows,
            vec![
                vec![Value::Int(1), Value::Text("Alice".to_string())],
                vec![Value::Int(2), Value::Text("Bob".to_string())],
            ]
        );
    }

    #[test]
    fn test_insert_column_count_mismatch_errors() {
        let dir = tempdir().unwrap();
        let engine = open_test_engine(&dir);
        create_table(&engine, "t", &[("a".to_string(), ColumnType::Int)]).unwrap();
        let row_ids = RowIdGenerator::new();
        let err = execute_insert(&engine, "t", &[Value::Int(1), Value::Int(2)], &row_ids).unwrap_err();
        assert!(matches!(err, Error::SchemaError(_)));
    }

    #[test]
    fn test_update_and_delete() {
        let dir = tempdir().unwrap();
        let engine = open_test_engine(&dir);
        create_table(&engine, "t", &[("a".to_string(), ColumnType::Int), ("b".to_string(), ColumnType::Text)]).unwrap();
        let row_ids = RowIdGenerator::new();
        execute_insert(&engine, "t", &[Value::Int(1), Value::Text("x".to_string())], &row_ids).unwrap();
        execute_insert(&engine, "t", &[Value::Int(2), Value::Text("y".to_string())], &row_ids).unwrap();

        let update = match parse("UPDATE t SET b = 'z' WHERE a = 1").unwrap() {
            Statement::Update { table, assignments, filter } => (table, assignments, filter),
            other => panic!("expected Update, got {other:?}"),
        };
        let msg = execute_update(&engine, &update.0, &update.1, update.2.as_ref()).unwrap();
        assert_eq!(msg, "UPDATE 1 rows in 't'");

        let select = select_of("SELECT * FROM t ORDER BY a");
        let (_, rows) = execute_select(&select, &engine).unwrap();
        assert_eq!(rows[0], vec![Value::Int(1), Value::Text("z".to_string())]);

        let delete = match parse("DELETE FROM t WHERE a = 2").unwrap() {
            Statement::Delete { table, filter } => (table, filter),
            other => panic!("expected Delete, got {other:?}"),
        };
        let msg = execute_delete(&engine, &delete.0, delete.1.as_ref()).unwrap();
        assert_eq!(msg, "DELETE 1 rows from 't'");

        let (_, rows) = execute_select(&select_of("SELECT * FROM t"), &engine).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_join_with_column_collision() {
        let dir = tempdir().unwrap();
        let engine = open_test_engine(&dir);
        create_table(&engine, "u", &[("id".to_string(), ColumnType::Int), ("name".to_string(), ColumnType::Text)]).unwrap();
        create_table(
            &engine,
            "o",
            &[
                ("id".to_string(), ColumnType::Int),
                ("user_id".to_string(), ColumnType::Int),
                ("product".to_string(), ColumnType::Text),
            ],
        )
        .unwrap();
        let row_ids = RowIdGenerator::new();
        execute_insert(&engine, "u", &[Value::Int(1), Value::Text("Alice".to_string())], &row_ids).unwrap();
        execute_insert(&engine, "u", &[Value::Int(2), Value::Text("Bob".to_string())], &row_ids).unwrap();
        execute_insert(&engine, "o", &[Value::Int(1), Value::Int(1), Value::Text("Laptop".to_string())], &row_ids).unwrap();
        execute_insert(&engine, "o", &[Value::Int(2), Value::Int(1), Value::Text("Mouse".to_string())], &row_ids).unwrap();
        execute_insert(&engine, "o", &[Value::Int(3), Value::Int(2), Value::Text("Keyboard".to_string())], &row_ids).unwrap();

        let select = select_of("SELECT name, product FROM u INNER JOIN o ON u.id = o.user_id");
        let (columns, mut rows) = execute_select(&select, &engine).unwrap();
        assert_eq!(columns, vec!["name".to_string(), "product".to_string()]);
        rows.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));
        assert_eq!(
            rows,
            vec![
                vec![Value::Text("Alice".to_string()), Value::Text("Laptop".to_string())],
                vec![Value::Text("Alice".to_string()), Value::Text("Mouse".to_string())],
                vec![Value::Text("Bob".to_string()), Value::Text("Keyboard".to_string())],
            ]
        );
    }

    #[test]
    fn test_group_by_sum() {
        let dir = tempdir().unwrap();
        let engine = open_test_engine(&dir);
        create_table(&engine, "s", &[("region".to_string(), ColumnType::Text), ("amt".to_string(), ColumnType::Int)]).unwrap();
        let row_ids = RowIdGenerator::new();
        execute_insert(&engine, "s", &[Value::Text("W".to_string()), Value::Int(100)], &row_ids).unwrap();
        execute_insert(&engine, "s", &[Value::Text("E".to_string()), Value::Int(25)], &row_ids).unwrap();
        execute_insert(&engine, "s", &[Value::Text("W".to_string()), Value::Int(200)], &row_ids).unwrap();

        let select = select_of("SELECT region, SUM(amt) FROM s GROUP BY region");
        let (_, mut rows) = execute_select(&select, &engine).unwrap();
        rows.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));
        assert_eq!(
            rows,
            vec![
                vec![Value::Text("E".to_string()), Value::Int(25)],
                vec![Value::Text("W".to_string()), Value::Int(300)],
            ]
        );
    }

    #[test]
    fn test_count_star_without_group_by() {
        let dir = tempdir().unwrap();
        let engine = open_test_engine(&dir);
        create_table(&engine, "t", &[("a".to_string(), ColumnType::Int)]).unwrap();
        let row_ids = RowIdGenerator::new();
        execute_insert(&engine, "t", &[Value::Int(1)], &row_ids).unwrap();
        execute_insert(&engine, "t", &[Value::Int(2)], &row_ids).unwrap();
        execute_insert(&engine, "t", &[Value::Int(3)], &row_ids).unwrap();

        let select = select_of("SELECT COUNT(*) FROM t");
        let (columns, rows) = execute_select(&select, &engine).unwrap();
        assert_eq!(columns, vec!["COUNT(*)".to_string()]);
        assert_eq!(rows, vec![vec![Value::Int(3)]]);
    }

    #[test]
    fn test_ambiguous_unqualified_column_outside_on_errors() {
        let dir = tempdir().unwrap();
        let engine = open_test_engine(&dir);
        create_table(&engine, "a", &[("id".to_string(), ColumnType::Int)]).unwrap();
        create_table(&engine, "b", &[("id".to_string(), ColumnType::Int)]).unwrap();
        let row_ids = RowIdGenerator::new();
        execute_insert(&engine, "a", &[Value::Int(1)], &row_ids).unwrap();
        execute_insert(&engine, "b", &[Value::Int(1)], &row_ids).unwrap();

        let select = select_of("SELECT id FROM a INNER JOIN b ON a.id = b.id");
        let err = execute_select(&select, &engine).unwrap_err();
        assert!(matches!(err, Error::SchemaError(_)));
    }

    #[test]
    fn test_where_filters_rows() {
        let dir = tempdir().unwrap();
        let engine = open_test_engine(&dir);
        create_table(&engine, "t", &[("a".to_string(), ColumnType::Int)]).unwrap();
        let row_ids = RowIdGenerator::new();
        for i in 0..5 {
            execute_insert(&engine, "t", &[Value::Int(i)], &row_ids).unwrap();
        }
        let select = select_of("SELECT a FROM t WHERE a > 2");
        let (_, mut rows) = execute_select(&select, &engine).unwrap();
        rows.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));
        assert_eq!(rows, vec![vec![Value::Int(3)], vec![Value::Int(4)]]);
    }
}
