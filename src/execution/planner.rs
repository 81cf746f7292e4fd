//! Cost-based access-method selection and physical plan construction.
//!
//! The cost table and selectivity heuristics below are lifted directly
//! from the design: table scan, index seek, filter, and sort each have a
//! fixed per-row cost; predicates get a selectivity estimate by shape.
//! Join costing has no prescribed formula, so it is modeled the same way
//! the rest of this table is — fixed per-pair cost — rather than invented
//! from nothing.

use crate::catalog::{self, IndexInfo};
use crate::common::Result;
use crate::concurrency::Engine;

use super::ast::{BinOp, Expr, SelectItem, SelectStatement};

const TABLE_SCAN_COST_PER_ROW: f64 = 1.0;
const INDEX_SEEK_BASE_COST: f64 = 10.0;
const INDEX_SEEK_COST_PER_ROW: f64 = 0.5;
const FILTER_COST_PER_ROW: f64 = 0.1;
const SORT_COST_PER_ROW: f64 = 2.0;
const JOIN_COST_PER_PAIR: f64 = 0.01;

const SEL_EQ: f64 = 0.01;
const SEL_NEQ: f64 = 0.99;
const SEL_RANGE: f64 = 0.33;

#[derive(Debug, Clone)]
pub enum PlanKind {
    Scan {
        table: String,
        alias: String,
    },
    IndexScan {
        table: String,
        alias: String,
        index: String,
        column: String,
    },
    NestedLoopJoin {
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        on: Expr,
    },
    Filter {
        input: Box<PlanNode>,
        predicate: Expr,
    },
    Sort {
        input: Box<PlanNode>,
        key: String,
    },
    Limit {
        input: Box<PlanNode>,
        limit: u64,
    },
    Project {
        input: Box<PlanNode>,
        items: Vec<SelectItem>,
    },
}

#[derive(Debug, Clone)]
pub struct PlanNode {
    pub kind: PlanKind,
    pub est_cost: f64,
    pub est_rows: f64,
}

impl PlanNode {
    fn leaf(kind: PlanKind, cost: f64, rows: f64) -> Self {
        PlanNode { kind, est_cost: cost, est_rows: rows }
    }
}

fn selectivity(expr: &Expr) -> f64 {
    match expr {
        Expr::Comparison { op, .. } => match op {
            BinOp::Eq => SEL_EQ,
            BinOp::Neq => SEL_NEQ,
            BinOp::Gt | BinOp::Gte | BinOp::Lt | BinOp::Lte => SEL_RANGE,
        },
        Expr::Logical { left, op, right } => {
            let (l, r) = (selectivity(left), selectivity(right));
            match op {
                super::ast::LogicalOp::And => l * r,
                super::ast::LogicalOp::Or => (l + r).min(1.0),
            }
        }
        _ => 1.0,
    }
}

/// Flatten an `AND`-chain into its leaf comparisons. `OR` is left intact
/// (an `OR` branch never fully commits the whole predicate to an index).
fn flatten_and<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    match expr {
        Expr::Logical { left, op: super::ast::LogicalOp::And, right } => {
            flatten_and(left, out);
            flatten_and(right, out);
        }
        other => out.push(other),
    }
}

/// If `predicate` compares `column` (qualified to `alias` or bare) against
/// a literal with an operator the planner understands, return that
/// operator — used to decide whether an index seek applies.
fn matches_column(expr: &Expr, alias: &str, column: &str) -> bool {
    let is_this_column = |c: &str| c == column || c == format!("{alias}.{column}");
    match expr {
        Expr::Comparison { left, right, .. } => {
            let left_is_col = matches!(left.as_ref(), Expr::Column(c) if is_this_column(c));
            let right_is_col = matches!(right.as_ref(), Expr::Column(c) if is_this_column(c));
            let left_is_lit = matches!(left.as_ref(), Expr::Literal(_));
            let right_is_lit = matches!(right.as_ref(), Expr::Literal(_));
            (left_is_col && right_is_lit) || (right_is_col && left_is_lit)
        }
        _ => false,
    }
}

/// Choose between a full table scan and an index seek for `table`,
/// comparing estimated costs and picking the cheaper one.
fn choose_access_method(
    table: &str,
    alias: &str,
    filter: Option<&Expr>,
    indexes: &[IndexInfo],
    row_count: f64,
) -> PlanNode {
    let scan = PlanNode::leaf(
        PlanKind::Scan { table: table.to_string(), alias: alias.to_string() },
        TABLE_SCAN_COST_PER_ROW * row_count,
        row_count,
    );

    let Some(filter) = filter else { return scan };
    let mut conjuncts = Vec::new();
    flatten_and(filter, &mut conjuncts);

    let mut best = scan;
    for index in indexes {
        for predicate in &conjuncts {
            if !matches_column(predicate, alias, &index.column) {
                continue;
            }
            let matched_rows = (row_count * selectivity(predicate)).ceil().max(0.0);
            let cost = INDEX_SEEK_BASE_COST + INDEX_SEEK_COST_PER_ROW * matched_rows;
            if cost < best.est_cost {
                best = PlanNode::leaf(
                    PlanKind::IndexScan {
                        table: table.to_string(),
                        alias: alias.to_string(),
                        index: index.name.clone(),
                        column: index.column.clone(),
                    },
                    cost,
                    matched_rows,
                );
            }
        }
    }
    best
}

/// Build the physical plan for a SELECT statement, choosing an access
/// method per table and layering filter/sort/limit/project on top.
pub fn plan_select(select: &SelectStatement, engine: &Engine) -> Result<PlanNode> {
    let base_row_count = catalog::row_count(engine, &select.from.name)? as f64;
    let base_indexes: Vec<IndexInfo> = catalog::list_indexes(engine)?
        .into_iter()
        .filter(|i| i.table == select.from.name)
        .collect();

    let mut node = choose_access_method(
        &select.from.name,
        select.from.binding_name(),
        select.filter.as_ref(),
        &base_indexes,
        base_row_count,
    );

    for join in &select.joins {
        let right_rows = catalog::row_count(engine, &join.table.name)? as f64;
        let right = PlanNode::leaf(
            PlanKind::Scan { table: join.table.name.clone(), alias: join.table.binding_name().to_string() },
            TABLE_SCAN_COST_PER_ROW * right_rows,
            right_rows,
        );
        let pair_estimate = (node.est_rows * right.est_rows).max(1.0);
        let cost = node.est_cost + right.est_cost + JOIN_COST_PER_PAIR * pair_estimate;
        let rows = pair_estimate * selectivity(&join.on);
        node = PlanNode {
            kind: PlanKind::NestedLoopJoin { left: Box::new(node), right: Box::new(right), on: join.on.clone() },
            est_cost: cost,
            est_rows: rows,
        };
    }

    if let Some(filter) = &select.filter {
        let fully_consumed = select.joins.is_empty()
            && matches!(node.kind, PlanKind::IndexScan { .. })
            && matches!(filter, Expr::Comparison { .. });
        if !fully_consumed {
            let rows = node.est_rows * selectivity(filter);
            let cost = node.est_cost + FILTER_COST_PER_ROW * node.est_rows;
            node = PlanNode { kind: PlanKind::Filter { input: Box::new(node), predicate: filter.clone() }, est_cost: cost, est_rows: rows };
        }
    }

    if let Some(key) = &select.order_by {
        let cost = node.est_cost + SORT_COST_PER_ROW * node.est_rows;
        let rows = node.est_rows;
        node = PlanNode { kind: PlanKind::Sort { input: Box::new(node), key: key.clone() }, est_cost: cost, est_rows: rows };
    }

    if let Some(limit) = select.limit {
        let rows = node.est_rows.min(limit as f64);
        let cost = node.est_cost;
        node = PlanNode { kind: PlanKind::Limit { input: Box::new(node), limit }, est_cost: cost, est_rows: rows };
    }

    let cost = node.est_cost;
    let rows = node.est_rows;
    node = PlanNode { kind: PlanKind::Project { input: Box::new(node), items: select.items.clone() }, est_cost: cost, est_rows: rows };

    Ok(node)
}

fn render(node: &PlanNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let label = match &node.kind {
        PlanKind::Scan { table, alias } => format!("Scan({table} as {alias})"),
        PlanKind::IndexScan { table, alias, index, column } => {
            format!("IndexScan({table} as {alias} via {index} on {column})")
        }
        PlanKind::NestedLoopJoin { .. } => "NestedLoopJoin".to_string(),
        PlanKind::Filter { .. } => "Filter".to_string(),
        PlanKind::Sort { key, .. } => format!("Sort(by {key})"),
        PlanKind::Limit { limit, .. } => format!("Limit({limit})"),
        PlanKind::Project { .. } => "Project".to_string(),
    };
    out.push_str(&format!(
        "{indent}{label} cost={:.2} rows={:.2}\n",
        node.est_cost, node.est_rows
    ));
    match &node.kind {
        PlanKind::NestedLoopJoin { left, right, .. } => {
            render(left, depth + 1, out);
            render(right, depth + 1, out);
        }
        PlanKind::Filter { input, .. }
        | PlanKind::Sort { input, .. }
        | PlanKind::Limit { input, .. }
        | PlanKind::Project { input, .. } => render(input, depth + 1, out),
        PlanKind::Scan { .. } | PlanKind::IndexScan { .. } => {}
    }
}

/// Render a plan tree as the textual `EXPLAIN` output, annotated with
/// per-node estimated cost and row count.
pub fn explain(node: &PlanNode) -> String {
    let mut out = String::new();
    render(node, 0, &mut out);
    out
}
