//! Reference extraction from a parsed statement: tables, aliases, CTE
//! names, exposed columns, all referenced columns, and equality joins.
//!
//! Exposed columns are the ones that would be visible in the result set;
//! collection does not descend into aggregate-function subtrees, so a
//! column inside `COUNT(...)` is never treated as exposed. Unqualified
//! columns land under `_UNKNOWN_` until the single-FROM-table scope pass
//! attributes them; whatever remains `_UNKNOWN_` is excluded from strict
//! catalog validation.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::ops::ControlFlow;

use sqlparser::ast::{
    BinaryOperator, Expr, Join, JoinConstraint, JoinOperator, ObjectName, ObjectNamePart, Query,
    Select, SelectItem, SelectItemQualifiedWildcardKind, SetExpr, Statement, TableFactor, Visit,
    Visitor,
};

/// Key for unqualified column references that could not be attributed.
pub const UNKNOWN_KEY: &str = "_UNKNOWN_";
/// Key for an unqualified `*` projection.
pub const STAR_KEY: &str = "_STAR_";

/// Functions whose argument subtrees do not expose individual values.
const EXPOSURE_AGGREGATES: &[&str] = &["COUNT", "SUM", "AVG", "MIN", "MAX", "ARRAY_AGG"];

/// Functions that classify a query as aggregating.
const CLASSIFY_AGGREGATES: &[&str] = &["COUNT", "SUM", "AVG", "MIN", "MAX"];

/// Everything the guard needs to know about a statement's references.
#[derive(Debug, Default)]
pub struct SqlRefs {
    /// Real tables referenced (uppercase), CTE names excluded
    pub tables: Vec<String>,
    /// CTE names defined in the statement (uppercase)
    pub cte_names: HashSet<String>,
    /// alias (uppercase) -> real table (uppercase); real names map to themselves
    pub aliases: HashMap<String, String>,
    /// Columns visible in the output, post alias/scope resolution
    pub exposed: BTreeMap<String, Vec<String>>,
    /// Every column reference anywhere in the AST, post resolution
    pub all_columns: BTreeMap<String, Vec<String>>,
}

/// An equality condition of the form `Ta.ca = Tb.cb` (tables resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedJoin {
    pub left_table: String,
    pub left_column: String,
    pub right_table: String,
    pub right_column: String,
}

fn object_name_last(name: &ObjectName) -> Option<String> {
    name.0.iter().rev().find_map(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.clone()),
        _ => None,
    })
}

fn is_aggregate_name(name: &ObjectName, set: &[&str]) -> bool {
    object_name_last(name)
        .map(|n| set.contains(&n.to_uppercase().as_str()))
        .unwrap_or(false)
}

fn record(map: &mut BTreeMap<String, Vec<String>>, table: &str, column: &str) {
    let entry = map.entry(table.to_string()).or_default();
    if !entry.iter().any(|c| c == column) {
        entry.push(column.to_string());
    }
}

// ---------------------------------------------------------------------------
// Visitors
// ---------------------------------------------------------------------------

#[derive(Default)]
struct CteCollector {
    names: HashSet<String>,
}

impl Visitor for CteCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<()> {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.names.insert(cte.alias.name.value.to_uppercase());
            }
        }
        ControlFlow::Continue(())
    }
}

#[derive(Default)]
struct TableCollector {
    tables: BTreeSet<String>,
    aliases: HashMap<String, String>,
}

impl Visitor for TableCollector {
    type Break = ();

    fn pre_visit_table_factor(&mut self, table_factor: &TableFactor) -> ControlFlow<()> {
        if let TableFactor::Table { name, alias, .. } = table_factor {
            if let Some(table) = object_name_last(name) {
                let table_upper = table.to_uppercase();
                if let Some(alias) = alias {
                    self.aliases.insert(alias.name.value.to_uppercase(), table_upper.clone());
                }
                self.aliases.insert(table_upper.clone(), table_upper.clone());
                self.tables.insert(table_upper);
            }
        }
        ControlFlow::Continue(())
    }
}

/// Collects column references, skipping aggregate subtrees.
#[derive(Default)]
struct ExposedColumnCollector {
    aggregate_depth: usize,
    columns: BTreeMap<String, Vec<String>>,
}

impl Visitor for ExposedColumnCollector {
    type Break = ();

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<()> {
        match expr {
            Expr::Function(func) if is_aggregate_name(&func.name, EXPOSURE_AGGREGATES) => {
                self.aggregate_depth += 1;
            },
            Expr::Identifier(ident) if self.aggregate_depth == 0 => {
                record(&mut self.columns, UNKNOWN_KEY, &ident.value.to_lowercase());
            },
            Expr::CompoundIdentifier(idents)
                if self.aggregate_depth == 0 && idents.len() >= 2 =>
            {
                let table = idents[idents.len() - 2].value.to_uppercase();
                let column = idents[idents.len() - 1].value.to_lowercase();
                record(&mut self.columns, &table, &column);
            },
            _ => {},
        }
        ControlFlow::Continue(())
    }

    fn post_visit_expr(&mut self, expr: &Expr) -> ControlFlow<()> {
        if let Expr::Function(func) = expr {
            if is_aggregate_name(&func.name, EXPOSURE_AGGREGATES) {
                self.aggregate_depth = self.aggregate_depth.saturating_sub(1);
            }
        }
        ControlFlow::Continue(())
    }
}

/// Collects every column reference, aggregate or not.
#[derive(Default)]
struct AllColumnCollector {
    columns: BTreeMap<String, Vec<String>>,
}

impl Visitor for AllColumnCollector {
    type Break = ();

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<()> {
        match expr {
            Expr::Identifier(ident) => {
                record(&mut self.columns, UNKNOWN_KEY, &ident.value.to_lowercase());
            },
            Expr::CompoundIdentifier(idents) if idents.len() >= 2 => {
                let table = idents[idents.len() - 2].value.to_uppercase();
                let column = idents[idents.len() - 1].value.to_lowercase();
                record(&mut self.columns, &table, &column);
            },
            _ => {},
        }
        ControlFlow::Continue(())
    }
}

/// Collects unqualified identifier names (lowercase).
#[derive(Default)]
struct IdentCollector {
    names: BTreeSet<String>,
}

impl Visitor for IdentCollector {
    type Break = ();

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<()> {
        if let Expr::Identifier(ident) = expr {
            self.names.insert(ident.value.to_lowercase());
        }
        ControlFlow::Continue(())
    }
}

/// Detects aggregate function calls anywhere in the tree.
#[derive(Default)]
struct AggregateDetector {
    found: bool,
}

impl Visitor for AggregateDetector {
    type Break = ();

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<()> {
        if let Expr::Function(func) = expr {
            if is_aggregate_name(&func.name, CLASSIFY_AGGREGATES) {
                self.found = true;
            }
        }
        ControlFlow::Continue(())
    }
}

// ---------------------------------------------------------------------------
// Select walkers
// ---------------------------------------------------------------------------

/// Visit every SELECT in the statement: query body, set-operation branches,
/// CTE definitions, and derived tables.
fn walk_query_selects<'a>(query: &'a Query, f: &mut impl FnMut(&'a Select)) {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            walk_query_selects(&cte.query, f);
        }
    }
    walk_set_expr_selects(&query.body, f);
}

fn walk_set_expr_selects<'a>(set_expr: &'a SetExpr, f: &mut impl FnMut(&'a Select)) {
    match set_expr {
        SetExpr::Select(select) => {
            f(select);
            for twj in &select.from {
                walk_table_factor_selects(&twj.relation, f);
                for join in &twj.joins {
                    walk_table_factor_selects(&join.relation, f);
                }
            }
        },
        SetExpr::Query(query) => walk_query_selects(query, f),
        SetExpr::SetOperation { left, right, .. } => {
            walk_set_expr_selects(left, f);
            walk_set_expr_selects(right, f);
        },
        _ => {},
    }
}

fn walk_table_factor_selects<'a>(factor: &'a TableFactor, f: &mut impl FnMut(&'a Select)) {
    match factor {
        TableFactor::Derived { subquery, .. } => walk_query_selects(subquery, f),
        TableFactor::NestedJoin { table_with_joins, .. } => {
            walk_table_factor_selects(&table_with_joins.relation, f);
            for join in &table_with_joins.joins {
                walk_table_factor_selects(&join.relation, f);
            }
        },
        _ => {},
    }
}

/// Visit only the SELECTs whose projections form the statement's output:
/// the query body through set operations, but not CTE definitions or
/// derived tables.
fn walk_output_selects<'a>(query: &'a Query, f: &mut impl FnMut(&'a Select)) {
    walk_output_set_expr(&query.body, f);
}

fn walk_output_set_expr<'a>(set_expr: &'a SetExpr, f: &mut impl FnMut(&'a Select)) {
    match set_expr {
        SetExpr::Select(select) => f(select),
        SetExpr::Query(query) => walk_output_selects(query, f),
        SetExpr::SetOperation { left, right, .. } => {
            walk_output_set_expr(left, f);
            walk_output_set_expr(right, f);
        },
        _ => {},
    }
}

// ---------------------------------------------------------------------------
// Extraction entry points
// ---------------------------------------------------------------------------

pub fn extract_refs(statement: &Statement, query: &Query) -> SqlRefs {
    let mut ctes = CteCollector::default();
    let _ = statement.visit(&mut ctes);

    let mut tables = TableCollector::default();
    let _ = statement.visit(&mut tables);

    // Output-exposed columns: projections of the output selects only
    let mut exposed = BTreeMap::new();
    walk_output_selects(query, &mut |select| {
        collect_projection_columns(select, &mut exposed);
    });

    // Every column reference anywhere
    let mut all_columns = AllColumnCollector::default();
    let _ = statement.visit(&mut all_columns);
    let mut all_columns = all_columns.columns;

    resolve_unknown_columns(&mut exposed, query, &tables.aliases);
    resolve_unknown_columns(&mut all_columns, query, &tables.aliases);

    let exposed = resolve_aliases(exposed, &tables.aliases);
    let all_columns = resolve_aliases(all_columns, &tables.aliases);

    let table_list: Vec<String> = tables
        .tables
        .iter()
        .filter(|t| !ctes.names.contains(*t))
        .cloned()
        .collect();

    SqlRefs {
        tables: table_list,
        cte_names: ctes.names,
        aliases: tables.aliases,
        exposed,
        all_columns,
    }
}

fn collect_projection_columns(select: &Select, columns: &mut BTreeMap<String, Vec<String>>) {
    for item in &select.projection {
        match item {
            SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                let mut collector = ExposedColumnCollector::default();
                let _ = expr.visit(&mut collector);
                for (table, cols) in collector.columns {
                    for col in cols {
                        record(columns, &table, &col);
                    }
                }
            },
            SelectItem::QualifiedWildcard(kind, _) => {
                let table = match kind {
                    SelectItemQualifiedWildcardKind::ObjectName(name) => {
                        object_name_last(name).unwrap_or_default().to_uppercase()
                    },
                    SelectItemQualifiedWildcardKind::Expr(expr) => {
                        format!("{expr}").to_uppercase()
                    },
                };
                record(columns, &table, "*");
            },
            SelectItem::Wildcard(_) => {
                record(columns, STAR_KEY, "*");
            },
        }
    }
}

/// Attribute `_UNKNOWN_` columns: in any SELECT scope with exactly one
/// FROM+JOIN table, unqualified columns appearing in that scope belong to
/// it. Multi-table scopes stay `_UNKNOWN_` on purpose; over-attribution
/// would mask real errors.
fn resolve_unknown_columns(
    columns: &mut BTreeMap<String, Vec<String>>,
    query: &Query,
    aliases: &HashMap<String, String>,
) {
    let unknown: Vec<String> = match columns.get(UNKNOWN_KEY) {
        Some(cols) if !cols.is_empty() => cols.clone(),
        _ => return,
    };

    let mut selects: Vec<&Select> = Vec::new();
    walk_query_selects(query, &mut |s| selects.push(s));

    for select in selects {
        let mut from_tables: Vec<String> = Vec::new();
        for twj in &select.from {
            collect_scope_table(&twj.relation, &mut from_tables);
            for join in &twj.joins {
                collect_scope_table(&join.relation, &mut from_tables);
            }
        }

        if from_tables.len() != 1 {
            continue;
        }
        let scope_key = &from_tables[0];
        let real_table = aliases.get(scope_key).cloned().unwrap_or_else(|| scope_key.clone());

        let mut idents = IdentCollector::default();
        let _ = select.visit(&mut idents);

        for name in &idents.names {
            if unknown.iter().any(|c| c == name) {
                record(columns, &real_table, name);
                if let Some(bucket) = columns.get_mut(UNKNOWN_KEY) {
                    bucket.retain(|c| c != name);
                }
            }
        }
    }

    if columns.get(UNKNOWN_KEY).map_or(false, |v| v.is_empty()) {
        columns.remove(UNKNOWN_KEY);
    }
}

fn collect_scope_table(factor: &TableFactor, out: &mut Vec<String>) {
    if let TableFactor::Table { name, alias, .. } = factor {
        let key = alias
            .as_ref()
            .map(|a| a.name.value.clone())
            .or_else(|| object_name_last(name))
            .unwrap_or_default();
        if !key.is_empty() {
            out.push(key.to_uppercase());
        }
    }
}

/// Rewrite alias keys to real table names, merging duplicate buckets.
fn resolve_aliases(
    columns: BTreeMap<String, Vec<String>>,
    aliases: &HashMap<String, String>,
) -> BTreeMap<String, Vec<String>> {
    let mut resolved: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (table, cols) in columns {
        let key = if table == UNKNOWN_KEY || table == STAR_KEY {
            table
        } else {
            aliases.get(&table).cloned().unwrap_or(table)
        };
        for col in cols {
            record(&mut resolved, &key, &col);
        }
    }
    resolved
}

/// True if the query aggregates: an aggregate function call anywhere, or
/// any SELECT with GROUP BY or DISTINCT.
pub fn has_aggregation(statement: &Statement, query: &Query) -> bool {
    let mut detector = AggregateDetector::default();
    let _ = statement.visit(&mut detector);
    if detector.found {
        return true;
    }

    let mut found = false;
    walk_query_selects(query, &mut |select| {
        if select.distinct.is_some() {
            found = true;
        }
        match &select.group_by {
            sqlparser::ast::GroupByExpr::Expressions(exprs, _) if !exprs.is_empty() => {
                found = true;
            },
            sqlparser::ast::GroupByExpr::All(_) => found = true,
            _ => {},
        }
    });
    found
}

fn expr_to_u64(expr: &Expr) -> Option<u64> {
    match expr {
        Expr::Value(value) => match &value.value {
            sqlparser::ast::Value::Number(n, _) => n.parse().ok(),
            _ => None,
        },
        _ => None,
    }
}

/// LIMIT value: the outermost query's LIMIT wins; nested limits apply only
/// when the outer query carries none.
pub fn find_limit(query: &Query) -> Option<u64> {
    if let Some(clause) = &query.limit_clause {
        let value = match clause {
            sqlparser::ast::LimitClause::LimitOffset { limit, .. } => {
                limit.as_ref().and_then(expr_to_u64)
            },
            sqlparser::ast::LimitClause::OffsetCommaLimit { limit, .. } => expr_to_u64(limit),
        };
        if value.is_some() {
            return value;
        }
    }

    find_limit_in_set_expr(&query.body).or_else(|| {
        query.with.as_ref().and_then(|with| {
            with.cte_tables.iter().find_map(|cte| find_limit(&cte.query))
        })
    })
}

fn find_limit_in_set_expr(set_expr: &SetExpr) -> Option<u64> {
    match set_expr {
        SetExpr::Query(query) => find_limit(query),
        SetExpr::SetOperation { left, right, .. } => {
            find_limit_in_set_expr(left).or_else(|| find_limit_in_set_expr(right))
        },
        SetExpr::Select(select) => select.from.iter().find_map(|twj| {
            std::iter::once(&twj.relation)
                .chain(twj.joins.iter().map(|j| &j.relation))
                .find_map(|factor| match factor {
                    TableFactor::Derived { subquery, .. } => find_limit(subquery),
                    _ => None,
                })
        }),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Equality-join extraction
// ---------------------------------------------------------------------------

fn join_on_condition(join: &Join) -> Option<&Expr> {
    let constraint = match &join.join_operator {
        JoinOperator::Join(c)
        | JoinOperator::Inner(c)
        | JoinOperator::Left(c)
        | JoinOperator::LeftOuter(c)
        | JoinOperator::Right(c)
        | JoinOperator::RightOuter(c)
        | JoinOperator::FullOuter(c) => c,
        _ => return None,
    };
    match constraint {
        JoinConstraint::On(expr) => Some(expr),
        _ => None,
    }
}

/// Extract `Ta.ca = Tb.cb` conditions from every JOIN ... ON and every
/// WHERE clause (descending through AND), skipping same-table equalities.
pub fn extract_equi_joins(query: &Query, aliases: &HashMap<String, String>) -> Vec<ExtractedJoin> {
    let mut joins = Vec::new();

    let mut selects: Vec<&Select> = Vec::new();
    walk_query_selects(query, &mut |s| selects.push(s));

    for select in selects {
        for twj in &select.from {
            for join in &twj.joins {
                if let Some(on) = join_on_condition(join) {
                    collect_eq_conditions(on, aliases, &mut joins);
                }
            }
        }
        if let Some(selection) = &select.selection {
            collect_eq_conditions(selection, aliases, &mut joins);
        }
    }

    joins
}

fn collect_eq_conditions(
    expr: &Expr,
    aliases: &HashMap<String, String>,
    joins: &mut Vec<ExtractedJoin>,
) {
    match expr {
        Expr::BinaryOp { left, op: BinaryOperator::Eq, right } => {
            if let (Expr::CompoundIdentifier(l), Expr::CompoundIdentifier(r)) =
                (left.as_ref(), right.as_ref())
            {
                if l.len() >= 2 && r.len() >= 2 {
                    let left_qualifier = l[l.len() - 2].value.to_uppercase();
                    let right_qualifier = r[r.len() - 2].value.to_uppercase();
                    let left_table =
                        aliases.get(&left_qualifier).cloned().unwrap_or(left_qualifier);
                    let right_table =
                        aliases.get(&right_qualifier).cloned().unwrap_or(right_qualifier);

                    if left_table != right_table {
                        joins.push(ExtractedJoin {
                            left_table,
                            left_column: l[l.len() - 1].value.to_lowercase(),
                            right_table,
                            right_column: r[r.len() - 1].value.to_lowercase(),
                        });
                    }
                }
            }
        },
        Expr::BinaryOp { left, op: BinaryOperator::And, right } => {
            collect_eq_conditions(left, aliases, joins);
            collect_eq_conditions(right, aliases, joins);
        },
        Expr::Nested(inner) => collect_eq_conditions(inner, aliases, joins),
        _ => {},
    }
}
