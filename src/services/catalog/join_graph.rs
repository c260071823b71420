//! Join intelligence: edge scoring, path finding, join validation, and
//! multi-table join recommendations.
//!
//! Scores order candidates; they never accept or reject a join on their
//! own. Path search is a bounded BFS over a directed graph that carries
//! both directions of every known edge.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;

use super::model::{Confidence, JoinEdge, SchemaCatalog};

/// Bonus applied on top of the confidence base score.
pub fn rel_type_bonus(rel_type: &str) -> i32 {
    match rel_type {
        "universal" => 50,
        "table match" => 30,
        "within_family" => 10,
        "heuristic_home" => -20,
        _ => 0,
    }
}

/// Score for a single edge: confidence base + rel-type bonus + warning
/// penalty. Pure in `(confidence, rel_type, has_warning)`.
pub fn score_edge(edge: &JoinEdge) -> i32 {
    let warning_penalty = if edge.has_warning() { -30 } else { 0 };
    edge.confidence.base_score() + rel_type_bonus(&edge.rel_type) + warning_penalty
}

/// Single step in a join path.
#[derive(Debug, Clone, Serialize)]
pub struct JoinStep {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    pub confidence: Confidence,
    pub rel_type: String,
    pub score: i32,
    pub warning: String,
}

impl JoinStep {
    fn from_edge(edge: &JoinEdge) -> Self {
        Self {
            from_table: edge.from_table.clone(),
            from_column: edge.from_column.clone(),
            to_table: edge.to_table.clone(),
            to_column: edge.to_column.clone(),
            confidence: edge.confidence,
            rel_type: edge.rel_type.clone(),
            score: score_edge(edge),
            warning: edge.warning().to_string(),
        }
    }
}

/// Complete join path between two tables.
#[derive(Debug, Clone, Serialize)]
pub struct JoinPath {
    pub from_table: String,
    pub to_table: String,
    pub steps: Vec<JoinStep>,
    pub total_score: i32,
    pub warnings: Vec<String>,
}

impl JoinPath {
    pub fn hop_count(&self) -> usize {
        self.steps.len()
    }

    pub fn is_direct(&self) -> bool {
        self.hop_count() == 1
    }
}

/// Result of validating one proposed join.
#[derive(Debug, Clone, Serialize)]
pub struct JoinValidation {
    pub valid: bool,
    pub confidence: Confidence,
    pub score: i32,
    pub warnings: Vec<String>,
    pub suggestion: String,
}

impl JoinValidation {
    fn invalid(warning: String) -> Self {
        Self {
            valid: false,
            confidence: Confidence::Heuristic,
            score: 0,
            warnings: vec![warning],
            suggestion: String::new(),
        }
    }
}

/// Recommended join strategy for multiple tables.
#[derive(Debug, Clone, Serialize)]
pub struct JoinRecommendation {
    pub tables: Vec<String>,
    pub joins: Vec<JoinStep>,
    pub total_score: i32,
    pub warnings: Vec<String>,
}

impl JoinRecommendation {
    /// Render the recommendation as SQL JOIN clauses.
    pub fn to_sql_joins(&self, base_table: Option<&str>) -> String {
        if self.joins.is_empty() {
            return String::new();
        }

        let mut joined: HashSet<String> = HashSet::new();
        joined.insert(
            base_table.map(str::to_uppercase).unwrap_or_else(|| self.joins[0].from_table.clone()),
        );

        let mut lines = Vec::new();
        for step in &self.joins {
            let join_table = if joined.contains(&step.from_table) && !joined.contains(&step.to_table)
            {
                step.to_table.clone()
            } else if joined.contains(&step.to_table) && !joined.contains(&step.from_table) {
                step.from_table.clone()
            } else {
                continue;
            };
            joined.insert(join_table.clone());
            lines.push(format!(
                "JOIN {} ON {}.{} = {}.{}",
                join_table, step.from_table, step.from_column, step.to_table, step.to_column
            ));
        }

        lines.join("\n")
    }
}

/// Adjacency structure for path search. Both directions of every catalog
/// edge are materialized.
struct JoinGraph {
    graph: DiGraph<String, JoinEdge>,
    nodes: HashMap<String, NodeIndex>,
}

impl JoinGraph {
    fn build(catalog: &SchemaCatalog) -> Self {
        fn node_of(
            graph: &mut DiGraph<String, JoinEdge>,
            nodes: &mut HashMap<String, NodeIndex>,
            name: &str,
        ) -> NodeIndex {
            *nodes
                .entry(name.to_string())
                .or_insert_with(|| graph.add_node(name.to_string()))
        }

        let mut graph = DiGraph::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();

        for edge in &catalog.join_edges {
            let from = node_of(&mut graph, &mut nodes, &edge.from_table);
            let to = node_of(&mut graph, &mut nodes, &edge.to_table);
            graph.add_edge(from, to, edge.clone());
            graph.add_edge(to, from, edge.reversed());
        }

        Self { graph, nodes }
    }
}

impl SchemaCatalog {
    /// Find all join paths between two tables with at most `max_hops`
    /// steps, sorted by `(hop count ascending, total score descending)`.
    /// Self-joins return no paths.
    pub fn find_join_paths(&self, from_table: &str, to_table: &str, max_hops: usize) -> Vec<JoinPath> {
        let from_upper = from_table.to_uppercase();
        let to_upper = to_table.to_uppercase();

        if from_upper == to_upper {
            return Vec::new();
        }
        if !self.table_exists(&from_upper) || !self.table_exists(&to_upper) {
            return Vec::new();
        }

        let jg = JoinGraph::build(self);
        let (Some(&start), Some(&goal)) = (jg.nodes.get(&from_upper), jg.nodes.get(&to_upper))
        else {
            return Vec::new();
        };

        let mut paths: Vec<JoinPath> = Vec::new();
        let mut queue: VecDeque<(NodeIndex, Vec<JoinEdge>, HashSet<NodeIndex>)> = VecDeque::new();
        queue.push_back((start, Vec::new(), HashSet::from([start])));

        while let Some((current, path, visited)) = queue.pop_front() {
            if path.len() >= max_hops {
                continue;
            }

            for edge_ref in jg.graph.edges(current) {
                let next = edge_ref.target();
                if visited.contains(&next) {
                    continue;
                }

                let mut new_path = path.clone();
                new_path.push(edge_ref.weight().clone());

                if next == goal {
                    paths.push(path_from_edges(&from_upper, &to_upper, &new_path));
                } else if new_path.len() < max_hops {
                    let mut new_visited = visited.clone();
                    new_visited.insert(next);
                    queue.push_back((next, new_path, new_visited));
                }
            }
        }

        paths.sort_by(|a, b| {
            a.hop_count().cmp(&b.hop_count()).then(b.total_score.cmp(&a.total_score))
        });
        paths
    }

    /// Best (shortest, then highest-scoring) join path, if any.
    pub fn best_join(&self, from_table: &str, to_table: &str) -> Option<JoinPath> {
        self.find_join_paths(from_table, to_table, 3).into_iter().next()
    }

    /// Direct (single-edge) joins between two tables, sorted by score
    /// descending.
    pub fn direct_joins(&self, table_a: &str, table_b: &str) -> Vec<JoinStep> {
        let a_upper = table_a.to_uppercase();
        let b_upper = table_b.to_uppercase();

        let mut steps: Vec<JoinStep> = self
            .join_edges
            .iter()
            .filter(|e| {
                (e.from_table == a_upper && e.to_table == b_upper)
                    || (e.from_table == b_upper && e.to_table == a_upper)
            })
            .map(JoinStep::from_edge)
            .collect();

        steps.sort_by(|a, b| b.score.cmp(&a.score));
        steps
    }

    /// Validate a proposed join `(a.ca, b.cb)` against the catalog.
    pub fn validate_join(
        &self,
        table_a: &str,
        column_a: &str,
        table_b: &str,
        column_b: &str,
    ) -> JoinValidation {
        let a_upper = table_a.to_uppercase();
        let b_upper = table_b.to_uppercase();
        let ca_lower = column_a.to_lowercase();
        let cb_lower = column_b.to_lowercase();

        if !self.table_exists(&a_upper) {
            return JoinValidation::invalid(format!("Table {} not found", a_upper));
        }
        if !self.table_exists(&b_upper) {
            return JoinValidation::invalid(format!("Table {} not found", b_upper));
        }
        if !self.column_exists(&a_upper, &ca_lower) {
            return JoinValidation::invalid(format!("Column {}.{} not found", a_upper, ca_lower));
        }
        if !self.column_exists(&b_upper, &cb_lower) {
            return JoinValidation::invalid(format!("Column {}.{} not found", b_upper, cb_lower));
        }

        for edge in &self.join_edges {
            if edge.connects(&a_upper, &ca_lower, &b_upper, &cb_lower) {
                let score = score_edge(edge);
                let mut warnings = Vec::new();
                let mut suggestion = String::new();

                if edge.has_warning() {
                    warnings.push(edge.warning().to_string());

                    // A strictly-higher-scoring warning-free edge between the
                    // same tables earns a suggestion
                    let better: Vec<JoinStep> = self
                        .direct_joins(&a_upper, &b_upper)
                        .into_iter()
                        .filter(|j| j.score > score && j.warning.is_empty())
                        .collect();
                    if let Some(best) = better.first() {
                        suggestion = format!(
                            "Consider using {}.{} = {}.{} instead (confidence: {})",
                            best.from_table,
                            best.from_column,
                            best.to_table,
                            best.to_column,
                            best.confidence.as_str()
                        );
                    }
                }

                return JoinValidation {
                    valid: true,
                    confidence: edge.confidence,
                    score,
                    warnings,
                    suggestion,
                };
            }
        }

        // Not a known edge; same-name columns pass as a heuristic join
        if ca_lower == cb_lower {
            return JoinValidation {
                valid: true,
                confidence: Confidence::Heuristic,
                score: 25,
                warnings: vec!["This join is not in the schema. Verify manually.".to_string()],
                suggestion: String::new(),
            };
        }

        JoinValidation {
            valid: false,
            confidence: Confidence::Heuristic,
            score: 0,
            warnings: vec!["No known relationship between these columns".to_string()],
            suggestion: format!(
                "Check if {} and {} can be joined via another path",
                a_upper, b_upper
            ),
        }
    }

    /// Greedy join ordering for a set of tables: at each step take the
    /// highest-scoring direct edge from any joined table to any remaining
    /// one; fall back to a two-hop path; warn and stop when tables stay
    /// unreachable.
    pub fn recommended_joins(&self, tables: &[String], base_table: Option<&str>) -> JoinRecommendation {
        if tables.is_empty() {
            return JoinRecommendation {
                tables: Vec::new(),
                joins: Vec::new(),
                total_score: 0,
                warnings: Vec::new(),
            };
        }

        let mut tables_upper: Vec<String> = tables.iter().map(|t| t.to_uppercase()).collect();
        let base = base_table.map(str::to_uppercase).unwrap_or_else(|| tables_upper[0].clone());
        if !tables_upper.contains(&base) {
            tables_upper.insert(0, base.clone());
        }

        let mut joined: HashSet<String> = HashSet::from([base.clone()]);
        let mut remaining: HashSet<String> =
            tables_upper.iter().filter(|t| !joined.contains(*t)).cloned().collect();
        let mut joins: Vec<JoinStep> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();
        let mut total_score = 0;

        while !remaining.is_empty() {
            let mut best_join: Option<JoinStep> = None;
            let mut best_target: Option<String> = None;

            let mut joined_sorted: Vec<String> = joined.iter().cloned().collect();
            joined_sorted.sort();
            let mut remaining_sorted: Vec<String> = remaining.iter().cloned().collect();
            remaining_sorted.sort();

            for joined_table in &joined_sorted {
                for target in &remaining_sorted {
                    if let Some(path) = self.best_join(joined_table, target) {
                        if path.is_direct() {
                            let step = path.steps[0].clone();
                            if best_join.as_ref().map_or(true, |b| step.score > b.score) {
                                best_join = Some(step);
                                best_target = Some(target.clone());
                            }
                        }
                    }
                }
            }

            if let (Some(step), Some(target)) = (best_join, best_target) {
                if !step.warning.is_empty() {
                    warnings.push(format!(
                        "{}.{}: {}",
                        step.from_table, step.from_column, step.warning
                    ));
                }
                total_score += step.score;
                joins.push(step);
                joined.insert(target.clone());
                remaining.remove(&target);
                continue;
            }

            // No direct edge from the joined set; try a two-hop path
            let mut advanced = false;
            for target in &remaining_sorted {
                let paths = self.find_join_paths(&base, target, 2);
                if let Some(path) = paths.first() {
                    for step in &path.steps {
                        if !joined.contains(&step.to_table) {
                            if !step.warning.is_empty() {
                                warnings.push(format!(
                                    "{}.{}: {}",
                                    step.from_table, step.from_column, step.warning
                                ));
                            }
                            total_score += step.score;
                            joined.insert(step.to_table.clone());
                            joins.push(step.clone());
                        }
                    }
                    remaining.remove(target);
                    advanced = true;
                    break;
                }
            }

            if !advanced {
                let mut unjoined: Vec<String> = remaining.iter().cloned().collect();
                unjoined.sort();
                warnings.push(format!("Could not find join path to: {}", unjoined.join(", ")));
                break;
            }
        }

        JoinRecommendation { tables: tables_upper, joins, total_score, warnings }
    }
}

fn path_from_edges(from_table: &str, to_table: &str, edges: &[JoinEdge]) -> JoinPath {
    let mut steps = Vec::with_capacity(edges.len());
    let mut total_score = 0;
    let mut warnings = Vec::new();

    for edge in edges {
        let step = JoinStep::from_edge(edge);
        total_score += step.score;
        if !step.warning.is_empty() {
            warnings.push(format!("{}.{}: {}", edge.from_table, edge.from_column, step.warning));
        }
        steps.push(step);
    }

    JoinPath {
        from_table: from_table.to_string(),
        to_table: to_table.to_string(),
        steps,
        total_score,
        warnings,
    }
}
