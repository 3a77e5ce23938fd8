/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Boolean predicates used by filters and index scans.

use crate::binding::{Binding, BindingContext};
use crate::error::{QueryError, Result};
use crate::function::FunctionCall;
use crate::planner::cost::Cost;
use crate::GroupId;
use regex::Regex;
use rustc_hash::FxHashMap;
use shared::{ColumnDescriptor, SortOrder, Tuple, Type, Value, ValueStatistics};
use std::cmp::Ordering;
use std::fmt;

/// Selectivity assumed when nothing better is known.
pub const DEFAULT_SELECTIVITY: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Between,
    In,
    IsNull,
    Like,
    /// Full-text match; can only be answered by a full-text index.
    Match,
}

impl ComparisonOperator {
    fn accepts(&self, right: usize) -> bool {
        match self {
            ComparisonOperator::IsNull => right == 0,
            ComparisonOperator::Between => right == 2,
            ComparisonOperator::In => right >= 1,
            _ => right == 1,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "=",
            ComparisonOperator::NotEqual => "!=",
            ComparisonOperator::Greater => ">",
            ComparisonOperator::GreaterEqual => ">=",
            ComparisonOperator::Less => "<",
            ComparisonOperator::LessEqual => "<=",
            ComparisonOperator::Between => "BETWEEN",
            ComparisonOperator::In => "IN",
            ComparisonOperator::IsNull => "IS NULL",
            ComparisonOperator::Like => "LIKE",
            ComparisonOperator::Match => "MATCH",
        }
    }
}

/// Compares a column against zero or more bound values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Comparison {
    pub operator: ComparisonOperator,
    pub left: ColumnDescriptor,
    pub right: Vec<Binding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BooleanPredicate {
    Atomic { comparison: Comparison, not: bool },
    And(Box<BooleanPredicate>, Box<BooleanPredicate>),
    Or(Box<BooleanPredicate>, Box<BooleanPredicate>),
}

impl BooleanPredicate {
    /// Builds an atomic predicate, checking the number of operands.
    pub fn atomic(
        operator: ComparisonOperator,
        left: ColumnDescriptor,
        right: Vec<Binding>,
    ) -> Result<Self> {
        if !operator.accepts(right.len()) {
            return Err(QueryError::invalid_query(format!(
                "{} does not accept {} operand(s)",
                operator.symbol(),
                right.len()
            )));
        }
        if matches!(operator, ComparisonOperator::Like | ComparisonOperator::Match)
            && left.logical_type != Type::String
        {
            return Err(QueryError::invalid_query(format!(
                "{} requires a string column but {} is {}",
                operator.symbol(),
                left.name,
                left.logical_type
            )));
        }
        Ok(BooleanPredicate::Atomic {
            comparison: Comparison {
                operator,
                left,
                right,
            },
            not: false,
        })
    }

    pub fn negate(self) -> Self {
        match self {
            BooleanPredicate::Atomic { comparison, not } => BooleanPredicate::Atomic {
                comparison,
                not: !not,
            },
            BooleanPredicate::And(p1, p2) => {
                BooleanPredicate::Or(Box::new(p1.negate()), Box::new(p2.negate()))
            }
            BooleanPredicate::Or(p1, p2) => {
                BooleanPredicate::And(Box::new(p1.negate()), Box::new(p2.negate()))
            }
        }
    }

    pub fn and(self, other: BooleanPredicate) -> Self {
        BooleanPredicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: BooleanPredicate) -> Self {
        BooleanPredicate::Or(Box::new(self), Box::new(other))
    }

    /// Columns of the input tuple this predicate reads, in order of appearance.
    pub fn columns(&self) -> Vec<ColumnDescriptor> {
        let mut columns = Vec::new();
        self.collect_columns(&mut columns);
        columns
    }

    fn collect_columns(&self, columns: &mut Vec<ColumnDescriptor>) {
        match self {
            BooleanPredicate::Atomic { comparison, .. } => {
                let referenced = std::iter::once(&comparison.left)
                    .chain(comparison.right.iter().filter_map(Binding::column));
                for column in referenced {
                    if !columns.contains(column) {
                        columns.push(column.clone());
                    }
                }
            }
            BooleanPredicate::And(p1, p2) | BooleanPredicate::Or(p1, p2) => {
                p1.collect_columns(columns);
                p2.collect_columns(columns);
            }
        }
    }

    /// Group ids of the sub-plans referenced by this predicate.
    pub fn subqueries(&self) -> Vec<GroupId> {
        match self {
            BooleanPredicate::Atomic { comparison, .. } => comparison
                .right
                .iter()
                .filter_map(|b| match b {
                    Binding::Subquery { group_id, .. } => Some(*group_id),
                    _ => None,
                })
                .collect(),
            BooleanPredicate::And(p1, p2) | BooleanPredicate::Or(p1, p2) => {
                let mut groups = p1.subqueries();
                groups.extend(p2.subqueries());
                groups
            }
        }
    }

    /// Column of the sub-plan `group_id` whose values the predicate compares against.
    pub fn subquery_column(&self, group_id: GroupId) -> Option<&ColumnDescriptor> {
        match self {
            BooleanPredicate::Atomic { comparison, .. } => comparison.right.iter().find_map(|b| match b {
                Binding::Subquery { group_id: g, column } if *g == group_id => Some(column),
                _ => None,
            }),
            BooleanPredicate::And(p1, p2) | BooleanPredicate::Or(p1, p2) => p1
                .subquery_column(group_id)
                .or_else(|| p2.subquery_column(group_id)),
        }
    }

    /// Whether a filter can evaluate this predicate tuple by tuple.
    pub fn is_linearly_evaluable(&self) -> bool {
        match self {
            BooleanPredicate::Atomic { comparison, .. } => {
                comparison.operator != ComparisonOperator::Match
            }
            BooleanPredicate::And(p1, p2) | BooleanPredicate::Or(p1, p2) => {
                p1.is_linearly_evaluable() && p2.is_linearly_evaluable()
            }
        }
    }

    /// CPU cost of evaluating this predicate on a single tuple.
    pub fn cpu_cost(&self) -> Cost {
        match self {
            BooleanPredicate::Atomic { comparison, .. } => {
                let operands = (1 + comparison.right.len()) as f64;
                let base = Cost::MEMORY_ACCESS * operands + Cost::FLOP;
                match comparison.operator {
                    ComparisonOperator::Like | ComparisonOperator::Match => base * 10.0,
                    _ => base,
                }
            }
            BooleanPredicate::And(p1, p2) | BooleanPredicate::Or(p1, p2) => {
                p1.cpu_cost() + p2.cpu_cost() + Cost::FLOP
            }
        }
    }

    /// Estimated fraction of tuples that satisfy this predicate.
    pub fn selectivity(&self, statistics: &FxHashMap<ColumnDescriptor, ValueStatistics>) -> f64 {
        match self {
            BooleanPredicate::Atomic { comparison, not } => {
                let stats = statistics.get(&comparison.left);
                let equal = stats
                    .and_then(ValueStatistics::equality_selectivity)
                    .unwrap_or(DEFAULT_SELECTIVITY);
                let selectivity = match comparison.operator {
                    ComparisonOperator::Equal => equal,
                    ComparisonOperator::NotEqual => 1.0 - equal,
                    ComparisonOperator::In => (equal * comparison.right.len() as f64).min(1.0),
                    ComparisonOperator::IsNull => stats
                        .and_then(ValueStatistics::null_fraction)
                        .unwrap_or(DEFAULT_SELECTIVITY),
                    _ => DEFAULT_SELECTIVITY,
                };
                if *not {
                    1.0 - selectivity
                } else {
                    selectivity
                }
            }
            BooleanPredicate::And(p1, p2) => p1.selectivity(statistics) * p2.selectivity(statistics),
            BooleanPredicate::Or(p1, p2) => {
                let (s1, s2) = (p1.selectivity(statistics), p2.selectivity(statistics));
                s1 + s2 - s1 * s2
            }
        }
    }

    /// Evaluates this predicate against a tuple.
    pub fn is_match(
        &self,
        tuple: &Tuple,
        bindings: &BindingContext,
        patterns: &mut PatternCache,
    ) -> Result<bool> {
        match self {
            BooleanPredicate::Atomic { comparison, not } => {
                let matched = comparison.is_match(tuple, bindings, patterns)?;
                Ok(matched != *not)
            }
            BooleanPredicate::And(p1, p2) => {
                Ok(p1.is_match(tuple, bindings, patterns)? && p2.is_match(tuple, bindings, patterns)?)
            }
            BooleanPredicate::Or(p1, p2) => {
                Ok(p1.is_match(tuple, bindings, patterns)? || p2.is_match(tuple, bindings, patterns)?)
            }
        }
    }
}

impl Comparison {
    fn is_match(
        &self,
        tuple: &Tuple,
        bindings: &BindingContext,
        patterns: &mut PatternCache,
    ) -> Result<bool> {
        let left = tuple.get(&self.left).ok_or_else(|| {
            QueryError::internal(format!("column {} is not part of the tuple", self.left.name))
        })?;
        if self.operator == ComparisonOperator::IsNull {
            return Ok(left.is_null());
        }
        if left.is_null() {
            return Ok(false);
        }

        let right = bindings.resolve_all(&self.right, tuple)?;
        let ordering = |i: usize| right.get(i).and_then(|r| left.compare(r));
        let matched = match self.operator {
            ComparisonOperator::Equal => ordering(0) == Some(Ordering::Equal),
            ComparisonOperator::NotEqual => matches!(ordering(0), Some(o) if o != Ordering::Equal),
            ComparisonOperator::Greater => ordering(0) == Some(Ordering::Greater),
            ComparisonOperator::GreaterEqual => {
                matches!(ordering(0), Some(Ordering::Greater | Ordering::Equal))
            }
            ComparisonOperator::Less => ordering(0) == Some(Ordering::Less),
            ComparisonOperator::LessEqual => {
                matches!(ordering(0), Some(Ordering::Less | Ordering::Equal))
            }
            ComparisonOperator::Between => {
                matches!(ordering(0), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(ordering(1), Some(Ordering::Less | Ordering::Equal))
            }
            ComparisonOperator::In => right.iter().any(|r| left.is_equal(r)),
            ComparisonOperator::Like => match (left.as_str(), right.first().and_then(|r| r.as_str())) {
                (Some(text), Some(pattern)) => patterns.get(pattern)?.is_match(text),
                _ => false,
            },
            ComparisonOperator::Match => {
                return Err(QueryError::internal(
                    "MATCH can only be evaluated by a full-text index",
                ))
            }
            ComparisonOperator::IsNull => left.is_null(),
        };
        Ok(matched)
    }
}

/// Compiled LIKE patterns, keyed by the pattern text.
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: FxHashMap<String, Regex>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, pattern: &str) -> Result<&Regex> {
        if !self.compiled.contains_key(pattern) {
            let regex = like_to_regex(pattern)?;
            self.compiled.insert(pattern.to_string(), regex);
        }
        self.compiled
            .get(pattern)
            .ok_or_else(|| QueryError::internal("pattern vanished from cache"))
    }
}

/// Translates a LIKE pattern (`%` any sequence, `_` any character) into an
/// anchored regular expression.
pub fn like_to_regex(pattern: &str) -> Result<Regex> {
    let mut expression = String::from("(?s)^");
    let mut buffer = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '%' => expression.push_str(".*"),
            '_' => expression.push('.'),
            c => expression.push_str(&regex::escape(c.encode_utf8(&mut buffer))),
        }
    }
    expression.push('$');
    Regex::new(&expression).map_err(|e| QueryError::invalid_query(e.to_string()))
}

/// A nearest-neighbour search over a vector column: the `k` tuples ranked
/// first when ordered by the distance `call` computes to a query literal.
/// A descending order searches the farthest neighbours instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProximityPredicate {
    pub call: FunctionCall,
    pub column: ColumnDescriptor,
    pub k: i64,
    pub order: SortOrder,
}

impl ProximityPredicate {
    /// Returns `None` unless the call compares exactly one column with one
    /// literal.
    pub fn new(call: FunctionCall, k: i64, order: SortOrder) -> Option<Self> {
        let mut columns = call.arguments.iter().filter_map(Binding::column);
        let column = columns.next()?.clone();
        let literals = call.arguments.iter().filter(|a| a.is_literal()).count();
        if columns.next().is_some() || literals != 1 || k < 0 {
            return None;
        }
        Some(ProximityPredicate {
            call,
            column,
            k,
            order,
        })
    }

    /// Column holding the distance of each result.
    pub fn distance(&self) -> &ColumnDescriptor {
        &self.call.out
    }
}

impl fmt::Display for ProximityPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let search = match self.order {
            SortOrder::Ascending => "NNS",
            SortOrder::Descending => "FNS",
        };
        write!(
            f,
            "{} {}({}) k={}",
            search,
            self.call.function.name(),
            self.column.name,
            self.k
        )
    }
}

impl fmt::Display for BooleanPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BooleanPredicate::Atomic { comparison, not } => {
                if *not {
                    write!(f, "NOT ")?;
                }
                write!(f, "{} {}", comparison.left.name, comparison.operator.symbol())?;
                for binding in &comparison.right {
                    match binding {
                        Binding::Literal { slot, .. } => write!(f, " :{}", slot)?,
                        Binding::Column(column) => write!(f, " {}", column.name)?,
                        Binding::Subquery { group_id, .. } => write!(f, " <group {}>", group_id)?,
                    }
                }
                Ok(())
            }
            BooleanPredicate::And(p1, p2) => write!(f, "({} AND {})", p1, p2),
            BooleanPredicate::Or(p1, p2) => write!(f, "({} OR {})", p1, p2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn create_test_tuple() -> (Tuple, ColumnDescriptor, ColumnDescriptor) {
        let id = ColumnDescriptor::new("t.id", Type::Long, false);
        let name = ColumnDescriptor::new("t.name", Type::String, true);
        let columns: Arc<[ColumnDescriptor]> = vec![id.clone(), name.clone()].into();
        let tuple = Tuple::new(0, columns, vec![Value::Long(7), Value::String("stratified".into())]);
        (tuple, id, name)
    }

    #[test]
    fn test_comparisons() {
        let (tuple, id, _) = create_test_tuple();
        let mut bindings = BindingContext::new();
        let mut patterns = PatternCache::new();
        let five = bindings.bind_value(Value::Long(5)).unwrap();
        let ten = bindings.bind_value(Value::Int(10)).unwrap();

        let greater = BooleanPredicate::atomic(ComparisonOperator::Greater, id.clone(), vec![five.clone()]).unwrap();
        assert!(greater.is_match(&tuple, &bindings, &mut patterns).unwrap());
        assert!(!greater.clone().negate().is_match(&tuple, &bindings, &mut patterns).unwrap());

        let between = BooleanPredicate::atomic(ComparisonOperator::Between, id.clone(), vec![five, ten.clone()]).unwrap();
        assert!(between.is_match(&tuple, &bindings, &mut patterns).unwrap());

        let equal = BooleanPredicate::atomic(ComparisonOperator::Equal, id, vec![ten]).unwrap();
        assert!(!equal.clone().is_match(&tuple, &bindings, &mut patterns).unwrap());
        assert!(greater.clone().or(equal.clone()).is_match(&tuple, &bindings, &mut patterns).unwrap());
        assert!(!greater.and(equal).is_match(&tuple, &bindings, &mut patterns).unwrap());
    }

    #[test]
    fn test_like() {
        let (tuple, _, name) = create_test_tuple();
        let mut bindings = BindingContext::new();
        let mut patterns = PatternCache::new();
        let pattern = bindings.bind_value(Value::from("str%ed")).unwrap();
        let like = BooleanPredicate::atomic(ComparisonOperator::Like, name, vec![pattern.clone()]).unwrap();
        assert!(like.is_match(&tuple, &bindings, &mut patterns).unwrap());
        bindings.update(&pattern, Value::from("s_r.%")).unwrap();
        assert!(!like.is_match(&tuple, &bindings, &mut patterns).unwrap());
    }

    #[test]
    fn test_like_to_regex_escapes() {
        let regex = like_to_regex("a.b%").unwrap();
        assert!(regex.is_match("a.bcd"));
        assert!(!regex.is_match("axb"));
    }

    #[test]
    fn test_operand_validation() {
        let (_, id, _) = create_test_tuple();
        assert!(BooleanPredicate::atomic(ComparisonOperator::Between, id.clone(), vec![]).is_err());
        assert!(BooleanPredicate::atomic(ComparisonOperator::IsNull, id.clone(), vec![]).is_ok());
        assert!(BooleanPredicate::atomic(ComparisonOperator::Like, id, vec![]).is_err());
    }

    #[test]
    fn test_match_is_not_linear() {
        let (tuple, _, name) = create_test_tuple();
        let mut bindings = BindingContext::new();
        let term = bindings.bind_value(Value::from("stratified")).unwrap();
        let predicate = BooleanPredicate::atomic(ComparisonOperator::Match, name, vec![term]).unwrap();
        assert!(!predicate.is_linearly_evaluable());
        assert!(predicate.is_match(&tuple, &bindings, &mut PatternCache::new()).is_err());
    }

    #[test]
    fn test_selectivity() {
        let (_, id, name) = create_test_tuple();
        let mut bindings = BindingContext::new();
        let value = bindings.bind_value(Value::Long(1)).unwrap();
        let equal = BooleanPredicate::atomic(ComparisonOperator::Equal, id.clone(), vec![value]).unwrap();

        let mut statistics = FxHashMap::default();
        assert_eq!(equal.selectivity(&statistics), DEFAULT_SELECTIVITY);
        statistics.insert(
            id,
            ValueStatistics {
                entries: 100,
                distinct_entries: 100,
                ..Default::default()
            },
        );
        assert!((equal.selectivity(&statistics) - 0.01).abs() < 1e-12);

        let is_null = BooleanPredicate::atomic(ComparisonOperator::IsNull, name, vec![]).unwrap();
        let both = equal.and(is_null);
        assert!((both.selectivity(&statistics) - 0.01 * DEFAULT_SELECTIVITY).abs() < 1e-12);
    }

    #[test]
    fn test_columns_and_digest_ignore_values() {
        let (_, id, name) = create_test_tuple();
        let mut first = BindingContext::new();
        let mut second = BindingContext::new();
        let a = BooleanPredicate::atomic(
            ComparisonOperator::Equal,
            id.clone(),
            vec![first.bind_value(Value::Long(1)).unwrap()],
        )
        .unwrap();
        let b = BooleanPredicate::atomic(
            ComparisonOperator::Equal,
            id.clone(),
            vec![second.bind_value(Value::Long(99)).unwrap()],
        )
        .unwrap();
        assert_eq!(a, b);

        let c = BooleanPredicate::atomic(ComparisonOperator::Equal, id.clone(), vec![Binding::Column(name.clone())]).unwrap();
        assert_eq!(c.columns(), vec![id, name]);
    }

    #[test]
    fn test_proximity_needs_column_and_literal() {
        use crate::function::FunctionKind;
        let vector = ColumnDescriptor::new("t.v", Type::FloatVector(2), false);
        let other = ColumnDescriptor::new("t.w", Type::FloatVector(2), false);
        let out = ColumnDescriptor::new("distance", Type::Double, false);
        let mut bindings = BindingContext::new();
        let query = bindings.bind_value(Value::FloatVector(vec![1.0, 2.0])).unwrap();

        let call = FunctionCall::new(
            FunctionKind::EuclideanDistance,
            vec![Binding::Column(vector.clone()), query],
            out.clone(),
        )
        .unwrap();
        let predicate = ProximityPredicate::new(call.clone(), 5, SortOrder::Ascending).unwrap();
        assert_eq!(predicate.column, vector);
        assert_eq!(predicate.distance(), &out);
        assert_eq!(predicate.to_string(), "NNS euclidean(t.v) k=5");
        assert!(ProximityPredicate::new(call, -1, SortOrder::Ascending).is_none());

        let columns_only = FunctionCall::new(
            FunctionKind::EuclideanDistance,
            vec![Binding::Column(vector), Binding::Column(other)],
            out,
        )
        .unwrap();
        assert!(ProximityPredicate::new(columns_only, 5, SortOrder::Descending).is_none());
    }
}
