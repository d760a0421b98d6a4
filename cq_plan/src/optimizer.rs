use cq_predicate::Predicate;

use crate::node::LogicalPlan;

/// Applies every optimizer rule to a fixed point: each pass rewrites the
/// tree bottom-up, and passes repeat until a pass produces no textual
/// change. Each individual rule strictly reduces a monovariant (node
/// count or per-Filter predicate complexity) or is a no-op when it
/// doesn't apply, so this always terminates.
pub fn optimize(plan: LogicalPlan) -> LogicalPlan {
    let mut current = plan;
    loop {
        let before = current.canonical_text();
        current = apply_pass(current);
        if current.canonical_text() == before {
            return current;
        }
    }
}

fn apply_pass(plan: LogicalPlan) -> LogicalPlan {
    let plan = recurse_children(plan, apply_pass);
    let plan = split_filter_conjunctions(plan);
    let plan = eliminate_tautologies_and_contradictions(plan);
    let plan = reorder_by_selectivity(plan);
    let plan = push_filter_through_project(plan);
    let plan = push_limit_through_project(plan);
    annotate_fuseable_filters(plan)
}

fn recurse_children(plan: LogicalPlan, f: impl Fn(LogicalPlan) -> LogicalPlan + Copy) -> LogicalPlan {
    match plan {
        LogicalPlan::Scan { .. } => plan,
        LogicalPlan::Filter { child, predicates, fuseable, estimated_rows } => LogicalPlan::Filter {
            child: Box::new(f(*child)),
            predicates,
            fuseable,
            estimated_rows,
        },
        LogicalPlan::Project { child, outputs, estimated_rows } => LogicalPlan::Project {
            child: Box::new(f(*child)),
            outputs,
            estimated_rows,
        },
        LogicalPlan::Aggregate { child, aggs, estimated_rows } => LogicalPlan::Aggregate {
            child: Box::new(f(*child)),
            aggs,
            estimated_rows,
        },
        LogicalPlan::GroupBy { child, key_columns, key_property_name, aggs, estimated_rows } => LogicalPlan::GroupBy {
            child: Box::new(f(*child)),
            key_columns,
            key_property_name,
            aggs,
            estimated_rows,
        },
        LogicalPlan::Sort { child, keys, estimated_rows } => LogicalPlan::Sort {
            child: Box::new(f(*child)),
            keys,
            estimated_rows,
        },
        LogicalPlan::Limit { child, n, estimated_rows } => LogicalPlan::Limit {
            child: Box::new(f(*child)),
            n,
            estimated_rows,
        },
        LogicalPlan::Offset { child, n, estimated_rows } => LogicalPlan::Offset {
            child: Box::new(f(*child)),
            n,
            estimated_rows,
        },
    }
}

/// Rule 2: a Filter predicate set containing an `And` of N leaves becomes
/// a Filter whose predicate list is those N leaves directly, so later
/// rules can reorder and push each one independently.
fn split_filter_conjunctions(plan: LogicalPlan) -> LogicalPlan {
    match plan {
        LogicalPlan::Filter { child, predicates, fuseable, estimated_rows } => {
            let mut flattened = Vec::with_capacity(predicates.len());
            for p in predicates {
                flatten_and(p, &mut flattened);
            }
            LogicalPlan::Filter {
                child,
                predicates: flattened,
                fuseable,
                estimated_rows,
            }
        }
        other => other,
    }
}

fn flatten_and(p: Predicate, out: &mut Vec<Predicate>) {
    match p {
        Predicate::And(children) => children.into_iter().for_each(|c| flatten_and(c, out)),
        other => out.push(other),
    }
}

/// Rule 5: drop tautologies (`col is not null` on a non-nullable column;
/// `col == col` can't be expressed in this predicate model so is out of
/// scope) and fold contradictory pairs (`a > 10 AND a < 5`) to an
/// always-false Filter (modeled as a single unsatisfiable predicate).
fn eliminate_tautologies_and_contradictions(plan: LogicalPlan) -> LogicalPlan {
    match plan {
        LogicalPlan::Filter { child, predicates, fuseable, estimated_rows } => {
            let schema = child.output_schema();
            let nullable = |col: usize| schema.field(col).map(|f| f.nullable()).unwrap_or(true);
            let mut kept: Vec<Predicate> = predicates.into_iter().filter(|p| !p.is_tautology(&nullable)).collect();

            let contradiction = kept.iter().enumerate().any(|(i, a)| kept.iter().skip(i + 1).any(|b| a.contradicts(b)));
            if contradiction {
                kept = vec![unsatisfiable_predicate()];
            }

            LogicalPlan::Filter {
                child,
                predicates: kept,
                fuseable,
                estimated_rows: if contradiction { 0 } else { estimated_rows },
            }
        }
        other => other,
    }
}

fn unsatisfiable_predicate() -> Predicate {
    // Schema- and type-agnostic: clears every bit without touching column
    // data, so it stays unsatisfiable no matter which column or logical
    // type the original contradictory pair referenced.
    Predicate::Never
}

/// Rule 1: sort a Filter's direct predicate children ascending by
/// estimated selectivity (operator-based defaults; no zone map is
/// available at plan-optimization time). Valid because predicate
/// evaluation is side-effect-free and conjunction is commutative.
fn reorder_by_selectivity(plan: LogicalPlan) -> LogicalPlan {
    match plan {
        LogicalPlan::Filter { child, mut predicates, fuseable, estimated_rows } => {
            predicates.sort_by(|a, b| {
                a.estimate_selectivity(&[])
                    .partial_cmp(&b.estimate_selectivity(&[]))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            LogicalPlan::Filter {
                child,
                predicates,
                fuseable,
                estimated_rows,
            }
        }
        other => other,
    }
}

/// Rule 3: a Filter whose predicates only reference columns the Project
/// passes through unchanged can move below the Project (remapping column
/// references to the Project's source ordinals).
fn push_filter_through_project(plan: LogicalPlan) -> LogicalPlan {
    match plan {
        LogicalPlan::Filter { child, predicates, fuseable, estimated_rows } => match *child {
            LogicalPlan::Project { child: proj_child, outputs, estimated_rows: proj_rows } => {
                let map = |ordinal: usize| outputs[ordinal].source_ordinal;
                let pushed_predicates: Vec<Predicate> = predicates.iter().map(|p| p.remap_columns(&map)).collect();
                LogicalPlan::Project {
                    child: Box::new(LogicalPlan::Filter {
                        child: proj_child,
                        predicates: pushed_predicates,
                        fuseable,
                        estimated_rows,
                    }),
                    outputs,
                    estimated_rows: proj_rows,
                }
            }
            other_child => LogicalPlan::Filter {
                child: Box::new(other_child),
                predicates,
                fuseable,
                estimated_rows,
            },
        },
        other => other,
    }
}

/// Rule 6: a Limit directly above a Project moves below it, so the
/// executor can stop scanning once the Limit is satisfied without first
/// materializing the projection for every row.
fn push_limit_through_project(plan: LogicalPlan) -> LogicalPlan {
    match plan {
        LogicalPlan::Limit { child, n, estimated_rows } => match *child {
            LogicalPlan::Project { child: proj_child, outputs, estimated_rows: proj_rows } => LogicalPlan::Project {
                child: Box::new(LogicalPlan::Limit {
                    child: proj_child,
                    n,
                    estimated_rows,
                }),
                outputs,
                estimated_rows: proj_rows.min(n),
            },
            other_child => LogicalPlan::Limit {
                child: Box::new(other_child),
                n,
                estimated_rows,
            },
        },
        other => other,
    }
}

/// Rule 4: a Filter feeding an Aggregate or GroupBy directly is annotated
/// `fuseable=true` so the physical planner can emit a single-pass kernel.
fn annotate_fuseable_filters(plan: LogicalPlan) -> LogicalPlan {
    match plan {
        LogicalPlan::Aggregate { child, aggs, estimated_rows } => {
            let child = mark_fuseable_if_filter(*child);
            LogicalPlan::Aggregate {
                child: Box::new(child),
                aggs,
                estimated_rows,
            }
        }
        LogicalPlan::GroupBy { child, key_columns, key_property_name, aggs, estimated_rows } => {
            let child = mark_fuseable_if_filter(*child);
            LogicalPlan::GroupBy {
                child: Box::new(child),
                key_columns,
                key_property_name,
                aggs,
                estimated_rows,
            }
        }
        other => other,
    }
}

fn mark_fuseable_if_filter(plan: LogicalPlan) -> LogicalPlan {
    match plan {
        LogicalPlan::Filter { child, predicates, estimated_rows, .. } => LogicalPlan::Filter {
            child,
            predicates,
            fuseable: true,
            estimated_rows,
        },
        other => other,
    }
}
