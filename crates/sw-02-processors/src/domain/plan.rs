//! # Stage Plans
//!
//! Descriptors handed to the external topology builder. They name each stage,
//! fix its parallelism where the algorithm requires it, and say how its input
//! edge is routed. Wiring the stages into a graph is the host's job.
//!
//! ```text
//! two-stage aggregate:   upstream ──local──→ <name>-prepare ──all-to-one──→ <name> (x1)
//! single-stage aggregate: upstream ──all-to-one──→ <name> (x1)
//! sort:                  upstream ──local──→ sort-prepare (x1) ──all-to-one, ordered──→ sort (total x1)
//! ```

use crate::domain::aggregate::AggregateOperation;
use crate::domain::types::StateBackendKind;

/// Suffix of the first (local) stage of a two-stage plan.
pub const PREPARE_SUFFIX: &str = "-prepare";

/// Routing of a stage's input edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeRouting {
    /// Items stay on the member that produced them.
    LocalUnicast,
    /// Every item goes to one instance cluster-wide, independent of key.
    DistributedAllToOne,
    /// As `DistributedAllToOne`, merging inputs in ascending order-key order.
    DistributedAllToOneOrdered,
}

/// One stage of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    pub name: String,
    /// Instances per member; `None` leaves it to the host.
    pub local_parallelism: Option<usize>,
    /// Instances cluster-wide; `None` leaves it to the host.
    pub total_parallelism: Option<usize>,
    pub input_edge: EdgeRouting,
}

impl StageSpec {
    fn new(name: impl Into<String>, input_edge: EdgeRouting) -> Self {
        Self {
            name: name.into(),
            local_parallelism: None,
            total_parallelism: None,
            input_edge,
        }
    }

    fn with_local_parallelism(mut self, n: usize) -> Self {
        self.local_parallelism = Some(n);
        self
    }

    fn with_total_parallelism(mut self, n: usize) -> Self {
        self.total_parallelism = Some(n);
        self
    }
}

/// How an aggregation is executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationPlan {
    /// Accumulate and finish in one stage over the redistributed input.
    SingleStage {
        backend: StateBackendKind,
        stage: StageSpec,
    },
    /// Local accumulate, then global combine and finish.
    TwoStage {
        backend: StateBackendKind,
        local: StageSpec,
        global: StageSpec,
    },
}

impl AggregationPlan {
    pub fn backend(&self) -> StateBackendKind {
        match self {
            AggregationPlan::SingleStage { backend, .. }
            | AggregationPlan::TwoStage { backend, .. } => *backend,
        }
    }

    pub fn is_two_stage(&self) -> bool {
        matches!(self, AggregationPlan::TwoStage { .. })
    }

    /// Stages in data-flow order.
    pub fn stages(&self) -> Vec<&StageSpec> {
        match self {
            AggregationPlan::SingleStage { stage, .. } => vec![stage],
            AggregationPlan::TwoStage { local, global, .. } => vec![local, global],
        }
    }
}

/// Stage name for an aggregation over `upstream_count` inputs.
pub fn aggregate_stage_name(upstream_count: usize) -> String {
    if upstream_count == 1 {
        "aggregate".to_string()
    } else {
        format!("{upstream_count}-way co-aggregate")
    }
}

/// Choose single- or two-stage execution and the state backend.
///
/// Decided once per operation: two stages iff the operation can combine
/// partial accumulators.
pub fn plan_aggregation<T, A, R>(
    op: &AggregateOperation<T, A, R>,
    upstream_count: usize,
    use_persistence: bool,
) -> AggregationPlan {
    let backend = StateBackendKind::select(use_persistence, op.is_unbounded());
    let name = aggregate_stage_name(upstream_count);

    if op.has_combine() {
        AggregationPlan::TwoStage {
            backend,
            local: StageSpec::new(format!("{name}{PREPARE_SUFFIX}"), EdgeRouting::LocalUnicast),
            global: StageSpec::new(name, EdgeRouting::DistributedAllToOne).with_local_parallelism(1),
        }
    } else {
        AggregationPlan::SingleStage {
            backend,
            stage: StageSpec::new(name, EdgeRouting::DistributedAllToOne).with_local_parallelism(1),
        }
    }
}

/// Two-stage external sort: local sorted runs, then one ordered merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortPlan {
    pub prepare: StageSpec,
    pub merge: StageSpec,
    pub use_persistence: bool,
}

pub fn plan_sort(use_persistence: bool) -> SortPlan {
    SortPlan {
        prepare: StageSpec::new(format!("sort{PREPARE_SUFFIX}"), EdgeRouting::LocalUnicast)
            .with_local_parallelism(1),
        merge: StageSpec::new("sort", EdgeRouting::DistributedAllToOneOrdered)
            .with_local_parallelism(1)
            .with_total_parallelism(1),
        use_persistence,
    }
}
