//! Optimization insights — threshold-driven recommendations over the
//! metrics snapshot and funnel results, composed into a time-horizon
//! action plan with concrete budget reallocation.

pub mod action_plan;
pub mod recommend;

pub use action_plan::{
    ActionPlan, ActionPlanComposer, ActionPlanItem, ExpectedImpact, Horizon, ReallocationEntry,
    ReallocationTable,
};
pub use recommend::{Priority, Recommendation, RecommendationEngine, RecommendationKind};
