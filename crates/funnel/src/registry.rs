//! In-memory registries for funnel and goal definitions: create, list,
//! update, soft delete. Soft-deleted definitions are invisible to reads.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use beacon_core::error::{BeaconError, BeaconResult};
use beacon_core::types::{Filter, Step, StepKind};

pub const MIN_FUNNEL_STEPS: usize = 2;
pub const MAX_FUNNEL_STEPS: usize = 10;
const MAX_NAME_LEN: usize = 100;

/// One stored step: numbering is positional and assigned at analysis time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub target: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelDefinition {
    pub id: Uuid,
    pub website_id: String,
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<StepDefinition>,
    pub filters: Vec<Filter>,
    pub ignore_historic_data: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl FunnelDefinition {
    /// Expand stored steps into numbered engine steps.
    pub fn analytics_steps(&self) -> Vec<Step> {
        to_analytics_steps(&self.steps)
    }

    pub fn effective_start_date(&self, requested: &str) -> String {
        effective_start_date(requested, self.created_at, self.ignore_historic_data)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalDefinition {
    pub id: Uuid,
    pub website_id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub target: String,
    pub filters: Vec<Filter>,
    pub ignore_historic_data: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl GoalDefinition {
    /// The goal as a single-step funnel.
    pub fn analytics_step(&self) -> Step {
        Step {
            step_number: 1,
            name: self.name.clone(),
            kind: self.kind,
            target: self.target.clone(),
        }
    }

    pub fn effective_start_date(&self, requested: &str) -> String {
        effective_start_date(requested, self.created_at, self.ignore_historic_data)
    }
}

fn to_analytics_steps(steps: &[StepDefinition]) -> Vec<Step> {
    steps
        .iter()
        .enumerate()
        .map(|(index, step)| Step {
            step_number: (index + 1) as u32,
            name: step.name.clone(),
            kind: step.kind,
            target: step.target.clone(),
        })
        .collect()
}

/// Clamp the requested start date forward to the creation date when
/// historic data is excluded. Dates are ISO `YYYY-MM-DD`, so lexical
/// comparison orders correctly.
fn effective_start_date(
    requested: &str,
    created_at: DateTime<Utc>,
    ignore_historic_data: bool,
) -> String {
    if !ignore_historic_data {
        return requested.to_string();
    }
    let created = created_at.format("%Y-%m-%d").to_string();
    if requested > created.as_str() {
        requested.to_string()
    } else {
        created
    }
}

fn validate_name(name: &str) -> BeaconResult<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(BeaconError::InvalidArgument(format!(
            "name must be 1..={MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_step_definitions(steps: &[StepDefinition]) -> BeaconResult<()> {
    if steps.len() < MIN_FUNNEL_STEPS || steps.len() > MAX_FUNNEL_STEPS {
        return Err(BeaconError::InvalidArgument(format!(
            "funnel must have {MIN_FUNNEL_STEPS}..={MAX_FUNNEL_STEPS} steps"
        )));
    }
    for step in steps {
        if step.target.is_empty() || step.name.is_empty() {
            return Err(BeaconError::InvalidArgument(
                "step target and name must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}

// ─── Funnels ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFunnel {
    pub website_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub steps: Vec<StepDefinition>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub ignore_historic_data: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFunnel {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Option<Vec<StepDefinition>>,
    #[serde(default)]
    pub filters: Option<Vec<Filter>>,
    #[serde(default)]
    pub ignore_historic_data: Option<bool>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

pub struct FunnelRegistry {
    funnels: DashMap<Uuid, FunnelDefinition>,
}

impl FunnelRegistry {
    pub fn new() -> Self {
        Self {
            funnels: DashMap::new(),
        }
    }

    pub fn create(&self, request: CreateFunnel) -> BeaconResult<FunnelDefinition> {
        validate_name(&request.name)?;
        validate_step_definitions(&request.steps)?;

        let now = Utc::now();
        let funnel = FunnelDefinition {
            id: Uuid::new_v4(),
            website_id: request.website_id,
            name: request.name,
            description: request.description,
            steps: request.steps,
            filters: request.filters,
            ignore_historic_data: request.ignore_historic_data,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.funnels.insert(funnel.id, funnel.clone());
        Ok(funnel)
    }

    pub fn get(&self, id: &Uuid, website_id: &str) -> BeaconResult<FunnelDefinition> {
        self.funnels
            .get(id)
            .filter(|f| f.deleted_at.is_none() && f.website_id == website_id)
            .map(|f| f.clone())
            .ok_or_else(|| BeaconError::NotFound(format!("funnel {id}")))
    }

    pub fn list(&self, website_id: &str) -> Vec<FunnelDefinition> {
        let mut funnels: Vec<FunnelDefinition> = self
            .funnels
            .iter()
            .filter(|f| f.deleted_at.is_none() && f.website_id == website_id)
            .map(|f| f.clone())
            .collect();
        funnels.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        funnels
    }

    pub fn update(&self, id: &Uuid, request: UpdateFunnel) -> BeaconResult<FunnelDefinition> {
        let mut entry = self
            .funnels
            .get_mut(id)
            .filter(|f| f.deleted_at.is_none())
            .ok_or_else(|| BeaconError::NotFound(format!("funnel {id}")))?;

        if let Some(name) = &request.name {
            validate_name(name)?;
        }
        if let Some(steps) = &request.steps {
            validate_step_definitions(steps)?;
        }

        let funnel = entry.value_mut();
        if let Some(name) = request.name {
            funnel.name = name;
        }
        if let Some(description) = request.description {
            funnel.description = Some(description);
        }
        if let Some(steps) = request.steps {
            funnel.steps = steps;
        }
        if let Some(filters) = request.filters {
            funnel.filters = filters;
        }
        if let Some(ignore) = request.ignore_historic_data {
            funnel.ignore_historic_data = ignore;
        }
        if let Some(active) = request.is_active {
            funnel.is_active = active;
        }
        funnel.updated_at = Utc::now();

        Ok(funnel.clone())
    }

    pub fn delete(&self, id: &Uuid) -> BeaconResult<()> {
        let mut entry = self
            .funnels
            .get_mut(id)
            .filter(|f| f.deleted_at.is_none())
            .ok_or_else(|| BeaconError::NotFound(format!("funnel {id}")))?;

        let funnel = entry.value_mut();
        funnel.deleted_at = Some(Utc::now());
        funnel.is_active = false;
        Ok(())
    }
}

impl Default for FunnelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Goals ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CreateGoal {
    pub website_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub target: String,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub ignore_historic_data: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateGoal {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<StepKind>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub filters: Option<Vec<Filter>>,
    #[serde(default)]
    pub ignore_historic_data: Option<bool>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

pub struct GoalRegistry {
    goals: DashMap<Uuid, GoalDefinition>,
}

impl GoalRegistry {
    pub fn new() -> Self {
        Self {
            goals: DashMap::new(),
        }
    }

    pub fn create(&self, request: CreateGoal) -> BeaconResult<GoalDefinition> {
        validate_name(&request.name)?;
        if request.target.is_empty() {
            return Err(BeaconError::InvalidArgument(
                "goal target must not be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let goal = GoalDefinition {
            id: Uuid::new_v4(),
            website_id: request.website_id,
            name: request.name,
            description: request.description,
            kind: request.kind,
            target: request.target,
            filters: request.filters,
            ignore_historic_data: request.ignore_historic_data,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.goals.insert(goal.id, goal.clone());
        Ok(goal)
    }

    pub fn get(&self, id: &Uuid, website_id: &str) -> BeaconResult<GoalDefinition> {
        self.goals
            .get(id)
            .filter(|g| g.deleted_at.is_none() && g.website_id == website_id)
            .map(|g| g.clone())
            .ok_or_else(|| BeaconError::NotFound(format!("goal {id}")))
    }

    pub fn list(&self, website_id: &str) -> Vec<GoalDefinition> {
        let mut goals: Vec<GoalDefinition> = self
            .goals
            .iter()
            .filter(|g| g.deleted_at.is_none() && g.website_id == website_id)
            .map(|g| g.clone())
            .collect();
        goals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        goals
    }

    pub fn update(&self, id: &Uuid, request: UpdateGoal) -> BeaconResult<GoalDefinition> {
        let mut entry = self
            .goals
            .get_mut(id)
            .filter(|g| g.deleted_at.is_none())
            .ok_or_else(|| BeaconError::NotFound(format!("goal {id}")))?;

        if let Some(name) = &request.name {
            validate_name(name)?;
        }
        if let Some(target) = &request.target {
            if target.is_empty() {
                return Err(BeaconError::InvalidArgument(
                    "goal target must not be empty".to_string(),
                ));
            }
        }

        let goal = entry.value_mut();
        if let Some(name) = request.name {
            goal.name = name;
        }
        if let Some(description) = request.description {
            goal.description = Some(description);
        }
        if let Some(kind) = request.kind {
            goal.kind = kind;
        }
        if let Some(target) = request.target {
            goal.target = target;
        }
        if let Some(filters) = request.filters {
            goal.filters = filters;
        }
        if let Some(ignore) = request.ignore_historic_data {
            goal.ignore_historic_data = ignore;
        }
        if let Some(active) = request.is_active {
            goal.is_active = active;
        }
        goal.updated_at = Utc::now();

        Ok(goal.clone())
    }

    pub fn delete(&self, id: &Uuid) -> BeaconResult<()> {
        let mut entry = self
            .goals
            .get_mut(id)
            .filter(|g| g.deleted_at.is_none())
            .ok_or_else(|| BeaconError::NotFound(format!("goal {id}")))?;

        let goal = entry.value_mut();
        goal.deleted_at = Some(Utc::now());
        goal.is_active = false;
        Ok(())
    }
}

impl Default for GoalRegistry {
    fn default() -> Self {
        Self::new()
    }
}
