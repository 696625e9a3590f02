// Draftable entities: individual players and team defenses.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::pick::Position;

/// Capabilities shared by everything that can be drafted.
pub trait Draftable {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn position(&self) -> Position;
    fn projected_points(&self) -> f64;

    /// One-line human readable description.
    fn summary(&self) -> String;
}

/// Ranking order for available pools: projected points descending, then id
/// ascending so equal projections stay deterministic.
pub fn rank_cmp<T: Draftable + ?Sized>(a: &T, b: &T) -> Ordering {
    b.projected_points()
        .total_cmp(&a.projected_points())
        .then_with(|| a.id().cmp(b.id()))
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    /// NFL team abbreviation.
    pub team: String,
    pub position: Position,
    pub bye_week: Option<u8>,
    pub injury_status: Option<String>,
    pub adp: Option<f64>,
    /// Projection for the draft's scoring format.
    pub projected_points: f64,
    /// Value over the best player expected to remain at the user's next turn.
    pub vona: f64,
    /// Value over the last starter league-wide.
    pub vols: f64,
    /// Value over replacement level.
    pub vorp: f64,
}

impl Player {
    pub fn new(id: &str, name: &str, position: Position, projected_points: f64) -> Self {
        Player {
            id: id.to_string(),
            name: name.to_string(),
            team: String::new(),
            position,
            bye_week: None,
            injury_status: None,
            adp: None,
            projected_points,
            vona: 0.0,
            vols: 0.0,
            vorp: 0.0,
        }
    }
}

impl Draftable for Player {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn position(&self) -> Position {
        self.position
    }

    fn projected_points(&self) -> f64 {
        self.projected_points
    }

    fn summary(&self) -> String {
        let mut s = format!(
            "{} ({} {}) {:.1} pts",
            self.name, self.position, self.team, self.projected_points
        );
        if let Some(status) = self.injury_status.as_deref().filter(|s| !s.is_empty()) {
            s.push_str(&format!(" [{status}]"));
        }
        s
    }
}

// ---------------------------------------------------------------------------
// Team defense
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub abbreviation: String,
    pub bye_week: Option<u8>,
    pub adp: Option<f64>,
    pub projected_points: f64,
}

impl Team {
    pub fn new(id: &str, name: &str, projected_points: f64) -> Self {
        Team {
            id: id.to_string(),
            name: name.to_string(),
            abbreviation: String::new(),
            bye_week: None,
            adp: None,
            projected_points,
        }
    }
}

impl Draftable for Team {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn position(&self) -> Position {
        Position::Defense
    }

    fn projected_points(&self) -> f64 {
        self.projected_points
    }

    fn summary(&self) -> String {
        format!("{} (DEF) {:.1} pts", self.name, self.projected_points)
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// Either kind of draftable entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Player(Player),
    Team(Team),
}

impl Entity {
    fn inner(&self) -> &dyn Draftable {
        match self {
            Entity::Player(p) => p,
            Entity::Team(t) => t,
        }
    }
}

impl Draftable for Entity {
    fn id(&self) -> &str {
        self.inner().id()
    }

    fn name(&self) -> &str {
        self.inner().name()
    }

    fn position(&self) -> Position {
        self.inner().position()
    }

    fn projected_points(&self) -> f64 {
        self.inner().projected_points()
    }

    fn summary(&self) -> String {
        self.inner().summary()
    }
}

impl From<Player> for Entity {
    fn from(p: Player) -> Self {
        Entity::Player(p)
    }
}

impl From<Team> for Entity {
    fn from(t: Team) -> Self {
        Entity::Team(t)
    }
}
