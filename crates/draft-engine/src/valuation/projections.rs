// Stat pool loading and per-entity row deduplication.
//
// Provider CSVs carry one row per (entity, scoring format, league size)
// variant. Only the row closest to the draft's own format and team count is
// kept for each entity id.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::DataPaths;
use crate::draft::entity::{Player, Team};
use crate::draft::league::{Draft, ScoringFormat};
use crate::draft::pick::Position;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("stat pool is empty: {0}")]
    Empty(String),
}

// ---------------------------------------------------------------------------
// Raw CSV rows
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawPlayerRow {
    id: String,
    name: String,
    #[serde(default)]
    team: String,
    position: String,
    format: String,
    num_teams: usize,
    projected_points: f64,
    #[serde(default)]
    adp: Option<f64>,
    #[serde(default)]
    bye_week: Option<u8>,
    #[serde(default)]
    injury_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTeamRow {
    id: String,
    name: String,
    #[serde(default)]
    abbreviation: String,
    format: String,
    num_teams: usize,
    projected_points: f64,
    #[serde(default)]
    adp: Option<f64>,
    #[serde(default)]
    bye_week: Option<u8>,
}

/// A parsed stat row before deduplication.
#[derive(Debug, Clone)]
pub struct StatRow<T> {
    pub id: String,
    pub format: ScoringFormat,
    pub num_teams: usize,
    pub entity: T,
}

/// The deduplicated pool for one draft.
#[derive(Debug, Clone, Default)]
pub struct StatPool {
    pub players: Vec<Player>,
    pub teams: Vec<Team>,
}

// ---------------------------------------------------------------------------
// Deduplication
// ---------------------------------------------------------------------------

/// League size closeness: exact first, then the nearest larger league, then
/// the nearest smaller one.
pub fn size_closeness(row_teams: usize, target: usize) -> (u8, usize) {
    match row_teams.cmp(&target) {
        std::cmp::Ordering::Equal => (0, 0),
        std::cmp::Ordering::Greater => (1, row_teams - target),
        std::cmp::Ordering::Less => (2, target - row_teams),
    }
}

/// Keep exactly one row per entity id: the one closest to the target scoring
/// format, ties broken by league size closeness.
pub fn dedup_stat_rows<T>(
    mut rows: Vec<StatRow<T>>,
    format: ScoringFormat,
    num_teams: usize,
) -> Vec<T> {
    rows.sort_by(|a, b| {
        a.id.cmp(&b.id)
            .then_with(|| a.format.distance(format).cmp(&b.format.distance(format)))
            .then_with(|| {
                size_closeness(a.num_teams, num_teams).cmp(&size_closeness(b.num_teams, num_teams))
            })
    });

    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.id.clone()))
        .map(|row| row.entity)
        .collect()
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn load_player_rows_from_reader<R: Read>(rdr: R) -> Result<Vec<StatRow<Player>>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut rows = Vec::new();
    for result in reader.deserialize::<RawPlayerRow>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping malformed player row: {}", e);
                continue;
            }
        };
        let Some(position) = Position::from_str_pos(&raw.position) else {
            warn!("skipping player '{}': unknown position {}", raw.name.trim(), raw.position);
            continue;
        };
        let format = match ScoringFormat::parse(&raw.format) {
            Ok(f) => f,
            Err(e) => {
                warn!("skipping player '{}': {}", raw.name.trim(), e);
                continue;
            }
        };
        if !raw.projected_points.is_finite() {
            warn!("skipping player '{}': non-finite projection", raw.name.trim());
            continue;
        }
        let id = raw.id.trim().to_string();
        rows.push(StatRow {
            id: id.clone(),
            format,
            num_teams: raw.num_teams,
            entity: Player {
                id,
                name: raw.name.trim().to_string(),
                team: raw.team.trim().to_string(),
                position,
                bye_week: raw.bye_week,
                injury_status: non_empty(raw.injury_status),
                adp: raw.adp,
                projected_points: raw.projected_points,
                vona: 0.0,
                vols: 0.0,
                vorp: 0.0,
            },
        });
    }
    Ok(rows)
}

pub fn load_team_rows_from_reader<R: Read>(rdr: R) -> Result<Vec<StatRow<Team>>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut rows = Vec::new();
    for result in reader.deserialize::<RawTeamRow>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping malformed team row: {}", e);
                continue;
            }
        };
        let format = match ScoringFormat::parse(&raw.format) {
            Ok(f) => f,
            Err(e) => {
                warn!("skipping team '{}': {}", raw.name.trim(), e);
                continue;
            }
        };
        let id = raw.id.trim().to_string();
        rows.push(StatRow {
            id: id.clone(),
            format,
            num_teams: raw.num_teams,
            entity: Team {
                id,
                name: raw.name.trim().to_string(),
                abbreviation: raw.abbreviation.trim().to_string(),
                bye_week: raw.bye_week,
                adp: raw.adp,
                projected_points: raw.projected_points,
            },
        });
    }
    Ok(rows)
}

fn open(path: &Path) -> Result<std::fs::File, ProjectionError> {
    std::fs::File::open(path).map_err(|e| ProjectionError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Load and deduplicate the player and team pools for a draft.
pub fn load_stat_pool(
    paths: &DataPaths,
    base_dir: &Path,
    draft: &Draft,
) -> Result<StatPool, ProjectionError> {
    let players_path = base_dir.join(&paths.players);
    let player_rows =
        load_player_rows_from_reader(open(&players_path)?).map_err(|e| ProjectionError::Csv {
            path: players_path.display().to_string(),
            source: e,
        })?;

    let teams_path = base_dir.join(&paths.teams);
    let team_rows =
        load_team_rows_from_reader(open(&teams_path)?).map_err(|e| ProjectionError::Csv {
            path: teams_path.display().to_string(),
            source: e,
        })?;

    let pool = StatPool {
        players: dedup_stat_rows(player_rows, draft.scoring, draft.num_teams),
        teams: dedup_stat_rows(team_rows, draft.scoring, draft.num_teams),
    };
    if pool.players.is_empty() {
        return Err(ProjectionError::Empty(players_path.display().to_string()));
    }

    info!(
        "Loaded {} players and {} defenses for {} / {} teams",
        pool.players.len(),
        pool.teams.len(),
        draft.scoring,
        draft.num_teams
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYERS_CSV: &str = "\
id,name,team,position,format,num_teams,projected_points,adp,bye_week,injury_status
p1,Bijan Robinson,ATL,RB,ppr,12,320.5,2.1,12,
p1,Bijan Robinson,ATL,RB,standard,12,270.0,3.0,12,
p1,Bijan Robinson,ATL,RB,ppr,10,318.0,2.0,12,
p2,CeeDee Lamb,DAL,WR,half_ppr,14,290.0,5.5,7,Q
p2,CeeDee Lamb,DAL,WR,half_ppr,8,291.0,5.4,7,Q
p3,Nobody,FA,LS,ppr,12,1.0,,,";

    fn row(id: &str, format: ScoringFormat, num_teams: usize) -> StatRow<(ScoringFormat, usize)> {
        StatRow {
            id: id.into(),
            format,
            num_teams,
            entity: (format, num_teams),
        }
    }

    #[test]
    fn size_closeness_prefers_exact_then_larger() {
        assert!(size_closeness(12, 12) < size_closeness(14, 12));
        assert!(size_closeness(14, 12) < size_closeness(10, 12));
        assert!(size_closeness(14, 12) < size_closeness(16, 12));
        assert!(size_closeness(10, 12) < size_closeness(8, 12));
    }

    #[test]
    fn dedup_prefers_exact_format_over_exact_size() {
        let rows = vec![
            row("a", ScoringFormat::Standard, 12),
            row("a", ScoringFormat::Ppr, 10),
            row("a", ScoringFormat::HalfPpr, 12),
        ];
        let kept = dedup_stat_rows(rows, ScoringFormat::Ppr, 12);
        assert_eq!(kept, vec![(ScoringFormat::Ppr, 10)]);
    }

    #[test]
    fn dedup_keeps_one_row_per_id() {
        let rows = vec![
            row("b", ScoringFormat::Ppr, 8),
            row("a", ScoringFormat::Ppr, 12),
            row("b", ScoringFormat::Ppr, 14),
            row("b", ScoringFormat::Ppr, 10),
        ];
        let kept = dedup_stat_rows(rows, ScoringFormat::Ppr, 12);
        assert_eq!(kept, vec![(ScoringFormat::Ppr, 12), (ScoringFormat::Ppr, 14)]);
    }

    #[test]
    fn player_csv_loads_and_dedups() {
        let rows = load_player_rows_from_reader(PLAYERS_CSV.as_bytes()).unwrap();
        // The long snapper row is skipped for its unknown position.
        assert_eq!(rows.len(), 5);

        let players = dedup_stat_rows(rows, ScoringFormat::Ppr, 12);
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].id, "p1");
        assert!((players[0].projected_points - 320.5).abs() < f64::EPSILON);
        assert_eq!(players[0].bye_week, Some(12));
        assert_eq!(players[0].injury_status, None);

        // Half-PPR is the closest format; 14 teams beats 8 for a 12 team league.
        assert_eq!(players[1].id, "p2");
        assert!((players[1].projected_points - 290.0).abs() < f64::EPSILON);
        assert_eq!(players[1].injury_status.as_deref(), Some("Q"));
    }

    #[test]
    fn team_csv_loads() {
        let csv_data = "\
id,name,abbreviation,format,num_teams,projected_points,adp,bye_week
dst-bal,Baltimore Ravens,BAL,ppr,12,145.0,80.2,14
dst-bal,Baltimore Ravens,BAL,ppr,10,140.0,81.0,14
bad row without enough fields";
        let rows = load_team_rows_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        let teams = dedup_stat_rows(rows, ScoringFormat::Ppr, 12);
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].abbreviation, "BAL");
        assert!((teams[0].projected_points - 145.0).abs() < f64::EPSILON);
    }
}
