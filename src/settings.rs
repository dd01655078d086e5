use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{anyhow, bail, Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::occupancy::{Bounds, FilterRules, Floor, Zone};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const CONFIG_PATH_ENV: &str = "CROWD_INDEX_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/default.json";

/// Where the process runs. Only `Production` writes snapshots through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    #[default]
    Local,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" | "server" => Ok(Environment::Production),
            "local" | "development" | "dev" => Ok(Environment::Local),
            other => Err(anyhow!("unknown environment '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSettings {
    pub path: String,
    pub bounds: Bounds,
}

impl ZoneSettings {
    fn new(path: &str, bounds: Bounds) -> Self {
        Self {
            path: path.into(),
            bounds,
        }
    }

    fn to_zone(&self, key: &str, display_name: &str) -> Zone {
        Zone {
            key: key.into(),
            display_name: display_name.into(),
            path: self.path.clone(),
            bounds: self.bounds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamSettings {
    pub host: String,
    pub auth: String,
    /// Zero disables the per-request timeout.
    pub request_timeout_secs: u64,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            host: "http://localhost:8080".into(),
            auth: String::new(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingSettings {
    pub ground: ZoneSettings,
    pub first: ZoneSettings,
    pub second: ZoneSettings,
    pub third: ZoneSettings,
}

impl Default for BuildingSettings {
    fn default() -> Self {
        Self {
            ground: ZoneSettings::new(
                "/api/location/v2/clients?floorRefId=ground",
                Bounds::new(10.0, 314.0, 36.0, 190.0),
            ),
            first: ZoneSettings::new(
                "/api/location/v2/clients?floorRefId=first",
                Bounds::new(16.0, 314.0, 29.0, 190.0),
            ),
            second: ZoneSettings::new(
                "/api/location/v2/clients?floorRefId=second",
                Bounds::new(10.0, 314.0, 36.0, 190.0),
            ),
            third: ZoneSettings::new(
                "/api/location/v2/clients?floorRefId=third",
                Bounds::new(10.0, 314.0, 36.0, 190.0),
            ),
        }
    }
}

impl BuildingSettings {
    pub fn zone(&self, floor: Floor) -> Zone {
        match floor {
            Floor::Ground => self.ground.to_zone("ground", "Ground Floor"),
            Floor::First => self.first.to_zone("first", "First Floor"),
            Floor::Second => self.second.to_zone("second", "Second Floor"),
            Floor::Third => self.third.to_zone("third", "Third Floor"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecSettings {
    pub ground: ZoneSettings,
    pub first: ZoneSettings,
}

impl Default for RecSettings {
    fn default() -> Self {
        Self {
            ground: ZoneSettings::new(
                "/api/location/v2/clients?floorRefId=rec-ground",
                Bounds::new(10.0, 300.0, 20.0, 214.0),
            ),
            first: ZoneSettings::new(
                "/api/location/v2/clients?floorRefId=rec-first",
                Bounds::new(190.0, 425.0, 25.0, 270.0),
            ),
        }
    }
}

impl RecSettings {
    pub fn zones(&self) -> [Zone; 2] {
        [
            self.ground.to_zone("recGround", "Rec Ground Floor"),
            self.first.to_zone("recFirst", "Rec First Floor"),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/crowd-index.sqlite3"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3012".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub upstream: UpstreamSettings,
    pub building: BuildingSettings,
    pub rec: RecSettings,
    pub filter: FilterRules,
    pub database: DatabaseSettings,
    pub server: ServerSettings,
    pub timezone: String,
    pub environment: Environment,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            upstream: UpstreamSettings::default(),
            building: BuildingSettings::default(),
            rec: RecSettings::default(),
            filter: FilterRules::default(),
            database: DatabaseSettings::default(),
            server: ServerSettings::default(),
            timezone: "America/New_York".into(),
            environment: Environment::Local,
        }
    }
}

impl Settings {
    /// Reads the JSON file at `path` (defaults when it does not exist), applies
    /// environment overrides, and validates the result.
    pub fn load(path: &Path) -> Result<Self> {
        let mut settings = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings in {}", path.display()))?
        } else {
            log_warn!("No settings file at {}; using built-in defaults", path.display());
            Settings::default()
        };

        settings.apply_overrides(|name| std::env::var(name).ok())?;
        settings.validate()?;

        log_info!(
            "Settings loaded: environment={:?}, timezone={}, database={}",
            settings.environment,
            settings.timezone,
            settings.database.path.display()
        );
        Ok(settings)
    }

    pub fn load_from_env() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load(Path::new(&path))
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(env) = lookup("CROWD_INDEX_ENV") {
            self.environment = env.parse()?;
        }
        if let Some(path) = lookup("CROWD_INDEX_DB") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(bind) = lookup("CROWD_INDEX_BIND") {
            self.server.bind = bind;
        }
        if let Some(auth) = lookup("CROWD_INDEX_AUTH") {
            self.upstream.auth = auth;
        }
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|err| anyhow!("invalid timezone '{}': {err}", self.timezone))
    }

    pub fn floor_zones(&self) -> Vec<(Floor, Zone)> {
        Floor::ALL
            .iter()
            .map(|&floor| (floor, self.building.zone(floor)))
            .collect()
    }

    /// Rejects malformed rectangles and empty paths. Overlapping building
    /// rectangles only warn: floors are stacked, so planar overlap is expected.
    pub fn validate(&self) -> Result<()> {
        self.tz()?;

        let zones: Vec<Zone> = self
            .floor_zones()
            .into_iter()
            .map(|(_, zone)| zone)
            .chain(self.rec.zones())
            .collect();

        for zone in &zones {
            if zone.path.trim().is_empty() {
                bail!("zone '{}' has an empty path", zone.key);
            }
            if !zone.bounds.is_well_formed() {
                bail!("zone '{}' has malformed bounds {:?}", zone.key, zone.bounds);
            }
        }

        if self.filter.rssi_min >= self.filter.rssi_max_exclusive {
            bail!(
                "filter rssi window [{}, {}) is empty",
                self.filter.rssi_min,
                self.filter.rssi_max_exclusive
            );
        }

        for warning in self.overlapping_floors() {
            log_warn!("{warning}");
        }
        Ok(())
    }

    pub fn overlapping_floors(&self) -> Vec<String> {
        let floors = self.floor_zones();
        let mut warnings = Vec::new();
        for (i, (_, a)) in floors.iter().enumerate() {
            for (_, b) in floors.iter().skip(i + 1) {
                if a.bounds.overlaps(&b.bounds) {
                    warnings.push(format!(
                        "floor bounds for '{}' and '{}' overlap; building totals rely on device-global identities",
                        a.key, b.key
                    ));
                }
            }
        }
        warnings
    }
}
