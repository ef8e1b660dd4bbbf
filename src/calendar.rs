use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SeasonConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarChange {
    NewDay(u32),
    NewSeason(Season),
}

/// Day counter and season wheel.
#[derive(Debug, Clone, Serialize)]
pub struct Calendar {
    pub day: u32,
    pub season: Season,
    #[serde(skip)]
    season_index: usize,
    pub season_timer: f32,
    pub day_timer: f32,
}

impl Calendar {
    pub fn new(seasons: &[SeasonConfig]) -> Self {
        Self {
            day: 1,
            season: seasons
                .first()
                .map(|entry| entry.season)
                .unwrap_or(Season::Spring),
            season_index: 0,
            season_timer: 0.0,
            day_timer: 0.0,
        }
    }

    /// Moves the clock forward and reports what turned over, in order.
    pub fn advance(
        &mut self,
        dt: f32,
        seasons: &[SeasonConfig],
        day_length: f32,
    ) -> Vec<CalendarChange> {
        let mut changes = Vec::new();

        if let Some(current) = seasons.get(self.season_index) {
            self.season_timer += dt;
            if current.duration > 0.0 && self.season_timer >= current.duration {
                self.season_timer = 0.0;
                self.season_index = (self.season_index + 1) % seasons.len();
                self.season = seasons[self.season_index].season;
                if self.season_index == 0 {
                    self.day = 1;
                    self.day_timer = 0.0;
                }
                changes.push(CalendarChange::NewSeason(self.season));
            }
        }

        if day_length > 0.0 {
            self.day_timer += dt;
            while self.day_timer >= day_length {
                self.day_timer -= day_length;
                self.day += 1;
                changes.push(CalendarChange::NewDay(self.day));
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;

    #[test]
    fn days_and_seasons_turn_over() {
        let config = GameConfig::default();
        let mut calendar = Calendar::new(&config.seasons);

        let mut days = 0;
        let mut seasons = Vec::new();
        for _ in 0..310 {
            for change in calendar.advance(0.1, &config.seasons, 1.0) {
                match change {
                    CalendarChange::NewDay(_) => days += 1,
                    CalendarChange::NewSeason(season) => seasons.push(season),
                }
            }
        }

        assert!((30..=31).contains(&days));
        assert_eq!(seasons, vec![Season::Summer]);
        assert_eq!(calendar.season, Season::Summer);
    }

    #[test]
    fn a_new_year_resets_the_day() {
        let seasons = vec![
            SeasonConfig::new(Season::Spring, 1.0),
            SeasonConfig::new(Season::Winter, 1.0),
        ];
        let mut calendar = Calendar::new(&seasons);

        calendar.advance(1.0, &seasons, 0.5);
        assert_eq!(calendar.season, Season::Winter);
        assert_eq!(calendar.day, 3);

        calendar.advance(1.0, &seasons, 0.5);
        assert_eq!(calendar.season, Season::Spring);
        assert_eq!(calendar.day, 3);
    }
}
