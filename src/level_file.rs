//! Level file codec
//!
//! Line-oriented UTF-8 text, whitespace-separated fields:
//!
//! ```text
//! 1 1000 3000 4500 0 0.5          level number, three star thresholds, launch anchor
//! alice:100;bob:80;               high score table (may be empty)
//! bird basic -6 0.5               bird <basic|speed|bomb> x y
//! pig 4 0.5 0.5 5000              pig x y radius [points]
//! wood 6 1 0.4 2 0                <wood|stone|ice|ground> x y width height [angle_degrees]
//! ```
//!
//! From the third line on, blank lines and `#` comments are skipped.

use std::fs;
use std::path::Path;

use glam::Vec2;

use crate::error::{LoadError, PersistenceError};
use crate::highscores::HighScoreTable;
use crate::persistence::atomic_write;
use crate::sim::entity::{BirdKind, Material};
use crate::sim::score::StarThresholds;

/// Line 0 of a level file
#[derive(Debug, Clone, PartialEq)]
pub struct LevelHeader {
    pub number: u32,
    pub thresholds: StarThresholds,
    /// Where the active bird sits before launch
    pub anchor: Vec2,
}

/// One placement record
#[derive(Debug, Clone, PartialEq)]
pub enum EntityRecord {
    Bird {
        kind: BirdKind,
        position: Vec2,
    },
    Pig {
        position: Vec2,
        radius: f32,
        points: u64,
    },
    Obstacle {
        material: Material,
        position: Vec2,
        size: Vec2,
        angle_degrees: f32,
    },
}

/// A fully parsed level file
#[derive(Debug, Clone, PartialEq)]
pub struct LevelDescription {
    pub header: LevelHeader,
    pub high_scores: HighScoreTable,
    pub entities: Vec<EntityRecord>,
}

impl LevelDescription {
    /// Read and parse a level file
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Serialize and replace the file atomically
    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        atomic_write(path, self.to_text().as_bytes())
    }

    pub fn parse(text: &str) -> Result<Self, LoadError> {
        let mut lines = text.lines().enumerate();

        let (index, header_line) = lines
            .next()
            .ok_or_else(|| LoadError::parse(0, "empty level file"))?;
        let header = parse_header(index, header_line)?;

        let high_scores = match lines.next() {
            Some((index, record)) => {
                HighScoreTable::parse_record(record).map_err(|e| LoadError::parse(index, e))?
            }
            None => HighScoreTable::new(),
        };

        let mut entities = Vec::new();
        for (index, line) in lines {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            entities.push(parse_entity(index, line)?);
        }

        Ok(Self {
            header,
            high_scores,
            entities,
        })
    }

    pub fn to_text(&self) -> String {
        let header = &self.header;
        let [one, two, three] = header.thresholds.0;
        let mut out = format!(
            "{} {} {} {} {} {}\n",
            header.number, one, two, three, header.anchor.x, header.anchor.y
        );
        out.push_str(&self.high_scores.to_record());
        out.push('\n');

        for entity in &self.entities {
            let line = match entity {
                EntityRecord::Bird { kind, position } => {
                    format!("bird {} {} {}", kind.as_str(), position.x, position.y)
                }
                EntityRecord::Pig {
                    position,
                    radius,
                    points,
                } => format!("pig {} {} {} {}", position.x, position.y, radius, points),
                EntityRecord::Obstacle {
                    material,
                    position,
                    size,
                    angle_degrees,
                } => format!(
                    "{} {} {} {} {} {}",
                    material.as_str(),
                    position.x,
                    position.y,
                    size.x,
                    size.y,
                    angle_degrees
                ),
            };
            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    pub fn bird_count(&self) -> usize {
        self.entities
            .iter()
            .filter(|e| matches!(e, EntityRecord::Bird { .. }))
            .count()
    }
}

/// Whitespace-separated field cursor for one line
struct Fields<'a> {
    index: usize,
    iter: std::str::SplitWhitespace<'a>,
}

impl<'a> Fields<'a> {
    fn new(index: usize, line: &'a str) -> Self {
        Self {
            index,
            iter: line.split_whitespace(),
        }
    }

    fn word(&mut self, what: &str) -> Result<&'a str, LoadError> {
        self.iter
            .next()
            .ok_or_else(|| LoadError::parse(self.index, format!("missing {}", what)))
    }

    fn number<T: std::str::FromStr>(&mut self, what: &str) -> Result<T, LoadError>
    where
        T::Err: std::fmt::Display,
    {
        let word = self.word(what)?;
        word.parse()
            .map_err(|e| LoadError::parse(self.index, format!("bad {} '{}': {}", what, word, e)))
    }

    fn optional<T: std::str::FromStr>(&mut self, what: &str) -> Result<Option<T>, LoadError>
    where
        T::Err: std::fmt::Display,
    {
        match self.iter.next() {
            None => Ok(None),
            Some(word) => word.parse().map(Some).map_err(|e| {
                LoadError::parse(self.index, format!("bad {} '{}': {}", what, word, e))
            }),
        }
    }

    fn finite(&mut self, what: &str) -> Result<f32, LoadError> {
        let value: f32 = self.number(what)?;
        if !value.is_finite() {
            return Err(LoadError::parse(self.index, format!("{} must be finite", what)));
        }
        Ok(value)
    }

    fn positive(&mut self, what: &str) -> Result<f32, LoadError> {
        let value = self.finite(what)?;
        if value <= 0.0 {
            return Err(LoadError::parse(self.index, format!("{} must be positive", what)));
        }
        Ok(value)
    }

    fn vec2(&mut self, what: &str) -> Result<Vec2, LoadError> {
        Ok(Vec2::new(self.finite(what)?, self.finite(what)?))
    }

    fn end(&mut self) -> Result<(), LoadError> {
        match self.iter.next() {
            None => Ok(()),
            Some(extra) => Err(LoadError::parse(
                self.index,
                format!("unexpected trailing field '{}'", extra),
            )),
        }
    }
}

fn parse_header(index: usize, line: &str) -> Result<LevelHeader, LoadError> {
    let mut fields = Fields::new(index, line);
    let number = fields.number("level number")?;
    let thresholds = [
        fields.number("star threshold")?,
        fields.number("star threshold")?,
        fields.number("star threshold")?,
    ];
    let thresholds = StarThresholds::new(thresholds)
        .ok_or_else(|| LoadError::parse(index, "star thresholds must be ascending"))?;
    let anchor = fields.vec2("launch anchor")?;
    fields.end()?;
    Ok(LevelHeader {
        number,
        thresholds,
        anchor,
    })
}

fn parse_entity(index: usize, line: &str) -> Result<EntityRecord, LoadError> {
    let mut fields = Fields::new(index, line);
    let tag = fields.word("record type")?;

    let record = match tag {
        "bird" => {
            let kind_name = fields.word("bird kind")?;
            let kind = BirdKind::from_str(kind_name).ok_or_else(|| {
                LoadError::parse(index, format!("unknown bird kind '{}'", kind_name))
            })?;
            EntityRecord::Bird {
                kind,
                position: fields.vec2("position")?,
            }
        }
        "pig" => EntityRecord::Pig {
            position: fields.vec2("position")?,
            radius: fields.positive("radius")?,
            points: fields.optional("points")?.unwrap_or(crate::consts::PIG_POINTS),
        },
        other => {
            let material = Material::from_str(other)
                .ok_or_else(|| LoadError::parse(index, format!("unknown record '{}'", other)))?;
            EntityRecord::Obstacle {
                material,
                position: fields.vec2("position")?,
                size: Vec2::new(fields.positive("width")?, fields.positive("height")?),
                angle_degrees: fields.optional::<f32>("angle")?.unwrap_or(0.0),
            }
        }
    };
    fields.end()?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highscores::HighScoreEntry;

    const LEVEL: &str = "\
1 1000 3000 4500 -6 0.5
alice:100;bob:80;
ground 0 -0.5 40 1
bird basic -6 0.5
bird bomb -7.5 0.5

# tower
pig 4 0.5 0.5 5000
wood 5 1 0.4 2 90
stone 3 0.25 1 0.5
";

    #[test]
    fn test_parse_level() {
        let level = LevelDescription::parse(LEVEL).unwrap();
        assert_eq!(level.header.number, 1);
        assert_eq!(level.header.thresholds.0, [1000, 3000, 4500]);
        assert_eq!(level.header.anchor, Vec2::new(-6.0, 0.5));
        assert_eq!(
            level.high_scores.entries(),
            &[HighScoreEntry::new("alice", 100), HighScoreEntry::new("bob", 80)]
        );
        assert_eq!(level.entities.len(), 6);
        assert_eq!(level.bird_count(), 2);
        assert_eq!(
            level.entities[4],
            EntityRecord::Obstacle {
                material: Material::Wood,
                position: Vec2::new(5.0, 1.0),
                size: Vec2::new(0.4, 2.0),
                angle_degrees: 90.0,
            }
        );
    }

    #[test]
    fn test_pig_points_default() {
        let level = LevelDescription::parse("2 1 2 3 0 0\n\npig 1 1 0.5\n").unwrap();
        assert_eq!(
            level.entities[0],
            EntityRecord::Pig {
                position: Vec2::new(1.0, 1.0),
                radius: 0.5,
                points: crate::consts::PIG_POINTS,
            }
        );
        assert!(level.high_scores.is_empty());
    }

    #[test]
    fn test_text_round_trip() {
        let level = LevelDescription::parse(LEVEL).unwrap();
        let text = level.to_text();
        assert_eq!(LevelDescription::parse(&text).unwrap(), level);
        // Header and high score lines keep their slots
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("1 1000 3000 4500 -6 0.5"));
        assert_eq!(lines.next(), Some("alice:100;bob:80;"));
    }

    #[test]
    fn test_empty_table_serializes_to_empty_line() {
        let level = LevelDescription::parse("3 10 20 30 0 0\n\n").unwrap();
        assert_eq!(level.to_text(), "3 10 20 30 0 0\n\n");
    }

    #[test]
    fn test_parse_errors_report_line() {
        let cases = [
            ("", 1),
            ("1 10 20\n", 1),
            ("1 30 20 10 0 0\n", 1),
            ("1 10 20 30 0 0\nalice\n", 2),
            ("1 10 20 30 0 0\n\nbird eagle 0 0\n", 3),
            ("1 10 20 30 0 0\n\n\npig 1 1 -0.5\n", 4),
            ("1 10 20 30 0 0\n\nbarrel 1 1 1 1\n", 3),
            ("1 10 20 30 0 0\n\nwood 1 1 1 1 0 extra\n", 3),
            ("1 10 20 30 0 0\n\nwood 1 NaN 1 1\n", 3),
        ];
        for (text, expected_line) in cases {
            match LevelDescription::parse(text) {
                Err(LoadError::Parse { line, .. }) => {
                    assert_eq!(line, expected_line, "input {:?}", text)
                }
                other => panic!("expected parse error for {:?}, got {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("level1.ab");
        let level = LevelDescription::parse(LEVEL).unwrap();
        level.save(&path).unwrap();
        assert_eq!(LevelDescription::load(&path).unwrap(), level);
    }

    #[test]
    fn test_bundled_levels_parse() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("resources/levels");
        for number in 1..=3 {
            let level = LevelDescription::load(&dir.join(format!("level{}.ab", number))).unwrap();
            assert_eq!(level.header.number, number);
            assert!(level.bird_count() > 0);
            assert!(
                level
                    .entities
                    .iter()
                    .any(|e| matches!(e, EntityRecord::Pig { .. }))
            );
        }
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            LevelDescription::load(&dir.path().join("missing.ab")),
            Err(LoadError::Io(_))
        ));
    }
}
