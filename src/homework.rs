/*!
The `Homework` record and its lifecycle.

```text
new --(student)--> processing --(student)--> finished --(teacher)--> checked
```

Statuses only move forward, one step at a time, and `checked` is terminal.
*/
use serde::Serialize;
use time::OffsetDateTime;

use crate::{error::HwError, user::Role};

pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// Lifecycle phase. Variant order is phase order; the derived `Ord` is what
/// homework listings are sorted by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    New,
    Processing,
    Finished,
    Checked,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::New, Status::Processing, Status::Finished, Status::Checked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::New        => "new",
            Status::Processing => "processing",
            Status::Finished   => "finished",
            Status::Checked    => "checked",
        }
    }

    /// The single forward step `role` may take from this status, if any.
    pub fn step(self, role: Role) -> Option<Status> {
        match (self, role) {
            (Status::New, Role::Student)        => Some(Status::Processing),
            (Status::Processing, Role::Student) => Some(Status::Finished),
            (Status::Finished, Role::Teacher)   => Some(Status::Checked),
            _ => None,
        }
    }

    /// Whether `role` may move a homework from this status to `to`.
    pub fn allows(self, role: Role, to: Status) -> bool {
        self.step(role) == Some(to)
    }

    pub fn is_terminal(self) -> bool {
        self == Status::Checked
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = HwError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "new"        => Ok(Status::New),
            "processing" => Ok(Status::Processing),
            "finished"   => Ok(Status::Finished),
            "checked"    => Ok(Status::Checked),
            x => Err(HwError::invalid(format!("{:?} is not a homework status.", x))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Listening,
    Reading,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Listening => "listening",
            Kind::Reading   => "reading",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Kind {
    type Err = HwError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "listening" => Ok(Kind::Listening),
            "reading"   => Ok(Kind::Reading),
            x => Err(HwError::invalid(format!("{:?} is not a homework type.", x))),
        }
    }
}

/// A point count in `0..=99`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Points(u8);

impl Points {
    pub const MAX: u8 = 99;

    pub fn new(n: u8) -> Result<Points, HwError> {
        if n > Self::MAX {
            Err(HwError::invalid(format!(
                "Points must be between 0 and {}, not {}.", Self::MAX, n
            )))
        } else {
            Ok(Points(n))
        }
    }

    pub fn get(&self) -> u8 { self.0 }
}

impl std::str::FromStr for Points {
    type Err = HwError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: u8 = s.trim().parse().map_err(|_| HwError::invalid(format!(
            "Points should be a number, not {:?}.", s
        )))?;
        Points::new(n)
    }
}

impl TryFrom<i16> for Points {
    type Error = HwError;

    fn try_from(n: i16) -> Result<Self, Self::Error> {
        match u8::try_from(n) {
            Ok(n) => Points::new(n),
            Err(_) => Err(HwError::invalid(format!("{} is not a valid point count.", n))),
        }
    }
}

impl From<Points> for i16 {
    fn from(p: Points) -> i16 { p.0 as i16 }
}

impl std::fmt::Display for Points {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Homework {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub current_points: Points,
    pub max_points: Points,
    pub kind: Kind,
    pub status: Status,
    pub teacher_id: i64,
    pub student_id: i64,
    /// Bumped on every update; a write only lands if it still matches.
    pub revision: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A homework about to be inserted. It always starts out `new`.
#[derive(Clone, Debug, PartialEq)]
pub struct NewHomework {
    pub name: String,
    pub description: String,
    pub current_points: Points,
    pub max_points: Points,
    pub kind: Kind,
    pub teacher_id: i64,
    pub student_id: i64,
}

impl NewHomework {
    pub fn validate(&self) -> Result<(), HwError> {
        check_text("name", &self.name, MAX_NAME_CHARS)?;
        check_text("description", &self.description, MAX_DESCRIPTION_CHARS)?;
        check_points(self.current_points, self.max_points)
    }
}

fn check_text(field: &str, value: &str, max_chars: usize) -> Result<(), HwError> {
    if value.trim().is_empty() {
        return Err(HwError::invalid(format!("Homework {} may not be blank.", field)));
    }
    let n = value.chars().count();
    if n > max_chars {
        return Err(HwError::invalid(format!(
            "Homework {} is {} characters long; the limit is {}.",
            field, n, max_chars
        )));
    }
    Ok(())
}

pub fn check_points(current: Points, max: Points) -> Result<(), HwError> {
    if current > max {
        Err(HwError::invalid(format!(
            "Current points ({}) may not exceed max points ({}).", current, max
        )))
    } else {
        Ok(())
    }
}

/// Least-complete work first. The sort is stable, so equal statuses keep
/// whatever order they came in.
pub fn sort_by_phase(homeworks: &mut [Homework]) {
    homeworks.sort_by_key(|h| h.status);
}

#[cfg(test)]
pub(crate) fn sample(id: i64, status: Status, teacher_id: i64, student_id: i64) -> Homework {
    Homework {
        id,
        name: format!("Exercise {}", id),
        description: "Read the chapter.".to_owned(),
        current_points: Points::default(),
        max_points: Points(20),
        kind: Kind::Reading,
        status,
        teacher_id,
        student_id,
        revision: 0,
        created_at: OffsetDateTime::UNIX_EPOCH,
        updated_at: OffsetDateTime::UNIX_EPOCH,
    }
}
